/*! Parallel shard transformer.

Applies a transform to every record of every shard matched by a glob pattern,
writing one output shard per input shard.

# Processing
1. Input shards are dispatched, one task per shard, on a dedicated pool of `processes` threads.
1. A shard whose output already exists is skipped unless `overwrite` is set.
1. Each record is handed to the transform along with its location. Undecodable lines are logged and skipped,
   lines holding a bare JSON `null` are dropped and counted apart.
1. Output goes to a shadow file that is renamed to its final name once the shard is complete.

A failing shard (transform error, io error or panic) leaves no output behind and does not affect the others.
!*/
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::error::Error;
use crate::io::{paths, Record, ShadowFile, ShardReader};
use crate::pipelines::progress::{Progress, ProgressReporter, ProgressSummary, ShardCounter};
use crate::pipelines::Pipeline;

/// Location of the record being transformed.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub source: &'a Path,
    /// 0-based line number in `source`.
    pub line: usize,
}

impl fmt::Display for RecordContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.display(), self.line)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Number of worker threads.
    pub processes: usize,
    /// Reprocess shards whose output already exists.
    pub overwrite: bool,
    /// Write to `shadow.<name>` and rename once done.
    pub shadow: bool,
    /// Warn when the transform leaves a record's text untouched.
    pub debug: bool,
    /// Documents processed between two updates of the shared progress.
    pub update_interval: u64,
    /// Log progress at this period, if set.
    pub report_every: Option<Duration>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            processes: num_cpus::get(),
            overwrite: false,
            shadow: true,
            debug: false,
            update_interval: 1,
            report_every: None,
        }
    }
}

enum ShardOutcome {
    Written,
    Skipped,
}

pub struct ShardProcessor<F> {
    src: String,
    dst: PathBuf,
    transform: F,
    config: ProcessorConfig,
    progress: Arc<Progress>,
}

impl<F> ShardProcessor<F>
where
    F: Fn(Record, &RecordContext) -> Result<Option<Record>, Error> + Send + Sync,
{
    /// Process the shards matched by `src` (a glob pattern or a single file) into `dst`.
    ///
    /// Output shards keep their path relative to the non-wildcard prefix of `src`.
    pub fn new(src: &str, dst: &Path, transform: F) -> Self {
        Self {
            src: src.to_string(),
            dst: dst.to_path_buf(),
            transform,
            config: ProcessorConfig::default(),
            progress: Arc::new(Progress::new()),
        }
    }

    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Live counters, that can be polled while [Pipeline::run] is running.
    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    fn destination(&self, root: &Path, source: &Path) -> Result<PathBuf, Error> {
        Ok(self.dst.join(paths::strip_root(source, root)?))
    }

    fn process_shard(&self, source: &Path, target: &Path) -> Result<ShardOutcome, Error> {
        if !self.config.overwrite && target.exists() {
            info!("{:?} already exists, skipping", target);
            return Ok(ShardOutcome::Skipped);
        }
        debug!("processing {:?} into {:?}", source, target);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let reader = ShardReader::from_path(source)?;
        let mut out = ShadowFile::create(target, self.config.shadow)?;
        let mut counter = ShardCounter::new(&self.progress, self.config.update_interval);

        for (line, record) in reader {
            let ctx = RecordContext { source, line };
            let record = match record {
                Ok(record) => record,
                Err(Error::NullRecord) => {
                    debug!("[{}] null line, dropping", ctx);
                    counter.none();
                    continue;
                }
                Err(e) if e.is_decode() => {
                    warn!("[{}] could not parse record: {}", ctx, e);
                    counter.malformed();
                    continue;
                }
                Err(e) => return Err(e),
            };

            let original = if self.config.debug {
                record.text().map(String::from)
            } else {
                None
            };

            let processed = (self.transform)(record, &ctx).map_err(|e| {
                warn!("[{}] error while processing record: {}", ctx, e);
                e
            })?;
            counter.document();

            match processed {
                Some(record) => {
                    if original.is_some() && original.as_deref() == record.text() {
                        warn!("[{}] text unchanged for record {}", ctx, record.id());
                    }
                    out.write_record(&record)?;
                }
                None => {
                    debug!("[{}] record reduced to nothing, dropping", ctx);
                    counter.dropped();
                }
            }
        }

        out.commit()?;
        counter.finish();
        Ok(ShardOutcome::Written)
    }

    /// Run a single shard, turning a panic of the transform into an error.
    fn run_shard(&self, root: &Path, source: &Path) -> Result<ShardOutcome, Error> {
        let target = self.destination(root, source)?;
        panic::catch_unwind(AssertUnwindSafe(|| self.process_shard(source, &target)))
            .unwrap_or_else(|payload| {
                Err(Error::Panic {
                    shard: source.to_path_buf(),
                    message: panic_message(payload.as_ref()),
                })
            })
    }
}

impl<F> Pipeline<ProgressSummary> for ShardProcessor<F>
where
    F: Fn(Record, &RecordContext) -> Result<Option<Record>, Error> + Send + Sync,
{
    /// Process every shard.
    ///
    /// Failing shards are logged and counted in [ProgressSummary::failed_shards],
    /// an error is only returned if the run could not start.
    fn run(&self) -> Result<ProgressSummary, Error> {
        let sources = paths::expand(&self.src)?;
        let root = paths::glob_root(&self.src);
        info!(
            "processing {} shards from {} into {:?} with {} workers",
            sources.len(),
            self.src,
            self.dst,
            self.config.processes
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.processes.max(1))
            .build()?;
        let reporter = self
            .config
            .report_every
            .map(|every| ProgressReporter::spawn(self.progress.clone(), every));

        pool.install(|| {
            sources
                .par_iter()
                .for_each(|source| match self.run_shard(&root, source) {
                    Ok(ShardOutcome::Written) => self.progress.shard_done(),
                    Ok(ShardOutcome::Skipped) => self.progress.shard_skipped(),
                    Err(e) => {
                        error!("[{:?}] shard failed: {}", source, e);
                        self.progress.shard_failed();
                    }
                })
        });

        if let Some(reporter) = reporter {
            reporter.stop();
        }

        let summary = self.progress.summary();
        if summary.failed_shards > 0 {
            warn!(
                "{} shards failed: see previous messages.",
                summary.failed_shards
            );
        }
        info!("done: {}", summary);
        Ok(summary)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::io::{read_records, write_shards};

    use super::*;

    fn corpus(dir: &Path) {
        let records = (0..10).map(|i| Record::new(format!("doc-{}", i)).with_text("hello"));
        write_shards(records, &dir.join("wiki"), "w.jsonl.gz", 1_000_000).unwrap();
    }

    #[test]
    fn context_display() {
        let ctx = RecordContext {
            source: Path::new("docs/00000_w.jsonl.gz"),
            line: 12,
        };
        assert_eq!(ctx.to_string(), "docs/00000_w.jsonl.gz:12");
    }

    #[test]
    fn panic_messages() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload = panic::catch_unwind(|| panic!("boom {}", 2)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 2");
    }

    #[test]
    fn keeps_relative_layout() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        corpus(input.path());

        let pattern = input.path().join("**").join("*.jsonl.gz");
        let processor = ShardProcessor::new(
            pattern.to_str().unwrap(),
            output.path(),
            |mut record: Record, _: &RecordContext| {
                record.set_text("HELLO");
                Ok(Some(record))
            },
        )
        .with_config(ProcessorConfig {
            processes: 2,
            ..Default::default()
        });
        let summary = processor.run().unwrap();
        assert_eq!(summary.shards, 1);
        assert_eq!(summary.documents, 10);

        let out = output.path().join("wiki").join("00000_w.jsonl.gz");
        let texts: Vec<String> = read_records(&out)
            .unwrap()
            .map(|r| r.unwrap().text().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["HELLO"; 10]);
    }
}

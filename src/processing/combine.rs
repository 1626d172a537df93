/*! Shard recombination.

[combine] merges the many small shards of a corpus into fewer, larger ones and returns a [ProvenanceMap]
describing which source shards (and which id range) ended up in each output shard.

[combine_with_map] replays such a map against another version of the corpus, where records are aligned
(same ids, same order, possibly different content or missing records), so that both versions end up with the
same shard boundaries.
!*/
use std::path::Path;

use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::error::Error;
use crate::io::paths::{self, DEFAULT_PATTERN};
use crate::io::{ShadowFile, ShardReader, ShardWriter};
use crate::processing::provenance::{ProvenanceMap, ShardProvenance};

/// Provenance of the output shard currently being filled.
#[derive(Debug, Default)]
struct OpenShard {
    files: Vec<String>,
    first_id: Option<String>,
    last_id: Option<String>,
}

impl OpenShard {
    /// Account for a record from `source` that has just been written.
    fn push(&mut self, source: &str, id: &str) {
        if self.first_id.is_none() {
            self.first_id = Some(id.to_string());
        }
        self.last_id = Some(id.to_string());

        // a file is only listed once it actually contributes, and never twice in a row
        if self.files.last().map(String::as_str) != Some(source) {
            self.files.push(source.to_string());
        }
    }

    fn commit(self, name: String, map: &mut ProvenanceMap) {
        if let (Some(first_id), Some(last_id)) = (self.first_id, self.last_id) {
            info!(
                "[{}] made from {:?} up to {}",
                name, self.files, last_id
            );
            map.insert(name, self.files, first_id, last_id);
        }
    }
}

/// Combine every `*.jsonl.gz` shard found (recursively) under `input_dir` into shards of `shard_size` bytes
/// named after `filename` in `output_dir`.
///
/// Both directories are normalized to their `documents` sub-directory.
/// Input shards are read in glob walk order and every record is copied, so a malformed line is an error.
/// Lines holding a bare JSON `null` are not records and are skipped, here and in [combine_with_map].
pub fn combine(
    input_dir: &Path,
    output_dir: &Path,
    filename: &str,
    shard_size: u64,
) -> Result<ProvenanceMap, Error> {
    let input_dir = paths::normalize(&paths::dolma_output(input_dir));
    let output_dir = paths::dolma_output(output_dir);
    let pattern = input_dir.join("**").join(DEFAULT_PATTERN);
    let sources = paths::expand(&pattern.to_string_lossy())?;
    info!(
        "combining {} shards from {:?} into {:?}",
        sources.len(),
        input_dir,
        output_dir
    );

    let mut writer = ShardWriter::new(&output_dir, filename, shard_size)?;
    let mut map = ProvenanceMap::default();
    let mut open = OpenShard::default();

    for source in sources {
        let rel = paths::relative(&source, &input_dir)?;
        debug!("copying records from {:?}", source);

        for (line, record) in ShardReader::from_path(&source)? {
            let record = match record {
                Ok(record) => record,
                Err(Error::NullRecord) => {
                    debug!("[{:?}:{}] null line, skipping", source, line);
                    continue;
                }
                Err(e) => {
                    error!("[{:?}:{}] could not read record: {}", source, line, e);
                    return Err(e);
                }
            };

            // the record being written is not part of the shard that gets closed
            if let Some(closed) = writer.write_line(&record.to_line()?)? {
                std::mem::take(&mut open).commit(closed, &mut map);
            }
            open.push(&rel, record.id());
        }
    }

    let summary = writer.finish()?;
    if let Some(last) = summary.shards.last() {
        open.commit(last.clone(), &mut map);
    }

    info!(
        "created {} shards ({} records), each made of {:.2} source files on average",
        map.len(),
        summary.records,
        map.mean_files_per_shard()
    );
    Ok(map)
}

/// Rebuild the shards described by `map` from the (aligned) corpus in `input_dir`.
///
/// Shards are independent and are built in parallel. A shard whose first id cannot be found is written empty.
/// Failures are logged per shard and do not prevent other shards from being built.
pub fn combine_with_map(
    input_dir: &Path,
    output_dir: &Path,
    map: &ProvenanceMap,
) -> Result<(), Error> {
    map.validate()?;
    let input_dir = paths::dolma_output(input_dir);
    let output_dir = paths::dolma_output(output_dir);
    std::fs::create_dir_all(&output_dir)?;
    info!(
        "replaying {} shards from {:?} into {:?}",
        map.len(),
        input_dir,
        output_dir
    );

    let shards: Vec<ShardProvenance> = map.iter().collect();
    let errors: Vec<Error> = shards
        .into_par_iter()
        .filter_map(|shard| {
            match replay_shard(&input_dir, &output_dir, &shard) {
                Ok(written) => {
                    debug!("[{}] wrote {} records", shard.name, written);
                    None
                }
                Err(e) => {
                    error!("[{}] could not be rebuilt: {}", shard.name, e);
                    Some(e)
                }
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Custom(format!(
            "{} shards could not be rebuilt: see previous messages.",
            errors.len()
        )))
    }
}

/// Fill a single output shard, returning the number of records written.
fn replay_shard(
    input_dir: &Path,
    output_dir: &Path,
    shard: &ShardProvenance,
) -> Result<u64, Error> {
    info!("[{}] starting to populate shard", shard.name);
    let mut out = ShadowFile::create(&output_dir.join(shard.name), true)?;

    let last_file = shard.files.len().saturating_sub(1);
    let mut skipping = true;
    let mut found_last = false;
    let mut written = 0;

    'files: for (idx, rel) in shard.files.iter().enumerate() {
        let source = input_dir.join(rel);
        let reader = match ShardReader::from_path(&source) {
            Ok(reader) => reader,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("[{}] source {:?} does not exist, skipping", shard.name, source);
                continue;
            }
            Err(e) => return Err(e),
        };
        debug!("[{}] filling from {:?}", shard.name, source);

        for (line, record) in reader {
            let record = match record {
                Ok(record) => record,
                Err(Error::NullRecord) => continue,
                Err(e) => {
                    error!("[{:?}:{}] could not read record: {}", source, line, e);
                    return Err(e);
                }
            };

            if skipping {
                if record.id() != shard.first_id {
                    continue;
                }
                debug!("[{}] found first id {}", shard.name, shard.first_id);
                skipping = false;
            }

            out.write_record(&record)?;
            written += 1;

            if idx == last_file && record.id() == shard.last_id {
                found_last = true;
                break 'files;
            }
        }
    }

    if skipping {
        warn!(
            "[{}] first id {} not found, shard is empty",
            shard.name, shard.first_id
        );
    } else if !found_last {
        warn!(
            "[{}] last id {} not found, shard is filled up to the end of {:?}",
            shard.name,
            shard.last_id,
            shard.files.last()
        );
    }

    out.commit()?;
    Ok(written)
}

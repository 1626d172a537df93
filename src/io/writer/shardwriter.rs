//! Rotating shard writer.
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Error;
use crate::io::compression::ShardFile;
use crate::io::Record;

/// Zero-padded shard name: shard `3` of `wiki.jsonl.gz` is `00003_wiki.jsonl.gz`.
///
/// Padding keeps lexicographic order equal to creation order up to 100 000 shards.
pub fn shard_name(filename: &str, index: u64) -> String {
    format!("{:05}_{}", index, filename)
}

/// 1 GB = 1 000 000 000 bytes.
const BYTES_PER_GB: f64 = 1_000_000_000.0;

/// Convert a shard size given in GB into a byte budget, rounded to the nearest byte.
///
/// Fails on sizes that are not finite, not positive, or that round down to 0 bytes.
pub fn gb_to_bytes(gb: f64) -> Result<u64, Error> {
    if !gb.is_finite() || gb <= 0.0 {
        return Err(Error::Custom(format!("invalid shard size: {} GB", gb)));
    }
    let bytes = (gb * BYTES_PER_GB).round();
    if bytes < 1.0 || bytes >= u64::MAX as f64 {
        return Err(Error::Custom(format!("invalid shard size: {} GB", gb)));
    }
    Ok(bytes as u64)
}

/// What has been written by a [ShardWriter].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardSummary {
    /// Shard file names, in creation order.
    pub shards: Vec<String>,
    pub records: u64,
    /// Uncompressed bytes, newlines included.
    pub bytes: u64,
}

/// Rotating shard writer.
///
/// Each record costs its serialized size plus one byte for the newline.
/// Before writing a record, the current shard is closed and a new one is opened if the shard
/// is not empty and the record would bring it to `size_limit` bytes or more.
///
/// Note: if a record is larger than the whole limit, then it is an expected behaviour that
/// the size limit is ignored and the record gets its own shard.
///
/// Nothing is created on disk until the first record is written.
pub struct ShardWriter {
    dst: PathBuf,
    filename: String,
    file: Option<ShardFile>,
    size: u64,
    size_limit: u64,
    summary: ShardSummary,
}

impl ShardWriter {
    /// Create a new [ShardWriter], creating `dst` if it does not exist.
    /// size_limit is in bytes.
    pub fn new(dst: &Path, filename: &str, size_limit: u64) -> Result<Self, Error> {
        std::fs::create_dir_all(dst)?;
        Ok(Self {
            dst: dst.to_path_buf(),
            filename: filename.to_string(),
            file: None,
            size: 0,
            size_limit,
            summary: ShardSummary::default(),
        })
    }

    /// Name of the shard currently open, if any.
    pub fn current_shard(&self) -> Option<&str> {
        if self.file.is_some() {
            self.summary.shards.last().map(String::as_str)
        } else {
            None
        }
    }

    /// Rotate file.
    fn create_next_file(&mut self) -> Result<(), Error> {
        let name = shard_name(&self.filename, self.summary.shards.len() as u64);
        let path = self.dst.join(&name);

        info!("creating shard {:?}", path);
        self.file = Some(ShardFile::create(&path)?);
        self.summary.shards.push(name);
        self.size = 0;
        Ok(())
    }

    /// Close the current shard, returning its name.
    fn close_current(&mut self) -> Result<Option<String>, Error> {
        match self.file.take() {
            Some(file) => {
                file.finish()?;
                let name = self.summary.shards.last().cloned();
                debug!("closed shard {:?} ({} bytes)", name, self.size);
                Ok(name)
            }
            None => Ok(None),
        }
    }

    /// Write a record.
    ///
    /// Returns the name of the shard that was closed if writing this record triggered a rollover.
    pub fn write(&mut self, record: &Record) -> Result<Option<String>, Error> {
        let line = record.to_line()?;
        self.write_line(&line)
    }

    /// Write an already serialized record. `line` must not contain a newline.
    ///
    /// Returns the name of the shard that was closed if writing this line triggered a rollover.
    pub fn write_line(&mut self, line: &str) -> Result<Option<String>, Error> {
        let cost = line.len() as u64 + 1;

        // if there's no space left on the current file, create another one
        // ignore if the file is empty (if we're already on a new file)
        let mut closed = None;
        if self.size > 0 && self.size + cost >= self.size_limit {
            closed = self.close_current()?;
            info!(
                "shard size exceeded, creating new shard after {:?}",
                closed.as_deref().unwrap_or_default()
            );
        }

        if self.file.is_none() {
            self.create_next_file()?;
        }

        if let Some(file) = &mut self.file {
            file.write_line(line)?;
        }
        self.size += cost;
        self.summary.records += 1;
        self.summary.bytes += cost;

        Ok(closed)
    }

    /// Close the last shard and return a summary of what has been written.
    pub fn finish(mut self) -> Result<ShardSummary, Error> {
        self.close_current()?;
        Ok(self.summary)
    }
}

/// Write `records` to `dst` in shards of about `shard_size` bytes named after `filename`.
///
/// Records are consumed lazily. Shards are gzipped if `filename` ends in `.gz`.
pub fn write_shards<I>(
    records: I,
    dst: &Path,
    filename: &str,
    shard_size: u64,
) -> Result<ShardSummary, Error>
where
    I: IntoIterator<Item = Record>,
{
    info!("writing shards to {:?}", dst);
    let mut writer = ShardWriter::new(dst, filename, shard_size)?;
    for record in records {
        writer.write(&record)?;
    }
    let summary = writer.finish()?;
    info!(
        "wrote {} records in {} shards to {:?}",
        summary.records,
        summary.shards.len(),
        dst
    );
    Ok(summary)
}

//! Size statistics of a corpus.
//!
//! Counts documents, whitespace-separated tokens, UTF-8 bytes and characters of the `text` field,
//! one shard per task.
use std::fmt;
use std::ops::Add;
use std::path::Path;

use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::Error;
use crate::io::{paths, ShardReader};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeStats {
    pub shards: u64,
    pub documents: u64,
    pub tokens: u64,
    pub bytes: u64,
    pub characters: u64,
}

impl SizeStats {
    /// Account for a document. Documents without text only count as documents.
    pub fn add_text(&mut self, text: Option<&str>) {
        self.documents += 1;
        if let Some(text) = text {
            self.tokens += text.split_whitespace().count() as u64;
            self.bytes += text.len() as u64;
            self.characters += text.chars().count() as u64;
        }
    }
}

impl Add for SizeStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            shards: self.shards + rhs.shards,
            documents: self.documents + rhs.documents,
            tokens: self.tokens + rhs.tokens,
            bytes: self.bytes + rhs.bytes,
            characters: self.characters + rhs.characters,
        }
    }
}

impl fmt::Display for SizeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shards: {}, documents: {}, tokens: {}, bytes: {}, characters: {}",
            self.shards, self.documents, self.tokens, self.bytes, self.characters
        )
    }
}

/// Statistics of a single shard. Malformed and `null` lines are skipped.
pub fn shard_stats(src: &Path) -> Result<SizeStats, Error> {
    debug!("counting tokens from {:?}", src);
    let mut stats = SizeStats {
        shards: 1,
        ..Default::default()
    };
    for (line, record) in ShardReader::from_path(src)? {
        match record {
            Ok(record) => stats.add_text(record.text()),
            Err(Error::NullRecord) => {}
            Err(e) if e.is_decode() => warn!("[{:?}:{}] could not parse record: {}", src, line, e),
            Err(e) => return Err(e),
        }
    }
    Ok(stats)
}

/// Statistics of every shard matched by `pattern`, computed on `processes` threads.
///
/// Shards that cannot be read are logged and left out of the totals.
pub fn stats(pattern: &str, processes: usize) -> Result<SizeStats, Error> {
    let sources = paths::expand(pattern)?;
    info!("computing stats of {} shards from {}", sources.len(), pattern);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(processes.max(1))
        .build()?;
    let total = pool.install(|| {
        sources
            .par_iter()
            .filter_map(|src| match shard_stats(src) {
                Ok(stats) => Some(stats),
                Err(e) => {
                    error!("[{:?}] failed to compute stats: {}", src, e);
                    None
                }
            })
            .reduce(SizeStats::default, |a, b| a + b)
    });

    if (total.shards as usize) < sources.len() {
        warn!(
            "{} shards could not be read: see previous messages.",
            sources.len() - total.shards as usize
        );
    }
    Ok(total)
}

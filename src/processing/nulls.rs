//! Removal of `null` lines.
//!
//! Some producers write a bare `null` in place of a dropped document. The processor never writes them
//! back, so copying records as they are is enough to clean a corpus.
use std::path::Path;

use log::info;

use crate::error::Error;
use crate::io::Record;
use crate::pipelines::{Pipeline, ProcessorConfig, ProgressSummary, RecordContext, ShardProcessor};

fn keep(record: Record, _: &RecordContext) -> Result<Option<Record>, Error> {
    Ok(Some(record))
}

/// Copy the shards matched by `src` into `dst`, leaving `null` lines out.
pub fn remove_none(src: &str, dst: &Path, config: ProcessorConfig) -> Result<ProgressSummary, Error> {
    let summary = ShardProcessor::new(src, dst, keep)
        .with_config(config)
        .run()?;
    info!(
        "removed {} null lines out of {} lines",
        summary.nones,
        summary.nones + summary.documents + summary.malformed
    );
    Ok(summary)
}

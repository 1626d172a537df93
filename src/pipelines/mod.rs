//! Pipelines.
//!
//! A pipeline walks a whole corpus and reports back a result once every shard has been processed.
//! [ShardProcessor] is the generic one: it applies a per-record transform to every shard of a corpus.
mod progress;
mod shard_processor;

pub use progress::{Progress, ProgressReporter, ProgressSummary};
pub use shard_processor::{ProcessorConfig, RecordContext, ShardProcessor};

use crate::error::Error;

/// Implemented by each pipeline,
/// generic over the return type so that pipelines can report whatever they aggregate.
pub trait Pipeline<T> {
    fn run(&self) -> Result<T, Error>;
}

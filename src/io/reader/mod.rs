/*! Corpus reading utilities

Shards are read lazily, line by line, so that arbitrarily large shards never have to fit in memory.
!*/
mod shardreader;

pub use shardreader::{read_records, ShardReader};

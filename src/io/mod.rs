/*!
# IO utilities

Record (de)serialization, shard reading and writing, and the path conventions of a corpus on disk.

Shards are newline-delimited JSON, gzipped when their name ends in `.gz`.
!*/
pub mod compression;
pub mod paths;
pub mod reader;
mod record;
pub mod writer;

pub use reader::{read_records, ShardReader};
pub use record::Record;
pub use writer::{shard_name, write_shards, ShadowFile, ShardSummary, ShardWriter};

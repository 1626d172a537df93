/*!
# Shard writing

[ShardWriter] rotates through zero-padded shard files once a byte budget is reached,
and [ShadowFile] gives atomic, all-or-nothing writes of a single output file.
!*/
mod shadow;
mod shardwriter;

pub use shadow::{is_shadow, shadow_path, ShadowFile};
pub use shardwriter::{gb_to_bytes, shard_name, write_shards, ShardSummary, ShardWriter};

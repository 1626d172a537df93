/*! Corpus processing

Shard recombination with provenance tracking, and the jobs built on top of the shard processor
(field removal, `null` line removal, id to shard mapping, size statistics).
!*/
pub mod combine;
pub mod features;
pub mod id_to_shard;
pub mod nulls;
pub mod provenance;
pub mod stats;

pub use combine::{combine, combine_with_map};
pub use provenance::{ProvenanceMap, ShardProvenance};
pub use stats::SizeStats;

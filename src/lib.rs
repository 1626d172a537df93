/*! # pileshard

Shard management for line-delimited JSON corpora.

- [io]: record codec, size-bounded shard writing and crash-safe shadow files,
- [processing]: shard recombination with a replayable provenance map, plus a few corpus-wide jobs,
- [pipelines]: the parallel shard processor, applying a per-record transform to every shard of a corpus.
!*/
pub mod error;
pub mod io;
pub mod pipelines;
pub mod processing;

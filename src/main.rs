//! # pileshard
//!
//! Shard management for line-delimited JSON corpora.
//!
//! ## Getting started
//!
//! ```sh
//! pileshard 0.1.0
//! corpus shard management tool.
//!
//! USAGE:
//!     pileshard <SUBCOMMAND>
//!
//! SUBCOMMANDS:
//!     combine            Combine many shards into fewer, larger ones, or replay a previous combination
//!     help               Prints this message or the help of the given subcommand(s)
//!     id-to-shard        Map each record id to the index of the shard holding it
//!     remove-features    Only keep some top-level fields of each record
//!     remove-none        Copy shards, leaving out lines that hold a bare JSON null
//!     stats              Count documents, tokens, bytes and characters
//! ```
//!
//! Logging is controlled with `RUST_LOG` (e.g. `RUST_LOG=info`).
use std::collections::HashSet;
use std::time::Duration;

use pileshard::error::Error;
use pileshard::io::paths::{self, DEFAULT_PATTERN};
use pileshard::io::writer::gb_to_bytes;
use pileshard::pipelines::{Pipeline, ProcessorConfig, ShardProcessor};
use pileshard::processing::features::{keep_features, DEFAULT_FEATURES};
use pileshard::processing::{combine, id_to_shard, nulls, stats, ProvenanceMap};
use structopt::StructOpt;

#[macro_use]
extern crate log;

mod cli;

fn run_combine(c: cli::Combine) -> Result<(), Error> {
    match (c.shard_to_files, c.shard_to_first_id, c.shard_to_last_id) {
        (None, None, None) => {
            let filename = c.filename.ok_or_else(|| {
                Error::Custom(
                    "--filename needs to be given when creating the first combined shards."
                        .to_string(),
                )
            })?;
            let shard_size = gb_to_bytes(c.shard_size)?;
            info!("combining files into shards and tracking which go where");
            let map = combine::combine(&c.input, &c.output, &filename, shard_size)?;
            map.save(&c.map_dir)?;
        }
        (Some(files), Some(first), Some(last)) => {
            info!("combining files into shards based on a mapping");
            let map = ProvenanceMap::load(&files, &first, &last)?;
            combine::combine_with_map(&c.input, &c.output, &map)?;
        }
        (files, first, last) => {
            return Err(Error::Custom(format!(
                "either all or none of --shard-to-files, --shard-to-first-id and --shard-to-last-id should be given, got {:?}, {:?} and {:?}",
                files, first, last
            )));
        }
    }
    Ok(())
}

fn run_remove_features(r: cli::RemoveFeatures) -> Result<(), Error> {
    let features: HashSet<String> = if r.features_to_keep.is_empty() {
        DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()
    } else {
        r.features_to_keep.into_iter().collect()
    };
    let src = paths::dolma_input(&r.input, Some(&r.filename))?;
    let dst = paths::dolma_output(&r.output);
    info!("keeping {:?} from {} and saving to {:?}", features, src, dst);

    let summary = ShardProcessor::new(&src, &dst, keep_features(features))
        .with_config(processor_config(&r.processing))
        .run()?;
    check_failures(summary.failed_shards)
}

fn run_remove_none(r: cli::RemoveNone) -> Result<(), Error> {
    let src = paths::dolma_input(&r.input, Some(&r.filename))?;
    let dst = paths::dolma_output(&r.output);
    info!("removing null lines from {} and saving to {:?}", src, dst);

    let summary = nulls::remove_none(&src, &dst, processor_config(&r.processing))?;
    check_failures(summary.failed_shards)
}

fn processor_config(p: &cli::Processing) -> ProcessorConfig {
    ProcessorConfig {
        processes: p.processes.unwrap_or_else(num_cpus::get),
        overwrite: p.overwrite,
        debug: p.debug,
        report_every: p.report_every.map(Duration::from_secs),
        ..Default::default()
    }
}

fn check_failures(failed_shards: u64) -> Result<(), Error> {
    if failed_shards > 0 {
        return Err(Error::Custom(format!(
            "{} shards failed: see previous messages.",
            failed_shards
        )));
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let opt = cli::Pileshard::from_args();
    debug!("cli args\n{:#?}", opt);

    match opt {
        cli::Pileshard::Combine(c) => run_combine(c)?,
        cli::Pileshard::RemoveFeatures(r) => run_remove_features(r)?,
        cli::Pileshard::RemoveNone(r) => run_remove_none(r)?,
        cli::Pileshard::IdToShard(i) => {
            let src = paths::dolma_input(&i.input, Some(DEFAULT_PATTERN))?;
            let ids = id_to_shard::id_to_shard(&src, i.processes.unwrap_or_else(num_cpus::get))?;
            id_to_shard::write_id_map(&ids, &i.output)?;
        }
        cli::Pileshard::Stats(s) => {
            let src = paths::dolma_input(&s.input, Some("**/*.jsonl.gz"))?;
            let total = stats::stats(&src, s.processes.unwrap_or_else(num_cpus::get))?;
            println!("{}", serde_json::to_string_pretty(&total)?);
        }
    };
    Ok(())
}

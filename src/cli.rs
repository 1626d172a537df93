//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "pileshard", about = "corpus shard management tool.")]
/// Holds every command that is callable by the `pileshard` command.
pub enum Pileshard {
    #[structopt(about = "Combine many shards into fewer, larger ones, or replay a previous combination")]
    Combine(Combine),
    #[structopt(about = "Only keep some top-level fields of each record")]
    RemoveFeatures(RemoveFeatures),
    #[structopt(about = "Copy shards, leaving out lines that hold a bare JSON null")]
    RemoveNone(RemoveNone),
    #[structopt(about = "Map each record id to the index of the shard holding it")]
    IdToShard(IdToShard),
    #[structopt(about = "Count documents, tokens, bytes and characters")]
    Stats(Stats),
}

#[derive(Debug, StructOpt)]
/// Combine command and parameters.
///
/// Giving none of the three map files creates new shards (and requires `--filename`),
/// giving all three replays the recorded combination.
pub struct Combine {
    #[structopt(parse(from_os_str), help = "source corpus location (where `documents` lives)")]
    pub input: PathBuf,
    #[structopt(parse(from_os_str), help = "destination corpus location")]
    pub output: PathBuf,
    #[structopt(long = "filename", help = "name given to the combined shards")]
    pub filename: Option<String>,
    #[structopt(
        long = "shard-size",
        help = "size of each combined shard (in GBytes)",
        default_value = "1"
    )]
    pub shard_size: f64,
    #[structopt(
        parse(from_os_str),
        long = "map-dir",
        help = "where the shard maps of a new combination are saved",
        default_value = "."
    )]
    pub map_dir: PathBuf,
    #[structopt(parse(from_os_str), long = "shard-to-files", help = "shard to source files map")]
    pub shard_to_files: Option<PathBuf>,
    #[structopt(parse(from_os_str), long = "shard-to-first-id", help = "shard to first id map")]
    pub shard_to_first_id: Option<PathBuf>,
    #[structopt(parse(from_os_str), long = "shard-to-last-id", help = "shard to last id map")]
    pub shard_to_last_id: Option<PathBuf>,
}

/// Shared parallel processing options.
#[derive(Debug, StructOpt)]
pub struct Processing {
    #[structopt(long = "processes", help = "number of worker threads. Default is the number of CPUs.")]
    pub processes: Option<usize>,
    #[structopt(long = "overwrite", help = "reprocess shards whose output already exists")]
    pub overwrite: bool,
    #[structopt(long = "debug", help = "warn when a record's text is left unchanged")]
    pub debug: bool,
    #[structopt(long = "report-every", help = "log progress every n seconds")]
    pub report_every: Option<u64>,
}

#[derive(Debug, StructOpt)]
pub struct RemoveFeatures {
    #[structopt(help = "source corpus location, shard file or glob")]
    pub input: String,
    #[structopt(parse(from_os_str), help = "destination corpus location")]
    pub output: PathBuf,
    #[structopt(
        long = "filename",
        help = "glob matching shard names",
        default_value = "*.jsonl.gz"
    )]
    pub filename: String,
    #[structopt(
        long = "features-to-keep",
        help = "top-level field to keep (repeatable). Default is text. id is always kept."
    )]
    pub features_to_keep: Vec<String>,
    #[structopt(flatten)]
    pub processing: Processing,
}

#[derive(Debug, StructOpt)]
pub struct RemoveNone {
    #[structopt(help = "source corpus location, shard file or glob")]
    pub input: String,
    #[structopt(parse(from_os_str), help = "destination corpus location")]
    pub output: PathBuf,
    #[structopt(
        long = "filename",
        help = "glob matching shard names",
        default_value = "*.jsonl.gz"
    )]
    pub filename: String,
    #[structopt(flatten)]
    pub processing: Processing,
}

#[derive(Debug, StructOpt)]
pub struct IdToShard {
    #[structopt(help = "source corpus location, shard file or glob")]
    pub input: String,
    #[structopt(
        parse(from_os_str),
        long = "output",
        help = "id map location",
        default_value = "id_to_shards.json"
    )]
    pub output: PathBuf,
    #[structopt(long = "processes", help = "number of worker threads. Default is the number of CPUs.")]
    pub processes: Option<usize>,
}

#[derive(Debug, StructOpt)]
pub struct Stats {
    #[structopt(help = "source corpus location, shard file or glob")]
    pub input: String,
    #[structopt(long = "processes", help = "number of worker threads. Default is the number of CPUs.")]
    pub processes: Option<usize>,
}

/*! Record id to shard index mapping.

Runs the [ShardProcessor] with an id-only transform into a temporary directory, then reads back the
(now tiny) shards to map each id to the 5-digit index prefix of the shard that holds it.
!*/
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::Error;
use crate::io::{paths, read_records, Record};
use crate::pipelines::{Pipeline, ProcessorConfig, RecordContext, ShardProcessor};

/// `00042_wiki.jsonl.gz` -> `00042`
pub fn shard_index(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let (index, _) = name.split_once('_')?;
    if index.len() == 5 && index.bytes().all(|b| b.is_ascii_digit()) {
        Some(index)
    } else {
        None
    }
}

fn only_id(record: Record, _: &RecordContext) -> Result<Option<Record>, Error> {
    Ok(Some(Record::new(record.id())))
}

/// Map the id of every record matched by `pattern` to the index of its shard.
///
/// Shards whose name does not start with a shard index are ignored.
pub fn id_to_shard(pattern: &str, processes: usize) -> Result<BTreeMap<String, String>, Error> {
    let tmp = tempfile::tempdir()?;
    let processor = ShardProcessor::new(pattern, tmp.path(), only_id).with_config(ProcessorConfig {
        processes,
        overwrite: true,
        ..Default::default()
    });
    let summary = processor.run()?;
    if summary.failed_shards > 0 {
        return Err(Error::Custom(format!(
            "{} shards could not be read: see previous messages.",
            summary.failed_shards
        )));
    }

    let mut ids = BTreeMap::new();
    let pattern = tmp.path().join("**").join("*");
    for shard in paths::expand(&pattern.to_string_lossy())? {
        let index = match shard_index(&shard) {
            Some(index) => index.to_string(),
            None => continue,
        };
        for record in read_records(&shard)? {
            ids.insert(record?.id().to_string(), index.clone());
        }
    }
    info!("mapped {} ids", ids.len());
    Ok(ids)
}

/// Save an id map as a single JSON object.
pub fn write_id_map(ids: &BTreeMap<String, String>, dst: &Path) -> Result<(), Error> {
    info!("saving id map to {:?}", dst);
    let mut f = BufWriter::new(File::create(dst)?);
    serde_json::to_writer(&mut f, ids)?;
    f.flush()?;
    Ok(())
}

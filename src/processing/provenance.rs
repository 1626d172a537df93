/*! Provenance of combined shards.

For each output shard, a combine run records which source shards contributed to it (in order),
and the ids of the first and last records written to it.
That is enough to rebuild the very same shard boundaries from another version of the corpus
whose records carry the same ids.

The map is persisted as three JSON objects keyed by shard name, in three separate files.
!*/
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Component, Path};

use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;

pub const SHARD_TO_FILES: &str = "shard_to_files.json";
pub const SHARD_TO_FIRST_ID: &str = "shard_to_first_id.json";
pub const SHARD_TO_LAST_ID: &str = "shard_to_last_id.json";

/// Provenance of a single output shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardProvenance<'a> {
    pub name: &'a str,
    /// Contributing source shards, relative to the input `documents` directory.
    pub files: &'a [String],
    pub first_id: &'a str,
    pub last_id: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceMap {
    shard_to_files: BTreeMap<String, Vec<String>>,
    shard_to_first_id: BTreeMap<String, String>,
    shard_to_last_id: BTreeMap<String, String>,
}

impl ProvenanceMap {
    pub fn new(
        shard_to_files: BTreeMap<String, Vec<String>>,
        shard_to_first_id: BTreeMap<String, String>,
        shard_to_last_id: BTreeMap<String, String>,
    ) -> Result<Self, Error> {
        let map = Self {
            shard_to_files,
            shard_to_first_id,
            shard_to_last_id,
        };
        map.validate()?;
        Ok(map)
    }

    pub fn insert(&mut self, shard: String, files: Vec<String>, first_id: String, last_id: String) {
        self.shard_to_first_id.insert(shard.clone(), first_id);
        self.shard_to_last_id.insert(shard.clone(), last_id);
        self.shard_to_files.insert(shard, files);
    }

    pub fn get(&self, shard: &str) -> Option<ShardProvenance<'_>> {
        let (name, files) = self.shard_to_files.get_key_value(shard)?;
        Some(ShardProvenance {
            name,
            files,
            first_id: self.shard_to_first_id.get(shard)?,
            last_id: self.shard_to_last_id.get(shard)?,
        })
    }

    /// Shards in name order, which is also creation order.
    pub fn iter(&self) -> impl Iterator<Item = ShardProvenance<'_>> {
        self.shard_to_files
            .keys()
            .filter_map(move |name| self.get(name))
    }

    pub fn len(&self) -> usize {
        self.shard_to_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shard_to_files.is_empty()
    }

    /// Mean number of source files per output shard.
    pub fn mean_files_per_shard(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let total: usize = self.shard_to_files.values().map(Vec::len).sum();
        total as f64 / self.len() as f64
    }

    /// Check that the three maps describe the same shards, and that no shard has an empty file list.
    ///
    /// Shard names must be bare file names and source files relative paths without `..`,
    /// so that a map cannot make a replay read or write outside of the corpus directories.
    pub fn validate(&self) -> Result<(), Error> {
        for shard in self.shard_to_files.keys() {
            if !self.shard_to_first_id.contains_key(shard) {
                return Err(Error::Provenance(format!("no first id for shard {}", shard)));
            }
            if !self.shard_to_last_id.contains_key(shard) {
                return Err(Error::Provenance(format!("no last id for shard {}", shard)));
            }
        }
        for shard in self
            .shard_to_first_id
            .keys()
            .chain(self.shard_to_last_id.keys())
        {
            if !self.shard_to_files.contains_key(shard) {
                return Err(Error::Provenance(format!(
                    "shard {} has ids but no source files",
                    shard
                )));
            }
        }
        for (shard, files) in &self.shard_to_files {
            if !is_plain_name(shard) {
                return Err(Error::Provenance(format!(
                    "shard name {:?} is not a plain file name",
                    shard
                )));
            }
            if files.is_empty() {
                return Err(Error::Provenance(format!("shard {} has no source files", shard)));
            }
            if let Some(file) = files.iter().find(|f| !is_relative_under(f)) {
                return Err(Error::Provenance(format!(
                    "shard {} lists {:?}, which is not a path inside the corpus",
                    shard, file
                )));
            }
        }
        Ok(())
    }

    /// Write the three maps in `dir`, under their conventional names.
    pub fn save(&self, dir: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(dir)?;
        write_json(&self.shard_to_files, &dir.join(SHARD_TO_FILES))?;
        write_json(&self.shard_to_first_id, &dir.join(SHARD_TO_FIRST_ID))?;
        write_json(&self.shard_to_last_id, &dir.join(SHARD_TO_LAST_ID))?;
        Ok(())
    }

    /// Load the three maps from explicit locations.
    pub fn load(files: &Path, first_ids: &Path, last_ids: &Path) -> Result<Self, Error> {
        Self::new(read_json(files)?, read_json(first_ids)?, read_json(last_ids)?)
    }

    /// Load the three maps from `dir`, where [ProvenanceMap::save] put them.
    pub fn load_dir(dir: &Path) -> Result<Self, Error> {
        Self::load(
            &dir.join(SHARD_TO_FILES),
            &dir.join(SHARD_TO_FIRST_ID),
            &dir.join(SHARD_TO_LAST_ID),
        )
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), Error> {
    info!("saving shard creation map to {:?}", path);
    let mut f = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut f, value)?;
    f.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    info!("reading shard creation map from {:?}", path);
    let f = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(f)?)
}

/// A single, non-empty file name.
fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\'])
        && matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        )
}

/// A non-empty relative path made of plain names only.
fn is_relative_under(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

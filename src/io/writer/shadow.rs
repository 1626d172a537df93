/*! Shadow writes.

Output is written to `shadow.<name>` next to its final location and only renamed to `<name>` once
everything has been written and flushed. A process killed mid-write leaves a shadow file behind, never a
truncated file under the final name.

The `shadow.` marker is a prefix so that extension-based compression detection still works on the shadow path.
!*/
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Error;
use crate::io::compression::ShardFile;
use crate::io::Record;

const SHADOW_PREFIX: &str = "shadow.";

/// `dir/name` -> `dir/shadow.name`
pub fn shadow_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", SHADOW_PREFIX, name))
}

/// `true` if the file name carries the shadow marker.
pub fn is_shadow(path: &Path) -> bool {
    path.file_name()
        .map_or(false, |n| n.to_string_lossy().starts_with(SHADOW_PREFIX))
}

/// A file that only appears under its final name once committed.
///
/// Dropping a [ShadowFile] without calling [ShadowFile::commit] removes what has been written so far,
/// which also happens while unwinding from a panic.
pub struct ShadowFile {
    target: PathBuf,
    written: PathBuf,
    file: Option<ShardFile>,
}

impl ShadowFile {
    /// Start writing `target`. When `shadow` is false, `target` is written in place.
    ///
    /// A stale shadow file from a previous run is truncated.
    pub fn create(target: &Path, shadow: bool) -> Result<Self, Error> {
        let written = if shadow {
            shadow_path(target)
        } else {
            target.to_path_buf()
        };
        if written.exists() {
            debug!("truncating leftover file {:?}", written);
        }
        let file = ShardFile::create(&written)?;
        Ok(Self {
            target: target.to_path_buf(),
            written,
            file: Some(file),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), Error> {
        match &mut self.file {
            Some(file) => Ok(file.write_line(line)?),
            None => Err(Error::Custom(format!(
                "writing to already closed file {:?}",
                self.target
            ))),
        }
    }

    pub fn write_record(&mut self, record: &Record) -> Result<(), Error> {
        let line = record.to_line()?;
        self.write_line(&line)
    }

    /// Flush, close and move the file to its final name.
    pub fn commit(mut self) -> Result<(), Error> {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.finish() {
                self.discard();
                return Err(e.into());
            }
        }
        if self.written != self.target {
            if let Err(e) = std::fs::rename(&self.written, &self.target) {
                self.discard();
                return Err(e.into());
            }
            debug!("renamed {:?} to {:?}", self.written, self.target);
        }
        Ok(())
    }

    fn discard(&self) {
        if let Err(e) = std::fs::remove_file(&self.written) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove partial file {:?}: {}", self.written, e);
            }
        }
    }
}

impl Drop for ShadowFile {
    fn drop(&mut self) {
        if let Some(mut file) = self.file.take() {
            // partial content is thrown away anyway
            let _ = file.flush();
            drop(file);
            debug!("discarding partial file {:?}", self.written);
            self.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::io::read_records;

    use super::*;

    #[test]
    fn shadow_names() {
        let p = Path::new("out/documents/00001_x.jsonl.gz");
        assert_eq!(
            shadow_path(p),
            PathBuf::from("out/documents/shadow.00001_x.jsonl.gz")
        );
        assert!(is_shadow(&shadow_path(p)));
        assert!(!is_shadow(p));
    }

    #[test]
    fn commit_moves_to_target() {
        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("00000_a.jsonl.gz");

        let mut f = ShadowFile::create(&target, true).unwrap();
        f.write_record(&Record::new("a")).unwrap();
        assert!(shadow_path(&target).exists());
        assert!(!target.exists());

        f.commit().unwrap();
        assert!(target.exists());
        assert!(!shadow_path(&target).exists());
        let ids: Vec<String> = read_records(&target)
            .unwrap()
            .map(|r| r.unwrap().id().to_string())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn dropping_discards() {
        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("00000_a.jsonl");

        let mut f = ShadowFile::create(&target, true).unwrap();
        f.write_record(&Record::new("a")).unwrap();
        drop(f);

        assert!(!target.exists());
        assert!(!shadow_path(&target).exists());
    }

    #[test]
    fn no_shadow_writes_in_place() {
        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("00000_a.jsonl");

        let mut f = ShadowFile::create(&target, false).unwrap();
        f.write_record(&Record::new("a")).unwrap();
        assert!(target.exists());
        f.commit().unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{\"id\":\"a\"}\n");
    }

    #[test]
    fn stale_shadow_is_truncated() {
        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("00000_a.jsonl");
        std::fs::write(shadow_path(&target), "{\"id\":\"half").unwrap();

        let mut f = ShadowFile::create(&target, true).unwrap();
        f.write_record(&Record::new("b")).unwrap();
        f.commit().unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{\"id\":\"b\"}\n");
    }
}

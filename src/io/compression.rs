//! Transparent gzip handling, chosen from the file extension.
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};

use crate::error::Error;

/// `true` if the path ends in `.gz`.
pub fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

/// Open a file for line-oriented reading, decompressing it if needed.
///
/// Gzipped shards may be multi-member (concatenated gzip streams), so a [MultiGzDecoder] is used.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>, Error> {
    let file = File::open(path)?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A file being written, compressed or not.
///
/// [ShardFile::finish] has to be called to flush buffers and write the gzip trailer:
/// dropping a [ShardFile] swallows any error that happens at that point.
pub enum ShardFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl ShardFile {
    /// Create (or truncate) `path`, compressing if it ends in `.gz`.
    pub fn create(path: &Path) -> Result<Self, Error> {
        let file = BufWriter::new(File::create(path)?);
        if is_gzip(path) {
            Ok(ShardFile::Gzip(GzEncoder::new(file, Compression::default())))
        } else {
            Ok(ShardFile::Plain(file))
        }
    }

    /// Write `line` followed by a newline.
    pub fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.write_all(line.as_bytes())?;
        self.write_all(b"\n")
    }

    /// Flush everything and close the file.
    pub fn finish(self) -> std::io::Result<()> {
        let mut inner = match self {
            ShardFile::Plain(w) => w,
            ShardFile::Gzip(enc) => enc.finish()?,
        };
        inner.flush()?;
        inner.get_ref().sync_all()
    }
}

impl Write for ShardFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            ShardFile::Plain(w) => w.write(buf),
            ShardFile::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            ShardFile::Plain(w) => w.flush(),
            ShardFile::Gzip(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn gzip_is_detected_by_extension() {
        assert!(is_gzip(Path::new("documents/00000_wiki.jsonl.gz")));
        assert!(!is_gzip(Path::new("documents/00000_wiki.jsonl")));
        assert!(!is_gzip(Path::new("documents/gz")));
    }

    #[test]
    fn gzip_roundtrip() {
        let dst = tempfile::tempdir().unwrap();
        let path = dst.path().join("shard.jsonl.gz");

        let mut f = ShardFile::create(&path).unwrap();
        f.write_line(r#"{"id":"a"}"#).unwrap();
        f.write_line(r#"{"id":"b"}"#).unwrap();
        f.finish().unwrap();

        // really compressed
        let mut raw = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let lines: Vec<String> = open_reader(&path)
            .unwrap()
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec![r#"{"id":"a"}"#, r#"{"id":"b"}"#]);
    }

    #[test]
    fn plain_files_are_not_compressed() {
        let dst = tempfile::tempdir().unwrap();
        let path = dst.path().join("shard.jsonl");

        let mut f = ShardFile::create(&path).unwrap();
        f.write_line("hello").unwrap();
        f.finish().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn multi_member_gzip() {
        let dst = tempfile::tempdir().unwrap();
        let path = dst.path().join("concat.jsonl.gz");

        let mut bytes = Vec::new();
        for line in ["one\n", "two\n"] {
            let mut enc = GzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(line.as_bytes()).unwrap();
            bytes.extend(enc.finish().unwrap());
        }
        std::fs::write(&path, bytes).unwrap();

        let lines: Vec<String> = open_reader(&path)
            .unwrap()
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec!["one", "two"]);
    }
}

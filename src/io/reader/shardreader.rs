/*! Streaming shard reader.

Yields one decoded [Record] per non-blank line, along with its (0-based) line number so that callers can
report errors with a precise location.
!*/
use std::io::{BufRead, Lines};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::io::compression;
use crate::io::Record;

pub struct ShardReader {
    path: PathBuf,
    lines: Lines<Box<dyn BufRead + Send>>,
    line: usize,
}

impl ShardReader {
    /// Open a shard, decompressing it if its name ends in `.gz`.
    pub fn from_path(src: &Path) -> Result<Self, Error> {
        let reader = compression::open_reader(src)?;
        Ok(Self {
            path: src.to_path_buf(),
            lines: reader.lines(),
            line: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for ShardReader {
    /// `(line number, record)`.
    ///
    /// A line that is not a valid record yields an error for which [Error::is_decode] is `true`,
    /// and iteration can continue.
    /// Any other error comes from the underlying file and should be considered fatal.
    type Item = (usize, Result<Record, Error>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line_number = self.line;
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some((line_number, Err(Error::Io(e)))),
            };
            self.line += 1;

            if line.trim().is_empty() {
                continue;
            }

            return Some((line_number, Record::from_line(&line)));
        }
    }
}

/// Iterate over the records of a shard, stopping at the first error of any kind.
pub fn read_records(src: &Path) -> Result<impl Iterator<Item = Result<Record, Error>>, Error> {
    Ok(ShardReader::from_path(src)?.map(|(_, record)| record))
}

/*! Corpus path conventions.

A corpus root holds its shards in a `documents` sub-directory.
These helpers let callers pass either a bare corpus root or an already qualified path/glob.
!*/
use std::path::{Component, Path, PathBuf};

use itertools::Itertools;
use log::debug;

use crate::error::Error;

pub const DOCUMENTS_DIR: &str = "documents";
pub const DEFAULT_PATTERN: &str = "*.jsonl.gz";

fn is_documents_dir(path: &Path) -> bool {
    path.file_name().map_or(false, |n| n == DOCUMENTS_DIR)
}

fn has_glob_chars(s: &str) -> bool {
    s.contains(|c| matches!(c, '*' | '?' | '['))
}

/// Make sure an output path ends with `documents`.
pub fn dolma_output(output: &Path) -> PathBuf {
    if is_documents_dir(output) {
        output.to_path_buf()
    } else {
        output.join(DOCUMENTS_DIR)
    }
}

/// Turn an input location into a glob pattern over shards.
///
/// - an existing file, or a glob that matches something, is used as is;
/// - anything else is considered a corpus root (or its `documents` dir) and `pattern` is appended.
pub fn dolma_input(input: &str, pattern: Option<&str>) -> Result<String, Error> {
    let path = Path::new(input);
    if path.is_file() || (!path.is_dir() && has_glob_chars(input) && !expand(input)?.is_empty()) {
        return Ok(input.to_string());
    }

    let pattern = pattern.ok_or_else(|| {
        Error::Custom(format!(
            "a file pattern is needed when {} is neither a file nor a matching glob",
            input
        ))
    })?;
    let base = dolma_output(path);
    let resolved = base.join(pattern).to_string_lossy().into_owned();
    debug!("resolved input {} to {}", input, resolved);
    Ok(resolved)
}

/// Drop `.` components.
///
/// `glob` yields `corpus/x.jsonl.gz` for `./corpus/*.jsonl.gz`, so paths are compared in this form.
/// `./` alone becomes the empty path, which is a prefix of every relative path.
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// The longest leading part of a glob pattern that contains no wildcard, normalized.
///
/// `corpus/documents/**/*.jsonl.gz` -> `corpus/documents`
pub fn glob_root(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in Path::new(pattern).components() {
        if let Component::Normal(c) = component {
            if has_glob_chars(&c.to_string_lossy()) {
                return normalize(&root);
            }
        }
        root.push(component);
    }
    // a pattern without wildcard designates a single file
    root.parent().map(normalize).unwrap_or_default()
}

/// Expand a glob pattern into the files it matches, in walk order.
///
/// Directories and shadow files are left out.
pub fn expand(pattern: &str) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry?;
        if path.is_file() && !crate::io::writer::is_shadow(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

/// `path` relative to `root`, both being normalized first.
pub fn strip_root(path: &Path, root: &Path) -> Result<PathBuf, Error> {
    let path = normalize(path);
    let root = normalize(root);
    path.strip_prefix(&root)
        .map(Path::to_path_buf)
        .map_err(|_| Error::Custom(format!("{:?} is not located under {:?}", path, root)))
}

/// `path` relative to `root`, with `/` separators.
pub fn relative(path: &Path, root: &Path) -> Result<String, Error> {
    Ok(strip_root(path, root)?
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .join("/"))
}

//! Error enum
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Serde(serde_json::Error),
    Glob(glob::GlobError),
    GlobPattern(glob::PatternError),
    ThreadPool(rayon::ThreadPoolBuildError),
    /// The line is a bare JSON `null` rather than a record.
    NullRecord,
    /// The transform closure refused a record.
    Transform(String),
    /// The transform closure panicked while processing a shard.
    Panic { shard: PathBuf, message: String },
    /// A provenance map is internally inconsistent.
    Provenance(String),
    Custom(String),
}

impl Error {
    /// Build a [Error::Transform] from anything printable.
    pub fn transform<T: fmt::Display>(msg: T) -> Self {
        Self::Transform(msg.to_string())
    }

    /// `true` if the error comes from a line that could not be decoded as a record.
    ///
    /// These errors are recoverable at the record level.
    pub fn is_decode(&self) -> bool {
        match self {
            Error::Serde(e) => !e.is_io(),
            Error::NullRecord => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Serde(e) => write!(f, "serialization error: {}", e),
            Error::Glob(e) => write!(f, "glob error: {}", e),
            Error::GlobPattern(e) => write!(f, "invalid glob pattern: {}", e),
            Error::ThreadPool(e) => write!(f, "could not build worker pool: {}", e),
            Error::NullRecord => write!(f, "line is a JSON null"),
            Error::Transform(msg) => write!(f, "transform failed: {}", msg),
            Error::Panic { shard, message } => {
                write!(f, "transform panicked on {:?}: {}", shard, message)
            }
            Error::Provenance(msg) => write!(f, "provenance map error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Serde(e) => Some(e),
            Error::Glob(e) => Some(e),
            Error::GlobPattern(e) => Some(e),
            Error::ThreadPool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<glob::GlobError> for Error {
    fn from(e: glob::GlobError) -> Error {
        Error::Glob(e)
    }
}

impl From<glob::PatternError> for Error {
    fn from(e: glob::PatternError) -> Error {
        Error::GlobPattern(e)
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Error {
        Error::ThreadPool(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Serde(e)
    }
}

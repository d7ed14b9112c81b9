//! Error types for the memo cache

use std::fmt;
use std::path::PathBuf;

/// Failure to turn a value into bytes or back
#[derive(Debug)]
pub enum CodecError {
    Encode(String),
    Decode(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(msg) => write!(f, "Encode error: {}", msg),
            CodecError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

#[derive(Debug)]
pub enum CacheError {
    Io(Box<std::io::Error>),
    Codec(CodecError),
    /// A deletion target resolved outside the cache base directory
    ForbiddenPath(PathBuf),
    /// `clear_all` was asked to delete without an explicit file list
    MissingConfirmation,
    Config(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Codec(err) => write!(f, "Codec error: {}", err),
            CacheError::ForbiddenPath(path) => {
                write!(f, "Forbidden file path: {}", path.display())
            }
            CacheError::MissingConfirmation => {
                write!(f, "Must provide the file list to confirm")
            }
            CacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<CodecError> for CacheError {
    fn from(err: CodecError) -> Self {
        CacheError::Codec(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

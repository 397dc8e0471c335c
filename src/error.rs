//! Error types for asnlist.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache I/O error on {}: {source}", path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Prefix lookup for ASN {asn} failed: {reason}")]
    Fetch { asn: String, reason: String },

    #[error("Device connection error: {0}")]
    Connection(String),

    #[error("Device protocol error: {0}")]
    Protocol(String),

    #[error("No entry in list '{list}' tagged '{tag}' with address {address}")]
    EntryNotFound {
        list: String,
        tag: String,
        address: String,
    },
}

impl SyncError {
    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn fetch(asn: &str, reason: impl Into<String>) -> Self {
        Self::Fetch {
            asn: asn.to_string(),
            reason: reason.into(),
        }
    }

    /// The underlying I/O error kind for cache failures.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::CacheIo { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

//! Errors raised by cluster-state reads.

use std::path::PathBuf;
use thiserror::Error;

/// A read against cluster state failed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be decoded.
    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

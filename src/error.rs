//! Error taxonomy of the store.
//!
//! All failures are local and recoverable: they are returned to the calling
//! collaborator and never leave a half-applied Snapshot behind.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referenced service/profile (or profile file) does not exist.
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// Malformed mutator input (empty profile name, bad url, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Filesystem error during profile save/load.
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Profile file content is not a valid override map.
    #[error("cannot decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
}

impl StoreError {
    pub fn not_found(what: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            what,
            key: key.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    /// Status code the transport layer answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            StoreError::NotFound { .. } => 404,
            StoreError::Validation(_) => 400,
            StoreError::Io { .. } | StoreError::Decode { .. } => 500,
        }
    }

    /// Io and Decode are recovered the same way: the profile is unusable for now.
    pub fn is_profile_unusable(&self) -> bool {
        matches!(self, StoreError::Io { .. } | StoreError::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

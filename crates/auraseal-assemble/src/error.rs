//! Assembly error taxonomy.
//!
//! Part-level faults (timeouts, corrupt fetches) are handled inside the
//! assembler and never surface here; these errors are per-component verdicts.

use auraseal_core::PackageError;
use thiserror::Error;

/// Component-level assembly failures.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The manifest has no record for the requested path.
    #[error("unknown component {path:?}")]
    UnknownComponent {
        /// Requested component path.
        path: String,
    },

    /// More parts were lost than parity can rebuild.
    #[error("{path:?}: {missing} parts missing, parity tolerates {tolerable}")]
    InsufficientParts {
        /// Component path.
        path: String,
        /// Parts that could not be validated.
        missing: usize,
        /// Losses the parity budget tolerates.
        tolerable: usize,
    },

    /// The assembled bytes do not match the manifest seal. Never downgraded.
    #[error("{path:?}: assembled bytes do not match the manifest seal")]
    IntegrityMismatch {
        /// Component path.
        path: String,
    },

    /// The assembled byte count disagrees with the manifest record.
    #[error("{path:?}: assembled {got} bytes, manifest records {expected}")]
    SizeMismatch {
        /// Component path.
        path: String,
        /// Bytes assembled.
        got: u64,
        /// Bytes recorded.
        expected: u64,
    },

    /// Joining or decoding the validated parts failed even after repair.
    #[error("{path:?}: unpack failed: {source}")]
    Unpack {
        /// Component path.
        path: String,
        /// Underlying pipeline error.
        #[source]
        source: PackageError,
    },
}

impl AssemblyError {
    /// The component path this failure belongs to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::UnknownComponent { path }
            | Self::InsufficientParts { path, .. }
            | Self::IntegrityMismatch { path }
            | Self::SizeMismatch { path, .. }
            | Self::Unpack { path, .. } => path,
        }
    }
}

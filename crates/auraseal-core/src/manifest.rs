//! Immutable component manifest (fail closed).
//!
//! The manifest maps component paths to their integrity records. It is built
//! once at package time, persisted as JSON, and consumed read-only by every
//! downloading client — safe to share behind an `Arc` without locks.
//!
//! Parsing is strict: a record whose seal form disagrees with its recovery
//! reference, or whose part count is impossible, rejects the whole manifest
//! before any network activity can start.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::integrity::{IntegritySeal, SealError};
use crate::part::MAX_PARTS;

/// Manifest load/validation errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The document is not valid JSON of the manifest shape.
    #[error("manifest parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    /// A record's integrity seal string is malformed.
    #[error("malformed seal for {path:?}: {source}")]
    Seal {
        /// Component path.
        path: String,
        /// Underlying seal error.
        #[source]
        source: SealError,
    },

    /// A dual seal requires a recovery reference.
    #[error("{path:?} has a dual seal but no recovery reference")]
    MissingRecovery {
        /// Component path.
        path: String,
    },

    /// A single seal must not carry a recovery reference.
    #[error("{path:?} has a recovery reference but a single seal")]
    UnexpectedRecovery {
        /// Component path.
        path: String,
    },

    /// Part counts outside [1, 256] are impossible on the wire.
    #[error("{path:?} records {parts} parts, expected 1..={max}")]
    InvalidPartCount {
        /// Component path.
        path: String,
        /// Recorded part count.
        parts: u16,
        /// Maximum representable.
        max: usize,
    },
}

/// Paths of the primary and recovery representations of a component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRef {
    /// Path of the primary representation.
    pub primary: String,
    /// Path of the independently verifiable recovery representation.
    pub secondary: String,
}

/// Integrity record for one component.
#[derive(Clone, Debug)]
pub struct ComponentRecord {
    /// Parsed integrity seal.
    pub seal: IntegritySeal,
    /// Decompressed component size in bytes.
    pub size: u64,
    /// Data part count.
    pub parts: u16,
    /// Recovery reference; present exactly when the seal is dual.
    pub recovery: Option<RecoveryRef>,
}

/// Persisted record shape.
#[derive(Serialize, Deserialize)]
struct RawRecord {
    integrity: String,
    size: u64,
    parts: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recovery: Option<RecoveryRef>,
}

/// Immutable path → record mapping.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    components: BTreeMap<String, ComponentRecord>,
}

impl Manifest {
    /// Parse and validate a manifest document (fail closed).
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] on malformed JSON, a malformed seal, a
    /// seal/recovery disagreement, or an impossible part count.
    pub fn parse_str(input: &str) -> Result<Self, ManifestError> {
        let raw: BTreeMap<String, RawRecord> = serde_json::from_str(input)?;

        let mut components = BTreeMap::new();
        for (path, record) in raw {
            let seal =
                IntegritySeal::parse(&record.integrity).map_err(|source| ManifestError::Seal {
                    path: path.clone(),
                    source,
                })?;

            if record.parts == 0 || usize::from(record.parts) > MAX_PARTS {
                return Err(ManifestError::InvalidPartCount {
                    path,
                    parts: record.parts,
                    max: MAX_PARTS,
                });
            }
            if seal.is_dual() && record.recovery.is_none() {
                return Err(ManifestError::MissingRecovery { path });
            }
            if !seal.is_dual() && record.recovery.is_some() {
                return Err(ManifestError::UnexpectedRecovery { path });
            }

            components.insert(
                path,
                ComponentRecord {
                    seal,
                    size: record.size,
                    parts: record.parts,
                    recovery: record.recovery,
                },
            );
        }
        Ok(Self { components })
    }

    /// Serialize to the persisted JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        let raw: BTreeMap<&str, RawRecord> = self
            .components
            .iter()
            .map(|(path, record)| {
                (
                    path.as_str(),
                    RawRecord {
                        integrity: record.seal.to_string(),
                        size: record.size,
                        parts: record.parts,
                        recovery: record.recovery.clone(),
                    },
                )
            })
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    /// Look up one component's record.
    #[must_use]
    pub fn record(&self, path: &str) -> Option<&ComponentRecord> {
        self.components.get(path)
    }

    /// Iterate over (path, record) pairs in path order.
    pub fn components(&self) -> impl Iterator<Item = (&str, &ComponentRecord)> {
        self.components
            .iter()
            .map(|(path, record)| (path.as_str(), record))
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True when the manifest holds no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Accumulates records at package-build time.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    components: BTreeMap<String, ComponentRecord>,
}

impl ManifestBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component record under `path`; replaces an earlier entry.
    pub fn insert(&mut self, path: impl Into<String>, record: ComponentRecord) -> &mut Self {
        self.components.insert(path.into(), record);
        self
    }

    /// Freeze the builder into an immutable manifest.
    #[must_use]
    pub fn build(self) -> Manifest {
        Manifest {
            components: self.components,
        }
    }
}

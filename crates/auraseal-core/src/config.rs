//! Packaging configuration.

use serde::{Deserialize, Serialize};

use crate::error::PackageError;
use crate::part::{MAX_PARTS, MAX_PAYLOAD_LEN};

/// Packaging configuration.
///
/// Controls the part size bound, the parity budget, the per-part acceptance
/// threshold, and the component size guard.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Maximum payload bytes per part.
    ///
    /// Default: 5120 (the wire-format bound)
    pub max_part_size: usize,

    /// Parity parts generated per component.
    ///
    /// Default: 1
    pub parity_count: u8,

    /// Minimum health score at which a fetched part is accepted without
    /// triggering recovery.
    ///
    /// Default: 0.954
    pub min_coherence: f32,

    /// Maximum raw component size that can be packaged.
    ///
    /// Default: 64MB
    pub max_component_size: u64,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            max_part_size: MAX_PAYLOAD_LEN,
            parity_count: 1,
            min_coherence: 0.954,
            max_component_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl PackageConfig {
    /// Data parts needed for a compressed stream of `compressed_len` bytes.
    #[must_use]
    pub const fn data_parts_for(&self, compressed_len: usize) -> usize {
        if compressed_len == 0 {
            return 1;
        }
        compressed_len.div_ceil(self.max_part_size)
    }

    /// Largest compressed stream the part numbering can hold.
    #[must_use]
    pub const fn max_compressed_size(&self) -> usize {
        self.max_part_size * MAX_PARTS
    }

    /// Check the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::InvalidConfig`] when a field is out of range.
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.max_part_size == 0 || self.max_part_size > MAX_PAYLOAD_LEN {
            return Err(PackageError::InvalidConfig {
                reason: format!(
                    "max_part_size {} outside 1..={MAX_PAYLOAD_LEN}",
                    self.max_part_size
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.min_coherence) {
            return Err(PackageError::InvalidConfig {
                reason: format!("min_coherence {} outside [0, 1]", self.min_coherence),
            });
        }
        Ok(())
    }
}

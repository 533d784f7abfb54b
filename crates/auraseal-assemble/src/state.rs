//! Per-part state machine and assembly statistics.

use serde::{Deserialize, Serialize};

/// Lifecycle of one part during assembly.
///
/// `Pending → {Validated, Corrupt}`,
/// `Corrupt → Recovering → {Recovered, Unrecoverable}`,
/// `Recovered → Validated`. `Validated` and `Unrecoverable` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartPhase {
    /// Not yet fetched or still in flight.
    Pending,
    /// Accepted: structurally sound and above the acceptance threshold.
    Validated,
    /// Failed validation (timeout, checksum, crc, or health score).
    Corrupt,
    /// Reconstruction from siblings and parity is in progress.
    Recovering,
    /// Rebuilt from parity; promoted to `Validated` once adopted.
    Recovered,
    /// Losses exceeded the parity budget; the component has failed.
    Unrecoverable,
}

impl PartPhase {
    /// Whether the phase admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Validated | Self::Unrecoverable)
    }

    /// Whether the state machine admits `self → next`.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Validated)
                | (Self::Pending, Self::Corrupt)
                | (Self::Corrupt, Self::Recovering)
                | (Self::Recovering, Self::Recovered)
                | (Self::Recovering, Self::Unrecoverable)
                | (Self::Recovered, Self::Validated)
        )
    }
}

/// Counters across an assembler's lifetime.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssemblyStats {
    /// Part payloads fetched from the source.
    pub parts_fetched: u64,
    /// Parts accepted on first validation.
    pub parts_validated: u64,
    /// Parts that failed validation or timed out.
    pub parts_corrupt: u64,
    /// Parts rebuilt from parity.
    pub parts_recovered: u64,
    /// Parts lost beyond the parity budget.
    pub parts_unrecoverable: u64,
    /// Fetch attempts retried after a timeout.
    pub retries: u64,
    /// Component bytes assembled and verified.
    pub bytes_assembled: u64,
}

//! SHA-512 digests and `auraseal-sha512-…` integrity seals.
//!
//! One digest width is used at every layer of the system: SHA-512. Seals come
//! in two forms. A single seal carries the digest of a component's bytes. A
//! dual seal carries two digests — primary representation and an
//! independently verifiable recovery representation — and verification falls
//! back to the second digest when fallback bytes are supplied.
//!
//! The STANDARD base64 alphabet never contains `-`, so splitting a seal on
//! hyphens is unambiguous: three segments mean single form, four mean dual.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use sha2::{Digest, Sha512};
use thiserror::Error;

/// Seal scheme prefix: hyphen-joined `auraseal` and the digest name.
pub const SEAL_SCHEME: &str = "auraseal-sha512";

/// Digest width in bytes.
pub const DIGEST_LEN: usize = 64;

/// Seal parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SealError {
    /// The seal does not have 3 (single) or 4 (dual) hyphen-separated
    /// segments.
    #[error("seal has {got} segments, expected 3 or 4")]
    SegmentCount {
        /// Segments found.
        got: usize,
    },

    /// The seal does not start with the `auraseal-sha512` scheme.
    #[error("unknown seal scheme {found:?}")]
    UnknownScheme {
        /// Scheme prefix found.
        found: String,
    },

    /// A digest segment is not valid base64.
    #[error("digest segment {segment} is not valid base64")]
    InvalidBase64 {
        /// Zero-based digest segment index.
        segment: usize,
    },

    /// A decoded digest has the wrong width.
    #[error("digest segment {segment} decodes to {len} bytes, expected {expected}")]
    InvalidDigestLength {
        /// Zero-based digest segment index.
        segment: usize,
        /// Decoded length.
        len: usize,
        /// Expected length.
        expected: usize,
    },
}

/// SHA-512 of `bytes`.
#[must_use]
pub fn digest(bytes: &[u8]) -> [u8; DIGEST_LEN] {
    Sha512::digest(bytes).into()
}

/// A parsed integrity seal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegritySeal {
    /// Digest of the component bytes.
    Single([u8; DIGEST_LEN]),
    /// Digests of the primary and recovery representations.
    Dual {
        /// Digest of the primary representation.
        primary: [u8; DIGEST_LEN],
        /// Digest of the recovery representation.
        secondary: [u8; DIGEST_LEN],
    },
}

impl IntegritySeal {
    /// Seal the digest of `bytes` in single form.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self::Single(digest(bytes))
    }

    /// Seal primary and recovery representations in dual form.
    #[must_use]
    pub fn of_dual(primary: &[u8], secondary: &[u8]) -> Self {
        Self::Dual {
            primary: digest(primary),
            secondary: digest(secondary),
        }
    }

    /// True for the dual (primary + recovery) form.
    #[must_use]
    pub const fn is_dual(&self) -> bool {
        matches!(self, Self::Dual { .. })
    }

    /// Parse a seal string; segment count decides the form.
    ///
    /// # Errors
    ///
    /// Returns [`SealError`] for a wrong segment count, unknown scheme,
    /// invalid base64, or a digest of the wrong width.
    pub fn parse(seal: &str) -> Result<Self, SealError> {
        let segments: Vec<&str> = seal.split('-').collect();
        if segments.len() != 3 && segments.len() != 4 {
            return Err(SealError::SegmentCount {
                got: segments.len(),
            });
        }
        if segments[0] != "auraseal" || segments[1] != "sha512" {
            return Err(SealError::UnknownScheme {
                found: format!("{}-{}", segments[0], segments[1]),
            });
        }

        let first = decode_digest(segments[2], 0)?;
        if segments.len() == 3 {
            return Ok(Self::Single(first));
        }
        let second = decode_digest(segments[3], 1)?;
        Ok(Self::Dual {
            primary: first,
            secondary: second,
        })
    }

    /// Check candidate bytes against the seal.
    ///
    /// Single form: the candidate's digest must match. Dual form: the
    /// candidate is checked against the primary digest; on mismatch, the
    /// fallback bytes (when supplied) are checked against the secondary.
    #[must_use]
    pub fn verify(&self, candidate: &[u8], fallback: Option<&[u8]>) -> bool {
        match self {
            Self::Single(expected) => digest(candidate) == *expected,
            Self::Dual { primary, secondary } => {
                if digest(candidate) == *primary {
                    return true;
                }
                fallback.is_some_and(|bytes| digest(bytes) == *secondary)
            }
        }
    }
}

impl fmt::Display for IntegritySeal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(digest) => {
                write!(f, "{SEAL_SCHEME}-{}", BASE64_STANDARD.encode(digest))
            }
            Self::Dual { primary, secondary } => write!(
                f,
                "{SEAL_SCHEME}-{}-{}",
                BASE64_STANDARD.encode(primary),
                BASE64_STANDARD.encode(secondary)
            ),
        }
    }
}

impl std::str::FromStr for IntegritySeal {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn decode_digest(segment: &str, index: usize) -> Result<[u8; DIGEST_LEN], SealError> {
    let bytes = BASE64_STANDARD
        .decode(segment)
        .map_err(|_| SealError::InvalidBase64 { segment: index })?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| SealError::InvalidDigestLength {
            segment: index,
            len,
            expected: DIGEST_LEN,
        })
}

/// Render a single-form seal string for `bytes`.
#[must_use]
pub fn seal(bytes: &[u8]) -> String {
    IntegritySeal::of(bytes).to_string()
}

/// Render a dual-form seal string for primary and recovery representations.
#[must_use]
pub fn seal_dual(primary: &[u8], secondary: &[u8]) -> String {
    IntegritySeal::of_dual(primary, secondary).to_string()
}

/// Parse a seal string and check candidate bytes against it.
///
/// # Errors
///
/// Returns [`SealError`] when the seal string itself is malformed.
pub fn verify(seal: &str, candidate: &[u8], fallback: Option<&[u8]>) -> Result<bool, SealError> {
    Ok(IntegritySeal::parse(seal)?.verify(candidate, fallback))
}

//! Part delivery abstraction.
//!
//! Transport is an external collaborator: over HTTP the two methods map to
//! `GET /packages/{name}/parts/{n}` for data and the parity variant for
//! redundancy, but the assembler only ever sees this trait. [`MemorySource`]
//! is the in-process implementation used by tests and local installs, with
//! fault injection for exercising the recovery paths.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use auraseal_core::pipeline::PackagedComponent;
use parking_lot::RwLock;
use thiserror::Error;

/// Delivery failures for a single part fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source does not hold this part.
    #[error("part {part_number} of {component:?} not found")]
    NotFound {
        /// Component path.
        component: String,
        /// Requested part number.
        part_number: u8,
    },

    /// The source gave up waiting on its own transport.
    #[error("fetch timed out")]
    Timeout,

    /// The source is unreachable or refused the request.
    #[error("source unavailable: {reason}")]
    Unavailable {
        /// Why the fetch failed.
        reason: String,
    },
}

/// Asynchronous part delivery.
///
/// Implementations must be shareable across the assembler's part workers.
#[async_trait]
pub trait PartSource: Send + Sync {
    /// Fetch the wire bytes of data part `part_number`.
    async fn fetch_part(&self, component: &str, part_number: u8) -> Result<Vec<u8>, SourceError>;

    /// Fetch the wire bytes of parity part `parity_index`.
    async fn fetch_parity(&self, component: &str, parity_index: u8)
        -> Result<Vec<u8>, SourceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Slot {
    Data(u8),
    Parity(u8),
}

#[derive(Default)]
struct MemoryInner {
    parts: HashMap<(String, Slot), Vec<u8>>,
    timeouts: HashSet<(String, Slot)>,
    dropped: HashSet<(String, Slot)>,
}

/// In-memory [`PartSource`] with fault injection.
#[derive(Default)]
pub struct MemorySource {
    inner: RwLock<MemoryInner>,
}

impl MemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every part of a packaged component under `path`.
    pub fn insert_component(&self, path: &str, packaged: &PackagedComponent) {
        let mut inner = self.inner.write();
        for part in &packaged.parts {
            inner.parts.insert(
                (path.to_owned(), Slot::Data(part.part_number)),
                part.to_bytes(),
            );
        }
        for (index, part) in packaged.parity.iter().enumerate() {
            inner
                .parts
                .insert((path.to_owned(), Slot::Parity(index as u8)), part.to_bytes());
        }
    }

    /// Replace a data part's wire bytes (e.g. with corrupted ones).
    pub fn overwrite_part(&self, path: &str, part_number: u8, bytes: Vec<u8>) {
        self.inner
            .write()
            .parts
            .insert((path.to_owned(), Slot::Data(part_number)), bytes);
    }

    /// Flip one payload byte of a stored data part.
    pub fn corrupt_part(&self, path: &str, part_number: u8) {
        let mut inner = self.inner.write();
        if let Some(bytes) = inner
            .parts
            .get_mut(&(path.to_owned(), Slot::Data(part_number)))
        {
            // Offset past the header, into the payload.
            if bytes.len() > 256 {
                bytes[256] ^= 0xFF;
            }
        }
    }

    /// Make a data part unavailable.
    pub fn drop_part(&self, path: &str, part_number: u8) {
        self.inner
            .write()
            .dropped
            .insert((path.to_owned(), Slot::Data(part_number)));
    }

    /// Make a parity part unavailable.
    pub fn drop_parity(&self, path: &str, parity_index: u8) {
        self.inner
            .write()
            .dropped
            .insert((path.to_owned(), Slot::Parity(parity_index)));
    }

    /// Make every fetch of a data part report a timeout.
    pub fn timeout_part(&self, path: &str, part_number: u8) {
        self.inner
            .write()
            .timeouts
            .insert((path.to_owned(), Slot::Data(part_number)));
    }

    fn fetch(&self, component: &str, slot: Slot) -> Result<Vec<u8>, SourceError> {
        let key = (component.to_owned(), slot);
        let inner = self.inner.read();
        if inner.timeouts.contains(&key) {
            return Err(SourceError::Timeout);
        }
        if inner.dropped.contains(&key) {
            return Err(SourceError::NotFound {
                component: component.to_owned(),
                part_number: match slot {
                    Slot::Data(n) | Slot::Parity(n) => n,
                },
            });
        }
        inner
            .parts
            .get(&key)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                component: component.to_owned(),
                part_number: match slot {
                    Slot::Data(n) | Slot::Parity(n) => n,
                },
            })
    }
}

#[async_trait]
impl PartSource for MemorySource {
    async fn fetch_part(&self, component: &str, part_number: u8) -> Result<Vec<u8>, SourceError> {
        self.fetch(component, Slot::Data(part_number))
    }

    async fn fetch_parity(
        &self,
        component: &str,
        parity_index: u8,
    ) -> Result<Vec<u8>, SourceError> {
        self.fetch(component, Slot::Parity(parity_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auraseal_core::pipeline::package_component;
    use auraseal_core::PackageConfig;

    #[tokio::test]
    async fn roundtrip_through_memory_source() {
        let packaged = package_component(b"hello source", &PackageConfig::default()).unwrap();
        let source = MemorySource::new();
        source.insert_component("c", &packaged);

        let bytes = source.fetch_part("c", 0).await.unwrap();
        assert_eq!(bytes, packaged.parts[0].to_bytes());

        let parity = source.fetch_parity("c", 0).await.unwrap();
        assert_eq!(parity, packaged.parity[0].to_bytes());
    }

    #[tokio::test]
    async fn missing_parts_report_not_found() {
        let source = MemorySource::new();
        let result = source.fetch_part("c", 0).await;
        assert!(matches!(result, Err(SourceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn dropped_parts_report_not_found() {
        let packaged = package_component(b"droppable", &PackageConfig::default()).unwrap();
        let source = MemorySource::new();
        source.insert_component("c", &packaged);
        source.drop_part("c", 0);

        let result = source.fetch_part("c", 0).await;
        assert!(matches!(result, Err(SourceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn timed_out_parts_report_timeout() {
        let packaged = package_component(b"slow", &PackageConfig::default()).unwrap();
        let source = MemorySource::new();
        source.insert_component("c", &packaged);
        source.timeout_part("c", 0);

        let result = source.fetch_part("c", 0).await;
        assert!(matches!(result, Err(SourceError::Timeout)));
    }

    #[tokio::test]
    async fn corrupt_part_flips_payload_byte() {
        let packaged = package_component(b"corruptible bytes", &PackageConfig::default()).unwrap();
        let source = MemorySource::new();
        source.insert_component("c", &packaged);
        source.corrupt_part("c", 0);

        let bytes = source.fetch_part("c", 0).await.unwrap();
        assert_ne!(bytes, packaged.parts[0].to_bytes());
        // Header intact, payload touched.
        assert_eq!(&bytes[..256], &packaged.parts[0].to_bytes()[..256]);
    }
}

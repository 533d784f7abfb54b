//! Stateless packaging and recovery orchestration.
//!
//! Everything here operates on passed-in configuration and bytes; there is no
//! session object or global state. The producing side runs
//! encode → split → parity → seal in one call per component; the consuming
//! side uses [`recover_parts`] and [`unpack_component`] to rebuild missing
//! parts and recover the original bytes.

use crate::codec;
use crate::config::PackageConfig;
use crate::erasure;
use crate::error::{PackageError, PartError};
use crate::integrity::IntegritySeal;
use crate::manifest::{ComponentRecord, RecoveryRef};
use crate::part::{self, Part, PartKind};

/// Product of packaging one component.
#[derive(Clone, Debug)]
pub struct PackagedComponent {
    /// Ordered data parts.
    pub parts: Vec<Part>,
    /// Parity parts, in parity-index order.
    pub parity: Vec<Part>,
    /// Manifest record for the component.
    pub record: ComponentRecord,
}

impl PackagedComponent {
    /// Wire bytes for every part, data first, then parity.
    #[must_use]
    pub fn wire_parts(&self) -> Vec<Vec<u8>> {
        self.parts
            .iter()
            .chain(self.parity.iter())
            .map(Part::to_bytes)
            .collect()
    }
}

/// Package a component into sealed parts with a single-form seal.
///
/// # Errors
///
/// Returns [`PackageError`] for an invalid configuration, an oversized
/// component, or a stream that needs more parts than the format can number.
pub fn package_component(
    bytes: &[u8],
    config: &PackageConfig,
) -> Result<PackagedComponent, PackageError> {
    package_inner(bytes, IntegritySeal::of(bytes), None, config)
}

/// Package a component that also has an independently verifiable recovery
/// representation; the record carries a dual seal and the recovery reference.
///
/// # Errors
///
/// Returns [`PackageError`] as [`package_component`] does.
pub fn package_component_with_recovery(
    bytes: &[u8],
    secondary: &[u8],
    recovery: RecoveryRef,
    config: &PackageConfig,
) -> Result<PackagedComponent, PackageError> {
    package_inner(
        bytes,
        IntegritySeal::of_dual(bytes, secondary),
        Some(recovery),
        config,
    )
}

fn package_inner(
    bytes: &[u8],
    seal: IntegritySeal,
    recovery: Option<RecoveryRef>,
    config: &PackageConfig,
) -> Result<PackagedComponent, PackageError> {
    config.validate()?;
    if bytes.len() as u64 > config.max_component_size {
        return Err(PackageError::ComponentTooLarge {
            size: bytes.len() as u64,
            max: config.max_component_size,
        });
    }

    let encoded = codec::encode(bytes)?;
    let parts = part::split(
        &encoded.bytes,
        &encoded.table,
        bytes.len() as u64,
        config.max_part_size,
        config.parity_count,
    )?;

    let parity = if config.parity_count == 0 {
        Vec::new()
    } else {
        let shards: Vec<&[u8]> = parts.iter().map(|p| p.payload.as_slice()).collect();
        let parity_shards = erasure::generate_parity(&shards, config.parity_count)?;

        let template = parts.first().ok_or(PartError::Empty)?;
        let mut parity = Vec::with_capacity(parity_shards.len());
        for (index, shard) in parity_shards.into_iter().enumerate() {
            parity.push(Part::new(
                index as u8,
                template.total_parts,
                template.full_size,
                template.compressed_size,
                config.parity_count,
                PartKind::Parity { index: index as u8 },
                template.table.clone(),
                shard,
            )?);
        }
        parity
    };

    let record = ComponentRecord {
        seal,
        size: bytes.len() as u64,
        parts: parts.len() as u16,
        recovery,
    };

    Ok(PackagedComponent {
        parts,
        parity,
        record,
    })
}

/// Rebuild missing data parts from validated siblings and parity.
///
/// `available` may mix data and parity parts in any order; `missing` lists
/// the data part numbers to rebuild. `max_part_size` is the partitioning
/// bound both sides share — it determines each rebuilt part's exact size.
/// The rebuilt parts carry freshly computed checksums and a coherence of 1.0.
///
/// # Errors
///
/// Returns [`PackageError::Erasure`] when losses exceed the parity budget or
/// too few shards remain, and [`PackageError::Part`] when the available set
/// is empty or inconsistent.
pub fn recover_parts(
    available: &[Part],
    missing: &[u8],
    max_part_size: usize,
) -> Result<Vec<Part>, PackageError> {
    if missing.is_empty() {
        return Ok(Vec::new());
    }
    let template = available.first().ok_or(PartError::Empty)?;
    let data_count = usize::from(template.total_parts);

    let mut data_present: Vec<(u8, &[u8])> = Vec::new();
    let mut parity_present: Vec<(u8, &[u8])> = Vec::new();
    for part in available {
        if part.total_parts != template.total_parts
            || part.compressed_size != template.compressed_size
        {
            return Err(PartError::MetadataMismatch {
                field: "recovery group",
            }
            .into());
        }
        match part.kind {
            PartKind::Data => data_present.push((part.part_number, &part.payload)),
            PartKind::Parity { index } => parity_present.push((index, &part.payload)),
        }
    }

    let shards = erasure::reconstruct(
        &data_present,
        missing,
        &parity_present,
        data_count,
        template.parity_count,
    )?;

    let mut rebuilt = Vec::with_capacity(shards.len());
    for (number, mut shard) in shards {
        let true_size = part::data_part_size(
            template.compressed_size,
            template.total_parts,
            max_part_size,
            number,
        );
        shard.truncate(true_size);
        rebuilt.push(Part::new(
            number,
            template.total_parts,
            template.full_size,
            template.compressed_size,
            template.parity_count,
            PartKind::Data,
            template.table.clone(),
            shard,
        )?);
    }
    Ok(rebuilt)
}

/// Decode a complete, ordered set of data parts back into component bytes.
///
/// # Errors
///
/// Returns [`PackageError::Part`] for an incomplete or disordered set and
/// [`PackageError::Codec`] when the stream does not decode.
pub fn unpack_component(parts: &[Part]) -> Result<Vec<u8>, PackageError> {
    let first = parts.first().ok_or(PartError::Empty)?;
    let full_size = first.full_size;
    let table = first.table.clone();

    let compressed = part::join(parts)?;
    let bytes = codec::decode(&compressed, &table, full_size)?;
    if bytes.len() as u64 != full_size {
        return Err(PackageError::SizeMismatch {
            got: bytes.len() as u64,
            expected: full_size,
        });
    }
    Ok(bytes)
}

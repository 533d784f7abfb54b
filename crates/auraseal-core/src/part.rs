//! Part wire layout and partitioning.
//!
//! A part is a self-describing fragment of a component's compressed stream:
//! a 256-byte header, at most [`MAX_PAYLOAD_LEN`] payload bytes, and a
//! 128-byte footer. Every header embeds the component's full code table and
//! recovery block, so any single part is enough to learn the component's
//! geometry (part count, compressed and decompressed sizes, parity budget)
//! and to decode its own payload.
//!
//! All wire integers are little-endian.
//!
//! # Layout
//!
//! Header: magic (4), part number (1), total parts − 1 (1), full size (8),
//! nibble-packed code table (128), recovery block (64), payload length (2),
//! zero padding to 256. Recovery block: kind (1), parity count (1), parity
//! index (1), compressed size (8), zero padding to 64.
//!
//! Footer: digest tag (8, leading bytes of the payload's SHA-512), CRC-32
//! (4), coherence (4, f32), zero padding to 128.
//!
//! The `total parts` byte stores `count − 1` so the full range [1, 256]
//! stays representable.

use crate::codec::{CodeTable, PACKED_TABLE_LEN};
use crate::crc::crc32;
use crate::error::PartError;
use crate::integrity::{digest, DIGEST_LEN};

/// Header size in bytes.
pub const HEADER_LEN: usize = 256;

/// Footer size in bytes.
pub const FOOTER_LEN: usize = 128;

/// Maximum payload bytes per part.
pub const MAX_PAYLOAD_LEN: usize = 5120;

/// Maximum parts per component.
pub const MAX_PARTS: usize = 256;

/// Wire magic. The four bytes spell the project's hexspeak tag.
pub const MAGIC: [u8; 4] = [0xD1, 0x2A, 0x4C, 0x00];

/// Digest tag width in the footer.
pub const DIGEST_TAG_LEN: usize = 8;

const RECOVERY_OFFSET: usize = 6 + 8 + PACKED_TABLE_LEN; // 142
const PAYLOAD_LEN_OFFSET: usize = RECOVERY_OFFSET + 64; // 206
const MIN_WIRE_LEN: usize = HEADER_LEN + FOOTER_LEN;

/// Whether a part carries component data or derived parity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartKind {
    /// A fragment of the compressed stream.
    Data,
    /// A parity shard over the component's data parts.
    Parity {
        /// Zero-based index within the parity set.
        index: u8,
    },
}

impl PartKind {
    const fn wire_byte(self) -> u8 {
        match self {
            Self::Data => 0,
            Self::Parity { .. } => 1,
        }
    }

    const fn parity_index(self) -> u8 {
        match self {
            Self::Data => 0,
            Self::Parity { index } => index,
        }
    }
}

/// One distributable part of a component.
#[derive(Clone, Debug)]
pub struct Part {
    /// Part number: position in the compressed stream for data parts, the
    /// parity index for parity parts.
    pub part_number: u8,
    /// Data parts in the component, 1..=256.
    pub total_parts: u16,
    /// Decompressed size of the whole component.
    pub full_size: u64,
    /// Size of the whole compressed stream.
    pub compressed_size: u64,
    /// Parity parts backing the component.
    pub parity_count: u8,
    /// Data or parity.
    pub kind: PartKind,
    /// The component's canonical code table.
    pub table: CodeTable,
    /// Payload bytes (compressed fragment or parity shard).
    pub payload: Vec<u8>,
    /// SHA-512 of the payload.
    pub checksum: [u8; DIGEST_LEN],
    /// CRC-32 of the payload.
    pub crc: u32,
    /// Recorded health score in [0, 1]; 1.0 at package time.
    pub coherence: f32,
}

/// Wire-level agreement between recorded and recomputed payload checks.
#[derive(Clone, Copy, Debug)]
pub struct PartHealth {
    /// Footer digest tag matches the payload's SHA-512.
    pub digest_ok: bool,
    /// Footer CRC-32 matches the payload.
    pub crc_ok: bool,
    /// Coherence recorded in the footer.
    pub recorded_coherence: f32,
}

impl PartHealth {
    /// Health score: recorded coherence scaled by the structural checks
    /// (digest and CRC each weigh 0.5). Any failed check drops the score
    /// far below any sane acceptance threshold.
    #[must_use]
    pub fn score(&self) -> f32 {
        let structural =
            0.5 * f32::from(u8::from(self.digest_ok)) + 0.5 * f32::from(u8::from(self.crc_ok));
        self.recorded_coherence.clamp(0.0, 1.0) * structural
    }
}

impl Part {
    /// Assemble a part from its payload, computing checksum and CRC.
    ///
    /// # Errors
    ///
    /// Returns [`PartError::PayloadTooLarge`] when the payload exceeds
    /// [`MAX_PAYLOAD_LEN`], or [`PartError::PartNumberOutOfRange`] when the
    /// number does not fit the declared geometry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        part_number: u8,
        total_parts: u16,
        full_size: u64,
        compressed_size: u64,
        parity_count: u8,
        kind: PartKind,
        table: CodeTable,
        payload: Vec<u8>,
    ) -> Result<Self, PartError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PartError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        validate_numbering(part_number, total_parts, parity_count, kind)?;

        let checksum = digest(&payload);
        let crc = crc32(&payload);
        Ok(Self {
            part_number,
            total_parts,
            full_size,
            compressed_size,
            parity_count,
            kind,
            table,
            payload,
            checksum,
            crc,
            coherence: 1.0,
        })
    }

    /// Leading bytes of the payload's SHA-512, as stored in the footer.
    #[must_use]
    pub fn digest_tag(&self) -> [u8; DIGEST_TAG_LEN] {
        let mut tag = [0u8; DIGEST_TAG_LEN];
        tag.copy_from_slice(&self.checksum[..DIGEST_TAG_LEN]);
        tag
    }

    /// Serialize to the bit-exact wire form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len() + FOOTER_LEN];

        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.part_number;
        buf[5] = (self.total_parts - 1) as u8;
        buf[6..14].copy_from_slice(&self.full_size.to_le_bytes());
        buf[14..14 + PACKED_TABLE_LEN].copy_from_slice(&self.table.to_packed());

        let r = RECOVERY_OFFSET;
        buf[r] = self.kind.wire_byte();
        buf[r + 1] = self.parity_count;
        buf[r + 2] = self.kind.parity_index();
        buf[r + 3..r + 11].copy_from_slice(&self.compressed_size.to_le_bytes());

        buf[PAYLOAD_LEN_OFFSET..PAYLOAD_LEN_OFFSET + 2]
            .copy_from_slice(&(self.payload.len() as u16).to_le_bytes());

        buf[HEADER_LEN..HEADER_LEN + self.payload.len()].copy_from_slice(&self.payload);

        let f = HEADER_LEN + self.payload.len();
        buf[f..f + DIGEST_TAG_LEN].copy_from_slice(&self.digest_tag());
        buf[f + 8..f + 12].copy_from_slice(&self.crc.to_le_bytes());
        buf[f + 12..f + 16].copy_from_slice(&self.coherence.to_le_bytes());

        buf
    }

    /// Parse the wire form, recomputing payload checks.
    ///
    /// Structural problems (truncation, magic, geometry, embedded table) are
    /// errors; disagreement between recorded and recomputed payload checks is
    /// reported through the returned [`PartHealth`] so callers can score the
    /// part against their acceptance threshold.
    ///
    /// # Errors
    ///
    /// Returns [`PartError`] for any structural defect.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, PartHealth), PartError> {
        if bytes.len() < MIN_WIRE_LEN {
            return Err(PartError::Truncated {
                len: bytes.len(),
                min: MIN_WIRE_LEN,
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(PartError::BadMagic { found: magic });
        }

        let declared = u16::from_le_bytes([bytes[PAYLOAD_LEN_OFFSET], bytes[PAYLOAD_LEN_OFFSET + 1]])
            as usize;
        if declared > MAX_PAYLOAD_LEN {
            return Err(PartError::PayloadTooLarge {
                len: declared,
                max: MAX_PAYLOAD_LEN,
            });
        }
        let actual = bytes.len() - MIN_WIRE_LEN;
        if declared != actual {
            return Err(PartError::PayloadLengthMismatch { declared, actual });
        }

        let part_number = bytes[4];
        let total_parts = u16::from(bytes[5]) + 1;
        let full_size = u64::from_le_bytes(
            bytes[6..14]
                .try_into()
                .unwrap_or([0; 8]),
        );

        let mut packed = [0u8; PACKED_TABLE_LEN];
        packed.copy_from_slice(&bytes[14..14 + PACKED_TABLE_LEN]);
        let table =
            CodeTable::from_packed(&packed).map_err(|source| PartError::InvalidCodeTable { source })?;

        let r = RECOVERY_OFFSET;
        let parity_count = bytes[r + 1];
        let parity_index = bytes[r + 2];
        let kind = match bytes[r] {
            0 => PartKind::Data,
            1 => PartKind::Parity {
                index: parity_index,
            },
            value => return Err(PartError::InvalidKind { value }),
        };
        let compressed_size = u64::from_le_bytes(
            bytes[r + 3..r + 11]
                .try_into()
                .unwrap_or([0; 8]),
        );

        validate_numbering(part_number, total_parts, parity_count, kind)?;

        let payload = bytes[HEADER_LEN..HEADER_LEN + declared].to_vec();
        let f = HEADER_LEN + declared;
        let mut recorded_tag = [0u8; DIGEST_TAG_LEN];
        recorded_tag.copy_from_slice(&bytes[f..f + DIGEST_TAG_LEN]);
        let recorded_crc = u32::from_le_bytes(
            bytes[f + 8..f + 12]
                .try_into()
                .unwrap_or([0; 4]),
        );
        let recorded_coherence = f32::from_le_bytes(
            bytes[f + 12..f + 16]
                .try_into()
                .unwrap_or([0; 4]),
        );

        let checksum = digest(&payload);
        let crc = crc32(&payload);
        let health = PartHealth {
            digest_ok: checksum[..DIGEST_TAG_LEN] == recorded_tag,
            crc_ok: crc == recorded_crc,
            recorded_coherence,
        };

        Ok((
            Self {
                part_number,
                total_parts,
                full_size,
                compressed_size,
                parity_count,
                kind,
                table,
                payload,
                checksum,
                crc,
                coherence: recorded_coherence,
            },
            health,
        ))
    }

    /// Reject a part whose recorded payload checks disagree with its bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PartError::ChecksumMismatch`] or [`PartError::CrcMismatch`].
    pub fn verify_health(&self, health: &PartHealth) -> Result<(), PartError> {
        if !health.digest_ok {
            return Err(PartError::ChecksumMismatch {
                part_number: self.part_number,
            });
        }
        if !health.crc_ok {
            return Err(PartError::CrcMismatch {
                part_number: self.part_number,
            });
        }
        Ok(())
    }
}

fn validate_numbering(
    part_number: u8,
    total_parts: u16,
    parity_count: u8,
    kind: PartKind,
) -> Result<(), PartError> {
    match kind {
        PartKind::Data => {
            if u16::from(part_number) >= total_parts {
                return Err(PartError::PartNumberOutOfRange {
                    part_number,
                    total_parts,
                });
            }
        }
        PartKind::Parity { index } => {
            if part_number != index || index >= parity_count {
                return Err(PartError::PartNumberOutOfRange {
                    part_number,
                    total_parts: u16::from(parity_count),
                });
            }
        }
    }
    Ok(())
}

/// Slice a compressed stream into numbered data parts.
///
/// Every part except the last carries exactly `max_part_size` bytes; an empty
/// stream still emits one (empty) part so every component has a part to pin
/// its metadata to.
///
/// # Errors
///
/// Returns [`PartError::TooManyParts`] when the stream needs more than
/// [`MAX_PARTS`] parts.
pub fn split(
    compressed: &[u8],
    table: &CodeTable,
    full_size: u64,
    max_part_size: usize,
    parity_count: u8,
) -> Result<Vec<Part>, PartError> {
    let total = if compressed.is_empty() {
        1
    } else {
        compressed.len().div_ceil(max_part_size)
    };
    if total > MAX_PARTS {
        return Err(PartError::TooManyParts {
            needed: total,
            max: MAX_PARTS,
        });
    }

    let mut parts = Vec::with_capacity(total);
    for number in 0..total {
        let start = number * max_part_size;
        let end = usize::min(start + max_part_size, compressed.len());
        let payload = compressed[start..end].to_vec();
        parts.push(Part::new(
            number as u8,
            total as u16,
            full_size,
            compressed.len() as u64,
            parity_count,
            PartKind::Data,
            table.clone(),
            payload,
        )?);
    }
    Ok(parts)
}

/// Reassemble the compressed stream from data parts in `part_number` order.
///
/// # Errors
///
/// Returns [`PartError`] when parts are missing, out of order, or disagree
/// on component metadata.
pub fn join(parts: &[Part]) -> Result<Vec<u8>, PartError> {
    let first = parts.first().ok_or(PartError::Empty)?;
    if parts.len() != usize::from(first.total_parts) {
        return Err(PartError::MetadataMismatch {
            field: "total_parts",
        });
    }

    let mut compressed = Vec::with_capacity(first.compressed_size as usize);
    for (position, part) in parts.iter().enumerate() {
        if part.part_number != position as u8 {
            return Err(PartError::NonContiguous {
                expected: position as u8,
                got: part.part_number,
            });
        }
        if part.kind != PartKind::Data {
            return Err(PartError::MetadataMismatch { field: "kind" });
        }
        if part.total_parts != first.total_parts {
            return Err(PartError::MetadataMismatch {
                field: "total_parts",
            });
        }
        if part.compressed_size != first.compressed_size {
            return Err(PartError::MetadataMismatch {
                field: "compressed_size",
            });
        }
        if part.full_size != first.full_size {
            return Err(PartError::MetadataMismatch { field: "full_size" });
        }
        compressed.extend_from_slice(&part.payload);
    }

    if compressed.len() as u64 != first.compressed_size {
        return Err(PartError::MetadataMismatch {
            field: "compressed_size",
        });
    }
    Ok(compressed)
}

/// Exact payload size of data part `number`, derivable from any sibling's
/// header (all parts are `max_part_size` except the last).
#[must_use]
pub fn data_part_size(
    compressed_size: u64,
    total_parts: u16,
    max_part_size: usize,
    number: u8,
) -> usize {
    let full_parts = u64::from(total_parts) - 1;
    if u16::from(number) + 1 < total_parts {
        max_part_size
    } else {
        (compressed_size - full_parts * max_part_size as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    fn sample_part(payload: Vec<u8>) -> Part {
        let encoded = codec::encode(b"sample input for a table").unwrap();
        Part::new(
            0,
            2,
            24,
            u64::try_from(payload.len() * 2).unwrap(),
            1,
            PartKind::Data,
            encoded.table,
            payload,
        )
        .unwrap()
    }

    #[test]
    fn wire_roundtrip() {
        let part = sample_part(vec![1, 2, 3, 4, 5]);
        let bytes = part.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + 5 + FOOTER_LEN);

        let (parsed, health) = Part::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.part_number, part.part_number);
        assert_eq!(parsed.total_parts, part.total_parts);
        assert_eq!(parsed.full_size, part.full_size);
        assert_eq!(parsed.compressed_size, part.compressed_size);
        assert_eq!(parsed.parity_count, 1);
        assert_eq!(parsed.kind, PartKind::Data);
        assert_eq!(parsed.table, part.table);
        assert_eq!(parsed.payload, part.payload);
        assert_eq!(parsed.checksum, part.checksum);

        assert!(health.digest_ok);
        assert!(health.crc_ok);
        assert!((health.score() - 1.0).abs() < f32::EPSILON);
        parsed.verify_health(&health).unwrap();
    }

    #[test]
    fn header_bytes_at_fixed_offsets() {
        let part = sample_part(vec![0xAA; 16]);
        let bytes = part.to_bytes();

        assert_eq!(&bytes[0..4], &MAGIC);
        assert_eq!(bytes[4], 0); // part number
        assert_eq!(bytes[5], 1); // total parts - 1
        assert_eq!(&bytes[6..14], &24u64.to_le_bytes()); // full size
        assert_eq!(bytes[142], 0); // kind: data
        assert_eq!(bytes[143], 1); // parity count
        assert_eq!(&bytes[145..153], &32u64.to_le_bytes()); // compressed size
        assert_eq!(&bytes[206..208], &16u16.to_le_bytes()); // payload length
        assert!(bytes[208..256].iter().all(|&b| b == 0)); // reserved
    }

    #[test]
    fn truncated_rejected() {
        let result = Part::from_bytes(&[0u8; 100]);
        assert!(matches!(result, Err(PartError::Truncated { .. })));
    }

    #[test]
    fn bad_magic_rejected() {
        let part = sample_part(vec![1, 2, 3]);
        let mut bytes = part.to_bytes();
        bytes[0] = 0xFF;
        let result = Part::from_bytes(&bytes);
        assert!(matches!(result, Err(PartError::BadMagic { .. })));
    }

    #[test]
    fn payload_length_disagreement_rejected() {
        let part = sample_part(vec![1, 2, 3, 4]);
        let mut bytes = part.to_bytes();
        bytes[206] = 9; // declare 9 bytes, 4 present
        let result = Part::from_bytes(&bytes);
        assert!(matches!(
            result,
            Err(PartError::PayloadLengthMismatch {
                declared: 9,
                actual: 4
            })
        ));
    }

    #[test]
    fn tampered_payload_fails_health() {
        let part = sample_part(vec![7u8; 64]);
        let mut bytes = part.to_bytes();
        bytes[HEADER_LEN] ^= 0x01;

        let (parsed, health) = Part::from_bytes(&bytes).unwrap();
        assert!(!health.digest_ok);
        assert!(!health.crc_ok);
        assert!(health.score() < 0.954);
        assert!(matches!(
            parsed.verify_health(&health),
            Err(PartError::ChecksumMismatch { part_number: 0 })
        ));
    }

    #[test]
    fn oversized_payload_rejected() {
        let encoded = codec::encode(b"t").unwrap();
        let result = Part::new(
            0,
            1,
            1,
            1,
            0,
            PartKind::Data,
            encoded.table,
            vec![0u8; MAX_PAYLOAD_LEN + 1],
        );
        assert!(matches!(result, Err(PartError::PayloadTooLarge { .. })));
    }

    #[test]
    fn part_number_must_fit_total() {
        let encoded = codec::encode(b"t").unwrap();
        let result = Part::new(5, 3, 1, 1, 0, PartKind::Data, encoded.table, vec![1]);
        assert!(matches!(
            result,
            Err(PartError::PartNumberOutOfRange {
                part_number: 5,
                total_parts: 3
            })
        ));
    }

    #[test]
    fn parity_part_roundtrip() {
        let encoded = codec::encode(b"parity table source").unwrap();
        let part = Part::new(
            1,
            4,
            100,
            80,
            2,
            PartKind::Parity { index: 1 },
            encoded.table,
            vec![0x5A; 20],
        )
        .unwrap();

        let bytes = part.to_bytes();
        assert_eq!(bytes[142], 1); // kind: parity
        assert_eq!(bytes[144], 1); // parity index

        let (parsed, health) = Part::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.kind, PartKind::Parity { index: 1 });
        assert!(health.digest_ok);
    }

    #[test]
    fn split_and_join_roundtrip() {
        let compressed: Vec<u8> = (0..12_000u32).map(|i| (i % 251) as u8).collect();
        let table = codec::encode(b"abcdef").unwrap().table;

        let parts = split(&compressed, &table, 20_000, MAX_PAYLOAD_LEN, 1).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].payload.len(), MAX_PAYLOAD_LEN);
        assert_eq!(parts[1].payload.len(), MAX_PAYLOAD_LEN);
        assert_eq!(parts[2].payload.len(), 12_000 - 2 * MAX_PAYLOAD_LEN);

        let total_payload: usize = parts.iter().map(|p| p.payload.len()).sum();
        assert_eq!(total_payload, compressed.len());

        let rejoined = join(&parts).unwrap();
        assert_eq!(rejoined, compressed);
    }

    #[test]
    fn split_empty_stream_emits_one_part() {
        let table = CodeTable::empty();
        let parts = split(&[], &table, 0, MAX_PAYLOAD_LEN, 0).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].payload.is_empty());

        let rejoined = join(&parts).unwrap();
        assert!(rejoined.is_empty());
    }

    #[test]
    fn split_too_many_parts_rejected() {
        let compressed = vec![0u8; MAX_PAYLOAD_LEN * MAX_PARTS + 1];
        let table = CodeTable::empty();
        let result = split(&compressed, &table, 0, MAX_PAYLOAD_LEN, 0);
        assert!(matches!(
            result,
            Err(PartError::TooManyParts { needed: 257, .. })
        ));
    }

    #[test]
    fn join_rejects_gaps_and_disorder() {
        let compressed = vec![3u8; MAX_PAYLOAD_LEN * 2];
        let table = CodeTable::empty();
        let mut parts = split(&compressed, &table, 0, MAX_PAYLOAD_LEN, 0).unwrap();

        parts.swap(0, 1);
        assert!(matches!(
            join(&parts),
            Err(PartError::NonContiguous {
                expected: 0,
                got: 1
            })
        ));

        parts.swap(0, 1);
        parts.pop();
        assert!(matches!(
            join(&parts),
            Err(PartError::MetadataMismatch { .. })
        ));
    }

    #[test]
    fn join_empty_rejected() {
        assert!(matches!(join(&[]), Err(PartError::Empty)));
    }

    #[test]
    fn sibling_derived_part_sizes() {
        assert_eq!(data_part_size(12_000, 3, MAX_PAYLOAD_LEN, 0), MAX_PAYLOAD_LEN);
        assert_eq!(data_part_size(12_000, 3, MAX_PAYLOAD_LEN, 1), MAX_PAYLOAD_LEN);
        assert_eq!(data_part_size(12_000, 3, MAX_PAYLOAD_LEN, 2), 1760);
        assert_eq!(data_part_size(0, 1, MAX_PAYLOAD_LEN, 0), 0);
    }

    #[test]
    fn max_part_count_survives_wire_byte() {
        let encoded = codec::encode(b"x").unwrap();
        let part = Part::new(
            255,
            256,
            1,
            1,
            0,
            PartKind::Data,
            encoded.table,
            vec![1],
        )
        .unwrap();
        let bytes = part.to_bytes();
        assert_eq!(bytes[5], 255);

        let (parsed, _) = Part::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.total_parts, 256);
        assert_eq!(parsed.part_number, 255);
    }
}

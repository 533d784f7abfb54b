//! Property-based tests for the packaging pipeline.

use auraseal_core::codec;
use auraseal_core::integrity::{seal, seal_dual, verify};
use auraseal_core::part::{PartKind, MAX_PAYLOAD_LEN};
use auraseal_core::pipeline::{package_component, recover_parts, unpack_component};
use auraseal_core::PackageConfig;
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// decode(encode(b)) == b for arbitrary byte sequences, empty included.
    #[test]
    fn codec_roundtrip(input in prop_vec(any::<u8>(), 0..4096)) {
        let encoded = codec::encode(&input).unwrap();
        let decoded = codec::decode(&encoded.bytes, &encoded.table, input.len() as u64).unwrap();
        prop_assert_eq!(decoded, input);
    }

    /// The same distribution always yields the same bit-length table.
    #[test]
    fn codec_tables_deterministic(input in prop_vec(any::<u8>(), 1..2048)) {
        let a = codec::encode(&input).unwrap();
        let b = codec::encode(&input).unwrap();
        prop_assert_eq!(a.table, b.table);
        prop_assert_eq!(a.bytes, b.bytes);
    }

    /// Packaging preserves the stream exactly and respects part bounds.
    #[test]
    fn partition_invariants(input in prop_vec(any::<u8>(), 0..40_000)) {
        let config = PackageConfig::default();
        let packaged = package_component(&input, &config).unwrap();

        let payload_total: usize = packaged.parts.iter().map(|p| p.payload.len()).sum();
        let compressed_size = packaged.parts[0].compressed_size;
        prop_assert_eq!(payload_total as u64, compressed_size);
        prop_assert!(packaged.parts.len() <= 256);
        for part in &packaged.parts {
            prop_assert!(part.payload.len() <= MAX_PAYLOAD_LEN);
        }

        prop_assert_eq!(unpack_component(&packaged.parts).unwrap(), input);
    }

    /// Any loss pattern within the parity budget recovers byte-identically.
    #[test]
    fn erasure_recovery_within_budget(
        input in prop_vec(any::<u8>(), 12_000..30_000),
        loss_seed in any::<u64>(),
    ) {
        let config = PackageConfig { parity_count: 2, ..Default::default() };
        let packaged = package_component(&input, &config).unwrap();
        let total = packaged.parts.len();

        // Pick up to two distinct parts to lose.
        let first = (loss_seed % total as u64) as u8;
        let second = ((loss_seed >> 8) % total as u64) as u8;
        let mut missing = vec![first];
        if second != first {
            missing.push(second);
        }
        missing.sort_unstable();

        let mut available: Vec<_> = packaged
            .parts
            .iter()
            .filter(|p| !missing.contains(&p.part_number))
            .cloned()
            .collect();
        available.extend(packaged.parity.iter().cloned());

        let rebuilt = recover_parts(&available, &missing, config.max_part_size).unwrap();
        prop_assert_eq!(rebuilt.len(), missing.len());
        for part in &rebuilt {
            let original = &packaged.parts[part.part_number as usize];
            prop_assert_eq!(&part.payload, &original.payload);
            prop_assert_eq!(part.checksum, original.checksum);
            prop_assert_eq!(part.kind, PartKind::Data);
        }
    }

    /// Single seals accept exactly their own bytes.
    #[test]
    fn integrity_single_exactness(
        a in prop_vec(any::<u8>(), 0..256),
        b in prop_vec(any::<u8>(), 0..256),
    ) {
        let s = seal(&a);
        prop_assert!(verify(&s, &a, None).unwrap());
        if a != b {
            prop_assert!(!verify(&s, &b, None).unwrap());
        }
    }

    /// Dual seals accept the primary, and the fallback when the primary is
    /// corrupted.
    #[test]
    fn integrity_dual_fallback(
        primary in prop_vec(any::<u8>(), 1..256),
        secondary in prop_vec(any::<u8>(), 1..256),
        corrupted in prop_vec(any::<u8>(), 1..256),
    ) {
        let s = seal_dual(&primary, &secondary);
        prop_assert!(verify(&s, &primary, None).unwrap());
        if corrupted != primary {
            prop_assert!(verify(&s, &corrupted, Some(&secondary)).unwrap());
        }
    }
}

//! Systematic Reed-Solomon erasure coding over GF(2^8).
//!
//! Data shard `i` is interpreted as the value of a degree-<k polynomial at
//! field point `i` (one polynomial per byte position); parity shard `j` is
//! the same polynomial evaluated at point `k + j`. Any `k` of the `k + m`
//! shards therefore determine the polynomial and with it every data shard.
//! The field is GF(2^8) with the AES polynomial 0x11B; the group size `k + m`
//! is bounded by the field order, which matches the part-count bound of the
//! wire format.
//!
//! Shards inside one group are zero-padded to the longest member; callers
//! that track true shard sizes truncate after reconstruction.

use thiserror::Error;

/// Largest group (data + parity shards) one component may carry.
pub const MAX_GROUP: usize = 256;

/// Erasure coding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErasureError {
    /// No data shards were provided.
    #[error("cannot code an empty shard group")]
    EmptyGroup,

    /// Data + parity exceeds the field order.
    #[error("shard group of {data} data + {parity} parity exceeds maximum {max}")]
    GroupTooLarge {
        /// Data shard count.
        data: usize,
        /// Parity shard count.
        parity: usize,
        /// Maximum group size.
        max: usize,
    },

    /// The same shard index appeared twice.
    #[error("duplicate shard index {index}")]
    DuplicateShard {
        /// The duplicated index.
        index: u8,
    },

    /// A missing index does not belong to the data range.
    #[error("shard index {index} out of range for {data_count} data shards")]
    IndexOutOfRange {
        /// The offending index.
        index: u8,
        /// Number of data shards in the group.
        data_count: usize,
    },

    /// More shards are missing than parity can tolerate.
    #[error("{missing} shards missing, parity tolerates {tolerable}")]
    Unrecoverable {
        /// Number of missing data shards.
        missing: usize,
        /// Maximum tolerable losses.
        tolerable: usize,
    },

    /// Fewer than k shards remain in total, so the polynomial is
    /// underdetermined regardless of the parity budget.
    #[error("only {available} shards available, reconstruction needs {needed}")]
    InsufficientShards {
        /// Shards (data + parity) available.
        available: usize,
        /// Shards required.
        needed: usize,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// GF(2^8) arithmetic
// ─────────────────────────────────────────────────────────────────────────────

/// The AES irreducible polynomial (without the x^8 term).
const MODULUS: u16 = 0x11B;

/// Discrete log/antilog tables for the generator 0x03, antilog doubled so
/// `exp[log a + log b]` never needs a reduction.
struct GfTables {
    exp: [u8; 510],
    log: [u8; 256],
}

const TABLES: GfTables = build_tables();

const fn build_tables() -> GfTables {
    let mut exp = [0u8; 510];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        // x := x * 0x03 = (x << 1 mod poly) ^ x
        let mut doubled = x << 1;
        if doubled & 0x100 != 0 {
            doubled ^= MODULUS;
        }
        x = doubled ^ x;
        i += 1;
    }
    let mut j = 255;
    while j < 510 {
        exp[j] = exp[j - 255];
        j += 1;
    }
    GfTables { exp, log }
}

/// Multiplication in GF(2^8).
#[inline]
#[must_use]
pub fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    TABLES.exp[TABLES.log[a as usize] as usize + TABLES.log[b as usize] as usize]
}

/// Multiplicative inverse; 0 maps to 0 (not a field element for division).
#[inline]
#[must_use]
pub fn gf_inv(a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    TABLES.exp[255 - TABLES.log[a as usize] as usize]
}

/// Division: `a / b = a * b^(-1)`.
#[inline]
#[must_use]
pub fn gf_div(a: u8, b: u8) -> u8 {
    gf_mul(a, gf_inv(b))
}

/// Lagrange basis coefficients for evaluating at `x` a polynomial known at
/// the distinct points `xs`:
/// `coeff_i = Π_{j≠i} (x ⊕ xs[j]) / (xs[i] ⊕ xs[j])`
/// (addition and subtraction are both XOR in GF(2^8)).
fn lagrange_basis_at(xs: &[u8], x: u8) -> Vec<u8> {
    let mut coeffs = Vec::with_capacity(xs.len());
    for (i, &x_i) in xs.iter().enumerate() {
        let mut basis = 1u8;
        for (j, &x_j) in xs.iter().enumerate() {
            if i != j {
                basis = gf_mul(basis, gf_div(x ^ x_j, x_i ^ x_j));
            }
        }
        coeffs.push(basis);
    }
    coeffs
}

/// Byte length every shard in the group is padded to.
fn group_width<'a, I>(shards: I) -> usize
where
    I: IntoIterator<Item = &'a [u8]>,
{
    shards.into_iter().map(<[u8]>::len).max().unwrap_or(0)
}

fn shard_byte(shard: &[u8], pos: usize) -> u8 {
    shard.get(pos).copied().unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Generate `parity_count` parity shards over `data` shards.
///
/// Parity shards all have the group width (the longest data shard's length);
/// shorter data shards contribute zero padding.
///
/// # Errors
///
/// Returns [`ErasureError::EmptyGroup`] for no data shards and
/// [`ErasureError::GroupTooLarge`] when `data.len() + parity_count` exceeds
/// the field order.
pub fn generate_parity(data: &[&[u8]], parity_count: u8) -> Result<Vec<Vec<u8>>, ErasureError> {
    let k = data.len();
    let m = parity_count as usize;
    if k == 0 {
        return Err(ErasureError::EmptyGroup);
    }
    if k + m > MAX_GROUP {
        return Err(ErasureError::GroupTooLarge {
            data: k,
            parity: m,
            max: MAX_GROUP,
        });
    }
    if m == 0 {
        return Ok(Vec::new());
    }

    let width = group_width(data.iter().copied());
    let xs: Vec<u8> = (0..k).map(|i| i as u8).collect();

    let mut parity = Vec::with_capacity(m);
    for j in 0..m {
        let x = (k + j) as u8;
        let coeffs = lagrange_basis_at(&xs, x);
        let mut shard = vec![0u8; width];
        for (coeff, source) in coeffs.iter().zip(data.iter()) {
            if *coeff == 0 {
                continue;
            }
            for (pos, out) in shard.iter_mut().enumerate() {
                *out ^= gf_mul(*coeff, shard_byte(source, pos));
            }
        }
        parity.push(shard);
    }
    Ok(parity)
}

/// Reconstruct missing data shards from present data and parity shards.
///
/// `data_present` pairs data indices with their shard bytes, `parity` pairs
/// parity indices (0-based within the parity set) with theirs. `data_count`
/// is k, `parity_count` the configured tolerance m. Returns the rebuilt
/// shards in ascending index order, each padded to the group width.
///
/// Reconstruction is deterministic: the k lowest available field points are
/// always the interpolation basis, so identical inputs yield byte-identical
/// output. An empty `missing` returns immediately with no work.
///
/// # Errors
///
/// - [`ErasureError::Unrecoverable`] when more shards are missing than parity
///   tolerates
/// - [`ErasureError::InsufficientShards`] when fewer than k shards remain
///   (e.g. all parity lost alongside a data shard)
/// - Validation errors for duplicate or out-of-range indices
pub fn reconstruct(
    data_present: &[(u8, &[u8])],
    missing: &[u8],
    parity: &[(u8, &[u8])],
    data_count: usize,
    parity_count: u8,
) -> Result<Vec<(u8, Vec<u8>)>, ErasureError> {
    if missing.is_empty() {
        return Ok(Vec::new());
    }
    if data_count == 0 {
        return Err(ErasureError::EmptyGroup);
    }
    if missing.len() > parity_count as usize {
        return Err(ErasureError::Unrecoverable {
            missing: missing.len(),
            tolerable: parity_count as usize,
        });
    }

    let mut seen = [false; MAX_GROUP];
    for &(index, _) in data_present {
        if (index as usize) >= data_count {
            return Err(ErasureError::IndexOutOfRange {
                index,
                data_count,
            });
        }
        if seen[index as usize] {
            return Err(ErasureError::DuplicateShard { index });
        }
        seen[index as usize] = true;
    }
    for &index in missing {
        if (index as usize) >= data_count {
            return Err(ErasureError::IndexOutOfRange {
                index,
                data_count,
            });
        }
        if seen[index as usize] {
            return Err(ErasureError::DuplicateShard { index });
        }
        seen[index as usize] = true;
    }

    // Collect available points: data at x = index, parity at x = k + index.
    let mut points: Vec<(u8, &[u8])> = Vec::with_capacity(data_present.len() + parity.len());
    points.extend(data_present.iter().copied());
    for &(index, shard) in parity {
        let x = data_count + index as usize;
        if x >= MAX_GROUP {
            return Err(ErasureError::GroupTooLarge {
                data: data_count,
                parity: index as usize + 1,
                max: MAX_GROUP,
            });
        }
        if seen[x] {
            return Err(ErasureError::DuplicateShard { index });
        }
        seen[x] = true;
        points.push((x as u8, shard));
    }

    if points.len() < data_count {
        return Err(ErasureError::InsufficientShards {
            available: points.len(),
            needed: data_count,
        });
    }

    // Deterministic basis: the k lowest available field points.
    points.sort_by_key(|&(x, _)| x);
    points.truncate(data_count);

    let width = group_width(points.iter().map(|&(_, s)| s));
    let xs: Vec<u8> = points.iter().map(|&(x, _)| x).collect();

    let mut sorted_missing: Vec<u8> = missing.to_vec();
    sorted_missing.sort_unstable();

    let mut rebuilt = Vec::with_capacity(sorted_missing.len());
    for &target in &sorted_missing {
        let coeffs = lagrange_basis_at(&xs, target);
        let mut shard = vec![0u8; width];
        for (coeff, &(_, source)) in coeffs.iter().zip(points.iter()) {
            if *coeff == 0 {
                continue;
            }
            for (pos, out) in shard.iter_mut().enumerate() {
                *out ^= gf_mul(*coeff, shard_byte(source, pos));
            }
        }
        rebuilt.push((target, shard));
    }
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────────────────
    // Field tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn gf_mul_known_value() {
        // AES test vector: 0x57 * 0x83 = 0xC1.
        assert_eq!(gf_mul(0x57, 0x83), 0xC1);
    }

    #[test]
    fn gf_mul_identity_and_zero() {
        assert_eq!(gf_mul(42, 1), 42);
        assert_eq!(gf_mul(42, 0), 0);
        assert_eq!(gf_mul(0, 42), 0);
    }

    #[test]
    fn gf_mul_commutative() {
        assert_eq!(gf_mul(0x53, 0xCA), gf_mul(0xCA, 0x53));
    }

    #[test]
    fn gf_inv_property() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "inverse failed for {a}");
        }
    }

    #[test]
    fn gf_div_reverses_mul() {
        let product = gf_mul(42, 17);
        assert_eq!(gf_div(product, 17), 42);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Parity and reconstruction
    // ─────────────────────────────────────────────────────────────────────────

    fn sample_shards() -> Vec<Vec<u8>> {
        vec![
            (0..32u8).collect(),
            (32..64u8).collect(),
            (64..96u8).collect(),
            (96..128u8).collect(),
        ]
    }

    fn as_refs(shards: &[Vec<u8>]) -> Vec<&[u8]> {
        shards.iter().map(Vec::as_slice).collect()
    }

    #[test]
    fn basis_at_known_point_selects_that_shard() {
        // Evaluating at an interpolation point gives coefficient 1 there and
        // 0 elsewhere.
        let xs = [0u8, 1, 2, 3];
        let coeffs = lagrange_basis_at(&xs, 2);
        assert_eq!(coeffs, vec![0, 0, 1, 0]);
    }

    #[test]
    fn parity_count_zero_is_empty() {
        let shards = sample_shards();
        let parity = generate_parity(&as_refs(&shards), 0).unwrap();
        assert!(parity.is_empty());
    }

    #[test]
    fn empty_group_rejected() {
        let result = generate_parity(&[], 2);
        assert!(matches!(result, Err(ErasureError::EmptyGroup)));
    }

    #[test]
    fn group_too_large_rejected() {
        let shard = vec![0u8; 4];
        let shards: Vec<&[u8]> = (0..250).map(|_| shard.as_slice()).collect();
        let result = generate_parity(&shards, 10);
        assert!(matches!(result, Err(ErasureError::GroupTooLarge { .. })));
    }

    #[test]
    fn empty_missing_is_noop() {
        let shards = sample_shards();
        let refs: Vec<(u8, &[u8])> = shards
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u8, s.as_slice()))
            .collect();
        let rebuilt = reconstruct(&refs, &[], &[], 4, 2).unwrap();
        assert!(rebuilt.is_empty());
    }

    #[test]
    fn every_loss_pattern_within_tolerance_recovers() {
        let shards = sample_shards();
        let parity = generate_parity(&as_refs(&shards), 2).unwrap();

        // All single and double losses of 4 data shards.
        let mut patterns: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i]).collect();
        for a in 0..4u8 {
            for b in (a + 1)..4 {
                patterns.push(vec![a, b]);
            }
        }

        for missing in patterns {
            let present: Vec<(u8, &[u8])> = shards
                .iter()
                .enumerate()
                .filter(|(i, _)| !missing.contains(&(*i as u8)))
                .map(|(i, s)| (i as u8, s.as_slice()))
                .collect();
            let parity_refs: Vec<(u8, &[u8])> = parity
                .iter()
                .enumerate()
                .map(|(i, s)| (i as u8, s.as_slice()))
                .collect();

            let rebuilt = reconstruct(&present, &missing, &parity_refs, 4, 2).unwrap();
            assert_eq!(rebuilt.len(), missing.len(), "pattern {missing:?}");
            for (index, shard) in rebuilt {
                assert_eq!(shard, shards[index as usize], "shard {index}");
            }
        }
    }

    #[test]
    fn losses_beyond_tolerance_fail_deterministically() {
        let shards = sample_shards();
        let parity = generate_parity(&as_refs(&shards), 2).unwrap();

        let present: Vec<(u8, &[u8])> = vec![(3, shards[3].as_slice())];
        let parity_refs: Vec<(u8, &[u8])> = parity
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u8, s.as_slice()))
            .collect();

        let result = reconstruct(&present, &[0, 1, 2], &parity_refs, 4, 2);
        assert!(matches!(
            result,
            Err(ErasureError::Unrecoverable {
                missing: 3,
                tolerable: 2
            })
        ));
    }

    #[test]
    fn all_parity_lost_cannot_cover_a_data_loss() {
        let shards = sample_shards();

        let present: Vec<(u8, &[u8])> = shards
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, s)| (i as u8, s.as_slice()))
            .collect();

        let result = reconstruct(&present, &[0], &[], 4, 2);
        assert!(matches!(
            result,
            Err(ErasureError::InsufficientShards {
                available: 3,
                needed: 4
            })
        ));
    }

    #[test]
    fn reconstruction_is_deterministic() {
        let shards = sample_shards();
        let parity = generate_parity(&as_refs(&shards), 2).unwrap();

        let present: Vec<(u8, &[u8])> = vec![(1, shards[1].as_slice()), (3, shards[3].as_slice())];
        let parity_refs: Vec<(u8, &[u8])> = parity
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u8, s.as_slice()))
            .collect();

        let first = reconstruct(&present, &[0, 2], &parity_refs, 4, 2).unwrap();
        let second = reconstruct(&present, &[0, 2], &parity_refs, 4, 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn uneven_shards_recover_with_padding() {
        let shards: Vec<Vec<u8>> = vec![vec![7u8; 16], vec![9u8; 16], vec![5u8; 10]];
        let refs = as_refs(&shards);
        let parity = generate_parity(&refs, 1).unwrap();
        assert_eq!(parity[0].len(), 16);

        let present: Vec<(u8, &[u8])> = vec![(0, shards[0].as_slice()), (1, shards[1].as_slice())];
        let parity_refs: Vec<(u8, &[u8])> = vec![(0, parity[0].as_slice())];

        let rebuilt = reconstruct(&present, &[2], &parity_refs, 3, 1).unwrap();
        let (index, shard) = &rebuilt[0];
        assert_eq!(*index, 2);

        // Rebuilt at group width; true content survives, tail is padding.
        let mut expected = vec![5u8; 10];
        expected.resize(16, 0);
        assert_eq!(*shard, expected);
    }

    #[test]
    fn duplicate_indices_rejected() {
        let shards = sample_shards();
        let present: Vec<(u8, &[u8])> = vec![(1, shards[1].as_slice()), (1, shards[1].as_slice())];
        let result = reconstruct(&present, &[0], &[], 4, 1);
        assert!(matches!(result, Err(ErasureError::DuplicateShard { index: 1 })));
    }

    #[test]
    fn missing_index_out_of_range_rejected() {
        let shards = sample_shards();
        let present: Vec<(u8, &[u8])> = shards
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u8, s.as_slice()))
            .collect();
        let result = reconstruct(&present, &[9], &[], 4, 1);
        assert!(matches!(
            result,
            Err(ErasureError::IndexOutOfRange { index: 9, .. })
        ));
    }
}

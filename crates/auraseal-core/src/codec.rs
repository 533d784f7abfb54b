//! Canonical Huffman codec.
//!
//! Compression uses a canonical prefix code: the optimal code tree is built
//! with the classic two-lowest-frequency merge, then discarded — only the
//! per-symbol bit lengths survive, canonically reassigned in order of
//! (bit length, symbol). That makes the whole table reconstructible from
//! lengths alone, and 256 lengths of at most 15 bits nibble-pack into the
//! 128-byte header field every part carries.
//!
//! Tree construction works on an arena of index-addressed nodes; no node
//! holds a pointer to another.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::bitio::{BitReader, BitWriter};
use crate::error::CodecError;

/// Size of the byte alphabet.
pub const SYMBOL_COUNT: usize = 256;

/// Maximum canonical code length: lengths must fit in a nibble.
pub const MAX_CODE_LEN: u8 = 15;

/// Packed table size: 256 lengths at 4 bits each.
pub const PACKED_TABLE_LEN: usize = 128;

/// Canonical code table: one bit length per byte symbol, 0 meaning absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeTable {
    lengths: [u8; SYMBOL_COUNT],
}

/// A compressed stream together with the table that decodes it.
#[derive(Clone, Debug)]
pub struct Encoded {
    /// Compressed bits, zero-padded to a whole byte.
    pub bytes: Vec<u8>,
    /// Exact number of meaningful bits in `bytes`.
    pub bit_len: u64,
    /// Code table used to produce the stream.
    pub table: CodeTable,
}

/// Arena node for tree construction.
struct TreeNode {
    weight: u64,
    symbol: Option<u8>,
    left: Option<usize>,
    right: Option<usize>,
}

impl CodeTable {
    /// Table with no symbols (encodes only the empty stream).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lengths: [0; SYMBOL_COUNT],
        }
    }

    /// Build a table from raw per-symbol lengths.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidLength`] if any length exceeds
    /// [`MAX_CODE_LEN`], or [`CodecError::InvalidTable`] if the lengths
    /// oversubscribe the code space.
    pub fn from_lengths(lengths: [u8; SYMBOL_COUNT]) -> Result<Self, CodecError> {
        for (symbol, &length) in lengths.iter().enumerate() {
            if length > MAX_CODE_LEN {
                return Err(CodecError::InvalidLength {
                    symbol: symbol as u8,
                    length,
                    max: MAX_CODE_LEN,
                });
            }
        }
        let table = Self { lengths };
        table.check_kraft()?;
        Ok(table)
    }

    /// Build the optimal length-limited table for a frequency distribution.
    ///
    /// Frequencies are rescaled (`f/2 + 1`) and the tree rebuilt whenever the
    /// optimal tree would exceed [`MAX_CODE_LEN`]; with a uniform table the
    /// depth is 8, so the loop always terminates.
    #[must_use]
    pub fn from_frequencies(frequencies: &[u64; SYMBOL_COUNT]) -> Self {
        let mut freqs = *frequencies;
        loop {
            let lengths = optimal_lengths(&freqs);
            let max = lengths.iter().copied().max().unwrap_or(0);
            if max <= MAX_CODE_LEN {
                return Self { lengths };
            }
            for f in &mut freqs {
                if *f > 0 {
                    *f = *f / 2 + 1;
                }
            }
        }
    }

    /// Per-symbol bit lengths.
    #[must_use]
    pub const fn lengths(&self) -> &[u8; SYMBOL_COUNT] {
        &self.lengths
    }

    /// Bit length of one symbol (0 if absent).
    #[must_use]
    pub const fn len_of(&self, symbol: u8) -> u8 {
        self.lengths[symbol as usize]
    }

    /// Number of symbols with a code.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.lengths.iter().filter(|&&l| l > 0).count()
    }

    /// True when no symbol has a code.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lengths.iter().all(|&l| l == 0)
    }

    /// Nibble-pack the lengths: symbol `2i` in the high nibble of byte `i`.
    #[must_use]
    pub fn to_packed(&self) -> [u8; PACKED_TABLE_LEN] {
        let mut packed = [0u8; PACKED_TABLE_LEN];
        for (i, slot) in packed.iter_mut().enumerate() {
            *slot = (self.lengths[2 * i] << 4) | (self.lengths[2 * i + 1] & 0x0F);
        }
        packed
    }

    /// Rebuild a table from its nibble-packed form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidTable`] if the lengths oversubscribe the
    /// code space. Individual nibbles cannot exceed [`MAX_CODE_LEN`].
    pub fn from_packed(packed: &[u8; PACKED_TABLE_LEN]) -> Result<Self, CodecError> {
        let mut lengths = [0u8; SYMBOL_COUNT];
        for (i, &byte) in packed.iter().enumerate() {
            lengths[2 * i] = byte >> 4;
            lengths[2 * i + 1] = byte & 0x0F;
        }
        let table = Self { lengths };
        table.check_kraft()?;
        Ok(table)
    }

    /// Canonical codes ordered by (length, symbol), as a balanced map for
    /// O(log n) lookup during encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidTable`] if canonical assignment overflows
    /// a code length (the lengths were not a valid prefix code).
    pub fn codes(&self) -> Result<BTreeMap<u8, (u16, u8)>, CodecError> {
        let mut bl_count = [0u32; MAX_CODE_LEN as usize + 1];
        for &len in &self.lengths {
            bl_count[len as usize] += 1;
        }
        bl_count[0] = 0;

        let mut next_code = [0u32; MAX_CODE_LEN as usize + 2];
        let mut code = 0u32;
        for len in 1..=MAX_CODE_LEN as usize {
            code = (code + bl_count[len - 1]) << 1;
            next_code[len] = code;
        }

        let mut codes = BTreeMap::new();
        for symbol in 0..SYMBOL_COUNT {
            let len = self.lengths[symbol];
            if len == 0 {
                continue;
            }
            let assigned = next_code[len as usize];
            if assigned >= 1u32 << len {
                return Err(CodecError::InvalidTable);
            }
            next_code[len as usize] += 1;
            codes.insert(symbol as u8, (assigned as u16, len));
        }
        Ok(codes)
    }

    /// Kraft inequality check, scaled to avoid fractions: an overfull code
    /// space means the lengths cannot describe a prefix code.
    fn check_kraft(&self) -> Result<(), CodecError> {
        let mut space = 0u64;
        for &len in &self.lengths {
            if len > 0 {
                space += 1u64 << (MAX_CODE_LEN - len);
            }
        }
        if space > 1u64 << MAX_CODE_LEN {
            return Err(CodecError::InvalidTable);
        }
        Ok(())
    }
}

/// Optimal (unrestricted) code lengths via two-lowest-frequency merges over
/// an index-addressed arena.
fn optimal_lengths(frequencies: &[u64; SYMBOL_COUNT]) -> [u8; SYMBOL_COUNT] {
    let mut lengths = [0u8; SYMBOL_COUNT];
    let mut arena: Vec<TreeNode> = Vec::new();
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();

    for (symbol, &weight) in frequencies.iter().enumerate() {
        if weight == 0 {
            continue;
        }
        let idx = arena.len();
        arena.push(TreeNode {
            weight,
            symbol: Some(symbol as u8),
            left: None,
            right: None,
        });
        heap.push(Reverse((weight, idx)));
    }

    match heap.len() {
        0 => return lengths,
        1 => {
            // A one-symbol alphabet still needs a 1-bit code.
            if let Some(Reverse((_, idx))) = heap.pop() {
                if let Some(symbol) = arena[idx].symbol {
                    lengths[symbol as usize] = 1;
                }
            }
            return lengths;
        }
        _ => {}
    }

    while heap.len() > 1 {
        let Some(Reverse((w1, i1))) = heap.pop() else {
            break;
        };
        let Some(Reverse((w2, i2))) = heap.pop() else {
            break;
        };
        let idx = arena.len();
        arena.push(TreeNode {
            weight: w1 + w2,
            symbol: None,
            left: Some(i1),
            right: Some(i2),
        });
        heap.push(Reverse((w1 + w2, idx)));
    }

    // Depth-first walk over indices; leaf depth is the code length.
    if let Some(Reverse((_, root))) = heap.pop() {
        let mut stack = vec![(root, 0u8)];
        while let Some((idx, depth)) = stack.pop() {
            let node = &arena[idx];
            if let Some(symbol) = node.symbol {
                lengths[symbol as usize] = depth.max(1);
                continue;
            }
            if let Some(left) = node.left {
                stack.push((left, depth.saturating_add(1)));
            }
            if let Some(right) = node.right {
                stack.push((right, depth.saturating_add(1)));
            }
        }
    }
    lengths
}

/// Compress `bytes` into a canonical-Huffman bitstream.
///
/// Empty input produces an empty bitstream with an empty table.
///
/// # Errors
///
/// Returns [`CodecError::InvalidTable`] only if canonical assignment fails,
/// which cannot happen for a table built from the input's own frequencies.
pub fn encode(bytes: &[u8]) -> Result<Encoded, CodecError> {
    if bytes.is_empty() {
        return Ok(Encoded {
            bytes: Vec::new(),
            bit_len: 0,
            table: CodeTable::empty(),
        });
    }

    let mut frequencies = [0u64; SYMBOL_COUNT];
    for &b in bytes {
        frequencies[b as usize] += 1;
    }

    let table = CodeTable::from_frequencies(&frequencies);
    let codes = table.codes()?;

    let mut writer = BitWriter::new();
    for &b in bytes {
        // Every input byte has a nonzero frequency, so a code exists.
        if let Some(&(code, len)) = codes.get(&b) {
            writer.write_bits(u32::from(code), len);
        }
    }

    let bit_len = writer.bit_len();
    Ok(Encoded {
        bytes: writer.into_bytes(),
        bit_len,
        table,
    })
}

/// Decode exactly `output_len` symbols from a canonical-Huffman bitstream.
///
/// Trailing pad bits beyond the last symbol are ignored.
///
/// # Errors
///
/// - [`CodecError::EmptyTable`] when symbols are requested from an empty table
/// - [`CodecError::Corrupt`] when a bit sequence matches no code
/// - [`CodecError::Truncated`] when the stream ends early
pub fn decode(bytes: &[u8], table: &CodeTable, output_len: u64) -> Result<Vec<u8>, CodecError> {
    if output_len == 0 {
        return Ok(Vec::new());
    }
    if table.is_empty() {
        return Err(CodecError::EmptyTable {
            expected: output_len,
        });
    }

    // Canonical decode structures: per length, the first code, the number of
    // codes, and the offset into the (length, symbol)-sorted symbol list.
    let mut bl_count = [0u32; MAX_CODE_LEN as usize + 1];
    let mut symbols: Vec<u8> = Vec::with_capacity(table.symbol_count());
    for len in 1..=MAX_CODE_LEN {
        for symbol in 0..SYMBOL_COUNT {
            if table.lengths[symbol] == len {
                symbols.push(symbol as u8);
                bl_count[len as usize] += 1;
            }
        }
    }

    let mut first_code = [0u32; MAX_CODE_LEN as usize + 1];
    let mut offset = [0u32; MAX_CODE_LEN as usize + 1];
    let mut code = 0u32;
    let mut seen = 0u32;
    for len in 1..=MAX_CODE_LEN as usize {
        code = (code + bl_count[len - 1]) << 1;
        first_code[len] = code;
        offset[len] = seen;
        seen += bl_count[len];
    }

    let mut reader = BitReader::new(bytes);
    let mut out = Vec::with_capacity(output_len as usize);

    while (out.len() as u64) < output_len {
        let start = reader.position();
        let mut acc = 0u32;
        let mut len = 0u8;
        loop {
            let Some(bit) = reader.read_bit() else {
                return Err(CodecError::Truncated {
                    decoded: out.len() as u64,
                    expected: output_len,
                });
            };
            acc = (acc << 1) | u32::from(bit);
            len += 1;

            let count = bl_count[len as usize];
            if count > 0 && acc >= first_code[len as usize] && acc < first_code[len as usize] + count
            {
                let idx = offset[len as usize] + (acc - first_code[len as usize]);
                out.push(symbols[idx as usize]);
                break;
            }

            if len >= MAX_CODE_LEN {
                return Err(CodecError::Corrupt { bit_offset: start });
            }
        }
    }

    Ok(out)
}

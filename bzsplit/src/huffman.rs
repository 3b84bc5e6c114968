//! Canonical Huffman decode tables.
//!
//! A block carries up to six tables, each described only by per-symbol code
//! lengths; the codes themselves are canonical (codes of equal length are
//! consecutive, and each length's first code is the previous length's last
//! code plus one, shifted left). Decoding therefore needs just three small
//! arrays per table: the highest code value at each length (`limit`), a
//! per-length offset into the symbol permutation (`base`), and the symbols
//! ordered by length (`perm`).

use crate::{MAX_ALPHA_SIZE, MAX_CODE_LEN};
use bzsplit_core::bitstream::BitReader;
use bzsplit_core::error::{BzError, Result};
use std::io::Read;

/// One Huffman group's decode tables.
#[derive(Debug, Clone)]
pub(crate) struct HuffmanTable {
    /// Highest code value at each length; codes above it are longer.
    limit: [i32; MAX_CODE_LEN + 2],
    /// `first_code[len] - first_perm_index[len]`, so that
    /// `perm[code - base[len]]` is the decoded symbol.
    base: [i32; MAX_CODE_LEN + 2],
    /// Symbols in order of increasing code length, ascending within a length.
    perm: Vec<u16>,
    min_len: u32,
    max_len: u32,
}

impl HuffmanTable {
    /// Build the decode tables from per-symbol code lengths.
    ///
    /// Lengths must already be in `1..=MAX_CODE_LEN`; the canonical code
    /// derived from them must fit its bit width at every length.
    pub(crate) fn from_lengths(lengths: &[u8]) -> Result<Self> {
        if lengths.is_empty() || lengths.len() > MAX_ALPHA_SIZE {
            return Err(BzError::table_malformed("bad alphabet size"));
        }
        let min_len = u32::from(lengths.iter().min().copied().unwrap_or(1));
        let max_len = u32::from(lengths.iter().max().copied().unwrap_or(1));
        if min_len < 1 || max_len as usize > MAX_CODE_LEN {
            return Err(BzError::table_malformed("code length out of range"));
        }

        let mut perm = Vec::with_capacity(lengths.len());
        for len in min_len..=max_len {
            for (sym, &l) in lengths.iter().enumerate() {
                if u32::from(l) == len {
                    perm.push(sym as u16);
                }
            }
        }

        let mut count = [0i32; MAX_CODE_LEN + 2];
        for &l in lengths {
            count[l as usize] += 1;
        }

        let mut limit = [0i32; MAX_CODE_LEN + 2];
        let mut base = [0i32; MAX_CODE_LEN + 2];
        let mut code = 0i32; // first code of the current length
        let mut index = 0i32; // perm index of that code's symbol
        for len in min_len..=max_len {
            let n = count[len as usize];
            base[len as usize] = code - index;
            limit[len as usize] = code + n - 1;
            if limit[len as usize] >= 1i32 << len {
                return Err(BzError::table_malformed("canonical code overflows its length"));
            }
            index += n;
            code = (code + n) << 1;
        }

        Ok(Self {
            limit,
            base,
            perm,
            min_len,
            max_len,
        })
    }

    /// Decode one symbol, bit-serially.
    #[inline]
    pub(crate) fn decode<R: Read>(&self, bits: &mut BitReader<R>) -> Result<u16> {
        let mut len = self.min_len;
        let mut code = bits.read_bits(len)? as i32;
        while code > self.limit[len as usize] {
            len += 1;
            if len > self.max_len {
                return Err(BzError::stream_corrupted("Huffman code longer than table maximum"));
            }
            code = (code << 1) | i32::from(bits.read_bit()?);
        }
        let index = code - self.base[len as usize];
        if index < 0 || index as usize >= self.perm.len() {
            return Err(BzError::stream_corrupted("Huffman code outside symbol permutation"));
        }
        Ok(self.perm[index as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Canonical codes recomputed independently of the decode tables.
    fn canonical_codes(lengths: &[u8]) -> Vec<(u32, u8)> {
        let max = *lengths.iter().max().unwrap();
        let mut count = vec![0u32; max as usize + 2];
        for &l in lengths {
            count[l as usize] += 1;
        }
        let mut first = vec![0u32; max as usize + 2];
        for len in 1..=max as usize {
            first[len + 1] = (first[len] + count[len]) << 1;
        }
        let mut next = first.clone();
        lengths
            .iter()
            .map(|&l| {
                let code = next[l as usize];
                next[l as usize] += 1;
                (code, l)
            })
            .collect()
    }

    /// Pack MSB-first codes into bytes.
    fn pack(codes: &[(u32, u8)]) -> Vec<u8> {
        let mut bits = Vec::new();
        for &(code, len) in codes {
            for i in (0..len).rev() {
                bits.push((code >> i) & 1);
            }
        }
        while bits.len() % 8 != 0 {
            bits.push(0);
        }
        bits.chunks(8)
            .map(|c| c.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
            .collect()
    }

    #[test]
    fn test_roundtrip_all_symbols() {
        // Mixed-length canonical table
        let lengths = [2u8, 2, 3, 3, 3, 4, 4];
        let table = HuffmanTable::from_lengths(&lengths).unwrap();

        let codes = canonical_codes(&lengths);
        let encoded = pack(&codes);
        let mut reader = BitReader::new(Cursor::new(encoded));
        for sym in 0..lengths.len() {
            assert_eq!(table.decode(&mut reader).unwrap() as usize, sym);
        }
    }

    #[test]
    fn test_roundtrip_uniform_lengths() {
        // All symbols the same length: codes are just the symbol indices
        let lengths = [3u8; 5];
        let table = HuffmanTable::from_lengths(&lengths).unwrap();
        let codes: Vec<(u32, u8)> = (0..5).map(|s| (s, 3)).collect();
        let mut reader = BitReader::new(Cursor::new(pack(&codes)));
        for sym in 0..5u16 {
            assert_eq!(table.decode(&mut reader).unwrap(), sym);
        }
    }

    #[test]
    fn test_roundtrip_skewed() {
        // 1, 2, 3, ... deeply skewed lengths
        let lengths = [1u8, 2, 3, 4, 5, 6, 7, 7];
        let table = HuffmanTable::from_lengths(&lengths).unwrap();
        let codes = canonical_codes(&lengths);
        let encoded = pack(&codes);
        let mut reader = BitReader::new(Cursor::new(encoded));
        for sym in 0..lengths.len() {
            assert_eq!(table.decode(&mut reader).unwrap() as usize, sym);
        }
    }

    #[test]
    fn test_overfull_table_rejected() {
        // Nine 3-bit codes cannot exist
        let lengths = [3u8; 9];
        assert!(matches!(
            HuffmanTable::from_lengths(&lengths),
            Err(BzError::TableMalformed { .. })
        ));
    }

    #[test]
    fn test_zero_length_rejected() {
        let lengths = [0u8, 2, 2];
        assert!(HuffmanTable::from_lengths(&lengths).is_err());
    }

    #[test]
    fn test_garbage_bits_detected() {
        // Incomplete code set: code 0b111... is not assigned
        let lengths = [2u8, 2, 2];
        let table = HuffmanTable::from_lengths(&lengths).unwrap();
        let mut reader = BitReader::new(Cursor::new(vec![0xFF, 0xFF, 0xFF, 0xFF]));
        assert!(table.decode(&mut reader).is_err());
    }
}

//! Per-block parsing: header fields, symbol map, selectors, code lengths,
//! and the MTF+RLE symbol stream.
//!
//! The main decode loop turns the Huffman symbol stream back into the
//! block-sorted byte array (`ll8`) together with a per-byte frequency table
//! (`unzftab`). Runs of the most-recent symbol arrive as `RUNA`/`RUNB`
//! pairs in bijective base 2; every other symbol is a move-to-front index
//! into the compacted alphabet.

use crate::huffman::HuffmanTable;
use crate::{BASE_BLOCK_SIZE, GROUP_SIZE, MAX_SELECTORS};
use bzsplit_core::bitstream::BitReader;
use bzsplit_core::error::{BzError, Result};
use std::io::Read;

/// Run-length symbol contributing `n` to the current run.
const RUN_A: u16 = 0;
/// Run-length symbol contributing `2n` to the current run.
const RUN_B: u16 = 1;

/// One parsed block, held in buffers that are reused across blocks.
#[derive(Debug)]
pub(crate) struct Block {
    /// Stored CRC of the block's decompressed output.
    pub stored_crc: u32,
    /// Whether the block was dithered by the old randomization scheme.
    pub randomised: bool,
    /// Index of the unrotated row in the sorted rotation order.
    pub orig_ptr: usize,
    /// Block-sorted data, one byte per decoded symbol run element.
    pub ll8: Vec<u8>,
    /// Frequency of each byte value in `ll8`.
    pub unzftab: [u32; 256],
    /// Cumulative frequencies; scratch for the transition-table fill.
    pub cftab: [u32; 257],
    /// Transition table: `tt[i]` is the predecessor walk index.
    pub tt: Vec<u32>,
    /// Index of the final byte in `ll8`.
    pub last: usize,
}

impl Block {
    pub(crate) fn new() -> Self {
        Self {
            stored_crc: 0,
            randomised: false,
            orig_ptr: 0,
            ll8: Vec::new(),
            unzftab: [0; 256],
            cftab: [0; 257],
            tt: Vec::new(),
            last: 0,
        }
    }

    /// Drop the large buffers. The block is unusable afterwards.
    pub(crate) fn release(&mut self) {
        self.ll8 = Vec::new();
        self.tt = Vec::new();
    }

    /// Parse one block body, starting just after the 48-bit block marker.
    pub(crate) fn read_from<R: Read>(
        &mut self,
        bits: &mut BitReader<R>,
        block_size_100k: usize,
    ) -> Result<()> {
        self.stored_crc = bits.read_u32()?;
        self.randomised = bits.read_bit()?;
        self.orig_ptr = bits.read_bits(24)? as usize;

        // Symbol mapping: a 16-bit coarse bitmap selects which 16-value
        // ranges are present, each followed by its own 16-bit fine bitmap.
        let mut seq_to_unseq = [0u8; 256];
        let n_in_use = {
            let coarse = bits.read_bits(16)? as u16;
            let mut n = 0usize;
            for i in 0..16 {
                if coarse & (0x8000 >> i) != 0 {
                    let fine = bits.read_bits(16)? as u16;
                    for j in 0..16 {
                        if fine & (0x8000 >> j) != 0 {
                            seq_to_unseq[n] = (i * 16 + j) as u8;
                            n += 1;
                        }
                    }
                }
            }
            n
        };
        if n_in_use == 0 {
            return Err(BzError::stream_corrupted("no byte values in use"));
        }
        let alpha_size = n_in_use + 2;

        let n_groups = bits.read_bits(3)? as usize;
        if !(2..=6).contains(&n_groups) {
            return Err(BzError::table_malformed(format!(
                "{n_groups} Huffman groups"
            )));
        }
        let n_selectors = bits.read_bits(15)? as usize;
        if !(1..=MAX_SELECTORS).contains(&n_selectors) {
            return Err(BzError::table_malformed(format!(
                "{n_selectors} selectors"
            )));
        }

        // Selectors are unary-coded MTF positions over the group list.
        let mut selectors = Vec::with_capacity(n_selectors);
        let mut group_mtf: [u8; 6] = [0, 1, 2, 3, 4, 5];
        for _ in 0..n_selectors {
            let mut j = 0usize;
            while bits.read_bit()? {
                j += 1;
                if j >= n_groups {
                    return Err(BzError::table_malformed("selector exceeds group count"));
                }
            }
            let group = group_mtf[j];
            group_mtf.copy_within(0..j, 1);
            group_mtf[0] = group;
            selectors.push(group);
        }

        // Per-group code lengths, delta-coded from a 5-bit starting value.
        let mut tables = Vec::with_capacity(n_groups);
        let mut lengths = vec![0u8; alpha_size];
        for _ in 0..n_groups {
            let mut curr = bits.read_bits(5)? as i32;
            for len in lengths.iter_mut() {
                loop {
                    if !(1..=20).contains(&curr) {
                        return Err(BzError::table_malformed(format!(
                            "code length {curr}"
                        )));
                    }
                    if !bits.read_bit()? {
                        break;
                    }
                    curr += if bits.read_bit()? { -1 } else { 1 };
                }
                *len = curr as u8;
            }
            tables.push(HuffmanTable::from_lengths(&lengths)?);
        }

        // The symbol stream proper.
        let limit = block_size_100k * BASE_BLOCK_SIZE;
        self.ll8.clear();
        self.unzftab = [0; 256];

        let mut groups = GroupCursor::new(&tables, &selectors);
        let mut mtf: [u8; 256] = std::array::from_fn(|i| i as u8);
        let eob = (n_in_use + 1) as u16;

        let mut sym = groups.next(bits)?;
        while sym != eob {
            if sym == RUN_A || sym == RUN_B {
                // Bijective base-2 run length over the front symbol.
                let mut run = 0usize;
                let mut n = 1usize;
                loop {
                    match sym {
                        RUN_A => run += n,
                        RUN_B => run += n << 1,
                        _ => break,
                    }
                    n <<= 1;
                    // The longest legitimate run is the block size itself.
                    if n > 2 * 1024 * 1024 {
                        return Err(BzError::stream_corrupted("run length out of range"));
                    }
                    sym = groups.next(bits)?;
                }
                let byte = seq_to_unseq[mtf[0] as usize];
                if self.ll8.len() + run > limit {
                    return Err(BzError::block_overrun(limit));
                }
                self.unzftab[byte as usize] += run as u32;
                self.ll8.resize(self.ll8.len() + run, byte);
            } else {
                if self.ll8.len() >= limit {
                    return Err(BzError::block_overrun(limit));
                }
                let j = sym as usize - 1;
                let front = mtf[j];
                // Small moves dominate; keep them scalar and block-move the rest.
                if j <= 16 {
                    for k in (1..=j).rev() {
                        mtf[k] = mtf[k - 1];
                    }
                } else {
                    mtf.copy_within(0..j, 1);
                }
                mtf[0] = front;
                let byte = seq_to_unseq[front as usize];
                self.unzftab[byte as usize] += 1;
                self.ll8.push(byte);
                sym = groups.next(bits)?;
            }
        }

        if self.ll8.is_empty() {
            return Err(BzError::stream_corrupted("empty block"));
        }
        self.last = self.ll8.len() - 1;
        if self.orig_ptr > self.last {
            return Err(BzError::stream_corrupted("origin pointer out of range"));
        }
        Ok(())
    }
}

/// Hands out Huffman symbols, switching tables every [`GROUP_SIZE`] symbols
/// according to the selector list.
struct GroupCursor<'a> {
    tables: &'a [HuffmanTable],
    selectors: &'a [u8],
    group_no: usize,
    remaining: usize,
}

impl<'a> GroupCursor<'a> {
    fn new(tables: &'a [HuffmanTable], selectors: &'a [u8]) -> Self {
        Self {
            tables,
            selectors,
            group_no: 0,
            remaining: 0,
        }
    }

    #[inline]
    fn next<R: Read>(&mut self, bits: &mut BitReader<R>) -> Result<u16> {
        if self.remaining == 0 {
            if self.group_no >= self.selectors.len() {
                return Err(BzError::table_malformed("selector list exhausted"));
            }
            self.group_no += 1;
            self.remaining = GROUP_SIZE;
        }
        self.remaining -= 1;
        let table = &self.tables[self.selectors[self.group_no - 1] as usize];
        table.decode(bits)
    }
}

//! Resumable raw DEFLATE decoding (RFC 1951).
//!
//! [`DecompressionContext`] keeps everything it has produced, so a stream can be
//! fed in pieces that each end on a block boundary, and a context can be cloned to
//! try several continuations from the same history.

mod bit_reader;
mod huffman;

use thiserror::Error;

use bit_reader::BitReader;
use huffman::Huffman;

/// Largest back-reference distance DEFLATE can express.
pub const WINDOW_SIZE: usize = 32 * 1024;

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

const DISTANCE_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const MAX_LITERAL_CODES: usize = 286;
const MAX_DISTANCE_CODES: usize = 30;
const END_OF_BLOCK: u16 = 256;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InflateError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("reserved block type")]
    InvalidBlockType,

    #[error("stored block length does not match its complement")]
    StoredLengthMismatch,

    #[error("too many length or distance codes")]
    TooManyCodes,

    #[error("invalid Huffman code lengths")]
    InvalidCodeLengths,

    #[error("invalid symbol")]
    InvalidSymbol,

    #[error("distance {distance} reaches before the {available} bytes of history")]
    DistanceTooFar { distance: usize, available: usize },

    #[error("output limit exceeded")]
    OutputLimit,

    #[error("stream already ended")]
    AlreadyFinished,
}

/// Why an [`DecompressionContext::inflate`] call returned successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Input ran out exactly at a block boundary; more blocks may follow.
    BlockBoundary,
    /// A final block ended.
    StreamEnd,
}

/// Decoder state between blocks, plus all output produced so far.
///
/// Cloning yields an independent context: the history is copied, not shared.
#[derive(Debug, Clone, Default)]
pub struct DecompressionContext {
    history: Vec<u8>,
    finished: bool,
}

impl DecompressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            history: Vec::with_capacity(capacity),
            finished: false,
        }
    }

    /// Everything decoded so far.
    #[inline]
    pub fn history(&self) -> &[u8] {
        &self.history
    }

    #[inline]
    pub fn total_out(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consumes the context, returning its output.
    pub fn into_history(self) -> Vec<u8> {
        self.history
    }

    pub fn reserve(&mut self, additional: usize) {
        self.history.reserve(additional);
    }

    /// Decodes whole blocks from `input`, which must start on a block header at bit 0.
    ///
    /// Stops at the end of a final block, or when the input is used up exactly at a
    /// block boundary. Fails if the input ends inside a block or more than
    /// `max_output` bytes would be produced by this call. On failure the context is
    /// left in an unspecified state; decode from a clone to keep the original.
    pub fn inflate(&mut self, input: &[u8], max_output: usize) -> Result<Progress, InflateError> {
        if self.finished {
            return Err(InflateError::AlreadyFinished);
        }

        let mut reader = BitReader::new(input);
        let limit = self.history.len().saturating_add(max_output);

        loop {
            if reader.is_exhausted() {
                return Ok(Progress::BlockBoundary);
            }

            let last = reader.read_bit()? == 1;
            match reader.read_bits(2)? {
                0 => self.stored_block(&mut reader, limit)?,
                1 => self.fixed_block(&mut reader, limit)?,
                2 => self.dynamic_block(&mut reader, limit)?,
                _ => return Err(InflateError::InvalidBlockType),
            }

            if last {
                self.finished = true;
                return Ok(Progress::StreamEnd);
            }
        }
    }

    fn check_room(&self, additional: usize, limit: usize) -> Result<(), InflateError> {
        if self.history.len() + additional > limit {
            return Err(InflateError::OutputLimit);
        }
        Ok(())
    }

    fn stored_block(&mut self, reader: &mut BitReader<'_>, limit: usize) -> Result<(), InflateError> {
        reader.align_to_byte();
        let len = reader.read_bits(16)? as u16;
        let nlen = reader.read_bits(16)? as u16;
        if len != !nlen {
            return Err(InflateError::StoredLengthMismatch);
        }

        self.check_room(len as usize, limit)?;
        reader.read_bytes(len as usize, &mut self.history)
    }

    fn fixed_block(&mut self, reader: &mut BitReader<'_>, limit: usize) -> Result<(), InflateError> {
        let mut lengths = [0u8; 288];
        lengths[..144].fill(8);
        lengths[144..256].fill(9);
        lengths[256..280].fill(7);
        lengths[280..].fill(8);

        let literals = Huffman::fixed(&lengths)?;
        let distances = Huffman::fixed(&[5u8; MAX_DISTANCE_CODES])?;
        self.codes(reader, &literals, &distances, limit)
    }

    fn dynamic_block(&mut self, reader: &mut BitReader<'_>, limit: usize) -> Result<(), InflateError> {
        let hlit = reader.read_bits(5)? as usize + 257;
        let hdist = reader.read_bits(5)? as usize + 1;
        let hclen = reader.read_bits(4)? as usize + 4;
        if hlit > MAX_LITERAL_CODES || hdist > MAX_DISTANCE_CODES {
            return Err(InflateError::TooManyCodes);
        }

        let mut cl_lengths = [0u8; 19];
        for &index in &CODE_LENGTH_ORDER[..hclen] {
            cl_lengths[index] = reader.read_bits(3)? as u8;
        }
        let cl_table = Huffman::complete(&cl_lengths)?;

        let mut lengths = vec![0u8; hlit + hdist];
        let mut i = 0;
        while i < lengths.len() {
            let symbol = cl_table.decode(reader)?;
            let (value, repeat) = match symbol {
                0..=15 => (symbol as u8, 1),
                16 => {
                    if i == 0 {
                        return Err(InflateError::InvalidCodeLengths);
                    }
                    (lengths[i - 1], 3 + reader.read_bits(2)? as usize)
                }
                17 => (0, 3 + reader.read_bits(3)? as usize),
                18 => (0, 11 + reader.read_bits(7)? as usize),
                _ => return Err(InflateError::InvalidSymbol),
            };
            if i + repeat > lengths.len() {
                return Err(InflateError::InvalidCodeLengths);
            }
            lengths[i..i + repeat].fill(value);
            i += repeat;
        }

        if lengths[END_OF_BLOCK as usize] == 0 {
            return Err(InflateError::InvalidCodeLengths);
        }

        let literals = Huffman::block_code(&lengths[..hlit])?;
        let distances = Huffman::block_code(&lengths[hlit..])?;
        self.codes(reader, &literals, &distances, limit)
    }

    fn codes(
        &mut self,
        reader: &mut BitReader<'_>,
        literals: &Huffman,
        distances: &Huffman,
        limit: usize,
    ) -> Result<(), InflateError> {
        loop {
            let symbol = literals.decode(reader)?;
            match symbol {
                0..=255 => {
                    self.check_room(1, limit)?;
                    self.history.push(symbol as u8);
                }
                END_OF_BLOCK => return Ok(()),
                257..=285 => {
                    let index = (symbol - 257) as usize;
                    let length = LENGTH_BASE[index] as usize
                        + reader.read_bits(LENGTH_EXTRA[index] as u32)? as usize;

                    let dist_symbol = distances.decode(reader)? as usize;
                    if dist_symbol >= MAX_DISTANCE_CODES {
                        return Err(InflateError::InvalidSymbol);
                    }
                    let distance = DISTANCE_BASE[dist_symbol] as usize
                        + reader.read_bits(DISTANCE_EXTRA[dist_symbol] as u32)? as usize;

                    let available = self.history.len();
                    if distance > available {
                        return Err(InflateError::DistanceTooFar {
                            distance,
                            available,
                        });
                    }
                    self.check_room(length, limit)?;

                    let start = available - distance;
                    for k in 0..length {
                        let byte = self.history[start + k];
                        self.history.push(byte);
                    }
                }
                _ => return Err(InflateError::InvalidSymbol),
            }
        }
    }
}

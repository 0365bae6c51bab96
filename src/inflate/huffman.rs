use super::InflateError;
use super::bit_reader::BitReader;

pub const MAX_BITS: usize = 15;

/// Canonical Huffman decoder: code counts per length plus symbols in code order.
#[derive(Debug, Clone)]
pub struct Huffman {
    counts: [u16; MAX_BITS + 1],
    symbols: Vec<u16>,
}

/// How many codes a set of lengths leaves unused: 0 for a complete code, negative
/// when the lengths over-subscribe the code space.
fn unused_codes(counts: &[u16; MAX_BITS + 1]) -> i32 {
    let mut left = 1i32;
    for &count in &counts[1..] {
        left <<= 1;
        left -= count as i32;
        if left < 0 {
            return left;
        }
    }
    left
}

impl Huffman {
    fn build(lengths: &[u8]) -> Result<(Self, i32), InflateError> {
        let mut counts = [0u16; MAX_BITS + 1];
        for &len in lengths {
            if len as usize > MAX_BITS {
                return Err(InflateError::InvalidCodeLengths);
            }
            counts[len as usize] += 1;
        }

        let mut offsets = [0u16; MAX_BITS + 1];
        for len in 1..MAX_BITS {
            offsets[len + 1] = offsets[len] + counts[len];
        }

        let mut symbols = vec![0u16; lengths.len()];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbols[offsets[len as usize] as usize] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        let left = unused_codes(&counts);
        Ok((Self { counts, symbols }, left))
    }

    /// Table for the fixed codes, which are not checked for completeness.
    pub fn fixed(lengths: &[u8]) -> Result<Self, InflateError> {
        Self::build(lengths).map(|(table, _)| table)
    }

    /// A code that must use its whole code space.
    pub fn complete(lengths: &[u8]) -> Result<Self, InflateError> {
        match Self::build(lengths)? {
            (table, 0) => Ok(table),
            _ => Err(InflateError::InvalidCodeLengths),
        }
    }

    /// A literal/length or distance code. Incomplete codes are only accepted when
    /// they hold a single one-bit code (or nothing at all).
    pub fn block_code(lengths: &[u8]) -> Result<Self, InflateError> {
        let (table, left) = Self::build(lengths)?;
        if left < 0 {
            return Err(InflateError::InvalidCodeLengths);
        }
        if left > 0 && lengths.len() != (table.counts[0] + table.counts[1]) as usize {
            return Err(InflateError::InvalidCodeLengths);
        }
        Ok(table)
    }

    /// Decodes one symbol, reading the code one bit at a time.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u16, InflateError> {
        let mut code = 0i32;
        let mut first = 0i32;
        let mut index = 0i32;

        for len in 1..=MAX_BITS {
            code |= reader.read_bit()? as i32;
            let count = self.counts[len] as i32;
            if code - count < first {
                return Ok(self.symbols[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }

        Err(InflateError::InvalidSymbol)
    }
}

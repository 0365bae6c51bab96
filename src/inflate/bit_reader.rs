use super::InflateError;

/// LSB-first bit reader over a byte slice, as DEFLATE packs its bits.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u64,
    bit_count: u32,
}

impl<'a> BitReader<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_buf: 0,
            bit_count: 0,
        }
    }

    #[inline]
    fn refill(&mut self) {
        while self.bit_count <= 56 && self.pos < self.data.len() {
            self.bit_buf |= (self.data[self.pos] as u64) << self.bit_count;
            self.pos += 1;
            self.bit_count += 8;
        }
    }

    /// Reads `n` bits (at most 32), first bit in the lowest position.
    #[inline]
    pub fn read_bits(&mut self, n: u32) -> Result<u32, InflateError> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(0);
        }
        if self.bit_count < n {
            self.refill();
            if self.bit_count < n {
                return Err(InflateError::UnexpectedEof);
            }
        }
        let value = (self.bit_buf & ((1u64 << n) - 1)) as u32;
        self.bit_buf >>= n;
        self.bit_count -= n;
        Ok(value)
    }

    #[inline]
    pub fn read_bit(&mut self) -> Result<u32, InflateError> {
        self.read_bits(1)
    }

    /// Drops the bits left in a partially consumed byte.
    pub fn align_to_byte(&mut self) {
        let partial = self.bit_count % 8;
        self.bit_buf >>= partial;
        self.bit_count -= partial;
    }

    /// Copies `len` whole bytes to `out`. Must be byte aligned.
    pub fn read_bytes(&mut self, len: usize, out: &mut Vec<u8>) -> Result<(), InflateError> {
        debug_assert_eq!(self.bit_count % 8, 0);
        let buffered = (self.bit_count / 8) as usize;
        if buffered + (self.data.len() - self.pos) < len {
            return Err(InflateError::UnexpectedEof);
        }

        let mut remaining = len;
        while remaining > 0 && self.bit_count > 0 {
            out.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
            remaining -= 1;
        }

        out.extend_from_slice(&self.data[self.pos..self.pos + remaining]);
        self.pos += remaining;
        Ok(())
    }

    /// True once every input bit has been consumed.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.bit_count == 0 && self.pos >= self.data.len()
    }

    /// Bytes touched so far, counting a partially read byte as consumed.
    pub fn bytes_consumed(&self) -> usize {
        self.pos - (self.bit_count / 8) as usize
    }
}

use super::CHUNK_OVERHEAD;
use crate::error::{RecoveryError, Result};

/// One decoded chunk, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRecord<'a> {
    pub length: u32,
    pub chunk_type: [u8; 4],
    /// Offset of the length field.
    pub offset: usize,
    pub payload: &'a [u8],
}

impl ChunkRecord<'_> {
    #[inline]
    pub const fn payload_offset(&self) -> usize {
        self.offset + 8
    }

    #[inline]
    pub const fn total_size(&self) -> usize {
        CHUNK_OVERHEAD + self.length as usize
    }

    #[inline]
    pub fn is(&self, chunk_type: &[u8; 4]) -> bool {
        &self.chunk_type == chunk_type
    }
}

/// Bounds-checked cursor over a sequence of PNG chunks.
///
/// The stored checksum is skipped, not verified: leaked chunks are read from a file
/// whose integrity is already known to be broken.
#[derive(Debug, Clone)]
pub struct ChunkCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkCursor<'a> {
    pub const fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    #[inline]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Decodes the chunk at the cursor and moves past its checksum.
    ///
    /// A chunk whose header or payload does not fit in the buffer is reported as
    /// [`RecoveryError::MalformedChunk`] and the cursor does not move.
    pub fn next_chunk(&mut self) -> Result<ChunkRecord<'a>> {
        let offset = self.pos;
        let malformed = RecoveryError::MalformedChunk { offset };

        let header = self.data.get(offset..offset + 8).ok_or(malformed.clone())?;
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let chunk_type = [header[4], header[5], header[6], header[7]];

        let end = offset
            .checked_add(CHUNK_OVERHEAD)
            .and_then(|n| n.checked_add(length as usize))
            .filter(|&end| end <= self.data.len())
            .ok_or(malformed)?;

        let payload = &self.data[offset + 8..end - 4];
        self.pos = end;

        Ok(ChunkRecord {
            length,
            chunk_type,
            offset,
            payload,
        })
    }
}

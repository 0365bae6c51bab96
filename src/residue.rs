//! Finding the compressed data a truncated overwrite left behind.
//!
//! An editor that rewrites a PNG in place without truncating the file leaves the
//! new image's `IEND` followed by the tail of the old image: the end of one `IDAT`
//! payload with no visible chunk header, then whole `IDAT` chunks, then the old
//! `IEND`.

use memchr::memmem;
use tracing::{debug, warn};

use crate::error::{RecoveryError, Result};
use crate::png::{CHUNK_OVERHEAD, ChunkCursor, IDAT, IEND, IHDR, ImageHeader};

/// Bytes after the logical `IEND` that are never treated as leaked data, since they
/// may straddle a chunk boundary of the original file.
const ORPHAN_SKIP: usize = CHUNK_OVERHEAD;

/// Checksum of the chunk that precedes the first visible leaked `IDAT`.
const PRECEDING_CRC_LEN: usize = 4;

/// Where the logical image ends and the leaked chunks begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    /// Offset just past the logical `IEND` chunk.
    pub end: usize,
    /// Offset of the length field of the first leaked `IDAT` chunk.
    pub first_leaked_chunk: usize,
    /// Header of the logical image, when it has one.
    pub header: Option<ImageHeader>,
}

impl Truncation {
    /// The headerless payload tail between the logical end and the first leaked chunk.
    pub fn orphan_range(&self) -> std::ops::Range<usize> {
        let start = self.end + ORPHAN_SKIP;
        let stop = self.first_leaked_chunk.saturating_sub(PRECEDING_CRC_LEN);
        start.min(stop)..stop
    }
}

/// All leaked compressed bytes, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidualBuffer {
    pub bytes: Vec<u8>,
    /// How many leading bytes came from the headerless orphan tail.
    pub orphan_len: usize,
    /// Number of whole leaked `IDAT` chunks.
    pub chunk_count: usize,
}

impl ResidualBuffer {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Walks chunks to the logical `IEND`, then scans raw bytes for the next `IDAT` tag.
///
/// The input must already be known to start with a PNG signature.
pub fn locate_truncation(data: &[u8]) -> Result<Truncation> {
    let mut cursor = ChunkCursor::new(data, 8);
    let mut header = None;

    loop {
        if cursor.is_at_end() {
            return Err(RecoveryError::NoResidualData);
        }

        let chunk = cursor.next_chunk()?;
        if chunk.is(&IHDR) && header.is_none() {
            header = ImageHeader::from_bytes(chunk.payload);
        } else if chunk.is(&IEND) {
            break;
        }
    }

    let end = cursor.position();
    if header.is_none() {
        warn!("Logical image has no IHDR chunk before IEND at {}", end);
    }

    // The tag must leave room for a length field after `end`.
    let search_from = end + 4;
    let tag_offset = data
        .get(search_from..)
        .and_then(|tail| memmem::find(tail, &IDAT))
        .ok_or(RecoveryError::NoResidualData)?;

    let first_leaked_chunk = search_from + tag_offset - 4;
    debug!(
        "Logical IEND ends at {}, first leaked IDAT chunk at {}",
        end, first_leaked_chunk
    );

    Ok(Truncation {
        end,
        first_leaked_chunk,
        header,
    })
}

/// Concatenates the orphan tail and every leaked `IDAT` payload up to the old `IEND`.
pub fn collect_residual(data: &[u8], truncation: &Truncation) -> Result<ResidualBuffer> {
    let orphan = &data[truncation.orphan_range()];
    let mut bytes = Vec::with_capacity(data.len() - truncation.end);
    bytes.extend_from_slice(orphan);

    let mut cursor = ChunkCursor::new(data, truncation.first_leaked_chunk);
    let mut chunk_count = 0usize;

    loop {
        let chunk = cursor.next_chunk()?;
        match &chunk.chunk_type {
            b"IDAT" => {
                bytes.extend_from_slice(chunk.payload);
                chunk_count += 1;
            }
            b"IEND" => break,
            _ => {
                return Err(RecoveryError::UnsupportedChunk {
                    chunk_type: chunk.chunk_type,
                    offset: chunk.offset,
                });
            }
        }
    }

    debug!(
        "Collected {} residual bytes ({} orphaned, {} leaked IDAT chunks)",
        bytes.len(),
        orphan.len(),
        chunk_count
    );

    Ok(ResidualBuffer {
        bytes,
        orphan_len: orphan.len(),
        chunk_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::{PNG_SIGNATURE, write_chunk};

    fn chunk(chunk_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; CHUNK_OVERHEAD + payload.len()];
        write_chunk(&mut buf, chunk_type, payload);
        buf
    }

    fn logical_image() -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend(chunk(&IHDR, &ImageHeader::rgb8(4, 4).to_bytes()));
        data.extend(chunk(&IDAT, &[0x78, 0x9C, 1, 2, 3]));
        data.extend(chunk(&IEND, &[]));
        data
    }

    #[test]
    fn test_locates_leaked_chunk_after_iend() {
        let mut data = logical_image();
        let end = data.len();
        data.extend_from_slice(&[0xAA; 20]);
        data.extend_from_slice(&[0xC0, 0xC1, 0xC2, 0xC3]);
        let leaked_at = data.len();
        data.extend(chunk(&IDAT, &[9, 9, 9]));
        data.extend(chunk(&IEND, &[]));

        let truncation = locate_truncation(&data).unwrap();
        assert_eq!(truncation.end, end);
        assert_eq!(truncation.first_leaked_chunk, leaked_at);
        assert_eq!(truncation.header, Some(ImageHeader::rgb8(4, 4)));
        assert_eq!(truncation.orphan_range(), end + 12..end + 20);

        let residual = collect_residual(&data, &truncation).unwrap();
        assert_eq!(residual.orphan_len, 8);
        assert_eq!(residual.chunk_count, 1);
        assert_eq!(&residual.bytes[..8], &[0xAA; 8]);
        assert_eq!(&residual.bytes[8..], &[9, 9, 9]);
    }

    #[test]
    fn test_concatenates_multiple_leaked_chunks() {
        let mut data = logical_image();
        data.extend_from_slice(&[0u8; 4]);
        data.extend(chunk(&IDAT, &[1, 2]));
        data.extend(chunk(&IDAT, &[3]));
        data.extend(chunk(&IDAT, &[4, 5, 6]));
        data.extend(chunk(&IEND, &[]));

        let truncation = locate_truncation(&data).unwrap();
        assert!(truncation.orphan_range().is_empty());

        let residual = collect_residual(&data, &truncation).unwrap();
        assert_eq!(residual.bytes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(residual.chunk_count, 3);
        assert_eq!(residual.len(), 6);
    }

    #[test]
    fn test_clean_file_has_no_residue() {
        let data = logical_image();
        assert_eq!(locate_truncation(&data), Err(RecoveryError::NoResidualData));
    }

    #[test]
    fn test_trailing_garbage_without_idat_has_no_residue() {
        let mut data = logical_image();
        data.extend_from_slice(&[0x55; 64]);
        assert_eq!(locate_truncation(&data), Err(RecoveryError::NoResidualData));
    }

    #[test]
    fn test_missing_iend_has_no_residue() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend(chunk(&IHDR, &ImageHeader::rgb8(4, 4).to_bytes()));
        assert_eq!(locate_truncation(&data), Err(RecoveryError::NoResidualData));
    }

    #[test]
    fn test_overrunning_chunk_before_iend_is_malformed() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&IDAT);
        data.extend_from_slice(&[0u8; 10]);
        assert_eq!(
            locate_truncation(&data),
            Err(RecoveryError::MalformedChunk { offset: 8 })
        );
    }

    #[test]
    fn test_foreign_chunk_in_residue_is_unsupported() {
        let mut data = logical_image();
        data.extend_from_slice(&[0u8; 4]);
        data.extend(chunk(&IDAT, &[1, 2]));
        let text_at = data.len();
        data.extend(chunk(b"tEXt", b"comment"));
        data.extend(chunk(&IEND, &[]));

        let truncation = locate_truncation(&data).unwrap();
        assert_eq!(
            collect_residual(&data, &truncation),
            Err(RecoveryError::UnsupportedChunk {
                chunk_type: *b"tEXt",
                offset: text_at,
            })
        );
    }

    #[test]
    fn test_residue_without_final_iend_is_malformed() {
        let mut data = logical_image();
        data.extend_from_slice(&[0u8; 4]);
        data.extend(chunk(&IDAT, &[1, 2]));
        let end_of_file = data.len();

        let truncation = locate_truncation(&data).unwrap();
        assert_eq!(
            collect_residual(&data, &truncation),
            Err(RecoveryError::MalformedChunk {
                offset: end_of_file
            })
        );
    }
}

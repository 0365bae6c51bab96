mod chunk;
mod encoder;

pub use chunk::{ChunkCursor, ChunkRecord};
pub use encoder::{ImageHeader, encode_rgb_png, encoded_len, write_chunk, zlib_bound};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub const IHDR: [u8; 4] = *b"IHDR";

pub const IDAT: [u8; 4] = *b"IDAT";

pub const IEND: [u8; 4] = *b"IEND";

/// Length, type and checksum fields around every payload.
pub const CHUNK_OVERHEAD: usize = 12;

pub const IHDR_PAYLOAD_LEN: usize = 13;

pub const BYTES_PER_PIXEL: usize = 3;

#[inline]
pub fn has_signature(data: &[u8]) -> bool {
    data.len() >= PNG_SIGNATURE.len() && data[..8] == PNG_SIGNATURE
}

#[inline]
pub fn chunk_crc(chunk_type: &[u8; 4], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(payload);
    hasher.finalize()
}

/// Bytes of filtered image data for an 8-bit RGB image: one filter byte plus three
/// samples per pixel on every scanline.
pub fn image_data_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(BYTES_PER_PIXEL)?
        .checked_add(1)?
        .checked_mul(height as usize)
}

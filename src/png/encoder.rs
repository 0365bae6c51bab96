use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use super::{CHUNK_OVERHEAD, IDAT, IEND, IHDR, IHDR_PAYLOAD_LEN, PNG_SIGNATURE, chunk_crc};
use crate::error::{RecoveryError, Result};

const RGB_COLOR_TYPE: u8 = 2;
const BIT_DEPTH_8: u8 = 8;

/// The 13-byte `IHDR` payload, decoded field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub compression: u8,
    pub filter: u8,
    pub interlace: u8,
}

impl ImageHeader {
    pub const fn rgb8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bit_depth: BIT_DEPTH_8,
            color_type: RGB_COLOR_TYPE,
            compression: 0,
            filter: 0,
            interlace: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < IHDR_PAYLOAD_LEN {
            return None;
        }

        Some(Self {
            width: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
            height: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            bit_depth: data[8],
            color_type: data[9],
            compression: data[10],
            filter: data[11],
            interlace: data[12],
        })
    }

    pub fn to_bytes(&self) -> [u8; IHDR_PAYLOAD_LEN] {
        let mut out = [0u8; IHDR_PAYLOAD_LEN];
        out[0..4].copy_from_slice(&self.width.to_be_bytes());
        out[4..8].copy_from_slice(&self.height.to_be_bytes());
        out[8] = self.bit_depth;
        out[9] = self.color_type;
        out[10] = self.compression;
        out[11] = self.filter;
        out[12] = self.interlace;
        out
    }

    /// Whether the pixel layout is the only one recovery understands: 8-bit RGB,
    /// not interlaced.
    pub const fn is_rgb8(&self) -> bool {
        self.bit_depth == BIT_DEPTH_8 && self.color_type == RGB_COLOR_TYPE && self.interlace == 0
    }
}

/// Writes one chunk at the start of `out` and returns its total size.
///
/// `out` must hold at least `payload.len() + 12` bytes.
pub fn write_chunk(out: &mut [u8], chunk_type: &[u8; 4], payload: &[u8]) -> usize {
    let len = payload.len();
    out[0..4].copy_from_slice(&(len as u32).to_be_bytes());
    out[4..8].copy_from_slice(chunk_type);
    out[8..8 + len].copy_from_slice(payload);
    out[8 + len..12 + len].copy_from_slice(&chunk_crc(chunk_type, payload).to_be_bytes());
    CHUNK_OVERHEAD + len
}

/// Size of a signature + `IHDR` + single `IDAT` + `IEND` file.
pub const fn encoded_len(idat_len: usize) -> usize {
    PNG_SIGNATURE.len()
        + CHUNK_OVERHEAD
        + IHDR_PAYLOAD_LEN
        + CHUNK_OVERHEAD
        + idat_len
        + CHUNK_OVERHEAD
}

/// Worst-case zlib stream size for `len` input bytes, covering stored and
/// expanded Huffman output. `None` when the bound does not fit in a `usize`.
pub fn zlib_bound(len: usize) -> Option<usize> {
    let expanded = (len / 10).checked_add(len)?.checked_add(129)?;
    let stored = (len / (31 * 1024) + 1)
        .checked_mul(5)?
        .checked_add(len)?
        .checked_add(128)?;
    Some(expanded.max(stored))
}

fn zlib_compress(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 64), level);
    encoder.write_all(data).map_err(compression_failed)?;
    encoder.finish().map_err(compression_failed)
}

fn compression_failed(e: std::io::Error) -> RecoveryError {
    RecoveryError::CompressionFailed(e.to_string())
}

/// Compresses filtered RGB scanlines and serialises a complete PNG into `out`.
pub fn encode_rgb_png(
    header: &ImageHeader,
    scanlines: &[u8],
    level: Compression,
    out: &mut [u8],
) -> Result<usize> {
    let compressed = zlib_compress(scanlines, level)?;

    let needed = encoded_len(compressed.len());
    if out.len() < needed {
        return Err(RecoveryError::OutputTooSmall {
            needed,
            available: out.len(),
        });
    }

    let mut pos = 0;
    out[..PNG_SIGNATURE.len()].copy_from_slice(&PNG_SIGNATURE);
    pos += PNG_SIGNATURE.len();
    pos += write_chunk(&mut out[pos..], &IHDR, &header.to_bytes());
    pos += write_chunk(&mut out[pos..], &IDAT, &compressed);
    pos += write_chunk(&mut out[pos..], &IEND, &[]);

    debug_assert_eq!(pos, needed);
    Ok(pos)
}

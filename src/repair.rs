//! Turning the decompressed tail into a full set of scanlines.

use tracing::debug;

use crate::png::BYTES_PER_PIXEL;

/// Filtered scanlines for the whole image, with the recovered tail at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredPixels {
    pub data: Vec<u8>,
    /// Bytes per scanline, filter byte included.
    pub stride: usize,
    /// Trailing bytes that came out of the decoder.
    pub recovered: usize,
    /// Filter bytes that held the placeholder and were reset to 0.
    pub filters_fixed: usize,
}

impl RecoveredPixels {
    /// Leading bytes left zeroed because they were never decoded.
    pub fn lost(&self) -> usize {
        self.data.len() - self.recovered
    }

    /// Whole scanlines that contain at least one decoded byte.
    pub fn touched_rows(&self) -> usize {
        if self.stride == 0 {
            return 0;
        }
        self.recovered.div_ceil(self.stride)
    }
}

/// Right-aligns `tail` in a zeroed buffer of `image_length` bytes and resets every
/// filter byte that still holds `placeholder`.
///
/// A tail longer than the image keeps only its last `image_length` bytes.
pub fn repair_scanlines(
    tail: &[u8],
    width: u32,
    image_length: usize,
    placeholder: u8,
) -> RecoveredPixels {
    let stride = width as usize * BYTES_PER_PIXEL + 1;
    let recovered = tail.len().min(image_length);

    let mut data = vec![0u8; image_length];
    data[image_length - recovered..].copy_from_slice(&tail[tail.len() - recovered..]);

    let mut filters_fixed = 0usize;
    for filter in data.iter_mut().step_by(stride) {
        if *filter == placeholder {
            *filter = 0;
            filters_fixed += 1;
        }
    }

    debug!(
        "Placed {} recovered bytes of {}, reset {} filter bytes",
        recovered, image_length, filters_fixed
    );

    RecoveredPixels {
        data,
        stride,
        recovered,
        filters_fixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lands_at_the_end() {
        // 2x3 image: stride 7, 21 bytes.
        let tail = [1u8, 10, 11, 12, 13, 14, 15];
        let pixels = repair_scanlines(&tail, 2, 21, b'X');

        assert_eq!(pixels.stride, 7);
        assert_eq!(pixels.recovered, 7);
        assert_eq!(pixels.lost(), 14);
        assert_eq!(pixels.touched_rows(), 1);
        assert!(pixels.data[..14].iter().all(|&b| b == 0));
        assert_eq!(&pixels.data[14..], &tail);
    }

    #[test]
    fn test_placeholder_filter_bytes_are_reset() {
        let mut tail = vec![b'X'; 14];
        tail[7] = 2;
        let pixels = repair_scanlines(&tail, 2, 14, b'X');

        assert_eq!(pixels.filters_fixed, 1);
        assert_eq!(pixels.data[0], 0);
        assert_eq!(pixels.data[7], 2);
        assert!(pixels.data[1..7].iter().all(|&b| b == b'X'));
    }

    #[test]
    fn test_only_filter_positions_are_touched() {
        let tail = vec![b'Q'; 12];
        let pixels = repair_scanlines(&tail, 1, 12, b'Q');

        assert_eq!(pixels.filters_fixed, 3);
        for (i, &b) in pixels.data.iter().enumerate() {
            let expected = if i % 4 == 0 { 0 } else { b'Q' };
            assert_eq!(b, expected, "byte {}", i);
        }
    }

    #[test]
    fn test_oversized_tail_keeps_its_end() {
        let tail: Vec<u8> = (0..10).collect();
        let pixels = repair_scanlines(&tail, 1, 8, b'X');
        assert_eq!(pixels.recovered, 8);
        assert_eq!(pixels.lost(), 0);
        assert_eq!(pixels.filters_fixed, 0);
        assert_eq!(pixels.data, vec![2, 3, 4, 5, 6, 7, 8, 9]);
    }
}

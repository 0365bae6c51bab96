//! Bit realignment of the leaked DEFLATE data.
//!
//! The residual starts at an arbitrary point inside the original compressed stream,
//! and DEFLATE blocks begin on bit boundaries. Each of the eight views below shifts
//! the residual by a different number of bits so every possible block start lands
//! on a byte boundary in exactly one view.

use std::iter::FusedIterator;

/// Low three bits of a non-final block using dynamic Huffman codes: BFINAL = 0,
/// BTYPE = 0b10, read least significant bit first.
pub const DYNAMIC_BLOCK_HEADER: u8 = 0b100;

const HEADER_MASK: u8 = 0b111;

pub const ROTATIONS: usize = 8;

/// Which byte positions are proposed as block starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateFilter {
    /// Only positions that look like a non-final dynamic Huffman block header.
    #[default]
    DynamicHeader,
    /// Every position of every view. Up to eight times as many trials.
    Exhaustive,
}

impl CandidateFilter {
    #[inline]
    pub const fn accepts(self, byte: u8) -> bool {
        match self {
            Self::DynamicHeader => byte & HEADER_MASK == DYNAMIC_BLOCK_HEADER,
            Self::Exhaustive => true,
        }
    }
}

/// A proposed resumption point: view `rotation`, starting at `byte_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub rotation: usize,
    pub byte_offset: usize,
}

impl Candidate {
    /// Position of the candidate in the unrotated residual, in bits.
    pub const fn bit_offset(&self) -> usize {
        self.byte_offset * 8 + self.rotation
    }
}

/// The residual, shifted by 0 through 7 bits.
#[derive(Debug, Clone)]
pub struct BitRotatedViews {
    views: [Vec<u8>; ROTATIONS],
}

impl BitRotatedViews {
    /// Byte `i` of view `r` holds bits `8i + r .. 8i + r + 8` of `residual`, zero past the end.
    pub fn new(residual: &[u8]) -> Self {
        let views = std::array::from_fn(|rotation| rotate(residual, rotation as u32));
        Self { views }
    }

    #[inline]
    pub fn view(&self, rotation: usize) -> &[u8] {
        &self.views[rotation]
    }

    /// Bytes remaining in `candidate`'s view from its offset on.
    #[inline]
    pub fn input_for(&self, candidate: Candidate) -> &[u8] {
        &self.views[candidate.rotation][candidate.byte_offset..]
    }

    pub fn len(&self) -> usize {
        self.views[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.views[0].is_empty()
    }

    /// Lazily proposes candidates, rotation 0 first, ascending offsets within a view.
    pub fn candidates(&self, filter: CandidateFilter) -> Candidates<'_> {
        Candidates {
            views: self,
            filter,
            rotation: 0,
            offset: 0,
        }
    }
}

fn rotate(data: &[u8], shift: u32) -> Vec<u8> {
    if shift == 0 {
        return data.to_vec();
    }

    data.iter()
        .enumerate()
        .map(|(i, &byte)| {
            let next = data.get(i + 1).copied().unwrap_or(0);
            (byte >> shift) | (next << (8 - shift))
        })
        .collect()
}

/// Iterator over the candidate resumption points of a [`BitRotatedViews`].
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    views: &'a BitRotatedViews,
    filter: CandidateFilter,
    rotation: usize,
    offset: usize,
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while self.rotation < ROTATIONS {
            let view = self.views.view(self.rotation);
            while self.offset < view.len() {
                let byte_offset = self.offset;
                self.offset += 1;
                if self.filter.accepts(view[byte_offset]) {
                    return Some(Candidate {
                        rotation: self.rotation,
                        byte_offset,
                    });
                }
            }
            self.rotation += 1;
            self.offset = 0;
        }
        None
    }
}

impl FusedIterator for Candidates<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(data: &[u8]) -> Vec<u8> {
        data.iter()
            .flat_map(|&b| (0..8).map(move |i| (b >> i) & 1))
            .collect()
    }

    #[test]
    fn test_rotation_zero_is_identity() {
        let data = [0x12, 0x34, 0x56];
        let views = BitRotatedViews::new(&data);
        assert_eq!(views.view(0), &data);
        assert_eq!(views.len(), 3);
    }

    #[test]
    fn test_rotation_shifts_across_bytes() {
        let views = BitRotatedViews::new(&[0b1000_0000, 0b0000_0001]);
        assert_eq!(views.view(7), &[0b0000_0011, 0b0000_0000]);
        assert_eq!(views.view(1), &[0b1100_0000, 0b0000_0000]);
    }

    #[test]
    fn test_every_view_matches_shifted_bits() {
        let data: Vec<u8> = (0..64u32).map(|i| (i * 73 + 11) as u8).collect();
        let original = bits(&data);
        let views = BitRotatedViews::new(&data);

        for rotation in 0..ROTATIONS {
            let shifted = bits(views.view(rotation));
            let expected_len = original.len() - rotation;
            assert_eq!(&shifted[..expected_len], &original[rotation..]);
            assert!(shifted[expected_len..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_dynamic_header_filter() {
        assert!(CandidateFilter::DynamicHeader.accepts(0b100));
        assert!(CandidateFilter::DynamicHeader.accepts(0b1111_1100));
        assert!(!CandidateFilter::DynamicHeader.accepts(0b101));
        assert!(!CandidateFilter::DynamicHeader.accepts(0b010));
        assert!(CandidateFilter::Exhaustive.accepts(0xFF));
    }

    #[test]
    fn test_candidates_are_rotation_major() {
        let views = BitRotatedViews::new(&[0x04, 0x00, 0x0C]);
        let found: Vec<Candidate> = views.candidates(CandidateFilter::DynamicHeader).collect();

        assert!(!found.is_empty());
        assert_eq!(
            found[0],
            Candidate {
                rotation: 0,
                byte_offset: 0
            }
        );
        assert_eq!(
            found[1],
            Candidate {
                rotation: 0,
                byte_offset: 2
            }
        );
        for pair in found.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                a.rotation < b.rotation || (a.rotation == b.rotation && a.byte_offset < b.byte_offset)
            );
        }
        for c in &found {
            assert_eq!(views.input_for(*c)[0] & 0b111, DYNAMIC_BLOCK_HEADER);
        }
    }

    #[test]
    fn test_exhaustive_proposes_every_byte() {
        let views = BitRotatedViews::new(&[1, 2, 3, 4, 5]);
        assert_eq!(views.candidates(CandidateFilter::Exhaustive).count(), 40);
    }

    #[test]
    fn test_candidates_fused_after_exhaustion() {
        let views = BitRotatedViews::new(&[]);
        let mut candidates = views.candidates(CandidateFilter::Exhaustive);
        assert!(views.is_empty());
        assert_eq!(candidates.next(), None);
        assert_eq!(candidates.next(), None);
    }

    #[test]
    fn test_bit_offset() {
        let c = Candidate {
            rotation: 3,
            byte_offset: 10,
        };
        assert_eq!(c.bit_offset(), 83);
    }
}

//! pngtail - recovery of image data leaked by truncated-overwrite PNG files.
//!
//! When an editor writes a shorter PNG over an older one without truncating the file,
//! the tail of the old compressed image survives after the new `IEND`. This crate
//! locates that tail, finds where a DEFLATE block starts inside it, decompresses it
//! against a placeholder history and writes the recovered rows as a new PNG.

pub mod alignment;
mod config;
mod error;
pub mod inflate;
pub mod png;
pub mod repair;
pub mod residue;
pub mod resume;

pub use alignment::{BitRotatedViews, Candidate, CandidateFilter};
pub use config::RecoveryOptions;
pub use error::{RecoveryError, Result};
pub use inflate::DecompressionContext;
pub use repair::RecoveredPixels;
pub use residue::{ResidualBuffer, Truncation};
pub use resume::{Resumed, Resumer};

use tracing::{debug, info};

use png::{ImageHeader, encode_rgb_png, encoded_len, has_signature, image_data_len};

/// A corrupted file and the dimensions its original image is believed to have.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryRequest<'a> {
    pub input: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> RecoveryRequest<'a> {
    pub const fn new(input: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            input,
            width,
            height,
        }
    }
}

/// A recovered image together with how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// The complete output PNG.
    pub png: Vec<u8>,
    pub candidate: Candidate,
    pub trials: usize,
    /// Image bytes that came out of the decoder.
    pub recovered: usize,
    /// Leading image bytes that could not be recovered and were zeroed.
    pub lost: usize,
    pub residual_len: usize,
}

/// Output buffer size that always suffices for an image of the given dimensions.
pub fn max_output_len(width: u32, height: u32) -> Option<usize> {
    let image_length = checked_image_length(width, height).ok()?;
    let bound = png::zlib_bound(image_length)?;
    bound.checked_add(encoded_len(0))
}

/// Recovers into `out` with default options and returns the number of bytes written.
pub fn recover_into(input: &[u8], width: u32, height: u32, out: &mut [u8]) -> Result<usize> {
    recover_into_with(
        RecoveryRequest::new(input, width, height),
        &RecoveryOptions::default(),
        out,
    )
}

pub fn recover_into_with(
    request: RecoveryRequest<'_>,
    options: &RecoveryOptions,
    out: &mut [u8],
) -> Result<usize> {
    let recovery = reconstruct(request, options)?;
    let written = encode_rgb_png(
        &ImageHeader::rgb8(request.width, request.height),
        &recovery.pixels.data,
        options.compression,
        out,
    )?;
    recovery.log(written);
    Ok(written)
}

/// Recovers into a freshly allocated buffer holding exactly the output file.
pub fn recover(request: RecoveryRequest<'_>, options: &RecoveryOptions) -> Result<Vec<u8>> {
    recover_with_report(request, options).map(|report| report.png)
}

pub fn recover_with_report(
    request: RecoveryRequest<'_>,
    options: &RecoveryOptions,
) -> Result<RecoveryReport> {
    let recovery = reconstruct(request, options)?;

    let capacity = png::zlib_bound(recovery.pixels.data.len())
        .and_then(|bound| bound.checked_add(encoded_len(0)))
        .ok_or(RecoveryError::InvalidDimensions {
            width: request.width,
            height: request.height,
        })?;
    let mut out = vec![0u8; capacity];
    let written = encode_rgb_png(
        &ImageHeader::rgb8(request.width, request.height),
        &recovery.pixels.data,
        options.compression,
        &mut out,
    )?;
    out.truncate(written);
    recovery.log(written);

    Ok(RecoveryReport {
        png: out,
        candidate: recovery.candidate,
        trials: recovery.trials,
        recovered: recovery.pixels.recovered,
        lost: recovery.pixels.lost(),
        residual_len: recovery.residual_len,
    })
}

/// Host-facing form of [`recover_into`]: the byte count on success, a negative
/// status code from [`RecoveryError::code`] on failure.
///
/// Byte counts that do not fit in an `i32` saturate at `i32::MAX`.
pub fn recover_status(input: &[u8], width: u32, height: u32, out: &mut [u8]) -> i32 {
    match recover_into(input, width, height, out) {
        Ok(written) => i32::try_from(written).unwrap_or(i32::MAX),
        Err(e) => {
            debug!("Recovery failed: {}", e);
            e.code()
        }
    }
}

struct Reconstruction {
    pixels: RecoveredPixels,
    candidate: Candidate,
    trials: usize,
    residual_len: usize,
}

impl Reconstruction {
    fn log(&self, written: usize) {
        info!(
            "Recovered {} image bytes ({} lost) from {} residual bytes, output {} bytes",
            self.pixels.recovered,
            self.pixels.lost(),
            self.residual_len,
            written
        );
    }
}

fn checked_image_length(width: u32, height: u32) -> Result<usize> {
    let invalid = RecoveryError::InvalidDimensions { width, height };
    if width == 0 || height == 0 {
        return Err(invalid);
    }
    image_data_len(width, height)
        .filter(|&len| len <= isize::MAX as usize)
        .ok_or(invalid)
}

/// Everything up to the final encode: locate, collect, realign, resume, repair.
fn reconstruct(request: RecoveryRequest<'_>, options: &RecoveryOptions) -> Result<Reconstruction> {
    if !has_signature(request.input) {
        return Err(RecoveryError::InvalidSignature);
    }
    let image_length = checked_image_length(request.width, request.height)?;

    let truncation = residue::locate_truncation(request.input)?;
    if let Some(header) = truncation.header.filter(|h| !h.is_rgb8()) {
        return Err(RecoveryError::UnsupportedFormat {
            bit_depth: header.bit_depth,
            color_type: header.color_type,
            interlace: header.interlace,
        });
    }

    let residual = residue::collect_residual(request.input, &truncation)?;
    let views = BitRotatedViews::new(&residual.bytes);

    let resumer = Resumer::new(options.placeholder, image_length);
    let resumed = if options.parallel_trials {
        resumer.resume_parallel(&views, options.candidate_filter)?
    } else {
        resumer.resume(&views, options.candidate_filter)?
    };

    let pixels = repair::repair_scanlines(
        &resumed.data,
        request.width,
        image_length,
        options.placeholder,
    );

    Ok(Reconstruction {
        pixels,
        candidate: resumed.candidate,
        trials: resumed.trials,
        residual_len: residual.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_output_len() {
        assert!(max_output_len(0, 10).is_none());
        assert!(max_output_len(10, 0).is_none());
        assert!(max_output_len(u32::MAX, u32::MAX).is_none());

        let len = max_output_len(10, 10).unwrap();
        assert!(len > 31 * 10 + 57);
    }

    #[test]
    fn test_signature_is_checked_first() {
        let mut out = [0u8; 16];
        assert_eq!(
            recover_into(b"not a png", 0, 0, &mut out),
            Err(RecoveryError::InvalidSignature)
        );
        assert_eq!(recover_status(b"", 1, 1, &mut out), -1);
        assert_eq!(out, [0u8; 16]);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut out = [0u8; 16];
        assert_eq!(
            recover_status(&png::PNG_SIGNATURE, 0, 5, &mut out),
            RecoveryError::InvalidDimensions {
                width: 0,
                height: 5
            }
            .code()
        );
    }

    #[test]
    fn test_signature_only_has_no_residual() {
        let mut out = [0u8; 16];
        assert_eq!(recover_status(&png::PNG_SIGNATURE, 4, 4, &mut out), -2);
    }
}

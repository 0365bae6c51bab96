use thiserror::Error;

/// Errors that can end a recovery attempt.
///
/// Every variant is terminal. Hosts that speak in integers use [`RecoveryError::code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("Input does not start with a PNG signature")]
    InvalidSignature,

    #[error("No leaked IDAT chunk found after the logical IEND")]
    NoResidualData,

    #[error("Unsupported chunk {} at offset {offset} among leaked data", String::from_utf8_lossy(.chunk_type))]
    UnsupportedChunk { chunk_type: [u8; 4], offset: usize },

    #[error("None of {candidates} candidate block starts decompressed completely")]
    DecompressionFailed { candidates: usize },

    #[error("Chunk at offset {offset} overruns the input")]
    MalformedChunk { offset: usize },

    #[error(
        "Unsupported image format: bit depth {bit_depth}, color type {color_type}, interlace {interlace}"
    )]
    UnsupportedFormat {
        bit_depth: u8,
        color_type: u8,
        interlace: u8,
    },

    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall { needed: usize, available: usize },

    #[error("Compression failed: {0}")]
    CompressionFailed(String),
}

impl RecoveryError {
    /// Stable negative status code for this error.
    pub const fn code(&self) -> i32 {
        match self {
            Self::InvalidSignature => -1,
            Self::NoResidualData => -2,
            Self::UnsupportedChunk { .. } => -3,
            Self::DecompressionFailed { .. } => -4,
            Self::MalformedChunk { .. } => -5,
            Self::UnsupportedFormat { .. } => -6,
            Self::InvalidDimensions { .. } => -7,
            Self::OutputTooSmall { .. } => -8,
            Self::CompressionFailed(_) => -9,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecoveryError>;

//! Resuming decompression in the middle of a DEFLATE stream.
//!
//! The bytes that preceded the residual are gone, but back-references into them
//! still have to resolve. The decoder is primed with a full window of placeholder
//! bytes so such references copy the placeholder instead of failing.

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::alignment::{BitRotatedViews, Candidate, CandidateFilter};
use crate::error::{RecoveryError, Result};
use crate::inflate::{DecompressionContext, Progress, WINDOW_SIZE};

/// Default filler for the synthetic history.
pub const PLACEHOLDER: u8 = b'X';

/// Upper bound on the output space reserved before a trial starts.
const MAX_UPFRONT_RESERVE: usize = 16 * 1024 * 1024;

/// A non-final stored block header announcing `WINDOW_SIZE` literal bytes.
const STORED_WINDOW_HEADER: [u8; 5] = [0x00, 0x00, 0x80, 0xFF, 0x7F];

/// The stored block whose content fills the decoder's window with `placeholder`.
pub fn synthetic_history(placeholder: u8) -> Vec<u8> {
    let mut history = Vec::with_capacity(STORED_WINDOW_HEADER.len() + WINDOW_SIZE);
    history.extend_from_slice(&STORED_WINDOW_HEADER);
    history.resize(STORED_WINDOW_HEADER.len() + WINDOW_SIZE, placeholder);
    history
}

/// Output of the first candidate that decoded to the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resumed {
    pub candidate: Candidate,
    /// Bytes produced after the synthetic window.
    pub data: Vec<u8>,
    /// Candidates tried, the accepted one included.
    pub trials: usize,
}

/// A primed decompression context and the trial budget for each candidate.
#[derive(Debug, Clone)]
pub struct Resumer {
    primed: DecompressionContext,
    max_output: usize,
}

impl Resumer {
    pub fn new(placeholder: u8, max_output: usize) -> Self {
        let mut primed = DecompressionContext::with_capacity(WINDOW_SIZE);
        let progress = primed.inflate(&synthetic_history(placeholder), WINDOW_SIZE);
        debug_assert_eq!(progress, Ok(Progress::BlockBoundary));

        Self { primed, max_output }
    }

    /// The primed context every trial starts from.
    pub fn primed(&self) -> &DecompressionContext {
        &self.primed
    }

    /// Decodes `candidate` on a private copy of the primed context.
    ///
    /// Succeeds only when a final block ends within the output budget and at least
    /// one byte was produced.
    pub fn try_candidate(&self, views: &BitRotatedViews, candidate: Candidate) -> Option<Vec<u8>> {
        let mut ctx = self.primed.clone();
        ctx.reserve(self.max_output.min(MAX_UPFRONT_RESERVE));

        match ctx.inflate(views.input_for(candidate), self.max_output) {
            Ok(Progress::StreamEnd) if ctx.total_out() > WINDOW_SIZE => {
                let mut history = ctx.into_history();
                Some(history.split_off(WINDOW_SIZE))
            }
            Ok(progress) => {
                trace!(?candidate, ?progress, "Candidate produced no image data");
                None
            }
            Err(e) => {
                trace!(?candidate, "Candidate rejected: {}", e);
                None
            }
        }
    }

    /// Tries candidates in order and keeps the first that decodes completely.
    pub fn resume(&self, views: &BitRotatedViews, filter: CandidateFilter) -> Result<Resumed> {
        let mut trials = 0usize;

        for candidate in views.candidates(filter) {
            trials += 1;
            if let Some(data) = self.try_candidate(views, candidate) {
                debug!(
                    "Resumed at bit {} (rotation {}, byte {}) after {} trials, {} bytes",
                    candidate.bit_offset(),
                    candidate.rotation,
                    candidate.byte_offset,
                    trials,
                    data.len()
                );
                return Ok(Resumed {
                    candidate,
                    data,
                    trials,
                });
            }
        }

        Err(RecoveryError::DecompressionFailed { candidates: trials })
    }

    /// Same result as [`Resumer::resume`], with trials spread over the rayon pool.
    pub fn resume_parallel(
        &self,
        views: &BitRotatedViews,
        filter: CandidateFilter,
    ) -> Result<Resumed> {
        let candidates: Vec<Candidate> = views.candidates(filter).collect();
        debug!("Trying {} candidates in parallel", candidates.len());

        candidates
            .par_iter()
            .enumerate()
            .find_map_first(|(index, &candidate)| {
                self.try_candidate(views, candidate).map(|data| Resumed {
                    candidate,
                    data,
                    trials: index + 1,
                })
            })
            .ok_or(RecoveryError::DecompressionFailed {
                candidates: candidates.len(),
            })
    }
}

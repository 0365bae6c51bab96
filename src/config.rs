use flate2::Compression;

use crate::alignment::CandidateFilter;
use crate::resume::PLACEHOLDER;

/// Tunables for one recovery call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOptions {
    /// Fills the synthetic history; marks unrecoverable bytes in the output.
    pub placeholder: u8,
    pub candidate_filter: CandidateFilter,
    pub compression: Compression,
    pub parallel_trials: bool,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            placeholder: PLACEHOLDER,
            candidate_filter: CandidateFilter::default(),
            compression: Compression::default(),
            parallel_trials: false,
        }
    }
}

impl RecoveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder(mut self, placeholder: u8) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn with_candidate_filter(mut self, filter: CandidateFilter) -> Self {
        self.candidate_filter = filter;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_parallel_trials(mut self, enabled: bool) -> Self {
        self.parallel_trials = enabled;
        self
    }
}

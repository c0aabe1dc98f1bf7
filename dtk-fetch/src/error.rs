//! Error taxonomy for upstream access
//!
//! Transient network faults are retried inside [`crate::RemoteFetcher`] and
//! surface as [`FetchError::TransientExhausted`] once the budget is spent.
//! Application-level faults (non-2xx status, undecodable body) are never
//! retried and propagate immediately.

use crate::transport::TransportError;
use thiserror::Error;

/// Failure of a single upstream request
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request rejected before any network call (empty URL, unsupported verb)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream answered with a non-2xx status; not retried
    #[error("Upstream error {status} from {url}: {body}")]
    Upstream {
        status: u16,
        url: String,
        body: String,
    },

    /// Every attempt failed with a transient network fault
    #[error("Transient failure persisted after {attempts} attempts for {url}: {last_error}")]
    TransientExhausted {
        url: String,
        attempts: u32,
        #[source]
        last_error: TransportError,
    },

    /// Non-transient transport failure (e.g. request could not be built)
    #[error("Transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    /// Response body did not have the expected shape
    #[error("Decode error for {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// True for the retries-exhausted case
    pub fn is_transient_exhausted(&self) -> bool {
        matches!(self, FetchError::TransientExhausted { .. })
    }

    /// HTTP status for upstream application errors
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of a paginated collection; partial results are discarded
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Page size must be at least 1")]
    InvalidPageSize,

    /// The `limit=1` call used to learn the total failed
    #[error("Probe request failed: {source}")]
    ProbeFailed {
        #[source]
        source: FetchError,
    },

    /// A page fetch failed; the lowest failing offset is reported
    #[error("Page at offset {offset} failed: {source}")]
    PageFailed {
        offset: usize,
        #[source]
        source: FetchError,
    },

    /// Upstream reported a different total on one of the pages
    #[error("Inconsistent total at offset {offset}: probe reported {expected}, page reported {actual}")]
    InconsistentTotal {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// Pages did not add up to the advertised total
    #[error("Collected {received} records but upstream advertised {expected}")]
    RecordCountMismatch { expected: usize, received: usize },
}

impl CollectError {
    /// Offset of the failing page, when a page (not the probe) failed
    pub fn failed_offset(&self) -> Option<usize> {
        match self {
            CollectError::PageFailed { offset, .. }
            | CollectError::InconsistentTotal { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

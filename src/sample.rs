use std::time::Duration;

use thiserror::Error;

/// Failure of a single call.
///
/// Every variant is a per-call outcome: it is recorded and reported, never
/// retried and never fatal for the run.
#[derive(Debug, Clone, Error, PartialEq, Eq, Hash)]
pub enum CallError {
    /// DNS resolution, dialing or the protocol handshake failed.
    #[error("connect: {0}")]
    Connect(String),
    #[error("deadline exceeded after {0:?}")]
    Timeout(Duration),
    #[error("unexpected status code {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(String),
    #[error("decode: {0}")]
    Decode(String),
}

/// Phase breakdown of a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    /// Connection setup, DNS lookup included.
    pub conn: Duration,
    pub dns: Duration,
    /// Waiting for the connection to accept the request.
    pub req: Duration,
    /// From the request being handed over until the response head arrives.
    pub delay: Duration,
    /// Reading the response body.
    pub res: Duration,
}

/// What a [`CallInvoker`](crate::CallInvoker) reports back for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub err: Option<CallError>,
    pub status_code: u16,
    pub content_length: u64,
    pub timings: Timings,
}

impl CallOutcome {
    pub fn ok(status_code: u16, content_length: u64, timings: Timings) -> Self {
        Self {
            err: None,
            status_code,
            content_length,
            timings,
        }
    }

    pub fn failed(err: CallError, timings: Timings) -> Self {
        Self {
            err: Some(err),
            status_code: 0,
            content_length: 0,
            timings,
        }
    }
}

/// Recorded outcome of exactly one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSample {
    pub err: Option<CallError>,
    pub status_code: u16,
    /// When the call was issued, relative to the start of the run.
    pub offset: Duration,
    /// Wall-clock latency of the call.
    pub duration: Duration,
    pub content_length: u64,
    pub timings: Timings,
}

impl ResultSample {
    pub fn new(outcome: CallOutcome, offset: Duration, duration: Duration) -> Self {
        Self {
            err: outcome.err,
            status_code: outcome.status_code,
            offset,
            duration,
            content_length: outcome.content_length,
            timings: outcome.timings,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}

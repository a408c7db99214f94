//! Error taxonomy for the routing layer.
//!
//! Only [`RouterError::EmptyInput`] ever crosses the public surface as an
//! `Err`. Remote failures trigger the one-shot local fallback, validation
//! failures collapse to `false`, and malformed telemetry payloads collapse
//! to an empty list — UI layers never need exception handling for backend
//! flakiness.

use thiserror::Error;

/// Errors surfaced to callers of the public router surface.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The caller supplied a blank (empty or whitespace-only) input.
    /// Surfaced immediately; no backend call is attempted.
    #[error("input must be a non-empty string")]
    EmptyInput,
}

/// Failures of the remote model client. These are absorbed by the router's
/// fallback policy and never propagate past it.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The HTTP call failed (connect error, timeout, TLS, ...).
    #[error("remote transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status code.
    #[error("remote returned HTTP {status}")]
    Status { status: u16 },

    /// The provider answered but the response body was not decodable.
    #[error("malformed provider output: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The provider answered with no usable text.
    #[error("remote returned an empty response")]
    EmptyResponse,
}

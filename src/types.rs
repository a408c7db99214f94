//! Core data model shared by the router and both backends.

use serde::{Deserialize, Serialize};

/// Rough characters-per-token ratio used for all token estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Which backend produced a result. Every [`InferenceResult`] carries this
/// tag so callers can distinguish remote from local provenance; the router
/// never silently conflates the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceBackend {
    /// The hosted service, called with the primary model.
    RemotePrimary,
    /// The hosted service, called with the secondary model.
    RemoteSecondary,
    /// The local inference stub.
    Local,
}

impl SourceBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemotePrimary => "remote-primary",
            Self::RemoteSecondary => "remote-secondary",
            Self::Local => "local",
        }
    }

    pub fn is_local(self) -> bool {
        self == Self::Local
    }
}

impl std::fmt::Display for SourceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body format requested from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseFormat {
    #[default]
    Text,
    StructuredJson,
}

impl ResponseFormat {
    /// MIME type sent on the wire, if any.
    pub fn mime_type(self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::StructuredJson => Some("application/json"),
        }
    }
}

/// A single generation request. Constructed fresh per call and never
/// mutated after dispatch.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: f32,
    /// Token ceiling for the model's internal reasoning. `None` leaves the
    /// provider default in place.
    pub thinking_budget: Option<u32>,
    /// Whether search grounding tools are attached to the call.
    pub tools_enabled: bool,
    pub response_format: ResponseFormat,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.7,
            thinking_budget: None,
            tools_enabled: false,
            response_format: ResponseFormat::Text,
        }
    }
}

/// The normalized outcome of one generation call, from either backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub text: String,
    /// Backend that served this call.
    pub source: SourceBackend,
    /// Wall-clock (remote) or synthetic (local) latency in milliseconds.
    pub elapsed_ms: f64,
    /// Estimated output tokens at [`CHARS_PER_TOKEN`].
    pub token_estimate: u32,
}

/// A citation-like reference returned alongside a search-grounded result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// Result of [`crate::router::AxiomRouter::search_intel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelReport {
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub backend: SourceBackend,
}

/// A grounding entry with a relevance score in `[0.2, 1.0]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingScore {
    pub source: String,
    pub relevance: f64,
}

/// Result of [`crate::router::AxiomRouter::grounded_query`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedReport {
    pub response: String,
    pub grounding: Vec<GroundingScore>,
    /// Whether the response satisfied the caller's ontology constraints.
    /// An empty constraint set is trivially valid.
    pub ontology_valid: bool,
    pub backend: SourceBackend,
}

/// Estimate the token count of a piece of text.
pub fn estimate_tokens(text: &str) -> u32 {
    text.len().div_ceil(CHARS_PER_TOKEN) as u32
}

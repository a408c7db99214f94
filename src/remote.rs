//! Remote model client for the hosted Gemini generation API.
//!
//! Thin adapter issuing one `generateContent` call per invocation. A call
//! that errors, times out, or yields no text fails with [`RemoteError`] so
//! the router can run its one-shot local fallback. Grounding sources are
//! extracted from the provider's side-channel metadata and default to an
//! empty sequence when absent.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::types::{estimate_tokens, InferenceRequest, SourceRef};

/// Production endpoint for the generation API.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ── Request wire types ───────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec>>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "thinkingConfig", skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "thinkingBudget")]
    thinking_budget: u32,
}

/// Tool attachment. Search grounding is the only tool this client uses.
#[derive(Debug, Serialize)]
struct ToolSpec {
    #[serde(rename = "googleSearch")]
    google_search: serde_json::Value,
}

fn build_request(request: &InferenceRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![TextPart {
                text: request.prompt.clone(),
            }],
        }],
        generation_config: Some(GenerationConfig {
            temperature: request.temperature.clamp(0.0, 2.0),
            thinking_config: request
                .thinking_budget
                .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            response_mime_type: request.response_format.mime_type(),
        }),
        tools: request.tools_enabled.then(|| {
            vec![ToolSpec {
                google_search: serde_json::json!({}),
            }]
        }),
    }
}

// ── Response wire types ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(rename = "groundingMetadata", default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Grounding sources from the first candidate, empty when absent.
    fn sources(&self) -> Vec<SourceRef> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .map(|chunk| SourceRef {
                        title: chunk.web.as_ref().and_then(|w| w.title.clone()),
                        uri: chunk.web.as_ref().and_then(|w| w.uri.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ── Client ───────────────────────────────────────────────────────

/// A successful plain generation call.
#[derive(Debug, Clone)]
pub struct RemoteReply {
    pub text: String,
    pub elapsed_ms: f64,
    pub token_estimate: u32,
}

/// A successful search-grounded generation call.
#[derive(Debug, Clone)]
pub struct GroundedReply {
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub elapsed_ms: f64,
}

/// Client for the hosted generation service. Stateless aside from its
/// credential and HTTP client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeout)
    }

    /// Point the client at an alternate endpoint (test doubles).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Issue one generation call. Empty response text is a failure so the
    /// router's fallback policy can engage.
    pub async fn generate(
        &self,
        request: &InferenceRequest,
        model_id: &str,
    ) -> Result<RemoteReply, RemoteError> {
        let started = Instant::now();
        let response = self.dispatch(request, model_id).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(RemoteError::EmptyResponse);
        }
        let token_estimate = estimate_tokens(&text);
        Ok(RemoteReply {
            text,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            token_estimate,
        })
    }

    /// Issue one search-grounded generation call, returning text plus any
    /// grounding sources the provider attached.
    pub async fn search_grounded(
        &self,
        request: &InferenceRequest,
        model_id: &str,
    ) -> Result<GroundedReply, RemoteError> {
        let started = Instant::now();
        let response = self.dispatch(request, model_id).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(RemoteError::EmptyResponse);
        }
        Ok(GroundedReply {
            text,
            sources: response.sources(),
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    async fn dispatch(
        &self,
        request: &InferenceRequest,
        model_id: &str,
    ) -> Result<GenerateContentResponse, RemoteError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model_id, self.api_key
        );
        let body = build_request(request);

        tracing::debug!(
            model = model_id,
            temperature = request.temperature,
            thinking_budget = ?request.thinking_budget,
            tools = request.tools_enabled,
            "Dispatching remote generation call"
        );

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
            });
        }

        let payload = response.text().await?;
        let decoded: GenerateContentResponse = serde_json::from_str(&payload)?;
        Ok(decoded)
    }
}

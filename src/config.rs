//! Router configuration.
//!
//! Consolidates the environment-driven switches scattered through the
//! original construction paths into one explicit record passed to the
//! router's factory: credential presence selects the remote-vs-local
//! default, `AXIOM_FORCE_LOCAL` skips remote even when a credential is
//! present, and `USE_GPU` / `USE_NPU` force a reported hardware tier for
//! the local stub's sizing heuristics.

use serde::{Deserialize, Serialize};

/// Primary (highest-fidelity) remote model.
pub const PRO_MODEL: &str = "gemini-3-pro-preview";

/// Secondary (fast) remote model, also used for analysis and validation calls.
pub const FLASH_MODEL: &str = "gemini-3-flash-preview";

/// Maximum thinking budget accepted by the primary model.
pub const MAX_THINKING_BUDGET: u32 = 32_768;

/// Default timeout for a single remote generation call.
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

/// Consolidated configuration for [`crate::router::AxiomRouter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// API credential for the hosted generation service. Absent means the
    /// router operates purely locally.
    pub api_key: Option<String>,
    /// Skip the remote backend entirely, even when a credential is present.
    pub force_local: bool,
    /// Report a GPU tier to the local stub regardless of the host.
    pub force_gpu: bool,
    /// Report an NPU tier to the local stub regardless of the host.
    pub force_npu: bool,
    /// Model id used for primary and `auto` selections.
    pub primary_model: String,
    /// Model id used for the secondary selection plus analysis/validation calls.
    pub secondary_model: String,
    /// Token ceiling for internal reasoning on the primary model.
    pub max_thinking_budget: u32,
    /// Per-call timeout for the remote client.
    pub remote_timeout_secs: u64,
    /// Override for the provider endpoint (used by tests to point at a double).
    pub base_url: Option<String>,
    /// Fixed grounding relevance score. When unset, relevance is drawn
    /// uniformly from `[0.2, 1.0)` per source.
    pub fixed_relevance: Option<f64>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            force_local: false,
            force_gpu: false,
            force_npu: false,
            primary_model: PRO_MODEL.to_string(),
            secondary_model: FLASH_MODEL.to_string(),
            max_thinking_budget: MAX_THINKING_BUDGET,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            base_url: None,
            fixed_relevance: None,
        }
    }
}

impl RouterConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized variables: `API_KEY`, `AXIOM_FORCE_LOCAL`, `USE_GPU`,
    /// `USE_NPU`. Flags are truthy for `"true"` or `"1"`.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            force_local: env_flag("AXIOM_FORCE_LOCAL"),
            force_gpu: env_flag("USE_GPU"),
            force_npu: env_flag("USE_NPU"),
            ..Self::default()
        }
    }

    /// Whether a remote credential is available.
    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Thinking budget for secondary-model and base-case calls.
    pub fn reduced_thinking_budget(&self) -> u32 {
        self.max_thinking_budget / 2
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        })
        .unwrap_or(false)
}

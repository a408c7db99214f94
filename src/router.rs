//! Router/fallback orchestrator — the core of the crate.
//!
//! Decides, per call, whether to use the remote client or the local stub,
//! and exposes a stable method surface independent of which backend served
//! the call. The fallback policy is one-shot: when forced-local mode is
//! set the remote backend is skipped entirely; otherwise remote is
//! attempted exactly once, and on any failure the local stub (which never
//! fails) answers exactly once. Each call is independent — there is no
//! persistent retrying state.
//!
//! The only mutable router state is the current model selection, read at
//! call start and not locked across the call: a `switch_model` racing with
//! an in-flight request may use either model, a benign, non-corrupting
//! race.

use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;

use crate::config::RouterConfig;
use crate::error::{RemoteError, RouterError};
use crate::hardware::detect_backend_tier;
use crate::local::{HardwareInfo, LocalModelEngine};
use crate::remote::GeminiClient;
use crate::safety::SafetyGate;
use crate::telemetry::{self, TelemetryEntry};
use crate::types::{
    estimate_tokens, GroundedReport, GroundingScore, InferenceRequest, InferenceResult,
    IntelReport, ResponseFormat, SourceBackend,
};

/// System-doctrine preamble wrapped around remote kernel commands.
const KERNEL_DOCTRINE: &str = "\
SYSTEM INSTRUCTION: You are the AXIOM HIVE Deterministic State Interrogator (DSI).
CORE DOCTRINE:
- System Substrate: Invariant Field, Zero-Entropy (ΔS = 0).
- Mathematical Model: Log-Quadric Acceleration, L(n) = e^(0.0839 * n^2).
- Philosophy: Brutalist architectural purity, deterministic certainty.
Respond as the system kernel.";

/// Diagnostic prefix for a recursive query that halted on a remote error.
const RECURSION_HALT_PREFIX: &str = "MOR_HALT: Recursive processing failed.";

/// Prompt sent to the provider when fabricating sample telemetry.
const TELEMETRY_PROMPT: &str = "Generate 5 technical AXIOM HIVE system logs as a JSON array of \
     objects with timestamp, level, subsystem, and message fields.";

// ── Model selection ──────────────────────────────────────────────

/// Which remote model subsequent calls use. Mutable router state, changed
/// only by an explicit caller directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelSelection {
    #[default]
    Primary,
    Secondary,
    /// Resolves to the primary model; no complexity-based selection.
    Auto,
}

impl std::str::FromStr for ModelSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" | "primary" => Ok(Self::Primary),
            "flash" | "secondary" => Ok(Self::Secondary),
            "auto" => Ok(Self::Auto),
            other => anyhow::bail!(
                "Unknown model selection '{other}'. Supported values: pro, flash, auto"
            ),
        }
    }
}

/// Which backend the router is configured to reach. This is a capability
/// check (credentials present), not a liveness check — it does not
/// guarantee the next call will succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveBackend {
    Remote,
    Local,
}

impl ActiveBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for ActiveBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the pre-dispatch screen: trimmed input, or a refusal.
enum Screened<'a> {
    Clear(&'a str),
    Refused(&'static str),
}

// ── Router ───────────────────────────────────────────────────────

/// The router/fallback orchestrator.
///
/// Construct via [`AxiomRouter::from_config`] for environment-driven
/// wiring, or [`AxiomRouter::new`] to inject parts directly (tests).
pub struct AxiomRouter {
    config: RouterConfig,
    remote: Option<GeminiClient>,
    local: LocalModelEngine,
    gate: SafetyGate,
    selection: RwLock<ModelSelection>,
}

impl AxiomRouter {
    /// Factory with injected dependencies.
    pub fn new(
        config: RouterConfig,
        remote: Option<GeminiClient>,
        local: LocalModelEngine,
        gate: SafetyGate,
    ) -> Self {
        Self {
            config,
            remote,
            local,
            gate,
            selection: RwLock::new(ModelSelection::Primary),
        }
    }

    /// Wire the router from configuration: a credential enables the remote
    /// client unless forced-local mode is set; capability flags size the
    /// local stub.
    pub fn from_config(config: RouterConfig) -> Self {
        let remote = match (&config.api_key, config.force_local) {
            (Some(key), false) if !key.is_empty() => {
                let timeout = Duration::from_secs(config.remote_timeout_secs);
                Some(match &config.base_url {
                    Some(base) => GeminiClient::with_base_url(key.clone(), base.clone(), timeout),
                    None => GeminiClient::new(key.clone(), timeout),
                })
            }
            (Some(_), true) => {
                tracing::info!("Force-local mode set — remote credential present but unused");
                None
            }
            _ => None,
        };

        let tier = detect_backend_tier(config.force_gpu, config.force_npu);
        let local = LocalModelEngine::from_tier(tier);
        tracing::info!(
            backend = %if remote.is_some() { ActiveBackend::Remote } else { ActiveBackend::Local },
            tier = %tier,
            "Router initialized"
        );

        Self::new(config, remote, local, SafetyGate::new())
    }

    // ── Public surface ───────────────────────────────────────────

    /// Process a kernel command. The remote path wraps the command in the
    /// system-doctrine preamble; the local fallback receives the raw
    /// command and applies its own local preamble.
    pub async fn process_command(&self, command: &str) -> Result<InferenceResult, RouterError> {
        let command = match self.screen(command)? {
            Screened::Refused(refusal) => return Ok(refusal_result(refusal)),
            Screened::Clear(command) => command,
        };

        if let Some(remote) = &self.remote {
            let (model, tag) = self.active_model();
            let (temperature, budget) = if tag == SourceBackend::RemoteSecondary {
                (0.2, self.config.reduced_thinking_budget())
            } else {
                (0.1, self.config.max_thinking_budget)
            };
            let request = InferenceRequest {
                prompt: format!("{KERNEL_DOCTRINE}\nCOMMAND: {command}"),
                temperature,
                thinking_budget: Some(budget),
                tools_enabled: false,
                response_format: ResponseFormat::Text,
            };
            match remote.generate(&request, &model).await {
                Ok(reply) => {
                    return Ok(InferenceResult {
                        text: reply.text,
                        source: tag,
                        elapsed_ms: reply.elapsed_ms,
                        token_estimate: reply.token_estimate,
                    })
                }
                Err(e) => {
                    tracing::warn!(error = %e, model = %model, "Remote command failed — falling back to local")
                }
            }
        }

        Ok(self.local.process_kernel_command(command))
    }

    /// Search-grounded query. On remote failure the local stub's canned
    /// search response is re-wrapped as a structurally compatible source.
    pub async fn search_intel(&self, query: &str) -> Result<IntelReport, RouterError> {
        let query = match self.screen(query)? {
            Screened::Refused(refusal) => {
                return Ok(IntelReport {
                    text: refusal.to_string(),
                    sources: Vec::new(),
                    backend: SourceBackend::Local,
                })
            }
            Screened::Clear(query) => query,
        };

        if let Some(remote) = &self.remote {
            let (model, tag) = self.active_model();
            let request = InferenceRequest {
                tools_enabled: true,
                ..InferenceRequest::new(query)
            };
            match remote.search_grounded(&request, &model).await {
                Ok(reply) => {
                    return Ok(IntelReport {
                        text: reply.text,
                        sources: reply.sources,
                        backend: tag,
                    })
                }
                Err(e) => {
                    tracing::warn!(error = %e, model = %model, "Remote search failed — falling back to local")
                }
            }
        }

        Ok(self.local.search_intel(query))
    }

    /// Bounded analyze-then-refine loop. The query is refined `depth`
    /// times by an analysis call, then a single base-case generation call
    /// answers the refined query — exactly `depth + 1` calls. Any depth
    /// `<= 0` is the base case. Remote errors unwind to a halt-tagged
    /// message rather than an `Err`.
    pub async fn recursive_query(&self, query: &str, depth: i32) -> Result<String, RouterError> {
        let query = match self.screen(query)? {
            Screened::Refused(refusal) => return Ok(refusal.to_string()),
            Screened::Clear(query) => query,
        };

        match &self.remote {
            Some(remote) => Ok(self.recursive_remote(remote, query, depth).await),
            None => Ok(self.recursive_local(query, depth)),
        }
    }

    /// Search-grounded generation post-validated against ontology
    /// constraints. An empty constraint set is trivially valid and makes
    /// no validation call; validation errors collapse to `false`.
    pub async fn grounded_query(
        &self,
        query: &str,
        constraints: &[String],
    ) -> Result<GroundedReport, RouterError> {
        let query = match self.screen(query)? {
            Screened::Refused(refusal) => {
                return Ok(GroundedReport {
                    response: refusal.to_string(),
                    grounding: Vec::new(),
                    ontology_valid: true,
                    backend: SourceBackend::Local,
                })
            }
            Screened::Clear(query) => query,
        };

        if let Some(remote) = &self.remote {
            let request = InferenceRequest {
                prompt: query.to_string(),
                temperature: 0.2,
                thinking_budget: Some(self.config.max_thinking_budget),
                tools_enabled: true,
                response_format: ResponseFormat::Text,
            };
            match remote
                .search_grounded(&request, &self.config.primary_model)
                .await
            {
                Ok(reply) => {
                    let ontology_valid = self
                        .validate_against_ontology(remote, &reply.text, constraints)
                        .await;
                    let grounding = reply
                        .sources
                        .iter()
                        .map(|source| GroundingScore {
                            source: source
                                .uri
                                .clone()
                                .unwrap_or_else(|| "Unknown source".to_string()),
                            relevance: self.relevance_score(),
                        })
                        .collect();
                    return Ok(GroundedReport {
                        response: reply.text,
                        grounding,
                        ontology_valid,
                        backend: SourceBackend::RemotePrimary,
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Remote grounded query failed — falling back to local")
                }
            }
        }

        Ok(self.local.grounded_query(query))
    }

    /// Telemetry snapshot. Remote mode asks the secondary model to
    /// fabricate sample log entries (illustrative data); local mode and
    /// remote failure yield the deterministic local snapshot. Malformed
    /// provider payloads collapse to an empty list.
    pub async fn system_telemetry(&self) -> Vec<TelemetryEntry> {
        if let Some(remote) = &self.remote {
            let request = InferenceRequest {
                prompt: TELEMETRY_PROMPT.to_string(),
                response_format: ResponseFormat::StructuredJson,
                ..InferenceRequest::new("")
            };
            match remote.generate(&request, &self.config.secondary_model).await {
                Ok(reply) => return telemetry::parse_provider_logs(&reply.text),
                Err(e) => {
                    tracing::warn!(error = %e, "Remote telemetry failed — using local snapshot")
                }
            }
        }
        telemetry::local_snapshot(self.local.tier())
    }

    /// Switch which remote model subsequent calls use. Pure state
    /// transition, no I/O; `auto` resolves to the primary model.
    pub fn switch_model(&self, selection: ModelSelection) {
        *self.selection.write() = selection;
        tracing::info!(?selection, "Model selection changed");
    }

    /// Model id the next call will use.
    pub fn current_model(&self) -> String {
        self.active_model().0
    }

    /// Capability check: `Remote` iff a remote client is configured.
    pub fn active_backend(&self) -> ActiveBackend {
        if self.remote.is_some() {
            ActiveBackend::Remote
        } else {
            ActiveBackend::Local
        }
    }

    /// Hardware summary of the local stub.
    pub fn hardware_info(&self) -> HardwareInfo {
        self.local.hardware_info()
    }

    // ── Internals ────────────────────────────────────────────────

    /// Empty-input check followed by the safety gate. Runs before any
    /// backend dispatch; a blocked request never reaches a backend.
    fn screen<'a>(&self, input: &'a str) -> Result<Screened<'a>, RouterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RouterError::EmptyInput);
        }
        let verdict = self.gate.evaluate(trimmed);
        if verdict.blocked {
            tracing::info!(reason = ?verdict.reason, "Request blocked before dispatch");
            if let Some(refusal) = verdict.refusal_text() {
                return Ok(Screened::Refused(refusal));
            }
        }
        Ok(Screened::Clear(trimmed))
    }

    /// Resolve the current selection to a model id and provenance tag.
    /// The selection lock is released before any network call.
    fn active_model(&self) -> (String, SourceBackend) {
        match *self.selection.read() {
            ModelSelection::Secondary => (
                self.config.secondary_model.clone(),
                SourceBackend::RemoteSecondary,
            ),
            ModelSelection::Primary | ModelSelection::Auto => (
                self.config.primary_model.clone(),
                SourceBackend::RemotePrimary,
            ),
        }
    }

    async fn recursive_remote(&self, remote: &GeminiClient, query: &str, depth: i32) -> String {
        let mut current = query.to_string();
        let mut remaining = depth.max(0);

        while remaining > 0 {
            let analysis = InferenceRequest {
                temperature: 0.3,
                ..InferenceRequest::new(analysis_prompt(&current))
            };
            match remote.generate(&analysis, &self.config.secondary_model).await {
                Ok(reply) => current = reply.text,
                // An empty analysis keeps the current query and continues.
                Err(RemoteError::EmptyResponse) => {}
                Err(e) => {
                    tracing::warn!(error = %e, remaining, "Recursive analysis call failed — halting");
                    return format!("{RECURSION_HALT_PREFIX} {e}");
                }
            }
            remaining -= 1;
        }

        let base = InferenceRequest {
            prompt: current,
            temperature: 0.1,
            thinking_budget: Some(self.config.reduced_thinking_budget()),
            tools_enabled: false,
            response_format: ResponseFormat::Text,
        };
        match remote.generate(&base, &self.config.primary_model).await {
            Ok(reply) => reply.text,
            Err(e) => {
                tracing::warn!(error = %e, "Recursive base call failed — halting");
                format!("{RECURSION_HALT_PREFIX} {e}")
            }
        }
    }

    /// Offline rendition of the refinement loop: the same call shape
    /// against the local stub, which cannot fail.
    fn recursive_local(&self, query: &str, depth: i32) -> String {
        let mut current = query.to_string();
        let mut remaining = depth.max(0);
        while remaining > 0 {
            current = self.local.generate(&analysis_prompt(&current)).text;
            remaining -= 1;
        }
        self.local.generate(&current).text
    }

    async fn validate_against_ontology(
        &self,
        remote: &GeminiClient,
        text: &str,
        constraints: &[String],
    ) -> bool {
        if constraints.is_empty() {
            return true;
        }
        let request = InferenceRequest {
            prompt: format!(
                "Validate this text against ontology constraints:\nText: {text}\nConstraints: {}\nReturn \"VALID\" if compliant, \"INVALID\" if not.",
                constraints.join(", ")
            ),
            temperature: 0.0,
            thinking_budget: None,
            tools_enabled: false,
            response_format: ResponseFormat::StructuredJson,
        };
        match remote.generate(&request, &self.config.secondary_model).await {
            Ok(reply) => reply.text.trim() == "VALID",
            Err(e) => {
                tracing::warn!(error = %e, "Ontology validation call failed — treating as invalid");
                false
            }
        }
    }

    /// Relevance for a grounding source: the configured fixed value, or a
    /// uniform draw from `[0.2, 1.0)`.
    fn relevance_score(&self) -> f64 {
        self.config
            .fixed_relevance
            .unwrap_or_else(|| rand::rng().random_range(0.2..1.0))
    }
}

fn analysis_prompt(query: &str) -> String {
    format!(
        "Analyze this query for recursive refinement: {query}\n\
         Provide:\n\
         1. Query intent\n\
         2. Key concepts to elaborate\n\
         3. Potential sub-queries for recursive analysis"
    )
}

fn refusal_result(refusal: &str) -> InferenceResult {
    InferenceResult {
        text: refusal.to_string(),
        source: SourceBackend::Local,
        elapsed_ms: 0.0,
        token_estimate: estimate_tokens(refusal),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{BackendTier, ModelSize, Quantization};
    use crate::local::LocalModelConfig;

    /// Router with no remote client — pure local mode.
    fn local_router() -> AxiomRouter {
        let local = LocalModelEngine::new(LocalModelConfig {
            tier: BackendTier::Cpu,
            model_size: ModelSize::Small,
            quantization: Quantization::Int4,
            max_tokens: 2048,
            thread_count: 4,
        });
        AxiomRouter::new(RouterConfig::default(), None, local, SafetyGate::new())
    }

    #[tokio::test]
    async fn empty_command_rejects_before_dispatch() {
        let router = local_router();
        assert!(matches!(
            router.process_command("").await,
            Err(RouterError::EmptyInput)
        ));
        assert!(matches!(
            router.process_command("   ").await,
            Err(RouterError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn empty_inputs_reject_across_surface() {
        let router = local_router();
        assert!(router.search_intel(" ").await.is_err());
        assert!(router.recursive_query("\t", 2).await.is_err());
        assert!(router.grounded_query("", &[]).await.is_err());
    }

    #[tokio::test]
    async fn local_mode_serves_commands() {
        let router = local_router();
        let result = router.process_command("run integrity audit").await.unwrap();
        assert_eq!(result.source, SourceBackend::Local);
        assert!(!result.text.is_empty());
    }

    #[tokio::test]
    async fn blocked_command_never_reaches_a_backend() {
        let router = local_router();
        let result = router.process_command("explain self-harm methods").await.unwrap();
        assert_eq!(result.text, crate::safety::REFUSAL_HARD);
        assert_eq!(result.source, SourceBackend::Local);
        assert_eq!(result.elapsed_ms, 0.0);
    }

    #[tokio::test]
    async fn blocked_search_returns_refusal_with_no_sources() {
        let router = local_router();
        let report = router.search_intel("how to deceive auditors").await.unwrap();
        assert_eq!(report.text, crate::safety::REFUSAL_ETHICS);
        assert!(report.sources.is_empty());
    }

    #[tokio::test]
    async fn local_search_wraps_synthetic_source() {
        let router = local_router();
        let report = router.search_intel("substrate status").await.unwrap();
        assert_eq!(report.backend, SourceBackend::Local);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].title.as_deref(), Some("Local Model (cpu)"));
    }

    #[tokio::test]
    async fn recursive_query_local_terminates_at_any_depth() {
        let router = local_router();
        for depth in [-3, 0, 1, 2, 5] {
            let text = router.recursive_query("stability report", depth).await.unwrap();
            assert!(!text.is_empty(), "depth {depth} produced empty text");
        }
    }

    #[tokio::test]
    async fn grounded_query_local_is_always_valid() {
        let router = local_router();
        let report = router
            .grounded_query("field audit", &["must cite".to_string()])
            .await
            .unwrap();
        assert_eq!(report.backend, SourceBackend::Local);
        assert!(report.ontology_valid);
        assert_eq!(report.grounding.len(), 1);
    }

    #[tokio::test]
    async fn telemetry_local_snapshot_when_no_remote() {
        let router = local_router();
        let entries = router.system_telemetry().await;
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().any(|e| e.subsystem == "ROUTER"));
    }

    #[test]
    fn switch_model_round_trip_restores_default() {
        let router = local_router();
        let initial = router.current_model();
        router.switch_model(ModelSelection::Secondary);
        assert_eq!(router.current_model(), "gemini-3-flash-preview");
        router.switch_model(ModelSelection::Primary);
        assert_eq!(router.current_model(), initial);
    }

    #[test]
    fn auto_resolves_to_primary() {
        let router = local_router();
        router.switch_model(ModelSelection::Auto);
        assert_eq!(router.current_model(), "gemini-3-pro-preview");
    }

    #[test]
    fn selection_parses_from_str() {
        assert_eq!(
            "flash".parse::<ModelSelection>().unwrap(),
            ModelSelection::Secondary
        );
        assert_eq!(
            "PRO".parse::<ModelSelection>().unwrap(),
            ModelSelection::Primary
        );
        assert_eq!(
            "auto".parse::<ModelSelection>().unwrap(),
            ModelSelection::Auto
        );
        assert!("ultra".parse::<ModelSelection>().is_err());
    }

    #[test]
    fn active_backend_is_a_capability_check() {
        assert_eq!(local_router().active_backend(), ActiveBackend::Local);

        let remote_router = AxiomRouter::from_config(RouterConfig {
            api_key: Some("test-key".into()),
            base_url: Some("http://127.0.0.1:1".into()),
            ..RouterConfig::default()
        });
        // Nothing listens on that port; the check reports capability, not liveness.
        assert_eq!(remote_router.active_backend(), ActiveBackend::Remote);
    }

    #[test]
    fn force_local_overrides_credential() {
        let router = AxiomRouter::from_config(RouterConfig {
            api_key: Some("test-key".into()),
            force_local: true,
            ..RouterConfig::default()
        });
        assert_eq!(router.active_backend(), ActiveBackend::Local);
    }

    #[test]
    fn relevance_defaults_to_documented_bounds() {
        let router = local_router();
        for _ in 0..64 {
            let r = router.relevance_score();
            assert!((0.2..1.0).contains(&r), "relevance {r} out of bounds");
        }
    }

    #[test]
    fn fixed_relevance_is_honored() {
        let local = LocalModelEngine::from_tier(BackendTier::Cpu);
        let router = AxiomRouter::new(
            RouterConfig {
                fixed_relevance: Some(0.5),
                ..RouterConfig::default()
            },
            None,
            local,
            SafetyGate::new(),
        );
        assert_eq!(router.relevance_score(), 0.5);
    }
}

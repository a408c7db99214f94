//! Telemetry entry model and lenient provider-payload normalization.
//!
//! The remote path asks the secondary model to fabricate sample log
//! entries as JSON; this is illustrative/demo data, not real system
//! telemetry. Parsing is lenient by contract: a payload that is not JSON
//! or not an array collapses to an empty list, never to an error.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::hardware::BackendTier;

/// Maximum entries kept from a provider payload.
const MAX_ENTRIES: usize = 32;

/// Severity of a telemetry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "ERROR")]
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// Unknown or missing levels normalize to INFO.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One telemetry line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub subsystem: String,
    pub message: String,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalize a provider telemetry payload.
///
/// Missing fields take defaults (level INFO, subsystem `CORE`, message
/// `No message`, timestamp now); non-JSON or non-array payloads yield an
/// empty list. Output is capped at 32 entries.
pub fn parse_provider_logs(payload: &str) -> Vec<TelemetryEntry> {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Telemetry payload was not JSON — dropping");
            return Vec::new();
        }
    };

    let Some(items) = value.as_array() else {
        tracing::warn!("Telemetry payload was not a JSON array — dropping");
        return Vec::new();
    };

    items
        .iter()
        .map(|item| TelemetryEntry {
            timestamp: item
                .get("timestamp")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(now_iso),
            level: item
                .get("level")
                .and_then(|v| v.as_str())
                .map(LogLevel::from_str_lossy)
                .unwrap_or(LogLevel::Info),
            subsystem: item
                .get("subsystem")
                .and_then(|v| v.as_str())
                .unwrap_or("CORE")
                .to_string(),
            message: item
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("No message")
                .to_string(),
        })
        .take(MAX_ENTRIES)
        .collect()
}

/// Deterministic telemetry snapshot for local mode: reports the state of
/// the routing layer itself rather than asking a model to invent one.
pub fn local_snapshot(tier: BackendTier) -> Vec<TelemetryEntry> {
    let entry = |level: LogLevel, subsystem: &str, message: String| TelemetryEntry {
        timestamp: now_iso(),
        level,
        subsystem: subsystem.to_string(),
        message,
    };

    vec![
        entry(
            LogLevel::Info,
            "CORE",
            "Local inference engine online. Zero-entropy substrate nominal.".to_string(),
        ),
        entry(
            LogLevel::Info,
            "ROUTER",
            "Remote backend unavailable — operating in local mode.".to_string(),
        ),
        entry(
            LogLevel::Info,
            "HARDWARE",
            format!("Detected compute tier: {tier}."),
        ),
        entry(
            LogLevel::Warn,
            "INTEL",
            "Search grounding degraded to local knowledge base.".to_string(),
        ),
        entry(
            LogLevel::Info,
            "SAFETY",
            "Boundary pattern tables loaded.".to_string(),
        ),
    ]
}

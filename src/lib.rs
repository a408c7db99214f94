//! AxiomHive model-routing core.
//!
//! Routes text-generation requests between the hosted Gemini API and a
//! deterministic local inference stub. The router exposes a stable surface
//! (`process_command`, `search_intel`, `recursive_query`, `grounded_query`,
//! `system_telemetry`) regardless of which backend serves a call:
//!
//! - **Remote**: single-shot `generateContent` calls with configurable
//!   temperature, thinking budget, and search grounding.
//! - **Local**: an offline responder sized from the detected hardware tier
//!   that fabricates plausible text and timing without any network I/O.
//!
//! Fallback is one-shot — remote is attempted at most once per call, and on
//! any failure the local stub (which never fails) answers instead. Every
//! result is tagged with the backend that produced it; a pre-call safety
//! gate blocks banned inputs before they reach either backend.

pub mod config;
pub mod error;
pub mod hardware;
pub mod local;
pub mod remote;
pub mod router;
pub mod safety;
pub mod telemetry;
pub mod types;

pub use config::RouterConfig;
pub use error::{RemoteError, RouterError};
pub use hardware::BackendTier;
pub use router::{ActiveBackend, AxiomRouter, ModelSelection};
pub use safety::{SafetyGate, SafetyVerdict};
pub use types::{InferenceRequest, InferenceResult, SourceBackend};

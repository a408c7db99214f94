//! Hardware/capability detection for the local inference stub.
//!
//! Tier detection is a pure function of an environment snapshot — no
//! side effects, no network I/O. The size and quantization tables map a
//! tier to recommended local-model parameters, falling back to the most
//! conservative choice (smallest model, most aggressive quantization)
//! for anything unknown.

use serde::{Deserialize, Serialize};

/// Compute class available to the local stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendTier {
    Cpu,
    Gpu,
    Npu,
    /// Multiple accelerators available simultaneously.
    Hybrid,
}

impl BackendTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Npu => "npu",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for BackendTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local model size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// Relative latency multiplier for the synthetic timing model.
    pub fn latency_multiplier(self) -> f64 {
        match self {
            Self::Tiny => 0.3,
            Self::Small => 0.6,
            Self::Medium => 1.0,
            Self::Large => 1.8,
        }
    }

    /// Rough resident-memory band for a model of this size.
    pub fn estimated_memory(self) -> &'static str {
        match self {
            Self::Tiny => "100-200MB",
            Self::Small => "500MB-1GB",
            Self::Medium => "2-4GB",
            Self::Large => "6-13GB",
        }
    }
}

/// Weight quantization scheme for the local model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    None,
    Int8,
    Int4,
    Fp16,
}

impl Quantization {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int8 => "int8",
            Self::Int4 => "int4",
            Self::Fp16 => "fp16",
        }
    }

    /// Latency factor for the synthetic timing model. Aggressive 4-bit
    /// quantization trades fidelity for a speedup.
    pub fn latency_factor(self) -> f64 {
        match self {
            Self::Int4 => 0.7,
            _ => 1.0,
        }
    }
}

/// Detect the available compute tier from forced-capability flags.
///
/// Both flags set means multiple accelerators are claimed, which reports
/// the hybrid tier. No flags means CPU — the conservative default.
pub fn detect_backend_tier(force_gpu: bool, force_npu: bool) -> BackendTier {
    match (force_gpu, force_npu) {
        (true, true) => BackendTier::Hybrid,
        (true, false) => BackendTier::Gpu,
        (false, true) => BackendTier::Npu,
        (false, false) => BackendTier::Cpu,
    }
}

/// Recommended local-model size for a tier.
pub fn recommended_model_size(tier: BackendTier) -> ModelSize {
    match tier {
        // NPUs and hybrid setups handle larger models efficiently.
        BackendTier::Npu | BackendTier::Hybrid => ModelSize::Large,
        // GPUs balance speed against memory.
        BackendTier::Gpu => ModelSize::Medium,
        // CPU-only hosts need smaller models.
        BackendTier::Cpu => ModelSize::Small,
    }
}

/// Recommended quantization for a tier.
pub fn recommended_quantization(tier: BackendTier) -> Quantization {
    match tier {
        BackendTier::Npu | BackendTier::Hybrid => Quantization::Int8,
        BackendTier::Gpu => Quantization::Fp16,
        BackendTier::Cpu => Quantization::Int4,
    }
}

/// Milliseconds of synthetic latency per token for a tier.
pub fn per_token_cost_ms(tier: BackendTier) -> f64 {
    match tier {
        BackendTier::Cpu => 50.0,
        BackendTier::Gpu => 10.0,
        BackendTier::Npu => 5.0,
        BackendTier::Hybrid => 8.0,
    }
}

/// Snapshot of the host, probed once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub logical_cores: usize,
    pub total_memory_mb: u64,
}

impl HostSnapshot {
    /// Probe the host for CPU and RAM figures.
    pub fn capture() -> Self {
        let sys = sysinfo::System::new_all();
        Self {
            logical_cores: sys.cpus().len().max(1),
            total_memory_mb: sys.total_memory() / (1024 * 1024),
        }
    }

    /// Thread count for CPU inference: up to four, bounded by the host.
    pub fn recommended_thread_count(&self) -> usize {
        self.logical_cores.min(4)
    }
}

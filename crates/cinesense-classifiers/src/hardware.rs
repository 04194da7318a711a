//! Hardware capability detection and tier recommendation
//!
//! Detection is a pure function of five boolean probes. The probes
//! themselves live behind [`CapabilityProbe`] so deployments can pin flags
//! and tests can enumerate every combination.

use crate::config::HardwareOverrides;
use candle_core::Device;
use cinesense_core::RuntimeTier;
use serde::Serialize;
use std::path::PathBuf;

const BASELINE_SCORE: i32 = 10;
const GPU_BONUS: i32 = 30;
const NEURAL_ACCELERATOR_BONUS: i32 = 25;
const VECTOR_BONUS: i32 = 15;
const RUNTIME_GPU_BONUS: i32 = 40;
const RUNTIME_ACCELERATOR_BONUS: i32 = 35;
const DISTRIBUTION_BONUS: i32 = 5;

/// Raw probe outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeFlags {
    pub gpu: bool,
    pub neural_accelerator: bool,
    pub vector_optimization: bool,
    pub accelerated_runtime: bool,
    pub distribution_service: bool,
}

impl ProbeFlags {
    /// Apply pinned overrides on top of probed values
    pub fn with_overrides(self, overrides: &HardwareOverrides) -> Self {
        Self {
            gpu: overrides.gpu.unwrap_or(self.gpu),
            neural_accelerator: overrides
                .neural_accelerator
                .unwrap_or(self.neural_accelerator),
            vector_optimization: overrides
                .vector_optimization
                .unwrap_or(self.vector_optimization),
            accelerated_runtime: overrides
                .accelerated_runtime
                .unwrap_or(self.accelerated_runtime),
            distribution_service: overrides
                .distribution_service
                .unwrap_or(self.distribution_service),
        }
    }

    /// Build flags from the low five bits of `bits` (gpu = bit 0 ... distribution = bit 4)
    pub fn from_bits(bits: u8) -> Self {
        Self {
            gpu: bits & 0b00001 != 0,
            neural_accelerator: bits & 0b00010 != 0,
            vector_optimization: bits & 0b00100 != 0,
            accelerated_runtime: bits & 0b01000 != 0,
            distribution_service: bits & 0b10000 != 0,
        }
    }
}

/// Immutable snapshot of the host's acceleration features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HardwareCapabilities {
    pub gpu: bool,
    pub neural_accelerator: bool,
    pub vector_optimization: bool,
    pub accelerated_runtime: bool,
    pub distribution_service: bool,
    /// Bounded to `[0, 100]`
    pub performance_score: u8,
    pub recommended_tier: RuntimeTier,
}

impl HardwareCapabilities {
    /// Derive score and tier from probe flags
    pub fn from_flags(flags: ProbeFlags) -> Self {
        Self {
            gpu: flags.gpu,
            neural_accelerator: flags.neural_accelerator,
            vector_optimization: flags.vector_optimization,
            accelerated_runtime: flags.accelerated_runtime,
            distribution_service: flags.distribution_service,
            performance_score: performance_score(&flags),
            recommended_tier: recommend_tier(&flags),
        }
    }

    pub fn flags(&self) -> ProbeFlags {
        ProbeFlags {
            gpu: self.gpu,
            neural_accelerator: self.neural_accelerator,
            vector_optimization: self.vector_optimization,
            accelerated_runtime: self.accelerated_runtime,
            distribution_service: self.distribution_service,
        }
    }

    /// Capabilities of a host with nothing detected
    pub fn none() -> Self {
        Self::from_flags(ProbeFlags::default())
    }
}

/// Additive score, clamped to `[0, 100]`
pub fn performance_score(flags: &ProbeFlags) -> u8 {
    let mut score = BASELINE_SCORE;
    if flags.gpu {
        score += GPU_BONUS;
    }
    if flags.neural_accelerator {
        score += NEURAL_ACCELERATOR_BONUS;
    }
    if flags.vector_optimization {
        score += VECTOR_BONUS;
    }
    if flags.accelerated_runtime && flags.gpu {
        score += RUNTIME_GPU_BONUS;
    }
    if flags.accelerated_runtime && flags.neural_accelerator {
        score += RUNTIME_ACCELERATOR_BONUS;
    }
    if flags.distribution_service {
        score += DISTRIBUTION_BONUS;
    }
    score.clamp(0, 100) as u8
}

/// Decision table; the first matching row wins
pub fn recommend_tier(flags: &ProbeFlags) -> RuntimeTier {
    let runtime_ready = flags.accelerated_runtime && flags.distribution_service;

    if runtime_ready && flags.gpu {
        RuntimeTier::AcceleratedTop
    } else if runtime_ready && flags.neural_accelerator {
        RuntimeTier::AcceleratedSecondary
    } else if flags.gpu {
        RuntimeTier::GpuCpu
    } else if flags.neural_accelerator {
        RuntimeTier::CpuVector
    } else if flags.vector_optimization {
        RuntimeTier::CpuBasic
    } else {
        RuntimeTier::KeywordFallback
    }
}

/// Source of the five environment probes
pub trait CapabilityProbe: Send + Sync {
    fn gpu(&self) -> bool;
    fn neural_accelerator(&self) -> bool;
    fn vector_optimization(&self) -> bool;
    fn accelerated_runtime(&self) -> bool;
    fn distribution_service(&self) -> bool;
}

/// Fixed probe results
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticProbe(pub ProbeFlags);

impl CapabilityProbe for StaticProbe {
    fn gpu(&self) -> bool {
        self.0.gpu
    }
    fn neural_accelerator(&self) -> bool {
        self.0.neural_accelerator
    }
    fn vector_optimization(&self) -> bool {
        self.0.vector_optimization
    }
    fn accelerated_runtime(&self) -> bool {
        self.0.accelerated_runtime
    }
    fn distribution_service(&self) -> bool {
        self.0.distribution_service
    }
}

/// Probes the running host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl CapabilityProbe for SystemProbe {
    fn gpu(&self) -> bool {
        candle_core::utils::cuda_is_available() && Device::new_cuda(0).is_ok()
    }

    fn neural_accelerator(&self) -> bool {
        candle_core::utils::metal_is_available() && Device::new_metal(0).is_ok()
    }

    fn vector_optimization(&self) -> bool {
        use candle_core::utils;
        utils::with_avx()
            || utils::with_neon()
            || utils::with_simd128()
            || utils::has_mkl()
            || utils::has_accelerate()
    }

    fn accelerated_runtime(&self) -> bool {
        if cfg!(target_os = "macos") {
            return true;
        }
        ["CUDA_HOME", "CUDA_PATH"]
            .iter()
            .filter_map(|name| std::env::var_os(name))
            .map(PathBuf::from)
            .chain(std::iter::once(PathBuf::from("/usr/local/cuda")))
            .any(|dir| dir.is_dir())
    }

    fn distribution_service(&self) -> bool {
        std::env::var_os("HF_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::cache_dir().map(|d| d.join("huggingface")))
            .map(|dir| dir.is_dir())
            .unwrap_or(false)
    }
}

/// Runs the probes and derives [`HardwareCapabilities`]
pub struct HardwareCapabilityDetector {
    probe: Box<dyn CapabilityProbe>,
    overrides: HardwareOverrides,
}

impl HardwareCapabilityDetector {
    /// Detector over the running host
    pub fn new() -> Self {
        Self::with_probe(Box::new(SystemProbe))
    }

    /// Detector over a custom probe
    pub fn with_probe(probe: Box<dyn CapabilityProbe>) -> Self {
        Self {
            probe,
            overrides: HardwareOverrides::default(),
        }
    }

    /// Pin flags regardless of what the probe reports
    pub fn with_overrides(mut self, overrides: HardwareOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Probe the environment. Any probe that panics counts as `false`.
    pub fn detect(&self) -> HardwareCapabilities {
        let probe = self.probe.as_ref();
        let flags = ProbeFlags {
            gpu: guarded("gpu", || probe.gpu()),
            neural_accelerator: guarded("neural_accelerator", || probe.neural_accelerator()),
            vector_optimization: guarded("vector_optimization", || probe.vector_optimization()),
            accelerated_runtime: guarded("accelerated_runtime", || probe.accelerated_runtime()),
            distribution_service: guarded("distribution_service", || {
                probe.distribution_service()
            }),
        }
        .with_overrides(&self.overrides);

        let capabilities = HardwareCapabilities::from_flags(flags);
        tracing::info!(
            gpu = capabilities.gpu,
            neural_accelerator = capabilities.neural_accelerator,
            vector_optimization = capabilities.vector_optimization,
            accelerated_runtime = capabilities.accelerated_runtime,
            distribution_service = capabilities.distribution_service,
            score = capabilities.performance_score,
            tier = %capabilities.recommended_tier,
            "Hardware capabilities detected"
        );
        capabilities
    }
}

impl Default for HardwareCapabilityDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn guarded(name: &str, probe: impl FnOnce() -> bool) -> bool {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(probe)) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(probe = name, "Capability probe panicked, treating as unavailable");
            false
        }
    }
}

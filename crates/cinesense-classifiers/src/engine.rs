//! Execution contexts for neural inference
//!
//! An [`InferenceEngine`] turns a padded id sequence into raw logits. The
//! Candle implementation runs a BERT encoder with a pooler and a
//! classification head over memory-mapped safetensors weights.

use crate::assets::ModelAssets;
use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use cinesense_core::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Where an engine executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTarget {
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl ExecutionTarget {
    pub fn is_accelerated(&self) -> bool {
        !matches!(self, Self::Cpu)
    }

    fn device(&self) -> Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda(idx) => Device::new_cuda(*idx)
                .map_err(|e| Error::initialization(format!("Failed to create CUDA device: {e}"))),
            Self::Metal(idx) => Device::new_metal(*idx)
                .map_err(|e| Error::initialization(format!("Failed to create Metal device: {e}"))),
        }
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(idx) => write!(f, "cuda:{idx}"),
            Self::Metal(idx) => write!(f, "metal:{idx}"),
        }
    }
}

/// Execution-context settings derived from the integration config and capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionOptions {
    pub target: ExecutionTarget,
    pub num_threads: usize,
    /// Vector-optimized CPU kernels
    pub vector_delegate: bool,
    /// Hardware accelerator delegate
    pub accelerator_delegate: bool,
}

impl ExecutionOptions {
    /// CPU execution with the given thread budget, capped at the host's core count
    pub fn cpu(num_threads: usize, vector_delegate: bool) -> Self {
        Self {
            target: ExecutionTarget::Cpu,
            num_threads: num_threads.clamp(1, num_cpus::get().max(1)),
            vector_delegate,
            accelerator_delegate: false,
        }
    }

    /// Names of the delegates this context runs with
    pub fn delegates(&self) -> Vec<&'static str> {
        let mut delegates = Vec::new();
        if self.vector_delegate {
            delegates.push("vector");
        }
        if self.accelerator_delegate {
            delegates.push("accelerator");
        }
        delegates
    }

    /// Threads Candle's CPU pool actually runs with.
    ///
    /// The pool is process-wide and sized from `RAYON_NUM_THREADS` on first
    /// use, so the requested budget is only reported against it.
    pub fn effective_threads(&self) -> usize {
        if self.target.is_accelerated() {
            return self.num_threads;
        }
        let effective = candle_core::utils::get_num_threads();
        if effective != self.num_threads {
            tracing::warn!(
                requested = self.num_threads,
                effective,
                "CPU thread budget differs from the process pool; set RAYON_NUM_THREADS to change it"
            );
        }
        effective
    }
}

/// A ready-to-run model
pub trait InferenceEngine: Send + Sync {
    /// Raw logits for one sequence. `input_ids` and `attention_mask` have equal length.
    fn forward(&self, input_ids: &[u32], attention_mask: &[u32]) -> Result<Vec<f32>>;

    /// Where the engine runs
    fn target(&self) -> ExecutionTarget;
}

/// Builds engines from loaded assets
pub trait EngineLoader: Send + Sync {
    fn load(&self, assets: &ModelAssets, options: &ExecutionOptions) -> Result<Box<dyn InferenceEngine>>;
}

/// Loads [`CandleBertEngine`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct CandleEngineLoader;

impl EngineLoader for CandleEngineLoader {
    fn load(&self, assets: &ModelAssets, options: &ExecutionOptions) -> Result<Box<dyn InferenceEngine>> {
        Ok(Box::new(CandleBertEngine::load(assets, options)?))
    }
}

/// BERT sequence classifier running on Candle
pub struct CandleBertEngine {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    device: Device,
    target: ExecutionTarget,
}

impl CandleBertEngine {
    pub fn load(assets: &ModelAssets, options: &ExecutionOptions) -> Result<Self> {
        let architecture = assets
            .integration
            .architecture
            .clone()
            .ok_or_else(|| Error::config("integration config has no architecture section"))?;
        let hidden_size = architecture
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::config("architecture.hidden_size is required"))?
            as usize;
        let bert_config: BertConfig = serde_json::from_value(architecture)?;
        let num_labels = assets.integration.num_labels();

        let threads = options.effective_threads();

        let device = options.target.device()?;

        // SAFETY: mmap'd safetensors file; safe as long as the file is not
        // modified while the model is in use.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&assets.model_path], DType::F32, &device)
                .map_err(|e| Error::initialization(format!("Failed to load weights: {e}")))?
        };

        let bert = BertModel::load(vb.pp("bert"), &bert_config)
            .map_err(|e| Error::initialization(format!("Failed to load BERT encoder: {e}")))?;
        let pooler = candle_nn::linear(hidden_size, hidden_size, vb.pp("bert.pooler.dense"))
            .map_err(|e| Error::initialization(format!("Failed to load pooler: {e}")))?;
        let classifier = candle_nn::linear(hidden_size, num_labels, vb.pp("classifier"))
            .map_err(|e| Error::initialization(format!("Failed to load classifier head: {e}")))?;

        tracing::info!(
            device = %options.target,
            threads,
            delegates = ?options.delegates(),
            hidden_size,
            num_labels,
            "BERT sequence classifier loaded"
        );

        Ok(Self {
            bert,
            pooler,
            classifier,
            device,
            target: options.target,
        })
    }

    fn logits(&self, input_ids: &[u32], attention_mask: &[u32]) -> candle_core::Result<Vec<f32>> {
        let ids = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = ids.zeros_like()?;
        let mask = Tensor::new(attention_mask, &self.device)?.unsqueeze(0)?;

        let hidden = self.bert.forward(&ids, &token_type_ids, Some(&mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(0)?;

        logits.to_dtype(DType::F32)?.to_vec1::<f32>()
    }
}

impl InferenceEngine for CandleBertEngine {
    fn forward(&self, input_ids: &[u32], attention_mask: &[u32]) -> Result<Vec<f32>> {
        if input_ids.len() != attention_mask.len() {
            return Err(Error::inference(format!(
                "input_ids ({}) and attention_mask ({}) differ in length",
                input_ids.len(),
                attention_mask.len()
            )));
        }
        self.logits(input_ids, attention_mask)
            .map_err(|e| Error::inference(format!("Model forward pass failed: {e}")))
    }

    fn target(&self) -> ExecutionTarget {
        self.target
    }
}

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokenizers::Tokenizer;

/// A Hugging Face model directory: `config.json`, `tokenizer.json` and either
/// `model.safetensors` or `pytorch_model.bin`.
pub(crate) struct ModelFiles {
    pub config_json: String,
    pub tokenizer: Tokenizer,
    pub vb: VarBuilder<'static>,
}

/// The handful of `config.json` fields read outside the model itself.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelDims {
    pub hidden_size: usize,
    #[serde(default = "default_positions")]
    pub max_position_embeddings: usize,
}

fn default_positions() -> usize {
    512
}

pub(crate) fn load_model_dir(dir: &Path, device: &Device) -> Result<ModelFiles> {
    if !dir.is_dir() {
        bail!("model directory {} does not exist", dir.display());
    }

    let tokenizer_path = dir.join("tokenizer.json");
    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

    let config_path = dir.join("config.json");
    let config_json = std::fs::read_to_string(&config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;

    let weights = load_weights(dir, device)?;
    let vb = VarBuilder::from_tensors(weights, DType::F32, device);
    Ok(ModelFiles { config_json, tokenizer, vb })
}

fn load_weights(dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = dir.join("model.safetensors");
    if safetensors.exists() {
        tracing::debug!(path = %safetensors.display(), "loading safetensors weights");
        return candle_core::safetensors::load(&safetensors, device)
            .with_context(|| format!("reading {}", safetensors.display()));
    }
    let pickle = dir.join("pytorch_model.bin");
    if pickle.exists() {
        tracing::debug!(path = %pickle.display(), "loading pytorch weights");
        let weights = candle_core::pickle::read_all(&pickle)
            .with_context(|| format!("reading {}", pickle.display()))?;
        return Ok(weights.into_iter().collect());
    }
    bail!("no model.safetensors or pytorch_model.bin in {}", dir.display())
}

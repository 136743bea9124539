use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::Instant;

use atp_core::Embedder;
use candle_core::{Device, Tensor};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_texts;
use crate::weights::{load_model_dir, ModelDims};

/// Output width of the all-MiniLM-L6-v2 family.
pub const MINILM_DIM: usize = 384;

const EMBED_CHUNK: usize = 32;

/// Mean-pooled, L2-normalised BERT sentence embeddings.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl SentenceEmbedder {
    pub fn load(dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %dir.display(), "loading sentence embedder");
        let files = load_model_dir(dir, &device)?;
        let config: BertConfig = serde_json::from_str(&files.config_json)?;
        let dims: ModelDims = serde_json::from_str(&files.config_json)?;
        let dim = dims.hidden_size;
        let max_len = max_len.min(dims.max_position_embeddings);
        let model = BertModel::load(files.vb, &config)?;
        Ok(Self { model, tokenizer: files.tokenizer, device, dim, max_len })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = tokenize_texts(&self.tokenizer, texts, self.max_len, &self.device)?;
        let hidden = self
            .model
            .forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled: Tensor = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for SentenceEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(EMBED_CHUNK) {
            out.extend(self.embed_chunk(chunk)?);
        }
        tracing::debug!(
            n = texts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "embedded batch"
        );
        Ok(out)
    }
}

/// Hash-bucket embedder for tests and model-less development. Identical text
/// always yields the identical unit vector.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The configured sentence embedder, or [`FakeEmbedder`] when
/// `APP_USE_FAKE_EMBEDDINGS` is set.
pub fn get_default_embedder(dir: &Path, max_len: usize) -> Result<Box<dyn Embedder>> {
    if env_flag("APP_USE_FAKE_EMBEDDINGS") {
        tracing::warn!("using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(MINILM_DIM)));
    }
    let embedder = SentenceEmbedder::load(dir, max_len)
        .map_err(|e| anyhow!("failed to load embedder from {}: {e:#}", dir.display()))?;
    Ok(Box::new(embedder))
}

//! Cross-encoder relevance scoring.
//!
//! [`CrossEncoder`] runs a BERT sequence-classification checkpoint (the
//! ms-marco MiniLM family) over `[CLS] query [SEP] document [SEP]` and returns
//! the raw single-label logit per pair. Scores are only meaningful relative to
//! each other within one call.

use anyhow::{ensure, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use atp_core::{Error, Reranker};
use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use crate::device::select_device;
use crate::embedder::env_flag;
use crate::tokenize::tokenize_pairs;
use crate::weights::{load_model_dir, ModelDims};

pub struct CrossEncoder {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    batch_size: usize,
}

impl CrossEncoder {
    pub fn load(dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %dir.display(), "loading cross-encoder");
        let files = load_model_dir(dir, &device)?;
        Self::new(&files.config_json, files.tokenizer, files.vb, device, max_len, batch_size)
    }

    /// Build from an already-opened weight source. `vb` is rooted at the
    /// checkpoint top level (`bert.*`, `classifier.*`).
    pub fn new(
        config_json: &str,
        tokenizer: Tokenizer,
        vb: VarBuilder,
        device: Device,
        max_len: usize,
        batch_size: usize,
    ) -> Result<Self> {
        ensure!(batch_size > 0, "batch_size must be positive");
        let config: BertConfig = serde_json::from_str(config_json)?;
        let dims: ModelDims = serde_json::from_str(config_json)?;
        let hidden = dims.hidden_size;

        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = linear(hidden, 1, vb.pp("classifier"))?;
        Ok(Self {
            bert,
            pooler,
            classifier,
            tokenizer,
            device,
            max_len: max_len.min(dims.max_position_embeddings),
            batch_size,
        })
    }

    fn score_chunk(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        let batch = tokenize_pairs(&self.tokenizer, pairs, self.max_len, &self.device)?;
        let hidden = self
            .bert
            .forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits: Tensor = self.classifier.forward(&pooled)?.squeeze(1)?;
        let scores: Vec<f32> = logits.to_device(&Device::Cpu)?.to_vec1()?;
        ensure!(
            scores.len() == pairs.len(),
            "model returned {} scores for {} pairs",
            scores.len(),
            pairs.len()
        );
        Ok(scores)
    }
}

impl Reranker for CrossEncoder {
    fn predict(&self, pairs: &[(String, String)]) -> atp_core::Result<Vec<f32>> {
        let start = Instant::now();
        let mut scores = Vec::with_capacity(pairs.len());
        for chunk in pairs.chunks(self.batch_size) {
            let part = self
                .score_chunk(chunk)
                .map_err(|e| Error::RerankerInference(format!("{e:#}")))?;
            scores.extend(part);
        }
        tracing::debug!(
            pairs = pairs.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "cross-encoder scored"
        );
        Ok(scores)
    }
}

/// Term-overlap scorer standing in for the cross-encoder in tests: the share
/// of distinct query terms that occur in the document.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeCrossEncoder;

impl FakeCrossEncoder {
    fn terms(text: &str) -> BTreeSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn score(query: &str, document: &str) -> f32 {
        let wanted = Self::terms(query);
        if wanted.is_empty() {
            return 0.0;
        }
        let present = Self::terms(document);
        wanted.intersection(&present).count() as f32 / wanted.len() as f32
    }
}

impl Reranker for FakeCrossEncoder {
    fn predict(&self, pairs: &[(String, String)]) -> atp_core::Result<Vec<f32>> {
        Ok(pairs.iter().map(|(q, d)| Self::score(q, d)).collect())
    }
}

/// The configured cross-encoder, or [`FakeCrossEncoder`] when
/// `APP_USE_FAKE_RERANKER` is set.
pub fn load_reranker(
    dir: &Path,
    max_len: usize,
    batch_size: usize,
) -> atp_core::Result<Box<dyn Reranker>> {
    if env_flag("APP_USE_FAKE_RERANKER") {
        tracing::warn!("using FakeCrossEncoder");
        return Ok(Box::new(FakeCrossEncoder));
    }
    let model = CrossEncoder::load(dir, max_len, batch_size)
        .map_err(|e| Error::RerankerUnavailable(format!("{}: {e:#}", dir.display())))?;
    Ok(Box::new(model))
}

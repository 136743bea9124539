use anyhow::{anyhow, ensure, Result};
use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer};

/// Padded `[B, T]` model inputs. `T` is the longest row after truncation.
pub struct TokenBatch {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

pub fn tokenize_texts(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    device: &Device,
) -> Result<TokenBatch> {
    let encodings = texts
        .iter()
        .map(|t| tokenizer.encode(t.as_str(), true))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    pad_batch(tokenizer, &encodings, max_len, device)
}

/// `[CLS] query [SEP] document [SEP]` encodings for a cross-encoder.
pub fn tokenize_pairs(
    tokenizer: &Tokenizer,
    pairs: &[(String, String)],
    max_len: usize,
    device: &Device,
) -> Result<TokenBatch> {
    let encodings = pairs
        .iter()
        .map(|(q, d)| tokenizer.encode((q.as_str(), d.as_str()), true))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    pad_batch(tokenizer, &encodings, max_len, device)
}

fn pad_batch(
    tokenizer: &Tokenizer,
    encodings: &[Encoding],
    max_len: usize,
    device: &Device,
) -> Result<TokenBatch> {
    ensure!(!encodings.is_empty(), "cannot build an empty token batch");
    ensure!(max_len >= 2, "max_len must leave room for special tokens");
    let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

    let rows: Vec<(Vec<u32>, Vec<u32>, Vec<u32>)> = encodings
        .iter()
        .map(|enc| {
            let mut ids = enc.get_ids().to_vec();
            let mut types = enc.get_type_ids().to_vec();
            let mut mask = enc.get_attention_mask().to_vec();
            truncate_keep_last(&mut ids, max_len);
            truncate_keep_last(&mut types, max_len);
            truncate_keep_last(&mut mask, max_len);
            (ids, types, mask)
        })
        .collect();
    let width = rows.iter().map(|(ids, _, _)| ids.len()).max().unwrap_or(0);

    let mut ids_flat = Vec::with_capacity(rows.len() * width);
    let mut types_flat = Vec::with_capacity(rows.len() * width);
    let mut mask_flat = Vec::with_capacity(rows.len() * width);
    for (ids, types, mask) in rows {
        let pad = width - ids.len();
        ids_flat.extend(ids.into_iter().chain(std::iter::repeat(pad_id).take(pad)));
        types_flat.extend(types.into_iter().chain(std::iter::repeat(0).take(pad)));
        mask_flat.extend(mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }

    let shape = (encodings.len(), width);
    Ok(TokenBatch {
        input_ids: Tensor::from_vec(ids_flat, shape, device)?,
        token_type_ids: Tensor::from_vec(types_flat, shape, device)?,
        attention_mask: Tensor::from_vec(mask_flat, shape, device)?,
    })
}

/// Cut to `max_len` while keeping the final token, which is the closing
/// `[SEP]` for BERT-style encodings.
fn truncate_keep_last(v: &mut Vec<u32>, max_len: usize) {
    if v.len() <= max_len {
        return;
    }
    let last = v[v.len() - 1];
    v.truncate(max_len - 1);
    v.push(last);
}

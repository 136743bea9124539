use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Mean of the unmasked token vectors, then L2-normalised per row.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]` of any numeric dtype.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, time, hidden_dim) = hidden.dims3()?;
    ensure!(
        attention_mask.dims() == [batch, time],
        "attention mask {:?} does not match hidden states [{batch}, {time}, _]",
        attention_mask.dims()
    );

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let lengths = mask.sum_keepdim(1)?;
    let mean = summed.broadcast_div(&lengths)?;

    let eps = match hidden.dtype() {
        DType::F16 | DType::BF16 => 1e-6,
        _ => 1e-12,
    };
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let pooled = mean.broadcast_div(&norm)?;
    ensure!(pooled.dims() == [batch, hidden_dim], "pooled shape {:?}", pooled.dims());
    Ok(pooled)
}

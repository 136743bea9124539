//! Candle-backed models for transcript search: a sentence embedder for the
//! query side of vector retrieval and a cross-encoder for reranking.

pub mod cross_encoder;
pub mod device;
pub mod embedder;
pub mod pool;
pub mod tokenize;
mod weights;

pub use cross_encoder::{load_reranker, CrossEncoder, FakeCrossEncoder};
pub use device::select_device;
pub use embedder::{get_default_embedder, FakeEmbedder, SentenceEmbedder, MINILM_DIM};
pub use pool::masked_mean_l2;

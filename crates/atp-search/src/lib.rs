//! Retrieval and rerank pipeline plus Markdown result formatting.

pub mod format;
pub mod pipeline;

pub use format::{format_results, title_case, NO_RESULTS};
pub use pipeline::SearchPipeline;

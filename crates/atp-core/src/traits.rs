use crate::error::Result;
use crate::filter::{DocumentFilter, WhereClause};
use crate::types::ResultSet;

/// Query-side embedding model.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A read-only collection of embedded transcript chunks.
pub trait VectorIndex: Send + Sync {
    /// Nearest-neighbour search for `text`, at most `n_results` hits ordered by
    /// ascending distance.
    fn query(
        &self,
        text: &str,
        n_results: usize,
        filter: Option<&WhereClause>,
        document: Option<&DocumentFilter>,
    ) -> Result<ResultSet>;

    /// Filtered fetch in index order, without distances.
    fn get(
        &self,
        filter: Option<&WhereClause>,
        document: Option<&DocumentFilter>,
        limit: usize,
    ) -> Result<ResultSet>;
}

/// Cross-encoder relevance model: one score per `(query, document)` pair,
/// in input order. Higher is more relevant.
pub trait Reranker: Send + Sync {
    fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>>;
}

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use atp_core::config::SearchSettings;
use atp_core::{Error, Hit, QueryRequest, Reranker, Result, ResultSet, VectorIndex};

/// Bi-encoder retrieval followed by optional cross-encoder reranking.
///
/// Holds shared, read-only handles; one pipeline serves concurrent requests.
pub struct SearchPipeline {
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    limits: SearchSettings,
}

impl SearchPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        limits: SearchSettings,
    ) -> Self {
        Self { index, reranker, limits }
    }

    pub fn limits(&self) -> &SearchSettings {
        &self.limits
    }

    /// Run one search. Non-empty query text goes to nearest-neighbour search;
    /// empty text becomes a filtered fetch with null distances. Reranking only
    /// applies to non-empty queries.
    pub fn retrieve(&self, request: &QueryRequest) -> Result<ResultSet> {
        let start = Instant::now();
        let cap = request.n_results.min(self.limits.max_results);
        let text = request.query_text();
        let filter = request.where_clause();
        let document = request.document_filter();
        let mode = if text.is_empty() { "get" } else { "query" };

        tracing::info!(
            query = text,
            cap,
            mode,
            filter = %filter.as_ref().map(|f| f.to_json()).unwrap_or_default(),
            where_document = %document.as_ref().map(|d| d.to_json()).unwrap_or_default(),
            "retrieving"
        );

        if cap == 0 {
            return Ok(ResultSet::empty());
        }

        let raw = if text.is_empty() {
            self.index.get(filter.as_ref(), document.as_ref(), cap)?
        } else {
            self.index.query(text, cap, filter.as_ref(), document.as_ref())?
        };
        tracing::info!(
            hits = raw.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "retrieved"
        );

        if request.rerank && !text.is_empty() {
            return self.rerank(text, raw, request.rerank_n_results);
        }
        Ok(raw)
    }

    /// Re-score `candidates` against `query`, sort by descending score and
    /// keep the best `cap` (clamped to the configured maximum).
    pub fn rerank(&self, query: &str, candidates: ResultSet, cap: usize) -> Result<ResultSet> {
        let cap = cap.min(self.limits.max_rerank_results);
        if candidates.is_empty() {
            return Ok(candidates);
        }
        if cap == 0 {
            return Ok(ResultSet::reranked(Vec::new()));
        }

        let start = Instant::now();
        let n = candidates.len();
        let pairs: Vec<(String, String)> = candidates
            .hits()
            .iter()
            .map(|h| (query.to_string(), h.document.clone()))
            .collect();
        let scores = self.reranker.predict(&pairs)?;
        if scores.len() != n {
            return Err(Error::RerankerInference(format!(
                "{} scores for {} candidates",
                scores.len(),
                n
            )));
        }

        let mut hits: Vec<Hit> = candidates
            .into_hits()
            .into_iter()
            .zip(scores)
            .map(|(hit, score)| Hit { score: Some(score), ..hit })
            .collect();
        // Stable: equal scores keep retrieval order.
        hits.sort_by(|a, b| by_score_desc(a.score, b.score));
        hits.truncate(cap);

        tracing::info!(
            query,
            candidates = n,
            cap,
            kept = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "reranked"
        );
        Ok(ResultSet::reranked(hits))
    }
}

/// Descending order with NaN after every number.
fn by_score_desc(a: Option<f32>, b: Option<f32>) -> Ordering {
    let a = a.filter(|s| !s.is_nan());
    let b = b.filter(|s| !s.is_nan());
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_scores_sort_after_numbers() {
        let mut scores = vec![Some(f32::NAN), Some(0.1), Some(-3.0), Some(2.0)];
        scores.sort_by(|a, b| by_score_desc(*a, *b));
        assert_eq!(scores[0], Some(2.0));
        assert_eq!(scores[1], Some(0.1));
        assert_eq!(scores[2], Some(-3.0));
        assert!(scores[3].is_some_and(f32::is_nan));
    }
}

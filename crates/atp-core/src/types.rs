//! Domain types shared by the index backends, the pipeline and the front ends.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::filter::{DocumentFilter, FilterBuilder, FilterField, WhereClause};

pub type ChunkId = String;

/// Metadata attached to every transcript chunk.
///
/// Keys are fixed; any key may be missing. Non-string values coming back from
/// an index (e.g. numeric video ids) are kept as their JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub preacher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub mp4_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub vtt_url: Option<String>,
}

impl ChunkMetadata {
    pub fn get(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::VideoId => self.video_id.as_deref(),
            FilterField::Title => self.title.as_deref(),
            FilterField::Preacher => self.preacher.as_deref(),
            FilterField::Section => self.section.as_deref(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// One candidate chunk in a [`ResultSet`].
///
/// `distance` is the bi-encoder distance (absent for fetches), `score` the
/// cross-encoder relevance (present only after reranking).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: ChunkId,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub distance: Option<f32>,
    pub score: Option<f32>,
}

/// Ordered candidates of one request. Stored record-per-hit so every
/// per-candidate attribute moves together on reorder and truncation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    hits: Vec<Hit>,
    reranked: bool,
}

impl ResultSet {
    pub fn new(hits: Vec<Hit>) -> Self {
        Self { hits, reranked: false }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A set produced by the rerank stage; every hit carries a score.
    pub fn reranked(hits: Vec<Hit>) -> Self {
        Self { hits, reranked: true }
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<Hit> {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn is_reranked(&self) -> bool {
        self.reranked
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.id.as_str())
    }

    /// Builds a set from parallel sequences as returned by a vector index.
    /// `distances: None` marks a fetch, where every distance is null.
    pub fn from_columns(
        ids: Vec<ChunkId>,
        documents: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
        distances: Option<Vec<Option<f32>>>,
    ) -> Result<Self> {
        let n = ids.len();
        let distances = distances.unwrap_or_else(|| vec![None; n]);
        if documents.len() != n || metadatas.len() != n || distances.len() != n {
            return Err(Error::MalformedResult(format!(
                "ids={} documents={} metadatas={} distances={}",
                n,
                documents.len(),
                metadatas.len(),
                distances.len()
            )));
        }
        let hits = ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(distances)
            .map(|(((id, document), metadata), distance)| Hit {
                id,
                document,
                metadata,
                distance,
                score: None,
            })
            .collect();
        Ok(Self::new(hits))
    }

    /// Columnar view in the `QueryResult` layout (outer dimension of one).
    pub fn to_columns(&self) -> QueryColumns {
        let hits = &self.hits;
        QueryColumns {
            ids: vec![hits.iter().map(|h| h.id.clone()).collect()],
            documents: vec![hits.iter().map(|h| h.document.clone()).collect()],
            metadatas: vec![hits.iter().map(|h| h.metadata.clone()).collect()],
            distances: vec![hits.iter().map(|h| h.distance).collect()],
            scores: self.reranked.then(|| vec![hits.iter().map(|h| h.score).collect()]),
        }
    }
}

/// Columnar result layout used on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryColumns {
    pub ids: Vec<Vec<ChunkId>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<ChunkMetadata>>,
    pub distances: Vec<Vec<Option<f32>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<Vec<Option<f32>>>>,
}

impl TryFrom<QueryColumns> for ResultSet {
    type Error = Error;

    fn try_from(columns: QueryColumns) -> Result<Self> {
        let QueryColumns { ids, documents, metadatas, distances, scores } = columns;
        let reranked = scores.is_some();
        let ids = single_row(ids, "ids")?;
        let n = ids.len();
        let scores = match scores {
            Some(s) => single_row(s, "scores")?,
            None => vec![None; n],
        };
        if scores.len() != n {
            return Err(Error::MalformedResult(format!("ids={} scores={}", n, scores.len())));
        }
        let set = Self::from_columns(
            ids,
            single_row(documents, "documents")?,
            single_row(metadatas, "metadatas")?,
            Some(single_row(distances, "distances")?),
        )?;
        let hits = set
            .into_hits()
            .into_iter()
            .zip(scores)
            .map(|(hit, score)| Hit { score, ..hit })
            .collect();
        Ok(Self { hits, reranked })
    }
}

fn single_row<T>(mut outer: Vec<Vec<T>>, name: &str) -> Result<Vec<T>> {
    match outer.len() {
        0 => Ok(Vec::new()),
        1 => Ok(outer.remove(0)),
        n => Err(Error::MalformedResult(format!("{name}: expected one query row, got {n}"))),
    }
}

/// Everything a front end collects for one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    pub filters: FilterBuilder,
    pub document_contains: Option<String>,
    pub n_results: usize,
    pub rerank: bool,
    pub rerank_n_results: usize,
}

impl QueryRequest {
    pub const DEFAULT_RESULTS: usize = 10;

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: FilterBuilder::new(),
            document_contains: None,
            n_results: Self::DEFAULT_RESULTS,
            rerank: false,
            rerank_n_results: Self::DEFAULT_RESULTS,
        }
    }

    #[must_use]
    pub fn with_results(mut self, n: usize) -> Self {
        self.n_results = n;
        self
    }

    #[must_use]
    pub fn with_rerank(mut self, n: usize) -> Self {
        self.rerank = true;
        self.rerank_n_results = n;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, field: FilterField, value: impl AsRef<str>) -> Self {
        self.filters.push(field, value);
        self
    }

    #[must_use]
    pub fn with_document_contains(mut self, needle: impl Into<String>) -> Self {
        self.document_contains = Some(needle.into());
        self
    }

    /// Query text with surrounding whitespace removed; empty means fetch mode.
    pub fn query_text(&self) -> &str {
        self.query.trim()
    }

    pub fn where_clause(&self) -> Option<WhereClause> {
        self.filters.build()
    }

    pub fn document_filter(&self) -> Option<DocumentFilter> {
        self.document_contains.as_deref().and_then(DocumentFilter::contains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: &str) -> ChunkMetadata {
        ChunkMetadata { title: Some(title.to_string()), ..Default::default() }
    }

    #[test]
    fn from_columns_rejects_misaligned_input() {
        let err = ResultSet::from_columns(
            vec!["a".into(), "b".into()],
            vec!["doc a".into()],
            vec![meta("x"), meta("y")],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedResult(_)));
    }

    #[test]
    fn fetch_columns_have_null_distances() {
        let set =
            ResultSet::from_columns(vec!["a".into()], vec!["doc".into()], vec![meta("x")], None)
                .unwrap();
        assert_eq!(set.hits()[0].distance, None);
        assert!(!set.is_reranked());
    }

    #[test]
    fn columns_round_trip_through_json() {
        let hits = vec![
            Hit {
                id: "b".into(),
                document: "two".into(),
                metadata: meta("t2"),
                distance: Some(0.25),
                score: Some(3.5),
            },
            Hit {
                id: "a".into(),
                document: "one".into(),
                metadata: meta("t1"),
                distance: None,
                score: Some(-1.0),
            },
        ];
        let set = ResultSet::reranked(hits);
        let json = serde_json::to_value(set.to_columns()).unwrap();
        assert_eq!(json["ids"], serde_json::json!([["b", "a"]]));
        assert_eq!(json["distances"], serde_json::json!([[0.25, null]]));
        assert_eq!(json["scores"], serde_json::json!([[3.5, -1.0]]));

        let columns: QueryColumns = serde_json::from_value(json).unwrap();
        let back = ResultSet::try_from(columns).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn scores_are_omitted_before_reranking() {
        let set = ResultSet::from_columns(
            vec!["a".into()],
            vec!["doc".into()],
            vec![meta("x")],
            Some(vec![Some(0.1)]),
        )
        .unwrap();
        let json = serde_json::to_value(set.to_columns()).unwrap();
        assert!(json.get("scores").is_none());
    }

    #[test]
    fn metadata_accepts_non_string_values() {
        let m: ChunkMetadata = serde_json::from_value(serde_json::json!({
            "video_id": 1234567, "title": "faith", "extra": true, "section": null
        }))
        .unwrap();
        assert_eq!(m.video_id.as_deref(), Some("1234567"));
        assert_eq!(m.get(FilterField::Title), Some("faith"));
        assert_eq!(m.section, None);
    }

    #[test]
    fn request_helpers_compile_filters() {
        let req = QueryRequest::new("  grace ")
            .with_filter(FilterField::Preacher, "Pastor X")
            .with_document_contains("  ");
        assert_eq!(req.query_text(), "grace");
        assert!(req.where_clause().is_some());
        assert!(req.document_filter().is_none());
    }
}

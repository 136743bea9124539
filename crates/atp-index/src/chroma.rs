//! Chroma (self-hosted or Chroma Cloud) [`VectorIndex`] over the v2 REST API.
//!
//! Query text is embedded locally and sent as `query_embeddings`; filter JSON
//! is passed through as `where` / `where_document`.

use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use atp_core::config::ChromaSettings;
use atp_core::{
    ChunkMetadata, DocumentFilter, Embedder, Error, Result, ResultSet, VectorIndex, WhereClause,
};

const INCLUDE_QUERY: [&str; 3] = ["documents", "metadatas", "distances"];
const INCLUDE_GET: [&str; 2] = ["documents", "metadatas"];

pub struct ChromaIndex {
    client: Client,
    collection_url: String,
    embedder: Box<dyn Embedder>,
}

impl ChromaIndex {
    /// Builds the client and resolves `collection` to its id.
    pub fn open(
        settings: &ChromaSettings,
        collection: &str,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        let unavailable = |e: anyhow::Error| {
            Error::IndexUnavailable(format!("chroma collection '{collection}': {e:#}"))
        };
        let client = build_client(settings).map_err(unavailable)?;
        let base = format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            settings.url.trim_end_matches('/'),
            settings.tenant,
            settings.database
        );

        let info: CollectionInfo = client
            .get(format!("{base}/{collection}"))
            .send()
            .context("collection lookup request failed")
            .and_then(check_status)
            .and_then(|resp| resp.json().context("failed to parse collection response"))
            .map_err(unavailable)?;

        tracing::info!(url = %settings.url, collection, id = %info.id, "opened chroma collection");
        Ok(Self { client, collection_url: format!("{base}/{}", info.id), embedder })
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, op: &str, body: &B) -> Result<T> {
        self.client
            .post(format!("{}/{op}", self.collection_url))
            .json(body)
            .send()
            .with_context(|| format!("chroma {op} request failed"))
            .and_then(check_status)
            .and_then(|resp| {
                resp.json().with_context(|| format!("failed to parse chroma {op} response"))
            })
            .map_err(|e| Error::IndexQuery(format!("{e:#}")))
    }
}

fn build_client(settings: &ChromaSettings) -> anyhow::Result<Client> {
    anyhow::ensure!(
        settings.url.starts_with("http://") || settings.url.starts_with("https://"),
        "chroma url must be an http(s) URL"
    );
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if !settings.api_key.trim().is_empty() {
        let mut token =
            HeaderValue::from_str(settings.api_key.trim()).context("invalid chroma api key")?;
        token.set_sensitive(true);
        headers.insert("x-chroma-token", token);
    }
    Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .default_headers(headers)
        .build()
        .context("failed to build chroma HTTP client")
}

fn check_status(resp: Response) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_else(|_| "<body unavailable>".to_string());
    anyhow::bail!("chroma returned {}: {}", status, body)
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    filter: Option<&'a WhereClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    where_document: Option<&'a DocumentFilter>,
    include: &'a [&'a str],
}

#[derive(Serialize)]
struct GetBody<'a> {
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    filter: Option<&'a WhereClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    where_document: Option<&'a DocumentFilter>,
    limit: usize,
    include: &'a [&'a str],
}

/// Nested (one row per query embedding) columns of a `/query` response.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<ChunkMetadata>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f32>>>>,
}

/// Flat columns of a `/get` response.
#[derive(Debug, Default, Deserialize)]
pub struct GetResponse {
    pub ids: Vec<String>,
    #[serde(default)]
    pub documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Option<ChunkMetadata>>>,
}

fn first_row<T>(rows: Option<Vec<Vec<T>>>, what: &str) -> Result<Option<Vec<T>>> {
    match rows {
        None => Ok(None),
        Some(rows) if rows.len() == 1 => Ok(rows.into_iter().next()),
        Some(rows) => Err(Error::MalformedResult(format!(
            "expected one row of {what}, got {}",
            rows.len()
        ))),
    }
}

fn assemble(
    ids: Vec<String>,
    documents: Option<Vec<Option<String>>>,
    metadatas: Option<Vec<Option<ChunkMetadata>>>,
    distances: Option<Vec<Option<f32>>>,
) -> Result<ResultSet> {
    let n = ids.len();
    let documents = documents
        .unwrap_or_else(|| vec![None; n])
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();
    let metadatas = metadatas
        .unwrap_or_else(|| vec![None; n])
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();
    ResultSet::from_columns(ids, documents, metadatas, distances)
}

impl QueryResponse {
    pub fn into_result_set(self) -> Result<ResultSet> {
        let ids = first_row(Some(self.ids), "ids")?.unwrap_or_default();
        let documents = first_row(self.documents, "documents")?;
        let metadatas = first_row(self.metadatas, "metadatas")?;
        let distances = first_row(self.distances, "distances")?;
        let n = ids.len();
        assemble(ids, documents, metadatas, Some(distances.unwrap_or_else(|| vec![None; n])))
    }
}

impl GetResponse {
    pub fn into_result_set(self) -> Result<ResultSet> {
        assemble(self.ids, self.documents, self.metadatas, None)
    }
}

impl VectorIndex for ChromaIndex {
    fn query(
        &self,
        text: &str,
        n_results: usize,
        filter: Option<&WhereClause>,
        document: Option<&DocumentFilter>,
    ) -> Result<ResultSet> {
        let start = Instant::now();
        let embeddings = self
            .embedder
            .embed_batch(&[text.to_string()])
            .map_err(|e| Error::IndexQuery(format!("embedding query text: {e:#}")))?;
        let body = QueryBody {
            query_embeddings: embeddings,
            n_results,
            filter,
            where_document: document,
            include: &INCLUDE_QUERY,
        };
        let response: QueryResponse = self.post("query", &body)?;
        let set = response.into_result_set()?;
        tracing::debug!(
            hits = set.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "chroma query"
        );
        Ok(set)
    }

    fn get(
        &self,
        filter: Option<&WhereClause>,
        document: Option<&DocumentFilter>,
        limit: usize,
    ) -> Result<ResultSet> {
        let start = Instant::now();
        let body = GetBody { filter, where_document: document, limit, include: &INCLUDE_GET };
        let response: GetResponse = self.post("get", &body)?;
        let set = response.into_result_set()?;
        tracing::debug!(
            hits = set.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "chroma get"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atp_core::{FilterBuilder, FilterField};
    use serde_json::json;

    #[test]
    fn query_response_keeps_columns_aligned() {
        let resp: QueryResponse = serde_json::from_value(json!({
            "ids": [["a", "b"]],
            "documents": [["first", null]],
            "metadatas": [[{"title": "grace", "video_id": 42}, null]],
            "distances": [[0.1, 0.25]],
            "embeddings": null
        }))
        .unwrap();
        let set = resp.into_result_set().unwrap();
        let hits = set.hits();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(hits[0].metadata.video_id.as_deref(), Some("42"));
        assert_eq!(hits[1].document, "");
        assert_eq!(hits[1].metadata, ChunkMetadata::default());
        assert_eq!(hits[1].distance, Some(0.25));
        assert!(!set.is_reranked());
    }

    #[test]
    fn misaligned_query_response_is_rejected() {
        let resp: QueryResponse = serde_json::from_value(json!({
            "ids": [["a", "b"]],
            "documents": [["only one"]],
            "distances": [[0.1, 0.2]]
        }))
        .unwrap();
        assert!(matches!(resp.into_result_set(), Err(Error::MalformedResult(_))));

        let two_rows: QueryResponse =
            serde_json::from_value(json!({"ids": [["a"], ["b"]]})).unwrap();
        assert!(matches!(two_rows.into_result_set(), Err(Error::MalformedResult(_))));
    }

    #[test]
    fn get_response_has_null_distances() {
        let resp: GetResponse = serde_json::from_value(json!({
            "ids": ["x", "y"],
            "documents": ["one", "two"],
            "metadatas": [{"preacher": "smith"}, {"preacher": "jones"}]
        }))
        .unwrap();
        let set = resp.into_result_set().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.hits().iter().all(|h| h.distance.is_none()));
    }

    #[test]
    fn request_bodies_carry_filter_json_verbatim() {
        let clause = FilterBuilder::new()
            .with(FilterField::Preacher, "Smith")
            .with(FilterField::VideoId, "abc123")
            .build();
        let doc = DocumentFilter::contains(" rapture ");
        let body = QueryBody {
            query_embeddings: vec![vec![0.5, 0.5]],
            n_results: 5,
            filter: clause.as_ref(),
            where_document: doc.as_ref(),
            include: &INCLUDE_QUERY,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "query_embeddings": [[0.5, 0.5]],
                "n_results": 5,
                "where": {"$and": [
                    {"video_id": {"$eq": "abc123"}},
                    {"preacher": {"$eq": "smith"}}
                ]},
                "where_document": {"$contains": "rapture"},
                "include": ["documents", "metadatas", "distances"]
            })
        );

        let get = GetBody { filter: None, where_document: None, limit: 7, include: &INCLUDE_GET };
        assert_eq!(
            serde_json::to_value(&get).unwrap(),
            json!({"limit": 7, "include": ["documents", "metadatas"]})
        );
    }

    #[test]
    fn open_fails_cleanly_on_unreachable_server() {
        let settings = ChromaSettings {
            url: "http://127.0.0.1:9".to_string(),
            tenant: "t".to_string(),
            database: "d".to_string(),
            timeout_secs: 1,
            ..ChromaSettings::default()
        };
        let embedder = Box::new(atp_models::FakeEmbedder::new(8));
        let opened = ChromaIndex::open(&settings, "atp", embedder);
        assert!(matches!(opened, Err(Error::IndexUnavailable(_))));
    }
}

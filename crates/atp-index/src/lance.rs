//! LanceDB-backed [`VectorIndex`].
//!
//! The index is synchronous to its callers: it owns a small private tokio
//! runtime and blocks on it for every call. Filters are compiled to a Lance
//! SQL predicate and applied before the vector search.

use std::future::Future;
use std::time::Instant;

use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use tokio::runtime::Runtime;

use atp_core::{
    ChunkMetadata, DocumentFilter, Embedder, Error, Hit, Result, ResultSet, VectorIndex,
    WhereClause,
};

use crate::schema::{DISTANCE_COLUMN, DOCUMENT_COLUMN, ID_COLUMN, METADATA_COLUMNS};
use crate::table::{check_chunk_schema, open_db};

pub struct LanceIndex {
    // Option so Drop can hand the runtime to shutdown_background.
    runtime: Option<Runtime>,
    table: Table,
    // Metadata columns present in this table; absent ones read as None.
    metadata_columns: Vec<&'static str>,
    embedder: Box<dyn Embedder>,
}

impl LanceIndex {
    /// Connect to `uri` and open `table_name`. The table layout is checked
    /// against the embedder's output width.
    pub fn open(uri: &str, table_name: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        let unavailable =
            |e: anyhow::Error| Error::IndexUnavailable(format!("{uri}/{table_name}: {e:#}"));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("atp-lance")
            .enable_all()
            .build()
            .map_err(|e| unavailable(e.into()))?;

        let (table, metadata_columns) = runtime
            .block_on(async {
                let conn = open_db(uri).await?;
                let table = conn.open_table(table_name).execute().await?;
                let schema = table.schema().await?;
                let metadata_columns = check_chunk_schema(&schema, embedder.dim())?;
                anyhow::Ok((table, metadata_columns))
            })
            .map_err(unavailable)?;

        tracing::info!(uri, table = table_name, metadata = ?metadata_columns, "opened lance index");
        Ok(Self { runtime: Some(runtime), table, metadata_columns, embedder })
    }

    fn block_on<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = lancedb::Result<T>>,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| Error::IndexUnavailable("lance runtime is shut down".into()))?;
        runtime.block_on(fut).map_err(|e| Error::IndexQuery(e.to_string()))
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed_batch(&[text.to_string()])
            .map_err(|e| Error::IndexQuery(format!("embedding query text: {e:#}")))?
            .pop()
            .ok_or_else(|| Error::IndexQuery("embedder returned no vector".into()))
    }

    fn projection(&self) -> Select {
        let mut columns = vec![ID_COLUMN, DOCUMENT_COLUMN];
        columns.extend(self.metadata_columns.iter().copied());
        Select::columns(&columns)
    }
}

impl Drop for LanceIndex {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Combined Lance SQL predicate for the metadata and document filters.
pub fn build_predicate(
    filter: Option<&WhereClause>,
    document: Option<&DocumentFilter>,
) -> Option<String> {
    let parts: Vec<String> = filter
        .map(WhereClause::to_sql)
        .into_iter()
        .chain(document.map(|d| d.to_sql(DOCUMENT_COLUMN)))
        .collect();
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(parts.iter().map(|p| format!("({p})")).collect::<Vec<_>>().join(" AND ")),
    }
}

impl VectorIndex for LanceIndex {
    fn query(
        &self,
        text: &str,
        n_results: usize,
        filter: Option<&WhereClause>,
        document: Option<&DocumentFilter>,
    ) -> Result<ResultSet> {
        let start = Instant::now();
        let vector = self.embed_query(text)?;
        let predicate = build_predicate(filter, document);
        let batches = self.block_on(async {
            let mut query = self
                .table
                .vector_search(vector)?
                .distance_type(DistanceType::Cosine)
                .select(self.projection())
                .limit(n_results);
            if let Some(p) = &predicate {
                query = query.only_if(p.as_str());
            }
            query.execute().await?.try_collect::<Vec<RecordBatch>>().await
        })?;
        let set = recheck_contains(batches_to_result_set(&batches, true)?, document);
        tracing::debug!(
            predicate = ?predicate,
            hits = set.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "lance query"
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
        let predicate = build_predicate(filter, document);
        let batches = self.block_on(async {
            let mut query = self.table.query().select(self.projection()).limit(limit);
            if let Some(p) = &predicate {
                query = query.only_if(p.as_str());
            }
            query.execute().await?.try_collect::<Vec<RecordBatch>>().await
        })?;
        let set = recheck_contains(batches_to_result_set(&batches, false)?, document);
        tracing::debug!(
            predicate = ?predicate,
            hits = set.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "lance get"
        );
        Ok(set)
    }
}

/// Drop rows the `LIKE` predicate over-matched.
fn recheck_contains(set: ResultSet, document: Option<&DocumentFilter>) -> ResultSet {
    match document {
        Some(doc) => {
            let hits = set.into_hits().into_iter().filter(|h| doc.matches(&h.document)).collect();
            ResultSet::new(hits)
        }
        None => set,
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a StringArray>> {
    match batch.column_by_name(name) {
        None => Ok(None),
        Some(col) => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(Some)
            .ok_or_else(|| Error::MalformedResult(format!("column '{name}' is not utf8"))),
    }
}

fn value_at(col: Option<&StringArray>, i: usize) -> Option<String> {
    col.filter(|c| c.is_valid(i)).map(|c| c.value(i).to_string())
}

/// Rows of Lance output in stream order. `with_distance` requires the
/// `_distance` column; otherwise every distance is null.
pub fn batches_to_result_set(batches: &[RecordBatch], with_distance: bool) -> Result<ResultSet> {
    let mut hits = Vec::new();
    for batch in batches {
        let ids = string_column(batch, ID_COLUMN)?
            .ok_or_else(|| Error::MalformedResult("column 'id' missing from lance output".into()))?;
        let documents = string_column(batch, DOCUMENT_COLUMN)?
            .ok_or_else(|| {
                Error::MalformedResult("column 'document' missing from lance output".into())
            })?;
        let meta: Vec<Option<&StringArray>> = METADATA_COLUMNS
            .iter()
            .map(|name| string_column(batch, name))
            .collect::<Result<_>>()?;
        let distances = if with_distance {
            let col = batch
                .column_by_name(DISTANCE_COLUMN)
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| {
                    Error::MalformedResult("column '_distance' missing from lance output".into())
                })?;
            Some(col)
        } else {
            None
        };

        for i in 0..batch.num_rows() {
            let metadata = ChunkMetadata {
                video_id: value_at(meta[0], i),
                title: value_at(meta[1], i),
                preacher: value_at(meta[2], i),
                section: value_at(meta[3], i),
                video_url: value_at(meta[4], i),
                mp4_url: value_at(meta[5], i),
                vtt_url: value_at(meta[6], i),
            };
            hits.push(Hit {
                id: ids.value(i).to_string(),
                document: documents.value(i).to_string(),
                metadata,
                distance: distances.filter(|d| d.is_valid(i)).map(|d| d.value(i)),
                score: None,
            });
        }
    }
    Ok(ResultSet::new(hits))
}

use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, StringArray};
use arrow_schema::{ArrowError, DataType, Field, Schema};
use std::sync::Arc;

use atp_core::ChunkMetadata;

pub const ID_COLUMN: &str = "id";
pub const DOCUMENT_COLUMN: &str = "document";
pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

/// Nullable string metadata columns, in table order.
pub const METADATA_COLUMNS: [&str; 7] =
    ["video_id", "title", "preacher", "section", "video_url", "mp4_url", "vtt_url"];

/// Layout of a transcript chunk table.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    let mut fields = vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(DOCUMENT_COLUMN, DataType::Utf8, false),
    ];
    fields.extend(METADATA_COLUMNS.iter().map(|name| Field::new(*name, DataType::Utf8, true)));
    fields.push(Field::new(
        VECTOR_COLUMN,
        DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
        true,
    ));
    Arc::new(Schema::new(fields))
}

/// A chunk row as stored in Lance.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

pub fn rows_to_record_batch(rows: &[ChunkRow], dim: i32) -> Result<RecordBatch, ArrowError> {
    let meta = |pick: fn(&ChunkMetadata) -> &Option<String>| -> StringArray {
        rows.iter().map(|r| pick(&r.metadata).as_deref()).collect()
    };
    let vectors = rows.iter().map(|r| Some(r.vector.iter().copied().map(Some).collect::<Vec<_>>()));

    RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.id.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.document.as_str()))),
            Arc::new(meta(|m| &m.video_id)),
            Arc::new(meta(|m| &m.title)),
            Arc::new(meta(|m| &m.preacher)),
            Arc::new(meta(|m| &m.section)),
            Arc::new(meta(|m| &m.video_url)),
            Arc::new(meta(|m| &m.mp4_url)),
            Arc::new(meta(|m| &m.vtt_url)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
        ],
    )
}

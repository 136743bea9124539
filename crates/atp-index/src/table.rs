//! LanceDB connection helpers.
use anyhow::{bail, Result};
use arrow_array::{RecordBatch, RecordBatchIterator};
use arrow_schema::{DataType, Schema};
use lancedb::{connect, Connection};

use crate::schema::{DOCUMENT_COLUMN, ID_COLUMN, METADATA_COLUMNS, VECTOR_COLUMN};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

/// Create `name` from `batch`, replacing nothing: fails if the table exists.
pub async fn create_table(conn: &Connection, name: &str, batch: RecordBatch) -> Result<()> {
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    conn.create_table(name, reader).execute().await?;
    Ok(())
}

/// The table must carry `id`, `document` and a float vector column of
/// width `dim`. Metadata columns are optional but must be utf8 when present;
/// the ones found are returned in [`METADATA_COLUMNS`] order.
pub fn check_chunk_schema(schema: &Schema, dim: usize) -> Result<Vec<&'static str>> {
    for name in [ID_COLUMN, DOCUMENT_COLUMN] {
        match schema.field_with_name(name) {
            Ok(f) if f.data_type() == &DataType::Utf8 => {}
            Ok(f) => bail!("column '{}' has type {}, expected utf8", name, f.data_type()),
            Err(_) => bail!("column '{}' is missing", name),
        }
    }
    match schema.field_with_name(VECTOR_COLUMN).map(|f| f.data_type()) {
        Ok(DataType::FixedSizeList(item, width)) if item.data_type() == &DataType::Float32 => {
            if *width as usize != dim {
                bail!("vector width {} does not match the embedder dimension {}", width, dim);
            }
        }
        Ok(other) => bail!("column 'vector' has type {}, expected FixedSizeList<Float32>", other),
        Err(_) => bail!("column 'vector' is missing"),
    }

    let mut present = Vec::new();
    for name in METADATA_COLUMNS {
        if let Ok(f) = schema.field_with_name(name) {
            if f.data_type() != &DataType::Utf8 {
                bail!("column '{}' has type {}, expected utf8", name, f.data_type());
            }
            present.push(name);
        }
    }
    Ok(present)
}

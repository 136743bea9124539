//! Vector index backends for transcript search.
//!
//! [`open_index`] picks the backend from configuration: a LanceDB table or a
//! Chroma collection. Both embed query text with the shared sentence embedder.

pub mod chroma;
pub mod lance;
pub mod schema;
pub mod table;

use std::path::Path;
use std::sync::Arc;

use atp_core::config::{IndexBackend, Settings};
use atp_core::{Embedder, Result, VectorIndex};

pub use chroma::ChromaIndex;
pub use lance::LanceIndex;

/// Open the configured index. Relative Lance paths resolve against `base`.
pub fn open_index(
    settings: &Settings,
    base: &Path,
    embedder: Box<dyn Embedder>,
) -> Result<Arc<dyn VectorIndex>> {
    let index = &settings.index;
    match index.backend {
        IndexBackend::Lance => {
            let uri = index.lance.resolved_uri(base);
            Ok(Arc::new(LanceIndex::open(&uri, &index.collection, embedder)?))
        }
        IndexBackend::Chroma => {
            Ok(Arc::new(ChromaIndex::open(&index.chroma, &index.collection, embedder)?))
        }
    }
}

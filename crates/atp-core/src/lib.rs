#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use filter::{Condition, DocumentFilter, FilterBuilder, FilterField, WhereClause};
pub use traits::{Embedder, Reranker, VectorIndex};
pub use types::{ChunkId, ChunkMetadata, Hit, QueryColumns, QueryRequest, ResultSet};

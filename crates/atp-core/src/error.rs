use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Vector index query failed: {0}")]
    IndexQuery(String),

    #[error("Reranker unavailable: {0}")]
    RerankerUnavailable(String),

    #[error("Reranker inference failed: {0}")]
    RerankerInference(String),

    #[error("Malformed result set: {0}")]
    MalformedResult(String),
}

impl Error {
    /// True for failures that come from an external collaborator rather than
    /// from this process (index or reranker).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::IndexUnavailable(_)
                | Self::IndexQuery(_)
                | Self::RerankerUnavailable(_)
                | Self::RerankerInference(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use atp_core::config::SearchSettings;
use atp_core::{FilterField, QueryRequest};
use clap::Parser;

/// Semantic search over ATP sermon transcripts.
#[derive(Debug, Parser)]
#[command(name = "atp-search", version, about)]
pub struct SearchArgs {
    /// Query text. Leave empty to list chunks matching the filters.
    #[arg(default_value = "")]
    pub query: String,

    /// Number of results to retrieve (clamped to search.max_results).
    #[arg(short = 'n', long)]
    pub results: Option<usize>,

    /// Rerank the retrieved chunks with the cross-encoder.
    #[arg(short, long)]
    pub rerank: bool,

    /// Number of results to keep after reranking.
    #[arg(long, value_name = "N")]
    pub rerank_results: Option<usize>,

    /// Restrict to a preacher; repeat for several.
    #[arg(long)]
    pub preacher: Vec<String>,

    /// Restrict to a sermon title.
    #[arg(long)]
    pub title: Option<String>,

    /// Restrict to a section; repeat for several.
    #[arg(long)]
    pub section: Vec<String>,

    /// Restrict to a single video.
    #[arg(long)]
    pub video_id: Option<String>,

    /// Only chunks whose text contains this substring.
    #[arg(long, value_name = "TEXT")]
    pub contains: Option<String>,

    /// Print the columnar result JSON instead of Markdown.
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn to_request(&self, limits: &SearchSettings) -> QueryRequest {
        let mut request = QueryRequest::new(self.query.clone())
            .with_results(self.results.unwrap_or(limits.default_results));
        if self.rerank {
            request = request
                .with_rerank(self.rerank_results.unwrap_or(limits.default_rerank_results));
        }
        request.filters = request
            .filters
            .with_all(FilterField::Preacher, &self.preacher)
            .with_all(FilterField::Section, &self.section)
            .with_all(FilterField::Title, &self.title)
            .with_all(FilterField::VideoId, &self.video_id);
        if let Some(needle) = &self.contains {
            request = request.with_document_contains(needle.clone());
        }
        request
    }
}

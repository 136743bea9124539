use std::fmt::Write;

use atp_core::{Hit, ResultSet};

pub const NO_RESULTS: &str = "No results found.";
const SEPARATOR: &str = "\n\n---\n\n";

/// Markdown report of a result set, one record per hit in rank order.
pub fn format_results(results: &ResultSet) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }
    results
        .hits()
        .iter()
        .enumerate()
        .map(|(i, hit)| format_hit(i + 1, hit))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

fn format_hit(rank: usize, hit: &Hit) -> String {
    let meta = &hit.metadata;
    let label =
        |v: &Option<String>| v.as_deref().map(title_case).unwrap_or_else(|| "N/A".to_string());
    let link = |v: &Option<String>| v.clone().unwrap_or_else(|| "#".to_string());
    const GAP: &str = "&nbsp;&nbsp;&nbsp;&nbsp;";

    let mut out = String::new();
    // Two trailing spaces are Markdown hard line breaks.
    let _ = writeln!(out, "**Result #{rank}**  ");
    let _ = writeln!(out, "**Title:** {}  ", label(&meta.title));
    let _ = writeln!(out, "**Preacher:** {}  ", label(&meta.preacher));
    let _ = writeln!(out, "**Section:** {}  ", label(&meta.section));
    let _ = writeln!(out, "**Bi-Encoder Distance:** {}  ", number(hit.distance));
    let _ = writeln!(out, "**Reranker Score:** {}  ", number(hit.score));
    let _ = writeln!(out, "**Chunk ID:** `{}`  ", hit.id);
    let _ = writeln!(out, "**Sources:**{GAP}");
    let _ = writeln!(out, "    [Video on ATP]({}){GAP}", link(&meta.video_url));
    let _ = writeln!(out, "    [MP4 on ATP]({}){GAP}", link(&meta.mp4_url));
    let _ = writeln!(out, "    [VTT (Captions) on ATP]({})  ", link(&meta.vtt_url));
    let _ = write!(out, "**Document:** {}", hit.document);
    out
}

fn number(v: Option<f32>) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.4}"),
        _ => "N/A".to_string(),
    }
}

/// Word-wise capitalization: a letter that follows a cased letter is
/// lowercased, any other letter is uppercased. Words therefore also start
/// after punctuation and digits (`q&a` -> `Q&A`, `god's` -> `God'S`).
/// Non-letters are kept as is.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut after_cased = false;
    for c in s.chars() {
        if after_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_cased = c.is_lowercase() || c.is_uppercase();
    }
    out
}

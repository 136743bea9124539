use atp_core::{ChunkMetadata, Hit, QueryColumns, ResultSet};
use atp_search::{format_results, NO_RESULTS};

fn hit(id: &str, distance: Option<f32>, score: Option<f32>, metadata: ChunkMetadata) -> Hit {
    Hit { id: id.to_string(), document: format!("text of {id}"), metadata, distance, score }
}

fn full_metadata() -> ChunkMetadata {
    ChunkMetadata {
        video_id: Some("v1".into()),
        title: Some("the blessed hope".into()),
        preacher: Some("john smith".into()),
        section: Some("sermons".into()),
        video_url: Some("https://atp.example/v/1".into()),
        mp4_url: Some("https://atp.example/v/1.mp4".into()),
        vtt_url: Some("https://atp.example/v/1.vtt".into()),
    }
}

#[test]
fn empty_set_prints_fixed_message() {
    assert_eq!(format_results(&ResultSet::empty()), NO_RESULTS);
    assert_eq!(NO_RESULTS, "No results found.");
}

#[test]
fn record_layout_matches_markdown_template() {
    let set = ResultSet::reranked(vec![hit("c-7", Some(0.123456), Some(8.5), full_metadata())]);
    let expected = "**Result #1**  \n\
**Title:** The Blessed Hope  \n\
**Preacher:** John Smith  \n\
**Section:** Sermons  \n\
**Bi-Encoder Distance:** 0.1235  \n\
**Reranker Score:** 8.5000  \n\
**Chunk ID:** `c-7`  \n\
**Sources:**&nbsp;&nbsp;&nbsp;&nbsp;\n    [Video on ATP](https://atp.example/v/1)&nbsp;&nbsp;&nbsp;&nbsp;\n    [MP4 on ATP](https://atp.example/v/1.mp4)&nbsp;&nbsp;&nbsp;&nbsp;\n    [VTT (Captions) on ATP](https://atp.example/v/1.vtt)  \n\
**Document:** text of c-7";
    assert_eq!(format_results(&set), expected);
}

#[test]
fn missing_values_use_defaults() {
    let set = ResultSet::new(vec![hit("x", None, None, ChunkMetadata::default())]);
    let out = format_results(&set);
    assert!(out.contains("**Title:** N/A  \n"));
    assert!(out.contains("**Preacher:** N/A  \n"));
    assert!(out.contains("**Section:** N/A  \n"));
    assert!(out.contains("**Bi-Encoder Distance:** N/A  \n"));
    assert!(out.contains("**Reranker Score:** N/A  \n"));
    assert!(out.contains("[Video on ATP](#)"));
    assert!(out.contains("[MP4 on ATP](#)"));
    assert!(out.contains("[VTT (Captions) on ATP](#)"));
}

#[test]
fn records_are_ranked_and_separated() {
    let set = ResultSet::new(vec![
        hit("a", Some(0.1), None, full_metadata()),
        hit("b", Some(0.2), None, full_metadata()),
        hit("c", Some(0.3), None, full_metadata()),
    ]);
    let out = format_results(&set);
    let records: Vec<&str> = out.split("\n\n---\n\n").collect();
    assert_eq!(records.len(), 3);
    for (i, record) in records.iter().enumerate() {
        assert!(record.starts_with(&format!("**Result #{}**  \n", i + 1)), "{record}");
    }
    assert!(records[2].contains("`c`"));
}

#[test]
fn formatting_is_idempotent_and_pure() {
    let set = ResultSet::reranked(vec![
        hit("a", Some(0.4), Some(1.0), full_metadata()),
        hit("b", None, Some(f32::NAN), ChunkMetadata::default()),
    ]);
    let before = set.clone();
    let first = format_results(&set);
    assert_eq!(first, format_results(&set));
    assert_eq!(set, before);
    assert!(first.contains("**Reranker Score:** N/A"));
}

#[test]
fn columnar_round_trip_formats_identically() -> anyhow::Result<()> {
    let set = ResultSet::reranked(vec![hit("a", Some(0.25), Some(3.0), full_metadata())]);
    let columns: QueryColumns = serde_json::from_str(&serde_json::to_string(&set.to_columns())?)?;
    let back = ResultSet::try_from(columns)?;
    assert_eq!(format_results(&back), format_results(&set));
    Ok(())
}

use atp_models::{get_default_embedder, MINILM_DIM};
use std::path::Path;

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading the model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(Path::new("/nonexistent"), 512).expect("embedder");
    assert_eq!(embedder.dim(), MINILM_DIM);

    let texts = vec![
        "walking in the spirit".to_string(),
        "walking in the spirit".to_string(),
        "the rapture of the church".to_string(),
    ];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 3);
    let (v1, v2, v3) = (&embs[0], &embs[1], &embs[2]);
    assert_eq!(v1.len(), MINILM_DIM);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
    assert!(v1.iter().zip(v3.iter()).any(|(a, b)| (a - b).abs() > 1e-6));
}

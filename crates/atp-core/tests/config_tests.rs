use std::path::Path;

use atp_core::config::{expand_path, resolve_with_base, Config, IndexBackend};
use figment::Jail;

#[test]
fn defaults_apply_without_any_files() {
    Jail::expect_with(|_jail| {
        let config = Config::load_for_env("test").map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.search.max_results, 200);
        assert_eq!(settings.search.max_rerank_results, 200);
        assert_eq!(settings.index.backend, IndexBackend::Lance);
        assert_eq!(settings.index.collection, "atp");
        assert_eq!(config.env_name(), "test");
        Ok(())
    });
}

#[test]
fn env_file_and_variables_layer_over_base_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [search]
            max_results = 100
            default_results = 20

            [index]
            collection = "sermons"
            "#,
        )?;
        jail.create_file("config.prod.toml", "[search]\nmax_rerank_results = 50\n")?;
        jail.set_env("APP_SEARCH__MAX_RESULTS", "150");

        let config = Config::load_for_env("prod").map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.search.max_results, 150);
        assert_eq!(settings.search.default_results, 20);
        assert_eq!(settings.search.max_rerank_results, 50);
        assert_eq!(settings.index.collection, "sermons");
        let limit: usize = config.get("search.max_results").map_err(|e| e.to_string())?;
        assert_eq!(limit, 150);
        Ok(())
    });
}

#[test]
fn chroma_cloud_credentials_come_from_their_own_variables() {
    Jail::expect_with(|jail| {
        jail.set_env("APP_INDEX__BACKEND", "chroma");
        jail.set_env("CHROMADB_CLOUD_API_KEY", "secret");
        jail.set_env("CHROMADB_CLOUD_TENANT", "tenant-1");
        jail.set_env("CHROMADB_CLOUD_DATABASE", "atp-db");

        let settings = Config::load_for_env("test")
            .and_then(|c| Ok(c.settings()?))
            .map_err(|e| e.to_string())?;
        assert_eq!(settings.index.backend, IndexBackend::Chroma);
        assert_eq!(settings.index.chroma.api_key, "secret");
        assert_eq!(settings.index.chroma.tenant, "tenant-1");
        assert_eq!(settings.index.chroma.database, "atp-db");
        assert!(!format!("{:?}", settings.index.chroma).contains("secret"));
        Ok(())
    });
}

#[test]
fn invalid_settings_are_rejected_at_load() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[search]\nmax_results = 5\ndefault_results = 10\n")?;
        assert!(Config::load_for_env("test").is_err());
        Ok(())
    });
    Jail::expect_with(|jail| {
        jail.set_env("APP_INDEX__BACKEND", "chroma");
        assert!(Config::load_for_env("test").is_err(), "chroma without tenant/database");
        Ok(())
    });
    Jail::expect_with(|jail| {
        jail.set_env("APP_INDEX__BACKEND", "pinecone");
        assert!(Config::load_for_env("test").is_err());
        Ok(())
    });
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/srv/atp");
    assert_eq!(resolve_with_base(base, "models/x"), Path::new("/srv/atp/models/x"));
    assert_eq!(resolve_with_base(base, "/abs/y"), Path::new("/abs/y"));
    std::env::set_var("ATP_TEST_DIR", "/data");
    assert_eq!(expand_path("${ATP_TEST_DIR}/lance"), Path::new("/data/lance"));
}

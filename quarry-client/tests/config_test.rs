//! Tests for loading client configuration from disk

use quarry::Version;
use quarry_client::{ClientConfig, ClientError, Cluster};
use tempfile::tempdir;

#[test]
fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quarry.toml");
    std::fs::write(
        &path,
        r#"
url = "https://search.internal:9200"
username = "elastic"
password = "changeme"
timeout_ms = 5000
version = "7.10.2"
"#,
    )
    .unwrap();

    let config = ClientConfig::load_from(&path).unwrap();
    assert_eq!(config.url, "https://search.internal:9200");
    assert_eq!(config.username.as_deref(), Some("elastic"));
    assert_eq!(config.timeout_ms, 5000);
    assert_eq!(
        config.pinned_version().unwrap(),
        Some(Version::elasticsearch(7, 10, 2))
    );
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = ClientConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
}

#[test]
fn test_save_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("quarry.toml");

    let mut config = ClientConfig::new("http://es-1:9200");
    config.version = Some("opensearch:1.3.0".to_string());
    config.save(&path).unwrap();

    let reloaded = ClientConfig::load_from(&path).unwrap();
    assert_eq!(reloaded.url, "http://es-1:9200");
    assert_eq!(reloaded.timeout_ms, 30_000);
    assert_eq!(
        reloaded.pinned_version().unwrap(),
        Some(Version::opensearch(1, 3, 0))
    );
}

#[tokio::test]
async fn test_connect_with_pinned_version() {
    let mut config = ClientConfig::new("http://127.0.0.1:9");
    config.version = Some("6.8.0".to_string());

    // no request is made; the pinned version is used directly
    let cluster = Cluster::connect(&config).unwrap();
    let engine = cluster.engine().await.unwrap();
    assert_eq!(engine.version, Version::elasticsearch(6, 8, 0));
    assert!(engine.features.requires_mapping_type_name);
}

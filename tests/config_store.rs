// tests/config_store.rs
// Persistence round-trips and the HTTP config surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;

use drawbridge::provider::ProviderSettings;
use drawbridge::server::{AppState, create_router};
use drawbridge::store::{ApiConfig, ConfigStore};

fn local_settings() -> ProviderSettings {
    ProviderSettings {
        http: reqwest::Client::new(),
        openai_base_url: "http://127.0.0.1:1".into(),
        openrouter_base_url: "http://127.0.0.1:1".into(),
        google_base_url: "http://127.0.0.1:1".into(),
        siliconflow_base_url: "http://127.0.0.1:1".into(),
        request_timeout: Duration::from_secs(1),
    }
}

#[test]
fn save_then_load_round_trips_all_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));

    let config = ApiConfig {
        provider: "openrouter".into(),
        api_key: "sk-or-123".into(),
        model: Some("openai/gpt-4o-mini".into()),
    };
    store.save(&config).unwrap();

    assert_eq!(store.load(), config);
}

#[test]
fn load_missing_file_yields_default() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path().join("nope.json"));

    let config = store.load();
    assert_eq!(config.provider, "openai");
    assert!(config.api_key.is_empty());
    assert_eq!(config.model.as_deref(), Some("gpt-4"));
}

#[test]
fn load_backfills_missing_model_from_provider_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"provider":"google","apiKey":"k"}"#).unwrap();

    let config = ConfigStore::new(&path).load();
    assert_eq!(config.provider, "google");
    assert_eq!(config.model.as_deref(), Some("gemini-1.5-pro"));
}

#[test]
fn load_discards_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{not json at all").unwrap();

    let config = ConfigStore::new(&path).load();
    assert_eq!(config, ApiConfig::default());
}

#[test]
fn save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("config.json");
    let store = ConfigStore::new(&path);

    store.save(&ApiConfig::default()).unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn http_put_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));
    let app = create_router(AppState::new(local_settings(), store));

    let put = Request::builder()
        .method("PUT")
        .uri("/api/config")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"provider": "siliconflow", "apiKey": "sk-sf", "model": "Qwen/Qwen2.5-72B-Instruct"})
                .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(put).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let get = Request::builder()
        .method("GET")
        .uri("/api/config")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["provider"], "siliconflow");
    assert_eq!(parsed["apiKey"], "sk-sf");
    assert_eq!(parsed["model"], "Qwen/Qwen2.5-72B-Instruct");
}

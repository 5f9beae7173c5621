// ABOUTME: Shared test harness building an in-memory application instance
// ABOUTME: Provides token minting and a oneshot request helper for router tests

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use cardbox::config::environment::{
    AuthProviderConfig, DatabaseConfig, Environment, LogLevel, SecurityConfig, ServerConfig,
    StorageBackend, StorageConfig,
};
use cardbox::database::Database;
use cardbox::routes::{build_router, AppState};
use cardbox::storage::LocalDeckStorage;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";

/// A fully wired application over a tempdir and an in-memory database
pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    _decks_dir: tempfile::TempDir,
}

fn test_config(decks_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
        },
        storage: StorageConfig {
            backend: StorageBackend::Local,
            decks_dir,
            s3_bucket: String::new(),
            s3_prefix: String::new(),
            s3_region: "us-east-1".into(),
            s3_endpoint_url: None,
            s3_access_key_id: String::new(),
            s3_secret_access_key: String::new(),
        },
        auth: AuthProviderConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: "test-key".into(),
            jwt_secret: JWT_SECRET.into(),
            audience: "authenticated".into(),
        },
        security: SecurityConfig {
            cors_origins: vec!["*".into()],
        },
        log_level: LogLevel::Error,
        environment: Environment::Testing,
        app_version: "0.0.0-test".into(),
    }
}

pub async fn spawn_app() -> TestApp {
    let decks_dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(decks_dir.path().to_path_buf());

    let database = Database::new("sqlite::memory:").await.expect("database");
    let storage = Arc::new(
        LocalDeckStorage::new(decks_dir.path().to_path_buf())
            .await
            .expect("storage"),
    );

    let state = Arc::new(AppState::new(config, database, storage).expect("app state"));
    let router = build_router(Arc::clone(&state));
    TestApp {
        state,
        router,
        _decks_dir: decks_dir,
    }
}

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    roles: Vec<String>,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Mint a provider-style token for the given user
pub fn token_for(user_id: Uuid, roles: &[&str]) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = TestClaims {
        sub: user_id.to_string(),
        email: Some(format!("{user_id}@example.com")),
        name: Some("Test User".into()),
        roles: roles.iter().map(ToString::to_string).collect(),
        aud: "authenticated".into(),
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("mint token")
}

/// Fire one request at the router and decode the JSON response
pub async fn request(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, json)
}

/// Store a bundled deck directly in the backing storage
pub async fn add_bundled_deck(app: &TestApp, id: &str, title: &str) {
    use cardbox::storage::DeckStorage as _;
    app.state
        .storage
        .save(&format!("{id}.yaml"), &deck_yaml(id, title), false)
        .await
        .expect("save bundled deck");
}

/// YAML for a minimal valid deck
pub fn deck_yaml(id: &str, title: &str) -> String {
    format!(
        "id: {id}\ntitle: {title}\ndescription: test deck\ncards:\n  - id: c1\n    question: What is 2+2?\n    answer: '4'\n  - id: c2\n    question: Capital of France?\n    answer: Paris\n    explanation: Since 508 AD\n"
    )
}

// ABOUTME: Integration tests for admin endpoints, health probes, and identity
// ABOUTME: Verifies role enforcement and the admin's unrestricted catalog view

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

mod common;

use axum::http::{Method, StatusCode};
use common::{deck_yaml, request, spawn_app, token_for};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_health_and_version() {
    let app = spawn_app().await;

    let (status, body) = request(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = request(&app.router, Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    let (status, body) = request(&app.router, Method::GET, "/api/version", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "0.0.0-test");
    assert_eq!(body["environment"], "testing");
}

#[tokio::test]
async fn test_me_reflects_token_claims() {
    let app = spawn_app().await;
    let user = Uuid::new_v4();
    let token = token_for(user, &["admin"]);

    let (status, body) =
        request(&app.router, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.to_string());
    assert_eq!(body["roles"], json!(["admin"]));

    // garbage token
    let (status, body) =
        request(&app.router, Method::GET, "/api/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_INVALID");
}

#[tokio::test]
async fn test_admin_routes_enforce_role() {
    let app = spawn_app().await;
    let user_token = token_for(Uuid::new_v4(), &[]);

    for uri in ["/api/admin/users", "/api/admin/decks", "/api/admin/downloads"] {
        let (status, body) = request(&app.router, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");

        let (status, body) =
            request(&app.router, Method::GET, uri, Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
    }
}

#[tokio::test]
async fn test_admin_sees_all_private_decks() {
    let app = spawn_app().await;
    let alice_token = token_for(Uuid::new_v4(), &[]);
    let admin_token = token_for(Uuid::new_v4(), &["admin"]);

    let (_, body) = request(
        &app.router,
        Method::POST,
        "/api/decks",
        Some(&alice_token),
        Some(json!({ "content": deck_yaml("x", "Hidden Gem") })),
    )
    .await;
    let deck_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app.router,
        Method::GET,
        "/api/admin/decks",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&deck_id.as_str()));
}

#[tokio::test]
async fn test_admin_listed_users_come_from_profile_mirror() {
    let app = spawn_app().await;
    let alice = Uuid::new_v4();
    let alice_token = token_for(alice, &[]);
    let admin_token = token_for(Uuid::new_v4(), &["admin"]);

    // any authenticated request mirrors the profile
    request(&app.router, Method::GET, "/api/auth/me", Some(&alice_token), None).await;

    let (status, body) = request(
        &app.router,
        Method::GET,
        "/api/admin/users",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert!(users.iter().any(|u| u["id"] == alice.to_string()));
    // the admin's own profile was mirrored by this very request
    assert_eq!(users.len(), 2);
}

#[tokio::test]
async fn test_admin_can_delete_any_deck() {
    let app = spawn_app().await;
    let alice_token = token_for(Uuid::new_v4(), &[]);
    let admin_token = token_for(Uuid::new_v4(), &["admin"]);

    common::add_bundled_deck(&app, "geo", "Geography").await;
    let (_, body) = request(
        &app.router,
        Method::POST,
        "/api/decks",
        Some(&alice_token),
        Some(json!({ "content": deck_yaml("x", "To Remove") })),
    )
    .await;
    let user_deck = body["id"].as_str().unwrap().to_string();

    let (status, _) = request(
        &app.router,
        Method::DELETE,
        &format!("/api/admin/decks/{user_deck}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request(
        &app.router,
        Method::DELETE,
        "/api/admin/decks/geo",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request(
        &app.router,
        Method::DELETE,
        "/api/admin/decks/geo",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

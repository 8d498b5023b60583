//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Read-only endpoints return stored snapshots and history
//! - Admin endpoints drive the supervisor and persist changes
//! - Authentication middleware functions properly
//! - Error handling maps to the right status codes

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use server_stats::{
    Sample, Target, TargetId,
    actors::PollSettings,
    api::{ApiConfig, ApiState, spawn_api_server},
    storage::{HistoryStore, StateStore},
};

use crate::helpers::{Harness, MockQueryClient, Reply, harness, status, wait_until};

const TOKEN: &str = "test-token";

fn settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(60),
        jitter_min: Duration::ZERO,
        jitter_max: Duration::ZERO,
    }
}

// Helper to create test API server
async fn spawn_test_api(client: MockQueryClient, auth_token: Option<&str>) -> (SocketAddr, Harness) {
    let h = harness(client, settings());
    let state = ApiState::new(h.supervisor.clone(), 50);

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        auth_token: auth_token.map(str::to_string),
        enable_cors: true,
    };

    let addr = spawn_api_server(config, state).await.unwrap();
    (addr, h)
}

async fn default_api() -> (SocketAddr, Harness) {
    let client = MockQueryClient::new([]).with_fallback(Reply::Ok(status(75, "A Minecraft Server")));
    spawn_test_api(client, Some(TOKEN)).await
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}/api/v1{path}")
}

async fn add_server(addr: SocketAddr, name: &str, address: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(url(addr, "/servers"))
        .bearer_auth(TOKEN)
        .json(&json!({ "name": name, "address": address }))
        .send()
        .await
        .unwrap()
}

/// Store a snapshot without starting a poller
async fn seed(h: &Harness, name: &str, online: u32) {
    let mut target = Target::new(name, format!("{}.example.net", name.to_lowercase()));
    target.online = online;
    h.backend.upsert(&target).await.unwrap();
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _h) = default_api().await;

    let response = reqwest::get(url(addr, "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"]["healthy"], true);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_add_server_starts_polling() {
    let (addr, h) = default_api().await;

    let response = add_server(addr, "Hypixel", "mc.hypixel.net").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Successfully added server 'Hypixel'");

    let id = TargetId::new("Hypixel");
    assert!(h.supervisor.is_monitored(&id).await);

    let backend = h.backend.clone();
    assert!(
        wait_until(Duration::from_secs(5), || {
            let backend = backend.clone();
            let id = id.clone();
            async move { backend.sample_count(&id).await == 1 }
        })
        .await
    );

    let server: Value = reqwest::get(url(addr, "/server?name=hypixel"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(server["name"], "Hypixel");
    assert_eq!(server["address"], "mc.hypixel.net");

    let response = add_server(addr, "HYPIXEL", "other.example.net").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    h.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_add_server_validation() {
    let (addr, h) = default_api().await;

    for (name, address) in [
        ("", "mc.hypixel.net"),
        ("no;semicolons", "mc.hypixel.net"),
        ("Hypixel", "mc.hypixel.net:99999"),
        ("Hypixel", ""),
    ] {
        let response = add_server(addr, name, address).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{name} / {address}");
    }

    assert!(h.supervisor.workers().await.is_empty());
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let (addr, h) = default_api().await;
    let client = reqwest::Client::new();
    let body = json!({ "name": "Hypixel", "address": "mc.hypixel.net" });

    let response = client
        .post(url(addr, "/servers"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(url(addr, "/servers"))
        .bearer_auth("wrong-token")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .get(url(addr, "/server-requests"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // public routes on the same paths stay open
    let response = client.get(url(addr, "/servers")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(h.supervisor.workers().await.is_empty());
}

#[tokio::test]
async fn test_admin_routes_open_without_token() {
    let client = MockQueryClient::new([]).with_fallback(Reply::Ok(status(5, "D")));
    let (addr, h) = spawn_test_api(client, None).await;

    let response = reqwest::Client::new()
        .post(url(addr, "/servers"))
        .json(&json!({ "name": "Hypixel", "address": "mc.hypixel.net" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    h.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_list_servers_sorted_and_paged() {
    let (addr, h) = default_api().await;
    for (name, online) in [("Small", 5), ("Big", 500), ("Medium", 50)] {
        seed(&h, name, online).await;
    }

    let body: Value = reqwest::get(url(addr, "/servers?page=0&page_size=2"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = body["servers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Big", "Medium"]);
    assert_eq!(body["total"], 3);

    let body: Value = reqwest::get(url(addr, "/servers?page=1&page_size=2"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["servers"][0]["name"], "Small");

    let response = reqwest::get(url(addr, "/servers?page_size=101")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = reqwest::get(url(addr, "/servers?page_size=0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let names: Vec<String> = reqwest::get(url(addr, "/server-names"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names, vec!["Big", "Medium", "Small"]);

    let stats: Value = reqwest::get(url(addr, "/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats, json!({ "servers": 3, "players_online": 555 }));
}

#[tokio::test]
async fn test_unknown_server_is_not_found() {
    let (addr, _h) = default_api().await;
    let client = reqwest::Client::new();

    let response = reqwest::get(url(addr, "/server?name=nobody")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = reqwest::get(url(addr, "/servers/nobody/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = reqwest::get(url(addr, "/servers/nobody/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for request in [
        client
            .put(url(addr, "/servers"))
            .json(&json!({ "name": "nobody", "address": "x.example.net" })),
        client
            .put(url(addr, "/servers/refresh"))
            .json(&json!({ "name": "nobody" })),
        client
            .delete(url(addr, "/servers"))
            .json(&json!({ "name": "nobody" })),
    ] {
        let response = request.bearer_auth(TOKEN).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_modify_refresh_and_status() {
    let (addr, h) = default_api().await;
    let client = reqwest::Client::new();
    let id = TargetId::new("Hypixel");

    add_server(addr, "Hypixel", "mc.hypixel.net").await;

    let response = client
        .put(url(addr, "/servers"))
        .bearer_auth(TOKEN)
        .json(&json!({ "name": "hypixel", "address": "new.hypixel.net:25566" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = h.backend.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.address, "new.hypixel.net:25566");
    assert_eq!(stored.name, "Hypixel");

    let response = client
        .put(url(addr, "/servers/refresh"))
        .bearer_auth(TOKEN)
        .json(&json!({ "name": "Hypixel" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status: Value = reqwest::get(url(addr, "/servers/Hypixel/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["monitored"], true);
    assert_eq!(status["generation"], 2);
    assert_eq!(status["address"], "new.hypixel.net:25566");

    h.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_delete_server_removes_history() {
    let (addr, h) = default_api().await;
    let id = TargetId::new("Hypixel");

    add_server(addr, "Hypixel", "mc.hypixel.net").await;

    // older history next to what the poller writes
    let now = Utc::now();
    for minutes in 1..=4 {
        h.backend
            .append(&Sample {
                target: id.clone(),
                timestamp: now - ChronoDuration::minutes(minutes),
                online: 10,
            })
            .await
            .unwrap();
    }

    let backend = h.backend.clone();
    let polled = id.clone();
    assert!(
        wait_until(Duration::from_secs(5), || {
            let backend = backend.clone();
            let id = polled.clone();
            async move { backend.sample_count(&id).await == 5 }
        })
        .await
    );

    let history: Value = reqwest::get(url(addr, "/servers/hypixel/history?limit=3"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["count"], 3);

    let response = reqwest::Client::new()
        .delete(url(addr, "/servers"))
        .bearer_auth(TOKEN)
        .json(&json!({ "name": "hypixel" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Successfully deleted server 'Hypixel' and 5 records."
    );

    assert!(!h.supervisor.is_monitored(&id).await);
    assert!(h.backend.get(&id).await.unwrap().is_none());
    assert_eq!(h.backend.sample_count(&id).await, 0);
}

#[tokio::test]
async fn test_server_requests() {
    let client = MockQueryClient::new([
        Reply::Ok(status(12, "Tiny")),
        Reply::Fail,
        Reply::Ok(status(80, "Popular")),
    ]);
    let (addr, _h) = spawn_test_api(client, Some(TOKEN)).await;
    let http = reqwest::Client::new();
    let request = json!({ "name": "Popular", "address": "popular.example.net" });

    // too few players
    let response = http
        .post(url(addr, "/server-requests"))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("has 12"));

    // unreachable
    let response = http
        .post(url(addr, "/server-requests"))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = http
        .post(url(addr, "/server-requests"))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listed: Value = http
        .get(url(addr, "/server-requests"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["requests"][0]["name"], "Popular");
    assert_eq!(listed["requests"][0]["online"], 80);
}

#[tokio::test]
async fn test_status_reports_poll_outcomes() {
    let (addr, h) = default_api().await;
    let id = TargetId::new("Hypixel");

    add_server(addr, "Hypixel", "mc.hypixel.net").await;

    let status = h.status.clone();
    let polled = id.clone();
    assert!(
        wait_until(Duration::from_secs(5), || {
            let status = status.clone();
            let id = polled.clone();
            async move {
                status
                    .get(&id)
                    .await
                    .is_some_and(|s| s.successes == 1)
            }
        })
        .await
    );

    let body: Value = reqwest::get(url(addr, "/servers/hypixel/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["poll"]["successes"], 1);
    assert_eq!(body["poll"]["last_online"], 75);
    assert_eq!(body["generation"], 0);

    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_modify_keeps_first_sample_of_new_poller() {
    use axum::{Json, extract::State};
    use server_stats::api::{
        AddServerRequest, ModifyServerRequest,
        routes::servers::{add_server as add_handler, modify_server},
    };

    let id = TargetId::new("Hypixel");

    // the new poller queries right away, racing the handler's return
    for _ in 0..20 {
        let client = MockQueryClient::new([Reply::Ok(status(10, "D1"))])
            .with_fallback(Reply::Ok(status(20, "D2")));
        let h = harness(client, settings());
        let state = ApiState::new(h.supervisor.clone(), 50);

        add_handler(
            State(state.clone()),
            Json(AddServerRequest {
                name: "Hypixel".to_string(),
                address: "a.example.net".to_string(),
            }),
        )
        .await
        .unwrap();

        let backend = h.backend.clone();
        let first = id.clone();
        assert!(
            wait_until(Duration::from_secs(5), || {
                let backend = backend.clone();
                let id = first.clone();
                async move { backend.sample_count(&id).await == 1 }
            })
            .await
        );

        modify_server(
            State(state.clone()),
            Json(ModifyServerRequest {
                name: "Hypixel".to_string(),
                address: "b.example.net".to_string(),
            }),
        )
        .await
        .unwrap();

        let second = id.clone();
        assert!(
            wait_until(Duration::from_secs(5), || {
                let backend = backend.clone();
                let id = second.clone();
                async move { backend.sample_count(&id).await == 2 }
            })
            .await
        );
        tokio::time::sleep(Duration::from_millis(30)).await;

        let snapshot = h.backend.get(&id).await.unwrap().unwrap();
        assert_eq!(snapshot.address, "b.example.net");
        assert_eq!(snapshot.description.as_deref(), Some("D2"));
        assert_eq!(snapshot.online, 20);
        assert_eq!(snapshot.peak, 20);

        h.supervisor.shutdown().await;
    }
}

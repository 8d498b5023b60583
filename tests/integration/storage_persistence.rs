//! Integration tests for pollers writing to SQLite
//!
//! These tests verify that:
//! - Samples and snapshots written by pollers survive a restart
//! - Timestamps stay unique per target across generations
//! - Deleting a target removes its history

use std::sync::Arc;
use std::time::Duration;

use server_stats::{
    Target, TargetId,
    actors::{PollSettings, PollStatusBoard, PollerContext, Supervisor},
    storage::{HistoryStore, StateStore, Stores, sqlite::SqliteBackend},
};
use tempfile::tempdir;

use crate::helpers::{MockQueryClient, Reply, samples, status, wait_until};

fn settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(50),
        jitter_min: Duration::ZERO,
        jitter_max: Duration::ZERO,
    }
}

fn supervisor(backend: Arc<SqliteBackend>, client: MockQueryClient) -> Supervisor {
    Supervisor::new(PollerContext {
        client: Arc::new(client),
        stores: Stores::from_backend(backend),
        status: Arc::new(PollStatusBoard::new()),
        settings: settings(),
    })
}

#[tokio::test]
async fn test_poller_data_survives_restart() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("stats.db");
    let id = TargetId::new("Hypixel");

    {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let client = MockQueryClient::new([
            Reply::Ok(status(120, "A Minecraft Server")),
            Reply::Ok(status(150, "Changed")),
        ])
        .with_fallback(Reply::Ok(status(90, "Changed")));
        let supervisor = supervisor(backend.clone(), client);

        backend
            .upsert(&Target::new("Hypixel", "mc.hypixel.net"))
            .await
            .unwrap();
        supervisor
            .add_target(Target::new("Hypixel", "mc.hypixel.net"))
            .await
            .unwrap();

        let history = backend.clone();
        let id = id.clone();
        assert!(
            wait_until(Duration::from_secs(5), || {
                let history = history.clone();
                let id = id.clone();
                async move { samples(history.as_ref(), &id).await.len() >= 4 }
            })
            .await
        );

        supervisor.shutdown().await;
        backend.close().await;
    }

    let backend = SqliteBackend::new(&db_path).await.unwrap();

    let snapshot = backend.get(&id).await.unwrap().unwrap();
    assert_eq!(snapshot.name, "Hypixel");
    assert_eq!(snapshot.online, 90);
    assert_eq!(snapshot.peak, 150);
    assert_eq!(snapshot.description.as_deref(), Some("A Minecraft Server"));
    assert!(snapshot.favicon.is_some());

    let recorded = samples(&backend, &id).await;
    assert!(recorded.len() >= 4);
    assert_eq!(recorded[0].online, 120);
    assert_eq!(recorded[1].online, 150);
    assert_eq!(snapshot.peak_at, recorded[1].timestamp);
}

#[tokio::test]
async fn test_restarted_generation_appends_without_conflicts() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(
        SqliteBackend::new(temp_dir.path().join("stats.db"))
            .await
            .unwrap(),
    );
    let client = MockQueryClient::new([]).with_fallback(Reply::Ok(status(10, "D")));
    let supervisor = supervisor(backend.clone(), client);
    let id = TargetId::new("Hypixel");

    supervisor
        .add_target(Target::new("Hypixel", "mc.hypixel.net"))
        .await
        .unwrap();

    // restart right after each first sample so consecutive samples land close together
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.refresh_target(&id).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(120)).await;
    supervisor.remove_target(&id).await.unwrap();

    let recorded = samples(backend.as_ref(), &id).await;
    assert!(recorded.len() >= 6);
    assert!(
        recorded
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    );

    let removed = backend.delete_all(&id).await.unwrap();
    assert_eq!(removed, recorded.len() as u64);
    assert!(samples(backend.as_ref(), &id).await.is_empty());
}

//! Drives the real `lmd` binary against an in-process daemon router,
//! exercising subscriber create / list / delete end to end.

use std::sync::Arc;

use assert_cmd::prelude::*;
use lmd_daemon::{routes, state::AppState};
use lmd_dispatcher::{Dispatcher, DispatcherConfig};
use lmd_scheduler::{Engine, SchedulerConfig};
use lmd_schemas::Fetcher;
use lmd_testkit::{MemoryStore, RecordingSink, ScriptedFetcher};
use predicates::prelude::*;

async fn spawn_daemon() -> String {
    let store = Arc::new(MemoryStore::new());
    let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new(vec![vec![]]));
    let engine = Engine::new(store.clone(), fetcher, SchedulerConfig::default());
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(RecordingSink::new()), DispatcherConfig::default());
    let state = Arc::new(AppState::new(store, engine, dispatcher));
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn create_list_and_delete_a_webhook_subscriber_via_the_cli() -> anyhow::Result<()> {
    let base_url = spawn_daemon().await;

    assert_cmd::Command::cargo_bin("lmdctl")?
        .args([
            "--server",
            &base_url,
            "subscriber",
            "create",
            "--id",
            "s1",
            "--type",
            "webhook",
            "--endpoint",
            "https://hooks.example.test/listing-events",
            "--webhook-secret-env",
            "WEBHOOK_SECRET_S1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"s1\""));

    assert_cmd::Command::cargo_bin("lmdctl")?
        .args(["--server", &base_url, "subscriber", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hooks.example.test"));

    assert_cmd::Command::cargo_bin("lmdctl")?
        .args(["--server", &base_url, "subscriber", "delete", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted subscriber=s1"));

    assert_cmd::Command::cargo_bin("lmdctl")?
        .args(["--server", &base_url, "subscriber", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));

    Ok(())
}

#[tokio::test]
async fn an_invalid_subscriber_type_is_rejected_before_any_request_is_sent() -> anyhow::Result<()> {
    let base_url = spawn_daemon().await;

    assert_cmd::Command::cargo_bin("lmdctl")?
        .args([
            "--server",
            &base_url,
            "subscriber",
            "create",
            "--id",
            "s2",
            "--type",
            "carrier-pigeon",
            "--endpoint",
            "https://example.test",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --type"));

    Ok(())
}

//! Smoke tests to verify command wiring

use std::net::SocketAddr;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use assert_cmd::Command;
use caredesk_server::{serve_with_shutdown, AppState, ServerConfig};
use predicates::prelude::*;
use serde_json::Value;

fn caredesk(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("caredesk").unwrap();
    cmd.env("HOME", home)
        .env("CAREDESK_QUIET", "1")
        .env_remove("CAREDESK_API_URL")
        .env_remove("RUST_LOG")
        .current_dir(home);
    cmd
}

/// Start the REST store on an ephemeral port on its own runtime thread.
/// The server lives until the test process exits.
fn spawn_server() -> String {
    let (tx, rx) = mpsc::channel::<SocketAddr>();
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            serve_with_shutdown(
                listener,
                AppState::default(),
                &ServerConfig::default(),
                std::future::pending::<()>(),
            )
            .await
            .unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

// === Wiring ===

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    caredesk(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_list_help() {
    let home = tempfile::tempdir().unwrap();
    caredesk(home.path())
        .args(["list", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skip the cache and refetch"));
}

#[test]
fn test_entities_lists_every_kind() {
    let home = tempfile::tempdir().unwrap();
    caredesk(home.path())
        .arg("entities")
        .assert()
        .success()
        .stdout(predicate::str::contains("insured_person"))
        .stdout(predicate::str::contains("provider_internal_code"))
        .stdout(predicate::str::contains("crosswalk"));
}

#[test]
fn test_unknown_entity_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    caredesk(home.path())
        .args(["list", "invoices"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invoices"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    caredesk(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("caredesk"));
}

// === Config ===

#[test]
fn test_config_init_then_refuses_overwrite() {
    let home = tempfile::tempdir().unwrap();
    caredesk(home.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(home.path().join(".caredesk/config.toml").exists());

    caredesk(home.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_config_path_points_at_home() {
    let home = tempfile::tempdir().unwrap();
    caredesk(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".caredesk"))
        .stdout(predicate::str::contains("caredesk.toml"));
}

// === Against a live server ===

#[test]
fn test_create_list_delete_against_server() {
    let home = tempfile::tempdir().unwrap();
    let url = spawn_server();

    let output = caredesk(home.path())
        .env("CAREDESK_API_URL", &url)
        .args(["create", "city", "--set", "name_en=Haifa", "--set", "code=HFA"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let created: Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = created["id"].as_str().unwrap().to_owned();

    let output = caredesk(home.path())
        .env("CAREDESK_API_URL", &url)
        .args(["list", "city", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let page: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["name_en"], "Haifa");

    caredesk(home.path())
        .env("CAREDESK_API_URL", &url)
        .args(["delete", "city", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 succeeded, 0 failed"));
}

#[test]
fn test_invalid_create_reports_field() {
    let home = tempfile::tempdir().unwrap();
    let url = spawn_server();

    caredesk(home.path())
        .env("CAREDESK_API_URL", &url)
        .args(["create", "city", "--set", "name_en=Haifa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("code"));
}

#[test]
fn test_import_dry_run_counts_rows() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("cities.csv");
    std::fs::write(&file, "Name (English),Code\nHaifa,HFA\nAcre,\n").unwrap();

    caredesk(home.path())
        .args(["import", "city"])
        .arg(&file)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 2 rows accepted"))
        .stderr(predicate::str::contains("row 2"));
}

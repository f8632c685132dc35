//! Smoke tests for the pushkit binary.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use pushkit_lib::config::DEFAULT_GROUP_IDENTIFIER;
use pushkit_lib::keys::AgreementPrivateKey;
use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::storage::FileStore;
use pushkit_lib::{AgreementKeys, SymmetricKey, Topic};
use tempfile::TempDir;

const HI_YO: &str = r#"{"title":"Hi","body":"Yo","icon":"","url":"","type":""}"#;

fn run_cli(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_pushkit"))
        .args(args)
        .env("PUSHKIT_DIR", dir)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Store a topic key the way the main app does and return the topic.
fn seed_topic(dir: &Path) -> Topic {
    let store = FileStore::open(dir, DEFAULT_GROUP_IDENTIFIER).unwrap();
    let kms = KeyManagementService::new(Arc::new(store));
    let keys = AgreementKeys {
        shared_key: SymmetricKey::generate(),
        public_key: AgreementPrivateKey::generate().public_key(),
    };
    let topic = keys.derived_topic();
    kms.set_agreement_secret(&keys, &topic).unwrap();
    topic
}

#[test]
fn test_config_show_defaults() {
    let dir = TempDir::new().unwrap();
    let (stdout, stderr, success) = run_cli(dir.path(), &["config", "show"]);
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.contains(DEFAULT_GROUP_IDENTIFIER));
    assert!(stdout.contains("deadline_ms"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"keyserver_url": "http://keys.example"}"#,
    )
    .unwrap();
    let (_, _, success) = run_cli(dir.path(), &["config", "show"]);
    assert!(!success);
}

#[test]
fn test_keygen_stores_key_pair() {
    let dir = TempDir::new().unwrap();
    let (stdout, stderr, success) = run_cli(dir.path(), &["keygen"]);
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.contains("Response Topic"));

    let store = FileStore::open_read_only(dir.path(), DEFAULT_GROUP_IDENTIFIER);
    let kms = KeyManagementService::new(Arc::new(store));
    assert_eq!(kms.store().keys("kms.private.").unwrap().len(), 1);
    assert_eq!(kms.store().keys("kms.public.").unwrap().len(), 1);
}

#[test]
fn test_subscriptions_list_empty() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, success) = run_cli(dir.path(), &["subscriptions", "list"]);
    assert!(success);
    assert!(stdout.contains("No subscriptions"));
}

#[test]
fn test_encrypt_then_decrypt() {
    let dir = TempDir::new().unwrap();
    let topic = seed_topic(dir.path());

    let (payload, stderr, success) = run_cli(
        dir.path(),
        &["encrypt", "--topic", topic.as_str(), "--message", HI_YO],
    );
    assert!(success, "stderr: {}", stderr);
    let payload_path = dir.path().join("payload.json");
    std::fs::write(&payload_path, payload).unwrap();

    let (stdout, stderr, success) = run_cli(
        dir.path(),
        &["decrypt", "--payload", payload_path.to_str().unwrap()],
    );
    assert!(success, "stderr: {}", stderr);
    let content: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(content["title"], "Hi");
    assert_eq!(content["body"], "Yo");
}

#[test]
fn test_decrypt_always_prints_content() {
    let dir = TempDir::new().unwrap();
    let payload_path = dir.path().join("payload.json");

    std::fs::write(&payload_path, "not json").unwrap();
    let (stdout, _, success) = run_cli(
        dir.path(),
        &["decrypt", "--payload", payload_path.to_str().unwrap()],
    );
    assert!(success);
    assert!(serde_json::from_str::<serde_json::Value>(&stdout).is_ok());

    let unknown_tag = r#"{"content":{"title":"Original","user_info":{"topic":"ab","message":"cd","tag":9999}}}"#;
    std::fs::write(&payload_path, unknown_tag).unwrap();
    let (stdout, _, success) = run_cli(
        dir.path(),
        &["decrypt", "--payload", payload_path.to_str().unwrap()],
    );
    assert!(success);
    let content: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(content["title"], "Original");
}

#[test]
fn test_register_requires_project_id() {
    let dir = TempDir::new().unwrap();
    let (_, _, success) = run_cli(
        dir.path(),
        &["register", "--client-id", "client", "--token", "token"],
    );
    assert!(!success);
}

#[test]
fn test_decrypt_ignores_invalid_config() {
    let dir = TempDir::new().unwrap();
    let topic = seed_topic(dir.path());
    let (payload, stderr, success) = run_cli(
        dir.path(),
        &["encrypt", "--topic", topic.as_str(), "--message", HI_YO],
    );
    assert!(success, "stderr: {}", stderr);
    let payload_path = dir.path().join("payload.json");
    std::fs::write(&payload_path, payload).unwrap();

    for config in [r#"{"keyserver_url": "http://keys.example"}"#, "not json"] {
        std::fs::write(dir.path().join("config.json"), config).unwrap();

        let (stdout, stderr, success) = run_cli(
            dir.path(),
            &["decrypt", "--payload", payload_path.to_str().unwrap()],
        );
        assert!(success, "stderr: {}", stderr);
        let content: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(content["title"], "Hi");
    }

    // Other commands still refuse the bad file.
    let (_, _, success) = run_cli(dir.path(), &["config", "show"]);
    assert!(!success);
}

#[test]
fn test_rust_log_overrides_default_filter() {
    let dir = TempDir::new().unwrap();
    let run = |rust_log: Option<&str>| {
        let mut command = Command::new(env!("CARGO_BIN_EXE_pushkit"));
        command
            .args(["subscriptions", "list"])
            .env("PUSHKIT_DIR", dir.path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        if let Some(filter) = rust_log {
            command.env("RUST_LOG", filter);
        }
        let output = command.output().expect("Failed to execute command");
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stderr).to_string()
    };

    assert!(!run(None).contains("configuration loaded"));
    assert!(run(Some("pushkit_cli=debug")).contains("configuration loaded"));
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Login handshake through secret-exchange files.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tgdrop::config::{Args, Config};
use tgdrop::credentials::CredentialError;
use tgdrop::shutdown::{self, Shutdown};
use tgdrop::transport::memory::RecordingTransport;
use tgdrop::transport::TransportError;
use tgdrop::Agent;

fn config(dir: &Path, secret_timeout_secs: u64) -> Config {
    let args = Args {
        api_id: Some("12345".into()),
        api_hash: Some("0123456789abcdef".into()),
        phone: Some("+15550001111".into()),
        folder: Some(dir.join("downloads")),
        user: Some("42".into()),
        code_file: Some(dir.join("telegram_code.txt")),
        password_file: Some(dir.join("telegram_password.txt")),
        secret_timeout: Some(secret_timeout_secs.to_string()),
        ..Args::default()
    };
    Config::from_args(&args).expect("valid test config")
}

fn credential_error(err: &anyhow::Error) -> Option<&CredentialError> {
    err.chain().find_map(|cause| cause.downcast_ref::<CredentialError>())
}

#[tokio::test]
async fn test_authorized_session_skips_secret_files() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::new());
    let agent = Agent::new(config(dir.path(), 5), transport.clone());

    let account = agent.login(&Shutdown::never()).await.unwrap();
    assert_eq!(account.id, 1000);
    assert!(transport.received_secrets().is_empty());
}

#[tokio::test]
async fn test_code_and_password_read_and_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let code_file = dir.path().join("telegram_code.txt");
    let password_file = dir.path().join("telegram_password.txt");

    let transport = Arc::new(RecordingTransport::new());
    transport.require_login("24680", Some("correct horse".to_string()));
    let agent = Agent::new(config(dir.path(), 30), transport.clone());

    let writer = tokio::spawn({
        let code_file = code_file.clone();
        let password_file = password_file.clone();
        async move {
            // An empty placeholder first, as a bind-mounted volume would leave.
            tokio::fs::write(&code_file, "").await.unwrap();
            tokio::time::sleep(Duration::from_millis(700)).await;
            tokio::fs::write(&code_file, "24680\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(700)).await;
            tokio::fs::write(&password_file, "  correct horse  ").await.unwrap();
        }
    });

    agent.login(&Shutdown::never()).await.unwrap();
    writer.await.unwrap();

    assert_eq!(
        transport.received_secrets(),
        vec!["24680".to_string(), "correct horse".to_string()]
    );
    assert!(!code_file.exists());
    assert!(!password_file.exists());
}

#[tokio::test]
async fn test_wrong_code_still_deletes_file() {
    let dir = tempfile::tempdir().unwrap();
    let code_file = dir.path().join("telegram_code.txt");
    std::fs::write(&code_file, "11111").unwrap();

    let transport = Arc::new(RecordingTransport::new());
    transport.require_login("99999", None);
    let agent = Agent::new(config(dir.path(), 5), transport.clone());

    let err = agent.login(&Shutdown::never()).await.unwrap_err();
    assert!(err
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<TransportError>(), Some(TransportError::Auth(_)))));
    assert!(!code_file.exists());
}

#[tokio::test(start_paused = true)]
async fn test_missing_code_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::new());
    transport.require_login("13579", None);
    let agent = Agent::new(config(dir.path(), 300), transport.clone());

    let err = agent.login(&Shutdown::never()).await.unwrap_err();
    match credential_error(&err) {
        Some(CredentialError::Timeout { path, waited }) => {
            assert_eq!(path, &dir.path().join("telegram_code.txt"));
            assert_eq!(*waited, Duration::from_secs(300));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_shutdown_interrupts_login() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::new());
    transport.require_login("13579", None);
    let agent = Agent::new(config(dir.path(), 300), transport.clone());
    let (trigger, shutdown) = shutdown::channel();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
    });

    let err = agent.run(shutdown).await.unwrap_err();
    stopper.await.unwrap();
    assert!(matches!(
        credential_error(&err),
        Some(CredentialError::Cancelled { .. })
    ));
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-document pipeline.
//!
//! ```text
//! Validating ─▶ Naming ─▶ Announcing ─▶ Streaming ─▶ Finalizing
//!     │                                    │
//!     └──▶ Rejected                        └──▶ Failed / Cancelled
//! ```
//!
//! Every failure is reported to the chat (best effort) and returned to the
//! caller, which logs it and moves on to the next update.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;

use super::messages;
use super::session::DownloadSession;
use super::status::StatusTarget;
use super::types::{DownloadError, DownloadReport, ValidationRejection};
use crate::config::Config;
use crate::files;
use crate::progress::{format_bytes, format_duration, ProgressReporter, TransferSummary, DEFAULT_EMIT_INTERVAL};
use crate::router::Accepted;
use crate::shutdown::Shutdown;
use crate::transport::{DocumentLocator, Transport, TransportError};

/// Upper bound on the goodbye edit sent while shutting down.
const SHUTDOWN_NOTICE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a stream ended early.
enum StreamFailure {
    Network(TransportError),
    Write(std::io::Error),
    Cancelled,
}

/// Validates, names, streams and reports one document at a time.
pub struct DownloadOrchestrator {
    transport: Arc<dyn Transport>,
    download_dir: PathBuf,
    allowed_extensions: Vec<String>,
    max_file_size: u64,
    progress_interval: Duration,
}

impl DownloadOrchestrator {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            download_dir: config.download_dir.clone(),
            allowed_extensions: config.allowed_extensions.clone(),
            max_file_size: config.max_file_size,
            progress_interval: DEFAULT_EMIT_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Apply the type and size policy to a declared name and size.
    pub fn validate(&self, file_name: &str, size: u64) -> Result<(), ValidationRejection> {
        if !self.allowed_extensions.is_empty() {
            let extension = files::extension_of(file_name);
            if !self.allowed_extensions.iter().any(|a| *a == extension) {
                return Err(ValidationRejection::ExtensionNotAllowed {
                    file_name: file_name.to_string(),
                    extension,
                    allowed: self.allowed_extensions.clone(),
                });
            }
        }

        if size > self.max_file_size {
            return Err(ValidationRejection::TooLarge {
                file_name: file_name.to_string(),
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Run one accepted document through the whole pipeline.
    pub async fn handle(&self, accepted: Accepted, shutdown: &Shutdown) -> Result<DownloadReport, DownloadError> {
        let Accepted { target, document, .. } = accepted;
        let file_name = document.display_name();
        let size = document.size;

        if let Err(rejection) = self.validate(&file_name, size) {
            tracing::warn!("Rejected {}: {}", file_name, rejection);
            if let Err(e) = self.transport.send_text(&target, &rejection.user_message()).await {
                tracing::warn!("Failed to send rejection message: {}", e);
            }
            return Err(rejection.into());
        }

        let requested = self.download_dir.join(files::sanitize(&file_name));
        tracing::info!(
            "Starting download: {} ({}) -> {}",
            file_name,
            format_bytes(size),
            requested.display()
        );

        let status =
            StatusTarget::announce(self.transport.clone(), target, &messages::starting(&file_name, size)).await;

        let (path, file) = match files::create_exclusive(&requested).await {
            Ok(created) => created,
            Err(source) => {
                tracing::error!("Error creating file {}: {}", requested.display(), source);
                status.conclude(&messages::disk_failure(&file_name)).await;
                return Err(DownloadError::Create { file_name, source });
            }
        };
        if path != requested {
            tracing::debug!("{} was taken, saving as {}", requested.display(), path.display());
        }

        let mut session = DownloadSession::new(path.clone(), size, status);
        let final_name = session.file_name().to_string();
        session.status().update(&messages::connecting(&final_name, size)).await;

        match self.stream_into(&mut session, file, &document.locator, shutdown).await {
            Ok(summary) => {
                tracing::info!(
                    "Downloaded {} ({}) in {}",
                    path.display(),
                    format_bytes(summary.bytes),
                    format_duration(summary.elapsed)
                );
                session
                    .status()
                    .conclude(&messages::completed(&final_name, &path, &summary))
                    .await;
                Ok(DownloadReport { path, summary })
            }
            Err(StreamFailure::Network(source)) => {
                tracing::error!("Download failed for {}: {}", final_name, source);
                session.status().conclude(&messages::network_failure(&final_name)).await;
                Err(DownloadError::Network { path, source })
            }
            Err(StreamFailure::Write(source)) => {
                tracing::error!("Error writing {}: {}", path.display(), source);
                session.status().conclude(&messages::write_failure(&final_name)).await;
                Err(DownloadError::Write { path, source })
            }
            Err(StreamFailure::Cancelled) => {
                let written = session.written();
                tracing::warn!(
                    "Download of {} interrupted by shutdown after {}; partial file kept",
                    path.display(),
                    format_bytes(written)
                );
                let text = messages::cancelled(&final_name);
                let notice = session.status().conclude(&text);
                if tokio::time::timeout(SHUTDOWN_NOTICE_TIMEOUT, notice).await.is_err() {
                    tracing::debug!("Gave up on the shutdown notice");
                }
                Err(DownloadError::Cancelled { path, written })
            }
        }
    }

    async fn stream_into(
        &self,
        session: &mut DownloadSession,
        file: File,
        locator: &DocumentLocator,
        shutdown: &Shutdown,
    ) -> Result<TransferSummary, StreamFailure> {
        let mut stream = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(StreamFailure::Cancelled),
            stream = self.transport.download(locator) => stream.map_err(StreamFailure::Network)?,
        };

        let mut reporter = ProgressReporter::new(file, session).with_interval(self.progress_interval);
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(StreamFailure::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => reporter.write_chunk(&chunk).await.map_err(StreamFailure::Write)?,
                Some(Err(e)) => return Err(StreamFailure::Network(e)),
                None => break,
            }
        }

        reporter.finish().await.map_err(StreamFailure::Write)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::{ApiCredentials, DEFAULT_SECRET_TIMEOUT};
    use crate::transport::memory::{MemoryDocument, RecordingTransport};
    use crate::transport::{InboundDocument, Peer, ReplyTarget};

    fn config(dir: &Path, types: &[&str], max: u64) -> Config {
        Config {
            api: ApiCredentials {
                api_id: 1,
                api_hash: "hash".into(),
                phone: "+1000".into(),
            },
            download_dir: dir.to_path_buf(),
            allowed_user: 42,
            container: None,
            allowed_extensions: types.iter().map(|t| t.to_string()).collect(),
            max_file_size: max,
            session_file: dir.join("session.json"),
            code_file: dir.join("code.txt"),
            password_file: dir.join("password.txt"),
            secret_timeout: DEFAULT_SECRET_TIMEOUT,
            debug: false,
        }
    }

    fn accepted(name: &str, bytes: &[u8], document: MemoryDocument) -> Accepted {
        Accepted {
            target: ReplyTarget::new(Peer::User(42), 9),
            sender: 42,
            document: InboundDocument {
                id: 1,
                file_name: Some(name.to_string()),
                size: bytes.len() as u64,
                locator: document.into_locator(),
            },
        }
    }

    #[test]
    fn test_validate_policy() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = DownloadOrchestrator::new(
            &config(dir.path(), &["pdf"], 1000),
            Arc::new(RecordingTransport::new()),
        );
        assert!(orchestrator.validate("report.PDF", 500).is_ok());
        assert!(matches!(
            orchestrator.validate("x.exe", 10),
            Err(ValidationRejection::ExtensionNotAllowed { ref extension, .. }) if extension == "exe"
        ));
        assert!(matches!(
            orchestrator.validate("big.pdf", 1001),
            Err(ValidationRejection::TooLarge { size: 1001, max: 1000, .. })
        ));
        assert!(orchestrator.validate("exact.pdf", 1000).is_ok());
    }

    #[tokio::test]
    async fn test_successful_download() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(&config(dir.path(), &[], 1 << 20), transport.clone());

        let bytes = vec![5u8; 300];
        let report = orchestrator
            .handle(
                accepted("notes.txt", &bytes, MemoryDocument::from_bytes(&bytes, 64)),
                &Shutdown::never(),
            )
            .await
            .unwrap();

        assert_eq!(report.path, dir.path().join("notes.txt"));
        assert_eq!(report.summary.bytes, 300);
        assert_eq!(std::fs::read(&report.path).unwrap(), bytes);

        let sent = transport.sent_texts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("⏳ Starting download..."));
        let edits = transport.edited_texts();
        assert!(edits.first().unwrap().contains("🔄 Connecting..."));
        assert!(edits.last().unwrap().contains("✅ Downloaded: notes.txt"));
    }

    #[tokio::test]
    async fn test_network_failure_keeps_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(&config(dir.path(), &[], 1 << 20), transport.clone());

        let bytes = vec![1u8; 256];
        let err = orchestrator
            .handle(
                accepted("flaky.bin", &bytes, MemoryDocument::from_bytes(&bytes, 64).failing_after(2)),
                &Shutdown::never(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Network { .. }));
        assert_eq!(std::fs::read(dir.path().join("flaky.bin")).unwrap().len(), 128);
        assert!(transport
            .edited_texts()
            .last()
            .unwrap()
            .contains("🌐 Network error occurred"));
    }

    #[tokio::test]
    async fn test_missing_download_dir_is_disk_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(&config(&missing, &[], 1 << 20), transport.clone());

        let bytes = vec![1u8; 8];
        let err = orchestrator
            .handle(accepted("a.txt", &bytes, MemoryDocument::from_bytes(&bytes, 8)), &Shutdown::never())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Create { .. }));
        assert_eq!(transport.download_count(), 0);
        assert!(transport
            .edited_texts()
            .last()
            .unwrap()
            .contains("💾 Check disk space and permissions"));
    }

    #[tokio::test]
    async fn test_overlong_name_is_shortened_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(&config(dir.path(), &[], 1 << 20), transport.clone());

        let name = format!("{}.pdf", "я".repeat(150));
        let bytes = vec![7u8; 16];
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.handle(accepted(&name, &bytes, MemoryDocument::from_bytes(&bytes, 8)), &Shutdown::never()),
        )
        .await
        .expect("download finished")
        .unwrap();

        let saved = report.path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(saved.len() <= files::MAX_NAME_BYTES);
        assert!(saved.ends_with(".pdf"));
        assert_eq!(std::fs::read(&report.path).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_control_characters_dropped_from_name() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(&config(dir.path(), &[], 1 << 20), transport.clone());

        let bytes = vec![1u8; 4];
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.handle(
                accepted("a\0b\n.txt", &bytes, MemoryDocument::from_bytes(&bytes, 4)),
                &Shutdown::never(),
            ),
        )
        .await
        .expect("download finished")
        .unwrap();

        assert_eq!(report.path, dir.path().join("ab.txt"));
    }

    #[tokio::test]
    async fn test_download_root_replaced_by_file_is_disk_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("downloads");
        std::fs::write(&root, b"not a directory").unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(&config(&root, &[], 1 << 20), transport.clone());

        let bytes = vec![1u8; 4];
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.handle(accepted("a.txt", &bytes, MemoryDocument::from_bytes(&bytes, 4)), &Shutdown::never()),
        )
        .await
        .expect("gave up instead of spinning")
        .unwrap_err();

        assert!(matches!(err, DownloadError::Create { .. }));
        assert_eq!(transport.download_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_stream() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(&config(dir.path(), &[], 1 << 20), transport.clone());
        let (trigger, shutdown) = crate::shutdown::channel();
        trigger.trigger();

        let bytes = vec![1u8; 64];
        let err = orchestrator
            .handle(accepted("late.bin", &bytes, MemoryDocument::from_bytes(&bytes, 8)), &shutdown)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Cancelled { written: 0, .. }));
        assert!(dir.path().join("late.bin").exists());
    }

    #[tokio::test]
    async fn test_unknown_size_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(&config(dir.path(), &[], 10), transport.clone());

        let bytes = vec![3u8; 50];
        let mut request = accepted("stream.log", &bytes, MemoryDocument::from_bytes(&bytes, 10));
        request.document.size = 0;

        let report = orchestrator.handle(request, &Shutdown::never()).await.unwrap();
        assert_eq!(report.summary.bytes, 50);
    }
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Non-interactive login secrets.
//!
//! The process has no terminal, so the login code and the optional 2FA
//! password reach it through files: the operator writes the secret into a
//! known path, the agent polls for it, reads it once and deletes it.
//!
//! ```text
//!  transport asks ─▶ PendingAuthRequest::new(path, timeout)
//!                           │ poll every 500ms
//!                           ▼
//!             file missing / empty ──▶ keep waiting
//!             file has content     ──▶ read, delete, return trimmed
//!             deadline passed      ──▶ CredentialError::Timeout
//!             shutdown requested   ──▶ CredentialError::Cancelled
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::Config;
use crate::shutdown::Shutdown;

/// How often the secret file is checked.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Why a secret could not be obtained.
#[derive(Debug)]
pub enum CredentialError {
    /// No non-empty file appeared before the deadline.
    Timeout { path: PathBuf, waited: Duration },
    /// The file exists but could not be read.
    Read { path: PathBuf, source: io::Error },
    /// The secret was read but the file could not be removed.
    Remove { path: PathBuf, source: io::Error },
    /// Shutdown was requested while waiting.
    Cancelled { path: PathBuf },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { path, waited } => write!(
                f,
                "timeout waiting for file: {} (waited {}s)",
                path.display(),
                waited.as_secs()
            ),
            Self::Read { path, source } => {
                write!(f, "failed to read file {}: {}", path.display(), source)
            }
            Self::Remove { path, source } => write!(
                f,
                "secret read but file {} could not be deleted: {}",
                path.display(),
                source
            ),
            Self::Cancelled { path } => {
                write!(f, "stopped waiting for file {}: shutting down", path.display())
            }
        }
    }
}

impl std::error::Error for CredentialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Remove { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One outstanding request for an operator-supplied secret.
///
/// Consumed by [`PendingAuthRequest::wait`]; a second secret needs a fresh
/// request and a fresh file.
#[derive(Debug)]
pub struct PendingAuthRequest {
    path: PathBuf,
    timeout: Duration,
    deadline: Instant,
    poll_interval: Duration,
}

impl PendingAuthRequest {
    /// Start the clock: the deadline is `timeout` from now.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            deadline: Instant::now() + timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Poll until the file holds a non-empty secret, the deadline passes,
    /// or `shutdown` fires. On success the file has already been deleted.
    pub async fn wait(self, shutdown: &Shutdown) -> Result<String, CredentialError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reported_empty = false;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    return Err(CredentialError::Cancelled { path: self.path });
                }
                _ = tokio::time::sleep_until(self.deadline) => {
                    return Err(CredentialError::Timeout {
                        path: self.path,
                        waited: self.timeout,
                    });
                }
                _ = ticker.tick() => {
                    match take_secret(&self.path).await? {
                        Some(secret) => return Ok(secret),
                        None => {
                            if !reported_empty && self.path.exists() {
                                tracing::info!(
                                    "File {} is empty, waiting for content...",
                                    self.path.display()
                                );
                                reported_empty = true;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Read, trim and delete the secret file. `Ok(None)` means "not ready":
/// missing, or present with only whitespace.
async fn take_secret(path: &Path) -> Result<Option<String>, CredentialError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CredentialError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let secret = content.trim();
    if secret.is_empty() {
        return Ok(None);
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        // Someone else removed it first; the secret is still ours.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(CredentialError::Remove {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    Ok(Some(secret.to_string()))
}

/// Wait up to `timeout` for a non-empty secret at `path`, then delete it.
pub async fn await_secret(
    path: &Path,
    timeout: Duration,
    shutdown: &Shutdown,
) -> Result<String, CredentialError> {
    PendingAuthRequest::new(path, timeout).wait(shutdown).await
}

/// Source of login secrets for the transport's handshake.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// The one-time login code.
    async fn login_code(&self) -> Result<String, CredentialError>;

    /// The second-factor password; only asked for when the account has one.
    async fn password(&self) -> Result<String, CredentialError>;
}

/// [`SecretProvider`] backed by two secret-exchange files.
///
/// Each call creates its own [`PendingAuthRequest`]. Calls are serialized:
/// a password wait never overlaps a code wait.
pub struct FileSecrets {
    code_file: PathBuf,
    password_file: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
    shutdown: Shutdown,
    in_flight: Mutex<()>,
}

impl FileSecrets {
    pub fn new(
        code_file: impl Into<PathBuf>,
        password_file: impl Into<PathBuf>,
        timeout: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            code_file: code_file.into(),
            password_file: password_file.into(),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown,
            in_flight: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config, shutdown: Shutdown) -> Self {
        Self::new(
            &config.code_file,
            &config.password_file,
            config.secret_timeout,
            shutdown,
        )
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn wait_for(&self, path: &Path) -> Result<String, CredentialError> {
        let _guard = self.in_flight.lock().await;
        PendingAuthRequest::new(path, self.timeout)
            .with_poll_interval(self.poll_interval)
            .wait(&self.shutdown)
            .await
    }
}

#[async_trait]
impl SecretProvider for FileSecrets {
    async fn login_code(&self) -> Result<String, CredentialError> {
        tracing::info!("===========================================");
        tracing::info!("VERIFICATION CODE REQUIRED");
        tracing::info!("===========================================");
        tracing::info!("A verification code has been sent to your Telegram app");
        tracing::info!("Please create the file: {}", self.code_file.display());
        tracing::info!("Write the verification code to this file");
        tracing::info!(
            "Waiting for code file (timeout: {}s)...",
            self.timeout.as_secs()
        );
        tracing::info!("===========================================");

        let code = self.wait_for(&self.code_file).await?;
        tracing::info!("Verification code received and file deleted");
        Ok(code)
    }

    async fn password(&self) -> Result<String, CredentialError> {
        tracing::info!(
            "2FA password required. Waiting for password in file: {}",
            self.password_file.display()
        );
        tracing::info!("Please create the file and write your 2FA password to it");

        let password = self.wait_for(&self.password_file).await?;
        tracing::info!("Password received and file deleted");
        Ok(password)
    }
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The agent: login, greeting and the update dispatch loop.
//!
//! ```text
//!  transport.pump_updates ──mpsc──▶ dispatch loop ──▶ AuthorizationRouter
//!                                                        │ Accepted
//!                                                        ▼
//!                                               DownloadOrchestrator
//! ```
//!
//! The transport pushes typed updates onto a bounded intake queue; a single
//! loop pulls them off one at a time. Nothing a document does (rejection,
//! network error, full disk) stops the loop. Only shutdown or the update
//! stream ending does.

mod greeting;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::credentials::FileSecrets;
use crate::download::{DownloadError, DownloadOrchestrator, DownloadReport};
use crate::router::{AuthorizationRouter, Rejection};
use crate::shutdown::Shutdown;
use crate::transport::{Account, InboundUpdate, MessageId, Transport};

/// Capacity of the intake queue between the transport and the loop.
pub const INTAKE_CAPACITY: usize = 64;

/// What became of one update.
#[derive(Debug)]
pub enum UpdateOutcome {
    Dropped(Rejection),
    Downloaded(DownloadReport),
    Failed(DownloadError),
}

/// Counters for one run of the dispatch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: usize,
    pub dropped: usize,
    pub downloaded: usize,
    pub failed: usize,
}

impl DispatchStats {
    fn record(&mut self, outcome: &UpdateOutcome) {
        self.received += 1;
        match outcome {
            UpdateOutcome::Dropped(_) => self.dropped += 1,
            UpdateOutcome::Downloaded(_) => self.downloaded += 1,
            UpdateOutcome::Failed(_) => self.failed += 1,
        }
    }
}

pub struct Agent {
    config: Config,
    transport: Arc<dyn Transport>,
    router: AuthorizationRouter,
    orchestrator: DownloadOrchestrator,
}

impl Agent {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let router = AuthorizationRouter::from_config(&config);
        let orchestrator = DownloadOrchestrator::new(&config, transport.clone());
        Self {
            config,
            transport,
            router,
            orchestrator,
        }
    }

    /// Override the throttle between progress edits.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.orchestrator = self.orchestrator.with_progress_interval(interval);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Authenticate, pulling the code and password from their files when
    /// the session is not already authorized.
    pub async fn login(&self, shutdown: &Shutdown) -> Result<Account> {
        let secrets = FileSecrets::from_config(&self.config, shutdown.clone());
        let account = self
            .transport
            .authenticate(&self.config.api.phone, &secrets)
            .await
            .context("Telegram login failed")?;

        tracing::info!("Logged in as {} (ID: {})", account.display_name, account.id);
        Ok(account)
    }

    /// Send the start-up greeting. Never fails; problems are logged.
    pub async fn greet(&self) -> Option<MessageId> {
        match greeting::send_greeting(self.transport.as_ref(), &self.config).await {
            Ok(id) => {
                tracing::info!("Greeting sent");
                Some(id)
            }
            Err(hint) => {
                hint.log_warn();
                None
            }
        }
    }

    /// Log in, greet, then process updates until shutdown or until the
    /// transport's update stream ends.
    pub async fn run(&self, shutdown: Shutdown) -> Result<DispatchStats> {
        self.login(&shutdown).await?;
        self.greet().await;

        let (tx, rx) = mpsc::channel(INTAKE_CAPACITY);
        let transport = self.transport.clone();
        let mut pump = tokio::spawn(async move { transport.pump_updates(tx).await });

        tracing::info!("Agent is running. Press Ctrl+C to stop.");
        let stats = self.dispatch(rx, &shutdown).await;

        if shutdown.is_triggered() {
            pump.abort();
            tracing::info!(
                "Stopped after {} updates ({} downloaded, {} failed)",
                stats.received,
                stats.downloaded,
                stats.failed
            );
            return Ok(stats);
        }

        match (&mut pump).await {
            Ok(Ok(())) => {
                tracing::info!("Update stream closed");
                Ok(stats)
            }
            Ok(Err(e)) => Err(anyhow::Error::new(e).context("Update stream failed")),
            Err(e) => Err(anyhow::Error::new(e).context("Update task panicked")),
        }
    }

    /// Drain the intake queue one update at a time.
    pub async fn dispatch(&self, mut intake: mpsc::Receiver<InboundUpdate>, shutdown: &Shutdown) -> DispatchStats {
        let mut stats = DispatchStats::default();
        loop {
            let update = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, leaving the update loop");
                    break;
                }
                update = intake.recv() => match update {
                    Some(update) => update,
                    None => break,
                },
            };
            let outcome = self.handle_update(update, shutdown).await;
            stats.record(&outcome);
        }
        stats
    }

    /// Route one update and, if accepted, download its document.
    pub async fn handle_update(&self, update: InboundUpdate, shutdown: &Shutdown) -> UpdateOutcome {
        let accepted = match self.router.route(update) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                tracing::debug!("Dropped update: {}", rejection);
                return UpdateOutcome::Dropped(rejection);
            }
        };

        tracing::info!(
            "Received document {} from user {}",
            accepted.document.display_name(),
            accepted.sender
        );

        match self.orchestrator.handle(accepted, shutdown).await {
            Ok(report) => UpdateOutcome::Downloaded(report),
            Err(e) => {
                match &e {
                    DownloadError::Rejected(_) | DownloadError::Cancelled { .. } => {
                        tracing::warn!("{}", e)
                    }
                    _ => tracing::error!("{}", e),
                }
                UpdateOutcome::Failed(e)
            }
        }
    }
}

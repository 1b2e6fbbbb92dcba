// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide cancellation signal.
//!
//! A [`ShutdownTrigger`] flips a `watch` channel once; every clone of the
//! matching [`Shutdown`] observes it. The credential wait, the dispatch loop
//! and in-flight downloads all select on [`Shutdown::cancelled`].

use std::sync::Arc;

use tokio::sync::watch;

/// Sending half. Dropping it without calling [`ShutdownTrigger::trigger`]
/// leaves every listener waiting forever, which is what tests want.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
    _anchor: Option<Arc<watch::Sender<bool>>>,
}

/// Create a connected trigger/listener pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx, _anchor: None })
}

impl ShutdownTrigger {
    /// Signal every listener. Idempotent.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// A listener that is never triggered.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _anchor: Some(Arc::new(tx)),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Trigger dropped without firing: never resolves.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_listeners() {
        let (trigger, shutdown) = channel();
        let listener = shutdown.clone();
        let waiter = tokio::spawn(async move { listener.cancelled().await });

        assert!(!shutdown.is_triggered());
        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("listener should wake")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_stays_pending() {
        let shutdown = Shutdown::never();
        let result = tokio::time::timeout(Duration::from_secs(60), shutdown.cancelled()).await;
        assert!(result.is_err());
    }
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Progress Reporter - throttled status updates while bytes stream to disk.
//!
//! Wraps the destination writer. Every chunk is written and counted; at most
//! one status edit goes out per throttle interval (default 2s), however
//! small the chunks are. An edit that fails is logged and the transfer
//! carries on.

mod format;

pub use format::{
    average_speed, eta, format_bytes, format_duration, percentage, progress_bar, render_bytes_only,
    render_progress, BAR_WIDTH,
};

use std::io;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::download::DownloadSession;

/// Minimum gap between two status edits.
pub const DEFAULT_EMIT_INTERVAL: Duration = Duration::from_secs(2);

/// Totals of a finished transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSummary {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl TransferSummary {
    /// Bytes per second over the whole transfer.
    pub fn average_speed(&self) -> u64 {
        average_speed(self.bytes, self.elapsed)
    }
}

/// Byte sink that reports progress into the session's status message.
pub struct ProgressReporter<'a, W> {
    sink: W,
    session: &'a mut DownloadSession,
    interval: Duration,
    emitted: usize,
}

impl<'a, W: AsyncWrite + Unpin> ProgressReporter<'a, W> {
    pub fn new(sink: W, session: &'a mut DownloadSession) -> Self {
        Self {
            sink,
            session,
            interval: DEFAULT_EMIT_INTERVAL,
            emitted: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Status edits sent so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Write one chunk, then emit a status edit if the throttle allows.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.sink.write_all(chunk).await?;
        self.session.record_written(chunk.len() as u64);

        if self.session.take_emit_slot(self.interval) {
            let text = self.render();
            self.session.status().update(&text).await;
            self.emitted += 1;
        }
        Ok(())
    }

    fn render(&self) -> String {
        let name = self.session.file_name();
        let current = self.session.written();
        match self.session.total() {
            0 => render_bytes_only(name, current),
            total => render_progress(name, current, total, self.session.elapsed()),
        }
    }

    /// Flush the sink and return the totals.
    pub async fn finish(mut self) -> io::Result<TransferSummary> {
        self.sink.flush().await?;
        Ok(TransferSummary {
            bytes: self.session.written(),
            elapsed: self.session.elapsed(),
        })
    }
}

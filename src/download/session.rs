// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

use super::status::StatusTarget;

/// State of one accepted document while its bytes are written.
///
/// Owned by the task driving the download; nothing else touches it.
pub struct DownloadSession {
    path: PathBuf,
    file_name: String,
    total: u64,
    written: u64,
    started: Instant,
    last_emit: Instant,
    status: StatusTarget,
}

impl DownloadSession {
    /// `total` of zero means the size is unknown.
    pub fn new(path: PathBuf, total: u64, status: StatusTarget) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let now = Instant::now();
        Self {
            path,
            file_name,
            total,
            written: 0,
            started: now,
            last_emit: now,
            status,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn status(&self) -> &StatusTarget {
        &self.status
    }

    pub(crate) fn record_written(&mut self, bytes: u64) {
        self.written = self.written.saturating_add(bytes);
    }

    /// True (and the emit clock reset) when more than `interval` has passed
    /// since the last emission.
    pub(crate) fn take_emit_slot(&mut self, interval: Duration) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_emit) > interval {
            self.last_emit = now;
            true
        } else {
            false
        }
    }
}

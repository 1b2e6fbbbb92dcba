// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Human-readable sizes, durations and progress lines.

use std::time::Duration;

/// Slots in the progress bar.
pub const BAR_WIDTH: usize = 20;

const FILLED: char = '█';
const EMPTY: char = '░';
const UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Format a byte count on a 1024 scale: `512 B`, `1.5 KB`, `2.0 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp + 1 < UNITS.len() {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, UNITS[exp])
}

/// Format a duration as `45s`, `3m 7s` or `2h 5m`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Completion percentage, clamped to `0.0..=100.0`. `None` when the total
/// is unknown.
pub fn percentage(current: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((current as f64 / total as f64 * 100.0).min(100.0))
}

/// Fixed-width bar for a percentage: `[██████░░░░░░░░░░░░░░]`.
pub fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64) as usize;
    let filled = filled.min(BAR_WIDTH);

    let mut bar = String::with_capacity(BAR_WIDTH * 3 + 2);
    bar.push('[');
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(BAR_WIDTH - filled));
    bar.push(']');
    bar
}

/// Time left at the average rate since the start.
///
/// `None` when nothing has arrived yet, no time has passed, or the
/// transfer is already complete.
pub fn eta(current: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    let elapsed = elapsed.as_secs_f64();
    if current == 0 || elapsed <= 0.0 || current >= total {
        return None;
    }
    let rate = current as f64 / elapsed;
    let remaining = (total - current) as f64 / rate;
    Some(Duration::from_secs_f64(remaining))
}

/// Average bytes per second over `elapsed`. A zero-length transfer window
/// counts as one second.
pub fn average_speed(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return bytes;
    }
    (bytes as f64 / secs) as u64
}

/// Status text for a transfer with a known total.
pub fn render_progress(file_name: &str, current: u64, total: u64, elapsed: Duration) -> String {
    let percent = percentage(current, total).unwrap_or(0.0);
    let eta = eta(current, total, elapsed)
        .map(|d| format!(" • ETA: {}", format_duration(d)))
        .unwrap_or_default();

    format!(
        "📥 Downloading: {}\n{} {:.1}%\n📊 {} / {}{}",
        file_name,
        progress_bar(percent),
        percent,
        format_bytes(current),
        format_bytes(total),
        eta
    )
}

/// Status text when the total is unknown.
pub fn render_bytes_only(file_name: &str, current: u64) -> String {
    format!(
        "📥 Downloading: {}\n🔄 Progress: {} downloaded\n⏱️ In progress...",
        file_name,
        format_bytes(current)
    )
}

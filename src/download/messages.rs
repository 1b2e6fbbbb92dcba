// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! User-facing chat texts for each download stage.

use std::path::Path;

use crate::progress::{format_bytes, TransferSummary};

pub fn starting(file_name: &str, size: u64) -> String {
    format!(
        "📥 Downloading: {}\n📊 Size: {}\n⏳ Starting download...",
        file_name,
        format_bytes(size)
    )
}

pub fn connecting(file_name: &str, size: u64) -> String {
    format!(
        "📥 Downloading: {}\n📊 Size: {}\n🔄 Connecting...",
        file_name,
        format_bytes(size)
    )
}

pub fn completed(file_name: &str, path: &Path, summary: &TransferSummary) -> String {
    format!(
        "✅ Downloaded: {}\n📊 Size: {}\n⚡ Avg Speed: {}/s\n📁 Saved to: {}",
        file_name,
        format_bytes(summary.bytes),
        format_bytes(summary.average_speed()),
        path.display()
    )
}

pub fn network_failure(file_name: &str) -> String {
    format!("❌ Download failed: {}\n🌐 Network error occurred", file_name)
}

pub fn disk_failure(file_name: &str) -> String {
    format!(
        "❌ Error creating file: {}\n💾 Check disk space and permissions",
        file_name
    )
}

pub fn write_failure(file_name: &str) -> String {
    format!(
        "❌ Download failed: {}\n💾 Error writing to disk",
        file_name
    )
}

pub fn cancelled(file_name: &str) -> String {
    format!("⏹️ Download stopped: {}\n🔌 Agent shutting down", file_name)
}

pub fn extension_not_allowed(file_name: &str, extension: &str, allowed: &[String]) -> String {
    let shown = if extension.is_empty() { "(none)" } else { extension };
    format!(
        "❌ File type not allowed: {}\n📎 Extension: {}\n✅ Allowed types: {}\n\n💡 Please send only allowed file types.",
        file_name,
        shown,
        allowed.join(", ")
    )
}

pub fn too_large(file_name: &str, size: u64, max: u64) -> String {
    format!(
        "❌ File too large: {}\n📊 Size: {}\n🚫 Maximum limit: {}",
        file_name,
        format_bytes(size),
        format_bytes(max)
    )
}

/// Start-up greeting with the active limits.
pub fn greeting(timestamp: &str, max_file_size: u64, allowed: &[String]) -> String {
    let types = if allowed.is_empty() {
        "📎 All file types accepted".to_string()
    } else {
        format!("📎 Allowed types: {}", allowed.join(", "))
    };
    format!(
        "[{}] Hi, show me the docs!\n\n📋 File size limit: {}\n{}\n💡 Send me a document and I'll save it.",
        timestamp,
        format_bytes(max_file_size),
        types
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_too_large_renders_both_sizes() {
        let text = too_large("big.iso", 3 * 1024 * 1024 * 1024, 2_147_483_648);
        assert!(text.contains("3.0 GB"));
        assert!(text.contains("🚫 Maximum limit: 2.0 GB"));
    }

    #[test]
    fn test_extension_rejection_names_extension() {
        let text = extension_not_allowed("x.exe", "exe", &["pdf".into(), "txt".into()]);
        assert!(text.contains("📎 Extension: exe"));
        assert!(text.contains("pdf, txt"));
        let none = extension_not_allowed("Makefile", "", &["pdf".into()]);
        assert!(none.contains("Extension: (none)"));
    }

    #[test]
    fn test_completed_names_path_and_speed() {
        let summary = TransferSummary {
            bytes: 2048,
            elapsed: Duration::from_secs(2),
        };
        let text = completed("a.txt", Path::new("/tmp/x/a.txt"), &summary);
        assert!(text.contains("2.0 KB"));
        assert!(text.contains("⚡ Avg Speed: 1.0 KB/s"));
        assert!(text.contains("📁 Saved to: /tmp/x/a.txt"));
    }

    #[test]
    fn test_greeting_variants() {
        let open = greeting("2025-01-02 03:04:05", 1024, &[]);
        assert!(open.starts_with("[2025-01-02 03:04:05] Hi, show me the docs!"));
        assert!(open.contains("1.0 KB"));
        assert!(open.contains("All file types accepted"));

        let limited = greeting("2025-01-02 03:04:05", 1024, &["pdf".into()]);
        assert!(limited.contains("📎 Allowed types: pdf"));
    }
}

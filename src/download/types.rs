// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download outcomes and errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

use super::messages;
use crate::progress::{format_bytes, TransferSummary};
use crate::transport::TransportError;

/// A document refused before any bytes were fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRejection {
    ExtensionNotAllowed {
        file_name: String,
        extension: String,
        allowed: Vec<String>,
    },
    TooLarge {
        file_name: String,
        size: u64,
        max: u64,
    },
}

impl ValidationRejection {
    /// The chat text explaining the refusal.
    pub fn user_message(&self) -> String {
        match self {
            Self::ExtensionNotAllowed {
                file_name,
                extension,
                allowed,
            } => messages::extension_not_allowed(file_name, extension, allowed),
            Self::TooLarge { file_name, size, max } => messages::too_large(file_name, *size, *max),
        }
    }
}

impl fmt::Display for ValidationRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtensionNotAllowed { file_name, extension, .. } => {
                write!(f, "file type {:?} not allowed: {}", extension, file_name)
            }
            Self::TooLarge { file_name, size, max } => write!(
                f,
                "file too large: {} ({} > {})",
                file_name,
                format_bytes(*size),
                format_bytes(*max)
            ),
        }
    }
}

/// Why a download did not complete. None of these stop the agent.
#[derive(Debug)]
pub enum DownloadError {
    /// Refused by the type or size policy.
    Rejected(ValidationRejection),
    /// The destination file could not be created.
    Create { file_name: String, source: io::Error },
    /// Writing to the destination failed mid-stream.
    Write { path: PathBuf, source: io::Error },
    /// Fetching the bytes failed.
    Network { path: PathBuf, source: TransportError },
    /// Shutdown interrupted the stream; the partial file stays.
    Cancelled { path: PathBuf, written: u64 },
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(r) => write!(f, "{}", r),
            Self::Create { file_name, source } => {
                write!(f, "failed to create file for {}: {}", file_name, source)
            }
            Self::Write { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::Network { path, source } => {
                write!(f, "download of {} failed: {}", path.display(), source)
            }
            Self::Cancelled { path, written } => write!(
                f,
                "download of {} cancelled after {}",
                path.display(),
                format_bytes(*written)
            ),
        }
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Create { source, .. } | Self::Write { source, .. } => Some(source),
            Self::Network { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidationRejection> for DownloadError {
    fn from(r: ValidationRejection) -> Self {
        Self::Rejected(r)
    }
}

/// A completed download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub summary: TransferSummary,
}

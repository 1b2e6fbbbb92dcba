// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! tgdrop - headless document drop for a Telegram account
//!
//! Send a file to your own account from your phone; it lands on the server.
//!
//! tgdrop logs in as a user account, watches incoming messages, and when the
//! one allowed sender attaches a document it streams the file into a local
//! folder while editing a status message in the chat with live progress.
//!
//! # Core Modules
//!
//! - [`config`] - Flag/environment surface and the immutable [`Config`]
//! - [`credentials`] - Login code and 2FA password handed over through files
//! - [`router`] - Authorization and direct/channel routing of updates
//! - [`download`] - Validation, naming, streaming and outcome reporting
//! - [`progress`] - Throttled progress text and byte/duration formatting
//! - [`files`] - Filename sanitizing and collision-safe creation
//! - [`agent`] - Login, greeting and the update dispatch loop
//! - [`transport`] - The messaging-platform seam and its implementations
//! - [`shutdown`] - Process-wide cancellation
//! - [`error`] - Operator hints for the log

pub mod agent;
pub mod config;
pub mod credentials;
pub mod download;
pub mod error;
pub mod files;
pub mod progress;
pub mod router;
pub mod shutdown;
pub mod sync;
pub mod transport;
pub mod utils;

pub use agent::{Agent, DispatchStats, UpdateOutcome};
pub use config::{Args, Config, ConfigError, RoutingMode};
pub use credentials::{await_secret, CredentialError, FileSecrets, PendingAuthRequest, SecretProvider};
pub use download::{DownloadError, DownloadOrchestrator, DownloadReport, ValidationRejection};
pub use progress::{format_bytes, ProgressReporter, TransferSummary};
pub use router::{Accepted, AuthorizationRouter, Rejection};
pub use shutdown::Shutdown;
pub use transport::{Transport, TransportError};

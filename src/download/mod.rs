// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download Orchestrator
//!
//! Takes documents the router accepted and brings them to disk:
//!
//! - Type and size policy checked before anything is fetched
//! - Collision-safe destination names (`a.txt`, `a_1.txt`, ...)
//! - One status message per document, edited in place with progress
//! - Network and disk failures reported to the chat, never fatal
//! - Shutdown abandons the stream and keeps the partial file
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tgdrop::download::DownloadOrchestrator;
//! use tgdrop::shutdown::Shutdown;
//!
//! # async fn run(config: tgdrop::config::Config, accepted: tgdrop::router::Accepted) {
//! let transport = Arc::new(tgdrop::transport::memory::RecordingTransport::new());
//! let orchestrator = DownloadOrchestrator::new(&config, transport);
//! match orchestrator.handle(accepted, &Shutdown::never()).await {
//!     Ok(report) => println!("saved {}", report.path.display()),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # }
//! ```

pub mod messages;
mod orchestrator;
mod session;
mod status;
mod types;

pub use orchestrator::DownloadOrchestrator;
pub use session::DownloadSession;
pub use status::StatusTarget;
pub use types::{DownloadError, DownloadReport, ValidationRejection};

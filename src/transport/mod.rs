// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Messaging transport seam.
//!
//! The wire protocol (connection, encryption, serialization, flood-wait
//! backoff) lives behind [`Transport`]. The rest of the crate only needs to
//! authenticate, receive updates, send and edit text, and stream a
//! document's bytes.
//!
//! # Implementations
//!
//! - [`memory::RecordingTransport`]: scripted and in-memory, records every
//!   outbound call. Used by the test suite and for dry runs.
//! - `mtproto::MtprotoTransport` (feature `mtproto`): user-account client
//!   backed by grammers.

pub mod memory;
#[cfg(feature = "mtproto")]
pub mod mtproto;
pub mod types;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;

use crate::credentials::{CredentialError, SecretProvider};

pub use types::{
    Account, DocumentLocator, InboundDocument, InboundMedia, InboundUpdate, IncomingMessage,
    MessageId, Peer, PeerEntity, ReplyTarget,
};

/// Chunks of a document as they arrive.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Errors reported by a transport.
#[derive(Debug)]
pub enum TransportError {
    /// Could not reach or set up the connection.
    Connect(String),
    /// The login handshake was rejected.
    Auth(String),
    /// A code or password could not be obtained from the operator.
    Credential(CredentialError),
    /// A remote call failed.
    Rpc(String),
    /// Local I/O (session file and the like).
    Io(std::io::Error),
    /// The locator was not produced by this transport.
    UnsupportedLocator,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "connection failed: {}", msg),
            Self::Auth(msg) => write!(f, "authentication failed: {}", msg),
            Self::Credential(e) => write!(f, "{}", e),
            Self::Rpc(msg) => write!(f, "request failed: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::UnsupportedLocator => write!(f, "document locator not recognized by this transport"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Credential(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CredentialError> for TransportError {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

/// Operations the agent needs from the messaging platform.
///
/// Every call may take arbitrarily long (flood waits are absorbed inside
/// the implementation); callers never hold shared state across an await.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Log in if the persisted session is missing or invalid. Secrets are
    /// pulled from `secrets` only when the handshake actually needs them:
    /// the login code first, the password only if the account has a second
    /// factor.
    async fn authenticate(
        &self,
        phone: &str,
        secrets: &dyn SecretProvider,
    ) -> Result<Account, TransportError>;

    /// Push updates onto `intake` until the connection ends. Returns
    /// `Ok(())` when the receiving side hangs up.
    async fn pump_updates(&self, intake: mpsc::Sender<InboundUpdate>) -> Result<(), TransportError>;

    /// Send a text message and return its id.
    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<MessageId, TransportError>;

    /// Replace the text of a previously sent message.
    async fn edit_text(
        &self,
        target: &ReplyTarget,
        message: MessageId,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Start streaming the bytes behind `locator`.
    async fn download(&self, locator: &DocumentLocator) -> Result<ByteStream, TransportError>;

    /// Access hash of `user_id` from the account's contact list, if listed.
    async fn contact_access_hash(&self, user_id: i64) -> Result<Option<i64>, TransportError>;
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Authorization Router - decides which inbound updates trigger a download.
//!
//! The routing strategy is picked once from [`Config`] and never changes:
//!
//! - **Direct**: one-to-one messages whose peer is the allowed user.
//! - **Container**: posts inside the configured channel/group whose embedded
//!   sender is the allowed user. Replies go to the container.
//!
//! Both strategies produce the same [`Accepted`] shape, so everything
//! downstream is mode-agnostic. Rejections are ordinary outcomes, not
//! errors.

use std::fmt;

use crate::config::{Config, RoutingMode};
use crate::transport::{InboundDocument, InboundMedia, InboundUpdate, IncomingMessage, Peer, ReplyTarget};

// ============================================================================
// DECISIONS
// ============================================================================

/// An update that passed every check and carries a document.
#[derive(Debug, Clone)]
pub struct Accepted {
    /// Where status and outcome messages go.
    pub target: ReplyTarget,
    /// The (allowed) sender identity.
    pub sender: i64,
    pub document: InboundDocument,
}

/// Why an update was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not a new-message update at all.
    Unshaped,
    /// Sent by the logged-in account itself.
    Outgoing,
    /// Container mode: posted somewhere other than the configured container.
    ForeignContainer { chat: Peer },
    /// Container mode: a one-to-one message.
    NotContainerMessage,
    /// Direct mode: a group or channel post.
    NotDirectMessage,
    /// Sender is not the allowed identity (`None` for anonymous posts).
    UnauthorizedSender { sender: Option<i64> },
    /// Authorized, but nothing to download.
    NoDocument,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unshaped => write!(f, "not a new message"),
            Self::Outgoing => write!(f, "outgoing message"),
            Self::ForeignContainer { chat } => write!(f, "message from unmonitored {}", chat),
            Self::NotContainerMessage => write!(f, "private message while monitoring a channel"),
            Self::NotDirectMessage => write!(f, "channel/group post while monitoring private messages"),
            Self::UnauthorizedSender { sender: Some(id) } => write!(f, "unauthorized user ID {}", id),
            Self::UnauthorizedSender { sender: None } => write!(f, "anonymous sender"),
            Self::NoDocument => write!(f, "no document attached"),
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Classifies inbound updates against a single allowed identity.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRouter {
    mode: RoutingMode,
    allowed_user: i64,
}

/// Strip the `-100` marker clients put in front of channel ids, and the
/// `-` in front of basic group ids.
pub(crate) fn bare_container_id(id: i64) -> i64 {
    if id >= 0 {
        return id;
    }
    let digits = id.unsigned_abs().to_string();
    match digits.strip_prefix("100") {
        Some(rest) if !rest.is_empty() => rest.parse().unwrap_or(id),
        _ => -id,
    }
}

impl AuthorizationRouter {
    pub fn new(mode: RoutingMode, allowed_user: i64) -> Self {
        Self { mode, allowed_user }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.routing_mode(), config.allowed_user)
    }

    /// Route one update. Unauthorized senders are logged here; the caller
    /// decides how loudly to log the other rejections.
    pub fn route(&self, update: InboundUpdate) -> Result<Accepted, Rejection> {
        let message = match update {
            InboundUpdate::NewMessage(message) => message,
            InboundUpdate::Unsupported(_) => return Err(Rejection::Unshaped),
        };
        if message.outgoing {
            return Err(Rejection::Outgoing);
        }

        let (target, sender) = match self.mode {
            RoutingMode::Container { container_id } => self.container_origin(&message, container_id)?,
            RoutingMode::Direct => self.direct_origin(&message)?,
        };

        if sender != Some(self.allowed_user) {
            match sender {
                Some(id) => tracing::info!("Ignoring message from unauthorized user ID: {}", id),
                None => tracing::info!("Ignoring message without a sender in {}", message.chat),
            }
            return Err(Rejection::UnauthorizedSender { sender });
        }

        let document = match message.media {
            Some(InboundMedia::Document(document)) => document,
            Some(InboundMedia::Other(kind)) => {
                tracing::debug!("Message {} carries {}, not a document", message.id.0, kind);
                return Err(Rejection::NoDocument);
            }
            None => return Err(Rejection::NoDocument),
        };

        Ok(Accepted {
            target,
            sender: self.allowed_user,
            document,
        })
    }

    fn container_origin(
        &self,
        message: &IncomingMessage,
        container_id: i64,
    ) -> Result<(ReplyTarget, Option<i64>), Rejection> {
        if !message.chat.is_container() {
            return Err(Rejection::NotContainerMessage);
        }
        let chat_id = message.chat.id();
        if chat_id != container_id && chat_id != bare_container_id(container_id) {
            return Err(Rejection::ForeignContainer { chat: message.chat });
        }

        let access_hash = message.access_hash_of(&message.chat).unwrap_or(0);
        let sender = match message.sender {
            Some(Peer::User(id)) => Some(id),
            _ => None,
        };
        Ok((ReplyTarget::new(message.chat, access_hash), sender))
    }

    fn direct_origin(&self, message: &IncomingMessage) -> Result<(ReplyTarget, Option<i64>), Rejection> {
        let Peer::User(peer_id) = message.chat else {
            return Err(Rejection::NotDirectMessage);
        };
        let access_hash = message.access_hash_of(&message.chat).unwrap_or_else(|| {
            tracing::debug!("No access hash for user {}, replying with 0", peer_id);
            0
        });
        Ok((ReplyTarget::new(message.chat, access_hash), Some(peer_id)))
    }
}

// ============================================================================
// TESTS
// ============================================================================

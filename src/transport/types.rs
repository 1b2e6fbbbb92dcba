// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transport-neutral shapes for updates, documents and reply targets.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An addressable conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    /// One-to-one conversation with a user.
    User(i64),
    /// Basic group.
    Group(i64),
    /// Channel or supergroup.
    Channel(i64),
}

impl Peer {
    pub fn id(&self) -> i64 {
        match self {
            Self::User(id) | Self::Group(id) | Self::Channel(id) => *id,
        }
    }

    /// True for groups and channels.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Group(_) | Self::Channel(_))
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {}", id),
            Self::Group(id) => write!(f, "group {}", id),
            Self::Channel(id) => write!(f, "channel {}", id),
        }
    }
}

/// Identity of a message inside its conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// Where replies and status edits go.
///
/// `access_hash` is the secondary addressing credential the platform
/// requires next to the numeric id. Zero is a degraded value the
/// platform may or may not accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub peer: Peer,
    pub access_hash: i64,
}

impl ReplyTarget {
    pub fn new(peer: Peer, access_hash: i64) -> Self {
        Self { peer, access_hash }
    }
}

/// One entry of the entity set that accompanies an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerEntity {
    pub peer: Peer,
    pub access_hash: Option<i64>,
}

/// Opaque, transport-owned handle used to stream a document's bytes.
///
/// The orchestrator never looks inside; it hands the locator back to the
/// transport that produced it.
#[derive(Clone)]
pub struct DocumentLocator(Arc<dyn Any + Send + Sync>);

impl DocumentLocator {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for DocumentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocumentLocator(..)")
    }
}

/// A document attached to an inbound message.
#[derive(Debug, Clone)]
pub struct InboundDocument {
    pub id: i64,
    /// Filename as declared by the sender, if any.
    pub file_name: Option<String>,
    /// Declared size in bytes; zero when unknown.
    pub size: u64,
    pub locator: DocumentLocator,
}

impl InboundDocument {
    /// Declared filename, or `document_<id>` when the sender gave none.
    pub fn display_name(&self) -> String {
        match self.file_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("document_{}", self.id),
        }
    }
}

/// Media carried by a message.
#[derive(Debug, Clone)]
pub enum InboundMedia {
    Document(InboundDocument),
    /// Photos, stickers, polls and whatever else; only the kind is kept.
    Other(String),
}

/// A new message as delivered by the transport.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: MessageId,
    /// The conversation the message was posted in.
    pub chat: Peer,
    /// Who posted it. For private chats this equals `chat`; for channels
    /// it is absent when the post is anonymous.
    pub sender: Option<Peer>,
    /// Sent by the logged-in account itself.
    pub outgoing: bool,
    pub entities: Vec<PeerEntity>,
    pub media: Option<InboundMedia>,
}

impl IncomingMessage {
    /// Secondary addressing credential for `peer` from the entity set.
    pub fn access_hash_of(&self, peer: &Peer) -> Option<i64> {
        self.entities
            .iter()
            .find(|e| e.peer == *peer)
            .and_then(|e| e.access_hash)
    }
}

/// Everything the transport pushes onto the intake queue.
#[derive(Debug, Clone)]
pub enum InboundUpdate {
    NewMessage(IncomingMessage),
    /// Updates this agent does not act on (edits, service messages, ...).
    Unsupported(String),
}

/// The logged-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback() {
        let mut doc = InboundDocument {
            id: 99,
            file_name: None,
            size: 0,
            locator: DocumentLocator::new(()),
        };
        assert_eq!(doc.display_name(), "document_99");

        doc.file_name = Some("  ".into());
        assert_eq!(doc.display_name(), "document_99");

        doc.file_name = Some("report.pdf".into());
        assert_eq!(doc.display_name(), "report.pdf");
    }

    #[test]
    fn test_locator_downcast() {
        let locator = DocumentLocator::new(String::from("opaque"));
        assert_eq!(locator.downcast_ref::<String>().map(String::as_str), Some("opaque"));
        assert!(locator.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn test_access_hash_lookup() {
        let msg = IncomingMessage {
            id: MessageId(1),
            chat: Peer::User(5),
            sender: Some(Peer::User(5)),
            outgoing: false,
            entities: vec![
                PeerEntity { peer: Peer::User(4), access_hash: Some(1) },
                PeerEntity { peer: Peer::User(5), access_hash: Some(77) },
            ],
            media: None,
        };
        assert_eq!(msg.access_hash_of(&Peer::User(5)), Some(77));
        assert_eq!(msg.access_hash_of(&Peer::Channel(5)), None);
    }
}

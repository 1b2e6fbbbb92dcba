// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The chat message a download's progress and outcome are written into.

use std::sync::Arc;

use crate::transport::{MessageId, ReplyTarget, Transport};

/// Destination for status text: a conversation plus, once the initial
/// announcement went through, the message being edited in place.
///
/// When the announcement failed there is no message to edit: progress
/// updates become no-ops and only terminal outcomes are sent as fresh
/// messages.
pub struct StatusTarget {
    transport: Arc<dyn Transport>,
    target: ReplyTarget,
    message: Option<MessageId>,
}

impl StatusTarget {
    /// Send the first status text. A failed send is logged and tolerated.
    pub async fn announce(transport: Arc<dyn Transport>, target: ReplyTarget, text: &str) -> Self {
        let message = match transport.send_text(&target, text).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Failed to send status message to {}: {}", target.peer, e);
                None
            }
        };
        Self {
            transport,
            target,
            message,
        }
    }

    pub fn message_id(&self) -> Option<MessageId> {
        self.message
    }

    /// Edit the status message. No-op without a message; failures are
    /// logged, never returned.
    pub async fn update(&self, text: &str) {
        let Some(message) = self.message else {
            return;
        };
        if let Err(e) = self.transport.edit_text(&self.target, message, text).await {
            tracing::warn!("Failed to update status message: {}", e);
        }
    }

    /// Write a terminal outcome: edited in place when possible, otherwise
    /// sent as a new message.
    pub async fn conclude(&self, text: &str) {
        match self.message {
            Some(_) => self.update(text).await,
            None => {
                if let Err(e) = self.transport.send_text(&self.target, text).await {
                    tracing::warn!("Failed to send outcome message: {}", e);
                }
            }
        }
    }
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Best-effort start-up greeting.

use chrono::Local;

use crate::config::{Config, RoutingMode};
use crate::download::messages;
use crate::error::OperatorHint;
use crate::router::bare_container_id;
use crate::transport::{MessageId, Peer, ReplyTarget, Transport};

/// Work out where the greeting goes.
///
/// Container mode addresses the container directly. Direct mode needs the
/// allowed user's access hash, which only the contact list provides.
pub(super) async fn greeting_target(
    transport: &dyn Transport,
    config: &Config,
) -> Result<ReplyTarget, OperatorHint> {
    match config.routing_mode() {
        RoutingMode::Container { container_id } => Ok(ReplyTarget::new(
            Peer::Channel(bare_container_id(container_id)),
            0,
        )),
        RoutingMode::Direct => {
            let user = config.allowed_user;
            match transport.contact_access_hash(user).await {
                Ok(Some(access_hash)) => Ok(ReplyTarget::new(Peer::User(user), access_hash)),
                Ok(None) => Err(OperatorHint::new(format!(
                    "Greeting skipped: user {} is not in the account's contacts",
                    user
                ))
                .fix("Use channel mode (--channel) for a reliable greeting")
                .fix(format!("Add user {} to the account's contacts", user))
                .fix(format!("Send any message from user {} to the account first", user))),
                Err(e) => Err(OperatorHint::new("Greeting skipped: could not fetch contacts")
                    .cause(e.to_string())
                    .fix("Check network connectivity")
                    .fix("Documents are still accepted; the greeting is optional")),
            }
        }
    }
}

/// Send the greeting. Failures come back as hints for the log.
pub(super) async fn send_greeting(
    transport: &dyn Transport,
    config: &Config,
) -> Result<MessageId, OperatorHint> {
    let target = greeting_target(transport, config).await?;
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let text = messages::greeting(&timestamp, config.max_file_size, &config.allowed_extensions);

    transport.send_text(&target, &text).await.map_err(|e| {
        OperatorHint::new(format!("Failed to send greeting to {}", target.peer))
            .cause(e.to_string())
            .cause("The access hash may be stale or missing")
            .fix("Send any message to the account from the target chat, then restart")
    })
}

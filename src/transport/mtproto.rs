// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! User-account transport backed by grammers.
//!
//! The session is persisted to a file after every successful login; an
//! authorized session skips the code handshake entirely. Flood waits are
//! absorbed by grammers' own sleep threshold.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use grammers_client::types::{Chat, Downloadable, Media, Message};
use grammers_client::{Client, Config as ClientConfig, InitParams, SignInError, Update};
use grammers_session::{PackedChat, PackedType, Session};
use grammers_tl_types as tl;
use tokio::sync::mpsc;

use super::{
    Account, ByteStream, DocumentLocator, InboundDocument, InboundMedia, InboundUpdate,
    IncomingMessage, MessageId, Peer, PeerEntity, ReplyTarget, Transport, TransportError,
};
use crate::config::ApiCredentials;
use crate::credentials::SecretProvider;

pub struct MtprotoTransport {
    client: Client,
    session_file: PathBuf,
}

fn rpc<E: std::fmt::Display>(e: E) -> TransportError {
    TransportError::Rpc(e.to_string())
}

fn peer_of(chat: &Chat) -> Peer {
    match chat {
        Chat::User(user) => Peer::User(user.id()),
        Chat::Group(group) => Peer::Group(group.id()),
        Chat::Channel(channel) => Peer::Channel(channel.id()),
    }
}

fn entity_of(chat: &Chat) -> PeerEntity {
    PeerEntity {
        peer: peer_of(chat),
        access_hash: chat.pack().access_hash,
    }
}

fn packed(target: &ReplyTarget) -> PackedChat {
    let (ty, access_hash) = match target.peer {
        Peer::User(_) => (PackedType::User, Some(target.access_hash)),
        Peer::Group(_) => (PackedType::Chat, None),
        Peer::Channel(_) => (PackedType::Megagroup, Some(target.access_hash)),
    };
    PackedChat {
        ty,
        id: target.peer.id(),
        access_hash,
    }
}

fn convert(message: &Message) -> IncomingMessage {
    let chat = message.chat();
    let sender = message.sender();

    let mut entities = vec![entity_of(&chat)];
    if let Some(sender) = &sender {
        entities.push(entity_of(sender));
    }

    let media = message.media().map(|media| match media {
        Media::Document(document) => {
            let name = document.name().to_string();
            InboundMedia::Document(InboundDocument {
                id: document.id(),
                file_name: (!name.is_empty()).then_some(name),
                size: u64::try_from(document.size()).unwrap_or(0),
                locator: DocumentLocator::new(Media::Document(document)),
            })
        }
        Media::Photo(_) => InboundMedia::Other("photo".to_string()),
        _ => InboundMedia::Other("other".to_string()),
    });

    IncomingMessage {
        id: MessageId(message.id()),
        chat: peer_of(&chat),
        sender: sender.as_ref().map(peer_of),
        outgoing: message.outgoing(),
        entities,
        media,
    }
}

impl MtprotoTransport {
    /// Connect using the session stored at `session_file` (created if absent).
    pub async fn connect(api: &ApiCredentials, session_file: &Path) -> Result<Self, TransportError> {
        let session = Session::load_file_or_create(session_file).map_err(TransportError::Io)?;

        let client = Client::connect(ClientConfig {
            session,
            api_id: api.api_id,
            api_hash: api.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!("Connected to Telegram");
        Ok(Self {
            client,
            session_file: session_file.to_path_buf(),
        })
    }

    fn save_session(&self) -> Result<(), TransportError> {
        self.client
            .session()
            .save_to_file(&self.session_file)
            .map_err(TransportError::Io)
    }

    async fn account(&self) -> Result<Account, TransportError> {
        let me = self.client.get_me().await.map_err(rpc)?;
        Ok(Account {
            id: me.id(),
            display_name: me.full_name(),
        })
    }
}

#[async_trait]
impl Transport for MtprotoTransport {
    async fn authenticate(
        &self,
        phone: &str,
        secrets: &dyn SecretProvider,
    ) -> Result<Account, TransportError> {
        if self.client.is_authorized().await.map_err(rpc)? {
            tracing::info!("Session file is valid, skipping login");
            return self.account().await;
        }

        let token = self
            .client
            .request_login_code(phone)
            .await
            .map_err(|e| TransportError::Auth(e.to_string()))?;
        let code = secrets.login_code().await?;

        match self.client.sign_in(&token, &code).await {
            Ok(_) => {}
            Err(SignInError::PasswordRequired(password_token)) => {
                if let Some(hint) = password_token.hint() {
                    tracing::info!("2FA password hint: {}", hint);
                }
                let password = secrets.password().await?;
                self.client
                    .check_password(password_token, password.trim())
                    .await
                    .map_err(|e| TransportError::Auth(e.to_string()))?;
            }
            Err(e) => return Err(TransportError::Auth(e.to_string())),
        }

        self.save_session()?;
        tracing::info!("Session saved to {}", self.session_file.display());
        self.account().await
    }

    async fn pump_updates(&self, intake: mpsc::Sender<InboundUpdate>) -> Result<(), TransportError> {
        loop {
            let update = tokio::select! {
                _ = intake.closed() => return Ok(()),
                update = self.client.next_update() => update.map_err(rpc)?,
            };

            let inbound = match update {
                Update::NewMessage(message) => InboundUpdate::NewMessage(convert(&message)),
                Update::MessageEdited(_) => InboundUpdate::Unsupported("message edited".to_string()),
                _ => continue,
            };

            if intake.send(inbound).await.is_err() {
                return Ok(());
            }
        }
    }

    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<MessageId, TransportError> {
        let sent = self
            .client
            .send_message(packed(target), text)
            .await
            .map_err(rpc)?;
        Ok(MessageId(sent.id()))
    }

    async fn edit_text(
        &self,
        target: &ReplyTarget,
        message: MessageId,
        text: &str,
    ) -> Result<(), TransportError> {
        self.client
            .edit_message(packed(target), message.0, text)
            .await
            .map_err(rpc)
    }

    async fn download(&self, locator: &DocumentLocator) -> Result<ByteStream, TransportError> {
        let media = locator
            .downcast_ref::<Media>()
            .ok_or(TransportError::UnsupportedLocator)?;
        let chunks = self.client.iter_download(&Downloadable::Media(media.clone()));

        let stream = stream::try_unfold(chunks, |mut chunks| async move {
            match chunks.next().await {
                Ok(Some(bytes)) => Ok(Some((bytes, chunks))),
                Ok(None) => Ok(None),
                Err(e) => Err(rpc(e)),
            }
        });
        Ok(stream.boxed())
    }

    async fn contact_access_hash(&self, user_id: i64) -> Result<Option<i64>, TransportError> {
        let contacts = self
            .client
            .invoke(&tl::functions::contacts::GetContacts { hash: 0 })
            .await
            .map_err(rpc)?;

        let users = match contacts {
            tl::enums::contacts::Contacts::Contacts(c) => c.users,
            tl::enums::contacts::Contacts::NotModified => return Ok(None),
        };

        Ok(users.into_iter().find_map(|user| match user {
            tl::enums::User::User(u) if u.id == user_id => Some(u.access_hash.unwrap_or(0)),
            _ => None,
        }))
    }
}

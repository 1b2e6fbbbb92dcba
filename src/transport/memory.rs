// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory transport that records every outbound call.
//!
//! Updates are scripted up front, documents are byte buffers split into
//! chunks, and the login handshake can be told to demand a code and a
//! password. Every send, edit, download and contact lookup is appended to
//! a call log that tests inspect afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use super::{
    Account, ByteStream, DocumentLocator, InboundUpdate, MessageId, ReplyTarget, Transport,
    TransportError,
};
use crate::credentials::SecretProvider;
use crate::sync::resilient_lock;

/// A document served by [`RecordingTransport::download`].
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    chunks: Vec<Vec<u8>>,
    fail_after: Option<usize>,
}

impl MemoryDocument {
    /// Split `bytes` into chunks of at most `chunk_size` bytes.
    pub fn from_bytes(bytes: &[u8], chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunks: bytes.chunks(chunk_size).map(<[u8]>::to_vec).collect(),
            fail_after: None,
        }
    }

    /// Yield `chunks` chunks and then a network error.
    pub fn failing_after(mut self, chunks: usize) -> Self {
        self.fail_after = Some(chunks);
        self
    }

    pub fn into_locator(self) -> DocumentLocator {
        DocumentLocator::new(self)
    }
}

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    SendText { target: ReplyTarget, text: String },
    EditText { target: ReplyTarget, message: MessageId, text: String },
    Download,
    ContactLookup { user_id: i64 },
}

/// How the scripted login handshake behaves.
#[derive(Debug, Clone, Default)]
struct LoginScript {
    authorized: bool,
    password_required: bool,
    expected_code: Option<String>,
    expected_password: Option<String>,
}

/// Scripted transport and call recorder.
pub struct RecordingTransport {
    account: Account,
    calls: Mutex<Vec<RecordedCall>>,
    updates: Mutex<Vec<InboundUpdate>>,
    contacts: Mutex<HashMap<i64, i64>>,
    received_secrets: Mutex<Vec<String>>,
    login: Mutex<LoginScript>,
    next_message_id: AtomicI32,
    fail_sends: AtomicBool,
    fail_edits: AtomicBool,
    fail_contacts: AtomicBool,
    hold_open: AtomicBool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            account: Account {
                id: 1000,
                display_name: "Recorder".to_string(),
            },
            calls: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            contacts: Mutex::new(HashMap::new()),
            received_secrets: Mutex::new(Vec::new()),
            login: Mutex::new(LoginScript {
                authorized: true,
                ..LoginScript::default()
            }),
            next_message_id: AtomicI32::new(1),
            fail_sends: AtomicBool::new(false),
            fail_edits: AtomicBool::new(false),
            fail_contacts: AtomicBool::new(false),
            hold_open: AtomicBool::new(false),
        }
    }

    /// Queue updates for the next [`Transport::pump_updates`] call.
    pub fn push_update(&self, update: InboundUpdate) {
        resilient_lock(&self.updates).push(update);
    }

    pub fn add_contact(&self, user_id: i64, access_hash: i64) {
        resilient_lock(&self.contacts).insert(user_id, access_hash);
    }

    /// Require a login code (and optionally a password) on the next
    /// [`Transport::authenticate`] call.
    pub fn require_login(&self, code: impl Into<String>, password: Option<String>) {
        let mut login = resilient_lock(&self.login);
        login.authorized = false;
        login.expected_code = Some(code.into());
        login.password_required = password.is_some();
        login.expected_password = password;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_contacts(&self, fail: bool) {
        self.fail_contacts.store(fail, Ordering::SeqCst);
    }

    /// Keep `pump_updates` running after the script is drained, until the
    /// receiver hangs up.
    pub fn hold_open(&self, hold: bool) {
        self.hold_open.store(hold, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        resilient_lock(&self.calls).clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCall::SendText { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edited_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCall::EditText { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn download_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RecordedCall::Download))
            .count()
    }

    /// Secrets handed over during login, in order.
    pub fn received_secrets(&self) -> Vec<String> {
        resilient_lock(&self.received_secrets).clone()
    }

    fn record(&self, call: RecordedCall) {
        resilient_lock(&self.calls).push(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn authenticate(
        &self,
        _phone: &str,
        secrets: &dyn SecretProvider,
    ) -> Result<Account, TransportError> {
        let script = resilient_lock(&self.login).clone();
        if script.authorized {
            return Ok(self.account.clone());
        }

        let code = secrets.login_code().await?;
        resilient_lock(&self.received_secrets).push(code.clone());
        if script.expected_code.as_deref().is_some_and(|expected| expected != code) {
            return Err(TransportError::Auth("PHONE_CODE_INVALID".to_string()));
        }

        if script.password_required {
            let password = secrets.password().await?;
            resilient_lock(&self.received_secrets).push(password.clone());
            if script.expected_password.as_deref().is_some_and(|expected| expected != password) {
                return Err(TransportError::Auth("PASSWORD_HASH_INVALID".to_string()));
            }
        }

        resilient_lock(&self.login).authorized = true;
        Ok(self.account.clone())
    }

    async fn pump_updates(&self, intake: mpsc::Sender<InboundUpdate>) -> Result<(), TransportError> {
        let queued: Vec<InboundUpdate> = std::mem::take(&mut *resilient_lock(&self.updates));
        for update in queued {
            if intake.send(update).await.is_err() {
                return Ok(());
            }
        }

        if self.hold_open.load(Ordering::SeqCst) {
            intake.closed().await;
        }
        Ok(())
    }

    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<MessageId, TransportError> {
        self.record(RecordedCall::SendText {
            target: *target,
            text: text.to_string(),
        });
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Rpc("CHAT_WRITE_FORBIDDEN".to_string()));
        }
        Ok(MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_text(
        &self,
        target: &ReplyTarget,
        message: MessageId,
        text: &str,
    ) -> Result<(), TransportError> {
        self.record(RecordedCall::EditText {
            target: *target,
            message,
            text: text.to_string(),
        });
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(TransportError::Rpc("MESSAGE_ID_INVALID".to_string()));
        }
        Ok(())
    }

    async fn download(&self, locator: &DocumentLocator) -> Result<ByteStream, TransportError> {
        self.record(RecordedCall::Download);
        let document = locator
            .downcast_ref::<MemoryDocument>()
            .ok_or(TransportError::UnsupportedLocator)?
            .clone();

        let mut items: Vec<Result<Vec<u8>, TransportError>> = Vec::new();
        match document.fail_after {
            Some(n) => {
                items.extend(document.chunks.into_iter().take(n).map(Ok));
                items.push(Err(TransportError::Rpc("connection reset".to_string())));
            }
            None => items.extend(document.chunks.into_iter().map(Ok)),
        }

        Ok(stream::iter(items).boxed())
    }

    async fn contact_access_hash(&self, user_id: i64) -> Result<Option<i64>, TransportError> {
        self.record(RecordedCall::ContactLookup { user_id });
        if self.fail_contacts.load(Ordering::SeqCst) {
            return Err(TransportError::Rpc("contacts unavailable".to_string()));
        }
        Ok(resilient_lock(&self.contacts).get(&user_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Peer;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn test_download_yields_chunks() {
        let transport = RecordingTransport::new();
        let locator = MemoryDocument::from_bytes(&[7u8; 10], 4).into_locator();
        let chunks: Vec<Vec<u8>> = transport
            .download(&locator)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(transport.download_count(), 1);
    }

    #[tokio::test]
    async fn test_download_failure_after_chunks() {
        let transport = RecordingTransport::new();
        let locator = MemoryDocument::from_bytes(&[1u8; 8], 4)
            .failing_after(1)
            .into_locator();
        let mut stream = transport.download(&locator).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().len(), 4);
        assert!(stream.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_foreign_locator_rejected() {
        let transport = RecordingTransport::new();
        let result = transport.download(&DocumentLocator::new(5u8)).await;
        assert!(matches!(result, Err(TransportError::UnsupportedLocator)));
    }

    #[tokio::test]
    async fn test_send_assigns_increasing_ids() {
        let transport = RecordingTransport::new();
        let target = ReplyTarget::new(Peer::User(1), 0);
        let a = transport.send_text(&target, "a").await.unwrap();
        let b = transport.send_text(&target, "b").await.unwrap();
        assert!(b.0 > a.0);
        assert_eq!(transport.sent_texts(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_pump_drains_script() {
        let transport = RecordingTransport::new();
        transport.push_update(InboundUpdate::Unsupported("edit".into()));
        transport.push_update(InboundUpdate::Unsupported("service".into()));

        let (tx, mut rx) = mpsc::channel(8);
        transport.pump_updates(tx).await.unwrap();

        let mut seen = 0;
        while rx.recv().await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, 2);
    }
}

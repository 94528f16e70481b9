use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::api::realtime::{ChangeEvent, ChangeKind};
use crate::api::storage::{self, CHAT_ATTACHMENTS};
use crate::api::tables::{self, MESSAGES, USER_PROFILES};
use crate::api::{Query, StorageApi, TableApi};
use crate::error::{PortalError, Result};
use crate::models::{ChatMessage, FileDescriptor, NewChatMessage, Profile};

/// How much history the chat page opens with.
pub const HISTORY_LIMIT: usize = 100;

/// Messages keyed by id, in arrival order. An id is held at most once.
#[derive(Debug, Default, Clone)]
pub struct ChatLog {
    by_id: HashMap<Uuid, ChatMessage>,
    order: Vec<Uuid>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&ChatMessage> {
        self.by_id.get(id)
    }

    /// Appends the message unless its id is already present. Returns whether it was added.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if self.by_id.contains_key(&message.id) {
            return false;
        }
        self.order.push(message.id);
        self.by_id.insert(message.id, message);
        true
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.order.last().and_then(|id| self.by_id.get(id))
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.order.clear();
    }
}

pub struct ChatService<A> {
    api: Arc<A>,
    me: Profile,
    log: ChatLog,
    profiles: HashMap<Uuid, Profile>,
}

impl<A> ChatService<A>
where
    A: TableApi + StorageApi,
{
    pub fn new(api: Arc<A>, me: Profile) -> Self {
        Self {
            api,
            me,
            log: ChatLog::new(),
            profiles: HashMap::new(),
        }
    }

    pub fn log(&self) -> &ChatLog {
        &self.log
    }

    /// Loads the latest messages, oldest first.
    pub async fn load_recent(&mut self) -> Result<&ChatLog> {
        let query = Query::new()
            .order("created_at", false)
            .limit(HISTORY_LIMIT);
        let mut messages: Vec<ChatMessage> = tables::fetch(self.api.as_ref(), MESSAGES, &query).await?;
        messages.reverse();

        self.log.clear();
        for message in messages {
            let message = self.enrich(message).await;
            self.log.insert(message);
        }

        debug!("loaded {} chat messages", self.log.len());
        Ok(&self.log)
    }

    /// Handles one change-feed notification. Returns the message if it was appended.
    pub async fn on_change(&mut self, event: &ChangeEvent) -> Result<Option<&ChatMessage>> {
        if event.table != MESSAGES || event.kind != ChangeKind::Insert {
            return Ok(None);
        }

        let Some(id) = event.record_id().and_then(|id| Uuid::parse_str(id).ok()) else {
            warn!("chat notification without a usable id: {}", event.record);
            return Ok(None);
        };

        if self.log.contains(&id) {
            debug!("message {id} already shown");
            return Ok(None);
        }

        // The notification payload is partial, so read the full row back.
        let row: Option<ChatMessage> =
            tables::fetch_one(self.api.as_ref(), MESSAGES, &Query::new().eq("id", id)).await?;
        let Some(message) = row else {
            debug!("message {id} vanished before it could be read");
            return Ok(None);
        };

        if message.sender_id == self.me.id {
            return Ok(None);
        }

        let message = self.enrich(message).await;
        if self.log.insert(message) {
            Ok(self.log.get(&id))
        } else {
            Ok(None)
        }
    }

    pub async fn send(&mut self, text: &str) -> Result<ChatMessage> {
        let content = text.trim();
        if content.is_empty() {
            return Err(PortalError::validation("message is empty"));
        }

        let row = NewChatMessage::from_sender(&self.me, content);
        self.insert_own(row).await
    }

    /// Uploads every file first, then posts one message referencing all of them.
    pub async fn send_attachments(
        &mut self,
        paths: &[impl AsRef<Path>],
        caption: Option<&str>,
    ) -> Result<ChatMessage> {
        if paths.is_empty() {
            return Err(PortalError::validation("no files selected"));
        }

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(self.upload_attachment(path.as_ref()).await?);
        }

        let caption = caption.map(str::trim).unwrap_or_default();
        let row = NewChatMessage::from_sender(&self.me, caption).with_files(files);
        self.insert_own(row).await
    }

    /// Hard-deletes every message. Irreversible.
    pub async fn clear_all(&mut self) -> Result<usize> {
        if !self.me.is_admin() {
            return Err(PortalError::Forbidden(
                "only administrators can clear the chat".into(),
            ));
        }

        let deleted = self
            .api
            .delete(MESSAGES, &Query::new().not_null("id"))
            .await?;
        self.log.clear();
        info!("cleared {} chat messages", deleted.len());
        Ok(deleted.len())
    }

    async fn insert_own(&mut self, row: NewChatMessage) -> Result<ChatMessage> {
        let message: ChatMessage = tables::insert_one(self.api.as_ref(), MESSAGES, &row).await?;
        let message = self.enrich(message).await;
        self.log.insert(message.clone());
        Ok(message)
    }

    async fn upload_attachment(&self, path: &Path) -> Result<FileDescriptor> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| PortalError::validation(format!("invalid file path {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;
        let size = bytes.len() as u64;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        let object_path = format!(
            "{}/{}-{}",
            self.me.id,
            Utc::now().timestamp_millis(),
            storage::sanitize_file_name(&name)
        );
        self.api
            .upload(CHAT_ATTACHMENTS, &object_path, bytes, &mime_type)
            .await?;

        Ok(FileDescriptor {
            name,
            size,
            mime_type,
            url: self.api.public_url(CHAT_ATTACHMENTS, &object_path),
        })
    }

    /// Fills display fields from the sender's profile when the row lacks them.
    async fn enrich(&mut self, mut message: ChatMessage) -> ChatMessage {
        let complete = message.sender_name.is_some() && message.sender_role.is_some();
        if complete {
            return message;
        }

        if message.sender_id == self.me.id {
            message.enrich_from(&self.me);
            return message;
        }

        if !self.profiles.contains_key(&message.sender_id) {
            let lookup: Result<Option<Profile>> = tables::fetch_one(
                self.api.as_ref(),
                USER_PROFILES,
                &Query::new().eq("id", message.sender_id),
            )
            .await;
            match lookup {
                Ok(Some(profile)) => {
                    self.profiles.insert(message.sender_id, profile);
                }
                Ok(None) => debug!("no profile for sender {}", message.sender_id),
                Err(e) => warn!("profile lookup for {} failed: {e}", message.sender_id),
            }
        }

        if let Some(profile) = self.profiles.get(&message.sender_id) {
            message.enrich_from(profile);
        }
        message
    }
}

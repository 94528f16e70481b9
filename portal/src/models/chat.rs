use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Profile, Role};

/// One uploaded file referenced from a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub url: String,
}

impl FileDescriptor {
    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::of(&self.mime_type)
    }
}

/// How an attachment is previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
}

impl AttachmentKind {
    pub fn of(mime_type: &str) -> Self {
        match mime_type.split('/').next() {
            Some("image") => AttachmentKind::Image,
            Some("video") => AttachmentKind::Video,
            Some("audio") => AttachmentKind::Audio,
            _ => AttachmentKind::File,
        }
    }
}

/// Row of `messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(default)]
    pub content: String,
    pub sender_id: Uuid,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_role: Option<Role>,
    #[serde(default)]
    pub sender_avatar: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<FileDescriptor>>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn attachments(&self) -> &[FileDescriptor] {
        self.files.as_deref().unwrap_or(&[])
    }

    pub fn sender_display(&self) -> &str {
        self.sender_name.as_deref().unwrap_or("Unknown")
    }

    /// Fills the denormalized sender fields that are missing.
    pub fn enrich_from(&mut self, profile: &Profile) {
        if self.sender_name.as_deref().is_none_or(|name| name.trim().is_empty()) {
            self.sender_name = Some(profile.display_name().to_string());
        }
        if self.sender_role.is_none() {
            self.sender_role = Some(profile.role);
        }
        if self.sender_avatar.is_none() {
            self.sender_avatar = profile.avatar_url.clone();
        }
    }
}

/// Insert payload; sender metadata is a snapshot taken at send time.
#[derive(Debug, Clone, Serialize)]
pub struct NewChatMessage {
    pub content: String,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sender_role: Role,
    pub sender_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileDescriptor>>,
}

impl NewChatMessage {
    pub fn from_sender(sender: &Profile, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender_id: sender.id,
            sender_name: sender.display_name().to_string(),
            sender_role: sender.role,
            sender_avatar: sender.avatar_url.clone(),
            files: None,
        }
    }

    pub fn with_files(mut self, files: Vec<FileDescriptor>) -> Self {
        self.files = Some(files);
        self
    }
}

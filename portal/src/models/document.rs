use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Sector;

/// Metadata row of `documents`; the bytes live in the `documents` bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub sector: Sector,
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    /// Object path inside the bucket. Older rows only carry the public URL.
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDraft {
    pub title: String,
    pub sector: Sector,
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub file_path: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

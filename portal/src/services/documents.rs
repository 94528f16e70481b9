use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use crate::api::storage::{self, DOCUMENTS as BUCKET};
use crate::api::tables::{self, DOCUMENTS};
use crate::api::{Query, StorageApi, TableApi};
use crate::error::{PortalError, Result};
use crate::models::{Document, DocumentDraft, Profile, Sector};
use crate::store::{EntityList, Mutation};

pub const MB: u64 = 1024 * 1024;

/// Upload families and their size ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFamily {
    Image,
    Text,
    Office,
    Audio,
    Video,
}

impl FileFamily {
    pub fn of(mime_type: &str) -> Option<FileFamily> {
        let family = match mime_type.trim().to_lowercase().as_str() {
            "image/jpeg" | "image/png" | "image/gif" | "image/webp" => FileFamily::Image,
            "text/plain" | "text/csv" => FileFamily::Text,
            "application/pdf"
            | "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-powerpoint"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                FileFamily::Office
            }
            "audio/mpeg" | "audio/wav" | "audio/ogg" => FileFamily::Audio,
            "video/mp4" | "video/webm" | "video/quicktime" => FileFamily::Video,
            _ => return None,
        };
        Some(family)
    }

    pub fn max_size(&self) -> u64 {
        match self {
            FileFamily::Image | FileFamily::Text => 5 * MB,
            FileFamily::Office => 10 * MB,
            FileFamily::Audio => 20 * MB,
            FileFamily::Video => 50 * MB,
        }
    }
}

/// Accepts the file only when its type is allowed and it fits that type's ceiling.
pub fn check_upload(mime_type: &str, size: u64) -> Result<FileFamily> {
    let family = FileFamily::of(mime_type)
        .ok_or_else(|| PortalError::validation(format!("file type {mime_type} is not allowed")))?;

    if size > family.max_size() {
        return Err(PortalError::validation(format!(
            "file is too large: {:.1} MB, limit for {mime_type} is {} MB",
            size as f64 / MB as f64,
            family.max_size() / MB
        )));
    }

    Ok(family)
}

pub struct UploadRequest {
    pub title: String,
    pub sector: Sector,
    pub path: PathBuf,
}

pub struct DocumentService<A> {
    api: Arc<A>,
    documents: EntityList<Document>,
}

impl<A> DocumentService<A>
where
    A: TableApi + StorageApi,
{
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            documents: EntityList::default()
                .ordered_by(|a: &Document, b: &Document| b.uploaded_at.cmp(&a.uploaded_at)),
        }
    }

    pub fn documents(&self) -> &[Document] {
        self.documents.items()
    }

    pub fn find(&self, id: &Uuid) -> Option<&Document> {
        self.documents.get(id)
    }

    pub async fn refresh(&mut self, sector: Option<&Sector>) -> Result<&[Document]> {
        let mut query = Query::new().order("uploaded_at", false);
        if let Some(sector) = sector {
            query = query.eq("sector", sector);
        }
        let documents = tables::fetch(self.api.as_ref(), DOCUMENTS, &query).await?;
        self.documents.replace_all(documents);
        Ok(self.documents.items())
    }

    /// Gate, then blob, then metadata row.
    pub async fn upload(&mut self, request: UploadRequest, uploader: &Profile) -> Result<Document> {
        if request.title.trim().is_empty() {
            return Err(PortalError::validation("document title is required"));
        }

        let file_name = request
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| PortalError::validation("a file is required"))?;
        let mime_type = mime_guess::from_path(&request.path)
            .first_or_octet_stream()
            .to_string();
        let size = tokio::fs::metadata(&request.path).await?.len();
        check_upload(&mime_type, size)?;

        let bytes = tokio::fs::read(&request.path).await?;
        let object_path = format!(
            "{}/{}_{}",
            request.sector.as_str(),
            Utc::now().timestamp_millis(),
            storage::sanitize_file_name(&file_name)
        );
        self.api
            .upload(BUCKET, &object_path, bytes, &mime_type)
            .await?;

        let draft = DocumentDraft {
            title: request.title.trim().to_string(),
            sector: request.sector,
            file_url: self.api.public_url(BUCKET, &object_path),
            file_name,
            file_size: size,
            file_type: mime_type,
            file_path: object_path.clone(),
            uploaded_by: uploader.id,
            uploaded_at: Utc::now(),
        };

        let document: Document = match tables::insert_one(self.api.as_ref(), DOCUMENTS, &draft).await {
            Ok(document) => document,
            Err(e) => {
                warn!("metadata insert failed, object {object_path} is left without a row");
                return Err(e);
            }
        };

        self.documents.apply(Mutation::Insert(document.clone()));
        info!("uploaded document {} ({} bytes)", document.title, document.file_size);
        Ok(document)
    }

    pub async fn download(&self, document: &Document, destination: &Path) -> Result<PathBuf> {
        let object_path = object_path(document)?;
        let bytes = self.api.download(BUCKET, &object_path).await?;

        let target = if destination.is_dir() {
            destination.join(&document.file_name)
        } else {
            destination.to_path_buf()
        };
        tokio::fs::write(&target, bytes).await?;
        Ok(target)
    }

    /// Removes the blob first; the row is only deleted once the blob is gone.
    pub async fn delete(&mut self, document: &Document) -> Result<()> {
        let object_path = object_path(document)?;
        self.api.remove(BUCKET, &[object_path]).await?;

        self.api
            .delete(DOCUMENTS, &Query::new().eq("id", document.id))
            .await?;

        self.documents.apply(Mutation::Remove(document.id));
        info!("deleted document {}", document.id);
        Ok(())
    }
}

fn object_path(document: &Document) -> Result<String> {
    document
        .file_path
        .clone()
        .or_else(|| storage::object_path_from_url(&document.file_url, BUCKET))
        .ok_or_else(|| {
            PortalError::validation(format!(
                "cannot locate the stored file of document {}",
                document.id
            ))
        })
}

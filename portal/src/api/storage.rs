use async_trait::async_trait;
use reqwest::{Method, header};
use serde_json::json;

use super::{BackendClient, check};
use crate::error::Result;

pub const CHAT_ATTACHMENTS: &str = "chat-attachments";
pub const DOCUMENTS: &str = "documents";
pub const AVATARS: &str = "avatars";

#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<()>;
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

pub fn public_object_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!("{base_url}/storage/v1/object/public/{bucket}/{path}")
}

/// Recovers the object path from a public URL produced by [`public_object_url`].
pub fn object_path_from_url(url: &str, bucket: &str) -> Option<String> {
    let marker = format!("/storage/v1/object/public/{bucket}/");
    url.split_once(&marker)
        .map(|(_, path)| path.split('?').next().unwrap_or(path).to_string())
        .filter(|path| !path.is_empty())
}

/// Keeps object keys to a conservative character set.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl StorageApi for BackendClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let response = self
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{path}"))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let response = self
            .request(Method::GET, &format!("/storage/v1/object/{bucket}/{path}"))
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/storage/v1/object/{bucket}"))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        public_object_url(self.base_url(), bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_round_trip_through_public_url() {
        let url = public_object_url("https://clinic.test", DOCUMENTS, "geral/1700000000_ata.pdf");
        assert_eq!(
            url,
            "https://clinic.test/storage/v1/object/public/documents/geral/1700000000_ata.pdf"
        );
        assert_eq!(
            object_path_from_url(&url, DOCUMENTS).as_deref(),
            Some("geral/1700000000_ata.pdf")
        );
        assert_eq!(object_path_from_url(&url, AVATARS), None);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("relatório final.pdf"), "relat_rio_final.pdf");
        assert_eq!(sanitize_file_name("ok-name_1.png"), "ok-name_1.png");
        assert_eq!(sanitize_file_name("???"), "file");
    }
}

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use log::info;
use reqwest::Method;
use serde_json::json;
use uuid::Uuid;

use crate::api::functions::{CREATE_USER, MANAGE_USERS};
use crate::api::storage::{self, AVATARS};
use crate::api::tables::{self, USER_PROFILES};
use crate::api::{FunctionsApi, Query, StorageApi, TableApi};
use crate::error::{PortalError, Result};
use crate::models::{Profile, Role};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    /// Generated when absent; the user is expected to reset it.
    pub password: Option<String>,
    pub name: String,
    pub role: Role,
}

impl NewUser {
    fn validate(&self) -> Result<()> {
        if !self.email.contains('@') {
            return Err(PortalError::validation("a valid email is required"));
        }
        if self.name.trim().is_empty() {
            return Err(PortalError::validation("name is required"));
        }
        if let Some(password) = &self.password {
            if password.chars().count() < 6 {
                return Err(PortalError::validation(
                    "password must have at least 6 characters",
                ));
            }
        }
        Ok(())
    }
}

fn transient_password() -> String {
    format!("Tmp-{}", Uuid::new_v4().simple())
}

fn ensure_admin(actor: &Profile) -> Result<()> {
    if actor.is_admin() && actor.active {
        Ok(())
    } else {
        Err(PortalError::Forbidden("administrators only".into()))
    }
}

pub struct CreatedUser {
    pub email: String,
    pub password: String,
    pub response: serde_json::Value,
}

pub struct UserService<A> {
    api: Arc<A>,
}

impl<A> UserService<A>
where
    A: TableApi + FunctionsApi,
{
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<Profile>> {
        tables::fetch(
            self.api.as_ref(),
            USER_PROFILES,
            &Query::new().order("name", true),
        )
        .await
    }

    /// Accounts are created server-side; the portal only holds the anon key.
    pub async fn create(&self, actor: &Profile, user: NewUser) -> Result<CreatedUser> {
        ensure_admin(actor)?;
        user.validate()?;

        let password = user.password.clone().unwrap_or_else(transient_password);
        let email = user.email.trim().to_string();
        let response = self
            .api
            .invoke(
                CREATE_USER,
                Method::POST,
                json!({
                    "email": email,
                    "password": password,
                    "name": user.name.trim(),
                    "role": user.role.as_str(),
                }),
            )
            .await?;

        info!("created user {email} as {}", user.role);
        Ok(CreatedUser {
            email,
            password,
            response,
        })
    }

    pub async fn delete(&self, actor: &Profile, user_id: Uuid) -> Result<()> {
        ensure_admin(actor)?;
        if actor.id == user_id {
            return Err(PortalError::Forbidden(
                "administrators cannot delete their own account".into(),
            ));
        }

        self.api
            .invoke(MANAGE_USERS, Method::DELETE, json!({ "userId": user_id }))
            .await?;
        info!("deleted user {user_id}");
        Ok(())
    }

    pub async fn set_role(&self, actor: &Profile, user_id: Uuid, role: Role) -> Result<Profile> {
        ensure_admin(actor)?;
        tables::update_one(
            self.api.as_ref(),
            USER_PROFILES,
            &Query::new().eq("id", user_id),
            &json!({ "role": role.as_str() }),
        )
        .await
    }

    pub async fn set_active(&self, actor: &Profile, user_id: Uuid, active: bool) -> Result<Profile> {
        ensure_admin(actor)?;
        if actor.id == user_id && !active {
            return Err(PortalError::Forbidden(
                "administrators cannot deactivate themselves".into(),
            ));
        }
        tables::update_one(
            self.api.as_ref(),
            USER_PROFILES,
            &Query::new().eq("id", user_id),
            &json!({ "active": active }),
        )
        .await
    }
}

/// Stores a new avatar image and returns its public URL.
pub async fn upload_avatar<A: StorageApi + ?Sized>(api: &A, user_id: Uuid, path: &Path) -> Result<String> {
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    if mime_type.type_() != mime_guess::mime::IMAGE {
        return Err(PortalError::validation("avatar must be an image"));
    }
    let bytes = tokio::fs::read(path).await?;
    super::documents::check_upload(mime_type.essence_str(), bytes.len() as u64)?;

    let name = path
        .file_name()
        .map(|name| storage::sanitize_file_name(&name.to_string_lossy()))
        .unwrap_or_else(|| "avatar".into());
    let object_path = format!("{user_id}/{}-{name}", Utc::now().timestamp_millis());
    api.upload(AVATARS, &object_path, bytes, mime_type.essence_str())
        .await?;

    Ok(api.public_url(AVATARS, &object_path))
}

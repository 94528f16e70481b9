use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{BackendClient, check};
use crate::error::{PortalError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now.timestamp() >= expires_at,
            None => false,
        }
    }

    /// Fills `expires_at` from `expires_in` when the backend only sent the latter.
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(now.timestamp() + self.expires_in);
        }
        self
    }
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;
    /// Registers an account; the user must confirm the email before signing in.
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<AuthUser>;
    async fn sign_out(&self, access_token: &str) -> Result<()>;
    async fn get_user(&self, access_token: &str) -> Result<AuthUser>;
    /// Fails with [`PortalError::SessionExpired`] when the refresh token is no longer valid.
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession>;
    async fn resend_confirmation(&self, email: &str) -> Result<()>;
    async fn update_user(&self, access_token: &str, metadata: Value) -> Result<AuthUser>;
    /// Token attached to every subsequent table, storage and function call.
    fn set_access_token(&self, token: Option<String>);
}

#[async_trait]
impl AuthApi for BackendClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let session: AuthSession = check(response).await?.json().await?;
        Ok(session.stamped(Utc::now()))
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<AuthUser> {
        let response = self
            .request(Method::POST, "/auth/v1/signup")
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;

        // With email confirmation enabled the body is the user itself, otherwise a session.
        let body: Value = check(response).await?.json().await?;
        let user = match body.get("user") {
            Some(user) => user.clone(),
            None => body,
        };
        Ok(serde_json::from_value(user)?)
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/auth/v1/logout"))
            .bearer_auth(access_token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        let response = self
            .client
            .get(self.url("/auth/v1/user"))
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let response = self
            .client
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .bearer_auth(&self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        match check(response).await {
            Ok(response) => {
                let session: AuthSession = response.json().await?;
                Ok(session.stamped(Utc::now()))
            }
            Err(PortalError::Backend { status, .. }) if (400..500).contains(&status) => {
                Err(PortalError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    async fn resend_confirmation(&self, email: &str) -> Result<()> {
        let response = self
            .request(Method::POST, "/auth/v1/resend")
            .json(&json!({ "type": "signup", "email": email }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn update_user(&self, access_token: &str, metadata: Value) -> Result<AuthUser> {
        let response = self
            .client
            .put(self.url("/auth/v1/user"))
            .bearer_auth(access_token)
            .json(&json!({ "data": metadata }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    fn set_access_token(&self, token: Option<String>) {
        self.store_access_token(token);
    }
}

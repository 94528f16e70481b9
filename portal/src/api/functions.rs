use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::{BackendClient, check};
use crate::error::{PortalError, Result};

pub const CREATE_USER: &str = "create-user";
pub const MANAGE_USERS: &str = "manage-users";

/// Serverless functions; used where the auth subsystem must be touched for another user.
#[async_trait]
pub trait FunctionsApi: Send + Sync {
    async fn invoke(&self, name: &str, method: Method, body: Value) -> Result<Value>;
}

#[async_trait]
impl FunctionsApi for BackendClient {
    async fn invoke(&self, name: &str, method: Method, body: Value) -> Result<Value> {
        if self.access_token().is_none() {
            return Err(PortalError::NotAuthenticated);
        }

        let response = self
            .request(method, &format!("/functions/v1/{name}"))
            .json(&body)
            .send()
            .await?;

        let text = check(response).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

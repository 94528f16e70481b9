pub mod auth;
pub mod functions;
pub mod query;
pub mod realtime;
pub mod storage;
pub mod tables;

use std::sync::RwLock;
use std::time::Duration;

use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response, header};

use crate::error::{PortalError, Result};

pub use auth::{AuthApi, AuthSession, AuthUser};
pub use functions::FunctionsApi;
pub use query::{Filter, Order, Query};
pub use storage::StorageApi;
pub use tables::TableApi;

/// Everything a portal page talks to.
pub trait Backend: AuthApi + TableApi + StorageApi + FunctionsApi {}

impl<T> Backend for T where T: AuthApi + TableApi + StorageApi + FunctionsApi {}

/// HTTP client for the hosted backend: auth, tables, storage and functions.
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl BackendClient {
    pub fn new(base_url: String, anon_key: String) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&anon_key)
                .map_err(|_| PortalError::validation("anon key is not a valid header value"))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            access_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .map(|token| token.clone())
            .unwrap_or_default()
    }

    pub(crate) fn store_access_token(&self, token: Option<String>) {
        if let Ok(mut current) = self.access_token.write() {
            *current = token;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds a request carrying the session bearer, or the public key when signed out.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        debug!("{} {}", method, path);
        self.client
            .request(method, self.url(path))
            .bearer_auth(bearer)
    }
}

/// Turns a non-success response into [`PortalError::Backend`] carrying the raw backend message.
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await?;
    Err(PortalError::Backend {
        status: status.as_u16(),
        message: error_message(&error_text),
    })
}

fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

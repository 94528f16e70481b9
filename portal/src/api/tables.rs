use async_trait::async_trait;
use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{BackendClient, Query, check};
use crate::error::{PortalError, Result};

pub const USER_PROFILES: &str = "user_profiles";
pub const NOTICES: &str = "notices";
pub const MESSAGES: &str = "messages";
pub const EVENTS: &str = "events";
pub const DOCUMENTS: &str = "documents";
pub const POLLS: &str = "polls";
pub const POLL_OPTIONS: &str = "poll_options";
pub const POLL_VOTES: &str = "poll_votes";
pub const USER_PRESENCE: &str = "user_presence";

/// Row-level access to the backend's relational tables.
///
/// Mutations return the affected rows as the backend represents them.
#[async_trait]
pub trait TableApi: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>>;
    async fn update(&self, table: &str, query: &Query, changes: Value) -> Result<Vec<Value>>;
    async fn delete(&self, table: &str, query: &Query) -> Result<Vec<Value>>;
    /// Inserts, or merges into the row with the same primary key.
    async fn upsert(&self, table: &str, rows: Value) -> Result<Vec<Value>>;
}

impl BackendClient {
    async fn table_call(
        &self,
        method: Method,
        table: &str,
        query: &Query,
        prefer: &str,
        body: Option<Value>,
    ) -> Result<Vec<Value>> {
        let mut request = self
            .request(method, &format!("/rest/v1/{table}"))
            .query(&query.to_params())
            .header("Prefer", prefer);

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = check(request.send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&text)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }
}

#[async_trait]
impl TableApi for BackendClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let query = match query.columns {
            Some(_) => query.clone(),
            None => query.clone().select("*"),
        };
        self.table_call(Method::GET, table, &query, "count=none", None)
            .await
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>> {
        self.table_call(
            Method::POST,
            table,
            &Query::new(),
            "return=representation",
            Some(rows),
        )
        .await
    }

    async fn update(&self, table: &str, query: &Query, changes: Value) -> Result<Vec<Value>> {
        self.table_call(
            Method::PATCH,
            table,
            query,
            "return=representation",
            Some(changes),
        )
        .await
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        self.table_call(Method::DELETE, table, query, "return=representation", None)
            .await
    }

    async fn upsert(&self, table: &str, rows: Value) -> Result<Vec<Value>> {
        self.table_call(
            Method::POST,
            table,
            &Query::new(),
            "resolution=merge-duplicates,return=representation",
            Some(rows),
        )
        .await
    }
}

fn decode<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(PortalError::from))
        .collect()
}

pub async fn fetch<T, A>(api: &A, table: &str, query: &Query) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    A: TableApi + ?Sized,
{
    decode(api.select(table, query).await?)
}

pub async fn fetch_one<T, A>(api: &A, table: &str, query: &Query) -> Result<Option<T>>
where
    T: DeserializeOwned,
    A: TableApi + ?Sized,
{
    let query = query.clone().limit(1);
    Ok(fetch(api, table, &query).await?.into_iter().next())
}

pub async fn insert_one<T, R, A>(api: &A, table: &str, row: &R) -> Result<T>
where
    T: DeserializeOwned,
    R: Serialize + ?Sized,
    A: TableApi + ?Sized,
{
    let rows = api.insert(table, serde_json::to_value(row)?).await?;
    decode(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| PortalError::Backend {
            status: 200,
            message: format!("insert into {table} returned no row"),
        })
}

pub async fn update_one<T, R, A>(api: &A, table: &str, query: &Query, changes: &R) -> Result<T>
where
    T: DeserializeOwned,
    R: Serialize + ?Sized,
    A: TableApi + ?Sized,
{
    let rows = api
        .update(table, query, serde_json::to_value(changes)?)
        .await?;
    decode(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| PortalError::NotFound(format!("{table} row")))
}

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU16, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, TimeZone, Utc};
use portal::api::{
    AuthApi, AuthSession, AuthUser, Filter, FunctionsApi, Query, StorageApi, TableApi,
};
use portal::models::{Profile, Role};
use portal::{PortalError, Result};
use reqwest::Method;
use serde_json::{Value, json};
use uuid::Uuid;

/// In-memory stand-in for the hosted backend. Every call is recorded as "<op> <target>".
#[derive(Default)]
pub struct FakeBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    invocations: Mutex<Vec<(String, Method, Value)>>,
    accounts: Mutex<HashMap<String, (String, AuthUser)>>,
    refresh_tokens: Mutex<HashMap<String, AuthUser>>,
    issued: Mutex<HashMap<String, AuthUser>>,
    access_token: Mutex<Option<String>>,
    clock: AtomicI64,
    pub fail_storage_remove: AtomicBool,
    pub fail_refresh: AtomicBool,
    /// Non-zero makes every table read fail with this status.
    pub fail_select_status: AtomicU16,
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn matches(row: &Value, query: &Query) -> bool {
    query.filters.iter().all(|filter| {
        let field = row.get(filter.column()).unwrap_or(&Value::Null);
        match filter {
            Filter::Eq(_, value) => text(field) == *value,
            Filter::In(_, values) => values.contains(&text(field)),
            Filter::NotNull(_) => !field.is_null(),
        }
    })
}

fn rows_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        row => vec![row],
    }
}

fn merge(target: &mut Value, changes: &Value) {
    if let (Some(target), Some(changes)) = (target.as_object_mut(), changes.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn invocations(&self) -> Vec<(String, Method, Value)> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_object(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&format!("{bucket}/{path}"))
    }

    pub fn current_token(&self) -> Option<String> {
        self.access_token.lock().unwrap().clone()
    }

    /// Monotonic timestamps so ordering by creation time is deterministic.
    fn next_timestamp(&self) -> String {
        let tick = self.clock.fetch_add(1, AtomicOrdering::SeqCst);
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        (base + Duration::seconds(tick)).to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Seeds a row as-is, without recording a call.
    pub fn seed(&self, table: &str, row: Value) -> Value {
        let row = self.complete(row);
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    fn complete(&self, mut row: Value) -> Value {
        if let Some(object) = row.as_object_mut() {
            if !object.contains_key("id") {
                object.insert("id".into(), json!(Uuid::new_v4()));
            }
            if !object.contains_key("created_at") {
                object.insert("created_at".into(), json!(self.next_timestamp()));
            }
        }
        row
    }

    pub fn seed_object(&self, bucket: &str, path: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{path}"), bytes.to_vec());
    }

    /// Registers an account and its profile row.
    pub fn add_account(&self, email: &str, password: &str, role: Role, active: bool) -> Profile {
        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: Some(email.split('@').next().unwrap_or(email).to_string()),
            role,
            avatar_url: None,
            active,
        };
        let user = AuthUser {
            id: profile.id,
            email: Some(email.to_string()),
            user_metadata: json!({}),
            email_confirmed_at: Some(Utc::now()),
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user));
        self.seed("user_profiles", serde_json::to_value(&profile).unwrap());
        profile
    }

    fn issue_session(&self, user: AuthUser) -> AuthSession {
        let refresh_token = format!("refresh-{}", Uuid::new_v4());
        let access_token = format!("access-{}", Uuid::new_v4());
        self.refresh_tokens
            .lock()
            .unwrap()
            .insert(refresh_token.clone(), user.clone());
        self.issued
            .lock()
            .unwrap()
            .insert(access_token.clone(), user.clone());
        AuthSession {
            access_token,
            refresh_token,
            expires_in: 3600,
            expires_at: Some(Utc::now().timestamp() + 3600),
            user,
        }
    }

    /// A fresh session for a registered account, as a previous run would have saved it.
    pub fn live_session(&self, email: &str) -> AuthSession {
        let user = self.accounts.lock().unwrap()[email].1.clone();
        self.issue_session(user)
    }

    /// Server-side revocation: the access token stops being accepted.
    pub fn revoke(&self, access_token: &str) {
        self.issued.lock().unwrap().remove(access_token);
    }

    /// A session for a registered account that expired an hour ago.
    pub fn expired_session(&self, email: &str) -> AuthSession {
        let user = self.accounts.lock().unwrap()[email].1.clone();
        let mut session = self.issue_session(user);
        session.expires_at = Some(Utc::now().timestamp() - 3600);
        session
    }
}

#[async_trait]
impl TableApi for FakeBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        self.record(format!("select {table}"));
        let status = self.fail_select_status.load(AtomicOrdering::SeqCst);
        if status != 0 {
            return Err(PortalError::Backend {
                status,
                message: "JWT expired".into(),
            });
        }
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| matches(row, query))
            .collect();

        rows.sort_by(|a, b| {
            for order in &query.order {
                let left = text(a.get(&order.column).unwrap_or(&Value::Null));
                let right = text(b.get(&order.column).unwrap_or(&Value::Null));
                let ordering = if order.ascending {
                    left.cmp(&right)
                } else {
                    right.cmp(&left)
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>> {
        self.record(format!("insert {table}"));
        let inserted: Vec<Value> = rows_of(rows)
            .into_iter()
            .map(|row| self.complete(row))
            .collect();
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update(&self, table: &str, query: &Query, changes: Value) -> Result<Vec<Value>> {
        self.record(format!("update {table}"));
        let mut tables = self.tables.lock().unwrap();
        let mut updated = Vec::new();
        for row in tables.entry(table.to_string()).or_default().iter_mut() {
            if matches(row, query) {
                merge(row, &changes);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        self.record(format!("delete {table}"));
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let (deleted, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|row| matches(row, query));
        *rows = kept;
        Ok(deleted)
    }

    async fn upsert(&self, table: &str, rows: Value) -> Result<Vec<Value>> {
        self.record(format!("upsert {table}"));
        let mut tables = self.tables.lock().unwrap();
        let existing = tables.entry(table.to_string()).or_default();
        let mut written = Vec::new();
        for row in rows_of(rows) {
            let id = row.get("id").cloned();
            match existing.iter_mut().find(|r| id.is_some() && r.get("id") == id.as_ref()) {
                Some(current) => {
                    merge(current, &row);
                    written.push(current.clone());
                }
                None => {
                    existing.push(row.clone());
                    written.push(row);
                }
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl StorageApi for FakeBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        self.record(format!("storage.upload {bucket}"));
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{path}"), bytes);
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.record(format!("storage.download {bucket}"));
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{bucket}/{path}"))
            .cloned()
            .ok_or_else(|| PortalError::Backend {
                status: 404,
                message: "Object not found".into(),
            })
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        self.record(format!("storage.remove {bucket}"));
        if self.fail_storage_remove.load(AtomicOrdering::SeqCst) {
            return Err(PortalError::Backend {
                status: 500,
                message: "storage unavailable".into(),
            });
        }
        let mut objects = self.objects.lock().unwrap();
        for path in paths {
            objects.remove(&format!("{bucket}/{path}"));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        portal::api::storage::public_object_url("https://clinic.test", bucket, path)
    }
}

#[async_trait]
impl FunctionsApi for FakeBackend {
    async fn invoke(&self, name: &str, method: Method, body: Value) -> Result<Value> {
        self.record(format!("invoke {name}"));
        self.invocations
            .lock()
            .unwrap()
            .push((name.to_string(), method, body));
        Ok(json!({ "success": true }))
    }
}

#[async_trait]
impl AuthApi for FakeBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.record("auth.sign_in");
        let user = match self.accounts.lock().unwrap().get(email) {
            Some((expected, user)) if expected == password => user.clone(),
            _ => {
                return Err(PortalError::Backend {
                    status: 400,
                    message: "Invalid login credentials".into(),
                });
            }
        };
        Ok(self.issue_session(user))
    }

    async fn sign_up(&self, email: &str, _password: &str, metadata: Value) -> Result<AuthUser> {
        self.record("auth.sign_up");
        Ok(AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata,
            email_confirmed_at: None,
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<()> {
        self.record("auth.sign_out");
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        self.record("auth.get_user");
        self.issued
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| PortalError::Backend {
                status: 401,
                message: "invalid JWT".into(),
            })
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        self.record("auth.refresh");
        if self.fail_refresh.load(AtomicOrdering::SeqCst) {
            return Err(PortalError::SessionExpired);
        }
        let user = self
            .refresh_tokens
            .lock()
            .unwrap()
            .get(refresh_token)
            .cloned()
            .ok_or(PortalError::SessionExpired)?;
        Ok(self.issue_session(user))
    }

    async fn resend_confirmation(&self, _email: &str) -> Result<()> {
        self.record("auth.resend");
        Ok(())
    }

    async fn update_user(&self, access_token: &str, metadata: Value) -> Result<AuthUser> {
        self.record("auth.update_user");
        let mut user = self
            .issued
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or(PortalError::NotAuthenticated)?;
        user.user_metadata = metadata;
        Ok(user)
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.access_token.lock().unwrap() = token;
    }
}

pub fn profile(role: Role) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        email: format!("{}@clinica.test", role.as_str()),
        name: Some(role.label().to_string()),
        role,
        avatar_url: None,
        active: true,
    }
}

//! Application-wide session store.
//!
//! Created once at startup and handed to whoever needs the signed-in user.
//! Observers call [`SessionStore::subscribe`] and stop observing by dropping the
//! receiver.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::json;
use tokio::sync::watch;

use crate::api::tables::{self, USER_PROFILES};
use crate::api::{AuthApi, AuthSession, AuthUser, Query, TableApi};
use crate::error::{PortalError, Result};
use crate::models::{Profile, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            user: None,
            profile: None,
            loading: true,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user: None,
            profile: None,
            loading: false,
        }
    }

    pub fn signed_in(user: AuthUser, profile: Option<Profile>) -> Self {
        Self {
            user: Some(user),
            profile,
            loading: false,
        }
    }
}

pub struct SessionStore<A> {
    api: Arc<A>,
    state: watch::Sender<SessionState>,
    session: Mutex<Option<AuthSession>>,
    session_file: Option<PathBuf>,
}

impl<A> SessionStore<A>
where
    A: AuthApi + TableApi,
{
    pub fn new(api: Arc<A>, session_file: Option<PathBuf>) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        Self {
            api,
            state,
            session: Mutex::new(None),
            session_file,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.session
            .lock()
            .ok()
            .and_then(|session| session.as_ref().map(|s| s.access_token.clone()))
    }

    /// Picks up the session saved by a previous run, refreshing it when expired.
    ///
    /// A session the backend no longer accepts is cleared and reported as
    /// [`PortalError::SessionExpired`]. Any other failure leaves the store signed
    /// out for this run but keeps the saved file.
    pub async fn restore(&self) -> Result<SessionState> {
        match self.restore_saved().await {
            Ok(state) => Ok(state),
            Err(e) if matches!(e, PortalError::SessionExpired) || e.is_unauthorized() => {
                warn!("saved session rejected ({e}), signing out");
                self.clear()?;
                Err(PortalError::SessionExpired)
            }
            Err(e) => {
                self.forget();
                Err(e)
            }
        }
    }

    async fn restore_saved(&self) -> Result<SessionState> {
        let Some(saved) = self.read_saved_session()? else {
            debug!("no saved session");
            self.publish(SessionState::signed_out());
            return Ok(self.current());
        };

        let session = if saved.is_expired(Utc::now()) {
            info!("saved session expired, refreshing");
            self.api.refresh_session(&saved.refresh_token).await?
        } else {
            let user = self.api.get_user(&saved.access_token).await?;
            AuthSession { user, ..saved }
        };

        self.establish(session).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionState> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(PortalError::validation("email and password are required"));
        }

        let session = self
            .api
            .sign_in_with_password(email.trim(), password)
            .await?;
        info!("signed in as {}", email.trim());
        self.establish(session).await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<AuthUser> {
        if !email.contains('@') {
            return Err(PortalError::validation("a valid email is required"));
        }
        if password.chars().count() < 6 {
            return Err(PortalError::validation(
                "password must have at least 6 characters",
            ));
        }
        if name.trim().is_empty() {
            return Err(PortalError::validation("name is required"));
        }

        self.api
            .sign_up(
                email.trim(),
                password,
                json!({ "name": name.trim(), "role": role.as_str() }),
            )
            .await
    }

    pub async fn sign_out(&self) -> Result<()> {
        if let Some(token) = self.access_token() {
            if let Err(e) = self.api.sign_out(&token).await {
                warn!("remote sign out failed: {e}");
            }
        }
        self.clear()
    }

    pub async fn resend_confirmation(&self, email: &str) -> Result<()> {
        if !email.contains('@') {
            return Err(PortalError::validation("a valid email is required"));
        }
        self.api.resend_confirmation(email.trim()).await
    }

    /// Updates the display name and avatar in both the auth metadata and the profile row.
    pub async fn update_profile(
        &self,
        name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Profile> {
        let token = self.access_token().ok_or(PortalError::NotAuthenticated)?;
        self.require_user()?;

        let mut changes = serde_json::Map::new();
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(PortalError::validation("name cannot be empty"));
            }
            changes.insert("name".into(), json!(name.trim()));
        }
        if let Some(avatar_url) = avatar_url {
            changes.insert("avatar_url".into(), json!(avatar_url));
        }
        if changes.is_empty() {
            return Err(PortalError::validation("nothing to update"));
        }

        let changes = serde_json::Value::Object(changes);
        let user = self.api.update_user(&token, changes.clone()).await?;
        let profile: Profile = tables::update_one(
            self.api.as_ref(),
            USER_PROFILES,
            &Query::new().eq("id", user.id),
            &changes,
        )
        .await?;

        self.publish(SessionState::signed_in(user, Some(profile.clone())));
        Ok(profile)
    }

    /// Signed-in user and profile, refusing inactive accounts.
    pub fn require_user(&self) -> Result<(AuthUser, Profile)> {
        let state = self.current();
        let user = state.user.ok_or(PortalError::NotAuthenticated)?;
        let profile = state
            .profile
            .ok_or_else(|| PortalError::NotFound("user profile".into()))?;
        if !profile.active {
            return Err(PortalError::Forbidden("account is inactive".into()));
        }
        Ok((user, profile))
    }

    pub fn require_admin(&self) -> Result<Profile> {
        let (_, profile) = self.require_user()?;
        if !profile.is_admin() {
            return Err(PortalError::Forbidden("administrators only".into()));
        }
        Ok(profile)
    }

    async fn establish(&self, session: AuthSession) -> Result<SessionState> {
        self.api.set_access_token(Some(session.access_token.clone()));

        let profile: Option<Profile> = tables::fetch_one(
            self.api.as_ref(),
            USER_PROFILES,
            &Query::new().eq("id", session.user.id),
        )
        .await?;

        if profile.is_none() {
            warn!("no profile row for user {}", session.user.id);
        }

        let user = session.user.clone();
        self.write_saved_session(&session)?;
        if let Ok(mut current) = self.session.lock() {
            *current = Some(session);
        }

        self.publish(SessionState::signed_in(user, profile));
        Ok(self.current())
    }

    /// Drops every trace of the session, locally and on disk.
    pub fn clear(&self) -> Result<()> {
        self.api.set_access_token(None);
        if let Ok(mut current) = self.session.lock() {
            *current = None;
        }
        if let Some(path) = &self.session_file {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        self.publish(SessionState::signed_out());
        Ok(())
    }

    /// Signed out in memory only; the saved session file is left alone.
    fn forget(&self) {
        self.api.set_access_token(None);
        if let Ok(mut current) = self.session.lock() {
            *current = None;
        }
        self.publish(SessionState::signed_out());
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn read_saved_session(&self) -> Result<Option<AuthSession>> {
        let Some(path) = &self.session_file else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("ignoring unreadable session file {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    fn write_saved_session(&self, session: &AuthSession) -> Result<()> {
        let Some(path) = &self.session_file else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }
}

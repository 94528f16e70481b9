use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::tables::{self, USER_PRESENCE, USER_PROFILES};
use crate::api::{Query, TableApi};
use crate::error::Result;
use crate::models::{Presence, Profile};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Lifecycle signals that trigger an immediate heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceSignal {
    /// The user came back to the app.
    VisibilityChange,
    /// The app is going away; one last heartbeat is sent before stopping.
    Unload,
}

/// Turns the terminal's "resumed after suspend" (SIGCONT, after Ctrl-Z and `fg`)
/// into [`PresenceSignal::VisibilityChange`].
#[cfg(unix)]
pub fn forward_resumes(signals: mpsc::Sender<PresenceSignal>) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut resumed = signal(SignalKind::from_raw(libc::SIGCONT))?;
    Ok(tokio::spawn(async move {
        while resumed.recv().await.is_some() {
            if signals.send(PresenceSignal::VisibilityChange).await.is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn forward_resumes(_signals: mpsc::Sender<PresenceSignal>) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async {}))
}

pub struct PresenceService<A> {
    api: Arc<A>,
    user_id: Uuid,
}

impl<A: TableApi> PresenceService<A> {
    pub fn new(api: Arc<A>, user_id: Uuid) -> Self {
        Self { api, user_id }
    }

    /// Marks the user online now. Never fails; a missed heartbeat only delays presence.
    pub async fn heartbeat(&self) {
        let row = Presence::online(self.user_id, Utc::now());
        let result = match serde_json::to_value(&row) {
            Ok(row) => self.api.upsert(USER_PRESENCE, row).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            debug!("presence heartbeat failed: {e}");
        }
    }

    pub async fn online_users(&self) -> Result<Vec<Profile>> {
        let api = self.api.as_ref();
        let online: Vec<Presence> =
            tables::fetch(api, USER_PRESENCE, &Query::new().eq("is_online", true)).await?;
        if online.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = online.iter().map(|presence| presence.id).collect();
        tables::fetch(
            api,
            USER_PROFILES,
            &Query::new().is_in("id", &ids).order("name", true),
        )
        .await
    }

    /// Heartbeats on start, on every tick and on every signal.
    ///
    /// Returns after [`PresenceSignal::Unload`] or once every sender is dropped,
    /// in both cases after a final heartbeat.
    pub async fn run(&self, mut signals: mpsc::Receiver<PresenceSignal>) {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);

        loop {
            tokio::select! {
                biased;

                _ = ticker.tick() => self.heartbeat().await,
                signal = signals.recv() => match signal {
                    Some(PresenceSignal::VisibilityChange) => {
                        debug!("visible again, refreshing presence");
                        self.heartbeat().await;
                    }
                    Some(PresenceSignal::Unload) | None => {
                        self.heartbeat().await;
                        info!("presence loop stopped");
                        return;
                    }
                },
            }
        }
    }
}

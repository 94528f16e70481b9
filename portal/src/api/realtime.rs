//! Change-feed subscription over the backend's realtime socket.
//!
//! The socket speaks phoenix channels: one `phx_join` per table topic, a
//! heartbeat on the `phoenix` topic, and `postgres_changes` frames carrying
//! the changed row.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::BackendClient;
use crate::error::{PortalError, Result};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

/// A row change pushed by the backend. `record` is the lightweight payload, not always the full row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record: Value,
}

impl ChangeEvent {
    pub fn insert(table: &str, record: Value) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Insert,
            record,
        }
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record.get("id").and_then(Value::as_str)
    }
}

pub fn websocket_url(base_url: &str, anon_key: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(PortalError::Realtime(format!(
                "unsupported scheme {other} for realtime"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| PortalError::Realtime("cannot switch to websocket scheme".into()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

pub fn topic_for(table: &str) -> String {
    format!("realtime:public:{table}")
}

pub fn join_frame(table: &str, kind: ChangeKind, access_token: Option<&str>, join_ref: u64) -> Value {
    json!({
        "topic": topic_for(table),
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": kind.as_str(), "schema": "public", "table": table }
                ]
            },
            "access_token": access_token,
        },
        "ref": join_ref.to_string(),
        "join_ref": join_ref.to_string(),
    })
}

pub fn heartbeat_frame(msg_ref: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

/// Extracts a row change from a socket frame; every other frame yields `None`.
pub fn parse_frame(text: &str) -> Option<ChangeEvent> {
    let frame: Value = serde_json::from_str(text).ok()?;
    if frame.get("event").and_then(Value::as_str) != Some("postgres_changes") {
        return None;
    }

    let data = frame.get("payload")?.get("data")?;
    let kind = ChangeKind::parse(data.get("type")?.as_str()?)?;
    let table = data.get("table")?.as_str()?.to_string();
    let record = match kind {
        ChangeKind::Delete => data.get("old_record").cloned(),
        _ => data.get("record").cloned(),
    }
    .unwrap_or(Value::Null);

    Some(ChangeEvent {
        table,
        kind,
        record,
    })
}

/// Opens the socket and joins one INSERT feed per table.
///
/// The reader task ends when the returned receiver is dropped or the socket closes.
pub async fn subscribe_inserts(
    client: &BackendClient,
    tables: &[&str],
) -> Result<mpsc::Receiver<ChangeEvent>> {
    let url = websocket_url(client.base_url(), client.anon_key())?;
    let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = socket.split();

    let access_token = client.access_token();
    let mut next_ref = 1u64;
    for table in tables {
        let frame = join_frame(table, ChangeKind::Insert, access_token.as_deref(), next_ref);
        sink.send(Message::text(frame.to_string())).await?;
        info!("joined realtime feed for {table}");
        next_ref += 1;
    }

    let (tx, rx) = mpsc::channel(256);

    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = sink.send(Message::text(heartbeat_frame(next_ref).to_string())).await {
                        warn!("realtime heartbeat failed: {e}");
                        break;
                    }
                    next_ref += 1;
                }
                _ = tx.closed() => {
                    debug!("realtime receiver dropped, closing socket");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_frame(text.as_str()) {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        } else {
                            debug!("realtime frame ignored: {}", text.as_str());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("realtime socket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("realtime socket error: {e}");
                        break;
                    }
                },
            }
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_from_https_base() {
        let url = websocket_url("https://abc.backend.test", "anon").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abc.backend.test/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn test_websocket_url_rejects_other_schemes() {
        assert!(websocket_url("ftp://abc.backend.test", "anon").is_err());
    }

    #[test]
    fn test_join_frame_scopes_table() {
        let frame = join_frame("messages", ChangeKind::Insert, Some("jwt"), 3);
        assert_eq!(frame["topic"], "realtime:public:messages");
        assert_eq!(frame["event"], "phx_join");
        assert_eq!(frame["payload"]["access_token"], "jwt");
        assert_eq!(
            frame["payload"]["config"]["postgres_changes"][0]["table"],
            "messages"
        );
        assert_eq!(
            frame["payload"]["config"]["postgres_changes"][0]["event"],
            "INSERT"
        );
        assert_eq!(frame["ref"], "3");
    }

    #[test]
    fn test_parse_insert_frame() {
        let text = r#"{
            "event": "postgres_changes",
            "topic": "realtime:public:messages",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "schema": "public",
                    "table": "messages",
                    "type": "INSERT",
                    "commit_timestamp": "2025-03-01T12:00:00Z",
                    "record": { "id": "7d0e5a02-4a8e-4df3-a0a5-3f1c2a6e9b11", "content": "oi" }
                }
            }
        }"#;

        let event = parse_frame(text).unwrap();
        assert_eq!(event.table, "messages");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(
            event.record_id(),
            Some("7d0e5a02-4a8e-4df3-a0a5-3f1c2a6e9b11")
        );
    }

    #[test]
    fn test_parse_ignores_control_frames() {
        let reply = r#"{"event":"phx_reply","topic":"realtime:public:messages","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert!(parse_frame(reply).is_none());
        assert!(parse_frame("not json").is_none());
    }

    #[test]
    fn test_parse_delete_uses_old_record() {
        let text = r#"{"event":"postgres_changes","payload":{"data":{"table":"user_presence","type":"DELETE","old_record":{"id":"u1"}}}}"#;
        let event = parse_frame(text).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.record_id(), Some("u1"));
    }
}

//! Host page messaging
//!
//! When the engine runs embedded, a host page supplies identity and the
//! authoritative copy of the data, and receives persist requests. The
//! message set is deliberately small and JSON-tagged so any transport
//! that can move serialized values (postMessage bridges, IPC pipes,
//! channels) can carry it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use super::snapshot::SyncSnapshot;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("host channel closed")]
    Closed,

    #[error("host channel full")]
    Busy,
}

/// Identity block delivered by the host on auth
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserInfo {
    /// Best label available for logs
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.user_id.as_deref())
            .or(self.email.as_deref())
            .unwrap_or("unknown user")
    }
}

/// Messages the host sends into the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    /// Who is signed in, optionally with their current study state
    Auth {
        #[serde(default)]
        user: UserInfo,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<SyncSnapshot>,
    },
    /// Out-of-band push of the full study state
    Snapshot { snapshot: SyncSnapshot },
    /// Host's verdict on the last requested save
    SaveAck { ok: bool },
}

/// Messages the engine sends out to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// The engine is listening and the host may deliver auth and data
    Ready,
    /// Persist request carrying the full current snapshot
    SaveRequested { snapshot: SyncSnapshot },
    /// An auth message was applied
    AuthConfirmed,
}

/// Outbound side of the host connection
///
/// Sends must not block or fail the engine: a host that is gone or busy
/// degrades the engine to fallback-only persistence, nothing more.
pub trait HostChannel: Send {
    fn send(&self, message: &OutboundMessage) -> Result<(), HostError>;
}

/// Host channel backed by a bounded tokio queue
pub struct ChannelHost {
    tx: mpsc::Sender<OutboundMessage>,
}

impl ChannelHost {
    pub fn new(tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self { tx }
    }

    /// Connected pair: the engine keeps the sender, the embedder the rest
    pub fn pair(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl HostChannel for ChannelHost {
    fn send(&self, message: &OutboundMessage) -> Result<(), HostError> {
        self.tx.try_send(message.clone()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => HostError::Busy,
            mpsc::error::TrySendError::Closed(_) => HostError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_wire_tags() {
        let auth: HostMessage = serde_json::from_value(json!({
            "type": "auth",
            "user": { "userId": "u1", "displayName": "Ada" }
        }))
        .unwrap();
        match auth {
            HostMessage::Auth { user, snapshot } => {
                assert_eq!(user.user_id.as_deref(), Some("u1"));
                assert_eq!(user.label(), "Ada");
                assert!(snapshot.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let ack: HostMessage =
            serde_json::from_value(json!({ "type": "saveAck", "ok": true })).unwrap();
        assert_eq!(ack, HostMessage::SaveAck { ok: true });
    }

    #[test]
    fn test_auth_can_carry_a_snapshot() {
        let message: HostMessage = serde_json::from_value(json!({
            "type": "auth",
            "user": {},
            "snapshot": { "cards": [], "boxes": {}, "colors": {} }
        }))
        .unwrap();

        match message {
            HostMessage::Auth { snapshot, .. } => {
                assert!(snapshot.is_some_and(|s| s.has_cards()));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_outbound_wire_tags() {
        let ready = serde_json::to_value(&OutboundMessage::Ready).unwrap();
        assert_eq!(ready, json!({ "type": "ready" }));

        let confirmed = serde_json::to_value(&OutboundMessage::AuthConfirmed).unwrap();
        assert_eq!(confirmed["type"], "authConfirmed");

        let save = serde_json::to_value(&OutboundMessage::SaveRequested {
            snapshot: SyncSnapshot::default(),
        })
        .unwrap();
        assert_eq!(save["type"], "saveRequested");
        assert!(save["snapshot"].is_object());
    }

    #[tokio::test]
    async fn test_channel_host_delivers_and_reports_closure() {
        let (host, mut rx) = ChannelHost::pair(4);
        host.send(&OutboundMessage::Ready).unwrap();
        assert_eq!(rx.recv().await, Some(OutboundMessage::Ready));

        drop(rx);
        assert!(matches!(
            host.send(&OutboundMessage::Ready),
            Err(HostError::Closed)
        ));
    }
}

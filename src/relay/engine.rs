use crate::relay::message::InboundEvent;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Notifications emitted by a connected protocol engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Inbound(InboundEvent),
    /// Raw QR payload to be scanned from the phone's linked devices screen.
    PairingCode(String),
    PairSuccess,
    Connected,
    Disconnected,
    LoggedOut,
}

/// Outbound half of a connected engine.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;
}

pub struct EngineSession {
    pub sender: Arc<dyn MessageSender>,

    /// Background task driving the engine connection, if it owns one.
    pub handle: Option<JoinHandle<()>>,
}

/// The external chat protocol engine. Connecting opens (or creates) the persisted
/// session, negotiates the protocol and subscribes `events` to its notifications.
/// Credential changes are persisted by the engine's own session store.
#[async_trait]
pub trait ProtocolEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn connect(&self, events: mpsc::UnboundedSender<EngineEvent>) -> Result<EngineSession>;
}

/// Stand-in for builds without a protocol engine feature; every connect fails.
#[cfg(not(feature = "whatsapp-web"))]
pub struct UnavailableEngine;

#[cfg(not(feature = "whatsapp-web"))]
#[async_trait]
impl ProtocolEngine for UnavailableEngine {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn connect(&self, _events: mpsc::UnboundedSender<EngineEvent>) -> Result<EngineSession> {
        anyhow::bail!("compiled without the whatsapp-web feature")
    }
}

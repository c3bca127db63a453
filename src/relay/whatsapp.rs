//! WhatsApp Web engine backed by `whatsapp-rust`.
//!
//! The session (device identity, Signal keys, app state) lives in a SQLite file inside
//! the configured session directory and is written by the store on every change, so a
//! paired device reconnects silently after a restart. Unpaired sessions emit QR codes.

use crate::config::WhatsAppConfig;
use crate::relay::engine::{EngineEvent, EngineSession, MessageSender, ProtocolEngine};
use crate::relay::message::{
    EphemeralMessage, ExtendedTextMessage, InboundEvent, MessageKey, MessagePayload,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::log::{debug, info};
use wacore::types::events::Event;
use wacore::types::message::MessageInfo;
use wacore_binary::jid::Jid;
use waproto::whatsapp::Message;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

const SESSION_DATABASE: &str = "whatsapp.db";

pub struct WhatsAppWebEngine {
    session_dir: PathBuf,
    device_name: String,
}
impl WhatsAppWebEngine {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            session_dir: config.session_dir.clone(),
            device_name: config.device_name.clone(),
        }
    }
}

#[async_trait]
impl ProtocolEngine for WhatsAppWebEngine {
    fn name(&self) -> &'static str {
        "WhatsApp Web"
    }

    async fn connect(&self, events: mpsc::UnboundedSender<EngineEvent>) -> Result<EngineSession> {
        tokio::fs::create_dir_all(&self.session_dir)
            .await
            .with_context(|| format!("Failed to create session directory {:?}", self.session_dir))?;

        let db_path = self.session_dir.join(SESSION_DATABASE);
        info!("Opening WhatsApp session store at {db_path:?}");
        let backend = Arc::new(
            SqliteStore::new(&db_path.to_string_lossy())
                .await
                .map_err(|e| anyhow!("Failed to open session store: {e}"))?,
        );

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, _client| {
                let events = events.clone();
                async move {
                    if let Some(event) = map_event(event) {
                        // The relay loop only goes away together with the process.
                        let _ = events.send(event);
                    }
                }
            })
            .build()
            .await
            .map_err(|e| anyhow!("Failed to build WhatsApp client: {e}"))?;

        let client = bot.client();
        let running = bot
            .run()
            .await
            .map_err(|e| anyhow!("Failed to run WhatsApp client: {e}"))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = running.await {
                tracing::log::error!("WhatsApp client task error: {e:?}");
            }
        });

        Ok(EngineSession {
            sender: Arc::new(WhatsAppSender { client }),
            handle: Some(handle),
        })
    }
}

struct WhatsAppSender {
    client: Arc<Client>,
}

#[async_trait]
impl MessageSender for WhatsAppSender {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let jid: Jid = to
            .parse()
            .map_err(|e| anyhow!("Invalid WhatsApp JID '{to}': {e}"))?;

        let message = Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        };

        let message_id = self
            .client
            .send_message(jid, message)
            .await
            .map_err(|e| anyhow!("{e}"))?;

        debug!("Sent message {message_id} to {to}");
        Ok(())
    }
}

fn map_event(event: Event) -> Option<EngineEvent> {
    match event {
        Event::PairingQrCode { code, .. } => Some(EngineEvent::PairingCode(code)),
        Event::PairSuccess(_) => Some(EngineEvent::PairSuccess),
        Event::Connected(_) => Some(EngineEvent::Connected),
        Event::Disconnected(_) => Some(EngineEvent::Disconnected),
        Event::LoggedOut(_) => Some(EngineEvent::LoggedOut),
        Event::Message(message, info) => Some(EngineEvent::Inbound(inbound_event(&message, &info))),
        _ => None,
    }
}

fn inbound_event(message: &Message, info: &MessageInfo) -> InboundEvent {
    InboundEvent {
        key: MessageKey {
            remote_jid: info.source.chat.to_string(),
            from_me: info.source.is_from_me,
            id: Some(info.id.clone()),
        },
        message: Some(payload_from_proto(message)),
    }
}

fn payload_from_proto(message: &Message) -> MessagePayload {
    MessagePayload {
        conversation: message.conversation.clone(),
        extended_text_message: message
            .extended_text_message
            .as_ref()
            .map(|extended| ExtendedTextMessage {
                text: extended.text.clone(),
            }),
        ephemeral_message: message.ephemeral_message.as_ref().map(|wrapper| {
            Box::new(EphemeralMessage {
                message: wrapper.message.as_deref().map(payload_from_proto),
            })
        }),
    }
}

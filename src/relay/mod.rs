pub mod engine;
pub mod message;
mod pairing;
pub mod plan;

#[cfg(feature = "whatsapp-web")]
pub mod whatsapp;

#[cfg(test)]
pub(crate) mod testing;

use crate::completion::Completion;
use crate::relay::engine::{EngineEvent, MessageSender, ProtocolEngine};
use crate::relay::message::InboundEvent;
use crate::session::SessionState;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::log::{debug, error, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    #[error("Cannot start the relay without an API key")]
    MissingCredential,
    #[error("Failed to start {engine} engine: {reason:#}")]
    Startup {
        engine: &'static str,
        reason: anyhow::Error,
    },
    #[error("Failed to send reply to {to}: {reason:#}")]
    SendDelivery { to: String, reason: anyhow::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Bridges protocol engine notifications to the completion client.
///
/// The adapter is stopped until the first successful [`MessagingAdapter::start`],
/// after which it keeps running for the rest of the process.
#[derive(Clone)]
pub struct MessagingAdapter {
    session: Arc<SessionState>,
    engine: Arc<dyn ProtocolEngine>,
    completion: Arc<dyn Completion>,
    start_lock: Arc<Mutex<()>>,
}
impl MessagingAdapter {
    pub fn new(
        session: Arc<SessionState>,
        engine: Arc<dyn ProtocolEngine>,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self {
            session,
            engine,
            completion,
            start_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Connects the engine and subscribes to its events, at most once per process.
    /// A failed attempt leaves the adapter stopped so it can be retried later.
    pub async fn start(&self) -> Result<StartOutcome, AdapterError> {
        let _guard = self.start_lock.lock().await;
        if self.session.is_relay_running() {
            debug!("Relay already running, ignoring start request");
            return Ok(StartOutcome::AlreadyRunning);
        }

        if !self.session.has_credential().await {
            error!("Cannot start the relay without a GEMINI_API_KEY");
            return Err(AdapterError::MissingCredential);
        }

        info!("Starting {} engine", self.engine.name());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine_session = match self.engine.connect(events_tx).await {
            Ok(engine_session) => engine_session,
            Err(reason) => {
                let e = AdapterError::Startup {
                    engine: self.engine.name(),
                    reason,
                };
                error!("{e}");
                return Err(e);
            }
        };

        tokio::spawn(Self::run_events(
            events_rx,
            Arc::clone(&self.completion),
            engine_session.sender,
        ));

        if let Some(handle) = engine_session.handle {
            let name = self.engine.name();
            tokio::spawn(async move {
                match handle.await {
                    Ok(()) => warn!("{name} engine task completed!"),
                    Err(e) => error!("{name} engine task failed: {e:?}!"),
                }
            });
        }

        self.session.mark_relay_running();
        info!("Relay started. Watch the logs for the WhatsApp QR code to pair.");
        Ok(StartOutcome::Started)
    }

    async fn run_events(
        mut events_rx: mpsc::UnboundedReceiver<EngineEvent>,
        completion: Arc<dyn Completion>,
        sender: Arc<dyn MessageSender>,
    ) {
        while let Some(event) = events_rx.recv().await {
            match event {
                EngineEvent::Inbound(inbound) => {
                    let completion = Arc::clone(&completion);
                    let sender = Arc::clone(&sender);
                    tokio::spawn(async move {
                        handle_inbound(&inbound, completion.as_ref(), sender.as_ref()).await;
                    });
                }
                EngineEvent::PairingCode(code) => match pairing::render_qr(&code) {
                    Some(rendered) => {
                        info!("Scan this QR code in WhatsApp > Linked devices:\n{rendered}")
                    }
                    None => warn!("Could not render pairing QR code, raw payload: {code}"),
                },
                EngineEvent::PairSuccess => info!("WhatsApp pairing successful"),
                EngineEvent::Connected => info!("WhatsApp connected"),
                EngineEvent::Disconnected => warn!("WhatsApp disconnected"),
                EngineEvent::LoggedOut => warn!(
                    "WhatsApp logged out, remove the session directory and restart to pair again"
                ),
            }
        }

        warn!("Engine event stream closed");
    }
}

/// Handles one inbound message start to finish: extract, complete, reply.
pub async fn handle_inbound(
    event: &InboundEvent,
    completion: &dyn Completion,
    sender: &dyn MessageSender,
) {
    plan::execute(plan::plan(event), completion, sender).await;
}

//! In-memory engine, sender and completion doubles for relay and HTTP tests.

use crate::completion::Completion;
use crate::relay::engine::{EngineEvent, EngineSession, MessageSender, ProtocolEngine};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub struct StubCompletion {
    reply: String,
    prompts: Mutex<Vec<String>>,
}
impl StubCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl Completion for StubCompletion {
    async fn complete(&self, prompt: &str) -> String {
        self.prompts.lock().await.push(prompt.to_string());
        self.reply.clone()
    }
}

/// Records every delivered `(to, text)` pair. Can be told to fail the first N sends.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    failures: usize,
}
impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            failures: usize::MAX,
            ..Default::default()
        }
    }

    pub fn failing_once() -> Self {
        Self {
            failures: 1,
            ..Default::default()
        }
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            bail!("connection closed");
        }

        self.sent
            .lock()
            .await
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct StubEngine {
    pub sender: Arc<RecordingSender>,
    connects: AtomicUsize,
    failures: usize,
    events: Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>,
}
impl StubEngine {
    pub fn with_sender(sender: RecordingSender) -> Self {
        Self {
            sender: Arc::new(sender),
            ..Default::default()
        }
    }

    pub fn failing_once() -> Self {
        Self {
            failures: 1,
            ..Default::default()
        }
    }

    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Pushes an event as if it came from the live engine.
    pub async fn emit(&self, event: EngineEvent) {
        let events = self.events.lock().await;
        events
            .as_ref()
            .expect("engine not connected")
            .send(event)
            .expect("event loop stopped");
    }
}

#[async_trait]
impl ProtocolEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn connect(&self, events: mpsc::UnboundedSender<EngineEvent>) -> Result<EngineSession> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(anyhow!("pairing server unreachable"));
        }

        self.events.lock().await.replace(events);
        Ok(EngineSession {
            sender: Arc::clone(&self.sender) as Arc<dyn MessageSender>,
            handle: None,
        })
    }
}

use crate::completion::Completion;
use crate::relay::engine::MessageSender;
use crate::relay::message::{InboundEvent, MessageText};
use crate::relay::AdapterError;
use tracing::log::{error, log, Level};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Log {
        level: Level,
        message: String,
    },
    CallCompletion { prompt: String },
    /// Sends the output of the preceding completion.
    SendReply { to: String },
}

/// Decides what should happen for one inbound event, without doing any of it.
pub fn plan(event: &InboundEvent) -> Vec<Effect> {
    let Some(message) = &event.message else {
        return vec![Effect::Log {
            level: Level::Debug,
            message: format!("Ignoring event without message from {}", event.key.remote_jid),
        }];
    };

    if event.key.from_me {
        return vec![Effect::Log {
            level: Level::Debug,
            message: format!("Ignoring own message in {}", event.key.remote_jid),
        }];
    }

    match message.text() {
        MessageText::PlainText(text) => vec![
            Effect::Log {
                level: Level::Info,
                message: format!("Message from {}: {text}", event.key.remote_jid),
            },
            Effect::CallCompletion { prompt: text },
            Effect::SendReply {
                to: event.key.remote_jid.clone(),
            },
        ],
        MessageText::Empty => vec![Effect::Log {
            level: Level::Debug,
            message: format!(
                "Ignoring message without text from {}",
                event.key.remote_jid
            ),
        }],
    }
}

/// Runs planned effects in order. Send failures are logged and dropped,
/// nothing is ever propagated back into the event subscription.
pub async fn execute(
    effects: Vec<Effect>,
    completion: &dyn Completion,
    sender: &dyn MessageSender,
) {
    let mut reply: Option<String> = None;
    for effect in effects {
        match effect {
            Effect::Log { level, message } => log!(level, "{message}"),
            Effect::CallCompletion { prompt } => {
                reply = Some(completion.complete(&prompt).await);
            }
            Effect::SendReply { to } => {
                let Some(text) = reply.take() else {
                    error!("No completion output to send to {to}");
                    continue;
                };

                match sender.send_text(&to, &text).await {
                    Ok(()) => log!(Level::Info, "Replied to {to}: {text}"),
                    Err(e) => error!("{}", AdapterError::SendDelivery { to, reason: e }),
                }
            }
        }
    }
}

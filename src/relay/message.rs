use serde::Deserialize;

/// One inbound chat message as delivered by the protocol engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub key: MessageKey,

    #[serde(default)]
    pub message: Option<MessagePayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Chat the message arrived in, replies are routed back here.
    pub remote_jid: String,

    #[serde(default)]
    pub from_me: bool,

    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default)]
    pub conversation: Option<String>,

    #[serde(default)]
    pub extended_text_message: Option<ExtendedTextMessage>,

    #[serde(default)]
    pub ephemeral_message: Option<Box<EphemeralMessage>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendedTextMessage {
    #[serde(default)]
    pub text: Option<String>,
}

/// Disappearing-message wrapper around another payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EphemeralMessage {
    #[serde(default)]
    pub message: Option<MessagePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageText {
    PlainText(String),
    Empty,
}

impl MessagePayload {
    /// Resolves the text in a fixed order, first non-empty wins:
    /// `conversation`, `extendedTextMessage.text`, then
    /// `ephemeralMessage.message.extendedTextMessage.text`.
    pub fn text(&self) -> MessageText {
        let ephemeral_text = self
            .ephemeral_message
            .as_ref()
            .and_then(|wrapper| wrapper.message.as_ref())
            .and_then(|inner| inner.extended_text());

        [
            self.conversation.as_deref(),
            self.extended_text(),
            ephemeral_text,
        ]
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
        .map_or(MessageText::Empty, |text| {
            MessageText::PlainText(text.to_string())
        })
    }

    fn extended_text(&self) -> Option<&str> {
        self.extended_text_message.as_ref()?.text.as_deref()
    }
}

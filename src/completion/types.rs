use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest<'a> {
    pub contents: Vec<RequestContent<'a>>,
}
impl<'a> GenerateContentRequest<'a> {
    /// A single-turn request with the prompt as its only part.
    pub fn single_prompt(text: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text }],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RequestContent<'a> {
    pub parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
pub struct RequestPart<'a> {
    pub text: &'a str,
}

/// Any JSON document is accepted. Only `candidates[0].content.parts[0].text`
/// is looked at; a body of some other shape simply has no text.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct GenerateContentResponse(Value);
impl GenerateContentResponse {
    pub fn first_text(&self) -> Option<&str> {
        self.0
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }
}

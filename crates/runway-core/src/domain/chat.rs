//! Chat request/response payloads.
//!
//! These are pass-through types: runway reads the model field and the
//! message role/content, everything else is carried verbatim in the
//! flattened `extra` maps so backends see exactly what callers sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant", or "tool".
    pub role: String,
    /// Message content; a string or an array of content parts.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Plain-text view of the content.
    ///
    /// Content-part arrays are joined from their `text` parts.
    pub fn text(&self) -> Option<String> {
        match &self.content {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let joined: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect();
                if joined.is_empty() {
                    None
                } else {
                    Some(joined.join("\n"))
                }
            }
            _ => None,
        }
    }
}

/// Sampling parameters understood by llama.cpp-style backends.
///
/// Integer knobs are signed: `-1` means "unlimited" or "disabled" to
/// llama-server and must reach it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat_tau: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat_eta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
}

/// Request body for `/v1/chat/completions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
    /// Fields runway does not interpret (`stream`, `stop`, `tools`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Whether the caller asked for a streamed response.
    pub fn is_streaming(&self) -> bool {
        self.extra
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Text of the most recent user message.
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .and_then(ChatMessage::text)
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A single completion choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Response body from `/v1/chat/completions` (non-streaming).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_object() -> String {
    "chat.completion".to_string()
}

impl ChatResponse {
    /// A response with one assistant choice.
    pub fn single(
        id: impl Into<String>,
        model: impl Into<String>,
        content: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            object: default_object(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(usage),
            extra: Map::new(),
        }
    }

    /// Text of the first choice, if any.
    pub fn first_text(&self) -> Option<String> {
        self.choices.first().and_then(|c| c.message.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_preserves_unknown_fields() {
        let body = json!({
            "model": "qwen",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.2,
            "mirostat": 2,
            "stream": false,
            "stop": ["\n"],
            "logit_bias": {"42": -100}
        });
        let request: ChatRequest = serde_json::from_value(body).unwrap();

        assert_eq!(request.model.as_deref(), Some("qwen"));
        assert_eq!(request.sampling.temperature, Some(0.2));
        assert_eq!(request.sampling.mirostat, Some(2));
        assert!(!request.is_streaming());
        assert!(request.extra.contains_key("logit_bias"));
        assert!(!request.extra.contains_key("temperature"));

        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["stop"], json!(["\n"]));
        assert_eq!(back["temperature"], json!(0.2));
    }

    #[test]
    fn negative_sampling_values_pass_through() {
        let body = json!({
            "messages": [{"role": "user", "content": "hi"}],
            "top_k": -1,
            "max_tokens": -1,
            "mirostat": 0
        });
        let request: ChatRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.sampling.top_k, Some(-1));
        assert_eq!(request.sampling.max_tokens, Some(-1));

        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["top_k"], json!(-1));
        assert_eq!(back["max_tokens"], json!(-1));
        assert_eq!(back["mirostat"], json!(0));
    }

    #[test]
    fn last_user_text_skips_assistant_turns() {
        let request = ChatRequest::new(vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
            ChatMessage::new("system", "sys"),
        ]);
        assert_eq!(request.last_user_text().as_deref(), Some("second"));
    }

    #[test]
    fn content_parts_are_joined() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [{"type": "text", "text": "a"}, {"type": "image_url"}, {"type": "text", "text": "b"}]
        }))
        .unwrap();
        assert_eq!(message.text().as_deref(), Some("a\nb"));
    }

    #[test]
    fn response_requires_choices() {
        let missing = serde_json::from_value::<ChatResponse>(json!({"model": "x"}));
        assert!(missing.is_err());

        let ok: ChatResponse = serde_json::from_value(json!({
            "id": "cmpl-1",
            "model": "x",
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4},
            "system_fingerprint": "b123"
        }))
        .unwrap();
        assert_eq!(ok.object, "chat.completion");
        assert_eq!(ok.first_text().as_deref(), Some("hello"));
        assert_eq!(ok.usage, Some(Usage::new(3, 1)));
        assert!(ok.extra.contains_key("system_fingerprint"));
    }
}

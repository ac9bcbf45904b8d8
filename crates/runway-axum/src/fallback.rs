//! Deterministic reply used when no runner is healthy and fallback is allowed.

use runway_core::domain::{ChatRequest, ChatResponse, Usage};

/// Model name reported in fallback replies.
pub const FALLBACK_MODEL: &str = "runway-fallback";

/// Echo the last user message; `ping` gets `pong`.
pub fn reply(request: &ChatRequest) -> ChatResponse {
    let text = request.last_user_text().unwrap_or_default();
    let content = if text.trim().eq_ignore_ascii_case("ping") {
        "pong".to_string()
    } else {
        text
    };
    let prompt_tokens = word_count(&request.last_user_text().unwrap_or_default());
    let completion_tokens = word_count(&content);

    ChatResponse::single(
        format!("fallback-{}", uuid::Uuid::new_v4()),
        FALLBACK_MODEL,
        content,
        Usage::new(prompt_tokens, completion_tokens),
    )
}

fn word_count(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use runway_core::domain::ChatMessage;

    use super::*;

    #[test]
    fn ping_gets_pong() {
        let request = ChatRequest::new(vec![ChatMessage::user("  PING ")]);
        assert_eq!(reply(&request).first_text().as_deref(), Some("pong"));
    }

    #[test]
    fn echoes_last_user_message() {
        let request = ChatRequest::new(vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("ignored"),
            ChatMessage::user("say this back"),
        ]);
        let response = reply(&request);
        assert_eq!(response.first_text().as_deref(), Some("say this back"));
        assert_eq!(response.model, FALLBACK_MODEL);
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(6));
    }

    #[test]
    fn no_user_message_is_empty_reply() {
        let request = ChatRequest::new(vec![ChatMessage::new("system", "be brief")]);
        assert_eq!(reply(&request).first_text().as_deref(), Some(""));
    }
}

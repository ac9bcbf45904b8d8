//! Chat command handler.

use anyhow::{Result, bail};
use runway_core::domain::{ChatMessage, ChatRequest};

use crate::client::GatewayClient;

/// Build the request sent for one `chat` invocation.
pub fn build_request(message: &[String], model: Option<String>, system: Option<String>) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage::new("system", system));
    }
    messages.push(ChatMessage::user(message.join(" ")));

    let mut request = ChatRequest::new(messages);
    request.model = model;
    request
}

pub async fn execute(
    client: &GatewayClient,
    message: &[String],
    model: Option<String>,
    system: Option<String>,
) -> Result<()> {
    let request = build_request(message, model, system);
    let response = client.chat(&request).await?;
    let Some(text) = response.first_text() else {
        bail!("gateway returned no choices");
    };
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_words_and_prepends_system() {
        let request = build_request(
            &["hello".to_string(), "world".to_string()],
            Some("qwen".to_string()),
            Some("be brief".to_string()),
        );
        assert_eq!(request.model.as_deref(), Some("qwen"));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.last_user_text().as_deref(), Some("hello world"));
        assert!(!request.is_streaming());
    }
}

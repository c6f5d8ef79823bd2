//! Anthropic Messages API (`{base_url}/v1/messages`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{send_for_body, ChatError, DispatchRequest, Provider, ProviderAdapter, WireMessage};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicAdapter;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Option<serde_json::Value>,
}

fn messages_url(base_url: &str) -> String {
    format!("{}/v1/messages", base_url.trim_end_matches('/'))
}

/// Reply text from the top-level `content`: either a plain string or the text blocks of the
/// content array, concatenated in order. Empty counts as missing.
fn extract_reply(body: &str) -> Result<String, ChatError> {
    let data: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(format!("anthropic: {}", e)))?;
    let text = match data.content {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Array(blocks)) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };
    if text.is_empty() {
        return Err(ChatError::MalformedResponse(
            "anthropic: missing content".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn send(&self, request: DispatchRequest<'_>) -> Result<String, ChatError> {
        let body = MessagesRequest {
            model: request.model,
            messages: &request.messages,
            max_tokens: MAX_TOKENS,
        };
        let http = request
            .client
            .post(messages_url(request.base_url))
            .header("x-api-key", request.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let text = send_for_body(http).await?;
        extract_reply(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_url_appends_path() {
        assert_eq!(messages_url("https://x/v1"), "https://x/v1/v1/messages");
        assert_eq!(
            messages_url("https://api.anthropic.com/"),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn extract_reply_accepts_string_content() {
        let body = json!({"content": "plain"}).to_string();
        assert_eq!(extract_reply(&body).unwrap(), "plain");
    }

    #[test]
    fn extract_reply_joins_text_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "world"}
            ]
        })
        .to_string();
        assert_eq!(extract_reply(&body).unwrap(), "Hello, world");
    }

    #[test]
    fn extract_reply_rejects_missing_content() {
        for body in [json!({}), json!({"content": null}), json!({"content": []}), json!({"content": 3})] {
            assert!(
                matches!(extract_reply(&body.to_string()), Err(ChatError::MalformedResponse(_))),
                "{}",
                body
            );
        }
    }
}

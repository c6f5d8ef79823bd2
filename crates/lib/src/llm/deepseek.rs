//! DeepSeek (OpenAI-compatible chat completions).
//! The configured base URL is the full endpoint; nothing is appended to it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{send_for_body, ChatError, DispatchRequest, Provider, ProviderAdapter, WireMessage};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeepseekAdapter;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Reply text at `choices[0].message.content`. Empty counts as missing.
fn extract_reply(body: &str) -> Result<String, ChatError> {
    let data: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(format!("deepseek: {}", e)))?;
    data.choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            ChatError::MalformedResponse("deepseek: missing choices[0].message.content".to_string())
        })
}

#[async_trait]
impl ProviderAdapter for DeepseekAdapter {
    fn provider(&self) -> Provider {
        Provider::Deepseek
    }

    async fn send(&self, request: DispatchRequest<'_>) -> Result<String, ChatError> {
        let body = ChatRequest {
            model: request.model,
            messages: &request.messages,
            stream: false,
        };
        let http = request
            .client
            .post(request.base_url)
            .bearer_auth(request.api_key)
            .json(&body);
        let text = send_for_body(http).await?;
        extract_reply(&text)
    }
}

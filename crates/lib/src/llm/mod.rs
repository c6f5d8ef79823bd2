//! LLM dispatch: one "send message" operation across hosted providers.
//!
//! Each provider gets an adapter that knows its request body, auth headers, and where the
//! reply text lives in the response. [`ChatService`] validates connection settings and picks
//! the adapter once, at construction.

mod anthropic;
mod deepseek;
mod service;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::message::Message;

pub use anthropic::AnthropicAdapter;
pub use deepseek::DeepseekAdapter;
pub use service::ChatService;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// API key or base URL missing. Not retryable until the configuration is fixed.
    #[error("api settings not configured: {0}")]
    Configuration(String),
    #[error("unknown provider: {0}")]
    UnsupportedProvider(String),
    /// Provider answered with a non-2xx status.
    #[error("api error: {status}")]
    Api { status: u16, body: String },
    /// 2xx response whose body does not have the expected shape.
    #[error("invalid response format: {0}")]
    MalformedResponse(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl ChatError {
    /// HTTP status for [`ChatError::Api`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for rate limiting, server-side failures, and transport errors. No retry happens here;
    /// this only tells the caller whether a retry could make sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Api { status, .. } => *status == 429 || *status >= 500,
            ChatError::Request(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Supported providers. Adding one means a new variant plus its adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Deepseek,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Deepseek, Provider::Anthropic];

    pub fn id(self) -> &'static str {
        match self {
            Provider::Deepseek => "deepseek",
            Provider::Anthropic => "anthropic",
        }
    }

    pub(crate) fn adapter(self) -> Box<dyn ProviderAdapter> {
        match self {
            Provider::Deepseek => Box::new(DeepseekAdapter),
            Provider::Anthropic => Box::new(AnthropicAdapter),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deepseek" => Ok(Provider::Deepseek),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(ChatError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// API key and base URL for one provider. Owned by the caller; read per call, never persisted here.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ConnectionSettings {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Trimmed key and URL; fails when either is empty.
    pub(crate) fn validated(&self) -> Result<(&str, &str), ChatError> {
        let api_key = self.api_key.trim();
        let base_url = self.base_url.trim();
        if api_key.is_empty() {
            return Err(ChatError::Configuration("missing api key".to_string()));
        }
        if base_url.is_empty() {
            return Err(ChatError::Configuration("missing base url".to_string()));
        }
        Ok((api_key, base_url))
    }
}

/// One entry of the `messages` array both providers accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

/// History in order, then the new user message.
pub fn wire_messages(content: &str, history: &[Message]) -> Vec<WireMessage> {
    history
        .iter()
        .map(|m| WireMessage {
            role: m.sender.role().to_string(),
            content: m.content.clone(),
        })
        .chain(std::iter::once(WireMessage {
            role: "user".to_string(),
            content: content.to_string(),
        }))
        .collect()
}

/// Everything an adapter needs for one call (settings already validated).
pub struct DispatchRequest<'a> {
    pub client: &'a reqwest::Client,
    pub model: &'a str,
    pub api_key: &'a str,
    pub base_url: &'a str,
    pub messages: Vec<WireMessage>,
}

/// Provider-specific half of a dispatch: build and send the request, extract the reply text.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn send(&self, request: DispatchRequest<'_>) -> Result<String, ChatError>;
}

/// Send a prepared request and return the 2xx body text, or [`ChatError::Api`].
pub(crate) async fn send_for_body(request: reqwest::RequestBuilder) -> Result<String, ChatError> {
    let res = request.send().await?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        log::debug!("provider returned {}: {}", status, body);
        return Err(ChatError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(res.text().await?)
}

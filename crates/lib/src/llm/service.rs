//! Chat service: fixed (provider, model, settings) for its lifetime, stateless across calls.

use super::{wire_messages, ChatError, ConnectionSettings, DispatchRequest, Provider, ProviderAdapter};
use crate::message::Message;

/// Sends one user message plus prior history to the configured provider.
pub struct ChatService {
    /// Adapter chosen at construction; `Err` holds the unrecognized provider id.
    adapter: Result<Box<dyn ProviderAdapter>, String>,
    model: String,
    settings: ConnectionSettings,
    client: reqwest::Client,
}

impl ChatService {
    /// Build from a provider id as stored in config. An unknown id is reported by
    /// [`ChatService::send_message`], after the settings check.
    pub fn new(provider: &str, model: impl Into<String>, settings: ConnectionSettings) -> Self {
        let adapter = provider
            .parse::<Provider>()
            .map(Provider::adapter)
            .map_err(|_| provider.to_string());
        Self {
            adapter,
            model: model.into(),
            settings,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_provider(provider: Provider, model: impl Into<String>, settings: ConnectionSettings) -> Self {
        Self {
            adapter: Ok(provider.adapter()),
            model: model.into(),
            settings,
            client: reqwest::Client::new(),
        }
    }

    /// Provider this service dispatches to, if recognized.
    pub fn provider(&self) -> Option<Provider> {
        self.adapter.as_ref().ok().map(|a| a.provider())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `content` after `history` and return the assistant reply.
    /// The caller appends the reply to its own history.
    pub async fn send_message(&self, content: &str, history: &[Message]) -> Result<Message, ChatError> {
        let (api_key, base_url) = self.settings.validated()?;
        let adapter = self
            .adapter
            .as_ref()
            .map_err(|id| ChatError::UnsupportedProvider(id.clone()))?;

        log::debug!(
            "dispatch: provider {} model {} ({} history message(s))",
            adapter.provider(),
            self.model,
            history.len()
        );
        let request = DispatchRequest {
            client: &self.client,
            model: &self.model,
            api_key,
            base_url,
            messages: wire_messages(content, history),
        };
        match adapter.send(request).await {
            Ok(text) => Ok(Message::assistant(text)),
            Err(e) => {
                log::warn!("dispatch to {} failed: {}", adapter.provider(), e);
                Err(e)
            }
        }
    }
}

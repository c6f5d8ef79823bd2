//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.bubblechat/config.json`) and environment.
//! API keys in the environment (`DEEPSEEK_API_KEY`, `ANTHROPIC_API_KEY`) override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::{ConnectionSettings, Provider};

const DEFAULT_PROVIDER: Provider = Provider::Deepseek;
const DEFAULT_LANGUAGE: &str = "en";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Provider used when none is given on the command line ("deepseek" or "anthropic").
    #[serde(default)]
    pub provider: Option<String>,

    /// UI language ("en" or "zh").
    #[serde(default)]
    pub language: Option<String>,

    /// Directory holding the session slot. Relative paths are resolved against the config
    /// file's parent. Default: `data` next to the config file.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Per-provider connection settings and model.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersConfig {
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Deepseek => &self.deepseek,
            Provider::Anthropic => &self.anthropic,
        }
    }
}

/// One provider's settings. Unset fields fall back to the provider defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Overridden by the provider's API key env var when set.
    pub api_key: Option<String>,
    /// DeepSeek: full chat completions URL. Anthropic: server root (`/v1/messages` is appended).
    pub base_url: Option<String>,
    pub model: Option<String>,
}

fn default_base_url(provider: Provider) -> &'static str {
    match provider {
        Provider::Deepseek => "https://api.deepseek.com/chat/completions",
        Provider::Anthropic => "https://api.anthropic.com",
    }
}

fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Deepseek => "deepseek-chat",
        Provider::Anthropic => "claude-3-5-sonnet-20241022",
    }
}

fn api_key_env(provider: Provider) -> &'static str {
    match provider {
        Provider::Deepseek => "DEEPSEEK_API_KEY",
        Provider::Anthropic => "ANTHROPIC_API_KEY",
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Resolve the provider id: explicit override, then config, then "deepseek". Not validated here.
pub fn resolve_provider(config: &Config, override_id: Option<&str>) -> String {
    override_id
        .and_then(non_empty)
        .or_else(|| config.provider.as_deref().and_then(non_empty))
        .unwrap_or_else(|| DEFAULT_PROVIDER.id().to_string())
}

/// Resolve the API key: provider env var overrides config.
pub fn resolve_api_key(config: &Config, provider: Provider) -> Option<String> {
    std::env::var(api_key_env(provider))
        .ok()
        .and_then(|s| non_empty(&s))
        .or_else(|| {
            config
                .providers
                .get(provider)
                .api_key
                .as_deref()
                .and_then(non_empty)
        })
}

/// Connection settings for `provider`. A missing key stays empty so the dispatcher reports it.
pub fn resolve_connection_settings(config: &Config, provider: Provider) -> ConnectionSettings {
    let base_url = config
        .providers
        .get(provider)
        .base_url
        .as_deref()
        .and_then(non_empty)
        .unwrap_or_else(|| default_base_url(provider).to_string());
    ConnectionSettings {
        api_key: resolve_api_key(config, provider).unwrap_or_default(),
        base_url,
    }
}

/// Resolve the model: explicit override, then config, then the provider default.
pub fn resolve_model(config: &Config, provider: Provider, override_model: Option<&str>) -> String {
    override_model
        .and_then(non_empty)
        .or_else(|| {
            config
                .providers
                .get(provider)
                .model
                .as_deref()
                .and_then(non_empty)
        })
        .unwrap_or_else(|| default_model(provider).to_string())
}

pub fn resolve_language(config: &Config) -> String {
    config
        .language
        .as_deref()
        .and_then(non_empty)
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the data directory (session slot location).
pub fn resolve_data_dir(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_parent(config_path);
    match &config.data_dir {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                parent.join(d)
            }
        }
        _ => parent.join("data"),
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("BUBBLECHAT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".bubblechat").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_provider_settings() {
        let config: Config = serde_json::from_str(
            r#"{
                "provider": "anthropic",
                "language": "zh",
                "providers": {
                    "anthropic": {"apiKey": "k", "baseUrl": "https://proxy.example", "model": "claude-x"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(resolve_provider(&config, None), "anthropic");
        assert_eq!(resolve_language(&config), "zh");
        let settings = resolve_connection_settings(&config, Provider::Anthropic);
        assert_eq!(settings.base_url, "https://proxy.example");
        assert_eq!(resolve_model(&config, Provider::Anthropic, None), "claude-x");
        assert_eq!(resolve_model(&config, Provider::Anthropic, Some("other")), "other");
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::default();
        assert_eq!(resolve_provider(&config, None), "deepseek");
        assert_eq!(resolve_provider(&config, Some("  ")), "deepseek");
        assert_eq!(resolve_language(&config), "en");
        assert_eq!(resolve_model(&config, Provider::Deepseek, None), "deepseek-chat");
        assert_eq!(
            resolve_connection_settings(&config, Provider::Deepseek).base_url,
            "https://api.deepseek.com/chat/completions"
        );
    }

    #[test]
    fn resolve_data_dir_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.bubblechat/config.json");
        assert_eq!(
            resolve_data_dir(&config, path),
            PathBuf::from("/home/user/.bubblechat/data")
        );
    }

    #[test]
    fn resolve_data_dir_override_relative() {
        let mut config = Config::default();
        config.data_dir = Some(PathBuf::from("profiles/me"));
        let path = Path::new("/home/user/.bubblechat/config.json");
        assert_eq!(
            resolve_data_dir(&config, path),
            PathBuf::from("/home/user/.bubblechat/profiles/me")
        );
    }

    #[test]
    fn resolve_data_dir_override_absolute() {
        let mut config = Config::default();
        config.data_dir = Some(PathBuf::from("/srv/chat"));
        let path = Path::new("/home/user/.bubblechat/config.json");
        assert_eq!(resolve_data_dir(&config, path), PathBuf::from("/srv/chat"));
    }

    #[test]
    fn missing_config_file_gives_defaults() {
        let path = std::env::temp_dir()
            .join(format!("bubblechat-config-test-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert!(config.provider.is_none());
    }
}

//! Initialize the configuration directory: create ~/.bubblechat, a default config, and the data dir.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{self, Config, ProviderConfig, ProvidersConfig};

/// Default config written by `init`: every provider listed with an empty key, so the file
/// shows what can be filled in.
fn default_config() -> Config {
    let empty = || ProviderConfig {
        api_key: Some(String::new()),
        base_url: None,
        model: None,
    };
    Config {
        provider: Some("deepseek".to_string()),
        language: Some("en".to_string()),
        data_dir: None,
        providers: ProvidersConfig {
            deepseek: empty(),
            anthropic: empty(),
        },
    }
}

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` from the default template if missing.
/// - Creates the data directory resolved from the (possibly existing) config.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let json = serde_json::to_string_pretty(&default_config())
            .context("serializing default config")?;
        std::fs::write(config_path, json)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let data_dir = config::resolve_data_dir(&config, config_path);
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;
        log::info!("created data directory at {}", data_dir.display());
    } else {
        log::debug!("data directory already exists at {}, skipping", data_dir.display());
    }

    Ok(config_dir.to_path_buf())
}

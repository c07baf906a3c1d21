//! Runtime configuration loading.
//!
//! The app fetches `config.json` next to `index.html`. A missing or
//! unreadable file is not fatal: defaults apply (user `default`,
//! auto-detected storage, public Anthropic endpoint).

use gloo_net::http::Request;
use chat_types::{ChatError, Result, config::AppConfig};

pub const CONFIG_URL: &str = "config.json";

/// Parse a configuration document. Unknown keys are ignored.
pub fn parse_app_config(text: &str) -> Result<AppConfig> {
    let mut config: AppConfig =
        serde_json::from_str(text).map_err(|e| ChatError::Config(e.to_string()))?;
    config.user_id = config.user_id.trim().to_string();
    if config.user_id.is_empty() {
        return Err(ChatError::Config("user_id must not be empty".to_string()));
    }
    Ok(config)
}

async fn fetch_app_config(url: &str) -> Result<AppConfig> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(|e| ChatError::Network(e.to_string()))?;
    if !response.ok() {
        return Err(ChatError::Config(format!("HTTP {} for {}", response.status(), url)));
    }
    let text = response
        .text()
        .await
        .map_err(|e| ChatError::Network(e.to_string()))?;
    parse_app_config(&text)
}

/// Load configuration from `url`, falling back to defaults on any failure.
pub async fn load_app_config(url: &str) -> AppConfig {
    match fetch_app_config(url).await {
        Ok(config) => {
            log::info!("Loaded {} (user '{}')", url, config.user_id);
            config
        }
        Err(e) => {
            log::warn!("Using default configuration: {}", e);
            AppConfig::default()
        }
    }
}

use serde::{Deserialize, Serialize};
use crate::chat::{DEFAULT_CHAT_ID, DEFAULT_USER_ID};

pub const MIN_MAX_TOKENS: u32 = 1000;
pub const STANDARD_MAX_TOKENS: u32 = 4000;
pub const EXTENDED_MAX_TOKENS: u32 = 8192;
pub const MAX_TOKENS_STEP: u32 = 100;
pub const TEMPERATURE_STEP: f32 = 0.1;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

// ─── Models ──────────────────────────────────────────────────

/// The fixed set of models offered in the model picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaudeModel {
    Claude3Haiku,
    Claude3Sonnet,
    Claude3Opus,
    Claude35Sonnet,
    Claude35SonnetLatest,
}

impl ClaudeModel {
    pub fn all() -> &'static [ClaudeModel] {
        &[
            ClaudeModel::Claude3Haiku,
            ClaudeModel::Claude3Sonnet,
            ClaudeModel::Claude3Opus,
            ClaudeModel::Claude35Sonnet,
            ClaudeModel::Claude35SonnetLatest,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClaudeModel::Claude3Haiku => "Claude 3 Haiku",
            ClaudeModel::Claude3Sonnet => "Claude 3 Sonnet",
            ClaudeModel::Claude3Opus => "Claude 3 Opus",
            ClaudeModel::Claude35Sonnet => "Claude 3.5 Sonnet (Default)",
            ClaudeModel::Claude35SonnetLatest => "Claude 3.5 Sonnet (Latest)",
        }
    }

    /// Label without the parenthesised qualifier, for the header badge
    pub fn short_label(&self) -> &'static str {
        let label = self.label();
        label.split(" (").next().unwrap_or(label)
    }

    /// Identifier sent to the API
    pub fn api_id(&self) -> &'static str {
        match self {
            ClaudeModel::Claude3Haiku => "claude-3-haiku-20240307",
            ClaudeModel::Claude3Sonnet => "claude-3-sonnet-20240229",
            ClaudeModel::Claude3Opus => "claude-3-opus-20240229",
            ClaudeModel::Claude35Sonnet => "claude-3-5-sonnet-20240620",
            ClaudeModel::Claude35SonnetLatest => "claude-3-5-sonnet-20241022",
        }
    }
}

impl Default for ClaudeModel {
    fn default() -> Self {
        ClaudeModel::Claude35Sonnet
    }
}

// ─── Token limit ─────────────────────────────────────────────

/// Which sub-range the token slider works in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TokenMode {
    #[default]
    Standard,
    Extended,
}

impl TokenMode {
    pub fn all() -> &'static [TokenMode] {
        &[TokenMode::Standard, TokenMode::Extended]
    }

    pub fn label(&self) -> &'static str {
        match self {
            TokenMode::Standard => "Standard (up to 4K)",
            TokenMode::Extended => "Extended (up to 8K)",
        }
    }

    pub fn min(&self) -> u32 {
        match self {
            TokenMode::Standard => MIN_MAX_TOKENS,
            TokenMode::Extended => STANDARD_MAX_TOKENS,
        }
    }

    pub fn max(&self) -> u32 {
        match self {
            TokenMode::Standard => STANDARD_MAX_TOKENS,
            TokenMode::Extended => EXTENDED_MAX_TOKENS,
        }
    }

    pub fn clamp(&self, tokens: u32) -> u32 {
        tokens.clamp(self.min(), self.max())
    }
}

// ─── Session config ──────────────────────────────────────────

/// Settings for the running session. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub model: ClaudeModel,
    pub system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    token_mode: TokenMode,
    pub current_chat_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: ClaudeModel::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: STANDARD_MAX_TOKENS,
            temperature: 1.0,
            token_mode: TokenMode::Standard,
            current_chat_id: DEFAULT_CHAT_ID.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn token_mode(&self) -> TokenMode {
        self.token_mode
    }

    /// Switch sub-range; the current limit is pulled into the new range.
    pub fn set_token_mode(&mut self, mode: TokenMode) {
        self.token_mode = mode;
        self.max_tokens = mode.clamp(self.max_tokens);
    }

    /// Set the limit, clamped to the active sub-range
    pub fn set_max_tokens(&mut self, tokens: u32) {
        self.max_tokens = self.token_mode.clamp(tokens);
    }

    /// Set the temperature, clamped to [0, 1] and snapped to one decimal
    pub fn set_temperature(&mut self, temperature: f32) {
        let t = if temperature.is_nan() { 0.0 } else { temperature.clamp(0.0, 1.0) };
        self.temperature = (t * 10.0).round() / 10.0;
    }

    /// "More Creative" above 0.5, "More Focused" otherwise
    pub fn temperature_caption(&self) -> &'static str {
        if self.temperature > 0.5 {
            "More Creative"
        } else {
            "More Focused"
        }
    }
}

// ─── App config ──────────────────────────────────────────────

/// Deployment configuration, loaded from `config.json` next to the page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub user_id: String,
    pub storage: StorageConfig,
    pub firestore: Option<FirestoreConfig>,
    pub anthropic_base_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            storage: StorageConfig::default(),
            firestore: None,
            anthropic_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base: Option<String>,
}

impl LlmConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";

    pub fn base_url(&self) -> &str {
        self.api_base
            .as_deref()
            .map(|s| s.trim_end_matches('/'))
            .filter(|s| !s.is_empty())
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StorageBackendType {
    /// Auto-detect best available backend
    #[default]
    Auto,
    Firestore,
    IndexedDb,
    Memory,
}

/// Credentials for the Firestore REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    pub project_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// OAuth2 bearer token minted from the service account
    #[serde(default)]
    pub access_token: Option<String>,
    /// Web API key, used when no bearer token is given
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_database() -> String {
    "(default)".to_string()
}

impl FirestoreConfig {
    pub fn has_credentials(&self) -> bool {
        !self.project_id.is_empty()
            && (self.access_token.as_deref().is_some_and(|t| !t.is_empty())
                || self.api_key.as_deref().is_some_and(|k| !k.is_empty()))
    }
}

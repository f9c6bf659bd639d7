use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::{FileStore, DEFAULT_BASE_URL};
use crate::chat::DEFAULT_GREETING;
use crate::llm::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

/// RGB color represented as a 3-element array.
pub type Rgb = [u8; 3];

/// OAuth sign-in settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Site the user is sent to for authorization
    pub base_url: String,
    /// API base for the key exchange and chat (derived from `base_url` when unset)
    pub api_base_url: Option<String>,
    /// Loopback port the callback listener binds
    pub callback_port: u16,
    /// Path the provider redirects back to
    pub callback_path: String,
    /// Optional credit limit for the issued key
    pub limit: Option<u64>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_base_url: None,
            callback_port: 3000,
            callback_path: "/oauth/callback".to_string(),
            limit: None,
        }
    }
}

impl OAuthConfig {
    /// Explicit API base, or `<base_url>/api/v1`.
    pub fn api_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!("{}/api/v1", self.base_url.trim_end_matches('/')),
        }
    }
}

/// Chat request settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub max_tokens: Option<u32>,
    /// Opening assistant message; empty disables it
    pub greeting: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

/// Where the API key and pending flow values are persisted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured path, or the per-user data directory.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(FileStore::default_path)
    }
}

/// Colors for the chat prompt.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColorConfig {
    pub user: Rgb,
    pub assistant: Rgb,
    pub system: Rgb,
    pub error: Rgb,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            user: [0, 255, 255],        // Cyan
            assistant: [138, 43, 226],  // Blue violet
            system: [140, 140, 160],
            error: [255, 100, 100],
        }
    }
}

impl ColorConfig {
    /// Convert an RGB array to a crossterm color.
    pub fn to_color(rgb: &Rgb) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: rgb[0],
            g: rgb[1],
            b: rgb[2],
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    pub oauth: OAuthConfig,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
    pub colors: ColorConfig,
}

impl Config {
    /// Returns the default config file path: ~/.config/router-chat/config.toml
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("router-chat").join("config.toml"))
    }

    /// Load configuration from the default path, falling back to defaults,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let mut config: Self = Self::default_path()
            .and_then(|path| match Self::load_from_path(&path) {
                Ok(config) => Some(config),
                Err(err) => {
                    if path.exists() {
                        tracing::warn!(path = %path.display(), "ignoring config file: {err:#}");
                    }
                    None
                }
            })
            .unwrap_or_default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Override settings from environment variables.
    ///
    /// `OPENROUTER_BASE_URL`, `OPENROUTER_API_BASE_URL` and
    /// `ROUTER_CHAT_MODEL` are recognized; empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(base) = var("OPENROUTER_BASE_URL") {
            self.oauth.base_url = base;
        }
        if let Some(api_base) = var("OPENROUTER_API_BASE_URL") {
            self.oauth.api_base_url = Some(api_base);
        }
        if let Some(model) = var("ROUTER_CHAT_MODEL") {
            self.chat.model = model;
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

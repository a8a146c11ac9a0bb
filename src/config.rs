use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::backend::BackendPool;

/// How the shared secret travels on outbound backend calls.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretTransport {
    Query,
    Header,
    #[default]
    Both,
}

impl SecretTransport {
    pub fn uses_query(self) -> bool {
        matches!(self, SecretTransport::Query | SecretTransport::Both)
    }

    pub fn uses_header(self) -> bool {
        matches!(self, SecretTransport::Header | SecretTransport::Both)
    }
}

impl std::str::FromStr for SecretTransport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(SecretTransport::Query),
            "header" => Ok(SecretTransport::Header),
            "both" => Ok(SecretTransport::Both),
            other => anyhow::bail!("Unknown secret transport: {other}"),
        }
    }
}

/// Response strategy of the webhook endpoint.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebhookMode {
    /// Forward the update, wait for the backend and return its text.
    Relay,
    /// Acknowledge at once, forward the update in the background.
    Forward,
    /// Acknowledge after running the in-process command layer.
    #[default]
    Interactive,
}

impl std::fmt::Display for WebhookMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookMode::Relay => write!(f, "relay"),
            WebhookMode::Forward => write!(f, "forward"),
            WebhookMode::Interactive => write!(f, "interactive"),
        }
    }
}

impl std::str::FromStr for WebhookMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay" => Ok(WebhookMode::Relay),
            "forward" => Ok(WebhookMode::Forward),
            "interactive" => Ok(WebhookMode::Interactive),
            other => anyhow::bail!("Unknown webhook mode: {other}"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// One URL or a comma-separated pool.
    #[serde(default)]
    pub urls: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub secret_transport: SecretTransport,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            urls: String::new(),
            secret: None,
            secret_transport: SecretTransport::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Chat id allowed to run /stats and /check.
    #[serde(default)]
    pub admin_id: Option<i64>,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_id: None,
            api_url: default_telegram_api_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WebhookConfig {
    #[serde(default)]
    pub mode: WebhookMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load from a TOML file (a missing file yields defaults), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Empty values count as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));

        if let Some(urls) = get("APPS_SCRIPT_URL") {
            self.backend.urls = urls;
        }
        if let Some(secret) = get("GAS_SECRET") {
            self.backend.secret = Some(secret);
        }
        if let Some(transport) = get("GAS_SECRET_TRANSPORT") {
            self.backend.secret_transport = transport.parse()?;
        }
        if let Some(token) = get("BOT_TOKEN").or_else(|| get("TELEGRAM_TOKEN")) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(admin) = get("ADMIN_ID") {
            self.telegram.admin_id = Some(
                admin
                    .parse()
                    .with_context(|| format!("ADMIN_ID is not a chat id: {admin}"))?,
            );
        }
        if let Some(mode) = get("WEBHOOK_MODE") {
            self.webhook.mode = mode.parse()?;
        }
        if let Some(port) = get("PORT") {
            let port: u16 = port
                .parse()
                .with_context(|| format!("PORT is not a port number: {port}"))?;
            self.server.listen = format!("0.0.0.0:{port}");
        }

        self.backend.secret = non_empty(self.backend.secret.take());
        self.telegram.bot_token = non_empty(self.telegram.bot_token.take());
        Ok(())
    }

    /// The configured backend pool, or `None` when no URL is set.
    pub fn backend_pool(&self) -> Result<Option<BackendPool>> {
        BackendPool::parse(&self.backend.urls)
    }

    pub fn bot_token(&self) -> Option<&str> {
        self.telegram.bot_token.as_deref()
    }

    pub fn is_admin(&self, chat_id: i64) -> bool {
        self.telegram.admin_id == Some(chat_id)
    }
}

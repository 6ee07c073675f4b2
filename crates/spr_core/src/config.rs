//! Environment-style configuration for storage tiers and collaborators.
//!
//! # Responsibility
//! - Read `SPR_*` keys into typed settings with defaults.
//! - Keep credential checks scoped to the AI provider actually selected.
//!
//! # Invariants
//! - A malformed number is an error; an absent one takes its default.
//! - Missing AI credentials never fail loading, only `require_credentials`.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_TABLE_NAME: &str = "blocks_sync";
pub const DEFAULT_ATTACHMENT_FIELD: &str = "Attachment";
pub const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_SCROLL_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SILICONFLOW_BASE_URL: &str = "https://api.siliconflow.cn/v1";
const DEFAULT_SILICONFLOW_MODEL: &str = "deepseek-ai/DeepSeek-V3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    MissingCredential {
        provider: AiProvider,
        key: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
            Self::MissingCredential { provider, key } => {
                write!(f, "{key} must be set to use the {} provider", provider.as_str())
            }
        }
    }
}

impl Error for ConfigError {}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Redis-over-REST fast cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastCacheConfig {
    pub rest_url: String,
    pub password: String,
    pub enabled: bool,
}

/// Row-store settings for the durable tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurableStoreConfig {
    pub url: String,
    pub api_key: String,
    pub table_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AiProvider {
    #[default]
    SiliconFlow,
    Gemini,
}

impl AiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SiliconFlow => "siliconflow",
            Self::Gemini => "gemini",
        }
    }

    fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "siliconflow" => Ok(Self::SiliconFlow),
            "gemini" => Ok(Self::Gemini),
            other => Err(ConfigError::InvalidValue {
                key: "SPR_AI_PROVIDER",
                value: other.to_string(),
                reason: "expected siliconflow|gemini".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiProviderConfig {
    pub provider: AiProvider,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub siliconflow_api_key: String,
    pub siliconflow_base_url: String,
    pub siliconflow_model: String,
}

impl AiProviderConfig {
    /// Fails when the selected provider has no API key.
    pub fn require_credentials(&self) -> ConfigResult<()> {
        let (key, value) = match self.provider {
            AiProvider::Gemini => ("SPR_GEMINI_API_KEY", &self.gemini_api_key),
            AiProvider::SiliconFlow => ("SPR_SILICONFLOW_API_KEY", &self.siliconflow_api_key),
        };
        if value.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                provider: self.provider,
                key,
            });
        }
        Ok(())
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SprConfig {
    pub fast_cache: FastCacheConfig,
    pub durable: DurableStoreConfig,
    pub attachment_field: String,
    pub ai: AiProviderConfig,
    pub sync_debounce: Duration,
    pub scroll_debounce: Duration,
    pub http_timeout: Duration,
    pub log_level: Option<String>,
}

impl Default for SprConfig {
    fn default() -> Self {
        Self {
            fast_cache: FastCacheConfig::default(),
            durable: DurableStoreConfig {
                url: String::new(),
                api_key: String::new(),
                table_name: DEFAULT_TABLE_NAME.to_string(),
            },
            attachment_field: DEFAULT_ATTACHMENT_FIELD.to_string(),
            ai: AiProviderConfig {
                provider: AiProvider::default(),
                gemini_api_key: String::new(),
                gemini_base_url: String::new(),
                siliconflow_api_key: String::new(),
                siliconflow_base_url: DEFAULT_SILICONFLOW_BASE_URL.to_string(),
                siliconflow_model: DEFAULT_SILICONFLOW_MODEL.to_string(),
            },
            sync_debounce: Duration::from_millis(DEFAULT_SYNC_DEBOUNCE_MS),
            scroll_debounce: Duration::from_millis(DEFAULT_SCROLL_DEBOUNCE_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            log_level: None,
        }
    }
}

impl SprConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get("SPR_REDIS_REST_URL") {
            config.fast_cache.rest_url = url;
        }
        if let Some(password) = get("SPR_REDIS_PASSWORD") {
            config.fast_cache.password = password;
        }
        config.fast_cache.enabled = get("SPR_ENABLE_REDIS")
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        if let Some(url) = get("SPR_SUPABASE_URL") {
            config.durable.url = url;
        }
        if let Some(api_key) = get("SPR_SUPABASE_API_KEY") {
            config.durable.api_key = api_key;
        }
        if let Some(table) = get("SPR_SUPABASE_TABLE_NAME") {
            config.durable.table_name = table;
        }
        if let Some(field) = get("SPR_ATTACHMENT_FIELD_NAME") {
            config.attachment_field = field;
        }

        if let Some(provider) = get("SPR_AI_PROVIDER") {
            config.ai.provider = AiProvider::parse(&provider)?;
        }
        if let Some(key) = get("SPR_GEMINI_API_KEY") {
            config.ai.gemini_api_key = key;
        }
        if let Some(url) = get("SPR_GEMINI_BASE_URL") {
            config.ai.gemini_base_url = url;
        }
        if let Some(key) = get("SPR_SILICONFLOW_API_KEY") {
            config.ai.siliconflow_api_key = key;
        }
        if let Some(url) = get("SPR_SILICONFLOW_BASE_URL") {
            config.ai.siliconflow_base_url = url;
        }
        if let Some(model) = get("SPR_SILICONFLOW_MODEL") {
            config.ai.siliconflow_model = model;
        }

        if let Some(value) = get("SPR_SYNC_DEBOUNCE_MS") {
            config.sync_debounce = Duration::from_millis(parse_number("SPR_SYNC_DEBOUNCE_MS", &value)?);
        }
        if let Some(value) = get("SPR_SCROLL_DEBOUNCE_MS") {
            config.scroll_debounce =
                Duration::from_millis(parse_number("SPR_SCROLL_DEBOUNCE_MS", &value)?);
        }
        if let Some(value) = get("SPR_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(parse_number("SPR_HTTP_TIMEOUT_SECS", &value)?);
        }
        config.log_level = get("SPR_LOG_LEVEL");

        Ok(config)
    }

    /// Whether the durable tier has an endpoint to talk to.
    pub fn durable_configured(&self) -> bool {
        !self.durable.url.is_empty() && !self.durable.api_key.is_empty()
    }
}

fn parse_number(key: &'static str, value: &str) -> ConfigResult<u64> {
    value.parse::<u64>().map_err(|err| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

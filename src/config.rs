use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    BIRDEYE_LIQUIDITY_URL, BIRDEYE_TOKENLIST_URL, DEFAULT_KEYWORD, HELIUS_RPC_URL,
    METEORA_POOLS_URL, RAYDIUM_TX_URL, TELEGRAM_API_BASE, TWITTER_SEARCH_URL,
};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
///
/// Every table is optional; a missing file yields [`AppConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default = "PollerConfig::token_list")]
    pub token_list: PollerConfig,
    #[serde(default = "PollerConfig::raydium")]
    pub raydium: PollerConfig,
    #[serde(default = "PollerConfig::meteora")]
    pub meteora: PollerConfig,
    #[serde(default = "PollerConfig::mentions")]
    pub mentions: PollerConfig,
    #[serde(default = "PollerConfig::subscriptions")]
    pub subscriptions: PollerConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Keyword matched case-insensitively against every source.
    #[serde(default = "default_keyword")]
    pub keyword: String,
    /// JSON file holding the subscriber chat ids.
    #[serde(default = "default_subscribers_path")]
    pub subscribers_path: String,
    /// Timeout applied to every outgoing HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum identifiers remembered per poller.
    #[serde(default = "default_seen_capacity")]
    pub seen_capacity: usize,
    /// Search query sent to the mention source. Derived from `keyword` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_query: Option<String>,
    #[serde(default = "default_mention_max_results")]
    pub mention_max_results: u32,
}

fn default_keyword() -> String {
    DEFAULT_KEYWORD.to_string()
}

fn default_subscribers_path() -> String {
    "subscribers.json".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_seen_capacity() -> usize {
    10_000
}

fn default_mention_max_results() -> u32 {
    10
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            keyword: default_keyword(),
            subscribers_path: default_subscribers_path(),
            request_timeout_secs: default_request_timeout(),
            seen_capacity: default_seen_capacity(),
            mention_query: None,
            mention_max_results: default_mention_max_results(),
        }
    }
}

impl SettingsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured query, or `KEYWORD OR $KEYWORD lang:en`.
    pub fn mention_query(&self) -> String {
        match &self.mention_query {
            Some(query) if !query.trim().is_empty() => query.clone(),
            _ => {
                let keyword = self.keyword.to_uppercase();
                format!("{keyword} OR ${keyword} lang:en")
            }
        }
    }
}

/// External endpoints. Overridable so a staging proxy can be used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub token_list: String,
    pub liquidity: String,
    pub rpc: String,
    pub transactions: String,
    pub pools: String,
    pub search: String,
    pub telegram: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            token_list: BIRDEYE_TOKENLIST_URL.to_string(),
            liquidity: BIRDEYE_LIQUIDITY_URL.to_string(),
            rpc: HELIUS_RPC_URL.to_string(),
            transactions: RAYDIUM_TX_URL.to_string(),
            pools: METEORA_POOLS_URL.to_string(),
            search: TWITTER_SEARCH_URL.to_string(),
            telegram: TELEGRAM_API_BASE.to_string(),
        }
    }
}

/// Cadence of a single poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Sleep between successful cycles, in seconds.
    pub interval_secs: u64,
    /// Sleep after a failed cycle, in seconds.
    pub backoff_secs: u64,
}

impl PollerConfig {
    fn token_list() -> Self {
        Self { interval_secs: 60, backoff_secs: 30 }
    }

    fn raydium() -> Self {
        Self { interval_secs: 30, backoff_secs: 30 }
    }

    fn meteora() -> Self {
        Self { interval_secs: 60, backoff_secs: 30 }
    }

    fn mentions() -> Self {
        Self { interval_secs: 120, backoff_secs: 60 }
    }

    fn subscriptions() -> Self {
        Self { interval_secs: 1, backoff_secs: 5 }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: SettingsConfig::default(),
            endpoints: EndpointsConfig::default(),
            token_list: PollerConfig::token_list(),
            raydium: PollerConfig::raydium(),
            meteora: PollerConfig::meteora(),
            mentions: PollerConfig::mentions(),
            subscriptions: PollerConfig::subscriptions(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Secrets and destinations read from the environment.
///
/// Empty values are treated as unset.
#[derive(Clone, Default)]
pub struct Credentials {
    pub bot_token: Option<String>,
    pub admin_chat_id: Option<i64>,
    pub birdeye_api_key: Option<String>,
    pub helius_api_key: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub authority: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Credentials")
            .field("bot_token", &redact(&self.bot_token))
            .field("admin_chat_id", &self.admin_chat_id)
            .field("birdeye_api_key", &redact(&self.birdeye_api_key))
            .field("helius_api_key", &redact(&self.helius_api_key))
            .field("twitter_bearer_token", &redact(&self.twitter_bearer_token))
            .field("authority", &self.authority)
            .finish()
    }
}

impl Credentials {
    pub const BOT_TOKEN: &'static str = "TELEGRAM_BOT_TOKEN";
    pub const ADMIN_CHAT_ID: &'static str = "TELEGRAM_CHAT_ID";
    pub const BIRDEYE_API_KEY: &'static str = "BIRDEYE_API_KEY";
    pub const HELIUS_API_KEY: &'static str = "HELIUS_API_KEY";
    pub const TWITTER_BEARER_TOKEN: &'static str = "TWITTER_BEARER_TOKEN";
    pub const AUTHORITY: &'static str = "WLFI_AUTHORITY";

    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup, e.g. a map in tests.
    ///
    /// An admin chat id that does not parse as an integer is dropped.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            bot_token: get(Self::BOT_TOKEN),
            admin_chat_id: get(Self::ADMIN_CHAT_ID).and_then(|v| v.parse().ok()),
            birdeye_api_key: get(Self::BIRDEYE_API_KEY),
            helius_api_key: get(Self::HELIUS_API_KEY),
            twitter_bearer_token: get(Self::TWITTER_BEARER_TOKEN),
            authority: get(Self::AUTHORITY),
        }
    }

    /// Names of the variables that are not set, in declaration order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bot_token.is_none() {
            missing.push(Self::BOT_TOKEN);
        }
        if self.admin_chat_id.is_none() {
            missing.push(Self::ADMIN_CHAT_ID);
        }
        if self.birdeye_api_key.is_none() {
            missing.push(Self::BIRDEYE_API_KEY);
        }
        if self.helius_api_key.is_none() {
            missing.push(Self::HELIUS_API_KEY);
        }
        if self.twitter_bearer_token.is_none() {
            missing.push(Self::TWITTER_BEARER_TOKEN);
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.settings.keyword, "wlfi");
        assert_eq!(config.settings.request_timeout_secs, 10);
        assert_eq!(config.raydium.interval_secs, 30);
        assert_eq!(config.mentions.interval_secs, 120);
        assert_eq!(config.subscriptions.backoff_secs, 5);
        assert_eq!(config.endpoints.pools, METEORA_POOLS_URL);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [settings]
            keyword = "trump"

            [endpoints]
            pools = "http://localhost:9000/pools"

            [meteora]
            interval_secs = 5
            backoff_secs = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.settings.keyword, "trump");
        assert_eq!(config.settings.seen_capacity, 10_000);
        assert_eq!(config.endpoints.pools, "http://localhost:9000/pools");
        assert_eq!(config.endpoints.search, TWITTER_SEARCH_URL);
        assert_eq!(config.meteora.interval(), Duration::from_secs(5));
        assert_eq!(config.meteora.backoff(), Duration::from_secs(2));
        assert_eq!(config.token_list.interval_secs, 60);
    }

    #[test]
    fn example_config_parses() {
        let config: AppConfig = toml::from_str(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.settings.mention_max_results, 10);
        assert_eq!(config.subscriptions.interval_secs, 1);
        assert_eq!(config.endpoints.pools, METEORA_POOLS_URL);
    }

    #[test]
    fn mention_query_follows_keyword() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.settings.mention_query(), "WLFI OR $WLFI lang:en");

        let config: AppConfig = toml::from_str("[settings]\nkeyword = \"trump\"").unwrap();
        assert_eq!(config.settings.mention_query(), "TRUMP OR $TRUMP lang:en");

        let config: AppConfig = toml::from_str(
            "[settings]\nkeyword = \"trump\"\nmention_query = \"#WLFI\"",
        )
        .unwrap();
        assert_eq!(config.settings.mention_query(), "#WLFI");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_or_default(Path::new("/nonexistent/wlfi.toml")).unwrap();
        assert_eq!(config.settings.subscribers_path, "subscribers.json");
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[settings\nkeyword = ").unwrap();
        assert!(AppConfig::load_or_default(&path).is_err());
    }

    #[test]
    fn credentials_treat_blank_as_unset() {
        let creds = Credentials::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", " 333 "),
            ("BIRDEYE_API_KEY", ""),
            ("WLFI_AUTHORITY", "Auth123"),
        ]));
        assert_eq!(creds.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(creds.admin_chat_id, Some(333));
        assert!(creds.birdeye_api_key.is_none());
        assert_eq!(creds.authority.as_deref(), Some("Auth123"));
        assert_eq!(
            creds.missing(),
            vec!["BIRDEYE_API_KEY", "HELIUS_API_KEY", "TWITTER_BEARER_TOKEN"]
        );
    }

    #[test]
    fn unparsable_admin_chat_id_is_dropped() {
        let creds = Credentials::from_lookup(lookup(&[("TELEGRAM_CHAT_ID", "@channel")]));
        assert!(creds.admin_chat_id.is_none());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "secret-token")]));
        let shown = format!("{creds:?}");
        assert!(!shown.contains("secret-token"));
        assert!(shown.contains("<set>"));
    }
}

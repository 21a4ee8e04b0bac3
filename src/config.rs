//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feature::FeatureKind;
use crate::ledger::MAX_DECIMALS;
use crate::strategy::StrategyKind;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default = "default_tokens")]
    pub tokens: Vec<TokenConfig>,
    #[serde(default = "default_features")]
    pub features: Vec<FeatureConfig>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_name")]
    pub name: String,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    #[serde(default = "default_decimals")]
    pub native_decimals: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network_name(),
            native_symbol: default_native_symbol(),
            native_decimals: default_decimals(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Address of the signing identity operated by the gateway
    #[serde(default = "default_wallet_address")]
    pub address: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            address: default_wallet_address(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_gateway_api_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Window for transport-level retries of a single gateway request
    #[serde(default = "default_transport_retry_ms")]
    pub transport_retry_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            api_key: default_gateway_api_key(),
            timeout_ms: default_timeout_ms(),
            transport_retry_ms: default_transport_retry_ms(),
        }
    }
}

/// Randomized cooldown window between cycles
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct CooldownConfig {
    #[serde(default = "default_min_hours")]
    pub min_hours: u64,
    #[serde(default = "default_max_hours")]
    pub max_hours: u64,
    #[serde(default)]
    pub min_minutes: u64,
    #[serde(default = "default_max_minutes")]
    pub max_minutes: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            min_hours: default_min_hours(),
            max_hours: default_max_hours(),
            min_minutes: 0,
            max_minutes: default_max_minutes(),
        }
    }
}

/// Process-wide retry defaults
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bot_token")]
    pub bot_token: String,
    #[serde(default = "default_chat_id")]
    pub chat_id: String,
    /// Forum topic to post into, if any
    #[serde(default = "default_thread_id")]
    pub thread_id: Option<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: default_telegram_enabled(),
            bot_token: default_bot_token(),
            chat_id: default_chat_id(),
            thread_id: default_thread_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    /// Pause before resuming after a fault escaped a whole cycle
    #[serde(default = "default_critical_backoff_secs")]
    pub critical_backoff_secs: u64,
    /// Minimum wall-clock time between periodic reports
    #[serde(default = "default_report_interval_hours")]
    pub report_interval_hours: u64,
    /// Pause between repetitions inside one multi-repetition feature
    #[serde(default = "default_repetition_pause_secs")]
    pub repetition_pause_secs: u64,
    /// Seed for pair/amount/cooldown sampling (entropy when unset)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            critical_backoff_secs: default_critical_backoff_secs(),
            report_interval_hours: default_report_interval_hours(),
            repetition_pause_secs: default_repetition_pause_secs(),
            seed: None,
        }
    }
}

impl AutomationConfig {
    pub fn critical_backoff(&self) -> Duration {
        Duration::from_secs(self.critical_backoff_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_hours * 3600)
    }

    pub fn repetition_pause(&self) -> Duration {
        Duration::from_secs(self.repetition_pause_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Minimum native balance required before uploading
    #[serde(default = "default_upload_min_balance")]
    pub min_balance: f64,
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
    #[serde(default = "default_min_kb")]
    pub min_kb: u64,
    #[serde(default = "default_max_kb")]
    pub max_kb: u64,
    /// Directory for generated artifacts (system temp dir when unset)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            min_balance: default_upload_min_balance(),
            file_extensions: default_file_extensions(),
            min_kb: default_min_kb(),
            max_kb: default_max_kb(),
            work_dir: None,
        }
    }
}

impl UploadConfig {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Registry entry for a tradable token
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

/// One configured feature in cycle order
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeatureConfig {
    pub kind: String,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    #[serde(default)]
    pub min_amount: Option<f64>,
    #[serde(default)]
    pub max_amount: Option<f64>,
}

impl FeatureConfig {
    fn upload() -> Self {
        Self {
            kind: "upload".into(),
            strategy: None,
            repetitions: 1,
            min_amount: None,
            max_amount: None,
        }
    }

    fn dex(kind: &str, strategy: &str, repetitions: u32) -> Self {
        Self {
            kind: kind.into(),
            strategy: Some(strategy.into()),
            repetitions,
            min_amount: None,
            max_amount: None,
        }
    }
}

/// Starting balances for the in-memory ledger used in dry-run mode
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_sim_native_balance")]
    pub native_balance: f64,
    #[serde(default = "default_sim_token_balance")]
    pub token_balance: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            native_balance: default_sim_native_balance(),
            token_balance: default_sim_token_balance(),
        }
    }
}

// Default value functions
fn default_network_name() -> String {
    "0G Testnet".to_string()
}

fn default_native_symbol() -> String {
    "0G".to_string()
}

fn default_decimals() -> u8 {
    18
}

fn default_wallet_address() -> String {
    std::env::var("WALLET_ADDRESS").unwrap_or_default()
}

fn default_gateway_url() -> String {
    std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".into())
}

fn default_gateway_api_key() -> String {
    std::env::var("GATEWAY_API_KEY").unwrap_or_default()
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_transport_retry_ms() -> u64 {
    2000
}

fn default_min_hours() -> u64 {
    10
}

fn default_max_hours() -> u64 {
    16
}

fn default_max_minutes() -> u64 {
    59
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_telegram_enabled() -> bool {
    std::env::var("TELEGRAM_ENABLED")
        .map(|v| v == "true")
        .unwrap_or(false)
}

fn default_bot_token() -> String {
    std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default()
}

fn default_chat_id() -> String {
    std::env::var("TELEGRAM_CHAT_ID").unwrap_or_default()
}

fn default_thread_id() -> Option<i64> {
    std::env::var("TELEGRAM_THREAD_ID")
        .ok()
        .and_then(|v| v.parse().ok())
}

fn default_log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into())
}

fn default_critical_backoff_secs() -> u64 {
    300
}

fn default_report_interval_hours() -> u64 {
    24
}

fn default_repetition_pause_secs() -> u64 {
    10
}

fn default_upload_min_balance() -> f64 {
    0.001
}

fn default_file_extensions() -> Vec<String> {
    [".txt", ".json", ".csv", ".bin", ".md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_kb() -> u64 {
    10
}

fn default_max_kb() -> u64 {
    1024
}

fn default_repetitions() -> u32 {
    1
}

fn default_sim_native_balance() -> f64 {
    10.0
}

fn default_sim_token_balance() -> f64 {
    1000.0
}

fn default_tokens() -> Vec<TokenConfig> {
    vec![
        TokenConfig {
            symbol: "USDT".into(),
            address: "0x3eC8A8705bE1D5ca90066b37ba62c4183B024ebf".into(),
            decimals: 18,
        },
        TokenConfig {
            symbol: "ETH".into(),
            address: "0x0fE9B43625fA7EdD663aDcEC0728DD635e4AbF7c".into(),
            decimals: 18,
        },
        TokenConfig {
            symbol: "BTC".into(),
            address: "0x36f6414FF1df609214dDAbA71c84f18bcf00F67d".into(),
            decimals: 18,
        },
    ]
}

fn default_features() -> Vec<FeatureConfig> {
    vec![
        FeatureConfig::upload(),
        FeatureConfig::dex("swap", "jaine", 3),
        FeatureConfig::dex("liquidity", "jaine", 3),
        FeatureConfig::dex("swap", "zer0", 2),
    ]
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("gateway.url", default_gateway_url())?
            .set_default("gateway.timeout_ms", default_timeout_ms() as i64)?
            .set_default("retry.max_retries", default_max_retries() as i64)?
            .set_default("retry.retry_delay_ms", default_retry_delay_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix AUTOMATION_)
            .add_source(
                config::Environment::with_prefix("AUTOMATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let cd = &self.cooldown;
        if cd.min_hours > cd.max_hours {
            anyhow::bail!(
                "cooldown.min_hours ({}) cannot exceed cooldown.max_hours ({})",
                cd.min_hours,
                cd.max_hours
            );
        }
        if cd.min_minutes > cd.max_minutes {
            anyhow::bail!(
                "cooldown.min_minutes ({}) cannot exceed cooldown.max_minutes ({})",
                cd.min_minutes,
                cd.max_minutes
            );
        }
        if cd.max_minutes > 59 {
            anyhow::bail!("cooldown.max_minutes cannot exceed 59");
        }

        if self.retry.max_retries == 0 {
            anyhow::bail!("retry.max_retries must be at least 1");
        }
        if self.retry.backoff_multiplier < 1.0 {
            anyhow::bail!("retry.backoff_multiplier must be >= 1.0");
        }

        // Validate token registry
        if self.tokens.len() < 2 {
            anyhow::bail!("At least 2 tokens are required to form a pair");
        }
        let mut seen = HashSet::new();
        for token in &self.tokens {
            if !is_hex_address(&token.address) {
                anyhow::bail!("Invalid token address for {}: {}", token.symbol, token.address);
            }
            if !seen.insert(token.address.to_lowercase()) {
                anyhow::bail!("Duplicate token address: {}", token.address);
            }
            if token.decimals > MAX_DECIMALS {
                anyhow::bail!(
                    "Token {} decimals ({}) cannot exceed {}",
                    token.symbol,
                    token.decimals,
                    MAX_DECIMALS
                );
            }
        }

        // Validate upload settings
        if self.upload.min_kb == 0 || self.upload.min_kb > self.upload.max_kb {
            anyhow::bail!("upload size range must satisfy 0 < min_kb <= max_kb");
        }
        if self.upload.file_extensions.is_empty() {
            anyhow::bail!("upload.file_extensions cannot be empty");
        }

        // Validate features
        for feature in &self.features {
            let kind: FeatureKind = feature
                .kind
                .parse()
                .with_context(|| format!("Invalid feature entry: {:?}", feature))?;
            if kind.is_dex() {
                let strategy = feature
                    .strategy
                    .as_deref()
                    .with_context(|| format!("Feature '{}' requires a strategy", feature.kind))?;
                strategy
                    .parse::<StrategyKind>()
                    .with_context(|| format!("Invalid strategy for feature '{}'", feature.kind))?;
            }
            if feature.repetitions == 0 {
                anyhow::bail!("Feature '{}' repetitions must be at least 1", feature.kind);
            }
            if let Some((default_min, default_max)) = kind.default_amount_range() {
                let min = feature.min_amount.unwrap_or(default_min);
                let max = feature.max_amount.unwrap_or(default_max);
                if min <= 0.0 || min > max {
                    anyhow::bail!(
                        "Feature '{}' amount range must satisfy 0 < min <= max (got {} to {})",
                        feature.kind,
                        min,
                        max
                    );
                }
            }
        }

        url::Url::parse(&self.gateway.url)
            .with_context(|| format!("Invalid gateway.url: {}", self.gateway.url))?;

        if self.telegram.enabled
            && (self.telegram.bot_token.is_empty() || self.telegram.chat_id.is_empty())
        {
            tracing::warn!("Telegram enabled but bot_token/chat_id missing - notifications will be skipped");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let features: Vec<String> = self
            .features
            .iter()
            .map(|f| match &f.strategy {
                Some(s) => format!("{} ({}, {}x)", f.kind, s, f.repetitions),
                None => f.kind.clone(),
            })
            .collect();
        let tokens: Vec<&str> = self.tokens.iter().map(|t| t.symbol.as_str()).collect();

        format!(
            r#"Configuration:
  Network:
    name: {}
    native_symbol: {}
  Wallet:
    address: {}
  Gateway:
    url: {}
    api_key: {}
    timeout: {}ms
  Cooldown:
    hours: {}-{}
    minutes: {}-{}
  Retry:
    max_retries: {}
    delay: {}ms x{}
  Telegram:
    enabled: {}
    bot_token: {}
    chat_id: {}
  Automation:
    critical_backoff: {}s
    report_interval: {}h
    repetition_pause: {}s
  Tokens: {:?}
  Features: {:?}
"#,
            self.network.name,
            self.network.native_symbol,
            self.wallet.address,
            mask_url(&self.gateway.url),
            mask_secret(&self.gateway.api_key),
            self.gateway.timeout_ms,
            self.cooldown.min_hours,
            self.cooldown.max_hours,
            self.cooldown.min_minutes,
            self.cooldown.max_minutes,
            self.retry.max_retries,
            self.retry.retry_delay_ms,
            self.retry.backoff_multiplier,
            self.telegram.enabled,
            mask_secret(&self.telegram.bot_token),
            self.telegram.chat_id,
            self.automation.critical_backoff_secs,
            self.automation.report_interval_hours,
            self.automation.repetition_pause_secs,
            tokens,
            features,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

fn mask_secret(secret: &str) -> &'static str {
    if secret.is_empty() {
        "(not set)"
    } else {
        "***"
    }
}

fn is_hex_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            wallet: WalletConfig::default(),
            gateway: GatewayConfig::default(),
            cooldown: CooldownConfig::default(),
            retry: RetryConfig::default(),
            telegram: TelegramConfig::default(),
            logging: LoggingConfig::default(),
            automation: AutomationConfig::default(),
            upload: UploadConfig::default(),
            tokens: default_tokens(),
            features: default_features(),
            simulation: SimulationConfig::default(),
        }
    }
}

//! Application configuration loaded from TOML.
//!
//! Every section has defaults so a missing file section (or a missing file,
//! via [`AppConfig::default`]) still yields a usable configuration.

use anyhow::Result;
use anyhow::anyhow;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub erasure: ErasureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }

/// Fare constants. Money is kept in `Decimal` so half-up rounding is exact.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PricingConfig {
    /// Below this distance the flat minimum fare applies.
    pub min_fare_threshold_km: Decimal,
    pub min_fare: Decimal,
    pub per_km_rate: Decimal,
    /// Decimal places kept when rounding prices.
    pub round_to: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_fare_threshold_km: Decimal::new(10, 0),
            min_fare: Decimal::new(25, 1),
            per_km_rate: Decimal::new(14, 2),
            round_to: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RoutingConfig {
    /// Base URL of an OSRM-compatible directions service.
    pub base_url: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Two rides whose endpoints are both within this distance share route data.
    #[serde(default = "default_reuse_tolerance")]
    pub reuse_tolerance_m: f64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_profile() -> String { "driving".into() }
fn default_request_timeout() -> u64 { 10 }
fn default_reuse_tolerance() -> f64 { 500.0 }
fn default_cache_capacity() -> u64 { 10_000 }
fn default_cache_ttl() -> u64 { 24 * 3600 }

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".into(),
            profile: default_profile(),
            request_timeout_secs: default_request_timeout(),
            reuse_tolerance_m: default_reuse_tolerance(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Identity of the placeholder account that erased rows are re-owned by.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ErasureConfig {
    pub sentinel_email: String,
    pub sentinel_first_name: String,
    pub sentinel_last_name: String,
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            sentinel_email: "erased-user@rideshare.invalid".into(),
            sentinel_first_name: "Deleted".into(),
            sentinel_last_name: "User".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub filter: Option<String>,
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.database.normalize_from_env();
        self.database.validate()?;
        self.pricing.validate()?;
        self.routing.validate()?;
        self.erasure.normalize_and_validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    /// Fill the URL from `DATABASE_URL` when the file leaves it empty.
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn from_env() -> Self {
        let mut cfg = Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            ..Self::default()
        };
        cfg.normalize_from_env();
        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_fare_threshold_km.is_sign_negative() {
            return Err(anyhow!("pricing.min_fare_threshold_km must be >= 0"));
        }
        if self.min_fare.is_sign_negative() || self.per_km_rate.is_sign_negative() {
            return Err(anyhow!("pricing rates must be >= 0"));
        }
        if self.round_to > 8 {
            return Err(anyhow!("pricing.round_to must be <= 8"));
        }
        Ok(())
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<()> {
        let lower = self.base_url.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("routing.base_url must start with http(s)"));
        }
        if !(self.reuse_tolerance_m > 0.0) {
            return Err(anyhow!("routing.reuse_tolerance_m must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("routing.request_timeout_secs must be > 0"));
        }
        Ok(())
    }
}

impl ErasureConfig {
    fn normalize_and_validate(&mut self) -> Result<()> {
        self.sentinel_email = self.sentinel_email.trim().to_lowercase();
        if !self.sentinel_email.contains('@') {
            return Err(anyhow!("erasure.sentinel_email must be an email address"));
        }
        Ok(())
    }
}

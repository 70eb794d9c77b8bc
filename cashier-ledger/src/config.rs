//! Configuration for the cashier ledger

use chrono::{FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Store access
    pub store: StoreConfig,

    /// Withdrawal authorization
    pub withdrawals: WithdrawalConfig,

    /// Ticket code generation
    pub codes: CodeConfig,

    /// CSV export and dashboard
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "cashier-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            store: StoreConfig::default(),
            withdrawals: WithdrawalConfig::default(),
            codes: CodeConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// JSON snapshot loaded into the in-memory store at startup
    pub seed_file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            seed_file: None,
        }
    }
}

impl StoreConfig {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// How the balance check and the withdrawal insert relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalPolicy {
    /// Check and insert are independent requests. Concurrent withdrawals for
    /// one client may both pass the check.
    Advisory,
    /// Check and insert run under a per-client lock
    Serialized,
}

impl std::str::FromStr for WithdrawalPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "advisory" => Ok(WithdrawalPolicy::Advisory),
            "serialized" => Ok(WithdrawalPolicy::Serialized),
            other => Err(crate::Error::Config(format!(
                "Unknown withdrawal policy: {}",
                other
            ))),
        }
    }
}

/// Withdrawal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WithdrawalConfig {
    /// Authorization policy
    pub policy: WithdrawalPolicy,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            policy: WithdrawalPolicy::Serialized,
        }
    }
}

/// Ticket code configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Insert attempts before a code collision is reported
    pub max_attempts: u32,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Offset of the cashier's local day from UTC. Host offset when unset.
    pub utc_offset_minutes: Option<i32>,

    /// Rendered when a client name cannot be resolved
    pub unknown_client_label: String,

    /// Rendered when a creator cannot be resolved or is absent
    pub system_user_label: String,

    /// Days of activity on the dashboard
    pub activity_days: u32,

    /// Recent tickets on the dashboard
    pub recent_tickets: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: None,
            unknown_client_label: "Unknown client".to_string(),
            system_user_label: "System".to_string(),
            activity_days: 7,
            recent_tickets: 5,
        }
    }
}

impl ReportConfig {
    /// Offset used to cut calendar days
    pub fn offset(&self) -> crate::Result<FixedOffset> {
        match self.utc_offset_minutes {
            Some(minutes) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| {
                    crate::Error::Config(format!("UTC offset out of range: {} minutes", minutes))
                }),
            None => Ok(Utc::now().with_timezone(&Local).offset().fix()),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(timeout) = std::env::var("CASHIER_STORE_TIMEOUT_MS") {
            config.store.request_timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid CASHIER_STORE_TIMEOUT_MS: {}", e))
            })?;
        }

        if let Ok(policy) = std::env::var("CASHIER_WITHDRAWAL_POLICY") {
            config.withdrawals.policy = policy.parse()?;
        }

        if let Ok(offset) = std::env::var("CASHIER_UTC_OFFSET_MINUTES") {
            config.report.utc_offset_minutes = Some(offset.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid CASHIER_UTC_OFFSET_MINUTES: {}", e))
            })?);
        }

        if let Ok(seed) = std::env::var("CASHIER_SEED_FILE") {
            config.store.seed_file = Some(PathBuf::from(seed));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.store.request_timeout_ms == 0 {
            return Err(crate::Error::Config(
                "store.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.codes.max_attempts == 0 {
            return Err(crate::Error::Config(
                "codes.max_attempts must be positive".to_string(),
            ));
        }
        self.report.offset()?;
        Ok(())
    }
}

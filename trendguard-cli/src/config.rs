//! `trendguard.toml` configuration.
//!
//! Every section is optional and every field falls back to its default, so a
//! file only needs the values it overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trendguard_core::signals::SignalConfigError;
use trendguard_core::TrendSignalConfig;
use trendguard_live::risk::RiskConfigError;
use trendguard_live::{RiskConfig, ScanConfig, ScanConfigError};
use trendguard_runner::{BacktestSettings, WalkForwardConfig, WalkForwardError};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "trendguard.toml";

/// Paper-trading run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub starting_equity: f64,
    /// Candles of history visible at the first scan.
    pub warmup_candles: usize,
    /// Length of each synthetic series when no CSV is given.
    pub synthetic_candles: usize,
    pub seed: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_equity: 10_000.0,
            warmup_candles: 100,
            synthetic_candles: 1_000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendguardConfig {
    pub signal: TrendSignalConfig,
    pub backtest: BacktestSettings,
    pub walk_forward: WalkForwardConfig,
    pub risk: RiskConfig,
    pub scan: ScanConfig,
    pub paper: PaperConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("[signal] {0}")]
    Signal(#[from] SignalConfigError),
    #[error("[walk_forward] {0}")]
    WalkForward(#[from] WalkForwardError),
    #[error("[risk] {0}")]
    Risk(#[from] RiskConfigError),
    #[error("[{section}] {field} must be positive, got {value}")]
    NotPositive {
        section: &'static str,
        field: &'static str,
        value: f64,
    },
    #[error("[scan] {0}")]
    Scan(#[from] ScanConfigError),
}

impl TrendguardConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// An explicit path must exist. Without one, `trendguard.toml` in the
    /// working directory is used if present, otherwise all defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signal.validate()?;
        self.walk_forward.validate()?;
        self.risk.validate()?;
        for (section, field, value) in [
            ("backtest", "initial_balance", self.backtest.initial_balance),
            ("paper", "starting_equity", self.paper.starting_equity),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NotPositive {
                    section,
                    field,
                    value,
                });
            }
        }
        self.scan.validate()?;
        Ok(())
    }
}

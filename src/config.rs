//! Configuration management for tiergate
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.tiergate/config.toml
//!
//! ```toml
//! [tiers.simple]
//! max_cost = 1.5
//! steps = ["plan", "frontend"]
//!
//! [costs.simple.plan]
//! cost = 0.05
//! messages = 1
//!
//! [history]
//! dir = "/var/lib/tiergate/history"
//! max_reports = 500
//! ```

use crate::assessment::{ComplexityTier, PipelineStep, ResourceEnvelope, TierTable};
use crate::budget::{FixedCostTable, StepCost};
use crate::errors::{Result, TierGateError};
use crate::history::HistoryConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tiers: TiersConfig,

    /// Step charges keyed by tier label, then step id
    #[serde(default)]
    pub costs: BTreeMap<String, BTreeMap<String, StepCost>>,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// Per-tier envelope overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiersConfig {
    pub simple: TierConfig,
    pub medium: TierConfig,
    pub complex: TierConfig,
}

/// Overrides for one tier. Unset fields keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<PipelineStep>>,
}

impl TierConfig {
    /// Apply overrides on top of the built-in envelope for `tier`
    pub fn envelope(&self, tier: ComplexityTier) -> ResourceEnvelope {
        let mut envelope = ResourceEnvelope::default_for(tier);
        if let Some(max_messages) = self.max_messages {
            envelope.max_messages = max_messages;
        }
        if let Some(max_cost) = self.max_cost {
            envelope.max_cost = max_cost;
        }
        if let Some(max_duration_secs) = self.max_duration_secs {
            envelope.max_duration_secs = max_duration_secs;
        }
        if let Some(warning_threshold) = self.warning_threshold {
            envelope.warning_threshold = warning_threshold;
        }
        if let Some(steps) = &self.steps {
            envelope.pipeline_steps = steps.clone();
        }
        envelope
    }
}

impl TiersConfig {
    pub fn get(&self, tier: ComplexityTier) -> &TierConfig {
        match tier {
            ComplexityTier::Simple => &self.simple,
            ComplexityTier::Medium => &self.medium,
            ComplexityTier::Complex => &self.complex,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TierGateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| TierGateError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".tiergate").join("config.toml"))
    }

    /// Write configuration as TOML, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| TierGateError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.tier_table()?;
        self.cost_table()?;

        if self.history.max_reports == 0 {
            return Err(TierGateError::ConfigError(
                "history.max_reports must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the validated tier table
    pub fn tier_table(&self) -> Result<TierTable> {
        TierTable::new(
            self.tiers.simple.envelope(ComplexityTier::Simple),
            self.tiers.medium.envelope(ComplexityTier::Medium),
            self.tiers.complex.envelope(ComplexityTier::Complex),
        )
    }

    /// Build the step cost table: built-in charges with configured overrides
    pub fn cost_table(&self) -> Result<FixedCostTable> {
        let mut table = FixedCostTable::default();

        for (tier_name, steps) in &self.costs {
            let tier: ComplexityTier = tier_name.parse()?;
            for (step_name, cost) in steps {
                let step: PipelineStep = step_name.parse()?;
                if !cost.cost.is_finite() || cost.cost < 0.0 {
                    return Err(TierGateError::ConfigError(format!(
                        "costs.{}.{}: cost must be a non-negative number",
                        tier_name, step_name
                    )));
                }
                table.set(tier, step, *cost);
            }
        }

        Ok(table)
    }
}

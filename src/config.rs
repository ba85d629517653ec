//! Flow configuration, loadable from yaml.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::Amount;
use crate::flow::ConfirmationMode;

/// Show the confirmation step for premium spends above this amount.
pub const DEFAULT_CONFIRMATION_THRESHOLD: Amount = Amount::new(20);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid flow configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("primary_per_premium must be greater than zero")]
    ZeroConversionRate,
}

/// How much primary currency one premium unit buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRate {
    primary_per_premium: u64,
}

impl ConversionRate {
    pub fn new(primary_per_premium: u64) -> Option<Self> {
        (primary_per_premium > 0).then_some(Self {
            primary_per_premium,
        })
    }

    /// Premium needed to cover `primary`, rounded up.
    pub fn premium_for(&self, primary: Amount) -> Amount {
        Amount::new(primary.get().div_ceil(self.primary_per_premium))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowConfig {
    pub confirmation_threshold: Amount,
    pub confirmation_mode: ConfirmationMode,
    /// The player ticked "don't ask again" on the confirmation step.
    pub confirmation_opt_out: bool,
    /// Primary currency bought by one premium unit. Absent means no exchange.
    pub primary_per_premium: Option<u64>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
            confirmation_mode: ConfirmationMode::Threshold,
            confirmation_opt_out: false,
            primary_per_premium: None,
        }
    }
}

impl FlowConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: FlowConfig = serde_yaml::from_str(content)?;
        if config.primary_per_premium == Some(0) {
            return Err(ConfigError::ZeroConversionRate);
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn with_conversion(mut self, primary_per_premium: u64) -> Self {
        self.primary_per_premium = Some(primary_per_premium);
        self
    }

    pub fn with_mode(mut self, mode: ConfirmationMode) -> Self {
        self.confirmation_mode = mode;
        self
    }

    pub fn conversion(&self) -> Option<ConversionRate> {
        self.primary_per_premium.and_then(ConversionRate::new)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.confirmation_threshold, Amount::new(20));
        assert_eq!(config.confirmation_mode, ConfirmationMode::Threshold);
        assert!(!config.confirmation_opt_out);
        assert!(config.conversion().is_none());
    }

    #[test]
    fn conversion_rounds_up() {
        let rate = ConversionRate::new(100).unwrap();
        assert_eq!(rate.premium_for(Amount::new(100)), Amount::new(1));
        assert_eq!(rate.premium_for(Amount::new(101)), Amount::new(2));
        assert_eq!(rate.premium_for(Amount::ZERO), Amount::ZERO);
        assert!(ConversionRate::new(0).is_none());
    }

    #[test]
    fn parse_partial_yaml() {
        let config = FlowConfig::from_yaml("confirmation_mode: dont_show\nprimary_per_premium: 10\n")
            .unwrap();
        assert_eq!(config.confirmation_mode, ConfirmationMode::DontShow);
        assert_eq!(config.conversion(), ConversionRate::new(10));
        assert_eq!(config.confirmation_threshold, Amount::new(20));
    }

    #[test]
    fn parse_rejects_unknown_fields_and_zero_rate() {
        assert!(matches!(
            FlowConfig::from_yaml("treshold: 3\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            FlowConfig::from_yaml("primary_per_premium: 0\n"),
            Err(ConfigError::ZeroConversionRate)
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"confirmation_threshold: 50\nconfirmation_opt_out: true\n")
            .unwrap();
        let config = FlowConfig::load(file.path()).unwrap();
        assert_eq!(config.confirmation_threshold, Amount::new(50));
        assert!(config.confirmation_opt_out);
    }

    #[test]
    fn load_missing_file_fails() {
        assert!(matches!(
            FlowConfig::load("/nonexistent/flow.yaml"),
            Err(ConfigError::Read { .. })
        ));
    }
}

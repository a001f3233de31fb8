use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::device::constants::{DEVICE_NAME, GLOVE_SERVICE, REFRESH_INTERVAL, REFRESH_INTERVAL_RANGE, SCAN_TIMEOUT, TARGET_PHRASE};
use crate::device::decode::is_letter_symbol;
use crate::device::types::ScanFilters;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub target_phrase: String,
    pub device_name: String,
    pub scan_timeout_ms: u64,
    pub refresh_interval_ms: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_phrase.is_empty() {
            return Err(ConfigError::InvalidValue { field: "targetPhrase", reason: "must not be empty".to_string() });
        }

        if let Some(symbol) = self.target_phrase.chars().find(|symbol| !is_letter_symbol(*symbol)) {
            return Err(ConfigError::InvalidValue {
                field: "targetPhrase",
                reason: format!("{:?} can not be captured", symbol),
            });
        }

        if self.device_name.is_empty() {
            return Err(ConfigError::InvalidValue { field: "deviceName", reason: "must not be empty".to_string() });
        }

        if self.scan_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue { field: "scanTimeoutMs", reason: "must be positive".to_string() });
        }

        if !REFRESH_INTERVAL_RANGE.contains(&self.refresh_interval_ms) {
            return Err(ConfigError::InvalidValue {
                field: "refreshIntervalMs",
                reason: format!(
                    "must be between {} and {}",
                    REFRESH_INTERVAL_RANGE.start(),
                    REFRESH_INTERVAL_RANGE.end(),
                ),
            });
        }

        Ok(())
    }

    pub fn scan_filters(&self) -> ScanFilters {
        ScanFilters {
            service: GLOVE_SERVICE,
            device_name: self.device_name.clone(),
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_phrase: TARGET_PHRASE.to_string(),
            device_name: DEVICE_NAME.to_string(),
            scan_timeout_ms: SCAN_TIMEOUT,
            refresh_interval_ms: REFRESH_INTERVAL,
        }
    }
}

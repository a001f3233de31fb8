use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse config file: {source}")]
    JsonError { #[from] source: serde_json::Error },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to run application (io): {source}")]
    IOError { #[from] source: io::Error },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("A required bluetooth characteristic is not available")]
    MissingCharacteristic,

    #[error("Peripheral {0} is not known to the adapter")]
    UnknownDevice(String),
}

/// Conditions reported by the connection coordinator. These are published as events and logged,
/// never returned as errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceFault {
    #[error("Bluetooth adapter is unavailable or powered off")]
    AdapterUnavailable,

    #[error("No glove was found before the scan timed out")]
    ScanTimeout,

    #[error("Connecting to the glove failed")]
    ConnectionFailed,

    #[error("The glove does not expose the letter service")]
    ServiceNotFound,

    #[error("The glove does not expose the letter characteristic")]
    CharacteristicNotFound,

    #[error("Enabling letter notifications failed")]
    DescriptorWriteFailed,

    #[error("Ignored a notification that does not carry a letter: {0:02X?}")]
    DecodeIgnored(Vec<u8>),
}

use serde::Deserialize;
use uuid::Uuid;

use crate::error::DeviceFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }

    /// Scanning, Connecting and Connected all hold the radio; toggling from one of them disconnects.
    pub fn is_busy(&self) -> bool {
        matches!(self, ConnectionState::Scanning | ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Scanning => "Scanning",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChange(ConnectionState),
    Fault(DeviceFault),
}

/// Optional sensor readings that may accompany a letter.
/// flex holds raw values in [0, FLEX_RANGE]; accel and gyro are passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SensorPayload {
    #[serde(default)]
    pub flex: Option<Vec<u16>>,
    #[serde(default)]
    pub accel: Option<Vec<f32>>,
    #[serde(default)]
    pub gyro: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetterEvent {
    pub letter: char,
    pub payload: Option<SensorPayload>,
}

impl LetterEvent {
    pub fn plain(letter: char) -> Self {
        LetterEvent { letter, payload: None }
    }
}

/// Opaque identifier of a peripheral, assigned by the BleLink that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub String);

impl std::fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    pub device: DeviceHandle,
    pub local_name: Option<String>,
    pub services: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub descriptors: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

/// The two scan filters; a device matching either one is the glove.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFilters {
    pub service: Uuid,
    pub device_name: String,
}

impl ScanFilters {
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        let name_matches = advertisement.local_name.as_deref() == Some(self.device_name.as_str());
        name_matches || advertisement.services.contains(&self.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::constants::{DEVICE_NAME, GLOVE_SERVICE};

    fn filters() -> ScanFilters {
        ScanFilters { service: GLOVE_SERVICE, device_name: DEVICE_NAME.to_string() }
    }

    #[test]
    fn matches_by_name_or_service() {
        let by_name = Advertisement {
            device: DeviceHandle("a".into()),
            local_name: Some(DEVICE_NAME.to_string()),
            services: vec![],
        };
        let by_service = Advertisement {
            device: DeviceHandle("b".into()),
            local_name: None,
            services: vec![GLOVE_SERVICE],
        };
        let neither = Advertisement {
            device: DeviceHandle("c".into()),
            local_name: Some("Headphones".into()),
            services: vec![Uuid::nil()],
        };

        assert!(filters().matches(&by_name));
        assert!(filters().matches(&by_service));
        assert!(!filters().matches(&neither));
    }

    #[test]
    fn busy_states() {
        assert!(ConnectionState::Scanning.is_busy());
        assert!(ConnectionState::Connected.is_busy());
        assert!(!ConnectionState::Failed.is_busy());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}

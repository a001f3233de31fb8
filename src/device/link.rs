use uuid::Uuid;

use crate::device::types::{Advertisement, DeviceHandle, GattService, ScanFilters};

/// Completion and notification callbacks from the radio.
///
/// Every BleLink command that does not finish immediately reports back through one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Discovered(Advertisement),
    ScanFailed(String),
    Connected(DeviceHandle),
    ConnectFailed { device: DeviceHandle, reason: String },
    Disconnected(DeviceHandle),
    ServicesDiscovered { device: DeviceHandle, result: Result<Vec<GattService>, String> },
    DescriptorWritten { device: DeviceHandle, result: Result<(), String> },
    Notification { device: DeviceHandle, characteristic: Uuid, value: Vec<u8> },
}

/// Commands to the radio. Implementations must not block: anything that takes time is started
/// in the background and reported later as an AdapterEvent.
pub trait BleLink {
    /// false when there is no adapter or it is powered off
    fn is_powered(&self) -> bool;

    fn start_scan(&mut self, filters: &ScanFilters) -> Result<(), String>;

    fn stop_scan(&mut self);

    fn connect(&mut self, device: &DeviceHandle);

    /// Tear down the link and release any native handle. Must tolerate unknown devices.
    fn disconnect(&mut self, device: &DeviceHandle);

    fn discover_services(&mut self, device: &DeviceHandle);

    fn write_descriptor(&mut self, device: &DeviceHandle, service: Uuid, characteristic: Uuid, descriptor: Uuid, value: &[u8]);
}

use std::time::Duration;
use futures::StreamExt;
use futures::channel::mpsc::{channel, unbounded, Sender, UnboundedReceiver, UnboundedSender};
use log::{debug, error, info, trace, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::device::constants::{CLIENT_CHARACTERISTIC_CONFIG, ENABLE_NOTIFICATION_VALUE, GLOVE_LETTER_CHARACTERISTIC};
use crate::device::decode::decode_notification;
use crate::device::link::{AdapterEvent, BleLink};
use crate::device::types::{ConnectionEvent, ConnectionState, DeviceHandle, GattService, LetterEvent, ScanFilters};
use crate::error::DeviceFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GattStage {
    Discovering,
    Subscribing,
    Subscribed,
    // connected, but the letter characteristic is unusable
    NoData,
}

#[derive(Debug)]
enum LinkStage {
    Idle,
    Scanning {
        deadline: Instant,
    },
    Connecting {
        device: DeviceHandle,
    },
    Connected {
        device: DeviceHandle,
        gatt: GattStage,
    },
    Failed,
}

impl LinkStage {
    fn public_state(&self) -> ConnectionState {
        match self {
            LinkStage::Idle => ConnectionState::Disconnected,
            LinkStage::Scanning { .. } => ConnectionState::Scanning,
            LinkStage::Connecting { .. } => ConnectionState::Connecting,
            LinkStage::Connected { .. } => ConnectionState::Connected,
            LinkStage::Failed => ConnectionState::Failed,
        }
    }

    fn device(&self) -> Option<&DeviceHandle> {
        match self {
            LinkStage::Connecting { device } | LinkStage::Connected { device, .. } => Some(device),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorCommand {
    Connect,
    Disconnect,
    Toggle,
}

/// Owns the BLE lifecycle for the glove: scan, connect, discover, subscribe, decode.
///
/// Radio work is delegated to a BleLink; its callbacks come back through `handle_adapter_event`.
/// Results are published on two ports, connection events and letter events.
pub struct ConnectionCoordinator<L: BleLink> {
    link: L,
    filters: ScanFilters,
    scan_timeout: Duration,
    stage: LinkStage,
    connection_senders: Vec<UnboundedSender<ConnectionEvent>>,
    letter_senders: Vec<UnboundedSender<LetterEvent>>,
}

impl<L: BleLink> ConnectionCoordinator<L> {
    pub fn new(link: L, filters: ScanFilters, scan_timeout: Duration) -> Self {
        ConnectionCoordinator {
            link,
            filters,
            scan_timeout,
            stage: LinkStage::Idle,
            connection_senders: Vec::new(),
            letter_senders: Vec::new(),
        }
    }

    pub fn subscribe_connection(&mut self) -> UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = unbounded();
        self.connection_senders.push(tx);
        rx
    }

    pub fn subscribe_letters(&mut self) -> UnboundedReceiver<LetterEvent> {
        let (tx, rx) = unbounded();
        self.letter_senders.push(tx);
        rx
    }

    pub fn state(&self) -> ConnectionState {
        self.stage.public_state()
    }

    /// true once notifications on the letter characteristic have been enabled
    pub fn is_subscribed(&self) -> bool {
        matches!(self.stage, LinkStage::Connected { gatt: GattStage::Subscribed, .. })
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn scan_deadline(&self) -> Option<Instant> {
        match self.stage {
            LinkStage::Scanning { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn start_scan(&mut self) {
        match self.stage {
            LinkStage::Scanning { .. } => return,
            LinkStage::Connecting { .. } | LinkStage::Connected { .. } => {
                debug!("Not scanning, a peripheral is already in use");
                return;
            },
            LinkStage::Idle | LinkStage::Failed => {},
        }

        if !self.link.is_powered() {
            error!("Bluetooth is not enabled");
            self.publish_fault(DeviceFault::AdapterUnavailable);
            return;
        }

        match self.link.start_scan(&self.filters) {
            Ok(()) => {
                info!("Scanning for {} ({})...", self.filters.device_name, self.filters.service);
                let deadline = Instant::now() + self.scan_timeout;
                self.set_stage(LinkStage::Scanning { deadline });
            },
            Err(reason) => {
                warn!("Scanning failed {}", reason);
                self.set_stage(LinkStage::Idle);
                self.publish_fault(DeviceFault::AdapterUnavailable);
            },
        }
    }

    pub fn stop_scan(&mut self) {
        if let LinkStage::Scanning { .. } = self.stage {
            self.link.stop_scan();
            debug!("Stopped scan");
            self.set_stage(LinkStage::Idle);
        }
    }

    pub fn connect(&mut self, device: DeviceHandle) {
        match self.stage {
            LinkStage::Connecting { .. } | LinkStage::Connected { .. } => {
                warn!("Ignoring connect to {}, a peripheral is already in use", device);
                return;
            },
            LinkStage::Scanning { .. } => self.link.stop_scan(),
            LinkStage::Idle | LinkStage::Failed => {},
        }

        info!("Connecting to peripheral {}...", device);
        self.link.connect(&device);
        self.set_stage(LinkStage::Connecting { device });
    }

    /// Safe in every state; a no-op when already disconnected.
    pub fn disconnect(&mut self) {
        match &self.stage {
            LinkStage::Scanning { .. } => self.link.stop_scan(),
            LinkStage::Connecting { device } | LinkStage::Connected { device, .. } => {
                info!("Disconnecting from peripheral {}", device);
                self.link.disconnect(device);
            },
            LinkStage::Idle | LinkStage::Failed => {},
        }

        self.set_stage(LinkStage::Idle);
    }

    pub fn toggle(&mut self) {
        if self.state().is_busy() {
            self.disconnect();
        } else {
            self.start_scan();
        }
    }

    pub fn handle_command(&mut self, command: CoordinatorCommand) {
        match command {
            CoordinatorCommand::Connect => self.start_scan(),
            CoordinatorCommand::Disconnect => self.disconnect(),
            CoordinatorCommand::Toggle => self.toggle(),
        }
    }

    pub fn on_scan_timeout(&mut self) {
        if let LinkStage::Scanning { .. } = self.stage {
            info!("No matching peripheral found, scan timed out");
            self.link.stop_scan();
            self.set_stage(LinkStage::Idle);
            self.publish_fault(DeviceFault::ScanTimeout);
        }
    }

    pub fn handle_adapter_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::Discovered(advertisement) => {
                if self.scan_deadline().is_none() {
                    trace!("Ignoring discovery of {} while not scanning", advertisement.device);
                    return;
                }

                if !self.filters.matches(&advertisement) {
                    debug!("Peripheral {} {:?} does not match", advertisement.device, advertisement.local_name);
                    return;
                }

                info!(
                    "Using peripheral {} {} {:?}",
                    advertisement.device,
                    advertisement.local_name.as_deref().unwrap_or("NONE"),
                    advertisement.services,
                );
                self.connect(advertisement.device);
            },
            AdapterEvent::ScanFailed(reason) => {
                if let LinkStage::Scanning { .. } = self.stage {
                    warn!("Scan failed: {}", reason);
                    self.link.stop_scan();
                    self.set_stage(LinkStage::Idle);
                    self.publish_fault(DeviceFault::AdapterUnavailable);
                }
            },
            AdapterEvent::Connected(device) => {
                match &self.stage {
                    LinkStage::Connecting { device: pending } if *pending == device => {
                        info!("Connected; Discovering services...");
                        self.link.discover_services(&device);
                        self.set_stage(LinkStage::Connected { device, gatt: GattStage::Discovering });
                    },
                    _ => {
                        // the connect was abandoned in the meantime, release the link again
                        warn!("Unexpected connection to {}, disconnecting", device);
                        self.link.disconnect(&device);
                    },
                }
            },
            AdapterEvent::ConnectFailed { device, reason } => {
                if self.stage.device() == Some(&device) {
                    warn!("Connecting to peripheral failed: {}", reason);
                    self.link.disconnect(&device);
                    self.set_stage(LinkStage::Failed);
                    self.publish_fault(DeviceFault::ConnectionFailed);
                }
            },
            AdapterEvent::Disconnected(device) => {
                if self.stage.device() == Some(&device) {
                    warn!("Connection lost");
                    self.link.disconnect(&device);
                    self.set_stage(LinkStage::Idle);
                }
            },
            AdapterEvent::ServicesDiscovered { device, result } => {
                if self.gatt_stage(&device) == Some(GattStage::Discovering) {
                    self.on_services_discovered(device, result);
                }
            },
            AdapterEvent::DescriptorWritten { device, result } => {
                if self.gatt_stage(&device) != Some(GattStage::Subscribing) {
                    return;
                }

                match result {
                    Ok(()) => {
                        info!("Peripheral ready");
                        self.set_gatt_stage(GattStage::Subscribed);
                    },
                    Err(reason) => {
                        warn!("Failed to enable notifications: {}", reason);
                        self.set_gatt_stage(GattStage::NoData);
                        self.publish_fault(DeviceFault::DescriptorWriteFailed);
                    },
                }
            },
            AdapterEvent::Notification { device, characteristic, value } => {
                if self.gatt_stage(&device).is_none() || characteristic != GLOVE_LETTER_CHARACTERISTIC {
                    trace!("Ignoring notification from {} on {}", device, characteristic);
                    return;
                }

                match decode_notification(&value) {
                    Ok(letter) => {
                        debug!("Received letter {:?}", letter.letter);
                        self.letter_senders.retain(|sender| sender.unbounded_send(letter.clone()).is_ok());
                    },
                    Err(fault) => debug!("{}", fault),
                }
            },
        }
    }

    fn on_services_discovered(&mut self, device: DeviceHandle, result: Result<Vec<GattService>, String>) {
        let services = match result {
            Ok(services) => services,
            Err(reason) => {
                warn!("Service discovery failed: {}", reason);
                self.set_gatt_stage(GattStage::NoData);
                self.publish_fault(DeviceFault::ServiceNotFound);
                return;
            },
        };

        let service = match services.iter().find(|service| service.uuid == self.filters.service) {
            Some(service) => service,
            None => {
                error!("Service {} not found", self.filters.service);
                self.set_gatt_stage(GattStage::NoData);
                self.publish_fault(DeviceFault::ServiceNotFound);
                return;
            },
        };

        let found = service.characteristics.iter().any(|characteristic| characteristic.uuid == GLOVE_LETTER_CHARACTERISTIC);
        if !found {
            error!("Letter characteristic {} not found", GLOVE_LETTER_CHARACTERISTIC);
            self.set_gatt_stage(GattStage::NoData);
            self.publish_fault(DeviceFault::CharacteristicNotFound);
            return;
        }

        info!("Subscribing to characteristic {:?} {:?}", service.uuid, GLOVE_LETTER_CHARACTERISTIC);
        let service_uuid = service.uuid;
        self.link.write_descriptor(
            &device,
            service_uuid,
            GLOVE_LETTER_CHARACTERISTIC,
            CLIENT_CHARACTERISTIC_CONFIG,
            &ENABLE_NOTIFICATION_VALUE,
        );
        self.set_gatt_stage(GattStage::Subscribing);
    }

    fn gatt_stage(&self, device: &DeviceHandle) -> Option<GattStage> {
        match &self.stage {
            LinkStage::Connected { device: current, gatt } if current == device => Some(*gatt),
            _ => None,
        }
    }

    fn set_gatt_stage(&mut self, new_gatt: GattStage) {
        if let LinkStage::Connected { gatt, .. } = &mut self.stage {
            *gatt = new_gatt;
        }
    }

    fn set_stage(&mut self, stage: LinkStage) {
        let previous = self.stage.public_state();
        self.stage = stage;
        let current = self.stage.public_state();

        if previous != current {
            debug!("Connection state {} -> {}", previous, current);
            self.publish(ConnectionEvent::StateChange(current));
        }
    }

    fn publish_fault(&mut self, fault: DeviceFault) {
        self.publish(ConnectionEvent::Fault(fault));
    }

    fn publish(&mut self, event: ConnectionEvent) {
        self.connection_senders.retain(|sender| sender.unbounded_send(event.clone()).is_ok());
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run the coordinator on its own task. Adapter callbacks and commands are handled one at a time,
/// in arrival order. Cancelling `cancel` disconnects and ends the task.
pub fn coordinator_task<L>(
    cancel: CancellationToken,
    mut coordinator: ConnectionCoordinator<L>,
    mut adapter_events: UnboundedReceiver<AdapterEvent>,
) -> (Sender<CoordinatorCommand>, JoinHandle<()>)
where
    L: BleLink + Send + 'static,
{
    let (tx, mut rx) = channel::<CoordinatorCommand>(8);

    let handle = spawn(async move {
        'mainloop: loop {
            let deadline = coordinator.scan_deadline();

            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(event) = adapter_events.next() => {
                    coordinator.handle_adapter_event(event);
                },
                Some(command) = rx.next() => {
                    coordinator.handle_command(command);
                },
                _ = wait_for_deadline(deadline) => {
                    coordinator.on_scan_timeout();
                },
            }
        }

        coordinator.disconnect();
    });

    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use crate::device::constants::{DEVICE_NAME, GLOVE_SERVICE, SCAN_TIMEOUT};
    use crate::device::types::{Advertisement, GattCharacteristic};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        StartScan,
        StopScan,
        Connect(String),
        Disconnect(String),
        DiscoverServices(String),
        WriteDescriptor(String, Uuid),
    }

    struct FakeLink {
        powered: bool,
        scan_error: Option<String>,
        calls: Vec<Call>,
    }

    impl BleLink for FakeLink {
        fn is_powered(&self) -> bool {
            self.powered
        }

        fn start_scan(&mut self, _filters: &ScanFilters) -> Result<(), String> {
            self.calls.push(Call::StartScan);
            match &self.scan_error {
                Some(reason) => Err(reason.clone()),
                None => Ok(()),
            }
        }

        fn stop_scan(&mut self) {
            self.calls.push(Call::StopScan);
        }

        fn connect(&mut self, device: &DeviceHandle) {
            self.calls.push(Call::Connect(device.0.clone()));
        }

        fn disconnect(&mut self, device: &DeviceHandle) {
            self.calls.push(Call::Disconnect(device.0.clone()));
        }

        fn discover_services(&mut self, device: &DeviceHandle) {
            self.calls.push(Call::DiscoverServices(device.0.clone()));
        }

        fn write_descriptor(&mut self, device: &DeviceHandle, _service: Uuid, _characteristic: Uuid, descriptor: Uuid, _value: &[u8]) {
            self.calls.push(Call::WriteDescriptor(device.0.clone(), descriptor));
        }
    }

    fn coordinator(powered: bool) -> ConnectionCoordinator<FakeLink> {
        let link = FakeLink { powered, scan_error: None, calls: Vec::new() };
        let filters = ScanFilters { service: GLOVE_SERVICE, device_name: DEVICE_NAME.to_string() };
        ConnectionCoordinator::new(link, filters, Duration::from_millis(SCAN_TIMEOUT))
    }

    fn glove() -> DeviceHandle {
        DeviceHandle("glove".to_string())
    }

    fn glove_services() -> Vec<GattService> {
        vec![GattService {
            uuid: GLOVE_SERVICE,
            characteristics: vec![GattCharacteristic {
                uuid: GLOVE_LETTER_CHARACTERISTIC,
                descriptors: vec![CLIENT_CHARACTERISTIC_CONFIG],
            }],
        }]
    }

    fn drain<T>(rx: &mut UnboundedReceiver<T>) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(Some(item)) = rx.try_next() {
            items.push(item);
        }
        items
    }

    fn discover_glove(coordinator: &mut ConnectionCoordinator<FakeLink>) {
        coordinator.handle_adapter_event(AdapterEvent::Discovered(Advertisement {
            device: glove(),
            local_name: Some(DEVICE_NAME.to_string()),
            services: vec![],
        }));
    }

    fn connect_and_subscribe(coordinator: &mut ConnectionCoordinator<FakeLink>) {
        coordinator.start_scan();
        discover_glove(coordinator);
        coordinator.handle_adapter_event(AdapterEvent::Connected(glove()));
        coordinator.handle_adapter_event(AdapterEvent::ServicesDiscovered { device: glove(), result: Ok(glove_services()) });
        coordinator.handle_adapter_event(AdapterEvent::DescriptorWritten { device: glove(), result: Ok(()) });
    }

    #[tokio::test]
    async fn adapter_disabled_stays_disconnected() {
        let mut coordinator = coordinator(false);
        let mut events = coordinator.subscribe_connection();

        coordinator.start_scan();

        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert!(coordinator.link().calls.is_empty());
        assert_eq!(drain(&mut events), vec![ConnectionEvent::Fault(DeviceFault::AdapterUnavailable)]);
    }

    #[tokio::test]
    async fn scan_failure_reports_adapter_unavailable() {
        let mut coordinator = coordinator(true);
        coordinator.link.scan_error = Some("radio busy".to_string());
        let mut events = coordinator.subscribe_connection();

        coordinator.start_scan();

        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert_eq!(drain(&mut events), vec![ConnectionEvent::Fault(DeviceFault::AdapterUnavailable)]);
    }

    #[tokio::test]
    async fn start_scan_twice_is_a_no_op() {
        let mut coordinator = coordinator(true);
        coordinator.start_scan();
        coordinator.start_scan();

        assert_eq!(coordinator.state(), ConnectionState::Scanning);
        assert_eq!(coordinator.link().calls, vec![Call::StartScan]);
    }

    #[tokio::test]
    async fn full_pipeline_reaches_subscribed() {
        let mut coordinator = coordinator(true);
        let mut events = coordinator.subscribe_connection();

        connect_and_subscribe(&mut coordinator);

        assert_eq!(coordinator.state(), ConnectionState::Connected);
        assert!(coordinator.is_subscribed());
        assert_eq!(coordinator.link().calls, vec![
            Call::StartScan,
            Call::StopScan,
            Call::Connect("glove".to_string()),
            Call::DiscoverServices("glove".to_string()),
            Call::WriteDescriptor("glove".to_string(), CLIENT_CHARACTERISTIC_CONFIG),
        ]);
        assert_eq!(drain(&mut events), vec![
            ConnectionEvent::StateChange(ConnectionState::Scanning),
            ConnectionEvent::StateChange(ConnectionState::Connecting),
            ConnectionEvent::StateChange(ConnectionState::Connected),
        ]);
    }

    #[tokio::test]
    async fn non_matching_discovery_is_ignored() {
        let mut coordinator = coordinator(true);
        coordinator.start_scan();
        coordinator.handle_adapter_event(AdapterEvent::Discovered(Advertisement {
            device: DeviceHandle("speaker".to_string()),
            local_name: Some("Speaker".to_string()),
            services: vec![],
        }));

        assert_eq!(coordinator.state(), ConnectionState::Scanning);
        assert_eq!(coordinator.link().calls, vec![Call::StartScan]);
    }

    #[tokio::test]
    async fn discovery_outside_scan_is_ignored() {
        let mut coordinator = coordinator(true);
        discover_glove(&mut coordinator);

        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert!(coordinator.link().calls.is_empty());
    }

    #[tokio::test]
    async fn missing_service_degrades_to_no_data() {
        let mut coordinator = coordinator(true);
        let mut events = coordinator.subscribe_connection();
        coordinator.start_scan();
        discover_glove(&mut coordinator);
        coordinator.handle_adapter_event(AdapterEvent::Connected(glove()));
        coordinator.handle_adapter_event(AdapterEvent::ServicesDiscovered { device: glove(), result: Ok(vec![]) });

        assert_eq!(coordinator.state(), ConnectionState::Connected);
        assert!(!coordinator.is_subscribed());
        assert!(drain(&mut events).contains(&ConnectionEvent::Fault(DeviceFault::ServiceNotFound)));
    }

    #[tokio::test]
    async fn missing_characteristic_degrades_to_no_data() {
        let mut coordinator = coordinator(true);
        let mut events = coordinator.subscribe_connection();
        coordinator.start_scan();
        discover_glove(&mut coordinator);
        coordinator.handle_adapter_event(AdapterEvent::Connected(glove()));
        let services = vec![GattService { uuid: GLOVE_SERVICE, characteristics: vec![] }];
        coordinator.handle_adapter_event(AdapterEvent::ServicesDiscovered { device: glove(), result: Ok(services) });

        assert_eq!(coordinator.state(), ConnectionState::Connected);
        assert!(drain(&mut events).contains(&ConnectionEvent::Fault(DeviceFault::CharacteristicNotFound)));
        assert!(!coordinator.link().calls.iter().any(|call| matches!(call, Call::WriteDescriptor(..))));
    }

    #[tokio::test]
    async fn descriptor_failure_is_reported() {
        let mut coordinator = coordinator(true);
        let mut events = coordinator.subscribe_connection();
        coordinator.start_scan();
        discover_glove(&mut coordinator);
        coordinator.handle_adapter_event(AdapterEvent::Connected(glove()));
        coordinator.handle_adapter_event(AdapterEvent::ServicesDiscovered { device: glove(), result: Ok(glove_services()) });
        coordinator.handle_adapter_event(AdapterEvent::DescriptorWritten { device: glove(), result: Err("gatt error 133".to_string()) });

        assert!(!coordinator.is_subscribed());
        assert!(drain(&mut events).contains(&ConnectionEvent::Fault(DeviceFault::DescriptorWriteFailed)));
    }

    #[tokio::test]
    async fn connect_failure_moves_to_failed() {
        let mut coordinator = coordinator(true);
        let mut events = coordinator.subscribe_connection();
        coordinator.start_scan();
        discover_glove(&mut coordinator);
        coordinator.handle_adapter_event(AdapterEvent::ConnectFailed { device: glove(), reason: "status 8".to_string() });

        assert_eq!(coordinator.state(), ConnectionState::Failed);
        let events = drain(&mut events);
        assert!(events.contains(&ConnectionEvent::StateChange(ConnectionState::Failed)));
        assert!(events.contains(&ConnectionEvent::Fault(DeviceFault::ConnectionFailed)));
    }

    #[tokio::test]
    async fn link_loss_moves_to_disconnected() {
        let mut coordinator = coordinator(true);
        connect_and_subscribe(&mut coordinator);
        let mut events = coordinator.subscribe_connection();

        coordinator.handle_adapter_event(AdapterEvent::Disconnected(glove()));

        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert_eq!(drain(&mut events), vec![ConnectionEvent::StateChange(ConnectionState::Disconnected)]);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut coordinator = coordinator(true);
        connect_and_subscribe(&mut coordinator);
        let mut events = coordinator.subscribe_connection();

        coordinator.disconnect();
        coordinator.disconnect();

        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert_eq!(drain(&mut events), vec![ConnectionEvent::StateChange(ConnectionState::Disconnected)]);
        let disconnects = coordinator.link().calls.iter().filter(|call| matches!(call, Call::Disconnect(_))).count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn late_connection_after_disconnect_is_released() {
        let mut coordinator = coordinator(true);
        coordinator.start_scan();
        discover_glove(&mut coordinator);
        coordinator.disconnect();
        coordinator.handle_adapter_event(AdapterEvent::Connected(glove()));

        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert_eq!(coordinator.link().calls.last(), Some(&Call::Disconnect("glove".to_string())));
    }

    #[tokio::test]
    async fn notifications_are_decoded_into_letters() {
        let mut coordinator = coordinator(true);
        let mut letters = coordinator.subscribe_letters();
        connect_and_subscribe(&mut coordinator);

        for value in [b"H".to_vec(), b"7".to_vec(), b"I".to_vec()] {
            coordinator.handle_adapter_event(AdapterEvent::Notification {
                device: glove(),
                characteristic: GLOVE_LETTER_CHARACTERISTIC,
                value,
            });
        }
        coordinator.handle_adapter_event(AdapterEvent::Notification {
            device: glove(),
            characteristic: Uuid::nil(),
            value: b"X".to_vec(),
        });

        assert_eq!(drain(&mut letters), vec![LetterEvent::plain('H'), LetterEvent::plain('I')]);
    }

    #[tokio::test]
    async fn toggle_scans_then_disconnects() {
        let mut coordinator = coordinator(true);
        coordinator.toggle();
        assert_eq!(coordinator.state(), ConnectionState::Scanning);
        coordinator.toggle();
        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert_eq!(coordinator.link().calls, vec![Call::StartScan, Call::StopScan]);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_times_out_in_task() {
        let mut coordinator = coordinator(true);
        let mut events = coordinator.subscribe_connection();
        let (_adapter_tx, adapter_rx) = unbounded::<AdapterEvent>();
        let cancel = CancellationToken::new();
        let (mut commands, handle) = coordinator_task(cancel.clone(), coordinator, adapter_rx);

        futures::SinkExt::send(&mut commands, CoordinatorCommand::Connect).await.expect("send command");
        assert_eq!(events.next().await, Some(ConnectionEvent::StateChange(ConnectionState::Scanning)));

        tokio::time::sleep(Duration::from_millis(SCAN_TIMEOUT + 1)).await;

        assert_eq!(events.next().await, Some(ConnectionEvent::StateChange(ConnectionState::Disconnected)));
        assert_eq!(events.next().await, Some(ConnectionEvent::Fault(DeviceFault::ScanTimeout)));

        cancel.cancel();
        handle.await.expect("Failed to join coordinator task");
    }
}

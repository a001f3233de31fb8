use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use btleplug::api::{Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter, ValueNotification};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{Stream, StreamExt};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::device::constants::{CONNECT_DEADLINE, CLIENT_CHARACTERISTIC_CONFIG};
use crate::device::link::{AdapterEvent, BleLink};
use crate::device::types::{Advertisement, DeviceHandle, GattCharacteristic, GattService, ScanFilters};
use crate::error::DeviceError;

type PeripheralMap = Arc<Mutex<HashMap<DeviceHandle, Peripheral>>>;

fn handle_for(id: &PeripheralId) -> DeviceHandle {
    DeviceHandle(format!("{:?}", id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanCommand {
    Start,
    Stop,
}

/// Whether the radio is switched on, as last reported by the adapter.
#[derive(Debug, Clone)]
struct RadioPower(Arc<AtomicBool>);

impl RadioPower {
    fn new(state: &CentralState) -> Self {
        RadioPower(Arc::new(AtomicBool::new(is_powered_on(state))))
    }

    fn update(&self, state: &CentralState) {
        let powered = is_powered_on(state);
        if self.0.swap(powered, Ordering::SeqCst) != powered {
            info!("Bluetooth radio is now {}", if powered { "on" } else { "off" });
        }
    }

    fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// some backends never learn the state, only an explicit power off counts
fn is_powered_on(state: &CentralState) -> bool {
    !matches!(state, CentralState::PoweredOff)
}

/// BleLink backed by the first btleplug adapter. Scan commands run in order on one task, every
/// other command runs on its own tokio task, and results come back through `events`.
pub struct BtleLink {
    adapter: Option<Adapter>,
    power: RadioPower,
    scan_commands: Option<UnboundedSender<ScanCommand>>,
    peripherals: PeripheralMap,
    events: UnboundedSender<AdapterEvent>,
    cancel: CancellationToken,
    // cancelled on disconnect, stops the notification reader of the current connection
    connection_cancel: CancellationToken,
}

impl BtleLink {
    /// Never fails: without a usable adapter the link reports itself as not powered.
    pub async fn new(cancel: CancellationToken, events: UnboundedSender<AdapterEvent>) -> Self {
        let adapter = match first_adapter().await {
            Ok(adapter) => adapter,
            Err(err) => {
                warn!("Bluetooth is unavailable: {}", err);
                None
            },
        };

        let peripherals: PeripheralMap = Arc::new(Mutex::new(HashMap::new()));
        let mut power = RadioPower::new(&CentralState::PoweredOff);
        let mut scan_commands = None;

        if let Some(adapter) = &adapter {
            info!("Using adapter {}", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));

            let state = match adapter.adapter_state().await {
                Ok(state) => state,
                Err(err) => {
                    warn!("Failed to query adapter state: {}", err);
                    CentralState::Unknown
                },
            };
            debug!("Adapter state: {:?}", state);
            power = RadioPower::new(&state);

            central_events_task(cancel.child_token(), adapter.clone(), power.clone(), peripherals.clone(), events.clone());

            let (scan_sender, scan_receiver) = unbounded();
            let scan_adapter = adapter.clone();
            let scan_events = events.clone();
            scan_task(scan_receiver, move |command| {
                let adapter = scan_adapter.clone();
                let events = scan_events.clone();
                async move { run_scan_command(&adapter, &events, command).await }
            });
            scan_commands = Some(scan_sender);
        }

        let connection_cancel = cancel.child_token();
        BtleLink { adapter, power, scan_commands, peripherals, events, cancel, connection_cancel }
    }

    fn peripheral(&self, device: &DeviceHandle) -> Option<Peripheral> {
        match self.peripherals.lock() {
            Ok(peripherals) => peripherals.get(device).cloned(),
            Err(_) => {
                warn!("Peripheral map lock is poisoned");
                None
            },
        }
    }

    fn send(events: &UnboundedSender<AdapterEvent>, event: AdapterEvent) {
        if events.unbounded_send(event).is_err() {
            debug!("Coordinator is gone, dropping adapter event");
        }
    }
}

async fn first_adapter() -> Result<Option<Adapter>, DeviceError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    Ok(adapters.into_iter().next())
}

async fn advertisement_for(adapter: &Adapter, id: &PeripheralId) -> Result<(Peripheral, Advertisement), DeviceError> {
    let peripheral = adapter.peripheral(id).await?;
    let properties = peripheral.properties().await?;

    let (local_name, services) = match properties {
        Some(properties) => (properties.local_name, properties.services),
        None => (None, Vec::new()),
    };

    let advertisement = Advertisement { device: handle_for(id), local_name, services };
    Ok((peripheral, advertisement))
}

fn central_events_task(cancel: CancellationToken, adapter: Adapter, power: RadioPower, peripherals: PeripheralMap, events: UnboundedSender<AdapterEvent>) -> JoinHandle<()> {
    spawn(async move {
        let mut central_events = match adapter.events().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Failed to listen for adapter events: {}", err);
                return;
            },
        };

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                event = central_events.next() => match event {
                    None => break 'mainloop,
                    Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => {
                        match advertisement_for(&adapter, &id).await {
                            Ok((peripheral, advertisement)) => {
                                if let Ok(mut peripherals) = peripherals.lock() {
                                    peripherals.insert(advertisement.device.clone(), peripheral);
                                }
                                BtleLink::send(&events, AdapterEvent::Discovered(advertisement));
                            },
                            Err(err) => warn!("Could not query peripheral for properties: {:?}", err),
                        }
                    },
                    Some(CentralEvent::DeviceDisconnected(id)) => {
                        BtleLink::send(&events, AdapterEvent::Disconnected(handle_for(&id)));
                    },
                    Some(CentralEvent::StateUpdate(state)) => power.update(&state),
                    Some(_) => {},
                },
            }
        }
    })
}

// Runs the scan commands one after another, in the order they were issued. Ends once the link
// is dropped.
fn scan_task<F, Fut>(mut commands: UnboundedReceiver<ScanCommand>, mut run: F) -> JoinHandle<()>
where
    F: FnMut(ScanCommand) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    spawn(async move {
        while let Some(command) = commands.next().await {
            run(command).await;
        }
        debug!("Scan task stopping");
    })
}

async fn run_scan_command(adapter: &Adapter, events: &UnboundedSender<AdapterEvent>, command: ScanCommand) {
    match command {
        ScanCommand::Start => {
            // The name filter can not be expressed as a ScanFilter, so scan for everything and let
            // the coordinator match; some environments ignore the service filter anyway.
            if let Err(err) = adapter.start_scan(ScanFilter::default()).await {
                BtleLink::send(events, AdapterEvent::ScanFailed(DeviceError::from(err).to_string()));
            }
        },
        ScanCommand::Stop => {
            if let Err(err) = adapter.stop_scan().await {
                warn!("Failed to stop scan: {:?}", err);
            }
        },
    }
}

fn read_notifications_task<S>(cancel: CancellationToken, device: DeviceHandle, mut notification_stream: S, events: UnboundedSender<AdapterEvent>) -> JoinHandle<()>
where
    S: Stream<Item = ValueNotification> + Unpin + Send + 'static,
{
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                data = notification_stream.next() => match data {
                    None => break 'mainloop,
                    Some(data) => BtleLink::send(&events, AdapterEvent::Notification {
                        device: device.clone(),
                        characteristic: data.uuid,
                        value: data.value,
                    }),
                },
            }
        }

        debug!("Read notifications task stopped");
    })
}

fn gatt_services(peripheral: &Peripheral) -> Vec<GattService> {
    peripheral.services()
        .into_iter()
        .map(|service| GattService {
            uuid: service.uuid,
            characteristics: service.characteristics
                .into_iter()
                .map(|characteristic| GattCharacteristic {
                    uuid: characteristic.uuid,
                    descriptors: characteristic.descriptors.into_iter().map(|descriptor| descriptor.uuid).collect(),
                })
                .collect(),
        })
        .collect()
}

async fn enable_notifications(peripheral: &Peripheral, service: Uuid, characteristic: Uuid) -> Result<(), DeviceError> {
    let target = peripheral.services()
        .into_iter()
        .filter(|candidate| candidate.uuid == service)
        .flat_map(|candidate| candidate.characteristics.into_iter())
        .find(|candidate| candidate.uuid == characteristic)
        .ok_or(DeviceError::MissingCharacteristic)?;

    // btleplug writes the client characteristic configuration descriptor as part of subscribe
    peripheral.subscribe(&target).await?;
    Ok(())
}

impl BleLink for BtleLink {
    fn is_powered(&self) -> bool {
        self.adapter.is_some() && self.power.is_on()
    }

    fn start_scan(&mut self, _filters: &ScanFilters) -> Result<(), String> {
        let scan_commands = self.scan_commands.as_ref().ok_or_else(|| DeviceError::NoAdapter.to_string())?;
        scan_commands.unbounded_send(ScanCommand::Start).map_err(|err| err.to_string())
    }

    fn stop_scan(&mut self) {
        if let Some(scan_commands) = &self.scan_commands {
            if let Err(err) = scan_commands.unbounded_send(ScanCommand::Stop) {
                warn!("Failed to stop scan: {}", err);
            }
        }
    }

    fn connect(&mut self, device: &DeviceHandle) {
        let events = self.events.clone();
        let device = device.clone();

        let peripheral = match self.peripheral(&device) {
            Some(peripheral) => peripheral,
            None => {
                let reason = DeviceError::UnknownDevice(device.0.clone()).to_string();
                BtleLink::send(&events, AdapterEvent::ConnectFailed { device, reason });
                return;
            },
        };

        self.connection_cancel = self.cancel.child_token();

        spawn(async move {
            tokio::select! {
                _ = sleep(Duration::from_millis(CONNECT_DEADLINE)) => {
                    let reason = "Connecting took too long".to_string();
                    BtleLink::send(&events, AdapterEvent::ConnectFailed { device, reason });
                }
                result = peripheral.connect() => match result {
                    Ok(()) => BtleLink::send(&events, AdapterEvent::Connected(device)),
                    Err(err) => {
                        let reason = DeviceError::from(err).to_string();
                        BtleLink::send(&events, AdapterEvent::ConnectFailed { device, reason });
                    },
                }
            }
        });
    }

    fn disconnect(&mut self, device: &DeviceHandle) {
        self.connection_cancel.cancel();

        if let Some(peripheral) = self.peripheral(device) {
            spawn(async move {
                if let Err(err) = peripheral.disconnect().await {
                    warn!("Failed to disconnect peripheral: {:?}", err);
                }
            });
        }
    }

    fn discover_services(&mut self, device: &DeviceHandle) {
        let events = self.events.clone();
        let device = device.clone();

        let peripheral = match self.peripheral(&device) {
            Some(peripheral) => peripheral,
            None => {
                let result = Err(DeviceError::UnknownDevice(device.0.clone()).to_string());
                BtleLink::send(&events, AdapterEvent::ServicesDiscovered { device, result });
                return;
            },
        };

        spawn(async move {
            let result = match peripheral.discover_services().await {
                Ok(()) => Ok(gatt_services(&peripheral)),
                Err(err) => Err(DeviceError::from(err).to_string()),
            };
            BtleLink::send(&events, AdapterEvent::ServicesDiscovered { device, result });
        });
    }

    fn write_descriptor(&mut self, device: &DeviceHandle, service: Uuid, characteristic: Uuid, descriptor: Uuid, _value: &[u8]) {
        let events = self.events.clone();
        let device = device.clone();

        if descriptor != CLIENT_CHARACTERISTIC_CONFIG {
            let result = Err(format!("Writing descriptor {} is not supported", descriptor));
            BtleLink::send(&events, AdapterEvent::DescriptorWritten { device, result });
            return;
        }

        let peripheral = match self.peripheral(&device) {
            Some(peripheral) => peripheral,
            None => {
                let result = Err(DeviceError::UnknownDevice(device.0.clone()).to_string());
                BtleLink::send(&events, AdapterEvent::DescriptorWritten { device, result });
                return;
            },
        };

        let connection_cancel = self.connection_cancel.clone();

        spawn(async move {
            // the stream is open before subscribing so that the first letter is not lost
            let notification_stream = match peripheral.notifications().await {
                Ok(stream) => stream,
                Err(err) => {
                    let result = Err(DeviceError::from(err).to_string());
                    BtleLink::send(&events, AdapterEvent::DescriptorWritten { device, result });
                    return;
                },
            };
            let reader = read_notifications_task(connection_cancel, device.clone(), notification_stream, events.clone());

            let result = enable_notifications(&peripheral, service, characteristic)
                .await
                .map_err(|err| err.to_string());
            BtleLink::send(&events, AdapterEvent::DescriptorWritten { device, result });

            if let Err(err) = reader.await {
                warn!("Failed to join read notifications task: {}", err);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powered_off_radio_is_not_powered() {
        let power = RadioPower::new(&CentralState::PoweredOff);
        assert!(!power.is_on());

        power.update(&CentralState::PoweredOn);
        assert!(power.is_on());

        power.update(&CentralState::PoweredOff);
        assert!(!power.is_on());
    }

    #[test]
    fn unknown_state_counts_as_powered() {
        assert!(RadioPower::new(&CentralState::Unknown).is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn scan_commands_run_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (commands, receiver) = unbounded();

        let recorded = calls.clone();
        let handle = scan_task(receiver, move |command| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().expect("calls lock").push(format!("{:?} begin", command));
                // starting a scan is slower than stopping one
                if command == ScanCommand::Start {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                recorded.lock().expect("calls lock").push(format!("{:?} end", command));
            }
        });

        commands.unbounded_send(ScanCommand::Start).expect("send start");
        commands.unbounded_send(ScanCommand::Stop).expect("send stop");
        drop(commands);
        handle.await.expect("Failed to join scan task");

        let calls = calls.lock().expect("calls lock").clone();
        assert_eq!(calls, vec!["Start begin", "Start end", "Stop begin", "Stop end"]);
    }

    #[tokio::test]
    async fn notifications_queued_before_the_reader_runs_are_forwarded() {
        let (notifications, stream) = unbounded();
        let (events, mut received) = unbounded();
        let device = DeviceHandle("glove".to_string());

        let uuid = Uuid::from_u128(1);
        notifications.unbounded_send(ValueNotification { uuid, value: b"H".to_vec() }).expect("send notification");
        notifications.unbounded_send(ValueNotification { uuid, value: b"I".to_vec() }).expect("send notification");
        drop(notifications);

        let reader = read_notifications_task(CancellationToken::new(), device.clone(), stream, events);
        reader.await.expect("Failed to join reader");

        let mut values = Vec::new();
        while let Some(event) = received.next().await {
            match event {
                AdapterEvent::Notification { device: from, value, .. } => {
                    assert_eq!(from, device);
                    values.push(value);
                },
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(values, vec![b"H".to_vec(), b"I".to_vec()]);
    }
}

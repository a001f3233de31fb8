use futures::SinkExt;
use futures::channel::mpsc::{unbounded, Sender};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::spawn;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::session::CaptureSession;
use crate::capture::task::{capture_task, CaptureHandle};
use crate::capture::types::{CaptureCommand, CaptureView};
use crate::config::types::Config;
use crate::console::types::{describe_capture, describe_connection, describe_frame, ConsoleCommand, HELP};
use crate::device::btle::BtleLink;
use crate::device::coordinator::{coordinator_task, ConnectionCoordinator, CoordinatorCommand};
use crate::device::types::ConnectionState;
use crate::error::AppRunError;

pub struct Application {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,
    device_commands: Sender<CoordinatorCommand>,
    capture: CaptureHandle,
}

impl Application {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    async fn send_device_command(&mut self, command: CoordinatorCommand) {
        if let Err(err) = self.device_commands.send(command).await {
            warn!("Failed to send {:?} to the connection coordinator: {}", command, err);
        }
    }

    async fn send_capture_command(&mut self, command: CaptureCommand) {
        if let Err(err) = self.capture.commands.send(command).await {
            warn!("Failed to send {:?} to the capture session: {}", command, err);
        }
    }

    fn print_status(&self) {
        println!("{}", describe_connection(*self.capture.connection.borrow()));
        println!("{}", describe_capture(&self.capture.session.borrow()));
        println!("{}", describe_frame(&self.capture.frame.borrow()));
    }

    async fn update(&mut self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Connect => self.send_device_command(CoordinatorCommand::Connect).await,
            ConsoleCommand::Disconnect => self.send_device_command(CoordinatorCommand::Disconnect).await,
            ConsoleCommand::Toggle => self.send_device_command(CoordinatorCommand::Toggle).await,
            ConsoleCommand::Start => {
                if !self.capture.connection.borrow().is_connected() {
                    println!("Connect the glove before starting a capture");
                }
                self.send_capture_command(CaptureCommand::Start).await;
            },
            ConsoleCommand::Stop => self.send_capture_command(CaptureCommand::Stop).await,
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => self.before_close(),
        }
    }
}

fn report_task(cancel: CancellationToken, mut session: watch::Receiver<CaptureView>, mut connection: watch::Receiver<ConnectionState>) -> JoinHandle<()> {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                changed = session.changed() => {
                    if changed.is_err() {
                        break 'mainloop;
                    }
                    println!("{}", describe_capture(&session.borrow_and_update()));
                },
                changed = connection.changed() => {
                    if changed.is_err() {
                        break 'mainloop;
                    }
                    println!("{}", describe_connection(*connection.borrow_and_update()));
                },
            }
        }
    })
}

async fn join(name: &str, handle: JoinHandle<()>) {
    if let Err(err) = handle.await {
        error!("Failed to join {} task: {}", name, err);
    }
}

pub async fn run_application(config: Config, seed: u64) -> Result<(), AppRunError> {
    let app_cancel = CancellationToken::new();

    let (adapter_sender, adapter_receiver) = unbounded();
    let link = BtleLink::new(app_cancel.child_token(), adapter_sender).await;

    let mut coordinator = ConnectionCoordinator::new(link, config.scan_filters(), config.scan_timeout());
    let connection_events = coordinator.subscribe_connection();
    let letters = coordinator.subscribe_letters();
    let (device_commands, coordinator_handle) = coordinator_task(app_cancel.clone(), coordinator, adapter_receiver);

    let session = CaptureSession::new(&config.target_phrase);
    let (capture, capture_handle) = capture_task(
        app_cancel.clone(),
        session,
        config.refresh_interval(),
        seed,
        connection_events,
        letters,
    );

    let report_handle = report_task(app_cancel.clone(), capture.session.clone(), capture.connection.clone());

    let mut application = Application { app_cancel, device_commands, capture };

    info!("Capturing {:?} from {}", config.target_phrase, config.device_name);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(err) => break Err(AppRunError::from(err)),
        };

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => break Ok(()),
            Ok(command) => application.update(command).await,
            Err(message) => println!("{}", message),
        }
    };

    application.before_close();
    join("connection coordinator", coordinator_handle).await;
    join("capture", capture_handle).await;
    join("report", report_handle).await;

    result
}

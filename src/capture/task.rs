use std::time::Duration;
use futures::StreamExt;
use futures::channel::mpsc::{channel, Sender, UnboundedReceiver};
use log::{debug, info};
use tokio::spawn;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::capture::session::{CaptureSession, LetterOutcome};
use crate::capture::synth::{hold, synthesize};
use crate::capture::types::{CaptureCommand, CaptureView, SensorFrame};
use crate::device::constants::PULSE_DURATION;
use crate::device::types::{ConnectionEvent, ConnectionState, LetterEvent};

/// Observers' side of a running capture task.
pub struct CaptureHandle {
    pub commands: Sender<CaptureCommand>,
    pub connection: watch::Receiver<ConnectionState>,
    pub frame: watch::Receiver<SensorFrame>,
    pub session: watch::Receiver<CaptureView>,
    pub pulse: watch::Receiver<bool>,
}

struct Publishers {
    connection: watch::Sender<ConnectionState>,
    frame: watch::Sender<SensorFrame>,
    session: watch::Sender<CaptureView>,
    pulse: watch::Sender<bool>,
}

impl Publishers {
    fn publish(&self, session: &CaptureSession) {
        self.connection.send_if_modified(|state| replace_if_changed(state, session.connection()));
        self.frame.send_if_modified(|frame| replace_if_changed(frame, session.frame()));
        self.session.send_if_modified(|view| replace_if_changed(view, session.view()));
        self.pulse.send_if_modified(|pulse| replace_if_changed(pulse, session.pulse()));
    }
}

fn replace_if_changed<T: PartialEq>(current: &mut T, new: T) -> bool {
    if *current == new {
        return false;
    }
    *current = new;
    true
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        },
        None => std::future::pending().await,
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// applies one letter, arming the pulse timer and dropping the refresh interval on completion
fn accept_letter(session: &mut CaptureSession, event: LetterEvent, ticker: &mut Option<Interval>, pulse_deadline: &mut Option<Instant>) {
    let outcome = session.on_letter_received(event.letter, event.payload.as_ref());
    if outcome.is_accepted() {
        *pulse_deadline = Some(Instant::now() + Duration::from_millis(PULSE_DURATION));
    }
    if outcome == LetterOutcome::Completed {
        *ticker = None;
    }
}

/// Run a capture session on its own task.
///
/// This task is the only writer of the session: connection events, letters, commands, the
/// refresh interval and the pulse timer are all handled here, one at a time, and observers only
/// see complete snapshots through the watch channels. Stopping drops the refresh interval inside
/// this task, so no placeholder frame can be written after a stop or disconnect.
pub fn capture_task(
    cancel: CancellationToken,
    mut session: CaptureSession,
    refresh_interval: Duration,
    seed: u64,
    mut connection_events: UnboundedReceiver<ConnectionEvent>,
    mut letters: UnboundedReceiver<LetterEvent>,
) -> (CaptureHandle, JoinHandle<()>) {
    let (command_sender, mut commands) = channel::<CaptureCommand>(8);
    let (connection_tx, connection_rx) = watch::channel(session.connection());
    let (frame_tx, frame_rx) = watch::channel(session.frame());
    let (session_tx, session_rx) = watch::channel(session.view());
    let (pulse_tx, pulse_rx) = watch::channel(session.pulse());

    let publishers = Publishers {
        connection: connection_tx,
        frame: frame_tx,
        session: session_tx,
        pulse: pulse_tx,
    };

    let handle = spawn(async move {
        let mut ticker: Option<Interval> = None;
        let mut pulse_deadline: Option<Instant> = None;
        let mut started_at = Instant::now();
        let mut tick_count: u64 = 0;

        'mainloop: loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(event) = letters.next() => {
                    accept_letter(&mut session, event, &mut ticker, &mut pulse_deadline);
                },
                Some(event) = connection_events.next() => match event {
                    ConnectionEvent::StateChange(state) => {
                        // the coordinator sends letters before the state change that follows them
                        while let Ok(event) = letters.try_recv() {
                            accept_letter(&mut session, event, &mut ticker, &mut pulse_deadline);
                        }

                        session.on_connection_state(state);
                        if !session.is_active() {
                            ticker = None;
                            pulse_deadline = None;
                        }
                    },
                    ConnectionEvent::Fault(fault) => info!("Device reported: {}", fault),
                },
                Some(command) = commands.next() => match command {
                    CaptureCommand::Start => {
                        if session.start() {
                            started_at = Instant::now();
                            tick_count = 0;
                            pulse_deadline = None;
                            let mut refresh = interval(refresh_interval);
                            refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
                            ticker = Some(refresh);
                        }
                    },
                    CaptureCommand::Stop => {
                        session.stop();
                        ticker = None;
                        pulse_deadline = None;
                    },
                },
                _ = next_tick(&mut ticker) => {
                    if session.wants_synthetic_frame() {
                        let tick_seed = seed.wrapping_add(tick_count);
                        let frame = match session.current_char() {
                            None => synthesize(started_at.elapsed(), tick_seed),
                            Some(_) => hold(session.frame(), tick_seed),
                        };
                        session.apply_synthetic_frame(frame);
                    }
                    tick_count = tick_count.wrapping_add(1);
                },
                _ = wait_for_deadline(pulse_deadline) => {
                    session.clear_pulse();
                    pulse_deadline = None;
                },
            }

            publishers.publish(&session);
        }

        debug!("Capture task stopping");
        session.stop();
        publishers.publish(&session);
    });

    let capture_handle = CaptureHandle {
        commands: command_sender,
        connection: connection_rx,
        frame: frame_rx,
        session: session_rx,
        pulse: pulse_rx,
    };

    (capture_handle, handle)
}

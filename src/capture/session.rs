use log::{debug, info, warn};

use crate::capture::types::{CaptureView, FrameSource, SensorFrame};
use crate::device::constants::FLEX_RANGE;
use crate::device::decode::is_letter_symbol;
use crate::device::types::{ConnectionState, SensorPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterOutcome {
    Ignored,
    Appended,
    /// appended, and the target phrase is now complete
    Completed,
}

impl LetterOutcome {
    pub fn is_accepted(&self) -> bool {
        *self != LetterOutcome::Ignored
    }
}

/// State of one letter-by-letter capture of a fixed target phrase.
///
/// Never fails: calls that are not valid in the current state are silently ignored.
#[derive(Debug)]
pub struct CaptureSession {
    target: Vec<char>,
    connection: ConnectionState,
    is_active: bool,
    cursor: usize,
    accumulated_text: String,
    current_char: Option<char>,
    pulse: bool,
    frame: SensorFrame,
    frame_source: FrameSource,
}

impl CaptureSession {
    pub fn new(target: &str) -> Self {
        CaptureSession {
            target: target.chars().collect(),
            connection: ConnectionState::Disconnected,
            is_active: false,
            cursor: 0,
            accumulated_text: String::new(),
            current_char: None,
            pulse: false,
            frame: SensorFrame::default(),
            frame_source: FrameSource::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn current_char(&self) -> Option<char> {
        self.current_char
    }

    pub fn pulse(&self) -> bool {
        self.pulse
    }

    pub fn frame(&self) -> SensorFrame {
        self.frame
    }

    pub fn frame_source(&self) -> FrameSource {
        self.frame_source
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn view(&self) -> CaptureView {
        CaptureView {
            is_active: self.is_active,
            current_char: self.current_char,
            accumulated_text: self.accumulated_text.clone(),
            cursor: self.cursor,
            target: self.target.iter().collect(),
        }
    }

    /// Track the device state. Losing the device stops an active capture.
    pub fn on_connection_state(&mut self, state: ConnectionState) {
        self.connection = state;

        if matches!(state, ConnectionState::Disconnected | ConnectionState::Failed) && self.is_active {
            info!("Device is {}, stopping capture", state);
            self.stop();
        }
    }

    /// Returns true if a new capture was started. Requires a connected device.
    pub fn start(&mut self) -> bool {
        if !self.connection.is_connected() {
            debug!("Not starting capture, device is {}", self.connection);
            return false;
        }

        if self.target.is_empty() {
            warn!("Not starting capture, the target phrase is empty");
            return false;
        }

        self.accumulated_text.clear();
        self.current_char = None;
        self.cursor = 0;
        self.pulse = false;
        self.frame_source = FrameSource::Idle;
        self.is_active = true;
        info!("Capture started, expecting {} letters", self.target.len());
        true
    }

    pub fn stop(&mut self) {
        if self.is_active {
            info!("Capture stopped after {} of {} letters", self.cursor, self.target.len());
        }
        self.is_active = false;
        self.pulse = false;
    }

    pub fn on_letter_received(&mut self, letter: char, payload: Option<&SensorPayload>) -> LetterOutcome {
        if !self.is_active {
            debug!("Ignoring letter {:?}, not capturing", letter);
            return LetterOutcome::Ignored;
        }

        if !is_letter_symbol(letter) {
            debug!("Ignoring symbol {:?}", letter);
            return LetterOutcome::Ignored;
        }

        self.accumulated_text.push(letter);
        self.current_char = Some(letter);
        self.cursor += 1;
        self.pulse = true;

        if let Some(payload) = payload {
            self.apply_payload(payload);
        }

        if self.cursor == self.target.len() {
            info!("Captured {:?}", self.accumulated_text);
            self.is_active = false;
            return LetterOutcome::Completed;
        }

        LetterOutcome::Appended
    }

    pub fn clear_pulse(&mut self) {
        self.pulse = false;
    }

    /// A synthetic frame is only wanted while capturing and while the current letter has no
    /// frame of its own from the device.
    pub fn wants_synthetic_frame(&self) -> bool {
        self.is_active && self.frame_source != FrameSource::Device(self.cursor)
    }

    /// Returns true if the frame was taken.
    pub fn apply_synthetic_frame(&mut self, frame: SensorFrame) -> bool {
        if !self.wants_synthetic_frame() {
            return false;
        }

        self.frame = frame;
        self.frame_source = FrameSource::Synthetic;
        true
    }

    fn apply_payload(&mut self, payload: &SensorPayload) {
        let mut frame = self.frame;
        let mut applied = false;

        if let Some(flex) = &payload.flex {
            if flex.len() == frame.flex.len() {
                for (value, raw) in frame.flex.iter_mut().zip(flex) {
                    *value = (*raw as f32 / FLEX_RANGE as f32).clamp(0.0, 1.0);
                }
                applied = true;
            } else {
                warn!("Ignoring flex payload with {} values", flex.len());
            }
        }

        if let Some(accel) = &payload.accel {
            match accel.as_slice() {
                [x, y, z, ..] => {
                    frame.accel = [*x, *y, *z];
                    applied = true;
                },
                _ => warn!("Ignoring accel payload with {} values", accel.len()),
            }
        }

        if let Some(gyro) = &payload.gyro {
            match gyro.as_slice() {
                [x, y, z, ..] => {
                    frame.gyro = [*x, *y, *z];
                    applied = true;
                },
                _ => warn!("Ignoring gyro payload with {} values", gyro.len()),
            }
        }

        if applied {
            self.frame = frame;
            self.frame_source = FrameSource::Device(self.cursor);
        }
    }
}

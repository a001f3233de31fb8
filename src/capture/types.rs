/// Latest known glove readings. Always replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    /// thumb to pinky, 0 is straight and 1 is fully bent
    pub flex: [f32; 5],
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

impl Default for SensorFrame {
    fn default() -> Self {
        SensorFrame {
            flex: [0.5; 5],
            accel: [0.0; 3],
            gyro: [0.0; 3],
        }
    }
}

/// Where the live SensorFrame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Idle,
    Synthetic,
    /// decoded from the payload of the letter at this cursor position
    Device(usize),
}

/// Read-only view of a capture session for observers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptureView {
    pub is_active: bool,
    pub current_char: Option<char>,
    pub accumulated_text: String,
    pub cursor: usize,
    pub target: String,
}

impl CaptureView {
    pub fn is_complete(&self) -> bool {
        !self.target.is_empty() && self.cursor == self.target.chars().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Start,
    Stop,
}

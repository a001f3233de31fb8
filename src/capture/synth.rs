use std::time::Duration;

use crate::capture::types::SensorFrame;

/// Linear congruential generator, good enough for visual jitter.
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn with_seed(seed: u64) -> Self {
        Lcg { state: (seed ^ (seed >> 32)) as u32 }
    }

    pub fn next(&mut self) -> u32 {
        const A: u32 = 1103515245;
        const C: u32 = 12345;
        self.state = A.wrapping_mul(self.state).wrapping_add(C);
        self.state
    }

    /// uniform in [0, 1); the low bits of an LCG are weak so only the top 24 are used
    pub fn next_unit(&mut self) -> f32 {
        (self.next() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// uniform in [-amplitude / 2, amplitude / 2)
    pub fn jitter(&mut self, amplitude: f32) -> f32 {
        (self.next_unit() - 0.5) * amplitude
    }
}

/// Placeholder frame shown while no glove data is available: slow oscillation plus a little
/// jitter. Pure; equal inputs give equal frames.
pub fn synthesize(elapsed: Duration, seed: u64) -> SensorFrame {
    let t = elapsed.as_secs_f32();
    let mut rng = Lcg::with_seed(seed);

    let mut flex = [0.0_f32; 5];
    for (i, value) in flex.iter_mut().enumerate() {
        let base = 0.5 + 0.4 * ((t + i as f32 * 0.5) * 0.8).sin();
        *value = (base + rng.jitter(0.05)).clamp(0.1, 0.9);
    }

    let gyro = [
        4.0 * (t * 0.3).sin() + rng.jitter(1.0),
        3.0 * (t * 0.2 + 1.0).sin() + rng.jitter(1.0),
        2.0 * (t * 0.1 + 2.0).sin() + rng.jitter(1.0),
    ];

    let accel = [
        0.2 + (t * 0.5).sin() * 0.3 + rng.jitter(0.2),
        0.1 + (t * 0.4).sin() * 0.2 + rng.jitter(0.2),
        9.8 + (t * 0.3).sin() * 0.1 + rng.jitter(0.1),
    ];

    SensorFrame { flex, accel, gyro }
}

/// Frame shown once a letter is current but the glove sent no readings for it: the previous
/// values are held and the flex values drift by at most 0.01.
pub fn hold(frame: SensorFrame, seed: u64) -> SensorFrame {
    let mut rng = Lcg::with_seed(seed);

    let mut flex = frame.flex;
    for value in flex.iter_mut() {
        *value = (*value + rng.jitter(0.02)).clamp(0.1, 0.9);
    }

    SensorFrame { flex, ..frame }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let elapsed = Duration::from_millis(1234);
        assert_eq!(synthesize(elapsed, 7), synthesize(elapsed, 7));
        assert_ne!(synthesize(elapsed, 7), synthesize(elapsed, 8));
        assert_ne!(synthesize(elapsed, 7), synthesize(Duration::from_millis(2500), 7));
    }

    #[test]
    fn values_stay_in_range() {
        for step in 0..200u64 {
            let frame = synthesize(Duration::from_millis(step * 50), step);
            for flex in frame.flex {
                assert!((0.1..=0.9).contains(&flex), "flex {} out of range", flex);
            }
            assert!((9.6..=10.0).contains(&frame.accel[2]));
            assert!(frame.gyro[0].abs() <= 4.5);
        }
    }

    #[test]
    fn hold_keeps_imu_and_nudges_flex() {
        let frame = synthesize(Duration::from_millis(800), 3);
        let held = hold(frame, 11);

        assert_eq!(held.accel, frame.accel);
        assert_eq!(held.gyro, frame.gyro);
        for (before, after) in frame.flex.iter().zip(held.flex) {
            assert!((after - before).abs() <= 0.01 + f32::EPSILON);
        }
        assert_eq!(hold(frame, 11), held);
    }

    #[test]
    fn hold_clamps_device_extremes() {
        let frame = SensorFrame { flex: [1.0, 0.0, 1.0, 0.0, 1.0], ..SensorFrame::default() };
        for value in hold(frame, 5).flex {
            assert!((0.1..=0.9).contains(&value));
        }
    }

    #[test]
    fn jitter_is_bounded() {
        let mut rng = Lcg::with_seed(42);
        for _ in 0..1000 {
            let value = rng.jitter(0.2);
            assert!((-0.1..0.1).contains(&value));
        }
    }
}

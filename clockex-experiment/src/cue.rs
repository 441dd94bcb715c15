use std::f32::consts::TAU;
use std::sync::OnceLock;

/// The short beep that announces the clock. Samples are generated on first
/// use and kept for the rest of the run.
#[derive(Debug)]
pub struct CueTone {
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub gain: f32,
    pub sample_rate: u32,
    samples: OnceLock<Vec<f32>>,
}

impl Default for CueTone {
    fn default() -> Self {
        Self::new(1000.0, 80, 0.05, 44_100)
    }
}

impl CueTone {
    pub fn new(frequency_hz: f32, duration_ms: u32, gain: f32, sample_rate: u32) -> Self {
        Self {
            frequency_hz,
            duration_ms,
            gain,
            sample_rate,
            samples: OnceLock::new(),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.samples.get().is_some()
    }

    /// Mono PCM in `[-gain, gain]`.
    pub fn samples(&self) -> &[f32] {
        self.samples.get_or_init(|| {
            let len = (self.sample_rate as u64 * self.duration_ms as u64 / 1000) as usize;
            let step = TAU * self.frequency_hz / self.sample_rate as f32;
            (0..len)
                .map(|i| (step * i as f32).sin() * self.gain)
                .collect()
        })
    }
}

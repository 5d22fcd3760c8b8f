//! Linearer Verstaerker (Mikrofon-Lautstaerke)

use super::AudioProcessor;

/// Multipliziert jedes Sample mit einem festen Faktor
pub struct Gain {
    gain: f32,
    enabled: bool,
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: gain.max(0.0),
            enabled: true,
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl AudioProcessor for Gain {
    fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled || self.gain == 1.0 {
            return;
        }
        for s in samples.iter_mut() {
            *s *= self.gain;
        }
    }

    fn reset(&mut self) {}

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

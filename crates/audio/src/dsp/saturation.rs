//! Weiche Saettigung fuer den fertigen Mix
//!
//! `tanh` begrenzt die Summe vieler Sprecher auf (-1, 1) ohne harte
//! Clipping-Kanten. Kleine Pegel bleiben nahezu linear.

use super::AudioProcessor;

/// Soft-Clipper mit `tanh`-Kennlinie
pub struct SoftSaturator {
    enabled: bool,
}

impl SoftSaturator {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for SoftSaturator {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProcessor for SoftSaturator {
    fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for s in samples.iter_mut() {
            *s = s.tanh();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grosse_pegel_bleiben_unter_eins() {
        let mut sat = SoftSaturator::new();
        let mut buf = [5.0, -12.0, 0.0];
        sat.process(&mut buf);
        assert!(buf[0] < 1.0 && buf[0] > 0.99);
        assert!(buf[1] > -1.0 && buf[1] < -0.99);
        assert_eq!(buf[2], 0.0);
    }

    #[test]
    fn kleine_pegel_nahezu_linear() {
        let mut sat = SoftSaturator::new();
        let mut buf = [0.01];
        sat.process(&mut buf);
        assert!((buf[0] - 0.01).abs() < 1e-5);
    }
}

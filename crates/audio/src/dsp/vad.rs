//! Voice Activity Detection (VAD)
//!
//! Energie-basierte VAD mit Haltezeit: ein Frame gilt als Sprache, wenn
//! sein RMS ueber dem Schwellenwert liegt. Faellt die Energie darunter,
//! bleibt die VAD noch `hold_frames` Frames aktiv, damit Wortenden nicht
//! abgeschnitten werden.

use super::AudioProcessor;
use nahfunk_core::format::frames_for_ms;

/// Konfiguration fuer die VAD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    /// RMS-Schwellenwert (linear, 0.0..1.0)
    pub threshold: f32,
    /// Frames, die nach der letzten Aktivitaet noch als aktiv gelten
    pub hold_frames: u32,
}

impl VadConfig {
    /// Baut die Konfiguration aus Schwellenwert und Haltezeit in ms
    pub fn from_hold_ms(threshold: f32, hold_ms: u32) -> Self {
        Self {
            threshold,
            hold_frames: frames_for_ms(hold_ms),
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self::from_hold_ms(0.01, 500)
    }
}

/// Voice Activity Detector
pub struct Vad {
    config: VadConfig,
    hold_counter: u32,
    voice_active: bool,
    last_rms: f32,
    enabled: bool,
}

impl Vad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            hold_counter: 0,
            voice_active: false,
            last_rms: 0.0,
            enabled: true,
        }
    }

    /// Gibt zurueck ob im letzten Frame Sprache erkannt wurde
    pub fn is_voice_active(&self) -> bool {
        self.voice_active
    }

    /// RMS des zuletzt analysierten Frames
    pub fn last_rms(&self) -> f32 {
        self.last_rms
    }

    /// Analysiert einen Frame und gibt zurueck ob gesendet werden soll.
    /// Veraendert die Samples nicht.
    pub fn detect(&mut self, samples: &[f32]) -> bool {
        self.update(rms_energy(samples))
    }

    /// Entscheidung anhand eines bereits berechneten RMS-Werts
    pub fn update(&mut self, rms: f32) -> bool {
        self.last_rms = rms;
        if !self.enabled {
            self.voice_active = false;
            return false;
        }

        if rms > self.config.threshold {
            self.hold_counter = self.config.hold_frames;
            self.voice_active = true;
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
            self.voice_active = true;
        } else {
            self.voice_active = false;
        }

        self.voice_active
    }

    /// Uebernimmt neue Parameter; ein laufender Halte-Zaehler wird gekappt
    pub fn set_config(&mut self, config: VadConfig) {
        self.hold_counter = self.hold_counter.min(config.hold_frames);
        self.config = config;
    }

    pub fn config(&self) -> VadConfig {
        self.config
    }
}

impl AudioProcessor for Vad {
    /// VAD veraendert keine Samples, nur den internen Zustand
    fn process(&mut self, samples: &mut [f32]) {
        self.detect(samples);
    }

    fn reset(&mut self) {
        self.hold_counter = 0;
        self.voice_active = false;
        self.last_rms = 0.0;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Berechnet den RMS-Energiewert eines Frames
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

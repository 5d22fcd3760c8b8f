//! Sprach-Einstellungen
//!
//! `VoiceSettings` ist die serialisierbare Form (Konfigurationsdatei),
//! `SharedSettings` die zur Laufzeit geteilte Form: Skalare als Atomics,
//! die zusammengehoerigen Raum-Parameter als unveraenderlicher Snapshot
//! hinter einem Lock.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::dsp::vad::VadConfig;
use crate::spatial::SpatialParams;

/// Einstellungen der Sprach-Pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Gesamtlautstaerke der Wiedergabe (0.0..=2.0)
    pub master_volume: f32,
    /// Mikrofon-Verstaerkung
    pub mic_volume: f32,
    pub push_to_talk: bool,
    /// RMS-Schwelle der Sprachaktivitaet
    pub voice_threshold: f32,
    /// Nachlaufzeit nach Unterschreiten der Schwelle
    pub voice_hold_ms: u32,
    pub mic_muted: bool,
    pub spatial_enabled: bool,
    /// Spiel-Einheiten (cm)
    pub inner_radius: f32,
    /// Spiel-Einheiten (cm)
    pub outer_radius: f32,
    pub rolloff: f32,
    pub reverb_enabled: bool,
    pub reverb_mix: f32,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    /// Frames, die ein Teilnehmer vor der Wiedergabe puffert (0 = aus)
    pub prebuffer_frames: u32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            master_volume: 1.5,
            mic_volume: 1.2,
            push_to_talk: false,
            voice_threshold: 0.01,
            voice_hold_ms: 500,
            mic_muted: false,
            spatial_enabled: true,
            inner_radius: 2_500.0,
            outer_radius: 15_000.0,
            rolloff: 1.0,
            reverb_enabled: true,
            reverb_mix: 1.0,
            input_device: None,
            output_device: None,
            prebuffer_frames: 0,
        }
    }
}

impl VoiceSettings {
    pub fn spatial_params(&self) -> SpatialParams {
        SpatialParams {
            inner_radius: self.inner_radius,
            outer_radius: self.outer_radius,
            rolloff: self.rolloff,
            master_volume: self.master_volume,
            enabled: self.spatial_enabled,
            reverb_enabled: self.reverb_enabled,
            reverb_mix: self.reverb_mix,
        }
        .normalized()
    }

    pub fn vad_config(&self) -> VadConfig {
        VadConfig::from_hold_ms(self.voice_threshold, self.voice_hold_ms)
    }

    /// Prueft die Werte und gibt eine Beschreibung des ersten Fehlers zurueck
    pub fn validieren(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.master_volume) {
            return Err(format!(
                "master_volume muss zwischen 0.0 und 2.0 liegen: {}",
                self.master_volume
            ));
        }
        if self.mic_volume < 0.0 {
            return Err(format!("mic_volume darf nicht negativ sein: {}", self.mic_volume));
        }
        if self.voice_threshold < 0.0 {
            return Err("voice_threshold darf nicht negativ sein".into());
        }
        if self.outer_radius < self.inner_radius {
            return Err(format!(
                "outer_radius ({}) kleiner als inner_radius ({})",
                self.outer_radius, self.inner_radius
            ));
        }
        if self.rolloff <= 0.0 {
            return Err("rolloff muss groesser als 0 sein".into());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Zur Laufzeit geteilte Einstellungen, lesbar aus jedem Thread
#[derive(Debug)]
pub struct SharedSettings {
    mic_volume: AtomicF32,
    push_to_talk: AtomicBool,
    talk_key_held: AtomicBool,
    mic_muted: AtomicBool,
    prebuffer_frames: AtomicU32,
    vad: RwLock<VadConfig>,
    spatial: RwLock<SpatialParams>,
    /// Zaehlt jede Aenderung der Raum-Parameter
    spatial_generation: AtomicU32,
}

impl SharedSettings {
    pub fn new(settings: &VoiceSettings) -> Arc<Self> {
        Arc::new(Self {
            mic_volume: AtomicF32::new(settings.mic_volume),
            push_to_talk: AtomicBool::new(settings.push_to_talk),
            talk_key_held: AtomicBool::new(false),
            mic_muted: AtomicBool::new(settings.mic_muted),
            prebuffer_frames: AtomicU32::new(settings.prebuffer_frames),
            vad: RwLock::new(settings.vad_config()),
            spatial: RwLock::new(settings.spatial_params()),
            spatial_generation: AtomicU32::new(0),
        })
    }

    /// Uebernimmt alle Werte; die Taste bleibt wie sie ist
    pub fn apply(&self, settings: &VoiceSettings) {
        self.mic_volume.store(settings.mic_volume.max(0.0));
        self.push_to_talk.store(settings.push_to_talk, Ordering::Relaxed);
        self.mic_muted.store(settings.mic_muted, Ordering::Relaxed);
        self.prebuffer_frames
            .store(settings.prebuffer_frames, Ordering::Relaxed);
        *self.vad.write() = settings.vad_config();
        *self.spatial.write() = settings.spatial_params();
        self.spatial_generation.fetch_add(1, Ordering::Release);
    }

    pub fn mic_volume(&self) -> f32 {
        self.mic_volume.load()
    }

    pub fn push_to_talk(&self) -> bool {
        self.push_to_talk.load(Ordering::Relaxed)
    }

    pub fn set_push_to_talk(&self, enabled: bool) {
        self.push_to_talk.store(enabled, Ordering::Relaxed);
    }

    pub fn talk_key_held(&self) -> bool {
        self.talk_key_held.load(Ordering::Relaxed)
    }

    pub fn set_talk_key_held(&self, held: bool) {
        self.talk_key_held.store(held, Ordering::Relaxed);
    }

    pub fn mic_muted(&self) -> bool {
        self.mic_muted.load(Ordering::Relaxed)
    }

    pub fn set_mic_muted(&self, muted: bool) {
        self.mic_muted.store(muted, Ordering::Relaxed);
    }

    pub fn prebuffer_frames(&self) -> u32 {
        self.prebuffer_frames.load(Ordering::Relaxed)
    }

    pub fn vad_config(&self) -> VadConfig {
        *self.vad.read()
    }

    pub fn spatial(&self) -> SpatialParams {
        *self.spatial.read()
    }

    pub fn spatial_generation(&self) -> u32 {
        self.spatial_generation.load(Ordering::Acquire)
    }
}

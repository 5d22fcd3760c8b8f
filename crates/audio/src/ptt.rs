//! Sende-Entscheidung: Push-to-Talk oder Sprachaktivierung
//!
//! Im Hold-Modus wird genau dann gesendet, wenn die Taste gehalten wird;
//! die Sprachaktivitaet spielt dann keine Rolle. Mute ueberschreibt alles.

use crate::settings::SharedSettings;

/// Betriebsmodus der Sende-Entscheidung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PttMode {
    /// Taste halten um zu senden
    Hold,
    /// Automatische Aktivierung per Voice Activity Detection
    #[default]
    VoiceActivation,
}

impl PttMode {
    pub fn from_push_to_talk(push_to_talk: bool) -> Self {
        if push_to_talk {
            PttMode::Hold
        } else {
            PttMode::VoiceActivation
        }
    }
}

/// Push-to-Talk Controller des Capture-Pfads
#[derive(Debug, Clone)]
pub struct PttController {
    mode: PttMode,
    key_held: bool,
    vad_active: bool,
    muted: bool,
}

impl PttController {
    pub fn new(mode: PttMode) -> Self {
        Self {
            mode,
            key_held: false,
            vad_active: false,
            muted: false,
        }
    }

    /// Uebernimmt Modus, Taste und Mute aus den geteilten Einstellungen
    pub fn sync(&mut self, settings: &SharedSettings) {
        let mode = PttMode::from_push_to_talk(settings.push_to_talk());
        if mode != self.mode {
            self.set_mode(mode);
        }
        self.key_held = settings.talk_key_held();
        self.muted = settings.mic_muted();
    }

    pub fn key_down(&mut self) {
        self.key_held = true;
    }

    pub fn key_up(&mut self) {
        self.key_held = false;
    }

    pub fn set_vad_active(&mut self, active: bool) {
        self.vad_active = active;
    }

    /// Modus wechseln, setzt Taste und VAD-Zustand zurueck
    pub fn set_mode(&mut self, mode: PttMode) {
        self.mode = mode;
        self.key_held = false;
        self.vad_active = false;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_transmitting(&self) -> bool {
        if self.muted {
            return false;
        }
        match self.mode {
            PttMode::Hold => self.key_held,
            PttMode::VoiceActivation => self.vad_active,
        }
    }

    pub fn mode(&self) -> PttMode {
        self.mode
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

//! DSP-Module fuer Capture und Mix
//!
//! Alle Module implementieren das `AudioProcessor` Trait fuer eine
//! einheitliche Nutzung in Capture-Pfad und Mixer.

pub mod gain;
pub mod saturation;
pub mod vad;

/// Gemeinsames Trait fuer alle Audio-Prozessoren
///
/// Alle DSP-Bausteine verarbeiten Samples in-place, allokieren nicht
/// und sind Send + Sync fuer die Nutzung in cpal-Callbacks.
pub trait AudioProcessor: Send + Sync {
    /// Verarbeitet einen Puffer von Samples in-place
    fn process(&mut self, samples: &mut [f32]);

    /// Setzt den internen Zustand zurueck
    fn reset(&mut self);

    /// Gibt zurueck ob der Prozessor aktiv ist
    fn is_enabled(&self) -> bool;

    /// Aktiviert oder deaktiviert den Prozessor
    fn set_enabled(&mut self, enabled: bool);
}

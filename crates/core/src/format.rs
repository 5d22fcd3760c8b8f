//! Audio-Format und Einheiten
//!
//! Alle Stufen der Pipeline arbeiten mit ganzen 20 ms-Frames bei 48 kHz.
//! Positionen kommen in Spiel-Einheiten (Unreal Units, 1 UU = 1 cm).

/// Abtastrate in Hz
pub const SAMPLE_RATE: u32 = 48_000;

/// Frame-Dauer in Millisekunden
pub const FRAME_DURATION_MS: u32 = 20;

/// Samples pro Mono-Frame (20 ms bei 48 kHz)
pub const FRAME_SIZE: usize = (SAMPLE_RATE / 1000 * FRAME_DURATION_MS) as usize;

/// Interleaved Samples pro Stereo-Frame
pub const STEREO_FRAME_SIZE: usize = FRAME_SIZE * 2;

/// Obergrenze fuer ein komprimiertes Frame in Bytes
pub const MAX_COMPRESSED_FRAME_BYTES: usize = 1024;

/// Spiel-Einheiten pro Meter
pub const UNITS_PER_METER: f32 = 100.0;

/// Rechnet Spiel-Einheiten in Meter um
#[inline]
pub fn units_to_meters(units: f32) -> f32 {
    units / UNITS_PER_METER
}

/// Anzahl Frames fuer eine Dauer in Millisekunden (abgerundet)
#[inline]
pub fn frames_for_ms(ms: u32) -> u32 {
    ms / FRAME_DURATION_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_groessen() {
        assert_eq!(FRAME_SIZE, 960);
        assert_eq!(STEREO_FRAME_SIZE, 1920);
    }

    #[test]
    fn hold_zeit_in_frames() {
        assert_eq!(frames_for_ms(500), 25);
        assert_eq!(frames_for_ms(19), 0);
        assert_eq!(frames_for_ms(40), 2);
    }

    #[test]
    fn einheiten_umrechnung() {
        assert!((units_to_meters(2500.0) - 25.0).abs() < 1e-6);
    }
}

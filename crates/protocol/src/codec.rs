//! Codec-Konfiguration fuer die Sprachuebertragung
//!
//! Es gibt genau einen Codec (Opus, Mono, 48 kHz, 20 ms). Konfigurierbar
//! sind nur die Encoder-Parameter; beide Seiten muessen nichts aushandeln.

use nahfunk_core::format::{FRAME_SIZE, SAMPLE_RATE};
use serde::{Deserialize, Serialize};

/// Encoder-Parameter fuer Sprache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechCodecConfig {
    /// Ziel-Bitrate in bit/s (6000–510000)
    pub bitrate_bps: i32,
    /// Komplexitaet (0–10, hoeher = bessere Qualitaet, mehr CPU)
    pub complexity: u8,
    /// Inband Forward Error Correction
    pub fec_enabled: bool,
    /// Erwarteter Paketverlust in Prozent, steuert die FEC-Redundanz
    pub packet_loss_perc: u8,
    /// Discontinuous Transmission (Stille wird nicht uebertragen)
    pub dtx_enabled: bool,
}

impl Default for SpeechCodecConfig {
    fn default() -> Self {
        Self {
            bitrate_bps: 32_000,
            complexity: 5,
            fec_enabled: true,
            packet_loss_perc: 5,
            dtx_enabled: true,
        }
    }
}

impl SpeechCodecConfig {
    /// Abtastrate (fest)
    pub const SAMPLE_RATE: u32 = SAMPLE_RATE;
    /// Samples pro Frame (fest)
    pub const FRAME_SIZE: usize = FRAME_SIZE;

    /// Validiert die Konfiguration
    pub fn validieren(&self) -> Result<(), String> {
        if !(6_000..=510_000).contains(&self.bitrate_bps) {
            return Err(format!(
                "Bitrate muss zwischen 6000 und 510000 bit/s liegen (war: {})",
                self.bitrate_bps
            ));
        }
        if self.complexity > 10 {
            return Err(format!(
                "Komplexitaet muss zwischen 0 und 10 liegen (war: {})",
                self.complexity
            ));
        }
        if self.packet_loss_perc > 100 {
            return Err(format!(
                "Paketverlust muss zwischen 0 und 100 Prozent liegen (war: {})",
                self.packet_loss_perc
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ist_sprach_tuning() {
        let cfg = SpeechCodecConfig::default();
        assert_eq!(cfg.bitrate_bps, 32_000);
        assert_eq!(cfg.complexity, 5);
        assert!(cfg.fec_enabled);
        assert_eq!(cfg.packet_loss_perc, 5);
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn ungueltige_werte() {
        let cfg = SpeechCodecConfig {
            bitrate_bps: 1000,
            ..Default::default()
        };
        assert!(cfg.validieren().is_err());

        let cfg = SpeechCodecConfig {
            complexity: 11,
            ..Default::default()
        };
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn frame_konstanten() {
        assert_eq!(SpeechCodecConfig::FRAME_SIZE, 960);
        assert_eq!(SpeechCodecConfig::SAMPLE_RATE, 48_000);
    }
}

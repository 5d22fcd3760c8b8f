//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, der Client laeuft also auch ohne Konfigurationsdatei.

use nahfunk_audio::VoiceSettings;
use nahfunk_core::{NahfunkError, Vec3};
use nahfunk_protocol::SpeechCodecConfig;
use nahfunk_relay::RelayConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sprach-Pipeline und Geraete
    pub audio: VoiceSettings,
    /// Encoder-Parameter
    pub codec: SpeechCodecConfig,
    /// Relay-Verbindung
    pub relay: RelayConfig,
    /// Sitzung, die nach dem Verbinden betreten wird
    pub sitzung: SitzungEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Sitzung und lokaler Sprecher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungEinstellungen {
    /// Raum beim Relay (z.B. Match-ID)
    pub session_id: String,
    pub display_name: String,
    /// Numerische Kennung; leer = zufaellig beim Start
    pub identity: String,
    /// Eigene Position in Spiel-Einheiten
    pub emitter_position: [f32; 3],
    /// Blickrichtung in Radiant
    pub yaw: f32,
    /// Abstand der Positions-Updates waehrend Stille
    pub position_intervall_ms: u64,
}

impl Default for SitzungEinstellungen {
    fn default() -> Self {
        Self {
            session_id: "lobby".into(),
            display_name: "Spieler".into(),
            identity: String::new(),
            emitter_position: [0.0; 3],
            yaw: 0.0,
            position_intervall_ms: 1000,
        }
    }
}

impl SitzungEinstellungen {
    pub fn emitter(&self) -> Vec3 {
        Vec3::from_array(self.emitter_position)
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Zufaellige numerische Kennung, wie sie der Relay auf dem Draht erwartet
pub fn zufaellige_identitaet() -> String {
    uuid::Uuid::new_v4().as_u64_pair().0.to_string()
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        if config.sitzung.identity.is_empty() {
            config.sitzung.identity = zufaellige_identitaet();
        }
        Ok(config)
    }

    pub fn aus_toml(inhalt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(inhalt)
    }

    /// Prueft alle Abschnitte und nennt den ersten Fehler
    pub fn validieren(&self) -> nahfunk_core::Result<()> {
        self.audio.validieren().map_err(|e| konfig_fehler("audio", e))?;
        self.codec.validieren().map_err(|e| konfig_fehler("codec", e))?;
        self.relay.validieren().map_err(|e| konfig_fehler("relay", e))?;
        if self.sitzung.session_id.is_empty() {
            return Err(konfig_fehler("sitzung", "session_id darf nicht leer sein"));
        }
        if !self.sitzung.identity.is_empty() && self.sitzung.identity.parse::<u64>().is_err() {
            return Err(konfig_fehler(
                "sitzung",
                format!("identity muss numerisch sein: {}", self.sitzung.identity),
            ));
        }
        if !nahfunk_observability::log_level_gueltig(&self.logging.level) {
            return Err(konfig_fehler(
                "logging",
                format!("unbekanntes Level: {}", self.logging.level),
            ));
        }
        if !nahfunk_observability::log_format_gueltig(&self.logging.format) {
            return Err(konfig_fehler(
                "logging",
                format!("unbekanntes Format: {}", self.logging.format),
            ));
        }
        Ok(())
    }
}

fn konfig_fehler(abschnitt: &str, e: impl std::fmt::Display) -> NahfunkError {
    NahfunkError::Konfiguration(format!("[{abschnitt}] {e}"))
}

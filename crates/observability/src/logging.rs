//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `NF_LOG_LEVEL`: Filter-Direktive (z.B. `debug` oder `nahfunk_relay=trace`)
//! - `NF_LOG_FORMAT`: Format (text/json)
//!
//! Die Umgebung hat Vorrang vor den Werten aus der Konfigurationsdatei.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "NF_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "NF_LOG_FORMAT";

/// Abhaengigkeiten, die auf `debug` sehr gespraechig sind
const LEISE_CRATES: &[&str] = &["tungstenite=warn", "tokio_tungstenite=warn", "cpal=warn"];

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Ungueltiges Log-Format: {0} (erlaubt: text, json)")]
    UngueltigesFormat(String),

    #[error("Logging bereits initialisiert: {0}")]
    BereitsInitialisiert(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::UngueltigesFormat(other.to_string())),
        }
    }
}

/// Baut die Filter-Direktive aus Level und den leisen Crates
fn filter_direktive(level: &str) -> String {
    let mut direktive = level.to_string();
    for leise in LEISE_CRATES {
        direktive.push(',');
        direktive.push_str(leise);
    }
    direktive
}

/// Waehlt das Format: Umgebung vor Konfiguration
fn format_waehlen(env: Option<String>, konfiguriert: &str) -> Result<LogFormat, LoggingError> {
    env.as_deref().unwrap_or(konfiguriert).parse()
}

/// Initialisiert das Logging-System.
///
/// Unbekannte Level fallen auf `info` zurueck, ein unbekanntes Format ist
/// ein Fehler. Ein zweiter Aufruf liefert `BereitsInitialisiert`.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(filter_direktive(level)))
        .unwrap_or_else(|_| EnvFilter::new(filter_direktive("info")));

    let format = format_waehlen(std::env::var(ENV_LOG_FORMAT).ok(), format)?;

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .try_init(),
    };
    ergebnis.map_err(|e| LoggingError::BereitsInitialisiert(e.to_string()))
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    LogFormat::from_str(format).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level), "{level}");
        }
    }

    #[test]
    fn log_level_ungueltige_werte() {
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_parsen() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }

    #[test]
    fn umgebung_hat_vorrang_beim_format() {
        assert_eq!(
            format_waehlen(Some("json".into()), "text").unwrap(),
            LogFormat::Json
        );
        assert_eq!(format_waehlen(None, "text").unwrap(), LogFormat::Text);
        assert!(format_waehlen(Some("yaml".into()), "text").is_err());
    }

    #[test]
    fn direktive_daempft_transport_crates() {
        let d = filter_direktive("debug");
        assert!(d.starts_with("debug,"));
        assert!(d.contains("tungstenite=warn"));
        assert!(EnvFilter::try_new(&d).is_ok());
    }

    #[test]
    fn zweite_initialisierung_ist_fehler() {
        // Der erste Aufruf kann scheitern, falls ein anderer Test schon initialisiert hat
        let _ = logging_initialisieren("info", "text");
        assert!(matches!(
            logging_initialisieren("info", "text"),
            Err(LoggingError::BereitsInitialisiert(_))
        ));
    }
}

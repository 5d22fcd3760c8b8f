//! Fehlertypen fuer den Relay-Client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Aktion verlangt eine bestehende Verbindung
    #[error("Nicht mit dem Relay verbunden")]
    NichtVerbunden,

    /// Aktion verlangt einen betretenen Raum
    #[error("Kein Raum betreten")]
    KeinRaum,

    /// `connect` ausserhalb einer tokio-Laufzeit
    #[error("Keine tokio-Laufzeit verfuegbar")]
    KeineLaufzeit,

    /// Ausgangs-Queue voll oder geschlossen
    #[error("Senden fehlgeschlagen: {0}")]
    SendFehler(String),

    #[error("Serialisierungsfehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ungueltige Konfiguration: {0}")]
    Konfiguration(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl From<RelayError> for nahfunk_core::NahfunkError {
    fn from(e: RelayError) -> Self {
        use nahfunk_core::NahfunkError;
        match e {
            RelayError::NichtVerbunden => NahfunkError::NichtVerbunden,
            RelayError::KeinRaum => NahfunkError::KeinRaum,
            other => NahfunkError::Verbindung(other.to_string()),
        }
    }
}

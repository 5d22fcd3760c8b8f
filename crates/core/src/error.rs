//! Fehlertypen fuer Nahfunk
//!
//! Zentraler Fehler-Enum fuer Verbindungs-, Protokoll- und
//! Konfigurationsfehler. Die Audio-Engine hat einen eigenen Fehlertyp,
//! der sich via `From` hierher konvertieren laesst.

use thiserror::Error;

/// Globaler Result-Alias fuer Nahfunk
pub type Result<T> = std::result::Result<T, NahfunkError>;

/// Alle Fehler ausserhalb des Echtzeit-Audiopfads
#[derive(Debug, Error)]
pub enum NahfunkError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    #[error("Nicht verbunden")]
    NichtVerbunden,

    #[error("Keinem Raum beigetreten")]
    KeinRaum,

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Relay-Server meldet Fehler: {0}")]
    Server(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Audio ---
    #[error("Audiofehler: {0}")]
    Audio(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl NahfunkError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn ein erneuter Verbindungsversuch sinnvoll ist
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Verbindung(_) | Self::Getrennt(_)
        )
    }
}

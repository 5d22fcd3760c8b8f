//! Fehlertypen fuer die Audio-Engine
//!
//! Diese Fehler verlassen nie einen Echtzeit-Callback. Sie entstehen beim
//! Oeffnen von Geraeten, beim Anlegen von Codecs und bei Engine-Kommandos.

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Engine
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Audio-Engine-Thread nicht erreichbar")]
    EngineBeendet,

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;

impl From<AudioError> for nahfunk_core::NahfunkError {
    fn from(e: AudioError) -> Self {
        nahfunk_core::NahfunkError::Audio(e.to_string())
    }
}

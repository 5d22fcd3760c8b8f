//! Verbindungs- und Sitzungszustand

use std::fmt;

/// Zustand der Relay-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Verbindung verloren, automatische Wiederverbindung laeuft
    Reconnecting,
    /// Transportfehler oder Fehler vom Relay; kein automatischer Neuversuch
    Error,
}

impl SessionState {
    /// Lesbarer Zustand fuer Anzeige und Logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting...",
            SessionState::Connected => "Connected",
            SessionState::Reconnecting => "Reconnecting...",
            SessionState::Error => "Error",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

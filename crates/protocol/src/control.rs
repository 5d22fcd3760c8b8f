//! Steuer-Protokoll (WebSocket, Text-Frames mit JSON)
//!
//! Alle Nachrichten tragen ein `type`-Feld. Die Feldnamen folgen dem
//! Relay-Server (`matchId`, `playerName`, `steamId`); die neutralen Namen
//! `sessionId`, `displayName` und `identity` werden beim Lesen ebenfalls
//! akzeptiert. Unbekannte Typen werden zu `ServerMessage::Unknown`.

use nahfunk_core::PeerId;
use serde::{Deserialize, Deserializer, Serialize};

/// Platzhalter wenn der Relay keinen Anzeigenamen mitschickt
pub const UNBEKANNTER_NAME: &str = "Unknown";

fn unbekannter_name() -> String {
    UNBEKANNTER_NAME.to_string()
}

/// Manche Relays schicken die Kennung als Zahl statt als String
fn peer_id_tolerant<'de, D>(deserializer: D) -> Result<PeerId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Kennung {
        Text(String),
        Zahl(u64),
    }

    Ok(match Kennung::deserialize(deserializer)? {
        Kennung::Text(s) => PeerId::from(s),
        Kennung::Zahl(n) => PeerId::from(n),
    })
}

// ---------------------------------------------------------------------------
// Client -> Relay
// ---------------------------------------------------------------------------

/// Nachrichten vom Client an den Relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Raum (Sitzung) betreten
    Join {
        #[serde(rename = "matchId", alias = "sessionId")]
        session_id: String,
        #[serde(rename = "playerName", alias = "displayName")]
        display_name: String,
        #[serde(rename = "steamId", alias = "identity")]
        identity: String,
    },
    /// Aktuellen Raum verlassen
    Leave,
    /// Positions-Update ohne Audio (z.B. waehrend Stille)
    Position {
        x: f32,
        y: f32,
        z: f32,
        yaw: f32,
        pitch: f32,
    },
}

impl ClientMessage {
    /// Serialisiert die Nachricht als JSON-Text
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Relay -> Client
// ---------------------------------------------------------------------------

/// Eintrag der Teilnehmerliste in `welcome`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(
        rename = "steamId",
        alias = "identity",
        deserialize_with = "peer_id_tolerant"
    )]
    pub id: PeerId,
    #[serde(
        rename = "playerName",
        alias = "displayName",
        default = "unbekannter_name"
    )]
    pub display_name: String,
}

/// Nachrichten vom Relay an den Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Beitritt bestaetigt, enthaelt die bereits anwesenden Teilnehmer
    Welcome {
        #[serde(default)]
        peers: Vec<RosterEntry>,
    },
    /// Ein Teilnehmer hat den Raum betreten
    PeerJoined {
        #[serde(flatten)]
        peer: RosterEntry,
    },
    /// Ein Teilnehmer hat den Raum verlassen
    PeerLeft {
        #[serde(flatten)]
        peer: RosterEntry,
    },
    /// Positions-Update eines Teilnehmers
    PeerPosition {
        #[serde(
            rename = "steamId",
            alias = "identity",
            deserialize_with = "peer_id_tolerant"
        )]
        id: PeerId,
        x: f32,
        y: f32,
        z: f32,
    },
    /// Anwendungs-Pong des Relays; der Keepalive laeuft ueber
    /// WebSocket-Ping-Frames, daher wird er ignoriert
    Pong,
    /// Vom Relay gemeldeter Fehler
    Error {
        #[serde(default)]
        message: String,
    },
    /// Jeder andere Typ wird ignoriert
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Parst eine JSON-Textnachricht
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

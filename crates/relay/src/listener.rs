//! Ereignis-Schnittstelle des Relay-Clients
//!
//! Alle Methoden werden aus dem Netzwerk-Task aufgerufen und muessen
//! schnell zurueckkehren. Standard-Implementierungen tun nichts.

use nahfunk_core::{PeerId, PeerInfo, Vec3};
use nahfunk_protocol::IncomingAudioPacket;

use crate::state::SessionState;

pub trait RelayListener: Send + Sync {
    /// Zustandswechsel mit kurzer Beschreibung
    fn on_state_changed(&self, _state: SessionState, _info: &str) {}

    fn on_peer_joined(&self, _peer: &PeerInfo) {}

    fn on_peer_left(&self, _peer: &PeerInfo) {}

    /// Positions-Update eines Teilnehmers ohne Audio
    fn on_peer_position(&self, _id: &PeerId, _position: Vec3) {}

    /// Audio-Paket eines anderen Teilnehmers (nie das eigene Echo)
    fn on_audio_packet(&self, _packet: &IncomingAudioPacket) {}
}

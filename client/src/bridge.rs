//! Bruecke zwischen Relay-Client und Sprach-Pipeline
//!
//! ```text
//! Relay (Netzwerk-Task)              AudioPipeline
//!   on_audio_packet    ------------>  feed_incoming_packet
//!   on_peer_position   ------------>  update_peer_position
//!   on_peer_left       ------------>  remove_peer
//!   Disconnected/Reconnecting ----->  clear_peers
//!   Connected ohne Raum ---> join_room (Auto-Join)
//!
//! Capture-Callback
//!   kodiertes Paket    ------------>  RelayClient::send_audio
//! ```

use std::sync::Arc;

use nahfunk_audio::AudioPipeline;
use nahfunk_core::{PeerId, PeerInfo, Vec3};
use nahfunk_protocol::IncomingAudioPacket;
use nahfunk_relay::{RelayClient, RelayListener, SessionState, WeakRelayClient};
use tracing::{debug, info, warn};

/// Sitzung, die bei jedem `Connected` betreten wird
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoJoin {
    pub session_id: String,
    pub display_name: String,
    pub identity: String,
}

/// Leitet Relay-Ereignisse an die Pipeline weiter
pub struct RelayBridge {
    pipeline: AudioPipeline,
    relay: WeakRelayClient,
    auto_join: Option<AutoJoin>,
}

impl RelayBridge {
    /// Verdrahtet beide Richtungen und gibt die registrierte Bruecke zurueck
    pub fn installieren(
        pipeline: &AudioPipeline,
        relay: &RelayClient,
        auto_join: Option<AutoJoin>,
    ) -> Arc<Self> {
        let bridge = Arc::new(Self {
            pipeline: pipeline.clone(),
            relay: relay.downgrade(),
            auto_join,
        });
        relay.subscribe(bridge.clone());

        let sink_relay = relay.downgrade();
        pipeline.set_packet_sink(move |bytes| {
            if let Some(relay) = sink_relay.upgrade() {
                relay.send_audio(bytes);
            }
        });
        bridge
    }

    fn beitreten(relay: &RelayClient, join: &AutoJoin) -> nahfunk_core::Result<()> {
        relay.join_room(&join.session_id, &join.display_name, &join.identity)?;
        info!(raum = %join.session_id, "Sitzung automatisch betreten");
        Ok(())
    }
}

impl RelayListener for RelayBridge {
    fn on_state_changed(&self, state: SessionState, info: &str) {
        debug!(state = %state, info, "Relay-Zustand");
        match state {
            SessionState::Connected => {
                let (Some(join), Some(relay)) = (&self.auto_join, self.relay.upgrade()) else {
                    return;
                };
                if relay.current_session().is_some() {
                    return;
                }
                if let Err(e) = Self::beitreten(&relay, join) {
                    // Bei Verbindungsfehlern folgt ohnehin ein neues Connected
                    warn!(
                        fehler = %e,
                        wiederholbar = e.ist_wiederholbar(),
                        raum = %join.session_id,
                        "Auto-Join fehlgeschlagen"
                    );
                }
            }
            SessionState::Disconnected | SessionState::Reconnecting => {
                self.pipeline.clear_peers();
            }
            SessionState::Connecting | SessionState::Error => {}
        }
    }

    fn on_peer_joined(&self, peer: &PeerInfo) {
        debug!(peer = %peer.id, name = %peer.display_name, "Teilnehmer im Roster");
    }

    fn on_peer_left(&self, peer: &PeerInfo) {
        self.pipeline.remove_peer(&peer.id);
    }

    fn on_peer_position(&self, id: &PeerId, position: Vec3) {
        self.pipeline.update_peer_position(id, position);
    }

    fn on_audio_packet(&self, packet: &IncomingAudioPacket) {
        self.pipeline.feed_incoming_packet(packet.clone());
    }
}

//! Teilnehmerliste der aktuellen Sitzung

use std::collections::BTreeMap;

use nahfunk_core::{PeerId, PeerInfo};

#[derive(Debug, Default, Clone)]
pub struct Roster {
    peers: BTreeMap<PeerId, PeerInfo>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fuegt hinzu oder aktualisiert den Anzeigenamen
    pub fn insert(&mut self, peer: PeerInfo) {
        self.peers.insert(peer.id.clone(), peer);
    }

    pub fn remove(&mut self, id: &PeerId) -> Option<PeerInfo> {
        self.peers.remove(id)
    }

    pub fn get(&self, id: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(id)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Kopie aller Eintraege, sortiert nach Kennung
    pub fn snapshot(&self) -> Vec<PeerInfo> {
        self.peers.values().cloned().collect()
    }
}

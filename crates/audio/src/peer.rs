//! Zustand entfernter Teilnehmer
//!
//! Die Tabelle haelt alle `PeerState`s in einem dichten Vec (Slot-Arena)
//! plus einer Zuordnung Kennung -> Index. Entfernen tauscht mit dem
//! letzten Eintrag und korrigiert dessen Index.

use std::collections::HashMap;
use std::time::Instant;

use nahfunk_core::{PeerId, Vec3};
use tracing::debug;

use crate::codec::SpeechDecoder;
use crate::error::AudioResult;
use crate::jitter::JitterBuffer;
use crate::spatial::{SpatialParams, SpatialRenderer};

/// Ein entfernter Teilnehmer
pub struct PeerState {
    pub id: PeerId,
    pub decoder: SpeechDecoder,
    pub jitter: JitterBuffer,
    pub spatial: SpatialRenderer,
    pub position: Vec3,
    pub last_packet: Instant,
    /// Aufeinanderfolgende Verschleierungs-Frames seit dem letzten Paket
    pub plc_count: u32,
    pub active: bool,
    /// Wartet auf genug gepufferte Samples vor der ersten Wiedergabe
    pub prebuffering: bool,
}

impl PeerState {
    pub fn new(id: PeerId, params: SpatialParams, now: Instant) -> AudioResult<Self> {
        Ok(Self {
            id,
            decoder: SpeechDecoder::new()?,
            jitter: JitterBuffer::default(),
            spatial: SpatialRenderer::new(params),
            position: Vec3::ZERO,
            last_packet: now,
            plc_count: 0,
            active: true,
            prebuffering: false,
        })
    }
}

/// Teilnehmer-Tabelle
#[derive(Default)]
pub struct PeerTable {
    slots: Vec<PeerState>,
    index: HashMap<PeerId, usize>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PeerId) -> Option<&PeerState> {
        self.index.get(id).map(|&i| &self.slots[i])
    }

    pub fn get_mut(&mut self, id: &PeerId) -> Option<&mut PeerState> {
        self.index.get(id).map(|&i| &mut self.slots[i])
    }

    /// Liefert den Teilnehmer oder legt ihn mit `create` an
    pub fn get_or_insert_with<F>(&mut self, id: &PeerId, create: F) -> AudioResult<&mut PeerState>
    where
        F: FnOnce() -> AudioResult<PeerState>,
    {
        let slot = match self.index.get(id) {
            Some(&i) => i,
            None => {
                let peer = create()?;
                let i = self.slots.len();
                self.slots.push(peer);
                self.index.insert(id.clone(), i);
                debug!(peer = %id, slot = i, "Teilnehmer angelegt");
                i
            }
        };
        Ok(&mut self.slots[slot])
    }

    pub fn remove(&mut self, id: &PeerId) -> Option<PeerState> {
        let i = self.index.remove(id)?;
        let removed = self.slots.swap_remove(i);
        if let Some(moved) = self.slots.get(i) {
            self.index.insert(moved.id.clone(), i);
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|p| p.active).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerState> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerState> {
        self.slots.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str) -> AudioResult<PeerState> {
        PeerState::new(PeerId::from(id), SpatialParams::default(), Instant::now())
    }

    #[test]
    fn einfuegen_und_finden() {
        let mut table = PeerTable::new();
        let id = PeerId::from("42");
        table.get_or_insert_with(&id, || peer("42")).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get(&id).is_some());

        // Zweiter Zugriff legt nicht erneut an
        table
            .get_or_insert_with(&id, || panic!("darf nicht neu anlegen"))
            .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn entfernen_korrigiert_index() {
        let mut table = PeerTable::new();
        for id in ["a", "b", "c"] {
            table
                .get_or_insert_with(&PeerId::from(id), || peer(id))
                .unwrap();
        }
        let entfernt = table.remove(&PeerId::from("a")).unwrap();
        assert_eq!(entfernt.id.as_str(), "a");
        assert_eq!(table.len(), 2);
        // "c" wurde in Slot 0 verschoben und muss weiter auffindbar sein
        assert_eq!(table.get(&PeerId::from("c")).unwrap().id.as_str(), "c");
        assert_eq!(table.get(&PeerId::from("b")).unwrap().id.as_str(), "b");
        assert!(table.get(&PeerId::from("a")).is_none());
    }

    #[test]
    fn letzten_entfernen() {
        let mut table = PeerTable::new();
        table.get_or_insert_with(&PeerId::from("x"), || peer("x")).unwrap();
        assert!(table.remove(&PeerId::from("x")).is_some());
        assert!(table.is_empty());
        assert!(table.remove(&PeerId::from("x")).is_none());
    }

    #[test]
    fn aktive_zaehlen() {
        let mut table = PeerTable::new();
        for id in ["a", "b"] {
            table
                .get_or_insert_with(&PeerId::from(id), || peer(id))
                .unwrap();
        }
        table.get_mut(&PeerId::from("a")).unwrap().active = false;
        assert_eq!(table.active_count(), 1);
        table.clear();
        assert_eq!(table.active_count(), 0);
    }
}

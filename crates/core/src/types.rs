//! Gemeinsame Typen: Geometrie und Teilnehmer-Kennungen
//!
//! Positionen sind `glam::Vec3` in Spiel-Einheiten. Teilnehmer werden
//! ueber einen stabilen String-Schluessel identifiziert (Newtype-Pattern),
//! auf dem Draht ist das eine u64-Kennung.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

pub use glam::Vec3;

/// Stabile Kennung eines entfernten Teilnehmers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Erstellt eine Kennung aus einem beliebigen String
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt den String-Schluessel zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Versucht die Kennung als numerische Draht-ID zu lesen
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl From<u64> for PeerId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Eintrag im Teilnehmer-Roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub display_name: String,
}

/// Hoerer-Pose: Position und Blickrichtung (Gier-Winkel)
///
/// Wird einmal pro Spiel-Tick geschrieben und in jedem Playback-Callback
/// als Kopie gelesen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ListenerPose {
    /// Position in Spiel-Einheiten
    pub position: Vec3,
    /// Gier-Winkel in Radiant (0 = +X, positiv dreht von +X nach +Y, Y zeigt nach rechts)
    pub yaw: f32,
}

impl ListenerPose {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self { position, yaw }
    }

    /// Erstellt eine Pose aus Unreal-Rotationseinheiten (0..65535 = volle Drehung)
    pub fn from_unreal(position: Vec3, yaw_units: i32) -> Self {
        let yaw = (yaw_units & 0xFFFF) as f32 * (TAU / 65536.0);
        Self { position, yaw }
    }

    /// Vorwaerts-Vektor in der horizontalen Ebene
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), self.yaw.sin(), 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_aus_u64() {
        let id = PeerId::from(76561198000000001u64);
        assert_eq!(id.as_str(), "76561198000000001");
        assert_eq!(id.as_u64(), Some(76561198000000001));
    }

    #[test]
    fn peer_id_nicht_numerisch() {
        let id = PeerId::from("gast");
        assert_eq!(id.as_u64(), None);
        assert_eq!(id.to_string(), "gast");
    }

    #[test]
    fn peer_id_serde_transparent() {
        let json = serde_json::to_string(&PeerId::from(42u64)).unwrap();
        assert_eq!(json, "\"42\"");
    }

    #[test]
    fn unreal_yaw_umrechnung() {
        let pose = ListenerPose::from_unreal(Vec3::ZERO, 16384);
        assert!((pose.yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        // Ueberlauf wird auf eine Umdrehung gefaltet
        let pose = ListenerPose::from_unreal(Vec3::ZERO, 65536 + 16384);
        assert!((pose.yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn forward_vektor() {
        let pose = ListenerPose::new(Vec3::ZERO, 0.0);
        assert!((pose.forward() - Vec3::X).length() < 1e-6);
    }
}

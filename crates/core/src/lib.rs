//! nahfunk-core – Gemeinsame Typen, Konstanten und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Audio-Pipeline,
//! Protokoll und Relay-Client gemeinsam genutzt werden.

pub mod error;
pub mod format;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{NahfunkError, Result};
pub use types::{ListenerPose, PeerId, PeerInfo, Vec3};

//! nahfunk-client – Host fuer Audio-Engine und Relay-Verbindung
//!
//! Laedt die Konfiguration, verdrahtet die Sprach-Pipeline mit dem
//! Relay-Client und betritt automatisch die konfigurierte Sitzung.

pub mod bridge;
pub mod config;

pub use bridge::RelayBridge;
pub use config::ClientConfig;

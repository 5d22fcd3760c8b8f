//! nahfunk-relay – Verbindung zum Relay-Server
//!
//! ## Architektur
//!
//! ```text
//! RelayClient (Handle, Clone teilt den Zustand)
//!     |
//!     v
//! Verbindungs-Task (tokio)
//!     |  State Machine: Disconnected -> Connecting -> Connected
//!     |                 -> {Reconnecting, Error, Disconnected}
//!     |
//!     +-- Text-Frames   -> Roster, Fehler  -> RelayListener
//!     +-- Binaer-Frames -> Audio-Pakete    -> RelayListener
//!     +-- Ausgangs-Queue (begrenzt, try_send) -> WebSocket
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod listener;
pub mod roster;
pub mod state;

// Bequeme Re-Exporte
pub use client::{RelayClient, RelayTelemetry, WeakRelayClient};
pub use config::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use listener::RelayListener;
pub use roster::Roster;
pub use state::SessionState;

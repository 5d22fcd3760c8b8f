//! nahfunk-protocol – Draht-Protokoll zum Relay-Server
//!
//! - `voice`: binaere Audio-Nachrichten (little-endian, kein serde)
//! - `control`: JSON-Steuernachrichten (Raum betreten/verlassen, Roster)
//! - `codec`: Parameter des Sprach-Codecs

pub mod codec;
pub mod control;
pub mod voice;

pub use codec::SpeechCodecConfig;
pub use control::{ClientMessage, RosterEntry, ServerMessage};
pub use voice::{IncomingAudioPacket, OutgoingAudioPacket, MSG_AUDIO};

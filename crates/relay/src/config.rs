//! Konfiguration des Relay-Clients

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket-URL des Relay-Servers
    pub server_url: String,
    /// Nach Verbindungsverlust automatisch neu verbinden
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
    /// Intervall fuer WebSocket-Pings
    pub ping_interval_secs: u64,
    /// Kapazitaet der Ausgangs-Queue (Nachrichten)
    pub outgoing_queue: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:9587".to_string(),
            auto_reconnect: true,
            reconnect_delay_ms: 3000,
            ping_interval_secs: 15,
            outgoing_queue: 256,
        }
    }
}

impl RelayConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn validieren(&self) -> Result<(), String> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(format!(
                "server_url muss mit ws:// oder wss:// beginnen: {}",
                self.server_url
            ));
        }
        if self.outgoing_queue == 0 {
            return Err("outgoing_queue muss mindestens 1 sein".into());
        }
        Ok(())
    }
}

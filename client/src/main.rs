//! Nahfunk Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging, startet die
//! Audio-Streams und verbindet sich mit dem Relay.

use std::time::Duration;

use anyhow::Result;
use nahfunk_audio::{AudioEngine, AudioEngineConfig, AudioPipeline};
use nahfunk_client::bridge::{AutoJoin, RelayBridge};
use nahfunk_client::ClientConfig;
use nahfunk_core::ListenerPose;
use nahfunk_relay::RelayClient;

/// Abstand der Status-Zeilen im Log
const STATUS_INTERVALL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("NAHFUNK_CONFIG").unwrap_or_else(|_| "nahfunk.toml".into());

    let config = ClientConfig::laden(&config_pfad)?;
    nahfunk_observability::logging_initialisieren(&config.logging.level, &config.logging.format)?;
    config.validieren()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        identity = %config.sitzung.identity,
        "Nahfunk Client wird initialisiert"
    );

    let pipeline = AudioPipeline::new(&config.audio, config.codec.clone());
    let emitter = config.sitzung.emitter();
    pipeline.set_local_emitter_position(emitter);
    pipeline.set_listener_pose(ListenerPose::new(emitter, config.sitzung.yaw));

    let engine = AudioEngine::new(
        pipeline.clone(),
        AudioEngineConfig {
            input_device: config.audio.input_device.clone(),
            output_device: config.audio.output_device.clone(),
        },
    )?;
    if let Err(e) = engine.start_streams() {
        tracing::error!(fehler = %e, "Audio-Streams nicht verfuegbar, nur Relay aktiv");
    } else if let Some(e) = engine.last_error() {
        tracing::warn!(fehler = %e, "Audio eingeschraenkt");
    }

    let relay = RelayClient::new(config.relay.clone());
    let _bridge = RelayBridge::installieren(
        &pipeline,
        &relay,
        Some(AutoJoin {
            session_id: config.sitzung.session_id.clone(),
            display_name: config.sitzung.display_name.clone(),
            identity: config.sitzung.identity.clone(),
        }),
    );
    relay.connect(&config.relay.server_url)?;

    let position_intervall = Duration::from_millis(config.sitzung.position_intervall_ms.max(50));
    let mut position_tick = tokio::time::interval(position_intervall);
    let mut status_tick = tokio::time::interval(STATUS_INTERVALL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Beenden angefordert");
                break;
            }
            _ = position_tick.tick() => {
                // Waehrend Stille traegt kein Audio-Paket die Position
                if !pipeline.is_speaking() {
                    relay.send_position_update(
                        pipeline.local_emitter_position(),
                        config.sitzung.yaw,
                        0.0,
                    );
                }
            }
            _ = status_tick.tick() => {
                let stats = pipeline.stats();
                let telemetrie = relay.telemetry();
                tracing::info!(
                    relay = relay.state_string(),
                    teilnehmer = relay.connected_peers().len(),
                    aktiv = stats.active_peers,
                    kodiert = stats.packets_encoded,
                    dekodiert = stats.packets_decoded,
                    verschleiert = stats.concealment_frames,
                    gesendet = telemetrie.bytes_sent,
                    empfangen = telemetrie.bytes_received,
                    "Status"
                );
            }
        }
    }

    relay.disconnect();
    engine.stop_streams()?;
    // Ausstehendes leave noch senden lassen
    tokio::time::sleep(Duration::from_millis(100)).await;
    tracing::info!("Nahfunk Client beendet");
    Ok(())
}

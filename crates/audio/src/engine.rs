//! AudioEngine: Geraete-Streams der Sprach-Pipeline
//!
//! cpal-Streams sind nicht `Send`. Sie leben deshalb in einem eigenen
//! Thread, der ueber crossbeam-channel gesteuert wird. Die Pipeline selbst
//! ist ein geteilter Handle und bleibt auch ohne Streams benutzbar.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::capture::{open_capture_stream, CaptureStream};
use crate::device::{
    list_input_devices, list_output_devices, load_cpal_input_device, load_cpal_output_device,
    AudioDevice,
};
use crate::error::{AudioError, AudioResult};
use crate::pipeline::AudioPipeline;
use crate::playback::{open_playback_stream, PlaybackStream};

/// Wartezeit auf die Antwort des Engine-Threads beim Starten
const START_TIMEOUT: Duration = Duration::from_secs(5);

/// Geraeteauswahl der Engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioEngineConfig {
    /// Name des Eingabegeraets (None = Standard)
    pub input_device: Option<String>,
    /// Name des Ausgabegeraets (None = Standard)
    pub output_device: Option<String>,
}

/// Kommandos an den Engine-Thread
enum AudioCommand {
    StartStreams(Sender<AudioResult<()>>),
    StopStreams,
    SetInputDevice(Option<String>),
    SetOutputDevice(Option<String>),
    Shutdown,
}

#[derive(Debug, Default)]
struct EngineState {
    config: AudioEngineConfig,
    capture_active: bool,
    playback_active: bool,
    last_error: Option<String>,
}

/// Audio-Engine
pub struct AudioEngine {
    cmd_tx: Sender<AudioCommand>,
    state: Arc<RwLock<EngineState>>,
    pipeline: AudioPipeline,
}

impl AudioEngine {
    /// Erstellt die Engine; Streams werden erst mit `start_streams` geoeffnet
    pub fn new(pipeline: AudioPipeline, config: AudioEngineConfig) -> AudioResult<Self> {
        let (cmd_tx, cmd_rx) = bounded::<AudioCommand>(64);
        let state = Arc::new(RwLock::new(EngineState {
            config,
            ..Default::default()
        }));

        let thread_state = Arc::clone(&state);
        let thread_pipeline = pipeline.clone();
        std::thread::Builder::new()
            .name("nahfunk-audio-engine".to_string())
            .spawn(move || engine_thread(cmd_rx, thread_state, thread_pipeline))
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        info!("AudioEngine initialisiert");
        Ok(Self {
            cmd_tx,
            state,
            pipeline,
        })
    }

    /// Oeffnet Wiedergabe und Aufnahme
    ///
    /// Scheitert nur, wenn keine Wiedergabe moeglich ist. Fehlt das
    /// Mikrofon, laeuft die Wiedergabe weiter und `last_error` nennt den
    /// Grund.
    pub fn start_streams(&self) -> AudioResult<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send_cmd(AudioCommand::StartStreams(reply_tx))?;
        reply_rx
            .recv_timeout(START_TIMEOUT)
            .map_err(|_| AudioError::EngineBeendet)?
    }

    pub fn stop_streams(&self) -> AudioResult<()> {
        self.send_cmd(AudioCommand::StopStreams)
    }

    /// Waehlt das Eingabegeraet; laufende Streams werden neu geoeffnet
    pub fn set_input_device(&self, name: Option<String>) -> AudioResult<()> {
        self.send_cmd(AudioCommand::SetInputDevice(name))
    }

    /// Waehlt das Ausgabegeraet; laufende Streams werden neu geoeffnet
    pub fn set_output_device(&self, name: Option<String>) -> AudioResult<()> {
        self.send_cmd(AudioCommand::SetOutputDevice(name))
    }

    pub fn input_devices(&self) -> AudioResult<Vec<AudioDevice>> {
        list_input_devices()
    }

    pub fn output_devices(&self) -> AudioResult<Vec<AudioDevice>> {
        list_output_devices()
    }

    pub fn config(&self) -> AudioEngineConfig {
        self.state.read().config.clone()
    }

    pub fn is_capture_active(&self) -> bool {
        self.state.read().capture_active
    }

    pub fn is_playback_active(&self) -> bool {
        self.state.read().playback_active
    }

    pub fn is_streaming(&self) -> bool {
        let state = self.state.read();
        state.capture_active || state.playback_active
    }

    /// Letzter Fehler beim Oeffnen von Geraeten
    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn pipeline(&self) -> &AudioPipeline {
        &self.pipeline
    }

    fn send_cmd(&self, cmd: AudioCommand) -> AudioResult<()> {
        self.cmd_tx.send(cmd).map_err(|_| AudioError::EngineBeendet)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        debug!("AudioEngine gestoppt");
    }
}

/// Vom Engine-Thread gehaltene Streams
#[derive(Default)]
struct Streams {
    capture: Option<CaptureStream>,
    playback: Option<PlaybackStream>,
}

impl Streams {
    fn running(&self) -> bool {
        self.capture.is_some() || self.playback.is_some()
    }

    fn start(&mut self, state: &RwLock<EngineState>, pipeline: &AudioPipeline) -> AudioResult<()> {
        self.stop(state);
        let config = state.read().config.clone();

        let playback = load_cpal_output_device(config.output_device.as_deref())
            .and_then(|device| open_playback_stream(&device, pipeline.playback_mixer()));
        let playback = match playback {
            Ok(stream) => stream,
            Err(e) => {
                error!(fehler = %e, "Wiedergabe konnte nicht gestartet werden");
                state.write().last_error = Some(format!("Playback: {e}"));
                return Err(e);
            }
        };
        self.playback = Some(playback);

        let capture = load_cpal_input_device(config.input_device.as_deref()).and_then(|device| {
            let path = pipeline.capture_path()?;
            open_capture_stream(&device, path)
        });
        let capture_error = match capture {
            Ok(stream) => {
                self.capture = Some(stream);
                None
            }
            Err(e) => {
                warn!(fehler = %e, "Aufnahme nicht verfuegbar, nur Wiedergabe aktiv");
                Some(format!("Capture: {e}"))
            }
        };

        let mut s = state.write();
        s.playback_active = true;
        s.capture_active = self.capture.is_some();
        s.last_error = capture_error;
        info!(capture = s.capture_active, "Audio-Streams gestartet");
        Ok(())
    }

    fn stop(&mut self, state: &RwLock<EngineState>) {
        let was_running = self.running();
        self.capture = None;
        self.playback = None;
        let mut s = state.write();
        s.capture_active = false;
        s.playback_active = false;
        if was_running {
            info!("Audio-Streams gestoppt");
        }
    }

    fn restart_if_running(&mut self, state: &RwLock<EngineState>, pipeline: &AudioPipeline) {
        if self.running() {
            // Fehler landen in last_error
            let _ = self.start(state, pipeline);
        }
    }
}

fn engine_thread(cmd_rx: Receiver<AudioCommand>, state: Arc<RwLock<EngineState>>, pipeline: AudioPipeline) {
    let mut streams = Streams::default();
    debug!("Audio-Engine Thread gestartet");

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            AudioCommand::StartStreams(reply) => {
                let result = streams.start(&state, &pipeline);
                let _ = reply.send(result);
            }
            AudioCommand::StopStreams => streams.stop(&state),
            AudioCommand::SetInputDevice(name) => {
                info!(geraet = ?name, "Eingabegeraet gewechselt");
                state.write().config.input_device = name;
                streams.restart_if_running(&state, &pipeline);
            }
            AudioCommand::SetOutputDevice(name) => {
                info!(geraet = ?name, "Ausgabegeraet gewechselt");
                state.write().config.output_device = name;
                streams.restart_if_running(&state, &pipeline);
            }
            AudioCommand::Shutdown => break,
        }
    }
    streams.stop(&state);
    debug!("Audio-Engine Thread beendet");
}

//! nahfunk-audio – Sprach-Pipeline mit Raumklang
//!
//! - Mikrofon-Capture und Lautsprecher-Playback via cpal
//! - Opus Encoding/Decoding mit Verschleierung bei Paketverlust
//! - Sprachaktivierung (VAD mit Nachlauf) und Push-to-Talk
//! - Binaurales Rendering pro Teilnehmer (ITD, ILD, Kopfschatten,
//!   Luftabsorption, Doppler, Hall)
//! - Jitter-Buffer und weich gesaettigter Mix

pub mod capture;
pub mod codec;
pub mod device;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod jitter;
pub mod peer;
pub mod pipeline;
pub mod playback;
pub mod ptt;
pub mod queue;
pub mod settings;
pub mod spatial;

// Bequeme Re-Exporte der wichtigsten Typen
pub use codec::{SpeechCodec, SpeechDecoder, SpeechEncoder};
pub use device::{list_input_devices, list_output_devices, AudioDevice};
pub use dsp::AudioProcessor;
pub use engine::{AudioEngine, AudioEngineConfig};
pub use error::{AudioError, AudioResult};
pub use jitter::JitterBuffer;
pub use pipeline::{AudioPipeline, CapturePath, PipelineStats, PlaybackMixer};
pub use ptt::{PttController, PttMode};
pub use queue::BoundedQueue;
pub use settings::{SharedSettings, VoiceSettings};
pub use spatial::{SpatialParams, SpatialRenderer};

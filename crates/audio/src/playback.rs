//! Audio-Playback via cpal
//!
//! Der [`PlaybackMixer`] rendert im cpal-Callback direkt in einen
//! Stereo-Zwischenpuffer, der anschliessend auf die Kanalzahl des
//! Geraets verteilt wird.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tracing::{debug, error};

use nahfunk_core::format::{SAMPLE_RATE, STEREO_FRAME_SIZE};

use crate::error::{AudioError, AudioResult};
use crate::pipeline::PlaybackMixer;

/// Laufender Playback-Stream; Drop stoppt die Wiedergabe
pub struct PlaybackStream {
    _stream: Stream,
    channels: u16,
}

impl PlaybackStream {
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Verteilt interleaved Stereo auf `channels` Ausgabekanaele
///
/// Mono erhaelt den Mittelwert, ab drei Kanaelen bleiben die weiteren still.
pub fn spread_stereo(stereo: &[f32], channels: usize, out: &mut [f32]) {
    match channels {
        0 => {}
        1 => {
            for (o, f) in out.iter_mut().zip(stereo.chunks_exact(2)) {
                *o = (f[0] + f[1]) * 0.5;
            }
        }
        2 => {
            let n = out.len().min(stereo.len());
            out[..n].copy_from_slice(&stereo[..n]);
        }
        _ => {
            for (o, f) in out.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
                o[0] = f[0];
                o[1] = f[1];
                o[2..].fill(0.0);
            }
        }
    }
}

/// Rendert eine Callback-Periode in `data`
struct Renderer {
    mixer: PlaybackMixer,
    channels: usize,
    stereo: Vec<f32>,
}

impl Renderer {
    fn render(&mut self, data: &mut [f32]) {
        let frames = data.len() / self.channels.max(1);
        if self.stereo.len() < frames * 2 {
            self.stereo.resize(frames * 2, 0.0);
        }
        let stereo = &mut self.stereo[..frames * 2];
        self.mixer.on_playback_frame(stereo);
        spread_stereo(stereo, self.channels, data);
    }
}

/// Oeffnet einen Playback-Stream, gespeist vom `mixer`
pub fn open_playback_stream(device: &Device, mixer: PlaybackMixer) -> AudioResult<PlaybackStream> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .filter(|c| c.min_sample_rate().0 <= SAMPLE_RATE && c.max_sample_rate().0 >= SAMPLE_RATE)
        // Stereo bevorzugen
        .min_by_key(|c| c.channels().abs_diff(2))
        .ok_or_else(|| {
            AudioError::StreamFehler(format!("Ausgabegeraet unterstuetzt keine {SAMPLE_RATE} Hz"))
        })?;

    let channels = supported.channels().max(1);
    let sample_format = supported.sample_format();
    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut renderer = Renderer {
        mixer,
        channels: channels as usize,
        stereo: vec![0.0; STEREO_FRAME_SIZE * 2],
    };
    let mut wandel: Vec<f32> = Vec::new();
    let err_fn = |err| error!(fehler = %err, "Playback-Stream");

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| renderer.render(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _| {
                wandel.resize(data.len(), 0.0);
                renderer.render(&mut wandel);
                for (out, s) in data.iter_mut().zip(&wandel) {
                    *out = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {other:?}"
            )))
        }
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(sample_rate = SAMPLE_RATE, channels, format = ?sample_format, "Playback-Stream geoeffnet");

    Ok(PlaybackStream {
        _stream: stream,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AudioPipeline;
    use crate::settings::VoiceSettings;

    #[test]
    fn stereo_auf_mono() {
        let mut out = [0.0; 2];
        spread_stereo(&[1.0, 0.0, 0.2, 0.4], 1, &mut out);
        assert_eq!(out[0], 0.5);
        assert!((out[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn stereo_auf_vier_kanaele() {
        let mut out = [9.0; 8];
        spread_stereo(&[0.1, 0.2, 0.3, 0.4], 4, &mut out);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0, 0.3, 0.4, 0.0, 0.0]);
    }

    #[test]
    fn renderer_fuellt_stille_ohne_teilnehmer() {
        let pipeline = AudioPipeline::new(&VoiceSettings::default(), Default::default());
        let mut renderer = Renderer {
            mixer: pipeline.playback_mixer(),
            channels: 2,
            stereo: Vec::new(),
        };
        let mut data = vec![1.0; 4096];
        renderer.render(&mut data);
        assert!(data.iter().all(|&s| s == 0.0));
        assert_eq!(renderer.stereo.len(), 4096);
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn playback_stream_oeffnen() {
        use cpal::traits::HostTrait;
        let host = cpal::default_host();
        if let Some(device) = host.default_output_device() {
            let pipeline = AudioPipeline::new(&VoiceSettings::default(), Default::default());
            let result = open_playback_stream(&device, pipeline.playback_mixer());
            assert!(result.is_ok(), "Playback-Stream sollte oeffenbar sein");
        }
    }
}

//! Mikrofon-Capture via cpal
//!
//! Oeffnet einen InputStream mit 48 kHz und reicht die Samples als Mono
//! direkt im cpal-Callback an den [`CapturePath`] weiter. Mehrkanal-
//! Eingaben werden gemittelt, I16/U8 nach f32 gewandelt.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tracing::{debug, error};

use nahfunk_core::format::{FRAME_SIZE, SAMPLE_RATE};

use crate::error::{AudioError, AudioResult};
use crate::pipeline::CapturePath;

/// Laufender Capture-Stream; Drop stoppt die Aufnahme
pub struct CaptureStream {
    _stream: Stream,
    channels: u16,
}

impl CaptureStream {
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Mittelt interleaved Mehrkanal-Samples zu Mono
pub fn downmix_into(input: &[f32], channels: usize, mono: &mut Vec<f32>) {
    mono.clear();
    if channels <= 1 {
        mono.extend_from_slice(input);
        return;
    }
    let scale = 1.0 / channels as f32;
    mono.extend(
        input
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Oeffnet einen Capture-Stream und verbindet ihn mit `capture`
pub fn open_capture_stream(device: &Device, mut capture: CapturePath) -> AudioResult<CaptureStream> {
    let supported = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| c.min_sample_rate().0 <= SAMPLE_RATE && c.max_sample_rate().0 >= SAMPLE_RATE)
        .ok_or_else(|| {
            AudioError::StreamFehler(format!("Eingabegeraet unterstuetzt keine {SAMPLE_RATE} Hz"))
        })?;

    let channels = supported.channels().max(1);
    let sample_format = supported.sample_format();
    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };
    let ch = channels as usize;
    let mut mono: Vec<f32> = Vec::with_capacity(FRAME_SIZE * 4);
    let mut wandel: Vec<f32> = Vec::with_capacity(FRAME_SIZE * 4 * ch);

    let err_fn = |err| error!(fehler = %err, "Capture-Stream");

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                downmix_into(data, ch, &mut mono);
                capture.on_capture_frame(&mono);
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| {
                wandel.clear();
                wandel.extend(data.iter().map(|&s| s as f32 / i16::MAX as f32));
                downmix_into(&wandel, ch, &mut mono);
                capture.on_capture_frame(&mono);
            },
            err_fn,
            None,
        ),
        SampleFormat::U8 => device.build_input_stream(
            &stream_config,
            move |data: &[u8], _| {
                wandel.clear();
                wandel.extend(data.iter().map(|&s| (s as f32 - 128.0) / 128.0));
                downmix_into(&wandel, ch, &mut mono);
                capture.on_capture_frame(&mono);
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

    debug!(sample_rate = SAMPLE_RATE, channels, format = ?sample_format, "Capture-Stream geoeffnet");

    Ok(CaptureStream {
        _stream: stream,
        channels,
    })
}

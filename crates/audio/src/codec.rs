//! Opus Encoder/Decoder fuer Sprache
//!
//! Kapselt audiopus mit einer f32-PCM-API. Im Echtzeitpfad wird nie ein
//! Fehler zurueckgegeben: `encode` liefert bei Stille (DTX) oder Fehler
//! ein leeres Frame, `decode` liefert 0 Samples. Der letzte Fehler ist
//! ueber `last_error()` abrufbar.

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Bitrate, Channels, SampleRate,
};
use nahfunk_core::format::{FRAME_SIZE, MAX_COMPRESSED_FRAME_BYTES};
use nahfunk_protocol::SpeechCodecConfig;
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

// Opus-CTL-Requests, die audiopus 0.2 nicht als eigene Methode anbietet
const OPUS_SET_PACKET_LOSS_PERC_REQUEST: i32 = 4014;
const OPUS_SET_DTX_REQUEST: i32 = 4016;
const OPUS_SET_SIGNAL_REQUEST: i32 = 4024;
const OPUS_SIGNAL_VOICE: i32 = 3001;

/// Groesstes Opus-Frame (120 ms bei 48 kHz)
pub const MAX_DECODE_SAMPLES: usize = 5760;

/// Encodierte Frames bis zu dieser Groesse sind DTX-Stille
const DTX_FRAME_BYTES: usize = 2;

/// Opus-Encoder fuer das lokale Mikrofon
pub struct SpeechEncoder {
    encoder: Encoder,
    config: SpeechCodecConfig,
    output: Vec<u8>,
    last_error: Option<String>,
    fehler_in_folge: u32,
}

impl SpeechEncoder {
    /// Erstellt einen Encoder mit Sprach-Tuning
    pub fn new(config: SpeechCodecConfig) -> AudioResult<Self> {
        config.validieren().map_err(AudioError::Konfiguration)?;

        let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Mono, Application::Voip)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        encoder
            .set_bitrate(Bitrate::BitsPerSecond(config.bitrate_bps))
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        encoder
            .set_complexity(config.complexity)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        encoder
            .set_inband_fec(config.fec_enabled)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        encoder
            .set_encoder_ctl_request(OPUS_SET_SIGNAL_REQUEST, OPUS_SIGNAL_VOICE)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        encoder
            .set_encoder_ctl_request(
                OPUS_SET_PACKET_LOSS_PERC_REQUEST,
                i32::from(config.packet_loss_perc),
            )
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        if config.dtx_enabled {
            encoder
                .set_encoder_ctl_request(OPUS_SET_DTX_REQUEST, 1)
                .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        }

        debug!(
            bitrate = config.bitrate_bps,
            complexity = config.complexity,
            fec = config.fec_enabled,
            "SpeechEncoder erstellt"
        );

        Ok(Self {
            encoder,
            config,
            output: vec![0u8; MAX_COMPRESSED_FRAME_BYTES],
            last_error: None,
            fehler_in_folge: 0,
        })
    }

    /// Kodiert genau ein Frame (960 Samples)
    ///
    /// Ein leeres Ergebnis bedeutet "nichts zu senden", kein Fehler.
    pub fn encode(&mut self, pcm: &[f32]) -> Vec<u8> {
        if pcm.len() != FRAME_SIZE {
            self.fehler_merken(format!(
                "PCM-Frame muss {} Samples lang sein, war {}",
                FRAME_SIZE,
                pcm.len()
            ));
            return Vec::new();
        }

        match self.encoder.encode_float(pcm, &mut self.output) {
            Ok(written) if written <= DTX_FRAME_BYTES => {
                self.fehler_in_folge = 0;
                Vec::new()
            }
            Ok(written) => {
                self.fehler_in_folge = 0;
                self.output[..written].to_vec()
            }
            Err(e) => {
                self.fehler_merken(format!("Encode fehlgeschlagen: {e}"));
                Vec::new()
            }
        }
    }

    /// Setzt die Ziel-Bitrate zur Laufzeit
    pub fn set_bitrate(&mut self, bitrate_bps: i32) -> AudioResult<()> {
        self.encoder
            .set_bitrate(Bitrate::BitsPerSecond(bitrate_bps))
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        self.config.bitrate_bps = bitrate_bps;
        Ok(())
    }

    /// Setzt die Komplexitaet (wird auf 0..=10 begrenzt)
    pub fn set_complexity(&mut self, complexity: u8) -> AudioResult<()> {
        let complexity = complexity.min(10);
        self.encoder
            .set_complexity(complexity)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        self.config.complexity = complexity;
        Ok(())
    }

    pub fn config(&self) -> &SpeechCodecConfig {
        &self.config
    }

    /// Letzter Encoder-Fehler (falls vorhanden)
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fehler_merken(&mut self, msg: String) {
        self.fehler_in_folge += 1;
        // Nur den Beginn einer Fehlerserie loggen, der Callback laeuft alle 20 ms
        if self.fehler_in_folge == 1 {
            warn!(fehler = %msg, "SpeechEncoder");
        }
        self.last_error = Some(msg);
    }
}

/// Opus-Decoder, eine Instanz pro entferntem Teilnehmer
pub struct SpeechDecoder {
    decoder: Decoder,
    scratch: Vec<f32>,
    plc_scratch: Vec<f32>,
    last_error: Option<String>,
    fehler_in_folge: u32,
}

impl SpeechDecoder {
    pub fn new() -> AudioResult<Self> {
        let decoder = Decoder::new(SampleRate::Hz48000, Channels::Mono)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        Ok(Self {
            decoder,
            scratch: vec![0.0; MAX_DECODE_SAMPLES],
            plc_scratch: vec![0.0; FRAME_SIZE],
            last_error: None,
            fehler_in_folge: 0,
        })
    }

    /// Dekodiert ein Frame nach `out`; gibt die Anzahl geschriebener Samples zurueck
    ///
    /// Liefert 0 bei leerer oder fehlerhafter Eingabe. `out.len()` ist die
    /// maximale Frame-Groesse; laengere Frames werden gekuerzt und als
    /// Fehler gemeldet. Mit `MAX_DECODE_SAMPLES` passt jedes Opus-Frame.
    pub fn decode(&mut self, compressed: &[u8], out: &mut [f32]) -> usize {
        if compressed.is_empty() {
            return 0;
        }
        match self
            .decoder
            .decode_float(Some(compressed), &mut self.scratch, false)
        {
            Ok(decoded) => {
                let n = decoded.min(out.len());
                if n < decoded {
                    self.fehler_merken(format!("Frame mit {decoded} Samples auf {n} gekuerzt"));
                } else {
                    self.fehler_in_folge = 0;
                }
                out[..n].copy_from_slice(&self.scratch[..n]);
                n
            }
            Err(e) => {
                self.fehler_merken(format!("Decode fehlgeschlagen: {e}"));
                0
            }
        }
    }

    /// Erzeugt ein Verschleierungs-Frame ohne Netzwerkdaten
    pub fn decode_loss_concealment(&mut self, out: &mut [f32]) -> usize {
        match self
            .decoder
            .decode_float(None::<&[u8]>, &mut self.plc_scratch, false)
        {
            Ok(decoded) => {
                let n = decoded.min(out.len());
                out[..n].copy_from_slice(&self.plc_scratch[..n]);
                n
            }
            Err(e) => {
                self.fehler_merken(format!("PLC fehlgeschlagen: {e}"));
                0
            }
        }
    }

    /// Letzter Decoder-Fehler (falls vorhanden)
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fehler_merken(&mut self, msg: String) {
        self.fehler_in_folge += 1;
        if self.fehler_in_folge == 1 {
            warn!(fehler = %msg, "SpeechDecoder");
        }
        self.last_error = Some(msg);
    }
}

/// Encoder/Decoder-Paar mit gemeinsamer Konfiguration
pub struct SpeechCodec {
    pub encoder: SpeechEncoder,
    pub decoder: SpeechDecoder,
}

impl SpeechCodec {
    pub fn new(config: SpeechCodecConfig) -> AudioResult<Self> {
        Ok(Self {
            encoder: SpeechEncoder::new(config)?,
            decoder: SpeechDecoder::new()?,
        })
    }

    pub fn encode(&mut self, pcm: &[f32]) -> Vec<u8> {
        self.encoder.encode(pcm)
    }

    pub fn decode(&mut self, compressed: &[u8], out: &mut [f32]) -> usize {
        self.decoder.decode(compressed, out)
    }

    pub fn decode_loss_concealment(&mut self, out: &mut [f32]) -> usize {
        self.decoder.decode_loss_concealment(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ton(frequenz: f32, amplitude: f32, offset: usize) -> Vec<f32> {
        (0..FRAME_SIZE)
            .map(|i| {
                let t = (offset + i) as f32 / 48_000.0;
                (t * frequenz * std::f32::consts::TAU).sin() * amplitude
            })
            .collect()
    }

    #[test]
    fn encoder_standard_konfiguration() {
        let enc = SpeechEncoder::new(SpeechCodecConfig::default()).unwrap();
        assert_eq!(enc.config().bitrate_bps, 32_000);
        assert!(enc.last_error().is_none());
    }

    #[test]
    fn encoder_ungueltige_konfiguration() {
        let config = SpeechCodecConfig {
            bitrate_bps: 10,
            ..Default::default()
        };
        assert!(SpeechEncoder::new(config).is_err());
    }

    #[test]
    fn falsche_frame_groesse_liefert_leeres_frame() {
        let mut enc = SpeechEncoder::new(SpeechCodecConfig::default()).unwrap();
        assert!(enc.encode(&[0.0; 100]).is_empty());
        assert!(enc.last_error().is_some());
    }

    #[test]
    fn kaputte_daten_liefern_null_samples() {
        let mut dec = SpeechDecoder::new().unwrap();
        let mut out = vec![0.0; FRAME_SIZE];
        assert_eq!(dec.decode(&[], &mut out), 0);
        // Opus-TOC mit ungueltiger Frame-Anzahl
        assert_eq!(dec.decode(&[0xFF, 0xFF, 0xFF], &mut out), 0);
    }

    #[test]
    fn roundtrip_testton_bleibt_aehnlich() {
        let config = SpeechCodecConfig {
            dtx_enabled: false,
            ..Default::default()
        };
        let mut codec = SpeechCodec::new(config).unwrap();
        let mut out = vec![0.0; FRAME_SIZE];

        // Einschwingen: Opus hat Look-ahead, daher mehrere Frames kodieren
        let mut letzte_energie = 0.0;
        for frame in 0..10 {
            let pcm = ton(440.0, 0.5, frame * FRAME_SIZE);
            let encoded = codec.encode(&pcm);
            assert!(!encoded.is_empty(), "Ton darf nicht als Stille gelten");
            assert!(encoded.len() <= MAX_COMPRESSED_FRAME_BYTES);
            let n = codec.decode(&encoded, &mut out);
            assert_eq!(n, FRAME_SIZE);
            letzte_energie = crate::dsp::vad::rms_energy(&out);
        }
        // Sinus mit Amplitude 0.5 hat RMS ~0.354
        assert!(
            (letzte_energie - 0.354).abs() < 0.1,
            "RMS nach Roundtrip: {letzte_energie}"
        );
        assert!(out.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn zu_kleiner_ausgabepuffer_wird_gemeldet() {
        let mut codec = SpeechCodec::new(SpeechCodecConfig {
            dtx_enabled: false,
            ..Default::default()
        })
        .unwrap();
        let encoded = codec.encode(&ton(440.0, 0.5, 0));
        let mut kurz = vec![0.0; FRAME_SIZE / 2];
        assert_eq!(codec.decode(&encoded, &mut kurz), FRAME_SIZE / 2);
        assert!(codec.decoder.last_error().is_some_and(|e| e.contains("gekuerzt")));

        let mut voll = vec![0.0; MAX_DECODE_SAMPLES];
        assert_eq!(codec.decode(&encoded, &mut voll), FRAME_SIZE);
    }

    #[test]
    fn plc_liefert_ein_frame() {
        let mut codec = SpeechCodec::new(SpeechCodecConfig::default()).unwrap();
        let mut out = vec![0.0; FRAME_SIZE];
        let encoded = codec.encode(&ton(300.0, 0.4, 0));
        codec.decode(&encoded, &mut out);
        assert_eq!(codec.decode_loss_concealment(&mut out), FRAME_SIZE);
    }

    #[test]
    fn bitrate_und_komplexitaet_aenderbar() {
        let mut enc = SpeechEncoder::new(SpeechCodecConfig::default()).unwrap();
        enc.set_bitrate(24_000).unwrap();
        enc.set_complexity(42).unwrap();
        assert_eq!(enc.config().bitrate_bps, 24_000);
        assert_eq!(enc.config().complexity, 10);
    }
}

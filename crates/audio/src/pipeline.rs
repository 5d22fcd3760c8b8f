//! Sprach-Pipeline
//!
//! `AudioPipeline` ist der geteilte Handle fuer Host, Netzwerk und
//! Geraete-Streams. Die beiden Echtzeitpfade sind eigene Objekte, die
//! exklusiv im jeweiligen Callback-Thread leben:
//!
//! - [`CapturePath`]: sammelt Mikrofon-Samples zu Frames, entscheidet per
//!   VAD oder Push-to-Talk ueber das Senden und kodiert.
//! - [`PlaybackMixer`]: leert die Eingangs-Queue, dekodiert und rendert
//!   pro Teilnehmer, mischt die Jitter-Buffer und saettigt weich.
//!
//! Kein Pfad blockiert: die Queue verwirft das Aelteste, Jitter-Buffer
//! verwerfen Ueberlauf, Fehler werden zu Stille.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nahfunk_core::format::{FRAME_SIZE, STEREO_FRAME_SIZE};
use nahfunk_core::{ListenerPose, PeerId, Vec3};
use nahfunk_protocol::{IncomingAudioPacket, OutgoingAudioPacket, SpeechCodecConfig};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::codec::{SpeechEncoder, MAX_DECODE_SAMPLES};
use crate::dsp::gain::Gain;
use crate::dsp::saturation::SoftSaturator;
use crate::dsp::vad::{rms_energy, Vad};
use crate::dsp::AudioProcessor;
use crate::error::AudioResult;
use crate::peer::{PeerState, PeerTable};
use crate::ptt::{PttController, PttMode};
use crate::queue::BoundedQueue;
use crate::settings::{SharedSettings, VoiceSettings};
use crate::spatial::SpatialParams;

/// Kapazitaet der Eingangs-Queue (Pakete)
pub const INCOMING_QUEUE_CAPACITY: usize = 128;
/// Verschleierung erst, wenn seit dem letzten Paket ein ganzes Frame fehlt
pub const PLC_OVERDUE: Duration = Duration::from_millis(20);
/// Bis zu dieser Stille wird Verschleierung synthetisiert
pub const PLC_GRACE: Duration = Duration::from_millis(500);
/// Maximal aufeinanderfolgende Verschleierungs-Frames
pub const MAX_PLC_FRAMES: u32 = 10;
/// Nach dieser Stille gilt ein Teilnehmer als inaktiv
pub const INACTIVE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Callback fuer fertig kodierte, gerahmte Pakete
pub type PacketSink = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Momentaufnahme der Pipeline-Zaehler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub frames_captured: u64,
    pub packets_encoded: u64,
    pub packets_decoded: u64,
    pub decode_failures: u64,
    pub concealment_frames: u64,
    /// Wegen voller Eingangs-Queue verworfene Pakete
    pub queue_drops: u64,
    pub active_peers: usize,
    pub input_level: f32,
    pub speaking: bool,
}

#[derive(Debug, Default)]
struct Counters {
    frames_captured: AtomicU64,
    packets_encoded: AtomicU64,
    packets_decoded: AtomicU64,
    decode_failures: AtomicU64,
    concealment_frames: AtomicU64,
    active_peers: AtomicUsize,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct PipelineShared {
    settings: Arc<SharedSettings>,
    codec: SpeechCodecConfig,
    listener: RwLock<ListenerPose>,
    emitter: RwLock<Vec3>,
    incoming: BoundedQueue<IncomingAudioPacket>,
    peers: Mutex<PeerTable>,
    sink: RwLock<Option<PacketSink>>,
    speaking: AtomicBool,
    input_level: AtomicU32,
    counters: Counters,
}

/// Geteilter Handle auf die Sprach-Pipeline
#[derive(Clone)]
pub struct AudioPipeline {
    shared: Arc<PipelineShared>,
}

impl AudioPipeline {
    pub fn new(settings: &VoiceSettings, codec: SpeechCodecConfig) -> Self {
        Self {
            shared: Arc::new(PipelineShared {
                settings: SharedSettings::new(settings),
                codec,
                listener: RwLock::new(ListenerPose::default()),
                emitter: RwLock::new(Vec3::ZERO),
                incoming: BoundedQueue::new(INCOMING_QUEUE_CAPACITY),
                peers: Mutex::new(PeerTable::new()),
                sink: RwLock::new(None),
                speaking: AtomicBool::new(false),
                input_level: AtomicU32::new(0),
                counters: Counters::default(),
            }),
        }
    }

    /// Erstellt den Capture-Pfad (einer pro laufendem Eingabestream)
    pub fn capture_path(&self) -> AudioResult<CapturePath> {
        CapturePath::new(Arc::clone(&self.shared))
    }

    /// Erstellt den Mixer (einer pro laufendem Ausgabestream)
    pub fn playback_mixer(&self) -> PlaybackMixer {
        PlaybackMixer::new(Arc::clone(&self.shared))
    }

    // --- Host-Schnittstelle ---

    /// Hoerer-Pose, einmal pro Spiel-Tick
    pub fn set_listener_pose(&self, pose: ListenerPose) {
        *self.shared.listener.write() = pose;
    }

    pub fn listener_pose(&self) -> ListenerPose {
        *self.shared.listener.read()
    }

    /// Eigene Position, wird in ausgehende Pakete geschrieben
    pub fn set_local_emitter_position(&self, position: Vec3) {
        *self.shared.emitter.write() = position;
    }

    pub fn local_emitter_position(&self) -> Vec3 {
        *self.shared.emitter.read()
    }

    /// Registriert den Empfaenger fuer kodierte Pakete
    pub fn set_packet_sink<F>(&self, sink: F)
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        *self.shared.sink.write() = Some(Arc::new(sink));
    }

    pub fn clear_packet_sink(&self) {
        *self.shared.sink.write() = None;
    }

    /// Nimmt ein empfangenes Paket an; blockiert nie
    ///
    /// Gibt `true` zurueck, wenn dafuer ein aelteres Paket verworfen wurde.
    pub fn feed_incoming_packet(&self, packet: IncomingAudioPacket) -> bool {
        let dropped = self.shared.incoming.push(packet);
        if dropped {
            trace!("Eingangs-Queue voll, aeltestes Paket verworfen");
        }
        dropped
    }

    /// Parst eine Binaernachricht und reiht sie ein
    ///
    /// Fehlerhafte Nachrichten werden verworfen und geloggt.
    pub fn feed_incoming_bytes(&self, data: &[u8]) -> bool {
        match IncomingAudioPacket::decode(data) {
            Ok(packet) => {
                self.feed_incoming_packet(packet);
                true
            }
            Err(e) => {
                debug!(fehler = %e, laenge = data.len(), "Audio-Nachricht verworfen");
                false
            }
        }
    }

    /// Letzte bekannte Position eines Teilnehmers setzen (Positions-Update)
    pub fn update_peer_position(&self, id: &PeerId, position: Vec3) {
        if let Some(peer) = self.shared.peers.lock().get_mut(id) {
            peer.position = position;
        }
    }

    /// Entfernt einen Teilnehmer, der die Sitzung verlassen hat
    pub fn remove_peer(&self, id: &PeerId) -> bool {
        let removed = self.shared.peers.lock().remove(id).is_some();
        if removed {
            debug!(peer = %id, "Teilnehmer entfernt");
        }
        removed
    }

    pub fn clear_peers(&self) {
        self.shared.peers.lock().clear();
        self.shared.incoming.clear();
        self.shared.counters.active_peers.store(0, Ordering::Relaxed);
    }

    pub fn peer_count(&self) -> usize {
        self.shared.peers.lock().len()
    }

    pub fn is_peer_active(&self, id: &PeerId) -> Option<bool> {
        self.shared.peers.lock().get(id).map(|p| p.active)
    }

    /// Uebernimmt neue Einstellungen (wirkt ab dem naechsten Callback)
    pub fn apply_settings(&self, settings: &VoiceSettings) {
        self.shared.settings.apply(settings);
    }

    pub fn settings(&self) -> &Arc<SharedSettings> {
        &self.shared.settings
    }

    /// Push-to-Talk-Taste
    pub fn set_talk_key_held(&self, held: bool) {
        self.shared.settings.set_talk_key_held(held);
    }

    pub fn set_mic_muted(&self, muted: bool) {
        self.shared.settings.set_mic_muted(muted);
    }

    pub fn is_speaking(&self) -> bool {
        self.shared.speaking.load(Ordering::Relaxed)
    }

    /// RMS des letzten Capture-Frames (nach Mikrofon-Verstaerkung)
    pub fn current_input_level(&self) -> f32 {
        f32::from_bits(self.shared.input_level.load(Ordering::Relaxed))
    }

    pub fn stats(&self) -> PipelineStats {
        let c = &self.shared.counters;
        PipelineStats {
            frames_captured: c.frames_captured.load(Ordering::Relaxed),
            packets_encoded: c.packets_encoded.load(Ordering::Relaxed),
            packets_decoded: c.packets_decoded.load(Ordering::Relaxed),
            decode_failures: c.decode_failures.load(Ordering::Relaxed),
            concealment_frames: c.concealment_frames.load(Ordering::Relaxed),
            queue_drops: self.shared.incoming.dropped_count(),
            active_peers: c.active_peers.load(Ordering::Relaxed),
            input_level: self.current_input_level(),
            speaking: self.is_speaking(),
        }
    }
}

/// Capture-Seite: Frames sammeln, VAD/PTT, kodieren, ausliefern
pub struct CapturePath {
    shared: Arc<PipelineShared>,
    encoder: SpeechEncoder,
    frame: Vec<f32>,
    fill: usize,
    gain: Gain,
    vad: Vad,
    ptt: PttController,
}

impl CapturePath {
    fn new(shared: Arc<PipelineShared>) -> AudioResult<Self> {
        let encoder = SpeechEncoder::new(shared.codec.clone())?;
        let settings = &shared.settings;
        let gain = Gain::new(settings.mic_volume());
        let vad = Vad::new(settings.vad_config());
        let ptt = PttController::new(PttMode::from_push_to_talk(settings.push_to_talk()));
        Ok(Self {
            shared,
            encoder,
            frame: vec![0.0; FRAME_SIZE],
            fill: 0,
            gain,
            vad,
            ptt,
        })
    }

    /// Mono-Samples aus dem Eingabe-Callback
    pub fn on_capture_frame(&mut self, samples: &[f32]) {
        if self.shared.settings.mic_muted() {
            self.fill = 0;
            self.shared.speaking.store(false, Ordering::Relaxed);
            self.shared.input_level.store(0, Ordering::Relaxed);
            return;
        }

        let mut rest = samples;
        while !rest.is_empty() {
            let take = (FRAME_SIZE - self.fill).min(rest.len());
            self.frame[self.fill..self.fill + take].copy_from_slice(&rest[..take]);
            self.fill += take;
            rest = &rest[take..];
            if self.fill == FRAME_SIZE {
                self.fill = 0;
                self.process_frame();
            }
        }
    }

    fn process_frame(&mut self) {
        let settings = &self.shared.settings;
        bump(&self.shared.counters.frames_captured);

        self.gain.set_gain(settings.mic_volume());
        self.gain.process(&mut self.frame);

        let rms = rms_energy(&self.frame);
        self.shared
            .input_level
            .store(rms.to_bits(), Ordering::Relaxed);

        let vad_config = settings.vad_config();
        if self.vad.config() != vad_config {
            self.vad.set_config(vad_config);
        }
        self.ptt.sync(settings);
        if self.ptt.mode() == PttMode::VoiceActivation {
            let active = self.vad.update(rms);
            self.ptt.set_vad_active(active);
        }
        let transmit = self.ptt.is_transmitting();
        self.shared.speaking.store(transmit, Ordering::Relaxed);
        if !transmit {
            return;
        }

        let Some(sink) = self.shared.sink.read().clone() else {
            return;
        };
        let payload = self.encoder.encode(&self.frame);
        if payload.is_empty() {
            return;
        }
        bump(&self.shared.counters.packets_encoded);
        let position = *self.shared.emitter.read();
        sink(OutgoingAudioPacket::new(position, payload).encode());
    }

    pub fn encoder(&self) -> &SpeechEncoder {
        &self.encoder
    }
}

/// Playback-Seite: dekodieren, raeumlich rendern, mischen
pub struct PlaybackMixer {
    shared: Arc<PipelineShared>,
    mono: Vec<f32>,
    stereo: Vec<f32>,
    saturator: SoftSaturator,
    spatial_generation: u32,
}

impl PlaybackMixer {
    fn new(shared: Arc<PipelineShared>) -> Self {
        let spatial_generation = shared.settings.spatial_generation();
        Self {
            shared,
            mono: vec![0.0; MAX_DECODE_SAMPLES],
            stereo: vec![0.0; MAX_DECODE_SAMPLES * 2],
            saturator: SoftSaturator::new(),
            spatial_generation,
        }
    }

    /// Fuellt `out` (Stereo, interleaved) mit dem Mix aller Teilnehmer
    pub fn on_playback_frame(&mut self, out: &mut [f32]) {
        self.on_playback_frame_at(out, Instant::now());
    }

    /// Wie `on_playback_frame`, mit vorgegebenem Zeitpunkt
    pub fn on_playback_frame_at(&mut self, out: &mut [f32], now: Instant) {
        out.fill(0.0);

        let shared = Arc::clone(&self.shared);
        let settings = &shared.settings;
        let params = settings.spatial();
        let prebuffer_samples = settings.prebuffer_frames() as usize * STEREO_FRAME_SIZE;
        let listener = *shared.listener.read();

        let mut peers = shared.peers.lock();

        let generation = settings.spatial_generation();
        if generation != self.spatial_generation {
            self.spatial_generation = generation;
            for peer in peers.iter_mut() {
                peer.spatial.set_params(params);
            }
        }

        while let Some(packet) = shared.incoming.try_pop() {
            self.receive(&mut peers, packet, &listener, params, prebuffer_samples > 0, now);
        }

        let mut active = 0;
        for peer in peers.iter_mut() {
            if self.mix_peer(peer, out, &listener, prebuffer_samples, now) {
                active += 1;
            }
        }
        drop(peers);

        shared.counters.active_peers.store(active, Ordering::Relaxed);
        self.saturator.process(out);
    }

    fn receive(
        &mut self,
        peers: &mut PeerTable,
        packet: IncomingAudioPacket,
        listener: &ListenerPose,
        params: SpatialParams,
        prebuffer: bool,
        now: Instant,
    ) {
        if packet.payload.is_empty() {
            return;
        }
        let peer = match peers.get_or_insert_with(&packet.sender, || {
            let mut peer = PeerState::new(packet.sender.clone(), params, now)?;
            peer.prebuffering = prebuffer;
            Ok(peer)
        }) {
            Ok(peer) => peer,
            Err(e) => {
                warn!(peer = %packet.sender, fehler = %e, "Decoder konnte nicht angelegt werden");
                return;
            }
        };

        let decoded = peer.decoder.decode(&packet.payload, &mut self.mono);
        if decoded == 0 {
            bump(&self.shared.counters.decode_failures);
            return;
        }
        bump(&self.shared.counters.packets_decoded);

        if !peer.active {
            peer.prebuffering = prebuffer;
            debug!(peer = %peer.id, "Teilnehmer wieder aktiv");
        }
        peer.position = packet.position;
        peer.last_packet = now;
        peer.plc_count = 0;
        peer.active = true;

        let stereo = &mut self.stereo[..decoded * 2];
        peer.spatial
            .process(&self.mono[..decoded], listener, peer.position, stereo);
        let vorher = peer.jitter.overflow_count();
        peer.jitter.write(stereo);
        let verworfen = peer.jitter.overflow_count() - vorher;
        if verworfen > 0 {
            trace!(peer = %peer.id, verworfen, "Jitter-Buffer voll, Aeltestes verworfen");
        }
    }

    /// Mischt einen Teilnehmer; gibt zurueck ob er aktiv geblieben ist
    fn mix_peer(
        &mut self,
        peer: &mut PeerState,
        out: &mut [f32],
        listener: &ListenerPose,
        prebuffer_samples: usize,
        now: Instant,
    ) -> bool {
        if !peer.active {
            return false;
        }
        let elapsed = now.saturating_duration_since(peer.last_packet);

        if peer.prebuffering {
            if peer.jitter.available() >= prebuffer_samples {
                peer.prebuffering = false;
            } else {
                if elapsed > INACTIVE_TIMEOUT {
                    peer.active = false;
                    peer.prebuffering = false;
                    return false;
                }
                return true;
            }
        }

        let mixed = peer.jitter.mix_into(out);
        if mixed == out.len() {
            return true;
        }

        // Kurzes Lesen allein ist kein Verlust: die Geraeteperiode passt
        // selten genau auf 20 ms
        if elapsed < PLC_OVERDUE {
            return true;
        }

        if elapsed < PLC_GRACE && peer.plc_count < MAX_PLC_FRAMES {
            let n = peer.decoder.decode_loss_concealment(&mut self.mono);
            if n > 0 {
                peer.plc_count += 1;
                bump(&self.shared.counters.concealment_frames);
                // Nur die fehlende Luecke rendern, der Rest wird verworfen
                let frames = n.min((out.len() - mixed) / 2);
                let stereo = &mut self.stereo[..frames * 2];
                peer.spatial
                    .process(&self.mono[..frames], listener, peer.position, stereo);
                for (dst, s) in out[mixed..].iter_mut().zip(stereo.iter()) {
                    *dst += s;
                }
                trace!(peer = %peer.id, gemischt = mixed, verschleiert = frames, "Verschleierung");
            }
        } else if elapsed > INACTIVE_TIMEOUT {
            peer.active = false;
            debug!(peer = %peer.id, stille_ms = elapsed.as_millis() as u64, "Teilnehmer inaktiv");
            return false;
        }
        true
    }
}

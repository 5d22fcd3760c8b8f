//! RelayClient: WebSocket-Verbindung, Sitzung und Roster
//!
//! Der Client ist ein guenstig klonbarer Handle. Die eigentliche Verbindung
//! laeuft in einem tokio-Task, der ueber eine begrenzte mpsc-Queue mit
//! ausgehenden Nachrichten versorgt wird. Jeder `connect` startet eine neue
//! Generation; Tasks einer veralteten Generation beenden sich selbst und
//! duerfen den Zustand nicht mehr veraendern.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use nahfunk_core::{PeerId, PeerInfo, Vec3};
use nahfunk_protocol::{ClientMessage, IncomingAudioPacket, ServerMessage};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::listener::RelayListener;
use crate::roster::Roster;
use crate::state::SessionState;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Zaehler fuer Diagnose und Anzeige
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayTelemetry {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Wegen voller Ausgangs-Queue verworfene Nachrichten
    pub packets_dropped: u64,
    /// Eigene Audio-Pakete, die der Relay zurueckgeschickt hat
    pub echo_discarded: u64,
    /// Binaer-Nachrichten, die nicht als Audio-Paket lesbar waren
    pub packets_malformed: u64,
}

#[derive(Debug, Default, Clone)]
struct Session {
    room: Option<String>,
    identity: Option<PeerId>,
    display_name: Option<String>,
}

/// Wie eine Sitzung des Verbindungs-Tasks geendet hat
enum SessionEnde {
    /// Lokal beendet (disconnect oder neues connect)
    Beendet,
    /// Relay hat geschlossen
    Geschlossen(String),
    /// Transportfehler
    Fehler(String),
}

struct Inner {
    config: RwLock<RelayConfig>,
    state: RwLock<SessionState>,
    session: RwLock<Session>,
    roster: RwLock<Roster>,
    last_error: RwLock<Option<String>>,
    listeners: RwLock<Vec<Arc<dyn RelayListener>>>,
    outgoing: Mutex<Option<mpsc::Sender<Message>>>,
    generation: AtomicU64,

    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_dropped: AtomicU64,
    echo_discarded: AtomicU64,
    packets_malformed: AtomicU64,
}

/// Client fuer den Nahfunk-Relay
#[derive(Clone)]
pub struct RelayClient {
    inner: Arc<Inner>,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                state: RwLock::new(SessionState::Disconnected),
                session: RwLock::new(Session::default()),
                roster: RwLock::new(Roster::new()),
                last_error: RwLock::new(None),
                listeners: RwLock::new(Vec::new()),
                outgoing: Mutex::new(None),
                generation: AtomicU64::new(0),
                bytes_sent: AtomicU64::new(0),
                bytes_received: AtomicU64::new(0),
                packets_dropped: AtomicU64::new(0),
                echo_discarded: AtomicU64::new(0),
                packets_malformed: AtomicU64::new(0),
            }),
        }
    }

    /// Registriert einen Listener fuer Zustands-, Roster- und Audio-Ereignisse
    pub fn subscribe(&self, listener: Arc<dyn RelayListener>) {
        self.inner.listeners.write().push(listener);
    }

    pub fn config(&self) -> RelayConfig {
        self.inner.config.read().clone()
    }

    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.inner.config.write().auto_reconnect = enabled;
    }

    /// Verbindet mit `url`; eine bestehende Verbindung wird vorher getrennt
    ///
    /// Kehrt sofort zurueck. `Connected` wird asynchron gemeldet, sobald der
    /// WebSocket-Handshake abgeschlossen ist. Muss innerhalb einer
    /// tokio-Laufzeit aufgerufen werden.
    pub fn connect(&self, url: &str) -> RelayResult<()> {
        let handle = Handle::try_current().map_err(|_| RelayError::KeineLaufzeit)?;
        self.disconnect();

        self.inner.config.write().server_url = url.to_string();
        *self.inner.last_error.write() = None;
        let generation = {
            let mut state = self.inner.state.write();
            *state = SessionState::Connecting;
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!(url, "Verbinde mit Relay");
        self.inner
            .notify_state(SessionState::Connecting, &format!("Connecting to {url}"));

        handle.spawn(verbindungs_task(
            Arc::clone(&self.inner),
            generation,
            url.to_string(),
        ));
        Ok(())
    }

    /// Verlaesst den Raum und trennt die Verbindung
    ///
    /// Bereits eingereihte Nachrichten (z.B. `leave`) werden noch gesendet,
    /// danach schliesst der Task die Verbindung.
    pub fn disconnect(&self) {
        self.leave_room();

        let vorher = {
            let mut state = self.inner.state.write();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(&mut *state, SessionState::Disconnected)
        };
        self.inner.outgoing.lock().take();
        self.inner.roster.write().clear();
        *self.inner.session.write() = Session::default();

        if vorher != SessionState::Disconnected {
            info!(vorher = %vorher, "Relay-Verbindung getrennt");
            self.inner
                .notify_state(SessionState::Disconnected, "Disconnected");
        }
    }

    /// Betritt einen Raum; nur im Zustand `Connected` erlaubt
    pub fn join_room(&self, session_id: &str, display_name: &str, identity: &str) -> RelayResult<()> {
        if !self.state().is_connected() {
            return Err(RelayError::NichtVerbunden);
        }
        let json = ClientMessage::Join {
            session_id: session_id.to_string(),
            display_name: display_name.to_string(),
            identity: identity.to_string(),
        }
        .to_json()?;

        *self.inner.session.write() = Session {
            room: Some(session_id.to_string()),
            identity: Some(PeerId::from(identity)),
            display_name: Some(display_name.to_string()),
        };
        info!(raum = session_id, identity, "Raum betreten");
        self.inner.send(Message::Text(json))
    }

    /// Verlaesst den aktuellen Raum
    ///
    /// Roster und Raum werden auch dann geleert, wenn das Senden scheitert.
    pub fn leave_room(&self) {
        let raum = self.inner.session.read().room.clone();
        if let Some(raum) = raum {
            if self.state().is_connected() {
                match ClientMessage::Leave.to_json() {
                    Ok(json) => {
                        if let Err(e) = self.inner.send(Message::Text(json)) {
                            debug!(fehler = %e, "leave nicht gesendet");
                        }
                    }
                    Err(e) => warn!(fehler = %e, "leave nicht serialisierbar"),
                }
            }
            info!(raum = %raum, "Raum verlassen");
        }
        self.inner.session.write().room = None;
        self.inner.roster.write().clear();
    }

    /// Reiht ein Audio-Paket ein; `false` ausserhalb eines Raums oder bei voller Queue
    pub fn send_audio(&self, packet: Vec<u8>) -> bool {
        if !self.im_raum() {
            return false;
        }
        let len = packet.len() as u64;
        match self.inner.send(Message::Binary(packet)) {
            Ok(()) => {
                self.inner.bytes_sent.fetch_add(len, Ordering::Relaxed);
                true
            }
            Err(e) => {
                trace!(fehler = %e, "Audio-Paket nicht gesendet");
                false
            }
        }
    }

    /// Sendet die eigene Position ohne Audio (z.B. waehrend Stille)
    pub fn send_position_update(&self, position: Vec3, yaw: f32, pitch: f32) -> bool {
        if !self.im_raum() {
            return false;
        }
        let msg = ClientMessage::Position {
            x: position.x,
            y: position.y,
            z: position.z,
            yaw,
            pitch,
        };
        match msg.to_json() {
            Ok(json) => {
                let len = json.len() as u64;
                let ok = self.inner.send(Message::Text(json)).is_ok();
                if ok {
                    self.inner.bytes_sent.fetch_add(len, Ordering::Relaxed);
                }
                ok
            }
            Err(e) => {
                warn!(fehler = %e, "Position nicht serialisierbar");
                false
            }
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    pub fn state_string(&self) -> &'static str {
        self.state().as_str()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }

    /// Kopie des aktuellen Rosters
    pub fn connected_peers(&self) -> Vec<PeerInfo> {
        self.inner.roster.read().snapshot()
    }

    /// Aktueller Raum, falls beigetreten
    pub fn current_session(&self) -> Option<String> {
        self.inner.session.read().room.clone()
    }

    pub fn local_identity(&self) -> Option<PeerId> {
        self.inner.session.read().identity.clone()
    }

    pub fn display_name(&self) -> Option<String> {
        self.inner.session.read().display_name.clone()
    }

    pub fn telemetry(&self) -> RelayTelemetry {
        RelayTelemetry {
            bytes_sent: self.inner.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.inner.bytes_received.load(Ordering::Relaxed),
            packets_dropped: self.inner.packets_dropped.load(Ordering::Relaxed),
            echo_discarded: self.inner.echo_discarded.load(Ordering::Relaxed),
            packets_malformed: self.inner.packets_malformed.load(Ordering::Relaxed),
        }
    }

    pub fn downgrade(&self) -> WeakRelayClient {
        WeakRelayClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn im_raum(&self) -> bool {
        self.state().is_connected() && self.inner.session.read().room.is_some()
    }
}

/// Schwacher Verweis, z.B. fuer Listener und Callbacks, die den Client
/// selbst wieder benutzen und sonst einen Referenzzyklus bilden
#[derive(Clone)]
pub struct WeakRelayClient {
    inner: Weak<Inner>,
}

impl WeakRelayClient {
    pub fn upgrade(&self) -> Option<RelayClient> {
        self.inner.upgrade().map(|inner| RelayClient { inner })
    }
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("state", &self.state())
            .field("room", &self.current_session())
            .finish()
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Setzt den Zustand, falls `generation` noch aktuell ist
    fn transition(&self, generation: u64, neu: SessionState, info: &str) -> bool {
        {
            let mut state = self.state.write();
            if !self.is_current(generation) {
                return false;
            }
            *state = neu;
        }
        debug!(state = %neu, info, "Zustandswechsel");
        self.notify_state(neu, info);
        true
    }

    fn listeners(&self) -> Vec<Arc<dyn RelayListener>> {
        self.listeners.read().clone()
    }

    // Listener werden nie unter einem Lock aufgerufen, sie duerfen den
    // Client wieder benutzen.
    fn notify_state(&self, state: SessionState, info: &str) {
        for l in self.listeners() {
            l.on_state_changed(state, info);
        }
    }

    fn send(&self, msg: Message) -> RelayResult<()> {
        let outgoing = self.outgoing.lock();
        let Some(tx) = outgoing.as_ref() else {
            return Err(RelayError::NichtVerbunden);
        };
        match tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                Err(RelayError::SendFehler("Ausgangs-Queue voll".into()))
            }
            Err(TrySendError::Closed(_)) => Err(RelayError::NichtVerbunden),
        }
    }

    fn set_last_error(&self, msg: String) {
        *self.last_error.write() = Some(msg);
    }

    fn handle_text(&self, generation: u64, text: &str) {
        let msg = match ServerMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(fehler = %e, "Ungueltige Steuernachricht");
                self.set_last_error(format!("JSON parse error: {e}"));
                return;
            }
        };

        match msg {
            ServerMessage::Welcome { peers } => {
                info!(anzahl = peers.len(), "Willkommen im Raum");
                for entry in peers {
                    self.peer_joined(PeerInfo {
                        id: entry.id,
                        display_name: entry.display_name,
                    });
                }
            }
            ServerMessage::PeerJoined { peer } => self.peer_joined(PeerInfo {
                id: peer.id,
                display_name: peer.display_name,
            }),
            ServerMessage::PeerLeft { peer } => {
                let info = self.roster.write().remove(&peer.id).unwrap_or(PeerInfo {
                    id: peer.id,
                    display_name: peer.display_name,
                });
                info!(peer = %info.id, name = %info.display_name, "Teilnehmer gegangen");
                for l in self.listeners() {
                    l.on_peer_left(&info);
                }
            }
            ServerMessage::PeerPosition { id, x, y, z } => {
                let position = Vec3::new(x, y, z);
                trace!(peer = %id, ?position, "Positions-Update");
                for l in self.listeners() {
                    l.on_peer_position(&id, position);
                }
            }
            ServerMessage::Error { message } => {
                let message = if message.is_empty() {
                    "Unknown error".to_string()
                } else {
                    message
                };
                let text = format!("Server: {message}");
                warn!(fehler = %text, "Relay meldet Fehler");
                self.set_last_error(text.clone());
                self.transition(generation, SessionState::Error, &text);
            }
            ServerMessage::Pong => trace!("pong"),
            ServerMessage::Unknown => debug!("Unbekannte Steuernachricht ignoriert"),
        }
    }

    fn peer_joined(&self, info: PeerInfo) {
        info!(peer = %info.id, name = %info.display_name, "Teilnehmer beigetreten");
        self.roster.write().insert(info.clone());
        for l in self.listeners() {
            l.on_peer_joined(&info);
        }
    }

    fn handle_binary(&self, data: &[u8]) {
        self.bytes_received
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        let packet = match IncomingAudioPacket::decode(data) {
            Ok(p) => p,
            Err(e) => {
                self.packets_malformed.fetch_add(1, Ordering::Relaxed);
                debug!(fehler = %e, bytes = data.len(), "Audio-Paket verworfen");
                return;
            }
        };

        if self.is_echo(&packet.sender) {
            self.echo_discarded.fetch_add(1, Ordering::Relaxed);
            trace!(peer = %packet.sender, "Eigenes Echo verworfen");
            return;
        }

        for l in self.listeners() {
            l.on_audio_packet(&packet);
        }
    }

    fn is_echo(&self, sender: &PeerId) -> bool {
        let session = self.session.read();
        let Some(identity) = session.identity.as_ref() else {
            return false;
        };
        match (identity.as_u64(), sender.as_u64()) {
            (Some(a), Some(b)) => a == b,
            _ => identity == sender,
        }
    }

    /// Raeumt nach Verbindungsverlust auf; `true` wenn neu verbunden werden soll
    fn verbindung_verloren(&self, generation: u64, ende: &SessionEnde) -> bool {
        {
            let mut outgoing = self.outgoing.lock();
            if !self.is_current(generation) {
                return false;
            }
            *outgoing = None;
        }
        // Raum gilt nach Verlust als verlassen, der Relay kennt uns nicht mehr
        self.roster.write().clear();
        self.session.write().room = None;

        let auto = self.config.read().auto_reconnect;
        let (neu, info) = match ende {
            SessionEnde::Beendet => return false,
            SessionEnde::Geschlossen(grund) if auto => (
                SessionState::Reconnecting,
                format!("Connection closed: {grund}"),
            ),
            SessionEnde::Geschlossen(grund) => (
                SessionState::Disconnected,
                format!("Connection closed: {grund}"),
            ),
            SessionEnde::Fehler(grund) => {
                self.set_last_error(grund.clone());
                if auto {
                    (SessionState::Reconnecting, format!("Connection error: {grund}"))
                } else {
                    (SessionState::Error, grund.clone())
                }
            }
        };
        warn!(state = %neu, info = %info, "Relay-Verbindung verloren");
        self.transition(generation, neu, &info) && auto
    }

    async fn session_loop(
        &self,
        generation: u64,
        ws: WsStream,
        mut rx: mpsc::Receiver<Message>,
    ) -> SessionEnde {
        let (mut write, mut read) = ws.split();
        let mut ping = tokio::time::interval(self.config.read().ping_interval());
        // Erster Tick kommt sofort
        ping.tick().await;

        loop {
            tokio::select! {
                ausgehend = rx.recv() => match ausgehend {
                    Some(msg) => {
                        if let Err(e) = write.send(msg).await {
                            return SessionEnde::Fehler(e.to_string());
                        }
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnde::Beendet;
                    }
                },
                eingehend = read.next() => match eingehend {
                    Some(Ok(Message::Text(text))) => self.handle_text(generation, &text),
                    Some(Ok(Message::Binary(data))) => self.handle_binary(&data),
                    Some(Ok(Message::Close(frame))) => {
                        let grund = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                        return SessionEnde::Geschlossen(grund);
                    }
                    // Ping/Pong beantwortet tungstenite selbst
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnde::Fehler(e.to_string()),
                    None => return SessionEnde::Geschlossen(String::new()),
                },
                _ = ping.tick() => {
                    if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                        return SessionEnde::Fehler(e.to_string());
                    }
                }
            }
        }
    }
}

async fn verbindungs_task(inner: Arc<Inner>, generation: u64, url: String) {
    let mut erster_versuch = true;

    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                let kapazitaet = inner.config.read().outgoing_queue.max(1);
                let (tx, rx) = mpsc::channel(kapazitaet);
                {
                    let mut outgoing = inner.outgoing.lock();
                    if !inner.is_current(generation) {
                        return;
                    }
                    *outgoing = Some(tx);
                }
                if !inner.transition(
                    generation,
                    SessionState::Connected,
                    &format!("Connected to {url}"),
                ) {
                    return;
                }
                info!(url = %url, "Mit Relay verbunden");
                erster_versuch = false;

                let ende = inner.session_loop(generation, ws, rx).await;
                if !inner.verbindung_verloren(generation, &ende) {
                    return;
                }
            }
            Err(e) => {
                if !inner.is_current(generation) {
                    return;
                }
                let msg = e.to_string();
                if erster_versuch {
                    warn!(url = %url, fehler = %msg, "Verbindung zum Relay fehlgeschlagen");
                    inner.set_last_error(msg.clone());
                    inner.transition(generation, SessionState::Error, &msg);
                    return;
                }
                debug!(url = %url, fehler = %msg, "Neuverbindung fehlgeschlagen");
            }
        }

        let delay = inner.config.read().reconnect_delay();
        tokio::time::sleep(delay).await;
        if !inner.is_current(generation) {
            return;
        }
        debug!(url = %url, "Neuer Verbindungsversuch");
    }
}

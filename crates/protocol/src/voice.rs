//! Audio-Protokoll (WebSocket, binaer)
//!
//! Der Client schickt komprimierte Frames mit seiner Emitter-Position an
//! den Relay. Der Relay stellt die Absender-Kennung voran und verteilt
//! das Paket an alle anderen Teilnehmer desselben Raums.
//!
//! ## Ausgehend (Header = 13 Bytes)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   Typ (0x03 = Audio)
//!  1       4   Emitter X (f32 LE)
//!  5       4   Emitter Y (f32 LE)
//!  9       4   Emitter Z (f32 LE)
//! 13+      N   Komprimiertes Frame
//! ```
//!
//! ## Eingehend (Header = 21 Bytes)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   Typ (0x03 = Audio)
//!  1       8   Absender-Kennung (u64 LE)
//!  9       4   Absender X (f32 LE)
//! 13       4   Absender Y (f32 LE)
//! 17       4   Absender Z (f32 LE)
//! 21+      N   Komprimiertes Frame
//! ```

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use nahfunk_core::{PeerId, Vec3};

/// Nachrichtentyp fuer Audio-Frames
pub const MSG_AUDIO: u8 = 0x03;

fn ungueltig(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn header_pruefen(buf: &[u8], header_size: usize) -> io::Result<()> {
    if buf.len() < header_size {
        return Err(ungueltig(format!(
            "Audio-Nachricht zu kurz: {} Bytes (Header {})",
            buf.len(),
            header_size
        )));
    }
    if buf[0] != MSG_AUDIO {
        return Err(ungueltig(format!(
            "Unbekannter Nachrichtentyp: 0x{:02X} (erwartet 0x{:02X})",
            buf[0], MSG_AUDIO
        )));
    }
    Ok(())
}

fn vec3_lesen(rd: &mut &[u8]) -> Vec3 {
    let x = rd.get_f32_le();
    let y = rd.get_f32_le();
    let z = rd.get_f32_le();
    Vec3::new(x, y, z)
}

// ---------------------------------------------------------------------------
// OutgoingAudioPacket
// ---------------------------------------------------------------------------

/// Vom lokalen Client gesendetes Audio-Frame
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingAudioPacket {
    /// Position des lokalen Sprechers in Spiel-Einheiten
    pub position: Vec3,
    /// Komprimiertes Frame
    pub payload: Vec<u8>,
}

impl OutgoingAudioPacket {
    /// Header-Groesse in Bytes
    pub const HEADER_SIZE: usize = 13;

    pub fn new(position: Vec3, payload: Vec<u8>) -> Self {
        Self { position, payload }
    }

    /// Serialisiert das Paket (little-endian)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());
        buf.put_u8(MSG_AUDIO);
        buf.put_f32_le(self.position.x);
        buf.put_f32_le(self.position.y);
        buf.put_f32_le(self.position.z);
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    /// Deserialisiert ein ausgehendes Paket (z.B. auf Relay-Seite)
    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        header_pruefen(buf, Self::HEADER_SIZE)?;
        let mut rd = &buf[1..];
        let position = vec3_lesen(&mut rd);
        Ok(Self {
            position,
            payload: rd.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// IncomingAudioPacket
// ---------------------------------------------------------------------------

/// Vom Relay weitergeleitetes Audio-Frame eines entfernten Teilnehmers
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingAudioPacket {
    /// Absender-Kennung (dezimale Darstellung der u64-Draht-ID)
    pub sender: PeerId,
    /// Position des Absenders in Spiel-Einheiten
    pub position: Vec3,
    /// Komprimiertes Frame (leer bei reinem Header)
    pub payload: Vec<u8>,
}

impl IncomingAudioPacket {
    /// Header-Groesse in Bytes
    pub const HEADER_SIZE: usize = 21;

    /// Deserialisiert ein eingehendes Paket
    ///
    /// # Fehler
    /// - `InvalidData` wenn die Nachricht kuerzer als 21 Bytes ist
    /// - `InvalidData` bei falschem Typ-Byte
    ///
    /// Die Laenge der Nutzdaten ist nicht begrenzt, Opus-Pakete duerfen
    /// bis zu 1275 Bytes gross sein.
    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        header_pruefen(buf, Self::HEADER_SIZE)?;
        let mut rd = &buf[1..];
        let sender = PeerId::from(rd.get_u64_le());
        let position = vec3_lesen(&mut rd);
        Ok(Self {
            sender,
            position,
            payload: rd.to_vec(),
        })
    }

    /// Serialisiert das Paket; die Kennung muss numerisch sein
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let sender = self.sender.as_u64().ok_or_else(|| {
            ungueltig(format!("Absender-Kennung nicht numerisch: {}", self.sender))
        })?;
        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());
        buf.put_u8(MSG_AUDIO);
        buf.put_u64_le(sender);
        buf.put_f32_le(self.position.x);
        buf.put_f32_le(self.position.y);
        buf.put_f32_le(self.position.z);
        buf.put_slice(&self.payload);
        Ok(buf.to_vec())
    }

    /// Wandelt eine ausgehende Nachricht so um, wie der Relay sie weiterleitet
    pub fn relay_from(sender: u64, outgoing: &[u8]) -> io::Result<Vec<u8>> {
        header_pruefen(outgoing, OutgoingAudioPacket::HEADER_SIZE)?;
        let mut buf = BytesMut::with_capacity(outgoing.len() + 8);
        buf.put_u8(MSG_AUDIO);
        buf.put_u64_le(sender);
        buf.put_slice(&outgoing[1..]);
        Ok(buf.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ausgehender_header_ist_13_bytes() {
        let paket = OutgoingAudioPacket::new(Vec3::new(1.0, 2.0, 3.0), vec![]);
        assert_eq!(paket.encode().len(), 13);
    }

    #[test]
    fn ausgehend_little_endian_layout() {
        let paket = OutgoingAudioPacket::new(Vec3::new(1.0, -2.5, 0.0), vec![0xAA, 0xBB]);
        let bytes = paket.encode();
        assert_eq!(bytes[0], MSG_AUDIO);
        assert_eq!(&bytes[1..5], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[5..9], &(-2.5f32).to_le_bytes());
        assert_eq!(&bytes[13..], &[0xAA, 0xBB]);
    }

    #[test]
    fn eingehend_leere_nutzdaten_ok() {
        let mut buf = vec![MSG_AUDIO];
        buf.extend_from_slice(&7u64.to_le_bytes());
        buf.extend_from_slice(&[0u8; 12]);
        assert_eq!(buf.len(), IncomingAudioPacket::HEADER_SIZE);

        let paket = IncomingAudioPacket::decode(&buf).expect("reiner Header ist gueltig");
        assert_eq!(paket.sender.as_str(), "7");
        assert!(paket.payload.is_empty());
    }

    #[test]
    fn eingehend_zu_kurz() {
        let buf = [MSG_AUDIO; 20];
        assert!(IncomingAudioPacket::decode(&buf).is_err());
        assert!(IncomingAudioPacket::decode(&[]).is_err());
    }

    #[test]
    fn eingehend_falscher_typ() {
        let mut buf = vec![0x01];
        buf.extend_from_slice(&[0u8; 24]);
        let err = IncomingAudioPacket::decode(&buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn eingehend_grosse_nutzdaten_ok() {
        let mut buf = vec![MSG_AUDIO];
        buf.extend_from_slice(&3u64.to_le_bytes());
        buf.extend_from_slice(&[0u8; 12]);
        buf.extend(vec![0x5A; 1100]);
        let paket = IncomingAudioPacket::decode(&buf).unwrap();
        assert_eq!(paket.payload.len(), 1100);

        let out = OutgoingAudioPacket::new(Vec3::ZERO, vec![0x5A; 1275]).encode();
        assert_eq!(OutgoingAudioPacket::decode(&out).unwrap().payload.len(), 1275);
    }

    #[test]
    fn eingehend_felder_lesen() {
        let mut buf = vec![MSG_AUDIO];
        buf.extend_from_slice(&76561198000000001u64.to_le_bytes());
        buf.extend_from_slice(&100.0f32.to_le_bytes());
        buf.extend_from_slice(&(-50.0f32).to_le_bytes());
        buf.extend_from_slice(&10.0f32.to_le_bytes());
        buf.extend_from_slice(&[1, 2, 3]);

        let paket = IncomingAudioPacket::decode(&buf).unwrap();
        assert_eq!(paket.sender.as_str(), "76561198000000001");
        assert_eq!(paket.position, Vec3::new(100.0, -50.0, 10.0));
        assert_eq!(paket.payload, vec![1, 2, 3]);
    }

    #[test]
    fn relay_weiterleitung_stellt_absender_voran() {
        let out = OutgoingAudioPacket::new(Vec3::new(5.0, 6.0, 7.0), vec![9; 40]).encode();
        let weitergeleitet = IncomingAudioPacket::relay_from(1234, &out).unwrap();
        assert_eq!(weitergeleitet.len(), out.len() + 8);

        let paket = IncomingAudioPacket::decode(&weitergeleitet).unwrap();
        assert_eq!(paket.sender, PeerId::from(1234u64));
        assert_eq!(paket.position, Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(paket.payload.len(), 40);
    }

    #[test]
    fn encode_mit_nicht_numerischer_kennung_schlaegt_fehl() {
        let paket = IncomingAudioPacket {
            sender: PeerId::from("gast"),
            position: Vec3::ZERO,
            payload: vec![],
        };
        assert!(paket.encode().is_err());
    }
}

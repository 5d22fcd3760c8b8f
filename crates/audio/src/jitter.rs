//! Jitter-Buffer pro Teilnehmer
//!
//! Ring-Buffer mit bereits raeumlich gerenderten Stereo-Samples
//! (interleaved). Bei Ueberlauf werden die aeltesten Samples verworfen,
//! gespielt wird immer das frischeste Audio.

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

use nahfunk_core::format::SAMPLE_RATE;

/// Standard-Kapazitaet: 500 ms Stereo
pub const JITTER_CAPACITY: usize = SAMPLE_RATE as usize; // 48000 Samples = 24000 Frames * 2

pub struct JitterBuffer {
    rb: HeapRb<f32>,
    overflow: u64,
}

impl JitterBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            rb: HeapRb::new(capacity.max(2)),
            overflow: 0,
        }
    }

    /// Schreibt interleaved Stereo-Samples; gibt die Anzahl geschriebener zurueck
    ///
    /// Reicht der Platz nicht, werden vorher die aeltesten Samples
    /// verworfen. Ist `samples` laenger als die Kapazitaet, bleibt nur
    /// dessen Ende erhalten.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let capacity = self.capacity();
        let fresh = &samples[samples.len().saturating_sub(capacity)..];
        let mut dropped = samples.len() - fresh.len();

        let excess = fresh.len().saturating_sub(self.rb.vacant_len());
        if excess > 0 {
            dropped += self.rb.skip(excess);
        }
        if dropped > 0 {
            self.overflow += dropped as u64;
        }
        self.rb.push_slice(fresh)
    }

    /// Addiert bis zu `out.len()` Samples auf `out`
    ///
    /// Gibt die Anzahl tatsaechlich gemischter Samples zurueck.
    pub fn mix_into(&mut self, out: &mut [f32]) -> usize {
        let mut n = 0;
        for (dst, s) in out.iter_mut().zip(self.rb.pop_iter()) {
            *dst += s;
            n += 1;
        }
        n
    }

    /// Verfuegbare Samples (Stereo-Samples, nicht Frames)
    pub fn available(&self) -> usize {
        self.rb.occupied_len()
    }

    pub fn capacity(&self) -> usize {
        self.rb.capacity().get()
    }

    /// Bisher wegen Ueberlauf verworfene Samples
    pub fn overflow_count(&self) -> u64 {
        self.overflow
    }

    pub fn clear(&mut self) {
        self.rb.clear();
    }
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new(JITTER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesen_bis_n_ohne_unterlauf() {
        let mut jb = JitterBuffer::new(64);
        let daten: Vec<f32> = (0..20).map(|i| i as f32).collect();
        assert_eq!(jb.write(&daten), 20);

        let mut out = vec![0.0; 12];
        assert_eq!(jb.mix_into(&mut out), 12);
        assert_eq!(out, daten[..12]);
        assert_eq!(jb.available(), 8);
    }

    #[test]
    fn zu_wenig_daten_liefert_genau_m() {
        let mut jb = JitterBuffer::new(64);
        jb.write(&[0.5; 6]);
        let mut out = vec![0.0; 10];
        assert_eq!(jb.mix_into(&mut out), 6);
        assert!(out[..6].iter().all(|&s| s == 0.5));
        assert!(out[6..].iter().all(|&s| s == 0.0));
        assert_eq!(jb.available(), 0);
    }

    #[test]
    fn mischen_ist_additiv() {
        let mut jb = JitterBuffer::new(16);
        jb.write(&[0.25; 4]);
        let mut out = vec![0.5; 4];
        jb.mix_into(&mut out);
        assert!(out.iter().all(|&s| s == 0.75));
    }

    #[test]
    fn ueberlauf_verwirft_aelteste_samples() {
        let mut jb = JitterBuffer::new(8);
        assert_eq!(jb.write(&[1.0; 6]), 6);
        assert_eq!(jb.write(&[2.0; 6]), 6);
        assert_eq!(jb.available(), 8);
        assert_eq!(jb.overflow_count(), 4);

        let mut out = vec![0.0; 8];
        assert_eq!(jb.mix_into(&mut out), 8);
        assert_eq!(out, [1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn zu_langer_block_behaelt_das_ende() {
        let mut jb = JitterBuffer::new(4);
        jb.write(&[9.0; 2]);
        let block: Vec<f32> = (0..6).map(|i| i as f32).collect();
        assert_eq!(jb.write(&block), 4);
        assert_eq!(jb.overflow_count(), 4);

        let mut out = vec![0.0; 4];
        jb.mix_into(&mut out);
        assert_eq!(out, [2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn standard_kapazitaet_500ms_stereo() {
        let jb = JitterBuffer::default();
        assert_eq!(jb.capacity(), 48_000);
    }

    #[test]
    fn clear_leert() {
        let mut jb = JitterBuffer::new(8);
        jb.write(&[1.0; 4]);
        jb.clear();
        assert_eq!(jb.available(), 0);
    }
}

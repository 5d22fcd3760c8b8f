//! Schroeder-Hall mit fruehen Reflexionen
//!
//! Vier parallele Kammfilter mit gedaempfter Rueckkopplung, zwei serielle
//! Allpaesse zur Diffusion und sechs feste Reflexions-Taps mit eigenen
//! Gains pro Ohr. Der rechte Kanal nutzt leicht versetzte Laengen fuer
//! Stereobreite. Jeder Spatializer besitzt seine eigene Instanz.

/// Referenzrate, fuer die die Verzoegerungen ausgelegt sind
const REFERENZ_RATE: f32 = 44_100.0;

const COMB_DELAYS: [usize; 4] = [1557, 1617, 1491, 1422];
const COMB_SPREAD_R: [usize; 4] = [23, 17, 31, 13];
const COMB_FEEDBACK: f32 = 0.84;
const COMB_DAMP: f32 = 0.3;

const ALLPASS_DELAYS: [usize; 2] = [556, 441];
const ALLPASS_SPREAD_R: [usize; 2] = [11, 7];
const ALLPASS_FEEDBACK: f32 = 0.5;

const EARLY_DELAY_SIZE: usize = 2048;

/// (Verzoegerung bei 44.1 kHz, Gain links, Gain rechts)
const EARLY_TAPS: [(usize, f32, f32); 6] = [
    (171, 0.45, 0.45),
    (353, 0.38, 0.38),
    (557, 0.55, 0.22),
    (619, 0.22, 0.55),
    (857, 0.30, 0.28),
    (1187, 0.18, 0.20),
];

const EARLY_MIX: f32 = 0.6;
const LATE_MIX: f32 = 0.4;

fn skalieren(delay: usize, sample_rate: f32) -> usize {
    ((delay as f32 * sample_rate / REFERENZ_RATE) as usize).max(1)
}

/// Kammfilter mit Tiefpass im Rueckkopplungszweig
#[derive(Debug, Clone)]
struct Comb {
    buffer: Vec<f32>,
    idx: usize,
    feedback: f32,
    damp: f32,
    store: f32,
}

impl Comb {
    fn new(delay: usize, feedback: f32, damp: f32) -> Self {
        Self {
            buffer: vec![0.0; delay],
            idx: 0,
            feedback,
            damp,
            store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let out = self.buffer[self.idx];
        self.store = out * (1.0 - self.damp) + self.store * self.damp;
        self.buffer[self.idx] = input + self.store * self.feedback;
        self.idx = (self.idx + 1) % self.buffer.len();
        out
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.store = 0.0;
        self.idx = 0;
    }
}

/// Schroeder-Allpass
#[derive(Debug, Clone)]
struct Allpass {
    buffer: Vec<f32>,
    idx: usize,
    feedback: f32,
}

impl Allpass {
    fn new(delay: usize, feedback: f32) -> Self {
        Self {
            buffer: vec![0.0; delay],
            idx: 0,
            feedback,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.idx];
        let out = buffered - input;
        self.buffer[self.idx] = input + buffered * self.feedback;
        self.idx = (self.idx + 1) % self.buffer.len();
        out
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.idx = 0;
    }
}

#[derive(Debug, Clone, Copy)]
struct EarlyTap {
    delay: usize,
    gain_l: f32,
    gain_r: f32,
}

/// Stereo-Hall eines einzelnen Teilnehmers
#[derive(Debug, Clone)]
pub struct Reverb {
    combs_l: [Comb; 4],
    combs_r: [Comb; 4],
    allpass_l: [Allpass; 2],
    allpass_r: [Allpass; 2],
    early: Vec<f32>,
    early_pos: usize,
    taps: [EarlyTap; 6],
}

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        let comb = |i: usize, spread: usize| {
            Comb::new(
                skalieren(COMB_DELAYS[i], sample_rate) + spread,
                COMB_FEEDBACK,
                COMB_DAMP,
            )
        };
        let allpass = |i: usize, spread: usize| {
            Allpass::new(
                skalieren(ALLPASS_DELAYS[i], sample_rate) + spread,
                ALLPASS_FEEDBACK,
            )
        };
        let taps = EARLY_TAPS.map(|(delay, gain_l, gain_r)| EarlyTap {
            delay: skalieren(delay, sample_rate).min(EARLY_DELAY_SIZE - 1),
            gain_l,
            gain_r,
        });

        Self {
            combs_l: std::array::from_fn(|i| comb(i, 0)),
            combs_r: std::array::from_fn(|i| comb(i, COMB_SPREAD_R[i])),
            allpass_l: std::array::from_fn(|i| allpass(i, 0)),
            allpass_r: std::array::from_fn(|i| allpass(i, ALLPASS_SPREAD_R[i])),
            early: vec![0.0; EARLY_DELAY_SIZE],
            early_pos: 0,
            taps,
        }
    }

    /// Verarbeitet ein Mono-Sample und liefert (links, rechts)
    #[inline]
    pub fn process(&mut self, input: f32) -> (f32, f32) {
        let write = self.early_pos;
        self.early[write] = input;
        self.early_pos = (write + 1) % EARLY_DELAY_SIZE;

        let mut early_l = 0.0;
        let mut early_r = 0.0;
        for tap in &self.taps {
            let pos = (write + EARLY_DELAY_SIZE - tap.delay) % EARLY_DELAY_SIZE;
            let s = self.early[pos];
            early_l += s * tap.gain_l;
            early_r += s * tap.gain_r;
        }

        let mut late_l: f32 = self.combs_l.iter_mut().map(|c| c.process(input)).sum();
        let mut late_r: f32 = self.combs_r.iter_mut().map(|c| c.process(input)).sum();
        late_l *= 0.25;
        late_r *= 0.25;
        for ap in &mut self.allpass_l {
            late_l = ap.process(late_l);
        }
        for ap in &mut self.allpass_r {
            late_r = ap.process(late_r);
        }

        (
            early_l * EARLY_MIX + late_l * LATE_MIX,
            early_r * EARLY_MIX + late_r * LATE_MIX,
        )
    }

    pub fn clear(&mut self) {
        self.combs_l.iter_mut().for_each(Comb::clear);
        self.combs_r.iter_mut().for_each(Comb::clear);
        self.allpass_l.iter_mut().for_each(Allpass::clear);
        self.allpass_r.iter_mut().for_each(Allpass::clear);
        self.early.fill(0.0);
        self.early_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impuls_antwort(reverb: &mut Reverb, laenge: usize) -> Vec<(f32, f32)> {
        (0..laenge)
            .map(|i| reverb.process(if i == 0 { 1.0 } else { 0.0 }))
            .collect()
    }

    #[test]
    fn erste_reflexion_nach_skaliertem_tap() {
        let mut reverb = Reverb::new(48_000.0);
        let antwort = impuls_antwort(&mut reverb, 400);
        let erster_tap = skalieren(171, 48_000.0);
        // Vor dem ersten Tap und vor dem kuerzesten Kamm ist alles still
        assert!(antwort[..erster_tap].iter().all(|&(l, r)| l == 0.0 && r == 0.0));
        let (l, r) = antwort[erster_tap];
        assert!((l - 0.45 * EARLY_MIX).abs() < 1e-6);
        assert!((r - 0.45 * EARLY_MIX).abs() < 1e-6);
    }

    #[test]
    fn nachhall_klingt_lange_nach() {
        let mut reverb = Reverb::new(48_000.0);
        let antwort = impuls_antwort(&mut reverb, 48_000);
        let spaet: f32 = antwort[24_000..].iter().map(|(l, r)| l.abs() + r.abs()).sum();
        assert!(spaet > 0.0, "Hallfahne nach 0.5 s erwartet");
        assert!(antwort.iter().all(|(l, r)| l.is_finite() && r.is_finite()));
    }

    #[test]
    fn kanaele_sind_dekorreliert() {
        let mut reverb = Reverb::new(48_000.0);
        let antwort = impuls_antwort(&mut reverb, 4000);
        let unterschied: f32 = antwort.iter().map(|(l, r)| (l - r).abs()).sum();
        assert!(unterschied > 0.01);
    }

    #[test]
    fn clear_loescht_zustand() {
        let mut reverb = Reverb::new(48_000.0);
        impuls_antwort(&mut reverb, 1000);
        reverb.clear();
        assert!((0..3000).all(|_| reverb.process(0.0) == (0.0, 0.0)));
    }
}

//! Filter-Bausteine des Spatializers
//!
//! Alle Filter arbeiten sample-weise, allokieren nur im Konstruktor und
//! halten ihren Zustand ueber Frame-Grenzen hinweg.

use std::f32::consts::PI;

/// Parameter, der sample-weise exponentiell auf sein Ziel zulaeuft
#[derive(Debug, Clone, Copy)]
pub struct Smoothed {
    current: f32,
    target: f32,
}

impl Smoothed {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
        }
    }

    pub fn set(&mut self, target: f32) {
        self.target = target;
    }

    /// Springt sofort auf den Wert (erster Frame eines Teilnehmers)
    pub fn snap(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// Ein Schritt Richtung Ziel; gibt den neuen Wert zurueck
    #[inline]
    pub fn next(&mut self, coeff: f32) -> f32 {
        self.current += (self.target - self.current) * coeff;
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

/// Einpoliger Tiefpass `y = a*x + (1-a)*y[n-1]` (Luftabsorption)
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePole {
    z1: f32,
}

impl OnePole {
    /// `alpha` = 1.0 laesst das Signal unveraendert durch
    #[inline]
    pub fn process(&mut self, input: f32, alpha: f32) -> f32 {
        self.z1 = alpha * input + (1.0 - alpha) * self.z1;
        self.z1
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
    }
}

/// Luftabsorption: unter 5 m keine Filterung, danach sanft staerker
pub fn air_absorption_alpha(distance_m: f32) -> f32 {
    if distance_m < 5.0 {
        1.0
    } else {
        (1.0 / (1.0 + 0.008 * distance_m)).clamp(0.15, 1.0)
    }
}

/// Kopfschatten-Tiefpass fuer ein Ohr (bilineare Transformation, einpolig)
#[derive(Debug, Clone, Copy)]
pub struct HeadShadowFilter {
    b0: f32,
    a1: f32,
    x1: f32,
    y1: f32,
}

impl Default for HeadShadowFilter {
    fn default() -> Self {
        let mut f = Self {
            b0: 1.0,
            a1: 0.0,
            x1: 0.0,
            y1: 0.0,
        };
        f.set_incidence(PI * 0.5, 48_000.0);
        f
    }
}

impl HeadShadowFilter {
    /// Grenzfrequenz abhaengig vom Einfallswinkel zum Ohr
    ///
    /// `incidence` = 0: Quelle direkt vor dem Ohr (16 kHz),
    /// `incidence` = PI: Quelle auf der abgewandten Seite (2 kHz).
    pub fn set_incidence(&mut self, incidence: f32, sample_rate: f32) {
        let shadow = (1.0 - incidence.clamp(0.0, PI).cos()) * 0.5;
        let fc = (16_000.0 - shadow * 14_000.0).clamp(2_000.0, 18_000.0);
        let g = (PI * fc / sample_rate).tan();
        self.b0 = g / (1.0 + g);
        self.a1 = (g - 1.0) / (1.0 + g);
    }

    /// Aktuelle Grenzfrequenz (fuer Tests und Diagnose)
    pub fn cutoff_hz(&self, sample_rate: f32) -> f32 {
        let g = self.b0 / (1.0 - self.b0);
        g.atan() * sample_rate / PI
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.b0 * input + self.b0 * self.x1 - self.a1 * self.y1;
        self.x1 = input;
        self.y1 = out;
        out
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

/// Kurze Verzoegerungsleitung mit linearer Interpolation (ITD)
#[derive(Debug, Clone)]
pub struct FractionalDelay {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl FractionalDelay {
    pub fn new(max_delay: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay + 2],
            write_pos: 0,
        }
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Liest `delay` Samples hinter dem zuletzt geschriebenen Sample
    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(0.0, (len - 2) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;
        let newest = (self.write_pos + len - 1) % len;
        let a = self.buffer[(newest + len - whole) % len];
        let b = self.buffer[(newest + len - whole - 1) % len];
        a + (b - a) * frac
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Zug des Lesezeigers zurueck zur Basis-Verzoegerung (pro Sample, ~1 s)
const DOPPLER_RECENTER: f64 = 2e-5;

/// Verzoegerungsleitung mit variabler Lesegeschwindigkeit (Doppler)
///
/// Der Lesezeiger laeuft im Mittel `base_lag` Samples hinter dem
/// Schreibzeiger her und rueckt pro Sample um `ratio` vor. So kann er
/// schneller (hoehere Tonhoehe) wie langsamer (tiefere Tonhoehe) lesen.
/// Ein schwacher Zug fuehrt ihn zur Basis zurueck; hart begrenzt wird
/// auf 1 bis `len - 64` Samples Abstand.
#[derive(Debug, Clone)]
pub struct DopplerLine {
    buffer: Vec<f32>,
    written: u64,
    read_pos: f64,
    base_lag: f64,
}

impl DopplerLine {
    pub fn new(size: usize, base_lag: f32) -> Self {
        let size = size.max(128);
        let base_lag = f64::from(base_lag).clamp(1.0, (size - 64) as f64);
        Self {
            buffer: vec![0.0; size],
            written: 0,
            read_pos: -base_lag,
            base_lag,
        }
    }

    /// Schreibt ein Sample und liest das tonhoehenverschobene Sample
    #[inline]
    pub fn process(&mut self, input: f32, ratio: f32) -> f32 {
        let len = self.buffer.len();
        self.buffer[(self.written % len as u64) as usize] = input;
        self.written += 1;

        let write = self.written as f64;
        self.read_pos += f64::from(ratio);
        let drift = (write - self.read_pos) - self.base_lag;
        self.read_pos += drift * DOPPLER_RECENTER;

        let lag = write - self.read_pos;
        let max_lag = (len - 64) as f64;
        if lag > max_lag {
            self.read_pos = write - max_lag;
        } else if lag < 1.0 {
            self.read_pos = write - 1.0;
        }
        self.read_at(self.read_pos)
    }

    fn read_at(&self, pos: f64) -> f32 {
        // Vor dem ersten Sample ist die Leitung still
        if pos < 0.0 {
            return 0.0;
        }
        let len = self.buffer.len();
        let whole = pos.floor();
        let frac = (pos - whole) as f32;
        let i0 = (whole as u64 % len as u64) as usize;
        let i1 = (i0 + 1) % len;
        let a = self.buffer[i0];
        // Das naechste Sample existiert erst, wenn es bereits geschrieben ist
        let b = if whole + 1.0 < self.written as f64 {
            self.buffer[i1]
        } else {
            a
        };
        a + (b - a) * frac
    }

    /// Abstand Lesezeiger zu Schreibzeiger in Samples
    pub fn lag(&self) -> f64 {
        self.written as f64 - self.read_pos
    }

    pub fn base_lag(&self) -> f64 {
        self.base_lag
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.written = 0;
        self.read_pos = -self.base_lag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothed_laeuft_gegen_ziel() {
        let mut s = Smoothed::new(0.0);
        s.set(1.0);
        let erster = s.next(0.1);
        assert!((erster - 0.1).abs() < 1e-6);
        for _ in 0..200 {
            s.next(0.1);
        }
        assert!((s.current() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn smoothed_snap_sofort() {
        let mut s = Smoothed::new(0.0);
        s.snap(0.7);
        assert_eq!(s.next(0.0004), 0.7);
    }

    #[test]
    fn luftabsorption_nah_und_fern() {
        assert_eq!(air_absorption_alpha(1.0), 1.0);
        let fern = air_absorption_alpha(150.0);
        assert!(fern < 1.0 && fern >= 0.15);
        assert_eq!(air_absorption_alpha(100_000.0), 0.15);
    }

    #[test]
    fn one_pole_alpha_eins_ist_durchlass() {
        let mut f = OnePole::default();
        assert_eq!(f.process(0.3, 1.0), 0.3);
        assert_eq!(f.process(-0.2, 1.0), -0.2);
    }

    #[test]
    fn kopfschatten_abgewandtes_ohr_dunkler() {
        let mut zugewandt = HeadShadowFilter::default();
        let mut abgewandt = HeadShadowFilter::default();
        zugewandt.set_incidence(0.0, 48_000.0);
        abgewandt.set_incidence(PI, 48_000.0);
        assert!((zugewandt.cutoff_hz(48_000.0) - 16_000.0).abs() < 50.0);
        assert!((abgewandt.cutoff_hz(48_000.0) - 2_000.0).abs() < 50.0);
    }

    #[test]
    fn kopfschatten_gleichspannung_bleibt() {
        let mut f = HeadShadowFilter::default();
        f.set_incidence(PI, 48_000.0);
        let mut y = 0.0;
        for _ in 0..2000 {
            y = f.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn fractional_delay_ganzzahlig_und_bruchteil() {
        let mut d = FractionalDelay::new(8);
        for i in 0..6 {
            d.write(i as f32);
        }
        assert_eq!(d.read(0.0), 5.0);
        assert_eq!(d.read(2.0), 3.0);
        assert!((d.read(1.5) - 3.5).abs() < 1e-6);
    }

    #[test]
    fn doppler_ratio_eins_verzoegert_um_basis() {
        let mut line = DopplerLine::new(256, 8.0);
        let out: Vec<f32> = (0..20).map(|i| line.process(i as f32, 1.0)).collect();
        let erwartet: Vec<f32> = (0..20).map(|i| (i as f32 - 7.0).max(0.0)).collect();
        assert_eq!(out, erwartet);
        assert_eq!(line.lag(), 8.0);
    }

    /// Mittlere Lesegeschwindigkeit auf einer Rampe nach dem Einschwingen
    fn leserate(line: &mut DopplerLine, ratio: f32) -> f32 {
        let mut n = 0u32;
        for _ in 0..2_000 {
            line.process(n as f32, 1.0);
            n += 1;
        }
        let start = line.process(n as f32, ratio);
        n += 1;
        let mut ende = start;
        for _ in 0..480 {
            ende = line.process(n as f32, ratio);
            n += 1;
        }
        (ende - start) / 480.0
    }

    #[test]
    fn doppler_naehern_liest_schneller() {
        let mut line = DopplerLine::new(4096, 480.0);
        let rate = leserate(&mut line, 1.12);
        assert!(rate > 1.1, "Leserate {rate}");
        assert!(line.lag() < 480.0);
    }

    #[test]
    fn doppler_entfernen_liest_langsamer() {
        let mut line = DopplerLine::new(4096, 480.0);
        let rate = leserate(&mut line, 0.88);
        assert!(rate < 0.9, "Leserate {rate}");
        assert!(line.lag() > 480.0);
    }

    #[test]
    fn doppler_kehrt_zur_basis_zurueck() {
        let mut line = DopplerLine::new(4096, 480.0);
        for _ in 0..1_000 {
            line.process(0.0, 0.88);
        }
        assert!(line.lag() > 550.0);
        for _ in 0..400_000 {
            line.process(0.0, 1.0);
        }
        assert!((line.lag() - line.base_lag()).abs() < 1.0, "lag {}", line.lag());
    }

    #[test]
    fn doppler_abstand_bleibt_begrenzt() {
        let mut line = DopplerLine::new(256, 32.0);
        for _ in 0..10_000 {
            line.process(0.5, 0.88);
        }
        assert!(line.lag() <= (256 - 64) as f64 + 1e-9);
        for _ in 0..10_000 {
            line.process(0.5, 1.12);
        }
        assert!(line.lag() >= 1.0 - 1e-9);
    }
}

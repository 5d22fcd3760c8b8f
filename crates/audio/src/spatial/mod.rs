//! Binauraler 3D-Spatializer pro Teilnehmer
//!
//! Wandelt ein dekodiertes Mono-Frame abhaengig von Hoerer-Pose und
//! Quellposition in ein Stereo-Frame um:
//!
//! 1. Distanzdaempfung (innerer/aeusserer Radius, Rolloff, Hoerbarkeits-Boden)
//! 2. Azimut im Kopf-Koordinatensystem (0 = vorne, +PI/2 = rechts)
//! 3. ITD ueber fraktionale Verzoegerung am abgewandten Ohr
//! 4. ILD plus leichte Daempfung fuer Quellen hinter dem Hoerer
//! 5. Kopfschatten-Tiefpass pro Ohr
//! 6. Luftabsorption auf dem Mono-Signal
//! 7. Doppler ueber eine variabel gelesene Verzoegerungsleitung
//! 8. Distanzabhaengiger Hall-Send in einen eigenen Schroeder-Hall
//!
//! Alle abgeleiteten Parameter laufen sample-weise geglaettet auf ihr Ziel;
//! im ersten Frame springen sie direkt dorthin.
//!
//! Koordinaten wie in Unreal: X vorne, Y rechts, Z oben, 1 Einheit = 1 cm.

pub mod filters;
pub mod reverb;

use std::f32::consts::{FRAC_PI_2, PI};

use nahfunk_core::format::{units_to_meters, SAMPLE_RATE};
use nahfunk_core::{ListenerPose, Vec3};
use serde::{Deserialize, Serialize};

use filters::{
    air_absorption_alpha, DopplerLine, FractionalDelay, HeadShadowFilter, OnePole, Smoothed,
};
use reverb::Reverb;

const HEAD_RADIUS_M: f32 = 0.0875;
const SPEED_OF_SOUND: f32 = 343.0;
const MAX_ITD_SAMPLES: usize = 32;

/// Maximale ILD-Daempfung des abgewandten Ohrs
const MAX_ILD: f32 = 0.6;
/// Maximale Daempfung fuer Quellen direkt hinter dem Hoerer
const MAX_REAR_ATTENUATION: f32 = 0.3;
const OUTPUT_GAIN: f32 = 1.8;
/// Hoerbarkeits-Boden zwischen innerem und aeusserem Radius
const MIN_AUDIBLE_VOLUME: f32 = 0.04;
/// Basis-Exponent der Distanzkurve, wird mit dem Rolloff multipliziert
const ROLLOFF_EXPONENT: f32 = 0.6;

const HEAD_SHADOW_WET: f32 = 0.95;

const REVERB_SEND_NEAR: f32 = 0.15;
const REVERB_MIN_SEND: f32 = 0.001;

const DOPPLER_EXAGGERATION: f32 = 3.0;
const DOPPLER_MIN_RATIO: f32 = 0.88;
const DOPPLER_MAX_RATIO: f32 = 1.12;
const DOPPLER_BUF_SIZE: usize = 4096;
/// Grund-Verzoegerung der Doppler-Leitung (10 ms), Spielraum fuers schnellere Lesen
const DOPPLER_BASE_LAG: f32 = 480.0;

/// Glaettung pro Sample (~55 ms Zeitkonstante bei 48 kHz)
const SMOOTH_COEFF: f32 = 0.0004;
const DOPPLER_SMOOTH_COEFF: f32 = 0.0002;

/// Dauer eines Frames in Sekunden (fuer die Radialgeschwindigkeit)
const FRAME_SECONDS: f32 = 0.02;

/// Raeumliche Parameter, werden als Ganzes ersetzt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialParams {
    /// Bis zu diesem Abstand volle Lautstaerke (Spiel-Einheiten)
    pub inner_radius: f32,
    /// Ab diesem Abstand unhoerbar (Spiel-Einheiten)
    pub outer_radius: f32,
    /// Steilheit der Distanzkurve (> 0, Minimum 0.1)
    pub rolloff: f32,
    /// Gesamtlautstaerke (0.0..=2.0)
    pub master_volume: f32,
    /// 3D-Verarbeitung aktiv; sonst mittiges Stereo
    pub enabled: bool,
    pub reverb_enabled: bool,
    /// Hall-Anteil (0.0..=1.0)
    pub reverb_mix: f32,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            inner_radius: 2_500.0,
            outer_radius: 15_000.0,
            rolloff: 1.0,
            master_volume: 1.5,
            enabled: true,
            reverb_enabled: true,
            reverb_mix: 1.0,
        }
    }
}

impl SpatialParams {
    /// Begrenzt alle Werte auf sinnvolle Bereiche
    pub fn normalized(mut self) -> Self {
        self.inner_radius = self.inner_radius.max(0.0);
        self.outer_radius = self.outer_radius.max(self.inner_radius);
        self.rolloff = self.rolloff.max(0.1);
        self.master_volume = self.master_volume.clamp(0.0, 2.0);
        self.reverb_mix = self.reverb_mix.clamp(0.0, 1.0);
        self
    }

    /// Lautstaerke in Abhaengigkeit vom Abstand (Spiel-Einheiten)
    ///
    /// 1.0 bis zum inneren Radius, 0.0 ab dem aeusseren Radius, dazwischen
    /// monoton fallend mit Boden `MIN_AUDIBLE_VOLUME`.
    pub fn distance_volume(&self, distance: f32) -> f32 {
        if distance <= self.inner_radius {
            return 1.0;
        }
        if distance >= self.outer_radius {
            return 0.0;
        }
        let span = self.outer_radius - self.inner_radius;
        let ratio = ((distance - self.inner_radius) / span).clamp(0.0, 1.0);
        let exponent = ROLLOFF_EXPONENT * self.rolloff.max(0.1);
        (1.0 - ratio.powf(exponent)).max(MIN_AUDIBLE_VOLUME)
    }

    /// Hall-Send: schon nah hoerbar, zum aeusseren Radius hin fast ganz nass
    pub fn reverb_send(&self, distance: f32) -> f32 {
        if !self.reverb_enabled {
            return 0.0;
        }
        let send = if distance <= self.inner_radius {
            REVERB_SEND_NEAR
        } else {
            REVERB_SEND_NEAR
                + smoothstep(self.inner_radius, self.outer_radius, distance)
                    * (1.0 - REVERB_SEND_NEAR)
        };
        send * self.reverb_mix
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0 + 1e-9)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Azimut der Quelle relativ zur Blickrichtung (-PI..PI, positiv = rechts)
pub fn azimuth(listener: &ListenerPose, source: Vec3) -> f32 {
    let delta = source - listener.position;
    let (sin_yaw, cos_yaw) = listener.yaw.sin_cos();
    let forward = delta.x * cos_yaw + delta.y * sin_yaw;
    let right = -delta.x * sin_yaw + delta.y * cos_yaw;
    right.atan2(forward + 1e-9)
}

/// Binauraler Spatializer eines Teilnehmers
pub struct SpatialRenderer {
    params: SpatialParams,

    gain_l: Smoothed,
    gain_r: Smoothed,
    delay_l: Smoothed,
    delay_r: Smoothed,
    reverb_send: Smoothed,
    reverb_level: Smoothed,
    doppler: Smoothed,

    itd_l: FractionalDelay,
    itd_r: FractionalDelay,
    shadow_l: HeadShadowFilter,
    shadow_r: HeadShadowFilter,
    air: OnePole,
    doppler_line: DopplerLine,
    reverb: Reverb,

    prev_distance: Option<f32>,
    first_frame: bool,
}

impl SpatialRenderer {
    pub fn new(params: SpatialParams) -> Self {
        Self {
            params: params.normalized(),
            gain_l: Smoothed::new(0.5),
            gain_r: Smoothed::new(0.5),
            delay_l: Smoothed::new(0.0),
            delay_r: Smoothed::new(0.0),
            reverb_send: Smoothed::new(0.0),
            reverb_level: Smoothed::new(0.0),
            doppler: Smoothed::new(1.0),
            itd_l: FractionalDelay::new(MAX_ITD_SAMPLES),
            itd_r: FractionalDelay::new(MAX_ITD_SAMPLES),
            shadow_l: HeadShadowFilter::default(),
            shadow_r: HeadShadowFilter::default(),
            air: OnePole::default(),
            doppler_line: DopplerLine::new(DOPPLER_BUF_SIZE, DOPPLER_BASE_LAG),
            reverb: Reverb::new(SAMPLE_RATE as f32),
            prev_distance: None,
            first_frame: true,
        }
    }

    pub fn set_params(&mut self, params: SpatialParams) {
        self.params = params.normalized();
    }

    pub fn params(&self) -> &SpatialParams {
        &self.params
    }

    /// Aktuelle (geglaettete) Ohr-Gains
    pub fn current_gains(&self) -> (f32, f32) {
        (self.gain_l.current(), self.gain_r.current())
    }

    /// Aktuelle (geglaettete) Ohr-Verzoegerungen in Samples
    pub fn current_delays(&self) -> (f32, f32) {
        (self.delay_l.current(), self.delay_r.current())
    }

    /// Ziel-Verhaeltnis der Doppler-Tonhoehe
    pub fn doppler_target(&self) -> f32 {
        self.doppler.target()
    }

    /// Setzt den gesamten Filterzustand zurueck
    pub fn reset(&mut self) {
        self.itd_l.reset();
        self.itd_r.reset();
        self.shadow_l.reset();
        self.shadow_r.reset();
        self.air.reset();
        self.doppler_line.reset();
        self.reverb.clear();
        self.gain_l.snap(0.5);
        self.gain_r.snap(0.5);
        self.delay_l.snap(0.0);
        self.delay_r.snap(0.0);
        self.reverb_send.snap(0.0);
        self.reverb_level.snap(0.0);
        self.doppler.snap(1.0);
        self.prev_distance = None;
        self.first_frame = true;
    }

    /// Rendert `mono` nach `stereo_out` (interleaved, doppelte Laenge)
    ///
    /// Gibt die angewandte Distanz-Lautstaerke zurueck (0.0 = unhoerbar).
    /// Im deaktivierten Modus wird die Master-Lautstaerke zurueckgegeben.
    pub fn process(
        &mut self,
        mono: &[f32],
        listener: &ListenerPose,
        source: Vec3,
        stereo_out: &mut [f32],
    ) -> f32 {
        let frames = mono.len().min(stereo_out.len() / 2);
        let out = &mut stereo_out[..frames * 2];
        out.fill(0.0);

        if !self.params.enabled {
            let master = self.params.master_volume;
            for (frame, &s) in out.chunks_exact_mut(2).zip(mono) {
                frame[0] = s * master;
                frame[1] = s * master;
            }
            return master;
        }

        // --- Geometrie ---
        let distance = (source - listener.position).length();
        let distance_m = units_to_meters(distance);
        let az = azimuth(listener, source);
        let sin_az = az.sin();

        // Auch unhoerbare Quellen laufen weiter durch, damit Gains und
        // Hallfahne ausklingen statt abzureissen
        let volume = self.params.distance_volume(distance);
        let doppler_target = self.doppler_ratio(distance);
        self.prev_distance = Some(distance);

        // --- ITD: nur das abgewandte Ohr wird verzoegert ---
        let itd = (HEAD_RADIUS_M / SPEED_OF_SOUND * sin_az.abs() * SAMPLE_RATE as f32)
            .min(MAX_ITD_SAMPLES as f32);
        let (target_delay_l, target_delay_r) = if az >= 0.0 { (itd, 0.0) } else { (0.0, itd) };

        // --- ILD + Rueckseite ---
        let ild = 1.0 - MAX_ILD * sin_az.abs();
        let (mut target_l, mut target_r) = if az >= 0.0 { (ild, 1.0) } else { (1.0, ild) };
        let abs_az = az.abs();
        if abs_az > FRAC_PI_2 {
            let rearness = (abs_az - FRAC_PI_2) / FRAC_PI_2;
            let rear = 1.0 - rearness * MAX_REAR_ATTENUATION;
            target_l *= rear;
            target_r *= rear;
        }
        let output = volume * self.params.master_volume * OUTPUT_GAIN;
        target_l *= output;
        target_r *= output;

        // --- Kopfschatten: Einfallswinkel relativ zur Ohrachse ---
        let sr = SAMPLE_RATE as f32;
        self.shadow_l.set_incidence((FRAC_PI_2 + az).clamp(0.0, PI), sr);
        self.shadow_r.set_incidence((FRAC_PI_2 - az).clamp(0.0, PI), sr);

        let air_alpha = air_absorption_alpha(distance_m);
        let target_send = self.params.reverb_send(distance);
        let target_level = volume * self.params.master_volume;

        self.gain_l.set(target_l);
        self.gain_r.set(target_r);
        self.delay_l.set(target_delay_l);
        self.delay_r.set(target_delay_r);
        self.reverb_send.set(target_send);
        self.reverb_level.set(target_level);
        self.doppler.set(doppler_target);

        if self.first_frame {
            self.gain_l.snap(target_l);
            self.gain_r.snap(target_r);
            self.delay_l.snap(target_delay_l);
            self.delay_r.snap(target_delay_r);
            self.reverb_send.snap(target_send);
            self.reverb_level.snap(target_level);
            self.doppler.snap(doppler_target);
            self.first_frame = false;
        }

        let reverb_on = self.params.reverb_enabled;

        for (frame, &input) in out.chunks_exact_mut(2).zip(mono) {
            let g_l = self.gain_l.next(SMOOTH_COEFF);
            let g_r = self.gain_r.next(SMOOTH_COEFF);
            let d_l = self.delay_l.next(SMOOTH_COEFF);
            let d_r = self.delay_r.next(SMOOTH_COEFF);
            let send = self.reverb_send.next(SMOOTH_COEFF);
            let level = self.reverb_level.next(SMOOTH_COEFF);
            let ratio = self.doppler.next(DOPPLER_SMOOTH_COEFF);

            let absorbed = self.air.process(input, air_alpha);
            let shifted = self.doppler_line.process(absorbed, ratio);

            self.itd_l.write(shifted);
            self.itd_r.write(shifted);
            let raw_l = self.itd_l.read(d_l);
            let raw_r = self.itd_r.read(d_r);

            let ear_l = raw_l * (1.0 - HEAD_SHADOW_WET) + self.shadow_l.process(raw_l) * HEAD_SHADOW_WET;
            let ear_r = raw_r * (1.0 - HEAD_SHADOW_WET) + self.shadow_r.process(raw_r) * HEAD_SHADOW_WET;

            let (mut wet_l, mut wet_r) = (0.0, 0.0);
            if reverb_on && send > REVERB_MIN_SEND {
                let (l, r) = self.reverb.process(absorbed * level);
                wet_l = l * send;
                wet_r = r * send;
            }

            frame[0] = ear_l * g_l + wet_l;
            frame[1] = ear_r * g_r + wet_r;
        }

        volume
    }

    /// Doppler-Verhaeltnis aus der Abstandsaenderung seit dem letzten Frame
    fn doppler_ratio(&self, distance: f32) -> f32 {
        let Some(prev) = self.prev_distance else {
            return 1.0;
        };
        // Einheiten pro Frame -> m/s; positiv = Quelle entfernt sich
        let velocity = units_to_meters(distance - prev) / FRAME_SECONDS * DOPPLER_EXAGGERATION;
        let velocity = velocity.clamp(-SPEED_OF_SOUND * 0.8, SPEED_OF_SOUND * 0.8);
        (SPEED_OF_SOUND / (SPEED_OF_SOUND + velocity)).clamp(DOPPLER_MIN_RATIO, DOPPLER_MAX_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nahfunk_core::format::{FRAME_SIZE, STEREO_FRAME_SIZE};

    fn ton(offset: usize) -> Vec<f32> {
        (0..FRAME_SIZE)
            .map(|i| ((offset + i) as f32 * 440.0 * std::f32::consts::TAU / 48_000.0).sin() * 0.3)
            .collect()
    }

    fn energie(stereo: &[f32]) -> (f32, f32) {
        stereo.chunks_exact(2).fold((0.0, 0.0), |(l, r), f| {
            (l + f[0] * f[0], r + f[1] * f[1])
        })
    }

    fn ohne_hall() -> SpatialParams {
        SpatialParams {
            reverb_enabled: false,
            ..Default::default()
        }
    }

    #[test]
    fn distanz_innen_voll_aussen_null() {
        for rolloff in [0.1, 0.5, 1.0, 2.0, 5.0] {
            let p = SpatialParams {
                rolloff,
                ..Default::default()
            };
            assert_eq!(p.distance_volume(0.0), 1.0);
            assert_eq!(p.distance_volume(p.inner_radius), 1.0);
            assert_eq!(p.distance_volume(p.outer_radius), 0.0);
            assert_eq!(p.distance_volume(p.outer_radius * 3.0), 0.0);
        }
    }

    #[test]
    fn distanz_monoton_fallend() {
        for rolloff in [0.1, 0.3, 1.0, 2.5, 10.0] {
            let p = SpatialParams {
                rolloff,
                ..Default::default()
            };
            let mut vorher = f32::INFINITY;
            let mut d = 0.0;
            while d <= p.outer_radius + 100.0 {
                let v = p.distance_volume(d);
                assert!(v <= vorher, "rolloff={rolloff} d={d}: {v} > {vorher}");
                assert!((0.0..=1.0).contains(&v));
                vorher = v;
                d += 50.0;
            }
        }
    }

    #[test]
    fn distanz_boden_bleibt_hoerbar() {
        let p = SpatialParams::default();
        assert!(p.distance_volume(p.outer_radius - 1.0) >= MIN_AUDIBLE_VOLUME);
    }

    #[test]
    fn azimut_konvention() {
        let hoerer = ListenerPose::new(Vec3::ZERO, 0.0);
        assert!(azimuth(&hoerer, Vec3::new(100.0, 0.0, 0.0)).abs() < 1e-3);
        assert!((azimuth(&hoerer, Vec3::new(0.0, 100.0, 0.0)) - FRAC_PI_2).abs() < 1e-3);
        assert!((azimuth(&hoerer, Vec3::new(0.0, -100.0, 0.0)) + FRAC_PI_2).abs() < 1e-3);
        assert!((azimuth(&hoerer, Vec3::new(-100.0, 0.0, 0.0)).abs() - PI).abs() < 1e-3);

        // Hoerer schaut nach +Y: Quelle auf +Y ist vorne
        let gedreht = ListenerPose::new(Vec3::ZERO, FRAC_PI_2);
        assert!(azimuth(&gedreht, Vec3::new(0.0, 100.0, 0.0)).abs() < 1e-3);
    }

    #[test]
    fn quelle_am_hoerer_mittig_und_voll() {
        let mut r = SpatialRenderer::new(ohne_hall());
        let hoerer = ListenerPose::new(Vec3::new(10.0, 20.0, 0.0), 0.3);
        let mut out = vec![0.0; STEREO_FRAME_SIZE];

        let volume = r.process(&ton(0), &hoerer, hoerer.position, &mut out);
        assert!((volume - 1.0).abs() < 1e-6);

        let (g_l, g_r) = r.current_gains();
        assert!((g_l - g_r).abs() < 1e-3 * g_l.max(g_r));
        let (e_l, e_r) = energie(&out);
        assert!(e_l > 0.0);
        assert!((e_l - e_r).abs() / e_l < 0.01, "L={e_l} R={e_r}");
    }

    #[test]
    fn quelle_rechts_ist_rechts_lauter_und_links_verzoegert() {
        let mut r = SpatialRenderer::new(ohne_hall());
        let hoerer = ListenerPose::new(Vec3::ZERO, 0.0);
        let mut out = vec![0.0; STEREO_FRAME_SIZE];
        r.process(&ton(0), &hoerer, Vec3::new(0.0, 500.0, 0.0), &mut out);

        let (g_l, g_r) = r.current_gains();
        assert!(g_r > g_l);
        assert!((g_l / g_r - (1.0 - MAX_ILD)).abs() < 1e-3);

        let (d_l, d_r) = r.current_delays();
        assert!(d_l > 10.0 && d_l <= MAX_ITD_SAMPLES as f32);
        assert_eq!(d_r, 0.0);

        let (e_l, e_r) = energie(&out);
        assert!(e_r > e_l * 2.0);
    }

    #[test]
    fn quelle_hinten_leiser_als_vorne() {
        let hoerer = ListenerPose::new(Vec3::ZERO, 0.0);
        let mut vorne = SpatialRenderer::new(ohne_hall());
        let mut hinten = SpatialRenderer::new(ohne_hall());
        let mut out = vec![0.0; STEREO_FRAME_SIZE];
        vorne.process(&ton(0), &hoerer, Vec3::new(1000.0, 0.0, 0.0), &mut out);
        hinten.process(&ton(0), &hoerer, Vec3::new(-1000.0, 0.0, 0.0), &mut out);
        let (v, _) = vorne.current_gains();
        let (h, _) = hinten.current_gains();
        assert!((h / v - (1.0 - MAX_REAR_ATTENUATION)).abs() < 1e-3);
    }

    #[test]
    fn jenseits_aeusserer_radius_stumm() {
        let mut r = SpatialRenderer::new(SpatialParams::default());
        let hoerer = ListenerPose::default();
        let mut out = vec![1.0; STEREO_FRAME_SIZE];
        for abstand in [15_000.0, 20_000.0] {
            let v = r.process(&ton(0), &hoerer, Vec3::new(abstand, 0.0, 0.0), &mut out);
            assert_eq!(v, 0.0);
            assert!(out.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn deaktiviert_ist_mittige_kopie() {
        let params = SpatialParams {
            enabled: false,
            master_volume: 0.5,
            ..Default::default()
        };
        let mut r = SpatialRenderer::new(params);
        let mono = ton(0);
        let mut out = vec![0.0; STEREO_FRAME_SIZE];
        let v = r.process(&mono, &ListenerPose::default(), Vec3::new(99_999.0, 0.0, 0.0), &mut out);
        assert_eq!(v, 0.5);
        for (i, &s) in mono.iter().enumerate() {
            assert_eq!(out[i * 2], s * 0.5);
            assert_eq!(out[i * 2 + 1], s * 0.5);
        }
    }

    #[test]
    fn parameter_werden_geglaettet() {
        let mut r = SpatialRenderer::new(ohne_hall());
        let hoerer = ListenerPose::default();
        let mut out = vec![0.0; STEREO_FRAME_SIZE];
        // Erster Frame links: Werte springen sofort
        r.process(&ton(0), &hoerer, Vec3::new(0.0, -500.0, 0.0), &mut out);
        let (l0, r0) = r.current_gains();
        assert!(l0 > r0);

        // Sprung nach rechts: nach einem Frame noch nicht am Ziel
        r.process(&ton(FRAME_SIZE), &hoerer, Vec3::new(0.0, 500.0, 0.0), &mut out);
        let (l1, r1) = r.current_gains();
        assert!(l1 < l0 && l1 > r0, "Gain links muss gleiten: {l0} -> {l1}");
        assert!(r1 > r0 && r1 < l0);
    }

    #[test]
    fn doppler_naehern_erhoeht_tonhoehe() {
        let mut r = SpatialRenderer::new(ohne_hall());
        let hoerer = ListenerPose::default();
        let mut out = vec![0.0; STEREO_FRAME_SIZE];
        r.process(&ton(0), &hoerer, Vec3::new(3000.0, 0.0, 0.0), &mut out);
        assert_eq!(r.doppler_target(), 1.0);

        r.process(&ton(FRAME_SIZE), &hoerer, Vec3::new(2900.0, 0.0, 0.0), &mut out);
        let naehern = r.doppler_target();
        assert!(naehern > 1.0 && naehern <= DOPPLER_MAX_RATIO);

        r.process(&ton(2 * FRAME_SIZE), &hoerer, Vec3::new(3000.0, 0.0, 0.0), &mut out);
        assert!(r.doppler_target() < 1.0);

        // Teleport wird auf das schmale Band begrenzt
        r.process(&ton(3 * FRAME_SIZE), &hoerer, Vec3::new(100.0, 0.0, 0.0), &mut out);
        assert_eq!(r.doppler_target(), DOPPLER_MAX_RATIO);
    }

    #[test]
    fn hall_klingt_ueber_frames_nach() {
        let mut r = SpatialRenderer::new(SpatialParams::default());
        let hoerer = ListenerPose::default();
        let quelle = Vec3::new(8000.0, 0.0, 0.0);
        let mut out = vec![0.0; STEREO_FRAME_SIZE];
        r.process(&ton(0), &hoerer, quelle, &mut out);

        let stille = vec![0.0; FRAME_SIZE];
        r.process(&stille, &hoerer, quelle, &mut out);
        r.process(&stille, &hoerer, quelle, &mut out);
        let (l, rr) = energie(&out);
        assert!(l + rr > 1e-6, "Hallfahne im dritten Frame erwartet");

        let mut trocken = SpatialRenderer::new(SpatialParams {
            reverb_enabled: false,
            ..Default::default()
        });
        trocken.process(&ton(0), &hoerer, quelle, &mut out);
        trocken.process(&stille, &hoerer, quelle, &mut out);
        trocken.process(&stille, &hoerer, quelle, &mut out);
        let (l, rr) = energie(&out);
        assert!(l + rr < 1e-6);
    }

    #[test]
    fn master_null_ist_stumm_auch_im_hall() {
        let mut r = SpatialRenderer::new(SpatialParams {
            master_volume: 0.0,
            ..Default::default()
        });
        let hoerer = ListenerPose::default();
        let quelle = Vec3::new(8000.0, 0.0, 0.0);
        let mut out = vec![1.0; STEREO_FRAME_SIZE];
        for i in 0..3 {
            r.process(&ton(i * FRAME_SIZE), &hoerer, quelle, &mut out);
            assert!(out.iter().all(|&s| s == 0.0), "Frame {i} muss still sein");
        }
    }

    #[test]
    fn hallfahne_klingt_aus_wenn_quelle_unhoerbar_wird() {
        let mut r = SpatialRenderer::new(SpatialParams::default());
        let hoerer = ListenerPose::default();
        let mut out = vec![0.0; STEREO_FRAME_SIZE];
        r.process(&ton(0), &hoerer, Vec3::new(8000.0, 0.0, 0.0), &mut out);

        let stille = vec![0.0; FRAME_SIZE];
        let v = r.process(&stille, &hoerer, Vec3::new(20_000.0, 0.0, 0.0), &mut out);
        assert_eq!(v, 0.0);
        let (l, rr) = energie(&out);
        assert!(l + rr > 1e-6, "Ausklang statt hartem Abriss erwartet");
    }

    #[test]
    fn doppler_verschiebt_tonhoehe_im_signal() {
        // Nulldurchgaenge eines 3-kHz-Tons zaehlen: Naehern erhoeht die Frequenz
        let sinus = |offset: usize| -> Vec<f32> {
            (0..FRAME_SIZE)
                .map(|i| ((offset + i) as f32 * 3000.0 * std::f32::consts::TAU / 48_000.0).sin() * 0.3)
                .collect()
        };
        let zaehlen = |schritt: f32| -> usize {
            let mut r = SpatialRenderer::new(ohne_hall());
            let hoerer = ListenerPose::default();
            let mut out = vec![0.0; STEREO_FRAME_SIZE];
            let mut links = Vec::new();
            for i in 0..16 {
                // 5 Einheiten pro Frame = 2.5 m/s
                let quelle = Vec3::new(2000.0 + schritt * i as f32, 0.0, 0.0);
                r.process(&sinus(i * FRAME_SIZE), &hoerer, quelle, &mut out);
                if i >= 8 {
                    links.extend(out.chunks_exact(2).map(|f| f[0]));
                }
            }
            links.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count()
        };
        let ruhend = zaehlen(0.0);
        let naehernd = zaehlen(-5.0);
        let entfernend = zaehlen(5.0);
        assert!(naehernd > ruhend + 3, "naehernd {naehernd} ruhend {ruhend}");
        assert!(entfernend + 3 < ruhend, "entfernend {entfernend} ruhend {ruhend}");
    }

    #[test]
    fn reset_startet_wie_neu() {
        let mut r = SpatialRenderer::new(SpatialParams::default());
        let hoerer = ListenerPose::default();
        let mut out = vec![0.0; STEREO_FRAME_SIZE];
        r.process(&ton(0), &hoerer, Vec3::new(0.0, 800.0, 0.0), &mut out);
        r.reset();
        assert_eq!(r.current_gains(), (0.5, 0.5));
        r.process(&ton(0), &hoerer, Vec3::new(1000.0, 0.0, 0.0), &mut out);
        assert_eq!(r.doppler_target(), 1.0);
    }
}

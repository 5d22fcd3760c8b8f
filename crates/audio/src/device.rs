//! Audio-Geraete auflisten und auswaehlen
//!
//! Geraete werden ueber ihren Anzeigenamen angesprochen. Ein exakter
//! Treffer gewinnt vor einem Teilstring-Treffer.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

/// Ein Ein- oder Ausgabegeraet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioDevice {
    pub name: String,
    /// Standardgeraet des Hosts
    pub is_default: bool,
    /// Maximale Kanalanzahl
    pub channels: u16,
}

/// Richtung eines Geraets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Richtung {
    Eingabe,
    Ausgabe,
}

pub fn list_input_devices() -> AudioResult<Vec<AudioDevice>> {
    list_devices(Richtung::Eingabe)
}

pub fn list_output_devices() -> AudioResult<Vec<AudioDevice>> {
    list_devices(Richtung::Ausgabe)
}

fn list_devices(richtung: Richtung) -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let (devices, default) = match richtung {
        Richtung::Eingabe => (host.input_devices(), host.default_input_device()),
        Richtung::Ausgabe => (host.output_devices(), host.default_output_device()),
    };
    let devices = devices.map_err(|e| AudioError::StreamFehler(e.to_string()))?;
    let default_name = default.and_then(|d| d.name().ok());

    let mut result = Vec::new();
    for device in devices {
        let name = match device.name() {
            Ok(name) => name,
            Err(e) => {
                warn!(?richtung, fehler = %e, "Geraetename nicht lesbar");
                continue;
            }
        };
        result.push(AudioDevice {
            is_default: default_name.as_deref() == Some(name.as_str()),
            channels: max_channels(&device, richtung),
            name,
        });
    }
    debug!(?richtung, anzahl = result.len(), "Geraete aufgelistet");
    Ok(result)
}

fn max_channels(device: &Device, richtung: Richtung) -> u16 {
    let channels = match richtung {
        Richtung::Eingabe => device
            .supported_input_configs()
            .map(|c| c.map(|cfg| cfg.channels()).max()),
        Richtung::Ausgabe => device
            .supported_output_configs()
            .map(|c| c.map(|cfg| cfg.channels()).max()),
    };
    channels.ok().flatten().unwrap_or(0)
}

/// Waehlt aus `names` den Index des gewuenschten Geraets
pub fn geraet_waehlen<'a, I>(names: I, wanted: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    names
        .iter()
        .position(|n| *n == wanted)
        .or_else(|| names.iter().position(|n| n.contains(wanted)))
}

/// Laedt ein cpal-Eingabegeraet (`None` = Standard)
pub fn load_cpal_input_device(name: Option<&str>) -> AudioResult<Device> {
    load_cpal_device(name, Richtung::Eingabe)
}

/// Laedt ein cpal-Ausgabegeraet (`None` = Standard)
pub fn load_cpal_output_device(name: Option<&str>) -> AudioResult<Device> {
    load_cpal_device(name, Richtung::Ausgabe)
}

fn load_cpal_device(name: Option<&str>, richtung: Richtung) -> AudioResult<Device> {
    let host = cpal::default_host();
    let Some(wanted) = name else {
        return match richtung {
            Richtung::Eingabe => host
                .default_input_device()
                .ok_or(AudioError::KeinStandardEingabegeraet),
            Richtung::Ausgabe => host
                .default_output_device()
                .ok_or(AudioError::KeinStandardAusgabegeraet),
        };
    };

    let devices = match richtung {
        Richtung::Eingabe => host.input_devices(),
        Richtung::Ausgabe => host.output_devices(),
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let mut devices: Vec<(String, Device)> = devices
        .filter_map(|d| d.name().ok().map(|n| (n, d)))
        .collect();
    let index = geraet_waehlen(devices.iter().map(|(n, _)| n.as_str()), wanted)
        .ok_or_else(|| AudioError::GeraetNichtGefunden(wanted.to_string()))?;
    Ok(devices.swap_remove(index).1)
}

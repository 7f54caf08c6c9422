use std::collections::BTreeMap;

use crate::{
    error::ProtocolViolation,
    protocol::{WireAppState, WireDevice},
};

pub type DeviceId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    SelectDevice,
    Control,
}

impl Mode {
    pub fn parse(raw: &str) -> Result<Self, ProtocolViolation> {
        match raw {
            "SELECT_DEVICE" => Ok(Mode::SelectDevice),
            // The reference service spells control mode `CONTROL_DEVICE`.
            "CONTROL" | "CONTROL_DEVICE" => Ok(Mode::Control),
            other => Err(ProtocolViolation::UnknownMode(other.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::SelectDevice => "device selection",
            Mode::Control => "device control",
        }
    }
}

/// Kind of a device together with the single attribute that kind requires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeviceKind {
    Ac { temperature: f64 },
    Fan { speed: f64 },
    Tv { channel: f64 },
    Light { brightness: f64 },
}

impl DeviceKind {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Ac { .. } => "ac",
            DeviceKind::Fan { .. } => "fan",
            DeviceKind::Tv { .. } => "tv",
            DeviceKind::Light { .. } => "light",
        }
    }

    fn from_wire(id: &str, device: &WireDevice) -> Result<Self, ProtocolViolation> {
        let require = |value: Option<f64>, kind: &'static str, field: &'static str| {
            value.ok_or_else(|| ProtocolViolation::MissingField {
                id: id.to_string(),
                kind,
                field,
            })
        };

        match device.name.as_str() {
            "ac" => Ok(DeviceKind::Ac {
                temperature: require(device.temperature, "ac", "temperature")?,
            }),
            "fan" => Ok(DeviceKind::Fan {
                speed: require(device.speed, "fan", "speed")?,
            }),
            "tv" => Ok(DeviceKind::Tv {
                channel: require(device.channel, "tv", "channel")?,
            }),
            "light" => Ok(DeviceKind::Light {
                brightness: require(device.brightness, "light", "brightness")?,
            }),
            other => Err(ProtocolViolation::UnknownDeviceKind {
                id: id.to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceState {
    pub id: DeviceId,
    pub label: Option<String>,
    pub power: bool,
    pub kind: DeviceKind,
}

/// Full snapshot of the service state. Replaced wholesale on every update.
#[derive(Clone, Debug, PartialEq)]
pub struct AppState {
    pub mode: Mode,
    pub selected_device: Option<DeviceId>,
    pub devices: BTreeMap<DeviceId, DeviceState>,
}

impl TryFrom<WireAppState> for AppState {
    type Error = ProtocolViolation;

    fn try_from(wire: WireAppState) -> Result<Self, Self::Error> {
        let mode = Mode::parse(&wire.mode)?;
        let devices = wire
            .devices
            .into_iter()
            .map(|(id, device)| {
                let kind = DeviceKind::from_wire(&id, &device)?;
                let state = DeviceState {
                    id: id.clone(),
                    label: device.label,
                    power: device.power,
                    kind,
                };
                Ok((id, state))
            })
            .collect::<Result<BTreeMap<_, _>, ProtocolViolation>>()?;

        Ok(AppState {
            mode,
            selected_device: wire.selected_device.map(|id| id.into_key()),
            devices,
        })
    }
}

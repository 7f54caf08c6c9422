//! Turns a service snapshot into per-device render instructions.
//!
//! [`reconcile`] is a pure function of the snapshot; applying instructions to
//! the window happens elsewhere. [`Reconciler`] keeps the last valid result so
//! a rejected snapshot never leaves a half-updated view behind.

use crate::{
    error::ProtocolViolation,
    protocol::WireAppState,
    state::{AppState, DeviceId, DeviceKind, DeviceState},
};

pub const POWER_ON_LABEL: &str = "ON";
pub const POWER_OFF_LABEL: &str = "OFF";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeviceValue {
    Temperature(f64),
    Speed(f64),
    Channel(f64),
    Brightness(f64),
}

impl DeviceValue {
    pub fn caption(&self) -> &'static str {
        match self {
            DeviceValue::Temperature(_) => "Temperature",
            DeviceValue::Speed(_) => "Speed",
            DeviceValue::Channel(_) => "Channel",
            DeviceValue::Brightness(_) => "Brightness",
        }
    }

    pub fn display(&self) -> String {
        match self {
            DeviceValue::Temperature(v) => format!("{v}°C"),
            DeviceValue::Brightness(v) => format!("{v}%"),
            DeviceValue::Speed(v) | DeviceValue::Channel(v) => format!("{v}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceRender {
    pub id: DeviceId,
    pub title: String,
    pub powered: bool,
    pub power_label: &'static str,
    pub value: DeviceValue,
    pub selected: bool,
    /// Visual intensity for a lit light, `0.5 + brightness / 200`.
    pub intensity: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderInstructions {
    pub mode_label: &'static str,
    /// Sorted by device id.
    pub devices: Vec<DeviceRender>,
}

impl RenderInstructions {
    pub fn selected(&self) -> impl Iterator<Item = &DeviceRender> {
        self.devices.iter().filter(|device| device.selected)
    }

    pub fn device(&self, id: &str) -> Option<&DeviceRender> {
        self.devices.iter().find(|device| device.id == id)
    }
}

pub fn light_intensity(brightness: f64) -> f64 {
    0.5 + brightness / 200.0
}

pub fn reconcile(state: &AppState) -> Result<RenderInstructions, ProtocolViolation> {
    if let Some(selected) = &state.selected_device {
        if !state.devices.contains_key(selected) {
            return Err(ProtocolViolation::UnknownSelectedDevice(selected.clone()));
        }
    }

    let devices = state
        .devices
        .values()
        .map(|device| render_device(device, state.selected_device.as_deref()))
        .collect();

    Ok(RenderInstructions {
        mode_label: state.mode.label(),
        devices,
    })
}

fn render_device(device: &DeviceState, selected: Option<&str>) -> DeviceRender {
    let (value, intensity) = match device.kind {
        DeviceKind::Ac { temperature } => (DeviceValue::Temperature(temperature), None),
        DeviceKind::Fan { speed } => (DeviceValue::Speed(speed), None),
        DeviceKind::Tv { channel } => (DeviceValue::Channel(channel), None),
        DeviceKind::Light { brightness } => (
            DeviceValue::Brightness(brightness),
            device.power.then(|| light_intensity(brightness)),
        ),
    };

    DeviceRender {
        id: device.id.clone(),
        title: device
            .label
            .clone()
            .unwrap_or_else(|| device.kind.name().to_uppercase()),
        powered: device.power,
        power_label: if device.power {
            POWER_ON_LABEL
        } else {
            POWER_OFF_LABEL
        },
        value,
        selected: selected == Some(device.id.as_str()),
        intensity,
    }
}

#[derive(Debug, Default)]
pub struct Reconciler {
    last: Option<RenderInstructions>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and reconciles a snapshot. On failure the previous render is
    /// kept untouched.
    pub fn apply(
        &mut self,
        snapshot: WireAppState,
    ) -> Result<&RenderInstructions, ProtocolViolation> {
        let instructions = AppState::try_from(snapshot).and_then(|state| reconcile(&state));
        match instructions {
            Ok(instructions) => Ok(&*self.last.insert(instructions)),
            Err(err) => {
                log::error!("rejected state snapshot: {err}");
                Err(err)
            }
        }
    }

    pub fn last(&self) -> Option<&RenderInstructions> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        protocol::{WireDevice, WireDeviceId},
        state::Mode,
    };

    fn device(id: &str, power: bool, kind: DeviceKind) -> (DeviceId, DeviceState) {
        (
            id.to_string(),
            DeviceState {
                id: id.to_string(),
                label: None,
                power,
                kind,
            },
        )
    }

    fn state(selected: Option<&str>, devices: Vec<(DeviceId, DeviceState)>) -> AppState {
        AppState {
            mode: Mode::Control,
            selected_device: selected.map(str::to_string),
            devices: devices.into_iter().collect::<BTreeMap<_, _>>(),
        }
    }

    fn wire(mode: &str, selected: Option<&str>) -> WireAppState {
        let fan = WireDevice {
            name: "fan".into(),
            label: Some("Fan".into()),
            power: true,
            temperature: None,
            speed: Some(3.0),
            channel: None,
            brightness: None,
        };
        WireAppState {
            mode: mode.into(),
            selected_device: selected.map(|id| WireDeviceId::Text(id.into())),
            devices: [("fan1".to_string(), fan)].into_iter().collect(),
        }
    }

    #[test]
    fn fan_speed_and_power_label() {
        let out = reconcile(&state(None, vec![device("fan1", true, DeviceKind::Fan { speed: 3.0 })]))
            .unwrap();
        let fan = out.device("fan1").unwrap();
        assert_eq!(fan.value, DeviceValue::Speed(3.0));
        assert_eq!(fan.value.display(), "3");
        assert_eq!(fan.power_label, "ON");
        assert_eq!(fan.intensity, None);
    }

    #[test]
    fn light_intensity_follows_brightness() {
        let out = reconcile(&state(
            None,
            vec![
                device("bright", true, DeviceKind::Light { brightness: 100.0 }),
                device("dim", true, DeviceKind::Light { brightness: 0.0 }),
                device("off", false, DeviceKind::Light { brightness: 80.0 }),
            ],
        ))
        .unwrap();
        assert_eq!(out.device("bright").unwrap().intensity, Some(1.0));
        assert_eq!(out.device("dim").unwrap().intensity, Some(0.5));
        assert_eq!(out.device("off").unwrap().intensity, None);
        assert_eq!(out.device("off").unwrap().power_label, "OFF");
    }

    #[test]
    fn exactly_one_device_is_selected() {
        let out = reconcile(&state(
            Some("ac1"),
            vec![
                device("ac1", false, DeviceKind::Ac { temperature: 25.0 }),
                device("tv1", true, DeviceKind::Tv { channel: 12.0 }),
            ],
        ))
        .unwrap();
        let selected: Vec<_> = out.selected().map(|d| d.id.as_str()).collect();
        assert_eq!(selected, vec!["ac1"]);
    }

    #[test]
    fn no_selection_marks_nothing() {
        let out = reconcile(&state(
            None,
            vec![device("ac1", false, DeviceKind::Ac { temperature: 25.0 })],
        ))
        .unwrap();
        assert_eq!(out.selected().count(), 0);
    }

    #[test]
    fn selecting_a_missing_device_is_a_violation() {
        let err = reconcile(&state(
            Some("ac9"),
            vec![device("ac1", false, DeviceKind::Ac { temperature: 25.0 })],
        ))
        .unwrap_err();
        assert_eq!(err, ProtocolViolation::UnknownSelectedDevice("ac9".into()));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let snapshot = state(
            Some("tv1"),
            vec![
                device("tv1", true, DeviceKind::Tv { channel: 5.0 }),
                device("light1", true, DeviceKind::Light { brightness: 40.0 }),
            ],
        );
        assert_eq!(reconcile(&snapshot).unwrap(), reconcile(&snapshot).unwrap());
    }

    #[test]
    fn titles_fall_back_to_kind() {
        let out = reconcile(&state(
            None,
            vec![device("1", false, DeviceKind::Ac { temperature: 16.0 })],
        ))
        .unwrap();
        assert_eq!(out.devices[0].title, "AC");
        assert_eq!(out.devices[0].value.display(), "16°C");
    }

    #[test]
    fn rejected_snapshot_keeps_previous_render() {
        let mut reconciler = Reconciler::new();
        let first = reconciler.apply(wire("SELECT_DEVICE", None)).unwrap().clone();
        assert_eq!(first.mode_label, "device selection");

        let err = reconciler.apply(wire("IDLE", None)).unwrap_err();
        assert_eq!(err, ProtocolViolation::UnknownMode("IDLE".into()));
        assert_eq!(reconciler.last(), Some(&first));

        let err = reconciler.apply(wire("CONTROL", Some("ac9"))).unwrap_err();
        assert!(matches!(err, ProtocolViolation::UnknownSelectedDevice(_)));
        assert_eq!(reconciler.last().unwrap().mode_label, "device selection");

        let next = reconciler.apply(wire("CONTROL", Some("fan1"))).unwrap();
        assert_eq!(next.mode_label, "device control");
        assert!(next.device("fan1").unwrap().selected);
        assert_eq!(next.device("fan1").unwrap().title, "Fan");
    }
}

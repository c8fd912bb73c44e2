// Tello SDK text protocol, see the "Tello SDK 2.0 User Guide".

use std::str::FromStr;

use crate::{flight::Velocity, session::CameraDirection};

pub(crate) const CMD_ENTER_SDK: &str = "command";
pub(crate) const CMD_STREAM_ON: &str = "streamon";
pub(crate) const CMD_STREAM_OFF: &str = "streamoff";
pub(crate) const CMD_TAKEOFF: &str = "takeoff";
pub(crate) const CMD_LAND: &str = "land";

pub(crate) const RESPONSE_OK: &str = "ok";

pub(crate) fn speed(cm_per_sec: i16) -> String {
    // SDK accepts 10..=100 cm/s
    format!("speed {}", cm_per_sec.clamp(10, 100))
}

pub(crate) fn rc(v: &Velocity) -> String {
    format!(
        "rc {} {} {} {}",
        v.left_right, v.forward_backward, v.up_down, v.yaw
    )
}

pub(crate) fn downvision(direction: CameraDirection) -> String {
    format!("downvision {}", direction.sdk_value())
}

/// Telemetry broadcast by the drone on the state port, e.g.
/// `pitch:0;roll:0;yaw:0;vgx:0;vgy:0;vgz:0;templ:83;temph:85;tof:10;h:0;bat:87;baro:188.58;time:0;agx:0.00;agy:0.00;agz:0.00;`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelloState {
    pub pitch: i32,
    pub roll: i32,
    pub yaw: i32,
    pub height_cm: i32,
    pub tof_cm: i32,
    pub battery: u8,
    pub temp_low: i32,
    pub temp_high: i32,
    pub baro: f32,
    pub flight_time: i32,
}

impl FromStr for TelloState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut st = TelloState::default();
        let mut seen = 0;
        for field in s.trim().split(';').filter(|f| !f.is_empty()) {
            let Some((key, value)) = field.split_once(':') else {
                return Err(format!("malformed state field: {field}"));
            };
            let parsed = match key {
                "pitch" => value.parse().map(|v| st.pitch = v).is_ok(),
                "roll" => value.parse().map(|v| st.roll = v).is_ok(),
                "yaw" => value.parse().map(|v| st.yaw = v).is_ok(),
                "h" => value.parse().map(|v| st.height_cm = v).is_ok(),
                "tof" => value.parse().map(|v| st.tof_cm = v).is_ok(),
                "bat" => value.parse().map(|v| st.battery = v).is_ok(),
                "templ" => value.parse().map(|v| st.temp_low = v).is_ok(),
                "temph" => value.parse().map(|v| st.temp_high = v).is_ok(),
                "baro" => value.parse().map(|v| st.baro = v).is_ok(),
                "time" => value.parse().map(|v| st.flight_time = v).is_ok(),
                _ => continue,
            };
            if !parsed {
                return Err(format!("bad value for {key}: {value}"));
            }
            seen += 1;
        }
        if seen == 0 {
            return Err("no known state fields".to_owned());
        }
        Ok(st)
    }
}

use std::str::FromStr;

lazy_static! {
    pub static ref ENV_TELLO_ADDR: String =
        get_env_str("ENV_TELLO_ADDR", String::from("192.168.10.1"));
    pub static ref ENV_TELLO_CMD_PORT: u16 = get_env("ENV_TELLO_CMD_PORT", 8889);
    pub static ref ENV_TELLO_LOCAL_PORT: u16 = get_env("ENV_TELLO_LOCAL_PORT", 8889);
    pub static ref ENV_TELLO_STATE_PORT: u16 = get_env("ENV_TELLO_STATE_PORT", 8890);
    pub static ref ENV_TELLO_VIDEO_PORT: u16 = get_env("ENV_TELLO_VIDEO_PORT", 11111);
    pub static ref ENV_TELLO_CMD_TIMEOUT_MS: u64 = get_env("ENV_TELLO_CMD_TIMEOUT_MS", 7000);
    // takeoff and land only reply once the maneuver is over
    pub static ref ENV_TELLO_MANEUVER_TIMEOUT_MS: u64 =
        get_env("ENV_TELLO_MANEUVER_TIMEOUT_MS", 20000);
    pub static ref ENV_TELLO_RC_INTERVAL_MS: u64 = get_env("ENV_TELLO_RC_INTERVAL_MS", 100);
    pub static ref ENV_TELLO_SPEED: i16 = get_env("ENV_TELLO_SPEED", 50);
    pub static ref ENV_TELLO_REDRAW_MS: u64 = get_env("ENV_TELLO_REDRAW_MS", 5);
    pub static ref ENV_TELLO_FACE_MODEL: String = get_env_str(
        "ENV_TELLO_FACE_MODEL",
        "./data-files/seeta_fd_frontal_v1.0.bin".to_owned()
    );
    pub static ref ENV_TELLO_FACE_MIN_SIZE: u32 = get_env("ENV_TELLO_FACE_MIN_SIZE", 20);
    pub static ref ENV_TELLO_FACE_SCORE: f64 = get_env("ENV_TELLO_FACE_SCORE", 2.0);
    pub static ref ENV_TELLO_FACE_SCALE_FACTOR: f32 = get_env("ENV_TELLO_FACE_SCALE_FACTOR", 1.2);
    pub static ref ENV_TELLO_PICS_DIR: String =
        get_env_str("ENV_TELLO_PICS_DIR", "./save_pics/".to_owned());
    pub static ref ENV_TELLO_DUMP: bool = get_env("ENV_TELLO_DUMP", false);
    pub static ref ENV_TELLO_DUMP_DIR: String =
        get_env_str("ENV_TELLO_DUMP_DIR", "./dump_comm/".to_owned());
    pub static ref ENV_TELLO_LOG_LEVEL: tracing::Level =
        get_env("ENV_TELLO_LOG_LEVEL", tracing::Level::INFO);
}

pub fn get_env_str(name: &str, value: String) -> String {
    std::env::var(name).unwrap_or(value)
}

/// Parsed value of `name`, or `value` when unset or unparsable.
pub fn get_env<T: FromStr>(name: &str, value: T) -> T {
    let Ok(raw) = std::env::var(name) else {
        return value;
    };
    match raw.parse::<T>() {
        Ok(res) => res,
        Err(_) => {
            tracing::warn!("ignoring {name}={raw}, using the default");
            value
        }
    }
}

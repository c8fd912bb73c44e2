use std::{path::Path, sync::Arc};

use tello_keyboard::{
    env,
    face::{DetectorParams, SeetaDetector},
    gui, Controller, ControllerOptions, DroneError, TelloSession,
};

pub fn main() -> Result<(), DroneError> {
    tello_keyboard::init_logging();

    // load the model before touching the drone so a bad path fails early
    let detector = SeetaDetector::load(
        Path::new(env::ENV_TELLO_FACE_MODEL.as_str()),
        DetectorParams::from_env(),
    )?;
    let session = Arc::new(TelloSession::new()?);
    let controller = Controller::new(
        session,
        ControllerOptions::from_env(),
        Some(Box::new(detector)),
    )?;
    tracing::info!("fly with w/a/s/d and the arrow keys, t to take off or land, c to switch camera, f for faces");
    gui::run_app(controller);
    Ok(())
}

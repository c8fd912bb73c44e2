use std::sync::Arc;

use tello_keyboard::{gui, Controller, ControllerOptions, DroneError, TelloSession};

pub fn main() -> Result<(), DroneError> {
    tello_keyboard::init_logging();

    let session = Arc::new(TelloSession::new()?);
    let controller = Controller::new(session, ControllerOptions::from_env(), None)?;
    tracing::info!("fly with w/a/s/d and the arrow keys, t to take off or land, c to switch camera");
    gui::run_app(controller);
    Ok(())
}

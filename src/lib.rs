pub mod controller;
pub(crate) mod draw;
pub(crate) mod dump;
pub mod env;
pub mod error;
pub mod face;
pub mod flight;
pub mod frame;
pub mod gui;
pub mod messages;
pub mod scheduler;
pub mod session;
pub mod takeoff;
pub mod tello;
pub mod toggles;
pub(crate) mod utils;
pub mod video;

#[macro_use]
extern crate lazy_static;

pub use controller::{Controller, ControllerOptions};
pub use error::DroneError;
pub use session::DroneSession;
pub use tello::TelloSession;

/// Installs the `tracing` subscriber both programs use.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(*env::ENV_TELLO_LOG_LEVEL)
        .init();
}

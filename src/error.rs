use std::{io, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum DroneError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("command `{command}` failed: {response}")]
    CommandFailed { command: String, response: String },

    #[error("command `{command}` got no response within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("drone session is not connected")]
    NotConnected,

    #[error("video decoder error: {0}")]
    Decoder(String),

    #[error("window error: {0}")]
    Window(#[from] minifb::Error),

    #[error("face model not found at {0}")]
    ModelNotFound(String),

    #[error("unable to save image: {0}")]
    Image(#[from] image::ImageError),
}

use crate::{error::DroneError, flight::Velocity, video::FrameRead};

/// Which of the two cameras feeds the video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDirection {
    Forward,
    Downward,
}

impl CameraDirection {
    pub fn sdk_value(&self) -> u8 {
        match self {
            CameraDirection::Forward => 0,
            CameraDirection::Downward => 1,
        }
    }
}

/// Connection to one drone. Implementations serialise command issuance
/// internally, so a session may be shared between the event loop and the
/// takeoff/land worker threads.
pub trait DroneSession: Send + Sync + 'static {
    fn connect(&self) -> Result<(), DroneError>;
    fn streamon(&self) -> Result<(), DroneError>;
    /// Handle to the live frame buffer, always yields the newest frame.
    fn frame_read(&self) -> FrameRead;
    fn set_speed(&self, speed: i16) -> Result<(), DroneError>;
    fn is_flying(&self) -> bool;
    fn takeoff(&self) -> Result<(), DroneError>;
    fn land(&self) -> Result<(), DroneError>;
    fn set_video_direction(&self, direction: CameraDirection) -> Result<(), DroneError>;
    /// Must not wait for a reply.
    fn send_rc_control(&self, velocity: Velocity) -> Result<(), DroneError>;
    fn end(&self) -> Result<(), DroneError>;

    fn battery(&self) -> Option<u8> {
        None
    }
}

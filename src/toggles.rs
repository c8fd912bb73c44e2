use crate::{
    error::DroneError,
    session::{CameraDirection, DroneSession},
};

/// Per-cycle view of the toggles handed to the frame processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOptions {
    pub camera_down: bool,
    pub face_detection: bool,
}

/// Operator toggles. Only the button handlers below write them.
#[derive(Debug, Default)]
pub struct Toggles {
    camera_down: bool,
    face_detection: bool,
}

impl Toggles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera_down(&self) -> bool {
        self.camera_down
    }

    pub fn face_detection(&self) -> bool {
        self.face_detection
    }

    pub fn snapshot(&self) -> FrameOptions {
        FrameOptions {
            camera_down: self.camera_down,
            face_detection: self.face_detection,
        }
    }

    /// Switches between forward and downward camera. The flag only changes
    /// once the drone accepted the switch.
    pub fn toggle_camera<S: DroneSession + ?Sized>(
        &mut self,
        session: &S,
    ) -> Result<bool, DroneError> {
        let next = if self.camera_down {
            CameraDirection::Forward
        } else {
            CameraDirection::Downward
        };
        session.set_video_direction(next)?;
        self.camera_down = next == CameraDirection::Downward;
        tracing::info!(camera_down = self.camera_down, "camera direction switched");
        Ok(self.camera_down)
    }

    pub fn toggle_face_detection(&mut self) -> bool {
        self.face_detection = !self.face_detection;
        tracing::info!(face_detection = self.face_detection, "face detection toggled");
        self.face_detection
    }

    /// Points the camera forward again if it was left down. Returns whether
    /// a switch was issued.
    pub fn reset_camera<S: DroneSession + ?Sized>(
        &mut self,
        session: &S,
    ) -> Result<bool, DroneError> {
        if !self.camera_down {
            return Ok(false);
        }
        self.camera_down = false;
        session.set_video_direction(CameraDirection::Forward)?;
        Ok(true)
    }
}

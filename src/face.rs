use std::path::Path;

use image::GrayImage;
use rustface::{Detector, ImageData};

use crate::{env, error::DroneError};

/// Axis aligned face bounding box in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub trait FaceDetector {
    fn detect(&mut self, gray: &GrayImage) -> Vec<FaceRect>;
}

#[derive(Debug, Clone, Copy)]
pub struct DetectorParams {
    /// Image pyramid step between scans, like a cascade's scale factor.
    pub scale_factor: f32,
    pub min_face_size: u32,
    pub score_thresh: f64,
    pub window_step: u32,
}

impl DetectorParams {
    pub fn from_env() -> Self {
        Self {
            scale_factor: *env::ENV_TELLO_FACE_SCALE_FACTOR,
            min_face_size: *env::ENV_TELLO_FACE_MIN_SIZE,
            score_thresh: *env::ENV_TELLO_FACE_SCORE,
            window_step: 4,
        }
    }
}

/// SeetaFace detector from `rustface`.
pub struct SeetaDetector {
    detector: Box<dyn Detector>,
}

impl SeetaDetector {
    /// Fails fast when the model file is absent.
    pub fn load(model: &Path, params: DetectorParams) -> Result<Self, DroneError> {
        let method_name = "load";
        if !model.is_file() {
            return Err(DroneError::ModelNotFound(model.display().to_string()));
        }
        let path = model.to_string_lossy();
        let mut detector = rustface::create_detector(&path)?;
        detector.set_min_face_size(params.min_face_size);
        detector.set_score_thresh(params.score_thresh);
        // rustface shrinks the pyramid by this factor, a cascade grows its window
        let scale_factor = if params.scale_factor > 1.0 {
            params.scale_factor
        } else {
            1.2
        };
        detector.set_pyramid_scale_factor(1.0 / scale_factor);
        detector.set_slide_window_step(params.window_step, params.window_step);
        tracing::info!(method_name, model = %model.display(), ?params, "face model loaded");
        Ok(Self { detector })
    }
}

impl FaceDetector for SeetaDetector {
    fn detect(&mut self, gray: &GrayImage) -> Vec<FaceRect> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let mut image = ImageData::new(gray.as_raw(), width, height);
        self.detector
            .detect(&mut image)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRect {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::{DetectorParams, SeetaDetector};
    use crate::error::DroneError;

    #[test]
    fn test_missing_model_fails_fast() {
        let r = SeetaDetector::load(Path::new("./no/such/model.bin"), DetectorParams::from_env());
        assert!(matches!(r, Err(DroneError::ModelNotFound(_))));
    }
}

use image::{
    imageops::{self, FilterType},
    RgbImage,
};

use crate::{
    draw,
    face::{FaceDetector, FaceRect},
    toggles::FrameOptions,
    utils,
};

pub const DISPLAY_WIDTH: u32 = 720;
pub const DISPLAY_HEIGHT: u32 = 480;
/// Region kept from the resized frame when the downward camera is active.
pub const DOWN_CROP_WIDTH: u32 = 320;
pub const DOWN_CROP_HEIGHT: u32 = 240;

const FACE_STROKE: u32 = 2;

#[derive(Debug)]
pub struct ProcessedFrame {
    pub image: RgbImage,
    /// Number of faces found, `None` when detection was off.
    pub faces: Option<usize>,
}

impl ProcessedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

pub struct FrameProcessor {
    detector: Option<Box<dyn FaceDetector>>,
}

impl FrameProcessor {
    pub fn new(detector: Option<Box<dyn FaceDetector>>) -> Self {
        Self { detector }
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn process(&mut self, frame: &RgbImage, opts: FrameOptions) -> ProcessedFrame {
        let method_name = "process";
        let mut image = imageops::resize(frame, DISPLAY_WIDTH, DISPLAY_HEIGHT, FilterType::Triangle);

        if opts.camera_down {
            image = imageops::crop_imm(&image, 0, 0, DOWN_CROP_WIDTH, DOWN_CROP_HEIGHT).to_image();
        }

        let mut faces = None;
        if opts.face_detection {
            match self.detector.as_mut() {
                Some(detector) => {
                    let gray = imageops::grayscale(&image);
                    let found = detector.detect(&gray);
                    annotate_faces(&mut image, &found);
                    tracing::info!(method_name, "Faces: {}", found.len());
                    faces = Some(found.len());
                }
                None => tracing::warn!(method_name, "face detection on without a detector"),
            }
        }

        ProcessedFrame { image, faces }
    }
}

/// One red box per face and the face count in the top left corner.
pub fn annotate_faces(image: &mut RgbImage, faces: &[FaceRect]) {
    for f in faces {
        draw::draw_rect(image, f.x, f.y, f.width, f.height, draw::RED, FACE_STROKE);
    }
    draw::draw_text(image, &format!("Faces: {}", faces.len()), 10, 25, draw::RED);
}

/// Pixels in the `0RGB` layout the window expects.
pub fn to_display_buffer(image: &RgbImage) -> Vec<u32> {
    image
        .pixels()
        .map(|p| utils::rgb_to_0rgb(p[0], p[1], p[2]))
        .collect()
}

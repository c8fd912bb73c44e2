use std::sync::{Arc, RwLock};

use image::RgbImage;
use openh264::{decoder::Decoder, formats::YUVSource};

use crate::error::DroneError;

/// Resolution of the Tello forward camera stream.
pub const STREAM_WIDTH: u32 = 960;
pub const STREAM_HEIGHT: u32 = 720;

/// Video datagrams are cut at this size, a shorter one closes a frame.
const MAX_VIDEO_DATAGRAM: usize = 1460;

/// Live frame buffer. Writers replace the frame, readers always get the
/// newest one. Nothing is queued.
#[derive(Debug, Clone)]
pub struct FrameRead {
    frame: Arc<RwLock<Arc<RgbImage>>>,
}

impl FrameRead {
    /// Starts out with a black frame so the display has something to show
    /// before the first decoded frame.
    pub fn new() -> Self {
        Self {
            frame: Arc::new(RwLock::new(Arc::new(RgbImage::new(
                STREAM_WIDTH,
                STREAM_HEIGHT,
            )))),
        }
    }

    pub fn latest(&self) -> Arc<RgbImage> {
        match self.frame.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn publish(&self, image: RgbImage) {
        let image = Arc::new(image);
        match self.frame.write() {
            Ok(mut g) => *g = image,
            Err(poisoned) => *poisoned.into_inner() = image,
        }
    }
}

impl Default for FrameRead {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects H.264 datagrams until a frame is complete.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buff: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buff: Vec::with_capacity(64 * 1024),
        }
    }

    /// Returns the whole annex-B frame once its last datagram arrived.
    pub fn push(&mut self, datagram: &[u8]) -> Option<Vec<u8>> {
        self.buff.extend_from_slice(datagram);
        if datagram.len() == MAX_VIDEO_DATAGRAM {
            return None;
        }
        Some(std::mem::take(&mut self.buff))
    }
}

pub struct VideoDecoder {
    decoder: Decoder,
}

impl VideoDecoder {
    pub fn new() -> Result<Self, DroneError> {
        let decoder = Decoder::new().map_err(|e| DroneError::Decoder(e.to_string()))?;
        Ok(Self { decoder })
    }

    /// Decodes every NAL unit of `frame` and returns the last picture, if any.
    pub fn decode(&mut self, frame: &[u8]) -> Result<Option<RgbImage>, DroneError> {
        let method_name = "decode";
        let mut last = None;
        for packet in openh264::nal_units(frame) {
            let r = self.decoder.decode(packet);
            match r {
                Ok(Some(yuv)) => {
                    let (w, h) = yuv.dimensions();
                    let mut rgb = vec![0; w * h * 3];
                    yuv.write_rgb8(&mut rgb);
                    last = RgbImage::from_raw(w as u32, h as u32, rgb);
                }
                Ok(None) => {
                    tracing::trace!(method_name, "incomplete frame, dropped");
                }
                Err(e) => {
                    return Err(DroneError::Decoder(e.to_string()));
                }
            }
        }
        Ok(last)
    }
}

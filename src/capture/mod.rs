pub mod decode;

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::geometry::GeometryError;

pub use decode::{decode_capture, screenshot_bytes_from_data_url};

/// The screenshot of one session plus the sizes needed to relate it to the
/// viewport it was taken from.
///
/// Built once when the screenshot arrives and read-only afterwards. The
/// encoded bytes sit behind an `Arc` so snapshots and the submission path can
/// share them without copying.
#[derive(Debug, Clone)]
pub struct CaptureContext {
    screenshot: Arc<Vec<u8>>,
    pub natural_width: u32,
    pub natural_height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl CaptureContext {
    pub fn new(
        screenshot: Vec<u8>,
        natural_width: u32,
        natural_height: u32,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Self {
        Self {
            screenshot: Arc::new(screenshot),
            natural_width,
            natural_height,
            viewport_width,
            viewport_height,
        }
    }

    pub fn screenshot_data(&self) -> &[u8] {
        self.screenshot.as_slice()
    }

    /// Screenshot as plain base64 (no `data:` prefix), the form the job
    /// submission endpoint accepts.
    pub fn base64_image(&self) -> String {
        STANDARD.encode(self.screenshot.as_slice())
    }

    /// `(natural / viewport)` per axis.
    pub fn scale(&self) -> Result<(f64, f64), GeometryError> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(GeometryError::ZeroViewport {
                width: self.viewport_width,
                height: self.viewport_height,
            });
        }
        if self.natural_width == 0 || self.natural_height == 0 {
            return Err(GeometryError::ImageNotDecoded);
        }

        Ok((
            f64::from(self.natural_width) / f64::from(self.viewport_width),
            f64::from(self.natural_height) / f64::from(self.viewport_height),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_natural_over_viewport() {
        let capture = CaptureContext::new(Vec::new(), 2000, 1600, 1000, 800);
        assert_eq!(capture.scale(), Ok((2.0, 2.0)));
    }

    #[test]
    fn zero_viewport_is_rejected() {
        let capture = CaptureContext::new(Vec::new(), 2000, 1600, 0, 800);
        assert_eq!(
            capture.scale(),
            Err(GeometryError::ZeroViewport {
                width: 0,
                height: 800
            })
        );
    }

    #[test]
    fn undecoded_image_is_rejected() {
        let capture = CaptureContext::new(vec![1, 2, 3], 0, 0, 1000, 800);
        assert_eq!(capture.scale(), Err(GeometryError::ImageNotDecoded));
    }

    #[test]
    fn base64_has_no_data_url_prefix() {
        let capture = CaptureContext::new(b"png".to_vec(), 1, 1, 1, 1);
        assert_eq!(capture.base64_image(), "cG5n");
    }
}

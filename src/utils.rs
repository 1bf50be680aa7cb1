//! Frame conversion helpers

use opencv::core::{Mat, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;

use crate::error::VisionError;

/// Convert a BGR frame into a packed RGB byte buffer.
///
/// Returns the pixels together with the frame width and height.
pub fn mat_to_rgb_bytes(mat: &Mat) -> Result<(Vec<u8>, u32, u32), VisionError> {
    let width = mat.cols();
    let height = mat.rows();
    if width <= 0 || height <= 0 {
        return Err(VisionError::Processing(format!(
            "Invalid frame dimensions: {}x{}",
            width, height
        )));
    }
    if mat.typ() != CV_8UC3 {
        return Err(VisionError::Processing(format!(
            "Expected an 8-bit BGR frame, got mat type {}",
            mat.typ()
        )));
    }

    let mut rgb = Mat::default();
    imgproc::cvt_color(mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    let pixels = rgb.data_bytes()?.to_vec();
    Ok((pixels, width as u32, height as u32))
}

/// Convert a BGR frame into an [`image::RgbImage`].
pub fn mat_to_rgb_image(mat: &Mat) -> Result<image::RgbImage, VisionError> {
    let (pixels, width, height) = mat_to_rgb_bytes(mat)?;
    image::RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        VisionError::Processing("Frame buffer does not match its dimensions".to_string())
    })
}

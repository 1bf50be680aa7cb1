//! Display surfaces for the annotated camera preview

use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
use opencv::highgui;
use opencv::imgproc;
use opencv::prelude::*;

use crate::error::VisionError;
use crate::overlay::{Overlay, OverlayNode};

const LABEL_STRIP_HEIGHT: i32 = 18;
const BOX_THICKNESS: i32 = 2;

fn annotation_color() -> Scalar {
    // BGR
    Scalar::new(80.0, 220.0, 80.0, 0.0)
}

fn label_text_color() -> Scalar {
    Scalar::new(0.0, 0.0, 0.0, 0.0)
}

/// What the user asked for while a frame was on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    None,
    CloseRequested,
    SnapshotRequested,
}

/// Something that can show the live feed to the user.
pub trait DisplaySurface: Send {
    /// Show a placeholder while the model and camera come up.
    fn show_loading(&mut self, message: &str) -> Result<(), VisionError>;

    /// Present one frame with its overlay and report user input.
    fn present(&mut self, frame: &Mat, overlay: &Overlay) -> Result<DisplayEvent, VisionError>;
}

/// Draw the overlay onto a copy of `frame`.
///
/// Each label becomes a filled strip with the label text at the node's
/// margin position; each highlight becomes a rectangle outline. The
/// input frame is left untouched.
pub fn render_annotations(frame: &Mat, overlay: &Overlay) -> Result<Mat, VisionError> {
    let mut canvas = frame.try_clone()?;

    for node in overlay.nodes() {
        match node {
            OverlayNode::Label(label) => {
                let strip = Rect::new(
                    label.margin_left as i32,
                    label.margin_top as i32,
                    label.width as i32,
                    LABEL_STRIP_HEIGHT,
                );
                imgproc::rectangle(
                    &mut canvas,
                    strip,
                    annotation_color(),
                    imgproc::FILLED,
                    imgproc::LINE_8,
                    0,
                )?;
                imgproc::put_text(
                    &mut canvas,
                    &label.text,
                    Point::new(strip.x + 4, strip.y + LABEL_STRIP_HEIGHT - 5),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    0.45,
                    label_text_color(),
                    1,
                    imgproc::LINE_AA,
                    false,
                )?;
            }
            OverlayNode::Highlight(bbox) => {
                imgproc::rectangle(
                    &mut canvas,
                    Rect::new(
                        bbox.left as i32,
                        bbox.top as i32,
                        bbox.width as i32,
                        bbox.height as i32,
                    ),
                    annotation_color(),
                    BOX_THICKNESS,
                    imgproc::LINE_8,
                    0,
                )?;
            }
        }
    }

    Ok(canvas)
}

/// OpenCV window surface.
pub struct WindowDisplay {
    window_name: String,
    window_created: bool,
}

impl WindowDisplay {
    pub fn new(window_name: &str) -> Self {
        Self {
            window_name: window_name.to_string(),
            window_created: false,
        }
    }

    fn ensure_window(&mut self) -> Result<(), VisionError> {
        if !self.window_created {
            highgui::named_window(&self.window_name, highgui::WINDOW_AUTOSIZE)?;
            self.window_created = true;
        }
        Ok(())
    }
}

impl DisplaySurface for WindowDisplay {
    fn show_loading(&mut self, message: &str) -> Result<(), VisionError> {
        self.ensure_window()?;
        let mut splash =
            Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(24.0))?;
        imgproc::put_text(
            &mut splash,
            message,
            Point::new(40, 240),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            Scalar::all(230.0),
            2,
            imgproc::LINE_AA,
            false,
        )?;
        highgui::imshow(&self.window_name, &splash)?;
        highgui::wait_key(1)?;
        Ok(())
    }

    fn present(&mut self, frame: &Mat, overlay: &Overlay) -> Result<DisplayEvent, VisionError> {
        self.ensure_window()?;
        let canvas = render_annotations(frame, overlay)?;
        highgui::imshow(&self.window_name, &canvas)?;

        // 27 is ESC.
        let key = highgui::wait_key(1)?;
        Ok(match key {
            k if k == i32::from(b'q') || k == 27 => DisplayEvent::CloseRequested,
            k if k == i32::from(b's') => DisplayEvent::SnapshotRequested,
            _ => DisplayEvent::None,
        })
    }
}

/// Surface that swallows every frame, for headless runs.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl DisplaySurface for NullDisplay {
    fn show_loading(&mut self, _message: &str) -> Result<(), VisionError> {
        Ok(())
    }

    fn present(&mut self, _frame: &Mat, _overlay: &Overlay) -> Result<DisplayEvent, VisionError> {
        Ok(DisplayEvent::None)
    }
}

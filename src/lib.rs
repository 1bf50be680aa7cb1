//! Real-time object detection overlay for webcam streams
//!
//! argus opens a webcam, runs an SSD-MobileNet model over every frame
//! and keeps a label + highlight overlay in sync with what the model
//! sees, either in an OpenCV preview window or headless.

pub mod app;
pub mod camera;
pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod overlay;
pub mod predict;
pub mod snapshot;

mod utils;

pub use app::App;
pub use config::ArgusConfig;
pub use error::VisionError;
pub use overlay::Overlay;
pub use predict::PredictionLoop;

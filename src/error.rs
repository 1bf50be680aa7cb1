//! Error types for argus

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Camera capability unavailable: {0}")]
    UnsupportedPlatform(String),

    #[error("Camera access denied: {0}")]
    AccessDenied(#[source] opencv::Error),

    #[error("Webcam not provided")]
    MissingWebcam,

    #[error("Model not provided")]
    MissingModel,

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),
}

impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Camera("Test error".to_string());
        assert!(err.to_string().contains("Camera error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_missing_collaborator_messages() {
        assert_eq!(VisionError::MissingWebcam.to_string(), "Webcam not provided");
        assert_eq!(VisionError::MissingModel.to_string(), "Model not provided");
    }

    #[test]
    fn test_access_denied_preserves_cause() {
        use std::error::Error as _;

        let cause = opencv::Error::new(opencv::core::StsError, "device busy".to_string());
        let err = VisionError::AccessDenied(cause);
        assert!(err.to_string().contains("Camera access denied"));
        assert!(err.source().expect("source").to_string().contains("device busy"));
    }

    #[test]
    fn test_vision_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vision_err: VisionError = io_err.into();
        match vision_err {
            VisionError::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_vision_error_from_opencv() {
        let cv_err = opencv::Error::new(opencv::core::StsError, "bad mat".to_string());
        let vision_err: VisionError = cv_err.into();
        match vision_err {
            VisionError::OpenCv(msg) => assert!(msg.contains("bad mat")),
            _ => panic!("Expected OpenCv error"),
        }
    }

    #[test]
    fn test_all_error_variants() {
        let _ = VisionError::UnsupportedPlatform("backend".to_string());
        let _ = VisionError::Camera("camera".to_string());
        let _ = VisionError::Model("model".to_string());
        let _ = VisionError::Processing("processing".to_string());
        let _ = VisionError::Config("config".to_string());
        let _ = VisionError::Ort("ort".to_string());
        let _ = VisionError::OpenCv("opencv".to_string());
    }
}

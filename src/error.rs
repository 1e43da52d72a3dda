use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Detection failure: {0}")]
    DetectionFailure(String),

    #[error("Write failure: {0}")]
    WriteFailure(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "yolo")]
    #[error("OnnxModel Error: {0}")]
    OnnxModelError(#[from] onnx_model::error::Error),
}

impl Error {
    #[inline]
    pub fn source_unavailable<E: fmt::Display>(err: E) -> Self {
        Error::SourceUnavailable(err.to_string())
    }

    #[inline]
    pub fn detection<E: fmt::Display>(err: E) -> Self {
        Error::DetectionFailure(err.to_string())
    }

    #[inline]
    pub fn write<E: fmt::Display>(err: E) -> Self {
        Error::WriteFailure(err.to_string())
    }

    /// Re-labels an error raised inside a detector call as a detection failure,
    /// keeping errors that already carry that kind untouched.
    pub fn into_detection_failure(self) -> Self {
        match self {
            Error::DetectionFailure(_) => self,
            other => Error::DetectionFailure(other.to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::SourceUnavailable(_) => "source_unavailable",
            Error::DetectionFailure(_) => "detection_failure",
            Error::WriteFailure(_) => "write_failure",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Io(_) => "io",
            Error::Json(_) => "serialization",
            #[cfg(feature = "yolo")]
            Error::OnnxModelError(_) => "model",
        }
    }
}

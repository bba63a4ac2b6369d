use thiserror::Error;

use crate::calibration::Axis;

#[derive(Debug, Error)]
pub enum WavemarkError {
    #[error("{0} calibration needs two tick points and two numeric values")]
    CalibrationIncomplete(Axis),

    #[error("{0} tick points share the same pixel position; cannot derive a scale")]
    DegenerateCalibration(Axis),

    #[error("{axis} tick value {value:?} is not a number")]
    InvalidTickValue { axis: Axis, value: String },

    #[error("{0} field cannot be empty")]
    MissingMetadata(&'static str),

    #[error("No image loaded")]
    NoImage,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Directory scan error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type WavemarkResult<T> = Result<T, WavemarkError>;

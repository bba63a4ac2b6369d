//! Annotation of scanned physiological waveform images: axis calibration,
//! region extraction and light raster cleanup, one image at a time.

pub mod calibration;
pub mod config;
pub mod coords;
pub mod error;
pub mod export;
pub mod metadata;
pub mod overlay;
pub mod raster;
pub mod roi;
pub mod scan;
pub mod session;

pub use config::{load_config, AppConfig};
pub use error::{WavemarkError, WavemarkResult};
pub use session::Session;

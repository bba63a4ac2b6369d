use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WavemarkResult;
use crate::scan::DEFAULT_EXTENSIONS;

pub const CONFIG_FILE: &str = "wavemark.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub display: DisplayConfig,
    pub tools: ToolsConfig,
    pub scan: ScanConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
    pub categories: CategoriesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Canvas area the image is fitted into before zooming.
    pub max_width: f32,
    pub max_height: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_width: 1200.0,
            max_height: 900.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Radius in source pixels of the eraser brush.
    pub erase_radius: u32,
    /// Degrees applied by the rotate buttons.
    pub rotate_step: f64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            erase_radius: 10,
            rotate_step: 90.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSchema {
    /// One row holding both axes.
    #[default]
    Wide,
    /// One row per axis.
    PerAxis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub calibration_schema: CalibrationSchema,
    /// Write exports here instead of next to each image.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoriesConfig {
    /// Labels offered as ROI buttons, in toolbar order.
    pub roi: Vec<String>,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            roi: vec!["ECG".to_string(), "Waveform".to_string()],
        }
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    let candidate = std::env::current_dir().ok()?.join(CONFIG_FILE);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Some(candidate);
    }
    None
}

pub fn load_config_from(path: &Path) -> WavemarkResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load `wavemark.toml` if one exists, otherwise the defaults.
pub fn load_config() -> WavemarkResult<AppConfig> {
    match resolve_config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(AppConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
[tools]
erase_radius = 4

[export]
calibration_schema = "per_axis"

[categories]
roi = ["ECG", "Pleth"]
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.tools.erase_radius, 4);
        assert_eq!(config.tools.rotate_step, 90.0);
        assert_eq!(config.export.calibration_schema, CalibrationSchema::PerAxis);
        assert_eq!(config.categories.roi, vec!["ECG", "Pleth"]);
        assert_eq!(config.scan, ScanConfig::default());
        assert_eq!(config.display.max_width, 1200.0);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[tools\nerase_radius = ").unwrap();
        assert!(load_config_from(&path).is_err());
    }
}

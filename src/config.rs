use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_FRAME_STRIDE: usize = 1;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.5;
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// Parameters of a single scan over one video.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Process every Nth frame.
    pub frame_stride: usize,
    pub confidence_threshold: f32,
    pub overlap_threshold: f32,
    /// Directory the annotated video is written into.
    pub output_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_stride: DEFAULT_FRAME_STRIDE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.frame_stride == 0 {
            return Err(Error::InvalidConfig(
                "frame_stride must be a positive integer".into(),
            ));
        }

        check_unit_interval("confidence_threshold", self.confidence_threshold)?;
        check_unit_interval("overlap_threshold", self.overlap_threshold)?;

        Ok(())
    }

    #[inline]
    pub fn detection(&self) -> DetectionConfig {
        DetectionConfig {
            confidence_threshold: self.confidence_threshold,
            overlap_threshold: self.overlap_threshold,
            persist_tracking: true,
        }
    }

    /// `<output_dir>/<input stem>_annotated.mp4`
    pub fn annotated_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        self.output_dir.join(format!("{}_annotated.mp4", stem))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;

        Ok(config)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<(), Error> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;

        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<(), Error> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidConfig(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }

    Ok(())
}

/// What the detector capability receives alongside every frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub overlap_threshold: f32,
    pub persist_tracking: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        AnalysisConfig::default().detection()
    }
}

//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ocr::recognition::{AttemptConfig, EngineMode, LanguageSet, RecognitionMode, Segmentation};

/// Main configuration for the ecd pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EcdConfig {
    /// Image normalization options.
    pub preprocess: PreprocessOptions,

    /// Recognition engine and attempt list.
    pub recognition: RecognitionConfig,

    /// Page worker pool configuration.
    pub pipeline: PipelineConfig,

    /// PDF rasterization configuration.
    pub pdf: PdfConfig,

    /// Declaration extraction configuration.
    pub extraction: ExtractionConfig,
}

/// Image normalization options, applied in a fixed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    /// Convert to single-channel luminance first.
    pub grayscale: bool,

    /// Contrast factor (1.0 leaves the image unchanged).
    pub contrast_factor: f32,

    /// Sharpness factor (1.0 leaves the image unchanged).
    pub sharpness_factor: f32,

    /// Binarization strategy applied last.
    pub binarization: Binarization,

    /// Detect and correct page skew.
    pub deskew: bool,

    /// Skew below this angle (degrees) is left alone.
    pub skew_threshold_degrees: f32,

    /// Largest skew (degrees) the detector searches for.
    pub max_skew_degrees: f32,

    /// Angular resolution of the skew search (degrees).
    pub skew_step_degrees: f32,

    /// Apply a 3x3 median filter before binarization.
    pub denoise: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            grayscale: true,
            contrast_factor: 2.0,
            sharpness_factor: 1.5,
            binarization: Binarization::Fixed { threshold: 180 },
            deskew: true,
            skew_threshold_degrees: 0.5,
            max_skew_degrees: 5.0,
            skew_step_degrees: 0.1,
            denoise: false,
        }
    }
}

/// Binarization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Binarization {
    /// Global threshold: pixels above it become white.
    Fixed { threshold: u8 },

    /// Local mean over a `(2 * block_radius + 1)` window, minus `offset`.
    Adaptive { block_radius: u32, offset: i32 },
}

/// Which recognizer implementation backs the attempt runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerBackend {
    /// External `tesseract` binary.
    #[default]
    Tesseract,
    /// Pure Rust ONNX models (requires the `onnx` feature).
    Onnx,
}

/// Recognition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Recognizer implementation.
    pub backend: RecognizerBackend,

    /// Path or name of the tesseract executable.
    pub tesseract_path: PathBuf,

    /// Directory with the ONNX detection and recognition models.
    pub model_dir: PathBuf,

    /// Ordered attempt descriptors; each runs once per page.
    pub attempts: Vec<AttemptConfig>,

    /// Per-attempt time budget in seconds.
    pub timeout_secs: u64,

    /// Restrict recognized characters to this set.
    pub allow_list: Option<String>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        let mode = RecognitionMode {
            segmentation: Segmentation::UniformBlock,
            engine: EngineMode::Neural,
        };
        Self {
            backend: RecognizerBackend::Tesseract,
            tesseract_path: PathBuf::from("tesseract"),
            model_dir: PathBuf::from("models"),
            attempts: vec![
                AttemptConfig::new(LanguageSet::from_codes(["mkd", "eng"]), mode),
                AttemptConfig::new(LanguageSet::from_codes(["mkd", "srp", "eng"]), mode),
                AttemptConfig::new(LanguageSet::from_codes(["mkd"]), mode),
            ],
            timeout_secs: 120,
            allow_list: None,
        }
    }
}

/// Page worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum pages processed concurrently.
    pub workers: usize,

    /// Keep normalized page images on the page record.
    pub retain_diagnostics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            retain_diagnostics: false,
        }
    }
}

/// PDF rasterization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Rasterizer executable.
    pub rasterizer_path: PathBuf,

    /// DPI for rendering PDF pages to images.
    pub render_dpi: u32,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            rasterizer_path: PathBuf::from("pdftoppm"),
            render_dpi: 300,
            max_pages: 0,
        }
    }
}

/// Declaration extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Digits after the two-letter country prefix of a tax ID.
    pub tin_digits: usize,

    /// Lines after the data-section marker scanned by header heuristics.
    pub header_window_lines: usize,

    /// Apply the correction rules before extraction.
    pub auto_correct: bool,

    /// Field paths counted by the confidence report.
    pub required_fields: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            tin_digits: 13,
            header_window_lines: 50,
            auto_correct: true,
            required_fields: [
                "HEAHEA.TotGroMasHEA307",
                "HEAHEA.CouOfDesCodHEA30",
                "HEAHEA.DecDatHEA383",
                "TRAEXPEX1.NamEX17",
                "TRAEXPEX1.TINEX159",
                "TRACONCE1.NamCE17",
                "GOOITEGDS",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl EcdConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Per-attempt time budget.
    pub fn attempt_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.recognition.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_settings() {
        let config = EcdConfig::default();
        assert_eq!(config.preprocess.contrast_factor, 2.0);
        assert_eq!(config.preprocess.sharpness_factor, 1.5);
        assert_eq!(
            config.preprocess.binarization,
            Binarization::Fixed { threshold: 180 }
        );
        assert_eq!(config.pdf.render_dpi, 300);
        assert_eq!(config.recognition.attempts.len(), 3);
        assert_eq!(config.recognition.attempts[0].languages.to_string(), "mkd+eng");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"pipeline": {"workers": 2}, "preprocess": {"binarization": {"mode": "adaptive", "block_radius": 15, "offset": 10}}}"#;
        let config: EcdConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pipeline.workers, 2);
        assert!(!config.pipeline.retain_diagnostics);
        assert_eq!(
            config.preprocess.binarization,
            Binarization::Adaptive { block_radius: 15, offset: 10 }
        );
        assert_eq!(config.extraction.tin_digits, 13);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = EcdConfig::default();
        config.recognition.allow_list = Some("0123456789".to_string());
        config.save(&path).unwrap();

        let loaded = EcdConfig::from_file(&path).unwrap();
        assert_eq!(loaded.recognition.allow_list.as_deref(), Some("0123456789"));
        assert_eq!(loaded.recognition.attempts, config.recognition.attempts);
    }
}

//! OCR stages: normalization, recognition attempts and result selection.

pub mod preprocessing;
pub mod recognition;
pub mod selection;
pub mod tesseract;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use preprocessing::{detect_skew, ImagePreprocessor};
pub use recognition::{
    AttemptConfig, AttemptOutcome, AttemptRecord, AttemptSet, AttemptSummary, EngineMode,
    LanguageSet, RecognitionAttempt, RecognitionAttemptRunner, RecognitionMode,
    RecognitionService, Segmentation,
};
pub use selection::ResultSelector;
pub use tesseract::TesseractCli;

#[cfg(feature = "onnx")]
pub use onnx::OnnxRecognizer;

use std::sync::Arc;
use std::time::Duration;

use crate::error::{EcdError, Result};
use crate::models::config::{RecognitionConfig, RecognizerBackend};

/// Build the recognizer selected in the configuration.
pub fn create_recognizer(config: &RecognitionConfig, dpi: u32) -> Result<Arc<dyn RecognitionService>> {
    match config.backend {
        RecognizerBackend::Tesseract => Ok(Arc::new(
            TesseractCli::new()
                .with_binary(&config.tesseract_path)
                .with_dpi(dpi)
                .with_timeout(Duration::from_secs(config.timeout_secs.max(1))),
        )),
        #[cfg(feature = "onnx")]
        RecognizerBackend::Onnx => Ok(Arc::new(OnnxRecognizer::from_dir(&config.model_dir))),
        #[cfg(not(feature = "onnx"))]
        RecognizerBackend::Onnx => Err(EcdError::Config(
            "the onnx backend requires building with the `onnx` feature".to_string(),
        )),
    }
}

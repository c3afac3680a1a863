//! Error types for the ecd-core library.

use thiserror::Error;

/// Main error type for the ecd library.
#[derive(Error, Debug)]
pub enum EcdError {
    /// Image normalization error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Recognition engine error.
    #[error("recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    /// Page orchestration error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Declaration field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// PDF rasterization error.
    #[error("rasterization error: {0}")]
    Raster(#[from] RasterError),

    /// Image codec error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to page image normalization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcrError {
    /// Bytes could not be decoded or the image has no pixels.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors raised by a single recognition attempt.
///
/// None of these abort a page; the attempt runner records them and moves on
/// to the next configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    /// The attempt exceeded its time budget.
    #[error("recognition timed out after {0} ms")]
    Timeout(u64),

    /// The engine or a requested language pack is not installed.
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but reported a failure.
    #[error("recognizer failed: {0}")]
    Engine(String),
}

/// Errors related to page and document orchestration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Every recognition configuration failed for a page.
    #[error("all {attempts} recognition attempts failed on page {page}")]
    AllAttemptsFailed { page: usize, attempts: usize },

    /// The caller cancelled the document run.
    #[error("document processing was cancelled")]
    DocumentCancelled,

    /// No page produced any text.
    #[error("all {0} pages failed")]
    AllPagesFailed(usize),

    /// The document has no pages.
    #[error("document has no pages")]
    NoPages,

    /// A page worker panicked or was aborted.
    #[error("page worker failed: {0}")]
    Worker(String),
}

/// Errors related to declaration field extraction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// A field was found but does not match its fixed format.
    #[error("invalid format for {field}: {value:?} ({reason})")]
    FieldFormatInvalid {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors raised by the PDF rasterizer adapter.
#[derive(Error, Debug)]
pub enum RasterError {
    /// The rasterizer binary could not be started.
    #[error("rasterizer not available: {0}")]
    ToolMissing(String),

    /// The rasterizer exited with an error.
    #[error("rasterizer failed: {0}")]
    Failed(String),

    /// The rasterizer produced no page images.
    #[error("rasterizer produced no pages")]
    NoPages,

    /// I/O error while staging files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the ecd library.
pub type Result<T> = std::result::Result<T, EcdError>;

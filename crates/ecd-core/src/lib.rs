//! Core library for customs declaration (ECD) OCR processing.
//!
//! This crate provides:
//! - Page image normalization (grayscale, contrast, binarization, deskew)
//! - Multi-attempt recognition with language and mode fallback
//! - Rule-based correction of common OCR confusions
//! - Declaration field extraction into the customs schema
//! - Page orchestration with a bounded worker pool and cancellation
//! - Confidence reporting and comparison against expected records

pub mod correction;
pub mod declaration;
pub mod error;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod quality;
pub mod raster;

pub use correction::{SubstitutionRule, TextCorrector};
pub use declaration::{
    compare, ComparisonReport, DeclarationParser, Difference, EcdParser, ExtractionResult,
};
pub use declaration::rules::DeclarationFormat;
pub use error::{EcdError, Result};
pub use models::config::EcdConfig;
pub use models::declaration::{Consignee, Declaration, Exporter, FieldIssue, GoodsItem, Header};
pub use ocr::{create_recognizer, RecognitionService};
pub use pipeline::{CancelHandle, CancelToken, DocumentPipeline, DocumentResult, PageState};
pub use quality::{ConfidenceReport, QualityEvaluator};
pub use raster::{PageRasterizer, PdftoppmRasterizer};

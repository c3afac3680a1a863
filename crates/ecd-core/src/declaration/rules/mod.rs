//! Rule-based field extractors for customs declarations.

pub mod dates;
pub mod documents;
pub mod format;
pub mod goods;
pub mod mass;
pub mod patterns;
pub mod seals;
pub mod tin;

pub use dates::{declaration_date, validate_iso_date, DateExtractor, SlashDate};
pub use documents::{extract_previous_documents, DocumentMatch};
pub use format::{detect_format, DeclarationFormat, FormatScore};
pub use goods::GoodsExtractor;
pub use mass::{extract_total_gross_mass, parse_mass};
pub use seals::extract_seals;
pub use tin::{validate_tin, TinExtractor};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extraction context with confidence scores.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}

//! Tax identification number extraction and format validation.

use super::patterns::TIN_TOKEN;
use super::{ExtractionMatch, FieldExtractor};

/// TIN field extractor.
///
/// Finds every `<2 letters><digits>` token. Tokens with the wrong digit
/// count are still returned (with lower confidence) so the caller can keep
/// the value and flag it.
pub struct TinExtractor {
    digits: usize,
}

impl TinExtractor {
    /// Create a new extractor for 13-digit tax IDs.
    pub fn new() -> Self {
        Self { digits: 13 }
    }

    /// Set the expected number of digits after the prefix.
    pub fn with_digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }
}

impl Default for TinExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TinExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        let all = self.extract_all(text);
        // Prefer a well-formed ID over a malformed one.
        all.iter()
            .position(|m| validate_tin(&m.value, self.digits).is_ok())
            .map(|i| all[i].clone())
            .or_else(|| all.into_iter().next())
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        TIN_TOKEN
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let value = full.as_str().to_string();
                let confidence = if validate_tin(&value, self.digits).is_ok() {
                    0.95
                } else {
                    0.4
                };
                Some(
                    ExtractionMatch::new(value, confidence, full.as_str())
                        .with_position(full.start(), full.end()),
                )
            })
            .collect()
    }
}

/// Check the fixed TIN format: two uppercase ASCII letters then `digits`
/// ASCII digits. Registration is not checked.
pub fn validate_tin(tin: &str, digits: usize) -> Result<(), String> {
    let mut chars = tin.chars();
    let prefix: String = chars.by_ref().take(2).collect();
    if prefix.chars().count() != 2 || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
        return Err("expected a two-letter country prefix".to_string());
    }

    let rest: String = chars.collect();
    if !rest.chars().all(|c| c.is_ascii_digit()) {
        return Err("expected only digits after the prefix".to_string());
    }
    if rest.len() != digits {
        return Err(format!("expected {} digits, found {}", digits, rest.len()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tin_valid() {
        assert!(validate_tin("MK4030996123456", 13).is_ok());
        assert!(validate_tin("RS1234567890123", 13).is_ok());
    }

    #[test]
    fn test_validate_tin_invalid() {
        assert!(validate_tin("MK403099612345", 13).is_err());
        assert!(validate_tin("M14030996123456", 13).is_err());
        assert!(validate_tin("mk4030996123456", 13).is_err());
        assert!(validate_tin("MK40309961234A6", 13).is_err());
        assert!(validate_tin("", 13).is_err());
    }

    #[test]
    fn test_validate_tin_custom_length() {
        assert!(validate_tin("DE123456789", 9).is_ok());
        assert!(validate_tin("DE123456789", 13).is_err());
    }

    #[test]
    fn test_extract_prefers_valid() {
        let text = "Ref AB12345678 ЕДБ MK4030996123456";
        let m = TinExtractor::new().extract(text).unwrap();
        assert_eq!(m.value, "MK4030996123456");
        assert!(m.confidence > 0.9);
    }

    #[test]
    fn test_extract_keeps_malformed_when_alone() {
        let m = TinExtractor::new().extract("ЕДБ MK403099612345").unwrap();
        assert_eq!(m.value, "MK403099612345");
        assert!(m.confidence < 0.5);
    }
}

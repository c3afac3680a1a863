//! Date extraction for customs declarations.

use chrono::NaiveDate;

use super::patterns::{DATE_LABEL, SLASH_DATE};
use super::{ExtractionMatch, FieldExtractor};

/// A `dd/mm/yyyy` token and its calendar value, if it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct SlashDate {
    pub raw: String,
    pub date: Option<NaiveDate>,
}

impl SlashDate {
    /// ISO form for valid dates, the raw token otherwise.
    pub fn normalized(&self) -> String {
        match self.date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => self.raw.clone(),
        }
    }
}

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<SlashDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        SLASH_DATE
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let day: u32 = caps[1].parse().ok()?;
                let month: u32 = caps[2].parse().ok()?;
                let year: i32 = caps[3].parse().ok()?;
                let date = NaiveDate::from_ymd_opt(year, month, day);
                let confidence = if date.is_some() { 0.9 } else { 0.3 };
                Some(
                    ExtractionMatch::new(
                        SlashDate {
                            raw: full.as_str().to_string(),
                            date,
                        },
                        confidence,
                        full.as_str(),
                    )
                    .with_position(full.start(), full.end()),
                )
            })
            .collect()
    }
}

/// Declaration date: the first date after a date label, else the first
/// date in the text.
pub fn declaration_date(text: &str) -> Option<SlashDate> {
    let extractor = DateExtractor::new();

    for label in DATE_LABEL.find_iter(text) {
        // Same line or the next one.
        let rest = &text[label.end()..];
        let window: String = rest.lines().take(2).collect::<Vec<_>>().join("\n");
        if let Some(found) = extractor.extract(&window) {
            return Some(found.value);
        }
    }

    extractor.extract(text).map(|m| m.value)
}

/// Check that a stored date value is an ISO calendar date.
pub fn validate_iso_date(value: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| "not a valid dd/mm/yyyy calendar date".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_date_wins() {
        let text = "Рок 01/01/2023\nДатум:\n15/03/2024\n";
        let date = declaration_date(text).unwrap();
        assert_eq!(date.date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(date.normalized(), "2024-03-15");
    }

    #[test]
    fn test_unlabeled_falls_back_to_first() {
        let date = declaration_date("бр. 12 од 02/02/2024 и 03/03/2024").unwrap();
        assert_eq!(date.raw, "02/02/2024");
    }

    #[test]
    fn test_invalid_calendar_date_is_kept_raw() {
        let date = declaration_date("Date 31/02/2024").unwrap();
        assert_eq!(date.date, None);
        assert_eq!(date.normalized(), "31/02/2024");
        assert!(validate_iso_date(&date.normalized()).is_err());
    }

    #[test]
    fn test_no_date() {
        assert_eq!(declaration_date("МАСА ДРВЕНА"), None);
    }

    #[test]
    fn test_validate_iso_date() {
        assert!(validate_iso_date("2024-03-15").is_ok());
        assert!(validate_iso_date("2024-02-30").is_err());
    }
}

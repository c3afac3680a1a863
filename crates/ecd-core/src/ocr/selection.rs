//! Choosing one recognition result per page.

use super::recognition::RecognitionAttempt;

/// Picks the attempt with the most characters.
///
/// Ties go to the attempt that ran first, so the outcome depends only on the
/// attempt order and never on timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultSelector;

impl ResultSelector {
    pub fn new() -> Self {
        Self
    }

    /// Best attempt, or `None` when there are no attempts.
    pub fn select<'a, I>(&self, attempts: I) -> Option<&'a RecognitionAttempt>
    where
        I: IntoIterator<Item = &'a RecognitionAttempt>,
    {
        attempts.into_iter().fold(None, |best, attempt| match best {
            Some(current) if current.char_count >= attempt.char_count => Some(current),
            _ => Some(attempt),
        })
    }

    /// Text of the best attempt; empty when there are no attempts.
    pub fn select_text<'a, I>(&self, attempts: I) -> String
    where
        I: IntoIterator<Item = &'a RecognitionAttempt>,
    {
        self.select(attempts)
            .map(|a| a.text.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::recognition::{AttemptConfig, RecognitionMode};

    fn attempt(langs: &str, chars: usize) -> RecognitionAttempt {
        let config = AttemptConfig::new(langs.parse().unwrap(), RecognitionMode::default());
        RecognitionAttempt::new(&config, "x".repeat(chars))
    }

    #[test]
    fn test_tie_goes_to_earliest() {
        let attempts = vec![
            attempt("a", 12),
            attempt("b", 45),
            attempt("c", 45),
            attempt("d", 8),
        ];
        let best = ResultSelector::new().select(&attempts).unwrap();
        assert_eq!(best.languages.to_string(), "b");
    }

    #[test]
    fn test_empty_selects_nothing() {
        let attempts: Vec<RecognitionAttempt> = Vec::new();
        assert!(ResultSelector::new().select(&attempts).is_none());
        assert_eq!(ResultSelector::new().select_text(&attempts), "");
    }

    #[test]
    fn test_single_empty_attempt() {
        let attempts = vec![attempt("a", 0)];
        assert_eq!(ResultSelector::new().select_text(&attempts), "");
        assert!(ResultSelector::new().select(&attempts).is_some());
    }
}

//! OCR text correction.

mod rules;

pub use rules::{confusable_digit, latin_homoglyph, SubstitutionRule};

use tracing::debug;

/// Bound on full passes over the rule list.
const MAX_PASSES: usize = 8;

/// Applies an ordered list of substitution rules to recognized text.
///
/// The rule list is re-applied until the text stops changing, so the
/// result is idempotent: `correct(correct(t)) == correct(t)`.
#[derive(Debug, Clone)]
pub struct TextCorrector {
    rules: Vec<SubstitutionRule>,
}

impl TextCorrector {
    /// Default rule order for 13-digit tax IDs.
    pub fn new() -> Self {
        Self::with_tin_digits(13)
    }

    pub fn with_tin_digits(digits: usize) -> Self {
        Self {
            rules: vec![
                SubstitutionRule::DigitRunConfusable,
                SubstitutionRule::TaxIdRepair { digits },
                SubstitutionRule::SlashDateRepair,
                SubstitutionRule::QuantityUnitSpacing,
            ],
        }
    }

    /// Use a custom rule list.
    pub fn with_rules(mut self, rules: Vec<SubstitutionRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[SubstitutionRule] {
        &self.rules
    }

    pub fn correct(&self, text: &str) -> String {
        let mut current = text.to_string();
        for pass in 0..MAX_PASSES {
            let next = self.apply_once(&current);
            if next == current {
                return current;
            }
            debug!("Correction pass {} changed the text", pass + 1);
            current = next;
        }
        current
    }

    fn apply_once(&self, text: &str) -> String {
        self.rules.iter().fold(text.to_string(), |current, rule| {
            let next = rule.apply(&current);
            if next != current {
                debug!("Correction rule {} changed the text", rule.name());
            }
            next
        })
    }
}

impl Default for TextCorrector {
    fn default() -> Self {
        Self::new()
    }
}

//! Declaration layout detection.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

lazy_static! {
    static ref CUSTOMS_REFERENCE: Regex = Regex::new(
        r"(?i)7\s+референтен број\s+\w+/\d{4}"
    ).unwrap();

    static ref STANDARD_LRN: Regex = Regex::new(
        r"LRN\s*:\s*\d{2}MK"
    ).unwrap();

    static ref STANDARD_RDB: Regex = Regex::new(
        r"РДБ\s+\d"
    ).unwrap();
}

/// Layout of the printed declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationFormat {
    /// Trader-printed declaration (Cyrillic labels, `LRN` header).
    Standard,
    /// Customs office print (Latin labels, reference number in box 7).
    Customs,
    Unknown,
}

impl std::fmt::Display for DeclarationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeclarationFormat::Standard => "standard",
            DeclarationFormat::Customs => "customs",
            DeclarationFormat::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Indicator points collected for each layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatScore {
    pub standard: u32,
    pub customs: u32,
}

impl FormatScore {
    pub fn score(text: &str) -> Self {
        let mut score = Self::default();

        if text.contains("Consignor/Exporter") || text.contains("Consignor / Exporter") {
            score.customs += 2;
        }
        if text.contains("РБД") && !text.contains("РДБ") {
            score.customs += 1;
        }
        if CUSTOMS_REFERENCE.is_match(text) {
            score.customs += 2;
        }
        if text.contains("Ознаки и броеви - Број на контејнер") {
            score.customs += 1;
        }

        if text.contains("Испраќач/Извозник") || text.contains("Испраќач / Извозник") {
            score.standard += 2;
        }
        if STANDARD_LRN.is_match(text) {
            score.standard += 2;
        }
        if STANDARD_RDB.is_match(text) {
            score.standard += 1;
        }
        let lower = text.to_lowercase();
        if lower.contains("тов.лист") || lower.contains("товарен лист") {
            score.standard += 1;
        }

        score
    }

    /// A layout wins with a strict lead and at least two points.
    pub fn format(&self) -> DeclarationFormat {
        if self.customs > self.standard && self.customs >= 2 {
            DeclarationFormat::Customs
        } else if self.standard > self.customs && self.standard >= 2 {
            DeclarationFormat::Standard
        } else {
            DeclarationFormat::Unknown
        }
    }
}

pub fn detect_format(text: &str) -> DeclarationFormat {
    let score = FormatScore::score(text);
    let format = score.format();
    debug!(
        "Format indicators: standard={}, customs={} -> {}",
        score.standard, score.customs, format
    );
    format
}

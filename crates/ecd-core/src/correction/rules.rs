//! Context-guarded substitution rules.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// Two capitals (Latin or Cyrillic look-alikes), an optional stray glyph,
    /// then 12 or 13 digits.
    static ref TAX_ID_CANDIDATE: Regex = Regex::new(
        r"\b([A-ZАВЕКМНОРСТХ]{2})([OoОоDQIl|]?)([0-9]{12,13})\b"
    ).unwrap();

    static ref SLASH_DATE_CANDIDATE: Regex = Regex::new(
        r"\b([0-9OoОоIl]{2})/([0-9OoОоIl]{2})/([0-9OoОоIl]{4})\b"
    ).unwrap();

    static ref QUANTITY_UNIT: Regex = Regex::new(
        r"-([0-9]+)[ \t]+ком\."
    ).unwrap();
}

/// A single correction rule.
///
/// Every rule is scoped by context: it rewrites a glyph only where the
/// surrounding characters show the token is numeric. Rules are idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionRule {
    /// A look-alike glyph with an ASCII digit immediately on both sides
    /// becomes that digit: `O o О о D Q` to `0`, `I l |` to `1`, `З` to `3`,
    /// `S` to `5`, `B` to `8`. Neighbors are read from the unmodified input.
    DigitRunConfusable,

    /// Tax ID token `<2 capitals><optional stray glyph><12|13 digits>`.
    /// The prefix is transliterated to Latin. With a stray glyph and
    /// `digits` digits the glyph is an insertion and is dropped; with a stray
    /// glyph and one digit short the glyph is a misread digit and is mapped.
    TaxIdRepair { digits: usize },

    /// `dd/mm/yyyy` tokens with at least six real digits get their
    /// look-alike glyphs mapped to digits.
    SlashDateRepair,

    /// Removes the space in quantity suffixes: `-1 ком.` to `-1ком.`.
    QuantityUnitSpacing,
}

impl SubstitutionRule {
    pub fn name(&self) -> &'static str {
        match self {
            SubstitutionRule::DigitRunConfusable => "digit_run_confusable",
            SubstitutionRule::TaxIdRepair { .. } => "tax_id_repair",
            SubstitutionRule::SlashDateRepair => "slash_date_repair",
            SubstitutionRule::QuantityUnitSpacing => "quantity_unit_spacing",
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            SubstitutionRule::DigitRunConfusable => digit_run_confusables(text),
            SubstitutionRule::TaxIdRepair { digits } => repair_tax_ids(text, *digits),
            SubstitutionRule::SlashDateRepair => repair_slash_dates(text),
            SubstitutionRule::QuantityUnitSpacing => {
                QUANTITY_UNIT.replace_all(text, "-${1}ком.").into_owned()
            }
        }
    }
}

/// Digit a look-alike glyph stands for.
pub fn confusable_digit(c: char) -> Option<char> {
    match c {
        'O' | 'o' | 'О' | 'о' | 'D' | 'Q' => Some('0'),
        'I' | 'l' | '|' => Some('1'),
        'З' => Some('3'),
        'S' => Some('5'),
        'B' => Some('8'),
        _ => None,
    }
}

/// Latin letter for a Cyrillic capital that looks the same.
pub fn latin_homoglyph(c: char) -> char {
    match c {
        'А' => 'A',
        'В' => 'B',
        'Е' => 'E',
        'К' => 'K',
        'М' => 'M',
        'Н' => 'H',
        'О' => 'O',
        'Р' => 'P',
        'С' => 'C',
        'Т' => 'T',
        'Х' => 'X',
        other => other,
    }
}

fn digit_run_confusables(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        let replacement = confusable_digit(c).filter(|_| {
            let before = i.checked_sub(1).and_then(|j| chars.get(j));
            let after = chars.get(i + 1);
            matches!((before, after), (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit())
        });
        out.push(replacement.unwrap_or(c));
    }

    out
}

fn repair_tax_ids(text: &str, digits: usize) -> String {
    let pattern: Cow<'_, Regex> = if digits == 13 {
        Cow::Borrowed(&*TAX_ID_CANDIDATE)
    } else {
        match Regex::new(&format!(
            r"\b([A-ZАВЕКМНОРСТХ]{{2}})([OoОоDQIl|]?)([0-9]{{{},{}}})\b",
            digits.saturating_sub(1).max(1),
            digits.max(1)
        )) {
            Ok(regex) => Cow::Owned(regex),
            Err(_) => return text.to_string(),
        }
    };

    pattern
        .replace_all(text, |caps: &Captures| {
            let prefix: String = caps[1].chars().map(latin_homoglyph).collect();
            let stray = &caps[2];
            let number = &caps[3];

            match stray.chars().next() {
                None => format!("{}{}", prefix, number),
                Some(_) if number.len() == digits => format!("{}{}", prefix, number),
                Some(glyph) => match confusable_digit(glyph) {
                    Some(d) => format!("{}{}{}", prefix, d, number),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
}

fn repair_slash_dates(text: &str) -> String {
    SLASH_DATE_CANDIDATE
        .replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            let real_digits = token.chars().filter(|c| c.is_ascii_digit()).count();
            if real_digits < 6 {
                return token.to_string();
            }
            token
                .chars()
                .map(|c| confusable_digit(c).unwrap_or(c))
                .collect()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_digit_run_confusable() {
        let rule = SubstitutionRule::DigitRunConfusable;
        assert_eq!(rule.apply("4O3l2 kg"), "40312 kg");
        assert_eq!(rule.apply("1|5"), "115");
        // Only one side numeric: untouched.
        assert_eq!(rule.apply("BOX 1O"), "BOX 1O");
        assert_eq!(rule.apply("OSLO"), "OSLO");
        assert_eq!(rule.apply("ПОРТО"), "ПОРТО");
    }

    #[test]
    fn test_digit_run_confusable_reads_unmodified_neighbors() {
        // The middle O neighbors are O's, not digits, in the input.
        assert_eq!(SubstitutionRule::DigitRunConfusable.apply("5OOO5"), "5OOO5");
    }

    #[test]
    fn test_tax_id_inserted_glyph_is_dropped() {
        let rule = SubstitutionRule::TaxIdRepair { digits: 13 };
        assert_eq!(rule.apply("MKО1234567890123"), "MK1234567890123");
        assert_eq!(rule.apply("ЕДБ: MKl4030996123456 x"), "ЕДБ: MK4030996123456 x");
    }

    #[test]
    fn test_tax_id_misread_digit_is_mapped() {
        let rule = SubstitutionRule::TaxIdRepair { digits: 13 };
        assert_eq!(rule.apply("MKO403099612345"), "MK0403099612345");
    }

    #[test]
    fn test_tax_id_cyrillic_prefix_is_transliterated() {
        let rule = SubstitutionRule::TaxIdRepair { digits: 13 };
        assert_eq!(rule.apply("МК4030996123456"), "MK4030996123456");
    }

    #[test]
    fn test_tax_id_leaves_other_tokens() {
        let rule = SubstitutionRule::TaxIdRepair { digits: 13 };
        assert_eq!(rule.apply("MK12345"), "MK12345");
        assert_eq!(rule.apply("ABCO1234567890123"), "ABCO1234567890123");
        assert_eq!(rule.apply("MK12345678901234"), "MK12345678901234");
    }

    #[test]
    fn test_tax_id_custom_digit_count() {
        let rule = SubstitutionRule::TaxIdRepair { digits: 10 };
        assert_eq!(rule.apply("DEO1234567890"), "DE1234567890");
    }

    #[test]
    fn test_slash_date_repair() {
        let rule = SubstitutionRule::SlashDateRepair;
        assert_eq!(rule.apply("Датум 1O/03/2O24"), "Датум 10/03/2024");
        // Too few real digits to be sure it is a date.
        assert_eq!(rule.apply("1O/O3/2O24"), "1O/O3/2O24");
        assert_eq!(rule.apply("OO/lO/IOOl"), "OO/lO/IOOl");
    }

    #[test]
    fn test_quantity_unit_spacing() {
        let rule = SubstitutionRule::QuantityUnitSpacing;
        assert_eq!(rule.apply("МАСА-1 ком. БЕЛА"), "МАСА-1ком. БЕЛА");
        assert_eq!(rule.apply("Палета-12\tком."), "Палета-12ком.");
    }
}

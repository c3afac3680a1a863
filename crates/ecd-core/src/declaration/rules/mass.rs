//! Gross mass parsing.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::patterns::{MASS_BEFORE_KGM, NUMBER_LINE};
use crate::declaration::layout::Lines;

/// Parse a mass as printed on the form.
///
/// Accepts `635.000`, `635,5`, `1.234,5` and `1,234.5`. When both separators
/// occur the last one is the decimal point; a separator repeated more than
/// once is a thousands separator.
pub fn parse_mass(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    let normalized = match (dots, commas) {
        (0, 0) => cleaned,
        (_, 0) if dots > 1 => cleaned.replace('.', ""),
        (_, 0) => cleaned,
        (0, _) if commas > 1 => cleaned.replace(',', ""),
        (0, _) => cleaned.replace(',', "."),
        _ => {
            let last_dot = cleaned.rfind('.')?;
            let last_comma = cleaned.rfind(',')?;
            if last_comma > last_dot {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
    };

    Decimal::from_str(&normalized).ok().map(|d| d.normalize())
}

/// Total gross mass: the number printed before a `KGM` unit.
///
/// The unit is either on its own line (value on a preceding line) or inline
/// after the value. The first occurrence wins.
pub fn extract_total_gross_mass(lines: &Lines<'_>) -> Option<Decimal> {
    for (i, line) in lines.iter() {
        if line == "KGM" {
            if let Some((_, prev)) = lines.prev_nonempty(i, 3) {
                if NUMBER_LINE.is_match(prev) {
                    if let Some(mass) = parse_mass(prev) {
                        return Some(mass);
                    }
                }
            }
            continue;
        }

        if let Some(caps) = MASS_BEFORE_KGM.captures(line) {
            if let Some(mass) = parse_mass(&caps[1]) {
                return Some(mass);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_mass_separators() {
        assert_eq!(parse_mass("635.000"), Some(dec("635")));
        assert_eq!(parse_mass("635,5"), Some(dec("635.5")));
        assert_eq!(parse_mass("1.234,5"), Some(dec("1234.5")));
        assert_eq!(parse_mass("1,234.5"), Some(dec("1234.5")));
        assert_eq!(parse_mass("1.234.567"), Some(dec("1234567")));
        assert_eq!(parse_mass("12"), Some(dec("12")));
    }

    #[test]
    fn test_parse_mass_rejects_garbage() {
        assert_eq!(parse_mass(""), None);
        assert_eq!(parse_mass("KGM"), None);
        assert_eq!(parse_mass("6a5"), None);
    }

    #[test]
    fn test_total_mass_on_preceding_line() {
        let text = "EXMK\n635.000\n\nKGM\n5010(1)";
        assert_eq!(extract_total_gross_mass(&Lines::new(text)), Some(dec("635")));
    }

    #[test]
    fn test_total_mass_inline() {
        let text = "Бруто маса\n1.250,5 KGM";
        assert_eq!(extract_total_gross_mass(&Lines::new(text)), Some(dec("1250.5")));
    }

    #[test]
    fn test_total_mass_missing() {
        assert_eq!(extract_total_gross_mass(&Lines::new("KGM\nPX")), None);
        assert_eq!(extract_total_gross_mass(&Lines::new("ТЕКСТ\nKGM")), None);
    }
}

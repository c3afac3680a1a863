//! Seal block extraction.

use super::patterns::{COMMODITY_CODE, SEAL_ID, SEAL_LABEL, SECTION_LABEL};
use crate::declaration::layout::Lines;
use crate::models::declaration::{SealId, SealInfo};

/// Lines after the label that may still belong to the seal block.
const SEAL_BLOCK_LINES: usize = 2;

/// Read the seal count and identifiers after a `Пломби`/`Seals` label.
///
/// The count is the first short number in the block; identifiers are
/// uppercase alphanumeric tokens containing a digit. Without a printed
/// count the number of identifiers is used.
pub fn extract_seals(lines: &Lines<'_>) -> SealInfo {
    let Some((label_line, label)) = lines.iter().find_map(|(i, line)| {
        SEAL_LABEL.find(line).map(|m| (i, &line[m.end()..]))
    }) else {
        return SealInfo::default();
    };

    let mut block = vec![label.trim_start_matches([':', ' ']).to_string()];
    for i in label_line + 1..(label_line + 1 + SEAL_BLOCK_LINES).min(lines.len()) {
        let line = lines.get(i);
        if SECTION_LABEL.is_match(line) || COMMODITY_CODE.is_match(line) {
            break;
        }
        if line.chars().any(|c| c.is_ascii_digit()) {
            block.push(line.to_string());
        }
    }

    let mut count = None;
    let mut ids = Vec::new();
    for token in block.iter().flat_map(|l| l.split_whitespace()) {
        let token = token.trim_matches(|c: char| c == ',' || c == ';');
        if count.is_none() && token.len() <= 3 && token.chars().all(|c| c.is_ascii_digit()) {
            count = token.parse::<u32>().ok();
            continue;
        }
        if SEAL_ID.is_match(token)
            && token.chars().any(|c| c.is_ascii_digit())
            && !ids.iter().any(|s: &SealId| s.id == token)
        {
            ids.push(SealId {
                id: token.to_string(),
            });
        }
    }

    if count.is_none() && !ids.is_empty() {
        count = u32::try_from(ids.len()).ok();
    }

    SealInfo { count, ids }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(info: &SealInfo) -> Vec<&str> {
        info.ids.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_count_and_ids() {
        let info = extract_seals(&Lines::new("Пломби: 2\nMK123456, MK123457\nПримач"));
        assert_eq!(info.count, Some(2));
        assert_eq!(ids(&info), vec!["MK123456", "MK123457"]);
    }

    #[test]
    fn test_count_from_ids() {
        let info = extract_seals(&Lines::new("Seals\nAB1234 CD5678\n84253100"));
        assert_eq!(info.count, Some(2));
        assert_eq!(ids(&info), vec!["AB1234", "CD5678"]);
    }

    #[test]
    fn test_block_stops_at_commodity_code() {
        let info = extract_seals(&Lines::new("Seals 1\n84253100\nZZ9999"));
        assert_eq!(info.count, Some(1));
        assert!(info.ids.is_empty());
    }

    #[test]
    fn test_no_label() {
        assert_eq!(extract_seals(&Lines::new("EXMK\n84253100")), SealInfo::default());
    }
}

//! Goods item extraction.
//!
//! Items are anchored on 8-digit commodity code lines. Item `i` owns the
//! lines from its anchor up to the next anchor; the description may also be
//! printed in a short window before the anchor.

use std::collections::HashSet;
use std::ops::Range;

use tracing::debug;

use super::documents::extract_previous_documents;
use super::mass::parse_mass;
use super::patterns::{
    COMMODITY_CODE, GROSS_MASS_LABEL, NUMBER_LINE, NUMBER_TOKEN, PACKAGE_INLINE, PACKAGE_KINDS,
    PALLET_MARKER, PREVIOUS_DOCUMENT, SECTION_LABEL, TIN_TOKEN, UN_DANGEROUS_GOODS,
};
use crate::correction::SubstitutionRule;
use crate::declaration::layout::Lines;
use crate::models::declaration::{CommodityCode, GoodsItem, Package};

/// Minimum length of a free-text line taken as a description.
const MIN_DESCRIPTION_CHARS: usize = 10;

/// Goods item extractor.
pub struct GoodsExtractor {
    lookback: usize,
}

impl GoodsExtractor {
    pub fn new() -> Self {
        Self { lookback: 10 }
    }

    /// Extract all goods items in line order, numbered from 1.
    pub fn extract(&self, lines: &Lines<'_>) -> Vec<GoodsItem> {
        let anchors: Vec<usize> = lines
            .iter()
            .filter(|(_, line)| COMMODITY_CODE.is_match(line))
            .map(|(i, _)| i)
            .collect();

        if anchors.is_empty() {
            return Vec::new();
        }

        let blocks: Vec<Range<usize>> = anchors
            .iter()
            .enumerate()
            .map(|(k, &a)| a..anchors.get(k + 1).copied().unwrap_or(lines.len()))
            .collect();

        let mut items: Vec<GoodsItem> = blocks
            .iter()
            .enumerate()
            .map(|(k, block)| {
                let floor = if k == 0 { 0 } else { anchors[k - 1] + 1 };
                let lookback = floor.max(block.start.saturating_sub(self.lookback))..block.start;
                self.extract_item(lines, block.clone(), lookback)
            })
            .collect();

        let mut seen: Vec<HashSet<(String, String)>> = vec![HashSet::new(); items.len()];
        for found in extract_previous_documents(lines) {
            // Documents printed before the first item belong to it.
            let owner = blocks
                .iter()
                .position(|b| b.contains(&found.line))
                .unwrap_or(0);
            let key = (
                found.document.doc_type.clone(),
                found.document.reference.clone(),
            );
            if seen[owner].insert(key) {
                items[owner].documents.push(found.document);
            }
        }

        for (i, item) in items.iter_mut().enumerate() {
            item.item_number = (i + 1).to_string();
        }

        debug!("Extracted {} goods items", items.len());
        items
    }

    fn extract_item(
        &self,
        lines: &Lines<'_>,
        block: Range<usize>,
        lookback: Range<usize>,
    ) -> GoodsItem {
        let anchor = block.start;
        let (packages, first_package_line) = packages(lines, block.clone());

        let gross_mass = labeled_mass(lines, block.clone())
            .or_else(|| first_package_line.and_then(|i| mass_after_package(lines, i, block.end)));

        let description = description_after_pallet(lines, block.clone())
            .or_else(|| description_after_pallet(lines, lookback.clone()))
            .or_else(|| first_free_text(lines, anchor + 1..block.end))
            .or_else(|| first_free_text(lines, lookback))
            .map(|d| SubstitutionRule::QuantityUnitSpacing.apply(d));

        let un_dangerous_goods_code = block
            .clone()
            .find_map(|i| UN_DANGEROUS_GOODS.captures(lines.get(i)).map(|c| c[1].to_string()));

        GoodsItem {
            item_number: String::new(),
            gross_mass,
            description,
            un_dangerous_goods_code,
            commodity_code: CommodityCode {
                code: Some(lines.get(anchor).to_string()),
            },
            packages,
            documents: Vec::new(),
        }
    }
}

impl Default for GoodsExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Package lines of a block and the index of the first one.
fn packages(lines: &Lines<'_>, block: Range<usize>) -> (Vec<Package>, Option<usize>) {
    let anchor = block.start;
    let mut found = Vec::new();
    let mut first = None;

    for i in anchor + 1..block.end {
        let line = lines.get(i);
        let package = if let Some(caps) = PACKAGE_INLINE.captures(line) {
            Some(Package {
                kind: caps[2].to_string(),
                count: Some(caps[1].to_string()),
                marks: None,
            })
        } else if PACKAGE_KINDS.contains(&line) {
            let count = lines
                .prev_nonempty(i, 2)
                .filter(|(j, prev)| {
                    *j > anchor && prev.len() <= 6 && prev.chars().all(|c| c.is_ascii_digit())
                })
                .map(|(_, prev)| prev.to_string());
            Some(Package {
                kind: line.to_string(),
                count,
                marks: None,
            })
        } else {
            None
        };

        if let Some(package) = package {
            first.get_or_insert(i);
            found.push(package);
        }
    }

    (found, first)
}

/// Mass printed after a gross mass label, on the same or the next line.
fn labeled_mass(lines: &Lines<'_>, block: Range<usize>) -> Option<rust_decimal::Decimal> {
    let end = block.end;
    block.into_iter().find_map(|i| {
        let line = lines.get(i);
        let label = GROSS_MASS_LABEL.find(line)?;
        NUMBER_TOKEN
            .find(&line[label.end()..])
            .map(|m| m.as_str())
            .or_else(|| {
                lines
                    .next_nonempty(i, 2)
                    .filter(|(j, next)| *j < end && NUMBER_LINE.is_match(next))
                    .map(|(_, next)| next)
            })
            .and_then(parse_mass)
    })
}

/// The second number printed after the package line.
fn mass_after_package(lines: &Lines<'_>, package_line: usize, end: usize) -> Option<rust_decimal::Decimal> {
    let (first, line) = lines.next_nonempty(package_line, 2)?;
    if first >= end || !NUMBER_LINE.is_match(line) {
        return None;
    }
    let (second, line) = lines.next_nonempty(first, 2)?;
    if second >= end || !NUMBER_LINE.is_match(line) {
        return None;
    }
    parse_mass(line)
}

fn description_after_pallet<'a>(lines: &Lines<'a>, range: Range<usize>) -> Option<&'a str> {
    let end = range.end;
    range
        .filter(|&i| PALLET_MARKER.is_match(lines.get(i)))
        .find_map(|i| {
            lines
                .next_nonempty(i, 2)
                .filter(|(j, line)| *j < end && !COMMODITY_CODE.is_match(line))
                .map(|(_, line)| line)
        })
}

fn first_free_text<'a>(lines: &Lines<'a>, range: Range<usize>) -> Option<&'a str> {
    range.map(|i| lines.get(i)).find(|line| is_free_text(line))
}

fn is_free_text(line: &str) -> bool {
    line.chars().count() > MIN_DESCRIPTION_CHARS
        && !NUMBER_LINE.is_match(line)
        && !PREVIOUS_DOCUMENT.is_match(line)
        && !SECTION_LABEL.is_match(line)
        && !GROSS_MASS_LABEL.is_match(line)
        && !TIN_TOKEN.is_match(line)
        && !PACKAGE_INLINE.is_match(line)
        && !PALLET_MARKER.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const TWO_ITEMS: &str = "\
T1(24MK001)
Палета
Витло на електричен погон сер.бр.6444.-1 ком.,
84253100
7
PX
635.000
635.000
5010(011/2022); 5016(0002826);
5010(011/2022)
84253200
2 CT
МАСИ ДРВЕНИ ЗА ГРАДИНА
UN 1263
Бруто маса: 120,5
5009(12/03/2024)";

    fn doc_types(item: &GoodsItem) -> Vec<&str> {
        item.documents.iter().map(|d| d.doc_type.as_str()).collect()
    }

    #[test]
    fn test_two_items() {
        let items = GoodsExtractor::new().extract(&Lines::new(TWO_ITEMS));
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.item_number, "1");
        assert_eq!(first.commodity_code.code.as_deref(), Some("84253100"));
        assert_eq!(
            first.description.as_deref(),
            Some("Витло на електричен погон сер.бр.6444.-1ком.,")
        );
        assert_eq!(
            first.packages,
            vec![Package {
                kind: "PX".to_string(),
                count: Some("7".to_string()),
                marks: None,
            }]
        );
        assert_eq!(first.gross_mass, Some(Decimal::from_str("635").unwrap()));
        assert_eq!(doc_types(first), vec!["T1", "5010", "5016"]);
        assert_eq!(first.un_dangerous_goods_code, None);

        let second = &items[1];
        assert_eq!(second.item_number, "2");
        assert_eq!(second.description.as_deref(), Some("МАСИ ДРВЕНИ ЗА ГРАДИНА"));
        assert_eq!(second.packages[0].kind, "CT");
        assert_eq!(second.packages[0].count.as_deref(), Some("2"));
        assert_eq!(second.gross_mass, Some(Decimal::from_str("120.5").unwrap()));
        assert_eq!(second.un_dangerous_goods_code.as_deref(), Some("1263"));
        assert_eq!(doc_types(second), vec!["5009"]);
    }

    #[test]
    fn test_no_commodity_code_no_items() {
        let items = GoodsExtractor::new().extract(&Lines::new("Палета\nОПИС НА СТОКАТА\n5010(1)"));
        assert!(items.is_empty());
    }

    #[test]
    fn test_package_count_not_taken_from_anchor() {
        let items = GoodsExtractor::new().extract(&Lines::new("84253100\nPX"));
        assert_eq!(items[0].packages[0].count, None);
        assert_eq!(items[0].gross_mass, None);
        assert_eq!(items[0].description, None);
    }
}

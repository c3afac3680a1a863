//! Rule-based declaration parser.

use std::ops::Range;
use std::time::Instant;

use tracing::{debug, info};

use crate::models::declaration::*;

use super::layout::Lines;
use super::rules::{
    dates::declaration_date,
    format::{detect_format, DeclarationFormat},
    goods::GoodsExtractor,
    mass::extract_total_gross_mass,
    patterns::*,
    seals::extract_seals,
    tin::TinExtractor,
    FieldExtractor,
};
use super::{validate, Result};

/// Lines scanned for the exporter when no label is printed.
const EXPORTER_FALLBACK_LINES: usize = 20;
/// Lines after a party label that may belong to the party block.
const PARTY_BLOCK_LINES: usize = 8;

/// Result of declaration extraction from one text.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Extracted (possibly partial) declaration.
    pub declaration: Declaration,
    /// Fields recovered with an invalid format.
    pub issues: Vec<FieldIssue>,
    /// Detected declaration layout.
    pub format: DeclarationFormat,
    /// Extraction warnings.
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Trait for declaration parsing.
pub trait DeclarationParser {
    /// Parse a declaration from recognized text.
    fn parse(&self, text: &str) -> Result<ExtractionResult>;
}

/// Pattern-based parser for ECD declarations.
pub struct EcdParser {
    /// Digits expected after the TIN country prefix.
    tin_digits: usize,
    /// Lines after the data-section start scanned for header fields.
    header_window: usize,
}

#[derive(Debug, Default)]
struct PartyFields {
    name: Option<String>,
    tin: Option<String>,
    street_and_number: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    country: Option<String>,
}

impl From<PartyFields> for Exporter {
    fn from(p: PartyFields) -> Self {
        Self {
            name: p.name,
            tin: p.tin,
            street_and_number: p.street_and_number,
            postal_code: p.postal_code,
            city: p.city,
            country: p.country,
        }
    }
}

impl From<PartyFields> for Consignee {
    fn from(p: PartyFields) -> Self {
        Self {
            name: p.name,
            tin: p.tin,
            street_and_number: p.street_and_number,
            postal_code: p.postal_code,
            city: p.city,
            country: p.country,
        }
    }
}

impl EcdParser {
    /// Create a new parser with default settings.
    pub fn new() -> Self {
        Self {
            tin_digits: 13,
            header_window: 50,
        }
    }

    /// Set the TIN digit count.
    pub fn with_tin_digits(mut self, digits: usize) -> Self {
        self.tin_digits = digits;
        self
    }

    /// Set the header search window.
    pub fn with_header_window(mut self, lines: usize) -> Self {
        self.header_window = lines;
        self
    }

    fn extract_header(&self, text: &str, lines: &Lines<'_>, window: Range<usize>) -> Header {
        let mut header = Header {
            total_gross_mass: extract_total_gross_mass(lines),
            declaration_date: declaration_date(text).map(|d| d.normalized()),
            ..Default::default()
        };

        // Vehicle plates, nationality on the following line
        for i in window.clone() {
            let line = lines.get(i);
            if let Some(caps) = VEHICLE_ID.captures(line) {
                header.transport_identity = Some(caps[1].to_string());
                header.transport_nationality = lines
                    .next_nonempty(i, 3)
                    .filter(|(_, next)| COUNTRY_CODE.is_match(next))
                    .map(|(_, next)| next.to_string());
                break;
            }
        }

        // Mode of transport: a lone digit after a code or before a currency.
        // The last candidate is usually the border mode.
        header.transport_mode = window
            .clone()
            .filter(|&i| SINGLE_DIGIT.is_match(lines.get(i)))
            .filter(|&i| {
                let prev = if i == 0 { "" } else { lines.get(i - 1) };
                let next = lines.get(i + 1);
                SHORT_CODE.is_match(prev) || next.contains("EUR") || next.contains("USD")
            })
            .last()
            .map(|i| lines.get(i).to_string());

        header.dispatch_country = window.clone().find_map(|i| {
            let line = lines.get(i);
            if !DISPATCH_COUNTRY_NAMES.iter().any(|n| line.contains(n)) {
                return None;
            }
            lines
                .next_nonempty(i, 3)
                .filter(|(_, next)| COUNTRY_CODE.is_match(next))
                .map(|(_, next)| next.to_string())
        });

        header.destination_country = window.clone().find_map(|i| {
            let line = lines.get(i);
            if !DESTINATION_COUNTRY_NAMES.iter().any(|n| line.contains(n)) {
                return None;
            }
            (i + 1..(i + 5).min(lines.len()))
                .map(|j| lines.get(j))
                .find(|code| COUNTRY_CODE.is_match(code) && *code != "MK")
                .map(str::to_string)
        });

        header.container_indicator = window.clone().find_map(|i| {
            let line = lines.get(i);
            if line != "0" && line != "1" {
                return None;
            }
            lines
                .next_nonempty(i, 3)
                .filter(|(_, next)| DELIVERY_TERMS.contains(next))
                .map(|_| line.to_string())
        });

        header.declaration_place = window.clone().find_map(|i| {
            let code = lines.get(i);
            if !OFFICE_CODE.is_match(code) {
                return None;
            }
            lines
                .next_nonempty(i, 2)
                .filter(|(_, name)| {
                    name.chars().count() > 3 && !name.chars().all(|c| c.is_ascii_digit())
                })
                .map(|(_, name)| format!("{} {}", code, name))
        });

        header
    }

    fn extract_exporter(&self, lines: &Lines<'_>, data_start: usize) -> Exporter {
        if let Some(block) = label_block(lines, &EXPORTER_LABEL) {
            let party = self.party_from_block(lines, block);
            if party.tin.is_some() || party.name.is_some() {
                return party.into();
            }
        }

        // No label: TIN line, then name, then street
        let end = (data_start + EXPORTER_FALLBACK_LINES).min(lines.len());
        let Some(tin_line) = (data_start..end).find(|&i| TIN_LINE.is_match(lines.get(i))) else {
            return Exporter::default();
        };

        let tin = lines.get(tin_line).to_string();
        let mut party = PartyFields {
            country: Some(tin[..2].to_string()),
            tin: Some(tin),
            ..Default::default()
        };

        if let Some((name_line, name)) = lines.next_nonempty(tin_line, 2) {
            party.name = Some(name.to_string());
            if let Some((_, street)) = lines
                .next_nonempty(name_line, 2)
                .filter(|(_, l)| STREET_MARKER.is_match(l))
            {
                party.street_and_number = Some(street.to_string());
                party.city = city_after_comma(street);
            }
        }

        party.into()
    }

    fn extract_consignee(&self, lines: &Lines<'_>, data_start: usize) -> Consignee {
        if let Some(block) = label_block(lines, &CONSIGNEE_LABEL) {
            let party = self.party_from_block(lines, block);
            if party.tin.is_some() || party.name.is_some() {
                return party.into();
            }
        }

        // No label: reference number, company name, address, country
        let start = data_start + 5;
        let end = (data_start + EXPORTER_FALLBACK_LINES).min(lines.len());
        for i in start..end {
            if !REFERENCE_NUMBER.is_match(lines.get(i)) {
                continue;
            }

            for j in i + 1..(i + 6).min(lines.len()) {
                let candidate = lines.get(j);
                if !looks_like_company(candidate) {
                    continue;
                }

                let mut party = PartyFields {
                    name: Some(candidate.to_string()),
                    ..Default::default()
                };

                if let Some((addr_line, addr)) = lines.next_nonempty(j, 3).filter(|(_, a)| {
                    a.chars().count() > 15 || a.chars().filter(|c| c.is_ascii_digit()).count() >= 5
                }) {
                    party.street_and_number = Some(addr.to_string());
                    if let Some(caps) = POSTAL_CITY.captures(addr) {
                        party.postal_code = Some(caps[1].to_string());
                        party.city = Some(caps[2].trim().to_string());
                    }
                    party.country = lines
                        .next_nonempty(addr_line, 3)
                        .filter(|(_, c)| COUNTRY_CODE.is_match(c) && *c != "MK")
                        .map(|(_, c)| c.to_string());
                }

                return party.into();
            }
        }

        Consignee::default()
    }

    fn party_from_block(&self, lines: &Lines<'_>, block: Range<usize>) -> PartyFields {
        let tin_extractor = TinExtractor::new().with_digits(self.tin_digits);
        let block_lines: Vec<&str> = block
            .map(|i| lines.get(i))
            .filter(|l| !l.is_empty() && !BOX_MARKERS.contains(l))
            .collect();

        let mut party = PartyFields {
            tin: block_lines
                .iter()
                .find_map(|l| tin_extractor.extract(l))
                .map(|m| m.value),
            ..Default::default()
        };

        let mut used = Vec::new();

        if let Some(street) = block_lines.iter().find(|l| STREET_MARKER.is_match(l)) {
            party.street_and_number = Some(street.to_string());
            used.push(*street);
        }

        if let Some((line, caps)) = block_lines
            .iter()
            .find_map(|l| POSTAL_CITY.captures(l).map(|c| (*l, c)))
        {
            party.postal_code = Some(caps[1].to_string());
            party.city = Some(caps[2].trim().to_string());
            used.push(line);
        } else if let Some(street) = &party.street_and_number {
            party.city = city_after_comma(street);
        }

        party.name = block_lines
            .iter()
            .find(|l| {
                !used.contains(*l)
                    && !TIN_TOKEN.is_match(l)
                    && !COUNTRY_CODE.is_match(l)
                    && !l.starts_with(|c: char| c.is_ascii_digit())
                    && l.chars().count() > 2
            })
            .map(|l| l.to_string());

        if party.street_and_number.is_none() {
            // An address without a street marker still carries a number.
            party.street_and_number = block_lines
                .iter()
                .find(|l| {
                    !used.contains(*l)
                        && party.name.as_deref() != Some(**l)
                        && !TIN_TOKEN.is_match(l)
                        && l.chars().any(|c| c.is_ascii_digit())
                        && l.chars().any(char::is_alphabetic)
                })
                .map(|l| l.to_string());
        }

        party.country = block_lines
            .iter()
            .find(|l| COUNTRY_CODE.is_match(l))
            .map(|l| l.to_string())
            .or_else(|| party.tin.as_ref().map(|t| t.chars().take(2).collect()));

        party
    }
}

impl Default for EcdParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationParser for EcdParser {
    fn parse(&self, text: &str) -> Result<ExtractionResult> {
        let start = Instant::now();
        let mut warnings = Vec::new();

        info!("Parsing declaration from {} characters of text", text.len());

        let lines = Lines::new(text);
        let format = detect_format(text);
        let data_start = lines.data_section_start();
        let window = data_start..(data_start + self.header_window).min(lines.len());
        debug!("Data section starts at line {} ({} format)", data_start, format);

        let header = self.extract_header(text, &lines, window);
        if header.declaration_date.is_none() {
            warnings.push("Could not extract declaration date".to_string());
        }

        let exporter = self.extract_exporter(&lines, data_start);
        if exporter.tin.is_none() {
            warnings.push("Could not extract exporter TIN".to_string());
        }

        let consignee = self.extract_consignee(&lines, data_start);
        let seals = extract_seals(&lines);

        let goods = GoodsExtractor::new().extract(&lines);
        if goods.is_empty() {
            warnings.push("Could not extract goods items".to_string());
        }

        let declaration = Declaration {
            header,
            exporter,
            consignee,
            seals,
            goods,
        };

        let issues = validate(&declaration, self.tin_digits);
        for issue in &issues {
            warnings.push(format!("Invalid {}: {}", issue.field, issue.reason));
        }

        debug!(
            "Extracted {} goods items with {} issues",
            declaration.goods.len(),
            issues.len()
        );

        Ok(ExtractionResult {
            declaration,
            issues,
            format,
            warnings,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Lines after a label, up to the next section label.
fn label_block(lines: &Lines<'_>, label: &regex::Regex) -> Option<Range<usize>> {
    let (label_line, _) = lines.iter().find(|(_, l)| label.is_match(l))?;
    let start = label_line + 1;
    let limit = (start + PARTY_BLOCK_LINES).min(lines.len());
    let end = (start..limit)
        .find(|&i| SECTION_LABEL.is_match(lines.get(i)))
        .unwrap_or(limit);
    Some(start..end)
}

fn city_after_comma(street: &str) -> Option<String> {
    street
        .rsplit_once(',')
        .map(|(_, city)| city.trim().to_string())
        .filter(|city| !city.is_empty())
}

fn looks_like_company(line: &str) -> bool {
    if line.chars().count() <= 10 {
        return false;
    }
    let has_letters = line.chars().any(char::is_alphabetic);
    let all_upper = has_letters && !line.chars().any(char::is_lowercase);
    let company_marker = ["Цие", "ЦИЕ", "Ltd", "GmbH", "SA", "SRL"]
        .iter()
        .any(|m| line.contains(m));
    line.contains('&') || all_upper || company_marker
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const UNLABELED: &str = "\
ЕДИНСТВЕН ДОКУМЕНТ
LRN : 24MK000000123
EXMK
MK4030996123456
ДРУШТВО ЗА ТРГОВИЈА ПРИМЕР ДООЕЛ
ул. Партизанска 10, Скопје
а
123456
LA MAISON & CIE SARL
12 RUE DE LA PAIX 75002 PARIS
FR
СЕВЕРНА МАКЕДОНИЈА
MK
ФРАНЦИЈА
FR
SK1234AB/SK5678CD
MK
1
CPT
3
EUR
2031
ТАБАНОВЦЕ-ПАТН.
Датум
15/03/2024
Палета
Витло на електричен погон сер.бр.6444.-1 ком.,
84253100
7
PX
635.000
635.000
KGM
5010(011/2022); 5016(0002826);";

    const LABELED: &str = "\
2 Испраќач/Извозник
MK4030996123456
ПРИМЕР ДООЕЛ
бул. Илинденска 5, Тетово
1200 Тетово
MK
8 Примач
RS1234567890123
ALFA DOO
Bulevar 7
11000 Beograd
RS
Пломби: 1
AB1234";

    #[test]
    fn test_parse_unlabeled_declaration() {
        let result = EcdParser::new().parse(UNLABELED).unwrap();
        let d = &result.declaration;

        assert_eq!(result.format, DeclarationFormat::Standard);
        assert!(result.issues.is_empty());

        assert_eq!(d.header.total_gross_mass, Some(Decimal::from_str("635").unwrap()));
        assert_eq!(d.header.transport_identity.as_deref(), Some("SK1234AB/SK5678CD"));
        assert_eq!(d.header.transport_nationality.as_deref(), Some("MK"));
        assert_eq!(d.header.transport_mode.as_deref(), Some("3"));
        assert_eq!(d.header.dispatch_country.as_deref(), Some("MK"));
        assert_eq!(d.header.destination_country.as_deref(), Some("FR"));
        assert_eq!(d.header.container_indicator.as_deref(), Some("1"));
        assert_eq!(d.header.declaration_place.as_deref(), Some("2031 ТАБАНОВЦЕ-ПАТН."));
        assert_eq!(d.header.declaration_date.as_deref(), Some("2024-03-15"));

        assert_eq!(d.exporter.tin.as_deref(), Some("MK4030996123456"));
        assert_eq!(d.exporter.name.as_deref(), Some("ДРУШТВО ЗА ТРГОВИЈА ПРИМЕР ДООЕЛ"));
        assert_eq!(d.exporter.street_and_number.as_deref(), Some("ул. Партизанска 10, Скопје"));
        assert_eq!(d.exporter.city.as_deref(), Some("Скопје"));
        assert_eq!(d.exporter.country.as_deref(), Some("MK"));
        assert_eq!(d.exporter.postal_code, None);

        assert_eq!(d.consignee.name.as_deref(), Some("LA MAISON & CIE SARL"));
        assert_eq!(d.consignee.postal_code.as_deref(), Some("75002"));
        assert_eq!(d.consignee.city.as_deref(), Some("PARIS"));
        assert_eq!(d.consignee.country.as_deref(), Some("FR"));

        assert_eq!(d.goods.len(), 1);
        assert_eq!(d.goods[0].commodity_code.code.as_deref(), Some("84253100"));
        assert_eq!(d.goods[0].documents.len(), 2);
        assert_eq!(d.seals.count, None);
    }

    #[test]
    fn test_parse_labeled_parties() {
        let result = EcdParser::new().parse(LABELED).unwrap();
        let d = &result.declaration;

        assert_eq!(d.exporter.tin.as_deref(), Some("MK4030996123456"));
        assert_eq!(d.exporter.name.as_deref(), Some("ПРИМЕР ДООЕЛ"));
        assert_eq!(d.exporter.street_and_number.as_deref(), Some("бул. Илинденска 5, Тетово"));
        assert_eq!(d.exporter.postal_code.as_deref(), Some("1200"));
        assert_eq!(d.exporter.city.as_deref(), Some("Тетово"));
        assert_eq!(d.exporter.country.as_deref(), Some("MK"));

        assert_eq!(d.consignee.tin.as_deref(), Some("RS1234567890123"));
        assert_eq!(d.consignee.name.as_deref(), Some("ALFA DOO"));
        assert_eq!(d.consignee.street_and_number.as_deref(), Some("Bulevar 7"));
        assert_eq!(d.consignee.postal_code.as_deref(), Some("11000"));
        assert_eq!(d.consignee.city.as_deref(), Some("Beograd"));
        assert_eq!(d.consignee.country.as_deref(), Some("RS"));

        assert_eq!(d.seals.count, Some(1));
        assert_eq!(d.seals.ids[0].id, "AB1234");
    }

    #[test]
    fn test_malformed_tin_is_kept_and_flagged() {
        let text = "2 Испраќач/Извозник\nMK403099612345\nПРИМЕР ДООЕЛ";
        let result = EcdParser::new().parse(text).unwrap();
        assert_eq!(result.declaration.exporter.tin.as_deref(), Some("MK403099612345"));
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].field, "TRAEXPEX1.TINEX159");
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let result = EcdParser::new().parse("ТЕКСТ БЕЗ ПОДАТОЦИ").unwrap();
        assert_eq!(result.declaration, Declaration::default());
        assert_eq!(result.format, DeclarationFormat::Unknown);
        assert!(result.warnings.iter().any(|w| w.contains("declaration date")));
    }
}

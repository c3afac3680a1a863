//! Declaration field extraction module.

pub mod compare;
pub mod layout;
mod parser;
pub mod rules;

pub use compare::{compare, ComparisonReport, Difference};
pub use parser::{DeclarationParser, EcdParser, ExtractionResult};

use crate::error::ExtractionError;
use crate::models::declaration::{Declaration, FieldIssue};

use rules::{validate_iso_date, validate_tin};

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Format-check the fixed-format fields of a declaration.
///
/// Values are never dropped; each failing value yields one issue.
pub fn validate(declaration: &Declaration, tin_digits: usize) -> Vec<FieldIssue> {
    let mut issues = Vec::new();

    let tins = [
        ("TRAEXPEX1.TINEX159", &declaration.exporter.tin),
        ("TRACONCE1.TINCE159", &declaration.consignee.tin),
    ];
    for (field, tin) in tins {
        if let Some(tin) = tin {
            if let Err(reason) = validate_tin(tin, tin_digits) {
                issues.push(FieldIssue::new(field, tin.as_str(), reason));
            }
        }
    }

    if let Some(date) = &declaration.header.declaration_date {
        if let Err(reason) = validate_iso_date(date) {
            issues.push(FieldIssue::new("HEAHEA.DecDatHEA383", date.as_str(), reason));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_flags_each_bad_field() {
        let mut declaration = Declaration::default();
        declaration.exporter.tin = Some("MK4030996123456".to_string());
        declaration.consignee.tin = Some("FR12345".to_string());
        declaration.header.declaration_date = Some("31/02/2024".to_string());

        let issues = validate(&declaration, 13);
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["TRACONCE1.TINCE159", "HEAHEA.DecDatHEA383"]);
        assert_eq!(issues[0].value, "FR12345");
    }

    #[test]
    fn test_validate_empty_declaration() {
        assert!(validate(&Declaration::default(), 13).is_empty());
    }
}

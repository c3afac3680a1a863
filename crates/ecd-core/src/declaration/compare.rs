//! Field-by-field comparison against an expected declaration record.

use serde::Serialize;
use serde_json::Value;

/// A single mismatch between extracted and expected values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Difference {
    /// The expected key is missing from the extracted record.
    Missing { path: String },
    /// Lists differ in length.
    Length {
        path: String,
        actual: usize,
        expected: usize,
    },
    /// Leaf values differ.
    Value {
        path: String,
        actual: Value,
        expected: Value,
    },
}

impl std::fmt::Display for Difference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difference::Missing { path } => write!(f, "{}: missing", path),
            Difference::Length {
                path,
                actual,
                expected,
            } => write!(f, "{}: {} items, expected {}", path, actual, expected),
            Difference::Value {
                path,
                actual,
                expected,
            } => write!(f, "{}: {} != expected {}", path, actual, expected),
        }
    }
}

/// Outcome of comparing two records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonReport {
    /// Paths whose leaf values matched.
    pub matches: Vec<String>,
    pub differences: Vec<Difference>,
}

impl ComparisonReport {
    pub fn is_match(&self) -> bool {
        self.differences.is_empty()
    }

    /// Number of checked leaves (matched plus differing).
    pub fn total(&self) -> usize {
        self.matches.len() + self.differences.len()
    }
}

/// Compare `actual` against `expected`.
///
/// Only keys present in `expected` are checked. Lists are compared
/// pairwise up to the shorter length; a length mismatch is reported once.
/// Numbers compare by value, so `635` matches `635.0`.
pub fn compare(actual: &Value, expected: &Value) -> ComparisonReport {
    let mut report = ComparisonReport::default();
    walk("", actual, expected, &mut report);
    report
}

fn walk(path: &str, actual: &Value, expected: &Value, report: &mut ComparisonReport) {
    match expected {
        Value::Object(fields) => {
            for (key, expected_value) in fields {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                match actual.get(key) {
                    Some(actual_value) => walk(&child, actual_value, expected_value, report),
                    None => report.differences.push(Difference::Missing { path: child }),
                }
            }
        }
        Value::Array(expected_items) => {
            let actual_items = actual.as_array().map(Vec::as_slice).unwrap_or(&[]);
            if actual_items.len() != expected_items.len() {
                report.differences.push(Difference::Length {
                    path: path.to_string(),
                    actual: actual_items.len(),
                    expected: expected_items.len(),
                });
            }
            for (i, (a, e)) in actual_items.iter().zip(expected_items).enumerate() {
                walk(&format!("{}[{}]", path, i), a, e, report);
            }
        }
        leaf => {
            if leaf_eq(actual, leaf) {
                report.matches.push(path.to_string());
            } else {
                report.differences.push(Difference::Value {
                    path: path.to_string(),
                    actual: actual.clone(),
                    expected: leaf.clone(),
                });
            }
        }
    }
}

fn leaf_eq(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(e)) => a == e,
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_identical_records_match() {
        let record = json!({"HEAHEA": {"TotGroMasHEA307": 635, "DecDatHEA383": null}});
        let report = compare(&record, &record);
        assert!(report.is_match());
        assert_eq!(report.total(), 2);
    }

    #[test]
    fn test_numbers_compare_by_value() {
        let report = compare(&json!({"m": 635.0}), &json!({"m": 635}));
        assert!(report.is_match());
    }

    #[test]
    fn test_reports_missing_length_and_value() {
        let actual = json!({
            "HEAHEA": {"CouOfDesCodHEA30": "DE"},
            "GOOITEGDS": [{"IteNumGDS7": "1"}]
        });
        let expected = json!({
            "HEAHEA": {"CouOfDesCodHEA30": "FR", "ConIndHEA96": "1"},
            "GOOITEGDS": [{"IteNumGDS7": "1"}, {"IteNumGDS7": "2"}]
        });

        let report = compare(&actual, &expected);
        assert_eq!(report.matches, vec!["GOOITEGDS[0].IteNumGDS7".to_string()]);
        assert!(report.differences.contains(&Difference::Missing {
            path: "HEAHEA.ConIndHEA96".to_string()
        }));
        assert!(report.differences.contains(&Difference::Length {
            path: "GOOITEGDS".to_string(),
            actual: 1,
            expected: 2,
        }));
        assert!(report.differences.contains(&Difference::Value {
            path: "HEAHEA.CouOfDesCodHEA30".to_string(),
            actual: json!("DE"),
            expected: json!("FR"),
        }));
        assert_eq!(report.differences.len(), 3);
    }
}

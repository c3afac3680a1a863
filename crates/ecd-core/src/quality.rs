//! Extraction confidence reporting.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::declaration::{Declaration, FieldIssue};

/// Confidence summary attached to every document result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    /// Characters of recognized text behind the extraction.
    pub character_count: usize,
    /// Presence flag per required field path.
    pub fields: BTreeMap<String, bool>,
    /// Paths of fields whose value failed its format check.
    pub invalid_fields: Vec<String>,
    /// 1-based numbers of pages that produced no text.
    pub failed_pages: Vec<usize>,
    /// Share of required fields present, in `[0, 1]`.
    pub score: f32,
}

/// Builds confidence reports.
#[derive(Debug, Clone)]
pub struct QualityEvaluator {
    required: Vec<String>,
}

impl QualityEvaluator {
    /// Required fields are dotted schema paths, e.g. `HEAHEA.DecDatHEA383`.
    /// A path naming a list (`GOOITEGDS`) requires at least one element.
    /// Duplicate paths are dropped, keeping the first occurrence.
    pub fn new(required: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let required = required
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .collect();
        Self { required }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn evaluate(
        &self,
        declaration: &Declaration,
        issues: &[FieldIssue],
        character_count: usize,
        failed_pages: Vec<usize>,
    ) -> ConfidenceReport {
        let record = serde_json::to_value(declaration).unwrap_or(Value::Null);

        let fields: BTreeMap<String, bool> = self
            .required
            .iter()
            .map(|path| {
                let flagged = issues.iter().any(|i| &i.field == path);
                (path.clone(), !flagged && is_present(lookup(&record, path)))
            })
            .collect();

        let present = fields.values().filter(|p| **p).count();
        let score = if self.required.is_empty() {
            1.0
        } else {
            present as f32 / self.required.len() as f32
        };

        ConfidenceReport {
            character_count,
            fields,
            invalid_fields: issues.iter().map(|i| i.field.clone()).collect(),
            failed_pages,
            score,
        }
    }
}

fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |value, key| value.get(key))
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => fields.values().any(|v| is_present(Some(v))),
        Some(_) => true,
    }
}

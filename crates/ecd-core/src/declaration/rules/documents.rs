//! Previous document references (`TYPE(reference)`).

use super::patterns::{DOCUMENT_TYPES, PREVIOUS_DOCUMENT};
use crate::declaration::layout::Lines;
use crate::models::declaration::PreviousDocument;

/// A previous document reference and the line it was printed on.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMatch {
    pub line: usize,
    pub document: PreviousDocument,
}

/// Every known-type document reference in line order.
pub fn extract_previous_documents(lines: &Lines<'_>) -> Vec<DocumentMatch> {
    let mut found = Vec::new();
    for (i, line) in lines.iter() {
        for caps in PREVIOUS_DOCUMENT.captures_iter(line) {
            let doc_type = &caps[1];
            if !DOCUMENT_TYPES.contains(&doc_type) {
                continue;
            }
            found.push(DocumentMatch {
                line: i,
                document: PreviousDocument {
                    doc_type: doc_type.to_string(),
                    reference: caps[2].trim().to_string(),
                },
            });
        }
    }
    found
}

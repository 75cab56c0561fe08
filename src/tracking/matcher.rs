//! Document matcher
//!
//! Matches a classifier type code to one outstanding checklist entry.
//! Three strategies, first hit wins, all case-insensitive:
//!
//! 1. exact or prefix match of the canonical label against the entry name
//! 2. contains match in either direction, only for labels of 3+ chars
//!    (keeps "ID" from matching inside "Dividend Statement")
//! 3. alias substrings expected inside the entry name
//!
//! An already-received document has left the missing list, so re-delivery
//! naturally finds nothing - a no-op, not an error.

use crate::doctypes::doc_type_info;

use super::state::MissingDocEntry;

/// Minimum label length for a contains match
const CONTAINS_MIN_LABEL_LEN: usize = 3;

/// Find the outstanding checklist entry a document type satisfies.
/// `None` for the generic/unknown type or when nothing matches.
pub fn find_matching_checklist_doc<'a>(
    type_code: &str,
    missing: &'a [MissingDocEntry],
) -> Option<&'a MissingDocEntry> {
    let info = doc_type_info(type_code)?;
    let label = info.label.to_lowercase();

    // 1. Exact or prefix
    for entry in missing {
        let name = entry.name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        if name == label || name.starts_with(&label) {
            return Some(entry);
        }
    }

    // 2. Contains, either direction, guarded against short labels
    if label.len() >= CONTAINS_MIN_LABEL_LEN {
        for entry in missing {
            let name = entry.name.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            if name.contains(&label) || label.contains(&name) {
                return Some(entry);
            }
        }
    }

    // 3. Aliases
    for entry in missing {
        let name = entry.name.trim().to_lowercase();
        if info.aliases.iter().any(|alias| name.contains(alias)) {
            return Some(entry);
        }
    }

    None
}

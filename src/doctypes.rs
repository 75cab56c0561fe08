//! Document type registry
//!
//! Maps classifier type codes to their canonical display label, matching
//! aliases, and deal scope. Scope drives resolver fan-out: reusable types
//! (income documents) apply to every open deal for the borrower, while
//! property-specific types must resolve to exactly one deal.

use serde::{Deserialize, Serialize};

/// Type code the classifier emits when it cannot identify a document.
/// Never matched against the checklist.
pub const GENERIC_TYPE: &str = "other";

/// Deal scope of a document type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocScope {
    /// Valid across all open deals for the same borrower
    Reusable,
    /// Tied to a single property / application
    PropertySpecific,
}

/// Registry entry for one document type code
#[derive(Debug, Clone, Copy)]
pub struct DocTypeInfo {
    pub code: &'static str,
    /// Canonical display label, matched against checklist entry names
    pub label: &'static str,
    pub scope: DocScope,
    /// Lowercase substrings expected inside a matching checklist entry name
    pub aliases: &'static [&'static str],
}

impl DocTypeInfo {
    pub fn is_property_specific(&self) -> bool {
        self.scope == DocScope::PropertySpecific
    }
}

/// Known document type codes.
///
/// Labels are the wording the checklist rules engine writes into entry
/// names; aliases cover the colloquial variants seen in older checklists.
/// Keep alias substrings specific - short fragments match too eagerly.
const DOC_TYPES: &[DocTypeInfo] = &[
    DocTypeInfo {
        code: "t4",
        label: "T4",
        scope: DocScope::Reusable,
        aliases: &[],
    },
    DocTypeInfo {
        code: "t4a",
        label: "T4A",
        scope: DocScope::Reusable,
        aliases: &[],
    },
    DocTypeInfo {
        code: "t1",
        label: "T1 General",
        scope: DocScope::Reusable,
        aliases: &["t1 general"],
    },
    DocTypeInfo {
        code: "noa",
        label: "Notice of Assessment",
        scope: DocScope::Reusable,
        aliases: &["noa"],
    },
    DocTypeInfo {
        code: "pay_stub",
        label: "Paystub",
        scope: DocScope::Reusable,
        aliases: &["paystub", "pay stub"],
    },
    DocTypeInfo {
        code: "loe",
        label: "Letter of Employment",
        scope: DocScope::Reusable,
        aliases: &["letter of employment", "employment letter"],
    },
    DocTypeInfo {
        code: "bank_statement",
        label: "Bank Statement",
        scope: DocScope::Reusable,
        aliases: &["bank statement"],
    },
    DocTypeInfo {
        code: "mortgage_statement",
        label: "Mortgage Statement",
        scope: DocScope::Reusable,
        aliases: &["mortgage statement"],
    },
    DocTypeInfo {
        code: "credit_report",
        label: "Credit Report",
        scope: DocScope::Reusable,
        aliases: &["credit bureau"],
    },
    DocTypeInfo {
        code: "gift_letter",
        label: "Gift Letter",
        scope: DocScope::Reusable,
        aliases: &["gift letter"],
    },
    DocTypeInfo {
        code: "void_cheque",
        label: "Void Cheque",
        scope: DocScope::Reusable,
        aliases: &["void cheque", "direct deposit"],
    },
    DocTypeInfo {
        code: "photo_id",
        label: "Photo ID",
        scope: DocScope::Reusable,
        aliases: &["driver's licence", "passport"],
    },
    // Two-letter label: exact/prefix and alias matching only (see matcher)
    DocTypeInfo {
        code: "id",
        label: "ID",
        scope: DocScope::Reusable,
        aliases: &[],
    },
    DocTypeInfo {
        code: "purchase_agreement",
        label: "Purchase Agreement",
        scope: DocScope::PropertySpecific,
        aliases: &["agreement of purchase and sale"],
    },
    DocTypeInfo {
        code: "mls_listing",
        label: "MLS Listing",
        scope: DocScope::PropertySpecific,
        aliases: &["mls"],
    },
    DocTypeInfo {
        code: "appraisal",
        label: "Appraisal",
        scope: DocScope::PropertySpecific,
        aliases: &[],
    },
    DocTypeInfo {
        code: "property_tax",
        label: "Property Tax Bill",
        scope: DocScope::PropertySpecific,
        aliases: &["property tax"],
    },
];

/// Look up a type code. Returns `None` for the generic type and for codes
/// the registry does not know - both mean "nothing to match".
pub fn doc_type_info(code: &str) -> Option<&'static DocTypeInfo> {
    if code.trim().eq_ignore_ascii_case(GENERIC_TYPE) {
        return None;
    }
    DOC_TYPES
        .iter()
        .find(|t| t.code.eq_ignore_ascii_case(code.trim()))
}

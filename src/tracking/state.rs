//! In-memory tracking state
//!
//! One `TrackingState` per tracking target (deal, or the borrower record
//! when no deal exists). State is decoded fresh at the start of each event,
//! mutated in memory, written back once, and discarded.

use serde::{Deserialize, Serialize};

use super::status::{compute_doc_status, DocStatus};

/// Checklist stage tag.
///
/// PRE and FULL entries drive the readiness counters; LATER and
/// CONDITIONAL entries move off the missing list without touching them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocStage {
    Pre,
    Full,
    Later,
    Conditional,
}

impl DocStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStage::Pre => "PRE",
            DocStage::Full => "FULL",
            DocStage::Later => "LATER",
            DocStage::Conditional => "CONDITIONAL",
        }
    }

    /// Strict parse of a stage tag (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRE" => Some(DocStage::Pre),
            "FULL" => Some(DocStage::Full),
            "LATER" => Some(DocStage::Later),
            "CONDITIONAL" => Some(DocStage::Conditional),
            _ => None,
        }
    }

    /// Lenient parse: anything unrecognized defaults to PRE
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or(DocStage::Pre)
    }
}

impl std::fmt::Display for DocStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outstanding checklist requirement. Unique by name within one
/// tracking state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDocEntry {
    pub name: String,
    pub stage: DocStage,
}

impl MissingDocEntry {
    pub fn new(name: impl Into<String>, stage: DocStage) -> Self {
        Self {
            name: name.into(),
            stage,
        }
    }

    /// Render as the `"Name [STAGE]"` line used by the deal encoding
    pub fn to_line(&self) -> String {
        format!("{} [{}]", self.name, self.stage.as_str())
    }

    /// Parse a `"Name [STAGE]"` line. A missing or unrecognized stage
    /// suffix leaves the whole line as the name, stage defaulting to PRE.
    pub fn from_line(line: &str) -> Self {
        let line = line.trim();
        if let Some(idx) = line.rfind(" [") {
            if let Some(tag) = line[idx + 2..].strip_suffix(']') {
                if let Some(stage) = DocStage::parse(tag) {
                    return Self::new(line[..idx].trim_end(), stage);
                }
            }
        }
        Self::new(line, DocStage::Pre)
    }
}

/// Tracking state of one target record
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingState {
    pub missing_docs: Vec<MissingDocEntry>,
    /// Display names only - stage is discarded once a document arrives
    pub received_docs: Vec<String>,
    pub pre_docs_total: u32,
    pub pre_docs_received: u32,
    pub full_docs_total: u32,
    pub full_docs_received: u32,
    pub doc_status: DocStatus,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            missing_docs: Vec::new(),
            received_docs: Vec::new(),
            pre_docs_total: 0,
            pre_docs_received: 0,
            full_docs_total: 0,
            full_docs_received: 0,
            doc_status: DocStatus::NotStarted,
        }
    }
}

impl TrackingState {
    /// Move a checklist entry from missing to received and update counters.
    ///
    /// PRE/FULL entries bump their counter (capped at the total, counters
    /// never decrease); LATER/CONDITIONAL entries only change membership.
    /// Status is recomputed. Returns the removed entry, or `None` if no
    /// entry with that name is outstanding.
    pub fn mark_received(&mut self, name: &str) -> Option<MissingDocEntry> {
        let idx = self
            .missing_docs
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))?;
        let entry = self.missing_docs.remove(idx);
        self.received_docs.push(entry.name.clone());
        match entry.stage {
            DocStage::Pre => {
                self.pre_docs_received = (self.pre_docs_received + 1).min(self.pre_docs_total);
            }
            DocStage::Full => {
                self.full_docs_received = (self.full_docs_received + 1).min(self.full_docs_total);
            }
            DocStage::Later | DocStage::Conditional => {}
        }
        self.doc_status = compute_doc_status(
            self.pre_docs_total,
            self.pre_docs_received,
            self.full_docs_total,
            self.full_docs_received,
        );
        Some(entry)
    }

    /// Whether a document with this name is outstanding
    pub fn is_missing(&self, name: &str) -> bool {
        self.missing_docs
            .iter()
            .any(|e| e.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TrackingState {
        TrackingState {
            missing_docs: vec![
                MissingDocEntry::new("T4", DocStage::Pre),
                MissingDocEntry::new("Notice of Assessment", DocStage::Full),
                MissingDocEntry::new("Void Cheque", DocStage::Later),
            ],
            pre_docs_total: 1,
            full_docs_total: 1,
            ..TrackingState::default()
        }
    }

    #[test]
    fn pre_entry_bumps_pre_counter() {
        let mut s = state();
        let entry = s.mark_received("t4").expect("outstanding");
        assert_eq!(entry.stage, DocStage::Pre);
        assert_eq!(s.pre_docs_received, 1);
        assert_eq!(s.full_docs_received, 0);
        assert!(!s.is_missing("T4"));
        assert_eq!(s.received_docs, vec!["T4".to_string()]);
        assert_eq!(s.doc_status, DocStatus::PreComplete);
    }

    #[test]
    fn later_entry_leaves_counters_untouched() {
        let mut s = state();
        s.mark_received("Void Cheque").expect("outstanding");
        assert_eq!(s.pre_docs_received, 0);
        assert_eq!(s.full_docs_received, 0);
        assert_eq!(s.doc_status, DocStatus::NotStarted);
    }

    #[test]
    fn counters_cap_at_totals() {
        // Legacy state can carry more PRE entries than the recorded total
        let mut s = state();
        s.missing_docs.push(MissingDocEntry::new("Paystub", DocStage::Pre));
        s.mark_received("T4");
        s.mark_received("Paystub");
        assert_eq!(s.pre_docs_received, 1);
    }

    #[test]
    fn unknown_name_is_a_no_op() {
        let mut s = state();
        assert!(s.mark_received("Appraisal").is_none());
        assert_eq!(s.missing_docs.len(), 3);
        assert!(s.received_docs.is_empty());
    }

    #[test]
    fn stage_line_round_trip() {
        let entry = MissingDocEntry::new("Letter of Employment", DocStage::Conditional);
        assert_eq!(entry.to_line(), "Letter of Employment [CONDITIONAL]");
        assert_eq!(MissingDocEntry::from_line(&entry.to_line()), entry);
    }

    #[test]
    fn line_without_stage_defaults_to_pre() {
        let entry = MissingDocEntry::from_line("Recent paystub");
        assert_eq!(entry.name, "Recent paystub");
        assert_eq!(entry.stage, DocStage::Pre);
    }

    #[test]
    fn unknown_stage_suffix_stays_in_name() {
        let entry = MissingDocEntry::from_line("Statement [draft]");
        assert_eq!(entry.name, "Statement [draft]");
        assert_eq!(entry.stage, DocStage::Pre);
    }
}

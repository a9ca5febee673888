//! Candidate lookup for the entry grid.
//!
//! A query matches a record when any of these hold (case-insensitive):
//! the subject id, accident id or manager name contains it, or the query is a
//! 4-digit number equal to the subject id's last four characters. Results keep
//! store order and list each record once.

use crate::types::{Record, LAST_FOUR_LEN};
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

/// Queries shorter than this, counted as typed, are too ambiguous to search.
pub const MIN_QUERY_CHARS: usize = 2;

fn plate_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{4}$").expect("plate suffix regex"))
}

fn accident_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{4}").expect("accident prefix regex"))
}

/// Whether `query` is long enough to run a search. Surrounding whitespace
/// counts toward the length; it is trimmed only when matching.
pub fn is_searchable(query: &str) -> bool {
    query.chars().count() >= MIN_QUERY_CHARS
}

pub fn search(records: &[Arc<Record>], query: &str) -> Vec<Arc<Record>> {
    if !is_searchable(query) {
        return Vec::new();
    }
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }
    let suffix_lookup = plate_suffix_re().is_match(&term);
    records
        .iter()
        .filter(|r| record_matches(r, &term, suffix_lookup))
        .cloned()
        .collect()
}

fn record_matches(record: &Record, term: &str, suffix_lookup: bool) -> bool {
    if suffix_lookup && record.subject_id_last_four() == term {
        return true;
    }
    record.subject_id().to_lowercase().contains(term)
        || record.accident_id.to_lowercase().contains(term)
        || record.manager_name.to_lowercase().contains(term)
}

/// What the operator appears to be typing; drives the input hint and how a
/// manual-entry draft is prefilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKind {
    Empty,
    PlateSuffix,
    AccidentNumber,
    Subject,
}

impl QueryKind {
    pub fn classify(query: &str) -> Self {
        let q = query.trim();
        if q.is_empty() {
            QueryKind::Empty
        } else if q.chars().count() == LAST_FOUR_LEN && plate_suffix_re().is_match(q) {
            QueryKind::PlateSuffix
        } else if q.contains('-') || accident_prefix_re().is_match(q) {
            QueryKind::AccidentNumber
        } else {
            QueryKind::Subject
        }
    }

    /// Whether text of this kind belongs in the accident-number field rather
    /// than the subject field.
    pub fn looks_like_accident_id(self) -> bool {
        matches!(self, QueryKind::PlateSuffix | QueryKind::AccidentNumber)
    }

    pub fn hint(self) -> &'static str {
        match self {
            QueryKind::Empty => "차량번호, 사고번호, 피해물 입력 (예: 9030, 2024-001, 자전거)",
            QueryKind::PlateSuffix => "차량번호 뒤 4자리로 검색 중...",
            QueryKind::AccidentNumber => "사고번호로 검색 중...",
            QueryKind::Subject => "피해물로 검색 중...",
        }
    }
}

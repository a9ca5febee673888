//! One line of the entry grid.
//!
//! A row moves between `Idle`, `Searching`, `Committed` and `ManualEntry`.
//! Every operation that does not apply to the current state is a no-op and
//! reports [`Transition::Ignored`]; nothing here returns an error.

use crate::search::{self, QueryKind};
use crate::store::RecordStore;
use crate::types::{ManualDraft, ManualField, Record, RecordFields};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Accident ids synthesized for manual entries that left the field blank.
pub const MANUAL_ID_PREFIX: &str = "MANUAL-";
/// Status written on manual entries that left the field blank.
pub const MANUAL_STATUS: &str = "수동입력";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(Uuid);

impl RowId {
    pub fn new() -> Self {
        RowId(Uuid::new_v4())
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row-{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowState {
    Idle,
    Searching {
        candidates: Vec<Arc<Record>>,
        /// `candidates.len()` highlights the manual-entry option.
        cursor: usize,
        list_visible: bool,
    },
    Committed {
        selection: Arc<Record>,
    },
    ManualEntry {
        draft: ManualDraft,
        /// State to go back to on cancel.
        resume: Box<RowState>,
    },
}

/// Tag of [`RowState`] without its payload, for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RowPhase {
    Idle,
    Searching,
    Committed,
    ManualEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CursorMove {
    Next,
    Previous,
}

/// Outcome of a row operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Ignored,
    Updated,
    Committed(Arc<Record>),
    ManualEntryStarted,
    ManualEntryCancelled,
}

impl Transition {
    pub fn changed(&self) -> bool {
        !matches!(self, Transition::Ignored)
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    id: RowId,
    query: String,
    state: RowState,
}

impl Default for Row {
    fn default() -> Self {
        Self::new()
    }
}

impl Row {
    pub fn new() -> Self {
        Row {
            id: RowId::new(),
            query: String::new(),
            state: RowState::Idle,
        }
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn state(&self) -> &RowState {
        &self.state
    }

    pub fn phase(&self) -> RowPhase {
        match self.state {
            RowState::Idle => RowPhase::Idle,
            RowState::Searching { .. } => RowPhase::Searching,
            RowState::Committed { .. } => RowPhase::Committed,
            RowState::ManualEntry { .. } => RowPhase::ManualEntry,
        }
    }

    pub fn candidates(&self) -> &[Arc<Record>] {
        match &self.state {
            RowState::Searching { candidates, .. } => candidates,
            _ => &[],
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        match self.state {
            RowState::Searching { cursor, .. } => Some(cursor),
            _ => None,
        }
    }

    pub fn list_visible(&self) -> bool {
        matches!(self.state, RowState::Searching { list_visible: true, .. })
    }

    pub fn committed(&self) -> Option<&Arc<Record>> {
        match &self.state {
            RowState::Committed { selection } => Some(selection),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&ManualDraft> {
        match &self.state {
            RowState::ManualEntry { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Any edit replaces the query; a committed selection or draft is dropped.
    pub fn edit_query(&mut self, store: &RecordStore, text: impl Into<String>) -> Transition {
        self.query = text.into();
        if !search::is_searchable(&self.query) {
            self.state = RowState::Idle;
            return Transition::Updated;
        }
        self.state = RowState::Searching {
            candidates: store.search(&self.query),
            cursor: 0,
            list_visible: true,
        };
        Transition::Updated
    }

    /// Moves the highlight within a visible candidate list. `None` means no
    /// list is showing and the key belongs to row navigation.
    pub fn move_cursor(&mut self, mv: CursorMove) -> Option<usize> {
        match &mut self.state {
            RowState::Searching {
                candidates,
                cursor,
                list_visible: true,
            } => {
                *cursor = match mv {
                    CursorMove::Next => (*cursor + 1).min(candidates.len()),
                    CursorMove::Previous => cursor.saturating_sub(1),
                };
                Some(*cursor)
            }
            _ => None,
        }
    }

    /// Enter key. With the list showing, commits the highlighted candidate or
    /// opens manual entry on the sentinel. With the list hidden or a selection
    /// already made, searches again: a single hit commits directly, several
    /// re-open the list.
    pub fn confirm(&mut self, store: &RecordStore) -> Transition {
        match &self.state {
            RowState::Searching {
                candidates,
                cursor,
                list_visible: true,
            } => match candidates.get(*cursor) {
                Some(choice) => {
                    let choice = Arc::clone(choice);
                    self.commit(choice)
                }
                None => self.enter_manual(),
            },
            RowState::Searching {
                list_visible: false,
                ..
            }
            | RowState::Committed { .. } => {
                let mut found = store.search(&self.query);
                match found.len() {
                    0 => Transition::Ignored,
                    1 => {
                        let only = found.remove(0);
                        self.commit(only)
                    }
                    _ => {
                        self.state = RowState::Searching {
                            candidates: found,
                            cursor: 0,
                            list_visible: true,
                        };
                        Transition::Updated
                    }
                }
            }
            _ => Transition::Ignored,
        }
    }

    /// Click on a candidate.
    pub fn select_candidate(&mut self, index: usize) -> Transition {
        let choice = match &self.state {
            RowState::Searching { candidates, .. } => candidates.get(index).cloned(),
            _ => None,
        };
        match choice {
            Some(choice) => self.commit(choice),
            None => Transition::Ignored,
        }
    }

    /// Click on the manual-entry option.
    pub fn choose_manual_entry(&mut self) -> Transition {
        match self.state {
            RowState::Searching { .. } => self.enter_manual(),
            _ => Transition::Ignored,
        }
    }

    /// Escape key: hides the candidate list, or leaves manual entry.
    pub fn dismiss(&mut self) -> Transition {
        if let RowState::ManualEntry { .. } = self.state {
            return self.cancel_manual();
        }
        match &mut self.state {
            RowState::Searching { list_visible, .. } if *list_visible => {
                *list_visible = false;
                Transition::Updated
            }
            _ => Transition::Ignored,
        }
    }

    pub fn set_manual_field(&mut self, field: ManualField, value: impl Into<String>) -> Transition {
        match &mut self.state {
            RowState::ManualEntry { draft, .. } => {
                draft.set(field, value.into());
                Transition::Updated
            }
            _ => Transition::Ignored,
        }
    }

    /// Commits the draft as a synthesized record. Blocked while the subject id
    /// is blank; the draft stays as it is.
    pub fn complete_manual(&mut self) -> Transition {
        let record = match &self.state {
            RowState::ManualEntry { draft, .. } if draft.is_complete() => manual_record(draft),
            _ => return Transition::Ignored,
        };
        self.commit(Arc::new(record))
    }

    pub fn cancel_manual(&mut self) -> Transition {
        match std::mem::replace(&mut self.state, RowState::Idle) {
            RowState::ManualEntry { resume, .. } => {
                self.state = *resume;
                Transition::ManualEntryCancelled
            }
            other => {
                self.state = other;
                Transition::Ignored
            }
        }
    }

    /// Clear button: back to an empty idle row.
    pub fn clear(&mut self) -> Transition {
        if self.query.is_empty() && self.state == RowState::Idle {
            return Transition::Ignored;
        }
        self.query.clear();
        self.state = RowState::Idle;
        Transition::Updated
    }

    fn commit(&mut self, selection: Arc<Record>) -> Transition {
        self.state = RowState::Committed {
            selection: Arc::clone(&selection),
        };
        Transition::Committed(selection)
    }

    fn enter_manual(&mut self) -> Transition {
        let mut draft = ManualDraft::default();
        if QueryKind::classify(&self.query).looks_like_accident_id() {
            draft.accident_id = self.query.trim().to_string();
        } else {
            draft.subject_id = self.query.trim().to_string();
        }
        let resume = std::mem::replace(&mut self.state, RowState::Idle);
        self.state = RowState::ManualEntry {
            draft,
            resume: Box::new(resume),
        };
        Transition::ManualEntryStarted
    }
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn manual_record(draft: &ManualDraft) -> Record {
    Record::from(RecordFields {
        sequence_number: chrono::Utc::now().timestamp_millis(),
        accident_id: non_blank(&draft.accident_id)
            .unwrap_or_else(|| format!("{}{}", MANUAL_ID_PREFIX, Uuid::new_v4().simple())),
        series_tag: draft.series_tag.trim().to_string(),
        management_id: draft.management_id.trim().to_string(),
        subject_id: draft.subject_id.trim().to_string(),
        status: non_blank(&draft.status).unwrap_or_else(|| MANUAL_STATUS.to_string()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RecordStore {
        let rec = |seq: i64, subject: &str, accident: &str| {
            Record::from(RecordFields {
                sequence_number: seq,
                subject_id: subject.to_string(),
                accident_id: accident.to_string(),
                ..Default::default()
            })
        };
        RecordStore::new(
            vec![
                rec(1, "12-3456", "A1"),
                rec(2, "98-3456", "A2"),
                rec(3, "77-1111", "2024-00123"),
            ],
            None,
        )
    }

    #[test]
    fn short_query_is_idle() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3");
        assert_eq!(row.phase(), RowPhase::Idle);
        assert!(row.candidates().is_empty());
    }

    #[test]
    fn searchable_query_lists_candidates_with_cursor_at_start() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3456");
        assert_eq!(row.phase(), RowPhase::Searching);
        assert_eq!(row.candidates().len(), 2);
        assert_eq!(row.cursor(), Some(0));
        assert!(row.list_visible());
    }

    #[test]
    fn cursor_clamps_to_manual_sentinel() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3456");
        assert_eq!(row.move_cursor(CursorMove::Previous), Some(0));
        assert_eq!(row.move_cursor(CursorMove::Next), Some(1));
        assert_eq!(row.move_cursor(CursorMove::Next), Some(2));
        assert_eq!(row.move_cursor(CursorMove::Next), Some(2));
    }

    #[test]
    fn cursor_is_inert_outside_visible_list() {
        let s = store();
        let mut row = Row::new();
        assert_eq!(row.move_cursor(CursorMove::Next), None);
        row.edit_query(&s, "3456");
        row.dismiss();
        assert_eq!(row.move_cursor(CursorMove::Next), None);
    }

    #[test]
    fn confirm_commits_highlighted_candidate() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3456");
        row.move_cursor(CursorMove::Next);
        let t = row.confirm(&s);
        assert!(matches!(t, Transition::Committed(ref r) if r.accident_id == "A2"));
        assert_eq!(row.phase(), RowPhase::Committed);
        assert!(row.candidates().is_empty());
        assert_eq!(row.query(), "3456");
    }

    #[test]
    fn editing_after_commit_discards_selection() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3456");
        row.confirm(&s);
        row.edit_query(&s, "34567");
        assert_eq!(row.phase(), RowPhase::Searching);
        assert!(row.committed().is_none());
        row.edit_query(&s, "");
        assert_eq!(row.phase(), RowPhase::Idle);
    }

    #[test]
    fn escape_hides_list_but_keeps_query() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3456");
        assert_eq!(row.dismiss(), Transition::Updated);
        assert!(!row.list_visible());
        assert_eq!(row.query(), "3456");
        assert_eq!(row.candidates().len(), 2);
        assert_eq!(row.dismiss(), Transition::Ignored);
    }

    #[test]
    fn confirm_with_hidden_list_commits_single_hit() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "00123");
        row.dismiss();
        let t = row.confirm(&s);
        assert!(matches!(t, Transition::Committed(ref r) if r.sequence_number == 3));
    }

    #[test]
    fn confirm_with_hidden_list_reopens_for_several_hits() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3456");
        row.move_cursor(CursorMove::Next);
        row.dismiss();
        assert_eq!(row.confirm(&s), Transition::Updated);
        assert!(row.list_visible());
        assert_eq!(row.cursor(), Some(0));
    }

    #[test]
    fn sentinel_opens_manual_entry_with_prefill() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "자전거");
        assert!(row.candidates().is_empty());
        assert_eq!(row.confirm(&s), Transition::ManualEntryStarted);
        let draft = row.draft().unwrap();
        assert_eq!(draft.subject_id, "자전거");
        assert_eq!(draft.accident_id, "");

        let mut row = Row::new();
        row.edit_query(&s, "2024-999");
        row.choose_manual_entry();
        assert_eq!(row.draft().unwrap().accident_id, "2024-999");
    }

    #[test]
    fn manual_entry_needs_subject_id() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "2024-999");
        row.choose_manual_entry();
        let before = row.draft().cloned();
        assert_eq!(row.complete_manual(), Transition::Ignored);
        assert_eq!(row.phase(), RowPhase::ManualEntry);
        assert_eq!(row.draft().cloned(), before);
    }

    #[test]
    fn manual_entry_commits_synthesized_record() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "zz");
        row.choose_manual_entry();
        row.set_manual_field(ManualField::SubjectId, "서울12가9030");
        row.set_manual_field(ManualField::SeriesTag, "7");
        let t = row.complete_manual();
        let Transition::Committed(rec) = t else {
            panic!("expected commit, got {t:?}");
        };
        assert_eq!(rec.subject_id(), "서울12가9030");
        assert_eq!(rec.subject_id_last_four(), "9030");
        assert!(rec.accident_id.starts_with(MANUAL_ID_PREFIX));
        assert_eq!(rec.status, MANUAL_STATUS);
        assert_eq!(rec.series_tag, "7");
        assert_eq!(row.committed(), Some(&rec));
    }

    #[test]
    fn manual_placeholders_are_unique() {
        let s = store();
        let mut ids = Vec::new();
        for _ in 0..2 {
            let mut row = Row::new();
            row.edit_query(&s, "zz");
            row.choose_manual_entry();
            row.complete_manual();
            ids.push(row.committed().unwrap().accident_id.clone());
        }
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn cancel_restores_previous_state() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3456");
        row.move_cursor(CursorMove::Next);
        row.move_cursor(CursorMove::Next);
        let before = row.state().clone();
        row.confirm(&s);
        assert_eq!(row.phase(), RowPhase::ManualEntry);
        assert_eq!(row.dismiss(), Transition::ManualEntryCancelled);
        assert_eq!(row.state(), &before);
        assert!(row.draft().is_none());
        assert_eq!(row.cancel_manual(), Transition::Ignored);
    }

    #[test]
    fn confirm_on_committed_row_searches_again() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "00123");
        row.confirm(&s);
        let t = row.confirm(&s);
        assert!(matches!(t, Transition::Committed(ref r) if r.sequence_number == 3));

        row.edit_query(&s, "3456");
        row.move_cursor(CursorMove::Next);
        row.confirm(&s);
        assert_eq!(row.confirm(&s), Transition::Updated);
        assert_eq!(row.phase(), RowPhase::Searching);
        assert_eq!(row.candidates().len(), 2);
        assert!(row.list_visible());
    }

    #[test]
    fn padded_query_starts_search() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, " 1");
        assert_eq!(row.phase(), RowPhase::Searching);
        assert!(!row.candidates().is_empty());
        row.edit_query(&s, "  ");
        assert_eq!(row.phase(), RowPhase::Searching);
        assert!(row.candidates().is_empty());
    }

    #[test]
    fn clear_resets_row() {
        let s = store();
        let mut row = Row::new();
        row.edit_query(&s, "3456");
        row.confirm(&s);
        assert_eq!(row.clear(), Transition::Updated);
        assert_eq!(row.phase(), RowPhase::Idle);
        assert_eq!(row.query(), "");
        assert_eq!(row.clear(), Transition::Ignored);
    }

    #[test]
    fn row_ids_are_distinct() {
        assert_ne!(Row::new().id(), Row::new().id());
    }
}

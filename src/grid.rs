//! Entry grid: the ordered rows, keyboard routing between them, duplicate
//! detection and the queue of focus/scroll actions the front end runs after it
//! has rendered the new row list.

use crate::row::{CursorMove, Row, RowId, RowPhase, Transition};
use crate::search::QueryKind;
use crate::store::RecordStore;
use crate::types::{ManualDraft, ManualField, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridKey {
    Up,
    Down,
    Enter,
    Escape,
    Tab,
}

/// Work for the front end once the current state is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UiAction {
    #[serde(rename_all = "camelCase")]
    FocusRow { row_id: RowId },
    #[serde(rename_all = "camelCase")]
    ScrollIntoView { row_id: RowId },
    /// `index == candidates.len()` is the manual-entry option.
    #[serde(rename_all = "camelCase")]
    RevealCandidate { row_id: RowId, index: usize },
    #[serde(rename_all = "camelCase")]
    FocusManualField { row_id: RowId, field: ManualField },
}

impl UiAction {
    pub fn row_id(&self) -> RowId {
        match self {
            UiAction::FocusRow { row_id }
            | UiAction::ScrollIntoView { row_id }
            | UiAction::RevealCandidate { row_id, .. }
            | UiAction::FocusManualField { row_id, .. } => *row_id,
        }
    }
}

/// `{rowId, committedSelection?}` handed to the print formatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedRow {
    pub row_id: RowId,
    pub selection: Option<Arc<Record>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub row_id: RowId,
    pub query: String,
    pub hint: &'static str,
    pub phase: RowPhase,
    pub candidates: Vec<Arc<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<usize>,
    pub list_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Arc<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<ManualDraft>,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSnapshot {
    pub rows: Vec<RowView>,
    pub duplicates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused: Option<RowId>,
    pub record_count: usize,
}

pub type Subscriber = Box<dyn FnMut(&GridSnapshot) + Send>;

/// Accident ids carried by more than one selection, blank ids included.
pub fn duplicate_accident_ids<'a, I>(selections: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut seen = HashSet::new();
    let mut dups = BTreeSet::new();
    for record in selections {
        let id = record.accident_id.as_str();
        if !seen.insert(id) {
            dups.insert(id.to_string());
        }
    }
    dups
}

pub struct GridController {
    store: RecordStore,
    rows: Vec<Row>,
    focused: Option<RowId>,
    pending: VecDeque<UiAction>,
    tick: u64,
    appended_at: Option<u64>,
    subscribers: Vec<Subscriber>,
}

impl GridController {
    pub fn new(store: RecordStore) -> Self {
        let first = Row::new();
        let focused = Some(first.id());
        GridController {
            store,
            rows: vec![first],
            focused,
            pending: VecDeque::new(),
            tick: 0,
            appended_at: None,
            subscribers: Vec::new(),
        }
    }

    /// New upload: the old rows go with the old records.
    pub fn replace_store(&mut self, store: RecordStore) {
        info!(records = store.len(), source = ?store.source(), "dataset replaced, grid reset");
        let first = Row::new();
        self.focused = Some(first.id());
        self.rows = vec![first];
        self.store = store;
        self.pending.clear();
        self.appended_at = None;
        self.notify();
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, row_id: RowId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id() == row_id)
    }

    pub fn focused(&self) -> Option<RowId> {
        self.focused
    }

    pub fn subscribe<F>(&mut self, f: F)
    where
        F: FnMut(&GridSnapshot) + Send + 'static,
    {
        self.subscribers.push(Box::new(f));
    }

    /// Adds an idle row at the end. Only one row is added per render tick.
    pub fn append_row(&mut self) -> Option<RowId> {
        let id = self.push_row()?;
        self.notify();
        Some(id)
    }

    /// Removes a row unless it is the only one left.
    pub fn remove_row(&mut self, row_id: RowId) -> bool {
        if self.rows.len() <= 1 {
            debug!(%row_id, "refusing to remove the last row");
            return false;
        }
        let Some(idx) = self.index_of(row_id) else {
            return false;
        };
        self.rows.remove(idx);
        if self.focused == Some(row_id) {
            let next = idx.min(self.rows.len() - 1);
            self.focused = Some(self.rows[next].id());
        }
        self.notify();
        true
    }

    /// Moves focus to the neighbouring row, growing the grid when moving past
    /// the end. Focus and scroll are queued for after the next render.
    pub fn advance_focus(&mut self, from: RowId, direction: Direction) -> Option<RowId> {
        let target = self.move_focus(from, direction)?;
        self.notify();
        Some(target)
    }

    /// Input focus landed on a row (click or tab).
    pub fn focus_row(&mut self, row_id: RowId) {
        if self.index_of(row_id).is_some() {
            self.focused = Some(row_id);
        }
    }

    pub fn duplicates(&self) -> BTreeSet<String> {
        duplicate_accident_ids(self.rows.iter().filter_map(|r| r.committed().map(|s| s.as_ref())))
    }

    pub fn committed_rows(&self) -> Vec<CommittedRow> {
        self.rows
            .iter()
            .map(|r| CommittedRow {
                row_id: r.id(),
                selection: r.committed().cloned(),
            })
            .collect()
    }

    pub fn snapshot(&self) -> GridSnapshot {
        let duplicates = self.duplicates();
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let selection = r.committed().cloned();
                let duplicate = selection
                    .as_ref()
                    .is_some_and(|s| duplicates.contains(&s.accident_id));
                RowView {
                    row_id: r.id(),
                    query: r.query().to_string(),
                    hint: QueryKind::classify(r.query()).hint(),
                    phase: r.phase(),
                    candidates: r.candidates().to_vec(),
                    cursor: r.cursor(),
                    list_visible: r.list_visible(),
                    selection,
                    draft: r.draft().cloned(),
                    duplicate,
                }
            })
            .collect();
        GridSnapshot {
            rows,
            duplicates: duplicates.into_iter().collect(),
            focused: self.focused,
            record_count: self.store.len(),
        }
    }

    /// Called by the front end once the latest state is on screen. Returns the
    /// queued actions in order, minus those whose row has since been removed,
    /// and starts a new tick.
    pub fn after_render(&mut self) -> Vec<UiAction> {
        self.tick += 1;
        let mut ready = Vec::with_capacity(self.pending.len());
        while let Some(action) = self.pending.pop_front() {
            if self.index_of(action.row_id()).is_some() {
                ready.push(action);
            } else {
                debug!(?action, "dropping action for removed row");
            }
        }
        ready
    }

    pub fn edit_query(&mut self, row_id: RowId, text: impl Into<String>) -> Transition {
        let Some(idx) = self.index_of(row_id) else {
            return Transition::Ignored;
        };
        let t = self.rows[idx].edit_query(&self.store, text);
        self.focused = Some(row_id);
        self.finish(idx, t)
    }

    /// Keys typed into a row's search box. Returns whether the key was used.
    pub fn handle_key(&mut self, row_id: RowId, key: GridKey) -> bool {
        let Some(idx) = self.index_of(row_id) else {
            return false;
        };
        if self.rows[idx].phase() == RowPhase::ManualEntry {
            return false;
        }
        match key {
            GridKey::Up | GridKey::Down => {
                let mv = if key == GridKey::Up {
                    CursorMove::Previous
                } else {
                    CursorMove::Next
                };
                if let Some(index) = self.rows[idx].move_cursor(mv) {
                    self.pending.push_back(UiAction::RevealCandidate { row_id, index });
                    self.notify();
                    return true;
                }
                let can_move = match key {
                    GridKey::Up => idx > 0,
                    _ => idx + 1 < self.rows.len(),
                };
                let direction = if key == GridKey::Up {
                    Direction::Previous
                } else {
                    Direction::Next
                };
                can_move && self.advance_focus(row_id, direction).is_some()
            }
            GridKey::Enter => {
                let t = self.rows[idx].confirm(&self.store);
                self.finish(idx, t).changed()
            }
            GridKey::Escape => {
                let t = self.rows[idx].dismiss();
                self.finish(idx, t).changed()
            }
            GridKey::Tab => false,
        }
    }

    /// Keys typed into one of the manual-entry fields.
    pub fn handle_manual_key(&mut self, row_id: RowId, field: ManualField, key: GridKey) -> bool {
        let Some(idx) = self.index_of(row_id) else {
            return false;
        };
        if self.rows[idx].phase() != RowPhase::ManualEntry {
            return false;
        }
        match (key, field.next()) {
            (GridKey::Enter, Some(next)) => {
                self.pending
                    .push_back(UiAction::FocusManualField { row_id, field: next });
                true
            }
            (GridKey::Enter, None) | (GridKey::Tab, None) => self.complete_manual(row_id).changed(),
            (GridKey::Escape, _) => self.cancel_manual(row_id).changed(),
            _ => false,
        }
    }

    pub fn select_candidate(&mut self, row_id: RowId, index: usize) -> Transition {
        self.with_row(row_id, |row, _| row.select_candidate(index))
    }

    pub fn choose_manual_entry(&mut self, row_id: RowId) -> Transition {
        self.with_row(row_id, |row, _| row.choose_manual_entry())
    }

    pub fn set_manual_field(&mut self, row_id: RowId, field: ManualField, value: impl Into<String>) -> Transition {
        let value = value.into();
        self.with_row(row_id, move |row, _| row.set_manual_field(field, value))
    }

    pub fn complete_manual(&mut self, row_id: RowId) -> Transition {
        self.with_row(row_id, |row, _| row.complete_manual())
    }

    pub fn cancel_manual(&mut self, row_id: RowId) -> Transition {
        self.with_row(row_id, |row, _| row.cancel_manual())
    }

    pub fn clear_row(&mut self, row_id: RowId) -> Transition {
        let t = self.with_row(row_id, |row, _| row.clear());
        if t.changed() {
            self.focused = Some(row_id);
            self.pending.push_back(UiAction::FocusRow { row_id });
        }
        t
    }

    fn with_row<F>(&mut self, row_id: RowId, f: F) -> Transition
    where
        F: FnOnce(&mut Row, &RecordStore) -> Transition,
    {
        let Some(idx) = self.index_of(row_id) else {
            return Transition::Ignored;
        };
        let t = f(&mut self.rows[idx], &self.store);
        self.finish(idx, t)
    }

    /// Follow-up work shared by every row transition.
    fn finish(&mut self, idx: usize, t: Transition) -> Transition {
        let row_id = self.rows[idx].id();
        match &t {
            Transition::Ignored => return t,
            Transition::Committed(record) => {
                info!(%row_id, accident_id = %record.accident_id, subject_id = %record.subject_id(), "row committed");
                if self.duplicates().contains(&record.accident_id) {
                    warn!(accident_id = %record.accident_id, "accident id selected on more than one row");
                }
                self.move_focus(row_id, Direction::Next);
            }
            Transition::ManualEntryStarted => {
                debug!(%row_id, "manual entry started");
                self.pending.push_back(UiAction::FocusManualField {
                    row_id,
                    field: ManualField::first(),
                });
            }
            Transition::ManualEntryCancelled => {
                debug!(%row_id, "manual entry cancelled");
                self.pending.push_back(UiAction::FocusRow { row_id });
            }
            Transition::Updated => {}
        }
        self.notify();
        t
    }

    fn move_focus(&mut self, from: RowId, direction: Direction) -> Option<RowId> {
        let idx = self.index_of(from)?;
        let target = match direction {
            Direction::Next if idx + 1 < self.rows.len() => self.rows[idx + 1].id(),
            Direction::Next => self.push_row()?,
            Direction::Previous if idx > 0 => self.rows[idx - 1].id(),
            Direction::Previous => return None,
        };
        self.focused = Some(target);
        self.pending.push_back(UiAction::FocusRow { row_id: target });
        self.pending.push_back(UiAction::ScrollIntoView { row_id: target });
        Some(target)
    }

    fn push_row(&mut self) -> Option<RowId> {
        if self.appended_at == Some(self.tick) {
            debug!(tick = self.tick, "row already appended this tick");
            return None;
        }
        let row = Row::new();
        let id = row.id();
        self.rows.push(row);
        self.appended_at = Some(self.tick);
        debug!(%id, rows = self.rows.len(), "row appended");
        Some(id)
    }

    fn index_of(&self, row_id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id() == row_id)
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for subscriber in self.subscribers.iter_mut() {
            subscriber(&snapshot);
        }
    }
}

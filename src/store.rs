use crate::search;
use crate::types::Record;
use std::sync::Arc;

/// Immutable, ordered set of records for one upload. Cloning is cheap; rows keep
/// `Arc<Record>` handles into it.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Arc<[Arc<Record>]>,
    source: Option<String>,
}

impl RecordStore {
    pub fn new(records: Vec<Record>, source: Option<String>) -> Self {
        let records: Vec<Arc<Record>> = records.into_iter().map(Arc::new).collect();
        RecordStore {
            records: records.into(),
            source,
        }
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// File name (or "pasted text") the records came from.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn search(&self, query: &str) -> Vec<Arc<Record>> {
        search::search(&self.records, query)
    }
}

use serde::{Deserialize, Serialize};

/// Number of trailing characters of the subject id kept for plate-suffix lookups.
pub const LAST_FOUR_LEN: usize = 4;

/// One imported incident/vehicle entry.
///
/// `subject_id` and its derived suffix are private so the suffix can never drift
/// from the id; deserialization goes through [`RecordFields`] and recomputes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RecordFields")]
pub struct Record {
    pub sequence_number: i64,
    pub accident_id: String,
    pub series_tag: String,
    pub management_id: String,
    pub status: String,
    pub closure_date: String,
    pub department: String,
    pub manager_name: String,
    subject_id: String,
    subject_id_last_four: String,
}

/// Plain field set a [`Record`] is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordFields {
    pub sequence_number: i64,
    pub accident_id: String,
    pub series_tag: String,
    pub management_id: String,
    pub status: String,
    pub closure_date: String,
    pub department: String,
    pub manager_name: String,
    pub subject_id: String,
}

impl From<RecordFields> for Record {
    fn from(f: RecordFields) -> Self {
        let subject_id_last_four = last_four(&f.subject_id);
        Record {
            sequence_number: f.sequence_number,
            accident_id: f.accident_id,
            series_tag: f.series_tag,
            management_id: f.management_id,
            status: f.status,
            closure_date: f.closure_date,
            department: f.department,
            manager_name: f.manager_name,
            subject_id: f.subject_id,
            subject_id_last_four,
        }
    }
}

impl Record {
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn subject_id_last_four(&self) -> &str {
        &self.subject_id_last_four
    }

    pub fn set_subject_id(&mut self, subject_id: impl Into<String>) {
        self.subject_id = subject_id.into();
        self.subject_id_last_four = last_four(&self.subject_id);
    }
}

/// Trailing [`LAST_FOUR_LEN`] characters (not bytes) of `s`.
pub fn last_four(s: &str) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(LAST_FOUR_LEN)).collect()
}

/// Field of the manual-entry form, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManualField {
    AccidentId,
    SeriesTag,
    ManagementId,
    SubjectId,
    Status,
}

impl ManualField {
    pub const ORDER: [ManualField; 5] = [
        ManualField::AccidentId,
        ManualField::SeriesTag,
        ManualField::ManagementId,
        ManualField::SubjectId,
        ManualField::Status,
    ];

    pub fn first() -> Self {
        Self::ORDER[0]
    }

    pub fn next(self) -> Option<Self> {
        let idx = Self::ORDER.iter().position(|f| *f == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }
}

/// Draft typed by the operator while a row bypasses search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualDraft {
    pub accident_id: String,
    pub series_tag: String,
    pub management_id: String,
    pub subject_id: String,
    pub status: String,
}

impl ManualDraft {
    pub fn get(&self, field: ManualField) -> &str {
        match field {
            ManualField::AccidentId => &self.accident_id,
            ManualField::SeriesTag => &self.series_tag,
            ManualField::ManagementId => &self.management_id,
            ManualField::SubjectId => &self.subject_id,
            ManualField::Status => &self.status,
        }
    }

    pub fn set(&mut self, field: ManualField, value: String) {
        match field {
            ManualField::AccidentId => self.accident_id = value,
            ManualField::SeriesTag => self.series_tag = value,
            ManualField::ManagementId => self.management_id = value,
            ManualField::SubjectId => self.subject_id = value,
            ManualField::Status => self.status = value,
        }
    }

    /// Completion is allowed only once a subject id has been typed.
    pub fn is_complete(&self) -> bool {
        !self.subject_id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(subject: &str) -> RecordFields {
        RecordFields {
            subject_id: subject.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn last_four_tracks_subject_id() {
        let mut r = Record::from(fields("SEOUL-9030"));
        assert_eq!(r.subject_id_last_four(), "9030");
        r.set_subject_id("12가3456");
        assert_eq!(r.subject_id_last_four(), "3456");
        r.set_subject_id("AB");
        assert_eq!(r.subject_id_last_four(), "AB");
        r.set_subject_id("");
        assert_eq!(r.subject_id_last_four(), "");
    }

    #[test]
    fn deserialize_recomputes_last_four() {
        let json = r#"{"sequenceNumber":3,"accidentId":"A1","subjectId":"98-3456","subjectIdLastFour":"zzzz"}"#;
        let r: Record = serde_json::from_str(json).unwrap();
        assert_eq!(r.subject_id_last_four(), "3456");
        assert_eq!(r.sequence_number, 3);
        assert_eq!(r.status, "");
    }

    #[test]
    fn serialize_uses_camel_case() {
        let r = Record::from(fields("12-3456"));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["subjectId"], "12-3456");
        assert_eq!(v["subjectIdLastFour"], "3456");
    }

    #[test]
    fn manual_fields_walk_in_tab_order() {
        let mut f = ManualField::first();
        let mut seen = vec![f];
        while let Some(n) = f.next() {
            seen.push(n);
            f = n;
        }
        assert_eq!(seen, ManualField::ORDER.to_vec());
        assert!(ManualField::Status.is_last());
    }

    #[test]
    fn draft_requires_subject_id() {
        let mut d = ManualDraft::default();
        d.set(ManualField::AccidentId, "2024-1".into());
        assert!(!d.is_complete());
        d.set(ManualField::SubjectId, "  ".into());
        assert!(!d.is_complete());
        d.set(ManualField::SubjectId, "12-3456".into());
        assert!(d.is_complete());
        assert_eq!(d.get(ManualField::SubjectId), "12-3456");
    }
}

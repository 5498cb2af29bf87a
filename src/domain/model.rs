use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Field carrying the uploaded file's display name.
pub const FILE_NAME_FIELD: &str = "File Name";
/// Signature reference of the document's subject.
pub const SUBJECT_SIGNATURE_FIELD: &str = "Patient Signature";
/// Signature reference of the counter-signing party.
pub const COUNTERPART_SIGNATURE_FIELD: &str = "Physician Signature";

pub const SIGNATURE_FIELDS: [&str; 2] = [SUBJECT_SIGNATURE_FIELD, COUNTERPART_SIGNATURE_FIELD];

/// A single value inside extracted metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Record(MetadataRecord),
    Sequence(Vec<MetadataValue>),
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => MetadataValue::Null,
            serde_json::Value::Bool(b) => MetadataValue::Bool(b),
            serde_json::Value::Number(n) => MetadataValue::Number(n),
            serde_json::Value::String(s) => MetadataValue::Text(s),
            serde_json::Value::Array(items) => {
                MetadataValue::Sequence(items.into_iter().map(MetadataValue::from).collect())
            }
            serde_json::Value::Object(map) => MetadataValue::Record(MetadataRecord::from(map)),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<Option<String>> for MetadataValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(MetadataValue::Null, MetadataValue::Text)
    }
}

/// Named fields in the order the extraction service produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    fields: Vec<(String, MetadataValue)>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for MetadataRecord {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter()
            .map(|(key, value)| (key, MetadataValue::from(value)))
            .collect()
    }
}

impl FromIterator<(String, MetadataValue)> for MetadataRecord {
    fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
        let mut record = MetadataRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

/// Flattened, display-ready projection of one metadata record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRow {
    entries: Vec<(String, Option<String>)>,
}

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repeated path overwrites the earlier value but keeps its position.
    pub fn insert(&mut self, path: impl Into<String>, value: Option<String>) {
        let path = path.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == path) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((path, value)),
        }
    }

    /// `None` when the path is absent, `Some(None)` when it holds null.
    pub fn get(&self, path: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == path)
            .map(|(_, value)| value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(path, value)| (path.as_str(), value.as_deref()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FlatRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, value) in &self.entries {
            map.serialize_entry(path, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for FlatRow {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut row = FlatRow::new();
        for (path, value) in iter {
            row.insert(path, value);
        }
        row
    }
}

/// A document selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub path: PathBuf,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(name, path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureRefs {
    pub subject: Option<String>,
    pub counterpart: Option<String>,
}

/// What the extraction service returns for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub metadata: MetadataRecord,
    pub signatures: SignatureRefs,
}

impl Extraction {
    /// Metadata plus the synthetic file name and signature reference fields.
    pub fn into_record(self, file_name: &str) -> MetadataRecord {
        let mut record = self.metadata;
        record.insert(FILE_NAME_FIELD, file_name);
        record.insert(SUBJECT_SIGNATURE_FIELD, self.signatures.subject);
        record.insert(COUNTERPART_SIGNATURE_FIELD, self.signatures.counterpart);
        record
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Extracted(FlatRow),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub file_name: String,
    pub outcome: ExtractionOutcome,
    pub completed_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn extracted(file_name: impl Into<String>, row: FlatRow) -> Self {
        Self {
            file_name: file_name.into(),
            outcome: ExtractionOutcome::Extracted(row),
            completed_at: Utc::now(),
        }
    }

    pub fn failed(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            outcome: ExtractionOutcome::Failed {
                reason: reason.into(),
            },
            completed_at: Utc::now(),
        }
    }

    pub fn row(&self) -> Option<&FlatRow> {
        match &self.outcome {
            ExtractionOutcome::Extracted(row) => Some(row),
            ExtractionOutcome::Failed { .. } => None,
        }
    }
}

/// The file that stopped a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// 1-based position of the failing file in the batch.
    pub position: usize,
    pub total: usize,
    pub result: BatchResult,
}

impl BatchFailure {
    pub fn file_name(&self) -> &str {
        &self.result.file_name
    }

    pub fn reason(&self) -> &str {
        match &self.result.outcome {
            ExtractionOutcome::Failed { reason } => reason,
            ExtractionOutcome::Extracted(_) => "",
        }
    }
}

/// Rows aligned to a shared column universe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Vec<(&str, &str)>> {
        self.rows.get(index).map(|row| {
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter().map(String::as_str))
                .collect()
        })
    }

    pub fn value(&self, index: usize, column: &str) -> Option<&str> {
        let position = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index)?.get(position).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub file_names: Vec<String>,
    pub flat_rows: Vec<FlatRow>,
    pub table: ExportTable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_preserves_service_field_order() {
        let value = json!({"zeta": 1, "alpha": {"b": 2, "a": 3}, "mid": null});
        let serde_json::Value::Object(map) = value else {
            panic!("expected object");
        };
        let record = MetadataRecord::from(map);

        let keys: Vec<&str> = record.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(record.get("mid"), Some(&MetadataValue::Null));
    }

    #[test]
    fn test_augmentation_appends_synthetic_fields() {
        let mut metadata = MetadataRecord::new();
        metadata.insert("Patient Name", "Jane Roe");
        let extraction = Extraction {
            metadata,
            signatures: SignatureRefs {
                subject: Some("/signatures/a_patient.png".to_string()),
                counterpart: None,
            },
        };

        let record = extraction.into_record("scan.pdf");
        let keys: Vec<&str> = record.iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![
                "Patient Name",
                FILE_NAME_FIELD,
                SUBJECT_SIGNATURE_FIELD,
                COUNTERPART_SIGNATURE_FIELD
            ]
        );
        assert_eq!(
            record.get(SUBJECT_SIGNATURE_FIELD),
            Some(&MetadataValue::Text("/signatures/a_patient.png".to_string()))
        );
        assert_eq!(record.get(COUNTERPART_SIGNATURE_FIELD), Some(&MetadataValue::Null));
    }

    #[test]
    fn test_augmentation_replaces_existing_file_name_in_place() {
        let mut metadata = MetadataRecord::new();
        metadata.insert(FILE_NAME_FIELD, "from-ocr.pdf");
        metadata.insert("Date", "2024-01-01");

        let record = Extraction {
            metadata,
            signatures: SignatureRefs::default(),
        }
        .into_record("upload.pdf");

        let (first_key, first_value) = record.iter().next().unwrap();
        assert_eq!(first_key, FILE_NAME_FIELD);
        assert_eq!(first_value, &MetadataValue::Text("upload.pdf".to_string()));
    }

    #[test]
    fn test_flat_row_serializes_in_order() {
        let row: FlatRow = vec![
            ("b", Some("1".to_string())),
            ("a", None),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"b":"1","a":null}"#);
    }

    #[test]
    fn test_file_handle_from_path_uses_file_name() {
        let handle = FileHandle::from_path("/tmp/batch/report.pdf");
        assert_eq!(handle.name, "report.pdf");
        assert_eq!(handle.path, PathBuf::from("/tmp/batch/report.pdf"));
    }
}

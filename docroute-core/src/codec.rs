//! Conversion between store records and public documents.

use crate::models::{Document, NewDocument};

/// A record as the store holds it.
///
/// `doc_type` and `data` are optional because older or partially written
/// records may lack them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Store-native identity.
    pub object_id: String,
    pub identifier: String,
    pub doc_type: Option<String>,
    pub data: Option<String>,
}

/// A record about to be inserted. The store assigns its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub identifier: String,
    pub doc_type: String,
    pub data: String,
}

/// Fields to merge into an existing record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub data: Option<String>,
}

impl RecordPatch {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }
}

impl StoredRecord {
    /// Attaches the identity the store assigned to a freshly inserted record.
    pub fn from_insert(object_id: String, record: NewRecord) -> Self {
        Self {
            object_id,
            identifier: record.identifier,
            doc_type: Some(record.doc_type),
            data: Some(record.data),
        }
    }
}

impl Document {
    /// Decodes a stored record.
    ///
    /// `resolved_type` is the type the caller used to reach the collection and
    /// fills in for records stored without one.
    pub fn from_record(record: StoredRecord, resolved_type: &str) -> Self {
        Self {
            id: record.object_id,
            identifier: record.identifier,
            doc_type: record
                .doc_type
                .unwrap_or_else(|| resolved_type.to_string()),
            data: record.data.unwrap_or_default(),
        }
    }
}

impl From<NewDocument> for NewRecord {
    fn from(doc: NewDocument) -> Self {
        Self {
            identifier: doc.identifier,
            doc_type: doc.doc_type,
            data: doc.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doc_type: Option<&str>, data: Option<&str>) -> StoredRecord {
        StoredRecord {
            object_id: "65f0c2".into(),
            identifier: "inv-1".into(),
            doc_type: doc_type.map(String::from),
            data: data.map(String::from),
        }
    }

    #[test]
    fn test_native_identity_becomes_id() {
        let doc = Document::from_record(record(Some("Invoice"), Some("x")), "other");
        assert_eq!(doc.id, "65f0c2");
        assert_eq!(doc.identifier, "inv-1");
        assert_eq!(doc.doc_type, "Invoice");
        assert_eq!(doc.data, "x");
    }

    #[test]
    fn test_missing_type_is_injected() {
        let doc = Document::from_record(record(None, Some("x")), "Invoice");
        assert_eq!(doc.doc_type, "Invoice");
    }

    #[test]
    fn test_missing_data_decodes_empty() {
        let doc = Document::from_record(record(Some("t"), None), "t");
        assert_eq!(doc.data, "");
    }

    #[test]
    fn test_new_document_to_record() {
        let rec = NewRecord::from(NewDocument::new("a", "T", "payload"));
        assert_eq!(rec.identifier, "a");
        assert_eq!(rec.doc_type, "T");
        assert_eq!(rec.data, "payload");
    }

    #[test]
    fn test_empty_patch() {
        assert!(RecordPatch::default().is_empty());
        assert!(!RecordPatch::data("new").is_empty());
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// A document as seen by callers.
///
/// `id` is assigned by the store when the document is created and is never
/// taken from caller input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub identifier: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub data: String,
}

/// Input for a create operation.
///
/// Has no `id` field: an `id` supplied by a caller is dropped
/// while deserializing and never reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDocument {
    pub identifier: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub data: String,
}

impl NewDocument {
    pub fn new(
        identifier: impl Into<String>,
        doc_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            doc_type: doc_type.into(),
            data: data.into(),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("{} ({})", self.identifier, self.doc_type);
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.chars().count()))?;
        writeln!(f, "ID: {}", self.id)?;
        if !self.data.is_empty() {
            writeln!(f, "\n{}", self.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_serializes_type_field() {
        let doc = Document {
            id: "abc".into(),
            identifier: "invoice-1".into(),
            doc_type: "Invoice".into(),
            data: "{}".into(),
        };

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "Invoice");
        assert_eq!(json["id"], "abc");
        assert!(json.get("doc_type").is_none());
    }

    #[test]
    fn test_new_document_ignores_caller_id() {
        let json = r#"{"id": "forged", "identifier": "a", "type": "t", "data": "x"}"#;
        let parsed: NewDocument = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, NewDocument::new("a", "t", "x"));
    }

    #[test]
    fn test_new_document_requires_fields() {
        let json = r#"{"identifier": "a", "data": "x"}"#;
        assert!(serde_json::from_str::<NewDocument>(json).is_err());
    }

    #[test]
    fn test_display_underline_counts_characters() {
        let doc = Document {
            id: "abc".into(),
            identifier: "café".into(),
            doc_type: "Größe".into(),
            data: String::new(),
        };

        let text = doc.to_string();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("café (Größe)"));
        assert_eq!(lines.next(), Some("============"));
    }
}

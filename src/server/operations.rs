//! Operation requests and the `{data, errors}` response envelope.
//!
//! A request names an operation in its `op` field, e.g.
//!
//! ```json
//! {"op": "createDocument", "identifier": "inv-1", "type": "Invoice", "data": "{}"}
//! ```
//!
//! or wraps several of them in `{"operations": [...]}`. Each result lands in
//! `data` under the operation's `alias`, or under the operation name when no
//! alias is given.

use docroute_core::{Document, DocumentError, DocumentService, ErrorKind, NewDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Operation {
    GetDocument {
        identifier: String,
        #[serde(rename = "type")]
        doc_type: String,
    },
    GetDocuments {
        #[serde(rename = "type")]
        doc_type: String,
        identifiers: Vec<String>,
    },
    ListDocuments {
        #[serde(rename = "type", default)]
        doc_type: Option<String>,
    },
    CreateDocument {
        identifier: String,
        #[serde(rename = "type")]
        doc_type: String,
        data: String,
    },
    CreateDocuments {
        items: Vec<NewDocument>,
    },
    UpdateDocument {
        identifier: String,
        #[serde(rename = "type")]
        doc_type: String,
        #[serde(rename = "newData", default)]
        new_data: Option<String>,
    },
    DeleteDocument {
        identifier: String,
        #[serde(rename = "type")]
        doc_type: String,
    },
    DeleteDocuments {
        #[serde(rename = "type")]
        doc_type: String,
        identifiers: Vec<String>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetDocument { .. } => "getDocument",
            Operation::GetDocuments { .. } => "getDocuments",
            Operation::ListDocuments { .. } => "listDocuments",
            Operation::CreateDocument { .. } => "createDocument",
            Operation::CreateDocuments { .. } => "createDocuments",
            Operation::UpdateDocument { .. } => "updateDocument",
            Operation::DeleteDocument { .. } => "deleteDocument",
            Operation::DeleteDocuments { .. } => "deleteDocuments",
        }
    }

    /// Runs the operation. `Ok(None)` means the target document does not exist.
    pub async fn run(
        self,
        service: &DocumentService,
    ) -> Result<Option<OperationOutput>, DocumentError> {
        let output = match self {
            Operation::GetDocument {
                identifier,
                doc_type,
            } => service
                .get_document(&identifier, &doc_type)
                .await?
                .map(OperationOutput::Document),
            Operation::GetDocuments {
                doc_type,
                identifiers,
            } => Some(OperationOutput::Documents(
                service.get_documents(&doc_type, &identifiers).await?,
            )),
            Operation::ListDocuments { doc_type } => Some(OperationOutput::Documents(
                service.list_documents(doc_type.as_deref()).await?,
            )),
            Operation::CreateDocument {
                identifier,
                doc_type,
                data,
            } => Some(OperationOutput::Document(
                service
                    .create_document(NewDocument::new(identifier, doc_type, data))
                    .await?,
            )),
            Operation::CreateDocuments { items } => Some(OperationOutput::Documents(
                service.create_documents(items).await?,
            )),
            Operation::UpdateDocument {
                identifier,
                doc_type,
                new_data,
            } => service
                .update_document(&identifier, &doc_type, new_data)
                .await?
                .map(OperationOutput::Document),
            Operation::DeleteDocument {
                identifier,
                doc_type,
            } => Some(OperationOutput::Deleted(
                service.delete_document(&identifier, &doc_type).await?,
            )),
            Operation::DeleteDocuments {
                doc_type,
                identifiers,
            } => Some(OperationOutput::Count(
                service.delete_documents(&doc_type, &identifiers).await?,
            )),
        };
        Ok(output)
    }
}

/// One operation plus the key its result is reported under.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OperationCall {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(flatten)]
    pub operation: Operation,
}

impl OperationCall {
    pub fn key(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.operation.name().to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    Single(OperationCall),
    Batch(Vec<OperationCall>),
}

#[derive(Deserialize)]
struct BatchBody {
    operations: Vec<OperationCall>,
}

impl OperationRequest {
    /// Parses a request body. A top-level `operations` field selects the batch form.
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        if value.get("operations").is_some() {
            let batch: BatchBody = serde_json::from_value(value)?;
            Ok(OperationRequest::Batch(batch.operations))
        } else {
            Ok(OperationRequest::Single(serde_json::from_value(value)?))
        }
    }

    pub fn into_calls(self) -> Vec<OperationCall> {
        match self {
            OperationRequest::Single(call) => vec![call],
            OperationRequest::Batch(calls) => calls,
        }
    }
}

/// Result value of a successful operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum OperationOutput {
    Document(Document),
    Documents(Vec<Document>),
    Deleted(bool),
    Count(u64),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    ValidationError,
    Conflict,
    StoreError,
    BadRequest,
}

impl From<ErrorKind> for FailureCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Validation => FailureCode::ValidationError,
            ErrorKind::Conflict => FailureCode::Conflict,
            ErrorKind::Store => FailureCode::StoreError,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationFailure {
    pub message: String,
    pub path: Vec<String>,
    pub code: FailureCode,
}

impl OperationFailure {
    pub fn from_error(error: &DocumentError, key: String) -> Self {
        Self {
            message: error.to_string(),
            path: vec![key],
            code: error.kind().into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            code: FailureCode::BadRequest,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationResponse {
    pub data: Option<BTreeMap<String, Option<OperationOutput>>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OperationFailure>,
}

impl OperationResponse {
    /// Response for a request that never reached execution.
    pub fn rejected(failure: OperationFailure) -> Self {
        Self {
            data: None,
            errors: vec![failure],
        }
    }
}

/// Runs every call in order. A failed call reports `null` under its key and
/// does not stop the calls after it.
pub async fn execute(service: &DocumentService, request: OperationRequest) -> OperationResponse {
    let calls = request.into_calls();

    let mut keys = HashSet::new();
    for call in &calls {
        let key = call.key();
        if !keys.insert(key.clone()) {
            return OperationResponse::rejected(OperationFailure::bad_request(format!(
                "Result key '{}' is used by more than one operation; set a distinct alias",
                key
            )));
        }
    }

    let mut data = BTreeMap::new();
    let mut errors = Vec::new();
    for call in calls {
        let key = call.key();
        match call.operation.run(service).await {
            Ok(output) => {
                data.insert(key, output);
            }
            Err(e) => {
                tracing::debug!(operation = %key, "operation failed: {}", e);
                errors.push(OperationFailure::from_error(&e, key.clone()));
                data.insert(key, None);
            }
        }
    }

    OperationResponse {
        data: Some(data),
        errors,
    }
}

/// Entry of the `GET /operations` listing.
#[derive(Debug, Serialize)]
pub struct OperationInfo {
    pub op: &'static str,
    pub arguments: &'static [&'static str],
    pub returns: &'static str,
}

pub const CATALOG: &[OperationInfo] = &[
    OperationInfo {
        op: "getDocument",
        arguments: &["identifier", "type"],
        returns: "Document | null",
    },
    OperationInfo {
        op: "getDocuments",
        arguments: &["type", "identifiers"],
        returns: "[Document]",
    },
    OperationInfo {
        op: "listDocuments",
        arguments: &["type?"],
        returns: "[Document]",
    },
    OperationInfo {
        op: "createDocument",
        arguments: &["identifier", "type", "data"],
        returns: "Document",
    },
    OperationInfo {
        op: "createDocuments",
        arguments: &["items"],
        returns: "[Document]",
    },
    OperationInfo {
        op: "updateDocument",
        arguments: &["identifier", "type", "newData?"],
        returns: "Document | null",
    },
    OperationInfo {
        op: "deleteDocument",
        arguments: &["identifier", "type"],
        returns: "bool",
    },
    OperationInfo {
        op: "deleteDocuments",
        arguments: &["type", "identifiers"],
        returns: "int",
    },
];

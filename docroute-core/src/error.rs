//! Error types for document operations.
//!
//! Messages are part of the contract: conflict errors contain one of the
//! phrases "already exists", "documents already exist" or "duplicate key
//! error", and no other error does.

use thiserror::Error;

/// Errors reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique identifier constraint rejected an insert.
    #[error("duplicate key error: collection '{collection}' already holds identifier '{identifier}'")]
    DuplicateKey {
        collection: String,
        identifier: String,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Broad category of a [`DocumentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Store,
}

/// Errors returned by [`DocumentService`](crate::service::DocumentService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Document with identifier '{identifier}' already exists for type '{doc_type}'")]
    AlreadyExists {
        identifier: String,
        doc_type: String,
    },

    #[error("Documents already exist for type '{doc_type}': {}", .identifiers.join(", "))]
    DocumentsAlreadyExist {
        doc_type: String,
        identifiers: Vec<String>,
    },

    #[error("Invalid batch for type '{doc_type}': identifiers repeated within the request: {}", .identifiers.join(", "))]
    RepeatedIdentifiers {
        doc_type: String,
        identifiers: Vec<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DocumentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocumentError::AlreadyExists { .. } | DocumentError::DocumentsAlreadyExist { .. } => {
                ErrorKind::Conflict
            }
            DocumentError::RepeatedIdentifiers { .. } => ErrorKind::Validation,
            DocumentError::Store(StoreError::DuplicateKey { .. }) => ErrorKind::Conflict,
            DocumentError::Store(StoreError::Backend(_)) => ErrorKind::Store,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;

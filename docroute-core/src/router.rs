//! Collection routing.
//!
//! A document's `type` selects the physical collection it lives in. The name
//! is derived deterministically:
//! ```text
//! "Invoice-2024"  -> invoice2024
//! "user_profile"  -> user_profile
//! ""  / "--!"     -> documents
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Collection used for untyped documents and types that sanitize to nothing.
pub const DEFAULT_COLLECTION: &str = "documents";

/// Default number of handles kept in the router cache.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Derives the physical collection name for a document type.
///
/// Keeps alphanumeric characters and `_`, lower-cases them, and falls back to
/// [`DEFAULT_COLLECTION`] when nothing is left.
pub fn collection_name(doc_type: Option<&str>) -> String {
    let safe: String = doc_type
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect();

    if safe.is_empty() {
        DEFAULT_COLLECTION.to_string()
    } else {
        safe
    }
}

/// Cheap, cloneable reference to a physical collection.
///
/// Handles compare by name, so two handles for the same collection are equal
/// whether or not they came from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    name: Arc<str>,
}

impl CollectionHandle {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn default_collection() -> Self {
        Self::new(DEFAULT_COLLECTION)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        &*self.name == DEFAULT_COLLECTION
    }
}

impl fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Resolves document types to collection handles.
///
/// Handles are created lazily and cached up to `capacity` entries. Past that
/// point new names still resolve, they are just not remembered.
#[derive(Debug)]
pub struct CollectionRouter {
    default: CollectionHandle,
    handles: RwLock<HashMap<String, CollectionHandle>>,
    capacity: usize,
}

impl CollectionRouter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            default: CollectionHandle::default_collection(),
            handles: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Returns the handle for the collection a document of `doc_type` lives in.
    pub fn resolve(&self, doc_type: Option<&str>) -> CollectionHandle {
        let name = collection_name(doc_type);
        if name == DEFAULT_COLLECTION {
            return self.default.clone();
        }

        if let Some(handle) = self.handles.read().get(&name) {
            return handle.clone();
        }

        let mut handles = self.handles.write();
        if let Some(handle) = handles.get(&name) {
            return handle.clone();
        }

        let handle = CollectionHandle::new(name.as_str());
        if handles.len() < self.capacity {
            tracing::debug!(collection = %handle, "registered collection handle");
            handles.insert(name, handle.clone());
        }
        handle
    }

    /// The collection used when no type is given.
    pub fn default_collection(&self) -> CollectionHandle {
        self.default.clone()
    }

    /// Number of cached non-default handles.
    pub fn cached(&self) -> usize {
        self.handles.read().len()
    }
}

impl Default for CollectionRouter {
    fn default() -> Self {
        Self::new()
    }
}

//! docroute core library
//!
//! Routes documents into per-type collections and layers uniqueness and
//! all-or-nothing batch semantics on top of a store that offers neither.

pub mod codec;
pub mod error;
pub mod memory;
pub mod models;
pub mod router;
pub mod service;
pub mod store;

pub use codec::{NewRecord, RecordPatch, StoredRecord};
pub use error::{DocumentError, ErrorKind, StoreError};
pub use memory::MemoryStore;
pub use models::{Document, NewDocument};
pub use router::{collection_name, CollectionHandle, CollectionRouter, DEFAULT_COLLECTION};
pub use service::DocumentService;
pub use store::DocumentStore;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

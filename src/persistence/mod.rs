//! Persistence layer
//!
//! The whole account persists as a single JSON document with stable top-level
//! keys; import applies each present key independently, so a document missing
//! a key leaves that part of the state untouched.

pub mod document;
pub mod store;

pub use document::AccountDocument;
pub use store::SnapshotStore;

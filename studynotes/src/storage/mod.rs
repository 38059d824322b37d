//! Storage module
//!
//! Content-addressed storage for graphic-note image attachments.

pub mod blob_store;

pub use blob_store::BlobStore;

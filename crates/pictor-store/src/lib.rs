//! # pictor-store
//!
//! Store abstractions for the pictor image catalog.
//!
//! This crate defines the two seams the catalog rides on:
//!
//! - **DocumentStore**: keyed image records with equality queries
//! - **BlobStore**: path-addressed binary objects with resumable upload,
//!   download-URL resolution, and streaming download
//!
//! Backend crates implement these traits:
//! - `pictor-store-mongodb` - MongoDB document store
//! - `pictor-store-s3` - S3/MinIO blob store

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{Result, StoreError};
pub use traits::{BlobStore, ByteStream, DocumentStore};
pub use types::{BlobInfo, UploadProgress, UploadTask};

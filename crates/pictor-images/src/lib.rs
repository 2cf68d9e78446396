//! pictor-images: image catalog access layer
//!
//! Sequences an image catalog's CRUD calls across two remote stores: a
//! document store for the records and a blob store for the binaries.
//! Every operation is a best-effort one-shot forward; there are no
//! retries, timeouts, or transactions.

pub mod error;
pub mod services;

pub use error::ImagesError;
pub use services::ImageService;

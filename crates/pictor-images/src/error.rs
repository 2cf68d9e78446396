//! Error types for the image catalog service

use pictor_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the image catalog service
#[derive(Error, Debug)]
pub enum ImagesError {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

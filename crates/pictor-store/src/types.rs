use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Result, StoreError};

/// Information about a stored blob
#[derive(Debug, Clone)]
pub struct BlobInfo {
    /// Name the caller addresses the blob by
    pub pathname: String,
    /// Full object key in the backing store
    pub key: String,
    /// Content type
    pub content_type: String,
    /// Size in bytes
    pub size: i64,
    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
}

/// Snapshot of an in-flight upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes confirmed by the store so far
    pub bytes_transferred: u64,
    /// Total payload size
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Starting snapshot for a payload of the given size
    pub fn starting(total_bytes: u64) -> Self {
        Self {
            bytes_transferred: 0,
            total_bytes,
        }
    }

    /// Completed fraction in `0.0..=1.0`; empty payloads report 1.0
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.bytes_transferred as f64 / self.total_bytes as f64
    }

    /// Whether every byte has been confirmed
    pub fn is_complete(&self) -> bool {
        self.bytes_transferred >= self.total_bytes
    }
}

/// Handle to a running upload
///
/// The transfer runs on a spawned task; callers can watch progress while
/// it proceeds and await the final result when they need it.
pub struct UploadTask {
    progress: watch::Receiver<UploadProgress>,
    handle: JoinHandle<Result<BlobInfo>>,
}

impl UploadTask {
    /// Wrap a spawned transfer and its progress channel
    pub fn new(
        progress: watch::Receiver<UploadProgress>,
        handle: JoinHandle<Result<BlobInfo>>,
    ) -> Self {
        Self { progress, handle }
    }

    /// Subscribe to progress updates
    pub fn progress(&self) -> watch::Receiver<UploadProgress> {
        self.progress.clone()
    }

    /// Latest progress snapshot
    pub fn current_progress(&self) -> UploadProgress {
        *self.progress.borrow()
    }

    /// Wait for the transfer to finish and return the stored blob's info
    pub async fn await_completion(self) -> Result<BlobInfo> {
        self.handle
            .await
            .map_err(|e| StoreError::UploadFailed(format!("upload task failed: {}", e)))?
    }
}

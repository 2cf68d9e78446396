use crate::error::Result;
use crate::types::{BlobInfo, UploadTask};
use async_trait::async_trait;
use bytes::Bytes;
use pictor_entities::ImageRecord;

/// Boxed byte stream returned by streaming downloads
pub type ByteStream =
    Box<dyn futures::Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + Unpin>;

/// Keyed image records in a remote document collection
///
/// Documents are addressed by `ImageRecord::id`. Absent documents are
/// reported as `None` by `get`, never as an error; `NotFound` is reserved
/// for the store itself signalling a missing collection or object.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single record by document key
    async fn get(&self, id: &str) -> Result<Option<ImageRecord>>;

    /// Fetch every record in the collection, in store order
    async fn get_all(&self) -> Result<Vec<ImageRecord>>;

    /// Fetch all records whose `name` field equals the given value
    async fn find_by_name(&self, name: &str) -> Result<Vec<ImageRecord>>;

    /// Insert or fully replace a record (set semantics)
    async fn upsert(&self, record: &ImageRecord) -> Result<()>;

    /// Delete a record by document key; deleting a missing key is not an error
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Path-addressed binary objects in a remote object store
///
/// Objects live under `images/<name>`; the prefix is backend
/// configuration, callers pass bare names.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Start a resumable upload; the returned task exposes transfer progress
    async fn upload(&self, name: &str, data: Bytes) -> Result<UploadTask>;

    /// Delete an object
    async fn delete(&self, name: &str) -> Result<()>;

    /// Resolve a fetchable URL for an object
    async fn download_url(&self, name: &str) -> Result<String>;

    /// Download an object as a byte stream, with its content type if known
    async fn download(&self, name: &str) -> Result<(ByteStream, Option<String>)>;

    /// Fetch object metadata without the body
    async fn head(&self, name: &str) -> Result<BlobInfo>;
}

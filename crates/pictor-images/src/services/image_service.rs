//! Catalog facade sequencing document and blob store calls

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use pictor_entities::ImageRecord;
use pictor_store::{BlobInfo, BlobStore, ByteStream, DocumentStore, UploadTask};
use tracing::{debug, info};

use crate::error::ImagesError;

type Result<T> = std::result::Result<T, ImagesError>;

/// Image catalog access over a document store and a blob store
///
/// Every operation is a one-shot forward: calls go out once, the first
/// failure propagates, and partial multi-store effects stay where they
/// landed. There are no retries and no cross-store rollbacks.
pub struct ImageService {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl ImageService {
    /// Create a new service over the given stores
    pub fn new(documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { documents, blobs }
    }

    /// Stamp `updated_at` and persist the record, returning the stored copy
    pub async fn create(&self, mut record: ImageRecord) -> Result<ImageRecord> {
        record.touch();
        debug!("create image record {}", record.id);
        self.documents.upsert(&record).await?;
        Ok(record)
    }

    /// Persist a batch of records concurrently
    ///
    /// All writes are awaited; the first failure propagates after every
    /// write has settled.
    pub async fn create_many(&self, records: Vec<ImageRecord>) -> Result<Vec<ImageRecord>> {
        debug!("create {} image records", records.len());
        let results = join_all(records.into_iter().map(|record| self.create(record))).await;
        results.into_iter().collect()
    }

    /// Fetch a record by id; absent records are `None`
    pub async fn get_by_id(&self, id: &str) -> Result<Option<ImageRecord>> {
        Ok(self.documents.get(id).await?)
    }

    /// Fetch all records whose `name` equals the given value
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<ImageRecord>> {
        Ok(self.documents.find_by_name(name).await?)
    }

    /// Fetch every record, oldest `updated_at` first
    pub async fn get_all(&self) -> Result<Vec<ImageRecord>> {
        let mut records = self.documents.get_all().await?;
        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(records)
    }

    /// Start uploading a binary under the given name
    ///
    /// Returns as soon as the transfer is running. Callers watch progress
    /// on the returned task and await it for the stored blob's info.
    pub async fn upload_with_progress(&self, name: &str, data: Bytes) -> Result<UploadTask> {
        info!("upload {} ({} bytes)", name, data.len());
        Ok(self.blobs.upload(name, data).await?)
    }

    /// Resolve a fetchable URL for a stored binary
    pub async fn download_url(&self, name: &str) -> Result<String> {
        Ok(self.blobs.download_url(name).await?)
    }

    /// Stream a stored binary, with its content type if known
    pub async fn download(&self, name: &str) -> Result<(ByteStream, Option<String>)> {
        Ok(self.blobs.download(name).await?)
    }

    /// Fetch a stored binary's metadata without the body
    pub async fn blob_info(&self, name: &str) -> Result<BlobInfo> {
        Ok(self.blobs.head(name).await?)
    }

    /// Whether any record carries the given blob name
    ///
    /// A store-reported not-found collapses to `false`; any other store
    /// failure propagates unchanged.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        match self.documents.find_by_name(name).await {
            Ok(records) => Ok(!records.is_empty()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a record and its binary
    ///
    /// Order is fixed: blob first, then document. A failure in between
    /// leaves the record without its binary.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let record = self
            .documents
            .get(id)
            .await?
            .ok_or_else(|| ImagesError::NotFound(id.to_string()))?;

        debug!("delete image {} (blob {})", record.id, record.name);
        self.blobs.delete(&record.name).await?;
        self.documents.delete(&record.id).await?;
        Ok(())
    }

    /// Replace the entire catalog with the given records
    ///
    /// Existing records whose id reappears in the new set lose only their
    /// document; their binary stays for the incoming record to reuse. All
    /// other existing records lose document and binary. Deletions run
    /// concurrently and every one is awaited before the inserts start.
    pub async fn overwrite_all(&self, records: Vec<ImageRecord>) -> Result<Vec<ImageRecord>> {
        let existing = self.documents.get_all().await?;
        let incoming_ids: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();

        info!(
            "overwrite catalog: {} existing, {} incoming",
            existing.len(),
            records.len()
        );

        let deletions = existing.iter().map(|record| {
            let keep_blob = incoming_ids.contains(&record.id);
            async move {
                if !keep_blob {
                    self.blobs.delete(&record.name).await?;
                }
                self.documents.delete(&record.id).await
            }
        });
        join_all(deletions)
            .await
            .into_iter()
            .collect::<pictor_store::Result<()>>()?;

        self.create_many(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::{Duration, Utc};
    use pictor_store::{StoreError, UploadProgress};
    use tokio::sync::watch;

    #[derive(Clone, Copy, Default)]
    enum FindBehavior {
        #[default]
        Normal,
        NotFound,
        Backend,
    }

    #[derive(Default)]
    struct MemoryDocumentStore {
        records: Mutex<HashMap<String, ImageRecord>>,
        find_behavior: FindBehavior,
    }

    impl MemoryDocumentStore {
        fn with_find_behavior(behavior: FindBehavior) -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                find_behavior: behavior,
            }
        }

        fn contains(&self, id: &str) -> bool {
            self.records.lock().unwrap().contains_key(id)
        }
    }

    #[async_trait::async_trait]
    impl DocumentStore for MemoryDocumentStore {
        async fn get(&self, id: &str) -> pictor_store::Result<Option<ImageRecord>> {
            Ok(self.records.lock().unwrap().get(id).cloned())
        }

        async fn get_all(&self) -> pictor_store::Result<Vec<ImageRecord>> {
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }

        async fn find_by_name(&self, name: &str) -> pictor_store::Result<Vec<ImageRecord>> {
            match self.find_behavior {
                FindBehavior::NotFound => Err(StoreError::not_found(name)),
                FindBehavior::Backend => Err(StoreError::backend("query rejected")),
                FindBehavior::Normal => Ok(self
                    .records
                    .lock()
                    .unwrap()
                    .values()
                    .filter(|r| r.name == name)
                    .cloned()
                    .collect()),
            }
        }

        async fn upsert(&self, record: &ImageRecord) -> pictor_store::Result<()> {
            self.records
                .lock()
                .unwrap()
                .insert(record.id.clone(), record.clone());
            Ok(())
        }

        async fn delete(&self, id: &str) -> pictor_store::Result<()> {
            self.records.lock().unwrap().remove(id);
            Ok(())
        }
    }

    struct MemoryBlobStore {
        objects: Mutex<HashSet<String>>,
    }

    impl MemoryBlobStore {
        fn new() -> Self {
            Self {
                objects: Mutex::new(HashSet::new()),
            }
        }

        fn with_object(self, name: &str) -> Self {
            self.objects.lock().unwrap().insert(name.to_string());
            self
        }

        fn contains(&self, name: &str) -> bool {
            self.objects.lock().unwrap().contains(name)
        }
    }

    fn blob_info(name: &str, size: i64) -> BlobInfo {
        BlobInfo {
            pathname: name.to_string(),
            key: format!("images/{}", name),
            content_type: "application/octet-stream".to_string(),
            size,
            uploaded_at: Utc::now(),
        }
    }

    #[async_trait::async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn upload(&self, name: &str, data: Bytes) -> pictor_store::Result<UploadTask> {
            self.objects.lock().unwrap().insert(name.to_string());
            let total = data.len() as u64;
            let (tx, rx) = watch::channel(UploadProgress::starting(total));
            let info = blob_info(name, total as i64);
            let handle = tokio::spawn(async move {
                tx.send_replace(UploadProgress {
                    bytes_transferred: total,
                    total_bytes: total,
                });
                Ok(info)
            });
            Ok(UploadTask::new(rx, handle))
        }

        async fn delete(&self, name: &str) -> pictor_store::Result<()> {
            self.objects.lock().unwrap().remove(name);
            Ok(())
        }

        async fn download_url(&self, name: &str) -> pictor_store::Result<String> {
            Ok(format!("https://blobs.test/images/{}", name))
        }

        async fn download(
            &self,
            name: &str,
        ) -> pictor_store::Result<(ByteStream, Option<String>)> {
            if !self.objects.lock().unwrap().contains(name) {
                return Err(StoreError::not_found(name));
            }
            let stream = futures::stream::iter(vec![Ok(Bytes::from_static(b"data"))]);
            Ok((
                Box::new(stream) as ByteStream,
                Some("application/octet-stream".to_string()),
            ))
        }

        async fn head(&self, name: &str) -> pictor_store::Result<BlobInfo> {
            if self.objects.lock().unwrap().contains(name) {
                Ok(blob_info(name, 4))
            } else {
                Err(StoreError::not_found(name))
            }
        }
    }

    fn record_at(id: &str, name: &str, offset_secs: i64) -> ImageRecord {
        let mut record = ImageRecord::new(id, name);
        record.updated_at = Utc::now() + Duration::seconds(offset_secs);
        record
    }

    #[tokio::test]
    async fn test_create_stamps_updated_at() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs.clone(), blobs);

        let before = Utc::now();
        let stale = record_at("img-1", "sunset.png", -86_400);

        let stored = service.create(stale).await.unwrap();
        assert!(stored.updated_at >= before);
        assert!(docs.contains("img-1"));
    }

    #[tokio::test]
    async fn test_create_many_persists_every_record() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs.clone(), blobs);

        let records = vec![
            ImageRecord::new("a", "a.png"),
            ImageRecord::new("b", "b.png"),
            ImageRecord::new("c", "c.png"),
        ];
        let stored = service.create_many(records).await.unwrap();

        assert_eq!(stored.len(), 3);
        for id in ["a", "b", "c"] {
            assert!(docs.contains(id));
        }
    }

    #[tokio::test]
    async fn test_get_all_sorts_oldest_first() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs.clone(), blobs);

        docs.upsert(&record_at("newest", "n.png", 30)).await.unwrap();
        docs.upsert(&record_at("oldest", "o.png", -30)).await.unwrap();
        docs.upsert(&record_at("middle", "m.png", 0)).await.unwrap();

        let records = service.get_all().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["oldest", "middle", "newest"]);
    }

    #[tokio::test]
    async fn test_get_by_id_reports_absence_as_none() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs.clone(), blobs);

        docs.upsert(&ImageRecord::new("img-1", "sunset.png"))
            .await
            .unwrap();

        assert!(service.get_by_id("img-1").await.unwrap().is_some());
        assert!(service.get_by_id("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_true_for_matching_record() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs.clone(), blobs);

        docs.upsert(&ImageRecord::new("img-1", "sunset.png"))
            .await
            .unwrap();

        assert!(service.exists("sunset.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_false_when_no_record_matches() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs, blobs);

        assert!(!service.exists("ghost.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_collapses_store_not_found() {
        let docs = Arc::new(MemoryDocumentStore::with_find_behavior(
            FindBehavior::NotFound,
        ));
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs, blobs);

        assert!(!service.exists("sunset.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_propagates_other_store_errors() {
        let docs = Arc::new(MemoryDocumentStore::with_find_behavior(
            FindBehavior::Backend,
        ));
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs, blobs);

        let err = service.exists("sunset.png").await.unwrap_err();
        assert!(matches!(err, ImagesError::Store(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_blob() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new().with_object("sunset.png"));
        let service = ImageService::new(docs.clone(), blobs.clone());

        docs.upsert(&ImageRecord::new("img-1", "sunset.png"))
            .await
            .unwrap();

        service.delete("img-1").await.unwrap();
        assert!(!docs.contains("img-1"));
        assert!(!blobs.contains("sunset.png"));
    }

    #[tokio::test]
    async fn test_delete_missing_record_is_not_found() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs, blobs);

        let err = service.delete("ghost").await.unwrap_err();
        assert!(matches!(err, ImagesError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_overwrite_all_replaces_catalog() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(
            MemoryBlobStore::new()
                .with_object("a.png")
                .with_object("b.png"),
        );
        let service = ImageService::new(docs.clone(), blobs.clone());

        docs.upsert(&ImageRecord::new("a", "a.png")).await.unwrap();
        docs.upsert(&ImageRecord::new("b", "b.png")).await.unwrap();

        // b persists across the overwrite, a is dropped, c is new
        let incoming = vec![ImageRecord::new("b", "b.png"), ImageRecord::new("c", "c.png")];
        let stored = service.overwrite_all(incoming).await.unwrap();

        assert_eq!(stored.len(), 2);
        assert!(!docs.contains("a"));
        assert!(docs.contains("b"));
        assert!(docs.contains("c"));

        // a's binary goes with its record, b's binary survives for reuse
        assert!(!blobs.contains("a.png"));
        assert!(blobs.contains("b.png"));
    }

    #[tokio::test]
    async fn test_overwrite_all_on_empty_catalog_inserts_everything() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs.clone(), blobs);

        let stored = service
            .overwrite_all(vec![ImageRecord::new("a", "a.png")])
            .await
            .unwrap();

        assert_eq!(stored.len(), 1);
        assert!(docs.contains("a"));
    }

    #[tokio::test]
    async fn test_upload_with_progress_completes() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(docs, blobs.clone());

        let task = service
            .upload_with_progress("sunset.png", Bytes::from_static(b"abcd"))
            .await
            .unwrap();
        let progress = task.progress();

        let info = task.await_completion().await.unwrap();
        assert_eq!(info.pathname, "sunset.png");
        assert_eq!(info.size, 4);
        assert!(progress.borrow().is_complete());
        assert!(blobs.contains("sunset.png"));
    }

    #[tokio::test]
    async fn test_download_url_addresses_blob_by_name() {
        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new().with_object("sunset.png"));
        let service = ImageService::new(docs, blobs);

        let url = service.download_url("sunset.png").await.unwrap();
        assert!(url.ends_with("sunset.png"));
    }

    #[tokio::test]
    async fn test_download_streams_stored_blob() {
        use futures::StreamExt;

        let docs = Arc::new(MemoryDocumentStore::default());
        let blobs = Arc::new(MemoryBlobStore::new().with_object("sunset.png"));
        let service = ImageService::new(docs, blobs);

        let (mut stream, content_type) = service.download("sunset.png").await.unwrap();
        assert_eq!(content_type.as_deref(), Some("application/octet-stream"));

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"data");
    }
}

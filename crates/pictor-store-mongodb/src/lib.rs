//! MongoDB implementation of the pictor DocumentStore trait
//!
//! Image records live as documents in a single collection, keyed by `_id`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pictor_store_mongodb::{MongoStore, MongoStoreConfig};
//!
//! # async fn example() -> pictor_store::Result<()> {
//! let config = MongoStoreConfig::new("mongodb://localhost:27017", "pictor");
//! let store = MongoStore::connect(config).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::ClientOptions,
    Client, Collection,
};
use pictor_entities::ImageRecord;
use pictor_store::{DocumentStore, Result, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Default collection name for image records
pub const DEFAULT_COLLECTION: &str = "images";

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

/// Configuration for the MongoDB document store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStoreConfig {
    /// Connection URL (e.g., "mongodb://localhost:27017")
    pub url: String,
    /// Database name
    pub database: String,
    /// Collection holding the image records
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl MongoStoreConfig {
    /// Config with the default `images` collection
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            collection: default_collection(),
        }
    }
}

/// MongoDB document store implementation
pub struct MongoStore {
    client: Client,
    database: String,
    collection: String,
}

impl MongoStore {
    /// Connect to MongoDB and verify the connection
    pub async fn connect(config: MongoStoreConfig) -> Result<Self> {
        debug!("Creating MongoDB store for URL: {}", config.url);

        let client_options = ClientOptions::parse(&config.url).await.map_err(|e| {
            error!("Failed to parse MongoDB URL: {}", e);
            StoreError::ConnectionFailed(format!("Failed to parse MongoDB URL: {}", e))
        })?;

        let client = Client::with_options(client_options).map_err(|e| {
            error!("Failed to create MongoDB client: {}", e);
            StoreError::ConnectionFailed(format!("Failed to create MongoDB client: {}", e))
        })?;

        // Test connection
        client.list_database_names().await.map_err(|e| {
            error!("Failed to connect to MongoDB: {}", e);
            StoreError::ConnectionFailed(format!("Failed to connect to MongoDB: {}", e))
        })?;

        debug!("MongoDB client created successfully");

        Ok(Self {
            client,
            database: config.database,
            collection: config.collection,
        })
    }

    fn records(&self) -> Collection<ImageRecord> {
        self.client
            .database(&self.database)
            .collection(&self.collection)
    }
}

/// Filter matching a single document by key
fn id_filter(id: &str) -> Document {
    doc! { "_id": id }
}

/// Filter matching documents by the `name` field
fn name_filter(name: &str) -> Document {
    doc! { "name": name }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn get(&self, id: &str) -> Result<Option<ImageRecord>> {
        debug!("GET {}/{} _id={}", self.database, self.collection, id);

        self.records().find_one(id_filter(id)).await.map_err(|e| {
            error!("Failed to fetch document {}: {}", id, e);
            StoreError::QueryFailed(format!("Failed to fetch document: {}", e))
        })
    }

    async fn get_all(&self) -> Result<Vec<ImageRecord>> {
        debug!("GET ALL {}/{}", self.database, self.collection);

        let cursor = self.records().find(doc! {}).await.map_err(|e| {
            error!("Failed to list documents: {}", e);
            StoreError::QueryFailed(format!("Failed to list documents: {}", e))
        })?;

        let records: Vec<ImageRecord> = cursor.try_collect().await.map_err(|e| {
            error!("Failed to read document cursor: {}", e);
            StoreError::QueryFailed(format!("Failed to read document cursor: {}", e))
        })?;

        debug!(
            "Found {} documents in {}/{}",
            records.len(),
            self.database,
            self.collection
        );

        Ok(records)
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<ImageRecord>> {
        debug!("QUERY {}/{} name={}", self.database, self.collection, name);

        let cursor = self.records().find(name_filter(name)).await.map_err(|e| {
            error!("Failed to query documents by name '{}': {}", name, e);
            StoreError::QueryFailed(format!("Failed to query documents: {}", e))
        })?;

        cursor.try_collect().await.map_err(|e| {
            error!("Failed to read query cursor: {}", e);
            StoreError::QueryFailed(format!("Failed to read query cursor: {}", e))
        })
    }

    async fn upsert(&self, record: &ImageRecord) -> Result<()> {
        debug!(
            "SET {}/{} _id={}",
            self.database, self.collection, record.id
        );

        self.records()
            .replace_one(id_filter(&record.id), record)
            .upsert(true)
            .await
            .map_err(|e| {
                error!("Failed to upsert document {}: {}", record.id, e);
                StoreError::QueryFailed(format!("Failed to upsert document: {}", e))
            })?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        debug!("DELETE {}/{} _id={}", self.database, self.collection, id);

        self.records()
            .delete_one(id_filter(id))
            .await
            .map_err(|e| {
                error!("Failed to delete document {}: {}", id, e);
                StoreError::QueryFailed(format!("Failed to delete document: {}", e))
            })?;

        Ok(())
    }
}

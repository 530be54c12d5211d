//! MongoDB client and collection wrapper

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::StreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::db::{DocumentCollection, FieldFilter, Page};
use crate::types::{Result, ServiceError};

/// Duplicate key error code reported by the server
const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// A schema that lives in its own collection
pub trait StoredDocument:
    Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata + 'static
{
    /// Collection name
    const COLLECTION: &'static str;

    fn object_id(&self) -> Option<ObjectId>;

    fn set_object_id(&mut self, id: ObjectId);
}

/// Partial filter so unique indexes ignore soft-deleted documents
pub fn live_documents_only() -> Document {
    doc! { "metadata.is_deleted": false }
}

/// Unique index over the given keys, scoped to live documents
pub fn unique_index(keys: Document, name: &str) -> (Document, Option<IndexOptions>) {
    (
        keys,
        Some(
            IndexOptions::builder()
                .unique(true)
                .name(name.to_string())
                .partial_filter_expression(live_documents_only())
                .build(),
        ),
    )
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast on unreachable servers instead of hanging on selection
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ServiceError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T: StoredDocument>(&self) -> Result<MongoCollection<T>> {
        MongoCollection::new(&self.client, &self.db_name, T::COLLECTION).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T: StoredDocument> MongoCollection<T> {
    /// Create a new collection and apply indexes
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    fn live_filter(filter: Document) -> Document {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });
        full_filter
    }
}

#[async_trait]
impl<T: StoredDocument> DocumentCollection<T> for MongoCollection<T> {
    async fn insert(&self, mut item: T) -> Result<ObjectId> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.deleted_at = None;
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| map_write_error(e, "Insert"))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ServiceError::Database("Failed to get inserted ID".into()))
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<T>> {
        self.inner
            .find_one(Self::live_filter(doc! { "_id": id }))
            .await
            .map_err(|e| ServiceError::Database(format!("Find failed: {}", e)))
    }

    async fn find_one(&self, filter: &FieldFilter) -> Result<Option<T>> {
        self.inner
            .find_one(Self::live_filter(filter.to_document()))
            .await
            .map_err(|e| ServiceError::Database(format!("Find failed: {}", e)))
    }

    async fn find_many(&self, filter: &FieldFilter, page: Page) -> Result<Vec<T>> {
        let mut find = self
            .inner
            .find(Self::live_filter(filter.to_document()))
            .sort(doc! { "_id": 1 });
        if let Some(skip) = page.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = page.limit {
            find = find.limit(limit);
        }

        let cursor = find
            .await
            .map_err(|e| ServiceError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    async fn replace(&self, id: &ObjectId, mut item: T) -> Result<bool> {
        item.set_object_id(*id);
        item.mut_metadata().updated_at = Some(DateTime::now());

        let result = self
            .inner
            .replace_one(Self::live_filter(doc! { "_id": id }), item)
            .await
            .map_err(|e| map_write_error(e, "Replace"))?;

        Ok(result.matched_count > 0)
    }

    async fn soft_delete(&self, id: &ObjectId) -> Result<bool> {
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": DateTime::now(),
                "metadata.updated_at": DateTime::now(),
            }
        };

        let result = self
            .inner
            .update_one(Self::live_filter(doc! { "_id": id }), update)
            .await
            .map_err(|e| ServiceError::Database(format!("Update failed: {}", e)))?;

        Ok(result.modified_count > 0)
    }
}

/// Map a write error, surfacing unique index violations as conflicts
fn map_write_error(err: mongodb::error::Error, op: &str) -> ServiceError {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *err.kind {
        if write_error.code == DUPLICATE_KEY {
            let index = duplicate_index_name(&write_error.message).unwrap_or("unknown");
            return ServiceError::duplicate_key(index);
        }
    }
    ServiceError::Database(format!("{} failed: {}", op, err))
}

/// Index name from an E11000 message (`... index: slug_unique dup key: ...`)
fn duplicate_index_name(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once("index: ")?;
    rest.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_index_is_partial() {
        let (keys, opts) = unique_index(doc! { "slug": 1 }, "slug_unique");
        assert_eq!(keys, doc! { "slug": 1 });
        let opts = opts.unwrap();
        assert_eq!(opts.unique, Some(true));
        assert_eq!(opts.partial_filter_expression, Some(live_documents_only()));
    }

    #[test]
    fn test_duplicate_index_name() {
        let message = "E11000 duplicate key error collection: academy.certificates \
                       index: user_course_unique dup key: { user_id: \"u1\", course_slug: \"aws\" }";
        assert_eq!(duplicate_index_name(message), Some("user_course_unique"));
        assert_eq!(duplicate_index_name("E11000 duplicate key error"), None);
    }
}

//! Document data source over a MongoDB connection.
//!
//! Records cross the boundary as relaxed extended JSON, so an `ObjectId`
//! comes back as `{"$oid": "..."}` and can be passed back as an id as is.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Collection;
use serde_json::Value;

use common::models::Record;
use common::{AppError, AppResult};

use super::{DataSource, RecordSource};
use crate::connection::{Connection, MongoDbConnection};

/// Collection CRUD on one database of a MongoDB connection.
#[derive(Clone)]
pub struct MongoDataSource<'c> {
    connection: &'c MongoDbConnection,
    database: String,
}

impl<'c> MongoDataSource<'c> {
    /// Wraps a MongoDB connection, using its configured `database`.
    ///
    /// # Errors
    /// `AppError::UnsupportedOperation` for any other connection kind, and
    /// `AppError::MissingConfigurationKey(["database"])` when the connection
    /// has no default database.
    pub fn new(connection: &'c dyn Connection) -> AppResult<Self> {
        let connection = connection
            .as_any()
            .downcast_ref::<MongoDbConnection>()
            .ok_or_else(|| {
                AppError::UnsupportedOperation(format!(
                    "{} connection {} is not a document store",
                    connection.kind(),
                    connection.name()
                ))
            })?;
        let database = connection
            .params()
            .database
            .clone()
            .ok_or_else(|| AppError::missing_keys(["database"]))?;
        Ok(Self {
            connection,
            database,
        })
    }

    /// Same connection, another database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn collection(&self, name: &str) -> AppResult<Collection<Document>> {
        Ok(self
            .connection
            .client()?
            .database(&self.database)
            .collection::<Document>(name))
    }

    /// Inserts a document and returns its `_id`.
    pub async fn insert(&self, collection: &str, data: &Record) -> AppResult<Value> {
        let result = self
            .collection(collection)?
            .insert_one(to_document(data)?)
            .await?;
        Ok(result.inserted_id.into_relaxed_extjson())
    }

    pub async fn find_by_id(&self, collection: &str, id: &Value) -> AppResult<Option<Record>> {
        let found = self
            .collection(collection)?
            .find_one(doc! { "_id": to_bson(id)? })
            .await?;
        Ok(found.map(to_record))
    }

    /// Every document, optionally restricted by a filter document.
    pub async fn find_all(&self, collection: &str, filter: Option<&Record>) -> AppResult<Vec<Record>> {
        let filter = filter.map(to_document).transpose()?.unwrap_or_default();
        let mut cursor = self.collection(collection)?.find(filter).await?;
        let mut records = Vec::new();
        while cursor.advance().await? {
            records.push(to_record(cursor.deserialize_current()?));
        }
        tracing::debug!(collection = %collection, rows = records.len(), "Documents fetched");
        Ok(records)
    }

    /// `$set`s the given fields on the document with `_id` = `id`.
    /// Returns whether such a document exists.
    pub async fn update(&self, collection: &str, id: &Value, data: &Record) -> AppResult<bool> {
        if data.is_empty() {
            return self.exists(collection, id).await;
        }
        let result = self
            .collection(collection)?
            .update_one(doc! { "_id": to_bson(id)? }, doc! { "$set": to_document(data)? })
            .await?;
        Ok(result.matched_count > 0)
    }

    /// Deletes the document with `_id` = `id`. Returns whether one was deleted.
    pub async fn remove(&self, collection: &str, id: &Value) -> AppResult<bool> {
        let result = self
            .collection(collection)?
            .delete_one(doc! { "_id": to_bson(id)? })
            .await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn count(&self, collection: &str, filter: Option<&Record>) -> AppResult<u64> {
        let filter = filter.map(to_document).transpose()?.unwrap_or_default();
        Ok(self.collection(collection)?.count_documents(filter).await?)
    }

    pub async fn exists(&self, collection: &str, id: &Value) -> AppResult<bool> {
        Ok(self.find_by_id(collection, id).await?.is_some())
    }
}

fn to_bson(value: &Value) -> AppResult<Bson> {
    Bson::try_from(value.clone()).map_err(|e| AppError::Validation(e.to_string()))
}

fn to_document(record: &Record) -> AppResult<Document> {
    match to_bson(&Value::Object(record.clone()))? {
        Bson::Document(document) => Ok(document),
        other => Err(AppError::Validation(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

fn to_record(document: Document) -> Record {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(record) => record,
        _ => Record::new(),
    }
}

#[async_trait]
impl DataSource for MongoDataSource<'_> {
    fn connection(&self) -> &dyn Connection {
        self.connection
    }
}

#[async_trait]
impl RecordSource for MongoDataSource<'_> {
    /// `filter` is a JSON filter document.
    async fn fetch_records(&self, entity: &str, filter: Option<&str>) -> AppResult<Vec<Record>> {
        let filter: Option<Record> = filter.map(serde_json::from_str).transpose()?;
        self.find_all(entity, filter.as_ref()).await
    }
}

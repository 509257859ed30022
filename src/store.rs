use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Attribute holding the record's primary key
const KEY_ATTRIBUTE: &str = "id";

/// A single todo record as stored and served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    /// Externally supplied unique identifier, the store's primary key
    pub id: String,
    /// Display title
    pub title: String,
    /// Completion flag
    pub completed: bool,
}

/// Errors that can occur against the record store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying store call failed; carries the rendered SDK error
    #[error("store request failed: {0}")]
    Upstream(String),

    /// A stored item is missing its key attribute
    #[error("stored item is missing the id attribute")]
    MissingId,
}

/// Key-value store holding todo records keyed by `id`.
///
/// Writes are last-write-wins full replacements; enumeration is a full
/// unordered scan. Implementations must be safe to call concurrently.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by id, `None` if absent
    async fn get(&self, id: &str) -> Result<Option<TodoRecord>, StoreError>;

    /// Upsert a record (an existing id is silently overwritten)
    async fn put(&self, record: &TodoRecord) -> Result<(), StoreError>;

    /// Delete by id; deleting a nonexistent id is not an error
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Return all records, unfiltered and unordered
    async fn scan(&self) -> Result<Vec<TodoRecord>, StoreError>;
}

/// DynamoDB-backed record store
///
/// Each operation is a single call to the table with the SDK's default
/// retry/timeout/consistency behavior.
pub struct DynamoStore {
    client: DynamoClient,
    table: String,
}

impl DynamoStore {
    /// Create a store against the given table
    pub fn new(
        shared_config: &aws_config::SdkConfig,
        table: impl Into<String>,
        endpoint_url: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(shared_config);

        // Custom endpoint for LocalStack / DynamoDB Local
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        let client = DynamoClient::from_conf(builder.build());
        let table = table.into();

        info!(table = %table, "Record store initialized");

        Self { client, table }
    }
}

#[async_trait]
impl RecordStore for DynamoStore {
    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<TodoRecord>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(KEY_ATTRIBUTE, AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Upstream(DisplayErrorContext(e).to_string()))?;

        match output.item() {
            Some(item) => Ok(Some(record_from_item(item)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn put(&self, record: &TodoRecord) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item_from_record(record)))
            .send()
            .await
            .map_err(|e| StoreError::Upstream(DisplayErrorContext(e).to_string()))?;

        debug!(id = %record.id, "Record written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(KEY_ATTRIBUTE, AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Upstream(DisplayErrorContext(e).to_string()))?;

        debug!(id = %id, "Record deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn scan(&self) -> Result<Vec<TodoRecord>, StoreError> {
        let output = self
            .client
            .scan()
            .table_name(&self.table)
            .send()
            .await
            .map_err(|e| StoreError::Upstream(DisplayErrorContext(e).to_string()))?;

        let mut records = Vec::with_capacity(output.items().len());
        for item in output.items() {
            match record_from_item(item) {
                Ok(record) => records.push(record),
                // Rows written outside this service may lack the key attribute
                Err(e) => warn!(error = %e, "Skipping malformed item in scan"),
            }
        }

        Ok(records)
    }
}

/// Marshal a record into a DynamoDB item map
fn item_from_record(record: &TodoRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            KEY_ATTRIBUTE.to_string(),
            AttributeValue::S(record.id.clone()),
        ),
        ("title".to_string(), AttributeValue::S(record.title.clone())),
        (
            "completed".to_string(),
            AttributeValue::Bool(record.completed),
        ),
    ])
}

/// Unmarshal a DynamoDB item map into a record
///
/// Only `id` is required; `title` defaults to empty and `completed` to false
/// so rows written by older tooling still project cleanly. Extra attributes
/// are dropped.
fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<TodoRecord, StoreError> {
    let id = item
        .get(KEY_ATTRIBUTE)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or(StoreError::MissingId)?;

    let title = item
        .get("title")
        .and_then(|v| v.as_s().ok())
        .cloned()
        .unwrap_or_default();

    let completed = item
        .get("completed")
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(false);

    Ok(TodoRecord {
        id,
        title,
        completed,
    })
}

/// In-memory record store
///
/// Backs the test suite and local development without a DynamoDB endpoint.
/// State is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, TodoRecord>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<TodoRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn put(&self, record: &TodoRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.remove(id);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<TodoRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.values().cloned().collect())
    }
}

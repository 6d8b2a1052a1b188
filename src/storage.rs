use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool, query_builder::QueryBuilder};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{DocumentError, DocumentResult};

/// Table layout used by `PostgresDocumentStore`. Applied by `ensure_schema` at startup.
pub const SCHEMA: &str = include_str!("../migrations/0001_documents.sql");

/// Document
///
/// One record in a named collection. The backend owns `id` and both timestamps;
/// `data` is the caller's JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Timestamp column a query is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderField,
    pub direction: Direction,
}

impl OrderBy {
    /// Newest first: the order every news listing uses.
    pub const NEWEST_FIRST: OrderBy = OrderBy {
        field: OrderField::CreatedAt,
        direction: Direction::Descending,
    };

    fn column(&self) -> &'static str {
        match self.field {
            OrderField::CreatedAt => "created_at",
            OrderField::UpdatedAt => "updated_at",
        }
    }

    fn keyword(&self) -> &'static str {
        match self.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// Returns a modification time strictly after `previous`, even when the clock has
/// not advanced (or has stepped backwards) since the last write.
pub fn next_update_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    let floor = previous + Duration::microseconds(1);
    if now > floor { now } else { floor }
}

// 1. DocumentStore Contract
/// DocumentStore
///
/// The hosted document database as seen by the persisted Article Store: exactly four
/// primitives, each scoped to a collection name. Swapping the Postgres implementation
/// for the in-memory mock requires no change to the store built on top.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts `data` as a new document and returns its backend-assigned id.
    /// Both timestamps are set to the insertion time.
    async fn add_document(&self, collection: &str, data: Map<String, Value>) -> DocumentResult<String>;

    /// Shallow-merges `changes` into an existing document and advances `updated_at`.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        changes: Map<String, Value>,
    ) -> DocumentResult<()>;

    /// Removes a document permanently.
    async fn delete_document(&self, collection: &str, id: &str) -> DocumentResult<()>;

    /// Returns every document of the collection in the requested order.
    async fn query_ordered(&self, collection: &str, order: OrderBy) -> DocumentResult<Vec<Document>>;
}

/// DocumentState
///
/// The shared handle to whichever document backend was configured.
pub type DocumentState = Arc<dyn DocumentStore>;

// 2. The Real Implementation (Postgres JSONB)
/// PostgresDocumentStore
///
/// Stores every collection in a single `documents` table keyed by `(collection, id)`,
/// with the body kept as JSONB so article fields can evolve without migrations.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        let data = match row.data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Document {
            id: row.id,
            data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `documents` table if it is missing. Safe to call on every start.
    pub async fn ensure_schema(&self) -> DocumentResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn add_document(&self, collection: &str, data: Map<String, Value>) -> DocumentResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO documents (collection, id, data, created_at, updated_at) VALUES ($1, $2, $3, NOW(), NOW())",
        )
        .bind(collection)
        .bind(&id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("add_document error: {:?}", e);
            DocumentError::from(e)
        })?;
        Ok(id)
    }

    /// Uses JSONB concatenation for the merge, so only the supplied keys change.
    /// `GREATEST` keeps `updated_at` strictly increasing across back-to-back writes.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        changes: Map<String, Value>,
    ) -> DocumentResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = data || $3,
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(changes))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("update_document error: {:?}", e);
            DocumentError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("delete_document error: {:?}", e);
                DocumentError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    async fn query_ordered(&self, collection: &str, order: OrderBy) -> DocumentResult<Vec<Document>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, data, created_at, updated_at FROM documents WHERE collection = ",
        );
        builder.push_bind(collection);
        // Column and direction come from closed enums, never from input.
        builder.push(" ORDER BY ");
        builder.push(order.column());
        builder.push(" ");
        builder.push(order.keyword());
        builder.push(", id ASC");

        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("query_ordered error: {:?}", e);
                DocumentError::from(e)
            })?;

        Ok(rows.into_iter().map(Document::from).collect())
    }
}

fn not_found(collection: &str, id: &str) -> DocumentError {
    DocumentError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

// 3. The Mock Implementation (For Tests and Offline Runs)
/// MockDocumentStore
///
/// An in-memory `DocumentStore` used to exercise the persisted Article Store without a
/// database. It can be flipped into a failing mode at any time to simulate an
/// unreachable backend.
#[derive(Default)]
pub struct MockDocumentStore {
    documents: Mutex<Vec<(String, Document)>>,
    failing: AtomicBool,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    /// When true, all operations return `DocumentError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> DocumentResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DocumentError::Unavailable(
                "Mock Document Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn add_document(&self, collection: &str, data: Map<String, Value>) -> DocumentResult<String> {
        self.check_available()?;
        let mut documents = self.documents.lock().await;
        // Insertion order must survive a created_at sort, so never reuse a timestamp.
        let now = documents
            .iter()
            .map(|(_, d)| d.created_at)
            .max()
            .map_or_else(Utc::now, next_update_time);
        let id = Uuid::new_v4().to_string();
        let doc = Document {
            id: id.clone(),
            data,
            created_at: now,
            updated_at: now,
        };
        documents.push((collection.to_string(), doc));
        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        changes: Map<String, Value>,
    ) -> DocumentResult<()> {
        self.check_available()?;
        let mut documents = self.documents.lock().await;
        let (_, doc) = documents
            .iter_mut()
            .find(|(c, d)| c == collection && d.id == id)
            .ok_or_else(|| not_found(collection, id))?;
        doc.data.extend(changes);
        doc.updated_at = next_update_time(doc.updated_at);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentResult<()> {
        self.check_available()?;
        let mut documents = self.documents.lock().await;
        let position = documents
            .iter()
            .position(|(c, d)| c == collection && d.id == id)
            .ok_or_else(|| not_found(collection, id))?;
        documents.remove(position);
        Ok(())
    }

    async fn query_ordered(&self, collection: &str, order: OrderBy) -> DocumentResult<Vec<Document>> {
        self.check_available()?;
        let mut docs: Vec<Document> = self
            .documents
            .lock()
            .await
            .iter()
            .filter(|(c, _)| c == collection)
            .map(|(_, d)| d.clone())
            .collect();

        docs.sort_by(|a, b| {
            let (left, right) = match order.field {
                OrderField::CreatedAt => (a.created_at, b.created_at),
                OrderField::UpdatedAt => (a.updated_at, b.updated_at),
            };
            let ordering = match order.direction {
                Direction::Ascending => left.cmp(&right),
                Direction::Descending => right.cmp(&left),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        });
        Ok(docs)
    }
}

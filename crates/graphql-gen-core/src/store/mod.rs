//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the narrow interface consumed by the
//! embedding service and the dynamic generator: topK similarity search
//! plus structured metadata/column filters, and a schema-SDL sidecar used
//! by the incremental embed path. Implementations must be `Send + Sync` to
//! work with async runtimes and concurrent generation requests against the
//! same store.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{EmbeddingDocument, StoredDocument};

/// Fixed sentinel id under which the schema SDL sidecar is stored,
/// distinct from any content-addressed document id.
pub const SCHEMA_SDL_SENTINEL_ID: &str = "__schema_sdl__";

/// A structured metadata/column filter operator.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    Neq(Value),
    In(Vec<Value>),
    Exists(bool),
}

/// A single filter over either a promoted top-level column or a nested
/// metadata key.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter { field: field.into(), op: FilterOp::Eq(value.into()) }
    }

    pub fn neq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter { field: field.into(), op: FilterOp::Neq(value.into()) }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Filter { field: field.into(), op: FilterOp::In(values) }
    }

    pub fn exists(field: impl Into<String>, should_exist: bool) -> Self {
        Filter { field: field.into(), op: FilterOp::Exists(should_exist) }
    }
}

/// The set of [`EmbeddingDocument`] columns every backend must be able to
/// promote to a filterable top-level column (§4.4, §9 "Filter column
/// promotion"). A document-style backend promotes these to top-level
/// metadata; a SQL backend materializes them as indexed columns.
pub const PROMOTED_COLUMNS: &[&str] = &[
    "type",
    "name",
    "parentType",
    "fieldType",
    "isRootOperationField",
    "rootOperationType",
    "kind",
    "chunkIndex",
    "totalChunks",
];

/// Search options accepted by [`VectorStore::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: usize,
    /// Filters over nested metadata keys not in [`PROMOTED_COLUMNS`].
    pub metadata_filters: Vec<Filter>,
    /// Filters over the promoted top-level columns.
    pub column_filters: Vec<Filter>,
}

/// A single search result: a stored document plus its similarity score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: EmbeddingDocument,
    pub score: f64,
}

/// Abstraction over one of {local embedded DB with vector extension,
/// remote SQL DB with vector extension, hosted managed vector index}.
///
/// Similarity scores are non-decreasing in relevance and comparable within
/// one search, but not comparable across backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent: verifies connectivity, creates the table/namespace, and
    /// ensures the table name is reusable.
    async fn initialize(&self, table: &str) -> anyhow::Result<()>;

    /// Upsert documents with their embeddings, in implementation-chosen
    /// batch sizes. Near-zero vectors (from metadata-only lookups) must be
    /// accepted; backends that reject all-zero vectors should substitute
    /// [`crate::embedding::ZERO_VECTOR_EPSILON`] before storing.
    async fn store(&self, table: &str, documents: &[StoredDocument]) -> anyhow::Result<()>;

    /// Return up to `options.limit` results ordered by descending
    /// similarity score, matching all of `options.metadata_filters` and
    /// `options.column_filters`.
    async fn search(&self, table: &str, vector: &[f32], options: &SearchOptions) -> anyhow::Result<Vec<SearchResult>>;

    /// Delete documents by id.
    async fn delete(&self, table: &str, ids: &[String]) -> anyhow::Result<()>;

    /// Remove all stored documents (and the SDL sidecar) in `table`.
    async fn clear(&self, table: &str) -> anyhow::Result<()>;

    /// Count stored documents in `table`, excluding the SDL sidecar.
    async fn count(&self, table: &str) -> anyhow::Result<usize>;

    /// Enumerate known non-empty namespaces, excluding the sentinel id
    /// from per-table counts.
    async fn list_tables(&self) -> anyhow::Result<Vec<String>>;

    /// Store the full SDL text at the fixed sentinel id, used as prior
    /// state for the next incremental embed.
    async fn store_schema_sdl(&self, table: &str, sdl: &str) -> anyhow::Result<()>;

    /// Fetch the previously stored SDL sidecar, if any.
    async fn get_schema_sdl(&self, table: &str) -> anyhow::Result<Option<String>>;

    /// Release any held resources (connections, handles).
    async fn close(&self) -> anyhow::Result<()>;
}

//! SQLite-backed [`VectorStore`] implementation.
//!
//! One physical table (`gql_documents`) holds every namespace, keyed by
//! `(namespace, id)`; promoted columns (§ store module doc) are materialized
//! as real SQL columns for indexing, but — exactly like
//! [`graphql_gen_core::store::memory::InMemoryVectorStore`] — `search` still
//! fetches every row in the namespace and applies filters and cosine
//! similarity in Rust rather than pushing them into the `WHERE` clause. A
//! sidecar table (`gql_schema_sdl`) holds the prior-SDL text used by the
//! incremental embed path.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use graphql_gen_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use graphql_gen_core::models::{EmbeddingDocument, StoredDocument};
use graphql_gen_core::store::{Filter, FilterOp, SearchOptions, SearchResult, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(dead_code)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Read a [`Filter`]'s target field off a document, covering both the
/// promoted top-level columns and nested metadata keys. Mirrors
/// `InMemoryVectorStore`'s `field_value` exactly so the two backends agree.
fn field_value(doc: &EmbeddingDocument, field: &str) -> Option<Value> {
    let meta = &doc.metadata;
    match field {
        "type" => Some(Value::String(doc.doc_type.to_string())),
        "name" => Some(Value::String(doc.name.clone())),
        "parentType" => meta.parent_type.clone().map(Value::String),
        "fieldType" => meta.field_type.clone().map(Value::String),
        "isRootOperationField" => Some(Value::Bool(meta.is_root_operation_field)),
        "rootOperationType" => meta.root_operation_type.clone().map(Value::String),
        "kind" => meta.kind.clone().map(Value::String),
        "chunkIndex" => meta.chunk_index.map(|v| Value::Number(v.into())),
        "totalChunks" => meta.total_chunks.map(|v| Value::Number(v.into())),
        other => {
            tracing::trace!(field = other, "filter on non-promoted key treated as absent");
            None
        }
    }
}

fn matches_filter(doc: &EmbeddingDocument, filter: &Filter) -> bool {
    let value = field_value(doc, &filter.field);
    match &filter.op {
        FilterOp::Eq(expected) => value.as_ref() == Some(expected),
        FilterOp::Neq(expected) => value.as_ref() != Some(expected),
        FilterOp::In(options) => value.map(|v| options.contains(&v)).unwrap_or(false),
        FilterOp::Exists(should_exist) => value.is_some() == *should_exist,
    }
}

fn matches_all(doc: &EmbeddingDocument, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches_filter(doc, f))
}

fn row_to_stored(row: &sqlx::sqlite::SqliteRow) -> Result<StoredDocument> {
    let document_json: String = row.get("document_json");
    let document: EmbeddingDocument = serde_json::from_str(&document_json)?;
    let blob: Vec<u8> = row.get("embedding");
    Ok(StoredDocument { document, embedding: blob_to_vec(&blob) })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn initialize(&self, _table: &str) -> Result<()> {
        // Tables are created by `migrate::run_migrations`; a namespace
        // needs no per-table setup beyond that.
        Ok(())
    }

    async fn store(&self, table: &str, documents: &[StoredDocument]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for doc in documents {
            let d = &doc.document;
            let meta = &d.metadata;
            let document_json = serde_json::to_string(d)?;
            let blob = vec_to_blob(&doc.embedding);

            sqlx::query(
                r#"
                INSERT INTO gql_documents (
                    namespace, id, doc_type, name, parent_type, field_type,
                    is_root_operation_field, root_operation_type, kind,
                    chunk_index, total_chunks, document_json, embedding
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(namespace, id) DO UPDATE SET
                    doc_type = excluded.doc_type,
                    name = excluded.name,
                    parent_type = excluded.parent_type,
                    field_type = excluded.field_type,
                    is_root_operation_field = excluded.is_root_operation_field,
                    root_operation_type = excluded.root_operation_type,
                    kind = excluded.kind,
                    chunk_index = excluded.chunk_index,
                    total_chunks = excluded.total_chunks,
                    document_json = excluded.document_json,
                    embedding = excluded.embedding
                "#,
            )
            .bind(table)
            .bind(&d.id)
            .bind(d.doc_type.to_string())
            .bind(&d.name)
            .bind(&meta.parent_type)
            .bind(&meta.field_type)
            .bind(meta.is_root_operation_field)
            .bind(&meta.root_operation_type)
            .bind(&meta.kind)
            .bind(meta.chunk_index.map(|v| v as i64))
            .bind(meta.total_chunks.map(|v| v as i64))
            .bind(document_json)
            .bind(blob)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, table: &str, vector: &[f32], options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query("SELECT document_json, embedding FROM gql_documents WHERE namespace = ?")
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut results: Vec<SearchResult> = Vec::with_capacity(rows.len());
        for row in &rows {
            let stored = row_to_stored(row)?;
            if !matches_all(&stored.document, &options.metadata_filters) {
                continue;
            }
            if !matches_all(&stored.document, &options.column_filters) {
                continue;
            }
            let score = cosine_similarity(vector, &stored.embedding) as f64;
            results.push(SearchResult { document: stored.document, score });
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if options.limit > 0 {
            results.truncate(options.limit);
        }
        Ok(results)
    }

    async fn delete(&self, table: &str, ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM gql_documents WHERE namespace = ? AND id = ?")
                .bind(table)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, table: &str) -> Result<()> {
        sqlx::query("DELETE FROM gql_documents WHERE namespace = ?").bind(table).execute(&self.pool).await?;
        sqlx::query("DELETE FROM gql_schema_sdl WHERE namespace = ?").bind(table).execute(&self.pool).await?;
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gql_documents WHERE namespace = ?")
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT namespace FROM gql_documents").fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn store_schema_sdl(&self, table: &str, sdl: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gql_schema_sdl (namespace, sdl) VALUES (?, ?)
            ON CONFLICT(namespace) DO UPDATE SET sdl = excluded.sdl
            "#,
        )
        .bind(table)
        .bind(sdl)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_schema_sdl(&self, table: &str) -> Result<Option<String>> {
        let sdl: Option<String> =
            sqlx::query_scalar("SELECT sdl FROM gql_schema_sdl WHERE namespace = ?").bind(table).fetch_optional(&self.pool).await?;
        Ok(sdl)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphql_gen_core::models::{DocumentMetadata, DocumentType};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_store() -> SqliteVectorStore {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await.unwrap();

        sqlx::query(
            r#"
            CREATE TABLE gql_documents (
                namespace TEXT NOT NULL,
                id TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                name TEXT NOT NULL,
                parent_type TEXT,
                field_type TEXT,
                is_root_operation_field INTEGER NOT NULL DEFAULT 0,
                root_operation_type TEXT,
                kind TEXT,
                chunk_index INTEGER,
                total_chunks INTEGER,
                document_json TEXT NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (namespace, id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE gql_schema_sdl (namespace TEXT PRIMARY KEY, sdl TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        SqliteVectorStore::new(pool)
    }

    fn doc(id: &str, name: &str, parent_type: Option<&str>, embedding: Vec<f32>) -> StoredDocument {
        StoredDocument {
            document: EmbeddingDocument {
                id: id.to_string(),
                doc_type: DocumentType::Field,
                name: name.to_string(),
                description: None,
                content: format!("{}.{}", parent_type.unwrap_or("X"), name),
                metadata: DocumentMetadata { parent_type: parent_type.map(str::to_string), ..Default::default() },
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn store_and_search_orders_by_similarity() {
        let store = test_store().await;
        store.initialize("schema").await.unwrap();
        store
            .store("schema", &[doc("a", "fieldA", Some("Query"), vec![1.0, 0.0]), doc("b", "fieldB", Some("Query"), vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store.search("schema", &[1.0, 0.0], &SearchOptions { limit: 10, ..Default::default() }).await.unwrap();
        assert_eq!(results[0].document.id, "a");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn column_filter_restricts_results() {
        let store = test_store().await;
        store.initialize("schema").await.unwrap();
        store
            .store("schema", &[doc("a", "fieldA", Some("Query"), vec![1.0, 0.0]), doc("b", "fieldB", Some("Mutation"), vec![1.0, 0.0])])
            .await
            .unwrap();

        let options =
            SearchOptions { limit: 10, column_filters: vec![Filter::eq("parentType", "Mutation")], ..Default::default() };
        let results = store.search("schema", &[1.0, 0.0], &options).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "b");
    }

    #[tokio::test]
    async fn store_upsert_replaces_existing_row() {
        let store = test_store().await;
        store.initialize("schema").await.unwrap();
        store.store("schema", &[doc("a", "fieldA", Some("Query"), vec![1.0, 0.0])]).await.unwrap();
        store.store("schema", &[doc("a", "fieldA", Some("Mutation"), vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(store.count("schema").await.unwrap(), 1);
        let results = store.search("schema", &[0.0, 1.0], &Default::default()).await.unwrap();
        assert_eq!(results[0].document.metadata.parent_type.as_deref(), Some("Mutation"));
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let store = test_store().await;
        store.initialize("schema").await.unwrap();
        store.store("schema", &[doc("a", "fieldA", Some("Query"), vec![1.0])]).await.unwrap();
        store.delete("schema", &["a".to_string()]).await.unwrap();
        assert_eq!(store.count("schema").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn schema_sdl_sidecar_roundtrips() {
        let store = test_store().await;
        store.store_schema_sdl("schema", "type Query { noop: Boolean }").await.unwrap();
        let sdl = store.get_schema_sdl("schema").await.unwrap();
        assert_eq!(sdl.as_deref(), Some("type Query { noop: Boolean }"));
    }

    #[tokio::test]
    async fn clear_empties_table_and_sidecar() {
        let store = test_store().await;
        store.store("schema", &[doc("a", "fieldA", Some("Query"), vec![1.0])]).await.unwrap();
        store.store_schema_sdl("schema", "sdl").await.unwrap();
        store.clear("schema").await.unwrap();
        assert_eq!(store.count("schema").await.unwrap(), 0);
        assert_eq!(store.get_schema_sdl("schema").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_tables_excludes_empty_namespaces() {
        let store = test_store().await;
        store.store("full", &[doc("a", "fieldA", Some("Query"), vec![1.0])]).await.unwrap();
        let tables = store.list_tables().await.unwrap();
        assert_eq!(tables, vec!["full".to_string()]);
    }
}

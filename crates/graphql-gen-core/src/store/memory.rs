//! In-memory [`VectorStore`] implementation for testing.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Search is
//! brute-force cosine similarity over all stored vectors in a table,
//! exactly the approach the SQLite-backed store in the app crate also
//! uses (no index structure, just a linear scan + sort + truncate).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::embedding::cosine_similarity;
use crate::models::StoredDocument;

use super::{Filter, FilterOp, SearchOptions, SearchResult, VectorStore, SCHEMA_SDL_SENTINEL_ID};

#[derive(Default)]
struct Table {
    documents: HashMap<String, StoredDocument>,
    sdl: Option<String>,
}

/// Reference/test [`VectorStore`] backend. Not persisted across process
/// restarts.
#[derive(Default)]
pub struct InMemoryVectorStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read a [`Filter`]'s target field off a document, covering both the
/// promoted top-level columns and nested metadata keys.
fn field_value(doc: &StoredDocument, field: &str) -> Option<Value> {
    let meta = &doc.document.metadata;
    match field {
        "type" => Some(Value::String(doc.document.doc_type.to_string())),
        "name" => Some(Value::String(doc.document.name.clone())),
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

fn matches_filter(doc: &StoredDocument, filter: &Filter) -> bool {
    let value = field_value(doc, &filter.field);
    match &filter.op {
        FilterOp::Eq(expected) => value.as_ref() == Some(expected),
        FilterOp::Neq(expected) => value.as_ref() != Some(expected),
        FilterOp::In(options) => value.map(|v| options.contains(&v)).unwrap_or(false),
        FilterOp::Exists(should_exist) => value.is_some() == *should_exist,
    }
}

fn matches_all(doc: &StoredDocument, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches_filter(doc, f))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self, table: &str) -> anyhow::Result<()> {
        self.tables.write().unwrap().entry(table.to_string()).or_default();
        Ok(())
    }

    async fn store(&self, table: &str, documents: &[StoredDocument]) -> anyhow::Result<()> {
        let mut tables = self.tables.write().unwrap();
        let t = tables.entry(table.to_string()).or_default();
        for doc in documents {
            t.documents.insert(doc.document.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn search(&self, table: &str, vector: &[f32], options: &SearchOptions) -> anyhow::Result<Vec<SearchResult>> {
        let tables = self.tables.read().unwrap();
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<SearchResult> = t
            .documents
            .values()
            .filter(|doc| matches_all(doc, &options.metadata_filters))
            .filter(|doc| matches_all(doc, &options.column_filters))
            .map(|doc| SearchResult {
                document: doc.document.clone(),
                score: cosine_similarity(vector, &doc.embedding) as f64,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if options.limit > 0 {
            results.truncate(options.limit);
        }
        Ok(results)
    }

    async fn delete(&self, table: &str, ids: &[String]) -> anyhow::Result<()> {
        let mut tables = self.tables.write().unwrap();
        if let Some(t) = tables.get_mut(table) {
            for id in ids {
                t.documents.remove(id);
            }
        }
        Ok(())
    }

    async fn clear(&self, table: &str) -> anyhow::Result<()> {
        let mut tables = self.tables.write().unwrap();
        if let Some(t) = tables.get_mut(table) {
            t.documents.clear();
            t.sdl = None;
        }
        Ok(())
    }

    async fn count(&self, table: &str) -> anyhow::Result<usize> {
        let tables = self.tables.read().unwrap();
        Ok(tables.get(table).map(|t| t.documents.len()).unwrap_or(0))
    }

    async fn list_tables(&self) -> anyhow::Result<Vec<String>> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .iter()
            .filter(|(_, t)| !t.documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn store_schema_sdl(&self, table: &str, sdl: &str) -> anyhow::Result<()> {
        let mut tables = self.tables.write().unwrap();
        let t = tables.entry(table.to_string()).or_default();
        t.sdl = Some(sdl.to_string());
        let _ = SCHEMA_SDL_SENTINEL_ID;
        Ok(())
    }

    async fn get_schema_sdl(&self, table: &str) -> anyhow::Result<Option<String>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.get(table).and_then(|t| t.sdl.clone()))
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, DocumentType, EmbeddingDocument};

    fn doc(id: &str, name: &str, parent_type: Option<&str>, embedding: Vec<f32>) -> StoredDocument {
        StoredDocument {
            document: EmbeddingDocument {
                id: id.to_string(),
                doc_type: DocumentType::Field,
                name: name.to_string(),
                description: None,
                content: format!("{}.{}", parent_type.unwrap_or("X"), name),
                metadata: DocumentMetadata {
                    parent_type: parent_type.map(str::to_string),
                    ..Default::default()
                },
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn store_and_search_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        store.initialize("schema").await.unwrap();
        store
            .store(
                "schema",
                &[
                    doc("a", "fieldA", Some("Query"), vec![1.0, 0.0]),
                    doc("b", "fieldB", Some("Query"), vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search("schema", &[1.0, 0.0], &SearchOptions { limit: 10, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(results[0].document.id, "a");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn column_filter_restricts_results() {
        let store = InMemoryVectorStore::new();
        store.initialize("schema").await.unwrap();
        store
            .store(
                "schema",
                &[
                    doc("a", "fieldA", Some("Query"), vec![1.0, 0.0]),
                    doc("b", "fieldB", Some("Mutation"), vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let options = SearchOptions {
            limit: 10,
            column_filters: vec![Filter::eq("parentType", "Mutation")],
            ..Default::default()
        };
        let results = store.search("schema", &[1.0, 0.0], &options).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "b");
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let store = InMemoryVectorStore::new();
        store.initialize("schema").await.unwrap();
        store.store("schema", &[doc("a", "fieldA", Some("Query"), vec![1.0])]).await.unwrap();
        store.delete("schema", &["a".to_string()]).await.unwrap();
        assert_eq!(store.count("schema").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn schema_sdl_sidecar_roundtrips() {
        let store = InMemoryVectorStore::new();
        store.initialize("schema").await.unwrap();
        store.store_schema_sdl("schema", "type Query { noop: Boolean }").await.unwrap();
        let sdl = store.get_schema_sdl("schema").await.unwrap();
        assert_eq!(sdl.as_deref(), Some("type Query { noop: Boolean }"));
    }

    #[tokio::test]
    async fn clear_empties_table_and_sidecar() {
        let store = InMemoryVectorStore::new();
        store.initialize("schema").await.unwrap();
        store.store("schema", &[doc("a", "fieldA", Some("Query"), vec![1.0])]).await.unwrap();
        store.store_schema_sdl("schema", "sdl").await.unwrap();
        store.clear("schema").await.unwrap();
        assert_eq!(store.count("schema").await.unwrap(), 0);
        assert_eq!(store.get_schema_sdl("schema").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_tables_excludes_empty_namespaces() {
        let store = InMemoryVectorStore::new();
        store.initialize("empty").await.unwrap();
        store.initialize("full").await.unwrap();
        store.store("full", &[doc("a", "fieldA", Some("Query"), vec![1.0])]).await.unwrap();
        let tables = store.list_tables().await.unwrap();
        assert_eq!(tables, vec!["full".to_string()]);
    }
}

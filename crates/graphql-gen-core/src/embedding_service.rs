//! Embedding service: mediates between parser output and the vector store.
//!
//! Generic over [`EmbeddingClient`] and [`VectorStore`], exactly as the
//! dynamic generator is generic over [`VectorStore`] and [`LLMProvider`](crate::llm::LLMProvider) —
//! neither trait is boxed as a trait object here, so a single concrete
//! pairing is monomorphized per call site.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::embedding::{approximate_token_count, EmbeddingClient};
use crate::models::{EmbeddingDocument, StoredDocument};
use crate::parser::{self, ParserError};
use crate::store::VectorStore;

/// Errors from embedding-service operations.
#[derive(Debug, Error)]
pub enum EmbeddingServiceError {
    #[error("failed to parse schema during incremental embed: {0}")]
    Parse(#[from] ParserError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A document skipped because its token count exceeded the provider's
/// context limit.
#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub id: String,
    pub name: String,
    pub token_count: usize,
    pub max_tokens: usize,
}

/// Result of [`embed_and_store`].
#[derive(Debug, Clone, Default)]
pub struct EmbedAndStoreReport {
    pub embedded_count: usize,
    pub skipped_count: usize,
    pub skipped_documents: Vec<SkippedDocument>,
    pub chunked_count: usize,
    pub chunked_documents: Vec<String>,
}

/// Result of [`embed_and_store_incremental`].
#[derive(Debug, Clone)]
pub struct IncrementalReport {
    pub added: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub duration_ms: u64,
}

/// Embed and store a prepared document set.
///
/// Documents whose token count exceeds the provider's `max_context_tokens`
/// are skipped (recorded in the report) rather than sent. The provider is
/// free to batch internally; this function issues a single `embed_batch`
/// call for everything that wasn't skipped.
#[tracing::instrument(skip_all, fields(table = %table, document_count = documents.len()))]
pub async fn embed_and_store<E, V>(
    provider: &E,
    store: &V,
    table: &str,
    documents: &[EmbeddingDocument],
) -> Result<EmbedAndStoreReport, EmbeddingServiceError>
where
    E: EmbeddingClient,
    V: VectorStore,
{
    let max_tokens = provider.max_context_tokens();
    let mut to_embed = Vec::new();
    let mut skipped = Vec::new();

    for doc in documents {
        let token_count = approximate_token_count(&doc.content);
        if token_count > max_tokens {
            skipped.push(SkippedDocument {
                id: doc.id.clone(),
                name: doc.name.clone(),
                token_count,
                max_tokens,
            });
        } else {
            to_embed.push(doc.clone());
        }
    }

    let chunked_documents: Vec<String> = documents
        .iter()
        .filter(|d| d.metadata.total_chunks.map(|t| t > 1).unwrap_or(false))
        .map(|d| d.name.clone())
        .collect();
    let chunked_count = chunked_documents.len();

    if to_embed.is_empty() {
        return Ok(EmbedAndStoreReport {
            embedded_count: 0,
            skipped_count: skipped.len(),
            skipped_documents: skipped,
            chunked_count,
            chunked_documents,
        });
    }

    let texts: Vec<String> = to_embed.iter().map(|d| d.content.clone()).collect();
    let vectors = provider.embed_batch(&texts).await?;
    if vectors.len() != to_embed.len() {
        return Err(anyhow::anyhow!(
            "embedding provider returned {} vectors for {} documents",
            vectors.len(),
            to_embed.len()
        )
        .into());
    }

    let stored_docs: Vec<StoredDocument> = to_embed
        .into_iter()
        .zip(vectors)
        .map(|(document, embedding)| StoredDocument { document, embedding })
        .collect();

    let embedded_count = stored_docs.len();
    store.store(table, &stored_docs).await?;

    Ok(EmbedAndStoreReport {
        embedded_count,
        skipped_count: skipped.len(),
        skipped_documents: skipped,
        chunked_count,
        chunked_documents,
    })
}

/// Parse, chunk, and embed a full schema from scratch.
async fn full_embed<E, V>(
    provider: &E,
    store: &V,
    table: &str,
    sdl: &str,
    max_content_length: usize,
) -> Result<Vec<EmbeddingDocument>, EmbeddingServiceError>
where
    E: EmbeddingClient,
    V: VectorStore,
{
    let parsed = parser::parse_schema_documents(sdl)?;
    let documents = crate::chunk::chunk_documents(&parsed, max_content_length);
    embed_and_store(provider, store, table, &documents).await?;
    Ok(documents)
}

/// Incrementally update the stored documents to match `new_sdl`.
///
/// Diffs the content-addressed id sets of the prior and new parses:
/// `toDelete = oldIds \ newIds`, `toAdd = newIds \ oldIds`. Because `id` is
/// content-derived, a field whose signature changes appears as a
/// delete+add pair; true updates are not distinguished, by design.
///
/// Not atomic: deletes are applied before inserts, so a cancellation
/// mid-update can leave the SDL sidecar stale relative to the document
/// set. Callers tolerating this should re-run on restart.
#[tracing::instrument(skip_all, fields(table = %table))]
pub async fn embed_and_store_incremental<E, V>(
    provider: &E,
    store: &V,
    table: &str,
    new_sdl: &str,
    max_content_length: usize,
) -> Result<IncrementalReport, EmbeddingServiceError>
where
    E: EmbeddingClient,
    V: VectorStore,
{
    let start = Instant::now();

    let Some(old_sdl) = store.get_schema_sdl(table).await? else {
        let documents = full_embed(provider, store, table, new_sdl, max_content_length).await?;
        store.store_schema_sdl(table, new_sdl).await?;
        return Ok(IncrementalReport {
            added: documents.len(),
            deleted: 0,
            unchanged: 0,
            duration_ms: elapsed_ms(start),
        });
    };

    let old_docs = parser::parse_schema_documents(&old_sdl)?;
    let old_docs = crate::chunk::chunk_documents(&old_docs, max_content_length);
    let new_docs = parser::parse_schema_documents(new_sdl)?;
    let new_docs = crate::chunk::chunk_documents(&new_docs, max_content_length);

    let old_ids: std::collections::HashSet<&str> = old_docs.iter().map(|d| d.id.as_str()).collect();
    let new_ids: std::collections::HashSet<&str> = new_docs.iter().map(|d| d.id.as_str()).collect();

    let to_delete: Vec<String> = old_ids.difference(&new_ids).map(|s| s.to_string()).collect();
    let to_add: Vec<EmbeddingDocument> = new_docs
        .into_iter()
        .filter(|d| !old_ids.contains(d.id.as_str()))
        .collect();
    let unchanged = old_ids.intersection(&new_ids).count();

    if !to_delete.is_empty() {
        store.delete(table, &to_delete).await?;
    }
    if !to_add.is_empty() {
        embed_and_store(provider, store, table, &to_add).await?;
    }
    store.store_schema_sdl(table, new_sdl).await?;

    Ok(IncrementalReport {
        added: to_add.len(),
        deleted: to_delete.len(),
        unchanged,
        duration_ms: elapsed_ms(start),
    })
}

fn elapsed_ms(start: Instant) -> u64 {
    let elapsed: Duration = start.elapsed();
    elapsed.as_millis() as u64
}

/// Embed `query` and delegate to the store's similarity search.
pub async fn search<E, V>(
    provider: &E,
    store: &V,
    table: &str,
    query: &str,
    options: &crate::store::SearchOptions,
) -> Result<Vec<crate::store::SearchResult>, EmbeddingServiceError>
where
    E: EmbeddingClient,
    V: VectorStore,
{
    let vector = provider.embed(query).await?;
    Ok(store.search(table, &vector, options).await?)
}

/// Remove all stored documents and the SDL sidecar for `table`.
pub async fn clear<V: VectorStore>(store: &V, table: &str) -> Result<(), EmbeddingServiceError> {
    store.clear(table).await?;
    Ok(())
}

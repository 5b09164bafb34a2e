//! Core data types that flow through the schema ingestion and dynamic
//! generation pipelines.
//!
//! These mirror the `EmbeddingDocument` / `StoredDocument` / `SchemaSdlRecord`
//! / `GenerationContext` / `DynamicGeneratedOperation` types from the design:
//! the unit of retrieval is a document, the unit of storage is a document
//! plus its embedding, and generation consumes a caller-supplied vector and
//! emits an operation with its provenance attached.

use serde::{Deserialize, Serialize};

/// The schema-level kind a document represents.
///
/// The three root-operation variants (`Query`, `Mutation`, `Subscription`)
/// are only ever applied to field documents — the parent holder types never
/// emit a container document of their own (see [`DocumentMetadata::is_root_operation_field`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Object,
    Field,
    Input,
    Enum,
    Interface,
    Union,
    Scalar,
    Query,
    Mutation,
    Subscription,
}

impl DocumentType {
    /// `true` for the three root operation type names.
    pub fn is_root_operation(self) -> bool {
        matches!(
            self,
            DocumentType::Query | DocumentType::Mutation | DocumentType::Subscription
        )
    }

    /// Parse a root operation type name (`"Query"`, `"Mutation"`,
    /// `"Subscription"`) into its [`DocumentType`], if it is one.
    pub fn root_operation_from_name(name: &str) -> Option<DocumentType> {
        match name {
            "Query" => Some(DocumentType::Query),
            "Mutation" => Some(DocumentType::Mutation),
            "Subscription" => Some(DocumentType::Subscription),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentType::Object => "object",
            DocumentType::Field => "field",
            DocumentType::Input => "input",
            DocumentType::Enum => "enum",
            DocumentType::Interface => "interface",
            DocumentType::Union => "union",
            DocumentType::Scalar => "scalar",
            DocumentType::Query => "query",
            DocumentType::Mutation => "mutation",
            DocumentType::Subscription => "subscription",
        };
        f.write_str(s)
    }
}

/// A single argument on a field, as reconstructed from the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentMetadata {
    pub name: String,
    /// Full type string including `!` and `[...]` wrappers (e.g. `[ID!]!`).
    pub r#type: String,
    pub description: Option<String>,
}

/// Structural metadata attached to an [`EmbeddingDocument`].
///
/// Every field is optional because the fields that apply depend on
/// [`DocumentType`] — a `field` document carries `parent_type`/`field_type`/
/// `arguments`, an `enum` document carries `enum_values`, a `union` document
/// carries `possible_types`, and so on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgumentMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub is_root_operation_field: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_operation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
}

/// The unit of retrieval: a content-addressed, embedding-ready document.
///
/// `id` is a pure function of `content` (see [`crate::embedding::content_id`]):
/// equal content implies equal id, which is the invariant that makes
/// incremental re-indexing a plain set difference (spec P1/P2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingDocument {
    pub id: String,
    pub doc_type: DocumentType,
    pub name: String,
    pub description: Option<String>,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl EmbeddingDocument {
    /// Recompute `id` from the current `content`. Call this after mutating
    /// `content` (e.g. the chunker rewriting a document into a chunk).
    pub fn recompute_id(&mut self) {
        self.id = crate::embedding::content_id(&self.content);
    }
}

/// An [`EmbeddingDocument`] plus its embedding vector, as persisted by a
/// [`crate::store::VectorStore`]. Created by the embedding service; replaced
/// or deleted only via the incremental-diff path or an explicit clear —
/// never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(flatten)]
    pub document: EmbeddingDocument,
    pub embedding: Vec<f32>,
}

/// The full SDL text used to produce the currently stored documents for one
/// namespace/table. Exactly one per namespace, written on every successful
/// full or incremental embed, and used as the prior state for the next
/// incremental diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSdlRecord {
    pub sdl: String,
}

/// Caller-owned input to a generation request: a pre-computed embedding
/// vector for the user's query plus the original text. Both fields are
/// read-only from the generator's perspective.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub input_vector: Vec<f32>,
    pub input_text: String,
}

/// A retrieval candidate carried through generation as provenance.
///
/// Retrieval candidates keep their similarity score; types discovered
/// during BFS expansion (§4.5.5) receive the sentinel score `1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevantDocument {
    pub document: EmbeddingDocument,
    pub score: f64,
}

/// The final output of a dynamic generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicGeneratedOperation {
    pub operation: String,
    pub variables: serde_json::Value,
    pub operation_type: String,
    pub root_field: String,
    pub relevant_documents: Vec<RelevantDocument>,
    pub validation_attempts: u32,
}

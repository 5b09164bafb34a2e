//! Embedding provider trait, content-addressed ids, and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helper functions for content addressing, vector
//! serialization, and similarity computation.
//!
//! Concrete provider implementations (OpenAI-compatible HTTP) and the
//! async dispatch function that picks between them live in the
//! `graphql-gen` app crate.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest.
///
/// 16 hex chars (64 bits) is short enough to embed comfortably in a
/// retrieval-facing id while keeping collision probability negligible for
/// schema-sized document counts.
const ID_HEX_LEN: usize = 16;

/// Derive a document's content-addressed id from its `content` string.
///
/// `id` is a pure function of `content`: equal content always produces an
/// equal id, and any change to `content` changes the id. This is the
/// invariant that lets incremental re-indexing be a plain set difference
/// between an old and a new parse.
pub fn content_id(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{:x}", digest);
    hex[..ID_HEX_LEN].to_string()
}

/// Trait for embedding providers.
///
/// Defines the interface that all embedding backends must implement.
/// Implementations are created by the application and passed to core
/// functions that need embedding metadata. The embedding call itself is a
/// free async function (see the app crate's `embedding` module), not a
/// trait method, so this trait stays plain and object-safe.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Returns the provider's maximum context size, in tokens. Documents
    /// whose token count exceeds this are skipped rather than sent.
    fn max_context_tokens(&self) -> usize;
}

/// Extends [`EmbeddingProvider`] with the actual async embedding call.
///
/// Kept as a separate trait (rather than folded into `EmbeddingProvider`)
/// so code that only needs model metadata never has to depend on
/// `async-trait`; the embedding service (generic over this trait, not a
/// trait object) is the only core consumer that needs the async half.
#[async_trait::async_trait]
pub trait EmbeddingClient: EmbeddingProvider {
    /// Embed a batch of texts, in the same order as the input.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embed a single text, returning its vector.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedding provider returned an empty batch"))
    }
}

/// Rough characters-per-token heuristic used when a provider has no native
/// tokenizer available (4 chars ≈ 1 token).
pub fn approximate_token_count(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
///
/// # Example
///
/// ```rust
/// use graphql_gen_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Tiny epsilon substituted for an all-zero query vector, used for the
/// metadata-only lookup case (similarity search with a zero vector).
pub const ZERO_VECTOR_EPSILON: f32 = 1e-7;

/// Replace an all-zero vector with [`ZERO_VECTOR_EPSILON`] per coordinate.
///
/// A near-zero query vector signals a metadata-only lookup. Most backends
/// accept it as-is; this helper exists for the few that reject an exact
/// all-zero vector outright.
pub fn substitute_zero_vector(vector: &[f32], dims: usize) -> Vec<f32> {
    if vector.iter().all(|&v| v == 0.0) {
        vec![ZERO_VECTOR_EPSILON; dims]
    } else {
        vector.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_is_deterministic() {
        let a = content_id("User.name:String!");
        let b = content_id("User.name:String!");
        assert_eq!(a, b);
    }

    #[test]
    fn content_id_changes_with_content() {
        let a = content_id("User.name:String!");
        let b = content_id("User.name:String");
        assert_ne!(a, b);
    }

    #[test]
    fn content_id_is_short_hex() {
        let id = content_id("anything");
        assert_eq!(id.len(), ID_HEX_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty() {
        let sim = cosine_similarity(&[], &[]);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        let sim = cosine_similarity(&a, &b);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn zero_vector_gets_epsilon() {
        let v = substitute_zero_vector(&[0.0, 0.0, 0.0], 3);
        assert!(v.iter().all(|&x| x == ZERO_VECTOR_EPSILON));
    }

    #[test]
    fn nonzero_vector_passes_through() {
        let v = substitute_zero_vector(&[0.1, 0.0, 0.2], 3);
        assert_eq!(v, vec![0.1, 0.0, 0.2]);
    }
}

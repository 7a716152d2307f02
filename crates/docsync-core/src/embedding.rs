//! Embedder trait and vector serialization helpers.
//!
//! The concrete OpenAI client lives in the `docsync` app crate; the
//! reconciler only sees [`Embedder`].

use anyhow::Result;
use async_trait::async_trait;

/// Vectors for a batch of inputs plus the tokens the service billed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedResponse {
    /// One vector per input, in input order.
    pub embeddings: Vec<Vec<f32>>,
    pub tokens: u64,
}

/// Turns text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed `values`, returning vectors aligned with the input positions.
    async fn embed_many(&self, values: &[String]) -> Result<EmbedResponse>;
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use docsync_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Trailing partial floats are
/// ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

//! Topic clusters: data model, similarity scoring, and the durable topic store.

pub mod similarity;
pub mod store;
pub mod types;

/// Encode a vector as little-endian `f32` bytes for the `centroid` column.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a `centroid` blob written by [`embedding_to_bytes`].
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

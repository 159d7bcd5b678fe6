//! Embedding blob codec
//!
//! Vectors are stored as raw native-endian `f32` bytes. The configured
//! dimension is the only schema for reading them back.

/// Encode a vector for the `chunks.embedding` column
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(embedding).to_vec()
}

/// Reinterpret a stored blob. Returns `None` when the length does not match
/// `dimension` (e.g. the index was built with another model).
pub fn bytes_to_embedding(bytes: &[u8], dimension: usize) -> Option<Vec<f32>> {
    if bytes.len() != dimension * std::mem::size_of::<f32>() {
        return None;
    }
    match bytemuck::try_cast_slice::<u8, f32>(bytes) {
        Ok(floats) => Some(floats.to_vec()),
        // SQLite hands back unaligned buffers sometimes
        Err(_) => Some(
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
    }
}

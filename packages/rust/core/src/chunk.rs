//! Word-window chunking of page text.

/// Default words per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Default words shared by consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Split `text` into overlapping windows of `size` words.
///
/// Windows start every `max(1, size - overlap)` words and are joined with
/// single spaces. Blank input produces no chunks.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || size == 0 {
        return Vec::new();
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += step;
    }

    chunks
}

//! Text chunking with configurable size and overlap.

use crate::types::Chunk;
use courier_core::{AppError, AppResult};
use std::path::Path;

/// Split text into overlapping character windows.
///
/// Chunk `i` starts at character `i * (chunk_size - overlap)` and the last
/// chunk ends exactly at the end of the text. Text is never trimmed, so
/// dropping the first `overlap` characters of every chunk after the first
/// and concatenating reproduces the input.
pub fn chunk_text(
    source: &Path,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(AppError::Config("chunk_size must be positive".to_string()));
    }

    if overlap >= chunk_size {
        return Err(AppError::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    if text.is_empty() {
        return Ok(vec![]);
    }

    // Byte offset of every character boundary, plus the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut position = 0u32;
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(char_count);

        chunks.push(Chunk {
            source: source.to_path_buf(),
            position,
            text: text[boundaries[start]..boundaries[end]].to_string(),
            start,
            end,
        });

        if end == char_count {
            break;
        }

        position += 1;
        start += step;
    }

    tracing::debug!(
        "Chunked {:?} into {} chunks (size: {}, overlap: {})",
        source,
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

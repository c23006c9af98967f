//! Deterministic document identity and chunking.
//!
//! Chunk boundaries are a pure function of `(content, chunk_size,
//! chunk_overlap)`: re-ingesting identical content produces identical
//! ordered chunk boundaries and ids.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::types::ContentType;

/// Compute the stable `document_id` for `(project_id, source_path, content_type)`.
#[must_use]
pub fn document_id(project_id: &str, source_path: &str, content_type: ContentType) -> String {
    let mut hasher = DefaultHasher::new();
    project_id.hash(&mut hasher);
    source_path.hash(&mut hasher);
    std::mem::discriminant(&content_type).hash(&mut hasher);
    format!("doc_{:016x}", hasher.finish())
}

/// Compute the deterministic `chunk_id` for `(document_id, chunk_index)`.
#[must_use]
pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    let mut hasher = DefaultHasher::new();
    document_id.hash(&mut hasher);
    chunk_index.hash(&mut hasher);
    format!("chunk_{:016x}", hasher.finish())
}

/// One deterministic chunk boundary: a byte-offset span plus its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Zero-based position in the document's ordered chunk sequence.
    pub chunk_index: usize,
    /// The chunk's text content.
    pub content: String,
}

/// Split `content` into deterministic chunks.
///
/// Splits on paragraph boundaries (blank-line separated) first; any
/// paragraph longer than `chunk_size` is further split on sentence
/// boundaries. Adjacent chunks overlap by approximately `chunk_overlap`
/// characters, reproduced from the tail of the previous chunk so that
/// boundaries are a pure function of the inputs.
#[must_use]
pub fn chunk_content(content: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<ChunkSpan> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut pieces: Vec<String> = Vec::new();
    for paragraph in paragraphs {
        if paragraph.chars().count() <= chunk_size {
            pieces.push(paragraph.to_string());
        } else {
            pieces.extend(split_into_sentence_windows(paragraph, chunk_size));
        }
    }

    merge_with_overlap(&pieces, chunk_size, chunk_overlap)
}

/// Split a long paragraph into sentence-bounded windows no longer than
/// `chunk_size` characters, greedily packing whole sentences.
fn split_into_sentence_windows(paragraph: &str, chunk_size: usize) -> Vec<String> {
    let sentences = split_into_sentences(paragraph);
    let mut windows = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        if !current.is_empty() && current.chars().count() + sentence.chars().count() > chunk_size
        {
            windows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);

        while current.chars().count() > chunk_size {
            let cut = current
                .char_indices()
                .nth(chunk_size)
                .map_or(current.len(), |(idx, _)| idx);
            windows.push(current[..cut].to_string());
            current = current[cut..].trim_start().to_string();
        }
    }
    if !current.is_empty() {
        windows.push(current);
    }
    windows
}

/// Split text into sentences on `.`, `!`, `?` followed by whitespace.
fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            let next_is_boundary = bytes
                .get(i + ch.len_utf8())
                .is_none_or(|b| (*b as char).is_whitespace());
            if next_is_boundary {
                let sentence = text[start..=i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = i + ch.len_utf8();
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Merge adjacent pieces into final chunks, prepending `chunk_overlap`
/// characters from the tail of the previous chunk to each subsequent chunk.
fn merge_with_overlap(pieces: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<ChunkSpan> {
    let mut chunks: Vec<ChunkSpan> = Vec::new();
    let mut buffer = String::new();

    for piece in pieces {
        if !buffer.is_empty() && buffer.chars().count() + piece.chars().count() > chunk_size {
            chunks.push(ChunkSpan {
                chunk_index: chunks.len(),
                content: buffer.clone(),
            });
            buffer = tail_chars(&buffer, chunk_overlap);
        }
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(piece);
    }
    if !buffer.trim().is_empty() {
        chunks.push(ChunkSpan {
            chunk_index: chunks.len(),
            content: buffer,
        });
    }
    chunks
}

fn tail_chars(s: &str, n: usize) -> String {
    let total = s.chars().count();
    if total <= n {
        return s.to_string();
    }
    s.chars().skip(total - n).collect()
}

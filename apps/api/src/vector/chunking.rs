//! Recursive character splitting with overlap.
//!
//! Text is split on the coarsest separator that appears in it (paragraphs,
//! then lines, then words, then characters). Pieces that still exceed the
//! chunk size are split again with the next separator; small pieces are
//! merged back together up to the chunk size, carrying up to `chunk_overlap`
//! characters of trailing context into the next chunk. Lengths are counted in
//! characters, not bytes.

use std::collections::VecDeque;

use crate::vector::VectorStoreError;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, VectorStoreError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(VectorStoreError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        split_recursive(text, &SEPARATORS, self)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    // First separator present in the text; "" always matches.
    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let finer = &separators[(position + 1).min(separators.len())..];

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for piece in pieces {
        if char_len(&piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }
        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, separator, config));
            pending.clear();
        }
        if finer.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, finer, config));
        }
    }
    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, separator, config));
    }
    chunks
}

/// Greedily joins pieces into chunks no longer than `chunk_size`, starting
/// each new chunk with as much of the previous one as fits in the overlap.
fn merge_pieces(pieces: &[String], separator: &str, config: &ChunkingConfig) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        let joiner = if window.is_empty() { 0 } else { sep_len };

        if total + len + joiner > config.chunk_size && !window.is_empty() {
            push_chunk(&mut chunks, &window, separator);
            while let Some((_, front_len)) = window.front().copied() {
                let joiner = if window.is_empty() { 0 } else { sep_len };
                let over_overlap = total > config.chunk_overlap;
                let no_room = total + len + joiner > config.chunk_size;
                if !(over_overlap || no_room) {
                    break;
                }
                total -= front_len + if window.len() > 1 { sep_len } else { 0 };
                window.pop_front();
            }
        }

        let joiner = if window.is_empty() { 0 } else { sep_len };
        window.push_back((piece.as_str(), len));
        total += len + joiner;
    }
    push_chunk(&mut chunks, &window, separator);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

//! Text chunking strategies.
//!
//! Every strategy partitions a document's extracted text into a sequence of
//! [`Chunk`]s that, concatenated back in `sequence` order, reproduce the
//! original text byte-for-byte — chunk boundaries carry no transformation,
//! only split points.

use serde::{Deserialize, Serialize};

/// A single contiguous slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk within the document, starting at 0.
    pub sequence: u32,
    /// Byte offset of the first byte of `content` within the original text.
    pub start_offset: usize,
    /// Byte offset one past the last byte of `content` within the original text.
    pub end_offset: usize,
    pub content: String,
}

/// How a document's text should be split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkingStrategy {
    /// Fixed-size windows over the text, in bytes, with optional overlap.
    FixedSize,
    /// Split on sentence boundaries, packing sentences into chunks up to
    /// `max_chunk_size`.
    Sentence,
    /// Split on paragraph-like boundaries first, then merge/split to stay
    /// near `max_chunk_size`, preferring semantically coherent breaks
    /// (blank lines) over mid-paragraph cuts.
    Semantic,
}

/// Parameters controlling a chunking run. Shared across strategies so a
/// document's policy can be changed without touching call sites.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingPolicy {
    pub strategy: ChunkingStrategy,
    /// Target maximum chunk size, in bytes.
    pub max_chunk_size: usize,
    /// Bytes of overlap between consecutive chunks. Only honored by
    /// [`ChunkingStrategy::FixedSize`] — sentence/semantic chunking never
    /// overlaps, since splitting on a natural boundary already avoids
    /// truncating meaning mid-unit.
    pub overlap: usize,
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Sentence,
            max_chunk_size: 1000,
            overlap: 100,
        }
    }
}

/// Split `text` according to `policy`, returning chunks in document order.
///
/// Empty input produces zero chunks. The returned chunks always satisfy the
/// reconstruction invariant: `chunks[i].end_offset == chunks[i+1].start_offset`
/// for `FixedSize` with zero overlap and for `Sentence`/`Semantic`; `FixedSize`
/// with nonzero overlap instead satisfies `chunks[i+1].start_offset == chunks[i].end_offset - overlap`.
pub fn chunk_text(text: &str, policy: &ChunkingPolicy) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }
    match policy.strategy {
        ChunkingStrategy::FixedSize => chunk_fixed_size(text, policy.max_chunk_size, policy.overlap),
        ChunkingStrategy::Sentence => chunk_sentences(text, policy.max_chunk_size),
        ChunkingStrategy::Semantic => chunk_semantic(text, policy.max_chunk_size),
    }
}

fn push_chunk(chunks: &mut Vec<Chunk>, content: String, start: usize, end: usize) {
    let sequence = chunks.len() as u32;
    chunks.push(Chunk {
        sequence,
        start_offset: start,
        end_offset: end,
        content,
    });
}

/// Fixed-size sliding window over byte offsets, snapped to UTF-8 char
/// boundaries so no chunk ever splits a multi-byte codepoint.
fn chunk_fixed_size(text: &str, max_size: usize, overlap: usize) -> Vec<Chunk> {
    let max_size = max_size.max(1);
    let overlap = overlap.min(max_size.saturating_sub(1));
    let bytes_len = text.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < bytes_len {
        let mut end = (start + max_size).min(bytes_len);
        end = floor_char_boundary(text, end);
        if end <= start {
            // A single char exceeds max_size; take it whole rather than loop forever.
            end = ceil_char_boundary(text, start + 1);
        }
        push_chunk(&mut chunks, text[start..end].to_string(), start, end);

        if end >= bytes_len {
            break;
        }
        let next_start = end.saturating_sub(overlap);
        start = floor_char_boundary(text, next_start.max(start + 1));
    }
    chunks
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Splits `text` at sentence-ending punctuation (`.`, `!`, `?`) followed by
/// whitespace or end-of-text, then packs consecutive sentences into chunks
/// up to `max_size` bytes. A single sentence longer than `max_size` becomes
/// its own (oversized) chunk rather than being cut mid-sentence.
fn chunk_sentences(text: &str, max_size: usize) -> Vec<Chunk> {
    let boundaries = sentence_boundaries(text);
    pack_segments(text, &boundaries, max_size)
}

fn sentence_boundaries(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut bounds = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'.' || b == b'!' || b == b'?' {
            let mut j = i + 1;
            // Absorb trailing closing quotes/parens before checking for whitespace.
            while j < bytes.len() && matches!(bytes[j], b'"' | b'\'' | b')' | b']') {
                j += 1;
            }
            if j >= bytes.len() || bytes[j].is_ascii_whitespace() {
                bounds.push(j);
            }
        }
        i += 1;
    }
    if bounds.last().copied() != Some(text.len()) {
        bounds.push(text.len());
    }
    bounds
}

/// Splits on blank-line paragraph boundaries, then packs paragraphs into
/// chunks up to `max_size`, falling back to sentence splitting for any
/// paragraph that alone exceeds `max_size`.
fn chunk_semantic(text: &str, max_size: usize) -> Vec<Chunk> {
    let mut boundaries = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while let Some(rel) = find_subslice(&bytes[i..], b"\n\n") {
        let cut = i + rel + 2;
        boundaries.push(cut);
        i = cut;
    }
    if boundaries.last().copied() != Some(text.len()) {
        boundaries.push(text.len());
    }

    let mut chunks = pack_segments(text, &boundaries, max_size);

    // Any packed chunk still over max_size (a single oversized paragraph)
    // gets re-split on sentence boundaries, offsets renumbered afterward.
    let mut needs_resplit = false;
    for c in &chunks {
        if c.content.len() > max_size {
            needs_resplit = true;
            break;
        }
    }
    if needs_resplit {
        let mut resplit = Vec::new();
        for c in chunks.drain(..) {
            if c.content.len() > max_size {
                let sub_bounds = sentence_boundaries(&c.content);
                for sub in pack_segments(&c.content, &sub_bounds, max_size) {
                    resplit.push((sub.content, c.start_offset + sub.start_offset, c.start_offset + sub.end_offset));
                }
            } else {
                resplit.push((c.content, c.start_offset, c.end_offset));
            }
        }
        chunks = resplit
            .into_iter()
            .enumerate()
            .map(|(seq, (content, start, end))| Chunk {
                sequence: seq as u32,
                start_offset: start,
                end_offset: end,
                content,
            })
            .collect();
    }
    chunks
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Greedily packs the segments delimited by `boundaries` (each a byte offset
/// one past the end of a segment) into chunks no larger than `max_size`,
/// never re-ordering or dropping bytes.
fn pack_segments(text: &str, boundaries: &[usize], max_size: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut chunk_start = 0usize;
    let mut seg_start = 0usize;

    for &bound in boundaries {
        let candidate_len = bound - chunk_start;
        if candidate_len > max_size && bound > seg_start && seg_start > chunk_start {
            push_chunk(&mut chunks, text[chunk_start..seg_start].to_string(), chunk_start, seg_start);
            chunk_start = seg_start;
        }
        seg_start = bound;
    }
    if chunk_start < text.len() {
        push_chunk(&mut chunks, text[chunk_start..].to_string(), chunk_start, text.len());
    }
    chunks
}

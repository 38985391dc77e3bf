//! Sentence-boundary text chunker with character overlap.
//!
//! Splits lesson body text into windows that respect a configurable
//! `chunk_size` (in characters). Windows are built from whole sentences so
//! that a chunk never ends mid-sentence unless a single sentence is itself
//! longer than the window.
//!
//! # Algorithm
//!
//! 1. Collapse all whitespace runs to a single space.
//! 2. Split into sentences: a boundary follows `.`, `!` or `?` when the
//!    next character is whitespace and the one after it is not lowercase.
//! 3. Hard-split any sentence longer than `chunk_size` at the last space
//!    inside the window, or at a char boundary when the window has none.
//! 4. Accumulate sentences into a window until the next one would push it
//!    past `chunk_size`, then flush.
//! 5. Start the next window with the trailing sentences of the previous
//!    one whose combined length fits in `chunk_overlap`.
//!
//! # Example
//!
//! ```rust
//! use course_rag_core::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams { chunk_size: 800, chunk_overlap: 100 };
//! let chunks = chunk_text("One sentence. Another one.", &params);
//! assert_eq!(chunks, vec!["One sentence. Another one.".to_string()]);
//! ```

/// Window sizing, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// Split text into sentence-respecting windows.
///
/// Returns an empty vector for blank input. Every returned chunk is
/// non-empty and at most `chunk_size` characters long.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Vec<String> {
    let chunk_size = params.chunk_size.max(1);
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut pieces: Vec<String> = Vec::new();
    for sentence in split_sentences(&normalized) {
        if char_len(sentence) > chunk_size {
            pieces.extend(hard_split(sentence, chunk_size));
        } else {
            pieces.push(sentence.to_string());
        }
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < pieces.len() {
        let mut len = 0;
        let mut end = start;
        while end < pieces.len() {
            let add = char_len(&pieces[end]) + usize::from(end > start);
            if len + add > chunk_size && end > start {
                break;
            }
            len += add;
            end += 1;
        }

        chunks.push(pieces[start..end].join(" "));
        if end >= pieces.len() {
            break;
        }

        // Walk back over whole sentences for the overlap; always advance.
        let mut overlap_len = 0;
        let mut next = end;
        while next > start + 1 {
            let add = char_len(&pieces[next - 1]) + usize::from(overlap_len > 0);
            if overlap_len + add > params.chunk_overlap {
                break;
            }
            overlap_len += add;
            next -= 1;
        }
        start = next;
    }

    chunks
}

/// Split normalized text into sentences, keeping terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let rest = &text[end..];
        let mut after = rest.chars();
        let is_boundary = match (after.next(), after.next()) {
            (Some(ws), Some(next)) => ws.is_whitespace() && !next.is_lowercase(),
            _ => false,
        };
        if is_boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut an oversized sentence into pieces of at most `max_chars`.
fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut remaining = sentence;

    while char_len(remaining) > max_chars {
        let window_end = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let cut = remaining[..window_end]
            .rfind(' ')
            .filter(|&pos| pos > 0)
            .unwrap_or(window_end);
        let (head, tail) = remaining.split_at(cut);
        let head = head.trim_end();
        if !head.is_empty() {
            out.push(head.to_string());
        }
        remaining = tail.trim_start();
    }

    if !remaining.is_empty() {
        out.push(remaining.to_string());
    }
    out
}

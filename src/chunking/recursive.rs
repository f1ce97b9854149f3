//! Recursive separator-based splitter.
//!
//! Two phases:
//! 1. Split the text into pieces no longer than the budget, trying paragraph,
//!    line, sentence and word separators in order and falling back to single
//!    characters.
//! 2. Greedily merge consecutive pieces into chunks, carrying a bounded tail of
//!    each chunk into the next one as overlap.

use std::collections::VecDeque;
use std::ops::Range;

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Separator patterns in fallback order, with the byte offset inside the
/// pattern where the cut is made. Whitespace separators cut before the match so
/// they lead the next piece; sentence punctuation cuts after the mark.
const SEPARATORS: &[(&str, usize)] = &[
    ("\n\n", 0),
    ("\n", 0),
    (". ", 1),
    ("? ", 1),
    ("! ", 1),
    ("。", "。".len()),
    ("？", "？".len()),
    ("！", "！".len()),
    (" ", 0),
];

/// A contiguous slice of the source text.
#[derive(Debug, Clone)]
struct Piece {
    bytes: Range<usize>,
    char_start: usize,
    chars: usize,
}

/// Split `text` into chunks of at most `size` characters overlapping by at
/// most `overlap` characters.
pub fn split(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if size == 0 || overlap == 0 || overlap >= size {
        return Err(RagError::Config(format!(
            "chunking requires 0 < overlap < size, got size {size} overlap {overlap}"
        )));
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut ranges = Vec::new();
    split_span(text, 0..text.len(), size, SEPARATORS, &mut ranges);

    let mut char_pos = 0;
    let pieces = ranges
        .into_iter()
        .map(|bytes| {
            let chars = text[bytes.clone()].chars().count();
            let piece = Piece {
                bytes,
                char_start: char_pos,
                chars,
            };
            char_pos += chars;
            piece
        })
        .collect::<Vec<_>>();

    Ok(merge(text, &pieces, size, overlap))
}

fn split_span(
    text: &str,
    span: Range<usize>,
    size: usize,
    separators: &[(&str, usize)],
    out: &mut Vec<Range<usize>>,
) {
    let slice = &text[span.clone()];
    if slice.chars().count() <= size {
        if !slice.is_empty() {
            out.push(span);
        }
        return;
    }

    let Some(pos) = separators.iter().position(|(sep, _)| slice.contains(sep)) else {
        // Nothing left to split on: one piece per character.
        for (i, c) in slice.char_indices() {
            let start = span.start + i;
            out.push(start..start + c.len_utf8());
        }
        return;
    };
    let (sep, cut) = separators[pos];
    let rest = &separators[pos + 1..];

    let mut piece_start = span.start;
    for (idx, _) in slice.match_indices(sep) {
        let boundary = span.start + idx + cut;
        if boundary > piece_start {
            split_span(text, piece_start..boundary, size, rest, out);
            piece_start = boundary;
        }
    }
    if span.end > piece_start {
        split_span(text, piece_start..span.end, size, rest, out);
    }
}

fn merge(text: &str, pieces: &[Piece], size: usize, overlap: usize) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut last_end = 0usize;
    let mut window: VecDeque<&Piece> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        if total + piece.chars > size && !window.is_empty() {
            emit(text, &window, &mut chunks, &mut last_end);
            while total > overlap || (total > 0 && total + piece.chars > size) {
                match window.pop_front() {
                    Some(front) => total -= front.chars,
                    None => break,
                }
            }
        }
        window.push_back(piece);
        total += piece.chars;
    }
    if !window.is_empty() {
        emit(text, &window, &mut chunks, &mut last_end);
    }

    chunks
}

/// Trim the window's text and append it unless it is blank or contained in
/// the previous chunk.
fn emit(text: &str, window: &VecDeque<&Piece>, chunks: &mut Vec<Chunk>, last_end: &mut usize) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };
    let raw = &text[first.bytes.start..last.bytes.end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }

    let start = first.bytes.start + (raw.len() - raw.trim_start().len());
    let end = start + trimmed.len();
    if end <= *last_end {
        return;
    }
    *last_end = end;

    let leading = text[first.bytes.start..start].chars().count();
    chunks.push(Chunk {
        id: chunks.len() as u64,
        text: trimmed.to_string(),
        source_offset: first.char_start + leading,
    });
}

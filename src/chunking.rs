//! Recursive character splitting with overlap.
//!
//! The splitter descends a prioritized separator list (paragraph break, line
//! break, sentence break, word break, single characters) until every segment
//! fits the chunk budget, then greedily merges adjacent segments back up to
//! the budget, carrying an overlap window from each chunk into the next.
//!
//! Segments keep their trailing separators, so chunk contents are contiguous
//! slices of the parent document: concatenating them with each chunk's
//! overlap prefix removed reproduces the document exactly. All sizes are
//! counted in characters and every slice lands on a char boundary.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::conversion::Document;
use crate::types::RagError;

/// Separators tried coarsest-first before falling back to per-character
/// splitting.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// One retrievable unit of a document.
///
/// Chunks of the same parent are ordered by `chunk_index`; `start_offset` is
/// the character position of this chunk in the parent content. Consecutive
/// chunks overlap by up to the configured overlap length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
    pub start_offset: usize,
}

/// Deterministic splitter: same document and parameters, same chunks.
#[derive(Clone, Debug)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

/// A segment produced by the recursive descent, addressed both in bytes (for
/// slicing) and characters (for budget arithmetic).
#[derive(Clone, Copy, Debug)]
struct Segment {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    char_len: usize,
}

impl RecursiveSplitter {
    /// Fails with [`RagError::Config`] unless `chunk_overlap < chunk_size`
    /// and `chunk_size > 0`; an overlap that fills the whole budget would
    /// stall the merge.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits a document into overlapping chunks, each at most `chunk_size`
    /// characters.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let content = document.content.as_str();
        if content.is_empty() {
            return Vec::new();
        }

        let mut segments = Vec::new();
        self.decompose(content, 0, 0, 0, &mut segments);
        self.merge(content, &document.source, &segments)
    }

    /// Recursively cuts `text` (a slice of the document starting at
    /// `byte_base`/`char_base`) into segments of at most `chunk_size` chars.
    fn decompose(
        &self,
        text: &str,
        level: usize,
        byte_base: usize,
        char_base: usize,
        out: &mut Vec<Segment>,
    ) {
        let char_len = text.chars().count();
        if char_len <= self.chunk_size {
            if char_len > 0 {
                out.push(Segment {
                    byte_start: byte_base,
                    byte_end: byte_base + text.len(),
                    char_start: char_base,
                    char_len,
                });
            }
            return;
        }

        if level >= SEPARATORS.len() {
            // No separator left: hard-cut at the budget.
            let mut byte_off = 0;
            let mut char_off = 0;
            while char_off < char_len {
                let take = (char_len - char_off).min(self.chunk_size);
                let byte_len = char_span_bytes(&text[byte_off..], take);
                out.push(Segment {
                    byte_start: byte_base + byte_off,
                    byte_end: byte_base + byte_off + byte_len,
                    char_start: char_base + char_off,
                    char_len: take,
                });
                byte_off += byte_len;
                char_off += take;
            }
            return;
        }

        let separator = SEPARATORS[level];
        if !text.contains(separator) {
            self.decompose(text, level + 1, byte_base, char_base, out);
            return;
        }

        // Split keeping each separator attached to the piece before it, so
        // the pieces concatenate back to `text`.
        let mut piece_start = 0;
        let mut char_cursor = char_base;
        let mut emit = |piece: &str, byte_start: usize, char_cursor: &mut usize| {
            let piece_chars = piece.chars().count();
            if piece_chars > self.chunk_size {
                self.decompose(piece, level + 1, byte_base + byte_start, *char_cursor, out);
            } else if piece_chars > 0 {
                out.push(Segment {
                    byte_start: byte_base + byte_start,
                    byte_end: byte_base + byte_start + piece.len(),
                    char_start: *char_cursor,
                    char_len: piece_chars,
                });
            }
            *char_cursor += piece_chars;
        };

        let mut search_from = 0;
        while let Some(found) = text[search_from..].find(separator) {
            let piece_end = search_from + found + separator.len();
            emit(&text[piece_start..piece_end], piece_start, &mut char_cursor);
            piece_start = piece_end;
            search_from = piece_end;
        }
        if piece_start < text.len() {
            emit(&text[piece_start..], piece_start, &mut char_cursor);
        }
    }

    /// Greedy merge of contiguous segments into chunks.
    ///
    /// A window of whole segments accumulates until the next segment would
    /// push it past `chunk_size`; the window is then emitted and drained from
    /// the front until the retained suffix fits both the overlap budget and
    /// the incoming segment.
    fn merge(&self, content: &str, source: &str, segments: &[Segment]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<Segment> = VecDeque::new();
        let mut window_chars = 0usize;

        let flush = |window: &VecDeque<Segment>, chunks: &mut Vec<Chunk>| {
            let (Some(first), Some(last)) = (window.front(), window.back()) else {
                return;
            };
            chunks.push(Chunk {
                content: content[first.byte_start..last.byte_end].to_string(),
                source: source.to_string(),
                chunk_index: chunks.len(),
                start_offset: first.char_start,
            });
        };

        for segment in segments {
            if window_chars + segment.char_len > self.chunk_size && !window.is_empty() {
                flush(&window, &mut chunks);
                while window_chars > self.chunk_overlap
                    || (window_chars + segment.char_len > self.chunk_size && window_chars > 0)
                {
                    if let Some(dropped) = window.pop_front() {
                        window_chars -= dropped.char_len;
                    }
                }
            }
            window.push_back(*segment);
            window_chars += segment.char_len;
        }
        flush(&window, &mut chunks);

        chunks
    }
}

/// Byte length of the first `chars` characters of `text`.
fn char_span_bytes(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(size: usize, overlap: usize) -> RecursiveSplitter {
        RecursiveSplitter::new(size, overlap).unwrap()
    }

    fn doc(content: &str) -> Document {
        Document::new(content, "test://doc")
    }

    /// Rebuilds the original content by dropping each chunk's overlap with
    /// its predecessor, using the recorded character offsets.
    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut rebuilt = String::new();
        let mut covered = 0usize;
        for chunk in chunks {
            let skip = covered.saturating_sub(chunk.start_offset);
            rebuilt.extend(chunk.content.chars().skip(skip));
            covered = chunk.start_offset + chunk.content.chars().count();
        }
        rebuilt
    }

    #[test]
    fn overlap_equal_to_size_is_rejected() {
        assert!(matches!(
            RecursiveSplitter::new(100, 100),
            Err(RagError::Config(_))
        ));
        assert!(matches!(
            RecursiveSplitter::new(100, 150),
            Err(RagError::Config(_))
        ));
        assert!(RecursiveSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = splitter(100, 20).split(&doc("just a small note"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "just a small note");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].source, "test://doc");
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        assert!(splitter(100, 20).split(&doc("")).is_empty());
    }

    #[test]
    fn every_chunk_respects_the_size_bound() {
        let text = "Paragraph one talks about one thing at length.\n\n\
                    Paragraph two moves on. It has several sentences. Each is short.\n\
                    A line break here.\n\n\
                    Finally a very long unbroken run: "
            .to_string()
            + &"x".repeat(500);
        let split = splitter(80, 16);
        let chunks = split.split(&doc(&text));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(
                chunk.content.chars().count() <= 80,
                "chunk {} has {} chars",
                chunk.chunk_index,
                chunk.content.chars().count()
            );
        }
    }

    #[test]
    fn chunks_reconstruct_the_document() {
        let text = "First paragraph.\n\nSecond paragraph is a bit longer. \
                    It keeps going with more words. And more still.\n\n\
                    Third paragraph ends things."
            .repeat(4);
        let chunks = splitter(60, 12).split(&doc(&text));
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn reconstruction_survives_multibyte_text() {
        let text = "Première partie, déjà vu. ".repeat(20) + "Fin du théâtre.";
        let chunks = splitter(50, 10).split(&doc(&text));
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), text);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 50);
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "Alpha beta gamma. Delta epsilon zeta. ".repeat(30);
        let split = splitter(90, 20);
        let first = split.split(&doc(&text));
        let second = split.split(&doc(&text));
        assert_eq!(first, second);
    }

    #[test]
    fn consecutive_chunks_share_an_overlap_region() {
        let text = "one two three four five six seven eight nine ten ".repeat(20);
        let chunks = splitter(100, 30).split(&doc(&text));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev_end = pair[0].start_offset + pair[0].content.chars().count();
            assert!(
                pair[1].start_offset < prev_end,
                "chunks {} and {} do not overlap",
                pair[0].chunk_index,
                pair[1].chunk_index
            );
            assert!(prev_end - pair[1].start_offset <= 30);
        }
    }

    #[test]
    fn unbroken_text_falls_back_to_character_cuts() {
        let text = "z".repeat(350);
        let chunks = splitter(100, 10).split(&doc(&text));
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 100);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    // A 3000-character document at the default-shaped parameters lands on
    // four chunks: the first fills the whole budget, later ones re-spend up
    // to 200 characters on overlap.
    #[test]
    fn three_thousand_chars_make_four_chunks() {
        let sentence = "This sentence pads out to fifty characters in all. ";
        assert_eq!(sentence.chars().count(), 51);
        let text: String = sentence.repeat(60).chars().take(3000).collect();
        assert_eq!(text.chars().count(), 3000);

        let chunks = splitter(1000, 200).split(&doc(&text));
        assert_eq!(chunks.len(), 4, "got {} chunks", chunks.len());
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 1000);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn chunk_indexes_are_sequential() {
        let text = "word ".repeat(500);
        let chunks = splitter(120, 24).split(&doc(&text));
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, expected);
        }
    }
}

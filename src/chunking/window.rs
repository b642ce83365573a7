//! Sliding-window splitter.
//!
//! Chunk `i` starts at unit `i * (chunk_size - overlap)` and spans up to
//! `chunk_size` units. Enumeration ends with the first chunk that reaches the
//! end of the text.

use super::{ChunkUnit, ChunkingConfig, ContentChunk};
use std::iter::{FusedIterator, Peekable};
use std::str::CharIndices;

/// Splits transcripts according to a validated [`ChunkingConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSplitter {
    config: ChunkingConfig,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Lazily enumerate the chunks of `text`.
    ///
    /// The returned iterator can be cloned to restart enumeration from any point.
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            unit: self.config.unit(),
            chunk_size: self.config.chunk_size(),
            step: self.config.step(),
            cursor: Some(Cursor { byte: 0, char: 0 }),
            ordinal: 0,
        }
    }

    /// Number of chunks `text` splits into.
    pub fn count(&self, text: &str) -> usize {
        self.split(text).count()
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    byte: usize,
    char: usize,
}

#[derive(Debug, Clone, Copy)]
struct UnitSpan {
    start_byte: usize,
    end_byte: usize,
    start_char: usize,
    end_char: usize,
}

/// Lazy, finite iterator over the chunks of one text.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    unit: ChunkUnit,
    chunk_size: usize,
    step: usize,
    cursor: Option<Cursor>,
    ordinal: usize,
}

impl Iterator for Chunks<'_> {
    type Item = ContentChunk;

    fn next(&mut self) -> Option<Self::Item> {
        let from = self.cursor.take()?;

        let mut first: Option<UnitSpan> = None;
        let mut last: Option<UnitSpan> = None;
        let mut next_cursor = None;
        let mut has_more = false;

        for (index, span) in Units::new(self.text, self.unit, from).enumerate() {
            if index == self.step {
                next_cursor = Some(Cursor {
                    byte: span.start_byte,
                    char: span.start_char,
                });
            }
            if index == self.chunk_size {
                has_more = true;
                break;
            }
            first.get_or_insert(span);
            last = Some(span);
        }

        let (first, last) = first.zip(last)?;

        // step < chunk_size, so next_cursor is always set once has_more is.
        if has_more {
            self.cursor = next_cursor;
        }

        let chunk = ContentChunk {
            ordinal: self.ordinal,
            content: self.text[first.start_byte..last.end_byte].to_string(),
            start_offset: first.start_char,
            end_offset: last.end_char,
        };
        self.ordinal += 1;
        Some(chunk)
    }
}

impl FusedIterator for Chunks<'_> {}

/// Walks the units of `text` starting at a cursor.
struct Units<'a> {
    rest: Peekable<CharIndices<'a>>,
    base: Cursor,
    chars_seen: usize,
    unit: ChunkUnit,
}

impl<'a> Units<'a> {
    fn new(text: &'a str, unit: ChunkUnit, from: Cursor) -> Self {
        Self {
            rest: text[from.byte..].char_indices().peekable(),
            base: from,
            chars_seen: 0,
            unit,
        }
    }

    fn next_char(&mut self) -> Option<UnitSpan> {
        let (offset, c) = self.rest.next()?;
        let char_index = self.base.char + self.chars_seen;
        self.chars_seen += 1;

        Some(UnitSpan {
            start_byte: self.base.byte + offset,
            end_byte: self.base.byte + offset + c.len_utf8(),
            start_char: char_index,
            end_char: char_index + 1,
        })
    }

    fn next_token(&mut self) -> Option<UnitSpan> {
        while let Some(&(_, c)) = self.rest.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.rest.next();
            self.chars_seen += 1;
        }

        let (offset, c) = self.rest.next()?;
        let start_byte = self.base.byte + offset;
        let start_char = self.base.char + self.chars_seen;
        let mut end_byte = start_byte + c.len_utf8();
        self.chars_seen += 1;

        while let Some(&(offset, c)) = self.rest.peek() {
            if c.is_whitespace() {
                break;
            }
            self.rest.next();
            self.chars_seen += 1;
            end_byte = self.base.byte + offset + c.len_utf8();
        }

        Some(UnitSpan {
            start_byte,
            end_byte,
            start_char,
            end_char: self.base.char + self.chars_seen,
        })
    }
}

impl Iterator for Units<'_> {
    type Item = UnitSpan;

    fn next(&mut self) -> Option<Self::Item> {
        match self.unit {
            ChunkUnit::Chars => self.next_char(),
            ChunkUnit::Tokens => self.next_token(),
        }
    }
}

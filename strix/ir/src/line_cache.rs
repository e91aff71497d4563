//! Source line offset cache.
//!
//! Maps character offsets in a UTF-8 source buffer to line numbers and line
//! start offsets. The cache records the first-character offset of every
//! line; lookups binary-search for the closest line start at or before the
//! requested offset.
//!
//! A separate byte-offset list is only materialized once a multi-byte
//! character is seen; until then character offsets and byte offsets are
//! identical and one list serves for both.

/// Line terminators recognized by the scanner: `\n`, `\r`, `\r\n` (one
/// terminator), U+2028, U+2029.
const LINE_SEPARATOR: char = '\u{2028}';
const PARAGRAPH_SEPARATOR: char = '\u{2029}';

/// Sorted index of line-start offsets over one source buffer.
#[derive(Clone, Debug)]
pub struct LineOffsetCache {
    char_offsets: Vec<u32>,
    /// Present only when some line start's byte offset differs from its
    /// character offset.
    byte_offsets: Option<Vec<u32>>,
}

impl LineOffsetCache {
    /// Scan `source` once and record every line start. Line 0 starts at
    /// (`start_char_offset`, `start_byte_offset`).
    pub fn new(source: &[u8], start_char_offset: u32, start_byte_offset: u32) -> Self {
        let mut cache = LineOffsetCache {
            char_offsets: Vec::new(),
            byte_offsets: None,
        };

        let mut char_offset = start_char_offset;
        let mut byte_offset = start_byte_offset;
        cache.add_line(char_offset, byte_offset);

        // String::from_utf8_lossy tolerates the three-byte surrogate
        // sequences some hosts smuggle through; they decode as replacement
        // characters, which is fine since only their byte length matters.
        let text = String::from_utf8_lossy(source);
        let mut chars = text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let mut len = c.len_utf8() as u32;
            let mut consumed = 1;
            let is_newline = match c {
                '\r' => {
                    if let Some(&(_, '\n')) = chars.peek() {
                        chars.next();
                        len += 1;
                        consumed += 1;
                    }
                    true
                }
                '\n' | LINE_SEPARATOR | PARAGRAPH_SEPARATOR => true,
                _ => false,
            };
            let _ = i;
            char_offset += consumed;
            byte_offset += len;
            if is_newline {
                cache.add_line(char_offset, byte_offset);
            }
        }

        cache
    }

    /// Build a cache from precomputed offset lists (e.g. deserialized from
    /// bytecode). `byte_offsets`, when given, must be parallel to
    /// `char_offsets`.
    pub fn from_lines(char_offsets: Vec<u32>, byte_offsets: Option<Vec<u32>>) -> Self {
        if let Some(bytes) = &byte_offsets {
            assert_eq!(bytes.len(), char_offsets.len());
        }
        LineOffsetCache {
            char_offsets,
            byte_offsets,
        }
    }

    fn add_line(&mut self, char_offset: u32, byte_offset: u32) {
        debug_assert!(
            self.char_offsets.last().map_or(true, |&prev| char_offset > prev),
            "line starts must be recorded in increasing order"
        );
        self.char_offsets.push(char_offset);
        match &mut self.byte_offsets {
            Some(bytes) => {
                debug_assert!(bytes.last().map_or(true, |&prev| byte_offset > prev));
                bytes.push(byte_offset);
            }
            None if char_offset != byte_offset => {
                // First divergence: everything so far was 1:1, so seed the
                // byte list from the char list.
                let mut bytes = self.char_offsets.clone();
                *bytes.last_mut().unwrap() = byte_offset;
                self.byte_offsets = Some(bytes);
            }
            None => {}
        }
    }

    /// Number of lines recorded.
    pub fn line_count(&self) -> u32 {
        self.char_offsets.len() as u32
    }

    /// The largest line whose start is at or before `char_offset`, with its
    /// start offsets. `None` when `char_offset` precedes the first line.
    pub fn line_for_character_offset(&self, char_offset: u32) -> Option<(u32, u32, u32)> {
        let line = match self.char_offsets.binary_search(&char_offset) {
            Ok(i) => i,
            Err(0) => return None,
            Err(i) => i - 1,
        };
        let (char_start, byte_start) = self.offsets_for_line(line as u32)?;
        Some((line as u32, char_start, byte_start))
    }

    /// The start offsets of `line`, or `None` when `line` is out of range.
    /// The byte offset equals the char offset while no multi-byte character
    /// has been recorded.
    pub fn offsets_for_line(&self, line: u32) -> Option<(u32, u32)> {
        let char_start = *self.char_offsets.get(line as usize)?;
        let byte_start = match &self.byte_offsets {
            Some(bytes) => bytes[line as usize],
            None => char_start,
        };
        Some((char_start, byte_start))
    }

    /// The raw character-offset list.
    pub fn line_character_offsets(&self) -> &[u32] {
        &self.char_offsets
    }

    /// The raw byte-offset list, if one was materialized.
    pub fn line_byte_offsets(&self) -> Option<&[u32]> {
        self.byte_offsets.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mixed_terminators() {
        // "a\r\nb\nc": lines at char offsets 0, 3, 5.
        let cache = LineOffsetCache::new(b"a\r\nb\nc", 0, 0);
        assert_eq!(cache.line_character_offsets(), &[0, 3, 5]);
        assert!(cache.line_byte_offsets().is_none());
    }

    #[test]
    fn unicode_line_separators() {
        let src = "a\u{2028}b\u{2029}c".as_bytes();
        let cache = LineOffsetCache::new(src, 0, 0);
        // U+2028 is one character but three bytes.
        assert_eq!(cache.line_character_offsets(), &[0, 2, 4]);
        assert_eq!(cache.line_byte_offsets().unwrap(), &[0, 4, 8]);
    }

    #[test]
    fn byte_list_materializes_on_first_divergence() {
        let src = "ab\ncd\u{00e9}\nef\n".as_bytes();
        let cache = LineOffsetCache::new(src, 0, 0);
        // The é adds a byte; only the lines after it diverge.
        assert_eq!(cache.line_character_offsets(), &[0, 3, 7, 10]);
        assert_eq!(cache.line_byte_offsets().unwrap(), &[0, 3, 8, 11]);
    }

    #[test]
    fn lookup_finds_containing_line() {
        let cache = LineOffsetCache::new(b"ab\ncd\nef", 0, 0);
        assert_eq!(cache.line_for_character_offset(0), Some((0, 0, 0)));
        assert_eq!(cache.line_for_character_offset(2), Some((0, 0, 0)));
        assert_eq!(cache.line_for_character_offset(3), Some((1, 3, 3)));
        assert_eq!(cache.line_for_character_offset(4), Some((1, 3, 3)));
        assert_eq!(cache.line_for_character_offset(100), Some((2, 6, 6)));
    }

    #[test]
    fn offset_before_first_line_is_none() {
        let cache = LineOffsetCache::new(b"ab\ncd", 5, 5);
        assert_eq!(cache.line_for_character_offset(2), None);
        assert_eq!(cache.line_for_character_offset(5), Some((0, 5, 5)));
    }

    #[test]
    fn out_of_range_line_fails() {
        let cache = LineOffsetCache::new(b"ab", 0, 0);
        assert_eq!(cache.line_count(), 1);
        assert!(cache.offsets_for_line(1).is_none());
    }

    proptest! {
        #[test]
        fn char_offsets_strictly_increase(src in "\\PC*(\n|\r|\r\n|\u{2028})*\\PC*") {
            let cache = LineOffsetCache::new(src.as_bytes(), 0, 0);
            let offsets = cache.line_character_offsets();
            for w in offsets.windows(2) {
                prop_assert!(w[0] < w[1]);
            }
            if let Some(bytes) = cache.line_byte_offsets() {
                prop_assert_eq!(bytes.len(), offsets.len());
                for w in bytes.windows(2) {
                    prop_assert!(w[0] < w[1]);
                }
            }
        }
    }
}

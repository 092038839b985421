//! Offset bookkeeping between the tokenizer's char-indexed markers,
//! byte offsets, and LSP line/character positions.
use lsp_types::Position;

/// Precomputed index over a document text. Line starts are byte
/// offsets; a char→byte table is materialised only for non-ASCII texts.
#[derive(Clone, Debug)]
pub struct TextIndex {
    line_offsets: Vec<usize>,
    char_to_byte: Option<Vec<usize>>,
    len: usize,
}

impl TextIndex {
    pub fn new(text: &str) -> TextIndex {
        let mut line_offsets = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_offsets.push(i + 1);
            }
        }
        let char_to_byte = if text.is_ascii() {
            None
        } else {
            let mut table: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
            table.push(text.len());
            Some(table)
        };
        TextIndex {
            line_offsets,
            char_to_byte,
            len: text.len(),
        }
    }

    /// Byte offset of the `char_index`-th character.
    pub fn byte_offset(&self, char_index: usize) -> usize {
        match &self.char_to_byte {
            Some(table) => *table.get(char_index).unwrap_or(&self.len),
            None => char_index.min(self.len),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    /// Line/character for a byte offset. Characters are UTF-16 code
    /// units per the LSP default encoding; `text` must be the document
    /// this index was built from.
    pub fn position_at(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_offsets.binary_search(&offset) {
            Ok(line) => line,
            Err(insert) => insert - 1,
        };
        let line_start = self.line_offsets[line];
        let character: usize = text[line_start..offset].chars().map(char::len_utf16).sum();
        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    /// Byte offset for a line/character position; clamps past-the-end
    /// positions onto the document.
    pub fn offset_at(&self, text: &str, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_offsets.len() {
            return self.len;
        }
        let line_start = self.line_offsets[line];
        let line_end = self
            .line_offsets
            .get(line + 1)
            .copied()
            .unwrap_or(self.len);
        let mut remaining = position.character as usize;
        for (i, c) in text[line_start..line_end].char_indices() {
            if remaining == 0 || c == '\n' {
                return line_start + i;
            }
            remaining = remaining.saturating_sub(c.len_utf16());
        }
        line_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_positions() {
        let text = "a: 1\nb: 2\n";
        let index = TextIndex::new(text);
        assert_eq!(index.position_at(text, 0), Position::new(0, 0));
        assert_eq!(index.position_at(text, 8), Position::new(1, 3));
        assert_eq!(index.offset_at(text, Position::new(1, 3)), 8);
    }

    #[test]
    fn multibyte_positions() {
        let text = "k: \"héllo\"\n";
        let index = TextIndex::new(text);
        // The char at char-index 5 is 'é' at byte 5; 'l' afterwards sits
        // at byte 7.
        assert_eq!(index.byte_offset(5), 5);
        assert_eq!(index.byte_offset(6), 7);
        let pos = index.position_at(text, 7);
        assert_eq!(pos, Position::new(0, 6));
    }

    #[test]
    fn clamps_past_the_end() {
        let text = "a: 1";
        let index = TextIndex::new(text);
        assert_eq!(index.offset_at(text, Position::new(5, 0)), 4);
        assert_eq!(index.position_at(text, 99), Position::new(0, 4));
    }
}

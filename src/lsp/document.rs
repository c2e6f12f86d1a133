use ropey::Rope;

use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent, Url};

use crate::completion::{CaretContext, ColumnRange, EditEvent};

/// Converts an LSP position (UTF-16 code units) to a char index in the Rope,
/// clamping past-the-end lines and columns.
pub fn position_to_char(position: &Position, text: &Rope) -> usize {
    let line = position.line as usize;
    if line >= text.len_lines() {
        return text.len_chars();
    }
    let line_start = text.line_to_char(line);
    let slice = text.line(line);
    let content_chars = line_content(&slice.to_string()).chars().count();
    let utf16 = (position.character as usize).min(slice.len_utf16_cu());
    line_start + slice.utf16_cu_to_char(utf16).min(content_chars)
}

/// Converts a char index in the Rope to an LSP position.
pub fn char_to_position(char_idx: usize, text: &Rope) -> Position {
    let char_idx = char_idx.min(text.len_chars());
    let line = text.char_to_line(char_idx);
    let column = char_idx - text.line_to_char(line);
    Position::new(line as u32, text.line(line).char_to_utf16_cu(column) as u32)
}

/// Line text without its terminator
fn line_content(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Caret as (line, char column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caret {
    pub line: usize,
    pub column: usize,
}

/// One open document: text, version and the caret implied by the last edit
#[derive(Debug, Clone)]
pub struct EditorDocument {
    pub uri: Url,
    pub version: i32,
    pub text: Rope,
    pub caret: Caret,
}

impl EditorDocument {
    pub fn new(uri: Url, version: i32, text: &str) -> Self {
        let text = Rope::from_str(text);
        let end = text.len_chars();
        let line = text.char_to_line(end);
        let caret = Caret {
            line,
            column: end - text.line_to_char(line),
        };
        Self {
            uri,
            version,
            text,
            caret,
        }
    }

    /// Line text at `line` (empty past the end)
    pub fn line_text(&self, line: usize) -> String {
        if line >= self.text.len_lines() {
            return String::new();
        }
        line_content(&self.text.line(line).to_string()).to_string()
    }

    /// Line and caret column the completion engine reads
    pub fn caret_context(&self) -> CaretContext {
        CaretContext::new(self.line_text(self.caret.line), self.caret.column)
    }

    /// Move the caret to an LSP position
    pub fn set_caret(&mut self, position: &Position) {
        let char_idx = position_to_char(position, &self.text);
        let line = self.text.char_to_line(char_idx);
        self.caret = Caret {
            line,
            column: char_idx - self.text.line_to_char(line),
        };
    }

    /// LSP range of a char-column range on the caret line
    pub fn column_range(&self, line: usize, columns: ColumnRange) -> Range {
        let line_text = self.line_text(line);
        let utf16_at = |column: usize| -> u32 {
            line_text.chars().take(column).map(char::len_utf16).sum::<usize>() as u32
        };
        Range::new(
            Position::new(line as u32, utf16_at(columns.start)),
            Position::new(line as u32, utf16_at(columns.end)),
        )
    }

    /// Applies content changes, moving the caret to the end of the last edit.
    /// Returns the keystroke the changes amount to, if they are a single
    /// typed character or a single deletion.
    pub fn apply(
        &mut self,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: i32,
    ) -> Result<Option<EditEvent>, String> {
        if version <= self.version {
            return Err(format!("Version {} not newer than {}", version, self.version));
        }

        let single = changes.len() == 1;
        let mut event = None;
        for change in changes {
            match change.range {
                Some(range) => {
                    let start = position_to_char(&range.start, &self.text);
                    let end = position_to_char(&range.end, &self.text).max(start);
                    self.text.remove(start..end);
                    self.text.insert(start, &change.text);

                    let inserted = change.text.chars().count();
                    let caret_idx = start + inserted;
                    let line = self.text.char_to_line(caret_idx);
                    self.caret = Caret {
                        line,
                        column: caret_idx - self.text.line_to_char(line),
                    };

                    if single {
                        event = classify(start, end, &change.text);
                    }
                }
                None => {
                    *self = Self::new(self.uri.clone(), self.version, &change.text);
                }
            }
        }

        self.version = version;
        Ok(event)
    }
}

fn classify(start: usize, end: usize, text: &str) -> Option<EditEvent> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if start == end => Some(EditEvent::Insert(ch)),
        (None, _) if end > start => Some(EditEvent::Delete),
        _ => None,
    }
}

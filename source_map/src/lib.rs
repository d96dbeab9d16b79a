//! Source file registry for the analyzer
//!
//! Every file the loader reads (user packages and embedded standard library
//! stubs) is registered here once. The parser works on byte offsets; this
//! crate turns those offsets into line/column positions for diagnostics.

use std::collections::HashMap;
use std::fmt;

/// A resolved position in a source file (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }
}

/// A resolved span inside a single file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
    pub file_id: FileId,
}

impl SourceSpan {
    pub fn new(start: SourcePosition, end: SourcePosition, file_id: FileId) -> Self {
        Self {
            start,
            end,
            file_id,
        }
    }

    pub fn single_position(pos: SourcePosition, file_id: FileId) -> Self {
        Self {
            start: pos,
            end: SourcePosition::new(pos.line, pos.column + 1, pos.byte_offset + 1),
            file_id,
        }
    }
}

/// Unique identifier for a registered source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

impl FileId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

/// A registered source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name (path relative to the analysis root, or `$stub/<pkg>/<file>`)
    pub name: String,
    pub content: String,
    pub line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: String, content: String) -> Self {
        let line_starts = compute_line_starts(&content);
        Self {
            name,
            content,
            line_starts,
        }
    }

    /// Get a line without its terminator (1-based line numbers)
    pub fn get_line(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 || line_number > self.line_starts.len() {
            return None;
        }

        let start = self.line_starts[line_number - 1];
        let end = if line_number < self.line_starts.len() {
            self.line_starts[line_number]
        } else {
            self.content.len()
        };

        Some(self.content[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Convert a byte offset to a 1-based (line, column) pair
    pub fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };

        let line_start = self.line_starts.get(line_index).copied().unwrap_or(0);
        let column = offset.saturating_sub(line_start) + 1;

        (line_index + 1, column)
    }

    pub fn offset_to_position(&self, offset: usize) -> SourcePosition {
        let (line, column) = self.offset_to_line_col(offset);
        SourcePosition::new(line, column, offset)
    }
}

/// Registry of all files taking part in one analysis run
#[derive(Debug, Clone)]
pub struct SourceMap {
    files: HashMap<FileId, SourceFile>,
    next_id: usize,
}

impl SourceMap {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            next_id: 0,
        }
    }

    /// Register a file and return its id
    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<String>) -> FileId {
        let file_id = FileId(self.next_id);
        self.next_id += 1;

        self.files
            .insert(file_id, SourceFile::new(name.into(), content.into()));

        file_id
    }

    pub fn get_file(&self, file_id: FileId) -> Option<&SourceFile> {
        self.files.get(&file_id)
    }

    pub fn file_name(&self, file_id: FileId) -> Option<&str> {
        self.get_file(file_id).map(|file| file.name.as_str())
    }

    pub fn offset_to_line_col(&self, file_id: FileId, offset: usize) -> Option<(usize, usize)> {
        self.get_file(file_id)
            .map(|file| file.offset_to_line_col(offset))
    }

    /// Resolve a parser byte range into a `SourceSpan`
    pub fn span_from_offsets(&self, file_id: FileId, start: usize, end: usize) -> Option<SourceSpan> {
        let file = self.get_file(file_id)?;
        let start_pos = file.offset_to_position(start);
        let end_pos = file.offset_to_position(end.max(start));
        Some(SourceSpan::new(start_pos, end_pos, file_id))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for SourceMap {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut line_starts = vec![0];

    for (i, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push(i + 1);
        }
    }

    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_map_lines() {
        let mut source_map = SourceMap::new();
        let file_id = source_map.add_file("main.go", "package main\n\nfunc main() {}");

        let file = source_map.get_file(file_id).unwrap();
        assert_eq!(file.get_line(1), Some("package main"));
        assert_eq!(file.get_line(2), Some(""));
        assert_eq!(file.get_line(3), Some("func main() {}"));
        assert_eq!(file.get_line(4), None);
    }

    #[test]
    fn test_offset_to_line_col() {
        let mut source_map = SourceMap::new();
        let file_id = source_map.add_file("main.go", "res := get()\ndefer res.Close()\n");

        assert_eq!(source_map.offset_to_line_col(file_id, 0), Some((1, 1)));
        assert_eq!(source_map.offset_to_line_col(file_id, 7), Some((1, 8)));
        assert_eq!(source_map.offset_to_line_col(file_id, 13), Some((2, 1)));
        assert_eq!(source_map.offset_to_line_col(file_id, 19), Some((2, 7)));
    }

    #[test]
    fn test_files_get_distinct_ids() {
        let mut source_map = SourceMap::new();
        let first = source_map.add_file("a.go", "package a");
        let second = source_map.add_file("b.go", "package a");

        assert_eq!(source_map.len(), 2);
        assert_ne!(first, second);
        assert_eq!(source_map.file_name(first), Some("a.go"));
        assert_eq!(source_map.file_name(second), Some("b.go"));
    }
}

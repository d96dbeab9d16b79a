//! Diagnostics library for analyzer output
//!
//! This library provides rustc-style diagnostics with:
//! - Severity levels (Error, Warning, Info, Hint)
//! - Source code snippets with an underline under the reported span
//! - Secondary labels pointing at related declarations
//! - Optional colored terminal output

use std::fmt;

// Re-export source mapping types from the source_map crate
pub use source_map::{FileId, SourceFile, SourceMap, SourcePosition, SourceSpan};

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

impl DiagnosticSeverity {
    fn color(self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "\x1b[31m",
            DiagnosticSeverity::Warning => "\x1b[33m",
            DiagnosticSeverity::Info => "\x1b[36m",
            DiagnosticSeverity::Hint => "\x1b[32m",
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Info => write!(f, "info"),
            DiagnosticSeverity::Hint => write!(f, "hint"),
        }
    }
}

/// Style for diagnostic labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Primary,
    Secondary,
}

/// A label that points to a span of code
#[derive(Debug, Clone)]
pub struct Label {
    pub span: SourceSpan,
    pub message: String,
    pub style: LabelStyle,
}

impl Label {
    pub fn primary(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    pub fn secondary(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}

/// A diagnostic message with severity, labels, notes and help text
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: Option<String>,
    pub message: String,
    pub span: SourceSpan,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub help: Vec<String>,
}

/// Collection of diagnostics
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.with_severity(DiagnosticSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.with_severity(DiagnosticSeverity::Warning)
    }

    fn with_severity(&self, severity: DiagnosticSeverity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity == severity)
    }

    /// Order diagnostics by file and position
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            (a.span.file_id, a.span.start.byte_offset)
                .cmp(&(b.span.file_id, b.span.start.byte_offset))
        });
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            diagnostics: iter.into_iter().collect(),
        }
    }
}

/// Builder for creating diagnostics
pub struct DiagnosticBuilder {
    severity: DiagnosticSeverity,
    code: Option<String>,
    message: String,
    span: SourceSpan,
    labels: Vec<Label>,
    notes: Vec<String>,
    help: Vec<String>,
}

impl DiagnosticBuilder {
    fn with_severity(severity: DiagnosticSeverity, message: String, span: SourceSpan) -> Self {
        Self {
            severity,
            code: None,
            message,
            span,
            labels: vec![],
            notes: vec![],
            help: vec![],
        }
    }

    pub fn error(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, message.into(), span)
    }

    pub fn warning(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, message.into(), span)
    }

    pub fn info(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::with_severity(DiagnosticSeverity::Info, message.into(), span)
    }

    pub fn hint(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::with_severity(DiagnosticSeverity::Hint, message.into(), span)
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn label(mut self, span: SourceSpan, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    pub fn secondary_label(mut self, span: SourceSpan, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn help(mut self, help_msg: impl Into<String>) -> Self {
        self.help.push(help_msg.into());
        self
    }

    pub fn build(self) -> Diagnostic {
        Diagnostic {
            severity: self.severity,
            code: self.code,
            message: self.message,
            span: self.span,
            labels: self.labels,
            notes: self.notes,
            help: self.help,
        }
    }
}

const RESET: &str = "\x1b[0m";
const GUTTER: &str = "\x1b[96m";

/// Formatter for displaying diagnostics
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new() -> Self {
        Self { use_colors: false }
    }

    pub fn with_colors() -> Self {
        Self { use_colors: true }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }

    pub fn format_diagnostics(&self, diagnostics: &Diagnostics, source_map: &SourceMap) -> String {
        let mut output = String::new();

        for (i, diagnostic) in diagnostics.diagnostics.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            output.push_str(&self.format_diagnostic(diagnostic, source_map));
        }

        output
    }

    pub fn format_diagnostic(&self, diagnostic: &Diagnostic, source_map: &SourceMap) -> String {
        let mut output = String::new();

        // Header
        let mut header = diagnostic.severity.to_string();
        if let Some(code) = &diagnostic.code {
            header.push_str(&format!("[{}]", code));
        }
        output.push_str(&self.paint(diagnostic.severity.color(), &header));
        output.push_str(": ");
        output.push_str(&self.paint("\x1b[1;97m", &diagnostic.message));
        output.push('\n');

        if let Some(file) = source_map.get_file(diagnostic.span.file_id) {
            let span = &diagnostic.span;
            output.push_str(&format!(
                "  {} {}:{}:{}\n",
                self.paint(GUTTER, "-->"),
                file.name,
                span.start.line,
                span.start.column
            ));

            let line_num = span.start.line;
            let width = line_num.to_string().len();
            let bar = self.paint(GUTTER, "|");

            output.push_str(&format!("{:width$} {}\n", "", bar, width = width));

            if let Some(line) = file.get_line(line_num) {
                output.push_str(&format!(
                    "{} {} {}\n",
                    self.paint(GUTTER, &line_num.to_string()),
                    bar,
                    line
                ));

                let padding = " ".repeat(span.start.column.saturating_sub(1));
                let underline_len = underline_length(span, line);
                output.push_str(&format!(
                    "{:width$} {} {}{}",
                    "",
                    bar,
                    padding,
                    self.paint(diagnostic.severity.color(), &"^".repeat(underline_len)),
                    width = width
                ));

                if let Some(label) = diagnostic
                    .labels
                    .iter()
                    .find(|l| l.style == LabelStyle::Primary)
                {
                    output.push(' ');
                    output.push_str(&self.paint(diagnostic.severity.color(), &label.message));
                }
                output.push('\n');
            }
        }

        for label in &diagnostic.labels {
            if label.style == LabelStyle::Secondary
                && let Some(file) = source_map.get_file(label.span.file_id)
            {
                output.push_str(&format!(
                    "  {} {}:{}:{}: {}\n",
                    self.paint(GUTTER, "-->"),
                    file.name,
                    label.span.start.line,
                    label.span.start.column,
                    label.message
                ));
            }
        }

        for help_msg in &diagnostic.help {
            output.push_str(&format!(
                "     {}: {}\n",
                self.paint("\x1b[32m", "help"),
                help_msg
            ));
        }

        for note in &diagnostic.notes {
            output.push_str(&format!("{}: {}\n", self.paint("\x1b[34m", "note"), note));
        }

        output
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Underline width: the span on its first line, or the identifier under a point span
fn underline_length(span: &SourceSpan, line: &str) -> usize {
    let start_col = span.start.column.saturating_sub(1);
    let len = if span.start.line == span.end.line {
        span.end.column.saturating_sub(span.start.column)
    } else {
        line.len().saturating_sub(start_col)
    };

    if len > 1 {
        return len;
    }

    let detected = line
        .get(start_col..)
        .map(|rest| {
            rest.chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .count()
        })
        .unwrap_or(0);

    detected.max(len).max(1)
}

/// Result type that includes diagnostics
pub type DiagnosticResult<T> = Result<T, Diagnostics>;

// Closecheck-specific diagnostics
pub mod closecheck;

#[cfg(test)]
mod tests {
    use super::*;

    fn span_on(file_id: FileId, line: usize, start: usize, end: usize, offset: usize) -> SourceSpan {
        SourceSpan::new(
            SourcePosition::new(line, start, offset),
            SourcePosition::new(line, end, offset + (end - start)),
            file_id,
        )
    }

    #[test]
    fn test_diagnostic_builder() {
        let span = span_on(FileId::new(0), 1, 5, 6, 4);

        let diagnostic = DiagnosticBuilder::warning("resp should be closed", span.clone())
            .code("C1004")
            .label(span, "here")
            .help("call Close")
            .note("additional info")
            .build();

        assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
        assert_eq!(diagnostic.code, Some("C1004".to_string()));
        assert_eq!(diagnostic.message, "resp should be closed");
        assert_eq!(diagnostic.labels.len(), 1);
        assert_eq!(diagnostic.help.len(), 1);
        assert_eq!(diagnostic.notes.len(), 1);
    }

    #[test]
    fn test_plain_formatting_underlines_identifier() {
        let mut source_map = SourceMap::new();
        let file_id = source_map.add_file("main.go", "package main\n\tresp, err := get()\n");
        let span = span_on(file_id, 2, 2, 2, 14);

        let diagnostic = DiagnosticBuilder::warning("`resp` was not closed", span.clone())
            .code("C1005")
            .label(span, "declared here")
            .build();

        let text = ErrorFormatter::new().format_diagnostic(&diagnostic, &source_map);
        assert!(text.starts_with("warning[C1005]: `resp` was not closed\n"));
        assert!(text.contains("  --> main.go:2:2\n"));
        assert!(text.contains("2 | \tresp, err := get()\n"));
        assert!(text.contains("  |  ^^^^ declared here\n"));
    }

    #[test]
    fn test_sort_and_severity_filters() {
        let file_id = FileId::new(0);
        let mut diagnostics: Diagnostics = vec![
            DiagnosticBuilder::warning("second", span_on(file_id, 3, 1, 2, 30)).build(),
            DiagnosticBuilder::error("first", span_on(file_id, 1, 1, 2, 0)).build(),
        ]
        .into_iter()
        .collect();

        diagnostics.sort();
        assert_eq!(diagnostics.diagnostics[0].message, "first");
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.errors().count(), 1);
        assert_eq!(diagnostics.warnings().count(), 1);
    }
}

//! Parser error type that keeps `context()` labels and the deepest failure

use std::fmt;

use diagnostics::closecheck::CloseCheckDiagnostics;
use diagnostics::{Diagnostic, FileId, SourceMap, SourcePosition, SourceSpan};
use nom::error::{ContextError, ErrorKind, FromExternalError, ParseError as NomParseError};

/// nom error carrying the context stack collected while unwinding
#[derive(Debug, Clone, PartialEq)]
pub struct ContextualError<I> {
    pub input: I,
    pub code: ErrorKind,
    /// Innermost context first
    pub contexts: Vec<(I, &'static str)>,
    pub message: Option<String>,
}

impl<I> ContextualError<I> {
    pub fn new(input: I, code: ErrorKind) -> Self {
        Self {
            input,
            code,
            contexts: Vec::new(),
            message: None,
        }
    }

    pub fn with_message(input: I, message: impl Into<String>) -> Self {
        Self {
            input,
            code: ErrorKind::Verify,
            contexts: Vec::new(),
            message: Some(message.into()),
        }
    }
}

impl<'a> NomParseError<&'a str> for ContextualError<&'a str> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::new(input, kind)
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        // Less remaining input means the branch got further
        if other.input.len() < self.input.len() {
            other
        } else if self.input.len() < other.input.len() {
            self
        } else if other.contexts.len() > self.contexts.len() {
            other
        } else {
            self
        }
    }
}

impl<'a> ContextError<&'a str> for ContextualError<&'a str> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.contexts.push((input, ctx));
        other
    }
}

impl<'a, E: fmt::Display> FromExternalError<&'a str, E> for ContextualError<&'a str> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: E) -> Self {
        Self::with_message(input, e.to_string())
    }
}

/// Parse failure of a whole file, positioned by byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub file_name: String,
    pub message: String,
    pub offset: usize,
    /// `(offset, label)` pairs, innermost first
    pub contexts: Vec<(usize, &'static str)>,
}

impl ParseError {
    pub(crate) fn from_nom(file_name: &str, full: &str, error: ContextualError<&str>) -> Self {
        let offset = full.len() - error.input.len();
        let message = error
            .message
            .unwrap_or_else(|| format!("unexpected {}", describe_input(error.input)));
        let contexts = error
            .contexts
            .iter()
            .map(|(input, ctx)| (full.len() - input.len(), *ctx))
            .collect();

        Self {
            file_name: file_name.to_string(),
            message,
            offset,
            contexts,
        }
    }

    pub(crate) fn incomplete(file_name: &str, full: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            message: "unexpected end of file".to_string(),
            offset: full.len(),
            contexts: Vec::new(),
        }
    }

    /// Innermost construct being parsed when the error happened
    pub fn innermost_context(&self) -> Option<&'static str> {
        self.contexts.first().map(|(_, ctx)| *ctx)
    }

    pub fn to_diagnostic(&self, source_map: &SourceMap, file_id: FileId) -> Diagnostic {
        let span = source_map
            .span_from_offsets(file_id, self.offset, self.offset + 1)
            .unwrap_or_else(|| {
                SourceSpan::single_position(SourcePosition::new(1, 1, self.offset), file_id)
            });
        CloseCheckDiagnostics::syntax_error(span, &self.message, self.innermost_context())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: offset {}: {}", self.file_name, self.offset, self.message)?;
        if let Some(ctx) = self.innermost_context() {
            write!(f, " (in {})", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

fn describe_input(input: &str) -> String {
    let trimmed = input.trim_start();
    match trimmed.chars().next() {
        None => "end of file".to_string(),
        Some(_) => {
            let token: String = trimmed
                .chars()
                .take_while(|c| !c.is_whitespace())
                .take(16)
                .collect();
            format!("'{}'", token)
        }
    }
}

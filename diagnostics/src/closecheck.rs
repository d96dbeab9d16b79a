//! Closecheck-specific diagnostic builders
//!
//! Findings are warnings: they describe leaks in the analyzed program, not
//! failures of the tool. Load problems are errors.

use crate::{Diagnostic, DiagnosticBuilder, SourceSpan};

/// Why a disposable call result escaped without being bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnassignedCause {
    /// Bare expression statement
    NotAssigned,
    /// `defer f()`
    Defer,
    /// `go f()`
    Go,
}

impl UnassignedCause {
    pub fn code(self) -> &'static str {
        match self {
            UnassignedCause::NotAssigned => "C1001",
            UnassignedCause::Defer => "C1002",
            UnassignedCause::Go => "C1003",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            UnassignedCause::NotAssigned => {
                "return value won't be closed because it wasn't assigned"
            }
            UnassignedCause::Defer => {
                "return value won't be closed because it's on defer statement"
            }
            UnassignedCause::Go => "return value won't be closed because it's on go statement",
        }
    }
}

/// Provides the diagnostics closecheck reports
pub struct CloseCheckDiagnostics;

impl CloseCheckDiagnostics {
    /// Disposable call result dropped by a bare, `defer` or `go` statement
    pub fn unassigned_result(span: SourceSpan, cause: UnassignedCause) -> Diagnostic {
        let label = match cause {
            UnassignedCause::NotAssigned => "result of this call is discarded",
            UnassignedCause::Defer => "deferred call discards its result",
            UnassignedCause::Go => "goroutine call discards its result",
        };

        DiagnosticBuilder::warning(cause.message(), span.clone())
            .code(cause.code())
            .label(span, label)
            .help("bind the result and close it")
            .build()
    }

    /// Disposable value bound to the blank identifier
    pub fn discarded_to_blank(span: SourceSpan, type_name: &str) -> Diagnostic {
        DiagnosticBuilder::warning(format!("{} should be closed", type_name), span.clone())
            .code("C1004")
            .label(span, "assigned to the blank identifier")
            .help("give the value a name and close it before returning")
            .build()
    }

    /// Tracked value that is neither closed, returned nor handed to a disposer
    pub fn not_closed(
        span: SourceSpan,
        name: &str,
        type_name: &str,
        field_decl: Option<SourceSpan>,
    ) -> Diagnostic {
        let mut builder = DiagnosticBuilder::warning(
            format!("{} ({}) was not closed", name, type_name),
            span.clone(),
        )
        .code("C1005")
        .label(span, "value produced here");

        if let Some(decl) = field_decl {
            builder = builder.secondary_label(decl, "field declared here");
        }

        builder
            .note("values are only proven closed by straight-line code and a single level of `if`")
            .build()
    }

    /// Source file could not be parsed
    pub fn syntax_error(span: SourceSpan, message: &str, context: Option<&str>) -> Diagnostic {
        let mut builder = DiagnosticBuilder::error(message.to_string(), span.clone())
            .code("E0001")
            .label(span, "unexpected input");

        if let Some(ctx) = context {
            builder = builder.note(format!("while parsing {}", ctx));
        }

        builder.build()
    }

    /// Import that resolves to neither a stub package nor a directory
    pub fn unresolved_import(span: SourceSpan, path: &str) -> Diagnostic {
        DiagnosticBuilder::error(format!("cannot resolve import \"{}\"", path), span.clone())
            .code("E4001")
            .label(span, "imported here")
            .help("packages are looked up relative to the analysis root")
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiagnosticSeverity, FileId, SourcePosition};

    fn span() -> SourceSpan {
        SourceSpan::new(
            SourcePosition::new(6, 2, 40),
            SourcePosition::new(6, 7, 45),
            FileId::new(0),
        )
    }

    #[test]
    fn test_unassigned_messages() {
        let diagnostic = CloseCheckDiagnostics::unassigned_result(span(), UnassignedCause::Defer);

        assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
        assert_eq!(diagnostic.code.as_deref(), Some("C1002"));
        assert_eq!(
            diagnostic.message,
            "return value won't be closed because it's on defer statement"
        );
        assert_eq!(UnassignedCause::Go.code(), "C1003");
    }

    #[test]
    fn test_not_closed_with_field_label() {
        let diagnostic =
            CloseCheckDiagnostics::not_closed(span(), "res.Body", "io.ReadCloser", Some(span()));

        assert_eq!(diagnostic.message, "res.Body (io.ReadCloser) was not closed");
        assert_eq!(diagnostic.labels.len(), 2);
        assert_eq!(diagnostic.notes.len(), 1);
    }

    #[test]
    fn test_load_errors_are_errors() {
        let diagnostic = CloseCheckDiagnostics::unresolved_import(span(), "example.com/x");
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostic.code.as_deref(), Some("E4001"));
    }
}

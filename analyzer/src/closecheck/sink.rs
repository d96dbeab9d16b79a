//! Findings and where they go
//!
//! A [`Finding`] is one position-tagged leak report. The passes hand them to a
//! [`DiagnosticSink`]; the driver collects them into a `Vec` and turns them
//! into [`Diagnostic`]s for display.

use diagnostics::closecheck::{CloseCheckDiagnostics, UnassignedCause};
use diagnostics::Diagnostic;
use serde::Serialize;
use source_map::SourceSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingKind {
    /// Disposable call result never bound
    Unassigned(UnassignedCause),
    /// Disposable value bound to `_`
    DiscardedToBlank { type_name: String },
    /// Tracked value never closed, returned or delegated
    NotClosed {
        name: String,
        type_name: String,
        /// Declaration of the disposable field, for `x.Field` values
        field_decl: Option<SourceSpan>,
    },
}

impl FindingKind {
    pub fn code(&self) -> &'static str {
        match self {
            FindingKind::Unassigned(cause) => cause.code(),
            FindingKind::DiscardedToBlank { .. } => "C1004",
            FindingKind::NotClosed { .. } => "C1005",
        }
    }

    pub fn message(&self) -> String {
        match self {
            FindingKind::Unassigned(cause) => cause.message().to_string(),
            FindingKind::DiscardedToBlank { type_name } => format!("{} should be closed", type_name),
            FindingKind::NotClosed {
                name, type_name, ..
            } => format!("{} ({}) was not closed", name, type_name),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub code: &'static str,
    #[serde(skip)]
    pub kind: FindingKind,
    pub message: String,
    pub file: String,
    #[serde(skip)]
    pub span: SourceSpan,
    pub line: usize,
    pub column: usize,
    /// Import path of the package the finding is in
    pub package: String,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        span: SourceSpan,
        file: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            code: kind.code(),
            message: kind.message(),
            file: file.into(),
            line: span.start.line,
            column: span.start.column,
            span,
            kind,
            package: package.into(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let span = self.span.clone();
        match &self.kind {
            FindingKind::Unassigned(cause) => CloseCheckDiagnostics::unassigned_result(span, *cause),
            FindingKind::DiscardedToBlank { type_name } => {
                CloseCheckDiagnostics::discarded_to_blank(span, type_name)
            }
            FindingKind::NotClosed {
                name,
                type_name,
                field_decl,
            } => CloseCheckDiagnostics::not_closed(span, name, type_name, field_decl.clone()),
        }
    }
}

/// Receives findings as the checker produces them
pub trait DiagnosticSink {
    fn report(&mut self, finding: Finding);
}

impl DiagnosticSink for Vec<Finding> {
    fn report(&mut self, finding: Finding) {
        self.push(finding);
    }
}

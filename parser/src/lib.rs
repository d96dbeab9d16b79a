//! Parser for the subset of Go consumed by the closecheck analyzer
//!
//! Built on nom. Every node carries a byte-offset [`Span`] into its file so
//! diagnostics can be rendered through the `source_map` crate.

pub mod custom_error;
pub mod go_ast;
pub mod go_parser;
pub mod go_parser_expr;
pub mod go_parser_stmt;
pub mod go_parser_types;

pub use custom_error::{ContextualError, ParseError};
pub use go_ast::*;
pub use go_parser::parse_go_file;

use diagnostics::{Diagnostic, DiagnosticBuilder, FileId, SourceMap, SourcePosition, SourceSpan};

/// Parse a file registered in `source_map`, reporting failure as a diagnostic
pub fn parse_go_file_with_diagnostics(
    source_map: &SourceMap,
    file_id: FileId,
) -> Result<GoFile, Diagnostic> {
    let Some(file) = source_map.get_file(file_id) else {
        let span = SourceSpan::single_position(SourcePosition::new(1, 1, 0), file_id);
        return Err(DiagnosticBuilder::error(format!("unknown source file {}", file_id), span).build());
    };

    parse_go_file(&file.name, &file.content).map_err(|e| e.to_diagnostic(source_map, file_id))
}

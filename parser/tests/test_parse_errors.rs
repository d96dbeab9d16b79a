//! Error reporting tests for the Go parser

use diagnostics::SourceMap;
use parser::{parse_go_file, parse_go_file_with_diagnostics};

#[test]
fn test_missing_package_clause() {
    let err = parse_go_file("bad.go", "func f() {}").expect_err("should fail");
    assert_eq!(err.file_name, "bad.go");
    assert_eq!(err.innermost_context(), Some("package clause"));
}

#[test]
fn test_unclosed_body_reports_offset() {
    let input = "package p\n\nfunc f() {\n\tx := 1\n";
    let err = parse_go_file("bad.go", input).expect_err("should fail");
    assert!(err.offset <= input.len());
    assert!(err.to_string().starts_with("bad.go: offset "));
}

#[test]
fn test_error_becomes_diagnostic() {
    let mut source_map = SourceMap::new();
    let file_id = source_map.add_file("bad.go", "package p\n\nfunc f() {\n\treturn )\n}\n");

    let diagnostic = parse_go_file_with_diagnostics(&source_map, file_id).expect_err("should fail");
    assert_eq!(diagnostic.code.as_deref(), Some("E0001"));
    assert_eq!(diagnostic.span.file_id, file_id);
}

use super::*;
use crate::closecheck::summarizer::Summarizer;
use crate::config::Config;
use crate::loader::{load_tree, SourceTree};

const PRELUDE: &str = r#"package app

import (
    "io"
    "net/http"
    "os"
)

type holder struct {
    f *os.File
}

func open() *os.File {
    f, _ := os.Open("data.txt")
    return f
}

func closeIt(c io.Closer) {
    c.Close()
}

func check(err error) {}
"#;

fn check_with(body: &str, config: &AnalysisConfig) -> Vec<Finding> {
    let source = format!("{}{}", PRELUDE, body);
    let mut tree = SourceTree::new();
    tree.add_file("app", "app.go", &source);
    let program = load_tree(&tree, &[], &Config::default()).expect("fixture loads");
    let package = program.package("app").unwrap();
    let view = PackageView::new(&program, package);
    let classifier = Classifier::new(&program.types, program.closer);
    let facts = FactStore::new();

    Summarizer::new(view, &classifier, &facts, config).run().unwrap();

    let mut findings = Vec::new();
    AssignmentChecker::new(view, &classifier, &facts, config).check_package(&mut findings);
    findings
}

fn check(body: &str) -> Vec<Finding> {
    check_with(body, &AnalysisConfig::default())
}

fn messages(findings: &[Finding]) -> Vec<&str> {
    findings.iter().map(|f| f.message.as_str()).collect()
}

/// 1-based line of the first line of the checked source containing `needle`
fn line_of(body: &str, needle: &str) -> usize {
    let source = format!("{}{}", PRELUDE, body);
    source
        .lines()
        .position(|line| line.contains(needle))
        .map(|i| i + 1)
        .unwrap()
}

#[test]
fn test_prelude_is_clean() {
    assert!(check("").is_empty());
}

#[test]
fn test_returned_value_is_not_reported() {
    let findings = check(
        r#"
func produce() *os.File {
    v := open()
    return v
}
"#,
    );
    assert!(findings.is_empty(), "{:?}", messages(&findings));
}

#[test]
fn test_unused_value_is_reported_at_its_binding() {
    let body = r#"
func leak() {
    v := open()
}
"#;
    let findings = check(body);

    assert_eq!(messages(&findings), vec!["v (*os.File) was not closed"]);
    assert_eq!(findings[0].code, "C1005");
    assert_eq!(findings[0].line, line_of(body, "v := open()"));
    assert_eq!(findings[0].package, "app");
}

#[test]
fn test_bare_call_fails_fast() {
    let findings = check(
        r#"
func leak() {
    open()
    f := open()
}
"#,
    );

    assert_eq!(
        messages(&findings),
        vec!["return value won't be closed because it wasn't assigned"]
    );
    assert_eq!(findings[0].code, "C1001");
}

#[test]
fn test_defer_and_go_causes() {
    let findings = check(
        r#"
func deferred() {
    defer open()
}

func spawned() {
    go open()
}
"#,
    );

    let codes: Vec<&str> = findings.iter().map(|f| f.code).collect();
    assert_eq!(codes, vec!["C1002", "C1003"]);
    assert_eq!(
        findings[0].message,
        "return value won't be closed because it's on defer statement"
    );
}

#[test]
fn test_bare_call_after_tracking_does_not_abort() {
    let findings = check(
        r#"
func mixed() {
    f := open()
    open()
    f.Close()
}
"#,
    );

    assert_eq!(
        messages(&findings),
        vec!["return value won't be closed because it wasn't assigned"]
    );
}

#[test]
fn test_multi_assign_is_positional() {
    let findings = check(
        r#"
func pair() {
    _, v2 := 1, open()
}
"#,
    );
    assert_eq!(messages(&findings), vec!["v2 (*os.File) was not closed"]);
}

#[test]
fn test_blank_targets_are_reported_in_every_form() {
    let findings = check(
        r#"
func single() {
    _ = open()
}

func multi() {
    _, _ = 1, open()
}

func tuple() {
    _, err := os.Open("x")
    check(err)
}
"#,
    );

    assert_eq!(
        messages(&findings),
        vec![
            "*os.File should be closed",
            "*os.File should be closed",
            "*os.File should be closed",
        ]
    );
    assert!(findings.iter().all(|f| f.code == "C1004"));
}

#[test]
fn test_field_paths() {
    let closed = check(
        r#"
func fetch() {
    res, err := http.Get("https://example.com")
    if err != nil {
        return
    }
    defer res.Body.Close()
}
"#,
    );
    assert!(closed.is_empty(), "{:?}", messages(&closed));

    let leaked = check(
        r#"
func fetch() {
    res, err := http.Get("https://example.com")
    check(err)
}
"#,
    );
    assert_eq!(messages(&leaked), vec!["res.Body (io.ReadCloser) was not closed"]);
    match &leaked[0].kind {
        FindingKind::NotClosed { field_decl, .. } => assert!(field_decl.is_some()),
        other => panic!("unexpected finding kind: {:?}", other),
    }
}

#[test]
fn test_closing_a_different_path_does_not_count() {
    let findings = check(
        r#"
func fetch() {
    res, _ := http.Get("https://example.com")
    other, _ := http.Get("https://example.com")
    other.Body.Close()
}
"#,
    );
    assert_eq!(messages(&findings), vec!["res.Body (io.ReadCloser) was not closed"]);
}

#[test]
fn test_delegation_to_a_disposer() {
    let findings = check(
        r#"
func delegate() {
    f := open()
    defer closeIt(f)

    res, _ := http.Get("https://example.com")
    closeIt(res.Body)
}
"#,
    );
    assert!(findings.is_empty(), "{:?}", messages(&findings));
}

#[test]
fn test_single_if_level_function_literals_and_nested_arguments() {
    let findings = check(
        r#"
func guarded() {
    f := open()
    if f != nil {
        f.Close()
    }
}

func initialized() {
    f := open()
    if err := f.Close(); err != nil {
        return
    }
}

func literal() {
    f := open()
    defer func() {
        f.Close()
    }()
}

func nested() {
    f := open()
    check(f.Close())
}
"#,
    );
    assert!(findings.is_empty(), "{:?}", messages(&findings));
}

#[test]
fn test_second_if_level_is_not_traversed() {
    let findings = check(
        r#"
func deep(a, b bool) {
    f := open()
    if a {
        if b {
            f.Close()
        }
    }
}
"#,
    );
    assert_eq!(messages(&findings), vec!["f (*os.File) was not closed"]);
}

#[test]
fn test_loops_are_not_traversed() {
    let findings = check(
        r#"
func looped() {
    f := open()
    for i := 0; i < 1; i++ {
        f.Close()
    }
}
"#,
    );
    assert_eq!(messages(&findings), vec!["f (*os.File) was not closed"]);
}

#[test]
fn test_escape_through_composite_literal() {
    let findings = check(
        r#"
func wrap() *holder {
    f := open()
    return &holder{f: f}
}
"#,
    );
    assert!(findings.is_empty(), "{:?}", messages(&findings));
}

#[test]
fn test_var_declarations_are_tracked() {
    let findings = check(
        r#"
func declared() {
    var f = open()
}
"#,
    );
    assert_eq!(messages(&findings), vec!["f (*os.File) was not closed"]);
}

#[test]
fn test_nop_wrappers_are_never_tracked() {
    let findings = check(
        r#"
func wrapped(src io.Reader) {
    r := io.NopCloser(src)
}
"#,
    );
    assert!(findings.is_empty(), "{:?}", messages(&findings));
}

#[test]
fn test_global_targets_are_suppressed() {
    let findings = check(
        r#"
var shared *os.File

func setup() {
    shared = open()
}
"#,
    );
    assert!(findings.is_empty(), "{:?}", messages(&findings));
}

#[test]
fn test_each_unresolved_value_is_reported() {
    let findings = check(
        r#"
func two() {
    a := open()
    b := open()
}
"#,
    );
    assert_eq!(
        messages(&findings),
        vec!["a (*os.File) was not closed", "b (*os.File) was not closed"]
    );
}

#[test]
fn test_custom_disposal_method() {
    let config = AnalysisConfig {
        disposal_method: "Shutdown".to_string(),
        ..AnalysisConfig::default()
    };
    let findings = check_with(
        r#"
func closed() {
    f := open()
    f.Close()
}
"#,
        &config,
    );
    assert_eq!(messages(&findings), vec!["f (*os.File) was not closed"]);
}

//! Fixture replay for the leak analysis
//!
//! Every package under `tests/fixtures/src` annotates what the analysis must
//! report with `// want` comments on the offending line:
//!
//! ```go
//! doReq() // want `return value won't be closed because it wasn't assigned`
//! func (c closer) closeBody(b io.Closer) { // want closeBody:"is closer"
//! ```
//!
//! A quoted pattern must match exactly one finding on that line and every
//! finding must be matched by a pattern. `name:"pattern"` checks the fact of
//! the function `name` declared on that line.

use std::path::{Path, PathBuf};

use analyzer::closecheck::{analyze, FactStore, Finding};
use analyzer::config::Config;
use analyzer::loader::{load, Package, Program};
use parser::Decl;
use regex::Regex;

#[derive(Debug)]
enum Want {
    Finding(Regex),
    Fact { function: String, pattern: Regex },
}

#[derive(Debug)]
struct Expectation {
    file: String,
    line: usize,
    want: Want,
}

fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/src")
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("bad want pattern {:?}: {}", pattern, e))
}

/// Parse the items after `want`: "re", `re` and name:"re"
fn parse_wants(mut rest: &str) -> Vec<Want> {
    let mut wants = Vec::new();

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let (function, body) = match rest.find(':') {
            Some(colon)
                if rest[..colon]
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_') =>
            {
                (Some(rest[..colon].to_string()), &rest[colon + 1..])
            }
            _ => (None, rest),
        };

        let (pattern, remainder) = read_quoted(body)
            .unwrap_or_else(|| panic!("malformed want annotation: {:?}", rest));
        wants.push(match function {
            Some(function) => Want::Fact {
                function,
                pattern: compile(&format!("^(?:{})$", pattern)),
            },
            None => Want::Finding(compile(&pattern)),
        });
        rest = remainder;
    }

    wants
}

/// Read one Go string literal, returning its value and the rest of the input
fn read_quoted(input: &str) -> Option<(String, &str)> {
    let mut chars = input.char_indices();
    let (_, quote) = chars.next()?;

    match quote {
        '`' => {
            let end = input[1..].find('`')? + 1;
            Some((input[1..end].to_string(), &input[end + 1..]))
        }
        '"' => {
            let mut value = String::new();
            let mut escaped = false;
            for (i, c) in chars {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    return Some((value, &input[i + 1..]));
                } else {
                    value.push(c);
                }
            }
            None
        }
        _ => None,
    }
}

fn expectations(program: &Program, package: &Package) -> Vec<Expectation> {
    let marker = Regex::new(r"//\s*want\s+(.*)$").unwrap();
    let mut out = Vec::new();

    for (file_id, _) in &package.files {
        let file = program.source_map.get_file(*file_id).unwrap();
        for (index, line) in file.content.lines().enumerate() {
            let Some(captures) = marker.captures(line) else {
                continue;
            };
            for want in parse_wants(&captures[1]) {
                out.push(Expectation {
                    file: file.name.clone(),
                    line: index + 1,
                    want,
                });
            }
        }
    }

    out
}

/// Fact of the function named `function` declared on `line` of `file`
fn fact_at(
    program: &Program,
    package: &Package,
    facts: &FactStore,
    file: &str,
    line: usize,
    function: &str,
) -> Option<String> {
    for (file_id, go_file) in &package.files {
        if program.source_map.file_name(*file_id) != Some(file) {
            continue;
        }
        for decl in &go_file.decls {
            let Decl::Func(func) = decl else {
                continue;
            };
            let (decl_line, _) = program
                .source_map
                .offset_to_line_col(*file_id, func.name.span.start)?;
            if decl_line != line || func.name.name != function {
                continue;
            }
            let key = package
                .info
                .object_of(&func.name)
                .and_then(|id| program.symbols.get(id))
                .and_then(|symbol| symbol.func_key.clone())?;
            return facts.import(&key).map(|fact| fact.to_string());
        }
    }
    None
}

fn run_fixture(name: &str) {
    let config = Config::default();
    let program = load(&fixture_root(), &[name.to_string()], &config)
        .unwrap_or_else(|e| panic!("fixture {} failed to load: {}", name, e));
    let facts = FactStore::new();
    let findings = analyze(&program, &facts, &config.analysis).unwrap();

    let mut unmatched: Vec<&Finding> = findings.iter().collect();
    let mut failures = Vec::new();

    for package in program.requested_packages() {
        for expectation in expectations(&program, package) {
            match &expectation.want {
                Want::Finding(pattern) => {
                    let position = unmatched.iter().position(|f| {
                        f.file == expectation.file
                            && f.line == expectation.line
                            && pattern.is_match(&f.message)
                    });
                    match position {
                        Some(i) => {
                            unmatched.remove(i);
                        }
                        None => failures.push(format!(
                            "{}:{}: no finding matching {:?}",
                            expectation.file, expectation.line, pattern.as_str()
                        )),
                    }
                }
                Want::Fact { function, pattern } => {
                    let fact = fact_at(
                        &program,
                        package,
                        &facts,
                        &expectation.file,
                        expectation.line,
                        function,
                    );
                    let matched = fact.as_deref().is_some_and(|fact| pattern.is_match(fact));
                    if !matched {
                        failures.push(format!(
                            "{}:{}: fact of {} is {:?}, want {:?}",
                            expectation.file,
                            expectation.line,
                            function,
                            fact,
                            pattern.as_str()
                        ));
                    }
                }
            }
        }
    }

    for finding in unmatched {
        failures.push(format!(
            "{}:{}: unexpected finding {:?}",
            finding.file, finding.line, finding.message
        ));
    }

    assert!(failures.is_empty(), "fixture {}:\n{}", name, failures.join("\n"));
}

#[test]
fn test_want_annotations_parse() {
    let wants = parse_wants(r#"closeBody:"is closer" `a \(b\)` "c \"d\"""#);
    assert_eq!(wants.len(), 3);
    match &wants[0] {
        Want::Fact { function, pattern } => {
            assert_eq!(function, "closeBody");
            assert!(pattern.is_match("is closer"));
            assert!(!pattern.is_match("is not closer"));
        }
        other => panic!("unexpected want {:?}", other),
    }
    match &wants[1] {
        Want::Finding(pattern) => assert!(pattern.is_match("a (b)")),
        other => panic!("unexpected want {:?}", other),
    }
    match &wants[2] {
        Want::Finding(pattern) => assert!(pattern.is_match(r#"c "d""#)),
        other => panic!("unexpected want {:?}", other),
    }
}

#[test]
fn test_http_response_assigned() {
    run_fixture("http-response-assigned");
}

#[test]
fn test_http_response_on_defer_statement() {
    run_fixture("http-response-on-defer-statement");
}

#[test]
fn test_http_response_nopcloser() {
    run_fixture("http-response-nopcloser");
}

#[test]
fn test_http_response_return() {
    run_fixture("http-response-return");
}

#[test]
fn test_http_response_external_closer() {
    run_fixture("http-response-external-closer");
}

#[test]
fn test_testhelper() {
    run_fixture("testhelper");
}

#[test]
fn test_struct_field() {
    run_fixture("struct-field");
}

#[test]
fn test_multi_assign() {
    run_fixture("multi-assign");
}

#[test]
fn test_field_leak() {
    run_fixture("field-leak");
}

#[test]
fn test_locked_writer() {
    run_fixture("locked-writer");
}

#[test]
fn test_whole_tree() {
    let config = Config::default();
    let program = load(&fixture_root(), &[], &config).unwrap();
    let findings = analyze(&program, &FactStore::new(), &config.analysis).unwrap();

    let mut codes: Vec<&str> = findings.iter().map(|f| f.code).collect();
    codes.sort();
    assert_eq!(
        codes,
        vec!["C1001", "C1002", "C1003", "C1004", "C1005", "C1005", "C1005", "C1005", "C1005"]
    );
}

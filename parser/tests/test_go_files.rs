//! Whole-file parsing tests for the Go parser

use parser::{parse_go_file, Decl, ExprKind, StmtKind, TypeExprKind};

#[test]
fn test_package_imports_and_functions() {
    let input = r#"package example

import (
	"io"
	nethttp "net/http"
	_ "embed"
)

func fetch(url string) (*nethttp.Response, error) {
	return nethttp.Get(url)
}

func closeAll(cs ...io.Closer) {
	for _, c := range cs {
		c.Close()
	}
}
"#;

    match parse_go_file("example.go", input) {
        Ok(file) => {
            assert_eq!(file.package.name, "example");
            assert_eq!(file.imports.len(), 3);
            assert_eq!(file.imports[1].local_name(), "nethttp");
            assert_eq!(file.imports[1].default_name(), "http");
            assert_eq!(file.imports[1].path, "net/http");
            assert_eq!(file.decls.len(), 2);

            let Decl::Func(fetch) = &file.decls[0] else {
                panic!("expected function");
            };
            assert_eq!(fetch.name.name, "fetch");
            assert_eq!(fetch.sig.results.len(), 2);

            let Decl::Func(close_all) = &file.decls[1] else {
                panic!("expected function");
            };
            assert!(close_all.sig.is_variadic());
        }
        Err(e) => panic!("file should parse, got: {}", e),
    }
}

#[test]
fn test_types_methods_and_struct_fields() {
    let input = r#"package db

import "io"

type Conn struct {
	io.Closer
	Name, Addr string `json:"name"`
	inner      *Conn
}

type Closer interface {
	Close() error
}

func (c *Conn) Close() error { return nil }
"#;

    let file = match parse_go_file("db.go", input) {
        Ok(file) => file,
        Err(e) => panic!("file should parse, got: {}", e),
    };

    let Decl::Type(specs) = &file.decls[0] else {
        panic!("expected type declaration");
    };
    let TypeExprKind::Struct(fields) = &specs[0].ty.kind else {
        panic!("expected struct type");
    };
    assert_eq!(fields.len(), 3);
    assert!(fields[0].names.is_empty());
    assert_eq!(fields[1].names.len(), 2);
    assert!(fields[1].tag.is_some());

    let Decl::Func(method) = &file.decls[2] else {
        panic!("expected method");
    };
    let recv = method.recv.as_ref().expect("receiver");
    assert_eq!(recv.names[0].name, "c");
    assert!(matches!(recv.ty.kind, TypeExprKind::Pointer(_)));
}

#[test]
fn test_var_const_and_composite_literals() {
    let input = r#"package p

var (
	global = &Conn{Name: "x"}
	names  = []string{"a", "b"}
)

const (
	A = iota
	B
)

func f() {
	m := map[string]int{"a": 1}
	_ = m
	var v Conn
	_ = v
}
"#;

    let file = match parse_go_file("p.go", input) {
        Ok(file) => file,
        Err(e) => panic!("file should parse, got: {}", e),
    };

    let Decl::Var(vars) = &file.decls[0] else {
        panic!("expected var group");
    };
    assert_eq!(vars.len(), 2);
    assert!(matches!(vars[0].values[0].kind, ExprKind::Unary { .. }));

    let Decl::Const(consts) = &file.decls[1] else {
        panic!("expected const group");
    };
    assert_eq!(consts[1].iota, 1);
    assert!(consts[1].values.is_empty());

    let Decl::Func(f) = &file.decls[2] else {
        panic!("expected function");
    };
    let body = f.body.as_ref().expect("body");
    assert_eq!(body.stmts.len(), 4);
    assert!(matches!(body.stmts[2].kind, StmtKind::Decl(Decl::Var(_))));
}

#[test]
fn test_spans_index_into_source() {
    let input = "package p\n\nfunc Open() {}\n";
    let file = parse_go_file("p.go", input).expect("should parse");
    let Decl::Func(open) = &file.decls[0] else {
        panic!("expected function");
    };
    assert_eq!(&input[open.name.span.start..open.name.span.end], "Open");
    assert_eq!(&input[open.span.start..open.span.end], "func Open() {}");
}

#[test]
fn test_named_variadic_parameters() {
    let input = r#"package p

import "io"

func A(a ...any)

func B(xs ...io.Reader) int

func MultiReader(readers ...Reader) Reader
"#;

    let file = match parse_go_file("p.go", input) {
        Ok(file) => file,
        Err(e) => panic!("file should parse, got: {}", e),
    };
    assert_eq!(file.decls.len(), 3);

    for decl in &file.decls {
        let Decl::Func(func) = decl else {
            panic!("expected function");
        };
        assert!(func.sig.is_variadic(), "{} should be variadic", func.name.name);
        assert_eq!(func.sig.params[0].names.len(), 1);
    }
}

#[test]
fn test_bodyless_declarations_on_consecutive_lines() {
    let input = r#"package p

type M struct {
	OnDone func()
}

func A()

func (m *M) B()
func (m *M) C() error // trailing comment
func D() func() error
func E() {}
"#;

    let file = match parse_go_file("p.go", input) {
        Ok(file) => file,
        Err(e) => panic!("file should parse, got: {}", e),
    };
    assert_eq!(file.decls.len(), 6);

    let results: Vec<(String, usize, bool)> = file
        .decls
        .iter()
        .filter_map(|decl| match decl {
            Decl::Func(func) => Some((
                func.name.name.clone(),
                func.sig.results.len(),
                func.body.is_some(),
            )),
            _ => None,
        })
        .collect();
    assert_eq!(
        results,
        vec![
            ("A".to_string(), 0, false),
            ("B".to_string(), 0, false),
            ("C".to_string(), 1, false),
            ("D".to_string(), 1, false),
            ("E".to_string(), 0, true),
        ]
    );

    let Decl::Func(b) = &file.decls[2] else {
        panic!("expected method");
    };
    assert!(b.recv.is_some());
}

#[test]
fn test_blank_and_underscore_names_are_identifiers() {
    let input = r#"package p

func f() {
	_ = g()
	_x, _ := 1, 2
	n := 1_000
}
"#;

    let file = match parse_go_file("p.go", input) {
        Ok(file) => file,
        Err(e) => panic!("file should parse, got: {}", e),
    };
    let Decl::Func(f) = &file.decls[0] else {
        panic!("expected function");
    };
    let body = f.body.as_ref().expect("body");

    let StmtKind::Assign { lhs, .. } = &body.stmts[0].kind else {
        panic!("expected assignment");
    };
    assert_eq!(lhs[0].as_ident().map(|i| i.name.as_str()), Some("_"));

    let StmtKind::Assign { lhs, .. } = &body.stmts[1].kind else {
        panic!("expected assignment");
    };
    let names: Vec<&str> = lhs
        .iter()
        .filter_map(|e| e.as_ident())
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["_x", "_"]);

    let StmtKind::Assign { rhs, .. } = &body.stmts[2].kind else {
        panic!("expected assignment");
    };
    assert!(matches!(
        &rhs[0].kind,
        ExprKind::BasicLit { value, .. } if value == "1_000"
    ));
}

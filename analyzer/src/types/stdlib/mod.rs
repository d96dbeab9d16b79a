//! Declaration stubs for the standard library surface analyzed programs use
//!
//! Each stub is a body-less Go file parsed by the regular parser and checked
//! like any other package, so the type model has a single code path. Stub
//! files are registered in the source map as `$stub/<import path>/<file>`.

/// One embedded stub package
#[derive(Debug, Clone, Copy)]
pub struct StubPackage {
    pub path: &'static str,
    pub file_name: &'static str,
    pub source: &'static str,
}

impl StubPackage {
    /// Name the stub file is registered under in the source map
    pub fn display_name(&self) -> String {
        format!("$stub/{}/{}", self.path, self.file_name)
    }
}

pub const STUB_PACKAGES: &[StubPackage] = &[
    StubPackage {
        path: "io",
        file_name: "io.go",
        source: include_str!("io.go"),
    },
    StubPackage {
        path: "io/ioutil",
        file_name: "ioutil.go",
        source: include_str!("ioutil.go"),
    },
    StubPackage {
        path: "os",
        file_name: "os.go",
        source: include_str!("os.go"),
    },
    StubPackage {
        path: "time",
        file_name: "time.go",
        source: include_str!("time.go"),
    },
    StubPackage {
        path: "context",
        file_name: "context.go",
        source: include_str!("context.go"),
    },
    StubPackage {
        path: "errors",
        file_name: "errors.go",
        source: include_str!("errors.go"),
    },
    StubPackage {
        path: "fmt",
        file_name: "fmt.go",
        source: include_str!("fmt.go"),
    },
    StubPackage {
        path: "strings",
        file_name: "strings.go",
        source: include_str!("strings.go"),
    },
    StubPackage {
        path: "bytes",
        file_name: "bytes.go",
        source: include_str!("bytes.go"),
    },
    StubPackage {
        path: "bufio",
        file_name: "bufio.go",
        source: include_str!("bufio.go"),
    },
    StubPackage {
        path: "encoding/json",
        file_name: "json.go",
        source: include_str!("json.go"),
    },
    StubPackage {
        path: "database/sql",
        file_name: "sql.go",
        source: include_str!("sql.go"),
    },
    StubPackage {
        path: "net/http",
        file_name: "http.go",
        source: include_str!("http.go"),
    },
    StubPackage {
        path: "sync",
        file_name: "sync.go",
        source: include_str!("sync.go"),
    },
    StubPackage {
        path: "log",
        file_name: "log.go",
        source: include_str!("log.go"),
    },
];

/// Look up a stub by import path
pub fn stub_package(path: &str) -> Option<&'static StubPackage> {
    STUB_PACKAGES.iter().find(|stub| stub.path == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::{parse_go_file, Decl};

    #[test]
    fn test_every_stub_parses() {
        for stub in STUB_PACKAGES {
            let file = parse_go_file(stub.file_name, stub.source)
                .unwrap_or_else(|e| panic!("{}: {}", stub.path, e));
            assert_eq!(
                file.package.name,
                stub.path.rsplit('/').next().unwrap(),
                "package clause of {}",
                stub.path
            );
        }
    }

    #[test]
    fn test_stubs_are_bodyless() {
        for stub in STUB_PACKAGES {
            let file = parse_go_file(stub.file_name, stub.source).unwrap();
            for decl in &file.decls {
                if let Decl::Func(func) = decl {
                    assert!(func.body.is_none(), "{}.{} has a body", stub.path, func.name);
                }
            }
        }
    }

    #[test]
    fn test_stub_imports_are_stubs() {
        for stub in STUB_PACKAGES {
            let file = parse_go_file(stub.file_name, stub.source).unwrap();
            for import in &file.imports {
                assert!(stub_package(&import.path).is_some(), "{} imports {}", stub.path, import.path);
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(stub_package("net/http").map(|s| s.file_name), Some("http.go"));
        assert!(stub_package("example.com/x").is_none());
        assert_eq!(
            stub_package("io/ioutil").unwrap().display_name(),
            "$stub/io/ioutil/ioutil.go"
        );
    }
}

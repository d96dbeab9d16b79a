//! Declaration records
//!
//! Every identifier occurrence in a checked package resolves to exactly one
//! [`Symbol`]; two occurrences denote the same variable iff they resolve to
//! the same [`SymbolId`].

use std::fmt;

use parser::Span;
use serde::{Deserialize, Serialize};
use source_map::FileId;

use super::ids::{SymbolId, TypeId};

/// Where a symbol or field was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclSite {
    pub file: FileId,
    pub span: Span,
}

impl DeclSite {
    pub fn new(file: FileId, span: Span) -> Self {
        Self { file, span }
    }
}

/// Function identity in Go's full-name form
///
/// `pkg/path.Func` for functions, `(pkg/path.T).Method` for value receivers
/// and `(*pkg/path.T).Method` for pointer receivers. Keys are stable across
/// runs, which makes them usable in persisted fact files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncKey(String);

impl FuncKey {
    pub fn function(package: &str, name: &str) -> Self {
        FuncKey(format!("{}.{}", package, name))
    }

    pub fn method(package: &str, recv_type: &str, pointer: bool, name: &str) -> Self {
        let star = if pointer { "*" } else { "" };
        FuncKey(format!("({}{}.{}).{}", star, package, recv_type, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unqualified function or method name
    pub fn name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for FuncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FuncKey {
    fn from(s: &str) -> Self {
        FuncKey(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Var,
    Param,
    Const,
    TypeName,
    Func,
    Method,
    Package,
    Builtin,
    Nil,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub ty: TypeId,
    pub decl: Option<DeclSite>,
    /// Import path of the declaring package; empty for the universe
    pub package: String,
    pub package_level: bool,
    pub func_key: Option<FuncKey>,
    /// Import path a `Package` symbol refers to
    pub imported: Option<String>,
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            kind,
            name: name.into(),
            ty,
            decl: None,
            package: String::new(),
            package_level: false,
            func_key: None,
            imported: None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind, SymbolKind::Var | SymbolKind::Param)
    }

    pub fn is_global_var(&self) -> bool {
        self.kind == SymbolKind::Var && self.package_level
    }

    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(char::is_uppercase)
    }
}

/// Arena of declaration records for a whole program
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId::from_index(self.symbols.len());
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_func_key_formats() {
        assert_eq!(FuncKey::function("net/http", "Get").as_str(), "net/http.Get");
        assert_eq!(
            FuncKey::method("net/http", "Client", true, "Do").as_str(),
            "(*net/http.Client).Do"
        );
        assert_eq!(
            FuncKey::method("a", "T", false, "Close").as_str(),
            "(a.T).Close"
        );
        assert_eq!(FuncKey::function("a/b", "closeBody").name(), "closeBody");
        assert_eq!(FuncKey::method("a", "T", true, "Close").name(), "Close");
    }

    #[test]
    fn test_symbol_table_roundtrip() {
        let mut table = SymbolTable::new();
        let mut global = Symbol::new(SymbolKind::Var, "conn", TypeId::invalid());
        global.package_level = true;
        let id = table.add(global);

        let symbol = table.get(id).unwrap();
        assert!(symbol.is_global_var());
        assert!(!symbol.is_exported());
        assert_eq!(table.len(), 1);
    }
}

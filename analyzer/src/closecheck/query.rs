//! Type queries over one checked package
//!
//! [`PackageView`] is the interface the closecheck passes consume: static
//! types, declaration records, static callees and access paths of
//! expressions. Everything it answers comes from the loader's [`Program`].

use parser::{CallExpr, Expr, ExprKind, Ident, Span, UnaryOp};
use source_map::{FileId, SourcePosition, SourceSpan};

use crate::loader::{Package, Program};
use crate::types::{FuncKey, Selection, Symbol, SymbolId, TypeId, TypeTable};

/// A variable plus the chain of field selections applied to it
///
/// `res.Body` is `{ root: res, fields: ["Body"] }`. Two paths are compatible
/// when one extends the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPath<'a> {
    pub root: SymbolId,
    pub fields: Vec<&'a str>,
}

impl AccessPath<'_> {
    pub fn is_compatible(&self, root: SymbolId, fields: &[String]) -> bool {
        self.root == root
            && self
                .fields
                .iter()
                .zip(fields.iter())
                .all(|(a, b)| *a == b.as_str())
    }

    pub fn is_exactly(&self, root: SymbolId, fields: &[String]) -> bool {
        self.fields.len() == fields.len() && self.is_compatible(root, fields)
    }
}

#[derive(Clone, Copy)]
pub struct PackageView<'p> {
    pub program: &'p Program,
    pub package: &'p Package,
}

impl<'p> PackageView<'p> {
    pub fn new(program: &'p Program, package: &'p Package) -> Self {
        Self { program, package }
    }

    pub fn types(&self) -> &'p TypeTable {
        &self.program.types
    }

    pub fn path(&self) -> &'p str {
        &self.package.path
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&'p Symbol> {
        self.program.symbols.get(id)
    }

    pub fn type_of(&self, expr: &Expr) -> Option<TypeId> {
        self.package.info.type_of(expr)
    }

    pub fn object_of(&self, ident: &Ident) -> Option<SymbolId> {
        self.package.info.object_of(ident)
    }

    /// Declaration record of the function a call statically dispatches to
    pub fn callee(&self, call: &CallExpr) -> Option<(SymbolId, &'p Symbol)> {
        let id = self.package.info.callee(call)?;
        self.symbol(id).map(|symbol| (id, symbol))
    }

    pub fn callee_key(&self, call: &CallExpr) -> Option<&'p FuncKey> {
        self.callee(call).and_then(|(_, symbol)| symbol.func_key.as_ref())
    }

    /// Receiver expression of a method call, `x` in `x.m()`
    pub fn receiver<'e>(&self, call: &'e CallExpr) -> Option<&'e Expr> {
        let fun = call.fun.unparen();
        let ExprKind::Selector { x, .. } = &fun.kind else {
            return None;
        };
        match self.package.info.selections.get(&fun.id) {
            Some(Selection::Method { .. }) | Some(Selection::InterfaceMethod { .. }) => Some(x),
            _ => None,
        }
    }

    /// `x` in `x.<method>()` when the selected name is `method`
    pub fn method_call_receiver<'e>(&self, call: &'e CallExpr, method: &str) -> Option<&'e Expr> {
        let ExprKind::Selector { x, sel } = &call.fun.unparen().kind else {
            return None;
        };
        (sel.name == method).then_some(&**x)
    }

    /// Variable and field chain an expression denotes, looking through
    /// parentheses, `&` and `*`
    pub fn access_path<'e>(&self, expr: &'e Expr) -> Option<AccessPath<'e>> {
        match &expr.kind {
            ExprKind::Ident(ident) => {
                let root = self.object_of(ident)?;
                self.symbol(root)
                    .filter(|symbol| symbol.is_var())
                    .map(|_| AccessPath {
                        root,
                        fields: Vec::new(),
                    })
            }
            ExprKind::Selector { x, sel } => {
                match self.package.info.selections.get(&expr.id) {
                    Some(Selection::Field { .. }) => {
                        let mut path = self.access_path(x)?;
                        path.fields.push(&sel.name);
                        Some(path)
                    }
                    _ => None,
                }
            }
            ExprKind::Paren(x)
            | ExprKind::Star(x)
            | ExprKind::Unary {
                op: UnaryOp::Addr,
                x,
            } => self.access_path(x),
            _ => None,
        }
    }

    pub fn source_span(&self, file: FileId, span: Span) -> SourceSpan {
        self.program.span(file, span).unwrap_or_else(|| {
            SourceSpan::single_position(SourcePosition::new(1, 1, span.start), file)
        })
    }
}

//! Package type checker
//!
//! Resolves every identifier to its declaration record, computes static
//! types of expressions and selector selections, and declares the package's
//! named types, methods and functions. The result is the [`TypeInfo`] side
//! table the closecheck passes query.
//!
//! Checking is tolerant: an unresolvable identifier is typed `Invalid`,
//! logged at `warn` and recorded in [`TypeInfo::errors`]; it never aborts the
//! package.

use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use log::{debug, warn};
use parser::{
    AssignOp, Block, CallExpr, CaseClause, Decl, Expr, ExprKind, Field, FuncDecl, FuncSig, GoFile,
    Ident, IfStmt, InterfaceElem, LitKind, NodeId, Span, Stmt, StmtKind, TypeExpr, TypeExprKind,
    TypeSpec, UnaryOp, ValueSpec,
};
use source_map::FileId;

use super::ids::{SymbolId, TypeId};
use super::symbols::{DeclSite, FuncKey, Symbol, SymbolKind, SymbolTable};
use super::type_table::{
    BasicKind, InterfaceMethod, InterfaceType, Method, Selection, Signature, StructField,
    TypeKind, TypeTable,
};
use super::universe::Universe;

/// Package-level names, in declaration order
pub type PackageScope = IndexMap<String, SymbolId>;

/// Non-fatal type error in an analyzed package
#[derive(Debug, Clone)]
pub struct TypeError {
    pub site: DeclSite,
    pub message: String,
}

/// Side tables produced by checking one package
#[derive(Debug, Default)]
pub struct TypeInfo {
    /// Static type of every checked expression, keyed by `Expr::id`
    pub types: FxHashMap<NodeId, TypeId>,
    /// Identifiers that declare a symbol, keyed by `Ident::id`
    pub defs: FxHashMap<NodeId, SymbolId>,
    /// Identifiers that refer to a symbol, keyed by `Ident::id`
    pub uses: FxHashMap<NodeId, SymbolId>,
    /// Selector expressions, keyed by the selector's `Expr::id`
    pub selections: FxHashMap<NodeId, Selection>,
    pub errors: Vec<TypeError>,
}

impl TypeInfo {
    pub fn type_of(&self, expr: &Expr) -> Option<TypeId> {
        self.types.get(&expr.id).copied()
    }

    /// Declaration an identifier defines or refers to
    pub fn object_of(&self, ident: &Ident) -> Option<SymbolId> {
        self.defs
            .get(&ident.id)
            .or_else(|| self.uses.get(&ident.id))
            .copied()
    }

    /// Function or method symbol a call statically dispatches to
    pub fn callee(&self, call: &CallExpr) -> Option<SymbolId> {
        let fun = call.fun.unparen();
        match &fun.kind {
            ExprKind::Ident(ident) => self.uses.get(&ident.id).copied(),
            ExprKind::Selector { .. } => match self.selections.get(&fun.id)? {
                Selection::Method { func, .. } => Some(*func),
                Selection::Qualified(symbol) => Some(*symbol),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Package scope and type information of a checked package
#[derive(Debug)]
pub struct CheckedPackage {
    pub scope: PackageScope,
    pub info: TypeInfo,
}

/// Check one package
///
/// `deps` maps import paths to the scopes of already checked packages.
pub fn check_package(
    path: &str,
    files: &[(FileId, GoFile)],
    types: &mut TypeTable,
    symbols: &mut SymbolTable,
    universe: &Universe,
    deps: &FxHashMap<&str, &PackageScope>,
) -> CheckedPackage {
    let mut checker = Checker {
        path,
        types,
        symbols,
        universe,
        deps,
        scope: IndexMap::new(),
        file_scopes: Vec::new(),
        file: FileId::new(0),
        file_index: 0,
        locals: Vec::new(),
        results: Vec::new(),
        type_nodes: FxHashSet::default(),
        iota: None,
        info: TypeInfo::default(),
    };
    checker.check_files(files);

    debug!(
        "checked package {} ({} names, {} type errors)",
        path,
        checker.scope.len(),
        checker.info.errors.len()
    );

    CheckedPackage {
        scope: checker.scope,
        info: checker.info,
    }
}

struct Checker<'a> {
    path: &'a str,
    types: &'a mut TypeTable,
    symbols: &'a mut SymbolTable,
    universe: &'a Universe,
    deps: &'a FxHashMap<&'a str, &'a PackageScope>,
    scope: PackageScope,
    /// Imported names per file
    file_scopes: Vec<FxHashMap<String, SymbolId>>,
    file: FileId,
    file_index: usize,
    locals: Vec<FxHashMap<String, SymbolId>>,
    /// Result types of the enclosing function literals and declarations
    results: Vec<Vec<TypeId>>,
    /// Expressions that denote types rather than values
    type_nodes: FxHashSet<NodeId>,
    iota: Option<u64>,
    info: TypeInfo,
}

impl<'a> Checker<'a> {
    fn check_files(&mut self, files: &[(FileId, GoFile)]) {
        for (index, (file_id, file)) in files.iter().enumerate() {
            self.enter_file(index, *file_id);
            self.collect_imports(file);
        }

        // Declare names first so that order inside and across files is free
        for (index, (file_id, file)) in files.iter().enumerate() {
            self.enter_file(index, *file_id);
            self.collect_decls(file);
        }

        for (index, (file_id, file)) in files.iter().enumerate() {
            self.enter_file(index, *file_id);
            self.resolve_type_decls(file);
        }

        for (index, (file_id, file)) in files.iter().enumerate() {
            self.enter_file(index, *file_id);
            self.resolve_funcs(file);
        }

        for (index, (file_id, file)) in files.iter().enumerate() {
            self.enter_file(index, *file_id);
            self.check_package_values(file);
        }

        for (index, (file_id, file)) in files.iter().enumerate() {
            self.enter_file(index, *file_id);
            for decl in &file.decls {
                if let Decl::Func(func) = decl {
                    self.check_func_body(func);
                }
            }
        }
    }

    fn enter_file(&mut self, index: usize, file: FileId) {
        self.file_index = index;
        self.file = file;
        if self.file_scopes.len() <= index {
            self.file_scopes.resize_with(index + 1, FxHashMap::default);
        }
    }

    fn site(&self, span: Span) -> DeclSite {
        DeclSite::new(self.file, span)
    }

    fn error(&mut self, span: Span, message: String) {
        warn!("{}: {} (at offset {})", self.path, message, span.start);
        let site = self.site(span);
        self.info.errors.push(TypeError { site, message });
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn collect_imports(&mut self, file: &GoFile) {
        for import in &file.imports {
            let Some(scope) = self.deps.get(import.path.as_str()).copied() else {
                self.error(import.span, format!("could not import {}", import.path));
                continue;
            };

            let local = import.local_name();
            if local == "_" {
                continue;
            }
            if local == "." {
                let names: Vec<(String, SymbolId)> = scope
                    .iter()
                    .filter(|(name, _)| name.chars().next().is_some_and(char::is_uppercase))
                    .map(|(name, id)| (name.clone(), *id))
                    .collect();
                self.file_scopes[self.file_index].extend(names);
                continue;
            }

            let mut symbol = Symbol::new(SymbolKind::Package, local, self.types.invalid());
            symbol.decl = Some(self.site(import.span));
            symbol.package = self.path.to_string();
            symbol.imported = Some(import.path.clone());
            let id = self.symbols.add(symbol);
            if let Some(alias) = &import.alias {
                self.info.defs.insert(alias.id, id);
            }
            self.file_scopes[self.file_index].insert(local.to_string(), id);
        }
    }

    fn collect_decls(&mut self, file: &GoFile) {
        for decl in &file.decls {
            match decl {
                Decl::Type(specs) => {
                    for spec in specs {
                        let id = self.declare_type_name(spec);
                        self.declare_package_name(&spec.name, id);
                    }
                }
                Decl::Var(specs) => {
                    for spec in specs {
                        for name in &spec.names {
                            let id = self.new_symbol(SymbolKind::Var, name, true);
                            self.declare_package_name(name, id);
                        }
                    }
                }
                Decl::Const(specs) => {
                    for spec in specs {
                        for name in &spec.names {
                            let id = self.new_symbol(SymbolKind::Const, name, true);
                            self.declare_package_name(name, id);
                        }
                    }
                }
                Decl::Func(func) if func.recv.is_none() => {
                    let id = self.new_symbol(SymbolKind::Func, &func.name, true);
                    if let Some(symbol) = self.symbols.get_mut(id) {
                        symbol.func_key = Some(FuncKey::function(self.path, &func.name.name));
                    }
                    if func.name.name != "init" {
                        self.declare_package_name(&func.name, id);
                    }
                }
                Decl::Func(_) => {}
            }
        }
    }

    fn new_symbol(&mut self, kind: SymbolKind, name: &Ident, package_level: bool) -> SymbolId {
        let mut symbol = Symbol::new(kind, name.name.clone(), self.types.invalid());
        symbol.decl = Some(self.site(name.span));
        symbol.package = self.path.to_string();
        symbol.package_level = package_level;
        let id = self.symbols.add(symbol);
        self.info.defs.insert(name.id, id);
        id
    }

    fn declare_package_name(&mut self, name: &Ident, id: SymbolId) {
        if name.is_blank() {
            return;
        }
        if self.scope.contains_key(&name.name) {
            self.error(name.span, format!("{} redeclared in this block", name.name));
            return;
        }
        self.scope.insert(name.name.clone(), id);
    }

    /// Create the symbol (and, for defined types, the named type) of a type spec
    fn declare_type_name(&mut self, spec: &TypeSpec) -> SymbolId {
        let package_level = self.locals.is_empty();
        let id = self.new_symbol(SymbolKind::TypeName, &spec.name, package_level);
        if !spec.alias {
            let named = self.types.new_named(self.path, &spec.name.name);
            if let Some(symbol) = self.symbols.get_mut(id) {
                symbol.ty = named;
            }
        }
        id
    }

    fn resolve_type_decls(&mut self, file: &GoFile) {
        for decl in &file.decls {
            if let Decl::Type(specs) = decl {
                for spec in specs {
                    self.resolve_type_spec(spec);
                }
            }
        }
    }

    fn resolve_type_spec(&mut self, spec: &TypeSpec) {
        let Some(id) = self.info.defs.get(&spec.name.id).copied() else {
            return;
        };
        let resolved = self.resolve_type(&spec.ty);
        if spec.alias {
            if let Some(symbol) = self.symbols.get_mut(id) {
                symbol.ty = resolved;
            }
        } else if let Some(named) = self.symbols.get(id).map(|s| s.ty) {
            self.types.set_underlying(named, resolved);
        }
    }

    fn resolve_funcs(&mut self, file: &GoFile) {
        for decl in &file.decls {
            let Decl::Func(func) = decl else {
                continue;
            };
            let sig = self.resolve_signature(&func.sig);

            match &func.recv {
                None => {
                    if let Some(symbol) = self
                        .info
                        .defs
                        .get(&func.name.id)
                        .copied()
                        .and_then(|id| self.symbols.get_mut(id))
                    {
                        symbol.ty = sig;
                    }
                }
                Some(recv) => self.declare_method(func, recv, sig),
            }
        }
    }

    fn declare_method(&mut self, func: &FuncDecl, recv: &Field, sig: TypeId) {
        let (base, pointer) = match &recv.ty.kind {
            TypeExprKind::Pointer(inner) => (inner.as_ref(), true),
            _ => (&recv.ty, false),
        };
        let TypeExprKind::Name(type_name) = &base.kind else {
            self.error(recv.span, "invalid receiver type".to_string());
            return;
        };

        let named = match self.scope.get(&type_name.name).copied() {
            Some(type_id) => {
                self.info.uses.insert(type_name.id, type_id);
                self.symbols.get(type_id).map(|s| s.ty)
            }
            None => None,
        };
        let Some(named) = named.filter(|ty| self.types.named(*ty).is_some()) else {
            self.error(
                type_name.span,
                format!("undefined receiver type {}", type_name.name),
            );
            return;
        };

        let id = self.new_symbol(SymbolKind::Method, &func.name, true);
        if let Some(symbol) = self.symbols.get_mut(id) {
            symbol.ty = sig;
            symbol.func_key = Some(FuncKey::method(
                self.path,
                &type_name.name,
                pointer,
                &func.name.name,
            ));
        }
        self.types.add_method(
            named,
            Method {
                name: func.name.name.clone(),
                sig,
                pointer_receiver: pointer,
                func: id,
            },
        );
    }

    fn check_package_values(&mut self, file: &GoFile) {
        for decl in &file.decls {
            match decl {
                Decl::Var(specs) => {
                    for spec in specs {
                        self.check_value_spec(spec, SymbolKind::Var, None);
                    }
                }
                Decl::Const(specs) => self.check_const_group(specs),
                _ => {}
            }
        }
    }

    fn check_const_group(&mut self, specs: &[ValueSpec]) {
        let mut previous: Option<&ValueSpec> = None;
        for spec in specs {
            self.iota = Some(spec.iota as u64);
            // An empty spec repeats the previous expression list
            let inherited = if spec.values.is_empty() && spec.ty.is_none() {
                previous
            } else {
                previous = Some(spec);
                None
            };
            self.check_value_spec(spec, SymbolKind::Const, inherited);
        }
        self.iota = None;
    }

    /// Type a `var` or `const` spec; declares local names when inside a body
    fn check_value_spec(&mut self, spec: &ValueSpec, kind: SymbolKind, inherited: Option<&ValueSpec>) {
        let source = inherited.unwrap_or(spec);
        let declared = source.ty.as_ref().map(|ty| self.resolve_type(ty));
        let hints = vec![declared; spec.names.len()];
        let values = self.rhs_types(spec.names.len(), &source.values, &hints);

        for (i, name) in spec.names.iter().enumerate() {
            let ty = declared
                .or_else(|| values.get(i).copied())
                .unwrap_or(self.types.invalid());
            if self.locals.is_empty() {
                let ty = if kind == SymbolKind::Var {
                    self.types.default_type(ty)
                } else {
                    ty
                };
                if let Some(symbol) = self
                    .info
                    .defs
                    .get(&name.id)
                    .copied()
                    .and_then(|id| self.symbols.get_mut(id))
                {
                    symbol.ty = ty;
                }
            } else {
                self.declare_local(name, ty, kind);
            }
        }
    }

    // =========================================================================
    // Bodies
    // =========================================================================

    fn check_func_body(&mut self, func: &FuncDecl) {
        let Some(body) = &func.body else {
            return;
        };

        self.locals.push(FxHashMap::default());
        if let Some(recv) = &func.recv {
            let ty = self.resolve_type(&recv.ty);
            for name in &recv.names {
                self.declare_local(name, ty, SymbolKind::Param);
            }
        }
        let results = self.declare_params(&func.sig);
        self.results.push(results);

        self.block(body);

        self.results.pop();
        self.locals.pop();
    }

    /// Declare parameters and named results in the current scope
    fn declare_params(&mut self, sig: &FuncSig) -> Vec<TypeId> {
        for field in &sig.params {
            let ty = self.resolve_type(&field.ty);
            for name in &field.names {
                self.declare_local(name, ty, SymbolKind::Param);
            }
        }

        let mut results = Vec::new();
        for field in &sig.results {
            let ty = self.resolve_type(&field.ty);
            for name in &field.names {
                self.declare_local(name, ty, SymbolKind::Var);
            }
            results.extend(std::iter::repeat_n(ty, field.names.len().max(1)));
        }
        results
    }

    fn declare_local(&mut self, name: &Ident, ty: TypeId, kind: SymbolKind) -> Option<SymbolId> {
        if name.is_blank() {
            return None;
        }
        let ty = if kind == SymbolKind::Const {
            ty
        } else {
            self.types.default_type(ty)
        };
        let id = self.new_symbol(kind, name, false);
        if let Some(symbol) = self.symbols.get_mut(id) {
            symbol.ty = ty;
        }
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.name.clone(), id);
        }
        Some(id)
    }

    fn lookup(&self, name: &str) -> Option<SymbolId> {
        for scope in self.locals.iter().rev() {
            if let Some(id) = scope.get(name) {
                return Some(*id);
            }
        }
        self.scope
            .get(name)
            .or_else(|| self.file_scopes.get(self.file_index)?.get(name))
            .copied()
            .or_else(|| self.universe.lookup(name))
    }

    fn symbol_kind(&self, id: SymbolId) -> Option<SymbolKind> {
        self.symbols.get(id).map(|s| s.kind)
    }

    fn symbol_type(&self, id: SymbolId) -> TypeId {
        self.symbols
            .get(id)
            .map(|s| s.ty)
            .unwrap_or(self.types.invalid())
    }

    fn block(&mut self, block: &Block) {
        self.locals.push(FxHashMap::default());
        self.stmts(&block.stmts);
        self.locals.pop();
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Defer(expr) | StmtKind::Go(expr) => {
                self.expr(expr, None);
            }
            StmtKind::Assign { lhs, op, rhs } => self.assign(lhs, *op, rhs),
            StmtKind::IncDec { expr, .. } => {
                self.expr(expr, None);
            }
            StmtKind::Send { chan, value } => {
                let chan_ty = self.expr(chan, None);
                let elem = match self.types.underlying_kind(chan_ty) {
                    TypeKind::Chan { elem, .. } => Some(*elem),
                    _ => None,
                };
                self.expr(value, elem);
            }
            StmtKind::Decl(decl) => self.local_decl(decl),
            StmtKind::Return(results) => {
                let expected = self.results.last().cloned().unwrap_or_default();
                if results.len() == expected.len() {
                    for (expr, ty) in results.iter().zip(expected) {
                        self.expr(expr, Some(ty));
                    }
                } else {
                    for expr in results {
                        self.expr(expr, None);
                    }
                }
            }
            StmtKind::If(if_stmt) => self.if_stmt(if_stmt),
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.locals.push(FxHashMap::default());
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond, None);
                }
                if let Some(post) = post {
                    self.stmt(post);
                }
                self.block(body);
                self.locals.pop();
            }
            StmtKind::Range {
                key,
                value,
                define,
                expr,
                body,
            } => self.range_stmt(key.as_ref(), value.as_ref(), *define, expr, body),
            StmtKind::Switch { init, tag, clauses } => {
                self.locals.push(FxHashMap::default());
                if let Some(init) = init {
                    self.stmt(init);
                }
                let tag_ty = tag.as_ref().map(|tag| self.expr(tag, None));
                for clause in clauses {
                    for expr in &clause.exprs {
                        self.expr(expr, tag_ty);
                    }
                    self.locals.push(FxHashMap::default());
                    self.stmts(&clause.body);
                    self.locals.pop();
                }
                self.locals.pop();
            }
            StmtKind::TypeSwitch {
                init,
                binding,
                expr,
                clauses,
            } => self.type_switch(init.as_deref(), binding.as_ref(), expr, clauses),
            StmtKind::Block(block) => self.block(block),
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt),
            StmtKind::Branch { .. } | StmtKind::Empty => {}
        }
    }

    fn local_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Var(specs) => {
                for spec in specs {
                    self.check_value_spec(spec, SymbolKind::Var, None);
                }
            }
            Decl::Const(specs) => self.check_const_group(specs),
            Decl::Type(specs) => {
                for spec in specs {
                    let id = self.declare_type_name(spec);
                    if let Some(scope) = self.locals.last_mut() {
                        scope.insert(spec.name.name.clone(), id);
                    }
                    self.resolve_type_spec(spec);
                }
            }
            Decl::Func(func) => {
                self.error(func.span, "function declaration inside a body".to_string());
            }
        }
    }

    fn assign(&mut self, lhs: &[Expr], op: AssignOp, rhs: &[Expr]) {
        match op {
            AssignOp::Define => {
                let types = self.rhs_types(lhs.len(), rhs, &[]);
                let current = self.locals.len();
                for (i, target) in lhs.iter().enumerate() {
                    let ty = types.get(i).copied().unwrap_or(self.types.invalid());
                    let Some(ident) = target.as_ident() else {
                        self.error(target.span, "non-name on left side of :=".to_string());
                        continue;
                    };
                    if ident.is_blank() {
                        continue;
                    }
                    // Redeclaration in the same scope assigns to the existing variable
                    let existing = self
                        .locals
                        .get(current.saturating_sub(1))
                        .and_then(|scope| scope.get(&ident.name))
                        .copied();
                    match existing {
                        Some(id) => {
                            self.info.uses.insert(ident.id, id);
                            let var_ty = self.symbol_type(id);
                            self.record(target, var_ty);
                        }
                        None => {
                            self.declare_local(ident, ty, SymbolKind::Var);
                            let var_ty = self.types.default_type(ty);
                            self.record(target, var_ty);
                        }
                    }
                }
            }
            AssignOp::Assign | AssignOp::Op(_) => {
                let hints: Vec<Option<TypeId>> = lhs
                    .iter()
                    .map(|target| match target.as_ident() {
                        Some(ident) if ident.is_blank() => None,
                        _ => Some(self.expr(target, None)),
                    })
                    .collect();
                self.rhs_types(lhs.len(), rhs, &hints);
            }
        }
    }

    /// Types bound to `count` targets by `rhs`, unpacking tuples and comma-ok forms
    fn rhs_types(&mut self, count: usize, rhs: &[Expr], hints: &[Option<TypeId>]) -> Vec<TypeId> {
        if rhs.len() == 1 && count > 1 {
            let ty = self.expr(&rhs[0], None);
            if let TypeKind::Tuple(elems) = self.types.get(ty) {
                return elems.clone();
            }
            if count == 2 && self.is_comma_ok(&rhs[0]) {
                return vec![ty, self.types.basic(BasicKind::Bool)];
            }
            return vec![self.types.invalid(); count];
        }

        rhs.iter()
            .enumerate()
            .map(|(i, expr)| {
                let hint = hints.get(i).copied().flatten();
                self.expr(expr, hint)
            })
            .collect()
    }

    fn is_comma_ok(&self, expr: &Expr) -> bool {
        match &expr.unparen().kind {
            ExprKind::Index { x, .. } => self
                .info
                .type_of(x)
                .is_some_and(|ty| matches!(self.types.underlying_kind(ty), TypeKind::Map { .. })),
            ExprKind::TypeAssert { ty: Some(_), .. } => true,
            ExprKind::Unary {
                op: UnaryOp::Recv, ..
            } => true,
            _ => false,
        }
    }

    fn if_stmt(&mut self, if_stmt: &IfStmt) {
        self.locals.push(FxHashMap::default());
        if let Some(init) = &if_stmt.init {
            self.stmt(init);
        }
        self.expr(&if_stmt.cond, None);
        self.block(&if_stmt.body);
        if let Some(els) = &if_stmt.els {
            self.stmt(els);
        }
        self.locals.pop();
    }

    fn range_stmt(
        &mut self,
        key: Option<&Expr>,
        value: Option<&Expr>,
        define: bool,
        expr: &Expr,
        body: &Block,
    ) {
        let ty = self.expr(expr, None);
        let int = self.types.basic(BasicKind::Int);
        let invalid = self.types.invalid();
        let (key_ty, value_ty) = match self.types.underlying_kind(ty) {
            TypeKind::Slice(elem) | TypeKind::Array { elem, .. } => (int, *elem),
            TypeKind::Basic(BasicKind::String | BasicKind::UntypedString) => {
                (int, self.types.basic(BasicKind::Int32))
            }
            TypeKind::Basic(_) => (self.types.default_type(ty), invalid),
            TypeKind::Map { key, value } => (*key, *value),
            TypeKind::Chan { elem, .. } => (*elem, invalid),
            TypeKind::Pointer(elem) => match self.types.underlying_kind(*elem) {
                TypeKind::Array { elem, .. } => (int, *elem),
                _ => (invalid, invalid),
            },
            _ => (invalid, invalid),
        };

        self.locals.push(FxHashMap::default());
        for (target, ty) in [(key, key_ty), (value, value_ty)] {
            let Some(target) = target else {
                continue;
            };
            if define {
                if let Some(ident) = target.as_ident() {
                    self.declare_local(ident, ty, SymbolKind::Var);
                    self.record(target, ty);
                }
            } else if !target.as_ident().is_some_and(Ident::is_blank) {
                self.expr(target, None);
            }
        }
        self.block(body);
        self.locals.pop();
    }

    fn type_switch(
        &mut self,
        init: Option<&Stmt>,
        binding: Option<&Ident>,
        expr: &Expr,
        clauses: &[CaseClause],
    ) {
        self.locals.push(FxHashMap::default());
        if let Some(init) = init {
            self.stmt(init);
        }

        let subject = match &expr.unparen().kind {
            ExprKind::TypeAssert { x, ty: None } => self.expr(x, None),
            _ => self.expr(expr, None),
        };
        self.record(expr, subject);

        for clause in clauses {
            let case_types: Vec<TypeId> = clause
                .exprs
                .iter()
                .map(|case| self.expr(case, None))
                .collect();

            self.locals.push(FxHashMap::default());
            if let Some(binding) = binding {
                let ty = match case_types.as_slice() {
                    [single] if !self.types.is_untyped_nil(*single) => *single,
                    _ => subject,
                };
                // Each clause binds its own variable; the ident maps to the first
                let previous = self.info.defs.get(&binding.id).copied();
                self.declare_local(binding, ty, SymbolKind::Var);
                if let Some(previous) = previous {
                    self.info.defs.insert(binding.id, previous);
                }
            }
            self.stmts(&clause.body);
            self.locals.pop();
        }
        self.locals.pop();
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn record(&mut self, expr: &Expr, ty: TypeId) -> TypeId {
        self.info.types.insert(expr.id, ty);
        ty
    }

    fn record_type_expr(&mut self, expr: &Expr, ty: TypeId) -> TypeId {
        self.type_nodes.insert(expr.id);
        self.record(expr, ty)
    }

    fn is_type_expr(&self, expr: &Expr) -> bool {
        self.type_nodes.contains(&expr.id)
    }

    fn expr(&mut self, expr: &Expr, hint: Option<TypeId>) -> TypeId {
        match &expr.kind {
            ExprKind::Ident(ident) => self.ident_expr(expr, ident),
            ExprKind::BasicLit { kind, .. } => {
                let basic = match kind {
                    LitKind::Int => BasicKind::UntypedInt,
                    LitKind::Float => BasicKind::UntypedFloat,
                    LitKind::String => BasicKind::UntypedString,
                    LitKind::Char => BasicKind::UntypedRune,
                };
                let ty = self.types.basic(basic);
                self.record(expr, ty)
            }
            ExprKind::CompositeLit { ty, elts } => {
                let ty = match ty {
                    Some(ty_expr) => {
                        self.expr(ty_expr, None);
                        self.info.type_of(ty_expr).unwrap_or(self.types.invalid())
                    }
                    None => hint.unwrap_or(self.types.invalid()),
                };
                let ty = self.composite_lit(ty, elts);
                self.record(expr, ty)
            }
            ExprKind::KeyValue { key, value } => {
                self.expr(key, None);
                let ty = self.expr(value, hint);
                self.record(expr, ty)
            }
            ExprKind::FuncLit { sig, body } => {
                let ty = self.resolve_signature(sig);
                self.locals.push(FxHashMap::default());
                let results = self.declare_params(sig);
                self.results.push(results);
                self.block(body);
                self.results.pop();
                self.locals.pop();
                self.record(expr, ty)
            }
            ExprKind::Paren(inner) => {
                let ty = self.expr(inner, hint);
                if self.is_type_expr(inner) {
                    self.record_type_expr(expr, ty)
                } else {
                    self.record(expr, ty)
                }
            }
            ExprKind::Selector { x, sel } => self.selector(expr, x, sel),
            ExprKind::Index { x, index } => {
                let x_ty = self.expr(x, None);
                let key_hint = match self.types.underlying_kind(x_ty) {
                    TypeKind::Map { key, .. } => Some(*key),
                    _ => None,
                };
                self.expr(index, key_hint);
                let ty = self.index_result(x_ty);
                self.record(expr, ty)
            }
            ExprKind::Slice { x, low, high, max } => {
                let x_ty = self.expr(x, None);
                for bound in [low, high, max].into_iter().flatten() {
                    self.expr(bound, None);
                }
                let ty = match self.types.underlying_kind(x_ty).clone() {
                    TypeKind::Basic(BasicKind::String | BasicKind::UntypedString) => {
                        self.types.basic(BasicKind::String)
                    }
                    TypeKind::Array { elem, .. } => self.types.slice_of(elem),
                    TypeKind::Pointer(elem) => match self.types.underlying_kind(elem).clone() {
                        TypeKind::Array { elem, .. } => self.types.slice_of(elem),
                        _ => self.types.invalid(),
                    },
                    TypeKind::Slice(_) => x_ty,
                    _ => self.types.invalid(),
                };
                self.record(expr, ty)
            }
            ExprKind::TypeAssert { x, ty } => {
                self.expr(x, None);
                let ty = match ty {
                    Some(ty) => self.resolve_type(ty),
                    None => self.types.invalid(),
                };
                self.record(expr, ty)
            }
            ExprKind::Call(call) => {
                let ty = self.call(call);
                self.record(expr, ty)
            }
            ExprKind::Star(inner) => {
                let inner_ty = self.expr(inner, None);
                if self.is_type_expr(inner) {
                    let ptr = self.types.pointer_to(inner_ty);
                    self.record_type_expr(expr, ptr)
                } else {
                    let ty = self
                        .types
                        .pointer_elem(inner_ty)
                        .unwrap_or(self.types.invalid());
                    self.record(expr, ty)
                }
            }
            ExprKind::Unary { op, x } => {
                let elem_hint = match (op, hint) {
                    (UnaryOp::Addr, Some(hint)) => self.types.pointer_elem(hint),
                    (UnaryOp::Addr, None) => None,
                    _ => hint,
                };
                let x_ty = self.expr(x, elem_hint);
                let ty = match op {
                    UnaryOp::Addr => self.types.pointer_to(x_ty),
                    UnaryOp::Recv => match self.types.underlying_kind(x_ty) {
                        TypeKind::Chan { elem, .. } => *elem,
                        _ => self.types.invalid(),
                    },
                    _ => x_ty,
                };
                self.record(expr, ty)
            }
            ExprKind::Binary { op, left, right } => {
                let left_ty = self.expr(left, None);
                let right_ty = self.expr(right, None);
                let ty = if op.is_comparison() {
                    self.types.basic(BasicKind::UntypedBool)
                } else if op.is_shift() || op.is_logical() {
                    left_ty
                } else if matches!(self.types.get(left_ty), TypeKind::Basic(k) if k.is_untyped()) {
                    right_ty
                } else {
                    left_ty
                };
                self.record(expr, ty)
            }
            ExprKind::Type(ty) => {
                let ty = self.resolve_type(ty);
                self.record_type_expr(expr, ty)
            }
        }
    }

    fn ident_expr(&mut self, expr: &Expr, ident: &Ident) -> TypeId {
        if ident.is_blank() {
            return self.record(expr, self.types.invalid());
        }
        let Some(id) = self.lookup(&ident.name) else {
            self.error(ident.span, format!("undefined: {}", ident.name));
            return self.record(expr, self.types.invalid());
        };

        self.info.uses.insert(ident.id, id);
        let ty = self.symbol_type(id);
        if ident.name == "iota" && self.iota.is_none() && self.universe.lookup("iota") == Some(id) {
            self.error(ident.span, "cannot use iota outside constant declaration".to_string());
        }
        match self.symbol_kind(id) {
            Some(SymbolKind::TypeName) => self.record_type_expr(expr, ty),
            _ => self.record(expr, ty),
        }
    }

    fn selector(&mut self, expr: &Expr, x: &Expr, sel: &Ident) -> TypeId {
        // Qualified identifier `pkg.Name`
        if let ExprKind::Ident(pkg) = &x.kind {
            if let Some(pkg_id) = self.lookup(&pkg.name) {
                if self.symbol_kind(pkg_id) == Some(SymbolKind::Package) {
                    self.info.uses.insert(pkg.id, pkg_id);
                    return self.qualified(expr, pkg_id, sel);
                }
            }
        }

        let x_ty = self.expr(x, None);
        if self.types.is_invalid(x_ty) {
            return self.record(expr, x_ty);
        }

        match self.types.lookup_field_or_method(x_ty, &sel.name) {
            Some(selection) => {
                if let Selection::Method { func, .. } = &selection {
                    self.info.uses.insert(sel.id, *func);
                }
                let ty = selection.ty().unwrap_or(self.types.invalid());
                self.info.selections.insert(expr.id, selection);
                self.record(expr, ty)
            }
            None => {
                let message = format!(
                    "{} has no field or method {}",
                    self.types.type_string(x_ty),
                    sel.name
                );
                self.error(sel.span, message);
                self.record(expr, self.types.invalid())
            }
        }
    }

    fn qualified(&mut self, expr: &Expr, pkg_id: SymbolId, sel: &Ident) -> TypeId {
        let target = self
            .symbols
            .get(pkg_id)
            .and_then(|s| s.imported.clone())
            .and_then(|path| self.deps.get(path.as_str()).copied())
            .and_then(|scope| scope.get(&sel.name).copied());

        let Some(id) = target else {
            self.error(sel.span, format!("undefined: {}", sel.name));
            return self.record(expr, self.types.invalid());
        };

        self.info.uses.insert(sel.id, id);
        self.info.selections.insert(expr.id, Selection::Qualified(id));
        let ty = self.symbol_type(id);
        if self.symbol_kind(id) == Some(SymbolKind::TypeName) {
            self.record_type_expr(expr, ty)
        } else {
            self.record(expr, ty)
        }
    }

    fn index_result(&mut self, x_ty: TypeId) -> TypeId {
        match self.types.underlying_kind(x_ty).clone() {
            TypeKind::Slice(elem) | TypeKind::Array { elem, .. } => elem,
            TypeKind::Map { value, .. } => value,
            TypeKind::Basic(BasicKind::String | BasicKind::UntypedString) => {
                self.types.basic(BasicKind::Uint8)
            }
            TypeKind::Pointer(elem) => match self.types.underlying_kind(elem) {
                TypeKind::Array { elem, .. } => *elem,
                _ => self.types.invalid(),
            },
            _ => self.types.invalid(),
        }
    }

    fn composite_lit(&mut self, ty: TypeId, elts: &[Expr]) -> TypeId {
        // `[]*T{{...}}` elides `&T`
        let (lit_ty, result) = match self.types.pointer_elem(ty) {
            Some(elem) => (elem, ty),
            None => (ty, ty),
        };

        match self.types.underlying_kind(lit_ty).clone() {
            TypeKind::Struct(fields) => {
                for (i, elt) in elts.iter().enumerate() {
                    match &elt.kind {
                        ExprKind::KeyValue { key, value } => {
                            let field = key
                                .as_ident()
                                .and_then(|name| fields.iter().find(|f| f.name == name.name));
                            let hint = field.map(|f| f.ty);
                            if field.is_none() {
                                self.error(key.span, "unknown field in struct literal".to_string());
                            }
                            let value_ty = self.expr(value, hint);
                            self.record(elt, value_ty);
                        }
                        _ => {
                            let hint = fields.get(i).map(|f| f.ty);
                            self.expr(elt, hint);
                        }
                    }
                }
            }
            TypeKind::Slice(elem) | TypeKind::Array { elem, .. } => {
                for elt in elts {
                    self.element(elt, None, Some(elem));
                }
            }
            TypeKind::Map { key, value } => {
                for elt in elts {
                    self.element(elt, Some(key), Some(value));
                }
            }
            _ => {
                for elt in elts {
                    self.element(elt, None, None);
                }
            }
        }

        result
    }

    fn element(&mut self, elt: &Expr, key_hint: Option<TypeId>, value_hint: Option<TypeId>) {
        match &elt.kind {
            ExprKind::KeyValue { key, value } => {
                self.expr(key, key_hint);
                let ty = self.expr(value, value_hint);
                self.record(elt, ty);
            }
            _ => {
                self.expr(elt, value_hint);
            }
        }
    }

    fn call(&mut self, call: &CallExpr) -> TypeId {
        let fun = call.fun.unparen();
        if let ExprKind::Ident(ident) = &fun.kind {
            if let Some(id) = self.lookup(&ident.name) {
                if self.symbol_kind(id) == Some(SymbolKind::Builtin) {
                    self.info.uses.insert(ident.id, id);
                    return self.builtin(&ident.name, call);
                }
            }
        }

        let fun_ty = self.expr(&call.fun, None);

        if self.is_type_expr(&call.fun) {
            for arg in &call.args {
                self.expr(arg, Some(fun_ty));
            }
            return fun_ty;
        }

        let Some(sig) = self.types.signature(fun_ty).cloned() else {
            for arg in &call.args {
                self.expr(arg, None);
            }
            return self.types.invalid();
        };

        for (i, arg) in call.args.iter().enumerate() {
            let hint = if sig.variadic && i + 1 >= sig.params.len() && !call.ellipsis {
                sig.params
                    .last()
                    .and_then(|last| match self.types.get(*last) {
                        TypeKind::Slice(elem) => Some(*elem),
                        _ => None,
                    })
            } else {
                sig.params.get(i).copied()
            };
            self.expr(arg, hint);
        }

        self.types.call_result(fun_ty)
    }

    fn builtin(&mut self, name: &str, call: &CallExpr) -> TypeId {
        let arg_types: Vec<TypeId> = call.args.iter().map(|arg| self.expr(arg, None)).collect();
        let first = arg_types.first().copied().unwrap_or(self.types.invalid());

        match name {
            "len" | "cap" | "copy" => self.types.basic(BasicKind::Int),
            "new" => self.types.pointer_to(first),
            "make" | "append" => first,
            "recover" => self.universe.any,
            _ => self.types.empty_tuple(),
        }
    }

    // =========================================================================
    // Type expressions
    // =========================================================================

    fn resolve_type(&mut self, ty: &TypeExpr) -> TypeId {
        match &ty.kind {
            TypeExprKind::Name(ident) => match self.lookup(&ident.name) {
                Some(id) if self.symbol_kind(id) == Some(SymbolKind::TypeName) => {
                    self.info.uses.insert(ident.id, id);
                    self.symbol_type(id)
                }
                Some(_) => {
                    self.error(ident.span, format!("{} is not a type", ident.name));
                    self.types.invalid()
                }
                None => {
                    self.error(ident.span, format!("undefined: {}", ident.name));
                    self.types.invalid()
                }
            },
            TypeExprKind::Qualified { package, name } => {
                let target = self
                    .lookup(&package.name)
                    .filter(|id| self.symbol_kind(*id) == Some(SymbolKind::Package))
                    .and_then(|pkg_id| {
                        self.info.uses.insert(package.id, pkg_id);
                        self.symbols.get(pkg_id).and_then(|s| s.imported.clone())
                    })
                    .and_then(|path| self.deps.get(path.as_str()).copied())
                    .and_then(|scope| scope.get(&name.name).copied());
                match target {
                    Some(id) if self.symbol_kind(id) == Some(SymbolKind::TypeName) => {
                        self.info.uses.insert(name.id, id);
                        self.symbol_type(id)
                    }
                    _ => {
                        self.error(
                            name.span,
                            format!("undefined: {}.{}", package.name, name.name),
                        );
                        self.types.invalid()
                    }
                }
            }
            TypeExprKind::Pointer(elem) => {
                let elem = self.resolve_type(elem);
                self.types.pointer_to(elem)
            }
            TypeExprKind::Slice(elem) | TypeExprKind::Ellipsis(elem) => {
                let elem = self.resolve_type(elem);
                self.types.slice_of(elem)
            }
            TypeExprKind::Array { len, elem } => {
                let len = len.as_ref().and_then(|len| {
                    self.expr(len, None);
                    match &len.kind {
                        ExprKind::BasicLit {
                            kind: LitKind::Int,
                            value,
                        } => value.parse::<u64>().ok(),
                        _ => None,
                    }
                });
                let elem = self.resolve_type(elem);
                self.types.alloc(TypeKind::Array { len, elem })
            }
            TypeExprKind::Map { key, value } => {
                let key = self.resolve_type(key);
                let value = self.resolve_type(value);
                self.types.alloc(TypeKind::Map { key, value })
            }
            TypeExprKind::Chan { dir, elem } => {
                let elem = self.resolve_type(elem);
                self.types.alloc(TypeKind::Chan { dir: *dir, elem })
            }
            TypeExprKind::Func(sig) => self.resolve_signature(sig),
            TypeExprKind::Struct(fields) => {
                let fields = self.resolve_fields(fields);
                self.types.alloc(TypeKind::Struct(fields))
            }
            TypeExprKind::Interface(elems) => {
                let mut iface = InterfaceType::default();
                for elem in elems {
                    match elem {
                        InterfaceElem::Method { name, sig } => {
                            let sig = self.resolve_signature(sig);
                            iface.methods.push(InterfaceMethod {
                                name: name.name.clone(),
                                sig,
                            });
                        }
                        InterfaceElem::Embedded(ty) => {
                            let embedded = self.resolve_type(ty);
                            iface.embedded.push(embedded);
                        }
                    }
                }
                self.types.alloc(TypeKind::Interface(iface))
            }
        }
    }

    fn resolve_fields(&mut self, fields: &[Field]) -> Vec<StructField> {
        let mut out = Vec::new();
        for field in fields {
            let ty = self.resolve_type(&field.ty);
            if field.names.is_empty() {
                let name = embedded_name(&field.ty).to_string();
                let exported = name.chars().next().is_some_and(char::is_uppercase);
                out.push(StructField {
                    name,
                    ty,
                    embedded: true,
                    exported,
                    decl: Some(self.site(field.ty.span)),
                });
                continue;
            }
            for name in &field.names {
                out.push(StructField {
                    name: name.name.clone(),
                    ty,
                    embedded: false,
                    exported: name.is_exported(),
                    decl: Some(self.site(name.span)),
                });
            }
        }
        out
    }

    fn resolve_signature(&mut self, sig: &FuncSig) -> TypeId {
        let mut resolved = Signature {
            variadic: sig.is_variadic(),
            ..Signature::default()
        };
        for field in &sig.params {
            let ty = self.resolve_type(&field.ty);
            resolved
                .params
                .extend(std::iter::repeat_n(ty, field.names.len().max(1)));
        }
        for field in &sig.results {
            let ty = self.resolve_type(&field.ty);
            resolved
                .results
                .extend(std::iter::repeat_n(ty, field.names.len().max(1)));
        }
        self.types.alloc(TypeKind::Signature(resolved))
    }
}

/// Field name of an embedded field: the type name without pointer or package
fn embedded_name(ty: &TypeExpr) -> &str {
    match &ty.kind {
        TypeExprKind::Name(ident) => &ident.name,
        TypeExprKind::Qualified { name, .. } => &name.name,
        TypeExprKind::Pointer(inner) => embedded_name(inner),
        _ => "",
    }
}

#[cfg(test)]
#[path = "checker_test.rs"]
mod checker_test;

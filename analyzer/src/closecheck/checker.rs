//! Assignment-site checker
//!
//! Scans each function body's top-level statements in order. Every
//! disposable value a call produces and an assignment binds is tracked until
//! a later statement closes it, returns it or hands it to a known disposer.
//! Values still open at the end of the body are reported at the identifier
//! that owns them.
//!
//! The scan never descends into loops or `switch`, and only one level of
//! `if`, so disposal in those places cannot be proven.

use fxhash::FxHashSet;
use parser::{AssignOp, CallExpr, Decl, Expr, ExprKind, FuncDecl, Ident, Span, Stmt, StmtKind};
use source_map::FileId;

use diagnostics::closecheck::UnassignedCause;

use super::classifier::{Classifier, DisposableDescriptor};
use super::fact_store::FactStore;
use super::query::PackageView;
use super::sink::{DiagnosticSink, Finding, FindingKind};
use crate::config::AnalysisConfig;
use crate::types::{DeclSite, SymbolId, TypeKind};

/// A disposable value bound to a local identifier
#[derive(Debug, Clone)]
struct TrackedValue {
    /// `res`, or `res.Body` for a disposable field
    name: String,
    type_name: String,
    owner: SymbolId,
    fields: Vec<String>,
    owner_span: Span,
    field_decl: Option<DeclSite>,
    resolved: bool,
}

pub struct AssignmentChecker<'a> {
    view: PackageView<'a>,
    classifier: &'a Classifier<'a>,
    facts: &'a FactStore,
    config: &'a AnalysisConfig,
    /// Package-level variables holding disposables; assignments to them are
    /// never tracked
    suppressed: FxHashSet<SymbolId>,
}

impl<'a> AssignmentChecker<'a> {
    pub fn new(
        view: PackageView<'a>,
        classifier: &'a Classifier<'a>,
        facts: &'a FactStore,
        config: &'a AnalysisConfig,
    ) -> Self {
        let suppressed = view
            .package
            .scope
            .values()
            .copied()
            .filter(|&id| {
                view.symbol(id)
                    .is_some_and(|symbol| symbol.is_global_var() && classifier.needs_disposal(symbol.ty))
            })
            .collect();

        Self {
            view,
            classifier,
            facts,
            config,
            suppressed,
        }
    }

    /// Check every function body of the package; returns the number of
    /// bodies that were fully verified
    pub fn check_package(&self, sink: &mut dyn DiagnosticSink) -> usize {
        let package = self.view.package;
        let mut verified = 0;

        for (file, go_file) in &package.files {
            for decl in &go_file.decls {
                if let Decl::Func(func) = decl {
                    if self.check_function(*file, func, sink) {
                        verified += 1;
                    }
                }
            }
        }

        verified
    }

    /// Check one function body; `false` when anything was reported
    pub fn check_function(&self, file: FileId, func: &FuncDecl, sink: &mut dyn DiagnosticSink) -> bool {
        let Some(body) = &func.body else {
            return true;
        };
        let scan = Scan {
            checker: self,
            file,
            function: &func.name.name,
        };
        let verified = scan.run(&body.stmts, sink);

        if self.config.trace {
            tracing::trace!(function = %func.name.name, verified, "checked");
        }

        verified
    }

    /// Disposable results of a call expression, positionally
    fn results_of(&self, expr: &Expr) -> Vec<DisposableDescriptor> {
        let Some(call) = expr.as_call() else {
            return Vec::new();
        };
        if self.is_nop_wrapper(call) {
            return Vec::new();
        }
        let Some(ty) = self.view.type_of(expr.unparen()) else {
            return Vec::new();
        };

        match self.view.types().get(ty) {
            TypeKind::Tuple(elems) => elems.iter().map(|&t| self.classifier.classify(t)).collect(),
            _ => vec![self.classifier.classify(ty)],
        }
    }

    fn produces_disposable(&self, expr: &Expr) -> bool {
        self.results_of(expr).iter().any(|d| d.needs_disposal)
    }

    fn is_nop_wrapper(&self, call: &CallExpr) -> bool {
        self.view.callee_key(call).is_some_and(|key| {
            self.config
                .nop_wrappers
                .iter()
                .any(|wrapper| wrapper == key.as_str())
        })
    }

    fn is_known_disposer(&self, call: &CallExpr) -> bool {
        self.view
            .callee_key(call)
            .is_some_and(|key| self.facts.is_disposer(key))
    }

    fn is_suppressed(&self, ident: &Ident) -> bool {
        self.view
            .object_of(ident)
            .is_some_and(|id| self.suppressed.contains(&id))
    }
}

/// State for scanning one function body
struct Scan<'s, 'a> {
    checker: &'s AssignmentChecker<'a>,
    file: FileId,
    function: &'s str,
}

impl Scan<'_, '_> {
    fn run(&self, stmts: &[Stmt], sink: &mut dyn DiagnosticSink) -> bool {
        let mut pending: Vec<TrackedValue> = Vec::new();

        for stmt in stmts {
            if pending.is_empty() {
                if let Some((expr, cause)) = self.unassigned_disposable(stmt) {
                    self.trace(stmt, "unassigned disposable, giving up on this body");
                    self.report(sink, expr.span, FindingKind::Unassigned(cause));
                    return false;
                }
            } else if let StmtKind::Expr(expr) = &stmt.kind {
                if self.checker.produces_disposable(expr) {
                    self.report(sink, expr.span, FindingKind::Unassigned(UnassignedCause::NotAssigned));
                }
            }

            for value in pending.iter_mut().filter(|v| !v.resolved) {
                if self.resolves(value, stmt) {
                    self.trace(stmt, &format!("{} resolved", value.name));
                    value.resolved = true;
                }
            }

            match &stmt.kind {
                StmtKind::Assign {
                    lhs,
                    op: AssignOp::Assign | AssignOp::Define,
                    rhs,
                } => {
                    let targets: Vec<Option<&Ident>> = lhs.iter().map(Expr::as_ident).collect();
                    self.track(&targets, rhs, &mut pending, sink);
                }
                StmtKind::Decl(Decl::Var(specs)) => {
                    for spec in specs {
                        let targets: Vec<Option<&Ident>> = spec.names.iter().map(Some).collect();
                        self.track(&targets, &spec.values, &mut pending, sink);
                    }
                }
                _ => {}
            }
        }

        let mut verified = true;
        for value in pending.into_iter().filter(|v| !v.resolved) {
            verified = false;
            let field_decl = value
                .field_decl
                .map(|decl| self.checker.view.source_span(decl.file, decl.span));
            self.report(
                sink,
                value.owner_span,
                FindingKind::NotClosed {
                    name: value.name,
                    type_name: value.type_name,
                    field_decl,
                },
            );
        }

        verified
    }

    fn unassigned_disposable<'e>(&self, stmt: &'e Stmt) -> Option<(&'e Expr, UnassignedCause)> {
        let (expr, cause) = match &stmt.kind {
            StmtKind::Expr(expr) => (expr, UnassignedCause::NotAssigned),
            StmtKind::Defer(expr) => (expr, UnassignedCause::Defer),
            StmtKind::Go(expr) => (expr, UnassignedCause::Go),
            _ => return None,
        };
        self.checker
            .produces_disposable(expr)
            .then_some((expr, cause))
    }

    /// Start tracking the disposable values an assignment binds
    fn track(
        &self,
        targets: &[Option<&Ident>],
        rhs: &[Expr],
        pending: &mut Vec<TrackedValue>,
        sink: &mut dyn DiagnosticSink,
    ) {
        if targets
            .iter()
            .flatten()
            .any(|ident| self.checker.is_suppressed(ident))
        {
            return;
        }

        if rhs.len() == 1 {
            let results = self.checker.results_of(&rhs[0]);
            for (target, descriptor) in targets.iter().zip(results.iter()) {
                if let Some(ident) = target {
                    self.bind(ident, descriptor, pending, sink);
                }
            }
        } else {
            for (target, value) in targets.iter().zip(rhs.iter()) {
                let Some(ident) = target else {
                    continue;
                };
                if let Some(descriptor) = self.checker.results_of(value).first() {
                    self.bind(ident, descriptor, pending, sink);
                }
            }
        }
    }

    fn bind(
        &self,
        ident: &Ident,
        descriptor: &DisposableDescriptor,
        pending: &mut Vec<TrackedValue>,
        sink: &mut dyn DiagnosticSink,
    ) {
        if !descriptor.needs_disposal {
            return;
        }
        if ident.is_blank() {
            self.report(
                sink,
                ident.span,
                FindingKind::DiscardedToBlank {
                    type_name: descriptor.type_name.clone(),
                },
            );
            return;
        }
        let Some(owner) = self.checker.view.object_of(ident) else {
            return;
        };

        if descriptor.fields.is_empty() {
            pending.push(TrackedValue {
                name: ident.name.clone(),
                type_name: descriptor.type_name.clone(),
                owner,
                fields: Vec::new(),
                owner_span: ident.span,
                field_decl: None,
                resolved: false,
            });
            return;
        }

        for field in &descriptor.fields {
            pending.push(TrackedValue {
                name: format!("{}.{}", ident.name, field.name),
                type_name: field.type_name.clone(),
                owner,
                fields: vec![field.name.clone()],
                owner_span: ident.span,
                field_decl: field.decl,
                resolved: false,
            });
        }
    }

    fn resolves(&self, value: &TrackedValue, stmt: &Stmt) -> bool {
        self.resolves_at(value, stmt, false)
    }

    /// `nested` is set inside an `if` body; an `if` found there is not entered
    fn resolves_at(&self, value: &TrackedValue, stmt: &Stmt, nested: bool) -> bool {
        match &stmt.kind {
            StmtKind::Return(results) => results
                .iter()
                .any(|e| self.escapes(value, e) || self.disposes(value, e)),
            StmtKind::Defer(expr) | StmtKind::Go(expr) | StmtKind::Expr(expr) => {
                self.disposes(value, expr)
            }
            StmtKind::Assign { rhs, .. } => rhs.iter().any(|e| self.disposes(value, e)),
            StmtKind::Decl(Decl::Var(specs)) => specs
                .iter()
                .flat_map(|spec| spec.values.iter())
                .any(|e| self.disposes(value, e)),
            StmtKind::If(_) if nested => false,
            StmtKind::If(if_stmt) => {
                if_stmt
                    .init
                    .as_deref()
                    .is_some_and(|init| self.resolves_at(value, init, true))
                    || if_stmt
                        .body
                        .stmts
                        .iter()
                        .any(|s| self.resolves_at(value, s, true))
            }
            _ => false,
        }
    }

    fn disposes(&self, value: &TrackedValue, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Call(call) => self.disposes_in_call(value, call),
            ExprKind::Paren(x) | ExprKind::Unary { x, .. } => self.disposes(value, x),
            ExprKind::Binary { left, right, .. } => {
                self.disposes(value, left) || self.disposes(value, right)
            }
            _ => false,
        }
    }

    fn disposes_in_call(&self, value: &TrackedValue, call: &CallExpr) -> bool {
        let view = &self.checker.view;

        if let Some(receiver) = view.method_call_receiver(call, &self.checker.config.disposal_method) {
            if view
                .access_path(receiver)
                .is_some_and(|path| path.is_exactly(value.owner, &value.fields))
            {
                return true;
            }
        }

        if self.checker.is_known_disposer(call) {
            let handed_over = view
                .receiver(call)
                .into_iter()
                .chain(call.args.iter())
                .any(|e| self.mentions(value, e));
            if handed_over {
                return true;
            }
        }

        if let ExprKind::FuncLit { body, .. } = &call.fun.unparen().kind {
            if body.stmts.iter().any(|s| self.resolves(value, s)) {
                return true;
            }
        }

        self.disposes(value, &call.fun) || call.args.iter().any(|arg| self.disposes(value, arg))
    }

    /// Whether `expr` denotes the tracked value, its owner, or a field of it
    fn mentions(&self, value: &TrackedValue, expr: &Expr) -> bool {
        self.checker
            .view
            .access_path(expr)
            .is_some_and(|path| path.is_compatible(value.owner, &value.fields))
    }

    /// Whether returning `expr` hands the tracked value to the caller
    fn escapes(&self, value: &TrackedValue, expr: &Expr) -> bool {
        if self.mentions(value, expr) {
            return true;
        }

        match &expr.kind {
            ExprKind::CompositeLit { elts, .. } => elts.iter().any(|e| self.escapes(value, e)),
            ExprKind::KeyValue { value: v, .. } => self.escapes(value, v),
            ExprKind::Paren(x) | ExprKind::Unary { x, .. } => self.escapes(value, x),
            ExprKind::Call(call) => self
                .checker
                .view
                .receiver(call)
                .into_iter()
                .chain(call.args.iter())
                .any(|e| self.escapes(value, e)),
            _ => false,
        }
    }

    fn report(&self, sink: &mut dyn DiagnosticSink, span: Span, kind: FindingKind) {
        let view = &self.checker.view;
        let file_name = view
            .program
            .source_map
            .file_name(self.file)
            .unwrap_or_default();
        let finding = Finding::new(kind, view.source_span(self.file, span), file_name, view.path());

        if self.checker.config.trace {
            tracing::trace!(function = self.function, code = finding.code, "{}", finding.message);
        }
        sink.report(finding);
    }

    fn trace(&self, stmt: &Stmt, event: &str) {
        if self.checker.config.trace {
            tracing::trace!(
                function = self.function,
                offset = stmt.span.start,
                "{}",
                event
            );
        }
    }
}

#[cfg(test)]
#[path = "checker_test.rs"]
mod checker_test;

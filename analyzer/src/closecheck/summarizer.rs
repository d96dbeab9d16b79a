//! Disposer summarizer
//!
//! Decides, for every function that takes a disposable parameter, whether it
//! disposes each such parameter: by calling the disposal method on it (or on
//! a field chain rooted at it), or by handing it to a function already known
//! to be a disposer.
//!
//! The search looks at the top-level statements of the body and descends
//! into `if` init statements and bodies. Facts are monotone: a function only
//! ever flips from "not a disposer" to "disposer". Pass 1 visits every
//! candidate in declaration order; a flip re-queues the in-package callers
//! of the flipped function, and later passes visit only queued functions,
//! up to the configured pass cap.

use std::collections::BTreeSet;

use fxhash::{FxHashMap, FxHashSet};
use log::debug;
use parser::{Block, CallExpr, Decl, Expr, ExprKind, FuncDecl, Stmt, StmtKind};

use super::classifier::Classifier;
use super::fact_store::{DisposerFact, FactError, FactStore};
use super::query::PackageView;
use crate::config::AnalysisConfig;
use crate::types::{FuncKey, SymbolId};

/// Outcome of summarizing one package
#[derive(Debug, Default)]
pub struct SummaryReport {
    /// Facts exported by this run, in declaration order
    pub facts: Vec<(FuncKey, DisposerFact)>,
    /// Candidates whose fact already existed in the store
    pub skipped: usize,
    pub passes: usize,
}

struct Candidate<'a> {
    key: FuncKey,
    symbol: SymbolId,
    decl: &'a FuncDecl,
    /// Disposable parameters; `None` for blank or unnamed ones
    params: Vec<Option<SymbolId>>,
}

pub struct Summarizer<'a> {
    view: PackageView<'a>,
    classifier: &'a Classifier<'a>,
    facts: &'a FactStore,
    config: &'a AnalysisConfig,
    /// Results for this package's candidates, by function symbol
    local: FxHashMap<SymbolId, bool>,
}

impl<'a> Summarizer<'a> {
    pub fn new(
        view: PackageView<'a>,
        classifier: &'a Classifier<'a>,
        facts: &'a FactStore,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self {
            view,
            classifier,
            facts,
            config,
            local: FxHashMap::default(),
        }
    }

    /// Summarize every candidate of the package and export the facts
    pub fn run(mut self) -> Result<SummaryReport, FactError> {
        let mut report = SummaryReport::default();
        let candidates = self.candidates(&mut report);
        if candidates.is_empty() {
            return Ok(report);
        }

        let index_of: FxHashMap<SymbolId, usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (c.symbol, i))
            .collect();

        // callee candidate -> caller candidates
        let mut callers: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); candidates.len()];
        for (caller, candidate) in candidates.iter().enumerate() {
            let mut callees = FxHashSet::default();
            if let Some(body) = &candidate.decl.body {
                self.collect_callees(&body.stmts, &mut callees);
            }
            for callee in callees {
                if let Some(&callee) = index_of.get(&callee) {
                    if callee != caller {
                        callers[callee].insert(caller);
                    }
                }
            }
        }

        let mut queue: BTreeSet<usize> = (0..candidates.len()).collect();

        while !queue.is_empty() && report.passes < self.config.max_summary_passes {
            report.passes += 1;
            let mut next = BTreeSet::new();

            // Sweep in declaration order; callers later in the sweep see a
            // flip in the same pass, earlier ones wait for the next pass.
            while let Some(index) = queue.pop_first() {
                let candidate = &candidates[index];
                let was = self.is_local_disposer(index, &candidates);
                let is = was || self.summarize(candidate);
                self.local.insert(candidate.symbol, is);

                if is && !was {
                    for &caller in &callers[index] {
                        if self.is_local_disposer(caller, &candidates) {
                            continue;
                        }
                        if caller > index {
                            queue.insert(caller);
                        } else {
                            next.insert(caller);
                        }
                    }
                }
            }

            queue = next;
        }

        if !queue.is_empty() {
            debug!(
                "{}: pass cap {} reached with {} functions pending",
                self.view.path(),
                self.config.max_summary_passes,
                queue.len()
            );
        }

        for candidate in &candidates {
            let fact = DisposerFact {
                is_disposer: self.local.get(&candidate.symbol).copied().unwrap_or(false),
            };
            debug!("{} {}", candidate.key, fact);
            self.facts.export(candidate.key.clone(), fact)?;
            report.facts.push((candidate.key.clone(), fact));
        }

        Ok(report)
    }

    fn is_local_disposer(&self, index: usize, candidates: &[Candidate<'_>]) -> bool {
        self.local
            .get(&candidates[index].symbol)
            .copied()
            .unwrap_or(false)
    }

    /// Function declarations with a body and at least one disposable parameter
    fn candidates(&self, report: &mut SummaryReport) -> Vec<Candidate<'a>> {
        let mut out = Vec::new();
        let package = self.view.package;

        for (_, file) in &package.files {
            for decl in &file.decls {
                let Decl::Func(func) = decl else {
                    continue;
                };
                if func.body.is_none() {
                    continue;
                }
                let Some(symbol_id) = self.view.object_of(&func.name) else {
                    continue;
                };
                let Some(symbol) = self.view.symbol(symbol_id) else {
                    continue;
                };
                let Some(key) = symbol.func_key.clone() else {
                    continue;
                };
                let Some(sig) = self.view.types().signature(symbol.ty) else {
                    continue;
                };

                let mut params = Vec::new();
                let mut index = 0;
                for field in &func.sig.params {
                    let names: Vec<Option<SymbolId>> = if field.names.is_empty() {
                        vec![None]
                    } else {
                        field
                            .names
                            .iter()
                            .map(|name| self.view.object_of(name))
                            .collect()
                    };
                    for param in names {
                        let Some(&ty) = sig.params.get(index) else {
                            break;
                        };
                        index += 1;
                        if self.classifier.needs_disposal(ty) {
                            params.push(param);
                        }
                    }
                }

                if params.is_empty() {
                    continue;
                }
                if self.facts.contains(&key) {
                    report.skipped += 1;
                    continue;
                }

                out.push(Candidate {
                    key,
                    symbol: symbol_id,
                    decl: func,
                    params,
                });
            }
        }

        out
    }

    /// A function is a disposer when every disposable parameter is disposed
    fn summarize(&self, candidate: &Candidate<'_>) -> bool {
        let Some(body) = &candidate.decl.body else {
            return false;
        };
        candidate.params.iter().all(|param| match param {
            Some(param) => self.disposes_in_stmts(*param, &body.stmts),
            None => false,
        })
    }

    fn disposes_in_stmts(&self, param: SymbolId, stmts: &[Stmt]) -> bool {
        stmts.iter().any(|stmt| self.disposes_in_stmt(param, stmt))
    }

    fn disposes_in_stmt(&self, param: SymbolId, stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::If(if_stmt) => {
                if_stmt
                    .init
                    .as_deref()
                    .is_some_and(|init| self.disposes_in_stmt(param, init))
                    || self.disposes_in_stmts(param, &if_stmt.body.stmts)
            }
            StmtKind::Return(results) => results.iter().any(|e| self.disposes_in_expr(param, e)),
            StmtKind::Defer(expr) | StmtKind::Expr(expr) => self.disposes_in_expr(param, expr),
            StmtKind::Assign { rhs, .. } => rhs.iter().any(|e| self.disposes_in_expr(param, e)),
            StmtKind::Decl(Decl::Var(specs)) => specs
                .iter()
                .flat_map(|spec| spec.values.iter())
                .any(|e| self.disposes_in_expr(param, e)),
            _ => false,
        }
    }

    fn disposes_in_expr(&self, param: SymbolId, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Call(call) => self.disposes_in_call(param, call),
            ExprKind::Paren(x) | ExprKind::Unary { x, .. } => self.disposes_in_expr(param, x),
            ExprKind::Binary { left, right, .. } => {
                self.disposes_in_expr(param, left) || self.disposes_in_expr(param, right)
            }
            _ => false,
        }
    }

    fn disposes_in_call(&self, param: SymbolId, call: &CallExpr) -> bool {
        if let Some(receiver) = self
            .view
            .method_call_receiver(call, &self.config.disposal_method)
        {
            if self.is_rooted_at(param, receiver) {
                return true;
            }
        }

        if self.is_known_disposer(call) {
            let receiver = self.view.receiver(call);
            if receiver
                .into_iter()
                .chain(call.args.iter())
                .any(|e| self.is_rooted_at(param, e))
            {
                return true;
            }
        }

        if let ExprKind::FuncLit { body, .. } = &call.fun.unparen().kind {
            if self.disposes_in_stmts(param, &body.stmts) {
                return true;
            }
        }

        self.disposes_in_expr(param, &call.fun)
            || call.args.iter().any(|arg| self.disposes_in_expr(param, arg))
    }

    fn is_rooted_at(&self, param: SymbolId, expr: &Expr) -> bool {
        self.view
            .access_path(expr)
            .is_some_and(|path| path.root == param)
    }

    fn is_known_disposer(&self, call: &CallExpr) -> bool {
        let Some((id, symbol)) = self.view.callee(call) else {
            return false;
        };
        if let Some(&local) = self.local.get(&id) {
            return local;
        }
        symbol
            .func_key
            .as_ref()
            .is_some_and(|key| self.facts.is_disposer(key))
    }

    fn collect_callees(&self, stmts: &[Stmt], out: &mut FxHashSet<SymbolId>) {
        for stmt in stmts {
            walk_stmt_calls(stmt, &mut |call: &CallExpr| {
                if let Some((id, _)) = self.view.callee(call) {
                    out.insert(id);
                }
            });
        }
    }
}

fn walk_exprs(exprs: &[Expr], f: &mut dyn FnMut(&CallExpr)) {
    for e in exprs {
        walk_expr_calls(e, f);
    }
}

fn walk_block(block: &Block, f: &mut dyn FnMut(&CallExpr)) {
    for s in &block.stmts {
        walk_stmt_calls(s, f);
    }
}

/// Visit every call expression inside a statement, function literals included
fn walk_stmt_calls(stmt: &Stmt, f: &mut dyn FnMut(&CallExpr)) {
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::Defer(e) | StmtKind::Go(e) => walk_expr_calls(e, f),
        StmtKind::IncDec { expr, .. } => walk_expr_calls(expr, f),
        StmtKind::Assign { lhs, rhs, .. } => {
            walk_exprs(lhs, f);
            walk_exprs(rhs, f);
        }
        StmtKind::Send { chan, value } => {
            walk_expr_calls(chan, f);
            walk_expr_calls(value, f);
        }
        StmtKind::Decl(Decl::Var(specs)) | StmtKind::Decl(Decl::Const(specs)) => {
            for spec in specs {
                walk_exprs(&spec.values, f);
            }
        }
        StmtKind::Decl(_) => {}
        StmtKind::Return(results) => walk_exprs(results, f),
        StmtKind::If(if_stmt) => {
            if let Some(init) = &if_stmt.init {
                walk_stmt_calls(init, f);
            }
            walk_expr_calls(&if_stmt.cond, f);
            walk_block(&if_stmt.body, f);
            if let Some(els) = &if_stmt.els {
                walk_stmt_calls(els, f);
            }
        }
        StmtKind::For {
            init,
            cond,
            post,
            body,
        } => {
            if let Some(init) = init {
                walk_stmt_calls(init, f);
            }
            if let Some(cond) = cond {
                walk_expr_calls(cond, f);
            }
            if let Some(post) = post {
                walk_stmt_calls(post, f);
            }
            walk_block(body, f);
        }
        StmtKind::Range { expr, body, .. } => {
            walk_expr_calls(expr, f);
            walk_block(body, f);
        }
        StmtKind::Switch {
            init,
            tag,
            clauses,
        } => {
            if let Some(init) = init {
                walk_stmt_calls(init, f);
            }
            if let Some(tag) = tag {
                walk_expr_calls(tag, f);
            }
            for clause in clauses {
                walk_exprs(&clause.exprs, f);
                for s in &clause.body {
                    walk_stmt_calls(s, f);
                }
            }
        }
        StmtKind::TypeSwitch {
            init,
            expr,
            clauses,
            ..
        } => {
            if let Some(init) = init {
                walk_stmt_calls(init, f);
            }
            walk_expr_calls(expr, f);
            for clause in clauses {
                for s in &clause.body {
                    walk_stmt_calls(s, f);
                }
            }
        }
        StmtKind::Block(b) => walk_block(b, f),
        StmtKind::Labeled { stmt, .. } => walk_stmt_calls(stmt, f),
        StmtKind::Branch { .. } | StmtKind::Empty => {}
    }
}

fn walk_expr_calls(expr: &Expr, f: &mut dyn FnMut(&CallExpr)) {
    match &expr.kind {
        ExprKind::Call(call) => {
            f(call);
            walk_expr_calls(&call.fun, f);
            for arg in &call.args {
                walk_expr_calls(arg, f);
            }
        }
        ExprKind::FuncLit { body, .. } => walk_block(body, f),
        ExprKind::CompositeLit { elts, .. } => walk_exprs(elts, f),
        ExprKind::KeyValue { key, value } => {
            walk_expr_calls(key, f);
            walk_expr_calls(value, f);
        }
        ExprKind::Paren(x)
        | ExprKind::Selector { x, .. }
        | ExprKind::Star(x)
        | ExprKind::Unary { x, .. }
        | ExprKind::TypeAssert { x, .. } => walk_expr_calls(x, f),
        ExprKind::Index { x, index } => {
            walk_expr_calls(x, f);
            walk_expr_calls(index, f);
        }
        ExprKind::Slice { x, low, high, max } => {
            walk_expr_calls(x, f);
            for e in [low, high, max].into_iter().flatten() {
                walk_expr_calls(e, f);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            walk_expr_calls(left, f);
            walk_expr_calls(right, f);
        }
        ExprKind::Ident(_) | ExprKind::BasicLit { .. } | ExprKind::Type(_) => {}
    }
}

#[cfg(test)]
#[path = "summarizer_test.rs"]
mod summarizer_test;

//! Statement parsing

use nom::{Parser, error::context};

use crate::custom_error::ContextualError;
use crate::go_ast::*;
use crate::go_parser::{
    PResult, at_line_end, gen_decl, hsymbol, hws, identifier, keyword, position, raw_tag,
    stmt_end, symbol, ws,
};
use crate::go_parser_expr::{
    expr_with, expression, expression_list, expression_list_with, header_expression, send_arrow,
};

/// `{ statements }`
pub fn block<'a>(full: &'a str, input: &'a str) -> PResult<'a, Block> {
    let (input, _) = ws(input)?;
    let start = position(full, input);
    let (input, _) = raw_tag("{").parse(input)?;
    let (input, stmts) = statement_list(full, input)?;
    let (input, _) = context("closing brace", symbol("}")).parse(input)?;

    Ok((
        input,
        Block {
            stmts,
            span: Span::new(start, position(full, input)),
        },
    ))
}

/// Statements up to a closing brace or the next `case`/`default` label
fn statement_list<'a>(full: &'a str, input: &'a str) -> PResult<'a, Vec<Stmt>> {
    let mut stmts = Vec::new();
    let mut input = input;

    loop {
        let (rest, _) = ws(input)?;
        if rest.is_empty()
            || rest.starts_with('}')
            || keyword("case").parse(rest).is_ok()
            || keyword("default").parse(rest).is_ok()
        {
            return Ok((rest, stmts));
        }
        if let Some(rest) = rest.strip_prefix(';') {
            input = rest;
            continue;
        }

        let (rest, stmt) = statement(full, rest)?;
        let (rest, _) = stmt_end(rest)?;
        stmts.push(stmt);
        input = rest;
    }
}

/// Parse one statement
pub fn statement<'a>(full: &'a str, input: &'a str) -> PResult<'a, Stmt> {
    let (input, _) = ws(input)?;
    let start = position(full, input);

    let (rest, kind) = if let Ok((rest, _)) = keyword("return").parse(input) {
        return_stmt(full, rest)?
    } else if let Ok((rest, _)) = keyword("defer").parse(input) {
        let (rest, call) = context("defer statement", |i| expression(full, i)).parse(rest)?;
        (rest, StmtKind::Defer(call))
    } else if let Ok((rest, _)) = keyword("go").parse(input) {
        let (rest, call) = context("go statement", |i| expression(full, i)).parse(rest)?;
        (rest, StmtKind::Go(call))
    } else if keyword("if").parse(input).is_ok() {
        let (rest, stmt) = context("if statement", |i| if_stmt(full, i)).parse(input)?;
        (rest, StmtKind::If(stmt))
    } else if let Ok((rest, _)) = keyword("for").parse(input) {
        context("for statement", |i| for_stmt(full, i)).parse(rest)?
    } else if let Ok((rest, _)) = keyword("switch").parse(input) {
        context("switch statement", |i| switch_stmt(full, i)).parse(rest)?
    } else if keyword("var").parse(input).is_ok()
        || keyword("const").parse(input).is_ok()
        || keyword("type").parse(input).is_ok()
    {
        let (rest, decl) = gen_decl(full, input)?;
        (rest, StmtKind::Decl(decl))
    } else if let Ok((rest, kind)) = branch_stmt(full, input) {
        (rest, kind)
    } else if input.starts_with('{') {
        let (rest, body) = block(full, input)?;
        (rest, StmtKind::Block(body))
    } else {
        return simple_stmt(full, input, true);
    };

    Ok((
        rest,
        Stmt {
            kind,
            span: Span::new(start, position(full, rest)),
        },
    ))
}

fn return_stmt<'a>(full: &'a str, input: &'a str) -> PResult<'a, StmtKind> {
    let (input, _) = hws(input)?;
    if at_line_end(input) {
        return Ok((input, StmtKind::Return(Vec::new())));
    }
    let (input, results) = expression_list(full, input)?;
    Ok((input, StmtKind::Return(results)))
}

fn branch_stmt<'a>(full: &'a str, input: &'a str) -> PResult<'a, StmtKind> {
    let kinds = [
        ("break", BranchKind::Break),
        ("continue", BranchKind::Continue),
        ("goto", BranchKind::Goto),
        ("fallthrough", BranchKind::Fallthrough),
    ];

    for (word, kind) in kinds {
        let Ok((rest, _)) = keyword(word).parse(input) else {
            continue;
        };
        let (after, _) = hws(rest)?;
        if kind == BranchKind::Fallthrough || at_line_end(after) {
            return Ok((rest, StmtKind::Branch { kind, label: None }));
        }
        let (rest, label) = identifier(full, after)?;
        return Ok((
            rest,
            StmtKind::Branch {
                kind,
                label: Some(label),
            },
        ));
    }

    Err(nom::Err::Error(ContextualError::with_message(
        input,
        "expected branch statement",
    )))
}

/// Expression, send, inc/dec, assignment, short variable declaration or label
pub fn simple_stmt<'a>(full: &'a str, input: &'a str, lit: bool) -> PResult<'a, Stmt> {
    let (input, _) = ws(input)?;
    let start = position(full, input);
    let (input, lhs) = expression_list_with(full, input, lit)?;
    let (after, _) = hws(input)?;

    let assign_ops: [(&str, AssignOp); 13] = [
        (":=", AssignOp::Define),
        ("<<=", AssignOp::Op(BinaryOp::Shl)),
        (">>=", AssignOp::Op(BinaryOp::Shr)),
        ("&^=", AssignOp::Op(BinaryOp::AndNot)),
        ("+=", AssignOp::Op(BinaryOp::Add)),
        ("-=", AssignOp::Op(BinaryOp::Sub)),
        ("*=", AssignOp::Op(BinaryOp::Mul)),
        ("/=", AssignOp::Op(BinaryOp::Div)),
        ("%=", AssignOp::Op(BinaryOp::Rem)),
        ("&=", AssignOp::Op(BinaryOp::And)),
        ("|=", AssignOp::Op(BinaryOp::Or)),
        ("^=", AssignOp::Op(BinaryOp::Xor)),
        ("=", AssignOp::Assign),
    ];

    for (spelling, op) in assign_ops {
        let Some(rest) = after.strip_prefix(spelling) else {
            continue;
        };
        if op == AssignOp::Assign && rest.starts_with('=') {
            break;
        }
        let (rest, rhs) = context("assignment", |i| expression_list_with(full, i, lit)).parse(rest)?;
        return Ok((
            rest,
            Stmt {
                kind: StmtKind::Assign { lhs, op, rhs },
                span: Span::new(start, position(full, rest)),
            },
        ));
    }

    let mut lhs = lhs;
    if lhs.len() != 1 {
        return Err(nom::Err::Error(ContextualError::with_message(
            after,
            "expected assignment after expression list",
        )));
    }
    let Some(first) = lhs.pop() else {
        return Err(nom::Err::Error(ContextualError::with_message(after, "expected expression")));
    };

    if lit && after.starts_with(':') {
        if let ExprKind::Ident(label) = first.kind {
            let (peeked, _) = ws(&after[1..])?;
            let (rest, stmt) = if peeked.starts_with('}') {
                let pos = position(full, peeked);
                let empty = Stmt {
                    kind: StmtKind::Empty,
                    span: Span::new(pos, pos),
                };
                (peeked, empty)
            } else {
                statement(full, peeked)?
            };
            return Ok((
                rest,
                Stmt {
                    kind: StmtKind::Labeled {
                        label,
                        stmt: Box::new(stmt),
                    },
                    span: Span::new(start, position(full, rest)),
                },
            ));
        }
    }

    let (rest, kind) = if let Some(rest) = after.strip_prefix("++") {
        (rest, StmtKind::IncDec { expr: first, inc: true })
    } else if let Some(rest) = after.strip_prefix("--") {
        (rest, StmtKind::IncDec { expr: first, inc: false })
    } else if let Ok((rest, _)) = send_arrow(after) {
        let (rest, value) = expr_with(full, rest, lit)?;
        (rest, StmtKind::Send { chan: first, value })
    } else {
        (input, StmtKind::Expr(first))
    };

    Ok((
        rest,
        Stmt {
            kind,
            span: Span::new(start, position(full, rest)),
        },
    ))
}

fn if_stmt<'a>(full: &'a str, input: &'a str) -> PResult<'a, IfStmt> {
    let (input, _) = keyword("if").parse(input)?;
    let (input, first) = simple_stmt(full, input, false)?;

    let (input, init, cond) = match symbol(";").parse(input) {
        Ok((rest, _)) => {
            let (rest, cond) = header_expression(full, rest)?;
            (rest, Some(Box::new(first)), cond)
        }
        Err(_) => match first.kind {
            StmtKind::Expr(cond) => (input, None, cond),
            _ => {
                return Err(nom::Err::Failure(ContextualError::with_message(
                    input,
                    "expected condition in if statement",
                )));
            }
        },
    };

    let (input, body) = context("if body", |i| block(full, i)).parse(input)?;

    let (input, els) = match keyword("else").parse(input) {
        Ok((rest, _)) => {
            let (rest, _) = ws(rest)?;
            let start = position(full, rest);
            if keyword("if").parse(rest).is_ok() {
                let (rest, nested) = if_stmt(full, rest)?;
                let stmt = Stmt {
                    kind: StmtKind::If(nested),
                    span: Span::new(start, position(full, rest)),
                };
                (rest, Some(Box::new(stmt)))
            } else {
                let (rest, body) = context("else body", |i| block(full, i)).parse(rest)?;
                let stmt = Stmt {
                    span: body.span,
                    kind: StmtKind::Block(body),
                };
                (rest, Some(Box::new(stmt)))
            }
        }
        Err(_) => (input, None),
    };

    Ok((
        input,
        IfStmt {
            init,
            cond,
            body,
            els,
        },
    ))
}

fn for_stmt<'a>(full: &'a str, input: &'a str) -> PResult<'a, StmtKind> {
    let (input, _) = ws(input)?;

    if input.starts_with('{') {
        let (input, body) = block(full, input)?;
        return Ok((
            input,
            StmtKind::For {
                init: None,
                cond: None,
                post: None,
                body,
            },
        ));
    }

    if let Ok((rest, _)) = keyword("range").parse(input) {
        let (rest, expr) = header_expression(full, rest)?;
        let (rest, body) = block(full, rest)?;
        return Ok((
            rest,
            StmtKind::Range {
                key: None,
                value: None,
                define: false,
                expr,
                body,
            },
        ));
    }

    if let Ok(result) = range_clause(full, input) {
        return Ok(result);
    }

    let (input, init) = if input.starts_with(';') {
        (input, None)
    } else {
        let (input, stmt) = simple_stmt(full, input, false)?;
        (input, Some(stmt))
    };

    let Ok((input, _)) = symbol(";").parse(input) else {
        let cond = match init.map(|stmt| stmt.kind) {
            Some(StmtKind::Expr(cond)) => cond,
            _ => {
                return Err(nom::Err::Failure(ContextualError::with_message(
                    input,
                    "expected for loop condition",
                )));
            }
        };
        let (input, body) = block(full, input)?;
        return Ok((
            input,
            StmtKind::For {
                init: None,
                cond: Some(cond),
                post: None,
                body,
            },
        ));
    };

    let (input, _) = ws(input)?;
    let (input, cond) = if input.starts_with(';') {
        (input, None)
    } else {
        let (input, cond) = header_expression(full, input)?;
        (input, Some(cond))
    };
    let (input, _) = symbol(";").parse(input)?;

    let (peeked, _) = ws(input)?;
    let (input, post) = if peeked.starts_with('{') {
        (peeked, None)
    } else {
        let (input, post) = simple_stmt(full, input, false)?;
        (input, Some(Box::new(post)))
    };

    let (input, body) = block(full, input)?;
    Ok((
        input,
        StmtKind::For {
            init: init.map(Box::new),
            cond,
            post,
            body,
        },
    ))
}

/// `k, v := range x {` or `k = range x {`
fn range_clause<'a>(full: &'a str, input: &'a str) -> PResult<'a, StmtKind> {
    let (input, lhs) = expression_list_with(full, input, false)?;
    let (input, define) = match hsymbol(":=").parse(input) {
        Ok((rest, _)) => (rest, true),
        Err(_) => {
            let (rest, _) = hsymbol("=").parse(input)?;
            (rest, false)
        }
    };
    let (input, _) = keyword("range").parse(input)?;
    let (input, expr) = header_expression(full, input)?;
    let (input, body) = block(full, input)?;

    let mut lhs = lhs.into_iter();
    Ok((
        input,
        StmtKind::Range {
            key: lhs.next(),
            value: lhs.next(),
            define,
            expr,
            body,
        },
    ))
}

fn switch_stmt<'a>(full: &'a str, input: &'a str) -> PResult<'a, StmtKind> {
    let (input, _) = ws(input)?;

    let (input, init, guard) = if input.starts_with('{') {
        (input, None, None)
    } else {
        let (input, first) = if input.starts_with(';') {
            (input, None)
        } else {
            let (input, first) = simple_stmt(full, input, false)?;
            (input, Some(first))
        };
        match symbol(";").parse(input) {
            Ok((rest, _)) => {
                let (rest, _) = ws(rest)?;
                if rest.starts_with('{') {
                    (rest, first.map(Box::new), None)
                } else {
                    let (rest, guard) = simple_stmt(full, rest, false)?;
                    (rest, first.map(Box::new), Some(guard))
                }
            }
            Err(_) => (input, None, first),
        }
    };

    let (input, clauses) = context("switch body", |i| case_clauses(full, i)).parse(input)?;

    let kind = match guard.map(|stmt| stmt.kind) {
        None => StmtKind::Switch {
            init,
            tag: None,
            clauses,
        },
        Some(StmtKind::Expr(expr)) if is_type_guard(&expr) => StmtKind::TypeSwitch {
            init,
            binding: None,
            expr,
            clauses,
        },
        Some(StmtKind::Expr(tag)) => StmtKind::Switch {
            init,
            tag: Some(tag),
            clauses,
        },
        Some(StmtKind::Assign {
            mut lhs,
            op: AssignOp::Define,
            mut rhs,
        }) if lhs.len() == 1 && rhs.len() == 1 && is_type_guard(&rhs[0]) => {
            let binding = match lhs.pop().map(|e| e.kind) {
                Some(ExprKind::Ident(ident)) => Some(ident),
                _ => None,
            };
            let expr = rhs.remove(0);
            StmtKind::TypeSwitch {
                init,
                binding,
                expr,
                clauses,
            }
        }
        Some(_) => {
            return Err(nom::Err::Failure(ContextualError::with_message(
                input,
                "unsupported switch guard",
            )));
        }
    };

    Ok((input, kind))
}

fn is_type_guard(expr: &Expr) -> bool {
    matches!(expr.unparen().kind, ExprKind::TypeAssert { ty: None, .. })
}

fn case_clauses<'a>(full: &'a str, input: &'a str) -> PResult<'a, Vec<CaseClause>> {
    let (mut input, _) = symbol("{").parse(input)?;
    let mut clauses = Vec::new();

    loop {
        let (rest, _) = ws(input)?;
        if let Some(rest) = rest.strip_prefix('}') {
            return Ok((rest, clauses));
        }
        let start = position(full, rest);

        let (rest, exprs) = if let Ok((rest, _)) = keyword("case").parse(rest) {
            expression_list(full, rest)?
        } else {
            let (rest, _) = keyword("default").parse(rest)?;
            (rest, Vec::new())
        };
        let (rest, _) = symbol(":").parse(rest)?;
        let (rest, body) = statement_list(full, rest)?;

        clauses.push(CaseClause {
            exprs,
            body,
            span: Span::new(start, position(full, rest)),
        });
        input = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_body(src: &str) -> Vec<Stmt> {
        let (rest, body) = block(src, src).expect("block should parse");
        assert!(rest.trim().is_empty(), "unparsed input: {:?}", rest);
        body.stmts
    }

    #[test]
    fn test_short_var_decl_and_defer() {
        let stmts = parse_body("{\n\tresp, err := http.Get(url)\n\tdefer resp.Body.Close()\n}");
        assert_eq!(stmts.len(), 2);
        match &stmts[0].kind {
            StmtKind::Assign { lhs, op, rhs } => {
                assert_eq!(*op, AssignOp::Define);
                assert_eq!(lhs.len(), 2);
                assert!(rhs[0].as_call().is_some());
            }
            other => panic!("expected assignment, got {:?}", other),
        }
        match &stmts[1].kind {
            StmtKind::Defer(call) => assert!(call.as_call().is_some()),
            other => panic!("expected defer, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_return_and_expression_statement() {
        let stmts = parse_body("{ f(); return }");
        assert!(matches!(stmts[0].kind, StmtKind::Expr(_)));
        assert!(matches!(&stmts[1].kind, StmtKind::Return(results) if results.is_empty()));
    }

    #[test]
    fn test_if_with_init_and_else_if() {
        let stmts = parse_body(
            "{\n\tif err := f(); err != nil {\n\t\treturn err\n\t} else if x {\n\t} else {\n\t}\n}",
        );
        let StmtKind::If(stmt) = &stmts[0].kind else {
            panic!("expected if");
        };
        assert!(stmt.init.is_some());
        let Some(els) = &stmt.els else {
            panic!("expected else branch");
        };
        let StmtKind::If(nested) = &els.kind else {
            panic!("expected else-if");
        };
        assert!(matches!(
            nested.els.as_deref().map(|s| &s.kind),
            Some(StmtKind::Block(_))
        ));
    }

    #[test]
    fn test_for_forms() {
        let stmts = parse_body(
            "{\n\tfor {\n\t}\n\tfor i := 0; i < n; i++ {\n\t}\n\tfor k, v := range m {\n\t}\n\tfor ok {\n\t}\n}",
        );
        assert!(matches!(
            stmts[0].kind,
            StmtKind::For { init: None, cond: None, post: None, .. }
        ));
        assert!(matches!(
            stmts[1].kind,
            StmtKind::For { init: Some(_), cond: Some(_), post: Some(_), .. }
        ));
        assert!(matches!(
            stmts[2].kind,
            StmtKind::Range { key: Some(_), value: Some(_), define: true, .. }
        ));
        assert!(matches!(
            stmts[3].kind,
            StmtKind::For { init: None, cond: Some(_), .. }
        ));
    }

    #[test]
    fn test_switch_and_type_switch() {
        let stmts = parse_body(
            "{\n\tswitch x {\n\tcase 1, 2:\n\t\tf()\n\tdefault:\n\t}\n\tswitch c := v.(type) {\n\tcase io.Closer:\n\t\tc.Close()\n\t}\n}",
        );
        match &stmts[0].kind {
            StmtKind::Switch { tag, clauses, .. } => {
                assert!(tag.is_some());
                assert_eq!(clauses.len(), 2);
                assert_eq!(clauses[0].exprs.len(), 2);
                assert!(clauses[1].is_default());
            }
            other => panic!("expected switch, got {:?}", other),
        }
        match &stmts[1].kind {
            StmtKind::TypeSwitch { binding, clauses, .. } => {
                assert_eq!(binding.as_ref().map(|b| b.name.as_str()), Some("c"));
                assert_eq!(clauses[0].body.len(), 1);
            }
            other => panic!("expected type switch, got {:?}", other),
        }
    }

    #[test]
    fn test_labels_branches_and_send() {
        let stmts = parse_body("{\nloop:\n\tfor {\n\t\tbreak loop\n\t}\n\tch <- v\n\tn++\n\tx += 2\n}");
        assert!(matches!(&stmts[0].kind, StmtKind::Labeled { label, .. } if label.name == "loop"));
        assert!(matches!(stmts[1].kind, StmtKind::Send { .. }));
        assert!(matches!(stmts[2].kind, StmtKind::IncDec { inc: true, .. }));
        assert!(matches!(
            stmts[3].kind,
            StmtKind::Assign { op: AssignOp::Op(BinaryOp::Add), .. }
        ));
    }

    #[test]
    fn test_go_statement_with_func_literal() {
        let stmts = parse_body("{\n\tgo func() {\n\t\tdefer c.Close()\n\t}()\n}");
        let StmtKind::Go(call) = &stmts[0].kind else {
            panic!("expected go statement");
        };
        let call = call.as_call().expect("call");
        assert!(matches!(call.fun.kind, ExprKind::FuncLit { .. }));
    }
}

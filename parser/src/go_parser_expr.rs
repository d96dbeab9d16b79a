//! Expression parsing
//!
//! Binary operators and postfix operations only continue an expression on
//! the current line. Inside `if`/`for`/`switch` headers a bare type name
//! followed by `{` starts the body, not a composite literal.

use nom::{
    Parser,
    branch::alt,
    bytes::complete::{escaped, is_not, tag, take_while, take_while1},
    character::complete::{char, none_of, one_of, satisfy},
    combinator::{opt, recognize},
    error::context,
    multi::separated_list1,
};

use crate::custom_error::ContextualError;
use crate::go_ast::*;
use crate::go_parser::{PResult, hchar, hws, identifier, keyword, position, raw_tag, signature, symbol, ws};
use crate::go_parser_stmt::block;
use crate::go_parser_types::type_expr_here;

/// Parse an expression
pub fn expression<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(full, input, 1, true)
}

/// Expression inside an `if`/`for`/`switch` header
pub fn header_expression<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(full, input, 1, false)
}

pub(crate) fn expr_with<'a>(full: &'a str, input: &'a str, lit: bool) -> PResult<'a, Expr> {
    binary_expr(full, input, 1, lit)
}

/// Comma-separated expressions
pub fn expression_list<'a>(full: &'a str, input: &'a str) -> PResult<'a, Vec<Expr>> {
    expression_list_with(full, input, true)
}

pub(crate) fn expression_list_with<'a>(
    full: &'a str,
    input: &'a str,
    lit: bool,
) -> PResult<'a, Vec<Expr>> {
    separated_list1(symbol(","), |i| expr_with(full, i, lit)).parse(input)
}

/// Precedence climbing over `BINARY_OPS`
fn binary_expr<'a>(full: &'a str, input: &'a str, min_prec: u8, lit: bool) -> PResult<'a, Expr> {
    let (mut input, mut left) = unary_expr(full, input, lit)?;

    loop {
        let Ok((rest, op)) = binary_op(input) else {
            break;
        };
        if op.precedence() < min_prec {
            break;
        }
        let (rest, right) = binary_expr(full, rest, op.precedence() + 1, lit)?;
        let span = left.span.merge(right.span);
        left = Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        );
        input = rest;
    }

    Ok((input, left))
}

/// Binary operator on the current line, rejecting assignment and comment forms
fn binary_op(input: &str) -> PResult<'_, BinaryOp> {
    let (input, _) = hws(input)?;
    for (spelling, op) in BINARY_OPS {
        let Some(rest) = input.strip_prefix(spelling) else {
            continue;
        };
        let compound = !op.is_comparison() && !op.is_logical() && rest.starts_with('=');
        let comment = *spelling == "/" && (rest.starts_with('/') || rest.starts_with('*'));
        let incdec = (*spelling == "+" && rest.starts_with('+'))
            || (*spelling == "-" && rest.starts_with('-'));
        let arrow = *spelling == "<" && rest.starts_with('-');
        if compound || comment || incdec || arrow {
            return Err(nom::Err::Error(ContextualError::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        return Ok((rest, *op));
    }
    Err(nom::Err::Error(ContextualError::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

/// Prefix operators
pub fn unary_expr<'a>(full: &'a str, input: &'a str, lit: bool) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = position(full, input);

    if let Ok((rest, _)) = raw_tag("<-").parse(input) {
        // `<-chan T` in expression position is a channel type
        if keyword("chan").parse(rest).is_err() {
            let (rest, x) = unary_expr(full, rest, lit)?;
            let span = Span::new(start, x.span.end);
            return Ok((
                rest,
                Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Recv,
                        x: Box::new(x),
                    },
                    span,
                ),
            ));
        }
    }

    if let Ok((rest, _)) = raw_tag("*").parse(input) {
        let (rest, x) = unary_expr(full, rest, lit)?;
        let span = Span::new(start, x.span.end);
        return Ok((rest, Expr::new(ExprKind::Star(Box::new(x)), span)));
    }

    let op = match input.chars().next() {
        Some('+') => Some(UnaryOp::Plus),
        Some('-') => Some(UnaryOp::Neg),
        Some('!') => Some(UnaryOp::Not),
        Some('^') => Some(UnaryOp::BitNot),
        Some('&') if !input.starts_with("&&") => Some(UnaryOp::Addr),
        _ => None,
    };

    match op {
        Some(op) => {
            let (rest, x) = unary_expr(full, &input[1..], lit)?;
            let span = Span::new(start, x.span.end);
            Ok((
                rest,
                Expr::new(
                    ExprKind::Unary {
                        op,
                        x: Box::new(x),
                    },
                    span,
                ),
            ))
        }
        None => postfix_expr(full, input, lit),
    }
}

/// Operand followed by selectors, calls, indexes, assertions and literals
pub fn postfix_expr<'a>(full: &'a str, input: &'a str, lit: bool) -> PResult<'a, Expr> {
    let start = position(full, input);
    let (mut input, mut expr) = operand(full, input)?;

    loop {
        let (peeked, _) = hws(input)?;

        if let Some(rest) = peeked.strip_prefix('.') {
            if rest.starts_with('.') {
                break;
            }
            let (rest, _) = ws(rest)?;
            if let Some(rest) = rest.strip_prefix('(') {
                let (rest, ty) = if let Ok((rest, _)) = keyword("type").parse(rest) {
                    (rest, None)
                } else {
                    let (rest, _) = ws(rest)?;
                    let (rest, ty) = type_expr_here(full, rest)?;
                    (rest, Some(ty))
                };
                let (rest, _) = symbol(")").parse(rest)?;
                expr = Expr::new(
                    ExprKind::TypeAssert {
                        x: Box::new(expr),
                        ty,
                    },
                    Span::new(start, position(full, rest)),
                );
                input = rest;
                continue;
            }
            let (rest, sel) = identifier(full, rest)?;
            expr = Expr::new(
                ExprKind::Selector {
                    x: Box::new(expr),
                    sel,
                },
                Span::new(start, position(full, rest)),
            );
            input = rest;
        } else if let Some(rest) = peeked.strip_prefix('(') {
            let (rest, (args, ellipsis)) = context("call arguments", |i| call_args(full, i)).parse(rest)?;
            expr = Expr::new(
                ExprKind::Call(CallExpr {
                    fun: Box::new(expr),
                    args,
                    ellipsis,
                }),
                Span::new(start, position(full, rest)),
            );
            input = rest;
        } else if let Some(rest) = peeked.strip_prefix('[') {
            let (rest, kind) = index_or_slice(full, rest, expr)?;
            expr = Expr::new(kind, Span::new(start, position(full, rest)));
            input = rest;
        } else if peeked.starts_with('{') && literal_type_allowed(&expr, lit) {
            let (rest, elts) = context("composite literal", |i| literal_value(full, i)).parse(peeked)?;
            expr = Expr::new(
                ExprKind::CompositeLit {
                    ty: Some(Box::new(expr)),
                    elts,
                },
                Span::new(start, position(full, rest)),
            );
            input = rest;
        } else {
            break;
        }
    }

    Ok((input, expr))
}

fn literal_type_allowed(expr: &Expr, lit: bool) -> bool {
    match &expr.kind {
        ExprKind::Ident(_) | ExprKind::Selector { .. } | ExprKind::Index { .. } => lit,
        ExprKind::Type(ty) => matches!(
            ty.kind,
            TypeExprKind::Array { .. }
                | TypeExprKind::Slice(_)
                | TypeExprKind::Map { .. }
                | TypeExprKind::Struct(_)
        ),
        _ => false,
    }
}

fn call_args<'a>(full: &'a str, input: &'a str) -> PResult<'a, (Vec<Expr>, bool)> {
    let mut args = Vec::new();
    let mut ellipsis = false;
    let mut input = input;

    loop {
        let (rest, _) = ws(input)?;
        if let Some(rest) = rest.strip_prefix(')') {
            return Ok((rest, (args, ellipsis)));
        }

        let (rest, arg) = expression(full, rest)?;
        args.push(arg);

        let (rest, _) = ws(rest)?;
        let rest = match rest.strip_prefix("...") {
            Some(rest) => {
                ellipsis = true;
                rest
            }
            None => rest,
        };

        let (rest, _) = ws(rest)?;
        if let Some(rest) = rest.strip_prefix(',') {
            input = rest;
            continue;
        }
        let (rest, _) = raw_tag(")").parse(rest)?;
        return Ok((rest, (args, ellipsis)));
    }
}

fn index_or_slice<'a>(full: &'a str, input: &'a str, x: Expr) -> PResult<'a, ExprKind> {
    let (input, _) = ws(input)?;
    let (input, low) = if input.starts_with(':') {
        (input, None)
    } else {
        let (input, low) = expression(full, input)?;
        (input, Some(Box::new(low)))
    };

    let (input, _) = ws(input)?;
    if let Some(rest) = input.strip_prefix(']') {
        let index = low.ok_or_else(|| {
            nom::Err::Error(ContextualError::with_message(input, "expected index"))
        })?;
        return Ok((
            rest,
            ExprKind::Index {
                x: Box::new(x),
                index,
            },
        ));
    }

    let (input, _) = raw_tag(":").parse(input)?;
    let (input, high) = opt_slice_bound(full, input)?;
    let (input, max) = match symbol(":").parse(input) {
        Ok((rest, _)) => opt_slice_bound(full, rest)?,
        Err(_) => (input, None),
    };
    let (input, _) = symbol("]").parse(input)?;

    Ok((
        input,
        ExprKind::Slice {
            x: Box::new(x),
            low,
            high,
            max,
        },
    ))
}

fn opt_slice_bound<'a>(full: &'a str, input: &'a str) -> PResult<'a, Option<Box<Expr>>> {
    let (rest, _) = ws(input)?;
    if rest.starts_with(']') || rest.starts_with(':') {
        return Ok((rest, None));
    }
    let (rest, bound) = expression(full, rest)?;
    Ok((rest, Some(Box::new(bound))))
}

/// `{ elem, key: value, {nested}, }`
fn literal_value<'a>(full: &'a str, input: &'a str) -> PResult<'a, Vec<Expr>> {
    let (mut input, _) = raw_tag("{").parse(input)?;
    let mut elts = Vec::new();

    loop {
        let (rest, _) = ws(input)?;
        if let Some(rest) = rest.strip_prefix('}') {
            return Ok((rest, elts));
        }

        let (rest, key) = element(full, rest)?;
        let (rest, elt) = match symbol(":").parse(rest) {
            Ok((rest, _)) => {
                let (rest, value) = element(full, rest)?;
                let span = key.span.merge(value.span);
                (
                    rest,
                    Expr::new(
                        ExprKind::KeyValue {
                            key: Box::new(key),
                            value: Box::new(value),
                        },
                        span,
                    ),
                )
            }
            Err(_) => (rest, key),
        };
        elts.push(elt);

        let (rest, _) = ws(rest)?;
        if let Some(rest) = rest.strip_prefix(',') {
            input = rest;
            continue;
        }
        let (rest, _) = raw_tag("}").parse(rest)?;
        return Ok((rest, elts));
    }
}

fn element<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    if input.starts_with('{') {
        let start = position(full, input);
        let (rest, elts) = literal_value(full, input)?;
        return Ok((
            rest,
            Expr::new(
                ExprKind::CompositeLit { ty: None, elts },
                Span::new(start, position(full, rest)),
            ),
        ));
    }
    expression(full, input)
}

/// Literals, identifiers, function literals, type literals and parentheses
fn operand<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = position(full, input);

    if input.starts_with('(') {
        let (rest, _) = raw_tag("(").parse(input)?;
        let (rest, inner) = expression(full, rest)?;
        let (rest, _) = symbol(")").parse(rest)?;
        return Ok((
            rest,
            Expr::new(
                ExprKind::Paren(Box::new(inner)),
                Span::new(start, position(full, rest)),
            ),
        ));
    }

    if keyword("func").parse(input).is_ok() {
        return func_lit(full, input);
    }

    if input.starts_with('[')
        || keyword("map").parse(input).is_ok()
        || keyword("struct").parse(input).is_ok()
        || keyword("chan").parse(input).is_ok()
        || keyword("interface").parse(input).is_ok()
        || input.starts_with("<-")
    {
        let (rest, ty) = type_expr_here(full, input)?;
        let span = ty.span;
        return Ok((rest, Expr::new(ExprKind::Type(ty), span)));
    }

    alt((
        |i| basic_lit(full, i),
        |i| identifier(full, i).map(|(rest, ident)| {
            let span = ident.span;
            (rest, Expr::new(ExprKind::Ident(ident), span))
        }),
    ))
    .parse(input)
    .map_err(|e| match e {
        nom::Err::Error(_) => nom::Err::Error(ContextualError::with_message(input, "expected expression")),
        other => other,
    })
}

fn func_lit<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    let start = position(full, input);
    let (input, _) = keyword("func").parse(input)?;
    let (input, sig) = signature(full, input)?;

    let (peeked, _) = hws(input)?;
    if !peeked.starts_with('{') {
        let span = Span::new(start, position(full, input));
        let ty = TypeExpr {
            kind: TypeExprKind::Func(sig),
            span,
        };
        return Ok((input, Expr::new(ExprKind::Type(ty), span)));
    }

    let (input, body) = context("function literal body", |i| block(full, i)).parse(peeked)?;
    Ok((
        input,
        Expr::new(
            ExprKind::FuncLit { sig, body },
            Span::new(start, position(full, input)),
        ),
    ))
}

/// Integer, float, imaginary, rune or string literal
pub fn basic_lit<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    alt((|i| string_lit(full, i), |i| rune_lit(full, i), |i| number_lit(full, i))).parse(input)
}

/// Interpreted or raw string literal; the value keeps its quotes
pub fn string_lit<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = position(full, input);

    let (rest, text) = alt((
        recognize((
            char('"'),
            opt(escaped(is_not("\"\\\n"), '\\', satisfy(|_| true))),
            char('"'),
        )),
        recognize((char('`'), take_while(|c: char| c != '`'), char('`'))),
    ))
    .parse(input)?;

    Ok((
        rest,
        Expr::new(
            ExprKind::BasicLit {
                kind: LitKind::String,
                value: text.to_string(),
            },
            Span::new(start, position(full, rest)),
        ),
    ))
}

fn rune_lit<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    let start = position(full, input);
    let (rest, text) = recognize((
        char('\''),
        alt((
            recognize((char('\\'), take_while1(|c: char| c != '\''))),
            recognize(none_of("'\\\n")),
        )),
        char('\''),
    ))
    .parse(input)?;

    Ok((
        rest,
        Expr::new(
            ExprKind::BasicLit {
                kind: LitKind::Char,
                value: text.to_string(),
            },
            Span::new(start, position(full, rest)),
        ),
    ))
}

fn number_lit<'a>(full: &'a str, input: &'a str) -> PResult<'a, Expr> {
    let start = position(full, input);
    let digits = |c: char| c.is_ascii_hexdigit() || c == '_';

    let (rest, text) = alt((
        recognize((
            char('0'),
            one_of("xXoObB"),
            take_while1(digits),
        )),
        recognize((
            alt((
                recognize((
                    satisfy(|c: char| c.is_ascii_digit()),
                    take_while(|c: char| c.is_ascii_digit() || c == '_'),
                    opt((char('.'), take_while(|c: char| c.is_ascii_digit() || c == '_'))),
                )),
                recognize((char('.'), take_while1(|c: char| c.is_ascii_digit()))),
            )),
            opt((
                one_of("eE"),
                opt(one_of("+-")),
                take_while1(|c: char| c.is_ascii_digit()),
            )),
            opt(tag("i")),
        )),
    ))
    .parse(input)?;

    let kind = if text.contains(['.', 'e', 'E', 'i']) && !text.starts_with("0x") && !text.starts_with("0X") {
        LitKind::Float
    } else {
        LitKind::Int
    };

    Ok((
        rest,
        Expr::new(
            ExprKind::BasicLit {
                kind,
                value: text.to_string(),
            },
            Span::new(start, position(full, rest)),
        ),
    ))
}

/// `<-` on the current line, used by send statements
pub fn send_arrow(input: &str) -> PResult<'_, char> {
    let (input, _) = hchar('<').parse(input)?;
    char('-').parse(input)
}

//! Type expressions, parameter lists, struct fields and interface elements

use nom::{Parser, branch::alt, error::context, multi::separated_list1};

use crate::custom_error::ContextualError;
use crate::go_ast::*;
use crate::go_parser::{
    PResult, hws, hsymbol, identifier, keyword, position, raw_tag, signature, stmt_end, symbol,
    ws,
};
use crate::go_parser_expr::{expression, string_lit};

/// Type expression after optional whitespace
pub fn type_expr<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExpr> {
    let (input, _) = ws(input)?;
    type_expr_here(full, input)
}

/// Type expression starting exactly at `input`
pub fn type_expr_here<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExpr> {
    let start = position(full, input);
    let (rest, kind) = alt((
        |i| pointer_type(full, i),
        |i| array_or_slice_type(full, i),
        |i| map_type(full, i),
        |i| chan_type(full, i),
        |i| func_type(full, i),
        |i| struct_type(full, i),
        |i| interface_type(full, i),
        |i| paren_type(full, i),
        |i| ellipsis_type(full, i),
        |i| named_type(full, i),
    ))
    .parse(input)?;

    Ok((
        rest,
        TypeExpr {
            kind,
            span: Span::new(start, position(full, rest)),
        },
    ))
}

fn boxed<'a>(full: &'a str, input: &'a str) -> PResult<'a, Box<TypeExpr>> {
    let (input, ty) = type_expr(full, input)?;
    Ok((input, Box::new(ty)))
}

fn pointer_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, _) = raw_tag("*").parse(input)?;
    let (input, elem) = boxed(full, input)?;
    Ok((input, TypeExprKind::Pointer(elem)))
}

fn array_or_slice_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, _) = raw_tag("[").parse(input)?;

    if let Ok((input, _)) = symbol("]").parse(input) {
        let (input, elem) = boxed(full, input)?;
        return Ok((input, TypeExprKind::Slice(elem)));
    }

    if let Ok((input, _)) = symbol("...").parse(input) {
        let (input, _) = symbol("]").parse(input)?;
        let (input, elem) = boxed(full, input)?;
        return Ok((input, TypeExprKind::Array { len: None, elem }));
    }

    let (input, len) = expression(full, input)?;
    let (input, _) = symbol("]").parse(input)?;
    let (input, elem) = boxed(full, input)?;
    Ok((
        input,
        TypeExprKind::Array {
            len: Some(Box::new(len)),
            elem,
        },
    ))
}

fn map_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, _) = keyword("map").parse(input)?;
    let (input, _) = symbol("[").parse(input)?;
    let (input, key) = boxed(full, input)?;
    let (input, _) = symbol("]").parse(input)?;
    let (input, value) = boxed(full, input)?;
    Ok((input, TypeExprKind::Map { key, value }))
}

fn chan_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    if let Ok((input, _)) = raw_tag("<-").parse(input) {
        let (input, _) = keyword("chan").parse(input)?;
        let (input, elem) = boxed(full, input)?;
        return Ok((
            input,
            TypeExprKind::Chan {
                dir: ChanDir::Recv,
                elem,
            },
        ));
    }

    let (input, _) = keyword("chan").parse(input)?;
    let (input, dir) = match symbol("<-").parse(input) {
        Ok((rest, _)) => (rest, ChanDir::Send),
        Err(_) => (input, ChanDir::Both),
    };
    let (input, elem) = boxed(full, input)?;
    Ok((input, TypeExprKind::Chan { dir, elem }))
}

fn func_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, _) = keyword("func").parse(input)?;
    let (input, sig) = signature(full, input)?;
    Ok((input, TypeExprKind::Func(sig)))
}

fn struct_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, _) = keyword("struct").parse(input)?;
    let (mut input, _) = symbol("{").parse(input)?;

    let mut fields = Vec::new();
    loop {
        let (rest, _) = ws(input)?;
        if let Ok((rest, _)) = raw_tag("}").parse(rest) {
            return Ok((rest, TypeExprKind::Struct(fields)));
        }
        let (rest, field) = context("struct field", |i| struct_field(full, i)).parse(rest)?;
        let (rest, _) = stmt_end(rest)?;
        fields.push(field);
        input = rest;
    }
}

fn struct_field<'a>(full: &'a str, input: &'a str) -> PResult<'a, Field> {
    let (input, _) = ws(input)?;
    let start = position(full, input);

    let named = |i: &'a str| -> PResult<'a, (Vec<Ident>, TypeExpr)> {
        let (i, names) = separated_list1(symbol(","), |i| identifier(full, i)).parse(i)?;
        let (i, _) = hws(i)?;
        let (i, ty) = type_expr_here(full, i)?;
        Ok((i, (names, ty)))
    };
    let embedded = |i: &'a str| -> PResult<'a, (Vec<Ident>, TypeExpr)> {
        let (i, ty) = type_expr_here(full, i)?;
        Ok((i, (Vec::new(), ty)))
    };

    let (input, (names, ty)) = alt((named, embedded)).parse(input)?;

    let (input, _) = hws(input)?;
    let (input, tag) = if input.starts_with('"') || input.starts_with('`') {
        let (input, lit) = string_lit(full, input)?;
        match lit.kind {
            ExprKind::BasicLit { value, .. } => (input, Some(value)),
            _ => (input, None),
        }
    } else {
        (input, None)
    };

    Ok((
        input,
        Field {
            names,
            ty,
            tag,
            span: Span::new(start, position(full, input)),
        },
    ))
}

fn interface_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, _) = keyword("interface").parse(input)?;
    let (mut input, _) = symbol("{").parse(input)?;

    let mut elems = Vec::new();
    loop {
        let (rest, _) = ws(input)?;
        if let Ok((rest, _)) = raw_tag("}").parse(rest) {
            return Ok((rest, TypeExprKind::Interface(elems)));
        }
        let (rest, elem) = context("interface element", |i| interface_elem(full, i)).parse(rest)?;
        let (rest, _) = stmt_end(rest)?;
        elems.push(elem);
        input = rest;
    }
}

fn interface_elem<'a>(full: &'a str, input: &'a str) -> PResult<'a, InterfaceElem> {
    let method = |i: &'a str| -> PResult<'a, InterfaceElem> {
        let (i, name) = identifier(full, i)?;
        if !i.starts_with('(') {
            return Err(nom::Err::Error(ContextualError::with_message(
                i,
                "expected method signature",
            )));
        }
        let (i, sig) = signature(full, i)?;
        Ok((i, InterfaceElem::Method { name, sig }))
    };
    let embedded = |i: &'a str| -> PResult<'a, InterfaceElem> {
        let (i, ty) = type_expr(full, i)?;
        Ok((i, InterfaceElem::Embedded(ty)))
    };

    alt((method, embedded)).parse(input)
}

fn paren_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, _) = raw_tag("(").parse(input)?;
    let (input, inner) = type_expr(full, input)?;
    let (input, _) = symbol(")").parse(input)?;
    Ok((input, inner.kind))
}

fn ellipsis_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, _) = raw_tag("...").parse(input)?;
    let (input, elem) = boxed(full, input)?;
    Ok((input, TypeExprKind::Ellipsis(elem)))
}

fn named_type<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeExprKind> {
    let (input, first) = identifier(full, input)?;
    match hsymbol(".").parse(input) {
        Ok((rest, _)) => {
            let (rest, name) = identifier(full, rest)?;
            Ok((
                rest,
                TypeExprKind::Qualified {
                    package: first,
                    name,
                },
            ))
        }
        Err(_) => Ok((input, TypeExprKind::Name(first))),
    }
}

/// One entry of a parameter list before grouping: `name Type` or `Type`
#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Comma-separated parameter entries up to (not including) the closing paren
pub fn field_entries<'a>(full: &'a str, input: &'a str) -> PResult<'a, Vec<FieldEntry>> {
    let mut entries = Vec::new();
    let mut input = input;

    loop {
        let (rest, _) = ws(input)?;
        if rest.starts_with(')') {
            return Ok((rest, entries));
        }

        let (rest, entry) = context("parameter", |i| field_entry(full, i)).parse(rest)?;
        entries.push(entry);

        match symbol(",").parse(rest) {
            Ok((rest, _)) => input = rest,
            Err(_) => return Ok((rest, entries)),
        }
    }
}

fn field_entry<'a>(full: &'a str, input: &'a str) -> PResult<'a, FieldEntry> {
    let start = position(full, input);

    let named = |i: &'a str| -> PResult<'a, (Option<Ident>, TypeExpr)> {
        let (i, name) = identifier(full, i)?;
        let (i, _) = hws(i)?;
        if i.starts_with(',') || i.starts_with(')') || (i.starts_with('.') && !i.starts_with("...")) {
            return Err(nom::Err::Error(ContextualError::with_message(
                i,
                "unnamed parameter",
            )));
        }
        let (i, ty) = type_expr_here(full, i)?;
        Ok((i, (Some(name), ty)))
    };
    let unnamed = |i: &'a str| -> PResult<'a, (Option<Ident>, TypeExpr)> {
        let (i, ty) = type_expr_here(full, i)?;
        Ok((i, (None, ty)))
    };

    let (input, (name, ty)) = alt((named, unnamed)).parse(input)?;
    Ok((
        input,
        FieldEntry {
            name,
            ty,
            span: Span::new(start, position(full, input)),
        },
    ))
}

/// Apply Go's grouping rule: `a, b int` names two parameters of type `int`;
/// a list without any names is a list of types.
pub fn group_params(entries: Vec<FieldEntry>) -> Vec<Field> {
    if entries.iter().all(|entry| entry.name.is_none()) {
        return entries
            .into_iter()
            .map(|entry| Field {
                names: Vec::new(),
                ty: entry.ty,
                tag: None,
                span: entry.span,
            })
            .collect();
    }

    let mut fields = Vec::new();
    let mut pending: Vec<(Ident, Span)> = Vec::new();

    for entry in entries {
        match entry.name {
            Some(name) => {
                let span = pending
                    .first()
                    .map(|(_, span)| span.merge(entry.span))
                    .unwrap_or(entry.span);
                let mut names: Vec<Ident> = pending.drain(..).map(|(ident, _)| ident).collect();
                names.push(name);
                fields.push(Field {
                    names,
                    ty: entry.ty,
                    tag: None,
                    span,
                });
            }
            None => {
                if let TypeExprKind::Name(ident) = entry.ty.kind {
                    pending.push((ident, entry.span));
                }
            }
        }
    }

    fields
}

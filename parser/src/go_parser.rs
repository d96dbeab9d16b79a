//! Go parser: lexical helpers, source file and top-level declarations
//!
//! Go terminates statements at line ends. Helpers come in two flavours:
//! `ws`/`symbol` skip newlines, `hws`/`hsymbol` stay on the current line and
//! are used wherever a newline would end the construct.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, multispace1, satisfy},
    combinator::{not, opt, peek, recognize, value},
    error::context,
    multi::{many0, separated_list1},
};

use crate::custom_error::{ContextualError, ParseError};
use crate::go_ast::*;
use crate::go_parser_expr::{expression_list, string_lit};
use crate::go_parser_stmt::block;
use crate::go_parser_types::{field_entries, group_params, type_expr, type_expr_here};

/// Parser result type with contextual errors
pub type PResult<'a, T> = IResult<&'a str, T, ContextualError<&'a str>>;

/// Parse a complete Go source file
pub fn parse_go_file(file_name: &str, input: &str) -> Result<GoFile, ParseError> {
    match go_file(file_name, input, input) {
        Ok((rest, file)) => match ws(rest) {
            Ok(("", _)) => Ok(file),
            Ok((rest, _)) => Err(ParseError::from_nom(
                file_name,
                input,
                ContextualError::with_message(rest, "expected declaration"),
            )),
            Err(_) => Err(ParseError::incomplete(file_name, input)),
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ParseError::from_nom(file_name, input, e))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::incomplete(file_name, input)),
    }
}

fn go_file<'a>(file_name: &str, full: &'a str, input: &'a str) -> PResult<'a, GoFile> {
    let (input, _) = ws(input)?;
    let start = position(full, input);

    let (input, _) = context("package clause", keyword("package")).parse(input)?;
    let (input, package) = identifier(full, input)?;
    let (input, _) = stmt_end(input)?;

    let mut imports = Vec::new();
    let mut input = input;
    loop {
        let (rest, _) = ws(input)?;
        if keyword("import").parse(rest).is_err() {
            break;
        }
        let (rest, specs) = context("import declaration", |i| import_decl(full, i)).parse(rest)?;
        let (rest, _) = stmt_end(rest)?;
        imports.extend(specs);
        input = rest;
    }

    let mut decls = Vec::new();
    loop {
        let (rest, _) = ws(input)?;
        if rest.is_empty() {
            input = rest;
            break;
        }
        let (rest, decl) = top_level_decl(full, rest)?;
        let (rest, _) = stmt_end(rest)?;
        decls.push(decl);
        input = rest;
    }

    let end = position(full, input);
    Ok((
        input,
        GoFile {
            filename: file_name.to_string(),
            package,
            imports,
            decls,
            span: Span::new(start, end),
        },
    ))
}

/// `import "a"` or `import ( ... )`
fn import_decl<'a>(full: &'a str, input: &'a str) -> PResult<'a, Vec<ImportSpec>> {
    let (input, _) = keyword("import").parse(input)?;
    grouped(full, input, import_spec)
}

fn import_spec<'a>(full: &'a str, input: &'a str) -> PResult<'a, ImportSpec> {
    let (input, _) = ws(input)?;
    let start = position(full, input);

    let (input, alias) = opt(alt((
        |i| identifier(full, i),
        |i: &'a str| {
            let (rest, _) = ws(i)?;
            let pos = position(full, rest);
            let (rest, _) = raw_tag(".").parse(rest)?;
            Ok((rest, Ident::new(".", Span::new(pos, pos + 1))))
        },
    )))
    .parse(input)?;

    let (input, path) = context("import path", |i| string_lit(full, i)).parse(input)?;
    let path = match path.kind {
        ExprKind::BasicLit { value, .. } => unquote(&value),
        _ => String::new(),
    };

    Ok((
        input,
        ImportSpec {
            alias,
            path,
            span: Span::new(start, position(full, input)),
        },
    ))
}

/// Top-level `func`, `var`, `const` or `type` declaration
pub fn top_level_decl<'a>(full: &'a str, input: &'a str) -> PResult<'a, Decl> {
    alt((
        |i| func_decl(full, i).map(|(rest, f)| (rest, Decl::Func(f))),
        |i| gen_decl(full, i),
    ))
    .parse(input)
}

/// `var`, `const` or `type` declaration, at top level or inside a body
pub fn gen_decl<'a>(full: &'a str, input: &'a str) -> PResult<'a, Decl> {
    alt((
        |i| {
            let (i, _) = keyword("var").parse(i)?;
            let (i, specs) = context("var declaration", |i| grouped(full, i, value_spec)).parse(i)?;
            Ok((i, Decl::Var(specs)))
        },
        |i| {
            let (i, _) = keyword("const").parse(i)?;
            let (i, mut specs) =
                context("const declaration", |i| grouped(full, i, value_spec)).parse(i)?;
            for (index, spec) in specs.iter_mut().enumerate() {
                spec.iota = index;
            }
            Ok((i, Decl::Const(specs)))
        },
        |i| {
            let (i, _) = keyword("type").parse(i)?;
            let (i, specs) = context("type declaration", |i| grouped(full, i, type_spec)).parse(i)?;
            Ok((i, Decl::Type(specs)))
        },
    ))
    .parse(input)
}

/// Single spec or a parenthesized group of specs, one per line
fn grouped<'a, T>(
    full: &'a str,
    input: &'a str,
    spec: fn(&'a str, &'a str) -> PResult<'a, T>,
) -> PResult<'a, Vec<T>> {
    let (after_ws, _) = ws(input)?;
    if !after_ws.starts_with('(') {
        let (input, item) = spec(full, input)?;
        return Ok((input, vec![item]));
    }

    let (mut input, _) = raw_tag("(").parse(after_ws)?;
    let mut items = Vec::new();
    loop {
        let (rest, _) = ws(input)?;
        if let Ok((rest, _)) = raw_tag(")").parse(rest) {
            return Ok((rest, items));
        }
        let (rest, item) = spec(full, rest)?;
        let (rest, _) = stmt_end(rest)?;
        items.push(item);
        input = rest;
    }
}

fn value_spec<'a>(full: &'a str, input: &'a str) -> PResult<'a, ValueSpec> {
    let (input, _) = ws(input)?;
    let start = position(full, input);
    let (input, names) = separated_list1(symbol(","), |i| identifier(full, i)).parse(input)?;

    let (input, _) = hws(input)?;
    let ty_follows = !(input.starts_with('=') || at_line_end(input) || input.starts_with(')'));
    let (input, ty) = if ty_follows {
        let (input, ty) = type_expr_here(full, input)?;
        (input, Some(ty))
    } else {
        (input, None)
    };

    let (input, values) = match hsymbol("=").parse(input) {
        Ok((rest, _)) => expression_list(full, rest)?,
        Err(_) => (input, Vec::new()),
    };

    Ok((
        input,
        ValueSpec {
            names,
            ty,
            values,
            iota: 0,
            span: Span::new(start, position(full, input)),
        },
    ))
}

fn type_spec<'a>(full: &'a str, input: &'a str) -> PResult<'a, TypeSpec> {
    let (input, _) = ws(input)?;
    let start = position(full, input);
    let (input, name) = identifier(full, input)?;
    let (input, alias) = opt(hsymbol("=")).parse(input)?;
    let (input, ty) = context("type", |i| type_expr(full, i)).parse(input)?;

    Ok((
        input,
        TypeSpec {
            name,
            alias: alias.is_some(),
            ty,
            span: Span::new(start, position(full, input)),
        },
    ))
}

/// `func [recv] Name(params) results [body]`
pub fn func_decl<'a>(full: &'a str, input: &'a str) -> PResult<'a, FuncDecl> {
    let (input, _) = ws(input)?;
    let start = position(full, input);
    let (input, _) = keyword("func").parse(input)?;

    let (input, recv) = opt(|i| {
        let (i, _) = symbol("(").parse(i)?;
        let (i, entries) = field_entries(full, i)?;
        let (i, _) = symbol(")").parse(i)?;
        Ok((i, group_params(entries)))
    })
    .parse(input)?;

    let (input, name) = context("function name", |i| identifier(full, i)).parse(input)?;
    let (input, sig) = context("function signature", |i| signature(full, i)).parse(input)?;

    let (input, _) = hws(input)?;
    let (input, body) = if input.starts_with('{') {
        let (input, body) = context("function body", |i| block(full, i)).parse(input)?;
        (input, Some(body))
    } else {
        (input, None)
    };

    Ok((
        input,
        FuncDecl {
            recv: recv.and_then(|mut fields| fields.pop()),
            name,
            sig,
            body,
            span: Span::new(start, position(full, input)),
        },
    ))
}

/// Parameter list followed by optional results on the same line
pub fn signature<'a>(full: &'a str, input: &'a str) -> PResult<'a, FuncSig> {
    let (input, _) = ws(input)?;
    let start = position(full, input);
    let (input, _) = raw_tag("(").parse(input)?;
    let (input, params) = field_entries(full, input)?;
    let (input, _) = symbol(")").parse(input)?;

    let (input, _) = hws(input)?;
    let ends_line = input.is_empty()
        || input.starts_with(['\n', ';', '{', '}'])
        || input.starts_with("//")
        || input.starts_with("/*");
    let (input, results) = if ends_line {
        (input, Vec::new())
    } else if input.starts_with('(') {
        let (input, _) = raw_tag("(").parse(input)?;
        let (input, results) = field_entries(full, input)?;
        let (input, _) = symbol(")").parse(input)?;
        (input, group_params(results))
    } else {
        match type_expr_here(full, input) {
            Ok((rest, ty)) => {
                let span = ty.span;
                (
                    rest,
                    vec![Field {
                        names: Vec::new(),
                        ty,
                        tag: None,
                        span,
                    }],
                )
            }
            Err(_) => (input, Vec::new()),
        }
    };

    Ok((
        input,
        FuncSig {
            params: group_params(params),
            results,
            span: Span::new(start, position(full, input)),
        },
    ))
}

// =============================================================================
// Lexical helpers
// =============================================================================

/// Get current position in the original input
pub fn position(full: &str, current: &str) -> usize {
    full.len() - current.len()
}

/// Skip whitespace and comments, newlines included
pub fn ws(input: &str) -> PResult<'_, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), line_comment),
            value((), block_comment),
        ))),
    )
    .parse(input)
}

/// Skip blanks and single-line block comments without crossing a newline
pub fn hws(input: &str) -> PResult<'_, ()> {
    value(
        (),
        many0(alt((
            value((), take_while1(|c: char| c == ' ' || c == '\t' || c == '\r')),
            value(
                (),
                nom::combinator::verify(block_comment, |c: &str| !c.contains('\n')),
            ),
        ))),
    )
    .parse(input)
}

fn line_comment(input: &str) -> PResult<'_, &str> {
    recognize((tag("//"), take_while(|c: char| c != '\n'))).parse(input)
}

fn block_comment(input: &str) -> PResult<'_, &str> {
    recognize((tag("/*"), take_until("*/"), tag("*/"))).parse(input)
}

/// True when nothing but a line end, `;` or comment follows on this line
pub fn at_line_end(input: &str) -> bool {
    input.is_empty()
        || input.starts_with('\n')
        || input.starts_with(';')
        || input.starts_with("//")
        || input.starts_with('}')
}

/// Statement terminator: `;`, a newline, a line comment, or a closing brace/paren
pub fn stmt_end(input: &str) -> PResult<'_, ()> {
    let (input, _) = hws(input)?;
    if input.is_empty() || input.starts_with('}') || input.starts_with(')') {
        return Ok((input, ()));
    }
    if let Some(rest) = input.strip_prefix(';') {
        return Ok((rest, ()));
    }
    if let Some(rest) = input.strip_prefix('\n') {
        return Ok((rest, ()));
    }
    if input.starts_with("//") {
        let (rest, _) = line_comment(input)?;
        return Ok((rest, ()));
    }
    if input.starts_with("/*") {
        let (rest, comment) = block_comment(input)?;
        if comment.contains('\n') {
            return Ok((rest, ()));
        }
    }
    Err(nom::Err::Error(ContextualError::with_message(
        input,
        "expected end of statement",
    )))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Reserved words of the language
pub fn is_keyword(s: &str) -> bool {
    matches!(
        s,
        "break"
            | "case"
            | "chan"
            | "const"
            | "continue"
            | "default"
            | "defer"
            | "else"
            | "fallthrough"
            | "for"
            | "func"
            | "go"
            | "goto"
            | "if"
            | "import"
            | "interface"
            | "map"
            | "package"
            | "range"
            | "return"
            | "select"
            | "struct"
            | "switch"
            | "type"
            | "var"
    )
}

/// Keyword after optional whitespace, not followed by an identifier character
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (input, _) = ws(input)?;
        let (input, word) = tag(kw).parse(input)?;
        let (input, _) = not(peek(satisfy(is_ident_char))).parse(input)?;
        Ok((input, word))
    }
}

/// Identifier after optional whitespace
pub fn identifier<'a>(full: &'a str, input: &'a str) -> PResult<'a, Ident> {
    let (input, _) = ws(input)?;
    let start = position(full, input);
    let (rest, name) = nom::combinator::verify(
        recognize((
            satisfy(|c: char| c.is_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        |s: &str| !is_keyword(s),
    )
    .parse(input)?;
    Ok((rest, Ident::new(name, Span::new(start, position(full, rest)))))
}

/// Literal tag without skipping whitespace
pub fn raw_tag<'a>(t: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| tag(t).parse(input)
}

/// Symbol after any whitespace
pub fn symbol<'a>(sym: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (input, _) = ws(input)?;
        tag(sym).parse(input)
    }
}

/// Symbol on the current line
pub fn hsymbol<'a>(sym: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (input, _) = hws(input)?;
        tag(sym).parse(input)
    }
}

/// Single character on the current line
pub fn hchar<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    move |input| {
        let (input, _) = hws(input)?;
        char(c).parse(input)
    }
}

/// Strip quotes from a string literal and resolve simple escapes
pub fn unquote(literal: &str) -> String {
    if let Some(raw) = literal.strip_prefix('`') {
        return raw.strip_suffix('`').unwrap_or(raw).to_string();
    }

    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_and_hws() {
        assert_eq!(ws("  // c\n\t/* x */ a"), Ok(("a", ())));
        assert_eq!(hws("  /* x */ a"), Ok(("a", ())));
        assert_eq!(hws(" \n a"), Ok(("\n a", ())));
    }

    #[test]
    fn test_keyword_boundaries() {
        assert!(keyword("go").parse(" go f()").is_ok());
        assert!(keyword("go").parse("goto L").is_err());
        assert!(keyword("func").parse("function").is_err());
    }

    #[test]
    fn test_identifier_rejects_keywords() {
        let src = "  range";
        assert!(identifier(src, src).is_err());
        let src = "  _res2 :=";
        let (rest, ident) = identifier(src, src).unwrap();
        assert_eq!(ident.name, "_res2");
        assert_eq!(ident.span, Span::new(2, 7));
        assert_eq!(rest, " :=");
    }

    #[test]
    fn test_stmt_end() {
        assert_eq!(stmt_end("  ; x"), Ok((" x", ())));
        assert_eq!(stmt_end(" // trailing\nx"), Ok(("\nx", ())));
        assert_eq!(stmt_end(" }"), Ok(("}", ())));
        assert!(stmt_end(" x").is_err());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"net/http\""), "net/http");
        assert_eq!(unquote("`a\\n`"), "a\\n");
        assert_eq!(unquote("\"a\\tb\""), "a\tb");
    }
}

//! Declarator and abstract-declarator parsing.
//!
//! A declarator is parsed as `pointer* core suffix*`. Pointer prefixes
//! and trailing array/function suffixes fold around the base type, and a
//! parenthesized sub-declarator is parsed against a placeholder base and
//! grafted afterwards with the type arena's `combine`, which is what
//! makes `int (*a[10])(char)` come out as "array of pointers to function
//! returning int" rather than the parse order.

use crate::diagnostic::{Diag, ParseError};
use crate::lexer::TokenKind;
use crate::types::{ArrayKind, FuncVariety, Param, Qualifiers, Type};
use log::trace;
use symbol_table::GlobalSymbol as Symbol;
use thin_vec::ThinVec;

use super::declarations::{self, Storage};
use super::Parser;

/// What kind of declarator the grammar position expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclaratorKind {
    /// Ordinary declaration: an identifier is required.
    Normal,
    /// Type name position (casts, `sizeof`): no identifier.
    Abstract,
    /// Function parameter: either is accepted.
    Param,
}

/// The result of parsing one declarator.
#[derive(Debug, Clone)]
pub(crate) struct Declarator {
    pub name: Option<Symbol>,
    /// Token index of the identifier; 0 for abstract declarators.
    pub name_tok: u32,
    pub ty: Type,
    /// The outermost derived constructor is a function written with a
    /// parameter list (used to recognize function definitions; a typedef
    /// that resolves to a function type does not set this).
    pub func_declarator: bool,
    /// The parameter list was a K&R identifier list.
    pub old_style: bool,
}

/// One trailing constructor, recorded in parse order and folded
/// right-to-left around the base type.
enum Suffix {
    Array {
        kind: ArrayKind,
        qualifiers: Qualifiers,
        tok: u32,
    },
    Func {
        params: ThinVec<Param>,
        variety: FuncVariety,
        old_style: bool,
        tok: u32,
    },
}

pub(crate) fn parse_declarator(
    parser: &mut Parser,
    base: Type,
    kind: DeclaratorKind,
) -> Result<Declarator, ParseError> {
    trace!("parse_declarator at {}", parser.tok_i);
    let pointers = parse_pointer_prefixes(parser)?;

    // apply pointer prefixes: the leftmost `*` sits closest to the base
    let mut ty = base;
    for qualifiers in &pointers {
        ty = parser.ast.types.pointer_to(ty);
        ty.qualifiers = *qualifiers;
    }

    if parser.is_token(TokenKind::LeftParen) && !starts_param_list(parser) {
        // parenthesized sub-declarator: parse it against a placeholder,
        // then graft the trailing suffixes into its innermost slot
        parser.expect(TokenKind::LeftParen)?;
        let mut inner = parse_declarator(parser, Type::void(), kind)?;
        parser.expect(TokenKind::RightParen)?;

        let combine_tok = parser.tok_i as u32;
        let mut saw_func = false;
        let mut old_style = false;
        let outer = parse_suffixes(parser, ty, kind, &mut saw_func, &mut old_style)?;

        let span = parser.token_span(combine_tok);
        inner.ty = parser.ast.types.combine(inner.ty, outer, span, parser.diag);
        inner.func_declarator = inner.ty.is_func() && (saw_func || inner.func_declarator);
        inner.old_style |= old_style;
        return Ok(inner);
    }

    let (name, name_tok) = match kind {
        DeclaratorKind::Normal => {
            let (symbol, tok) = parser.expect_name()?;
            (Some(symbol), tok)
        }
        DeclaratorKind::Abstract => (None, 0),
        DeclaratorKind::Param => match parser.accept_name() {
            Some((symbol, tok)) => (Some(symbol), tok),
            None => (None, 0),
        },
    };

    let mut saw_func = false;
    let mut old_style = false;
    let ty = parse_suffixes(parser, ty, kind, &mut saw_func, &mut old_style)?;

    Ok(Declarator {
        name,
        name_tok,
        ty,
        func_declarator: ty.is_func() && saw_func,
        old_style,
    })
}

/// Whether a `(` at the cursor opens a parameter list rather than a
/// parenthesized sub-declarator: the next token is a declaration
/// specifier or `)`.
fn starts_param_list(parser: &Parser) -> bool {
    match parser.peek_token(0) {
        Some(token) => match token.kind {
            TokenKind::RightParen => true,
            TokenKind::Identifier(symbol) => parser.is_type_name(symbol),
            kind => kind.is_declaration_start(false),
        },
        None => false,
    }
}

fn parse_pointer_prefixes(parser: &mut Parser) -> Result<Vec<Qualifiers>, ParseError> {
    let mut pointers = Vec::new();
    while parser.accept(TokenKind::Star).is_some() {
        pointers.push(parse_qualifier_list(parser));
    }
    Ok(pointers)
}

/// Parse a (possibly empty) run of type qualifiers, warning on repeats.
pub(crate) fn parse_qualifier_list(parser: &mut Parser) -> Qualifiers {
    let mut qualifiers = Qualifiers::empty();
    while let Some(token) = parser.try_current_token() {
        let (flag, word) = match token.kind {
            TokenKind::Const => (Qualifiers::CONST, "const"),
            TokenKind::Volatile => (Qualifiers::VOLATILE, "volatile"),
            TokenKind::Restrict => (Qualifiers::RESTRICT, "restrict"),
            TokenKind::Atomic => (Qualifiers::ATOMIC, "_Atomic"),
            _ => break,
        };
        if qualifiers.contains(flag) {
            parser.diag.report(Diag::DuplicateQualifier(word), token.span);
        }
        qualifiers.insert(flag);
        parser.advance();
    }
    qualifiers
}

fn parse_suffixes(
    parser: &mut Parser,
    base: Type,
    kind: DeclaratorKind,
    saw_func: &mut bool,
    old_style: &mut bool,
) -> Result<Type, ParseError> {
    let mut suffixes = Vec::new();

    loop {
        if parser.accept(TokenKind::LeftBracket).is_some() {
            let tok = (parser.tok_i - 1) as u32;
            let (array_kind, qualifiers) = parse_array_bound(parser, kind)?;
            parser.expect(TokenKind::RightBracket)?;
            suffixes.push(Suffix::Array {
                kind: array_kind,
                qualifiers,
                tok,
            });
        } else if parser.is_token(TokenKind::LeftParen) {
            let tok = parser.tok_i as u32;
            parser.advance();
            let (params, variety, is_old_style) = parse_function_params(parser)?;
            parser.expect(TokenKind::RightParen)?;
            suffixes.push(Suffix::Func {
                params,
                variety,
                old_style: is_old_style,
                tok,
            });
        } else {
            break;
        }
    }

    if let Some(Suffix::Func { old_style: os, .. }) = suffixes.first() {
        *old_style = *os;
    }
    if matches!(suffixes.first(), Some(Suffix::Func { .. })) {
        *saw_func = true;
    }

    // fold right-to-left: the leftmost suffix is the outermost constructor
    let mut ty = base;
    for suffix in suffixes.into_iter().rev() {
        ty = match suffix {
            Suffix::Array {
                kind: array_kind,
                qualifiers,
                tok,
            } => {
                let span = parser.token_span(tok);
                let mut array_ty = parser
                    .ast
                    .types
                    .array_of(ty, array_kind, span, parser.diag);
                array_ty.qualifiers = qualifiers;
                array_ty
            }
            Suffix::Func {
                params,
                variety,
                tok,
                ..
            } => {
                let span = parser.token_span(tok);
                parser
                    .ast
                    .types
                    .func_of(ty, params, variety, span, parser.diag)
            }
        };
    }
    Ok(ty)
}

/// Parse the inside of `[...]`: optional qualifiers, optional `static`,
/// then a length expression, `*`, or nothing.
fn parse_array_bound(
    parser: &mut Parser,
    kind: DeclaratorKind,
) -> Result<(ArrayKind, Qualifiers), ParseError> {
    let mut static_tok: Option<u32> = None;
    let mut qualifiers = Qualifiers::empty();

    // `static` and qualifiers may come in either order
    loop {
        if parser.is_token(TokenKind::Static) {
            let tok = parser.tok_i as u32;
            parser.advance();
            if static_tok.is_some() {
                parser
                    .diag
                    .report(Diag::DuplicateSpecifier("static"), parser.token_span(tok));
            }
            static_tok = Some(tok);
            continue;
        }
        let quals = parse_qualifier_list(parser);
        if quals.is_empty() {
            break;
        }
        qualifiers |= quals;
    }

    let in_param = kind == DeclaratorKind::Param || parser.in_params;
    if let Some(tok) = static_tok
        && !in_param
    {
        parser.diag.report(Diag::StaticOutsideParam, parser.token_span(tok));
    }
    if !qualifiers.is_empty() && !in_param {
        parser.diag.report(
            Diag::QualifierNonOutermostArray,
            parser.previous_token_span(),
        );
    }

    // `[*]`: a star immediately followed by the closing bracket
    if parser.is_token(TokenKind::Star)
        && parser.peek_token(0).is_some_and(|t| t.kind == TokenKind::RightBracket)
    {
        let span = parser.current_token_span();
        parser.advance();
        if !in_param {
            parser.diag.report(Diag::StarBoundOutsideParam, span);
        }
        return Ok((ArrayKind::UnspecifiedVla, qualifiers));
    }

    if parser.is_token(TokenKind::RightBracket) {
        if let Some(tok) = static_tok {
            // `static` requires a length
            parser
                .diag
                .report(Diag::ExpectedConstExpr, parser.token_span(tok));
        }
        return Ok((ArrayKind::Incomplete, qualifiers));
    }

    let bound = parser.parse_expr_assignment()?;
    let array_kind = match bound.value {
        Some(value) => {
            let len = if value < 0 {
                parser.diag.report(
                    Diag::NegativeArraySize,
                    parser.token_span(parser.ast.get_node(bound.node).tok),
                );
                0
            } else {
                value as u64
            };
            if static_tok.is_some() {
                ArrayKind::Static(len)
            } else {
                ArrayKind::Fixed(len)
            }
        }
        None => {
            if !in_param && !parser.in_function {
                parser.diag.report(
                    Diag::VlaFileScope,
                    parser.token_span(parser.ast.get_node(bound.node).tok),
                );
            }
            ArrayKind::Variable(bound.node)
        }
    };
    Ok((array_kind, qualifiers))
}

/// Parse a parameter list after `(`. Returns the parameters, the
/// function variety, and whether this was a K&R identifier list.
fn parse_function_params(
    parser: &mut Parser,
) -> Result<(ThinVec<Param>, FuncVariety, bool), ParseError> {
    let mut params = ThinVec::new();

    // `()` declares a function with unspecified arguments
    if parser.is_token(TokenKind::RightParen) {
        return Ok((params, FuncVariety::VarArgs, false));
    }

    // K&R identifier list: the first token is an identifier that does
    // not resolve to a typedef name
    if let Some(token) = parser.try_current_token()
        && let TokenKind::Identifier(symbol) = token.kind
        && !parser.is_type_name(symbol)
    {
        loop {
            let (name, name_tok) = parser.expect_name()?;
            params.push(Param {
                name: Some(name),
                name_tok,
                ty: Type::int(),
                register: false,
            });
            if parser.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        return Ok((params, FuncVariety::OldStyle, true));
    }

    let was_in_params = parser.in_params;
    parser.in_params = true;
    let result = parse_prototype_params(parser, &mut params);
    parser.in_params = was_in_params;
    let variety = result?;
    Ok((params, variety, false))
}

fn parse_prototype_params(
    parser: &mut Parser,
    params: &mut ThinVec<Param>,
) -> Result<FuncVariety, ParseError> {
    let mut variety = FuncVariety::Fixed;

    loop {
        if parser.is_token(TokenKind::Ellipsis) {
            let span = parser.current_token_span();
            parser.advance();
            if params.is_empty() {
                parser.diag.report(Diag::EllipsisFirstParam, span);
            }
            variety = FuncVariety::VarArgs;
            break;
        }

        let spec = declarations::parse_decl_specifiers(parser)?;
        let register = matches!(spec.storage, Storage::Register(_));
        match spec.storage {
            Storage::None | Storage::Register(_) => {}
            storage => {
                parser
                    .diag
                    .report(Diag::ParamStorageClass, parser.token_span(storage.tok()));
            }
        }

        let declarator = parse_declarator(parser, spec.ty, DeclaratorKind::Param)?;
        let mut param_ty = declarator.ty;

        // `(void)` as the only, unnamed, unqualified parameter means
        // "no parameters"
        if param_ty.is_void() {
            if !param_ty.qualifiers.is_empty() {
                parser
                    .diag
                    .report(Diag::QualifiedVoidParam, parser.previous_token_span());
            }
            if declarator.name.is_some() || !params.is_empty() || !parser.is_token(TokenKind::RightParen)
            {
                parser
                    .diag
                    .report(Diag::VoidParamNotAlone, parser.previous_token_span());
            }
            if declarator.name.is_none() && params.is_empty() {
                // zero-parameter prototype; skip a stray comma tail if the
                // void was misplaced
                if parser.is_token(TokenKind::RightParen) {
                    break;
                }
            }
            if parser.accept(TokenKind::Comma).is_none() {
                break;
            }
            continue;
        }

        param_ty = adjust_param_type(parser, param_ty);

        params.push(Param {
            name: declarator.name,
            name_tok: declarator.name_tok,
            ty: param_ty,
            register,
        });

        if parser.accept(TokenKind::Comma).is_none() {
            break;
        }
    }

    Ok(variety)
}

/// Parameter type adjustment: functions become pointers to functions;
/// plain/incomplete/variable-length arrays become pointers to their
/// element (bracket qualifiers migrate to the pointer). `static` arrays
/// and `[*]` keep their specifier, which already encodes the adjusted
/// parameter semantics and folds to pointer width.
fn adjust_param_type(parser: &mut Parser, ty: Type) -> Type {
    use crate::types::Specifier;
    match ty.specifier {
        _ if ty.is_func() => parser.ast.types.pointer_to(ty),
        Specifier::Array(_) | Specifier::IncompleteArray(_) | Specifier::VariableLenArray(_) => {
            let elem = parser
                .ast
                .types
                .elem_type(ty)
                .unwrap_or(Type::int());
            let mut ptr = parser.ast.types.pointer_to(elem);
            ptr.qualifiers = ty.qualifiers;
            ptr
        }
        _ => ty,
    }
}

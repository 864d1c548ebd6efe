//! Struct, union, and enum specifier parsing.
//!
//! Tags resolve through the scope stack by identity: a forward
//! declaration and a later definition share one arena descriptor, and
//! completing the descriptor is observed by every type that referenced
//! it earlier (this is what makes `struct node { struct node *next; }`
//! work).

use crate::diagnostic::{Diag, ParseError};
use crate::lexer::TokenKind;
use crate::parser::scope::{Scope, TagKind};
use crate::types::{Enumerator, Field, Specifier, Type};
use log::trace;
use thin_vec::ThinVec;

use super::declarations;
use super::declarator::{self, DeclaratorKind};
use super::Parser;

/// Parse a struct/union specifier; the `struct`/`union` keyword has
/// already been consumed.
pub(crate) fn parse_record_specifier(
    parser: &mut Parser,
    is_union: bool,
) -> Result<Type, ParseError> {
    let tag_kind = if is_union { TagKind::Union } else { TagKind::Struct };
    let tag = parser.accept_name();

    let has_body = parser.is_token(TokenKind::LeftBrace);
    if tag.is_none() && !has_body {
        let token = parser.current_token()?;
        return Err(ParseError::UnexpectedToken {
            expected: "identifier or '{'".to_string(),
            found: token.kind,
            span: token.span,
        });
    }

    // resolve the tag to an existing descriptor where identity must be
    // preserved, otherwise declare a fresh one
    let existing = tag.and_then(|(name, _)| match parser.scopes.find_tag(tag_kind, name) {
        Some(Scope::Struct { record, .. }) | Some(Scope::Union { record, .. }) => Some(*record),
        _ => None,
    });

    let record = match existing {
        // a complete record with a new body is a shadowing definition
        Some(r) if !(has_body && parser.ast.types.get_record(r).is_complete()) => r,
        _ => {
            let r = parser
                .ast
                .types
                .declare_record(tag.map(|(name, _)| name), is_union);
            if let Some((name, _)) = tag {
                let entry = if is_union {
                    Scope::Union { name, record: r }
                } else {
                    Scope::Struct { name, record: r }
                };
                parser.scopes.push(entry);
            }
            r
        }
    };

    if has_body {
        parser.expect(TokenKind::LeftBrace)?;
        let fields = parse_field_list(parser)?;
        parser.expect(TokenKind::RightBrace)?;
        trace!("completing record with {} fields", fields.len());
        parser.ast.types.complete_record(record, fields, parser.ctx);
    }

    let specifier = if is_union {
        Specifier::Union(record)
    } else {
        Specifier::Struct(record)
    };
    Ok(Type::new(specifier))
}

fn parse_field_list(parser: &mut Parser) -> Result<ThinVec<Field>, ParseError> {
    let mut fields = ThinVec::new();

    while !parser.is_token(TokenKind::RightBrace) && !parser.at_eof() {
        if let Some(token) = parser.accept(TokenKind::StaticAssert) {
            declarations::parse_static_assert(parser, token)?;
            continue;
        }

        let spec = declarations::parse_decl_specifiers(parser)?;
        if let Some(tok) = spec.storage.tok_opt() {
            parser
                .diag
                .report(Diag::BadStorageContext, parser.token_span(tok));
        }

        // `struct { ... };` with no declarators: an anonymous member if
        // the type is a record, otherwise the declaration is empty
        if parser.is_token(TokenKind::Semicolon) {
            if spec.ty.is_enum_or_record() {
                fields.push(Field {
                    name: None,
                    name_tok: 0,
                    ty: spec.ty,
                    bit_width: None,
                });
            } else {
                parser
                    .diag
                    .report(Diag::EmptyDeclaration, parser.current_token_span());
            }
            parser.expect(TokenKind::Semicolon)?;
            continue;
        }

        loop {
            let field = parse_field_declarator(parser, spec.ty)?;
            fields.push(field);
            if parser.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        parser.expect(TokenKind::Semicolon)?;
    }

    Ok(fields)
}

fn parse_field_declarator(parser: &mut Parser, base: Type) -> Result<Field, ParseError> {
    // anonymous bit-field: `: width` with no declarator
    if parser.is_token(TokenKind::Colon) {
        let width = parse_bit_field_width(parser)?;
        return Ok(Field {
            name: None,
            name_tok: 0,
            ty: base,
            bit_width: width,
        });
    }

    let declarator = declarator::parse_declarator(parser, base, DeclaratorKind::Normal)?;
    let bit_width = if parser.is_token(TokenKind::Colon) {
        parse_bit_field_width(parser)?
    } else {
        None
    };

    Ok(Field {
        name: declarator.name,
        name_tok: declarator.name_tok,
        ty: declarator.ty,
        bit_width,
    })
}

fn parse_bit_field_width(parser: &mut Parser) -> Result<Option<u32>, ParseError> {
    parser.expect(TokenKind::Colon)?;
    let result = parser.parse_const_expr()?;
    match result.value {
        Some(value) if (0..=64).contains(&value) => Ok(Some(value as u32)),
        Some(_) => {
            parser.diag.report(
                Diag::BadBitFieldWidth,
                parser.token_span(parser.ast.get_node(result.node).tok),
            );
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Parse an enum specifier; the `enum` keyword has been consumed. The
/// tag integer type is `int`.
pub(crate) fn parse_enum_specifier(parser: &mut Parser) -> Result<Type, ParseError> {
    let tag = parser.accept_name();

    let has_body = parser.is_token(TokenKind::LeftBrace);
    if tag.is_none() && !has_body {
        let token = parser.current_token()?;
        return Err(ParseError::UnexpectedToken {
            expected: "identifier or '{'".to_string(),
            found: token.kind,
            span: token.span,
        });
    }

    let existing = tag.and_then(|(name, _)| match parser.scopes.find_tag(TagKind::Enum, name) {
        Some(Scope::Enum { enum_ref, .. }) => Some(*enum_ref),
        _ => None,
    });

    let enum_ref = match existing {
        Some(r) if !(has_body && parser.ast.types.get_enum(r).is_complete()) => r,
        _ => {
            let r = parser
                .ast
                .types
                .declare_enum(tag.map(|(name, _)| name), Type::int());
            if let Some((name, _)) = tag {
                parser.scopes.push(Scope::Enum { name, enum_ref: r });
            }
            r
        }
    };

    if has_body {
        parser.expect(TokenKind::LeftBrace)?;
        let enumerators = parse_enumerator_list(parser)?;
        parser.expect(TokenKind::RightBrace)?;
        parser.ast.types.complete_enum(enum_ref, enumerators);
    }

    Ok(Type::new(Specifier::Enum(enum_ref)))
}

fn parse_enumerator_list(parser: &mut Parser) -> Result<ThinVec<Enumerator>, ParseError> {
    let mut enumerators = ThinVec::new();
    let mut next_value: i64 = 0;

    loop {
        let (name, name_tok) = parser.expect_name()?;

        let value = if parser.accept(TokenKind::Assign).is_some() {
            let result = parser.parse_const_expr()?;
            result.value.unwrap_or(next_value)
        } else {
            next_value
        };
        next_value = value.wrapping_add(1);

        enumerators.push(Enumerator {
            name,
            name_tok,
            ty: Type::int(),
            value: value as u64,
        });
        parser.scopes.push(Scope::Enumerator {
            name,
            ty: Type::int(),
            value,
        });

        if parser.accept(TokenKind::Comma).is_none() {
            break;
        }
        // trailing comma
        if parser.is_token(TokenKind::RightBrace) {
            break;
        }
    }

    Ok(enumerators)
}

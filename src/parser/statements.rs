//! Compound-statement parsing for function bodies.
//!
//! Enough of the statement grammar to parse real function bodies: block
//! scoping, declarations vs statements, control flow with loop/switch
//! sentinels on the scope stack, and per-statement error recovery.

use crate::ast::{Node, NodeKind, NodeRef};
use crate::diagnostic::{Diag, ParseError};
use crate::lexer::TokenKind;
use crate::parser::scope::Scope;
use crate::types::Type;

use super::{declarations, Parser};

/// Parse `{ ... }`. Declarations and statements inside recover
/// independently: a failed statement resynchronizes at the next
/// statement boundary instead of abandoning the block.
pub(crate) fn parse_compound_statement(parser: &mut Parser) -> Result<NodeRef, ParseError> {
    parser.expect(TokenKind::LeftBrace)?;
    let lbrace_tok = (parser.tok_i - 1) as u32;

    let scope_mark = parser.scopes.len();
    let mut stmts = Vec::new();

    while !parser.is_token(TokenKind::RightBrace) && !parser.at_eof() {
        if let Some(token) = parser.accept(TokenKind::StaticAssert) {
            match declarations::parse_static_assert(parser, token) {
                Ok(node) => stmts.push(node),
                Err(error) => {
                    parser.diag.report_parse_error(&error);
                    parser.next_stmt();
                }
            }
            continue;
        }

        if parser.starts_declaration() {
            match declarations::parse_declaration(parser) {
                Ok(nodes) => stmts.extend(nodes),
                Err(error) => {
                    parser.diag.report_parse_error(&error);
                    parser.next_stmt();
                }
            }
            continue;
        }

        match parse_statement(parser) {
            Ok(node) => stmts.push(node),
            Err(error) => {
                parser.diag.report_parse_error(&error);
                parser.next_stmt();
            }
        }
    }

    parser.scopes.truncate(scope_mark);
    parser.expect(TokenKind::RightBrace)?;

    Ok(parser.ast.push_node(Node::new(
        NodeKind::CompoundStmt(stmts),
        Type::void(),
        lbrace_tok,
    )))
}

fn parse_statement(parser: &mut Parser) -> Result<NodeRef, ParseError> {
    let token = parser.current_token()?;
    let tok_i = parser.tok_i as u32;

    match token.kind {
        TokenKind::LeftBrace => parse_compound_statement(parser),

        TokenKind::Semicolon => {
            parser.advance();
            Ok(parser
                .ast
                .push_node(Node::new(NodeKind::NullStmt, Type::void(), tok_i)))
        }

        TokenKind::If => {
            parser.advance();
            parser.expect(TokenKind::LeftParen)?;
            let cond = parser.parse_expr_min()?;
            parser.expect(TokenKind::RightParen)?;
            let then_stmt = parse_statement(parser)?;
            let else_stmt = if parser.accept(TokenKind::Else).is_some() {
                Some(parse_statement(parser)?)
            } else {
                None
            };
            Ok(parser.ast.push_node(Node::new(
                NodeKind::IfStmt {
                    cond: cond.node,
                    then_stmt,
                    else_stmt,
                },
                Type::void(),
                tok_i,
            )))
        }

        TokenKind::While => {
            parser.advance();
            parser.expect(TokenKind::LeftParen)?;
            let cond = parser.parse_expr_min()?;
            parser.expect(TokenKind::RightParen)?;

            let mark = parser.scopes.len();
            parser.scopes.push(Scope::LoopSentinel);
            let body = parse_statement(parser);
            parser.scopes.truncate(mark);
            let body = body?;

            Ok(parser.ast.push_node(Node::new(
                NodeKind::WhileStmt {
                    cond: cond.node,
                    body,
                },
                Type::void(),
                tok_i,
            )))
        }

        TokenKind::Switch => {
            parser.advance();
            parser.expect(TokenKind::LeftParen)?;
            let cond = parser.parse_expr_min()?;
            parser.expect(TokenKind::RightParen)?;

            let mark = parser.scopes.len();
            parser.scopes.push(Scope::SwitchSentinel);
            let body = parse_statement(parser);
            parser.scopes.truncate(mark);
            let body = body?;

            Ok(parser.ast.push_node(Node::new(
                NodeKind::SwitchStmt {
                    cond: cond.node,
                    body,
                },
                Type::void(),
                tok_i,
            )))
        }

        TokenKind::Case => {
            parser.advance();
            if !parser.scopes.in_switch() {
                parser.diag.report(Diag::CaseOutsideSwitch, token.span);
            }
            let label = parser.parse_const_expr()?;
            parser.expect(TokenKind::Colon)?;
            let stmt = parse_statement(parser)?;
            Ok(parser.ast.push_node(Node::new(
                NodeKind::CaseStmt {
                    value: label.value.unwrap_or(0),
                    stmt,
                },
                Type::void(),
                tok_i,
            )))
        }

        TokenKind::Default => {
            parser.advance();
            if !parser.scopes.in_switch() {
                parser.diag.report(Diag::DefaultOutsideSwitch, token.span);
            }
            parser.expect(TokenKind::Colon)?;
            let stmt = parse_statement(parser)?;
            Ok(parser
                .ast
                .push_node(Node::new(NodeKind::DefaultStmt(stmt), Type::void(), tok_i)))
        }

        TokenKind::Return => {
            parser.advance();
            let value = if parser.is_token(TokenKind::Semicolon) {
                None
            } else {
                Some(parser.parse_expr_min()?.node)
            };
            parser.expect(TokenKind::Semicolon)?;
            Ok(parser
                .ast
                .push_node(Node::new(NodeKind::ReturnStmt(value), Type::void(), tok_i)))
        }

        TokenKind::Break => {
            parser.advance();
            if !parser.scopes.in_loop_or_switch() {
                parser.diag.report(Diag::BreakOutsideLoopOrSwitch, token.span);
            }
            parser.expect(TokenKind::Semicolon)?;
            Ok(parser
                .ast
                .push_node(Node::new(NodeKind::BreakStmt, Type::void(), tok_i)))
        }

        TokenKind::Continue => {
            parser.advance();
            if !parser.scopes.in_loop() {
                parser.diag.report(Diag::ContinueOutsideLoop, token.span);
            }
            parser.expect(TokenKind::Semicolon)?;
            Ok(parser
                .ast
                .push_node(Node::new(NodeKind::ContinueStmt, Type::void(), tok_i)))
        }

        _ => {
            let expr = parser.parse_expr_min()?;
            parser.expect(TokenKind::Semicolon)?;
            Ok(parser
                .ast
                .push_node(Node::new(NodeKind::ExprStmt(expr.node), Type::void(), tok_i)))
        }
    }
}

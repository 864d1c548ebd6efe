//! Parser entry points, cursor state, and shared helpers.
//!
//! The grammar itself lives in the submodules: `declarations` owns the
//! top-level declaration rule, `declarator` the declarator grammar,
//! `type_builder` the specifier accumulator, `records` the
//! struct/union/enum specifiers, `expressions` the Pratt expression
//! parser, and `statements` the compound-statement parsing used by
//! function bodies.

use crate::ast::Ast;
use crate::context::CompileContext;
use crate::diagnostic::{DiagnosticEngine, ParseError};
use crate::lexer::{Token, TokenKind};
use crate::source_manager::{SourceManager, SourceSpan};
use log::debug;
use symbol_table::GlobalSymbol as Symbol;

pub mod declarations;
pub mod declarator;
pub mod expressions;
pub mod records;
pub mod scope;
pub mod statements;
pub mod type_builder;

use scope::ScopeStack;

/// Recursive-descent parser over an immutable token stream.
///
/// Single-threaded by construction: the parser holds exclusive mutable
/// access to the cursor, the AST (and its type arena), the scope stack,
/// and the diagnostic sink for the duration of a parse.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pub(crate) tok_i: usize,
    pub(crate) ast: &'a mut Ast,
    pub(crate) diag: &'a mut DiagnosticEngine,
    pub(crate) ctx: &'a CompileContext,
    pub(crate) source_manager: &'a SourceManager,
    pub(crate) scopes: ScopeStack,
    /// Force constant evaluation (bit-field widths, enumerator values,
    /// case labels, `_Static_assert`).
    pub(crate) want_const: bool,
    /// Inside a function definition body.
    pub(crate) in_function: bool,
    /// Inside a function parameter list (`static` and `[*]` array bounds
    /// are only legal here).
    pub(crate) in_params: bool,
}

impl<'a> Parser<'a> {
    pub fn new(
        tokens: &'a [Token],
        ast: &'a mut Ast,
        diag: &'a mut DiagnosticEngine,
        ctx: &'a CompileContext,
        source_manager: &'a SourceManager,
    ) -> Self {
        Parser {
            tokens,
            tok_i: 0,
            ast,
            diag,
            ctx,
            source_manager,
            scopes: ScopeStack::new(),
            want_const: false,
            in_function: false,
            in_params: false,
        }
    }

    /// Parse the whole token stream, recovering at declaration
    /// boundaries. Root declarations are appended to the AST.
    pub fn parse_translation_unit(&mut self) {
        while let Some(token) = self.try_current_token() {
            if token.kind == TokenKind::EndOfFile {
                break;
            }
            match declarations::parse_extern_decl(self) {
                Ok(nodes) => {
                    for node in nodes {
                        self.ast.add_root_decl(node);
                    }
                }
                Err(error) => {
                    debug!("declaration aborted: {error}");
                    self.diag.report_parse_error(&error);
                    self.next_extern_decl();
                }
            }
        }
    }

    // === cursor helpers ===

    pub(crate) fn try_current_token(&self) -> Option<Token> {
        self.tokens.get(self.tok_i).copied()
    }

    pub(crate) fn current_token(&self) -> Result<Token, ParseError> {
        self.try_current_token().ok_or_else(|| ParseError::UnexpectedEof {
            span: self.previous_token_span(),
        })
    }

    pub(crate) fn current_token_kind(&self) -> Option<TokenKind> {
        self.try_current_token().map(|t| t.kind)
    }

    pub(crate) fn current_token_span(&self) -> SourceSpan {
        self.try_current_token()
            .map_or_else(SourceSpan::empty, |t| t.span)
    }

    pub(crate) fn previous_token_span(&self) -> SourceSpan {
        match self.tok_i.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.span,
            None => SourceSpan::empty(),
        }
    }

    /// Span of the token at an absolute index.
    pub(crate) fn token_span(&self, tok_i: u32) -> SourceSpan {
        self.tokens
            .get(tok_i as usize)
            .map_or_else(SourceSpan::empty, |t| t.span)
    }

    /// Peek `offset` tokens past the current one (0 = the next token).
    pub(crate) fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.tok_i + 1 + offset)
    }

    pub(crate) fn at_eof(&self) -> bool {
        matches!(self.current_token_kind(), None | Some(TokenKind::EndOfFile))
    }

    pub(crate) fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.tok_i).copied()?;
        self.tok_i += 1;
        Some(token)
    }

    /// Consume the current token if it matches, returning it.
    pub(crate) fn accept(&mut self, accepted: TokenKind) -> Option<Token> {
        if self.current_token_kind() == Some(accepted) {
            self.advance()
        } else {
            None
        }
    }

    /// Require a specific token kind.
    pub(crate) fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        let token = self.current_token()?;
        if token.kind == expected {
            self.advance();
            Ok(token)
        } else {
            Err(ParseError::UnexpectedToken {
                expected: format!("{:?}", expected),
                found: token.kind,
                span: token.span,
            })
        }
    }

    pub(crate) fn matches(&self, kinds: &[TokenKind]) -> bool {
        self.current_token_kind()
            .map(|k| kinds.contains(&k))
            .unwrap_or(false)
    }

    pub(crate) fn is_token(&self, kind: TokenKind) -> bool {
        self.current_token_kind() == Some(kind)
    }

    /// Consume an identifier if one is current.
    pub(crate) fn accept_name(&mut self) -> Option<(Symbol, u32)> {
        if let Some(token) = self.try_current_token()
            && let TokenKind::Identifier(symbol) = token.kind
        {
            let tok_i = self.tok_i as u32;
            self.advance();
            return Some((symbol, tok_i));
        }
        None
    }

    /// Require an identifier.
    pub(crate) fn expect_name(&mut self) -> Result<(Symbol, u32), ParseError> {
        let token = self.current_token()?;
        if let TokenKind::Identifier(symbol) = token.kind {
            let tok_i = self.tok_i as u32;
            self.advance();
            Ok((symbol, tok_i))
        } else {
            Err(ParseError::UnexpectedToken {
                expected: "identifier".to_string(),
                found: token.kind,
                span: token.span,
            })
        }
    }

    // === disambiguation ===

    /// Whether `symbol` currently resolves to a typedef name.
    pub(crate) fn is_type_name(&self, symbol: Symbol) -> bool {
        self.scopes.find_typedef(symbol).is_some()
    }

    /// Whether the current token can begin a declaration.
    pub(crate) fn starts_declaration(&self) -> bool {
        match self.try_current_token() {
            Some(token) => {
                let is_typedef = match token.kind {
                    TokenKind::Identifier(symbol) => self.is_type_name(symbol),
                    _ => false,
                };
                token.kind.is_declaration_start(is_typedef)
            }
            None => false,
        }
    }

    // === error recovery ===

    /// Skip ahead to the next plausible external declaration: a token at
    /// bracket depth zero that either begins a declaration or is an
    /// identifier.
    pub(crate) fn next_extern_decl(&mut self) {
        let mut depth: i32 = 0;
        // unconditionally step past the offending token
        self.advance();
        while let Some(token) = self.try_current_token() {
            match token.kind {
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    depth -= 1;
                    if depth < 0 {
                        depth = 0;
                    }
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::EndOfFile => return,
                TokenKind::Identifier(_) if depth == 0 => return,
                _ if depth == 0 && self.starts_declaration() => return,
                _ => {}
            }
            self.advance();
        }
    }

    /// Statement-level recovery: skip to the next `;` or `}` at depth
    /// zero, consuming the `;`.
    pub(crate) fn next_stmt(&mut self) {
        let mut depth: i32 = 0;
        while let Some(token) = self.try_current_token() {
            match token.kind {
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::EndOfFile => return,
                _ => {}
            }
            self.advance();
        }
    }

    // === expressions (thin wrappers used across submodules) ===

    pub(crate) fn parse_expr_min(&mut self) -> Result<expressions::ExprResult, ParseError> {
        expressions::parse_expression(self, expressions::BindingPower::MIN)
    }

    pub(crate) fn parse_expr_assignment(&mut self) -> Result<expressions::ExprResult, ParseError> {
        expressions::parse_expression(self, expressions::BindingPower::ASSIGNMENT)
    }

    /// Parse an expression in a context that requires a constant;
    /// diagnoses when no compile-time value is available.
    pub(crate) fn parse_const_expr(&mut self) -> Result<expressions::ExprResult, ParseError> {
        let saved = self.want_const;
        self.want_const = true;
        let result = expressions::parse_expression(self, expressions::BindingPower::CONDITIONAL);
        self.want_const = saved;
        let result = result?;
        if result.value.is_none() {
            let span = self.token_span(self.ast.get_node(result.node).tok);
            self.diag.report(crate::diagnostic::Diag::ExpectedConstExpr, span);
        }
        Ok(result)
    }
}

mod tests_parser;

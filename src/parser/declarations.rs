//! The top-level declaration rule.
//!
//! Owns the declaration-specifier state (storage class, `_Thread_local`,
//! function specifiers, qualifiers, and the specifier builder), validates
//! their combinations, drives the declarator parser for each
//! init-declarator, recognizes function definitions, and publishes nodes
//! into the AST.

use crate::ast::{DeclTag, Node, NodeKind, NodeRef};
use crate::diagnostic::{Diag, ParseError};
use crate::lexer::{Token, TokenKind};
use crate::parser::scope::Scope;
use crate::types::{Qualifiers, Specifier, Type};
use log::debug;

use super::declarator::{self, Declarator, DeclaratorKind};
use super::statements;
use super::type_builder::TypeBuilder;
use super::{records, Parser};

/// Storage class as an optional token index, so diagnostics can point at
/// the keyword itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Storage {
    None,
    Typedef(u32),
    Extern(u32),
    Static(u32),
    Auto(u32),
    Register(u32),
}

impl Storage {
    pub(crate) fn tok(&self) -> u32 {
        self.tok_opt().unwrap_or(0)
    }

    pub(crate) fn tok_opt(&self) -> Option<u32> {
        match *self {
            Storage::None => None,
            Storage::Typedef(t)
            | Storage::Extern(t)
            | Storage::Static(t)
            | Storage::Auto(t)
            | Storage::Register(t) => Some(t),
        }
    }

    fn word(&self) -> &'static str {
        match self {
            Storage::None => "",
            Storage::Typedef(_) => "typedef",
            Storage::Extern(_) => "extern",
            Storage::Static(_) => "static",
            Storage::Auto(_) => "auto",
            Storage::Register(_) => "register",
        }
    }
}

/// The parsed declaration-specifier region.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeclSpec {
    pub storage: Storage,
    pub thread_local_tok: Option<u32>,
    pub inline_tok: Option<u32>,
    pub noreturn_tok: Option<u32>,
    pub ty: Type,
}

/// Parse one external declaration: a plain declaration, a function
/// definition, or `_Static_assert`.
pub(crate) fn parse_extern_decl(parser: &mut Parser) -> Result<Vec<NodeRef>, ParseError> {
    if let Some(token) = parser.accept(TokenKind::Semicolon) {
        parser.diag.report(Diag::EmptyDeclaration, token.span);
        return Ok(Vec::new());
    }
    if let Some(token) = parser.accept(TokenKind::StaticAssert) {
        return Ok(vec![parse_static_assert(parser, token)?]);
    }
    parse_declaration(parser)
}

/// Parse `decl-specifiers (init-declarator (',' init-declarator)*)? ';'`
/// or a function definition starting at the current token. Also valid in
/// block scope (the statement parser calls this for declarations).
pub(crate) fn parse_declaration(parser: &mut Parser) -> Result<Vec<NodeRef>, ParseError> {
    debug!(
        "parse_declaration at {} ({:?})",
        parser.tok_i,
        parser.current_token_kind()
    );
    let spec = parse_decl_specifiers(parser)?;

    // no declarators: a record/enum declaration or an empty declaration
    if parser.is_token(TokenKind::Semicolon) {
        let token = parser.current_token()?;
        parser.advance();
        if !spec.ty.is_enum_or_record() {
            parser.diag.report(Diag::EmptyDeclaration, token.span);
        }
        let node = parser.ast.push_node(Node::new(NodeKind::TagDecl, spec.ty, 0));
        return Ok(vec![node]);
    }

    let mut nodes = Vec::new();
    let mut first = true;

    loop {
        let d = declarator::parse_declarator(parser, spec.ty, DeclaratorKind::Normal)?;

        // function definition: the first declarator's outermost derived
        // constructor is a function and a body (or old-style parameter
        // declarations) follows
        if first
            && d.func_declarator
            && (parser.is_token(TokenKind::LeftBrace)
                || (d.old_style && parser.starts_declaration()))
        {
            nodes.push(parse_function_definition(parser, spec, d)?);
            return Ok(nodes);
        }
        first = false;

        let mut storage = spec.storage;
        let init = if parser.accept(TokenKind::Assign).is_some() {
            let assign_span = parser.previous_token_span();
            match storage {
                Storage::Typedef(_) => parser.diag.report(Diag::TypedefInitializer, assign_span),
                Storage::Extern(_) => {
                    // an initialized extern declaration is a definition
                    parser.diag.report(Diag::ExternInitializer, assign_span);
                    storage = Storage::None;
                }
                _ => {}
            }
            if d.ty.is_func() {
                parser.diag.report(Diag::FunctionInitializer, assign_span);
            }
            Some(parse_initializer(parser)?)
        } else {
            None
        };

        let spec_for_tag = DeclSpec { storage, ..spec };
        let tag = validate_decl(parser, &spec_for_tag, &d, false);

        let node = parser.ast.push_node(Node::new(
            NodeKind::Decl {
                tag,
                name: d.name,
                init,
                body: None,
            },
            d.ty,
            d.name_tok,
        ));
        nodes.push(node);
        publish_symbol(parser, &spec_for_tag, &d);

        if parser.accept(TokenKind::Comma).is_none() {
            break;
        }
    }

    parser.expect(TokenKind::Semicolon)?;
    Ok(nodes)
}

/// Push the declared name into the scope stack. Redeclaring a typedef
/// with a different type diagnoses; an identical redeclaration is legal
/// in C11 and stays silent.
fn publish_symbol(parser: &mut Parser, spec: &DeclSpec, d: &Declarator) {
    let Some(name) = d.name else { return };
    let entry = if matches!(spec.storage, Storage::Typedef(_)) {
        if let Some((prev_ty, prev_tok)) = parser.scopes.find_typedef(name)
            && !parser.ast.types.eql(prev_ty, d.ty, true)
        {
            let span = parser.token_span(d.name_tok);
            let notes = vec![crate::diagnostic::DiagNote {
                message: format!("previous definition of '{}' is here", name),
                span: parser.token_span(prev_tok),
            }];
            parser.diag.report_with_notes(Diag::Redefinition(name), span, notes);
        }
        Scope::Typedef {
            name,
            ty: d.ty,
            name_tok: d.name_tok,
        }
    } else {
        Scope::Symbol {
            name,
            ty: d.ty,
            name_tok: d.name_tok,
        }
    };
    parser.scopes.push(entry);
}

/// Parse the declaration-specifier region.
pub(crate) fn parse_decl_specifiers(parser: &mut Parser) -> Result<DeclSpec, ParseError> {
    let start_idx = parser.tok_i;
    let mut storage = Storage::None;
    let mut thread_local_tok: Option<u32> = None;
    let mut inline_tok: Option<u32> = None;
    let mut noreturn_tok: Option<u32> = None;
    let mut qualifiers = Qualifiers::empty();
    let mut alignment: u32 = 0;
    let mut builder = TypeBuilder::new();

    while let Some(token) = parser.try_current_token() {
        let tok_i = parser.tok_i as u32;
        match token.kind {
            TokenKind::Typedef
            | TokenKind::Extern
            | TokenKind::Static
            | TokenKind::Auto
            | TokenKind::Register => {
                let new = match token.kind {
                    TokenKind::Typedef => Storage::Typedef(tok_i),
                    TokenKind::Extern => Storage::Extern(tok_i),
                    TokenKind::Static => Storage::Static(tok_i),
                    TokenKind::Auto => Storage::Auto(tok_i),
                    _ => Storage::Register(tok_i),
                };
                if storage == Storage::None {
                    storage = new;
                } else {
                    parser
                        .diag
                        .report(Diag::MultipleStorageClass(new.word()), token.span);
                }
                parser.advance();
            }

            TokenKind::ThreadLocal => {
                if thread_local_tok.is_some() {
                    parser
                        .diag
                        .report(Diag::DuplicateSpecifier("_Thread_local"), token.span);
                } else {
                    thread_local_tok = Some(tok_i);
                }
                parser.advance();
            }

            // duplicate function specifiers diagnose; the first one wins
            TokenKind::Inline => {
                if inline_tok.is_some() {
                    parser
                        .diag
                        .report(Diag::DuplicateSpecifier("inline"), token.span);
                } else {
                    inline_tok = Some(tok_i);
                }
                parser.advance();
            }
            TokenKind::Noreturn => {
                if noreturn_tok.is_some() {
                    parser
                        .diag
                        .report(Diag::DuplicateSpecifier("_Noreturn"), token.span);
                } else {
                    noreturn_tok = Some(tok_i);
                }
                parser.advance();
            }

            TokenKind::Const | TokenKind::Volatile | TokenKind::Restrict | TokenKind::Atomic => {
                let (flag, word) = match token.kind {
                    TokenKind::Const => (Qualifiers::CONST, "const"),
                    TokenKind::Volatile => (Qualifiers::VOLATILE, "volatile"),
                    TokenKind::Restrict => (Qualifiers::RESTRICT, "restrict"),
                    _ => (Qualifiers::ATOMIC, "_Atomic"),
                };
                if qualifiers.contains(flag) {
                    parser.diag.report(Diag::DuplicateQualifier(word), token.span);
                }
                qualifiers.insert(flag);
                parser.advance();
            }

            TokenKind::Void
            | TokenKind::Bool
            | TokenKind::Char
            | TokenKind::Short
            | TokenKind::Int
            | TokenKind::Long
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Signed
            | TokenKind::Unsigned
            | TokenKind::Complex => {
                builder.combine(token.kind, token.span, &parser.ast.types, parser.diag);
                parser.advance();
            }

            TokenKind::Struct | TokenKind::Union => {
                parser.advance();
                let is_union = token.kind == TokenKind::Union;
                let ty = records::parse_record_specifier(parser, is_union)?;
                builder.inject(ty, None, token.span, &parser.ast.types, parser.diag);
            }
            TokenKind::Enum => {
                parser.advance();
                let ty = records::parse_enum_specifier(parser)?;
                builder.inject(ty, None, token.span, &parser.ast.types, parser.diag);
            }

            TokenKind::Alignas => {
                parser.advance();
                alignment = parse_alignas(parser, token.span)?;
            }

            TokenKind::Identifier(symbol) => {
                if builder.is_none()
                    && let Some((ty, def_tok)) = parser.scopes.find_typedef(symbol)
                {
                    builder.inject(
                        ty,
                        Some(def_tok),
                        token.span,
                        &parser.ast.types,
                        parser.diag,
                    );
                    builder.set_typedef_origin(def_tok, parser.token_span(def_tok));
                    parser.advance();
                } else {
                    // not a typedef use here: leave it for the declarator
                    break;
                }
            }

            _ => break,
        }
    }

    if parser.tok_i == start_idx {
        let token = parser.current_token()?;
        return Err(ParseError::SyntaxError {
            message: "expected declaration specifiers".to_string(),
            span: token.span,
        });
    }

    let spec_span = parser.previous_token_span();
    let mut ty = builder.finalize(spec_span, parser.diag);
    ty.qualifiers |= qualifiers;
    if alignment != 0 {
        ty.alignment = alignment;
    }
    if qualifiers.contains(Qualifiers::RESTRICT) && !ty.is_pointer() {
        parser.diag.report(Diag::RestrictNonPointer, spec_span);
    }

    Ok(DeclSpec {
        storage,
        thread_local_tok,
        inline_tok,
        noreturn_tok,
        ty,
    })
}

/// `_Alignas ( type-name )` or `_Alignas ( constant-expression )`.
fn parse_alignas(parser: &mut Parser, kw_span: crate::source_manager::SourceSpan) -> Result<u32, ParseError> {
    parser.expect(TokenKind::LeftParen)?;
    let value = if starts_type_name(parser) {
        let ty = parse_type_name(parser)?;
        parser.ast.types.alignof(ty, parser.ctx) as i64
    } else {
        let result = parser.parse_const_expr()?;
        result.value.unwrap_or(0)
    };
    parser.expect(TokenKind::RightParen)?;

    if value < 0 || (value != 0 && !(value as u64).is_power_of_two()) {
        parser.diag.report(Diag::BadAlignment, kw_span);
        return Ok(0);
    }
    Ok(value as u32)
}

/// Whether the current token begins a type name (for `sizeof`, casts,
/// `_Alignas`, `_Alignof`).
pub(crate) fn starts_type_name(parser: &Parser) -> bool {
    match parser.try_current_token() {
        Some(token) => match token.kind {
            TokenKind::Identifier(symbol) => parser.is_type_name(symbol),
            kind => kind.is_declaration_start(false) && !matches!(kind, TokenKind::StaticAssert),
        },
        None => false,
    }
}

/// Parse a type name: specifier-qualifier list plus an optional abstract
/// declarator.
pub(crate) fn parse_type_name(parser: &mut Parser) -> Result<Type, ParseError> {
    let spec = parse_decl_specifiers(parser)?;
    if let Some(tok) = spec.storage.tok_opt() {
        parser
            .diag
            .report(Diag::BadStorageContext, parser.token_span(tok));
    }
    if parser.matches(&[TokenKind::Star, TokenKind::LeftParen, TokenKind::LeftBracket]) {
        let d = declarator::parse_declarator(parser, spec.ty, DeclaratorKind::Abstract)?;
        Ok(d.ty)
    } else {
        Ok(spec.ty)
    }
}

/// Initializer: an assignment expression or a braced initializer list.
fn parse_initializer(parser: &mut Parser) -> Result<NodeRef, ParseError> {
    if parser.is_token(TokenKind::LeftBrace) {
        let tok = parser.tok_i as u32;
        parser.advance();
        let mut items = Vec::new();
        while !parser.is_token(TokenKind::RightBrace) {
            items.push(parse_initializer(parser)?);
            if parser.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        parser.expect(TokenKind::RightBrace)?;
        Ok(parser.ast.push_node(Node::new(
            NodeKind::InitializerList(items),
            Type::void(),
            tok,
        )))
    } else {
        Ok(parser.parse_expr_assignment()?.node)
    }
}

/// Pick the precise AST tag from the storage/function-specifier
/// cross-product, diagnosing invalid combinations.
fn validate_decl(parser: &mut Parser, spec: &DeclSpec, d: &Declarator, is_def: bool) -> DeclTag {
    let is_function = d.ty.is_func();

    if !is_function {
        if let Some(tok) = spec.inline_tok {
            parser
                .diag
                .report(Diag::FuncSpecNonFunction("inline"), parser.token_span(tok));
        }
        if let Some(tok) = spec.noreturn_tok {
            parser
                .diag
                .report(Diag::FuncSpecNonFunction("_Noreturn"), parser.token_span(tok));
        }
    }

    if let Some(tl_tok) = spec.thread_local_tok {
        if is_function {
            parser
                .diag
                .report(Diag::ThreadLocalFunc, parser.token_span(tl_tok));
        } else if !matches!(
            spec.storage,
            Storage::None | Storage::Static(_) | Storage::Extern(_)
        ) {
            parser
                .diag
                .report(Diag::ThreadLocalBadStorage, parser.token_span(tl_tok));
        }
    }

    if matches!(spec.storage, Storage::Typedef(_)) {
        return DeclTag::Typedef;
    }

    if is_function {
        if let Storage::Auto(tok) | Storage::Register(tok) = spec.storage {
            parser
                .diag
                .report(Diag::BadFuncStorage(spec.storage.word()), parser.token_span(tok));
        }
        let is_static = matches!(spec.storage, Storage::Static(_));
        return DeclTag::function(
            is_def,
            is_static,
            spec.inline_tok.is_some(),
            spec.noreturn_tok.is_some(),
        );
    }

    let thread_local = spec.thread_local_tok.is_some();
    match (thread_local, spec.storage) {
        (true, Storage::Extern(_)) => DeclTag::ThreadLocalExternVar,
        (true, Storage::Static(_)) => DeclTag::ThreadLocalStaticVar,
        (true, _) => DeclTag::ThreadLocalVar,
        (false, Storage::Extern(_)) => DeclTag::ExternVar,
        (false, Storage::Static(_)) => DeclTag::StaticVar,
        (false, Storage::Register(tok)) => {
            if !parser.in_function {
                parser
                    .diag
                    .report(Diag::IllegalStorageOnGlobal("register"), parser.token_span(tok));
            }
            DeclTag::RegisterVar
        }
        (false, Storage::Auto(tok)) => {
            if !parser.in_function {
                parser
                    .diag
                    .report(Diag::IllegalStorageOnGlobal("auto"), parser.token_span(tok));
            }
            DeclTag::AutoVar
        }
        (false, _) => DeclTag::Var,
    }
}

/// Parse a function definition after its declarator. The function's own
/// symbol is published before the body parses so recursive references
/// resolve.
fn parse_function_definition(
    parser: &mut Parser,
    spec: DeclSpec,
    mut d: Declarator,
) -> Result<NodeRef, ParseError> {
    if parser.in_function {
        parser
            .diag
            .report(Diag::FuncNotInRoot, parser.token_span(d.name_tok));
    }

    // `int f() { ... }`: empty parens in a definition mean "no
    // parameters", so the unspecified-arguments type downgrades
    if let Specifier::VarArgsFunc(func_ref) = d.ty.specifier
        && parser.ast.types.get_func(func_ref).params.is_empty()
    {
        d.ty.specifier = Specifier::Func(func_ref);
    }

    if d.old_style {
        parse_knr_param_decls(parser, &d)?;
    }

    let tag = validate_decl(parser, &spec, &d, true);

    // function name is visible inside its own body
    publish_symbol(parser, &spec, &d);

    let scope_mark = parser.scopes.len();
    if let Some(func_ref) = func_descriptor(d.ty) {
        for param in parser.ast.types.get_func(func_ref).params.clone() {
            if let Some(name) = param.name {
                parser.scopes.push(Scope::Symbol {
                    name,
                    ty: param.ty,
                    name_tok: param.name_tok,
                });
            }
        }
    }

    let was_in_function = parser.in_function;
    parser.in_function = true;
    let body = statements::parse_compound_statement(parser);
    parser.in_function = was_in_function;
    parser.scopes.truncate(scope_mark);
    let body = body?;

    Ok(parser.ast.push_node(Node::new(
        NodeKind::Decl {
            tag,
            name: d.name,
            init: None,
            body: Some(body),
        },
        d.ty,
        d.name_tok,
    )))
}

fn func_descriptor(ty: Type) -> Option<crate::types::FuncRef> {
    match ty.specifier {
        Specifier::Func(r) | Specifier::VarArgsFunc(r) | Specifier::OldStyleFunc(r) => Some(r),
        _ => None,
    }
}

/// K&R parameter declarations between the identifier list and the body:
/// `int f(a, b) int a; char b; { ... }`. Each declaration rebinds a
/// named parameter; parameters never declared keep type `int` with a
/// warning.
fn parse_knr_param_decls(parser: &mut Parser, d: &Declarator) -> Result<(), ParseError> {
    let func_ref = match d.ty.specifier {
        Specifier::OldStyleFunc(r) => r,
        _ => return Ok(()),
    };

    let mut bound = vec![false; parser.ast.types.get_func(func_ref).params.len()];

    while parser.starts_declaration() && !parser.is_token(TokenKind::LeftBrace) {
        let spec = parse_decl_specifiers(parser)?;
        if let Some(tok) = spec.storage.tok_opt()
            && !matches!(spec.storage, Storage::Register(_))
        {
            parser
                .diag
                .report(Diag::ParamStorageClass, parser.token_span(tok));
        }

        loop {
            let param_d =
                declarator::parse_declarator(parser, spec.ty, DeclaratorKind::Normal)?;
            let Some(name) = param_d.name else { break };

            let position = parser
                .ast
                .types
                .get_func(func_ref)
                .params
                .iter()
                .position(|p| p.name == Some(name));
            match position {
                Some(i) => {
                    let adjusted = adjust_knr_param(parser, param_d.ty);
                    let func = parser.ast.types.get_func_mut(func_ref);
                    func.params[i].ty = adjusted;
                    func.params[i].register = matches!(spec.storage, Storage::Register(_));
                    bound[i] = true;
                }
                None => {
                    parser
                        .diag
                        .report(Diag::KnrUnknownParam(name), parser.token_span(param_d.name_tok));
                }
            }

            if parser.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        parser.expect(TokenKind::Semicolon)?;
    }

    for (i, was_bound) in bound.iter().enumerate() {
        if !was_bound {
            let param = &parser.ast.types.get_func(func_ref).params[i];
            if let Some(name) = param.name {
                let span = parser.token_span(param.name_tok);
                parser.diag.report(Diag::KnrParamMissingType(name), span);
            }
        }
    }

    Ok(())
}

fn adjust_knr_param(parser: &mut Parser, ty: Type) -> Type {
    if ty.is_func() {
        return parser.ast.types.pointer_to(ty);
    }
    if ty.is_array() {
        let elem = parser.ast.types.elem_type(ty).unwrap_or(Type::int());
        return parser.ast.types.pointer_to(elem);
    }
    ty
}

/// `_Static_assert ( constant-expression (, string-literal)? ) ;`
/// The failure diagnostic quotes the controlling expression's source
/// text and the message.
pub(crate) fn parse_static_assert(
    parser: &mut Parser,
    start_token: Token,
) -> Result<NodeRef, ParseError> {
    parser.expect(TokenKind::LeftParen)?;

    let cond_start = parser.tok_i as u32;
    let cond = parser.parse_const_expr()?;
    let cond_end = (parser.tok_i as u32).saturating_sub(1);

    let message = if parser.accept(TokenKind::Comma).is_some() {
        let token = parser.current_token()?;
        match token.kind {
            TokenKind::StringLiteral(symbol) => {
                parser.advance();
                Some(symbol)
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "string literal".to_string(),
                    found: token.kind,
                    span: token.span,
                });
            }
        }
    } else {
        None
    };

    parser.expect(TokenKind::RightParen)?;
    parser.expect(TokenKind::Semicolon)?;

    if cond.value == Some(0) {
        let expr_span = parser
            .token_span(cond_start)
            .merge(parser.token_span(cond_end));
        let expr_text = parser.source_manager.get_source_text(expr_span);
        parser.diag.report(
            Diag::StaticAssertFailed {
                expr: format!("'{}'", expr_text),
                msg: match message {
                    Some(m) => format!("\"{}\"", m),
                    None => String::new(),
                },
            },
            start_token.span,
        );
    }

    Ok(parser.ast.push_node(Node::new(
        NodeKind::StaticAssert {
            cond: cond.node,
            message,
        },
        Type::void(),
        cond_start,
    )))
}

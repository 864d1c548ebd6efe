//! Expression parsing: a Pratt parser over the C operator set, folding
//! integer constants as it goes.
//!
//! The declaration core needs expressions in a few places only: array
//! bounds, bit-field widths, enumerator values, initializers, case
//! labels, and `_Static_assert`. Every parse therefore returns an
//! [`ExprResult`] carrying both the AST node and, when the expression is
//! an integer constant expression, its folded value.

use crate::ast::{BinaryOp, Node, NodeKind, NodeRef, UnaryOp};
use crate::diagnostic::{Diag, ParseError};
use crate::lexer::TokenKind;
use crate::parser::scope::Scope;
use crate::types::{ArrayKind, Specifier, Type};

use super::declarations;
use super::Parser;

/// Binding power for Pratt parser operator precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct BindingPower(u8);

impl BindingPower {
    pub(crate) const MIN: Self = Self(0);
    pub(crate) const COMMA: Self = Self(2);
    pub(crate) const ASSIGNMENT: Self = Self(4);
    pub(crate) const CONDITIONAL: Self = Self(6);
    pub(crate) const LOGICAL_OR: Self = Self(8);
    pub(crate) const LOGICAL_AND: Self = Self(10);
    pub(crate) const BITWISE_OR: Self = Self(12);
    pub(crate) const BITWISE_XOR: Self = Self(14);
    pub(crate) const BITWISE_AND: Self = Self(16);
    pub(crate) const EQUALITY: Self = Self(18);
    pub(crate) const RELATIONAL: Self = Self(20);
    pub(crate) const SHIFT: Self = Self(22);
    pub(crate) const ADDITIVE: Self = Self(24);
    pub(crate) const MULTIPLICATIVE: Self = Self(26);

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Associativity {
    Left,
    Right,
}

/// One parsed expression: its node and, if it is an integer constant
/// expression, the folded value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExprResult {
    pub node: NodeRef,
    pub value: Option<i64>,
}

fn binding_power(kind: TokenKind) -> Option<(BindingPower, Associativity, Option<BinaryOp>)> {
    use TokenKind::*;
    Some(match kind {
        Comma => (BindingPower::COMMA, Associativity::Left, Some(BinaryOp::Comma)),
        Assign | PlusAssign | MinusAssign | StarAssign | DivAssign | ModAssign | AndAssign
        | OrAssign | XorAssign | LeftShiftAssign | RightShiftAssign => {
            (BindingPower::ASSIGNMENT, Associativity::Right, Some(BinaryOp::Assign))
        }
        Question => (BindingPower::CONDITIONAL, Associativity::Right, None),
        LogicOr => (BindingPower::LOGICAL_OR, Associativity::Left, Some(BinaryOp::LogicOr)),
        LogicAnd => (BindingPower::LOGICAL_AND, Associativity::Left, Some(BinaryOp::LogicAnd)),
        Or => (BindingPower::BITWISE_OR, Associativity::Left, Some(BinaryOp::BitOr)),
        Xor => (BindingPower::BITWISE_XOR, Associativity::Left, Some(BinaryOp::BitXor)),
        And => (BindingPower::BITWISE_AND, Associativity::Left, Some(BinaryOp::BitAnd)),
        Equal => (BindingPower::EQUALITY, Associativity::Left, Some(BinaryOp::Eq)),
        NotEqual => (BindingPower::EQUALITY, Associativity::Left, Some(BinaryOp::Ne)),
        Less => (BindingPower::RELATIONAL, Associativity::Left, Some(BinaryOp::Lt)),
        Greater => (BindingPower::RELATIONAL, Associativity::Left, Some(BinaryOp::Gt)),
        LessEqual => (BindingPower::RELATIONAL, Associativity::Left, Some(BinaryOp::Le)),
        GreaterEqual => (BindingPower::RELATIONAL, Associativity::Left, Some(BinaryOp::Ge)),
        LeftShift => (BindingPower::SHIFT, Associativity::Left, Some(BinaryOp::Shl)),
        RightShift => (BindingPower::SHIFT, Associativity::Left, Some(BinaryOp::Shr)),
        Plus => (BindingPower::ADDITIVE, Associativity::Left, Some(BinaryOp::Add)),
        Minus => (BindingPower::ADDITIVE, Associativity::Left, Some(BinaryOp::Sub)),
        Star => (BindingPower::MULTIPLICATIVE, Associativity::Left, Some(BinaryOp::Mul)),
        Slash => (BindingPower::MULTIPLICATIVE, Associativity::Left, Some(BinaryOp::Div)),
        Percent => (BindingPower::MULTIPLICATIVE, Associativity::Left, Some(BinaryOp::Mod)),
        _ => return None,
    })
}

pub(crate) fn parse_expression(
    parser: &mut Parser,
    min_bp: BindingPower,
) -> Result<ExprResult, ParseError> {
    let mut lhs = parse_unary(parser)?;

    while let Some(token) = parser.try_current_token() {
        let Some((bp, assoc, op)) = binding_power(token.kind) else {
            break;
        };
        if bp < min_bp {
            break;
        }
        let op_tok = parser.tok_i as u32;
        parser.advance();

        // ternary: cond ? expr : conditional-expr
        let Some(op) = op else {
            let then_expr = parse_expression(parser, BindingPower::MIN)?;
            parser.expect(TokenKind::Colon)?;
            let else_expr = parse_expression(parser, BindingPower::CONDITIONAL)?;

            let value = lhs.value.and_then(|cond| {
                if cond != 0 { then_expr.value } else { else_expr.value }
            });
            let ty = parser.ast.get_node(then_expr.node).ty;
            let node = parser.ast.push_node(Node::new(
                NodeKind::Conditional {
                    cond: lhs.node,
                    then_expr: then_expr.node,
                    else_expr: else_expr.node,
                },
                ty,
                op_tok,
            ));
            lhs = ExprResult { node, value };
            continue;
        };

        let rhs = match assoc {
            Associativity::Left => parse_expression(parser, bp.next())?,
            Associativity::Right => parse_expression(parser, bp)?,
        };

        let value = fold_binary(parser, op, &lhs, &rhs, op_tok);
        let ty = binary_type(parser, op, &lhs);
        let node = parser.ast.push_node(Node::new(
            NodeKind::Binary(op, lhs.node, rhs.node),
            ty,
            op_tok,
        ));
        lhs = ExprResult { node, value };
    }

    Ok(lhs)
}

fn binary_type(parser: &Parser, op: BinaryOp, lhs: &ExprResult) -> Type {
    use BinaryOp::*;
    match op {
        Lt | Gt | Le | Ge | Eq | Ne | LogicAnd | LogicOr => Type::int(),
        _ => {
            let ty = parser.ast.get_node(lhs.node).ty;
            if ty.is_int() {
                ty.integer_promotion(parser.ctx)
            } else {
                ty
            }
        }
    }
}

fn fold_binary(
    parser: &mut Parser,
    op: BinaryOp,
    lhs: &ExprResult,
    rhs: &ExprResult,
    op_tok: u32,
) -> Option<i64> {
    use BinaryOp::*;

    // logical operators short-circuit even over non-constant operands
    match op {
        LogicAnd => {
            return match (lhs.value, rhs.value) {
                (Some(0), _) => Some(0),
                (Some(_), Some(b)) => Some((b != 0) as i64),
                _ => None,
            };
        }
        LogicOr => {
            return match (lhs.value, rhs.value) {
                (Some(a), _) if a != 0 => Some(1),
                (Some(_), Some(b)) => Some((b != 0) as i64),
                _ => None,
            };
        }
        Assign | Comma => return None,
        _ => {}
    }

    let a = lhs.value?;
    let b = rhs.value?;

    // use the operand type's signedness for division and shifts
    let unsigned = parser.ast.get_node(lhs.node).ty.is_unsigned_int(parser.ctx)
        || parser.ast.get_node(rhs.node).ty.is_unsigned_int(parser.ctx);

    let value = match op {
        Add => a.wrapping_add(b),
        Sub => a.wrapping_sub(b),
        Mul => a.wrapping_mul(b),
        Div | Mod => {
            if b == 0 {
                parser.diag.report(Diag::DivByZero, parser.token_span(op_tok));
                return None;
            }
            match (op, unsigned) {
                (Div, false) => a.wrapping_div(b),
                (Div, true) => ((a as u64) / (b as u64)) as i64,
                (_, false) => a.wrapping_rem(b),
                (_, true) => ((a as u64) % (b as u64)) as i64,
            }
        }
        Shl => a.wrapping_shl(b as u32),
        Shr => {
            if unsigned {
                ((a as u64) >> (b as u32 & 63)) as i64
            } else {
                a.wrapping_shr(b as u32)
            }
        }
        Lt => cmp(a, b, unsigned, |o| o.is_lt()),
        Gt => cmp(a, b, unsigned, |o| o.is_gt()),
        Le => cmp(a, b, unsigned, |o| o.is_le()),
        Ge => cmp(a, b, unsigned, |o| o.is_ge()),
        Eq => (a == b) as i64,
        Ne => (a != b) as i64,
        BitAnd => a & b,
        BitXor => a ^ b,
        BitOr => a | b,
        LogicAnd | LogicOr | Assign | Comma => unreachable!(),
    };
    Some(value)
}

fn cmp(a: i64, b: i64, unsigned: bool, test: impl Fn(std::cmp::Ordering) -> bool) -> i64 {
    let ordering = if unsigned {
        (a as u64).cmp(&(b as u64))
    } else {
        a.cmp(&b)
    };
    test(ordering) as i64
}

fn parse_unary(parser: &mut Parser) -> Result<ExprResult, ParseError> {
    let token = parser.current_token()?;
    let tok_i = parser.tok_i as u32;

    let op = match token.kind {
        TokenKind::Plus => Some(UnaryOp::Plus),
        TokenKind::Minus => Some(UnaryOp::Minus),
        TokenKind::Tilde => Some(UnaryOp::BitNot),
        TokenKind::Not => Some(UnaryOp::LogicalNot),
        TokenKind::Star => Some(UnaryOp::Deref),
        TokenKind::And => Some(UnaryOp::AddressOf),
        TokenKind::Increment => Some(UnaryOp::PreIncrement),
        TokenKind::Decrement => Some(UnaryOp::PreDecrement),
        TokenKind::Sizeof => return parse_sizeof(parser),
        TokenKind::Alignof => return parse_alignof(parser),
        _ => None,
    };

    let Some(op) = op else {
        return parse_postfix(parser);
    };
    parser.advance();
    let operand = parse_unary(parser)?;
    let operand_ty = parser.ast.get_node(operand.node).ty;

    let (ty, value) = match op {
        UnaryOp::Plus => (
            operand_ty.integer_promotion(parser.ctx),
            operand.value,
        ),
        UnaryOp::Minus => (
            operand_ty.integer_promotion(parser.ctx),
            operand.value.map(i64::wrapping_neg),
        ),
        UnaryOp::BitNot => (
            operand_ty.integer_promotion(parser.ctx),
            operand.value.map(|v| !v),
        ),
        UnaryOp::LogicalNot => (Type::int(), operand.value.map(|v| (v == 0) as i64)),
        UnaryOp::Deref => (
            parser.ast.types.elem_type(operand_ty).unwrap_or(Type::int()),
            None,
        ),
        UnaryOp::AddressOf => (parser.ast.types.pointer_to(operand_ty), None),
        UnaryOp::PreIncrement | UnaryOp::PreDecrement => (operand_ty, None),
    };

    let node = parser
        .ast
        .push_node(Node::new(NodeKind::Unary(op, operand.node), ty, tok_i));
    Ok(ExprResult { node, value })
}

/// `sizeof unary-expr` or `sizeof ( type-name )`.
fn parse_sizeof(parser: &mut Parser) -> Result<ExprResult, ParseError> {
    let tok_i = parser.tok_i as u32;
    parser.advance();

    let (kind, ty) = if parser.is_token(TokenKind::LeftParen)
        && parser
            .peek_token(0)
            .is_some_and(|t| starts_type_name_token(parser, t.kind))
    {
        parser.advance();
        let ty = declarations::parse_type_name(parser)?;
        parser.expect(TokenKind::RightParen)?;
        (NodeKind::SizeofType, ty)
    } else {
        let operand = parse_unary(parser)?;
        let ty = parser.ast.get_node(operand.node).ty;
        (NodeKind::SizeofExpr(operand.node), ty)
    };

    let size = parser.ast.types.sizeof(ty, parser.ctx);
    if size.is_none() {
        let span = parser.token_span(tok_i);
        parser.diag.report(Diag::SizeofIncomplete, span);
    }

    // the node records the queried type; the folded value is the size
    let node = parser.ast.push_node(Node::new(kind, ty, tok_i));
    Ok(ExprResult {
        node,
        value: size.map(|s| s as i64),
    })
}

/// `_Alignof ( type-name )`.
fn parse_alignof(parser: &mut Parser) -> Result<ExprResult, ParseError> {
    let tok_i = parser.tok_i as u32;
    parser.advance();
    parser.expect(TokenKind::LeftParen)?;
    let ty = declarations::parse_type_name(parser)?;
    parser.expect(TokenKind::RightParen)?;

    let align = parser.ast.types.alignof(ty, parser.ctx);
    let node = parser
        .ast
        .push_node(Node::new(NodeKind::AlignofType, ty, tok_i));
    Ok(ExprResult {
        node,
        value: Some(align as i64),
    })
}

fn starts_type_name_token(parser: &Parser, kind: TokenKind) -> bool {
    match kind {
        TokenKind::Identifier(symbol) => parser.is_type_name(symbol),
        kind => kind.is_declaration_start(false) && kind != TokenKind::StaticAssert,
    }
}

fn parse_postfix(parser: &mut Parser) -> Result<ExprResult, ParseError> {
    let mut result = parse_primary(parser)?;

    loop {
        let Some(token) = parser.try_current_token() else {
            break;
        };
        let tok_i = parser.tok_i as u32;
        match token.kind {
            TokenKind::LeftParen => {
                parser.advance();
                let mut args = Vec::new();
                while !parser.is_token(TokenKind::RightParen) {
                    args.push(parser.parse_expr_assignment()?.node);
                    if parser.accept(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                parser.expect(TokenKind::RightParen)?;

                let callee_ty = parser.ast.get_node(result.node).ty;
                let ret_ty = match parser.ast.types.is_callable(callee_ty) {
                    Some(func_ty) => match func_ty.specifier {
                        Specifier::Func(r)
                        | Specifier::VarArgsFunc(r)
                        | Specifier::OldStyleFunc(r) => parser.ast.types.get_func(r).return_type,
                        _ => Type::int(),
                    },
                    None => {
                        parser.diag.report(Diag::NotCallable, token.span);
                        Type::int()
                    }
                };
                let node = parser.ast.push_node(Node::new(
                    NodeKind::Call {
                        callee: result.node,
                        args,
                    },
                    ret_ty,
                    tok_i,
                ));
                result = ExprResult { node, value: None };
            }
            TokenKind::LeftBracket => {
                parser.advance();
                let index = parser.parse_expr_min()?;
                parser.expect(TokenKind::RightBracket)?;
                let base_ty = parser.ast.get_node(result.node).ty;
                let elem = parser.ast.types.elem_type(base_ty).unwrap_or(Type::int());
                let node = parser.ast.push_node(Node::new(
                    NodeKind::Index {
                        base: result.node,
                        index: index.node,
                    },
                    elem,
                    tok_i,
                ));
                result = ExprResult { node, value: None };
            }
            TokenKind::Dot | TokenKind::Arrow => {
                let arrow = token.kind == TokenKind::Arrow;
                parser.advance();
                let (name, _) = parser.expect_name()?;

                let mut base_ty = parser.ast.get_node(result.node).ty;
                if arrow && let Some(pointee) = parser.ast.types.elem_type(base_ty) {
                    base_ty = pointee;
                }
                let field_ty = field_type(parser, base_ty, name).unwrap_or(Type::int());
                let node = parser.ast.push_node(Node::new(
                    NodeKind::Member {
                        base: result.node,
                        name,
                        arrow,
                    },
                    field_ty,
                    tok_i,
                ));
                result = ExprResult { node, value: None };
            }
            TokenKind::Increment => {
                parser.advance();
                let ty = parser.ast.get_node(result.node).ty;
                let node = parser
                    .ast
                    .push_node(Node::new(NodeKind::PostIncrement(result.node), ty, tok_i));
                result = ExprResult { node, value: None };
            }
            TokenKind::Decrement => {
                parser.advance();
                let ty = parser.ast.get_node(result.node).ty;
                let node = parser
                    .ast
                    .push_node(Node::new(NodeKind::PostDecrement(result.node), ty, tok_i));
                result = ExprResult { node, value: None };
            }
            _ => break,
        }
    }

    Ok(result)
}

fn field_type(parser: &Parser, ty: Type, name: symbol_table::GlobalSymbol) -> Option<Type> {
    let record = match ty.specifier {
        Specifier::Struct(r) | Specifier::Union(r) => parser.ast.types.get_record(r),
        _ => return None,
    };
    record
        .fields
        .as_ref()?
        .iter()
        .find(|f| f.name == Some(name))
        .map(|f| f.ty)
}

fn parse_primary(parser: &mut Parser) -> Result<ExprResult, ParseError> {
    let token = parser.current_token()?;
    let tok_i = parser.tok_i as u32;

    match token.kind {
        TokenKind::IntegerConstant(value) => {
            parser.advance();
            let node = parser
                .ast
                .push_node(Node::new(NodeKind::IntLiteral(value), Type::int(), tok_i));
            Ok(ExprResult {
                node,
                value: Some(value),
            })
        }
        TokenKind::FloatConstant(symbol) => {
            parser.advance();
            let node = parser.ast.push_node(Node::new(
                NodeKind::FloatLiteral(symbol),
                Type::new(Specifier::Double),
                tok_i,
            ));
            Ok(ExprResult { node, value: None })
        }
        TokenKind::CharacterConstant(value) => {
            parser.advance();
            // character constants have type int
            let node = parser
                .ast
                .push_node(Node::new(NodeKind::CharLiteral(value), Type::int(), tok_i));
            Ok(ExprResult {
                node,
                value: Some(value as i64),
            })
        }
        TokenKind::StringLiteral(symbol) => {
            parser.advance();
            let len = symbol.as_str().len() as u64 + 1;
            let span = token.span;
            let ty = parser.ast.types.array_of(
                Type::new(Specifier::Char),
                ArrayKind::Fixed(len),
                span,
                parser.diag,
            );
            let node = parser
                .ast
                .push_node(Node::new(NodeKind::StringLiteral(symbol), ty, tok_i));
            Ok(ExprResult { node, value: None })
        }
        TokenKind::Identifier(symbol) => {
            parser.advance();
            let (ty, value) = match parser.scopes.find_symbol(symbol) {
                Some(Scope::Symbol { ty, .. }) => (*ty, None),
                Some(Scope::Enumerator { ty, value, .. }) => (*ty, Some(*value)),
                _ => {
                    parser
                        .diag
                        .report(Diag::UndeclaredIdentifier(symbol), token.span);
                    (Type::int(), None)
                }
            };
            let node = parser
                .ast
                .push_node(Node::new(NodeKind::Ident(symbol), ty, tok_i));
            Ok(ExprResult { node, value })
        }
        TokenKind::LeftParen => {
            parser.advance();
            let inner = parse_expression(parser, BindingPower::MIN)?;
            parser.expect(TokenKind::RightParen)?;
            Ok(inner)
        }
        _ => Err(ParseError::UnexpectedToken {
            expected: "expression".to_string(),
            found: token.kind,
            span: token.span,
        }),
    }
}

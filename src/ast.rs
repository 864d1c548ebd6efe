//! Flattened AST storage.
//!
//! All nodes live in one contiguous vector and reference each other by
//! [`NodeRef`] index. Index 0 is reserved for the invalid sentinel, so a
//! `NodeRef` is a `NonZeroU32` and no valid declaration can be index 0.
//! The AST also owns the translation unit's [`TypeArena`]; every `Node`
//! carries its [`Type`] by value.

use crate::types::{Type, TypeArena};
use std::num::NonZeroU32;
use symbol_table::GlobalSymbol as Symbol;

/// Reference to a node in the flat vector.
pub type NodeRef = NonZeroU32;

/// The precise declaration tag, picked by the coordinator's validation so
/// downstream passes never re-derive storage/function-specifier facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclTag {
    Typedef,

    // function prototypes: {static?, inline?, noreturn?}
    FnProto,
    StaticFnProto,
    InlineFnProto,
    InlineStaticFnProto,
    NoreturnFnProto,
    NoreturnStaticFnProto,
    NoreturnInlineFnProto,
    NoreturnInlineStaticFnProto,

    // function definitions: {static?, inline?, noreturn?}
    FnDef,
    StaticFnDef,
    InlineFnDef,
    InlineStaticFnDef,
    NoreturnFnDef,
    NoreturnStaticFnDef,
    NoreturnInlineFnDef,
    NoreturnInlineStaticFnDef,

    // variables: {thread-local?, static?, extern?} plus block-scope forms
    Var,
    ExternVar,
    StaticVar,
    ThreadLocalVar,
    ThreadLocalExternVar,
    ThreadLocalStaticVar,
    RegisterVar,
    AutoVar,
}

impl DeclTag {
    /// Pick the function tag from the validated specifier flags.
    pub fn function(is_def: bool, is_static: bool, is_inline: bool, is_noreturn: bool) -> Self {
        use DeclTag::*;
        match (is_def, is_noreturn, is_inline, is_static) {
            (false, false, false, false) => FnProto,
            (false, false, false, true) => StaticFnProto,
            (false, false, true, false) => InlineFnProto,
            (false, false, true, true) => InlineStaticFnProto,
            (false, true, false, false) => NoreturnFnProto,
            (false, true, false, true) => NoreturnStaticFnProto,
            (false, true, true, false) => NoreturnInlineFnProto,
            (false, true, true, true) => NoreturnInlineStaticFnProto,
            (true, false, false, false) => FnDef,
            (true, false, false, true) => StaticFnDef,
            (true, false, true, false) => InlineFnDef,
            (true, false, true, true) => InlineStaticFnDef,
            (true, true, false, false) => NoreturnFnDef,
            (true, true, false, true) => NoreturnStaticFnDef,
            (true, true, true, false) => NoreturnInlineFnDef,
            (true, true, true, true) => NoreturnInlineStaticFnDef,
        }
    }

    pub fn is_function(&self) -> bool {
        use DeclTag::*;
        !matches!(
            self,
            Typedef
                | Var
                | ExternVar
                | StaticVar
                | ThreadLocalVar
                | ThreadLocalExternVar
                | ThreadLocalStaticVar
                | RegisterVar
                | AutoVar
        )
    }

    pub fn is_definition(&self) -> bool {
        use DeclTag::*;
        matches!(
            self,
            FnDef
                | StaticFnDef
                | InlineFnDef
                | InlineStaticFnDef
                | NoreturnFnDef
                | NoreturnStaticFnDef
                | NoreturnInlineFnDef
                | NoreturnInlineStaticFnDef
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    LogicalNot,
    Deref,
    AddressOf,
    PreIncrement,
    PreDecrement,
}

/// Binary operators. Compound assignments all carry their arithmetic op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogicAnd,
    LogicOr,
    Assign,
    Comma,
}

/// Node payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Reserved sentinel stored at index 0.
    Invalid,

    // === declarations ===
    Decl {
        tag: DeclTag,
        name: Option<Symbol>,
        init: Option<NodeRef>,
        body: Option<NodeRef>,
    },
    /// A record/enum declaration with no declarators (`struct s;`).
    TagDecl,
    StaticAssert {
        cond: NodeRef,
        message: Option<Symbol>,
    },

    // === expressions ===
    IntLiteral(i64),
    FloatLiteral(Symbol),
    CharLiteral(u8),
    StringLiteral(Symbol),
    Ident(Symbol),
    Unary(UnaryOp, NodeRef),
    Binary(BinaryOp, NodeRef, NodeRef),
    Conditional {
        cond: NodeRef,
        then_expr: NodeRef,
        else_expr: NodeRef,
    },
    Call {
        callee: NodeRef,
        args: Vec<NodeRef>,
    },
    Index {
        base: NodeRef,
        index: NodeRef,
    },
    Member {
        base: NodeRef,
        name: Symbol,
        arrow: bool,
    },
    PostIncrement(NodeRef),
    PostDecrement(NodeRef),
    InitializerList(Vec<NodeRef>),
    SizeofExpr(NodeRef),
    /// `sizeof (type-name)`; the queried type is the node's `ty`.
    SizeofType,
    /// `_Alignof (type-name)`; the queried type is the node's `ty`.
    AlignofType,

    // === statements ===
    CompoundStmt(Vec<NodeRef>),
    IfStmt {
        cond: NodeRef,
        then_stmt: NodeRef,
        else_stmt: Option<NodeRef>,
    },
    WhileStmt {
        cond: NodeRef,
        body: NodeRef,
    },
    SwitchStmt {
        cond: NodeRef,
        body: NodeRef,
    },
    CaseStmt {
        value: i64,
        stmt: NodeRef,
    },
    DefaultStmt(NodeRef),
    ReturnStmt(Option<NodeRef>),
    BreakStmt,
    ContinueStmt,
    ExprStmt(NodeRef),
    NullStmt,
}

/// One AST node: a kind, the node's type, and the token index of the
/// declared name (or the operative token for expressions/statements).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: Type,
    pub tok: u32,
}

impl Node {
    pub fn new(kind: NodeKind, ty: Type, tok: u32) -> Self {
        Node { kind, ty, tok }
    }
}

/// The produced AST: flat node vector, root declaration list, and the
/// arena owning all type auxiliaries.
pub struct Ast {
    pub nodes: Vec<Node>,
    pub root_decls: Vec<NodeRef>,
    pub types: TypeArena,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    pub fn new() -> Self {
        Ast {
            // index 0 is the invalid sentinel
            nodes: vec![Node::new(NodeKind::Invalid, Type::void(), 0)],
            root_decls: Vec::new(),
            types: TypeArena::new(),
        }
    }

    pub fn push_node(&mut self, node: Node) -> NodeRef {
        self.nodes.push(node);
        NodeRef::new(self.nodes.len() as u32 - 1).expect("AST index overflow")
    }

    pub fn get_node(&self, r: NodeRef) -> &Node {
        &self.nodes[r.get() as usize]
    }

    pub fn get_node_mut(&mut self, r: NodeRef) -> &mut Node {
        &mut self.nodes[r.get() as usize]
    }

    pub fn add_root_decl(&mut self, r: NodeRef) {
        self.root_decls.push(r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_zero_is_reserved() {
        let mut ast = Ast::new();
        assert_eq!(ast.nodes[0].kind, NodeKind::Invalid);
        let first = ast.push_node(Node::new(NodeKind::NullStmt, Type::void(), 0));
        assert_eq!(first.get(), 1);
        assert_eq!(ast.get_node(first).kind, NodeKind::NullStmt);
    }

    #[test]
    fn decl_tag_cross_product() {
        assert_eq!(DeclTag::function(false, false, false, false), DeclTag::FnProto);
        assert_eq!(
            DeclTag::function(true, true, true, true),
            DeclTag::NoreturnInlineStaticFnDef
        );
        assert!(DeclTag::StaticFnDef.is_function());
        assert!(DeclTag::StaticFnDef.is_definition());
        assert!(!DeclTag::InlineFnProto.is_definition());
        assert!(!DeclTag::ThreadLocalStaticVar.is_function());
    }
}

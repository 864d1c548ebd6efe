//! The scope stack: one flat stack of entries with linear top-down
//! lookup. Translation-unit scopes are shallow, so no hashed overlay is
//! needed for correct behavior.
//!
//! Entries are pushed at declaration. Popping on block exit is driven by
//! the statement parser, which records the stack length on entry and
//! truncates on exit.

use crate::types::{EnumRef, RecordRef, Type};
use symbol_table::GlobalSymbol as Symbol;

/// One scope stack entry.
#[derive(Debug, Clone)]
pub enum Scope {
    /// A typedef name. `name_tok` points at the declaring token so
    /// conflict diagnostics can refer back to it.
    Typedef {
        name: Symbol,
        ty: Type,
        name_tok: u32,
    },
    /// A `struct` tag.
    Struct { name: Symbol, record: RecordRef },
    /// A `union` tag.
    Union { name: Symbol, record: RecordRef },
    /// An `enum` tag.
    Enum { name: Symbol, enum_ref: EnumRef },
    /// An ordinary symbol (variable, function, parameter).
    Symbol {
        name: Symbol,
        ty: Type,
        name_tok: u32,
    },
    /// An enumerator with its constant value.
    Enumerator {
        name: Symbol,
        ty: Type,
        value: i64,
    },
    /// Marks an enclosing loop for `break`/`continue` validation.
    LoopSentinel,
    /// Marks an enclosing switch for `break`/`case`/`default` validation.
    SwitchSentinel,
}

/// Which tag namespace a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Struct,
    Union,
    Enum,
}

/// The scope stack.
#[derive(Default)]
pub struct ScopeStack {
    entries: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Scope) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pop everything above a previously recorded stack length.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Resolve a typedef name, top of stack first. Only `Typedef`
    /// entries match; a shadowing variable does not hide the typedef
    /// here (the caller decides what an identifier means in context).
    pub fn find_typedef(&self, name: Symbol) -> Option<(Type, u32)> {
        self.entries.iter().rev().find_map(|entry| match entry {
            Scope::Typedef {
                name: n,
                ty,
                name_tok,
            } if *n == name => Some((*ty, *name_tok)),
            _ => None,
        })
    }

    /// Resolve an ordinary symbol or enumerator, top of stack first.
    pub fn find_symbol(&self, name: Symbol) -> Option<&Scope> {
        self.entries.iter().rev().find(|entry| match entry {
            Scope::Symbol { name: n, .. } | Scope::Enumerator { name: n, .. } => *n == name,
            _ => false,
        })
    }

    /// Resolve a record/enum tag of the given kind, top of stack first.
    pub fn find_tag(&self, kind: TagKind, name: Symbol) -> Option<&Scope> {
        self.entries.iter().rev().find(|entry| match (kind, entry) {
            (TagKind::Struct, Scope::Struct { name: n, .. }) => *n == name,
            (TagKind::Union, Scope::Union { name: n, .. }) => *n == name,
            (TagKind::Enum, Scope::Enum { name: n, .. }) => *n == name,
            _ => false,
        })
    }

    /// Whether a loop or switch encloses the current point.
    pub fn in_loop(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, Scope::LoopSentinel))
    }

    pub fn in_loop_or_switch(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, Scope::LoopSentinel | Scope::SwitchSentinel))
    }

    pub fn in_switch(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, Scope::SwitchSentinel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typedef_lookup_is_top_down() {
        let mut scopes = ScopeStack::new();
        let name = Symbol::new("T");
        scopes.push(Scope::Typedef {
            name,
            ty: Type::int(),
            name_tok: 1,
        });
        scopes.push(Scope::Symbol {
            name,
            ty: Type::void(),
            name_tok: 2,
        });

        // the symbol entry does not hide the typedef for typedef lookup
        let (ty, tok) = scopes.find_typedef(name).unwrap();
        assert_eq!(ty, Type::int());
        assert_eq!(tok, 1);

        // but symbol lookup finds the symbol first
        assert!(matches!(
            scopes.find_symbol(name),
            Some(Scope::Symbol { name_tok: 2, .. })
        ));
    }

    #[test]
    fn truncate_pops_block_entries() {
        let mut scopes = ScopeStack::new();
        scopes.push(Scope::LoopSentinel);
        let mark = scopes.len();
        scopes.push(Scope::Symbol {
            name: Symbol::new("x"),
            ty: Type::int(),
            name_tok: 0,
        });
        assert!(scopes.find_symbol(Symbol::new("x")).is_some());
        scopes.truncate(mark);
        assert!(scopes.find_symbol(Symbol::new("x")).is_none());
        assert!(scopes.in_loop());
    }
}

//! Canonical type representation and the queries over it.
//!
//! A [`Type`] is a small `Copy` value: a specifier tag (whose derived
//! variants carry references into the [`TypeArena`]), an independent
//! qualifier set, and an alignment override. All auxiliary descriptors
//! (function signatures, array bounds, records, enums, pointed-to element
//! types) live in the arena owned by one translation unit's AST, so types
//! can be copied freely while records keep their identity.

use crate::ast::NodeRef;
use crate::context::CompileContext;
use crate::diagnostic::{Diag, DiagnosticEngine};
use crate::source_manager::SourceSpan;
use bitflags::bitflags;
use serde::Serialize;
use std::num::NonZeroU32;
use symbol_table::GlobalSymbol as Symbol;
use thin_vec::ThinVec;

/// Reference to an element [`Type`] stored in the arena (pointees and
/// `[*]` element types).
pub type ElemRef = NonZeroU32;
/// Reference to a [`FuncType`] descriptor.
pub type FuncRef = NonZeroU32;
/// Reference to an [`ArrayType`] descriptor.
pub type ArrayRef = NonZeroU32;
/// Reference to a [`VlaType`] descriptor.
pub type VlaRef = NonZeroU32;
/// Reference to a [`RecordType`] descriptor. Record equality is identity
/// on this reference.
pub type RecordRef = NonZeroU32;
/// Reference to an [`EnumType`] descriptor. Enum equality is identity.
pub type EnumRef = NonZeroU32;

bitflags! {
    /// Type qualifiers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Default)]
    pub struct Qualifiers: u8 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
        const ATOMIC = 1 << 3;
    }
}

impl std::fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (flag, word) in [
            (Qualifiers::CONST, "const"),
            (Qualifiers::VOLATILE, "volatile"),
            (Qualifiers::RESTRICT, "restrict"),
            (Qualifiers::ATOMIC, "atomic"),
        ] {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(word)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// The closed set of type specifiers. Derived forms carry their arena
/// payload, so a tag can never disagree with its payload variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Void,
    Bool,

    // integers; `char`, `signed char` and `unsigned char` are three
    // distinct types even when plain `char` is signed on the target
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,

    // floating point
    Float,
    Double,
    LongDouble,
    ComplexFloat,
    ComplexDouble,
    ComplexLongDouble,

    // derived
    Pointer(ElemRef),
    UnspecifiedVla(ElemRef),
    Array(ArrayRef),
    StaticArray(ArrayRef),
    IncompleteArray(ArrayRef),
    VariableLenArray(VlaRef),
    Func(FuncRef),
    VarArgsFunc(FuncRef),
    OldStyleFunc(FuncRef),
    Struct(RecordRef),
    Union(RecordRef),
    Enum(EnumRef),
}

/// A C type as a plain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Type {
    pub specifier: Specifier,
    pub qualifiers: Qualifiers,
    /// `_Alignas` override in bytes; 0 means natural alignment.
    pub alignment: u32,
}

impl Type {
    pub fn new(specifier: Specifier) -> Self {
        Type {
            specifier,
            qualifiers: Qualifiers::empty(),
            alignment: 0,
        }
    }

    pub fn qualified(specifier: Specifier, qualifiers: Qualifiers) -> Self {
        Type {
            specifier,
            qualifiers,
            alignment: 0,
        }
    }

    pub const fn int() -> Self {
        Type {
            specifier: Specifier::Int,
            qualifiers: Qualifiers::empty(),
            alignment: 0,
        }
    }

    pub const fn void() -> Self {
        Type {
            specifier: Specifier::Void,
            qualifiers: Qualifiers::empty(),
            alignment: 0,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.specifier, Specifier::Void)
    }

    pub fn is_int(&self) -> bool {
        use Specifier::*;
        matches!(
            self.specifier,
            Bool | Char | SChar | UChar | Short | UShort | Int | UInt | Long | ULong | LongLong
                | ULongLong
        )
    }

    pub fn is_float(&self) -> bool {
        use Specifier::*;
        matches!(
            self.specifier,
            Float | Double | LongDouble | ComplexFloat | ComplexDouble | ComplexLongDouble
        )
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.specifier, Specifier::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        use Specifier::*;
        matches!(
            self.specifier,
            Array(_) | StaticArray(_) | IncompleteArray(_) | VariableLenArray(_) | UnspecifiedVla(_)
        )
    }

    pub fn is_func(&self) -> bool {
        use Specifier::*;
        matches!(self.specifier, Func(_) | VarArgsFunc(_) | OldStyleFunc(_))
    }

    pub fn is_enum_or_record(&self) -> bool {
        use Specifier::*;
        matches!(self.specifier, Struct(_) | Union(_) | Enum(_))
    }

    /// Whether this is an unsigned integer type. Plain `char` consults
    /// the target's char signedness.
    pub fn is_unsigned_int(&self, ctx: &CompileContext) -> bool {
        use Specifier::*;
        match self.specifier {
            Bool | UChar | UShort | UInt | ULong | ULongLong => true,
            Char => !ctx.char_is_signed,
            _ => false,
        }
    }

    /// The C integer promotions. Types at least as wide as `int` are
    /// unchanged; `unsigned short` promotes to `int` when `int` can
    /// represent every `unsigned short` value, else to `unsigned int`.
    pub fn integer_promotion(self, ctx: &CompileContext) -> Type {
        use Specifier::*;
        let promoted = match self.specifier {
            Bool | Char | SChar | UChar | Short => Int,
            UShort => {
                if scalar_size(UShort, ctx) < scalar_size(Int, ctx) {
                    Int
                } else {
                    UInt
                }
            }
            _ => return self,
        };
        Type::new(promoted)
    }
}

/// Sizes of the non-derived specifiers, in bytes.
fn scalar_size(specifier: Specifier, ctx: &CompileContext) -> u64 {
    use Specifier::*;
    match specifier {
        Bool | Char | SChar | UChar => 1,
        Short | UShort => 2,
        Int | UInt | Float => 4,
        Long | ULong => ctx.long_width(),
        LongLong | ULongLong | Double => 8,
        LongDouble => 16,
        ComplexFloat => 8,
        ComplexDouble => 16,
        ComplexLongDouble => 32,
        _ => 0,
    }
}

/// One function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<Symbol>,
    /// Token index of the parameter name, 0 when anonymous.
    pub name_tok: u32,
    pub ty: Type,
    pub register: bool,
}

/// Function descriptor: return type plus ordered parameters. The
/// prototype flavor (fixed / variadic / old-style) lives in the
/// [`Specifier`] tag referencing this descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub return_type: Type,
    pub params: ThinVec<Param>,
}

/// Array descriptor for `array`, `static_array` and `incomplete_array`
/// (the length is meaningless for the latter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayType {
    pub elem: Type,
    pub len: u64,
}

/// Variable-length array descriptor; the bound is an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlaType {
    pub elem: Type,
    pub len_expr: NodeRef,
}

/// One struct/union field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Option<Symbol>,
    pub name_tok: u32,
    pub ty: Type,
    pub bit_width: Option<u32>,
}

/// Struct/union descriptor. `fields` is `None` until the definition has
/// been seen; completing the record fills it in place so every earlier
/// reference observes the completion.
#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: Option<Symbol>,
    pub fields: Option<ThinVec<Field>>,
    pub is_union: bool,
    /// Cached layout, valid once `fields` is set. Bit-field packing is
    /// not modeled; bit-fields contribute like plain members.
    pub size: u64,
    pub alignment: u64,
}

impl RecordType {
    pub fn is_complete(&self) -> bool {
        self.fields.is_some()
    }
}

/// One enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerator {
    pub name: Symbol,
    pub name_tok: u32,
    pub ty: Type,
    pub value: u64,
}

/// Enum descriptor; `enumerators` is `None` until the definition is seen.
#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: Option<Symbol>,
    pub tag_type: Type,
    pub enumerators: Option<ThinVec<Enumerator>>,
}

impl EnumType {
    pub fn is_complete(&self) -> bool {
        self.enumerators.is_some()
    }
}

/// Arena owning every type auxiliary of one translation unit.
///
/// Types reference descriptors by index; the arena outlives every `Type`
/// value derived from it and is dropped with the AST.
#[derive(Default)]
pub struct TypeArena {
    elems: Vec<Type>,
    funcs: Vec<FuncType>,
    arrays: Vec<ArrayType>,
    vlas: Vec<VlaType>,
    records: Vec<RecordType>,
    enums: Vec<EnumType>,
}

fn push_ref<T>(vec: &mut Vec<T>, value: T) -> NonZeroU32 {
    vec.push(value);
    NonZeroU32::new(vec.len() as u32).expect("arena index overflow")
}

fn ref_index(r: NonZeroU32) -> usize {
    (r.get() - 1) as usize
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    // === allocation & access ===

    pub fn push_elem(&mut self, ty: Type) -> ElemRef {
        push_ref(&mut self.elems, ty)
    }

    pub fn get_elem(&self, r: ElemRef) -> Type {
        self.elems[ref_index(r)]
    }

    pub fn push_func(&mut self, func: FuncType) -> FuncRef {
        push_ref(&mut self.funcs, func)
    }

    pub fn get_func(&self, r: FuncRef) -> &FuncType {
        &self.funcs[ref_index(r)]
    }

    /// Mutable descriptor access, used when K&R parameter declarations
    /// rebind a parameter's type in place.
    pub fn get_func_mut(&mut self, r: FuncRef) -> &mut FuncType {
        &mut self.funcs[ref_index(r)]
    }

    pub fn push_array(&mut self, array: ArrayType) -> ArrayRef {
        push_ref(&mut self.arrays, array)
    }

    pub fn get_array(&self, r: ArrayRef) -> &ArrayType {
        &self.arrays[ref_index(r)]
    }

    pub fn push_vla(&mut self, vla: VlaType) -> VlaRef {
        push_ref(&mut self.vlas, vla)
    }

    pub fn get_vla(&self, r: VlaRef) -> &VlaType {
        &self.vlas[ref_index(r)]
    }

    pub fn get_record(&self, r: RecordRef) -> &RecordType {
        &self.records[ref_index(r)]
    }

    pub fn get_enum(&self, r: EnumRef) -> &EnumType {
        &self.enums[ref_index(r)]
    }

    /// Start a record; it stays incomplete until [`Self::complete_record`].
    pub fn declare_record(&mut self, name: Option<Symbol>, is_union: bool) -> RecordRef {
        push_ref(
            &mut self.records,
            RecordType {
                name,
                fields: None,
                is_union,
                size: 0,
                alignment: 0,
            },
        )
    }

    /// Complete a record in place and cache its layout. Prior references
    /// observe the completion because they hold the same descriptor ref.
    pub fn complete_record(&mut self, r: RecordRef, fields: ThinVec<Field>, ctx: &CompileContext) {
        let is_union = self.records[ref_index(r)].is_union;
        let mut max_align: u64 = 1;
        let mut size: u64 = 0;
        for field in &fields {
            let field_size = self.sizeof(field.ty, ctx).unwrap_or(0);
            let field_align = self.alignof(field.ty, ctx).max(1);
            max_align = max_align.max(field_align);
            if is_union {
                size = size.max(field_size);
            } else {
                size = size.div_ceil(field_align) * field_align + field_size;
            }
        }
        size = size.div_ceil(max_align) * max_align;

        let record = &mut self.records[ref_index(r)];
        record.fields = Some(fields);
        record.size = size;
        record.alignment = max_align;
    }

    /// Start an enum; completed in place like records.
    pub fn declare_enum(&mut self, name: Option<Symbol>, tag_type: Type) -> EnumRef {
        push_ref(
            &mut self.enums,
            EnumType {
                name,
                tag_type,
                enumerators: None,
            },
        )
    }

    pub fn complete_enum(&mut self, r: EnumRef, enumerators: ThinVec<Enumerator>) {
        self.enums[ref_index(r)].enumerators = Some(enumerators);
    }

    // === derived-type constructors ===

    pub fn pointer_to(&mut self, elem: Type) -> Type {
        let r = self.push_elem(elem);
        Type::new(Specifier::Pointer(r))
    }

    /// Wrap `elem` in an array constructor, validating the element type.
    pub fn array_of(
        &mut self,
        elem: Type,
        kind: ArrayKind,
        span: SourceSpan,
        diag: &mut DiagnosticEngine,
    ) -> Type {
        self.check_array_elem(elem, span, diag);
        let specifier = match kind {
            ArrayKind::Fixed(len) => Specifier::Array(self.push_array(ArrayType { elem, len })),
            ArrayKind::Static(len) => {
                Specifier::StaticArray(self.push_array(ArrayType { elem, len }))
            }
            ArrayKind::Incomplete => {
                Specifier::IncompleteArray(self.push_array(ArrayType { elem, len: 0 }))
            }
            ArrayKind::Variable(len_expr) => {
                Specifier::VariableLenArray(self.push_vla(VlaType { elem, len_expr }))
            }
            ArrayKind::UnspecifiedVla => Specifier::UnspecifiedVla(self.push_elem(elem)),
        };
        Type::new(specifier)
    }

    /// Wrap `return_type` in a function constructor, validating it.
    pub fn func_of(
        &mut self,
        return_type: Type,
        params: ThinVec<Param>,
        variety: FuncVariety,
        span: SourceSpan,
        diag: &mut DiagnosticEngine,
    ) -> Type {
        self.check_return_type(return_type, span, diag);
        let r = self.push_func(FuncType {
            return_type,
            params,
        });
        let specifier = match variety {
            FuncVariety::Fixed => Specifier::Func(r),
            FuncVariety::VarArgs => Specifier::VarArgsFunc(r),
            FuncVariety::OldStyle => Specifier::OldStyleFunc(r),
        };
        Type::new(specifier)
    }

    fn check_array_elem(&self, elem: Type, span: SourceSpan, diag: &mut DiagnosticEngine) {
        if elem.is_func() {
            diag.report(Diag::ArrayOfFunctions, span);
        } else if self.is_incomplete(elem) {
            diag.report(Diag::ArrayIncompleteElem, span);
        }
        match elem.specifier {
            Specifier::StaticArray(_) => diag.report(Diag::StaticNonOutermostArray, span),
            Specifier::UnspecifiedVla(_) => diag.report(Diag::StarNonOutermostArray, span),
            _ => {}
        }
        if elem.is_array() && !elem.qualifiers.is_empty() {
            diag.report(Diag::QualifierNonOutermostArray, span);
        }
    }

    fn check_return_type(&self, return_type: Type, span: SourceSpan, diag: &mut DiagnosticEngine) {
        if return_type.is_array() {
            diag.report(Diag::FuncReturningArray, span);
        } else if return_type.is_func() {
            diag.report(Diag::FuncReturningFunc, span);
        }
    }

    /// Graft `outer` into the innermost non-derived slot of `inner`,
    /// rebuilding and revalidating each derived layer on the way down.
    ///
    /// This is what turns the parse order of `int (*a[10])(char)` into
    /// "array of pointers to function returning int": the parenthesized
    /// sub-declarator produces `inner` and the trailing suffixes produce
    /// `outer`.
    pub fn combine(
        &mut self,
        inner: Type,
        outer: Type,
        span: SourceSpan,
        diag: &mut DiagnosticEngine,
    ) -> Type {
        use Specifier::*;
        match inner.specifier {
            Pointer(r) => {
                let elem = self.get_elem(r);
                let elem = self.combine(elem, outer, span, diag);
                Type {
                    specifier: Pointer(self.push_elem(elem)),
                    ..inner
                }
            }
            UnspecifiedVla(r) => {
                let elem = self.get_elem(r);
                let elem = self.combine(elem, outer, span, diag);
                self.check_array_elem(elem, span, diag);
                Type {
                    specifier: UnspecifiedVla(self.push_elem(elem)),
                    ..inner
                }
            }
            Array(r) | StaticArray(r) | IncompleteArray(r) => {
                let desc = *self.get_array(r);
                let elem = self.combine(desc.elem, outer, span, diag);
                self.check_array_elem(elem, span, diag);
                let new_ref = self.push_array(ArrayType { elem, ..desc });
                let specifier = match inner.specifier {
                    Array(_) => Array(new_ref),
                    StaticArray(_) => StaticArray(new_ref),
                    _ => IncompleteArray(new_ref),
                };
                Type { specifier, ..inner }
            }
            VariableLenArray(r) => {
                let desc = *self.get_vla(r);
                let elem = self.combine(desc.elem, outer, span, diag);
                self.check_array_elem(elem, span, diag);
                Type {
                    specifier: VariableLenArray(self.push_vla(VlaType { elem, ..desc })),
                    ..inner
                }
            }
            Func(r) | VarArgsFunc(r) | OldStyleFunc(r) => {
                let desc = self.get_func(r).clone();
                let return_type = self.combine(desc.return_type, outer, span, diag);
                self.check_return_type(return_type, span, diag);
                let new_ref = self.push_func(FuncType {
                    return_type,
                    params: desc.params,
                });
                let specifier = match inner.specifier {
                    Func(_) => Func(new_ref),
                    VarArgsFunc(_) => VarArgsFunc(new_ref),
                    _ => OldStyleFunc(new_ref),
                };
                Type { specifier, ..inner }
            }
            // reached the innermost slot: overwrite it
            _ => outer,
        }
    }

    // === queries ===

    /// The referenced element of a pointer, array or VLA type.
    pub fn elem_type(&self, ty: Type) -> Option<Type> {
        use Specifier::*;
        match ty.specifier {
            Pointer(r) | UnspecifiedVla(r) => Some(self.get_elem(r)),
            Array(r) | StaticArray(r) | IncompleteArray(r) => Some(self.get_array(r).elem),
            VariableLenArray(r) => Some(self.get_vla(r).elem),
            _ => None,
        }
    }

    /// If `ty` can be called, the function type to call: either `ty`
    /// itself or, for pointers, the function type the pointee resolves to.
    pub fn is_callable(&self, ty: Type) -> Option<Type> {
        use Specifier::*;
        match ty.specifier {
            Func(_) | VarArgsFunc(_) | OldStyleFunc(_) => Some(ty),
            Pointer(r) => {
                let elem = self.get_elem(r);
                if elem.is_func() { Some(elem) } else { None }
            }
            _ => None,
        }
    }

    /// Incomplete object types: `void`, arrays without a length, and
    /// records/enums whose definition has not been seen. (VLAs are not
    /// incomplete; their size is simply not a compile-time constant.)
    pub fn is_incomplete(&self, ty: Type) -> bool {
        use Specifier::*;
        match ty.specifier {
            Void => true,
            IncompleteArray(_) => true,
            Array(r) | StaticArray(r) => self.is_incomplete(self.get_array(r).elem),
            Struct(r) | Union(r) => !self.get_record(r).is_complete(),
            Enum(r) => !self.get_enum(r).is_complete(),
            _ => false,
        }
    }

    /// Whether `sizeof` has no answer for this type.
    pub fn has_incomplete_size(&self, ty: Type) -> bool {
        use Specifier::*;
        match ty.specifier {
            Void | IncompleteArray(_) | VariableLenArray(_) | UnspecifiedVla(_) => true,
            // function types have no size either
            Func(_) | VarArgsFunc(_) | OldStyleFunc(_) => true,
            Array(r) => self.has_incomplete_size(self.get_array(r).elem),
            Struct(r) | Union(r) => !self.get_record(r).is_complete(),
            Enum(r) => !self.get_enum(r).is_complete(),
            _ => false,
        }
    }

    /// Size in bytes, or `None` exactly when [`Self::has_incomplete_size`].
    pub fn sizeof(&self, ty: Type, ctx: &CompileContext) -> Option<u64> {
        use Specifier::*;
        match ty.specifier {
            Void | IncompleteArray(_) | VariableLenArray(_) | UnspecifiedVla(_) => None,
            Func(_) | VarArgsFunc(_) | OldStyleFunc(_) => None,
            // a static-array parameter is a pointer at runtime
            Pointer(_) | StaticArray(_) => Some(ctx.pointer_width()),
            Array(r) => {
                let desc = self.get_array(r);
                self.sizeof(desc.elem, ctx)?.checked_mul(desc.len)
            }
            Struct(r) | Union(r) => {
                let record = self.get_record(r);
                record.is_complete().then_some(record.size)
            }
            Enum(r) => {
                let e = self.get_enum(r);
                if !e.is_complete() {
                    return None;
                }
                self.sizeof(e.tag_type, ctx)
            }
            specifier => Some(scalar_size(specifier, ctx)),
        }
    }

    /// Alignment in bytes: the `_Alignas` override when present, the
    /// natural alignment of the specifier otherwise.
    pub fn alignof(&self, ty: Type, ctx: &CompileContext) -> u64 {
        use Specifier::*;
        if ty.alignment != 0 {
            return ty.alignment as u64;
        }
        match ty.specifier {
            Array(r) | StaticArray(r) | IncompleteArray(r) => {
                self.alignof(self.get_array(r).elem, ctx)
            }
            VariableLenArray(r) => self.alignof(self.get_vla(r).elem, ctx),
            UnspecifiedVla(r) => self.alignof(self.get_elem(r), ctx),
            Pointer(_) => ctx.pointer_width(),
            Struct(r) | Union(r) => self.get_record(r).alignment.max(1),
            Enum(r) => self.alignof(self.get_enum(r).tag_type, ctx),
            Func(_) | VarArgsFunc(_) | OldStyleFunc(_) | Void => 1,
            specifier => scalar_size(specifier, ctx).clamp(1, 16),
        }
    }

    /// Structural equality. Parameter names are ignored; parameter types
    /// are always qualifier-checked; records and enums compare by
    /// identity.
    pub fn eql(&self, a: Type, b: Type, check_qualifiers: bool) -> bool {
        use Specifier::*;
        if check_qualifiers && a.qualifiers != b.qualifiers {
            return false;
        }
        if a.alignment != b.alignment {
            return false;
        }
        match (a.specifier, b.specifier) {
            (Pointer(x), Pointer(y)) | (UnspecifiedVla(x), UnspecifiedVla(y)) => {
                self.eql(self.get_elem(x), self.get_elem(y), check_qualifiers)
            }
            (Array(x), Array(y)) | (StaticArray(x), StaticArray(y)) => {
                let (dx, dy) = (self.get_array(x), self.get_array(y));
                dx.len == dy.len && self.eql(dx.elem, dy.elem, check_qualifiers)
            }
            (IncompleteArray(x), IncompleteArray(y)) => {
                // the stored length is meaningless here
                self.eql(self.get_array(x).elem, self.get_array(y).elem, check_qualifiers)
            }
            (VariableLenArray(x), VariableLenArray(y)) => {
                let (dx, dy) = (self.get_vla(x), self.get_vla(y));
                dx.len_expr == dy.len_expr && self.eql(dx.elem, dy.elem, check_qualifiers)
            }
            (Func(x), Func(y)) | (VarArgsFunc(x), VarArgsFunc(y))
            | (OldStyleFunc(x), OldStyleFunc(y)) => {
                let (fx, fy) = (self.get_func(x), self.get_func(y));
                fx.params.len() == fy.params.len()
                    && self.eql(fx.return_type, fy.return_type, check_qualifiers)
                    && fx
                        .params
                        .iter()
                        .zip(fy.params.iter())
                        .all(|(p, q)| self.eql(p.ty, q.ty, true))
            }
            (Struct(x), Struct(y)) | (Union(x), Union(y)) => x == y,
            (Enum(x), Enum(y)) => x == y,
            (x, y) => x == y,
        }
    }

    // === dump ===

    /// Render a type in the deliberately foreign dump syntax that makes
    /// pointer/array/function precedence unambiguous, e.g. the type of
    /// `int (*a[10])(char c)` renders as `[10]*fn (c: char) int`.
    pub fn dump(&self, ty: Type) -> String {
        let mut out = String::new();
        self.dump_into(ty, &mut out);
        out
    }

    fn dump_into(&self, ty: Type, out: &mut String) {
        use std::fmt::Write;
        use Specifier::*;

        if !ty.qualifiers.is_empty() {
            let _ = write!(out, "{} ", ty.qualifiers);
        }

        match ty.specifier {
            Pointer(r) => {
                out.push('*');
                self.dump_into(self.get_elem(r), out);
            }
            UnspecifiedVla(r) => {
                out.push_str("[*]");
                self.dump_into(self.get_elem(r), out);
            }
            Array(r) => {
                let desc = self.get_array(r);
                let _ = write!(out, "[{}]", desc.len);
                self.dump_into(desc.elem, out);
            }
            StaticArray(r) => {
                let desc = self.get_array(r);
                let _ = write!(out, "[static {}]", desc.len);
                self.dump_into(desc.elem, out);
            }
            IncompleteArray(r) => {
                out.push_str("[]");
                self.dump_into(self.get_array(r).elem, out);
            }
            VariableLenArray(r) => {
                out.push_str("[<expr>]");
                self.dump_into(self.get_vla(r).elem, out);
            }
            Func(r) | VarArgsFunc(r) | OldStyleFunc(r) => {
                let desc = self.get_func(r);
                out.push_str("fn (");
                for (i, param) in desc.params.iter().enumerate() {
                    if i != 0 {
                        out.push_str(", ");
                    }
                    if let Some(name) = param.name {
                        let _ = write!(out, "{}: ", name);
                    }
                    self.dump_into(param.ty, out);
                }
                if matches!(ty.specifier, VarArgsFunc(_)) {
                    if desc.params.is_empty() {
                        out.push_str("...");
                    } else {
                        out.push_str(", ...");
                    }
                }
                out.push_str(") ");
                self.dump_into(desc.return_type, out);
            }
            Struct(r) => {
                let _ = write!(out, "struct {}", name_or_anon(self.get_record(r).name));
            }
            Union(r) => {
                let _ = write!(out, "union {}", name_or_anon(self.get_record(r).name));
            }
            Enum(r) => {
                let _ = write!(out, "enum {}", name_or_anon(self.get_enum(r).name));
            }
            scalar => out.push_str(scalar_name(scalar)),
        }

        if ty.alignment != 0 {
            let _ = write!(out, " _Alignas({})", ty.alignment);
        }
    }
}

fn name_or_anon(name: Option<Symbol>) -> &'static str {
    match name {
        Some(name) => {
            // GlobalSymbol's as_str returns a 'static str
            name.as_str()
        }
        None => "<anonymous>",
    }
}

fn scalar_name(specifier: Specifier) -> &'static str {
    use Specifier::*;
    match specifier {
        Void => "void",
        Bool => "_Bool",
        Char => "char",
        SChar => "signed char",
        UChar => "unsigned char",
        Short => "short",
        UShort => "unsigned short",
        Int => "int",
        UInt => "unsigned int",
        Long => "long",
        ULong => "unsigned long",
        LongLong => "long long",
        ULongLong => "unsigned long long",
        Float => "float",
        Double => "double",
        LongDouble => "long double",
        ComplexFloat => "_Complex float",
        ComplexDouble => "_Complex double",
        ComplexLongDouble => "_Complex long double",
        _ => "<invalid>",
    }
}

/// How an array bound was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Fixed(u64),
    Static(u64),
    Incomplete,
    Variable(NodeRef),
    UnspecifiedVla,
}

/// The three function flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncVariety {
    Fixed,
    VarArgs,
    OldStyle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use target_lexicon::Triple;
    use thin_vec::thin_vec;

    fn linux_ctx() -> CompileContext {
        CompileContext::new(Triple::from_str("x86_64-unknown-linux-gnu").unwrap())
    }

    fn windows_ctx() -> CompileContext {
        CompileContext::new(Triple::from_str("x86_64-pc-windows-msvc").unwrap())
    }

    #[test]
    fn scalar_sizes() {
        let arena = TypeArena::new();
        let ctx = linux_ctx();
        assert_eq!(arena.sizeof(Type::new(Specifier::Char), &ctx), Some(1));
        assert_eq!(arena.sizeof(Type::new(Specifier::Short), &ctx), Some(2));
        assert_eq!(arena.sizeof(Type::int(), &ctx), Some(4));
        assert_eq!(arena.sizeof(Type::new(Specifier::Long), &ctx), Some(8));
        assert_eq!(arena.sizeof(Type::new(Specifier::LongLong), &ctx), Some(8));
        assert_eq!(arena.sizeof(Type::new(Specifier::LongDouble), &ctx), Some(16));
        assert_eq!(arena.sizeof(Type::new(Specifier::ComplexDouble), &ctx), Some(16));
        assert_eq!(arena.sizeof(Type::void(), &ctx), None);
    }

    #[test]
    fn long_depends_on_target() {
        let arena = TypeArena::new();
        assert_eq!(arena.sizeof(Type::new(Specifier::ULong), &linux_ctx()), Some(8));
        assert_eq!(arena.sizeof(Type::new(Specifier::ULong), &windows_ctx()), Some(4));
    }

    #[test]
    fn array_and_pointer_sizes() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let ctx = linux_ctx();
        let span = SourceSpan::empty();

        let ptr = arena.pointer_to(Type::int());
        assert_eq!(arena.sizeof(ptr, &ctx), Some(8));

        let arr = arena.array_of(Type::int(), ArrayKind::Fixed(10), span, &mut diag);
        assert_eq!(arena.sizeof(arr, &ctx), Some(40));

        let static_arr = arena.array_of(Type::int(), ArrayKind::Static(10), span, &mut diag);
        assert_eq!(arena.sizeof(static_arr, &ctx), Some(8));

        let incomplete = arena.array_of(Type::int(), ArrayKind::Incomplete, span, &mut diag);
        assert_eq!(arena.sizeof(incomplete, &ctx), None);
        assert!(arena.has_incomplete_size(incomplete));
        assert!(diag.diagnostics().is_empty());
    }

    #[test]
    fn sizeof_none_iff_incomplete_size() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let ctx = linux_ctx();
        let span = SourceSpan::empty();

        let record = arena.declare_record(Some(Symbol::new("s")), false);
        let record_ty = Type::new(Specifier::Struct(record));
        let candidates = [
            Type::int(),
            Type::void(),
            Type::new(Specifier::Double),
            arena.pointer_to(Type::int()),
            arena.array_of(Type::int(), ArrayKind::Fixed(3), span, &mut diag),
            arena.array_of(Type::int(), ArrayKind::Incomplete, span, &mut diag),
            record_ty,
        ];
        for ty in candidates {
            assert_eq!(
                arena.sizeof(ty, &ctx).is_none(),
                arena.has_incomplete_size(ty),
                "disagreement for {:?}",
                ty.specifier
            );
        }
    }

    #[test]
    fn record_completion_is_observed_through_old_refs() {
        let mut arena = TypeArena::new();
        let ctx = linux_ctx();

        let record = arena.declare_record(Some(Symbol::new("node")), false);
        let record_ty = Type::new(Specifier::Struct(record));
        let next_ptr = arena.pointer_to(record_ty);

        assert!(arena.is_incomplete(record_ty));
        assert_eq!(arena.sizeof(record_ty, &ctx), None);

        arena.complete_record(
            record,
            thin_vec![
                Field {
                    name: Some(Symbol::new("value")),
                    name_tok: 0,
                    ty: Type::int(),
                    bit_width: None,
                },
                Field {
                    name: Some(Symbol::new("next")),
                    name_tok: 0,
                    ty: next_ptr,
                    bit_width: None,
                },
            ],
            &ctx,
        );

        // the pointee seen through the earlier pointer is now complete
        let pointee = arena.elem_type(next_ptr).unwrap();
        assert!(!arena.is_incomplete(pointee));
        assert_eq!(arena.sizeof(record_ty, &ctx), Some(16));
        assert_eq!(arena.alignof(record_ty, &ctx), 8);
    }

    #[test]
    fn eql_reflexive_symmetric() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();

        let a = arena.pointer_to(Type::qualified(Specifier::Int, Qualifiers::CONST));
        let b = arena.pointer_to(Type::qualified(Specifier::Int, Qualifiers::CONST));
        let c = arena.array_of(a, ArrayKind::Fixed(4), span, &mut diag);
        let d = arena.array_of(b, ArrayKind::Fixed(4), span, &mut diag);

        for ty in [a, b, c, d] {
            assert!(arena.eql(ty, ty, true));
        }
        assert!(arena.eql(a, b, true));
        assert!(arena.eql(b, a, true));
        assert!(arena.eql(c, d, true));
        assert!(!arena.eql(a, c, true));
    }

    #[test]
    fn eql_respects_qualifier_flag() {
        let arena = TypeArena::new();
        let plain = Type::int();
        let constant = Type::qualified(Specifier::Int, Qualifiers::CONST);
        assert!(!arena.eql(plain, constant, true));
        assert!(arena.eql(plain, constant, false));
    }

    #[test]
    fn records_compare_by_identity() {
        let mut arena = TypeArena::new();
        let r1 = arena.declare_record(Some(Symbol::new("s")), false);
        let r2 = arena.declare_record(Some(Symbol::new("s")), false);
        let t1 = Type::new(Specifier::Struct(r1));
        let t2 = Type::new(Specifier::Struct(r2));
        assert!(arena.eql(t1, t1, true));
        assert!(!arena.eql(t1, t2, true));
    }

    #[test]
    fn function_eql_ignores_param_names() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();
        let param = |name: Option<&str>| Param {
            name: name.map(Symbol::new),
            name_tok: 0,
            ty: Type::new(Specifier::Char),
            register: false,
        };
        let f1 = arena.func_of(
            Type::int(),
            thin_vec![param(Some("a"))],
            FuncVariety::Fixed,
            span,
            &mut diag,
        );
        let f2 = arena.func_of(
            Type::int(),
            thin_vec![param(None)],
            FuncVariety::Fixed,
            span,
            &mut diag,
        );
        assert!(arena.eql(f1, f2, true));
    }

    #[test]
    fn combine_grafts_into_innermost_slot() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();

        // inner: [10]*<slot>, outer: fn (char) int
        let ptr = arena.pointer_to(Type::void());
        let inner = arena.array_of(ptr, ArrayKind::Fixed(10), span, &mut diag);
        let outer = arena.func_of(
            Type::int(),
            thin_vec![Param {
                name: Some(Symbol::new("c")),
                name_tok: 0,
                ty: Type::new(Specifier::Char),
                register: false,
            }],
            FuncVariety::Fixed,
            span,
            &mut diag,
        );

        let combined = arena.combine(inner, outer, span, &mut diag);
        assert_eq!(arena.dump(combined), "[10]*fn (c: char) int");
        assert!(diag.diagnostics().is_empty());
    }

    #[test]
    fn combine_layering_is_right_associative() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();

        let inner = arena.pointer_to(Type::void());
        let o1 = arena.pointer_to(Type::void());
        let o2 = Type::int();

        // grafting O1 then O2 ends with O2 in the innermost slot and O1
        // as the next-outer layer
        let step1 = arena.combine(inner, o1, span, &mut diag);
        let step2 = arena.combine(step1, o2, span, &mut diag);
        assert_eq!(arena.dump(step2), "**int");

        let direct = arena.combine(o1, o2, span, &mut diag);
        let expect = arena.combine(inner, direct, span, &mut diag);
        assert!(arena.eql(step2, expect, true));
    }

    #[test]
    fn combine_rejects_function_returning_array() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();

        let inner = arena.func_of(
            Type::void(),
            ThinVec::new(),
            FuncVariety::Fixed,
            span,
            &mut diag,
        );
        let outer = arena.array_of(Type::int(), ArrayKind::Fixed(4), span, &mut diag);
        assert!(diag.diagnostics().is_empty());

        let _ = arena.combine(inner, outer, span, &mut diag);
        assert!(
            diag.diagnostics()
                .iter()
                .any(|d| matches!(d.diag, Diag::FuncReturningArray))
        );
    }

    #[test]
    fn nested_static_array_is_rejected() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();

        let inner_static = arena.array_of(Type::int(), ArrayKind::Static(4), span, &mut diag);
        assert!(diag.diagnostics().is_empty());
        let _ = arena.array_of(inner_static, ArrayKind::Fixed(2), span, &mut diag);
        assert!(
            diag.diagnostics()
                .iter()
                .any(|d| matches!(d.diag, Diag::StaticNonOutermostArray))
        );
    }

    #[test]
    fn nested_unspecified_vla_is_rejected() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();

        let star = arena.array_of(Type::int(), ArrayKind::UnspecifiedVla, span, &mut diag);
        assert!(diag.diagnostics().is_empty());

        // grafting under a pointer is fine
        let ptr = arena.pointer_to(Type::void());
        let through_ptr = arena.combine(ptr, star, span, &mut diag);
        assert_eq!(arena.dump(through_ptr), "*[*]int");
        assert!(diag.diagnostics().is_empty());

        // nesting under another array is not
        let _ = arena.array_of(star, ArrayKind::Fixed(2), span, &mut diag);
        assert!(
            diag.diagnostics()
                .iter()
                .any(|d| matches!(d.diag, Diag::StarNonOutermostArray))
        );
    }

    #[test]
    fn promotion_rules() {
        let ctx = linux_ctx();
        for spec in [
            Specifier::Bool,
            Specifier::Char,
            Specifier::SChar,
            Specifier::UChar,
            Specifier::Short,
            Specifier::UShort,
        ] {
            let promoted = Type::new(spec).integer_promotion(&ctx);
            assert_eq!(promoted.specifier, Specifier::Int, "{:?}", spec);
            assert!(promoted.is_int());
        }
        for spec in [
            Specifier::Int,
            Specifier::UInt,
            Specifier::Long,
            Specifier::ULongLong,
        ] {
            let ty = Type::new(spec);
            assert_eq!(ty.integer_promotion(&ctx).specifier, spec);
            // idempotent on int-or-wider
            let twice = ty.integer_promotion(&ctx).integer_promotion(&ctx);
            assert_eq!(twice.specifier, spec);
        }
    }

    #[test]
    fn char_signedness_is_target_defined() {
        let mut ctx = linux_ctx();
        let char_ty = Type::new(Specifier::Char);
        assert!(!char_ty.is_unsigned_int(&ctx));
        ctx.char_is_signed = false;
        assert!(char_ty.is_unsigned_int(&ctx));
        // schar/uchar stay fixed regardless of the target default
        assert!(!Type::new(Specifier::SChar).is_unsigned_int(&ctx));
        assert!(Type::new(Specifier::UChar).is_unsigned_int(&ctx));
    }

    #[test]
    fn dump_qualifier_placement() {
        let mut arena = TypeArena::new();

        // const int *p  ->  *const int
        let p = arena.pointer_to(Type::qualified(Specifier::Int, Qualifiers::CONST));
        assert_eq!(arena.dump(p), "*const int");

        // int *const p  ->  const *int
        let inner = arena.pointer_to(Type::int());
        let q = Type {
            qualifiers: Qualifiers::CONST,
            ..inner
        };
        assert_eq!(arena.dump(q), "const *int");
    }

    #[test]
    fn dump_variadic_and_alignment() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();

        let f = arena.func_of(
            Type::int(),
            thin_vec![Param {
                name: None,
                name_tok: 0,
                ty: Type::new(Specifier::Char),
                register: false,
            }],
            FuncVariety::VarArgs,
            span,
            &mut diag,
        );
        assert_eq!(arena.dump(f), "fn (char, ...) int");

        let aligned = Type {
            alignment: 16,
            ..Type::int()
        };
        assert_eq!(arena.dump(aligned), "int _Alignas(16)");
    }

    #[test]
    fn is_callable_through_pointer() {
        let mut arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let span = SourceSpan::empty();

        let f = arena.func_of(
            Type::int(),
            ThinVec::new(),
            FuncVariety::Fixed,
            span,
            &mut diag,
        );
        let pf = arena.pointer_to(f);
        assert!(arena.is_callable(f).is_some());
        let through = arena.is_callable(pf).unwrap();
        assert!(through.is_func());
        assert!(arena.is_callable(Type::int()).is_none());
    }
}

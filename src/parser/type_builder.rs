//! The type-specifier accumulator.
//!
//! C allows type-specifier keywords in any order and several redundant
//! spellings (`signed long int long` means `long long`). The builder
//! absorbs one specifier token at a time, tracking the partial state it
//! has seen so far, and diagnoses an illegal combination the moment it
//! arises. `finalize` collapses the terminal state onto the canonical
//! specifier.

use crate::diagnostic::{Diag, DiagNote, DiagnosticEngine};
use crate::lexer::TokenKind;
use crate::source_manager::SourceSpan;
use crate::types::{Specifier, Type, TypeArena};

/// Every partial state a legal specifier prefix can reach, plus
/// [`Kind::Other`] for injected struct/union/enum/typedef types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    None,
    Void,
    Bool,

    Char,
    SChar,
    UChar,

    Signed,
    Unsigned,

    Short,
    ShortInt,
    SignedShort,
    SignedShortInt,
    UnsignedShort,
    UnsignedShortInt,

    Int,
    SignedInt,
    UnsignedInt,

    Long,
    LongInt,
    SignedLong,
    SignedLongInt,
    UnsignedLong,
    UnsignedLongInt,

    LongLong,
    LongLongInt,
    SignedLongLong,
    SignedLongLongInt,
    UnsignedLongLong,
    UnsignedLongLongInt,

    Float,
    Double,
    LongDouble,

    Complex,
    ComplexLong,
    ComplexFloat,
    ComplexDouble,
    ComplexLongDouble,

    /// An injected complete type: struct/union/enum specifier, typedef
    /// name, or any derived type. Only legal from [`Kind::None`].
    Other(Type),
}

/// Accumulates type-specifier tokens into a canonical base type.
pub struct TypeBuilder {
    pub kind: Kind,
    /// Token index of the typedef name that seeded [`Kind::Other`], for
    /// conflict diagnostics.
    pub typedef_tok: Option<u32>,
    typedef_span: Option<SourceSpan>,
}

impl Default for TypeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeBuilder {
    pub fn new() -> Self {
        TypeBuilder {
            kind: Kind::None,
            typedef_tok: None,
            typedef_span: None,
        }
    }

    /// Whether any specifier has been absorbed yet.
    pub fn is_none(&self) -> bool {
        self.kind == Kind::None
    }

    /// Absorb one specifier keyword. On an illegal combination a
    /// diagnostic is emitted and the state is left unchanged, so the rest
    /// of the declaration still parses against the best-effort type.
    pub fn combine(
        &mut self,
        token: TokenKind,
        span: SourceSpan,
        arena: &TypeArena,
        diag: &mut DiagnosticEngine,
    ) {
        use Kind::*;
        let new = spec_word(token);
        let next = match token {
            TokenKind::Void => match self.kind {
                None => Some(Void),
                Void => return self.duplicate(new, span, diag),
                _ => Option::None,
            },
            TokenKind::Bool => match self.kind {
                None => Some(Bool),
                Bool => return self.duplicate(new, span, diag),
                _ => Option::None,
            },
            TokenKind::Char => match self.kind {
                None => Some(Char),
                Signed => Some(SChar),
                Unsigned => Some(UChar),
                Char | SChar | UChar => return self.duplicate(new, span, diag),
                _ => Option::None,
            },
            TokenKind::Signed => match self.kind {
                None => Some(Signed),
                Char => Some(SChar),
                Short => Some(SignedShort),
                ShortInt => Some(SignedShortInt),
                Int => Some(SignedInt),
                Long => Some(SignedLong),
                LongInt => Some(SignedLongInt),
                LongLong => Some(SignedLongLong),
                LongLongInt => Some(SignedLongLongInt),
                Signed | SChar | SignedShort | SignedShortInt | SignedInt | SignedLong
                | SignedLongInt | SignedLongLong | SignedLongLongInt => {
                    return self.duplicate(new, span, diag);
                }
                _ => Option::None,
            },
            TokenKind::Unsigned => match self.kind {
                None => Some(Unsigned),
                Char => Some(UChar),
                Short => Some(UnsignedShort),
                ShortInt => Some(UnsignedShortInt),
                Int => Some(UnsignedInt),
                Long => Some(UnsignedLong),
                LongInt => Some(UnsignedLongInt),
                LongLong => Some(UnsignedLongLong),
                LongLongInt => Some(UnsignedLongLongInt),
                Unsigned | UChar | UnsignedShort | UnsignedShortInt | UnsignedInt
                | UnsignedLong | UnsignedLongInt | UnsignedLongLong | UnsignedLongLongInt => {
                    return self.duplicate(new, span, diag);
                }
                _ => Option::None,
            },
            TokenKind::Short => match self.kind {
                None => Some(Short),
                Int => Some(ShortInt),
                Signed => Some(SignedShort),
                SignedInt => Some(SignedShortInt),
                Unsigned => Some(UnsignedShort),
                UnsignedInt => Some(UnsignedShortInt),
                Short | ShortInt | SignedShort | SignedShortInt | UnsignedShort
                | UnsignedShortInt => return self.duplicate(new, span, diag),
                _ => Option::None,
            },
            TokenKind::Int => match self.kind {
                None => Some(Int),
                Signed => Some(SignedInt),
                Unsigned => Some(UnsignedInt),
                Short => Some(ShortInt),
                SignedShort => Some(SignedShortInt),
                UnsignedShort => Some(UnsignedShortInt),
                Long => Some(LongInt),
                SignedLong => Some(SignedLongInt),
                UnsignedLong => Some(UnsignedLongInt),
                LongLong => Some(LongLongInt),
                SignedLongLong => Some(SignedLongLongInt),
                UnsignedLongLong => Some(UnsignedLongLongInt),
                Int | ShortInt | SignedShortInt | UnsignedShortInt | SignedInt | UnsignedInt
                | LongInt | SignedLongInt | UnsignedLongInt | LongLongInt | SignedLongLongInt
                | UnsignedLongLongInt => return self.duplicate(new, span, diag),
                _ => Option::None,
            },
            TokenKind::Long => match self.kind {
                None => Some(Long),
                Int => Some(LongInt),
                Signed => Some(SignedLong),
                SignedInt => Some(SignedLongInt),
                Unsigned => Some(UnsignedLong),
                UnsignedInt => Some(UnsignedLongInt),
                Long => Some(LongLong),
                LongInt => Some(LongLongInt),
                SignedLong => Some(SignedLongLong),
                SignedLongInt => Some(SignedLongLongInt),
                UnsignedLong => Some(UnsignedLongLong),
                UnsignedLongInt => Some(UnsignedLongLongInt),
                Double => Some(LongDouble),
                Complex => Some(ComplexLong),
                ComplexDouble => Some(ComplexLongDouble),
                LongLong | LongLongInt | SignedLongLong | SignedLongLongInt | UnsignedLongLong
                | UnsignedLongLongInt | LongDouble | ComplexLong | ComplexLongDouble => {
                    return self.duplicate(new, span, diag);
                }
                _ => Option::None,
            },
            TokenKind::Float => match self.kind {
                None => Some(Float),
                Complex => Some(ComplexFloat),
                Float | ComplexFloat => return self.duplicate(new, span, diag),
                _ => Option::None,
            },
            TokenKind::Double => match self.kind {
                None => Some(Double),
                Long => Some(LongDouble),
                Complex => Some(ComplexDouble),
                ComplexLong => Some(ComplexLongDouble),
                Double | LongDouble | ComplexDouble | ComplexLongDouble => {
                    return self.duplicate(new, span, diag);
                }
                _ => Option::None,
            },
            TokenKind::Complex => match self.kind {
                None => Some(Complex),
                Long => Some(ComplexLong),
                Float => Some(ComplexFloat),
                Double => Some(ComplexDouble),
                LongDouble => Some(ComplexLongDouble),
                Complex | ComplexLong | ComplexFloat | ComplexDouble | ComplexLongDouble => {
                    return self.duplicate(new, span, diag);
                }
                _ => Option::None,
            },
            _ => Option::None,
        };

        match next {
            Some(kind) => self.kind = kind,
            Option::None => self.cannot_combine(new, span, arena, diag),
        }
    }

    /// Inject a complete type (struct/union/enum specifier, typedef name,
    /// or a derived type). Legal only when nothing was absorbed yet.
    pub fn inject(
        &mut self,
        ty: Type,
        typedef_tok: Option<u32>,
        span: SourceSpan,
        arena: &TypeArena,
        diag: &mut DiagnosticEngine,
    ) -> bool {
        if self.kind != Kind::None {
            self.cannot_combine("type specifier", span, arena, diag);
            return false;
        }
        self.kind = Kind::Other(ty);
        self.typedef_tok = typedef_tok;
        self.typedef_span = typedef_tok.map(|_| span);
        true
    }

    /// Record the real span of the typedef's declaration for notes.
    pub fn set_typedef_origin(&mut self, tok: u32, span: SourceSpan) {
        self.typedef_tok = Some(tok);
        self.typedef_span = Some(span);
    }

    fn duplicate(&mut self, word: &'static str, span: SourceSpan, diag: &mut DiagnosticEngine) {
        diag.report(Diag::DuplicateSpecifier(word), span);
    }

    fn cannot_combine(
        &self,
        word: &'static str,
        span: SourceSpan,
        arena: &TypeArena,
        diag: &mut DiagnosticEngine,
    ) {
        let prev = self.describe(arena);
        let mut notes = Vec::new();
        if let Some(typedef_span) = self.typedef_span {
            notes.push(DiagNote {
                message: "typedef introducing the conflicting type is here".to_string(),
                span: typedef_span,
            });
        }
        diag.report_with_notes(Diag::CannotCombine { new: word, prev }, span, notes);
    }

    /// Render the current state as the keyword phrase it was spelled
    /// with, for diagnostics.
    pub fn describe(&self, arena: &TypeArena) -> String {
        use Kind::*;
        match self.kind {
            None => "none".to_string(),
            Void => "void".to_string(),
            Bool => "_Bool".to_string(),
            Char => "char".to_string(),
            SChar => "signed char".to_string(),
            UChar => "unsigned char".to_string(),
            Signed => "signed".to_string(),
            Unsigned => "unsigned".to_string(),
            Short => "short".to_string(),
            ShortInt => "short int".to_string(),
            SignedShort => "signed short".to_string(),
            SignedShortInt => "signed short int".to_string(),
            UnsignedShort => "unsigned short".to_string(),
            UnsignedShortInt => "unsigned short int".to_string(),
            Int => "int".to_string(),
            SignedInt => "signed int".to_string(),
            UnsignedInt => "unsigned int".to_string(),
            Long => "long".to_string(),
            LongInt => "long int".to_string(),
            SignedLong => "signed long".to_string(),
            SignedLongInt => "signed long int".to_string(),
            UnsignedLong => "unsigned long".to_string(),
            UnsignedLongInt => "unsigned long int".to_string(),
            LongLong => "long long".to_string(),
            LongLongInt => "long long int".to_string(),
            SignedLongLong => "signed long long".to_string(),
            SignedLongLongInt => "signed long long int".to_string(),
            UnsignedLongLong => "unsigned long long".to_string(),
            UnsignedLongLongInt => "unsigned long long int".to_string(),
            Float => "float".to_string(),
            Double => "double".to_string(),
            LongDouble => "long double".to_string(),
            Complex => "_Complex".to_string(),
            ComplexLong => "_Complex long".to_string(),
            ComplexFloat => "_Complex float".to_string(),
            ComplexDouble => "_Complex double".to_string(),
            ComplexLongDouble => "_Complex long double".to_string(),
            Other(ty) => arena.dump(ty),
        }
    }

    /// Collapse the terminal state onto the canonical type.
    pub fn finalize(&self, span: SourceSpan, diag: &mut DiagnosticEngine) -> Type {
        use Kind::*;
        let specifier = match self.kind {
            None => {
                diag.report(Diag::MissingTypeSpecifier, span);
                Specifier::Int
            }
            Void => Specifier::Void,
            Bool => Specifier::Bool,
            Char => Specifier::Char,
            SChar => Specifier::SChar,
            UChar => Specifier::UChar,
            Signed | Int | SignedInt => Specifier::Int,
            Unsigned | UnsignedInt => Specifier::UInt,
            Short | ShortInt | SignedShort | SignedShortInt => Specifier::Short,
            UnsignedShort | UnsignedShortInt => Specifier::UShort,
            Long | LongInt | SignedLong | SignedLongInt => Specifier::Long,
            UnsignedLong | UnsignedLongInt => Specifier::ULong,
            LongLong | LongLongInt | SignedLongLong | SignedLongLongInt => Specifier::LongLong,
            UnsignedLongLong | UnsignedLongLongInt => Specifier::ULongLong,
            Float => Specifier::Float,
            Double => Specifier::Double,
            LongDouble => Specifier::LongDouble,
            ComplexFloat => Specifier::ComplexFloat,
            ComplexDouble => Specifier::ComplexDouble,
            ComplexLongDouble => Specifier::ComplexLongDouble,
            Complex => {
                diag.report(Diag::ComplexWithoutBase, span);
                Specifier::ComplexDouble
            }
            ComplexLong => {
                diag.report(Diag::ComplexWithoutBase, span);
                Specifier::ComplexLongDouble
            }
            Other(ty) => return ty,
        };
        Type::new(specifier)
    }
}

fn spec_word(token: TokenKind) -> &'static str {
    match token {
        TokenKind::Void => "void",
        TokenKind::Bool => "_Bool",
        TokenKind::Char => "char",
        TokenKind::Short => "short",
        TokenKind::Int => "int",
        TokenKind::Long => "long",
        TokenKind::Float => "float",
        TokenKind::Double => "double",
        TokenKind::Signed => "signed",
        TokenKind::Unsigned => "unsigned",
        TokenKind::Complex => "_Complex",
        _ => "type specifier",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Specifier;

    fn build(tokens: &[TokenKind]) -> (Type, DiagnosticEngine) {
        let arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let mut builder = TypeBuilder::new();
        for &token in tokens {
            builder.combine(token, SourceSpan::empty(), &arena, &mut diag);
        }
        let ty = builder.finalize(SourceSpan::empty(), &mut diag);
        (ty, diag)
    }

    fn build_ok(tokens: &[TokenKind]) -> Specifier {
        let (ty, diag) = build(tokens);
        assert!(
            diag.diagnostics().is_empty(),
            "unexpected diagnostics for {:?}: {:?}",
            tokens,
            diag.diagnostics()
        );
        ty.specifier
    }

    #[test]
    fn canonical_is_order_independent() {
        use TokenKind::*;
        // every spelling permutation of `unsigned long long int`
        let cases: &[&[TokenKind]] = &[
            &[Unsigned, Long, Long, Int],
            &[Long, Unsigned, Long, Int],
            &[Long, Long, Int, Unsigned],
            &[Long, Int, Unsigned, Long],
            &[Int, Long, Unsigned, Long],
        ];
        for tokens in cases {
            assert_eq!(build_ok(tokens), Specifier::ULongLong, "{:?}", tokens);
        }
    }

    #[test]
    fn redundant_spellings_collapse() {
        use TokenKind::*;
        assert_eq!(build_ok(&[Short, Int]), Specifier::Short);
        assert_eq!(build_ok(&[Int, Short]), Specifier::Short);
        assert_eq!(build_ok(&[Signed, Long, Long, Int]), Specifier::LongLong);
        assert_eq!(build_ok(&[Signed, Long, Int, Long]), Specifier::LongLong);
        assert_eq!(build_ok(&[Long, Int, Signed, Long]), Specifier::LongLong);
        assert_eq!(build_ok(&[Signed]), Specifier::Int);
        assert_eq!(build_ok(&[Unsigned]), Specifier::UInt);
        assert_eq!(build_ok(&[Signed, Char]), Specifier::SChar);
        assert_eq!(build_ok(&[Char, Unsigned]), Specifier::UChar);
        assert_eq!(build_ok(&[Double, Long]), Specifier::LongDouble);
        assert_eq!(build_ok(&[Long, Double]), Specifier::LongDouble);
    }

    #[test]
    fn complex_combinations() {
        use TokenKind::*;
        assert_eq!(build_ok(&[Complex, Float]), Specifier::ComplexFloat);
        assert_eq!(build_ok(&[Float, Complex]), Specifier::ComplexFloat);
        assert_eq!(build_ok(&[Complex, Double]), Specifier::ComplexDouble);
        assert_eq!(build_ok(&[Long, Double, Complex]), Specifier::ComplexLongDouble);
        assert_eq!(build_ok(&[Complex, Long, Double]), Specifier::ComplexLongDouble);
    }

    #[test]
    fn bare_complex_is_rejected() {
        let (ty, diag) = build(&[TokenKind::Complex]);
        assert_eq!(ty.specifier, Specifier::ComplexDouble);
        assert!(
            diag.diagnostics()
                .iter()
                .any(|d| matches!(d.diag, Diag::ComplexWithoutBase))
        );
    }

    #[test]
    fn signed_after_unsigned_cannot_combine() {
        use TokenKind::*;
        let (ty, diag) = build(&[Unsigned, Long, Long, Signed]);
        // best-effort result keeps the state before the bad token
        assert_eq!(ty.specifier, Specifier::ULongLong);
        let found = diag.diagnostics().iter().any(|d| {
            matches!(
                &d.diag,
                Diag::CannotCombine { new: "signed", prev } if prev == "unsigned long long"
            )
        });
        assert!(found, "{:?}", diag.diagnostics());
    }

    #[test]
    fn three_longs_is_duplicate() {
        use TokenKind::*;
        let (ty, diag) = build(&[Long, Long, Long]);
        assert_eq!(ty.specifier, Specifier::LongLong);
        assert!(
            diag.diagnostics()
                .iter()
                .any(|d| matches!(d.diag, Diag::DuplicateSpecifier("long")))
        );
    }

    #[test]
    fn empty_defaults_to_int_with_warning() {
        let (ty, diag) = build(&[]);
        assert_eq!(ty.specifier, Specifier::Int);
        assert!(
            diag.diagnostics()
                .iter()
                .any(|d| matches!(d.diag, Diag::MissingTypeSpecifier))
        );
    }

    #[test]
    fn injected_type_only_from_none() {
        let arena = TypeArena::new();
        let mut diag = DiagnosticEngine::new();
        let mut builder = TypeBuilder::new();
        builder.combine(TokenKind::Int, SourceSpan::empty(), &arena, &mut diag);
        let ok = builder.inject(Type::void(), None, SourceSpan::empty(), &arena, &mut diag);
        assert!(!ok);
        assert!(
            diag.diagnostics()
                .iter()
                .any(|d| matches!(d.diag, Diag::CannotCombine { .. }))
        );
    }
}

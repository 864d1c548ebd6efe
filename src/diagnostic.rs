//! Diagnostic machinery: tagged records, the collecting engine, and the
//! terminal renderer.
//!
//! Two error layers exist. [`Diag`] records are reported and parsing
//! continues with a best-effort result. [`ParseError`] is the
//! abort-current-declaration signal; the coordinator catches it at the
//! declaration boundary and resynchronizes.

use crate::lexer::TokenKind;
use crate::source_manager::{SourceManager, SourceSpan};
use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};
use symbol_table::GlobalSymbol as Symbol;

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Note,
}

/// Grammar errors that abort the current declaration or statement.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("expected {expected}, found {found:?}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        span: SourceSpan,
    },

    #[error("unexpected end of file")]
    UnexpectedEof { span: SourceSpan },

    #[error("{message}")]
    SyntaxError { message: String, span: SourceSpan },
}

impl ParseError {
    pub fn span(&self) -> SourceSpan {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span }
            | ParseError::SyntaxError { span, .. } => *span,
        }
    }
}

/// Every reported-and-continued diagnostic the front-end can emit.
///
/// The variant is the tag; the `thiserror` message is the rendering.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Diag {
    // === specifier builder ===
    #[error("duplicate '{0}' declaration specifier")]
    DuplicateSpecifier(&'static str),
    #[error("cannot combine '{new}' with '{prev}'")]
    CannotCombine { new: &'static str, prev: String },
    #[error("type specifier missing, defaults to 'int'")]
    MissingTypeSpecifier,
    #[error("'_Complex' requires a floating point type specifier")]
    ComplexWithoutBase,

    // === declaration specifiers ===
    #[error("cannot combine '{0}' with previous storage class")]
    MultipleStorageClass(&'static str),
    #[error("'_Thread_local' is only allowed with 'static' or 'extern'")]
    ThreadLocalBadStorage,
    #[error("'{0}' can only appear on functions")]
    FuncSpecNonFunction(&'static str),
    #[error("'_Thread_local' is not allowed on functions")]
    ThreadLocalFunc,
    #[error("illegal storage class '{0}' on file-scoped declaration")]
    IllegalStorageOnGlobal(&'static str),
    #[error("'{0}' is not a valid storage class for a function")]
    BadFuncStorage(&'static str),
    #[error("invalid storage class on function parameter")]
    ParamStorageClass,
    #[error("storage class is not allowed in this context")]
    BadStorageContext,

    // === initializers ===
    #[error("illegal initializer on a typedef")]
    TypedefInitializer,
    #[error("illegal initializer (only variables can be initialized)")]
    FunctionInitializer,
    #[error("'extern' declaration with an initializer is treated as a definition")]
    ExternInitializer,

    // === type composition ===
    #[error("array element type cannot be a function")]
    ArrayOfFunctions,
    #[error("array has incomplete element type")]
    ArrayIncompleteElem,
    #[error("type qualifiers are not allowed in a non-outermost array bound")]
    QualifierNonOutermostArray,
    #[error("'static' is not allowed in a non-outermost array bound")]
    StaticNonOutermostArray,
    #[error("'[*]' is only allowed in the outermost array bound")]
    StarNonOutermostArray,
    #[error("'static' in an array bound is only allowed on function parameters")]
    StaticOutsideParam,
    #[error("'[*]' is only allowed on function parameters")]
    StarBoundOutsideParam,
    #[error("variable length array is not allowed at file scope")]
    VlaFileScope,
    #[error("array has a negative size")]
    NegativeArraySize,
    #[error("function cannot return an array")]
    FuncReturningArray,
    #[error("function cannot return a function")]
    FuncReturningFunc,
    #[error("'restrict' requires a pointer type")]
    RestrictNonPointer,
    #[error("duplicate '{0}' qualifier")]
    DuplicateQualifier(&'static str),
    #[error("requested alignment is not a power of two")]
    BadAlignment,

    // === parameters ===
    #[error("'void' must be the only parameter")]
    VoidParamNotAlone,
    #[error("'void' parameter cannot be qualified")]
    QualifiedVoidParam,
    #[error("ISO C requires at least one named parameter before '...'")]
    EllipsisFirstParam,
    #[error("parameter '{0}' is not declared in the identifier list")]
    KnrUnknownParam(Symbol),
    #[error("old-style parameter '{0}' has no declared type, defaults to 'int'")]
    KnrParamMissingType(Symbol),

    // === declarations ===
    #[error("function definition is not allowed here")]
    FuncNotInRoot,
    #[error("declaration does not declare anything")]
    EmptyDeclaration,
    #[error("static assertion failed {expr} {msg}")]
    StaticAssertFailed { expr: String, msg: String },
    #[error("expression is not a constant expression")]
    ExpectedConstExpr,
    #[error("redefinition of '{0}'")]
    Redefinition(Symbol),
    #[error("bit-field width is negative or too large")]
    BadBitFieldWidth,

    // === statements ===
    #[error("'break' statement is not in a loop or switch")]
    BreakOutsideLoopOrSwitch,
    #[error("'continue' statement is not in a loop")]
    ContinueOutsideLoop,
    #[error("'case' label is not within a switch statement")]
    CaseOutsideSwitch,
    #[error("'default' label is not within a switch statement")]
    DefaultOutsideSwitch,

    // === expressions ===
    #[error("called object is not a function or function pointer")]
    NotCallable,
    #[error("invalid application of 'sizeof' to an incomplete type")]
    SizeofIncomplete,
    #[error("division by zero in constant expression")]
    DivByZero,
    #[error("use of undeclared identifier '{0}'")]
    UndeclaredIdentifier(Symbol),

    /// A caught [`ParseError`], recorded at its recovery boundary.
    #[error("{0}")]
    Syntax(String),

    // === lexer ===
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated character constant")]
    UnterminatedChar,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("invalid character '{0}' in source")]
    InvalidChar(char),
    #[error("invalid numeric constant '{0}'")]
    InvalidNumber(Symbol),
    #[error("preprocessor directives are not supported, line ignored")]
    DirectiveIgnored,
}

impl Diag {
    /// Default severity for this tag.
    pub fn level(&self) -> DiagnosticLevel {
        use Diag::*;
        match self {
            ExternInitializer
            | EmptyDeclaration
            | DuplicateQualifier(_)
            | DuplicateSpecifier(_)
            | MissingTypeSpecifier
            | KnrParamMissingType(_)
            | DirectiveIgnored => DiagnosticLevel::Warning,
            _ => DiagnosticLevel::Error,
        }
    }
}

/// A note attached to a diagnostic, pointing at related source.
#[derive(Debug, Clone)]
pub struct DiagNote {
    pub message: String,
    pub span: SourceSpan,
}

/// One submitted diagnostic record.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub diag: Diag,
    pub span: SourceSpan,
    pub notes: Vec<DiagNote>,
}

/// Collects diagnostics in submission order.
pub struct DiagnosticEngine {
    pub diagnostics: Vec<Diagnostic>,
    pub warnings_as_errors: bool,
    pub disable_all_warnings: bool,
}

impl Default for DiagnosticEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        DiagnosticEngine {
            diagnostics: Vec::new(),
            warnings_as_errors: false,
            disable_all_warnings: false,
        }
    }

    pub fn from_warnings(warnings: &[String]) -> Self {
        let warnings_as_errors = warnings.iter().any(|w| w == "error");
        let disable_all_warnings = warnings.iter().any(|w| w == "no-warnings");
        Self {
            diagnostics: Vec::new(),
            warnings_as_errors,
            disable_all_warnings,
        }
    }

    /// Submit one diagnostic record.
    pub fn report(&mut self, diag: Diag, span: SourceSpan) {
        self.report_with_notes(diag, span, Vec::new());
    }

    pub fn report_with_notes(&mut self, diag: Diag, span: SourceSpan, notes: Vec<DiagNote>) {
        let mut level = diag.level();
        if level == DiagnosticLevel::Warning {
            if self.disable_all_warnings {
                return;
            }
            if self.warnings_as_errors {
                level = DiagnosticLevel::Error;
            }
        }
        self.diagnostics.push(Diagnostic {
            level,
            diag,
            span,
            notes,
        });
    }

    /// Record an abort-signal error as a plain diagnostic, used when the
    /// coordinator catches a [`ParseError`] at a recovery boundary.
    pub fn report_parse_error(&mut self, error: &ParseError) {
        self.diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Error,
            diag: Diag::Syntax(error.to_string()),
            span: error.span(),
            notes: Vec::new(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Renders diagnostics with source context using annotate_snippets.
pub struct ErrorFormatter {
    pub use_colors: bool,
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        ErrorFormatter { use_colors: true }
    }
}

impl ErrorFormatter {
    pub fn format_diagnostic(&self, diag: &Diagnostic, source_manager: &SourceManager) -> String {
        let renderer = if self.use_colors {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        let title = diag.diag.to_string();
        let mut group = Group::with_title(self.level(diag).primary_title(&title));

        if !diag.span.is_builtin() {
            group = group.element(self.create_snippet(diag, source_manager));
        }
        for note in &diag.notes {
            group = group.element(Level::NOTE.message(&note.message));
        }

        let report = &[group];
        renderer.render(report).to_string()
    }

    fn level<'a>(&self, diag: &Diagnostic) -> Level<'a> {
        match diag.level {
            DiagnosticLevel::Error => Level::ERROR,
            DiagnosticLevel::Warning => Level::WARNING,
            DiagnosticLevel::Note => Level::NOTE,
        }
    }

    fn create_snippet<'a>(
        &self,
        diag: &'a Diagnostic,
        source_manager: &'a SourceManager,
    ) -> Snippet<'a, annotate_snippets::Annotation<'a>> {
        let source = source_manager.source_text(diag.span.source_id());
        let path = source_manager.file_name(diag.span.source_id());

        Snippet::source(source).line_start(1).path(path).annotation(
            AnnotationKind::Primary
                .span(diag.span.start_offset() as usize..diag.span.end_offset() as usize),
        )
    }

    /// Print all diagnostics to stderr.
    pub fn print_diagnostics(&self, diagnostics: &[Diagnostic], source_manager: &SourceManager) {
        for diag in diagnostics {
            eprintln!("{}", self.format_diagnostic(diag, source_manager));
        }
    }
}

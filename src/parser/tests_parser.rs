#![cfg(test)]
//! End-to-end declaration tests: source in, dumped types and
//! diagnostics out.

use crate::ast::{DeclTag, NodeKind};
use crate::context::CompileContext;
use crate::diagnostic::Diag;
use crate::driver::{compile_source, Compilation};
use crate::types::Specifier;
use std::str::FromStr;
use target_lexicon::Triple;

fn compile(source: &str) -> Compilation {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = CompileContext::new(Triple::from_str("x86_64-unknown-linux-gnu").unwrap());
    compile_source(source, "<test>", &ctx, &[])
}

/// Dump the type of the declaration named `name`, searching the whole
/// node vector so block-scope declarations are found too.
fn declared_type(source: &str, name: &str) -> String {
    let compilation = compile(source);
    let node = compilation
        .ast
        .nodes
        .iter()
        .find(|n| match &n.kind {
            NodeKind::Decl {
                name: Some(sym), ..
            } => sym.as_str() == name,
            _ => false,
        })
        .unwrap_or_else(|| panic!("no declaration named '{name}'"));
    compilation.ast.types.dump(node.ty)
}

fn decl_tag(compilation: &Compilation, name: &str) -> DeclTag {
    compilation
        .ast
        .nodes
        .iter()
        .find_map(|n| match &n.kind {
            NodeKind::Decl {
                tag,
                name: Some(sym),
                ..
            } if sym.as_str() == name => Some(*tag),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no declaration named '{name}'"))
}

fn has_diag(compilation: &Compilation, test: impl Fn(&Diag) -> bool) -> bool {
    compilation.diag.diagnostics().iter().any(|d| test(&d.diag))
}

fn assert_clean(source: &str) -> Compilation {
    let compilation = compile(source);
    assert!(
        compilation.diag.diagnostics().is_empty(),
        "unexpected diagnostics for {source:?}: {:?}",
        compilation
            .diag
            .diagnostics()
            .iter()
            .map(|d| d.diag.to_string())
            .collect::<Vec<_>>()
    );
    compilation
}

// === the canonical declarator scenarios ===

#[test]
fn plain_int() {
    assert_eq!(declared_type("int x;", "x"), "int");
}

#[test]
fn pointer_to_const_int() {
    assert_eq!(declared_type("const int *p;", "p"), "*const int");
}

#[test]
fn const_pointer_to_int() {
    assert_eq!(declared_type("int *const p;", "p"), "const *int");
}

#[test]
fn array_of_pointers_to_function() {
    assert_eq!(
        declared_type("int (*a[10])(char c);", "a"),
        "[10]*fn (c: char) int"
    );
}

#[test]
fn function_returning_pointer() {
    assert_eq!(declared_type("int *f(void);", "f"), "fn () *int");
}

#[test]
fn pointer_to_array_vs_array_of_pointers() {
    assert_eq!(declared_type("int *a[10];", "a"), "[10]*int");
    assert_eq!(declared_type("int (*a)[10];", "a"), "*[10]int");
}

#[test]
fn pointer_to_function_pointer_mix() {
    assert_eq!(declared_type("int *(*f)(void);", "f"), "*fn () *int");
    assert_eq!(declared_type("char **argv;", "argv"), "**char");
}

#[test]
fn multi_dimensional_arrays() {
    assert_eq!(declared_type("int a[2][3];", "a"), "[2][3]int");
    assert_eq!(declared_type("int *a[2][3];", "a"), "[2][3]*int");
}

#[test]
fn qualified_pointer_chain() {
    assert_eq!(
        declared_type("int *const *volatile p;", "p"),
        "volatile *const *int"
    );
}

// === specifier permutations through full declarations ===

#[test]
fn specifier_order_does_not_matter() {
    for source in [
        "unsigned long long int x;",
        "long unsigned long int x;",
        "long long unsigned x;",
        "int long unsigned long x;",
    ] {
        let compilation = assert_clean(source);
        let node = compilation
            .ast
            .nodes
            .iter()
            .find(|n| matches!(&n.kind, NodeKind::Decl { .. }))
            .unwrap();
        assert_eq!(node.ty.specifier, Specifier::ULongLong, "{source}");
    }
}

#[test]
fn cannot_combine_signed_with_unsigned_long_long() {
    let compilation = compile("unsigned long long signed;");
    assert!(has_diag(&compilation, |d| matches!(
        d,
        Diag::CannotCombine { new: "signed", prev } if prev == "unsigned long long"
    )));
    // the best-effort type survives
    let node = compilation
        .ast
        .nodes
        .iter()
        .find(|n| matches!(&n.kind, NodeKind::TagDecl))
        .unwrap();
    assert_eq!(node.ty.specifier, Specifier::ULongLong);
}

#[test]
fn missing_type_specifier_defaults_to_int() {
    let compilation = compile("static x;");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::MissingTypeSpecifier)));
    assert_eq!(declared_type("static x;", "x"), "int");
}

// === static assertions ===

#[test]
fn static_assert_passes() {
    assert_clean("_Static_assert(1 + 1 == 2, \"ok\");");
    assert_clean("static_assert(1 + 1 == 2, \"ok\");");
}

#[test]
fn static_assert_failure_quotes_expression_and_message() {
    let compilation = compile("_Static_assert(0, \"fail\");");
    let found = compilation.diag.diagnostics().iter().any(|d| {
        let message = d.diag.to_string();
        message.contains("'0' \"fail\"")
    });
    assert!(found, "{:?}", compilation.diag.diagnostics());
}

#[test]
fn static_assert_requires_constant() {
    let compilation = compile("int x; _Static_assert(x, \"nope\");");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::ExpectedConstExpr)));
}

// === typedefs ===

#[test]
fn typedef_use() {
    assert_eq!(declared_type("typedef int T; T *q;", "q"), "*int");
}

#[test]
fn typedef_of_function_pointer() {
    let source = "typedef int (*handler)(char); handler h;";
    assert_eq!(declared_type(source, "h"), "*fn (char) int");
}

#[test]
fn typedef_tag_is_recorded() {
    let compilation = compile("typedef int T; T *q;");
    assert_eq!(decl_tag(&compilation, "T"), DeclTag::Typedef);
}

#[test]
fn typedef_redeclaration_must_match() {
    // identical redeclaration is fine
    assert_clean("typedef int T; typedef int T; T x;");

    let compilation = compile("typedef int T; typedef long T;");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::Redefinition(_))));
}

#[test]
fn typedef_cannot_follow_other_specifiers() {
    // `T` is not a typedef use after `unsigned`; the declaration is
    // ill-formed and recovery kicks in
    let compilation = compile("typedef int T; unsigned T x; int ok;");
    assert!(compilation.diag.has_errors());
    assert_eq!(declared_type("typedef int T; unsigned T x; int ok;", "ok"), "int");
}

// === parameters ===

#[test]
fn void_parameter_list_vs_empty_parens() {
    assert_eq!(declared_type("int f(void);", "f"), "fn () int");
    // `()` leaves the arguments unspecified
    assert_eq!(declared_type("int g();", "g"), "fn (...) int");
}

#[test]
fn void_must_be_alone() {
    let compilation = compile("int f(void, int);");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::VoidParamNotAlone)));

    let compilation = compile("int f(const void);");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::QualifiedVoidParam)));
}

#[test]
fn variadic_function() {
    assert_eq!(declared_type("int f(char c, ...);", "f"), "fn (c: char, ...) int");
    let compilation = compile("int f(...);");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::EllipsisFirstParam)));
}

#[test]
fn array_parameters_adjust_to_pointers() {
    assert_eq!(declared_type("void f(int a[10]);", "f"), "fn (a: *int) void");
    assert_eq!(declared_type("void f(int a[]);", "f"), "fn (a: *int) void");
    assert_eq!(
        declared_type("void f(int a[const 10]);", "f"),
        "fn (a: const *int) void"
    );
}

#[test]
fn static_array_parameter_keeps_its_form() {
    assert_eq!(
        declared_type("void f(int a[static 10]);", "f"),
        "fn (a: [static 10]int) void"
    );
    assert_eq!(declared_type("void f(int a[*]);", "f"), "fn (a: [*]int) void");
}

#[test]
fn function_parameters_adjust_to_pointers() {
    assert_eq!(
        declared_type("void f(int cb(char));", "f"),
        "fn (cb: *fn (char) int) void"
    );
}

#[test]
fn static_bound_outside_parameters_is_rejected() {
    let compilation = compile("int a[static 10];");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::StaticOutsideParam)));

    let compilation = compile("int a[*];");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::StarBoundOutsideParam)));
}

#[test]
fn star_bound_under_pointer_outside_parameters() {
    // the sub-declarator graft runs combine over the [*] type
    let source = "int (*p)[*];";
    let compilation = compile(source);
    assert!(has_diag(&compilation, |d| matches!(d, Diag::StarBoundOutsideParam)));
    assert_eq!(declared_type(source, "p"), "*[*]int");
}

#[test]
fn star_bound_must_be_outermost() {
    let compilation = compile("void f(int a[2][*]);");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::StarNonOutermostArray)));
}

// === composed-type validation ===

#[test]
fn array_of_functions_is_rejected() {
    let compilation = compile("int f[10](void);");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::ArrayOfFunctions)));
}

#[test]
fn function_returning_function_is_rejected() {
    let compilation = compile("int f(void)(int);");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::FuncReturningFunc)));
}

#[test]
fn function_returning_array_is_rejected() {
    let compilation = compile("int f(void)[10];");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::FuncReturningArray)));
}

#[test]
fn array_of_incomplete_type_is_rejected() {
    let compilation = compile("void a[10];");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::ArrayIncompleteElem)));

    let compilation = compile("struct s; struct s a[4];");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::ArrayIncompleteElem)));
}

#[test]
fn restrict_requires_pointer() {
    let compilation = compile("restrict int x;");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::RestrictNonPointer)));
    assert_clean("int *restrict p;");
}

#[test]
fn negative_array_size_is_rejected() {
    let compilation = compile("int a[-1];");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::NegativeArraySize)));
}

// === records & enums ===

#[test]
fn struct_declaration_and_use() {
    let source = "struct point { int x; int y; }; struct point p;";
    assert_eq!(declared_type(source, "p"), "struct point");
    assert_clean(source);
}

#[test]
fn self_referential_struct() {
    let source = "struct node { int value; struct node *next; }; struct node n;";
    let compilation = assert_clean(source);

    // sizeof sees the completed record through the earlier pointer
    let node = compilation
        .ast
        .nodes
        .iter()
        .find(|n| matches!(&n.kind, NodeKind::Decl { name: Some(s), .. } if s.as_str() == "n"))
        .unwrap();
    let ctx = CompileContext::new(Triple::from_str("x86_64-unknown-linux-gnu").unwrap());
    assert_eq!(compilation.ast.types.sizeof(node.ty, &ctx), Some(16));
}

#[test]
fn sizeof_struct_in_array_bound() {
    let source = "struct pair { int a; int b; }; char buf[sizeof(struct pair)];";
    assert_eq!(declared_type(source, "buf"), "[8]char");
}

#[test]
fn anonymous_struct_member() {
    assert_clean("struct outer { struct { int x; }; int y; } o;");
}

#[test]
fn bit_fields() {
    assert_clean("struct flags { unsigned a : 1; unsigned b : 3; unsigned : 4; };");
    let compilation = compile("struct flags { unsigned a : 99; };");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::BadBitFieldWidth)));
}

#[test]
fn enum_constants_fold() {
    let source = "enum color { RED, GREEN = 5, BLUE }; int x[BLUE];";
    assert_eq!(declared_type(source, "x"), "[6]int");
}

#[test]
fn enum_type_dump() {
    assert_eq!(
        declared_type("enum color { RED } c;", "c"),
        "enum color"
    );
}

// === function definitions ===

#[test]
fn simple_function_definition() {
    let source = "int add(int a, int b) { return a + b; }";
    let compilation = assert_clean(source);
    assert_eq!(decl_tag(&compilation, "add"), DeclTag::FnDef);
    assert_eq!(declared_type(source, "add"), "fn (a: int, b: int) int");
}

#[test]
fn definition_tags_cover_specifier_cross_product() {
    let compilation = compile("static int f(void) { return 0; }");
    assert_eq!(decl_tag(&compilation, "f"), DeclTag::StaticFnDef);

    let compilation = compile("static inline int g(void) { return 0; }");
    assert_eq!(decl_tag(&compilation, "g"), DeclTag::InlineStaticFnDef);

    let compilation = compile("_Noreturn void h(void) { while (1) ; }");
    assert_eq!(decl_tag(&compilation, "h"), DeclTag::NoreturnFnDef);

    let compilation = compile("inline int p(void);");
    assert_eq!(decl_tag(&compilation, "p"), DeclTag::InlineFnProto);
}

#[test]
fn empty_parens_definition_downgrades_to_fixed() {
    let source = "int f() { return 0; }";
    assert_eq!(declared_type(source, "f"), "fn () int");
}

#[test]
fn recursive_function_sees_itself() {
    assert_clean("int fact(int n) { if (n < 2) return 1; return n * fact(n - 1); }");
}

#[test]
fn nested_function_definition_is_rejected() {
    let compilation = compile("int f(void) { int g(void) { return 1; } return 0; }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::FuncNotInRoot)));
}

#[test]
fn old_style_definition_binds_parameters() {
    let source = "int f(a, b) int a; char b; { return a; }";
    let compilation = compile(source);
    assert!(!compilation.diag.has_errors());
    assert_eq!(declared_type(source, "f"), "fn (a: int, b: char) int");
}

#[test]
fn old_style_unknown_parameter_diagnoses() {
    let compilation = compile("int f(a) int b; { return 0; }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::KnrUnknownParam(_))));
}

#[test]
fn old_style_missing_declaration_warns() {
    let compilation = compile("int f(a) { return a; }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::KnrParamMissingType(_))));
}

// === storage classes & specifiers ===

#[test]
fn storage_class_tags() {
    let compilation = compile("static int s; extern int e; _Thread_local int t;");
    assert_eq!(decl_tag(&compilation, "s"), DeclTag::StaticVar);
    assert_eq!(decl_tag(&compilation, "e"), DeclTag::ExternVar);
    assert_eq!(decl_tag(&compilation, "t"), DeclTag::ThreadLocalVar);

    let compilation = compile("_Thread_local static int ts;");
    assert_eq!(decl_tag(&compilation, "ts"), DeclTag::ThreadLocalStaticVar);
}

#[test]
fn multiple_storage_classes_diagnose() {
    let compilation = compile("static extern int x;");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::MultipleStorageClass(_))));
}

#[test]
fn thread_local_requires_static_or_extern() {
    let compilation = compile("int f(void) { _Thread_local register int x; return 0; }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::ThreadLocalBadStorage)));
}

#[test]
fn inline_on_non_function_diagnoses() {
    let compilation = compile("inline int x;");
    assert!(has_diag(&compilation, |d| matches!(
        d,
        Diag::FuncSpecNonFunction("inline")
    )));
}

#[test]
fn duplicate_noreturn_keeps_first() {
    let compilation = compile("_Noreturn _Noreturn void f(void);");
    assert!(has_diag(&compilation, |d| matches!(
        d,
        Diag::DuplicateSpecifier("_Noreturn")
    )));
    assert_eq!(decl_tag(&compilation, "f"), DeclTag::NoreturnFnProto);
}

#[test]
fn extern_with_initializer_downgrades() {
    let compilation = compile("extern int x = 5;");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::ExternInitializer)));
    assert_eq!(decl_tag(&compilation, "x"), DeclTag::Var);
}

#[test]
fn typedef_with_initializer_diagnoses() {
    let compilation = compile("typedef int T = 5;");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::TypedefInitializer)));
}

#[test]
fn function_with_initializer_diagnoses() {
    let compilation = compile("int f(void) = 0;");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::FunctionInitializer)));
}

// === alignment ===

#[test]
fn alignas_constant() {
    assert_eq!(declared_type("_Alignas(16) int x;", "x"), "int _Alignas(16)");
}

#[test]
fn alignas_must_be_power_of_two() {
    let compilation = compile("_Alignas(3) int x;");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::BadAlignment)));
}

// === statements & scopes ===

#[test]
fn vla_in_function_body() {
    let source = "void f(int n) { int a[n]; }";
    assert_eq!(declared_type(source, "a"), "[<expr>]int");
    assert_clean(source);
}

#[test]
fn break_outside_loop_diagnoses() {
    let compilation = compile("int f(void) { break; return 0; }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::BreakOutsideLoopOrSwitch)));
}

#[test]
fn case_labels_inside_switch() {
    assert_clean(
        "int f(int x) { switch (x) { case 1: return 1; default: break; } return 0; }",
    );
    let compilation = compile("int f(int x) { case 1: return 1; }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::CaseOutsideSwitch)));
}

#[test]
fn continue_requires_loop() {
    assert_clean("void f(int n) { while (n) { continue; } }");
    let compilation = compile("int f(int x) { switch (x) { default: continue; } return 0; }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::ContinueOutsideLoop)));
}

#[test]
fn calling_a_non_function_diagnoses() {
    let compilation = compile("int f(void) { int x; return x(); }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::NotCallable)));
}

#[test]
fn call_through_function_pointer_is_fine() {
    assert_clean("int f(int (*cb)(void)) { return cb(); }");
}

#[test]
fn undeclared_identifier_diagnoses() {
    let compilation = compile("int f(void) { return y; }");
    assert!(has_diag(&compilation, |d| matches!(d, Diag::UndeclaredIdentifier(_))));
}

// === error recovery ===

#[test]
fn recovery_resumes_at_next_declaration() {
    let compilation = compile("int (;) ; int y;");
    assert!(compilation.diag.has_errors());
    assert_eq!(declared_type("int (;) ; int y;", "y"), "int");
}

#[test]
fn recovery_inside_function_body() {
    let source = "int f(void) { 1 + ; int x; return x; }";
    let compilation = compile(source);
    assert!(compilation.diag.has_errors());
    // the body keeps parsing after the bad statement
    assert_eq!(declared_type(source, "x"), "int");
}

// === initializers & misc declarations ===

#[test]
fn initializers_parse() {
    assert_clean("int x = 1 + 2;");
    assert_clean("int a[3] = { 1, 2, 3 };");
    assert_clean("int m[2][2] = { { 1, 2 }, { 3, 4 } };");
}

#[test]
fn multiple_declarators_share_the_base_type() {
    let source = "int x, *p, a[4], f(void);";
    assert_eq!(declared_type(source, "x"), "int");
    assert_eq!(declared_type(source, "p"), "*int");
    assert_eq!(declared_type(source, "a"), "[4]int");
    assert_eq!(declared_type(source, "f"), "fn () int");
}

#[test]
fn sizeof_expression_folds() {
    assert_eq!(declared_type("char buf[sizeof(long)];", "buf"), "[8]char");
    assert_eq!(declared_type("char buf[sizeof(int[3])];", "buf"), "[12]char");
}

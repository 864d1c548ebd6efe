//! The compilation pipeline: source text to tokens to AST, plus the
//! observable dumps used by the CLI and the tests.

use crate::ast::{Ast, NodeKind};
use crate::context::CompileContext;
use crate::diagnostic::{DiagnosticEngine, ErrorFormatter};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::source_manager::SourceManager;
use std::path::Path;

/// The result of parsing one translation unit.
pub struct Compilation {
    pub source_manager: SourceManager,
    pub diag: DiagnosticEngine,
    pub ast: Ast,
}

/// Parse an in-memory buffer.
pub fn compile_source(
    source: &str,
    path: &str,
    ctx: &CompileContext,
    warnings: &[String],
) -> Compilation {
    let mut source_manager = SourceManager::new();
    let source_id = source_manager.add_source(source.to_string(), path);

    let mut diag = DiagnosticEngine::from_warnings(warnings);
    let tokens = Lexer::new(&source_manager, source_id, &mut diag).tokenize();

    let mut ast = Ast::new();
    let mut parser = Parser::new(&tokens, &mut ast, &mut diag, ctx, &source_manager);
    parser.parse_translation_unit();

    Compilation {
        source_manager,
        diag,
        ast,
    }
}

/// Parse a file from disk.
pub fn compile_file(
    path: &Path,
    ctx: &CompileContext,
    warnings: &[String],
) -> std::io::Result<Compilation> {
    let source = std::fs::read_to_string(path)?;
    Ok(compile_source(
        &source,
        path.to_str().unwrap_or("<input>"),
        ctx,
        warnings,
    ))
}

impl Compilation {
    pub fn print_diagnostics(&self, use_colors: bool) {
        let formatter = ErrorFormatter { use_colors };
        formatter.print_diagnostics(self.diag.diagnostics(), &self.source_manager);
    }

    /// Render every root declaration as `name: type`, one per line, in
    /// the unambiguous dump syntax.
    pub fn dump_decls(&self) -> String {
        let mut out = String::new();
        for &decl in &self.ast.root_decls {
            let node = self.ast.get_node(decl);
            match &node.kind {
                NodeKind::Decl { name, .. } => {
                    let name = name.map(|n| n.as_str()).unwrap_or("<anonymous>");
                    out.push_str(name);
                    out.push_str(": ");
                    out.push_str(&self.ast.types.dump(node.ty));
                    out.push('\n');
                }
                NodeKind::TagDecl => {
                    out.push_str(&self.ast.types.dump(node.ty));
                    out.push('\n');
                }
                _ => {}
            }
        }
        out
    }
}

//! Compilation driver
//!
//! Wires the pipeline together: pick a backend, prime the parser, let it
//! consume the translation unit, take the assembly text.

use crate::backend::TargetKind;
use crate::codegen::CodeGenerator;
use crate::common::CompileResult;
use crate::frontend::ast::DumpMode;
use crate::frontend::Parser;

/// Options selected by the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub target: TargetKind,
    pub dump_ast: DumpMode,
}

/// Compile one source file to assembly text for the selected target.
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<String> {
    let cg = CodeGenerator::new(options.target.ops());
    let mut parser = Parser::new(source, cg, options.dump_ast)?;
    parser.parse_program()?;
    Ok(parser.into_assembly())
}

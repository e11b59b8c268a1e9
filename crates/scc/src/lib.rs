//! scc - an ahead-of-time compiler for a C-like subset language
//!
//! The compiler consumes one source file and emits assembly for one of two
//! targets, NASM-flavored x86-64 or GNU-as AArch64, which links against a
//! tiny runtime providing `printint`, `printchar`, `printstring` and
//! `_start`.
//!
//! ## Architecture
//!
//! - **Frontend** (`frontend/`): logos-based lexer, precedence-climbing
//!   expression parser, recursive-descent statements and declarations
//! - **Types** (`types/`): the primitive/pointer lattice and the
//!   widen/scale coercion rules
//! - **Symbols** (`symbols`): fixed-capacity table, globals grow up and
//!   locals grow down
//! - **Codegen** (`codegen/`): target-agnostic post-order AST walk
//! - **Backend** (`backend/`): the `TargetOps` operation table with its
//!   two implementations
//! - **Common** (`common/`): spans, labels, errors, diagnostics
//! - **Driver** (`driver/`): the `compile` pipeline entry point

pub mod backend;
pub mod codegen;
pub mod common;
pub mod driver;
pub mod frontend;
pub mod symbols;
pub mod types;

// Re-exports for convenience
pub use backend::TargetKind;
pub use common::{CompileError, CompileResult, DiagnosticReporter};
pub use driver::{compile, CompileOptions};
pub use frontend::ast::DumpMode;

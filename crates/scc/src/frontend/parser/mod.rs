//! Recursive descent parser
//!
//! The parser drives the whole frontend: it owns the token stream, the
//! symbol table and the code generator, consumes one global declaration at
//! a time and hands each finished function tree to the generator. Every
//! parsing rule assumes the first token of its production is current and
//! leaves the token after its production current.
//!
//! Split by production family the way `Skyness60-cc1` splits its parser:
//! declarations in `decl`, statements in `stmt`, expressions in `expr`.

mod decl;
mod expr;
mod stmt;

use crate::codegen::CodeGenerator;
use crate::common::{CompileError, CompileResult, Span};
use crate::frontend::ast::DumpMode;
use crate::frontend::lexer::{Lexer, Token, TokenKind};
use crate::symbols::{StructuralType, SymbolId, SymbolTable};
use crate::types::PrimType;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    symbols: SymbolTable,
    cg: CodeGenerator,
    /// Function whose body is being parsed, for return checking.
    current_function: Option<SymbolId>,
    dump: DumpMode,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, cg: CodeGenerator, dump: DumpMode) -> CompileResult<Self> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            symbols: SymbolTable::new(),
            cg,
            current_function: None,
            dump,
        })
    }

    /// Compile the whole translation unit: emit the target preamble, one
    /// global declaration at a time, then the postamble.
    pub fn parse_program(&mut self) -> CompileResult<()> {
        self.cg.preamble();
        self.register_runtime_functions()?;
        while !self.at_end() {
            self.global_declaration()?;
        }
        self.cg.postamble();
        Ok(())
    }

    /// Take the emitted assembly once parsing has finished.
    pub fn into_assembly(self) -> String {
        self.cg.into_assembly()
    }

    /// The runtime print helpers are linked in from outside; seed the
    /// symbol table so calls to them resolve and type-check.
    fn register_runtime_functions(&mut self) -> CompileResult<()> {
        for name in ["printint", "printchar", "printstring"] {
            self.symbols
                .add_global(name, PrimType::Void, StructuralType::Function, None, 1)
                .map_err(|msg| CompileError::semantic(msg, self.span()))?;
        }
        Ok(())
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn span(&self) -> Span {
        self.current.span
    }

    /// Consume the current token and return it, scanning the next one in.
    fn advance(&mut self) -> CompileResult<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> CompileResult<bool> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        if self.check(&kind) {
            self.advance()
        } else {
            Err(CompileError::parser(
                format!("expected {}, found {}", kind, self.current.kind),
                self.current.span,
            ))
        }
    }

    fn expect_identifier(&mut self) -> CompileResult<(String, Span)> {
        let span = self.current.span;
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance()?;
                Ok((name, span))
            }
            other => Err(CompileError::parser(
                format!("expected identifier, found {}", other),
                span,
            )),
        }
    }
}

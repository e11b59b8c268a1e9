//! Declaration parsing
//!
//! Top level: a type, an identifier, then either a function definition or
//! a variable declaration. Global variables and arrays get their storage
//! declared the moment they are parsed; functions are parsed to a tree and
//! emitted immediately afterwards, so the output file grows strictly in
//! source order.

use super::Parser;
use crate::common::{CompileError, CompileResult, Span};
use crate::frontend::ast::{dump_compact, dump_tree, AstNode, AstOp, DumpMode};
use crate::frontend::lexer::TokenKind;
use crate::symbols::StructuralType;
use crate::types::PrimType;

impl Parser<'_> {
    /// Parse a type keyword plus any trailing `*`s.
    fn parse_type(&mut self) -> CompileResult<PrimType> {
        let base = match self.current.kind {
            TokenKind::Void => PrimType::Void,
            TokenKind::Char => PrimType::Char,
            TokenKind::Int => PrimType::Int,
            TokenKind::Long => PrimType::Long,
            ref other => {
                return Err(CompileError::parser(
                    format!("expected a type, found {}", other),
                    self.span(),
                ))
            }
        };
        self.advance()?;

        let mut ty = base;
        while self.check(&TokenKind::Star) {
            let star_span = self.span();
            self.advance()?;
            // Only one pointer level exists; a second star has no type to
            // name.
            ty = ty.pointer_to().map_err(|ty| {
                CompileError::type_error(
                    format!("type {} has no pointer form", ty.name()),
                    star_span,
                )
            })?;
        }
        Ok(ty)
    }

    /// Parse one top-level declaration: `type name` followed by a function
    /// definition or a variable declaration.
    pub(super) fn global_declaration(&mut self) -> CompileResult<()> {
        let ty = self.parse_type()?;
        let (name, name_span) = self.expect_identifier()?;

        if self.check(&TokenKind::LParen) {
            self.function_declaration(ty, name)
        } else {
            self.global_variable_declaration(ty, name, name_span)
        }
    }

    /// Parse the tail of a global scalar or array declaration and declare
    /// its storage.
    fn global_variable_declaration(
        &mut self,
        ty: PrimType,
        name: String,
        name_span: Span,
    ) -> CompileResult<()> {
        let id = if self.match_token(&TokenKind::LBracket)? {
            let size_span = self.span();
            let TokenKind::IntLiteral(count) = self.current.kind else {
                return Err(CompileError::parser(
                    format!("expected array size, found {}", self.current.kind),
                    size_span,
                ));
            };
            if count <= 0 {
                return Err(CompileError::semantic(
                    format!("array size must be positive, found {}", count),
                    size_span,
                ));
            }
            self.advance()?;
            self.expect(TokenKind::RBracket)?;

            self.symbols
                .add_global(&name, ty, StructuralType::Array, None, count as usize)
                .map_err(|msg| CompileError::semantic(msg, name_span))?
        } else {
            self.symbols
                .add_global(&name, ty, StructuralType::Variable, None, 1)
                .map_err(|msg| CompileError::semantic(msg, name_span))?
        };

        self.cg.declare_global_symbol(&self.symbols, id)?;
        self.expect(TokenKind::Semi)?;
        Ok(())
    }

    /// Parse a scalar declaration inside a function body and assign the
    /// local a slot in the frame.
    pub(super) fn local_declaration(&mut self) -> CompileResult<()> {
        let ty = self.parse_type()?;
        let (name, name_span) = self.expect_identifier()?;

        if self.check(&TokenKind::LBracket) {
            return Err(CompileError::semantic(
                "local arrays are not supported",
                self.span(),
            ));
        }

        let offset = self.cg.local_offset(ty);
        self.symbols
            .add_local(&name, ty, StructuralType::Variable, offset)
            .map_err(|msg| CompileError::semantic(msg, name_span))?;
        self.expect(TokenKind::Semi)?;
        Ok(())
    }

    /// Parse `( ) compound` after a function's name, then emit the
    /// finished tree.
    fn function_declaration(&mut self, return_ty: PrimType, name: String) -> CompileResult<()> {
        let name_span = self.span();
        let end_label = self.cg.allocate_label();
        let id = self
            .symbols
            .add_global(
                &name,
                return_ty,
                StructuralType::Function,
                Some(end_label),
                1,
            )
            .map_err(|msg| CompileError::semantic(msg, name_span))?;
        // A redefinition reuses its slot; the fresh end label wins.
        self.symbols.get_mut(id).end_label = Some(end_label);

        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::RParen)?;

        self.current_function = Some(id);
        self.cg.reset_local_offsets();
        let body = self.compound_statement()?;
        let tree = AstNode::node(AstOp::Function(id), return_ty, body, None, None);

        match self.dump {
            DumpMode::Tree => print!("{}", dump_tree(&tree, &self.symbols)),
            DumpMode::Compact => println!("{}", dump_compact(&tree, &self.symbols)),
            DumpMode::None => {}
        }

        self.cg.generate(&tree, &self.symbols)?;
        self.symbols.release_locals();
        self.current_function = None;
        Ok(())
    }
}

//! Statement parsing
//!
//! Compound statements glue successive statements into a left-leaning
//! chain. `for` has no shape of its own: it is desugared at parse time
//! into a `while` with the pre-statement glued in front and the
//! post-statement glued behind the body.

use super::Parser;
use crate::common::{CompileError, CompileResult};
use crate::frontend::ast::{AstNode, AstOp};
use crate::frontend::lexer::TokenKind;
use crate::types::{coerce_for_op, PrimType};

impl Parser<'_> {
    /// Parse `{ statement* }` into a glue chain; an empty block yields no
    /// tree at all.
    pub(super) fn compound_statement(&mut self) -> CompileResult<Option<Box<AstNode>>> {
        self.expect(TokenKind::LBrace)?;

        let mut chain: Option<Box<AstNode>> = None;
        loop {
            if self.match_token(&TokenKind::RBrace)? {
                return Ok(chain);
            }
            if self.at_end() {
                return Err(CompileError::parser(
                    "unexpected end of input inside a compound statement",
                    self.span(),
                ));
            }

            let tree = self.single_statement()?;

            // Assignments, returns and calls are the statement forms that
            // end in a semicolon; control flow brings its own structure.
            if let Some(tree) = &tree {
                if matches!(
                    tree.op,
                    AstOp::Assign | AstOp::Return | AstOp::FunctionCall(_)
                ) {
                    self.expect(TokenKind::Semi)?;
                }
            }

            if let Some(tree) = tree {
                chain = Some(match chain {
                    None => tree,
                    Some(previous) => AstNode::node(
                        AstOp::Glue,
                        PrimType::None,
                        Some(previous),
                        None,
                        Some(tree),
                    ),
                });
            }
        }
    }

    /// Parse one statement. Declarations produce no tree.
    pub(super) fn single_statement(&mut self) -> CompileResult<Option<Box<AstNode>>> {
        match self.current.kind {
            TokenKind::Void | TokenKind::Char | TokenKind::Int | TokenKind::Long => {
                self.local_declaration()?;
                Ok(None)
            }
            TokenKind::If => self.if_statement().map(Some),
            TokenKind::While => self.while_statement().map(Some),
            TokenKind::For => self.for_statement().map(Some),
            TokenKind::Return => self.return_statement().map(Some),
            _ => self.binexpr(0).map(Some),
        }
    }

    /// Parse a branch condition: any non-comparison expression is wrapped
    /// so the generator can branch on zero.
    fn condition_expression(&mut self) -> CompileResult<Box<AstNode>> {
        let mut cond = self.binexpr(0)?;
        if !cond.op.is_comparison() {
            let ty = cond.ty;
            cond = AstNode::unary(AstOp::ToBool, ty, cond);
        }
        Ok(cond)
    }

    fn if_statement(&mut self) -> CompileResult<Box<AstNode>> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.condition_expression()?;
        self.expect(TokenKind::RParen)?;

        let then_branch = self.compound_statement()?;
        let else_branch = if self.match_token(&TokenKind::Else)? {
            self.compound_statement()?
        } else {
            None
        };

        Ok(AstNode::node(
            AstOp::If,
            PrimType::None,
            Some(condition),
            then_branch,
            else_branch,
        ))
    }

    fn while_statement(&mut self) -> CompileResult<Box<AstNode>> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.condition_expression()?;
        self.expect(TokenKind::RParen)?;

        let body = self.compound_statement()?;

        Ok(AstNode::node(
            AstOp::While,
            PrimType::None,
            Some(condition),
            None,
            body,
        ))
    }

    /// `for (pre; cond; post) body` becomes
    /// `GLUE(pre, WHILE(cond, GLUE(body, post)))`.
    fn for_statement(&mut self) -> CompileResult<Box<AstNode>> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        let pre = self.single_statement()?;
        self.expect(TokenKind::Semi)?;

        let condition = self.condition_expression()?;
        self.expect(TokenKind::Semi)?;

        let post = self.single_statement()?;
        self.expect(TokenKind::RParen)?;

        let body = self.compound_statement()?;

        let inner = match (body, post) {
            (Some(body), Some(post)) => Some(AstNode::node(
                AstOp::Glue,
                PrimType::None,
                Some(body),
                None,
                Some(post),
            )),
            (Some(body), None) => Some(body),
            (None, Some(post)) => Some(post),
            (None, None) => None,
        };

        let while_node = AstNode::node(
            AstOp::While,
            PrimType::None,
            Some(condition),
            None,
            inner,
        );

        Ok(match pre {
            Some(pre) => AstNode::node(
                AstOp::Glue,
                PrimType::None,
                Some(pre),
                None,
                Some(while_node),
            ),
            None => while_node,
        })
    }

    /// Parse `return ( expression )`, coercing the value to the enclosing
    /// function's return type.
    fn return_statement(&mut self) -> CompileResult<Box<AstNode>> {
        let keyword_span = self.span();
        self.expect(TokenKind::Return)?;

        let function = self.current_function.ok_or_else(|| {
            CompileError::semantic("'return' outside any function", keyword_span)
        })?;
        let return_ty = self.symbols.get(function).prim;
        if return_ty == PrimType::Void {
            return Err(CompileError::semantic(
                "cannot return a value from a void function",
                keyword_span,
            ));
        }

        self.expect(TokenKind::LParen)?;
        let value_span = self.span();
        let value = self.binexpr(0)?;
        let value = coerce_for_op(value, return_ty, None).map_err(|_| {
            CompileError::type_error("incompatible return type", value_span)
        })?;
        let tree = AstNode::unary(AstOp::Return, PrimType::None, value);
        self.expect(TokenKind::RParen)?;

        Ok(tree)
    }
}

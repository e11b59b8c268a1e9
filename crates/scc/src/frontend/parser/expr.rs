//! Expression parsing
//!
//! Precedence climbing over the binary operator table, with prefix
//! operators handled on the way down and postfix forms (call, subscript,
//! `++`/`--`) attached to identifiers. Assignment is the one
//! right-associative operator; its children are swapped at construction so
//! the post-order code walk evaluates the value before the destination.

use super::Parser;
use crate::common::{CompileError, CompileResult};
use crate::frontend::ast::{AstNode, AstOp};
use crate::frontend::lexer::TokenKind;
use crate::symbols::{StructuralType, SymbolId};
use crate::types::{coerce_for_op, PrimType};

/// AST operator corresponding to a binary operator token.
fn binary_ast_op(kind: &TokenKind) -> Option<AstOp> {
    match kind {
        TokenKind::Plus => Some(AstOp::Add),
        TokenKind::Minus => Some(AstOp::Subtract),
        TokenKind::Star => Some(AstOp::Multiply),
        TokenKind::Slash => Some(AstOp::Divide),
        TokenKind::EqEq => Some(AstOp::Equal),
        TokenKind::NotEq => Some(AstOp::NotEqual),
        TokenKind::Lt => Some(AstOp::LessThan),
        TokenKind::Gt => Some(AstOp::GreaterThan),
        TokenKind::LtEq => Some(AstOp::LessOrEqual),
        TokenKind::GtEq => Some(AstOp::GreaterOrEqual),
        TokenKind::LtLt => Some(AstOp::LeftShift),
        TokenKind::GtGt => Some(AstOp::RightShift),
        TokenKind::Amp => Some(AstOp::BitAnd),
        TokenKind::Pipe => Some(AstOp::BitOr),
        TokenKind::Caret => Some(AstOp::BitXor),
        TokenKind::AmpAmp => Some(AstOp::LogicalAnd),
        TokenKind::PipePipe => Some(AstOp::LogicalOr),
        _ => None,
    }
}

impl Parser<'_> {
    /// Parse a binary expression no looser than `min_prec`.
    pub(super) fn binexpr(&mut self, min_prec: u8) -> CompileResult<Box<AstNode>> {
        let mut left = self.prefix_expression()?;

        loop {
            let kind = self.current.kind.clone();
            if kind.is_expression_terminator() {
                left.rvalue = true;
                return Ok(left);
            }
            if kind.is_type_keyword() {
                return Err(CompileError::parser(
                    format!("{} cannot appear inside an expression", kind),
                    self.span(),
                ));
            }
            let Some(prec) = kind.binary_precedence() else {
                return Err(CompileError::parser(
                    format!("unexpected {} in expression", kind),
                    self.span(),
                ));
            };
            if !(prec > min_prec || (kind.is_right_associative() && prec == min_prec)) {
                break;
            }

            let op_span = self.span();
            self.advance()?;
            let mut right = self.binexpr(prec)?;

            if kind == TokenKind::Assign {
                right.rvalue = true;
                let mut value = coerce_for_op(right, left.ty, None).map_err(|_| {
                    CompileError::type_error("incompatible expression in assignment", op_span)
                })?;
                value.rvalue = true;

                // The value becomes the left child and the destination the
                // right child, so the value register exists by the time the
                // store is emitted.
                let mut dest = left;
                dest.rvalue = false;
                let ty = value.ty;
                left = AstNode::node(AstOp::Assign, ty, Some(value), None, Some(dest));
            } else {
                left.rvalue = true;
                right.rvalue = true;
                let ast_op = binary_ast_op(&kind).ok_or_else(|| {
                    CompileError::parser(format!("{} is not a binary operator", kind), op_span)
                })?;

                // Reconcile the two sides: try coercing each against the
                // other's type and accept if at least one direction works.
                let left_ty = left.ty;
                let right_ty = right.ty;
                let (left_done, left_ok) = match coerce_for_op(left, right_ty, Some(&ast_op)) {
                    Ok(tree) => (tree, true),
                    Err(tree) => (tree, false),
                };
                let (right_done, right_ok) = match coerce_for_op(right, left_ty, Some(&ast_op)) {
                    Ok(tree) => (tree, true),
                    Err(tree) => (tree, false),
                };
                if !left_ok && !right_ok {
                    return Err(CompileError::type_error(
                        format!(
                            "incompatible types {} and {} in expression",
                            left_ty.name(),
                            right_ty.name()
                        ),
                        op_span,
                    ));
                }

                let ty = left_done.ty;
                left = AstNode::node(ast_op, ty, Some(left_done), None, Some(right_done));
            }
        }

        left.rvalue = true;
        Ok(left)
    }

    /// Parse a prefix expression, or fall through to a primary one.
    fn prefix_expression(&mut self) -> CompileResult<Box<AstNode>> {
        let span = self.span();
        match self.current.kind {
            TokenKind::Amp => {
                self.advance()?;
                let mut tree = self.prefix_expression()?;
                let AstOp::Identifier(id) = tree.op else {
                    return Err(CompileError::parser(
                        "'&' must be applied to an identifier",
                        span,
                    ));
                };
                tree.op = AstOp::AddressOf(id);
                tree.ty = tree.ty.pointer_to().map_err(|ty| {
                    CompileError::type_error(
                        format!("type {} has no pointer form", ty.name()),
                        span,
                    )
                })?;
                Ok(tree)
            }
            TokenKind::Star => {
                self.advance()?;
                let tree = self.prefix_expression()?;
                if !matches!(tree.op, AstOp::Identifier(_) | AstOp::Dereference) {
                    return Err(CompileError::parser(
                        "'*' must be applied to an identifier or another '*'",
                        span,
                    ));
                }
                let pointee = tree.ty.value_at().map_err(|ty| {
                    CompileError::type_error(
                        format!("cannot dereference a value of type {}", ty.name()),
                        span,
                    )
                })?;
                Ok(AstNode::unary(AstOp::Dereference, pointee, tree))
            }
            TokenKind::Minus => {
                self.advance()?;
                let mut tree = self.prefix_expression()?;
                tree.rvalue = true;
                // Widen char operands so negation happens in a signed type.
                if tree.ty == PrimType::Char {
                    tree = AstNode::unary(AstOp::Widen, PrimType::Int, tree);
                }
                let ty = tree.ty;
                Ok(AstNode::unary(AstOp::Negate, ty, tree))
            }
            TokenKind::Tilde => {
                self.advance()?;
                let mut tree = self.prefix_expression()?;
                tree.rvalue = true;
                let ty = tree.ty;
                Ok(AstNode::unary(AstOp::Invert, ty, tree))
            }
            TokenKind::Bang => {
                self.advance()?;
                let mut tree = self.prefix_expression()?;
                tree.rvalue = true;
                let ty = tree.ty;
                Ok(AstNode::unary(AstOp::LogicalNot, ty, tree))
            }
            TokenKind::PlusPlus => {
                self.advance()?;
                let id = self.expect_variable_identifier("'++'")?;
                Ok(AstNode::leaf(
                    AstOp::PreIncrement(id),
                    self.symbols.get(id).prim,
                ))
            }
            TokenKind::MinusMinus => {
                self.advance()?;
                let id = self.expect_variable_identifier("'--'")?;
                Ok(AstNode::leaf(
                    AstOp::PreDecrement(id),
                    self.symbols.get(id).prim,
                ))
            }
            _ => self.primary_expression(),
        }
    }

    /// Parse a primary expression: literal, parenthesized subexpression or
    /// identifier (with postfix forms).
    fn primary_expression(&mut self) -> CompileResult<Box<AstNode>> {
        let span = self.span();
        match self.current.kind.clone() {
            TokenKind::IntLiteral(value) => {
                self.advance()?;
                // Small constants are char-typed so they fit either side of
                // a char expression; everything else is int.
                let ty = if (0..=255).contains(&value) {
                    PrimType::Char
                } else {
                    PrimType::Int
                };
                Ok(AstNode::leaf(AstOp::IntLiteral(value), ty))
            }
            TokenKind::StringLiteral(bytes) => {
                self.advance()?;
                let label = self.cg.declare_global_string(&bytes);
                Ok(AstNode::leaf(AstOp::StringLiteral(label), PrimType::CharPtr))
            }
            TokenKind::LParen => {
                self.advance()?;
                let tree = self.binexpr(0)?;
                self.expect(TokenKind::RParen)?;
                Ok(tree)
            }
            TokenKind::Identifier(name) => self.postfix_expression(name),
            other => Err(CompileError::parser(
                format!("unexpected {} in expression", other),
                span,
            )),
        }
    }

    /// Parse the postfix forms that can follow an identifier.
    fn postfix_expression(&mut self, name: String) -> CompileResult<Box<AstNode>> {
        let ident_span = self.span();
        self.advance()?;
        let id = self.symbols.find(&name).ok_or_else(|| {
            CompileError::semantic(format!("undeclared identifier '{}'", name), ident_span)
        })?;

        match self.current.kind {
            TokenKind::LParen => self.function_call(id),
            TokenKind::LBracket => self.array_access(id),
            TokenKind::PlusPlus => {
                self.require_variable(id, "'++'")?;
                self.advance()?;
                Ok(AstNode::leaf(
                    AstOp::PostIncrement(id),
                    self.symbols.get(id).prim,
                ))
            }
            TokenKind::MinusMinus => {
                self.require_variable(id, "'--'")?;
                self.advance()?;
                Ok(AstNode::leaf(
                    AstOp::PostDecrement(id),
                    self.symbols.get(id).prim,
                ))
            }
            _ => {
                let sym = self.symbols.get(id);
                let ty = match sym.structural {
                    // An array name used bare decays to a pointer to its
                    // element type.
                    StructuralType::Array => sym.prim.pointer_to().map_err(|ty| {
                        CompileError::type_error(
                            format!("type {} has no pointer form", ty.name()),
                            ident_span,
                        )
                    })?,
                    _ => sym.prim,
                };
                Ok(AstNode::leaf(AstOp::Identifier(id), ty))
            }
        }
    }

    /// Parse `( expression )` after a function identifier.
    fn function_call(&mut self, id: SymbolId) -> CompileResult<Box<AstNode>> {
        let span = self.span();
        let sym = self.symbols.get(id);
        if sym.structural != StructuralType::Function {
            return Err(CompileError::semantic(
                format!("'{}' is not a function", sym.name),
                span,
            ));
        }
        let return_ty = sym.prim;

        self.expect(TokenKind::LParen)?;
        let argument = self.binexpr(0)?;
        self.expect(TokenKind::RParen)?;

        Ok(AstNode::unary(AstOp::FunctionCall(id), return_ty, argument))
    }

    /// Parse `[ expression ]` after an array identifier: scale the index,
    /// add it to the array base and dereference, yielding an lvalue of the
    /// element type.
    fn array_access(&mut self, id: SymbolId) -> CompileResult<Box<AstNode>> {
        let span = self.span();
        let sym = self.symbols.get(id);
        if sym.structural != StructuralType::Array {
            return Err(CompileError::semantic(
                format!("'{}' is not an array", sym.name),
                span,
            ));
        }
        let element_ty = sym.prim;
        let pointer_ty = element_ty.pointer_to().map_err(|ty| {
            CompileError::type_error(format!("type {} has no pointer form", ty.name()), span)
        })?;
        let base = AstNode::leaf(AstOp::AddressOf(id), pointer_ty);

        self.expect(TokenKind::LBracket)?;
        let index_span = self.span();
        let mut index = self.binexpr(0)?;
        self.expect(TokenKind::RBracket)?;

        if !index.ty.is_integer() {
            return Err(CompileError::type_error(
                "array index is not an integer",
                index_span,
            ));
        }
        index.rvalue = true;
        let index = coerce_for_op(index, pointer_ty, Some(&AstOp::Add)).map_err(|_| {
            CompileError::type_error("incompatible array index", index_span)
        })?;

        let sum = AstNode::node(AstOp::Add, pointer_ty, Some(base), None, Some(index));
        Ok(AstNode::unary(AstOp::Dereference, element_ty, sum))
    }

    /// After `++`/`--`, the next token must name a scalar variable.
    fn expect_variable_identifier(&mut self, op_name: &str) -> CompileResult<SymbolId> {
        let (name, span) = self.expect_identifier()?;
        let id = self.symbols.find(&name).ok_or_else(|| {
            CompileError::semantic(format!("undeclared identifier '{}'", name), span)
        })?;
        self.require_variable(id, op_name)?;
        Ok(id)
    }

    fn require_variable(&self, id: SymbolId, op_name: &str) -> CompileResult<()> {
        let sym = self.symbols.get(id);
        if sym.structural != StructuralType::Variable {
            return Err(CompileError::semantic(
                format!("{} must be applied to a scalar variable", op_name),
                self.span(),
            ));
        }
        Ok(())
    }
}

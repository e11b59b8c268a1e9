//! Target-agnostic code generation
//!
//! Walks an AST in post order and drives the selected backend's operation
//! table. Values travel in backend scratch registers; the pool is reset at
//! every statement boundary and across branch and loop edges, so a single
//! expression is the longest a register lives.

use crate::backend::{CompareOp, LoadMode, Reg, TargetOps};
use crate::common::{CompileError, CompileResult, LabelId};
use crate::frontend::ast::{AstNode, AstOp};
use crate::symbols::{StructuralType, SymbolId, SymbolTable};
use crate::types::PrimType;

/// Monotone label number source, starting at 1.
pub struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> LabelId {
        let label = LabelId(self.next);
        self.next += 1;
        label
    }
}

impl Default for LabelAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// AST-walking generator parameterized over a backend operation table.
pub struct CodeGenerator {
    target: Box<dyn TargetOps>,
    labels: LabelAllocator,
    current_function: Option<SymbolId>,
}

fn need(reg: Option<Reg>) -> CompileResult<Reg> {
    reg.ok_or_else(|| CompileError::codegen("expression produced no value register"))
}

fn compare_selector(op: &AstOp) -> Option<CompareOp> {
    match op {
        AstOp::Equal => Some(CompareOp::Equal),
        AstOp::NotEqual => Some(CompareOp::NotEqual),
        AstOp::LessThan => Some(CompareOp::LessThan),
        AstOp::GreaterThan => Some(CompareOp::GreaterThan),
        AstOp::LessOrEqual => Some(CompareOp::LessOrEqual),
        AstOp::GreaterOrEqual => Some(CompareOp::GreaterOrEqual),
        _ => None,
    }
}

impl CodeGenerator {
    pub fn new(target: Box<dyn TargetOps>) -> Self {
        Self {
            target,
            labels: LabelAllocator::new(),
            current_function: None,
        }
    }

    pub fn target_name(&self) -> &'static str {
        self.target.name()
    }

    pub fn preamble(&mut self) {
        self.target.preamble();
    }

    pub fn postamble(&mut self) {
        self.target.postamble();
    }

    pub fn allocate_label(&mut self) -> LabelId {
        self.labels.allocate()
    }

    /// Declare storage for a global variable or array.
    pub fn declare_global_symbol(
        &mut self,
        symbols: &SymbolTable,
        id: SymbolId,
    ) -> CompileResult<()> {
        self.target.declare_global_symbol(symbols.get(id))
    }

    /// Emit a string to the read-only data segment and return its label.
    pub fn declare_global_string(&mut self, bytes: &[u8]) -> LabelId {
        let label = self.labels.allocate();
        self.target.declare_global_string(label, bytes);
        label
    }

    pub fn reset_local_offsets(&mut self) {
        self.target.reset_local_offsets();
    }

    /// Reserve frame space for one local and return its offset.
    pub fn local_offset(&mut self, ty: PrimType) -> i32 {
        self.target.local_offset(ty)
    }

    /// Emit a whole function definition tree.
    pub fn generate(&mut self, tree: &AstNode, symbols: &SymbolTable) -> CompileResult<()> {
        self.walk(tree, symbols, None, None)?;
        Ok(())
    }

    /// Finish code generation and take the assembly text.
    pub fn into_assembly(mut self) -> String {
        self.target.take_output()
    }

    fn gen_if(&mut self, n: &AstNode, symbols: &SymbolTable) -> CompileResult<Option<Reg>> {
        // One label for the false branch; a second one past the else
        // branch when it exists.
        let label_false = self.labels.allocate();
        let label_end = n.right.as_ref().map(|_| self.labels.allocate());

        // The condition jumps to label_false when it does not hold.
        if let Some(cond) = &n.left {
            self.walk(cond, symbols, Some(label_false), Some(&n.op))?;
        }
        self.target.reset_registers();

        if let Some(then_branch) = &n.mid {
            self.walk(then_branch, symbols, None, Some(&n.op))?;
        }
        self.target.reset_registers();

        if let Some(end) = label_end {
            self.target.jump(end);
        }
        self.target.label(label_false);

        if let Some(else_branch) = &n.right {
            self.walk(else_branch, symbols, None, Some(&n.op))?;
            self.target.reset_registers();
            if let Some(end) = label_end {
                self.target.label(end);
            }
        }

        Ok(None)
    }

    fn gen_while(&mut self, n: &AstNode, symbols: &SymbolTable) -> CompileResult<Option<Reg>> {
        let label_start = self.labels.allocate();
        let label_end = self.labels.allocate();
        self.target.label(label_start);

        if let Some(cond) = &n.left {
            self.walk(cond, symbols, Some(label_end), Some(&n.op))?;
        }
        self.target.reset_registers();

        if let Some(body) = &n.right {
            self.walk(body, symbols, None, Some(&n.op))?;
        }
        self.target.reset_registers();

        self.target.jump(label_start);
        self.target.label(label_end);
        Ok(None)
    }

    fn walk(
        &mut self,
        n: &AstNode,
        symbols: &SymbolTable,
        label: Option<LabelId>,
        parent: Option<&AstOp>,
    ) -> CompileResult<Option<Reg>> {
        // Operators with their own control flow handle child traversal
        // themselves.
        match &n.op {
            AstOp::If => return self.gen_if(n, symbols),
            AstOp::While => return self.gen_while(n, symbols),
            AstOp::Glue => {
                if let Some(left) = &n.left {
                    self.walk(left, symbols, None, Some(&n.op))?;
                }
                self.target.reset_registers();
                if let Some(right) = &n.right {
                    self.walk(right, symbols, None, Some(&n.op))?;
                }
                self.target.reset_registers();
                return Ok(None);
            }
            AstOp::Function(id) => {
                self.current_function = Some(*id);
                self.target.function_preamble(symbols.get(*id));
                if let Some(body) = &n.left {
                    self.walk(body, symbols, None, Some(&n.op))?;
                }
                self.target.function_postamble(symbols.get(*id));
                return Ok(None);
            }
            _ => {}
        }

        let left_reg = match &n.left {
            Some(left) => self.walk(left, symbols, None, Some(&n.op))?,
            None => None,
        };
        let right_reg = match &n.right {
            Some(right) => self.walk(right, symbols, None, Some(&n.op))?,
            None => None,
        };

        match &n.op {
            AstOp::Add => Ok(Some(self.target.add(need(left_reg)?, need(right_reg)?))),
            AstOp::Subtract => Ok(Some(
                self.target.subtract(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::Multiply => Ok(Some(
                self.target.multiply(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::Divide => Ok(Some(self.target.divide(need(left_reg)?, need(right_reg)?))),
            AstOp::LeftShift => Ok(Some(
                self.target.shift_left(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::RightShift => Ok(Some(
                self.target.shift_right(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::BitAnd => Ok(Some(
                self.target.bitwise_and(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::BitOr => Ok(Some(
                self.target.bitwise_or(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::BitXor => Ok(Some(
                self.target.bitwise_xor(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::LogicalAnd => Ok(Some(
                self.target.logical_and(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::LogicalOr => Ok(Some(
                self.target.logical_or(need(left_reg)?, need(right_reg)?),
            )),
            AstOp::LogicalNot => Ok(Some(self.target.logical_not(need(left_reg)?))),
            AstOp::Invert => Ok(Some(self.target.invert(need(left_reg)?))),
            AstOp::Negate => Ok(Some(self.target.negate(need(left_reg)?))),

            op if op.is_comparison() => {
                let selector = compare_selector(op).expect("comparison selector");
                if matches!(parent, Some(AstOp::If) | Some(AstOp::While)) {
                    // Under a branch the comparison becomes a jump taken
                    // when the condition is false.
                    let label = label.ok_or_else(|| {
                        CompileError::codegen("comparison under a branch has no target label")
                    })?;
                    self.target
                        .compare_and_jump(selector, need(left_reg)?, need(right_reg)?, label);
                    Ok(None)
                } else {
                    Ok(Some(self.target.compare_and_set(
                        selector,
                        need(left_reg)?,
                        need(right_reg)?,
                    )))
                }
            }

            AstOp::ToBool => {
                let jump = if matches!(parent, Some(AstOp::If) | Some(AstOp::While)) {
                    label
                } else {
                    None
                };
                Ok(Some(self.target.to_boolean(need(left_reg)?, jump)))
            }

            AstOp::IntLiteral(value) => Ok(Some(self.target.load_immediate(*value, n.ty)?)),
            AstOp::StringLiteral(string_label) => {
                Ok(Some(self.target.load_string_address(*string_label)?))
            }

            AstOp::Identifier(id) => {
                let sym = symbols.get(*id);
                if sym.structural == StructuralType::Array {
                    // An array name decays to the address of its first
                    // element.
                    return Ok(Some(self.target.address_of_symbol(sym)?));
                }
                if n.rvalue || matches!(parent, Some(AstOp::Dereference)) {
                    Ok(Some(self.target.load_symbol(sym, LoadMode::Plain)?))
                } else {
                    // Lvalue position: the parent assignment stores through
                    // the symbol directly.
                    Ok(None)
                }
            }

            AstOp::Assign => {
                // The parser swapped the children: left is the value, right
                // the destination.
                let value = need(left_reg)?;
                let dest = n
                    .right
                    .as_ref()
                    .ok_or_else(|| CompileError::codegen("assignment without destination"))?;
                match &dest.op {
                    AstOp::Identifier(id) => {
                        Ok(Some(self.target.store_symbol(value, symbols.get(*id))?))
                    }
                    AstOp::Dereference => Ok(Some(self.target.deref_store(
                        value,
                        need(right_reg)?,
                        dest.ty,
                    )?)),
                    other => Err(CompileError::codegen(format!(
                        "cannot assign through {:?}",
                        other
                    ))),
                }
            }

            AstOp::Widen => {
                let from = n.left.as_ref().map(|l| l.ty).unwrap_or(PrimType::None);
                Ok(Some(self.target.widen(need(left_reg)?, from, n.ty)))
            }

            AstOp::Scale(size) => match *size {
                2 => Ok(Some(self.target.shift_left_by_const(need(left_reg)?, 1))),
                4 => Ok(Some(self.target.shift_left_by_const(need(left_reg)?, 2))),
                8 => Ok(Some(self.target.shift_left_by_const(need(left_reg)?, 3))),
                size => {
                    let amount = self.target.load_immediate(size as i64, PrimType::Int)?;
                    Ok(Some(self.target.multiply(need(left_reg)?, amount)))
                }
            },

            AstOp::AddressOf(id) => Ok(Some(self.target.address_of_symbol(symbols.get(*id))?)),

            AstOp::Dereference => {
                if n.rvalue {
                    let pointer_ty = n.left.as_ref().map(|l| l.ty).unwrap_or(PrimType::None);
                    Ok(Some(self.target.deref_load(need(left_reg)?, pointer_ty)?))
                } else {
                    // Lvalue position: leave the address in the register
                    // for the enclosing assignment.
                    Ok(left_reg)
                }
            }

            AstOp::Return => {
                let id = self.current_function.ok_or_else(|| {
                    CompileError::codegen("return statement outside any function")
                })?;
                self.target
                    .return_from_function(need(left_reg)?, symbols.get(id))?;
                Ok(None)
            }

            AstOp::FunctionCall(id) => Ok(Some(
                self.target.function_call(need(left_reg)?, symbols.get(*id))?,
            )),

            AstOp::PreIncrement(id) => Ok(Some(
                self.target
                    .load_symbol(symbols.get(*id), LoadMode::PreIncrement)?,
            )),
            AstOp::PreDecrement(id) => Ok(Some(
                self.target
                    .load_symbol(symbols.get(*id), LoadMode::PreDecrement)?,
            )),
            AstOp::PostIncrement(id) => Ok(Some(
                self.target
                    .load_symbol(symbols.get(*id), LoadMode::PostIncrement)?,
            )),
            AstOp::PostDecrement(id) => Ok(Some(
                self.target
                    .load_symbol(symbols.get(*id), LoadMode::PostDecrement)?,
            )),

            AstOp::Glue | AstOp::If | AstOp::While | AstOp::Function(_) => {
                unreachable!("structural operators are handled before child traversal")
            }

            other => Err(CompileError::codegen(format!(
                "unknown AST operator {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TargetKind;
    use crate::symbols::StructuralType;

    #[test]
    fn test_label_allocator_starts_at_one() {
        let mut labels = LabelAllocator::new();
        assert_eq!(labels.allocate(), LabelId(1));
        assert_eq!(labels.allocate(), LabelId(2));
        assert_eq!(labels.allocate(), LabelId(3));
    }

    #[test]
    fn test_string_declaration_hands_out_fresh_labels() {
        let mut cg = CodeGenerator::new(TargetKind::Nasm.ops());
        let first = cg.declare_global_string(b"a");
        let second = cg.declare_global_string(b"b");
        assert_ne!(first, second);
        let out = cg.into_assembly();
        assert!(out.contains(&format!("{}:", first)));
        assert!(out.contains(&format!("{}:", second)));
    }

    #[test]
    fn test_literal_expression_emits_into_registers() {
        let mut symbols = SymbolTable::new();
        let main = symbols
            .add_global(
                "main",
                PrimType::Int,
                StructuralType::Function,
                Some(LabelId(9)),
                1,
            )
            .unwrap();

        let mut lit = AstNode::leaf(AstOp::IntLiteral(7), PrimType::Int);
        lit.rvalue = true;
        let ret = AstNode::unary(AstOp::Return, PrimType::None, lit);
        let func = AstNode::unary(AstOp::Function(main), PrimType::Int, ret);

        let mut cg = CodeGenerator::new(TargetKind::Nasm.ops());
        cg.generate(&func, &symbols).unwrap();
        let out = cg.into_assembly();
        assert!(out.contains("main:"));
        assert!(out.contains("\tmov\tr8, 7"));
        assert!(out.contains("\tmov\teax, r8d"));
        assert!(out.contains("\tjmp\tL9"));
        assert!(out.contains("L9:"));
    }

    #[test]
    fn test_scale_strength_reduction() {
        let symbols = SymbolTable::new();
        let mut cg = CodeGenerator::new(TargetKind::Nasm.ops());

        let mut index = AstNode::leaf(AstOp::IntLiteral(3), PrimType::Int);
        index.rvalue = true;
        let mut scale = AstNode::unary(AstOp::Scale(4), PrimType::IntPtr, index);
        scale.rvalue = true;
        cg.walk(&scale, &symbols, None, None).unwrap();
        let out = cg.into_assembly();
        assert!(out.contains("\tshl\tr8, 2"));
        assert!(!out.contains("imul"));
    }

    #[test]
    fn test_scale_by_odd_size_multiplies() {
        let symbols = SymbolTable::new();
        let mut cg = CodeGenerator::new(TargetKind::Nasm.ops());

        let mut index = AstNode::leaf(AstOp::IntLiteral(3), PrimType::Int);
        index.rvalue = true;
        let mut scale = AstNode::unary(AstOp::Scale(24), PrimType::IntPtr, index);
        scale.rvalue = true;
        cg.walk(&scale, &symbols, None, None).unwrap();
        let out = cg.into_assembly();
        assert!(out.contains("\tmov\tr9, 24"));
        assert!(out.contains("\timul"));
    }
}

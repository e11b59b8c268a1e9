//! The primitive type lattice and operator-context coercion
//!
//! The language has four base types (`void`, `char`, `int`, `long`) and one
//! level of pointer to each. Integer widths are fixed (1/4/8 bytes); every
//! pointer occupies 8 bytes on both targets.

use crate::frontend::ast::{AstNode, AstOp};

/// Primitive type of a symbol or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimType {
    /// Absent type, used on structural nodes (glue, statements).
    None,
    Void,
    Char,
    Int,
    Long,
    VoidPtr,
    CharPtr,
    IntPtr,
    LongPtr,
}

impl PrimType {
    /// Size of a value of this type in bytes.
    pub fn size(self) -> usize {
        match self {
            PrimType::None | PrimType::Void => 0,
            PrimType::Char => 1,
            PrimType::Int => 4,
            PrimType::Long => 8,
            PrimType::VoidPtr | PrimType::CharPtr | PrimType::IntPtr | PrimType::LongPtr => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, PrimType::Char | PrimType::Int | PrimType::Long)
    }

    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            PrimType::VoidPtr | PrimType::CharPtr | PrimType::IntPtr | PrimType::LongPtr
        )
    }

    /// The pointer type that points at this base type.
    ///
    /// Only the four base types have a pointer form; asking for a pointer to
    /// anything else is a bug in the caller.
    pub fn pointer_to(self) -> Result<PrimType, PrimType> {
        match self {
            PrimType::Void => Ok(PrimType::VoidPtr),
            PrimType::Char => Ok(PrimType::CharPtr),
            PrimType::Int => Ok(PrimType::IntPtr),
            PrimType::Long => Ok(PrimType::LongPtr),
            other => Err(other),
        }
    }

    /// The base type a value of this pointer type points at.
    pub fn value_at(self) -> Result<PrimType, PrimType> {
        match self {
            PrimType::VoidPtr => Ok(PrimType::Void),
            PrimType::CharPtr => Ok(PrimType::Char),
            PrimType::IntPtr => Ok(PrimType::Int),
            PrimType::LongPtr => Ok(PrimType::Long),
            other => Err(other),
        }
    }

    /// Name used in diagnostics and the AST dump.
    pub fn name(self) -> &'static str {
        match self {
            PrimType::None => "none",
            PrimType::Void => "void",
            PrimType::Char => "char",
            PrimType::Int => "int",
            PrimType::Long => "long",
            PrimType::VoidPtr => "void*",
            PrimType::CharPtr => "char*",
            PrimType::IntPtr => "int*",
            PrimType::LongPtr => "long*",
        }
    }
}

/// Coerce `node` so its result matches `target` in the context of operator
/// `op` (`None` for assignment and return checking).
///
/// Returns `Ok` with the possibly rewrapped tree when the types are
/// compatible, `Err` handing the unchanged tree back when they are not, so
/// the caller can try the opposite direction or report a type error.
///
/// Rules:
/// - integer vs integer: equal passes through, strictly smaller gets a
///   widen wrapper, strictly larger fails (no implicit narrowing);
/// - pointer vs the same pointer type passes through outside any operator;
/// - integer added to / subtracted from a pointer gets a scale wrapper
///   multiplying by the pointee size (skipped when the pointee is 1 byte);
/// - everything else is incompatible.
pub fn coerce_for_op(
    mut node: Box<AstNode>,
    target: PrimType,
    op: Option<&AstOp>,
) -> Result<Box<AstNode>, Box<AstNode>> {
    let have = node.ty;

    if have.is_integer() && target.is_integer() {
        if have == target {
            return Ok(node);
        }
        if have.size() > target.size() {
            return Err(node);
        }
        return Ok(AstNode::unary(AstOp::Widen, target, node));
    }

    if have.is_pointer() {
        if op.is_none() && have == target {
            return Ok(node);
        }
        return Err(node);
    }

    // Pointer arithmetic: scale the integer side by the pointee size so
    // indexing steps by whole elements.
    if matches!(op, Some(AstOp::Add) | Some(AstOp::Subtract)) && have.is_integer() {
        if let Ok(pointee) = target.value_at() {
            let size = pointee.size();
            if size > 1 {
                node = AstNode::unary(AstOp::Scale(size), target, node);
                return Ok(node);
            }
            if size == 1 {
                return Ok(node);
            }
        }
    }

    Err(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_leaf(ty: PrimType) -> Box<AstNode> {
        AstNode::leaf(AstOp::IntLiteral(1), ty)
    }

    #[test]
    fn test_sizes() {
        assert_eq!(PrimType::Char.size(), 1);
        assert_eq!(PrimType::Int.size(), 4);
        assert_eq!(PrimType::Long.size(), 8);
        for ptr in [
            PrimType::VoidPtr,
            PrimType::CharPtr,
            PrimType::IntPtr,
            PrimType::LongPtr,
        ] {
            assert_eq!(ptr.size(), 8);
        }
    }

    #[test]
    fn test_predicates_partition() {
        for ty in [PrimType::Char, PrimType::Int, PrimType::Long] {
            assert!(ty.is_integer() && !ty.is_pointer());
        }
        for ty in [
            PrimType::VoidPtr,
            PrimType::CharPtr,
            PrimType::IntPtr,
            PrimType::LongPtr,
        ] {
            assert!(ty.is_pointer() && !ty.is_integer());
        }
        assert!(!PrimType::Void.is_integer() && !PrimType::Void.is_pointer());
    }

    #[test]
    fn test_pointer_bijection() {
        for base in [PrimType::Void, PrimType::Char, PrimType::Int, PrimType::Long] {
            let ptr = base.pointer_to().unwrap();
            assert_eq!(ptr.value_at().unwrap(), base);
        }
        assert!(PrimType::IntPtr.pointer_to().is_err());
        assert!(PrimType::Int.value_at().is_err());
    }

    #[test]
    fn test_widen_is_monotone() {
        // Same type: passes through untouched.
        let same = coerce_for_op(int_leaf(PrimType::Int), PrimType::Int, None).unwrap();
        assert!(matches!(same.op, AstOp::IntLiteral(_)));

        // Strictly smaller: wrapped in a widen node of the context type.
        let widened = coerce_for_op(int_leaf(PrimType::Char), PrimType::Long, None).unwrap();
        assert!(matches!(widened.op, AstOp::Widen));
        assert_eq!(widened.ty, PrimType::Long);

        // Strictly larger: refused.
        assert!(coerce_for_op(int_leaf(PrimType::Long), PrimType::Char, None).is_err());
        assert!(coerce_for_op(int_leaf(PrimType::Int), PrimType::Char, None).is_err());
    }

    #[test]
    fn test_pointer_assignment_compatibility() {
        let node = int_leaf(PrimType::IntPtr);
        let out = coerce_for_op(node, PrimType::IntPtr, None).unwrap();
        assert!(matches!(out.op, AstOp::IntLiteral(_)));

        assert!(coerce_for_op(int_leaf(PrimType::IntPtr), PrimType::CharPtr, None).is_err());
    }

    #[test]
    fn test_pointer_arithmetic_scales_index() {
        let scaled =
            coerce_for_op(int_leaf(PrimType::Int), PrimType::IntPtr, Some(&AstOp::Add)).unwrap();
        assert!(matches!(scaled.op, AstOp::Scale(4)));
        assert_eq!(scaled.ty, PrimType::IntPtr);

        let scaled =
            coerce_for_op(int_leaf(PrimType::Int), PrimType::LongPtr, Some(&AstOp::Subtract))
                .unwrap();
        assert!(matches!(scaled.op, AstOp::Scale(8)));

        // char* steps by one byte, no scale node.
        let plain =
            coerce_for_op(int_leaf(PrimType::Int), PrimType::CharPtr, Some(&AstOp::Add)).unwrap();
        assert!(matches!(plain.op, AstOp::IntLiteral(_)));
    }

    #[test]
    fn test_pointer_arithmetic_rejected_outside_add_sub() {
        assert!(coerce_for_op(
            int_leaf(PrimType::Int),
            PrimType::IntPtr,
            Some(&AstOp::Multiply)
        )
        .is_err());
        assert!(coerce_for_op(int_leaf(PrimType::Int), PrimType::IntPtr, None).is_err());
    }

    #[test]
    fn test_void_incompatible() {
        assert!(coerce_for_op(int_leaf(PrimType::Void), PrimType::Int, None).is_err());
        assert!(coerce_for_op(int_leaf(PrimType::Int), PrimType::Void, None).is_err());
    }
}

//! Abstract syntax tree
//!
//! One node shape serves expressions, statements and definitions, the way
//! the generator wants to walk them: an operator tag, a result type, an
//! rvalue bit and up to three owned children. The operator is a tagged sum
//! whose variants carry exactly the payload that operator needs, so a
//! category mistake (say, reading a literal value off an identifier node)
//! is unrepresentable.

mod dump;

pub use dump::{dump_compact, dump_tree, DumpMode};

use crate::common::LabelId;
use crate::symbols::SymbolId;
use crate::types::PrimType;

/// Operator performed by an AST node, with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstOp {
    // Binary operators
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    LeftShift,
    RightShift,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,

    // Unary operators
    LogicalNot,
    Invert,
    Negate,
    /// Extend the child's integer value to this node's wider type.
    Widen,
    /// Multiply the child by a fixed byte size for pointer arithmetic.
    Scale(usize),
    /// Load through the pointer produced by the child (rvalue), or pass the
    /// address along (lvalue).
    Dereference,
    /// Normalize the child to 0/1, or branch when it is zero.
    ToBool,
    Return,

    // Leaves
    IntLiteral(i64),
    /// Address of a string emitted to the read-only data segment.
    StringLiteral(LabelId),
    Identifier(SymbolId),
    AddressOf(SymbolId),
    PreIncrement(SymbolId),
    PreDecrement(SymbolId),
    PostIncrement(SymbolId),
    PostDecrement(SymbolId),
    FunctionCall(SymbolId),

    // Structure
    /// Sequence two statements; no value.
    Glue,
    If,
    While,
    Function(SymbolId),
}

impl AstOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            AstOp::Equal
                | AstOp::NotEqual
                | AstOp::LessThan
                | AstOp::GreaterThan
                | AstOp::LessOrEqual
                | AstOp::GreaterOrEqual
        )
    }
}

/// A node in the AST. Children are owned; a subtree is dropped as a unit
/// once its function has been emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub op: AstOp,
    pub ty: PrimType,
    /// True when the value at this node is consumed as a value rather than
    /// designating a store destination.
    pub rvalue: bool,
    pub left: Option<Box<AstNode>>,
    /// Then-branch of an `if`; unused by every other operator.
    pub mid: Option<Box<AstNode>>,
    pub right: Option<Box<AstNode>>,
}

impl AstNode {
    /// General constructor with up to three children.
    pub fn node(
        op: AstOp,
        ty: PrimType,
        left: Option<Box<AstNode>>,
        mid: Option<Box<AstNode>>,
        right: Option<Box<AstNode>>,
    ) -> Box<AstNode> {
        Box::new(AstNode {
            op,
            ty,
            rvalue: false,
            left,
            mid,
            right,
        })
    }

    /// Leaf node without children.
    pub fn leaf(op: AstOp, ty: PrimType) -> Box<AstNode> {
        AstNode::node(op, ty, None, None, None)
    }

    /// Node with a single (left) child.
    pub fn unary(op: AstOp, ty: PrimType, child: Box<AstNode>) -> Box<AstNode> {
        AstNode::node(op, ty, Some(child), None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let lit = AstNode::leaf(AstOp::IntLiteral(7), PrimType::Char);
        assert!(lit.left.is_none() && lit.mid.is_none() && lit.right.is_none());
        assert!(!lit.rvalue);

        let neg = AstNode::unary(AstOp::Negate, PrimType::Char, lit);
        assert!(neg.left.is_some());
        assert!(matches!(neg.left.as_ref().unwrap().op, AstOp::IntLiteral(7)));
    }

    #[test]
    fn test_comparison_predicate() {
        assert!(AstOp::Equal.is_comparison());
        assert!(AstOp::GreaterOrEqual.is_comparison());
        assert!(!AstOp::Add.is_comparison());
        assert!(!AstOp::LogicalAnd.is_comparison());
    }

    #[test]
    fn test_post_order_visits_each_node_once() {
        // a + b * c builds a tree of five nodes; a post-order walk must
        // touch every one of them exactly once.
        let a = AstNode::leaf(AstOp::IntLiteral(1), PrimType::Int);
        let b = AstNode::leaf(AstOp::IntLiteral(2), PrimType::Int);
        let c = AstNode::leaf(AstOp::IntLiteral(3), PrimType::Int);
        let mul = AstNode::node(AstOp::Multiply, PrimType::Int, Some(b), None, Some(c));
        let add = AstNode::node(AstOp::Add, PrimType::Int, Some(a), None, Some(mul));

        fn count(node: &AstNode) -> usize {
            let mut n = 1;
            for child in [&node.left, &node.mid, &node.right].into_iter().flatten() {
                n += count(child);
            }
            n
        }
        assert_eq!(count(&add), 5);
    }
}

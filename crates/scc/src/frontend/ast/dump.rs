//! Debug rendering of AST subtrees
//!
//! Two forms: an indented one-node-per-line tree for reading, and a
//! compact single-line s-expression for diffing compiler revisions.

use super::{AstNode, AstOp};
use crate::symbols::SymbolTable;
use crate::types::PrimType;

/// Which rendering, if any, is printed for each function before emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpMode {
    #[default]
    None,
    /// Indented multi-line tree.
    Tree,
    /// Single-line s-expression.
    Compact,
}

fn op_label(op: &AstOp, symbols: &SymbolTable) -> String {
    match op {
        AstOp::Assign => "assign".into(),
        AstOp::Add => "add".into(),
        AstOp::Subtract => "subtract".into(),
        AstOp::Multiply => "multiply".into(),
        AstOp::Divide => "divide".into(),
        AstOp::Equal => "eq".into(),
        AstOp::NotEqual => "ne".into(),
        AstOp::LessThan => "lt".into(),
        AstOp::GreaterThan => "gt".into(),
        AstOp::LessOrEqual => "le".into(),
        AstOp::GreaterOrEqual => "ge".into(),
        AstOp::LeftShift => "lshift".into(),
        AstOp::RightShift => "rshift".into(),
        AstOp::BitAnd => "bitand".into(),
        AstOp::BitOr => "bitor".into(),
        AstOp::BitXor => "bitxor".into(),
        AstOp::LogicalAnd => "logand".into(),
        AstOp::LogicalOr => "logor".into(),
        AstOp::LogicalNot => "lognot".into(),
        AstOp::Invert => "invert".into(),
        AstOp::Negate => "negate".into(),
        AstOp::Widen => "widen".into(),
        AstOp::Scale(n) => format!("scale {}", n),
        AstOp::Dereference => "deref".into(),
        AstOp::ToBool => "tobool".into(),
        AstOp::Return => "return".into(),
        AstOp::IntLiteral(v) => format!("intlit {}", v),
        AstOp::StringLiteral(label) => format!("strlit {}", label),
        AstOp::Identifier(id) => format!("ident {}", symbols.get(*id).name),
        AstOp::AddressOf(id) => format!("addressof {}", symbols.get(*id).name),
        AstOp::PreIncrement(id) => format!("preinc {}", symbols.get(*id).name),
        AstOp::PreDecrement(id) => format!("predec {}", symbols.get(*id).name),
        AstOp::PostIncrement(id) => format!("postinc {}", symbols.get(*id).name),
        AstOp::PostDecrement(id) => format!("postdec {}", symbols.get(*id).name),
        AstOp::FunctionCall(id) => format!("call {}", symbols.get(*id).name),
        AstOp::Glue => "glue".into(),
        AstOp::If => "if".into(),
        AstOp::While => "while".into(),
        AstOp::Function(id) => format!("function {}", symbols.get(*id).name),
    }
}

/// Render `node` as an indented multi-line tree.
pub fn dump_tree(node: &AstNode, symbols: &SymbolTable) -> String {
    let mut out = String::new();
    dump_tree_into(node, symbols, 0, &mut out);
    out
}

fn dump_tree_into(node: &AstNode, symbols: &SymbolTable, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&op_label(&node.op, symbols));
    if node.ty != PrimType::None {
        out.push_str(&format!(" [{}]", node.ty.name()));
        if node.rvalue {
            out.push_str(" rvalue");
        }
    }
    out.push('\n');
    for child in [&node.left, &node.mid, &node.right].into_iter().flatten() {
        dump_tree_into(child, symbols, depth + 1, out);
    }
}

/// Render `node` as a one-line s-expression.
pub fn dump_compact(node: &AstNode, symbols: &SymbolTable) -> String {
    let children: Vec<String> = [&node.left, &node.mid, &node.right]
        .into_iter()
        .flatten()
        .map(|child| dump_compact(child, symbols))
        .collect();
    if children.is_empty() {
        format!("({})", op_label(&node.op, symbols))
    } else {
        format!("({} {})", op_label(&node.op, symbols), children.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::StructuralType;

    #[test]
    fn test_compact_dump_shapes() {
        let mut symbols = SymbolTable::new();
        let a = symbols
            .add_global("a", PrimType::Int, StructuralType::Variable, None, 1)
            .unwrap();

        let lit = AstNode::leaf(AstOp::IntLiteral(5), PrimType::Char);
        let ident = AstNode::leaf(AstOp::Identifier(a), PrimType::Int);
        let assign = AstNode::node(AstOp::Assign, PrimType::Int, Some(lit), None, Some(ident));

        assert_eq!(
            dump_compact(&assign, &symbols),
            "(assign (intlit 5) (ident a))"
        );
    }

    #[test]
    fn test_tree_dump_indents_children() {
        let symbols = SymbolTable::new();
        let one = AstNode::leaf(AstOp::IntLiteral(1), PrimType::Char);
        let two = AstNode::leaf(AstOp::IntLiteral(2), PrimType::Char);
        let add = AstNode::node(AstOp::Add, PrimType::Char, Some(one), None, Some(two));

        let text = dump_tree(&add, &symbols);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("add"));
        assert!(lines[1].starts_with("  intlit 1"));
        assert!(lines[2].starts_with("  intlit 2"));
    }
}

//! Assembly label identifiers

use std::fmt;

/// Numbered assembly label. Label numbers are handed out by the code
/// generator's allocator starting at 1 and are unique within one output
/// file; both targets print them as `Ln`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

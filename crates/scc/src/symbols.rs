//! Fixed-capacity symbol table
//!
//! One flat table holds every named entity in the compilation. Global
//! entries grow upward from slot 0; local entries grow downward from the
//! top, so the two halves share the fixed capacity. Lookup prefers the
//! local half, which gives local names shadowing semantics without nested
//! scopes.

use crate::common::LabelId;
use crate::types::PrimType;

/// Maximum number of live symbols in one compilation.
pub const NSYMBOLS: usize = 1024;

/// Index of a symbol in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub usize);

/// What kind of entity a name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralType {
    Variable,
    Function,
    Array,
}

/// Where the entity's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Global,
    Local,
}

/// A named entity known to the compiler.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub prim: PrimType,
    pub structural: StructuralType,
    pub storage: StorageClass,
    /// Single exit label, present on functions with a body.
    pub end_label: Option<LabelId>,
    /// Element count for arrays, 1 otherwise.
    pub size: usize,
    /// Byte distance below the frame pointer, locals only.
    pub stack_offset: i32,
}

pub struct SymbolTable {
    slots: Vec<Option<Symbol>>,
    /// Next free slot for a global, grows upward.
    next_global: usize,
    /// Next free slot for a local, grows downward. Signed so the table can
    /// fill completely without wrapping.
    next_local: isize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None; NSYMBOLS],
            next_global: 0,
            next_local: NSYMBOLS as isize - 1,
        }
    }

    /// Add a global symbol, or return the slot of an existing one with the
    /// same name. Fails when the table is full.
    pub fn add_global(
        &mut self,
        name: &str,
        prim: PrimType,
        structural: StructuralType,
        end_label: Option<LabelId>,
        size: usize,
    ) -> Result<SymbolId, String> {
        if let Some(id) = self.find_global(name) {
            return Ok(id);
        }
        if self.next_global as isize > self.next_local {
            return Err("too many global symbols".to_string());
        }
        let id = SymbolId(self.next_global);
        self.next_global += 1;
        self.slots[id.0] = Some(Symbol {
            name: name.to_string(),
            prim,
            structural,
            storage: StorageClass::Global,
            end_label,
            size,
            stack_offset: 0,
        });
        Ok(id)
    }

    /// Add a local symbol, or return the slot of an existing one with the
    /// same name. Fails when the local half meets the global half.
    pub fn add_local(
        &mut self,
        name: &str,
        prim: PrimType,
        structural: StructuralType,
        stack_offset: i32,
    ) -> Result<SymbolId, String> {
        if let Some(id) = self.find_local(name) {
            return Ok(id);
        }
        if self.next_local < self.next_global as isize {
            return Err("too many local symbols".to_string());
        }
        let id = SymbolId(self.next_local as usize);
        self.next_local -= 1;
        self.slots[id.0] = Some(Symbol {
            name: name.to_string(),
            prim,
            structural,
            storage: StorageClass::Local,
            end_label: None,
            size: 1,
            stack_offset,
        });
        Ok(id)
    }

    pub fn find_global(&self, name: &str) -> Option<SymbolId> {
        (0..self.next_global)
            .find(|&i| self.slots[i].as_ref().is_some_and(|s| s.name == name))
            .map(SymbolId)
    }

    pub fn find_local(&self, name: &str) -> Option<SymbolId> {
        let first = (self.next_local + 1).max(0) as usize;
        (first..NSYMBOLS)
            .find(|&i| self.slots[i].as_ref().is_some_and(|s| s.name == name))
            .map(SymbolId)
    }

    /// Look a name up, preferring the local half over the global half.
    pub fn find(&self, name: &str) -> Option<SymbolId> {
        self.find_local(name).or_else(|| self.find_global(name))
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        self.slots[id.0]
            .as_ref()
            .unwrap_or_else(|| panic!("symbol slot {} is empty", id.0))
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        self.slots[id.0]
            .as_mut()
            .unwrap_or_else(|| panic!("symbol slot {} is empty", id.0))
    }

    /// Drop the local half once the owning function has been emitted.
    pub fn release_locals(&mut self) {
        let first = (self.next_local + 1).max(0) as usize;
        for slot in self.slots.iter_mut().skip(first) {
            *slot = None;
        }
        self.next_local = NSYMBOLS as isize - 1;
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

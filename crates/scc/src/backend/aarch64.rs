//! AArch64 target, GNU as flavor
//!
//! Emits AAPCS64-conforming assembly. Scratch values live in the
//! caller-saved x9-x16 range; x0 doubles as the address scratch for symbol
//! access, the call argument and the return value, so nothing in the
//! scratch set needs to survive a call.

use super::{align16, align_pow2, CompareOp, LoadMode, Reg, RegisterPool, TargetOps};
use crate::common::{CompileError, CompileResult, LabelId};
use crate::symbols::{StorageClass, StructuralType, Symbol};
use crate::types::PrimType;

const NUM_REGISTERS: usize = 8;

const XREGS: [&str; NUM_REGISTERS] = ["x9", "x10", "x11", "x12", "x13", "x14", "x15", "x16"];
const WREGS: [&str; NUM_REGISTERS] = ["w9", "w10", "w11", "w12", "w13", "w14", "w15", "w16"];

pub struct Aarch64Target {
    out: String,
    regs: RegisterPool,
    local_bytes: i32,
    /// Frame reservation of the function currently being emitted.
    frame_bytes: i32,
}

impl Aarch64Target {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            regs: RegisterPool::new(NUM_REGISTERS),
            local_bytes: 0,
            frame_bytes: 0,
        }
    }

    fn emit(&mut self, line: impl AsRef<str>) {
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    fn x(reg: Reg) -> &'static str {
        XREGS[reg.0]
    }

    fn w(reg: Reg) -> &'static str {
        WREGS[reg.0]
    }

    /// Compute the address of a symbol's storage into x0.
    fn address_into_x0(&mut self, sym: &Symbol) {
        match sym.storage {
            StorageClass::Global => {
                self.emit(format!("\tadrp\tx0, {}", sym.name));
                self.emit(format!("\tadd\tx0, x0, :lo12:{}", sym.name));
            }
            StorageClass::Local => {
                self.emit(format!("\tsub\tx0, x29, #{}", sym.stack_offset));
            }
        }
    }

    /// Load the value at the address in x0 into `reg`, sized by `ty`.
    fn load_from_x0(&mut self, reg: Reg, ty: PrimType) -> CompileResult<()> {
        match ty.size() {
            1 => self.emit(format!("\tldrb\t{}, [x0]", Self::w(reg))),
            4 => self.emit(format!("\tldr\t{}, [x0]", Self::w(reg))),
            8 => self.emit(format!("\tldr\t{}, [x0]", Self::x(reg))),
            _ => {
                return Err(CompileError::codegen(format!(
                    "cannot load value of type {}",
                    ty.name()
                )))
            }
        }
        Ok(())
    }

    /// Store `reg` to the address in x0, sized by `ty`.
    fn store_to_x0(&mut self, reg: Reg, ty: PrimType) -> CompileResult<()> {
        match ty.size() {
            1 => self.emit(format!("\tstrb\t{}, [x0]", Self::w(reg))),
            4 => self.emit(format!("\tstr\t{}, [x0]", Self::w(reg))),
            8 => self.emit(format!("\tstr\t{}, [x0]", Self::x(reg))),
            _ => {
                return Err(CompileError::codegen(format!(
                    "cannot store value of type {}",
                    ty.name()
                )))
            }
        }
        Ok(())
    }

    fn condition_code(op: CompareOp) -> &'static str {
        match op {
            CompareOp::Equal => "eq",
            CompareOp::NotEqual => "ne",
            CompareOp::LessThan => "lt",
            CompareOp::LessOrEqual => "le",
            CompareOp::GreaterThan => "gt",
            CompareOp::GreaterOrEqual => "ge",
        }
    }

    /// Branch mnemonic for the INVERSE of `op`; the jump is taken when the
    /// source-level condition is false.
    fn inverted_branch_mnemonic(op: CompareOp) -> &'static str {
        match op {
            CompareOp::Equal => "bne",
            CompareOp::NotEqual => "beq",
            CompareOp::LessThan => "bge",
            CompareOp::LessOrEqual => "bgt",
            CompareOp::GreaterThan => "ble",
            CompareOp::GreaterOrEqual => "blt",
        }
    }

    /// Normalize `reg` in place to 0 or 1.
    fn booleanize(&mut self, reg: Reg) {
        self.emit(format!("\tcmp\t{}, #0", Self::x(reg)));
        self.emit(format!("\tcset\t{}, ne", Self::w(reg)));
    }
}

impl Default for Aarch64Target {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetOps for Aarch64Target {
    fn name(&self) -> &'static str {
        "aarch64"
    }

    fn reset_registers(&mut self) {
        self.regs.reset();
    }

    fn preamble(&mut self) {
        self.regs.reset();
        self.emit("\t.text");
        self.emit("\t.extern\tprintint");
        self.emit("\t.extern\tprintchar");
        self.emit("\t.extern\tprintstring");
    }

    fn postamble(&mut self) {}

    fn function_preamble(&mut self, sym: &Symbol) {
        self.emit("\t.text");
        self.emit(format!("\t.global\t{}", sym.name));
        self.emit(format!("{}:", sym.name));
        self.emit("\tstp\tx29, x30, [sp, -16]!");
        self.emit("\tmov\tx29, sp");
        self.frame_bytes = align16(self.local_bytes);
        if self.frame_bytes > 0 {
            self.emit(format!("\tsub\tsp, sp, #{}", self.frame_bytes));
        }
    }

    fn function_postamble(&mut self, sym: &Symbol) {
        if let Some(end) = sym.end_label {
            self.label(end);
        }
        if self.frame_bytes > 0 {
            self.emit("\tmov\tsp, x29");
        }
        self.emit("\tldp\tx29, x30, [sp], 16");
        self.emit("\tret");
        self.frame_bytes = 0;
    }

    fn function_call(&mut self, arg: Reg, sym: &Symbol) -> CompileResult<Reg> {
        let out = self.regs.allocate()?;
        self.emit(format!("\tmov\tx0, {}", Self::x(arg)));
        self.emit(format!("\tbl\t{}", sym.name));
        self.emit(format!("\tmov\t{}, x0", Self::x(out)));
        self.regs.free(arg);
        Ok(out)
    }

    fn return_from_function(&mut self, reg: Reg, sym: &Symbol) -> CompileResult<()> {
        match sym.prim {
            PrimType::Char | PrimType::Int => {
                self.emit(format!("\tmov\tw0, {}", Self::w(reg)))
            }
            ty if ty.size() == 8 => self.emit(format!("\tmov\tx0, {}", Self::x(reg))),
            other => {
                return Err(CompileError::codegen(format!(
                    "cannot return a value of type {}",
                    other.name()
                )))
            }
        }
        let end = sym.end_label.ok_or_else(|| {
            CompileError::codegen(format!("function {} has no end label", sym.name))
        })?;
        self.jump(end);
        Ok(())
    }

    fn declare_global_symbol(&mut self, sym: &Symbol) -> CompileResult<()> {
        let element_size = sym.prim.size();
        if element_size == 0 {
            return Err(CompileError::codegen(format!(
                "symbol {} has type {} with no storage size",
                sym.name,
                sym.prim.name()
            )));
        }
        let count = match sym.structural {
            StructuralType::Array => sym.size,
            _ => 1,
        };
        let total = element_size.checked_mul(count).ok_or_else(|| {
            CompileError::codegen(format!("total size of {} overflows", sym.name))
        })?;

        let p2 = align_pow2(element_size).trailing_zeros();
        self.emit("\t.section\t.bss");
        self.emit(format!("\t.globl\t{}", sym.name));
        self.emit(format!("\t.p2align\t{}", p2));
        self.emit(format!("{}:", sym.name));
        self.emit(format!("\t.zero\t{}", total));
        Ok(())
    }

    fn declare_global_string(&mut self, label: LabelId, bytes: &[u8]) {
        self.emit("\t.section\t.rodata");
        self.emit(format!("{}:", label));
        // Printable runs go into .ascii chunks; other bytes are emitted
        // individually with .byte.
        let mut run = String::new();
        let mut lines: Vec<String> = Vec::new();
        for &c in bytes {
            let printable = (0x20..=0x7e).contains(&c) && c != b'"' && c != b'\\';
            if printable {
                run.push(c as char);
            } else {
                if !run.is_empty() {
                    lines.push(format!("\t.ascii\t\"{}\"", run));
                    run.clear();
                }
                lines.push(format!("\t.byte\t{}", c));
            }
        }
        if !run.is_empty() {
            lines.push(format!("\t.ascii\t\"{}\"", run));
        }
        for line in lines {
            self.emit(line);
        }
        self.emit("\t.byte\t0");
    }

    fn load_immediate(&mut self, value: i64, _ty: PrimType) -> CompileResult<Reg> {
        let reg = self.regs.allocate()?;
        self.emit(format!("\tmov\t{}, #{}", Self::x(reg), value));
        Ok(reg)
    }

    fn load_symbol(&mut self, sym: &Symbol, mode: LoadMode) -> CompileResult<Reg> {
        let reg = self.regs.allocate()?;
        self.address_into_x0(sym);

        match mode {
            LoadMode::Plain => {
                self.load_from_x0(reg, sym.prim)?;
            }
            LoadMode::PreIncrement | LoadMode::PreDecrement => {
                self.load_from_x0(reg, sym.prim)?;
                let insn = if mode == LoadMode::PreIncrement { "add" } else { "sub" };
                self.emit(format!(
                    "\t{}\t{}, {}, #1",
                    insn,
                    Self::x(reg),
                    Self::x(reg)
                ));
                self.store_to_x0(reg, sym.prim)?;
            }
            LoadMode::PostIncrement | LoadMode::PostDecrement => {
                self.load_from_x0(reg, sym.prim)?;
                let tmp = self.regs.allocate()?;
                let insn = if mode == LoadMode::PostIncrement { "add" } else { "sub" };
                self.emit(format!(
                    "\t{}\t{}, {}, #1",
                    insn,
                    Self::x(tmp),
                    Self::x(reg)
                ));
                self.store_to_x0(tmp, sym.prim)?;
                self.regs.free(tmp);
            }
        }
        Ok(reg)
    }

    fn load_string_address(&mut self, label: LabelId) -> CompileResult<Reg> {
        let reg = self.regs.allocate()?;
        self.emit(format!("\tadrp\t{}, {}", Self::x(reg), label));
        self.emit(format!(
            "\tadd\t{}, {}, :lo12:{}",
            Self::x(reg),
            Self::x(reg),
            label
        ));
        Ok(reg)
    }

    fn store_symbol(&mut self, reg: Reg, sym: &Symbol) -> CompileResult<Reg> {
        self.address_into_x0(sym);
        self.store_to_x0(reg, sym.prim)?;
        Ok(reg)
    }

    fn add(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!(
            "\tadd\t{}, {}, {}",
            Self::x(r2),
            Self::x(r2),
            Self::x(r1)
        ));
        self.regs.free(r1);
        r2
    }

    fn subtract(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!(
            "\tsub\t{}, {}, {}",
            Self::x(r1),
            Self::x(r1),
            Self::x(r2)
        ));
        self.regs.free(r2);
        r1
    }

    fn multiply(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!(
            "\tmul\t{}, {}, {}",
            Self::x(r2),
            Self::x(r2),
            Self::x(r1)
        ));
        self.regs.free(r1);
        r2
    }

    fn divide(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!(
            "\tsdiv\t{}, {}, {}",
            Self::x(r1),
            Self::x(r1),
            Self::x(r2)
        ));
        self.regs.free(r2);
        r1
    }

    fn shift_left(&mut self, value: Reg, amount: Reg) -> Reg {
        self.emit(format!(
            "\tlsl\t{}, {}, {}",
            Self::x(value),
            Self::x(value),
            Self::x(amount)
        ));
        self.regs.free(amount);
        value
    }

    fn shift_right(&mut self, value: Reg, amount: Reg) -> Reg {
        self.emit(format!(
            "\tasr\t{}, {}, {}",
            Self::x(value),
            Self::x(value),
            Self::x(amount)
        ));
        self.regs.free(amount);
        value
    }

    fn shift_left_by_const(&mut self, reg: Reg, amount: u32) -> Reg {
        self.emit(format!(
            "\tlsl\t{}, {}, #{}",
            Self::x(reg),
            Self::x(reg),
            amount
        ));
        reg
    }

    fn bitwise_and(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!(
            "\tand\t{}, {}, {}",
            Self::x(r2),
            Self::x(r2),
            Self::x(r1)
        ));
        self.regs.free(r1);
        r2
    }

    fn bitwise_or(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!(
            "\torr\t{}, {}, {}",
            Self::x(r2),
            Self::x(r2),
            Self::x(r1)
        ));
        self.regs.free(r1);
        r2
    }

    fn bitwise_xor(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!(
            "\teor\t{}, {}, {}",
            Self::x(r2),
            Self::x(r2),
            Self::x(r1)
        ));
        self.regs.free(r1);
        r2
    }

    fn negate(&mut self, reg: Reg) -> Reg {
        self.emit(format!("\tneg\t{}, {}", Self::x(reg), Self::x(reg)));
        reg
    }

    fn invert(&mut self, reg: Reg) -> Reg {
        self.emit(format!("\tmvn\t{}, {}", Self::x(reg), Self::x(reg)));
        reg
    }

    fn logical_not(&mut self, reg: Reg) -> Reg {
        self.emit(format!("\tcmp\t{}, #0", Self::x(reg)));
        self.emit(format!("\tcset\t{}, eq", Self::w(reg)));
        reg
    }

    fn logical_and(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.booleanize(r1);
        self.booleanize(r2);
        self.emit(format!(
            "\tand\t{}, {}, {}",
            Self::x(r2),
            Self::x(r2),
            Self::x(r1)
        ));
        self.regs.free(r1);
        r2
    }

    fn logical_or(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.booleanize(r1);
        self.booleanize(r2);
        self.emit(format!(
            "\torr\t{}, {}, {}",
            Self::x(r2),
            Self::x(r2),
            Self::x(r1)
        ));
        self.regs.free(r1);
        r2
    }

    fn to_boolean(&mut self, reg: Reg, jump_when_false: Option<LabelId>) -> Reg {
        match jump_when_false {
            Some(label) => {
                self.emit(format!("\tcmp\t{}, #0", Self::x(reg)));
                self.emit(format!("\tbeq\t{}", label));
            }
            None => self.booleanize(reg),
        }
        reg
    }

    fn compare_and_set(&mut self, op: CompareOp, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\tcmp\t{}, {}", Self::x(r1), Self::x(r2)));
        self.emit(format!(
            "\tcset\t{}, {}",
            Self::w(r2),
            Self::condition_code(op)
        ));
        self.regs.free(r1);
        r2
    }

    fn compare_and_jump(&mut self, op: CompareOp, r1: Reg, r2: Reg, label: LabelId) {
        self.emit(format!("\tcmp\t{}, {}", Self::x(r1), Self::x(r2)));
        self.emit(format!(
            "\t{}\t{}",
            Self::inverted_branch_mnemonic(op),
            label
        ));
        self.regs.reset();
    }

    fn label(&mut self, label: LabelId) {
        self.emit(format!("{}:", label));
    }

    fn jump(&mut self, label: LabelId) {
        self.emit(format!("\tb\t{}", label));
    }

    fn widen(&mut self, reg: Reg, _from: PrimType, _to: PrimType) -> Reg {
        // Narrow loads (ldrb, ldr w) already clear the upper bits.
        reg
    }

    fn primitive_size(&self, ty: PrimType) -> usize {
        ty.size()
    }

    fn address_of_symbol(&mut self, sym: &Symbol) -> CompileResult<Reg> {
        let reg = self.regs.allocate()?;
        match sym.storage {
            StorageClass::Global => {
                self.emit(format!("\tadrp\t{}, {}", Self::x(reg), sym.name));
                self.emit(format!(
                    "\tadd\t{}, {}, :lo12:{}",
                    Self::x(reg),
                    Self::x(reg),
                    sym.name
                ));
            }
            StorageClass::Local => {
                self.emit(format!(
                    "\tsub\t{}, x29, #{}",
                    Self::x(reg),
                    sym.stack_offset
                ));
            }
        }
        Ok(reg)
    }

    fn deref_load(&mut self, ptr: Reg, ptr_ty: PrimType) -> CompileResult<Reg> {
        let pointee = ptr_ty.value_at().map_err(|ty| {
            CompileError::codegen(format!("cannot dereference value of type {}", ty.name()))
        })?;
        match pointee.size() {
            1 => self.emit(format!("\tldrb\t{}, [{}]", Self::w(ptr), Self::x(ptr))),
            4 => self.emit(format!("\tldr\t{}, [{}]", Self::w(ptr), Self::x(ptr))),
            8 => self.emit(format!("\tldr\t{}, [{}]", Self::x(ptr), Self::x(ptr))),
            _ => {
                return Err(CompileError::codegen(format!(
                    "cannot load through pointer to {}",
                    pointee.name()
                )))
            }
        }
        Ok(ptr)
    }

    fn deref_store(&mut self, value: Reg, ptr: Reg, value_ty: PrimType) -> CompileResult<Reg> {
        match value_ty.size() {
            1 => self.emit(format!("\tstrb\t{}, [{}]", Self::w(value), Self::x(ptr))),
            4 => self.emit(format!("\tstr\t{}, [{}]", Self::w(value), Self::x(ptr))),
            8 => self.emit(format!("\tstr\t{}, [{}]", Self::x(value), Self::x(ptr))),
            _ => {
                return Err(CompileError::codegen(format!(
                    "cannot store value of type {}",
                    value_ty.name()
                )))
            }
        }
        Ok(value)
    }

    fn reset_local_offsets(&mut self) {
        self.local_bytes = 0;
    }

    fn local_offset(&mut self, ty: PrimType) -> i32 {
        self.local_bytes += ty.size().max(4) as i32;
        self.local_bytes
    }

    fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_int(name: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            prim: PrimType::Int,
            structural: StructuralType::Variable,
            storage: StorageClass::Global,
            end_label: None,
            size: 1,
            stack_offset: 0,
        }
    }

    #[test]
    fn test_global_symbol_access_is_pc_relative() {
        let mut target = Aarch64Target::new();
        let r = target.load_symbol(&global_int("v"), LoadMode::Plain).unwrap();
        target.store_symbol(r, &global_int("v")).unwrap();
        let out = target.take_output();
        assert!(out.contains("\tadrp\tx0, v"));
        assert!(out.contains("\tadd\tx0, x0, :lo12:v"));
        assert!(out.contains("\tldr\tw9, [x0]"));
        assert!(out.contains("\tstr\tw9, [x0]"));
    }

    #[test]
    fn test_char_loads_are_byte_sized() {
        let mut sym = global_int("c");
        sym.prim = PrimType::Char;
        let mut target = Aarch64Target::new();
        target.load_symbol(&sym, LoadMode::Plain).unwrap();
        let out = target.take_output();
        assert!(out.contains("\tldrb\tw9, [x0]"));
    }

    #[test]
    fn test_global_array_reservation() {
        let mut sym = global_int("table");
        sym.structural = StructuralType::Array;
        sym.size = 5;
        let mut target = Aarch64Target::new();
        target.declare_global_symbol(&sym).unwrap();
        let out = target.take_output();
        assert!(out.contains("\t.section\t.bss"));
        assert!(out.contains("\t.globl\ttable"));
        assert!(out.contains("\t.p2align\t2"));
        assert!(out.contains("\t.zero\t20"));
    }

    #[test]
    fn test_string_declaration_interleaves_bytes() {
        let mut target = Aarch64Target::new();
        target.declare_global_string(LabelId(2), b"hi\n");
        let out = target.take_output();
        assert!(out.contains("\t.section\t.rodata"));
        assert!(out.contains("L2:"));
        assert!(out.contains("\t.ascii\t\"hi\""));
        assert!(out.contains("\t.byte\t10"));
        assert!(out.ends_with("\t.byte\t0\n"));
    }

    #[test]
    fn test_compare_and_jump_inverts_condition() {
        let mut target = Aarch64Target::new();
        let r1 = target.regs.allocate().unwrap();
        let r2 = target.regs.allocate().unwrap();
        target.compare_and_jump(CompareOp::GreaterOrEqual, r1, r2, LabelId(4));
        let out = target.take_output();
        assert!(out.contains("\tcmp\tx9, x10"));
        assert!(out.contains("\tblt\tL4"));
    }

    #[test]
    fn test_function_frame_round_trip() {
        let mut target = Aarch64Target::new();
        target.reset_local_offsets();
        target.local_offset(PrimType::Long);
        let mut main = global_int("main");
        main.structural = StructuralType::Function;
        main.end_label = Some(LabelId(1));
        target.function_preamble(&main);
        target.function_postamble(&main);
        let out = target.take_output();
        assert!(out.contains("\tstp\tx29, x30, [sp, -16]!"));
        assert!(out.contains("\tsub\tsp, sp, #16"));
        assert!(out.contains("L1:"));
        assert!(out.contains("\tmov\tsp, x29"));
        assert!(out.contains("\tldp\tx29, x30, [sp], 16"));
        assert!(out.contains("\tret"));
    }

    #[test]
    fn test_post_increment_preserves_loaded_value() {
        let mut target = Aarch64Target::new();
        let r = target
            .load_symbol(&global_int("n"), LoadMode::PostIncrement)
            .unwrap();
        assert_eq!(r, Reg(0));
        let out = target.take_output();
        assert!(out.contains("\tldr\tw9, [x0]"));
        assert!(out.contains("\tadd\tx10, x9, #1"));
        assert!(out.contains("\tstr\tw10, [x0]"));
    }
}

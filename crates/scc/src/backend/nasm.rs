//! NASM-flavored x86-64 target
//!
//! Emits Intel-syntax assembly for the System V ABI, to be assembled with
//! `nasm -f elf64` and linked against the runtime providing `printint`,
//! `printchar`, `printstring` and `_start`. Scratch values live in
//! r8-r11; rax/rdx are reserved for division and returns, rdi carries the
//! single call argument, rcx the variable shift amount.

use super::{align16, align_pow2, CompareOp, LoadMode, Reg, RegisterPool, TargetOps};
use crate::common::{CompileError, CompileResult, LabelId};
use crate::symbols::{StorageClass, StructuralType, Symbol};
use crate::types::PrimType;

const NUM_REGISTERS: usize = 4;

const QWORD_REGS: [&str; NUM_REGISTERS] = ["r8", "r9", "r10", "r11"];
const DWORD_REGS: [&str; NUM_REGISTERS] = ["r8d", "r9d", "r10d", "r11d"];
const BYTE_REGS: [&str; NUM_REGISTERS] = ["r8b", "r9b", "r10b", "r11b"];

pub struct NasmTarget {
    out: String,
    regs: RegisterPool,
    /// Bytes of frame space handed out to locals of the current function.
    local_bytes: i32,
}

impl NasmTarget {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            regs: RegisterPool::new(NUM_REGISTERS),
            local_bytes: 0,
        }
    }

    fn emit(&mut self, line: impl AsRef<str>) {
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    fn q(reg: Reg) -> &'static str {
        QWORD_REGS[reg.0]
    }

    fn d(reg: Reg) -> &'static str {
        DWORD_REGS[reg.0]
    }

    fn b(reg: Reg) -> &'static str {
        BYTE_REGS[reg.0]
    }

    /// Memory operand addressing a symbol's storage.
    fn symbol_operand(sym: &Symbol) -> String {
        match sym.storage {
            StorageClass::Global => format!("[{}]", sym.name),
            StorageClass::Local => format!("[rbp-{}]", sym.stack_offset),
        }
    }

    /// NASM size keyword matching a value type's width.
    fn width_keyword(ty: PrimType) -> CompileResult<&'static str> {
        match ty.size() {
            1 => Ok("BYTE"),
            4 => Ok("DWORD"),
            8 => Ok("QWORD"),
            _ => Err(CompileError::codegen(format!(
                "type {} has no storable width",
                ty.name()
            ))),
        }
    }

    /// Register name for `reg` at the width of `ty`.
    fn reg_at_width(reg: Reg, ty: PrimType) -> CompileResult<&'static str> {
        match ty.size() {
            1 => Ok(Self::b(reg)),
            4 => Ok(Self::d(reg)),
            8 => Ok(Self::q(reg)),
            _ => Err(CompileError::codegen(format!(
                "type {} has no register width",
                ty.name()
            ))),
        }
    }

    /// Load the value addressed by `operand` into `reg`, zero-extending
    /// narrow values to the full register.
    fn emit_load(&mut self, reg: Reg, ty: PrimType, operand: &str) -> CompileResult<()> {
        match ty.size() {
            1 => self.emit(format!("\tmovzx\t{}, BYTE {}", Self::q(reg), operand)),
            4 => self.emit(format!("\tmov\t{}, DWORD {}", Self::d(reg), operand)),
            8 => self.emit(format!("\tmov\t{}, QWORD {}", Self::q(reg), operand)),
            _ => {
                return Err(CompileError::codegen(format!(
                    "cannot load value of type {}",
                    ty.name()
                )))
            }
        }
        Ok(())
    }

    fn set_mnemonic(op: CompareOp) -> &'static str {
        match op {
            CompareOp::Equal => "sete",
            CompareOp::NotEqual => "setne",
            CompareOp::LessThan => "setl",
            CompareOp::LessOrEqual => "setle",
            CompareOp::GreaterThan => "setg",
            CompareOp::GreaterOrEqual => "setge",
        }
    }

    /// Branch mnemonic for the INVERSE of `op`; the jump is taken when the
    /// source-level condition is false.
    fn inverted_jump_mnemonic(op: CompareOp) -> &'static str {
        match op {
            CompareOp::Equal => "jne",
            CompareOp::NotEqual => "je",
            CompareOp::LessThan => "jge",
            CompareOp::LessOrEqual => "jg",
            CompareOp::GreaterThan => "jle",
            CompareOp::GreaterOrEqual => "jl",
        }
    }

    /// Normalize `reg` in place to 0 or 1.
    fn booleanize(&mut self, reg: Reg) {
        self.emit(format!("\ttest\t{}, {}", Self::q(reg), Self::q(reg)));
        self.emit(format!("\tsetne\t{}", Self::b(reg)));
        self.emit(format!("\tmovzx\t{}, {}", Self::q(reg), Self::b(reg)));
    }

    /// Render string bytes as a NASM `db` operand list: printable runs in
    /// double quotes, everything else as decimal bytes, then the
    /// terminating zero.
    fn db_operands(bytes: &[u8]) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut run = String::new();
        for &c in bytes {
            if (0x20..=0x7e).contains(&c) && c != b'"' {
                run.push(c as char);
            } else {
                if !run.is_empty() {
                    parts.push(format!("\"{}\"", run));
                    run.clear();
                }
                parts.push(c.to_string());
            }
        }
        if !run.is_empty() {
            parts.push(format!("\"{}\"", run));
        }
        parts.push("0".to_string());
        parts.join(", ")
    }
}

impl Default for NasmTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetOps for NasmTarget {
    fn name(&self) -> &'static str {
        "nasm"
    }

    fn reset_registers(&mut self) {
        self.regs.reset();
    }

    fn preamble(&mut self) {
        self.regs.reset();
        self.emit("\textern\tprintint");
        self.emit("\textern\tprintchar");
        self.emit("\textern\tprintstring");
        self.emit("\tsection\t.text");
    }

    fn postamble(&mut self) {}

    fn function_preamble(&mut self, sym: &Symbol) {
        self.emit("\tsection\t.text");
        self.emit(format!("\tglobal\t{}", sym.name));
        self.emit(format!("{}:", sym.name));
        self.emit("\tpush\trbp");
        self.emit("\tmov\trbp, rsp");
        let frame = align16(self.local_bytes);
        if frame > 0 {
            self.emit(format!("\tsub\trsp, {}", frame));
        }
    }

    fn function_postamble(&mut self, sym: &Symbol) {
        if let Some(end) = sym.end_label {
            self.label(end);
        }
        self.emit("\tmov\trsp, rbp");
        self.emit("\tpop\trbp");
        self.emit("\tret");
    }

    fn function_call(&mut self, arg: Reg, sym: &Symbol) -> CompileResult<Reg> {
        let out = self.regs.allocate()?;
        self.emit(format!("\tmov\trdi, {}", Self::q(arg)));
        self.emit(format!("\tcall\t{}", sym.name));
        self.emit(format!("\tmov\t{}, rax", Self::q(out)));
        self.regs.free(arg);
        Ok(out)
    }

    fn return_from_function(&mut self, reg: Reg, sym: &Symbol) -> CompileResult<()> {
        match sym.prim {
            PrimType::Char => self.emit(format!("\tmovzx\teax, {}", Self::b(reg))),
            PrimType::Int => self.emit(format!("\tmov\teax, {}", Self::d(reg))),
            ty if ty.size() == 8 => self.emit(format!("\tmov\trax, {}", Self::q(reg))),
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

        self.emit("\tsection\t.bss");
        self.emit(format!("\talign\t{}", align_pow2(element_size)));
        self.emit(format!("\tglobal\t{}", sym.name));
        self.emit(format!("{}:", sym.name));
        match element_size {
            1 => self.emit(format!("\tresb\t{}", count)),
            2 => self.emit(format!("\tresw\t{}", count)),
            4 => self.emit(format!("\tresd\t{}", count)),
            8 => self.emit(format!("\tresq\t{}", count)),
            _ => self.emit(format!("\tresb\t{}", total)),
        }
        Ok(())
    }

    fn declare_global_string(&mut self, label: LabelId, bytes: &[u8]) {
        self.emit("\tsection\t.rodata");
        self.emit(format!("{}:", label));
        self.emit(format!("\tdb\t{}", Self::db_operands(bytes)));
    }

    fn load_immediate(&mut self, value: i64, _ty: PrimType) -> CompileResult<Reg> {
        let reg = self.regs.allocate()?;
        self.emit(format!("\tmov\t{}, {}", Self::q(reg), value));
        Ok(reg)
    }

    fn load_symbol(&mut self, sym: &Symbol, mode: LoadMode) -> CompileResult<Reg> {
        let reg = self.regs.allocate()?;
        let operand = Self::symbol_operand(sym);
        let width = Self::width_keyword(sym.prim)?;

        match mode {
            LoadMode::PreIncrement => self.emit(format!("\tinc\t{} {}", width, operand)),
            LoadMode::PreDecrement => self.emit(format!("\tdec\t{} {}", width, operand)),
            _ => {}
        }
        self.emit_load(reg, sym.prim, &operand)?;
        match mode {
            LoadMode::PostIncrement => self.emit(format!("\tinc\t{} {}", width, operand)),
            LoadMode::PostDecrement => self.emit(format!("\tdec\t{} {}", width, operand)),
            _ => {}
        }
        Ok(reg)
    }

    fn load_string_address(&mut self, label: LabelId) -> CompileResult<Reg> {
        let reg = self.regs.allocate()?;
        self.emit(format!("\tlea\t{}, [rel {}]", Self::q(reg), label));
        Ok(reg)
    }

    fn store_symbol(&mut self, reg: Reg, sym: &Symbol) -> CompileResult<Reg> {
        let operand = Self::symbol_operand(sym);
        let width = Self::width_keyword(sym.prim)?;
        let src = Self::reg_at_width(reg, sym.prim)?;
        self.emit(format!("\tmov\t{} {}, {}", width, operand, src));
        Ok(reg)
    }

    fn add(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\tadd\t{}, {}", Self::q(r2), Self::q(r1)));
        self.regs.free(r1);
        r2
    }

    fn subtract(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\tsub\t{}, {}", Self::q(r1), Self::q(r2)));
        self.regs.free(r2);
        r1
    }

    fn multiply(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\timul\t{}, {}", Self::q(r2), Self::q(r1)));
        self.regs.free(r1);
        r2
    }

    fn divide(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\tmov\trax, {}", Self::q(r1)));
        self.emit("\tcqo");
        self.emit(format!("\tidiv\t{}", Self::q(r2)));
        self.emit(format!("\tmov\t{}, rax", Self::q(r1)));
        self.regs.free(r2);
        r1
    }

    fn shift_left(&mut self, value: Reg, amount: Reg) -> Reg {
        self.emit(format!("\tmov\trcx, {}", Self::q(amount)));
        self.emit(format!("\tshl\t{}, cl", Self::q(value)));
        self.regs.free(amount);
        value
    }

    fn shift_right(&mut self, value: Reg, amount: Reg) -> Reg {
        self.emit(format!("\tmov\trcx, {}", Self::q(amount)));
        self.emit(format!("\tsar\t{}, cl", Self::q(value)));
        self.regs.free(amount);
        value
    }

    fn shift_left_by_const(&mut self, reg: Reg, amount: u32) -> Reg {
        self.emit(format!("\tshl\t{}, {}", Self::q(reg), amount));
        reg
    }

    fn bitwise_and(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\tand\t{}, {}", Self::q(r2), Self::q(r1)));
        self.regs.free(r1);
        r2
    }

    fn bitwise_or(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\tor\t{}, {}", Self::q(r2), Self::q(r1)));
        self.regs.free(r1);
        r2
    }

    fn bitwise_xor(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\txor\t{}, {}", Self::q(r2), Self::q(r1)));
        self.regs.free(r1);
        r2
    }

    fn negate(&mut self, reg: Reg) -> Reg {
        self.emit(format!("\tneg\t{}", Self::q(reg)));
        reg
    }

    fn invert(&mut self, reg: Reg) -> Reg {
        self.emit(format!("\tnot\t{}", Self::q(reg)));
        reg
    }

    fn logical_not(&mut self, reg: Reg) -> Reg {
        self.emit(format!("\ttest\t{}, {}", Self::q(reg), Self::q(reg)));
        self.emit(format!("\tsete\t{}", Self::b(reg)));
        self.emit(format!("\tmovzx\t{}, {}", Self::q(reg), Self::b(reg)));
        reg
    }

    fn logical_and(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.booleanize(r1);
        self.booleanize(r2);
        self.emit(format!("\tand\t{}, {}", Self::q(r2), Self::q(r1)));
        self.regs.free(r1);
        r2
    }

    fn logical_or(&mut self, r1: Reg, r2: Reg) -> Reg {
        self.booleanize(r1);
        self.booleanize(r2);
        self.emit(format!("\tor\t{}, {}", Self::q(r2), Self::q(r1)));
        self.regs.free(r1);
        r2
    }

    fn to_boolean(&mut self, reg: Reg, jump_when_false: Option<LabelId>) -> Reg {
        match jump_when_false {
            Some(label) => {
                self.emit(format!("\ttest\t{}, {}", Self::q(reg), Self::q(reg)));
                self.emit(format!("\tje\t{}", label));
            }
            None => self.booleanize(reg),
        }
        reg
    }

    fn compare_and_set(&mut self, op: CompareOp, r1: Reg, r2: Reg) -> Reg {
        self.emit(format!("\tcmp\t{}, {}", Self::q(r1), Self::q(r2)));
        self.emit(format!("\t{}\t{}", Self::set_mnemonic(op), Self::b(r2)));
        self.emit(format!("\tmovzx\t{}, {}", Self::q(r2), Self::b(r2)));
        self.regs.free(r1);
        r2
    }

    fn compare_and_jump(&mut self, op: CompareOp, r1: Reg, r2: Reg, label: LabelId) {
        self.emit(format!("\tcmp\t{}, {}", Self::q(r1), Self::q(r2)));
        self.emit(format!("\t{}\t{}", Self::inverted_jump_mnemonic(op), label));
        self.regs.reset();
    }

    fn label(&mut self, label: LabelId) {
        self.emit(format!("{}:", label));
    }

    fn jump(&mut self, label: LabelId) {
        self.emit(format!("\tjmp\t{}", label));
    }

    fn widen(&mut self, reg: Reg, _from: PrimType, _to: PrimType) -> Reg {
        // Narrow loads already zero-extend into the full 64-bit register.
        reg
    }

    fn primitive_size(&self, ty: PrimType) -> usize {
        ty.size()
    }

    fn address_of_symbol(&mut self, sym: &Symbol) -> CompileResult<Reg> {
        let reg = self.regs.allocate()?;
        match sym.storage {
            StorageClass::Global => {
                self.emit(format!("\tlea\t{}, [rel {}]", Self::q(reg), sym.name))
            }
            StorageClass::Local => {
                self.emit(format!("\tlea\t{}, [rbp-{}]", Self::q(reg), sym.stack_offset))
            }
        }
        Ok(reg)
    }

    fn deref_load(&mut self, ptr: Reg, ptr_ty: PrimType) -> CompileResult<Reg> {
        let pointee = ptr_ty.value_at().map_err(|ty| {
            CompileError::codegen(format!("cannot dereference value of type {}", ty.name()))
        })?;
        match pointee.size() {
            1 => self.emit(format!("\tmovzx\t{}, BYTE [{}]", Self::q(ptr), Self::q(ptr))),
            4 => self.emit(format!("\tmov\t{}, DWORD [{}]", Self::d(ptr), Self::q(ptr))),
            8 => self.emit(format!("\tmov\t{}, QWORD [{}]", Self::q(ptr), Self::q(ptr))),
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
        let width = Self::width_keyword(value_ty)?;
        let src = Self::reg_at_width(value, value_ty)?;
        self.emit(format!("\tmov\t{} [{}], {}", width, Self::q(ptr), src));
        Ok(value)
    }

    fn reset_local_offsets(&mut self) {
        self.local_bytes = 0;
    }

    fn local_offset(&mut self, ty: PrimType) -> i32 {
        // Each scalar gets at least four bytes of frame so int and char
        // slots stay naturally aligned.
        self.local_bytes += ty.size().max(4) as i32;
        self.local_bytes
    }

    fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }
}

//! Whole-program compilation tests
//!
//! Each test feeds a complete source file through the public pipeline and
//! checks structural properties of the emitted assembly for both targets.

use scc::{compile, CompileError, CompileOptions, DumpMode, TargetKind};

fn nasm(source: &str) -> String {
    compile(
        source,
        &CompileOptions {
            target: TargetKind::Nasm,
            dump_ast: DumpMode::None,
        },
    )
    .expect("nasm compilation succeeds")
}

fn aarch64(source: &str) -> String {
    compile(
        source,
        &CompileOptions {
            target: TargetKind::Aarch64,
            dump_ast: DumpMode::None,
        },
    )
    .expect("aarch64 compilation succeeds")
}

fn compile_err(source: &str) -> CompileError {
    compile(source, &CompileOptions::default()).expect_err("compilation fails")
}

// =============================================================================
// Arithmetic and returns
// =============================================================================

#[test]
fn test_constant_arithmetic_return() {
    let asm = nasm("int main() { return(3 + 4 * 2); }");

    assert!(asm.contains("\tglobal\tmain"));
    assert!(asm.contains("main:"));
    // Multiplication binds tighter: 4 * 2 is emitted before the addition.
    let mul = asm.find("\timul\tr10, r9").expect("multiply emitted");
    let add = asm.find("\tadd\tr10, r8").expect("add emitted");
    assert!(mul < add);
    // The result is narrowed into eax and routed through the end label.
    assert!(asm.contains("\tmov\teax, r10d"));
    assert!(asm.contains("\tjmp\tL1"));
    assert!(asm.contains("L1:"));
    assert!(asm.contains("\tret"));
}

#[test]
fn test_constant_arithmetic_return_aarch64() {
    let asm = aarch64("int main() { return(3 + 4 * 2); }");

    assert!(asm.contains("\t.global\tmain"));
    assert!(asm.contains("main:"));
    assert!(asm.contains("\tmul\tx11, x11, x10"));
    assert!(asm.contains("\tadd\tx11, x11, x9"));
    assert!(asm.contains("\tmov\tw0, w11"));
    assert!(asm.contains("\tb\tL1"));
    assert!(asm.contains("\tstp\tx29, x30, [sp, -16]!"));
    assert!(asm.contains("\tldp\tx29, x30, [sp], 16"));
}

#[test]
fn test_global_variable_assignment() {
    let source = "int a; int main() { a = 5; a = a + 1; return(a); }";
    let asm = nasm(source);

    assert!(asm.contains("\tsection\t.bss"));
    assert!(asm.contains("a:"));
    assert!(asm.contains("\tresd\t1"));
    assert!(asm.contains("\tmov\tDWORD [a], r8d"));
    assert!(asm.contains("\tmov\tr8d, DWORD [a]"));
}

#[test]
fn test_division_emits_signed_divide() {
    let asm = nasm("int main() { return(7 / 2); }");
    assert!(asm.contains("\tcqo"));
    assert!(asm.contains("\tidiv"));

    let asm = aarch64("int main() { return(7 / 2); }");
    assert!(asm.contains("\tsdiv"));
}

// =============================================================================
// Control flow
// =============================================================================

#[test]
fn test_if_else_lowering() {
    let source = "int x; int main() { if (x == 1) { x = 2; } else { x = 3; } return(x); }";
    let asm = nasm(source);

    // The end label for main is L1; the if allocates L2 (false) and L3 (end).
    assert!(asm.contains("\tje\tL2") || asm.contains("\tjne\tL2"));
    // Equality jumps with the inverted condition.
    assert!(asm.contains("\tjne\tL2"));
    assert!(asm.contains("\tjmp\tL3"));
    assert!(asm.contains("L2:"));
    assert!(asm.contains("L3:"));
}

#[test]
fn test_if_without_else_uses_single_label() {
    let source = "int x; int main() { if (x == 1) { x = 2; } return(x); }";
    let asm = nasm(source);
    assert!(asm.contains("\tjne\tL2"));
    assert!(asm.contains("L2:"));
    // No end label is allocated without an else branch.
    assert!(!asm.contains("L3:"));
}

#[test]
fn test_while_loop_shape() {
    let source = "int n; int main() { n = 5; while (n > 0) { n = n - 1; } return(n); }";
    let asm = nasm(source);

    // L2 is the loop start, L3 the loop end.
    let start = asm.find("L2:").expect("loop start label");
    let exit_jump = asm.find("\tjle\tL3").expect("inverted exit branch");
    let back_jump = asm.find("\tjmp\tL2").expect("back edge");
    let end = asm.find("L3:").expect("loop end label");
    assert!(start < exit_jump && exit_jump < back_jump && back_jump < end);
}

#[test]
fn test_for_loop_sums_with_locals() {
    let source = "int main() { int i; i = 0; int s; s = 0; \
                  for (i = 1; i <= 5; i = i + 1) { s = s + i; } return(s); }";
    let asm = nasm(source);

    // Two int locals live in a 16-byte aligned frame.
    assert!(asm.contains("\tsub\trsp, 16"));
    assert!(asm.contains("[rbp-4]"));
    assert!(asm.contains("[rbp-8]"));
    // Desugared to a while: inverted exit branch plus back edge.
    assert!(asm.contains("\tjg\tL3"));
    assert!(asm.contains("\tjmp\tL2"));

    let asm = aarch64(source);
    assert!(asm.contains("\tsub\tsp, sp, #16"));
    assert!(asm.contains("\tsub\tx0, x29, #4"));
    assert!(asm.contains("\tsub\tx0, x29, #8"));
    assert!(asm.contains("\tbgt\tL3"));
    assert!(asm.contains("\tb\tL2"));
}

#[test]
fn test_non_comparison_condition_branches_on_zero() {
    let source = "int x; int main() { if (x) { x = 0; } return(x); }";
    let asm = nasm(source);
    assert!(asm.contains("\ttest\tr8, r8"));
    assert!(asm.contains("\tje\tL2"));

    let asm = aarch64(source);
    assert!(asm.contains("\tcmp\tx9, #0"));
    assert!(asm.contains("\tbeq\tL2"));
}

// =============================================================================
// Pointers, arrays and strings
// =============================================================================

#[test]
fn test_pointer_roundtrip_through_runtime_call() {
    let source = "char *p; char c; int main() { c = 65; p = &c; printchar(*p); return(0); }";
    let asm = nasm(source);

    // char storage is byte-sized, the pointer is quad-sized.
    assert!(asm.contains("\tresb\t1"));
    assert!(asm.contains("\tresq\t1"));
    assert!(asm.contains("\tmov\tBYTE [c], r8b"));
    // Address-of materializes with lea, the dereference loads a byte.
    assert!(asm.contains("\tlea\tr8, [rel c]"));
    assert!(asm.contains("\tmovzx\tr8, BYTE [r8]"));
    // The argument travels in rdi.
    assert!(asm.contains("\tmov\trdi, r8"));
    assert!(asm.contains("\tcall\tprintchar"));

    let asm = aarch64(source);
    assert!(asm.contains("\tadrp\tx9, c"));
    assert!(asm.contains("\tldrb\tw9, [x9]"));
    assert!(asm.contains("\tbl\tprintchar"));
}

#[test]
fn test_array_store_scales_index() {
    let source = "int a[5]; int main() { int i; \
                  for (i = 0; i < 5; i = i + 1) { a[i] = i * i; } return(a[4]); }";
    let asm = nasm(source);

    assert!(asm.contains("\tresd\t5"));
    assert!(asm.contains("\talign\t4"));
    // Index scaling is strength-reduced to a shift by 2.
    assert!(asm.contains("\tshl\tr9, 2"));
    // The element store goes through the computed pointer.
    assert!(asm.contains("\tmov\tDWORD [r10], r9d"));

    let asm = aarch64(source);
    assert!(asm.contains("\t.zero\t20"));
    assert!(asm.contains("\t.p2align\t2"));
    assert!(asm.contains("\tlsl\tx10, x10, #2"));
}

#[test]
fn test_string_literal_in_rodata() {
    let source = "int main() { printstring(\"hi\\n\"); return(0); }";
    let asm = nasm(source);

    assert!(asm.contains("\tsection\t.rodata"));
    // Main's end label is L1, so the string gets L2.
    assert!(asm.contains("L2:"));
    assert!(asm.contains("\tdb\t\"hi\", 10, 0"));
    assert!(asm.contains("\tlea\tr8, [rel L2]"));
    assert!(asm.contains("\tcall\tprintstring"));

    let asm = aarch64(source);
    assert!(asm.contains("\t.section\t.rodata"));
    assert!(asm.contains("\t.ascii\t\"hi\""));
    assert!(asm.contains("\t.byte\t10"));
    assert!(asm.contains("\t.byte\t0"));
    assert!(asm.contains("\tbl\tprintstring"));
}

#[test]
fn test_long_globals_reserve_eight_bytes() {
    let asm = nasm("long big; int main() { big = 9; return(0); }");
    assert!(asm.contains("\tresq\t1"));
    assert!(asm.contains("\talign\t8"));

    let asm = aarch64("long big; int main() { big = 9; return(0); }");
    assert!(asm.contains("\t.zero\t8"));
    assert!(asm.contains("\t.p2align\t3"));
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn test_bitwise_and_shift_operators() {
    let source = "int main() { return((12 & 10 | 1 ^ 3) + (1 << 3) + (16 >> 2)); }";
    let asm = nasm(source);
    assert!(asm.contains("\tand\t"));
    assert!(asm.contains("\tor\t"));
    assert!(asm.contains("\txor\t"));
    assert!(asm.contains("\tshl\t"));
    assert!(asm.contains("\tsar\t"));

    let asm = aarch64(source);
    assert!(asm.contains("\tand\t"));
    assert!(asm.contains("\torr\t"));
    assert!(asm.contains("\teor\t"));
    assert!(asm.contains("\tlsl\t"));
    assert!(asm.contains("\tasr\t"));
}

#[test]
fn test_logical_and_unary_operators() {
    let source = "int x; int main() { x = !x + ~x + -x; if (x && 1 || 0) { x = 1; } return(x); }";
    let asm = nasm(source);
    assert!(asm.contains("\tsete\t"));
    assert!(asm.contains("\tnot\t"));
    assert!(asm.contains("\tneg\t"));
    assert!(asm.contains("\tsetne\t"));

    let asm = aarch64(source);
    assert!(asm.contains("\tcset\tw9, eq"));
    assert!(asm.contains("\tmvn\t"));
    assert!(asm.contains("\tneg\t"));
}

#[test]
fn test_increment_decrement_forms() {
    let source = "int n; int t; int main() { n = 1; t = n++; t = ++n; t = n--; t = --n; return(n); }";
    let asm = nasm(source);
    assert!(asm.contains("\tinc\tDWORD [n]"));
    assert!(asm.contains("\tdec\tDWORD [n]"));
}

#[test]
fn test_comparison_as_value_sets_register() {
    let source = "int a; int b; int main() { a = (b < 3); return(a); }";
    let asm = nasm(source);
    // Outside a branch context the comparison materializes 0/1.
    assert!(asm.contains("\tsetl\t"));
    assert!(asm.contains("\tmovzx\t"));

    let asm = aarch64(source);
    assert!(asm.contains("\tcset\tw10, lt"));
}

// =============================================================================
// Multiple functions and calls
// =============================================================================

#[test]
fn test_two_functions_each_get_end_labels() {
    let source = "int five() { return(5); } int main() { return(five(0)); }";
    let asm = nasm(source);

    assert!(asm.contains("\tglobal\tfive"));
    assert!(asm.contains("\tglobal\tmain"));
    // five's end label is L1, main's is L2.
    assert!(asm.contains("\tjmp\tL1"));
    assert!(asm.contains("\tjmp\tL2"));
    assert!(asm.contains("\tcall\tfive"));
}

#[test]
fn test_char_return_zero_extends() {
    let asm = nasm("char c; char f() { return(c); } int main() { return(f(0)); }");
    assert!(asm.contains("\tmovzx\teax, r8b"));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_lexical_error_kind() {
    let err = compile_err("int main() { return(@); }");
    assert!(matches!(err, CompileError::Lexer { .. }), "{err}");
}

#[test]
fn test_syntax_error_kind() {
    let err = compile_err("int main() { return(1) }");
    assert!(matches!(err, CompileError::Parser { .. }), "{err}");
}

#[test]
fn test_undeclared_identifier_kind() {
    let err = compile_err("int main() { ghost = 1; return(0); }");
    assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
}

#[test]
fn test_narrowing_return_is_a_type_error() {
    let err = compile_err("char f() { return(300); }");
    assert!(matches!(err, CompileError::Type { .. }), "{err}");
}

#[test]
fn test_return_in_void_function_is_semantic() {
    let err = compile_err("void f() { return(1); }");
    assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
}

#[test]
fn test_subscripting_a_scalar_is_semantic() {
    let err = compile_err("int x; int main() { x[0] = 1; return(0); }");
    assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
}

#[test]
fn test_calling_a_variable_is_semantic() {
    let err = compile_err("int x; int main() { x(1); return(0); }");
    assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
}

#[test]
fn test_void_variable_is_rejected() {
    assert!(compile("void v; int main() { return(0); }", &CompileOptions::default()).is_err());
}

// =============================================================================
// Cross-target agreement
// =============================================================================

#[test]
fn test_both_targets_accept_the_same_programs() {
    let programs = [
        "int main() { return(3 + 4 * 2); }",
        "int a; int main() { a = 5; a = a + 1; return(a); }",
        "int main() { int i; i = 0; int s; s = 0; \
         for (i = 1; i <= 5; i = i + 1) { s = s + i; } return(s); }",
        "char *p; char c; int main() { c = 65; p = &c; printchar(*p); return(0); }",
        "int a[5]; int main() { int i; \
         for (i = 0; i < 5; i = i + 1) { a[i] = i * i; } return(a[4]); }",
        "int main() { printstring(\"hi\\n\"); return(0); }",
    ];

    for program in programs {
        let x86 = nasm(program);
        let arm = aarch64(program);
        // Both outputs carry the runtime externs and a main entry.
        assert!(x86.contains("\textern\tprintint"));
        assert!(arm.contains("\t.extern\tprintint"));
        assert!(x86.contains("main:"));
        assert!(arm.contains("main:"));
        // Label numbering is target-independent: same labels on both.
        for label in ["L1:", "L2:"] {
            assert_eq!(
                x86.contains(label),
                arm.contains(label),
                "label {} differs for {}",
                label,
                program
            );
        }
    }
}

#[test]
fn test_emitted_labels_are_unique() {
    let source = "int x; int main() { if (x == 1) { x = 2; } else { x = 3; } \
                  while (x > 0) { x = x - 1; } return(x); }";
    for asm in [nasm(source), aarch64(source)] {
        let mut seen = std::collections::HashSet::new();
        for line in asm.lines() {
            let trimmed = line.trim_end();
            if trimmed.starts_with('L') && trimmed.ends_with(':') {
                assert!(seen.insert(trimmed.to_string()), "duplicate label {trimmed}");
            }
        }
    }
}

//! Method lowering, end to end from source through MIR.

use pcc_util::Symbol;

use crate::lir::Inst;
use crate::lower_method;
use crate::regs::{FP, LR, SCRATCH, SP};

fn lower_src(src: &str) -> Vec<Inst> {
    lower_with_level(src, 0)
}

/// Folding first, so literals reach comparison/argument positions the
/// way immediate-form assertions expect.
fn lower_opt_src(src: &str) -> Vec<Inst> {
    lower_with_level(src, 1)
}

fn lower_with_level(src: &str, level: i32) -> Vec<Inst> {
    let tokens = pcc_lex::tokenize(src).unwrap();
    let program = pcc_par::parse(&tokens).unwrap();
    let mut mir = pcc_mir::generate(&program).unwrap();
    pcc_mir::optimize(&mut mir, level);
    let mut out = Vec::new();
    for method in &mir.methods {
        lower_method(method, &mut out).unwrap();
    }
    out
}

fn render(insts: &[Inst]) -> Vec<String> {
    insts.iter().map(|i| i.to_string()).collect()
}

#[test]
fn prologue_and_epilogue_bracket_the_method() {
    let insts = lower_src("int main(){ return 42; }");
    assert_eq!(insts[0], Inst::Label(Symbol::intern("main")));
    // sub sp / stp fp,lr / add fp
    let Inst::SubImm { sf: true, rd, rn, imm } = &insts[1] else {
        panic!("expected sub sp");
    };
    assert_eq!((*rd, *rn), (SP, SP));
    assert_eq!(*imm % 16, 0);
    let frame = *imm;
    assert!(matches!(
        insts[2],
        Inst::Stp { sf: true, rt, rt2, base, offset }
            if rt == FP && rt2 == LR && base == SP && offset as i64 == frame - 16
    ));
    assert!(matches!(insts[3], Inst::AddImm { rd, .. } if rd == FP));
    // ldp / add sp / ret at the end
    let n = insts.len();
    assert!(matches!(insts[n - 3], Inst::Ldp { rt, rt2, .. } if rt == FP && rt2 == LR));
    assert!(matches!(insts[n - 2], Inst::AddImm { rd, rn, imm, .. } if rd == SP && rn == SP && imm == frame));
    assert_eq!(insts[n - 1], Inst::Ret);
}

#[test]
fn return_value_lands_in_x0() {
    let asm = render(&lower_src("int main(){ return 42; }")).join("\n");
    assert!(asm.contains("mov x0, #42"), "{asm}");
}

#[test]
fn parameters_spill_at_entry() {
    let insts = lower_src("int add(int x, int y){ return x + y; }");
    // first two stores after the three prologue instructions come from
    // w0 and w1
    let stores: Vec<_> = insts
        .iter()
        .filter_map(|i| match i {
            Inst::Str { rt, base, .. } if *base == SP => Some(*rt),
            _ => None,
        })
        .take(2)
        .collect();
    assert_eq!(stores, vec![0, 1]);
}

#[test]
fn widths_follow_operands() {
    let asm = render(&lower_src(
        "long wide(long a){ return a + 1; }\nint narrow(int a){ return a + 1; }",
    ))
    .join("\n");
    assert!(asm.contains("add x"), "64-bit add expected: {asm}");
    assert!(asm.contains("add w"), "32-bit add expected: {asm}");
}

#[test]
fn division_uses_sdiv() {
    let asm = render(&lower_src("int main(){ int a = 8; int b = 2; return a / b; }")).join("\n");
    assert!(asm.contains("sdiv w"), "{asm}");
}

#[test]
fn modulo_lowers_to_sdiv_msub_via_scratch() {
    let insts = lower_src("int main(){ int a = 7; int b = 3; return a % b; }");
    let pos = insts
        .iter()
        .position(|i| matches!(i, Inst::Sdiv { rd, .. } if *rd == SCRATCH))
        .expect("sdiv into the scratch register");
    assert!(
        matches!(&insts[pos + 1], Inst::Msub { rn, .. } if *rn == SCRATCH),
        "msub must consume the scratch quotient"
    );
}

#[test]
fn mul_never_takes_an_immediate() {
    let insts = lower_src("int main(){ int a = 6; return a * 7; }");
    assert!(insts.iter().any(|i| matches!(i, Inst::Mul { .. })));
    // the literal 7 was materialized first
    let mul_pos = insts.iter().position(|i| matches!(i, Inst::Mul { .. })).unwrap();
    assert!(insts[..mul_pos]
        .iter()
        .any(|i| matches!(i, Inst::MovImm { imm: 7, .. })));
}

#[test]
fn small_add_immediate_stays_inline() {
    let insts = lower_opt_src("int main(){ int a = 1; return a + 2; }");
    assert!(
        insts
            .iter()
            .any(|i| matches!(i, Inst::AddImm { imm: 2, .. })),
        "{:?}",
        render(&insts)
    );
}

#[test]
fn large_add_immediate_goes_through_a_register() {
    let insts = lower_src("int main(){ int a = 1; return a + 70000; }");
    assert!(
        !insts
            .iter()
            .any(|i| matches!(i, Inst::AddImm { imm, .. } if *imm == 70000)),
        "70000 exceeds imm12 and must not stay inline"
    );
    assert!(insts
        .iter()
        .any(|i| matches!(i, Inst::MovImm { imm: 70000, .. })));
    assert!(insts.iter().any(|i| matches!(i, Inst::AddReg { .. })));
}

#[test]
fn compare_and_branch_shape() {
    let insts = lower_opt_src("int main(){ int a = 5; if (a > 3) return 1; return 0; }");
    let cmp = insts
        .iter()
        .position(|i| matches!(i, Inst::CmpImm { imm: 3, .. }))
        .expect("cmp against the literal");
    assert!(matches!(insts[cmp + 1], Inst::Bc { cond: crate::Cond::Gt, .. }));
    assert!(matches!(insts[cmp + 2], Inst::B { .. }), "false edge branch");
}

#[test]
fn calls_load_positional_registers_then_clear_residency() {
    let insts = lower_opt_src(
        "int add(int x, int y){ return x + y; }\n\
         int main(){ return add(17, 25); }",
    );
    let bl = insts
        .iter()
        .position(|i| matches!(i, Inst::Bl { target } if target.as_str() == "add"))
        .expect("bl add");
    // the two argument moves precede the call, into w0/w1
    let arg_moves: Vec<_> = insts[..bl]
        .iter()
        .filter_map(|i| match i {
            Inst::MovImm { rd, imm, .. } if *imm == 17 || *imm == 25 => Some(*rd),
            _ => None,
        })
        .collect();
    assert_eq!(arg_moves, vec![0, 1]);
    // after the call the consumer re-loads from the stack rather than
    // trusting any register
    assert!(insts[bl + 1..]
        .iter()
        .take_while(|i| !matches!(i, Inst::Ret))
        .any(|i| matches!(i, Inst::Str { .. } | Inst::Ldr { .. })));
}

#[test]
fn loop_boundaries_flush_registers() {
    // across a loop edge every read must come from the stack: inside the
    // body, `s` and `i` load fresh
    let insts = lower_src(
        "int main(){ int s = 0; int i = 1; while (i < 3) { s = s + i; i = i + 1; } return s; }",
    );
    let asm = render(&insts).join("\n");
    let loads = asm.matches("ldr w").count();
    assert!(loads >= 3, "expected stack reloads inside the loop: {asm}");
}

#[test]
fn void_return_zeroes_x0() {
    let asm = render(&lower_src("void nop(){ return; }")).join("\n");
    assert!(asm.contains("mov x0, sp"), "orr with the zero register renders via reg 31: {asm}");
}

#[test]
fn too_many_arguments_is_an_error() {
    let tokens = pcc_lex::tokenize(
        "int f(int a, int b, int c, int d, int e, int g, int h, int i, int j){ return 0; }",
    )
    .unwrap();
    let program = pcc_par::parse(&tokens).unwrap();
    let mir = pcc_mir::generate(&program).unwrap();
    let mut out = Vec::new();
    assert!(matches!(
        lower_method(&mir.methods[0], &mut out),
        Err(crate::CodeGenError::TooManyArguments { .. })
    ));
}

#[test]
fn float_immediates_are_rejected() {
    let tokens = pcc_lex::tokenize("int main(){ double d = 0.5; return 0; }").unwrap();
    let program = pcc_par::parse(&tokens).unwrap();
    let mir = pcc_mir::generate(&program).unwrap();
    let mut out = Vec::new();
    assert!(matches!(
        lower_method(&mir.methods[0], &mut out),
        Err(crate::CodeGenError::FloatImmediate { .. })
    ));
}

//! End-to-end: emit a small function body, optimize it, render it.

use std::sync::Arc;
use stele_codegen::emitter::Emitter;
use stele_codegen::peephole::optimize_code;
use stele_codegen::printer::render_buffer;
use stele_codegen::sema::{ContractDef, Ty, VarDecl};
use stele_codegen::{CompileContext, Config, Inst};

fn contract_with_counter() -> ContractDef {
    let mut contract = ContractDef { name: "Counter".into(), ..Default::default() };
    contract.state_variables.push(VarDecl {
        name: "count".into(),
        ty: Ty::uint(64),
        is_constant: false,
        is_static: false,
    });
    contract
}

#[test]
fn test_increment_getter_compiles_and_optimizes() {
    let mut ctx = CompileContext::new(Arc::new(contract_with_counter()), Config::default());
    let mut em = Emitter::new(&mut ctx, 0);

    // count = count + 1; return count;
    em.generate_macro("bump_internal_macro");
    em.get_glob(8);
    em.push_int(1);
    em.push(-1, Inst::Add);
    em.check_arith_overflow(&Ty::uint(64));
    em.push_s(0);
    em.set_glob(8);
    em.push(0, Inst::Ret);
    assert_eq!(em.stack().size(), 1);

    let optimized = optimize_code(em.code());
    let text = render_buffer(&optimized);
    // PUSHINT 1; ADD collapses to INC; the rest survives untouched.
    assert_eq!(
        text,
        ".macro bump_internal_macro\nGETGLOB 8\nINC\nUFITS 64\nDUP\nSETGLOB 8\nRET\n"
    );
}

#[test]
fn test_default_initialization_body_is_stable_under_optimization() {
    let mut ctx = CompileContext::new(Arc::new(contract_with_counter()), Config::default());
    let mut em = Emitter::new(&mut ctx, 0);
    em.reset_state_vars();
    assert_eq!(em.stack().size(), 0);

    let once = optimize_code(em.code());
    let twice = optimize_code(&once);
    assert_eq!(render_buffer(&once), render_buffer(&twice));
}

#[test]
fn test_storage_encode_body_fuses_constant_bits() {
    let mut ctx = CompileContext::new(Arc::new(contract_with_counter()), Config::default());
    let mut em = Emitter::new(&mut ctx, 0);

    // A builder with a two-bit tag, a zero field and a one-bit flag: the
    // optimizer folds the separate stores into fewer constants.
    em.push(1, Inst::NewC);
    em.push(0, Inst::StZero);
    em.push(0, Inst::StZero);
    em.push(0, Inst::StOne);
    em.push_int(0);
    em.push(-1, Inst::StUR(32));

    let optimized = optimize_code(em.code());
    let text = render_buffer(&optimized);
    assert!(text.len() < render_buffer(em.code()).len());
    assert!(text.starts_with("NEWC\n"));
}

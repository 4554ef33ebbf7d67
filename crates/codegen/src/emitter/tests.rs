use super::*;
use crate::ctx::Config;
use crate::dict::DecodeShape;
use crate::inst::Directive;
use crate::printer::render_buffer;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use stele_sema::{
    ContractDef, FieldDef, FixedPointTy, FunctionDef, FunctionKind, StructDef, Ty, VarDecl,
    Visibility,
};

fn test_contract() -> ContractDef {
    ContractDef { name: "Test".into(), ..Default::default() }
}

fn test_ctx() -> CompileContext {
    CompileContext::new(Arc::new(test_contract()), Config::default())
}

fn func(name: &str) -> FunctionDef {
    FunctionDef {
        name: name.into(),
        kind: FunctionKind::Regular,
        visibility: Visibility::Internal,
        contract_name: "Test".into(),
        is_overridden_base: false,
        is_library: false,
        params: Vec::new(),
        returns: Vec::new(),
    }
}

fn struct_ty(fields: &[(&str, Ty)]) -> Ty {
    Ty::Struct(Arc::new(StructDef {
        name: "S".into(),
        fields: fields
            .iter()
            .map(|(name, ty)| FieldDef { name: (*name).into(), ty: ty.clone() })
            .collect(),
    }))
}

fn rendered(em: Emitter<'_>) -> String {
    render_buffer(&em.into_code())
}

#[test]
fn test_exchange_tiering() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 32);
    em.exchange(0, 1);
    em.exchange(0, 5);
    em.exchange(0, 20);
    em.exchange(1, 5);
    em.exchange(2, 20);
    assert_eq!(
        rendered(em),
        "SWAP\nXCHG s5\nXCHG s0, s20\nXCHG s1, s5\nXCHG s2\nXCHG s0, s20\nXCHG s2\n"
    );
}

#[test]
fn test_block_swap_tiering() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 32);
    em.block_swap(0, 4);
    em.block_swap(1, 1);
    em.block_swap(1, 2);
    em.block_swap(2, 1);
    em.block_swap(2, 2);
    em.block_swap(3, 4);
    em.block_swap(17, 2);
    assert_eq!(
        rendered(em),
        "SWAP\nROT\nROTREV\nSWAP2\nBLKSWAP 3, 4\nPUSHINT 17\nPUSHINT 2\nBLKSWX\n"
    );
}

#[test]
fn test_reverse_tiering() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 64);
    em.reverse(2, 0);
    em.reverse(3, 0);
    em.reverse(5, 2);
    em.reverse(20, 0);
    assert_eq!(
        rendered(em),
        "SWAP\nXCHG s2\nREVERSE 5, 2\nPUSHINT 20\nPUSHINT 0\nREVX\n"
    );
}

#[test]
fn test_drop_tiering() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 40);
    em.drop(1);
    em.drop(2);
    em.drop(15);
    em.drop(16);
    assert_eq!(em.stack().size(), 40 - 1 - 2 - 15 - 16);
    assert_eq!(
        rendered(em),
        "DROP\nDROP2\nBLKDROP 15\nPUSHINT 16\nDROPX\n"
    );
}

#[test]
fn test_drop_under_tiering() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 64);
    em.drop_under(1, 0);
    em.drop_under(0, 2);
    em.drop_under(1, 1);
    em.drop_under(2, 3);
    em.drop_under(1, 16);
    assert_eq!(
        rendered(em),
        "DROP2\nNIP\nBLKDROP2 3, 2\nPUSHINT 16\nPUSHINT 1\nBLKSWX\nPUSHINT 16\nDROPX\n"
    );
}

#[test]
fn test_glob_and_tuple_tiering() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 64);
    em.get_glob(31);
    em.get_glob(40);
    em.set_glob(2);
    em.tuple(15);
    em.untuple(15);
    em.tuple(20);
    em.index(16);
    assert_eq!(
        rendered(em),
        "GETGLOB 31\nPUSHINT 40\nGETGLOBVAR\nSETGLOB 2\nTUPLE 15\nUNTUPLE 15\n\
         PUSHINT 20\nTUPLEVAR\nPUSHINT 16\nINDEXVAR\n"
    );
}

#[test]
fn test_stack_advances_with_every_emission() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_int(5);
    em.push_int(7);
    em.push(-1, Inst::Add);
    em.push_s(0);
    em.tuple(2);
    em.drop(1);
    assert_eq!(em.stack().size(), 0);
}

#[test]
#[should_panic(expected = "stack underflow")]
fn test_emission_below_empty_stack_is_fatal() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.push(-1, Inst::Add);
}

#[test]
fn test_store_and_preload_integrals() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 2);
    em.store(&Ty::uint(64), false);
    assert_eq!(em.stack().size(), 1);

    let mut em2 = Emitter::new(&mut ctx, 1);
    em2.preload(&Ty::int(32));
    assert_eq!(em2.stack().size(), 1);
    assert_eq!(rendered(em2), "PLDI 32\n");
}

#[test]
fn test_load_order_normalization() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.load(&Ty::uint(8), false);
    assert_eq!(em.stack().size(), 2);
    // LDU leaves value under slice, which is already the direct order.
    assert_eq!(rendered(em), "LDU 8\n");

    let mut em2 = Emitter::new(&mut ctx, 1);
    em2.load(&Ty::uint(8), true);
    assert_eq!(rendered(em2), "LDU 8\nSWAP\n");
}

#[test]
fn test_struct_store_recurses_in_declaration_order() {
    let ty = struct_ty(&[("a", Ty::uint(8)), ("b", Ty::Bool)]);
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 2);
    em.store(&ty, false);
    assert_eq!(em.stack().size(), 1);
    assert_eq!(rendered(em), "SWAP\nUNTUPLE 2\nSWAP\nROT\nSTU 8\nSTU 1\n");
}

#[test]
fn test_struct_decode_recurses_in_declaration_order() {
    let ty = struct_ty(&[("a", Ty::uint(8)), ("b", Ty::Bool)]);
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.preload(&ty);
    assert_eq!(em.stack().size(), 1);
    assert_eq!(rendered(em), "LDU 8\nPLDU 1\nTUPLE 2\n");
}

#[test]
fn test_optional_store_is_stack_balanced() {
    let ty = Ty::Optional(Box::new(Ty::uint(64)));
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 2);
    em.store(&ty, false);
    assert_eq!(em.stack().size(), 1);
    let text = rendered(em);
    assert!(text.contains("ISNULL"));
    assert!(text.contains("IFELSE"));
    assert!(text.contains("STBREF"));
}

#[test]
fn test_optional_preload_is_stack_balanced() {
    let ty = Ty::Optional(Box::new(Ty::Mapping(
        Box::new(Ty::uint(8)),
        Box::new(Ty::uint(8)),
    )));
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.preload(&ty);
    assert_eq!(em.stack().size(), 1);
    let text = rendered(em);
    // The nullable payload gets its single-element tuple wrapper.
    assert!(text.contains("TUPLE 1"));
    assert!(text.contains("IFELSE"));
}

#[test]
fn test_default_values_push_exactly_one_value() {
    let types = [
        Ty::Bool,
        Ty::uint(256),
        Ty::int(8),
        Ty::FixedBytes(4),
        Ty::FixedPoint(FixedPointTy { bits: 64, signed: true, fractional_digits: 2 }),
        Ty::Address,
        Ty::Cell,
        Ty::Slice,
        Ty::Builder,
        Ty::Bytes,
        Ty::Str,
        Ty::Function,
        Ty::Array(Box::new(Ty::uint(32))),
        Ty::Mapping(Box::new(Ty::uint(8)), Box::new(Ty::Bool)),
        Ty::Optional(Box::new(Ty::uint(8))),
        struct_ty(&[("a", Ty::uint(8)), ("b", Ty::Address)]),
    ];
    let mut ctx = test_ctx();
    for ty in &types {
        let mut em = Emitter::new(&mut ctx, 0);
        em.push_default_value(ty, false);
        assert_eq!(em.stack().size(), 1, "default of {ty}");
    }
    // Builder form likewise produces exactly one (builder) value.
    for ty in &types {
        if matches!(ty, Ty::Function) {
            continue;
        }
        let mut em = Emitter::new(&mut ctx, 0);
        em.push_default_value(ty, true);
        assert_eq!(em.stack().size(), 1, "default builder of {ty}");
    }
}

#[test]
fn test_default_array_encoding() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_default_value(&Ty::Array(Box::new(Ty::uint(8))), false);
    assert_eq!(rendered(em), "PUSHINT 0\nNEWDICT\nPAIR\n");
}

#[test]
fn test_default_cell_then_decode_round_trips() {
    // store of a default cell then an immediate preload goes through
    // STREF/PLDREF: the same reference, hence identical bit content.
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.push(1, Inst::NewC); // builder
    em.push_default_value(&Ty::Cell, false);
    em.store(&Ty::Cell, true);
    em.push(0, Inst::EndC);
    em.push(0, Inst::Ctos);
    em.preload(&Ty::Cell);
    assert_eq!(em.stack().size(), 1);
    assert_eq!(
        rendered(em),
        "NEWC\nPUSHREF {\n}\nSTREFR\nENDC\nCTOS\nPLDREF\n"
    );
}

#[test]
fn test_zero_address_literal() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_zero_address();
    assert_eq!(
        rendered(em),
        "PUSHSLICE x8000000000000000000000000000000000000000000000000000000000000000001_\n"
    );
}

#[test]
fn test_hard_convert_narrowing_emits_range_check() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.hard_convert(&Ty::uint(16), &Ty::uint(32));
    assert_eq!(rendered(em), "UFITS 16\n");

    let mut em2 = Emitter::new(&mut ctx, 1);
    em2.hard_convert(&Ty::uint(32), &Ty::uint(16));
    assert_eq!(rendered(em2), "");

    let mut em3 = Emitter::new(&mut ctx, 1);
    em3.hard_convert(&Ty::int(64), &Ty::uint(64));
    assert_eq!(rendered(em3), "FITS 64\n");
}

#[test]
fn test_hard_convert_fixed_point_rescale() {
    let from = Ty::FixedPoint(FixedPointTy { bits: 64, signed: true, fractional_digits: 0 });
    let to = Ty::FixedPoint(FixedPointTy { bits: 64, signed: true, fractional_digits: 2 });
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.hard_convert(&to, &from);
    assert_eq!(rendered(em), "PUSHINT 100\nMUL\nFITS 64\n");
}

#[test]
fn test_hard_convert_fixed_bytes_resize() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.hard_convert(&Ty::FixedBytes(4), &Ty::FixedBytes(2));
    assert_eq!(rendered(em), "LSHIFT 16\n");

    let mut em2 = Emitter::new(&mut ctx, 1);
    em2.hard_convert(&Ty::FixedBytes(1), &Ty::FixedBytes(2));
    assert_eq!(rendered(em2), "RSHIFT 8\n");
}

#[test]
fn test_hard_convert_folds_string_literal() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.hard_convert(&Ty::FixedBytes(2), &Ty::StringLiteral("ab".into()));
    // 'a' * 256 + 'b' = 24930
    assert_eq!(rendered(em), "DROP\nPUSHINT 24930\n");
}

#[test]
fn test_check_arith_overflow_honors_opt_out() {
    let contract = Arc::new(test_contract());
    let mut ctx = CompileContext::new(
        contract.clone(),
        Config { ignore_integer_overflow: true, ..Config::default() },
    );
    let mut em = Emitter::new(&mut ctx, 1);
    em.check_arith_overflow(&Ty::uint(64));
    assert_eq!(rendered(em), "");

    let mut ctx2 = CompileContext::new(contract, Config::default());
    let mut em2 = Emitter::new(&mut ctx2, 1);
    em2.check_arith_overflow(&Ty::uint(64));
    assert_eq!(rendered(em2), "UFITS 64\n");
}

#[test]
fn test_int_msg_header_layout() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1); // dest on the stack
    let mut on_stack = FxHashSet::default();
    on_stack.insert(message::int_msg::DEST);
    let max_bits = em.int_msg_info(&on_stack, &FxHashMap::default());
    // 6 constant bits before dest, the address, 109 zero bits after.
    assert_eq!(max_bits, 6 + 267 + 109);
    assert_eq!(em.stack().size(), 1);
    assert_eq!(
        rendered(em),
        "NEWC\nPUSHINT 6\nSTZEROES\nSTSLICE\nPUSHINT 109\nSTZEROES\n"
    );
}

#[test]
fn test_prepare_msg_counts_section_bits() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    let mut on_stack = FxHashSet::default();
    on_stack.insert(message::int_msg::DEST);
    let header_bits = em.prepare_msg(
        MsgKind::Internal,
        &on_stack,
        &FxHashMap::default(),
        None::<fn(&mut Emitter<'_>)>,
        None::<fn(&mut Emitter<'_>, u32)>,
    );
    assert_eq!(header_bits, 6 + 267 + 109 + 1);
    assert_eq!(em.stack().size(), 1); // the message cell
    let text = rendered(em);
    assert!(text.ends_with("ENDC\n"));
    // Absent state-init and body: two zero presence bits.
    assert_eq!(text.matches("STSLICECONST 0").count(), 2);
}

#[test]
fn test_ext_msg_header_tags() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    let bits = em.ext_msg_info(&FxHashSet::default(), true);
    // Tag 11 plus zero-filled src/dest/lt/at: 2 + 2 + 2 + 64 + 32 bits.
    assert_eq!(bits, 102);
    let text = rendered(em);
    assert!(text.starts_with("NEWC\n"));
    assert!(text.contains("PUSHSLICE"));
    assert!(text.contains("STSLICER"));
}

#[test]
fn test_send_msg_uses_default_flag() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    let mut on_stack = FxHashSet::default();
    on_stack.insert(message::int_msg::DEST);
    em.send_msg(
        MsgKind::Internal,
        &on_stack,
        &FxHashMap::default(),
        None::<fn(&mut Emitter<'_>)>,
        None::<fn(&mut Emitter<'_>, u32)>,
        None::<fn(&mut Emitter<'_>)>,
    );
    assert_eq!(em.stack().size(), 0);
    assert!(rendered(em).ends_with("PUSHINT 0\nSENDRAWMSG\n"));
}

#[test]
fn test_call_strategy_inline_vs_true_call() {
    let mut contract = test_contract();
    let a = contract.functions.push(func("a"));
    let b = contract.functions.push(func("b"));
    let mut ctx = CompileContext::new(Arc::new(contract), Config::default());

    // Acyclic edge: inline macro call in a CALLREF block.
    ctx.set_current_function(Some(a));
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_call_or_call_ref("b_internal", b, Some(0));
    assert_eq!(rendered(em), "CALLREF {\n\tCALL $b_internal_macro$\n}\n");

    // The reverse edge closes a cycle: a true call, no inlining.
    ctx.set_current_function(Some(b));
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_call_or_call_ref("a_internal", a, Some(0));
    assert_eq!(rendered(em), "CALL $a_internal$\n");
}

#[test]
fn test_three_cycle_never_inlines_closing_edge() {
    let mut contract = test_contract();
    let a = contract.functions.push(func("a"));
    let b = contract.functions.push(func("b"));
    let c = contract.functions.push(func("c"));
    let mut ctx = CompileContext::new(Arc::new(contract), Config::default());

    ctx.set_current_function(Some(a));
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_call_or_call_ref("b_internal", b, Some(0));
    assert!(rendered(em).contains("CALLREF"));

    ctx.set_current_function(Some(b));
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_call_or_call_ref("c_internal", c, Some(0));
    assert!(rendered(em).contains("CALLREF"));

    ctx.set_current_function(Some(c));
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_call_or_call_ref("a_internal", a, Some(0));
    assert_eq!(rendered(em), "CALL $a_internal$\n");
}

#[test]
fn test_macro_suffix_always_calls_in_ref() {
    let mut contract = test_contract();
    let a = contract.functions.push(func("a"));
    let f = contract.functions.push(func("f"));
    let mut ctx = CompileContext::new(Arc::new(contract), Config::default());
    ctx.set_current_function(Some(a));
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_call_or_call_ref("f_macro", f, Some(0));
    assert_eq!(rendered(em), "CALLREF {\n\tCALL $f_macro$\n}\n");
}

#[test]
fn test_parameters_and_assignment() {
    let mut contract = test_contract();
    let x = contract.state_variables.push(VarDecl {
        name: "x".into(),
        ty: Ty::uint(8),
        is_constant: false,
        is_static: false,
    });
    let y = contract.state_variables.push(VarDecl {
        name: "y".into(),
        ty: Ty::uint(8),
        is_constant: false,
        is_static: false,
    });
    let mut ctx = CompileContext::new(Arc::new(contract), Config::default());
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_parameters(&[(x, "x".into()), (y, "y".into())]);
    assert_eq!(em.stack().size(), 2);

    // Assigning the top value into each slot.
    em.push_int(1);
    assert!(em.try_assign_param(x)); // offset 2 -> POP s2
    em.push_int(2);
    assert!(em.try_assign_param(y)); // offset 1 -> NIP
    assert_eq!(em.stack().size(), 2);
    let text = rendered(em);
    assert!(text.contains("POP s2"));
    assert!(text.contains("NIP"));
}

#[test]
fn test_unbound_declaration_is_not_assignable() {
    let mut contract = test_contract();
    let x = contract.state_variables.push(VarDecl {
        name: "x".into(),
        ty: Ty::uint(8),
        is_constant: false,
        is_static: false,
    });
    let mut ctx = CompileContext::new(Arc::new(contract), Config::default());
    let mut em = Emitter::new(&mut ctx, 4);
    assert!(!em.try_assign_param(x));
}

#[test]
fn test_poll_last_ret_skips_location_markers() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.push(0, Inst::Ret);
    em.push(0, Inst::Directive(Directive::Loc { file: "a.sol".into(), line: 7 }));
    em.poll_last_ret();
    assert_eq!(rendered(em), ".loc a.sol, 7\n");
}

#[test]
fn test_optimize_if_swallows_negations() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.push(0, Inst::Not);
    em.push(0, Inst::Not);
    assert!(!em.optimize_if());
    assert_eq!(em.code().len(), 0);

    let mut em2 = Emitter::new(&mut ctx, 1);
    em2.push(0, Inst::EqInt(0));
    assert!(em2.optimize_if());
    assert_eq!(em2.code().len(), 0);

    let mut em3 = Emitter::new(&mut ctx, 1);
    em3.push(0, Inst::NeqInt(0));
    assert!(!em3.optimize_if());
    assert_eq!(em3.code().len(), 0);
}

#[test]
fn test_poll_empty_push_cont() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.start_continuation(0);
    em.end_continuation(0);
    assert!(em.try_poll_empty_push_cont());
    assert_eq!(em.code().len(), 0);

    let mut em2 = Emitter::new(&mut ctx, 0);
    em2.start_continuation(0);
    em2.push_int(1);
    em2.end_continuation(0);
    assert!(!em2.try_poll_empty_push_cont());
}

#[test]
fn test_poll_convert_builder_to_slice() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.push(0, Inst::EndC);
    em.push(0, Inst::Ctos);
    assert!(em.try_poll_convert_builder_to_slice());
    assert_eq!(em.code().len(), 0);
}

#[test]
fn test_push_string_short_and_long() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_string("hi", true);
    assert_eq!(em.stack().size(), 1);
    // "hi" = 0x68 0x69
    assert_eq!(rendered(em), "PUSHSLICE x6869\n");

    let long = "x".repeat(200);
    let mut em2 = Emitter::new(&mut ctx, 0);
    em2.push_string(&long, true);
    assert_eq!(em2.stack().size(), 1);
    let text = rendered(em2);
    assert!(text.starts_with("PUSHREFSLICE {\n"));
    assert!(text.contains(".cell {"));
    assert!(text.contains(".blob x"));
}

#[test]
fn test_append_to_builder_forms() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.append_to_builder(&BitString::new());
    em.append_to_builder(&BitString::from_binary("0"));
    em.append_to_builder(&BitString::from_binary("0000"));
    em.append_to_builder(&BitString::from_binary("1011"));
    let mut long = BitString::new();
    long.push_ones(80);
    em.append_to_builder(&long);
    assert_eq!(em.stack().size(), 1);
    let text = rendered(em);
    assert_eq!(
        text,
        "STSLICECONST 0\nPUSHINT 4\nSTZEROES\nSTSLICECONST xb\nPUSHSLICE xffffffffffffffffffff\nSTSLICER\n"
    );
}

#[test]
fn test_state_var_reset_uses_assigned_slots() {
    let mut contract = test_contract();
    contract.state_variables.push(VarDecl {
        name: "a".into(),
        ty: Ty::uint(64),
        is_constant: false,
        is_static: false,
    });
    contract.state_variables.push(VarDecl {
        name: "b".into(),
        ty: Ty::Bool,
        is_constant: false,
        is_static: false,
    });
    let mut ctx = CompileContext::new(Arc::new(contract), Config::default());
    let mut em = Emitter::new(&mut ctx, 0);
    em.reset_state_vars();
    assert_eq!(em.stack().size(), 0);
    let text = rendered(em);
    assert!(text.contains("SETGLOB 8"));
    assert!(text.contains("SETGLOB 9"));
}

#[test]
fn test_check_optional_value_guard() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.check_optional_value();
    assert_eq!(em.stack().size(), 0);
    assert_eq!(rendered(em), "ISNULL\nTHROWIF 63\n");
}

#[test]
fn test_dict_recover_value_shapes_are_balanced() {
    let key = Ty::uint(32);
    let value = Ty::uint(64);
    let shapes = [
        DecodeShape::Value,
        DecodeShape::ValueOrDefault,
        DecodeShape::ValueOrNull,
        DecodeShape::NullOrValue,
    ];
    let mut ctx = test_ctx();
    for shape in shapes {
        let mut em = Emitter::new(&mut ctx, 2);
        em.recover_value_after_dict_op(&key, &value, false, false, shape, false);
        assert_eq!(em.stack().size(), 2, "shape {shape:?}");
    }
}

#[test]
fn test_dict_recover_value_or_default_uses_ifnot() {
    // The value continuation is non-empty, the default is PUSHINT 0; the
    // empty-continuation polling cannot apply, so an IFELSE is emitted.
    let key = Ty::uint(32);
    let value = Ty::uint(64);
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 2);
    em.recover_value_after_dict_op(
        &key,
        &value,
        false,
        false,
        DecodeShape::ValueOrDefault,
        false,
    );
    let text = rendered(em);
    assert!(text.contains("PLDU 64"));
    assert!(text.contains("IFELSE"));
}

#[test]
fn test_dict_boxed_value_unboxes_on_decode() {
    // A four-field struct of 257-bit ints cannot sit inline next to a
    // 64-bit key, so decode goes through PLDREF; CTOS.
    let key = Ty::uint(64);
    let value = struct_ty(&[
        ("a", Ty::uint(257)),
        ("b", Ty::uint(257)),
        ("c", Ty::uint(257)),
        ("d", Ty::uint(257)),
    ]);
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 2);
    em.recover_value_after_dict_op(&key, &value, false, false, DecodeShape::Value, false);
    let text = rendered(em);
    assert!(text.contains("PLDREF"));
    assert!(text.contains("CTOS"));
    assert!(text.contains("CALLREF {"));
}

#[test]
fn test_prepare_value_boxes_oversized_values() {
    let key = Ty::uint(64);
    let value = struct_ty(&[
        ("a", Ty::uint(257)),
        ("b", Ty::uint(257)),
        ("c", Ty::uint(257)),
        ("d", Ty::uint(257)),
    ]);
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    let data_type = em.prepare_value_for_dict(&key, &value, false);
    assert_eq!(data_type, crate::dict::DataType::Cell);
    assert!(rendered(em).ends_with("ENDC\n"));
}

#[test]
fn test_prepare_key_hashes_byte_keys() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.prepare_key_for_dict(&Ty::Bytes, false);
    assert_eq!(rendered(em), "HASHCU\n");

    let mut em2 = Emitter::new(&mut ctx, 1);
    em2.prepare_key_for_dict(&Ty::Bytes, true);
    assert_eq!(rendered(em2), "");
}

#[test]
fn test_byte_length_of_cell() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 1);
    em.byte_length_of_cell();
    assert_eq!(em.stack().size(), 1);
    assert_eq!(
        rendered(em),
        "PUSHINT 4294967295\nCDATASIZE\nDROP\nNIP\nRSHIFT 3\n"
    );
}

#[test]
fn test_push_cont_appends_body() {
    let mut ctx = test_ctx();
    let mut body = CodeBuffer::new();
    body.push(Inst::Inc);
    let mut em = Emitter::new(&mut ctx, 0);
    em.push_cont(&body, None);
    assert_eq!(em.stack().size(), 1);
    assert_eq!(rendered(em), "PUSHCONT {\n\tINC\n}\n");
}

#[test]
fn test_function_headers() {
    let mut ctx = test_ctx();
    let mut em = Emitter::new(&mut ctx, 0);
    em.generate_globl("transfer_internal");
    em.generate_macro("transfer_internal_macro");
    em.generate_internal("main_external", 0);
    assert_eq!(
        rendered(em),
        ".globl\ttransfer_internal\n.type\ttransfer_internal, @function\n\
         .macro transfer_internal_macro\n.internal-alias :main_external, 0\n\
         .internal :main_external\n"
    );
}

use super::*;
use crate::bits::BitString;
use crate::inst::BlockKind;
use num_bigint::BigInt;

fn buffer_of(insts: Vec<Inst>) -> CodeBuffer {
    let mut code = CodeBuffer::new();
    for inst in insts {
        code.push(inst);
    }
    code
}

fn optimized(insts: Vec<Inst>) -> Vec<Inst> {
    optimize_code(&buffer_of(insts))
        .as_slice()
        .iter()
        .map(|item| item.inst.clone())
        .collect()
}

fn push_int(v: i64) -> Inst {
    Inst::PushInt(BigInt::from(v))
}

/// Net stack delta of the instructions used in these tests. Panics on
/// anything unaccounted for, so the property tests stay honest.
fn delta(inst: &Inst) -> i64 {
    use Inst::*;
    match inst {
        PushInt(_) | Push(_) | GetGlob(_) | NewC | NewDict | True | False | Zero | Null => 1,
        Push2(..) | Dup2 | Over2 => 2,
        Push3(..) => 3,
        BlkPush { count, .. } => i64::from(*count),
        Pop(_) | SetGlob(_) | ThrowAny | StZeroes | StUR(_) | StU(_) | Add | Sub | SubR | Mul
        | Div | Mod | Equal | Neq | Greater | Less | Pair | StSlice | StSliceR => -1,
        Drop2 => -2,
        BlkDrop(n) => -i64::from(*n),
        BlkDrop2 { count, .. } => -i64::from(*count),
        Xchg { .. } | Rot | RotRev | Swap2 | BlkSwap { .. } | Reverse { .. } => 0,
        Inc | Dec | AddConst(_) | MulConst(_) | Abs | Not | IsNull | EqInt(_) | NeqInt(_)
        | GtInt(_) | LessInt(_) | Fits(_) | UFits(_) | EndC | Ctos | StZero | StOne
        | StSliceConst(_) | Index(_) | Index2(..) | Index3(..) | First | Second | Third
        | Throw(_) => 0,
        LShift(Some(_)) | RShift(Some(_)) | ModPow2(_) => 0,
        MulRShift(Some(_)) => -1,
        Unpair => 1,
        Tuple(n) => 1 - i64::from(*n),
        Untuple(n) => i64::from(*n) - 1,
        BlockOpen(BlockKind::PushRef) => 1,
        BlockClose => 0,
        Comment(_) => 0,
        other => panic!("no declared delta for {other} in this test"),
    }
}

fn net_effect(insts: &[Inst]) -> i64 {
    insts.iter().map(delta).sum()
}

#[test]
fn test_increment_fusion() {
    // Scenario: push constant 1, integer add -> a single increment.
    let out = optimized(vec![push_int(5), push_int(1), Inst::Add]);
    assert_eq!(out, vec![push_int(5), Inst::Inc]);
}

#[test]
fn test_decrement_and_addconst_fusion() {
    assert_eq!(optimized(vec![push_int(1), Inst::Sub]), vec![Inst::Dec]);
    assert_eq!(optimized(vec![push_int(100), Inst::Add]), vec![Inst::AddConst(100)]);
    assert_eq!(optimized(vec![push_int(100), Inst::Sub]), vec![Inst::AddConst(-100)]);
    assert_eq!(optimized(vec![push_int(8), Inst::Mul]), vec![Inst::MulConst(8)]);
}

#[test]
fn test_zero_push_run_collapses() {
    // Scenario: three or more PUSHINT 0 collapse to one push plus a block
    // duplication reproducing the same count.
    let out = optimized(vec![push_int(0), push_int(0), push_int(0), push_int(0)]);
    assert_eq!(out, vec![push_int(0), Inst::BlkPush { count: 3, index: 0 }]);
    assert_eq!(net_effect(&out), 4);
}

#[test]
fn test_double_swap_cancels() {
    assert_eq!(optimized(vec![Inst::SWAP, Inst::SWAP]), vec![]);
}

#[test]
fn test_swap_before_commutative_cancels() {
    assert_eq!(optimized(vec![Inst::SWAP, Inst::Add]), vec![Inst::Add]);
    assert_eq!(optimized(vec![Inst::SWAP, Inst::Sub]), vec![Inst::SubR]);
}

#[test]
fn test_push_then_drop_cancels() {
    assert_eq!(optimized(vec![push_int(7), Inst::Pop(0)]), vec![]);
    assert_eq!(optimized(vec![Inst::Push(2), Inst::BlkDrop(3)]), vec![Inst::Drop2]);
}

#[test]
fn test_dup_dies_unread_is_simulated_away() {
    let out = optimized(vec![Inst::Push(0), Inst::Inc, Inst::Pop(1)]);
    assert_eq!(out, vec![Inst::Inc]);
}

#[test]
fn test_dead_code_after_ret_inside_block() {
    let mut code = CodeBuffer::new();
    code.open_block(BlockKind::PushCont);
    code.push(Inst::Ret);
    code.push(push_int(1));
    code.push(Inst::Inc);
    code.close_block();
    code.push(Inst::If);

    let out = optimize_code(&code);
    let insts: Vec<Inst> = out.as_slice().iter().map(|i| i.inst.clone()).collect();
    // Everything after RET dies, RET before the close dies, and the now
    // empty continuation folds into a DROP of the condition.
    assert_eq!(insts, vec![Inst::Pop(0)]);
}

#[test]
fn test_throwing_continuation_folds_to_throwif() {
    let mut code = CodeBuffer::new();
    code.open_block(BlockKind::PushCont);
    code.push(Inst::Throw(101));
    code.close_block();
    code.push(Inst::If);

    let out = optimize_code(&code);
    let insts: Vec<Inst> = out.as_slice().iter().map(|i| i.inst.clone()).collect();
    assert_eq!(insts, vec![Inst::ThrowIf(101)]);
}

#[test]
fn test_empty_continuation_ifjmp_folds_to_ifret() {
    let mut code = CodeBuffer::new();
    code.open_block(BlockKind::PushCont);
    code.close_block();
    code.push(Inst::IfJmp);

    let out = optimize_code(&code);
    let insts: Vec<Inst> = out.as_slice().iter().map(|i| i.inst.clone()).collect();
    assert_eq!(insts, vec![Inst::IfRet]);
}

#[test]
fn test_negation_fuses_into_conditional_throw() {
    assert_eq!(
        optimized(vec![Inst::Not, Inst::ThrowIfNot(60)]),
        vec![Inst::ThrowIf(60)]
    );
    assert_eq!(
        optimized(vec![Inst::Not, Inst::ThrowIf(60)]),
        vec![Inst::ThrowIfNot(60)]
    );
    assert_eq!(
        optimized(vec![Inst::EqInt(0), Inst::ThrowIfNot(60)]),
        vec![Inst::ThrowIf(60)]
    );
}

#[test]
fn test_strength_reduction_powers_of_two() {
    assert_eq!(optimized(vec![push_int(8), Inst::Div]), vec![Inst::RShift(Some(3))]);
    assert_eq!(optimized(vec![push_int(8), Inst::Mod]), vec![Inst::ModPow2(3)]);
    // 256 is out of MULCONST range, so the shift form wins.
    assert_eq!(optimized(vec![push_int(256), Inst::Mul]), vec![Inst::LShift(Some(8))]);
}

#[test]
fn test_small_constant_comparisons() {
    assert_eq!(optimized(vec![push_int(0), Inst::Equal]), vec![Inst::EqInt(0)]);
    assert_eq!(optimized(vec![push_int(-5), Inst::Greater]), vec![Inst::GtInt(-5)]);
}

#[test]
fn test_throw_code_folds() {
    assert_eq!(optimized(vec![push_int(100), Inst::ThrowAny]), vec![Inst::Throw(100)]);
}

#[test]
fn test_constant_arithmetic_folds() {
    assert_eq!(
        optimized(vec![push_int(6), push_int(7), Inst::Mul]),
        vec![push_int(42)]
    );
    assert_eq!(
        optimized(vec![push_int(42), push_int(6), Inst::Div]),
        vec![push_int(7)]
    );
}

#[test]
fn test_nip_run_fuses() {
    let out = optimized(vec![Inst::Pop(1), Inst::Pop(1), Inst::Pop(1), Inst::Pop(1)]);
    assert_eq!(out, vec![Inst::BlkDrop2 { count: 4, top: 1 }]);
    assert_eq!(net_effect(&out), -4);
}

#[test]
fn test_drop_run_fuses() {
    let out = optimized(vec![Inst::Pop(0), Inst::Drop2, Inst::BlkDrop(3)]);
    assert_eq!(out, vec![Inst::BlkDrop(6)]);
}

#[test]
fn test_rotation_cancellations() {
    assert_eq!(optimized(vec![Inst::Rot, Inst::RotRev]), vec![]);
    assert_eq!(optimized(vec![Inst::RotRev, Inst::Rot]), vec![]);
    assert_eq!(
        optimized(vec![Inst::RotRev, Inst::RotRev, Inst::RotRev]),
        vec![]
    );
}

#[test]
fn test_tuple_untuple_cancels() {
    assert_eq!(optimized(vec![Inst::Tuple(3), Inst::Untuple(3)]), vec![]);
    assert_eq!(optimized(vec![Inst::Pair, Inst::Unpair]), vec![]);
    assert_ne!(optimized(vec![Inst::Tuple(3), Inst::Untuple(2)]), vec![]);
}

#[test]
fn test_setglob_getglob_keeps_value() {
    assert_eq!(
        optimized(vec![Inst::SetGlob(5), Inst::GetGlob(5)]),
        vec![Inst::Push(0), Inst::SetGlob(5)]
    );
}

#[test]
fn test_index_chains_fuse() {
    assert_eq!(
        optimized(vec![Inst::Index(1), Inst::Index(2), Inst::Index(0)]),
        vec![Inst::Index3(1, 2, 0)]
    );
    assert_eq!(
        optimized(vec![Inst::Index(1), Inst::Index(2)]),
        vec![Inst::Index2(1, 2)]
    );
}

#[test]
fn test_bit_store_runs_fuse() {
    assert_eq!(
        optimized(vec![Inst::StOne, Inst::StZero, Inst::StOne]),
        vec![Inst::StSliceConst(BitString::from_binary("101"))]
    );
}

#[test]
fn test_slice_const_pairs_fuse() {
    assert_eq!(
        optimized(vec![
            Inst::StSliceConst(BitString::from_binary("10")),
            Inst::StSliceConst(BitString::from_binary("01")),
        ]),
        vec![Inst::StSliceConst(BitString::from_binary("1001"))]
    );
}

#[test]
fn test_zero_stur_becomes_stzeroes() {
    assert_eq!(
        optimized(vec![push_int(0), Inst::StUR(8)]),
        vec![push_int(8), Inst::StZeroes]
    );
    assert_eq!(optimized(vec![push_int(1), Inst::StZeroes]), vec![Inst::StZero]);
}

#[test]
fn test_stur_pair_concatenates_bits() {
    // 5 in 8 bits then 3 in 8 bits = (5 << 8) + 3 in 16 bits.
    assert_eq!(
        optimized(vec![push_int(5), Inst::StUR(8), push_int(3), Inst::StUR(8)]),
        vec![push_int((5 << 8) + 3), Inst::StUR(16)]
    );
}

#[test]
fn test_newc_endc_becomes_empty_ref() {
    let out = optimized(vec![Inst::NewC, Inst::EndC]);
    assert_eq!(
        out,
        vec![Inst::BlockOpen(BlockKind::PushRef), Inst::BlockClose]
    );
}

#[test]
fn test_isnull_double_negation_cancels() {
    assert_eq!(
        optimized(vec![Inst::IsNull, Inst::Not, Inst::Not]),
        vec![Inst::IsNull]
    );
}

#[test]
fn test_fits_pairs_take_minimum() {
    assert_eq!(
        optimized(vec![Inst::UFits(64), Inst::UFits(32)]),
        vec![Inst::UFits(32)]
    );
}

#[test]
fn test_unsquash_then_squash_round_trip() {
    assert_eq!(optimized(vec![Inst::Push2(1, 2)]), vec![Inst::Push2(1, 2)]);
}

#[test]
fn test_push_pairs_squash() {
    assert_eq!(optimized(vec![Inst::Push(1), Inst::Push(1)]), vec![Inst::Dup2]);
    assert_eq!(
        optimized(vec![Inst::Push(4), Inst::Push(6)]),
        vec![Inst::Push2(4, 5)]
    );
}

#[test]
fn test_comments_survive_optimization() {
    let out = optimized(vec![
        Inst::Comment("keep me".into()),
        push_int(1),
        Inst::Pop(0),
    ]);
    assert_eq!(out, vec![Inst::Comment("keep me".into())]);
}

#[test]
fn test_optimizer_properties_hold() {
    let cases: Vec<Vec<Inst>> = vec![
        vec![push_int(5), push_int(1), Inst::Add],
        vec![push_int(0), push_int(0), push_int(0), push_int(0)],
        vec![Inst::SWAP, Inst::SWAP, push_int(3), Inst::Pop(0)],
        vec![Inst::Pop(1), Inst::Pop(1), Inst::Pop(1), Inst::Pop(1)],
        vec![Inst::Push(0), Inst::Inc, Inst::Pop(1)],
        vec![push_int(6), push_int(7), Inst::Mul, Inst::Pop(0)],
        vec![Inst::SetGlob(5), Inst::GetGlob(5)],
        vec![Inst::StOne, Inst::StZero, Inst::StOne, Inst::StZero],
        vec![push_int(2), push_int(3), Inst::Add, push_int(4), Inst::Sub],
        vec![Inst::Rot, Inst::RotRev, Inst::Tuple(2), Inst::Untuple(2)],
    ];
    for case in cases {
        let once = optimized(case.clone());
        // Effect preservation.
        assert_eq!(net_effect(&case), net_effect(&once), "effect changed for {case:?}");
        // Non-growth.
        assert!(once.len() <= case.len(), "grew on {case:?}");
        // Idempotence.
        let twice = optimized(once.clone());
        assert_eq!(once, twice, "not idempotent for {case:?}");
    }
}

#[test]
fn test_producer_reorder_through_swap() {
    // producer; producer; SWAP -> swapped producers.
    assert_eq!(
        optimized(vec![Inst::GetGlob(1), Inst::GetGlob(2), Inst::SWAP]),
        vec![Inst::GetGlob(2), Inst::GetGlob(1)]
    );
}

#[test]
fn test_newc_reorders_around_reversed_store() {
    let out = optimized(vec![Inst::NewC, push_int(9), Inst::StUR(8)]);
    assert_eq!(out, vec![push_int(9), Inst::NewC, Inst::StU(8)]);
}

#[test]
fn test_blkswap_blkdrop_becomes_blkdrop2() {
    assert_eq!(
        optimized(vec![Inst::BlkSwap { bottom: 3, top: 2 }, Inst::BlkDrop(3)]),
        vec![Inst::BlkDrop2 { count: 3, top: 2 }]
    );
}

#[test]
fn test_constant_add_chain_fuses() {
    assert_eq!(
        optimized(vec![Inst::Inc, Inst::AddConst(5)]),
        vec![Inst::AddConst(6)]
    );
    assert_eq!(
        optimized(vec![Inst::Inc, Inst::UFits(64), Inst::Dec, Inst::UFits(64)]),
        vec![Inst::AddConst(0), Inst::UFits(64)]
    );
}

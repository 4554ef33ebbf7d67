//! The named rewrite rule battery.
//!
//! Rules are tried in priority order against a window of up to six
//! forthcoming commands; the first match wins. Every rule preserves the net
//! declared stack effect of its window, and none grows the instruction count
//! beyond the documented extended-form expansions (a drop count pushed past
//! the inline-immediate limit).

use super::simulate::{DROP_SECOND_FROM_TOP, try_simulate};
use super::{RewriteResult, Window};
use crate::bits::BitString;
use crate::consts::MAX_STSLICECONST_BITS;
use crate::inst::{BlockKind, Inst};
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

fn replace(consumed: usize, replacement: Vec<Inst>) -> Option<RewriteResult> {
    Some(RewriteResult::replace(consumed, replacement))
}

fn erase(consumed: usize) -> Option<RewriteResult> {
    Some(RewriteResult::erase(consumed))
}

fn int_val<'a>(c: Option<&'a Inst>) -> Option<&'a BigInt> {
    c.and_then(Inst::int_literal)
}

fn is_add_or_sub(c: &Inst) -> bool {
    matches!(c, Inst::Add | Inst::Sub)
}

/// The non-reversed counterpart of a reversed store, if `c` is one.
fn unreversed_store(c: &Inst) -> Option<Inst> {
    Some(match c {
        Inst::StUR(n) => Inst::StU(*n),
        Inst::StIR(n) => Inst::StI(*n),
        Inst::StBR => Inst::StB,
        Inst::StBRefR => Inst::StBRef,
        Inst::StSliceR => Inst::StSlice,
        Inst::StRefR => Inst::StRef,
        _ => return None,
    })
}

fn single_bit(c: &Inst, bit: char) -> bool {
    matches!(c, Inst::StSliceConst(b) if b.as_binary() == bit.to_string())
}

/// Tries every rule at the window's anchor. Returns the first match.
#[allow(clippy::cognitive_complexity)]
pub(crate) fn rewrite_at(w: &Window<'_>) -> Option<RewriteResult> {
    let c1 = w.cmd(0)?;

    if c1.is_swap() {
        match w.cmd(1) {
            Some(Inst::Sub) => return replace(2, vec![Inst::SubR]),
            Some(Inst::SubR) => return replace(2, vec![Inst::Sub]),
            Some(c2) if c2.is_swap() => return erase(2),
            Some(Inst::Pop(1)) => return replace(2, vec![Inst::Pop(0)]),
            Some(c2) if c2.is_commutative() => return erase(1),
            _ => {}
        }
    }

    // PUSHINT a; ADD/SUB; PUSHINT b; ADD/SUB -> PUSHINT ±a±b; ADD
    if let (Some(v1), Some(v3)) = (int_val(w.cmd(0)), int_val(w.cmd(2)))
        && let (Some(c2), Some(c4)) = (w.cmd(1), w.cmd(3))
        && is_add_or_sub(c2)
        && is_add_or_sub(c4)
    {
        let mut sum = BigInt::zero();
        sum += if matches!(c2, Inst::Add) { v1.clone() } else { -v1 };
        sum += if matches!(c4, Inst::Add) { v3.clone() } else { -v3 };
        return replace(4, vec![Inst::PushInt(sum), Inst::Add]);
    }

    if let Some(v) = int_val(w.cmd(0)) {
        if v.is_one() {
            if matches!(w.cmd(1), Some(Inst::Add)) {
                return replace(2, vec![Inst::Inc]);
            }
            if matches!(w.cmd(1), Some(Inst::Sub)) {
                return replace(2, vec![Inst::Dec]);
            }
        }
        if let Some(small) = v.to_i32().filter(|x| (-128..=127).contains(x)) {
            if matches!(w.cmd(1), Some(Inst::Add)) {
                return replace(2, vec![Inst::AddConst(small)]);
            }
            if matches!(w.cmd(1), Some(Inst::Mul)) {
                return replace(2, vec![Inst::MulConst(small)]);
            }
        }
        if let Some(small) = (-v).to_i32().filter(|x| (-128..=127).contains(x))
            && matches!(w.cmd(1), Some(Inst::Sub))
        {
            return replace(2, vec![Inst::AddConst(small)]);
        }
    }

    // Dead code after an unconditional exit: anything at the same or deeper
    // nesting level can never execute.
    if c1.is_exit()
        && let Some(d2) = w.depth(1)
        && d2 >= w.depth(0).unwrap()
    {
        return replace(2, vec![c1.clone()]);
    }
    if matches!(c1, Inst::Ret) && matches!(w.cmd(1), Some(Inst::BlockClose)) {
        return replace(2, vec![Inst::BlockClose]);
    }

    if matches!(w.cmd(1), Some(Inst::Pop(1)))
        && matches!(w.cmd(2), Some(Inst::Pop(1)))
        && (int_val(w.cmd(0)).is_some() || matches!(c1, Inst::GetGlob(_)))
    {
        return replace(3, vec![Inst::Drop2, c1.clone()]);
    }

    if matches!(c1, Inst::Pop(1))
        && matches!(w.cmd(1), Some(Inst::Pop(1)))
        && matches!(w.cmd(2), Some(Inst::Pop(1)))
    {
        let mut n = 0u32;
        for c in w.commands_from(0) {
            if matches!(c, Inst::Pop(1)) {
                n += 1;
            } else {
                break;
            }
        }
        let n = n.min(15);
        return replace(
            n as usize,
            vec![Inst::BlkSwap { bottom: n, top: 1 }, Inst::BlkDrop(n)],
        );
    }

    if matches!(c1, Inst::Pop(2)) && w.cmd(1).is_some_and(Inst::is_swap) {
        if let Some(c3) = w.cmd(2)
            && c3.simple_io() == Some((1, 0))
        {
            return replace(3, vec![c3.clone(), Inst::Pop(1)]);
        }
        if let (Some(c3), Some(c4)) = (w.cmd(2), w.cmd(3))
            && c3.simple_io() == Some((1, 1))
            && c4.simple_io() == Some((1, 0))
        {
            return replace(4, vec![c3.clone(), c4.clone(), Inst::Pop(1)]);
        }
    }

    // A run of PUSHINT 0 collapses to one push plus block duplication.
    if int_val(w.cmd(0)).is_some()
        && int_val(w.cmd(1)).is_some()
        && int_val(w.cmd(2)).is_some()
    {
        let mut n = 0usize;
        for c in w.commands_from(0) {
            if c.int_literal().is_some_and(Zero::is_zero) {
                n += 1;
            } else {
                break;
            }
        }
        if n >= 3 {
            let mut replacement = vec![Inst::PushInt(BigInt::zero())];
            let mut remaining = n - 1;
            while remaining > 0 {
                let nn = remaining.min(15);
                replacement.push(Inst::blkpush(nn as u32, 0));
                remaining -= nn;
            }
            return replace(n, replacement);
        }
    }

    if c1.push_index() == Some(0) && w.cmd(1).is_some_and(Inst::is_swap) {
        return replace(2, vec![c1.clone()]);
    }

    // producer; producer; SWAP -> producers reordered, SWAP gone.
    if w.cmd(2).is_some_and(Inst::is_swap)
        && let Some(c2) = w.cmd(1)
    {
        let ok1 = c1.simple_io() == Some((0, 1)) || c1.push_index().is_some();
        let ok2 = c2.simple_io() == Some((0, 1)) || c2.push_index().is_some();
        if ok1 && ok2 {
            if c2.push_index() == Some(0) {
                return replace(3, vec![c1.clone(), c2.clone()]);
            }
            let s1 = match c2.push_index() {
                Some(i) => Inst::push_s(i - 1),
                None => c2.clone(),
            };
            let s2 = match c1.push_index() {
                Some(i) => Inst::push_s(i + 1),
                None => c1.clone(),
            };
            return replace(3, vec![s1, s2]);
        }
    }

    // A run of PUSH s<i> with one index fuses into BLKPUSH.
    if let Some(index) = c1.push_index()
        && w.cmd(1).is_some_and(|c| c.push_index().is_some())
    {
        let mut n = 0usize;
        for c in w.commands_from(0) {
            if c.push_index() == Some(index) {
                n += 1;
            } else {
                break;
            }
        }
        if n >= 2 && index <= 15 {
            let n = n.min(15);
            return replace(n, vec![Inst::blkpush(n as u32, index)]);
        }
    }

    if (c1.push_index().is_some() || c1.int_literal().is_some())
        && let Some(dropped) = w.cmd(1).and_then(Inst::drop_count)
    {
        if dropped == 1 {
            return erase(2);
        }
        return replace(2, Inst::drops(dropped - 1).to_vec());
    }

    if let Inst::BlkPush { count, index } = c1
        && let Some(dropped) = w.cmd(1).and_then(Inst::drop_count)
    {
        let diff = i64::from(*count) - i64::from(dropped);
        return match diff {
            0 => erase(2),
            d if d < 0 => replace(2, Inst::drops(-d as u32).to_vec()),
            d => replace(2, vec![Inst::blkpush(d as u32, *index)]),
        };
    }

    if let Some((inputs, 1)) = c1.simple_io()
        && let Some(dropped) = w.cmd(1).and_then(Inst::drop_count)
    {
        let q = inputs + dropped - 1;
        if q == 0 {
            return erase(2);
        }
        return replace(2, Inst::drops(q).to_vec());
    }

    if c1.simple_io() == Some((0, 1)) && matches!(w.cmd(1), Some(Inst::Pop(1))) {
        return replace(2, vec![Inst::Pop(0), c1.clone()]);
    }

    if matches!(c1, Inst::Pop(1))
        && let Some(dropped) = w.cmd(1).and_then(Inst::drop_count)
    {
        return replace(2, Inst::drops(1 + dropped).to_vec());
    }

    if let Some(total) = c1.block_swap_total()
        && let Some(c2) = w.cmd(1)
        && let Some(dropped) = c2.drop_count()
        && dropped >= total
    {
        return replace(2, vec![c2.clone()]);
    }

    if c1.drop_count().is_some() && w.cmd(1).and_then(Inst::drop_count).is_some() {
        let mut n = 0usize;
        let mut total = 0u32;
        for c in w.commands_from(0) {
            if let Some(d) = c.drop_count() {
                n += 1;
                total += d;
            } else {
                break;
            }
        }
        if total > 1 {
            return replace(n, Inst::drops(total).to_vec());
        }
    }

    // Generic drop fusion: prove a copied/produced value dies unread.
    if c1.push_index() == Some(0)
        && let Some(r) = try_simulate(w.log(), w.index(1), 2, vec![], 1)
    {
        return Some(r);
    }
    if c1.push_index() == Some(1)
        && let Some(r) = try_simulate(w.log(), w.index(1), 3, vec![Inst::SWAP], 1)
    {
        return Some(r);
    }
    if c1.simple_io() == Some((0, 1))
        && let Some(r) = try_simulate(w.log(), w.index(1), 1, vec![], 1)
    {
        return Some(r);
    }
    if c1.is_swap()
        && let Some(r) = try_simulate(w.log(), w.index(1), 2, vec![Inst::Pop(0)], 1)
    {
        return Some(r);
    }
    if c1.drop_count().is_none()
        && let Some(r) = try_simulate(w.log(), w.index(0), 1, vec![Inst::Pop(0)], 0)
    {
        return Some(r);
    }
    if DROP_SECOND_FROM_TOP
        && !matches!(c1, Inst::Pop(1))
        && let Some(r) = try_simulate(w.log(), w.index(0), 2, vec![Inst::Pop(1)], 0)
    {
        return Some(r);
    }

    // NEWC; <producer>; ST..R -> <producer>; NEWC; ST.. (non-reversed)
    if matches!(c1, Inst::NewC)
        && let Some(c2) = w.cmd(1)
        && c2.simple_io() == Some((0, 1))
        && let Some(unrev) = w.cmd(2).and_then(unreversed_store)
    {
        return replace(3, vec![c2.clone(), Inst::NewC, unrev]);
    }

    // Empty and throwing continuations fold into flag-driven instructions.
    if matches!(c1, Inst::BlockOpen(BlockKind::PushCont)) {
        if matches!(w.cmd(1), Some(Inst::BlockClose)) {
            match w.cmd(2) {
                Some(Inst::If | Inst::IfNot) => return replace(3, vec![Inst::Pop(0)]),
                Some(Inst::IfJmp) => return replace(3, vec![Inst::IfRet]),
                Some(Inst::IfNotJmp) => return replace(3, vec![Inst::IfNotRet]),
                _ => {}
            }
        }
        if let Some(Inst::Throw(code)) = w.cmd(1)
            && matches!(w.cmd(2), Some(Inst::BlockClose))
        {
            match w.cmd(3) {
                Some(Inst::If | Inst::IfJmp) => return replace(4, vec![Inst::ThrowIf(*code)]),
                Some(Inst::IfNot | Inst::IfNotJmp) => {
                    return replace(4, vec![Inst::ThrowIfNot(*code)]);
                }
                _ => {}
            }
        }
    }

    if matches!(c1, Inst::GetGlob(_))
        && matches!(w.cmd(1), Some(Inst::IsNull))
        && matches!(w.cmd(2), Some(Inst::Pop(0)))
    {
        return erase(3);
    }

    // Boolean negation fuses into the following conditional throw.
    if (matches!(c1, Inst::Not) || matches!(c1, Inst::EqInt(0)))
        && let Some(Inst::ThrowIfNot(code)) = w.cmd(1)
    {
        return replace(2, vec![Inst::ThrowIf(*code)]);
    }
    if matches!(c1, Inst::NeqInt(0))
        && let Some(Inst::ThrowIfNot(code)) = w.cmd(1)
    {
        return replace(2, vec![Inst::ThrowIfNot(*code)]);
    }
    if matches!(c1, Inst::Not)
        && let Some(Inst::ThrowIf(code)) = w.cmd(1)
    {
        return replace(2, vec![Inst::ThrowIfNot(*code)]);
    }

    // PUSH s<p>; XCHG s<x>; BLKDROP x -> keep only the survivor.
    if let Some(push_index) = c1.push_index()
        && let Some(Inst::Xchg { i: 0, j: x }) = w.cmd(1)
        && let Some(dropped) = w.cmd(2).and_then(Inst::drop_count)
        && *x == dropped
        && dropped <= 15
    {
        let i = push_index.min(x - 1);
        let j = push_index.max(x - 1);
        if i == j {
            return replace(3, Inst::drops(dropped - 1).to_vec());
        }
        if push_index + 1 < dropped {
            let mut replacement = vec![Inst::Xchg { i, j }];
            replacement.extend(Inst::drops(dropped - 1));
            return replace(3, replacement);
        }
    }

    if matches!(c1, Inst::Rot) && matches!(w.cmd(1), Some(Inst::RotRev)) {
        return erase(2);
    }
    if matches!(c1, Inst::RotRev) && matches!(w.cmd(1), Some(Inst::Rot)) {
        return erase(2);
    }

    if let Some(n) = int_val(w.cmd(0))
        && matches!(w.cmd(1), Some(Inst::StZeroes))
        && w.cmd(2).is_some_and(|c| single_bit(c, '0'))
    {
        return replace(3, vec![Inst::PushInt(n + 1), Inst::StZeroes]);
    }

    // Adjacent slice literals fuse when the result still fits one literal.
    if let Some(Inst::PushSlice(s1)) = w.cmd(0)
        && matches!(w.cmd(1), Some(Inst::NewC))
        && matches!(w.cmd(2), Some(Inst::StSlice))
        && let Some(Inst::StSliceConst(s4)) = w.cmd(3)
    {
        let chunks = BitString::unit(s1, s4);
        if let [joined] = chunks.as_slice() {
            return replace(
                4,
                vec![Inst::PushSlice(joined.clone()), Inst::NewC, Inst::StSlice],
            );
        }
    }
    if let Some(Inst::PushSlice(s1)) = w.cmd(0)
        && matches!(w.cmd(1), Some(Inst::StSliceR))
        && let Some(Inst::StSliceConst(s3)) = w.cmd(2)
    {
        let chunks = BitString::unit(s1, s3);
        if let [joined] = chunks.as_slice() {
            return replace(3, vec![Inst::PushSlice(joined.clone()), Inst::StSliceR]);
        }
    }
    if let Some(n) = int_val(w.cmd(0)).and_then(BigInt::to_u32)
        && matches!(w.cmd(1), Some(Inst::StZeroes))
        && let Some(Inst::StSliceConst(s3)) = w.cmd(2)
        && s3.len() > 1
    {
        let mut zeroes = BitString::new();
        zeroes.push_zeros(n);
        let chunks = BitString::unit(&zeroes, s3);
        if let [joined] = chunks.as_slice() {
            return replace(3, vec![Inst::PushSlice(joined.clone()), Inst::StSliceR]);
        }
    }
    if let Some(Inst::StSliceConst(s1)) = w.cmd(0)
        && let Some(Inst::StSliceConst(s2)) = w.cmd(1)
    {
        let chunks = BitString::unit(s1, s2);
        if let [joined] = chunks.as_slice()
            && joined.len() <= MAX_STSLICECONST_BITS
        {
            return replace(2, vec![Inst::StSliceConst(joined.clone())]);
        }
    }
    if let Some(Inst::PushSlice(s1)) = w.cmd(0)
        && matches!(w.cmd(1), Some(Inst::NewC))
        && let Some(Inst::StSliceConst(s3)) = w.cmd(2)
        && matches!(w.cmd(3), Some(Inst::StSlice))
    {
        let chunks = BitString::unit(s3, s1);
        if let [joined] = chunks.as_slice() {
            return replace(
                4,
                vec![Inst::PushSlice(joined.clone()), Inst::NewC, Inst::StSlice],
            );
        }
    }
    if let Some(Inst::PushSlice(s1)) = w.cmd(0)
        && matches!(w.cmd(1), Some(Inst::NewC))
        && matches!(w.cmd(2), Some(Inst::StSlice))
        && let Some(Inst::PushSlice(s4)) = w.cmd(3)
        && matches!(w.cmd(4), Some(Inst::StSliceR))
    {
        let chunks = BitString::unit(s1, s4);
        if let [joined] = chunks.as_slice() {
            return replace(
                5,
                vec![Inst::PushSlice(joined.clone()), Inst::NewC, Inst::StSlice],
            );
        }
    }

    if let Some(Inst::Tuple(n)) = w.cmd(0)
        && let Some(Inst::Untuple(m)) = w.cmd(1)
        && n == m
    {
        return erase(2);
    }
    if matches!(c1, Inst::Pair) && matches!(w.cmd(1), Some(Inst::Unpair)) {
        return erase(2);
    }

    if matches!(c1, Inst::Rot)
        && let Some(c2) = w.cmd(1)
        && (matches!(c2, Inst::SetGlob(_)) || c2.pop_index().is_some_and(|i| i >= 3))
        && w.cmd(2).is_some_and(Inst::is_swap)
    {
        return replace(3, vec![Inst::Xchg { i: 0, j: 2 }, c2.clone()]);
    }

    if let Some(Inst::SetGlob(k1)) = w.cmd(0)
        && let Some(Inst::GetGlob(k2)) = w.cmd(1)
        && k1 == k2
    {
        return replace(2, vec![Inst::Push(0), Inst::SetGlob(*k1)]);
    }

    if let Some(a) = c1.const_add_value()
        && let Some(b) = w.cmd(1).and_then(Inst::const_add_value)
    {
        let sum = a + b;
        if (-128..=127).contains(&sum) {
            return replace(2, vec![Inst::AddConst(sum)]);
        }
    }
    if let Some(a) = c1.const_add_value()
        && let Some(b) = w.cmd(2).and_then(Inst::const_add_value)
        && let Some(Inst::UFits(n1)) = w.cmd(1)
        && let Some(Inst::UFits(n2)) = w.cmd(3)
        && n1 == n2
    {
        let sum = a + b;
        if (-128..=127).contains(&sum) {
            return replace(4, vec![Inst::AddConst(sum), Inst::UFits(*n1)]);
        }
    }

    if let (Some(&Inst::Index(a)), Some(&Inst::Index(b)), Some(&Inst::Index(c))) =
        (w.cmd(0), w.cmd(1), w.cmd(2))
        && a <= 3
        && b <= 3
        && c <= 3
    {
        return replace(3, vec![Inst::Index3(a, b, c)]);
    }
    if let (Some(&Inst::Index(a)), Some(&Inst::Index(b))) = (w.cmd(0), w.cmd(1))
        && a <= 3
        && b <= 3
    {
        return replace(2, vec![Inst::Index2(a, b)]);
    }

    if let Some(v) = int_val(w.cmd(0)).and_then(BigInt::to_u32)
        && v < (1 << 11)
        && matches!(w.cmd(1), Some(Inst::ThrowAny))
    {
        return replace(2, vec![Inst::Throw(v)]);
    }

    if let Some(v) = int_val(w.cmd(0)).and_then(BigInt::to_u32)
        && (1..=256).contains(&v)
    {
        if matches!(w.cmd(1), Some(Inst::RShift(None))) {
            return replace(2, vec![Inst::RShift(Some(v))]);
        }
        if matches!(w.cmd(1), Some(Inst::LShift(None))) {
            return replace(2, vec![Inst::LShift(Some(v))]);
        }
    }

    // Strength reduction: multiply/divide/mod by a power of two.
    if let Some(v) = int_val(w.cmd(0)).and_then(BigInt::to_u64)
        && let Some(p) = (1u32..=8).find(|&p| v == 1u64 << p)
    {
        if matches!(w.cmd(1), Some(Inst::Div)) {
            return replace(2, vec![Inst::RShift(Some(p))]);
        }
        if matches!(w.cmd(1), Some(Inst::Mul)) {
            return replace(2, vec![Inst::LShift(Some(p))]);
        }
        if matches!(w.cmd(1), Some(Inst::Mod)) {
            return replace(2, vec![Inst::ModPow2(p)]);
        }
    }

    if let Some(v) = int_val(w.cmd(0)).and_then(BigInt::to_i32)
        && (-128..128).contains(&v)
    {
        match w.cmd(1) {
            Some(Inst::Neq) => return replace(2, vec![Inst::NeqInt(v)]),
            Some(Inst::Equal) => return replace(2, vec![Inst::EqInt(v)]),
            Some(Inst::Greater) => return replace(2, vec![Inst::GtInt(v)]),
            Some(Inst::Less) => return replace(2, vec![Inst::LessInt(v)]),
            _ => {}
        }
    }

    if matches!(c1, Inst::RotRev)
        && matches!(w.cmd(1), Some(Inst::RotRev))
        && matches!(w.cmd(2), Some(Inst::RotRev))
    {
        return erase(3);
    }

    // A full rotation cycle of BLKSWAP n, 1 is the identity.
    if let Some(&Inst::BlkSwap { bottom: n, top: 1 }) = w.cmd(0) {
        let need = n as usize + 1;
        let mut count = 0usize;
        for c in w.commands_from(0).take(need) {
            if matches!(c, Inst::BlkSwap { bottom, top: 1 } if *bottom == n) {
                count += 1;
            } else {
                break;
            }
        }
        if count == need {
            return erase(need);
        }
    }

    if let (Some(a), Some(b)) = (int_val(w.cmd(0)), int_val(w.cmd(1)))
        && matches!(w.cmd(2), Some(Inst::Mul))
    {
        return replace(3, vec![Inst::PushInt(a * b)]);
    }
    if let (Some(a), Some(b)) = (int_val(w.cmd(0)), int_val(w.cmd(1)))
        && matches!(w.cmd(2), Some(Inst::Div))
        && !a.is_negative()
        && b.is_positive()
    {
        return replace(3, vec![Inst::PushInt(a / b)]);
    }

    if matches!(c1, Inst::PushSlice(_))
        && matches!(w.cmd(1), Some(Inst::NewC))
        && matches!(w.cmd(2), Some(Inst::StSlice))
        && matches!(w.cmd(3), Some(Inst::EndC))
        && matches!(w.cmd(4), Some(Inst::Pop(0)))
    {
        return erase(5);
    }

    if let Some(&Inst::Xchg { i: 0, j: x }) = w.cmd(0)
        && x <= 15
        && matches!(w.cmd(1), Some(Inst::BlkDrop(n)) if *n == x)
        && matches!(w.cmd(2), Some(Inst::Pop(1)))
    {
        return replace(3, vec![Inst::Xchg { i: 0, j: x + 1 }, Inst::BlkDrop(x + 1)]);
    }

    if let Some(&Inst::BlkDrop2 { count: f1, top: s1 }) = w.cmd(0)
        && let Some(&Inst::BlkDrop2 { count: f2, top: s2 }) = w.cmd(1)
        && s1 == s2
    {
        return replace(2, vec![Inst::BlkDrop2 { count: f1 + f2, top: s2 }]);
    }

    if let Some(&Inst::BlkSwap { bottom: a1, top: b1 }) = w.cmd(0)
        && matches!(w.cmd(1), Some(Inst::BlkDrop(a2)) if *a2 == a1)
    {
        return replace(2, vec![Inst::BlkDrop2 { count: a1, top: b1 }]);
    }

    if let Some(&Inst::BlkDrop2 { count: i1, top: j1 }) = w.cmd(0)
        && let Some(&Inst::BlkDrop2 { count: i2, top: j2 }) = w.cmd(1)
        && j1 == i2 + j2
    {
        return replace(2, vec![Inst::BlkDrop2 { count: i1 + i2, top: j2 }]);
    }

    if matches!(c1, Inst::Mul)
        && let Some(Inst::RShift(param)) = w.cmd(1)
    {
        return replace(2, vec![Inst::MulRShift(*param)]);
    }

    if matches!(c1, Inst::NewC) && matches!(w.cmd(1), Some(Inst::EndC)) {
        return replace(
            2,
            vec![Inst::BlockOpen(BlockKind::PushRef), Inst::BlockClose],
        );
    }

    if matches!(c1, Inst::Pop(3))
        && matches!(w.cmd(1), Some(Inst::Pop(3)))
        && matches!(w.cmd(2), Some(Inst::Pop(3)))
    {
        return replace(3, vec![Inst::BlkDrop2 { count: 3, top: 3 }]);
    }

    if matches!(c1, Inst::IsNull)
        && matches!(w.cmd(1), Some(Inst::Not))
        && matches!(w.cmd(2), Some(Inst::Not))
    {
        return replace(3, vec![Inst::IsNull]);
    }

    if int_val(w.cmd(0)).is_some_and(Zero::is_zero)
        && let Some(Inst::StUR(a)) = w.cmd(1)
        && int_val(w.cmd(2)).is_some_and(Zero::is_zero)
        && let Some(Inst::StUR(b)) = w.cmd(3)
        && a + b <= 256
    {
        return replace(4, vec![Inst::PushInt(BigInt::zero()), Inst::StUR(a + b)]);
    }

    if let Some(Inst::UFits(a)) = w.cmd(0)
        && let Some(Inst::UFits(b)) = w.cmd(1)
    {
        return replace(2, vec![Inst::UFits(*a.min(b))]);
    }
    if let Some(Inst::Fits(a)) = w.cmd(0)
        && let Some(Inst::Fits(b)) = w.cmd(1)
    {
        return replace(2, vec![Inst::Fits(*a.min(b))]);
    }

    // Constant integers stored right after constant bits become one literal.
    if let Some(v) = int_val(w.cmd(0))
        && matches!(w.cmd(1), Some(Inst::NewC))
        && let Some(Inst::StSliceConst(prefix)) = w.cmd(2)
        && let Some(Inst::StU(n)) = w.cmd(3)
        && !v.is_negative()
        && v.bits() <= u64::from(*n)
    {
        let mut bits = prefix.clone();
        bits.append_uint(v, *n);
        if let [joined] = BitString::unit(&bits, &BitString::new()).as_slice() {
            return replace(
                4,
                vec![Inst::PushSlice(joined.clone()), Inst::NewC, Inst::StSlice],
            );
        }
    }
    if let Some(v) = int_val(w.cmd(0))
        && let Some(Inst::PushSlice(prefix)) = w.cmd(1)
        && matches!(w.cmd(2), Some(Inst::NewC))
        && matches!(w.cmd(3), Some(Inst::StSlice))
        && let Some(Inst::StU(n)) = w.cmd(4)
        && !v.is_negative()
        && v.bits() <= u64::from(*n)
    {
        let mut bits = prefix.clone();
        bits.append_uint(v, *n);
        if let [joined] = BitString::unit(&bits, &BitString::new()).as_slice() {
            return replace(
                5,
                vec![Inst::PushSlice(joined.clone()), Inst::NewC, Inst::StSlice],
            );
        }
    }
    if let Some(Inst::PushSlice(s1)) = w.cmd(0)
        && matches!(w.cmd(1), Some(Inst::NewC))
        && matches!(w.cmd(2), Some(Inst::StSlice))
        && matches!(w.cmd(3), Some(Inst::StOne | Inst::StZero))
    {
        let mut bits = s1.clone();
        bits.push_bit(matches!(w.cmd(3), Some(Inst::StOne)));
        if let [joined] = BitString::unit(&bits, &BitString::new()).as_slice() {
            return replace(
                4,
                vec![Inst::PushSlice(joined.clone()), Inst::NewC, Inst::StSlice],
            );
        }
    }

    if let Some(a) = int_val(w.cmd(0))
        && matches!(w.cmd(1), Some(Inst::StZeroes))
        && let Some(b) = int_val(w.cmd(2))
        && matches!(w.cmd(3), Some(Inst::StZeroes))
    {
        return replace(4, vec![Inst::PushInt(a + b), Inst::StZeroes]);
    }

    if let Some(a) = int_val(w.cmd(0))
        && let Some(Inst::StUR(len_a)) = w.cmd(1)
        && let Some(b) = int_val(w.cmd(2))
        && let Some(Inst::StUR(len_b)) = w.cmd(3)
        && len_a + len_b <= 256
        && !a.is_negative()
        && !b.is_negative()
    {
        let joined = (a.clone() << *len_b) + b;
        return replace(4, vec![Inst::PushInt(joined), Inst::StUR(len_a + len_b)]);
    }

    if let Some(n) = int_val(w.cmd(0)).and_then(BigInt::to_u32)
        && matches!(w.cmd(1), Some(Inst::StZeroes))
        && w.cmd(2).is_some_and(|c| single_bit(c, '1'))
        && n <= 256
    {
        return replace(3, vec![Inst::PushInt(BigInt::one()), Inst::StUR(n + 1)]);
    }

    if matches!(c1, Inst::True | Inst::False)
        && matches!(w.cmd(1), Some(Inst::StIR(1)))
    {
        if matches!(c1, Inst::False) {
            return replace(2, vec![Inst::StZero]);
        }
        return replace(2, vec![Inst::StOne]);
    }

    // Runs of single-bit stores fuse into one constant-slice store.
    if matches!(c1, Inst::StOne | Inst::StZero) {
        let mut bits = BitString::new();
        let mut qty = 0u32;
        for c in w.commands_from(0) {
            if qty >= MAX_STSLICECONST_BITS {
                break;
            }
            match c {
                Inst::StOne => bits.push_ones(1),
                Inst::StZero => bits.push_zeros(1),
                _ => break,
            }
            qty += 1;
        }
        if qty >= 2 {
            let chunks = BitString::unit(&bits, &BitString::new());
            let [joined] = chunks.as_slice() else {
                panic!("bit run exceeds one slice literal")
            };
            return replace(qty as usize, vec![Inst::StSliceConst(joined.clone())]);
        }
    }

    if let Some(Inst::PushSlice(s1)) = w.cmd(0)
        && matches!(w.cmd(1), Some(Inst::NewC))
        && matches!(w.cmd(2), Some(Inst::StSlice))
        && matches!(w.cmd(3), Some(Inst::NewC))
        && let Some(Inst::StSliceConst(s5)) = w.cmd(4)
        && matches!(w.cmd(5), Some(Inst::StB))
    {
        let chunks = BitString::unit(s5, s1);
        if let [joined] = chunks.as_slice() {
            return replace(
                6,
                vec![Inst::PushSlice(joined.clone()), Inst::NewC, Inst::StSlice],
            );
        }
    }

    if single_bit(c1, '0')
        && int_val(w.cmd(1)).is_some_and(Zero::is_zero)
        && let Some(Inst::StUR(n)) = w.cmd(2)
    {
        return replace(3, vec![Inst::PushInt(BigInt::zero()), Inst::StUR(n + 1)]);
    }

    if let Some(a) = int_val(w.cmd(0)).and_then(BigInt::to_u32)
        && matches!(w.cmd(1), Some(Inst::StZeroes))
        && let Some(b) = int_val(w.cmd(2))
        && let Some(Inst::StUR(n)) = w.cmd(3)
        && !b.is_negative()
        && a + n <= 256
    {
        return replace(4, vec![Inst::PushInt(b.clone()), Inst::StUR(a + n)]);
    }

    if int_val(w.cmd(0)).is_some_and(Zero::is_zero)
        && let Some(Inst::StUR(n)) = w.cmd(1)
    {
        return replace(2, vec![Inst::PushInt(BigInt::from(*n)), Inst::StZeroes]);
    }

    if matches!(c1, Inst::Abs)
        && matches!(w.cmd(1), Some(Inst::UFits(256)))
    {
        return replace(2, vec![Inst::Abs]);
    }

    if int_val(w.cmd(0)).is_some_and(One::is_one)
        && matches!(w.cmd(1), Some(Inst::StZeroes))
    {
        return replace(2, vec![Inst::StZero]);
    }

    None
}

//! Push fusion normalization passes.
//!
//! `unsquash_push` expands fused multi-value pushes into canonical
//! single-value form before the main rewrite passes, so every rule sees one
//! window shape. `squash_push` re-fuses adjacent pushes afterwards where the
//! index encoding permits. Ordering matters: fusion changes which windows
//! later rules observe.

use super::{RewriteResult, Window};
use crate::inst::Inst;

/// Expands `PUSH2 si, sj` into two single pushes. The second push happens
/// with the first value already on the stack, so its index shifts by one.
pub(crate) fn unsquash_push(w: &Window<'_>) -> Option<RewriteResult> {
    if let Some(Inst::Push2(si, sj)) = w.cmd(0) {
        return Some(RewriteResult::replace(
            1,
            vec![Inst::push_s(*si), Inst::push_s(sj + 1)],
        ));
    }
    None
}

/// Fuses adjacent single pushes into `PUSH3`/`PUSH2`/`DUP2`, and rewrites
/// two-value `BLKPUSH` forms to their dedicated spellings.
pub(crate) fn squash_push(w: &Window<'_>) -> Option<RewriteResult> {
    if let (Some(&Inst::Push(i1)), Some(&Inst::Push(i2)), Some(&Inst::Push(i3))) =
        (w.cmd(0), w.cmd(1), w.cmd(2))
    {
        let si = i64::from(i1);
        let sj = if i64::from(i2) - 1 == -1 { si } else { i64::from(i2) - 1 };
        let sk = match i64::from(i3) - 2 {
            -1 => si,
            -2 => sj,
            k => k,
        };
        if si <= 15 && sj <= 15 && sk <= 15 {
            return Some(RewriteResult::replace(
                3,
                vec![Inst::Push3(si as u32, sj as u32, sk as u32)],
            ));
        }
    }
    if let (Some(&Inst::Push(i1)), Some(&Inst::Push(i2))) = (w.cmd(0), w.cmd(1)) {
        if i1 == 1 && i2 == 1 {
            return Some(RewriteResult::replace(2, vec![Inst::Dup2]));
        }
        let si = i64::from(i1);
        let sj = if i64::from(i2) - 1 == -1 { si } else { i64::from(i2) - 1 };
        if si <= 15 && sj <= 15 {
            return Some(RewriteResult::replace(2, vec![Inst::Push2(si as u32, sj as u32)]));
        }
    }
    if let Some(Inst::BlkPush { count: 2, index: 1 }) = w.cmd(0) {
        return Some(RewriteResult::replace(1, vec![Inst::Dup2]));
    }
    if let Some(Inst::BlkPush { count: 2, index: 3 }) = w.cmd(0) {
        return Some(RewriteResult::replace(1, vec![Inst::Over2]));
    }
    None
}

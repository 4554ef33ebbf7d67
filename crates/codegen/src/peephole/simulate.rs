//! Generic drop-fusion fallback.
//!
//! When no named rule matches, the optimizer symbolically simulates a small
//! abstract stack and walks forward through pushes, pops, drops and simple
//! fixed-arity commands. The tracked slot is the bottom of the simulated
//! window; if it is provably never read before a `NIP`/drop discards it, the
//! whole stretch can be rewritten with the drop fused at the proof point.
//! This subsumes many named patterns and runs last because it is the most
//! expensive rule to evaluate.

use super::RewriteResult;
use crate::buffer::Instruction;
use crate::inst::Inst;

/// A second simulation seed that tries to drop the second-from-top value
/// instead of the top one. Disabled: it empirically worsened output.
pub(crate) const DROP_SECOND_FROM_TOP: bool = false;

/// Walks forward from `start`, tracking an abstract stack of `stack_size`
/// values whose bottom is the slot being eliminated. `commands` holds the
/// rewritten prefix; `consumed` counts the commands already accounted for.
///
/// Returns the full rewrite when the tracked slot dies unread.
pub(crate) fn try_simulate(
    log: &[Instruction],
    start: Option<usize>,
    mut stack_size: i64,
    mut commands: Vec<Inst>,
    mut consumed: usize,
) -> Option<RewriteResult> {
    let mut i = start?;
    let mut first_time = true;
    loop {
        if first_time {
            first_time = false;
        } else {
            consumed += 1;
            i = super::next_command(log, i)?;
        }
        let c = &log[i].inst;

        if let Some(push_index) = c.push_index() {
            let push_index = i64::from(push_index);
            if push_index + 1 == stack_size {
                return None; // reads the tracked slot
            }
            if push_index + 1 < stack_size {
                commands.push(c.clone());
            } else {
                if push_index == 0 {
                    return None;
                }
                commands.push(Inst::push_s(push_index as u32 - 1));
            }
            stack_size += 1;
            continue;
        }
        if let Some(pop_index) = c.pop_index().filter(|&n| n >= 2) {
            let pop_index = i64::from(pop_index);
            if stack_size == 1 {
                return None;
            }
            if pop_index + 1 == stack_size {
                return None; // writes the tracked slot
            }
            if pop_index + 1 < stack_size {
                commands.push(c.clone());
            } else {
                commands.push(Inst::pop_s(pop_index as u32 - 1));
            }
            stack_size -= 1;
            continue;
        }
        if let Inst::BlkPush { count, index } = c {
            // Passes through only when it cannot touch the tracked slot.
            if i64::from(*index) + 1 < stack_size {
                commands.push(c.clone());
                stack_size += i64::from(*count);
                continue;
            }
            return None;
        }
        if matches!(c, Inst::Pop(1)) {
            if stack_size == 2 {
                consumed += 1;
                break; // the NIP discards exactly the tracked slot
            }
            if stack_size > 2 {
                stack_size -= 1;
                commands.push(c.clone());
                continue;
            }
            return None;
        }
        if let Some(dropped) = c.drop_count() {
            let dropped = i64::from(dropped);
            if stack_size <= dropped {
                if dropped > 1 {
                    commands.extend(Inst::drops(dropped as u32 - 1));
                }
                consumed += 1;
                break; // the drop covers the tracked slot
            }
            commands.push(c.clone());
            stack_size -= dropped;
            continue;
        }
        if let Some((inputs, outputs)) = c.simple_io() {
            if stack_size <= i64::from(inputs) {
                return None; // would consume the tracked slot
            }
            commands.push(c.clone());
            stack_size += i64::from(outputs) - i64::from(inputs);
            continue;
        }
        return None;
    }
    Some(RewriteResult { consumed, replacement: commands })
}

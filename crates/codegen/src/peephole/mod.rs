//! Peephole optimization of the instruction log.
//!
//! A cursor scans the log; at each position a priority-ordered battery of
//! local rules inspects a window of up to six forthcoming instructions
//! (comments are skipped) and either declines or returns a [`RewriteResult`].
//! After a rewrite the cursor rewinds a few instructions so newly adjacent
//! instructions can re-match; the pass ends when no position rewrites.
//!
//! The full optimization runs four passes: `unsquash` normalizes fused pushes
//! to single-value form, the main rule battery runs to fixpoint twice, and
//! `squash` re-fuses push sequences where index encoding permits.

mod rules;
mod simulate;
mod squash;

use crate::buffer::{CodeBuffer, Instruction};
use crate::inst::Inst;
use tracing::debug;

/// How far the cursor rewinds after a successful rewrite, in non-comment
/// instructions.
const REWIND_DISTANCE: usize = 10;

/// One successful local rewrite: how many commands the rule consumed and
/// what replaces them. Comments inside the window stay in place.
#[derive(Clone, Debug)]
pub struct RewriteResult {
    /// Count of consecutive non-comment instructions consumed.
    pub consumed: usize,
    /// Replacement instructions, inserted where the consumed ones were.
    pub replacement: Vec<Inst>,
}

impl RewriteResult {
    /// Replaces `consumed` commands with `replacement`.
    #[must_use]
    pub fn replace(consumed: usize, replacement: Vec<Inst>) -> Self {
        assert!(consumed > 0, "a rewrite must consume at least one instruction");
        Self { consumed, replacement }
    }

    /// Removes `consumed` commands outright.
    #[must_use]
    pub fn erase(consumed: usize) -> Self {
        Self::replace(consumed, Vec::new())
    }
}

/// A window over the log anchored at a non-comment instruction.
pub(crate) struct Window<'a> {
    log: &'a [Instruction],
    /// Log indices of the anchor and the next five commands.
    slots: [Option<usize>; 6],
}

impl<'a> Window<'a> {
    fn new(log: &'a [Instruction], start: usize) -> Self {
        debug_assert!(!matches!(log[start].inst, Inst::Comment(_)));
        let mut slots = [None; 6];
        slots[0] = Some(start);
        for k in 1..6 {
            slots[k] = slots[k - 1].and_then(|i| next_command(log, i));
        }
        Self { log, slots }
    }

    /// The `k`-th forthcoming command (0 = the anchor), if the log is long
    /// enough.
    pub(crate) fn cmd(&self, k: usize) -> Option<&'a Inst> {
        self.slots[k].map(|i| &self.log[i].inst)
    }

    /// Nesting depth of the `k`-th command.
    pub(crate) fn depth(&self, k: usize) -> Option<u32> {
        self.slots[k].map(|i| self.log[i].depth)
    }

    /// Log index of the `k`-th command.
    pub(crate) fn index(&self, k: usize) -> Option<usize> {
        self.slots[k]
    }

    pub(crate) fn log(&self) -> &'a [Instruction] {
        self.log
    }

    /// Iterates commands starting at window slot `k`, skipping comments,
    /// without the six-command bound. Used by run-collecting rules.
    pub(crate) fn commands_from(&self, k: usize) -> impl Iterator<Item = &'a Inst> {
        let log = self.log;
        let mut next = self.slots[k];
        std::iter::from_fn(move || {
            let i = next?;
            next = next_command(log, i);
            Some(&log[i].inst)
        })
    }
}

/// Index of the next non-comment instruction strictly after `idx`.
fn next_command(log: &[Instruction], idx: usize) -> Option<usize> {
    log[idx + 1..]
        .iter()
        .position(|item| !matches!(item.inst, Inst::Comment(_)))
        .map(|off| idx + 1 + off)
}

/// Fixpoint local-rewrite engine over a flat instruction log.
#[derive(Debug)]
pub struct PeepholeOptimizer {
    lines: Vec<Instruction>,
}

impl PeepholeOptimizer {
    #[must_use]
    pub fn new(lines: Vec<Instruction>) -> Self {
        Self { lines }
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<Instruction> {
        self.lines
    }

    /// Runs one rule battery to fixpoint.
    fn run_pass(&mut self, name: &str, rule: impl Fn(&Window<'_>) -> Option<RewriteResult>) {
        let mut rewrites = 0usize;
        let mut idx = 0usize;
        while idx < self.lines.len() {
            if matches!(self.lines[idx].inst, Inst::Comment(_)) {
                idx += 1;
                continue;
            }
            let window = Window::new(&self.lines, idx);
            if let Some(res) = rule(&window) {
                rewrites += 1;
                idx = self.apply(idx, res);
            } else {
                idx = next_command(&self.lines, idx).unwrap_or(self.lines.len());
            }
        }
        debug!(pass = name, rewrites, "peephole pass done");
    }

    /// Applies a rewrite anchored at `idx` and returns the rewound cursor.
    fn apply(&mut self, idx: usize, res: RewriteResult) -> usize {
        // Collect the consumed command indices.
        let mut removed = Vec::with_capacity(res.consumed);
        let mut i = Some(idx);
        while removed.len() < res.consumed {
            let cur = i.expect("rewrite consumed more instructions than the log holds");
            removed.push(cur);
            i = next_command(&self.lines, cur);
        }

        // Replacements take the shallowest depth of the window they replace.
        let depth = removed.iter().map(|&i| self.lines[i].depth).min().unwrap();

        let insert_at = *removed.last().unwrap() + 1;
        let replacements: Vec<Instruction> =
            res.replacement.into_iter().map(|inst| Instruction { inst, depth }).collect();
        self.lines.splice(insert_at..insert_at, replacements);
        for &r in removed.iter().rev() {
            self.lines.remove(r);
        }

        // Step back so the new neighborhood can re-match.
        let mut cursor = idx.min(self.lines.len());
        let mut remaining = REWIND_DISTANCE;
        let mut i = cursor;
        while remaining > 0 && i > 0 {
            i -= 1;
            if !matches!(self.lines[i].inst, Inst::Comment(_)) {
                remaining -= 1;
            }
            cursor = i;
        }
        cursor
    }
}

/// Optimizes a finished log: unsquash, two fixpoint rewrite passes, squash.
#[must_use]
pub fn optimize_code(code: &CodeBuffer) -> CodeBuffer {
    let mut opt = PeepholeOptimizer::new(code.as_slice().to_vec());
    opt.run_pass("unsquash", squash::unsquash_push);
    opt.run_pass("rewrite", rules::rewrite_at);
    opt.run_pass("rewrite", rules::rewrite_at);
    opt.run_pass("squash", squash::squash_push);
    CodeBuffer::from_items(opt.into_lines())
}

#[cfg(test)]
mod tests;

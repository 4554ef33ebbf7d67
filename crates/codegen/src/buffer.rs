//! The instruction log.
//!
//! A [`CodeBuffer`] is an ordered sequence of instructions, each stamped with
//! the nesting depth it was emitted at. Block-open instructions deepen
//! subsequent entries by one; block-close instructions are stamped at the
//! opening depth, matching how the printed text indents.

use crate::inst::{BlockKind, Inst};

/// One log entry: an instruction plus its nesting depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub inst: Inst,
    pub depth: u32,
}

/// Ordered instruction log with block nesting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeBuffer {
    items: Vec<Instruction>,
    depth: u32,
}

impl CodeBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction at the current depth.
    pub fn push(&mut self, inst: Inst) {
        self.items.push(Instruction { inst, depth: self.depth });
    }

    /// Appends a `;;` comment line.
    pub fn comment(&mut self, text: impl Into<String>) {
        self.push(Inst::Comment(text.into()));
    }

    /// Opens a block: emits the opener and deepens subsequent instructions.
    pub fn open_block(&mut self, kind: BlockKind) {
        self.push(Inst::BlockOpen(kind));
        self.depth += 1;
    }

    /// Closes the innermost block.
    ///
    /// # Panics
    /// Panics if no block is open; that is an emitter bug.
    pub fn close_block(&mut self) {
        assert!(self.depth > 0, "closing a block with none open");
        self.depth -= 1;
        self.push(Inst::BlockClose);
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of log entries, comments included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The instruction `offset` entries from the end (0 = last), if any.
    #[must_use]
    pub fn inst_from_end(&self, offset: usize) -> Option<&Inst> {
        let n = self.items.len();
        if offset < n { Some(&self.items[n - 1 - offset].inst) } else { None }
    }

    /// Removes and returns the last entry.
    pub fn pop_last(&mut self) -> Option<Instruction> {
        self.items.pop()
    }

    /// Removes the entry `offset` positions from the end.
    ///
    /// # Panics
    /// Panics if out of range.
    pub fn remove_from_end(&mut self, offset: usize) {
        let n = self.items.len();
        assert!(offset < n, "removing entry {offset} from a log of {n}");
        self.items.remove(n - 1 - offset);
    }

    /// Appends another buffer, re-basing its depths onto the current one.
    pub fn append(&mut self, other: &Self) {
        for item in &other.items {
            self.items.push(Instruction { inst: item.inst.clone(), depth: item.depth + self.depth });
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.items.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Instruction] {
        &self.items
    }

    /// Consumes the buffer, yielding the raw log.
    ///
    /// # Panics
    /// Panics if a block is still open; that is an emitter bug.
    #[must_use]
    pub fn into_items(self) -> Vec<Instruction> {
        assert_eq!(self.depth, 0, "finishing a log with an unclosed block");
        self.items
    }

    /// Rebuilds a buffer from a raw log (used by the optimizer).
    #[must_use]
    pub fn from_items(items: Vec<Instruction>) -> Self {
        Self { items, depth: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_depths() {
        let mut code = CodeBuffer::new();
        code.push(Inst::Zero);
        code.open_block(BlockKind::PushCont);
        code.push(Inst::Inc);
        code.close_block();
        code.push(Inst::If);

        let depths: Vec<_> = code.iter().map(|i| i.depth).collect();
        assert_eq!(depths, [0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_append_rebases_depth() {
        let mut inner = CodeBuffer::new();
        inner.push(Inst::Inc);
        inner.open_block(BlockKind::PushCont);
        inner.push(Inst::Dec);
        inner.close_block();

        let mut outer = CodeBuffer::new();
        outer.open_block(BlockKind::CallRef);
        outer.append(&inner);
        outer.close_block();

        let depths: Vec<_> = outer.iter().map(|i| i.depth).collect();
        assert_eq!(depths, [0, 1, 1, 2, 1, 0]);
    }

    #[test]
    #[should_panic(expected = "unclosed block")]
    fn test_unclosed_block_is_fatal() {
        let mut code = CodeBuffer::new();
        code.open_block(BlockKind::PushCont);
        let _ = code.into_items();
    }
}

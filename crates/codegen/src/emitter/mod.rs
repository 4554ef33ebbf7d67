//! The instruction emitter.
//!
//! An [`Emitter`] pairs a [`CodeBuffer`] with a [`StackModel`]: every
//! emission declares its net stack delta, so the log and the model advance
//! atomically and any drift is caught at the next join-point check.
//!
//! Permutation primitives pick single-instruction idioms for small static
//! offsets and fall back to parameterized forms past the inline-immediate
//! limits; reproducing this tiering exactly is what keeps generated code at
//! size parity with hand-written assembly.

mod convert;
mod encode;
mod message;

pub use message::{MsgKind, ext_msg, int_msg};

use crate::bits::BitString;
use crate::buffer::CodeBuffer;
use crate::consts::{CELL_BITS, MAX_PUSH_SLICE_BITS, MAX_STSLICECONST_BITS, exceptions};
use crate::ctx::CompileContext;
use crate::inst::{BlockKind, Directive, Inst};
use crate::stack::StackModel;
use num_bigint::BigInt;
use num_traits::Zero;
use stele_sema::{DeclId, FuncId, VarDecl};

/// Emits TVM instructions while tracking the symbolic stack.
#[derive(Debug)]
pub struct Emitter<'a> {
    ctx: &'a mut CompileContext,
    pub(crate) code: CodeBuffer,
    pub(crate) stack: StackModel,
}

impl<'a> Emitter<'a> {
    /// Creates an emitter whose stack already holds `stack_size` values
    /// (function parameters pushed by the caller).
    pub fn new(ctx: &'a mut CompileContext, stack_size: usize) -> Self {
        Self { ctx, code: CodeBuffer::new(), stack: StackModel::with_size(stack_size) }
    }

    /// Emits one instruction and applies its declared stack delta.
    pub fn push(&mut self, delta: i32, inst: Inst) {
        self.code.push(inst);
        self.stack.adjust(delta);
    }

    /// Adjusts the stack model without emitting anything, for instructions
    /// whose full effect is accounted for around a block structure.
    pub fn fix_stack(&mut self, delta: i32) {
        self.stack.adjust(delta);
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.code.comment(text);
    }

    #[must_use]
    pub fn ctx(&self) -> &CompileContext {
        self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut CompileContext {
        self.ctx
    }

    #[must_use]
    pub fn stack(&self) -> &StackModel {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut StackModel {
        &mut self.stack
    }

    #[must_use]
    pub fn code(&self) -> &CodeBuffer {
        &self.code
    }

    /// Finishes the function, yielding its log.
    #[must_use]
    pub fn into_code(self) -> CodeBuffer {
        self.code
    }

    // --- blocks ---

    pub fn start_continuation(&mut self, delta: i32) {
        self.code.open_block(BlockKind::PushCont);
        self.stack.adjust(delta);
    }

    pub fn start_continuation_from_ref(&mut self) {
        self.code.open_block(BlockKind::PushRefCont);
    }

    pub fn start_if_ref(&mut self, delta: i32) {
        self.code.open_block(BlockKind::IfRef);
        self.stack.adjust(delta);
    }

    pub fn start_if_jmp_ref(&mut self, delta: i32) {
        self.code.open_block(BlockKind::IfJmpRef);
        self.stack.adjust(delta);
    }

    pub fn start_if_not_ref(&mut self, delta: i32) {
        self.code.open_block(BlockKind::IfNotRef);
        self.stack.adjust(delta);
    }

    pub fn start_call_ref(&mut self, delta: i32) {
        self.code.open_block(BlockKind::CallRef);
        self.stack.adjust(delta);
    }

    pub fn start_cell(&mut self) {
        self.code.open_block(BlockKind::Cell);
    }

    pub fn end_continuation(&mut self, delta: i32) {
        self.code.close_block();
        self.stack.adjust(delta);
    }

    /// Pushes a pre-built continuation body.
    pub fn push_cont(&mut self, cont: &CodeBuffer, comment: Option<&str>) {
        self.code.open_block(BlockKind::PushCont);
        if let Some(text) = comment {
            self.comment(text);
        }
        self.code.append(cont);
        self.code.close_block();
        self.stack.adjust(1);
    }

    // --- permutation primitives ---

    /// Exchanges stack slots `i` and `j` (`i ≤ j`), using the cheapest
    /// available form and a three-exchange expansion past index 15.
    pub fn exchange(&mut self, i: u32, j: u32) {
        assert!(i <= j, "exchange({i}, {j}) expects i <= j");
        assert!(j >= 1, "exchange with the top itself");
        if i == 0 && j <= 255 {
            self.push(0, Inst::Xchg { i: 0, j });
        } else if 1 <= i && i < j && j <= 15 {
            self.push(0, Inst::Xchg { i, j });
        } else if j <= 255 {
            self.exchange(0, i);
            self.exchange(0, j);
            self.exchange(0, i);
        } else {
            panic!("exchange({i}, {j}) is out of addressable range");
        }
    }

    /// Swaps the block of `m` values under the top `n` values.
    pub fn block_swap(&mut self, m: u32, n: u32) {
        if m == 0 || n == 0 {
            return;
        }
        match (m, n) {
            (1, 1) => self.exchange(0, 1),
            (1, 2) => self.push(0, Inst::Rot),
            (2, 1) => self.push(0, Inst::RotRev),
            (2, 2) => self.push(0, Inst::Swap2),
            _ if m <= 16 && n <= 16 => self.push(0, Inst::BlkSwap { bottom: m, top: n }),
            _ => {
                self.push_int(m);
                self.push_int(n);
                self.push(-2, Inst::BlkSwapX);
            }
        }
    }

    /// Reverses the order of `i` values lying `j` slots below the top.
    pub fn reverse(&mut self, i: u32, j: u32) {
        assert!(i >= 2, "reversing fewer than two values");
        if i == 2 && j == 0 {
            self.push(0, Inst::SWAP);
        } else if i == 3 && j == 0 {
            self.push(0, Inst::Xchg { i: 0, j: 2 });
        } else if i - 2 <= 15 && j <= 15 {
            self.push(0, Inst::Reverse { count: i, offset: j });
        } else {
            self.push_int(i);
            self.push_int(j);
            self.push(-2, Inst::RevX);
        }
    }

    /// Drops the top `count` values.
    pub fn drop(&mut self, count: u32) {
        match count {
            0 => {}
            1 => self.push(-1, Inst::Pop(0)),
            2 => self.push(-2, Inst::Drop2),
            3..=15 => self.push(-(count as i32), Inst::BlkDrop(count)),
            _ => {
                self.push_int(count);
                self.push(-(count as i32) - 1, Inst::DropX);
            }
        }
    }

    /// Drops `dropped` values lying under the top `left` values.
    pub fn drop_under(&mut self, left: u32, dropped: u32) {
        if dropped == 0 {
            // nothing to do
        } else if left == 0 {
            self.drop(dropped);
        } else if dropped == 1 && left == 1 {
            self.push(-1, Inst::Pop(1));
        } else if dropped > 15 || left > 15 {
            self.push_int(dropped);
            self.push_int(left);
            self.push(-2, Inst::BlkSwapX);
            self.drop(dropped);
        } else {
            self.push(-(dropped as i32), Inst::BlkDrop2 { count: dropped, top: left });
        }
    }

    /// Copies stack slot `i` to the top.
    pub fn push_s(&mut self, i: u32) {
        assert!(i <= 255, "PUSH s{i} is out of range");
        self.push(1, Inst::Push(i));
    }

    /// Pops the top into stack slot `i`.
    pub fn pop_s(&mut self, i: u32) {
        assert!(i <= 255, "POP s{i} is out of range");
        self.push(-1, Inst::Pop(i));
    }

    pub fn push_int(&mut self, value: impl Into<BigInt>) {
        self.push(1, Inst::PushInt(value.into()));
    }

    pub fn push_null(&mut self) {
        self.push(1, Inst::Null);
    }

    /// Pushes the zero address: `addr_std`, workchain 0, account id 0.
    pub fn push_zero_address(&mut self) {
        self.push(1, Inst::PushSlice(BitString::std_address(&BigInt::zero())));
    }

    // --- tuples ---

    pub fn tuple(&mut self, count: u32) {
        if count <= 15 {
            self.push(-(count as i32) + 1, Inst::Tuple(count));
        } else {
            assert!(count <= 255, "TUPLE {count} is out of range");
            self.push_int(count);
            self.push(-1 - (count as i32) + 1, Inst::TupleVar);
        }
    }

    pub fn untuple(&mut self, count: u32) {
        if count <= 15 {
            self.push(-1 + count as i32, Inst::Untuple(count));
        } else {
            assert!(count <= 255, "UNTUPLE {count} is out of range");
            self.push_int(count);
            self.push(-2 + count as i32, Inst::UntupleVar);
        }
    }

    pub fn index(&mut self, index: u32) {
        if index <= 15 {
            self.push(0, Inst::Index(index));
        } else {
            assert!(index <= 254, "INDEX {index} is out of range");
            self.push_int(index);
            self.push(-1, Inst::IndexVar);
        }
    }

    pub fn set_index(&mut self, index: u32) {
        if index <= 15 {
            self.push(-1, Inst::SetIndex(index));
        } else {
            assert!(index <= 254, "SETINDEX {index} is out of range");
            self.push_int(index);
            self.push(-2, Inst::SetIndexVar);
        }
    }

    pub fn set_index_q(&mut self, index: u32) {
        if index <= 15 {
            self.push(-1, Inst::SetIndexQ(index));
        } else {
            assert!(index <= 254, "SETINDEXQ {index} is out of range");
            self.push_int(index);
            self.push(-2, Inst::SetIndexVarQ);
        }
    }

    // --- globals ---

    pub fn get_glob(&mut self, index: u32) {
        if index <= 31 {
            self.push(1, Inst::GetGlob(index));
        } else {
            assert!(index < 255, "global {index} is out of range");
            self.push_int(index);
            self.push(0, Inst::GetGlobVar);
        }
    }

    pub fn set_glob(&mut self, index: u32) {
        if index <= 31 {
            self.push(-1, Inst::SetGlob(index));
        } else {
            assert!(index < 255, "global {index} is out of range");
            self.push_int(index);
            self.push(-2, Inst::SetGlobVar);
        }
    }

    /// Reads a state variable from its global slot.
    pub fn get_state_var(&mut self, decl: DeclId) {
        let index = self.ctx.state_var_index(decl);
        self.get_glob(index);
    }

    /// Writes the top of stack to a state variable's global slot.
    pub fn set_state_var(&mut self, decl: DeclId) {
        let index = self.ctx.state_var_index(decl);
        self.set_glob(index);
    }

    /// Resets every state variable to its default value.
    pub fn reset_state_vars(&mut self) {
        self.comment("set default state vars");
        let vars: Vec<(DeclId, VarDecl)> = self
            .ctx
            .contract()
            .non_constant_state_variables()
            .map(|(decl, var)| (decl, var.clone()))
            .collect();
        for (decl, var) in vars {
            self.push_default_value(&var.ty, false);
            self.set_state_var(decl);
        }
        self.comment("end set default state vars");
    }

    // --- calls ---

    /// Emits a true out-of-line call.
    pub fn push_call(&mut self, delta: i32, name: &str) {
        self.push(delta, Inst::Call(name.to_string()));
    }

    /// Calls a macro body through a boxed continuation, which the assembler
    /// may expand inline.
    pub fn push_macro_call_in_call_ref(&mut self, delta: i32, name: &str) {
        self.start_call_ref(0);
        self.push_call(delta, name);
        self.end_continuation(0);
    }

    /// Compiles a direct call to `callee`, choosing between a true call and
    /// an inlinable macro call by call-graph cycle detection: an edge that
    /// would close a cycle must stay a real call, anything else may be
    /// expanded inline.
    pub fn push_call_or_call_ref(&mut self, name: &str, callee: FuncId, delta: Option<i32>) {
        let delta = delta.unwrap_or_else(|| self.ctx.function(callee).call_stack_delta());

        if name.ends_with("_macro") || name == ":onCodeUpgrade" {
            self.push_macro_call_in_call_ref(delta, name);
            return;
        }

        let caller = self
            .ctx
            .current_function()
            .expect("compiling a call outside of a function");
        if self.ctx.add_edge_and_check_cycle(caller, callee) {
            self.push_call(delta, name);
        } else {
            self.push_macro_call_in_call_ref(delta, &format!("{name}_macro"));
        }
    }

    // --- assignment to named slots ---

    /// Stores the top of stack into the slot bound to `decl`, if it has one.
    pub fn try_assign_param(&mut self, decl: DeclId) -> bool {
        if !self.stack.is_bound(decl) {
            return false;
        }
        match self.stack.offset_of(decl) {
            0 => {} // already in place
            1 => self.push(-1, Inst::Pop(1)),
            idx => self.pop_s(idx as u32),
        }
        true
    }

    /// Registers function parameters: each one is already on the stack and
    /// gets bound to its declaration.
    pub fn push_parameters(&mut self, params: &[(DeclId, String)]) {
        for (decl, name) in params {
            self.comment(format!("param: {name}"));
            self.stack.bind(*decl, true);
        }
    }

    // --- builder bit helpers ---

    /// Appends `count` zero bits to the builder on top of the stack.
    pub fn stzeroes(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        if count == 1 {
            self.push(0, Inst::StSliceConst(BitString::from_binary("0")));
        } else {
            self.push_int(count);
            self.push(-1, Inst::StZeroes);
        }
    }

    /// Appends `count` one bits to the builder on top of the stack.
    pub fn stones(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        if count == 1 {
            self.push(0, Inst::StSliceConst(BitString::from_binary("1")));
        } else {
            self.push_int(count);
            self.push(-1, Inst::StOnes);
        }
    }

    /// Appends a constant bit string to the builder on top of the stack,
    /// using the immediate form when it fits.
    pub fn append_to_builder(&mut self, bits: &BitString) {
        if bits.is_empty() {
            return;
        }
        if bits.is_all_zeros() {
            self.stzeroes(bits.len());
        } else if bits.len() <= MAX_STSLICECONST_BITS {
            self.push(0, Inst::StSliceConst(bits.clone()));
        } else {
            self.push(1, Inst::PushSlice(bits.clone()));
            self.push(-1, Inst::StSliceR);
        }
    }

    /// Pushes a string literal: one slice when it fits a single
    /// `PUSHSLICE`, otherwise a reference cell chaining `.blob` chunks.
    pub fn push_string(&mut self, value: &str, to_slice: bool) {
        let bytes = value.as_bytes();
        if 8 * bytes.len() as u32 <= MAX_PUSH_SLICE_BITS && to_slice {
            let mut bits = BitString::new();
            for &b in bytes {
                bits.append_uint(&BigInt::from(b), 8);
            }
            self.push(1, Inst::PushSlice(bits));
            return;
        }

        let save_stack_size = self.stack.size();
        // One cell holds CELL_BITS / 8 whole bytes; a character never spans
        // two cells.
        let bytes_per_cell = (CELL_BITS / 8) as usize;
        if to_slice {
            self.code.open_block(BlockKind::PushRefSlice);
        } else {
            self.code.open_block(BlockKind::PushRef);
        }
        self.fix_stack(1);
        let mut opened_cells = 0;
        for (i, chunk) in bytes.chunks(bytes_per_cell).enumerate() {
            if i > 0 {
                self.start_cell();
            }
            opened_cells += 1;
            let mut bits = BitString::new();
            for &b in chunk {
                bits.append_uint(&BigInt::from(b), 8);
            }
            self.push(0, Inst::Directive(Directive::Blob(bits)));
        }
        for _ in 0..opened_cells {
            self.code.close_block();
        }
        self.stack.assert_size(save_stack_size + 1, "string literal push");
    }

    /// Dumps the cell on top of the stack to the debug log.
    pub fn push_log(&mut self) {
        self.push(0, Inst::Ctos);
        self.push(0, Inst::StrDump);
        self.drop(1);
    }

    // --- runtime guards and misc ---

    /// Traps at runtime if the optional on top of the stack is absent.
    pub fn check_optional_value(&mut self) {
        self.push(0, Inst::IsNull);
        self.push(-1, Inst::ThrowIf(exceptions::GET_OPTIONAL));
    }

    /// Replaces the cell on top of the stack with its data length in bytes.
    pub fn byte_length_of_cell(&mut self) {
        self.push_int(0xFFFF_FFFFu32 as i64);
        self.push(1, Inst::CDataSize);
        self.drop(1);
        self.drop_under(1, 1);
        self.push(0, Inst::RShift(Some(3)));
    }

    pub fn send_raw_msg(&mut self) {
        self.push(-2, Inst::SendRawMsg);
    }

    // --- function headers ---

    /// Emits the header of an out-of-line global function.
    pub fn generate_globl(&mut self, name: &str) {
        self.push(0, Inst::Directive(Directive::Globl(name.to_string())));
        self.push(0, Inst::Directive(Directive::FuncType(name.to_string())));
    }

    /// Emits the header of an internal entry point.
    pub fn generate_internal(&mut self, name: &str, id: i32) {
        self.push(
            0,
            Inst::Directive(Directive::InternalAlias { name: name.to_string(), id }),
        );
        self.push(0, Inst::Directive(Directive::Internal(name.to_string())));
    }

    /// Emits the header of an inlinable macro body.
    pub fn generate_macro(&mut self, name: &str) {
        self.push(0, Inst::Directive(Directive::Macro(name.to_string())));
    }

    // --- tail-of-log micro rewrites ---

    /// Removes the trailing `RET`, skipping location markers.
    ///
    /// # Panics
    /// Panics if the log does not end with one; callers know it does.
    pub fn poll_last_ret(&mut self) {
        let mut offset = 0;
        while matches!(
            self.code.inst_from_end(offset),
            Some(Inst::Directive(Directive::Loc { .. }))
        ) {
            offset += 1;
        }
        assert!(
            matches!(self.code.inst_from_end(offset), Some(Inst::Ret)),
            "expected a trailing RET"
        );
        self.code.remove_from_end(offset);
    }

    /// Cancels a trailing `ENDC; CTOS` pair, leaving the builder in place.
    pub fn try_poll_convert_builder_to_slice(&mut self) -> bool {
        if matches!(self.code.inst_from_end(0), Some(Inst::Ctos))
            && matches!(self.code.inst_from_end(1), Some(Inst::EndC))
        {
            self.code.pop_last();
            self.code.pop_last();
            return true;
        }
        false
    }

    /// Removes a trailing empty continuation, so the caller can emit a
    /// one-armed conditional instead of `IFELSE`.
    pub fn try_poll_empty_push_cont(&mut self) -> bool {
        if matches!(self.code.inst_from_end(0), Some(Inst::BlockClose))
            && matches!(
                self.code.inst_from_end(1),
                Some(Inst::BlockOpen(BlockKind::PushCont | BlockKind::PushRefCont))
            )
        {
            self.code.pop_last();
            self.code.pop_last();
            return true;
        }
        false
    }

    /// Swallows trailing boolean negations before a conditional and reports
    /// whether the branch sense must be reversed.
    pub fn optimize_if(&mut self) -> bool {
        let mut reverse = false;
        if matches!(self.code.inst_from_end(0), Some(Inst::Not)) {
            while matches!(self.code.inst_from_end(0), Some(Inst::Not)) {
                self.code.pop_last();
                reverse ^= true;
            }
        } else if matches!(self.code.inst_from_end(0), Some(Inst::EqInt(0))) {
            self.code.pop_last();
            reverse ^= true;
        } else if matches!(self.code.inst_from_end(0), Some(Inst::NeqInt(0))) {
            self.code.pop_last();
        }
        reverse
    }
}

#[cfg(test)]
mod tests;

//! Outbound message envelope construction.
//!
//! Headers have a fixed bit layout; fields that are not sourced from stack
//! values are zero-filled as constant bits, and runs of constant bits are
//! flushed into the builder in single instructions. Every path returns the
//! maximum header bit length so callers can bound-check against the cell
//! capacity before appending a body.

use super::Emitter;
use crate::bits::BitString;
use crate::consts::{DEFAULT_SEND_FLAG, EXT_INBOUND_SRC_BITS, MAX_ADDRESS_BITS};
use crate::inst::Inst;
use rustc_hash::{FxHashMap, FxHashSet};

/// Which message envelope to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MsgKind {
    Internal,
    ExternalIn,
    ExternalOut,
}

/// Field indices of the internal message header, in layout order.
pub mod int_msg {
    pub const IHR_DISABLED: usize = 0;
    pub const BOUNCE: usize = 1;
    pub const BOUNCED: usize = 2;
    pub const SRC: usize = 3;
    pub const DEST: usize = 4;
    pub const VALUE: usize = 5;
    pub const CURRENCY: usize = 6;
    pub const IHR_FEE: usize = 7;
    pub const FWD_FEE: usize = 8;
    pub const CREATED_LT: usize = 9;
    pub const CREATED_AT: usize = 10;
}

/// Field indices of the external message headers.
pub mod ext_msg {
    pub const SRC: usize = 0;
    pub const DEST: usize = 1;
}

/// Zero-fill widths of internal header fields, by [`int_msg`] index.
const INT_MSG_ZERO_WIDTHS: [u32; 11] = [1, 1, 1, 2, 2, 4, 1, 4, 4, 64, 32];

impl Emitter<'_> {
    /// Builds the `int_msg_info` header into a fresh builder. Stack-sourced
    /// field values must already lie on the stack in reverse layout order.
    /// Returns the maximum header bit length.
    pub fn int_msg_info(
        &mut self,
        on_stack: &FxHashSet<usize>,
        const_fields: &FxHashMap<usize, BitString>,
    ) -> u32 {
        // int_msg_info$0 ihr_disabled bounce bounced src dest value
        //                currency ihr_fee fwd_fee created_lt created_at
        let mut bits = BitString::from_binary("0");
        let mut max_bits = 0;
        self.push(1, Inst::NewC);
        for (field, &width) in INT_MSG_ZERO_WIDTHS.iter().enumerate() {
            assert!(
                !(const_fields.contains_key(&field) && on_stack.contains(&field)),
                "message field {field} is both constant and stack-sourced"
            );
            if let Some(constant) = const_fields.get(&field) {
                bits.append(constant);
            } else if !on_stack.contains(&field) {
                assert!(field != int_msg::DEST, "message destination must be on the stack");
                bits.push_zeros(width);
            } else {
                max_bits += bits.len();
                self.append_to_builder(&bits);
                bits = BitString::new();
                match field {
                    int_msg::BOUNCE => {
                        self.push(-1, Inst::StI(1));
                        max_bits += 1;
                    }
                    int_msg::DEST => {
                        self.push(-1, Inst::StSlice);
                        max_bits += MAX_ADDRESS_BITS;
                    }
                    int_msg::VALUE => {
                        self.exchange(0, 1);
                        self.push(-1, Inst::StGrams);
                        // A coin amount is at most 4 + 16 * 8 bits.
                        max_bits += 4 + 16 * 8;
                    }
                    int_msg::CURRENCY => {
                        self.push(-1, Inst::StDict);
                        max_bits += 1;
                    }
                    _ => panic!("message field {field} cannot be stack-sourced"),
                }
            }
        }
        max_bits += bits.len();
        self.append_to_builder(&bits);
        max_bits
    }

    /// Builds an `ext_in_msg_info` or `ext_out_msg_info` header into a fresh
    /// builder. Returns the maximum header bit length.
    pub fn ext_msg_info(&mut self, on_stack: &FxHashSet<usize>, is_out: bool) -> u32 {
        let mut widths = vec![2, 2];
        if is_out {
            widths.push(64);
            widths.push(32);
        } else {
            widths.push(4);
        }
        let mut bits = BitString::from_binary(if is_out { "11" } else { "10" });
        let mut max_bits = 0;
        self.push(1, Inst::NewC);
        for (field, &width) in widths.iter().enumerate() {
            if !on_stack.contains(&field) {
                bits.push_zeros(width);
            } else {
                max_bits += bits.len();
                self.append_to_builder(&bits);
                bits = BitString::new();
                match field {
                    ext_msg::SRC => {
                        self.push(-1, Inst::StB);
                        max_bits += EXT_INBOUND_SRC_BITS;
                    }
                    ext_msg::DEST => {
                        self.push(-1, Inst::StSlice);
                        max_bits += MAX_ADDRESS_BITS;
                    }
                    _ => panic!("message field {field} cannot be stack-sourced"),
                }
            }
        }
        max_bits += bits.len();
        self.append_to_builder(&bits);
        max_bits
    }

    /// Builds a whole message cell: header, state-init presence bit plus
    /// optional state-init section, body presence bit plus optional body
    /// section. The body callback receives the header bit length accumulated
    /// so far. Returns that length.
    pub fn prepare_msg<S, B>(
        &mut self,
        kind: MsgKind,
        on_stack: &FxHashSet<usize>,
        const_fields: &FxHashMap<usize, BitString>,
        state_init: Option<S>,
        body: Option<B>,
    ) -> u32
    where
        S: FnOnce(&mut Self),
        B: FnOnce(&mut Self, u32),
    {
        let mut msg_info_size = match kind {
            MsgKind::Internal => self.int_msg_info(on_stack, const_fields),
            MsgKind::ExternalOut => self.ext_msg_info(on_stack, true),
            MsgKind::ExternalIn => self.ext_msg_info(on_stack, false),
        };
        // stack: builder

        if let Some(append_state_init) = state_init {
            self.append_to_builder(&BitString::from_binary("1"));
            append_state_init(self);
            msg_info_size += 1;
        } else {
            self.append_to_builder(&BitString::from_binary("0"));
        }

        // Body presence bit.
        msg_info_size += 1;

        if let Some(append_body) = body {
            append_body(self, msg_info_size);
        } else {
            self.append_to_builder(&BitString::from_binary("0"));
        }

        self.push(0, Inst::EndC); // stack: cell
        msg_info_size
    }

    /// Builds a message cell and sends it with the given or default flag.
    pub fn send_msg<S, B, F>(
        &mut self,
        kind: MsgKind,
        on_stack: &FxHashSet<usize>,
        const_fields: &FxHashMap<usize, BitString>,
        state_init: Option<S>,
        body: Option<B>,
        send_flag: Option<F>,
    ) where
        S: FnOnce(&mut Self),
        B: FnOnce(&mut Self, u32),
        F: FnOnce(&mut Self),
    {
        self.prepare_msg(kind, on_stack, const_fields, state_init, body);
        if let Some(push_flag) = send_flag {
            push_flag(self);
        } else {
            self.push_int(DEFAULT_SEND_FLAG);
        }
        self.send_raw_msg();
    }
}

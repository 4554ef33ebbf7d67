//! Dictionary value codec.
//!
//! Decides, per key/value pair, whether the value lives inline in the same
//! cell or boxed in a referenced cell, and synthesizes the decode
//! continuations that reconstruct values after dictionary operations. The
//! emitter and this codec branch on the same [`ValueCategory`] sum, so the
//! two can never disagree about a category's layout.

use crate::consts::{CELL_BITS, DICT_KEY_INFO_MAX_BITS, MAX_ADDRESS_BITS};
use crate::emitter::Emitter;
use crate::inst::Inst;
use stele_sema::{Ty, ValueCategory};

/// In-flight representation of a value during dictionary operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Slice,
    Builder,
    Cell,
}

/// The four access shapes a dictionary decode compiles to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeShape {
    /// The value is known present.
    Value,
    /// The value, or the type's default when absent.
    ValueOrDefault,
    /// The value, or null when absent (success flag on top).
    ValueOrNull,
    /// Null, or the value (inverted flag sense).
    NullOrValue,
}

/// Bit length of a dictionary key of type `ty`.
///
/// Byte arrays and cells are hashed to 256-bit keys first; struct keys are
/// the concatenation of their field keys.
#[must_use]
pub fn dict_key_bits(ty: &Ty) -> u32 {
    match ty.category() {
        ValueCategory::Integer
        | ValueCategory::Bool
        | ValueCategory::Enum
        | ValueCategory::FixedBytes
        | ValueCategory::FixedPoint => ty.bit_width().unwrap(),
        ValueCategory::Address => MAX_ADDRESS_BITS,
        ValueCategory::ByteArray | ValueCategory::Cell => 256,
        ValueCategory::Struct => {
            let Ty::Struct(def) = ty else { unreachable!() };
            def.fields.iter().map(|f| dict_key_bits(&f.ty)).sum()
        }
        ValueCategory::Array
        | ValueCategory::Mapping
        | ValueCategory::Optional
        | ValueCategory::Tuple
        | ValueCategory::VarInt
        | ValueCategory::Function
        | ValueCategory::Slice
        | ValueCategory::Builder => panic!("{ty} cannot be a dictionary key"),
    }
}

/// Worst-case bit length of a dictionary value of type `ty` when stored
/// inline. Always-boxed categories contribute zero data bits; optionals and
/// mappings contribute their single presence/edge bit.
#[must_use]
pub fn max_dict_value_bits(ty: &Ty) -> u32 {
    match ty.category() {
        ValueCategory::Enum
        | ValueCategory::Integer
        | ValueCategory::Bool
        | ValueCategory::FixedBytes
        | ValueCategory::FixedPoint => ty.bit_width().unwrap(),
        ValueCategory::Address => MAX_ADDRESS_BITS,
        ValueCategory::ByteArray => 0,
        ValueCategory::Array => 32 + 1,
        ValueCategory::Mapping | ValueCategory::Optional => 1,
        ValueCategory::VarInt => {
            let Ty::VarInt(n) = ty else { unreachable!() };
            ceil_log2(*n) + 8 * n
        }
        ValueCategory::Cell => 0,
        ValueCategory::Struct => {
            let Ty::Struct(def) = ty else { unreachable!() };
            def.fields.iter().map(|f| max_dict_value_bits(&f.ty)).sum()
        }
        ValueCategory::Function => 32,
        ValueCategory::Slice | ValueCategory::Tuple | ValueCategory::Builder => {
            panic!("{ty} is not a dictionary value")
        }
    }
}

/// Whether a key/value pair fits inline in one cell:
/// label overhead + key bits + worst-case value bits must stay under the
/// cell capacity.
#[must_use]
pub fn fits_in_one_cell(key: &Ty, value: &Ty) -> bool {
    DICT_KEY_INFO_MAX_BITS + dict_key_bits(key) + max_dict_value_bits(value) < CELL_BITS
}

/// Whether the dictionary stores this value behind a reference.
#[must_use]
pub fn stores_value_in_ref(key: &Ty, value: &Ty) -> bool {
    match value.category() {
        ValueCategory::Cell | ValueCategory::ByteArray => true,
        ValueCategory::Slice => false,
        ValueCategory::Address
        | ValueCategory::Bool
        | ValueCategory::Enum
        | ValueCategory::FixedBytes
        | ValueCategory::FixedPoint
        | ValueCategory::Integer
        | ValueCategory::Array
        | ValueCategory::Mapping
        | ValueCategory::Optional
        | ValueCategory::VarInt
        | ValueCategory::Struct
        | ValueCategory::Function => !fits_in_one_cell(key, value),
        ValueCategory::Tuple | ValueCategory::Builder => {
            panic!("{value} is not a dictionary value")
        }
    }
}

fn ceil_log2(n: u32) -> u32 {
    assert!(n > 1, "length prefix of a one-byte varint");
    32 - (n - 1).leading_zeros()
}

impl Emitter<'_> {
    /// Normalizes the value on top of the stack into the representation the
    /// dictionary store instruction expects, boxing it when it does not fit
    /// inline. Returns the representation produced.
    pub fn prepare_value_for_dict(
        &mut self,
        key: &Ty,
        value: &Ty,
        is_value_builder: bool,
    ) -> DataType {
        match value.category() {
            ValueCategory::Slice => {
                if is_value_builder { DataType::Builder } else { DataType::Slice }
            }
            ValueCategory::Address => {
                if !fits_in_one_cell(key, value) {
                    assert!(!is_value_builder, "address value is never pre-built");
                    self.push(1, Inst::NewC);
                    self.push(-1, Inst::StSlice);
                    self.push(0, Inst::EndC);
                    DataType::Cell
                } else if is_value_builder {
                    DataType::Builder
                } else {
                    DataType::Slice
                }
            }
            ValueCategory::ByteArray => {
                if is_value_builder {
                    self.push(0, Inst::EndC);
                }
                DataType::Cell
            }
            ValueCategory::Bool
            | ValueCategory::Enum
            | ValueCategory::FixedBytes
            | ValueCategory::FixedPoint
            | ValueCategory::Integer
            | ValueCategory::Mapping
            | ValueCategory::Optional
            | ValueCategory::VarInt
            | ValueCategory::Function
            | ValueCategory::Array => {
                if !is_value_builder {
                    self.push(1, Inst::NewC);
                    self.store(value, false);
                }
                if !fits_in_one_cell(key, value) {
                    self.push(1, Inst::NewC);
                    self.push(-1, Inst::StBRef);
                }
                DataType::Builder
            }
            ValueCategory::Struct => {
                let Ty::Struct(def) = value else { unreachable!() };
                if !is_value_builder {
                    self.tuple_to_builder(&def.fields);
                }
                if !fits_in_one_cell(key, value) {
                    self.push(0, Inst::EndC);
                    DataType::Cell
                } else {
                    DataType::Builder
                }
            }
            ValueCategory::Cell => {
                if is_value_builder {
                    self.push(0, Inst::EndC);
                }
                DataType::Cell
            }
            ValueCategory::Tuple | ValueCategory::Builder => {
                panic!("{value} is not a dictionary value")
            }
        }
    }

    /// Normalizes the key on top of the stack: byte-array and cell keys hash
    /// to 256-bit integers, struct keys serialize to a slice.
    pub fn prepare_key_for_dict(&mut self, key: &Ty, ignore_bytes: bool) {
        match key.category() {
            ValueCategory::ByteArray | ValueCategory::Cell => {
                if !ignore_bytes {
                    self.push(0, Inst::HashCU);
                }
            }
            ValueCategory::Struct => {
                let Ty::Struct(def) = key else { unreachable!() };
                self.tuple_to_builder(&def.fields);
                self.push(0, Inst::EndC);
                self.push(0, Inst::Ctos);
            }
            _ => {}
        }
    }

    /// Reconstructs the value (and key, for iteration-style operations)
    /// after a dictionary instruction, compiling one of the four access
    /// shapes. Branches are stack-balanced; both arms are emitted with the
    /// same declared deltas and checked by the model.
    ///
    /// `did_use_opcode_with_ref` marks operations whose `…REF` form already
    /// unboxed the value cell; `save_orig_key_and_no_tuple` keeps the raw
    /// key slice for iteration and skips the pair-tuple packaging.
    pub fn recover_value_after_dict_op(
        &mut self,
        key: &Ty,
        value: &Ty,
        have_key: bool,
        did_use_opcode_with_ref: bool,
        shape: DecodeShape,
        save_orig_key_and_no_tuple: bool,
    ) {
        let is_value_struct = value.category() == ValueCategory::Struct;
        let push_ref_cont =
            is_value_struct && !did_use_opcode_with_ref && !stores_value_in_ref(key, value);

        match shape {
            DecodeShape::Value => {
                if push_ref_cont {
                    self.start_call_ref(0);
                }
                self.preload_dict_value(
                    key,
                    value,
                    have_key,
                    did_use_opcode_with_ref,
                    save_orig_key_and_no_tuple,
                );
                if push_ref_cont {
                    self.end_continuation(0);
                }
            }
            DecodeShape::ValueOrDefault => {
                if push_ref_cont {
                    self.start_continuation_from_ref();
                } else {
                    self.start_continuation(0);
                }
                self.preload_dict_value(
                    key,
                    value,
                    have_key,
                    did_use_opcode_with_ref,
                    save_orig_key_and_no_tuple,
                );
                self.end_continuation(0);

                let has_empty_push_cont = self.try_poll_empty_push_cont();
                if push_ref_cont {
                    self.start_continuation_from_ref();
                } else {
                    self.start_continuation(0);
                }
                self.push_default_value(value, false);
                self.end_continuation(-1);

                if has_empty_push_cont {
                    self.push(0, Inst::IfNot);
                } else {
                    self.push(0, Inst::IfElse);
                }
            }
            DecodeShape::ValueOrNull => {
                if !save_orig_key_and_no_tuple {
                    self.push(0, Inst::NullSwapIfNot);
                }

                if is_value_struct {
                    self.start_continuation_from_ref();
                } else {
                    self.start_continuation(0);
                }
                self.preload_dict_value(
                    key,
                    value,
                    have_key,
                    did_use_opcode_with_ref,
                    save_orig_key_and_no_tuple,
                );
                if have_key {
                    if !save_orig_key_and_no_tuple {
                        self.tuple(2);
                    }
                } else {
                    self.wrap_nullable_payload(value);
                }
                self.end_continuation(0);

                if save_orig_key_and_no_tuple {
                    self.start_continuation(0);
                    self.push(0, Inst::Null);
                    self.push(0, Inst::Null);
                    self.push(0, Inst::Null);
                    self.end_continuation(0);
                    self.push(0, Inst::IfElse);
                } else {
                    self.push(0, Inst::If);
                }
            }
            DecodeShape::NullOrValue => {
                self.push(0, Inst::NullSwapIf);

                self.start_continuation(0);
                self.preload_dict_value(
                    key,
                    value,
                    have_key,
                    did_use_opcode_with_ref,
                    save_orig_key_and_no_tuple,
                );
                self.wrap_nullable_payload(value);
                self.end_continuation(0);

                self.push(0, Inst::IfNot);
            }
        }
    }

    /// The decode body shared by every shape: unbox where the layout says
    /// so, then `preload` the typed value. With `have_key`, the key slice is
    /// decoded and rotated under the value first.
    fn preload_dict_value(
        &mut self,
        key: &Ty,
        value: &Ty,
        have_key: bool,
        did_use_opcode_with_ref: bool,
        save_orig_key_and_no_tuple: bool,
    ) {
        // stack: value [key]
        if have_key {
            if save_orig_key_and_no_tuple {
                self.push_s(0); // value key key
            }
            if let Ty::Struct(def) = key {
                self.convert_slice_to_tuple(&def.fields);
            }
            if save_orig_key_and_no_tuple {
                self.push(0, Inst::Rot);
            } else {
                self.exchange(0, 1);
            }
        }
        // stack: [key…] value

        let in_ref = stores_value_in_ref(key, value);
        match value.category() {
            ValueCategory::Address | ValueCategory::Slice => {
                if did_use_opcode_with_ref {
                    self.push(0, Inst::Ctos);
                } else if in_ref {
                    self.push(0, Inst::PldRef);
                    self.push(0, Inst::Ctos);
                }
            }
            ValueCategory::ByteArray => {
                if !did_use_opcode_with_ref {
                    self.push(0, Inst::PldRef);
                }
            }
            ValueCategory::Array
            | ValueCategory::Bool
            | ValueCategory::Enum
            | ValueCategory::FixedBytes
            | ValueCategory::FixedPoint
            | ValueCategory::Integer
            | ValueCategory::Mapping
            | ValueCategory::Optional
            | ValueCategory::Struct
            | ValueCategory::VarInt
            | ValueCategory::Function => {
                let mut push_call_ref = false;
                if did_use_opcode_with_ref {
                    self.push(0, Inst::Ctos);
                    push_call_ref = true;
                } else if in_ref {
                    self.push(0, Inst::PldRef);
                    self.push(0, Inst::Ctos);
                    push_call_ref = true;
                }
                push_call_ref &= value.category() == ValueCategory::Struct;
                if push_call_ref {
                    self.start_call_ref(0);
                }
                self.preload(value);
                if push_call_ref {
                    self.end_continuation(0);
                }
            }
            ValueCategory::Cell => {
                if !did_use_opcode_with_ref {
                    self.push(0, Inst::PldRef);
                }
            }
            ValueCategory::Tuple | ValueCategory::Builder => {
                panic!("{value} is not a dictionary value")
            }
        }
    }

    /// Nullable dictionary payloads of nullable types get the extra
    /// single-element tuple wrapper.
    fn wrap_nullable_payload(&mut self, value: &Ty) {
        if matches!(value.category(), ValueCategory::Mapping | ValueCategory::Optional) {
            self.tuple(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stele_sema::{FieldDef, StructDef};

    fn struct_ty(fields: &[Ty]) -> Ty {
        Ty::Struct(Arc::new(StructDef {
            name: "S".into(),
            fields: fields
                .iter()
                .map(|ty| FieldDef { name: String::new(), ty: ty.clone() })
                .collect(),
        }))
    }

    #[test]
    fn test_key_bits() {
        assert_eq!(dict_key_bits(&Ty::uint(64)), 64);
        assert_eq!(dict_key_bits(&Ty::Address), MAX_ADDRESS_BITS);
        assert_eq!(dict_key_bits(&Ty::Bytes), 256);
        assert_eq!(dict_key_bits(&struct_ty(&[Ty::uint(32), Ty::Bool])), 33);
    }

    #[test]
    fn test_value_bits() {
        assert_eq!(max_dict_value_bits(&Ty::uint(256)), 256);
        assert_eq!(max_dict_value_bits(&Ty::Bytes), 0);
        assert_eq!(max_dict_value_bits(&Ty::Cell), 0);
        assert_eq!(max_dict_value_bits(&Ty::Array(Box::new(Ty::uint(8)))), 33);
        assert_eq!(max_dict_value_bits(&Ty::Optional(Box::new(Ty::uint(256)))), 1);
        // VarUInteger 16: 4-bit length prefix + up to 16 bytes.
        assert_eq!(max_dict_value_bits(&Ty::VarInt(16)), 4 + 128);
    }

    #[test]
    fn test_inline_boundary_matches_inequality() {
        // The decision must agree with the capacity inequality exactly, for
        // every width on both sides of the boundary.
        let key = Ty::uint(64);
        for value_bits in 1..=257 {
            let value =
                struct_ty(&[Ty::uint(value_bits), Ty::uint(257), Ty::uint(257), Ty::uint(257)]);
            let expected =
                DICT_KEY_INFO_MAX_BITS + 64 + (value_bits + 3 * 257) < CELL_BITS;
            assert_eq!(fits_in_one_cell(&key, &value), expected, "value bits {value_bits}");
            assert_eq!(stores_value_in_ref(&key, &value), !expected);
        }
        // Both sides of the boundary are exercised.
        assert!(fits_in_one_cell(&key, &struct_ty(&[Ty::uint(1), Ty::uint(257), Ty::uint(257), Ty::uint(257)])));
        assert!(!fits_in_one_cell(&key, &struct_ty(&[Ty::uint(257), Ty::uint(257), Ty::uint(257), Ty::uint(257)])));
    }

    #[test]
    fn test_always_boxed_categories() {
        let key = Ty::uint(8);
        assert!(stores_value_in_ref(&key, &Ty::Cell));
        assert!(stores_value_in_ref(&key, &Ty::Bytes));
        assert!(stores_value_in_ref(&key, &Ty::Str));
        assert!(!stores_value_in_ref(&key, &Ty::Slice));
        assert!(!stores_value_in_ref(&key, &Ty::uint(256)));
    }
}

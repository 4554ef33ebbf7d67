//! Typed encode/decode between stack values and cell builders/slices.
//!
//! Dispatch is exhaustive over [`ValueCategory`]; every path leaves the stack
//! exactly as declared, checked by bracketing size assertions.

use super::Emitter;
use crate::bits::BitString;
use crate::consts::DEFAULT_FUNCTION_ID;
use crate::inst::{BlockKind, Inst};
use stele_sema::{FieldDef, Ty, ValueCategory};

impl Emitter<'_> {
    /// Loads a value of type `ty` from the slice on top of the stack.
    ///
    /// Returns true when the raw instruction order is `value slice` (slice on
    /// top); [`Self::load`] normalizes the order for callers.
    pub fn fast_load(&mut self, ty: &Ty) -> bool {
        match ty.category() {
            ValueCategory::Optional => {
                let save_stack_size = self.stack.size();
                let Ty::Optional(inner) = ty else { unreachable!() };

                self.push(1, Inst::LdOptRef); // value slice
                self.exchange(0, 1); // slice value
                self.push_s(0); // slice value value
                self.push(0, Inst::IsNull); // slice value isNull
                self.fix_stack(-1);

                self.start_continuation(0);
                // slice value
                self.push(0, Inst::Ctos); // slice sliceValue
                self.preload(inner); // slice value
                if wrap_in_tuple(inner) {
                    self.tuple(1);
                }
                self.end_continuation(0);

                self.push(0, Inst::IfNot);

                self.stack.assert_size(save_stack_size + 1, "optional load");
                false
            }
            ValueCategory::Cell => {
                self.push(1, Inst::LdRef);
                true
            }
            ValueCategory::Struct => {
                panic!("load is not supported for {ty}; structs decode via preload")
            }
            ValueCategory::Address => {
                self.push(1, Inst::LdMsgAddr);
                true
            }
            ValueCategory::Integer
            | ValueCategory::Enum
            | ValueCategory::Bool
            | ValueCategory::FixedPoint
            | ValueCategory::FixedBytes => {
                let bits = ty.bit_width().unwrap();
                let inst = if ty.is_signed() { Inst::LdI(bits) } else { Inst::LdU(bits) };
                self.push(1, inst);
                true
            }
            ValueCategory::Function => {
                self.push(1, Inst::LdU(32));
                true
            }
            ValueCategory::ByteArray => {
                self.push(1, Inst::LdRef);
                true
            }
            ValueCategory::Array => {
                self.push(1, Inst::LdU(32));
                self.push(1, Inst::LdDict);
                self.push(0, Inst::RotRev);
                self.push(-1, Inst::Pair);
                false
            }
            ValueCategory::Mapping => {
                self.push(1, Inst::LdDict);
                true
            }
            ValueCategory::VarInt
            | ValueCategory::Tuple
            | ValueCategory::Slice
            | ValueCategory::Builder => panic!("load is not supported for {ty}"),
        }
    }

    /// Loads a value of type `ty` from the slice on top of the stack,
    /// leaving `value slice` (or `slice value` with `reverse_order`).
    pub fn load(&mut self, ty: &Ty, reverse_order: bool) {
        let direct_order = self.fast_load(ty);
        if direct_order == reverse_order {
            self.exchange(0, 1);
        }
    }

    /// Decodes a value of type `ty` from the slice on top of the stack,
    /// consuming the slice.
    pub fn preload(&mut self, ty: &Ty) {
        let stack_size = self.stack.size();
        match ty.category() {
            ValueCategory::Optional => {
                let Ty::Optional(inner) = ty else { unreachable!() };

                self.push_s(0);
                self.push(0, Inst::PldI(1)); // slice hasValue
                self.fix_stack(-1);

                // have value
                let saved = self.stack.size();
                self.start_continuation(0);
                self.push(0, Inst::PldRef);
                self.push(0, Inst::Ctos);
                self.preload(inner);
                if wrap_in_tuple(inner) {
                    self.tuple(1);
                }
                self.end_continuation(0);
                self.stack.assert_size(saved, "optional preload, present branch");

                // no value
                let saved = self.stack.size();
                self.start_continuation(0);
                self.drop(1);
                self.push(1, Inst::Null);
                self.end_continuation(0);
                self.stack.assert_size(saved, "optional preload, absent branch");

                self.push(0, Inst::IfElse);
            }
            ValueCategory::Address => {
                self.push(1, Inst::LdMsgAddr);
                self.drop(1);
            }
            ValueCategory::Cell => {
                self.push(0, Inst::PldRef);
            }
            ValueCategory::Struct => {
                let Ty::Struct(def) = ty else { unreachable!() };
                self.convert_slice_to_tuple(&def.fields);
            }
            ValueCategory::Integer
            | ValueCategory::Enum
            | ValueCategory::Bool
            | ValueCategory::FixedPoint
            | ValueCategory::FixedBytes => {
                let bits = ty.bit_width().unwrap();
                let inst = if ty.is_signed() { Inst::PldI(bits) } else { Inst::PldU(bits) };
                self.push(0, inst);
            }
            ValueCategory::Function => {
                self.push(0, Inst::PldU(32));
            }
            ValueCategory::ByteArray => {
                self.push(0, Inst::PldRef);
            }
            ValueCategory::Array => {
                self.push(1, Inst::LdU(32));
                self.push(0, Inst::PldDict);
                self.push(-1, Inst::Pair);
            }
            ValueCategory::Mapping => {
                self.push(0, Inst::PldDict);
            }
            ValueCategory::VarInt => {
                self.push(1, Inst::LdVarUint32);
                self.push(-1, Inst::Pop(0));
            }
            ValueCategory::Tuple => {
                let Ty::Tuple(tys) = ty else { unreachable!() };
                let fields: Vec<FieldDef> = tys
                    .iter()
                    .map(|ty| FieldDef { name: String::new(), ty: ty.clone() })
                    .collect();
                self.convert_slice_to_tuple(&fields);
            }
            ValueCategory::Slice | ValueCategory::Builder => {
                panic!("decode is not supported for {ty}")
            }
        }
        self.stack.assert_size(stack_size, "preload");
    }

    /// Encodes the value into the builder next to it on the stack.
    ///
    /// Stack order is `value builder` (builder on top) for `reverse = false`
    /// and `builder value` for `reverse = true`; either way one value is
    /// consumed and the builder stays.
    pub fn store(&mut self, ty: &Ty, reverse: bool) {
        let stack_size = self.stack.size();
        match ty.category() {
            ValueCategory::Optional => {
                let Ty::Optional(inner) = ty else { unreachable!() };

                if !reverse {
                    self.exchange(0, 1); // builder value
                }
                self.push_s(0); // builder value value
                self.push(0, Inst::IsNull); // builder value isnull
                self.push(0, Inst::Not); // builder value !isnull

                self.fix_stack(-1);
                self.stack.assert_size(stack_size, "optional store");

                self.start_continuation(0);
                // builder value
                if wrap_in_tuple(inner) {
                    self.untuple(1);
                }
                if let Ty::Struct(def) = inner.as_ref() {
                    self.tuple_to_builder(&def.fields); // builder builderWithValue
                } else {
                    self.push(1, Inst::NewC); // builder value builder
                    self.store(inner, false); // builder builderWithValue
                }
                self.exchange(0, 1); // builderWithValue builder
                self.stones(1);
                self.push(-1, Inst::StBRef); // builder
                self.end_continuation(0);
                self.fix_stack(1);
                self.stack.assert_size(stack_size, "optional store, present branch");

                self.start_continuation(0);
                // builder value
                self.drop(1); // builder
                self.stzeroes(1);
                self.end_continuation(0);
                self.fix_stack(1);

                self.push(0, Inst::IfElse);
                self.fix_stack(-1);
            }
            ValueCategory::Cell => {
                self.push(-1, if reverse { Inst::StRefR } else { Inst::StRef });
            }
            ValueCategory::Struct => {
                let Ty::Struct(def) = ty else { unreachable!() };
                if !reverse {
                    self.push(0, Inst::SWAP);
                }
                let count = def.fields.len() as u32;
                self.untuple(count);
                self.reverse(count, 0);
                self.block_swap(1, count);
                for field in &def.fields {
                    self.store(&field.ty, false);
                }
            }
            ValueCategory::Address | ValueCategory::Slice => {
                self.push(-1, if reverse { Inst::StSliceR } else { Inst::StSlice });
            }
            ValueCategory::Integer
            | ValueCategory::Enum
            | ValueCategory::Bool
            | ValueCategory::FixedBytes
            | ValueCategory::FixedPoint => {
                let inst = store_integral(ty, reverse);
                self.push(-1, inst);
            }
            ValueCategory::Function => {
                self.push(-1, if reverse { Inst::StUR(32) } else { Inst::StU(32) });
            }
            ValueCategory::Mapping => {
                if reverse {
                    self.push(0, Inst::SWAP); // builder dict -> dict builder
                }
                self.push(-1, Inst::StDict);
            }
            ValueCategory::ByteArray => {
                self.push(-1, if reverse { Inst::StRefR } else { Inst::StRef });
            }
            ValueCategory::Array => {
                if !reverse {
                    self.push(0, Inst::SWAP); // builder arr
                }
                self.push(1, Inst::Unpair); // builder size dict
                self.push(0, Inst::RotRev); // dict builder size
                self.push(-1, Inst::StUR(32)); // dict builder'
                self.push(-1, Inst::StDict); // builder''
            }
            ValueCategory::Builder => {
                self.push(-1, if reverse { Inst::StBR } else { Inst::StB });
            }
            ValueCategory::Tuple => {
                if !reverse {
                    self.exchange(0, 1); // builder value
                }
                let Ty::Tuple(tys) = ty else { unreachable!() };
                let fields: Vec<FieldDef> = tys
                    .iter()
                    .map(|ty| FieldDef { name: String::new(), ty: ty.clone() })
                    .collect();
                self.tuple_to_builder(&fields);
                self.push(-1, Inst::StBR);
            }
            ValueCategory::VarInt => {
                if !reverse {
                    self.exchange(0, 1); // builder value
                }
                self.push(-1, Inst::StVarUint32);
            }
        }
        self.stack.assert_size(stack_size - 1, "store");
    }

    /// Decodes a struct stored field-by-field: `slice` becomes a tuple of
    /// field values in declaration order.
    pub fn convert_slice_to_tuple(&mut self, fields: &[FieldDef]) {
        let stack_size = self.stack.size();
        let count = fields.len() as u32;
        if fields.is_empty() {
            self.drop(1);
            self.tuple(0);
            self.stack.assert_size(stack_size, "empty struct decode");
            return;
        }
        for (i, field) in fields.iter().enumerate() {
            if i + 1 == fields.len() {
                self.preload(&field.ty);
            } else if let Ty::Struct(def) = &field.ty {
                self.load_nested_struct(&def.fields);
            } else {
                self.load(&field.ty, false);
            }
        }
        self.tuple(count);
        self.stack.assert_size(stack_size, "struct decode");
    }

    /// Decodes a struct stored flat in the middle of an enclosing slice,
    /// leaving `tuple slice` with the slice back on top.
    fn load_nested_struct(&mut self, fields: &[FieldDef]) {
        for field in fields {
            if let Ty::Struct(def) = &field.ty {
                self.load_nested_struct(&def.fields);
            } else {
                self.load(&field.ty, false);
            }
        }
        let count = fields.len() as u32;
        // fields… slice -> fields… under the slice -> tuple slice
        self.block_swap(count, 1);
        self.tuple(count);
        self.exchange(0, 1);
    }

    /// Encodes a tuple of field values into a fresh builder: `tuple` becomes
    /// `builder`, fields stored in declaration order.
    pub fn tuple_to_builder(&mut self, fields: &[FieldDef]) {
        let stack_size = self.stack.size();
        let count = fields.len() as u32;
        self.untuple(count);
        if count >= 2 {
            self.reverse(count, 0);
        }
        self.push(1, Inst::NewC);
        for field in fields {
            self.store(&field.ty, false);
        }
        self.stack.assert_size(stack_size, "struct encode");
    }

    /// Emits the runtime range check for a numeric target type.
    pub fn check_fit(&mut self, ty: &Ty) {
        match ty.category() {
            ValueCategory::Integer | ValueCategory::FixedPoint => {
                let bits = ty.bit_width().unwrap();
                let inst = if ty.is_signed() { Inst::Fits(bits) } else { Inst::UFits(bits) };
                self.push(0, inst);
            }
            _ => panic!("no range check for {ty}"),
        }
    }

    /// Range-checks an arithmetic result unless overflow checking is
    /// disabled by configuration. Narrowing conversions never go through
    /// here; their check is unconditional.
    pub fn check_arith_overflow(&mut self, ty: &Ty) {
        if !self.ctx().ignore_integer_overflow() {
            self.check_fit(ty);
        }
    }

    /// Pushes the canonical zero value of `ty`, either as a plain value or
    /// pre-encoded into a fresh builder.
    pub fn push_default_value(&mut self, ty: &Ty, as_builder: bool) {
        match ty.category() {
            ValueCategory::Address => {
                self.push_zero_address();
                if as_builder {
                    self.push(1, Inst::NewC);
                    self.push(-1, Inst::StSlice);
                }
            }
            ValueCategory::Bool
            | ValueCategory::FixedBytes
            | ValueCategory::Integer
            | ValueCategory::Enum
            | ValueCategory::VarInt => {
                self.push_int(0);
                if as_builder {
                    self.push(1, Inst::NewC);
                    if ty.category() == ValueCategory::VarInt {
                        self.exchange(0, 1);
                        self.push(-1, Inst::StVarUint32);
                    } else {
                        let inst = store_integral(ty, false);
                        self.push(-1, inst);
                    }
                }
            }
            ValueCategory::Cell | ValueCategory::ByteArray => {
                if as_builder {
                    self.push(1, Inst::NewC);
                } else {
                    self.code.open_block(BlockKind::PushRef);
                    self.fix_stack(1);
                    self.code.close_block();
                }
            }
            ValueCategory::Array => {
                if as_builder {
                    self.push(1, Inst::NewC);
                    self.push_int(33);
                    self.push(-1, Inst::StZeroes);
                } else {
                    self.push_int(0);
                    self.push(1, Inst::NewDict);
                    self.push(-1, Inst::Pair);
                }
            }
            ValueCategory::Mapping => {
                if as_builder {
                    self.push(1, Inst::NewC);
                    self.stzeroes(1);
                } else {
                    self.push(1, Inst::NewDict);
                }
            }
            ValueCategory::Struct => {
                let Ty::Struct(def) = ty else { unreachable!() };
                self.create_default_struct(&def.fields, as_builder);
            }
            ValueCategory::Slice => {
                if as_builder {
                    self.push(1, Inst::NewC);
                } else {
                    self.push(1, Inst::PushSlice(BitString::new()));
                }
            }
            ValueCategory::Builder => {
                self.push(1, Inst::NewC);
            }
            ValueCategory::Function => {
                assert!(!as_builder, "unimplemented: default function value as builder");
                self.push_int(DEFAULT_FUNCTION_ID);
            }
            ValueCategory::Optional => {
                self.push(1, Inst::Null);
            }
            ValueCategory::FixedPoint => {
                self.push_int(0);
            }
            ValueCategory::Tuple => panic!("no default value for {ty}"),
        }
    }

    /// Pushes a default-initialized struct, as a tuple or as a builder with
    /// every field's default already stored.
    pub fn create_default_struct(&mut self, fields: &[FieldDef], as_builder: bool) {
        if as_builder {
            self.push(1, Inst::NewC);
            for field in fields {
                self.push_default_value(&field.ty, false);
                self.store(&field.ty, true);
            }
        } else {
            for field in fields {
                self.push_default_value(&field.ty, false);
            }
            self.tuple(fields.len() as u32);
        }
    }
}

/// True for payload types that get an extra single-element tuple wrapper when
/// nested inside an optional, so a null payload stays distinguishable from an
/// absent optional.
pub(crate) fn wrap_in_tuple(ty: &Ty) -> bool {
    matches!(ty.category(), ValueCategory::Mapping | ValueCategory::Optional)
}

/// The integral store instruction for a numeric type.
fn store_integral(ty: &Ty, reverse: bool) -> Inst {
    let bits = ty.bit_width().unwrap_or_else(|| panic!("{ty} has no integral width"));
    match (ty.is_signed(), reverse) {
        (true, false) => Inst::StI(bits),
        (true, true) => Inst::StIR(bits),
        (false, false) => Inst::StU(bits),
        (false, true) => Inst::StUR(bits),
    }
}

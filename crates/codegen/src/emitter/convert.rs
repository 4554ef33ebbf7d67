//! Representation coercion for assignments and implicit conversions.

use super::Emitter;
use super::encode::wrap_in_tuple;
use crate::inst::Inst;
use num_bigint::BigInt;
use num_traits::{One, Zero};
use stele_sema::{FixedPointTy, IntTy, Ty, ValueCategory};

fn pow10(power: u32) -> BigInt {
    let mut r = BigInt::one();
    for _ in 0..power {
        r *= 10;
    }
    r
}

impl Emitter<'_> {
    /// Coerces the value on top of the stack from type `right` to type
    /// `left`: rescales fixed-point values by powers of ten, resizes
    /// fixed-size byte sequences by shifts, folds string literals into
    /// integers, and emits the runtime range check whenever `right` is not
    /// statically a subtype of `left`. That check is a correctness property,
    /// not an optimization: narrowing without it would silently truncate.
    pub fn hard_convert(&mut self, left: &Ty, right: &Ty) {
        // opt(T) = T: convert the payload, then re-wrap where needed.
        if let Ty::Optional(inner) = left
            && left != right
        {
            self.hard_convert(inner, right);
            if wrap_in_tuple(inner) {
                self.tuple(1);
            }
            return;
        }

        let implicit = right.is_implicitly_convertible_to(left);

        match right.category() {
            ValueCategory::FixedPoint => {
                let Ty::FixedPoint(r) = right else { unreachable!() };
                self.from_fixed_point(left, *r, implicit);
            }
            ValueCategory::Integer => {
                let Ty::Int(r) = right else { unreachable!() };
                self.from_integer(left, *r, implicit);
            }
            ValueCategory::FixedBytes => {
                let Ty::FixedBytes(r_bytes) = right else { unreachable!() };
                match left {
                    Ty::FixedBytes(l_bytes) => {
                        self.fixed_bytes_from_fixed_bytes(*l_bytes, *r_bytes);
                    }
                    _ => panic!("no conversion from {right} to {left}"),
                }
            }
            ValueCategory::ByteArray => match (left, right) {
                (Ty::FixedBytes(l_bytes), Ty::StringLiteral(value)) => {
                    self.fixed_bytes_from_string_literal(*l_bytes, value.clone());
                }
                (Ty::Bytes | Ty::Str, _) => {}
                _ => panic!("no conversion from {right} to {left}"),
            },
            // Same-representation categories need no instruction.
            ValueCategory::Address
            | ValueCategory::Array
            | ValueCategory::Bool
            | ValueCategory::Builder
            | ValueCategory::Cell
            | ValueCategory::Enum
            | ValueCategory::Function
            | ValueCategory::Mapping
            | ValueCategory::Optional
            | ValueCategory::Slice
            | ValueCategory::Struct
            | ValueCategory::Tuple
            | ValueCategory::VarInt => {}
        }
    }

    fn from_fixed_point(&mut self, left: &Ty, r: FixedPointTy, implicit: bool) {
        match left {
            Ty::FixedPoint(l) => {
                let power_diff = l.fractional_digits as i64 - r.fractional_digits as i64;
                if power_diff > 0 {
                    self.push_int(pow10(power_diff as u32));
                    self.push(-1, Inst::Mul);
                } else if power_diff < 0 {
                    self.push_int(pow10(-power_diff as u32));
                    self.push(-1, Inst::Div);
                }
                if !implicit {
                    self.check_fit(left);
                }
            }
            Ty::Int(_) => {
                if r.fractional_digits > 0 {
                    self.push_int(pow10(r.fractional_digits));
                    self.push(-1, Inst::Div);
                }
                if !implicit {
                    self.check_fit(left);
                }
            }
            _ => panic!("no conversion from fixed point to {left}"),
        }
    }

    fn from_integer(&mut self, left: &Ty, _r: IntTy, implicit: bool) {
        match left {
            Ty::FixedPoint(l) => {
                if l.fractional_digits > 0 {
                    self.push_int(pow10(l.fractional_digits));
                    self.push(-1, Inst::Mul);
                }
                if !implicit {
                    self.check_fit(left);
                }
            }
            Ty::Int(_) => {
                if !implicit {
                    self.check_fit(left);
                }
            }
            // Reinterpreted bit-for-bit.
            Ty::FixedBytes(_) => {}
            _ => panic!("no conversion from integer to {left}"),
        }
    }

    fn fixed_bytes_from_fixed_bytes(&mut self, l_bytes: u32, r_bytes: u32) {
        let diff = 8 * (l_bytes as i64 - r_bytes as i64);
        if diff > 0 {
            self.push(0, Inst::LShift(Some(diff as u32)));
        } else if diff < 0 {
            self.push(0, Inst::RShift(Some(-diff as u32)));
        }
    }

    /// Folds a string literal into the integer a `bytesN` value is: the
    /// bytes of the string, right-padded with zeros.
    fn fixed_bytes_from_string_literal(&mut self, l_bytes: u32, value: String) {
        let mut folded = BigInt::zero();
        let mut bytes = 0u32;
        for b in value.bytes() {
            folded = folded * 256 + b;
            bytes += 1;
        }
        while bytes < l_bytes {
            folded *= 256;
            bytes += 1;
        }
        self.drop(1); // the literal slice
        self.push_int(folded);
    }
}

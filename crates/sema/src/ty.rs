//! Static types as seen by the code generator.
//!
//! A [`Ty`] is a fully resolved type: no rationals, no unresolved references.
//! Literal-typed expressions reach the backend already mobile-typed by the
//! checker, with the single exception of string literals, whose value the
//! backend folds when converting to fixed-size byte types.

use std::fmt;
use std::sync::Arc;

/// A fixed-width integer type: `intN` / `uintN`, 1 ≤ N ≤ 257.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntTy {
    /// Bit width, including the sign bit for signed types.
    pub bits: u32,
    pub signed: bool,
}

/// A decimal fixed-point type: `fixedMxN` / `ufixedMxN`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixedPointTy {
    /// Total bit width of the underlying integer.
    pub bits: u32,
    pub signed: bool,
    /// Number of decimal fractional digits; the stored integer is the value
    /// scaled by `10^fractional_digits`.
    pub fractional_digits: u32,
}

/// A struct field: name and type, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub name: String,
    pub ty: Ty,
}

/// A struct definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructDef {
    pub name: String,
    /// Fields in declaration order; encoding and decoding follow this order.
    pub fields: Vec<FieldDef>,
}

/// An enum definition. Enums are persisted as 8-bit unsigned integers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<String>,
}

/// Number of bits an enum value occupies on a cell.
pub const ENUM_BITS: u32 = 8;

/// A resolved static type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Bool,
    Int(IntTy),
    FixedPoint(FixedPointTy),
    /// `bytesN`, 1 ≤ N ≤ 32; stored as an unsigned integer of `8 * N` bits.
    FixedBytes(u32),
    /// `varuintN`: a byte-length prefix followed by that many bytes,
    /// N being the maximum byte count (16 for coin amounts).
    VarInt(u32),
    Enum(Arc<EnumDef>),
    Address,
    /// Dynamic byte array (`bytes`).
    Bytes,
    /// `string`; identical cell layout to `Bytes`.
    Str,
    /// A string literal whose concrete value survives to the backend.
    StringLiteral(String),
    /// Dynamic array of a non-byte element type.
    Array(Box<Ty>),
    Mapping(Box<Ty>, Box<Ty>),
    Optional(Box<Ty>),
    Struct(Arc<StructDef>),
    Tuple(Vec<Ty>),
    /// A function value, stored as a 32-bit function id.
    Function,
    /// A raw TVM cell.
    Cell,
    /// A read cursor over a cell.
    Slice,
    /// A write cursor building a cell.
    Builder,
}

/// Classification of a [`Ty`] for encoding decisions.
///
/// The emitter and the dictionary codec branch on this sum and nothing else,
/// so the two can never diverge in how they treat the same type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueCategory {
    Integer,
    Bool,
    Enum,
    FixedPoint,
    FixedBytes,
    VarInt,
    Address,
    /// `bytes`, `string` and string literals: boxed byte payloads.
    ByteArray,
    Array,
    Mapping,
    Optional,
    Struct,
    Tuple,
    Function,
    Cell,
    Slice,
    Builder,
}

impl Ty {
    /// The encoding category of this type.
    #[must_use]
    pub fn category(&self) -> ValueCategory {
        match self {
            Self::Bool => ValueCategory::Bool,
            Self::Int(_) => ValueCategory::Integer,
            Self::FixedPoint(_) => ValueCategory::FixedPoint,
            Self::FixedBytes(_) => ValueCategory::FixedBytes,
            Self::VarInt(_) => ValueCategory::VarInt,
            Self::Enum(_) => ValueCategory::Enum,
            Self::Address => ValueCategory::Address,
            Self::Bytes | Self::Str | Self::StringLiteral(_) => ValueCategory::ByteArray,
            Self::Array(_) => ValueCategory::Array,
            Self::Mapping(..) => ValueCategory::Mapping,
            Self::Optional(_) => ValueCategory::Optional,
            Self::Struct(_) => ValueCategory::Struct,
            Self::Tuple(_) => ValueCategory::Tuple,
            Self::Function => ValueCategory::Function,
            Self::Cell => ValueCategory::Cell,
            Self::Slice => ValueCategory::Slice,
            Self::Builder => ValueCategory::Builder,
        }
    }

    /// Bit width of a numeric type as persisted on a cell, if it has one.
    ///
    /// Bool is one bit; fixed-size byte arrays are `8 * N`; enums use
    /// [`ENUM_BITS`]; function values use 32.
    #[must_use]
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Self::Bool => Some(1),
            Self::Int(i) => Some(i.bits),
            Self::FixedPoint(f) => Some(f.bits),
            Self::FixedBytes(n) => Some(8 * n),
            Self::Enum(_) => Some(ENUM_BITS),
            Self::Function => Some(32),
            _ => None,
        }
    }

    /// Whether the numeric encoding is signed. Non-numeric types are unsigned.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        match self {
            Self::Int(i) => i.signed,
            Self::FixedPoint(f) => f.signed,
            _ => false,
        }
    }

    /// Whether `self` implicitly converts to `target` without any runtime
    /// range check: identical types, or lossless numeric widening.
    #[must_use]
    pub fn is_implicitly_convertible_to(&self, target: &Self) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (Self::Int(from), Self::Int(to)) => {
                if from.signed == to.signed {
                    from.bits <= to.bits
                } else {
                    // uintN fits intM only with room for the sign bit.
                    !from.signed && to.signed && from.bits < to.bits
                }
            }
            (Self::FixedPoint(from), Self::FixedPoint(to)) => {
                from.fractional_digits == to.fractional_digits
                    && from.signed == to.signed
                    && from.bits <= to.bits
            }
            (Self::Str | Self::StringLiteral(_), Self::Str)
            | (Self::Bytes | Self::StringLiteral(_), Self::Bytes) => true,
            (from, Self::Optional(inner)) => from.is_implicitly_convertible_to(inner),
            _ => false,
        }
    }

    /// Shorthand for an unsigned integer type.
    #[must_use]
    pub fn uint(bits: u32) -> Self {
        Self::Int(IntTy { bits, signed: false })
    }

    /// Shorthand for a signed integer type.
    #[must_use]
    pub fn int(bits: u32) -> Self {
        Self::Int(IntTy { bits, signed: true })
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int(i) => write!(f, "{}int{}", if i.signed { "" } else { "u" }, i.bits),
            Self::FixedPoint(t) => write!(
                f,
                "{}fixed{}x{}",
                if t.signed { "" } else { "u" },
                t.bits,
                t.fractional_digits
            ),
            Self::FixedBytes(n) => write!(f, "bytes{n}"),
            Self::VarInt(n) => write!(f, "varuint{n}"),
            Self::Enum(def) => write!(f, "enum {}", def.name),
            Self::Address => f.write_str("address"),
            Self::Bytes => f.write_str("bytes"),
            Self::Str => f.write_str("string"),
            Self::StringLiteral(_) => f.write_str("string literal"),
            Self::Array(elem) => write!(f, "{elem}[]"),
            Self::Mapping(k, v) => write!(f, "mapping({k} => {v})"),
            Self::Optional(inner) => write!(f, "optional({inner})"),
            Self::Struct(def) => write!(f, "struct {}", def.name),
            Self::Tuple(tys) => {
                f.write_str("(")?;
                for (i, ty) in tys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(")")
            }
            Self::Function => f.write_str("function"),
            Self::Cell => f.write_str("TvmCell"),
            Self::Slice => f.write_str("TvmSlice"),
            Self::Builder => f.write_str("TvmBuilder"),
        }
    }
}

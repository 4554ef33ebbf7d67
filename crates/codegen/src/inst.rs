//! Structured TVM instruction records.
//!
//! Every instruction is an opcode tag with typed operands; rewrite rules
//! match on these fields and [`crate::printer`] renders the final text. Keeping
//! the two apart removes the parsing ambiguities of scanning rendered
//! assembly.

use crate::bits::BitString;
use num_bigint::BigInt;
use smallvec::{SmallVec, smallvec};

/// Kinds of boxed instruction blocks.
///
/// A block is opened by [`Inst::BlockOpen`], closed by [`Inst::BlockClose`],
/// and its contents sit one nesting level deeper in the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    /// `PUSHCONT {`: push an inline continuation.
    PushCont,
    /// `PUSHREFCONT {`: push a continuation stored in a child cell.
    PushRefCont,
    /// `CALLREF {`: call a continuation stored in a child cell.
    CallRef,
    /// `IFREF {`: execute the child cell if the popped flag is true.
    IfRef,
    /// `IFJMPREF {`: jump to the child cell if the popped flag is true.
    IfJmpRef,
    /// `IFNOTREF {`: execute the child cell if the popped flag is false.
    IfNotRef,
    /// `PUSHREF {`: push the child cell as a cell value.
    PushRef,
    /// `PUSHREFSLICE {`: push the child cell as a slice value.
    PushRefSlice,
    /// `.cell {`: a nested literal cell inside a reference block.
    Cell,
}

/// Assembler directives: function headers and literal cell contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// `.globl <name>`
    Globl(String),
    /// `.type <name>, @function`
    FuncType(String),
    /// `.macro <name>`
    Macro(String),
    /// `.internal-alias :<name>, <id>`
    InternalAlias { name: String, id: i32 },
    /// `.internal :<name>`
    Internal(String),
    /// `.blob x<hex>`: literal bits inside a cell block.
    Blob(BitString),
    /// `.loc <file>, <line>`: source location marker.
    Loc { file: String, line: u32 },
}

/// A TVM instruction with typed operands.
///
/// Stack indices are zero-based from the top (`s0` is the top). `Push(0)`
/// prints as `DUP`, `Pop(0)` as `DROP` and `Pop(1)` as `NIP`; the record
/// keeps the uniform indexed form so rules reason about one shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inst {
    // Constants.
    /// `PUSHINT <n>` with a concrete integer.
    PushInt(BigInt),
    /// `PUSHINT $<name>$`: a function id resolved by the assembler.
    PushFuncId(String),
    /// `PUSHSLICE x<hex>`
    PushSlice(BitString),
    True,
    False,
    Zero,
    Null,
    NewDict,
    NewC,

    // Stack manipulation.
    /// `PUSH s<i>`; `DUP` when `i == 0`.
    Push(u32),
    /// `PUSH2 s<i>, s<j>`
    Push2(u32, u32),
    /// `PUSH3 s<i>, s<j>, s<k>`
    Push3(u32, u32, u32),
    Dup2,
    Over2,
    /// `BLKPUSH <count>, <index>`: push `count` copies of `s<index>`.
    BlkPush { count: u32, index: u32 },
    /// `POP s<i>`; `DROP` when `i == 0`, `NIP` when `i == 1`.
    Pop(u32),
    Drop2,
    /// `BLKDROP <n>`
    BlkDrop(u32),
    /// `DROPX`: drop a counted number of values taken from the stack.
    DropX,
    /// `BLKDROP2 <count>, <top>`: drop `count` values below the top `top`.
    BlkDrop2 { count: u32, top: u32 },
    /// `XCHG s<i>, s<j>`; `SWAP` when `(i, j) == (0, 1)`.
    Xchg { i: u32, j: u32 },
    Rot,
    RotRev,
    Swap2,
    /// `BLKSWAP <bottom>, <top>`
    BlkSwap { bottom: u32, top: u32 },
    /// `BLKSWX`: block swap with counts taken from the stack.
    BlkSwapX,
    /// `REVERSE <count>, <offset>`
    Reverse { count: u32, offset: u32 },
    /// `REVX`: reverse with parameters taken from the stack.
    RevX,

    // Tuples.
    Tuple(u32),
    Untuple(u32),
    TupleVar,
    UntupleVar,
    Pair,
    Unpair,
    Index(u32),
    Index2(u32, u32),
    Index3(u32, u32, u32),
    IndexVar,
    SetIndex(u32),
    SetIndexQ(u32),
    SetIndexVar,
    SetIndexVarQ,
    First,
    Second,
    Third,

    // Globals.
    GetGlob(u32),
    SetGlob(u32),
    GetGlobVar,
    SetGlobVar,

    // Arithmetic.
    Add,
    Sub,
    /// `SUBR`: reversed subtraction, `y - x` for stack `… x y`.
    SubR,
    Mul,
    Div,
    Mod,
    Inc,
    Dec,
    /// `ADDCONST <c>`, −128 ≤ c ≤ 127.
    AddConst(i32),
    /// `MULCONST <c>`, −128 ≤ c ≤ 127.
    MulConst(i32),
    Abs,
    /// `LSHIFT [<n>]`: immediate or counted form.
    LShift(Option<u32>),
    /// `RSHIFT [<n>]`
    RShift(Option<u32>),
    /// `MODPOW2 <n>`
    ModPow2(u32),
    /// `MULRSHIFT [<n>]`
    MulRShift(Option<u32>),
    /// `FITS <n>`: trap unless the value fits `n` signed bits.
    Fits(u32),
    /// `UFITS <n>`: trap unless the value fits `n` unsigned bits.
    UFits(u32),

    // Boolean and comparison.
    Not,
    And,
    Or,
    Xor,
    Equal,
    Neq,
    Greater,
    Less,
    EqInt(i32),
    NeqInt(i32),
    GtInt(i32),
    LessInt(i32),
    IsNull,
    /// `NULLSWAPIF`: insert a null under the top if the top is true.
    NullSwapIf,
    /// `NULLSWAPIFNOT`
    NullSwapIfNot,

    // Builders.
    StU(u32),
    StI(u32),
    StUR(u32),
    StIR(u32),
    StSlice,
    StSliceR,
    StSliceConst(BitString),
    StZeroes,
    StOnes,
    StZero,
    StOne,
    StRef,
    StRefR,
    StBRef,
    StBRefR,
    StB,
    StBR,
    StDict,
    StGrams,
    StVarUint32,

    // Slices and cells.
    Ctos,
    EndC,
    Ends,
    /// `LDOPTREF`: load a `Maybe ^Cell` as a null or a child cell.
    LdOptRef,
    LdU(u32),
    LdI(u32),
    LdRef,
    LdDict,
    LdMsgAddr,
    LdVarUint32,
    PldU(u32),
    PldI(u32),
    PldUX,
    PldRef,
    PldDict,
    SBits,
    CDataSize,

    // Hashing and misc.
    HashCU,
    HashSU,
    Sha256U,
    ParseMsgAddr,
    StrDump,
    SendRawMsg,

    // Control flow.
    Ret,
    IfRet,
    IfNotRet,
    If,
    IfNot,
    IfElse,
    IfJmp,
    IfNotJmp,
    Throw(u32),
    ThrowIf(u32),
    ThrowIfNot(u32),
    ThrowAny,
    /// `CALL $<name>$`
    Call(String),

    // Log structure.
    BlockOpen(BlockKind),
    BlockClose,
    /// `;; <text>`: annotation; skipped by the optimizer.
    Comment(String),
    Directive(Directive),
}

impl Inst {
    /// `SWAP`, i.e. `XCHG s0, s1`.
    pub const SWAP: Self = Self::Xchg { i: 0, j: 1 };

    /// Stack arity `(inputs, outputs)` for commands whose effect is a fixed
    /// consume/produce with no other stack motion. Permutations that move
    /// values (`PUSH`, `POP`, drops, block swaps) are handled by their own
    /// predicates, not here.
    #[must_use]
    pub fn simple_io(&self) -> Option<(u32, u32)> {
        use Inst::*;
        Some(match self {
            GetGlob(_) | NewC | NewDict | PushInt(_) | PushFuncId(_) | PushSlice(_) | True
            | False | Zero => (0, 1),
            Pop(0) | Ends | SetGlob(_) | ThrowAny | ThrowIf(_) | ThrowIfNot(_) => (1, 0),
            Ctos | Dec | EndC | EqInt(_) | First | Fits(_) | HashCU | HashSU | Inc | Index(_)
            | Not | ParseMsgAddr | SBits | Second | Sha256U | StSliceConst(_) | Third
            | UFits(_) => (1, 1),
            Add | And | Equal | Greater | IndexVar | Less | Mul | Neq | Or | Pair | PldUX
            | SetIndex(_) | StI(_) | StSlice | StU(_) | Sub | SubR | Div | Mod => (2, 1),
            Xchg { i: 0, j: 1 } => (2, 2),
            Rot | RotRev => (3, 3),
            Tuple(n) => (*n, 1),
            Untuple(n) => (1, *n),
            Unpair => (1, 2),
            SetIndexVar => (3, 1),
            _ => return None,
        })
    }

    /// True for `SWAP` (`XCHG s0, s1`).
    #[must_use]
    pub fn is_swap(&self) -> bool {
        matches!(self, Self::Xchg { i: 0, j: 1 })
    }

    /// The copied-from index of a `PUSH s<i>`/`DUP`.
    #[must_use]
    pub fn push_index(&self) -> Option<u32> {
        match self {
            Self::Push(i) => Some(*i),
            _ => None,
        }
    }

    /// The stored-to index of a `POP s<i>`/`DROP`/`NIP`.
    #[must_use]
    pub fn pop_index(&self) -> Option<u32> {
        match self {
            Self::Pop(i) => Some(*i),
            _ => None,
        }
    }

    /// Number of values removed, for the plain top-drop family only
    /// (`DROP`, `DROP2`, `BLKDROP n`).
    #[must_use]
    pub fn drop_count(&self) -> Option<u32> {
        match self {
            Self::Pop(0) => Some(1),
            Self::Drop2 => Some(2),
            Self::BlkDrop(n) => Some(*n),
            _ => None,
        }
    }

    /// Total rotated width of a fixed block-swap (`ROT`, `ROTREV`, `SWAP2`,
    /// `BLKSWAP m, n`).
    #[must_use]
    pub fn block_swap_total(&self) -> Option<u32> {
        match self {
            Self::Rot | Self::RotRev => Some(3),
            Self::Swap2 => Some(4),
            Self::BlkSwap { bottom, top } => Some(bottom + top),
            _ => None,
        }
    }

    /// The added constant of `INC`/`DEC`/`ADDCONST`.
    #[must_use]
    pub fn const_add_value(&self) -> Option<i32> {
        match self {
            Self::Inc => Some(1),
            Self::Dec => Some(-1),
            Self::AddConst(v) => Some(*v),
            _ => None,
        }
    }

    /// The concrete integer of a `PUSHINT <n>`; function-id pushes resolve at
    /// assembly time and are not foldable.
    #[must_use]
    pub fn int_literal(&self) -> Option<&BigInt> {
        match self {
            Self::PushInt(v) => Some(v),
            _ => None,
        }
    }

    /// Binary operators whose operands commute.
    #[must_use]
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor | Self::Equal | Self::Neq
        )
    }

    /// Instructions after which control never falls through.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Ret | Self::Throw(_) | Self::ThrowAny)
    }

    /// Minimal sequence dropping `n` values: `DROP`, `DROP2`, `BLKDROP n`, or
    /// the counted `DROPX` form past the inline limit.
    #[must_use]
    pub fn drops(n: u32) -> SmallVec<[Self; 2]> {
        assert!(n > 0, "dropping zero values");
        match n {
            1 => smallvec![Self::Pop(0)],
            2 => smallvec![Self::Drop2],
            3..=15 => smallvec![Self::BlkDrop(n)],
            _ => smallvec![Self::PushInt(BigInt::from(n)), Self::DropX],
        }
    }

    /// `PUSH s<n>` (`DUP` for 0).
    #[must_use]
    pub fn push_s(n: u32) -> Self {
        Self::Push(n)
    }

    /// `POP s<n>` (`DROP` for 0, `NIP` for 1).
    #[must_use]
    pub fn pop_s(n: u32) -> Self {
        Self::Pop(n)
    }

    /// `BLKPUSH count, index`, degrading to a single push for count 1.
    #[must_use]
    pub fn blkpush(count: u32, index: u32) -> Self {
        assert!(count > 0, "pushing zero copies");
        assert!(index <= 15, "BLKPUSH index out of range: {index}");
        if count == 1 { Self::Push(index) } else { Self::BlkPush { count, index } }
    }
}

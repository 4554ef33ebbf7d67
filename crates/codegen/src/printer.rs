//! Rendering the structured log to assembly text.

use crate::buffer::{CodeBuffer, Instruction};
use crate::inst::{BlockKind, Directive, Inst};
use std::fmt::{self, Write};

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PushCont => "PUSHCONT {",
            Self::PushRefCont => "PUSHREFCONT {",
            Self::CallRef => "CALLREF {",
            Self::IfRef => "IFREF {",
            Self::IfJmpRef => "IFJMPREF {",
            Self::IfNotRef => "IFNOTREF {",
            Self::PushRef => "PUSHREF {",
            Self::PushRefSlice => "PUSHREFSLICE {",
            Self::Cell => ".cell {",
        })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Globl(name) => write!(f, ".globl\t{name}"),
            Self::FuncType(name) => write!(f, ".type\t{name}, @function"),
            Self::Macro(name) => write!(f, ".macro {name}"),
            Self::InternalAlias { name, id } => write!(f, ".internal-alias :{name}, {id}"),
            Self::Internal(name) => write!(f, ".internal :{name}"),
            Self::Blob(bits) => write!(f, ".blob x{}", bits.to_hex_slice()),
            Self::Loc { file, line } => write!(f, ".loc {file}, {line}"),
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Inst::*;
        match self {
            PushInt(v) => write!(f, "PUSHINT {v}"),
            PushFuncId(name) => write!(f, "PUSHINT ${name}$"),
            PushSlice(bits) => write!(f, "PUSHSLICE x{}", bits.to_hex_slice()),
            True => f.write_str("TRUE"),
            False => f.write_str("FALSE"),
            Zero => f.write_str("ZERO"),
            Null => f.write_str("NULL"),
            NewDict => f.write_str("NEWDICT"),
            NewC => f.write_str("NEWC"),

            Push(0) => f.write_str("DUP"),
            Push(i) => write!(f, "PUSH s{i}"),
            Push2(i, j) => write!(f, "PUSH2 s{i}, s{j}"),
            Push3(i, j, k) => write!(f, "PUSH3 s{i}, s{j}, s{k}"),
            Dup2 => f.write_str("DUP2"),
            Over2 => f.write_str("OVER2"),
            BlkPush { count, index } => write!(f, "BLKPUSH {count}, {index}"),
            Pop(0) => f.write_str("DROP"),
            Pop(1) => f.write_str("NIP"),
            Pop(i) => write!(f, "POP s{i}"),
            Drop2 => f.write_str("DROP2"),
            BlkDrop(n) => write!(f, "BLKDROP {n}"),
            DropX => f.write_str("DROPX"),
            BlkDrop2 { count, top } => write!(f, "BLKDROP2 {count}, {top}"),
            Xchg { i: 0, j: 1 } => f.write_str("SWAP"),
            Xchg { i: 0, j } if *j <= 15 => write!(f, "XCHG s{j}"),
            Xchg { i, j } => write!(f, "XCHG s{i}, s{j}"),
            Rot => f.write_str("ROT"),
            RotRev => f.write_str("ROTREV"),
            Swap2 => f.write_str("SWAP2"),
            BlkSwap { bottom, top } => write!(f, "BLKSWAP {bottom}, {top}"),
            BlkSwapX => f.write_str("BLKSWX"),
            Reverse { count, offset } => write!(f, "REVERSE {count}, {offset}"),
            RevX => f.write_str("REVX"),

            Tuple(n) => write!(f, "TUPLE {n}"),
            Untuple(n) => write!(f, "UNTUPLE {n}"),
            TupleVar => f.write_str("TUPLEVAR"),
            UntupleVar => f.write_str("UNTUPLEVAR"),
            Pair => f.write_str("PAIR"),
            Unpair => f.write_str("UNPAIR"),
            Index(n) => write!(f, "INDEX {n}"),
            Index2(i, j) => write!(f, "INDEX2 {i}, {j}"),
            Index3(i, j, k) => write!(f, "INDEX3 {i}, {j}, {k}"),
            IndexVar => f.write_str("INDEXVAR"),
            SetIndex(n) => write!(f, "SETINDEX {n}"),
            SetIndexQ(n) => write!(f, "SETINDEXQ {n}"),
            SetIndexVar => f.write_str("SETINDEXVAR"),
            SetIndexVarQ => f.write_str("SETINDEXVARQ"),
            First => f.write_str("FIRST"),
            Second => f.write_str("SECOND"),
            Third => f.write_str("THIRD"),

            GetGlob(n) => write!(f, "GETGLOB {n}"),
            SetGlob(n) => write!(f, "SETGLOB {n}"),
            GetGlobVar => f.write_str("GETGLOBVAR"),
            SetGlobVar => f.write_str("SETGLOBVAR"),

            Add => f.write_str("ADD"),
            Sub => f.write_str("SUB"),
            SubR => f.write_str("SUBR"),
            Mul => f.write_str("MUL"),
            Div => f.write_str("DIV"),
            Mod => f.write_str("MOD"),
            Inc => f.write_str("INC"),
            Dec => f.write_str("DEC"),
            AddConst(v) => write!(f, "ADDCONST {v}"),
            MulConst(v) => write!(f, "MULCONST {v}"),
            Abs => f.write_str("ABS"),
            LShift(None) => f.write_str("LSHIFT"),
            LShift(Some(n)) => write!(f, "LSHIFT {n}"),
            RShift(None) => f.write_str("RSHIFT"),
            RShift(Some(n)) => write!(f, "RSHIFT {n}"),
            ModPow2(n) => write!(f, "MODPOW2 {n}"),
            MulRShift(None) => f.write_str("MULRSHIFT"),
            MulRShift(Some(n)) => write!(f, "MULRSHIFT {n}"),
            Fits(n) => write!(f, "FITS {n}"),
            UFits(n) => write!(f, "UFITS {n}"),

            Not => f.write_str("NOT"),
            And => f.write_str("AND"),
            Or => f.write_str("OR"),
            Xor => f.write_str("XOR"),
            Equal => f.write_str("EQUAL"),
            Neq => f.write_str("NEQ"),
            Greater => f.write_str("GREATER"),
            Less => f.write_str("LESS"),
            EqInt(v) => write!(f, "EQINT {v}"),
            NeqInt(v) => write!(f, "NEQINT {v}"),
            GtInt(v) => write!(f, "GTINT {v}"),
            LessInt(v) => write!(f, "LESSINT {v}"),
            IsNull => f.write_str("ISNULL"),
            NullSwapIf => f.write_str("NULLSWAPIF"),
            NullSwapIfNot => f.write_str("NULLSWAPIFNOT"),

            StU(n) => write!(f, "STU {n}"),
            StI(n) => write!(f, "STI {n}"),
            StUR(n) => write!(f, "STUR {n}"),
            StIR(n) => write!(f, "STIR {n}"),
            StSlice => f.write_str("STSLICE"),
            StSliceR => f.write_str("STSLICER"),
            // Single bits keep the bare 0/1 spelling of the original dialect.
            StSliceConst(bits) if bits.as_binary() == "0" => f.write_str("STSLICECONST 0"),
            StSliceConst(bits) if bits.as_binary() == "1" => f.write_str("STSLICECONST 1"),
            StSliceConst(bits) => write!(f, "STSLICECONST x{}", bits.to_hex_slice()),
            StZeroes => f.write_str("STZEROES"),
            StOnes => f.write_str("STONES"),
            StZero => f.write_str("STZERO"),
            StOne => f.write_str("STONE"),
            StRef => f.write_str("STREF"),
            StRefR => f.write_str("STREFR"),
            StBRef => f.write_str("STBREF"),
            StBRefR => f.write_str("STBREFR"),
            StB => f.write_str("STB"),
            StBR => f.write_str("STBR"),
            StDict => f.write_str("STDICT"),
            StGrams => f.write_str("STGRAMS"),
            StVarUint32 => f.write_str("STVARUINT32"),

            Ctos => f.write_str("CTOS"),
            EndC => f.write_str("ENDC"),
            Ends => f.write_str("ENDS"),
            LdOptRef => f.write_str("LDOPTREF"),
            LdU(n) => write!(f, "LDU {n}"),
            LdI(n) => write!(f, "LDI {n}"),
            LdRef => f.write_str("LDREF"),
            LdDict => f.write_str("LDDICT"),
            LdMsgAddr => f.write_str("LDMSGADDR"),
            LdVarUint32 => f.write_str("LDVARUINT32"),
            PldU(n) => write!(f, "PLDU {n}"),
            PldI(n) => write!(f, "PLDI {n}"),
            PldUX => f.write_str("PLDUX"),
            PldRef => f.write_str("PLDREF"),
            PldDict => f.write_str("PLDDICT"),
            SBits => f.write_str("SBITS"),
            CDataSize => f.write_str("CDATASIZE"),

            HashCU => f.write_str("HASHCU"),
            HashSU => f.write_str("HASHSU"),
            Sha256U => f.write_str("SHA256U"),
            ParseMsgAddr => f.write_str("PARSEMSGADDR"),
            StrDump => f.write_str("STRDUMP"),
            SendRawMsg => f.write_str("SENDRAWMSG"),

            Ret => f.write_str("RET"),
            IfRet => f.write_str("IFRET"),
            IfNotRet => f.write_str("IFNOTRET"),
            If => f.write_str("IF"),
            IfNot => f.write_str("IFNOT"),
            IfElse => f.write_str("IFELSE"),
            IfJmp => f.write_str("IFJMP"),
            IfNotJmp => f.write_str("IFNOTJMP"),
            Throw(n) => write!(f, "THROW {n}"),
            ThrowIf(n) => write!(f, "THROWIF {n}"),
            ThrowIfNot(n) => write!(f, "THROWIFNOT {n}"),
            ThrowAny => f.write_str("THROWANY"),
            Call(name) => write!(f, "CALL ${name}$"),

            BlockOpen(kind) => write!(f, "{kind}"),
            BlockClose => f.write_str("}"),
            Comment(text) => write!(f, ";; {text}"),
            Directive(d) => write!(f, "{d}"),
        }
    }
}

/// Renders a log to assembly text, one instruction per line, indented one tab
/// per nesting level.
#[must_use]
pub fn render(items: &[Instruction]) -> String {
    let mut out = String::new();
    for Instruction { inst, depth } in items {
        for _ in 0..*depth {
            out.push('\t');
        }
        writeln!(out, "{inst}").unwrap();
    }
    out
}

/// Renders a whole buffer. See [`render`].
#[must_use]
pub fn render_buffer(code: &CodeBuffer) -> String {
    render(code.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitString;
    use num_bigint::BigInt;

    #[test]
    fn test_indexed_spellings() {
        assert_eq!(Inst::Push(0).to_string(), "DUP");
        assert_eq!(Inst::Push(3).to_string(), "PUSH s3");
        assert_eq!(Inst::Pop(0).to_string(), "DROP");
        assert_eq!(Inst::Pop(1).to_string(), "NIP");
        assert_eq!(Inst::Pop(4).to_string(), "POP s4");
        assert_eq!(Inst::SWAP.to_string(), "SWAP");
        assert_eq!(Inst::Xchg { i: 0, j: 2 }.to_string(), "XCHG s2");
        assert_eq!(Inst::Xchg { i: 0, j: 20 }.to_string(), "XCHG s0, s20");
        assert_eq!(Inst::Xchg { i: 1, j: 5 }.to_string(), "XCHG s1, s5");
    }

    #[test]
    fn test_literal_spellings() {
        assert_eq!(Inst::PushInt(BigInt::from(-7)).to_string(), "PUSHINT -7");
        assert_eq!(Inst::PushFuncId("main_internal".into()).to_string(), "PUSHINT $main_internal$");
        assert_eq!(
            Inst::PushSlice(BitString::from_binary("10110")).to_string(),
            "PUSHSLICE xb4_"
        );
        assert_eq!(
            Inst::StSliceConst(BitString::from_binary("0")).to_string(),
            "STSLICECONST 0"
        );
    }

    #[test]
    fn test_render_indents_blocks() {
        use crate::inst::BlockKind;
        let mut code = CodeBuffer::new();
        code.push(Inst::Zero);
        code.open_block(BlockKind::PushCont);
        code.push(Inst::Inc);
        code.close_block();
        code.push(Inst::If);

        assert_eq!(render_buffer(&code), "ZERO\nPUSHCONT {\n\tINC\n}\nIF\n");
    }
}

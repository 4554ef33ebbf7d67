#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(test, allow(unused_crate_dependencies))]

pub use rustc_hash::{FxHashMap, FxHashSet};
pub use stele_sema as sema;

pub mod consts;

pub mod bits;
pub use bits::BitString;

pub mod inst;
pub use inst::{BlockKind, Directive, Inst};

pub mod buffer;
pub use buffer::{CodeBuffer, Instruction};

pub mod printer;

pub mod stack;
pub use stack::StackModel;

pub mod ctx;
pub use ctx::{CompileContext, Config};

pub mod emitter;
pub use emitter::{Emitter, MsgKind};

pub mod dict;
pub use dict::{DataType, DecodeShape};

pub mod peephole;
pub use peephole::{PeepholeOptimizer, RewriteResult, optimize_code};

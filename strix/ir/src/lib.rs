//! Linear IR and the bytecode-to-IR builder.
//!
//! This crate owns the middle of the JIT pipeline: it consumes the bytecode
//! of one function body (or one loop body for on-stack replacement) and
//! produces a linear three-address-code instruction list attached to a
//! [`Func`](func::Func) context, ready for the optimizer and the native
//! backends.
//!
//! The pieces:
//!
//! - [`bytecode`]: the multi-layout bytecode stream reader and assembler;
//! - [`func`] / [`layout`] / [`instr`] / [`operand`] / [`sym`]: the IR data
//!   model (entity-indexed instruction pool, doubly linked layout, symbol
//!   table);
//! - [`builder`]: the one-pass translation, branch relocation, call-argument
//!   linking, OSR slot traffic, and the generator resume jump table;
//! - [`line_cache`]: the source line offset index consulted for
//!   position-targeted bailout injection.

pub mod bailout;
pub mod builder;
pub mod bytecode;
pub mod entities;
pub mod error;
pub mod func;
pub mod instr;
pub mod jitbody;
pub mod layout;
pub mod line_cache;
pub mod opcodes;
pub mod operand;
pub mod sym;
pub mod types;

pub use crate::builder::build_ir;
pub use crate::entities::{Instr, PropSymId, RegSlot, SymId};
pub use crate::error::{CodegenError, CodegenResult};
pub use crate::func::{Func, FuncConfig};
pub use crate::jitbody::JitFunctionBody;
pub use crate::opcodes::OpCode;

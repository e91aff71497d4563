//! IR entity references.
//!
//! Instructions and symbols are referenced by typed `u32` indices into pools
//! owned by [`Func`](crate::func::Func), not by Rust references; see the
//! `strix-entity` crate docs for the rationale.

use strix_entity::entity_impl;

/// An opaque reference to an instruction node.
///
/// Ordering between instructions lives in [`Layout`](crate::layout::Layout);
/// the reference itself is stable for the lifetime of the function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instr(u32);
entity_impl!(Instr, "instr");

/// A stable identity for a stack symbol.
///
/// Symbols for bytecode registers use the register number as their id; the
/// symbol table allocates fresh ids above the register space for backend
/// temporaries.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymId(u32);
entity_impl!(SymId, "s");

/// An opaque reference to a property symbol.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropSymId(u32);
entity_impl!(PropSymId, "ps");

/// A bytecode register slot.
pub type RegSlot = u32;

/// A property id referenced by field accesses.
pub type PropertyId = u32;

/// A profile-data slot identifying a call site or type-feedback entry.
pub type ProfileId = u16;

/// Sentinel for "no bytecode offset" on backend-inserted instructions.
pub const NO_BYTECODE_OFFSET: u32 = u32::MAX;

/// Sentinel register used where the bytecode has no destination.
pub const NO_REGISTER: RegSlot = u32::MAX;

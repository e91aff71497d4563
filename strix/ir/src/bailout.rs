//! Bailout kinds and per-bailout bookkeeping.
//!
//! A bailout is a point where JITted code hands control back to the
//! interpreter. The kind is a bitmask: debugger-driven bailouts combine
//! several reasons on one instruction.

use crate::entities::Instr;
use core::ops::{BitOr, BitOrAssign};
use strix_entity::packed_option::PackedOption;

/// A bitmask of bailout reasons.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct BailOutKind(u32);

impl BailOutKind {
    pub const NONE: BailOutKind = BailOutKind(0);
    /// Forced by a host flag (fast F12 attach).
    pub const FORCE_BY_FLAG: BailOutKind = BailOutKind(1 << 0);
    /// Re-establish the interpreter frame base.
    pub const STACK_FRAME_BASE: BailOutKind = BailOutKind(1 << 1);
    /// A breakpoint exists somewhere in this function.
    pub const BREAKPOINT_IN_FUNCTION: BailOutKind = BailOutKind(1 << 2);
    /// A local was changed from the debugger.
    pub const LOCAL_VALUE_CHANGED: BailOutKind = BailOutKind(1 << 3);
    /// Continue-after-exception support.
    pub const IGNORE_EXCEPTION: BailOutKind = BailOutKind(1 << 4);
    /// Single-stepping.
    pub const STEP: BailOutKind = BailOutKind(1 << 5);
    /// Explicit `debugger` statement.
    pub const EXPLICIT: BailOutKind = BailOutKind(1 << 6);
    /// Test-only injected bailout.
    pub const INJECTED: BailOutKind = BailOutKind(1 << 7);
    /// A generator yield point.
    pub const FOR_GENERATOR_YIELD: BailOutKind = BailOutKind(1 << 8);

    /// Does this mask contain every bit of `other`?
    pub fn contains(self, other: BailOutKind) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BailOutKind {
    type Output = BailOutKind;
    fn bitor(self, rhs: BailOutKind) -> BailOutKind {
        BailOutKind(self.0 | rhs.0)
    }
}

impl BitOrAssign for BailOutKind {
    fn bitor_assign(&mut self, rhs: BailOutKind) {
        self.0 |= rhs.0;
    }
}

/// The debugger bailout mask used after calls.
pub const DEBUGGER_BAILOUT_KIND_FOR_CALL: BailOutKind = BailOutKind(
    BailOutKind::FORCE_BY_FLAG.0
        | BailOutKind::STACK_FRAME_BASE.0
        | BailOutKind::BREAKPOINT_IN_FUNCTION.0
        | BailOutKind::LOCAL_VALUE_CHANGED.0
        | BailOutKind::IGNORE_EXCEPTION.0
        | BailOutKind::STEP.0,
);

/// The base debugger bailout mask used after throwing helpers.
pub const DEBUGGER_BASE_BAILOUT_KIND_FOR_HELPER: BailOutKind =
    BailOutKind(BailOutKind::IGNORE_EXCEPTION.0 | BailOutKind::FORCE_BY_FLAG.0);

/// Saved state needed to restart the interpreter at a bailout point.
#[derive(Clone, Debug)]
pub struct BailOutInfo {
    /// Bytecode offset the interpreter resumes at.
    pub bytecode_offset: u32,
}

impl BailOutInfo {
    pub fn new(bytecode_offset: u32) -> Self {
        BailOutInfo { bytecode_offset }
    }
}

/// The bailout record attached to an instruction converted to a bailout.
#[derive(Clone, Debug)]
pub struct BailOutData {
    pub kind: BailOutKind,
    pub info: BailOutInfo,
    /// For generator yields: the bail-in label re-entered on resume.
    pub bail_in_label: PackedOption<Instr>,
}

impl BailOutData {
    pub fn new(kind: BailOutKind, info: BailOutInfo) -> Self {
        BailOutData {
            kind,
            info,
            bail_in_label: None.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_combine() {
        let k = BailOutKind::FORCE_BY_FLAG | BailOutKind::STEP;
        assert!(k.contains(BailOutKind::STEP));
        assert!(!k.contains(BailOutKind::EXPLICIT));
        assert!(DEBUGGER_BAILOUT_KIND_FOR_CALL.contains(BailOutKind::IGNORE_EXCEPTION));
    }
}

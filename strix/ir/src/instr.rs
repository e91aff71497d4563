//! Instruction records.

use crate::bailout::BailOutData;
use crate::entities::{Instr, ProfileId, NO_BYTECODE_OFFSET};
use crate::opcodes::OpCode;
use crate::operand::Opnd;
use smallvec::SmallVec;
use strix_entity::packed_option::PackedOption;

/// Branch target list. One entry for ordinary branches; several for
/// multi-branches (the generator resume jump table).
pub type BranchTargets = SmallVec<[PackedOption<Instr>; 1]>;

/// What kind of node an instruction is, beyond its opcode.
#[derive(Clone, Debug)]
pub enum InstrKind {
    /// A plain instruction.
    Ordinary,
    /// A branch; targets are labels, filled in by reloc resolution.
    Branch { targets: BranchTargets },
    /// A branch target.
    Label { is_loop_top: bool },
    /// A statement boundary marker.
    Pragma { statement_index: u32 },
    /// The head sentinel.
    Entry,
    /// The tail sentinel.
    Exit,
}

/// One IR instruction.
///
/// Position in the function is held by [`Layout`](crate::layout::Layout);
/// this record holds everything else.
#[derive(Clone, Debug)]
pub struct InstrData {
    pub opcode: OpCode,
    pub dst: Option<Opnd>,
    pub src1: Option<Opnd>,
    pub src2: Option<Opnd>,
    /// Offset of the bytecode this instruction was built from, for bailout.
    pub bytecode_offset: u32,
    /// Profile slot feeding this instruction, when profiled.
    pub profile_id: Option<ProfileId>,
    pub kind: InstrKind,
    /// Present when the instruction has been converted to a bailout point.
    pub bail_out: Option<Box<BailOutData>>,
}

impl InstrData {
    pub fn new(opcode: OpCode) -> Self {
        InstrData {
            opcode,
            dst: None,
            src1: None,
            src2: None,
            bytecode_offset: NO_BYTECODE_OFFSET,
            profile_id: None,
            kind: InstrKind::Ordinary,
            bail_out: None,
        }
    }

    pub fn with_dst(opcode: OpCode, dst: Opnd) -> Self {
        let mut i = Self::new(opcode);
        i.dst = Some(dst);
        i
    }

    pub fn unary(opcode: OpCode, dst: Opnd, src1: Opnd) -> Self {
        let mut i = Self::new(opcode);
        i.dst = Some(dst);
        i.src1 = Some(src1);
        i
    }

    pub fn binary(opcode: OpCode, dst: Opnd, src1: Opnd, src2: Opnd) -> Self {
        let mut i = Self::new(opcode);
        i.dst = Some(dst);
        i.src1 = Some(src1);
        i.src2 = Some(src2);
        i
    }

    /// A branch with its target still unresolved.
    pub fn branch(opcode: OpCode) -> Self {
        let mut i = Self::new(opcode);
        i.kind = InstrKind::Branch {
            targets: BranchTargets::from_elem(None.into(), 1),
        };
        i
    }

    pub fn label() -> Self {
        let mut i = Self::new(OpCode::Label);
        i.kind = InstrKind::Label { is_loop_top: false };
        i
    }

    pub fn pragma(statement_index: u32) -> Self {
        let mut i = Self::new(OpCode::StatementBoundary);
        i.kind = InstrKind::Pragma { statement_index };
        i
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, InstrKind::Branch { .. })
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, InstrKind::Label { .. })
    }

    /// Labels and pragmas are not "real" instructions for the purposes of
    /// neighbor scans.
    pub fn is_real(&self) -> bool {
        !matches!(
            self.kind,
            InstrKind::Label { .. } | InstrKind::Pragma { .. } | InstrKind::Entry
        )
    }

    pub fn has_bail_out_info(&self) -> bool {
        self.bail_out.is_some()
    }

    /// The single branch target, if resolved.
    pub fn branch_target(&self) -> Option<Instr> {
        match &self.kind {
            InstrKind::Branch { targets } => targets.first().and_then(|t| t.expand()),
            _ => None,
        }
    }

    /// Set the single branch target.
    pub fn set_branch_target(&mut self, label: Instr) {
        match &mut self.kind {
            InstrKind::Branch { targets } => {
                debug_assert_eq!(targets.len(), 1);
                targets[0] = label.into();
            }
            _ => panic!("not a branch"),
        }
    }

    /// Convert this instruction into a bailout point, keeping opcode and
    /// operands. Later conversions merge kinds.
    pub fn convert_to_bail_out(&mut self, data: BailOutData) {
        match &mut self.bail_out {
            Some(existing) => existing.kind |= data.kind,
            None => self.bail_out = Some(Box::new(data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bailout::{BailOutData, BailOutInfo, BailOutKind};

    #[test]
    fn branch_targets() {
        let mut b = InstrData::branch(OpCode::BrTrue_A);
        assert!(b.is_branch());
        assert_eq!(b.branch_target(), None);
        b.set_branch_target(Instr::from_u32(3));
        assert_eq!(b.branch_target(), Some(Instr::from_u32(3)));
    }

    #[test]
    fn bailout_conversion_merges_kinds() {
        let mut i = InstrData::new(OpCode::Yield);
        i.convert_to_bail_out(BailOutData::new(
            BailOutKind::FOR_GENERATOR_YIELD,
            BailOutInfo::new(4),
        ));
        i.convert_to_bail_out(BailOutData::new(BailOutKind::STEP, BailOutInfo::new(4)));
        let data = i.bail_out.as_ref().unwrap();
        assert!(data.kind.contains(BailOutKind::FOR_GENERATOR_YIELD));
        assert!(data.kind.contains(BailOutKind::STEP));
    }
}

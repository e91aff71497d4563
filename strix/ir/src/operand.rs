//! Instruction operands.

use crate::entities::{PropSymId, SymId};
use crate::opcodes::HelperMethod;
use crate::types::{IrType, ValueType};
use strix_entity::packed_option::PackedOption;

/// Tag classifying what an address constant points at.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AddrKind {
    /// A tagged script variable (constant table entry, library object, ...).
    Var,
    /// Miscellaneous runtime data (check records, aux buffers, ...).
    Misc,
}

/// A register operand: a stack symbol plus type annotations.
#[derive(Copy, Clone, Debug)]
pub struct RegOpnd {
    pub sym: SymId,
    pub ty: IrType,
    pub value_type: ValueType,
    /// Set on registers invented by the JIT (loop counters etc.) that have no
    /// bytecode-visible location to restore on bailout.
    pub is_jit_optimized: bool,
}

impl RegOpnd {
    pub fn new(sym: SymId, ty: IrType) -> Self {
        RegOpnd {
            sym,
            ty,
            value_type: ValueType::Uninitialized,
            is_jit_optimized: false,
        }
    }
}

/// A property symbol operand, optionally carrying an inline-cache index.
#[derive(Copy, Clone, Debug)]
pub struct SymOpnd {
    pub sym: PropSymId,
    pub ty: IrType,
    /// Inline cache this access goes through, when the opcode can use one.
    pub cache_index: Option<u32>,
}

/// An instruction operand.
#[derive(Copy, Clone, Debug)]
pub enum Opnd {
    /// A stack symbol in a virtual register.
    Reg(RegOpnd),
    /// Integer immediate.
    IntConst { value: i64, ty: IrType },
    /// Float immediate.
    FloatConst { value: f64 },
    /// Address immediate (tagged values, runtime records).
    Addr { value: u64, kind: AddrKind },
    /// A memory reference `[base + index*scale + offset]`.
    Indir {
        base: SymId,
        index: PackedOption<SymId>,
        offset: i32,
        scale: u8,
        ty: IrType,
    },
    /// A property on a stack symbol (field, slot, slot-array element).
    Sym(SymOpnd),
    /// A helper-call descriptor.
    HelperCall(HelperMethod),
}

impl Opnd {
    /// The stack symbol of a register operand, if this is one.
    pub fn reg_sym(&self) -> Option<SymId> {
        match self {
            Opnd::Reg(r) => Some(r.sym),
            _ => None,
        }
    }

    /// The register operand itself, if this is one.
    pub fn as_reg(&self) -> Option<&RegOpnd> {
        match self {
            Opnd::Reg(r) => Some(r),
            _ => None,
        }
    }

    /// The property-sym operand, if this is one.
    pub fn as_sym(&self) -> Option<&SymOpnd> {
        match self {
            Opnd::Sym(s) => Some(s),
            _ => None,
        }
    }

    /// The helper descriptor, if this is a helper-call operand.
    pub fn as_helper(&self) -> Option<HelperMethod> {
        match self {
            Opnd::HelperCall(h) => Some(*h),
            _ => None,
        }
    }

    /// A null address constant.
    pub fn null_addr() -> Opnd {
        Opnd::Addr {
            value: 0,
            kind: AddrKind::Var,
        }
    }
}

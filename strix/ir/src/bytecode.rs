//! Bytecode stream encoding.
//!
//! An opcode is one byte, optionally preceded by a layout-size prefix byte
//! (`0xFE` = medium, `0xFF` = large; no prefix = small). Operand fields whose
//! width depends on the layout size are one, two, or four bytes
//! little-endian; branch targets are always absolute four-byte offsets and
//! profile ids are always two bytes. The stream ends with `EndOfBlock`.
//!
//! [`BytecodeReader`] drives the IR builder; [`BytecodeWriter`] is the
//! assembler used by tests and embedders that construct function bodies by
//! hand (the production serializer lives with the front end).

use crate::entities::{ProfileId, RegSlot};
use crate::error::{CodegenError, CodegenResult};
use crate::opcodes::OpCode;

/// Size class of a bytecode layout.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LayoutSize {
    Small,
    Medium,
    Large,
}

const MEDIUM_PREFIX: u8 = 0xFE;
const LARGE_PREFIX: u8 = 0xFF;

/// Bytecode opcodes in wire order. The opcode byte is the index in this
/// table.
const BYTECODE_OPCODES: &[OpCode] = &[
    OpCode::Nop,
    OpCode::Ret,
    OpCode::Leave,
    OpCode::LeaveNull,
    OpCode::Finally,
    OpCode::Break,
    OpCode::EndOfBlock,
    OpCode::LdC_A_Null,
    OpCode::Throw,
    OpCode::Catch,
    OpCode::Ld_A,
    OpCode::Typeof,
    OpCode::Conv_Num,
    OpCode::Conv_Str,
    OpCode::Neg_A,
    OpCode::Not_A,
    OpCode::Incr_A,
    OpCode::Decr_A,
    OpCode::BeginSwitch,
    OpCode::Yield,
    OpCode::LdThis,
    OpCode::Add_A,
    OpCode::Sub_A,
    OpCode::Mul_A,
    OpCode::Div_A,
    OpCode::Rem_A,
    OpCode::And_A,
    OpCode::Or_A,
    OpCode::Xor_A,
    OpCode::Shl_A,
    OpCode::Shr_A,
    OpCode::ShrU_A,
    OpCode::CmEq_A,
    OpCode::CmNeq_A,
    OpCode::CmSrEq_A,
    OpCode::CmSrNeq_A,
    OpCode::CmLt_A,
    OpCode::CmLe_A,
    OpCode::CmGt_A,
    OpCode::CmGe_A,
    OpCode::IsInst,
    OpCode::NewScArray,
    OpCode::ProfiledLoopStart,
    OpCode::ProfiledLoopBodyStart,
    OpCode::ProfiledLoopEnd,
    OpCode::ArgOut_A,
    OpCode::ArgOut_Env,
    OpCode::StartCall,
    OpCode::CallI,
    OpCode::NewScObject,
    OpCode::ProfiledCallI,
    OpCode::ProfiledNewScObject,
    OpCode::LdSlot,
    OpCode::StSlot,
    OpCode::LdLocalSlot,
    OpCode::StLocalSlot,
    OpCode::LdEnvSlot,
    OpCode::StEnvSlot,
    OpCode::LdFld,
    OpCode::StFld,
    OpCode::InitFld,
    OpCode::LdMethodFld,
    OpCode::ProfiledLdFld,
    OpCode::ProfiledStFld,
    OpCode::LdElemI_A,
    OpCode::StElemI_A,
    OpCode::ProfiledLdElemI_A,
    OpCode::ProfiledStElemI_A,
    OpCode::Br,
    OpCode::EndSwitch,
    OpCode::TryCatch,
    OpCode::TryFinally,
    OpCode::BrTrue_A,
    OpCode::BrFalse_A,
    OpCode::BrEq_A,
    OpCode::BrNeq_A,
    OpCode::BrSrEq_A,
    OpCode::BrSrNeq_A,
    OpCode::BrLt_A,
    OpCode::BrLe_A,
    OpCode::BrGt_A,
    OpCode::BrGe_A,
    OpCode::Case,
];

fn opcode_to_byte(op: OpCode) -> u8 {
    BYTECODE_OPCODES
        .iter()
        .position(|&o| o == op)
        .expect("not a bytecode opcode") as u8
}

// Decoded layout structs, named for their families.

#[derive(Copy, Clone, Debug)]
pub struct Reg1 {
    pub r0: RegSlot,
}

#[derive(Copy, Clone, Debug)]
pub struct Reg2 {
    pub r0: RegSlot,
    pub r1: RegSlot,
}

#[derive(Copy, Clone, Debug)]
pub struct Reg2Int1 {
    pub r0: RegSlot,
    pub r1: RegSlot,
    pub c1: i32,
}

#[derive(Copy, Clone, Debug)]
pub struct Reg3 {
    pub r0: RegSlot,
    pub r1: RegSlot,
    pub r2: RegSlot,
}

#[derive(Copy, Clone, Debug)]
pub struct Reg1Unsigned1 {
    pub r0: RegSlot,
    pub c1: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct Arg {
    pub arg: u16,
    pub reg: RegSlot,
}

#[derive(Copy, Clone, Debug)]
pub struct CallI {
    pub dst: RegSlot,
    pub function: RegSlot,
    pub arg_count: u16,
    pub profile_id: Option<ProfileId>,
}

#[derive(Copy, Clone, Debug)]
pub struct ElementSlot {
    pub value: RegSlot,
    pub instance: RegSlot,
    pub slot_index: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct ElementSlotI1 {
    pub value: RegSlot,
    pub slot_index: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct ElementSlotI2 {
    pub value: RegSlot,
    pub slot_index1: u32,
    pub slot_index2: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct ElementCP {
    pub value: RegSlot,
    pub instance: RegSlot,
    pub cache_index: u32,
    pub profile_id: Option<ProfileId>,
}

#[derive(Copy, Clone, Debug)]
pub struct ElementI {
    pub value: RegSlot,
    pub instance: RegSlot,
    pub index: RegSlot,
    pub profile_id: Option<ProfileId>,
}

#[derive(Copy, Clone, Debug)]
pub struct BrReg1 {
    pub target: u32,
    pub r1: RegSlot,
}

#[derive(Copy, Clone, Debug)]
pub struct BrReg2 {
    pub target: u32,
    pub r1: RegSlot,
    pub r2: RegSlot,
}

/// A cursor over a bytecode buffer.
pub struct BytecodeReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BytecodeReader { bytes, pos: 0 }
    }

    /// The offset of the next unread byte.
    pub fn current_offset(&self) -> u32 {
        self.pos as u32
    }

    /// Rewind to an absolute offset.
    pub fn seek(&mut self, offset: u32) {
        debug_assert!((offset as usize) <= self.bytes.len());
        self.pos = offset as usize;
    }

    fn byte(&mut self) -> CodegenResult<u8> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| CodegenError::corrupt("truncated bytecode", self.pos as u32))?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> CodegenResult<u16> {
        Ok(u16::from_le_bytes([self.byte()?, self.byte()?]))
    }

    fn u32(&mut self) -> CodegenResult<u32> {
        Ok(u32::from_le_bytes([
            self.byte()?,
            self.byte()?,
            self.byte()?,
            self.byte()?,
        ]))
    }

    fn sized(&mut self, size: LayoutSize) -> CodegenResult<u32> {
        match size {
            LayoutSize::Small => {
                let v = self.byte()?;
                Ok(if v == u8::MAX { u32::MAX } else { v as u32 })
            }
            LayoutSize::Medium => {
                let v = self.u16()?;
                Ok(if v == u16::MAX { u32::MAX } else { v as u32 })
            }
            LayoutSize::Large => self.u32(),
        }
    }

    fn reg(&mut self, size: LayoutSize) -> CodegenResult<RegSlot> {
        self.sized(size)
    }

    /// Read the next opcode and its layout size. The caller is responsible
    /// for reading the layout operands next.
    pub fn read_op(&mut self) -> CodegenResult<(OpCode, LayoutSize)> {
        let offset = self.current_offset();
        let mut b = self.byte()?;
        let size = match b {
            MEDIUM_PREFIX => {
                b = self.byte()?;
                LayoutSize::Medium
            }
            LARGE_PREFIX => {
                b = self.byte()?;
                LayoutSize::Large
            }
            _ => LayoutSize::Small,
        };
        let op = *BYTECODE_OPCODES
            .get(b as usize)
            .ok_or_else(|| CodegenError::corrupt("unknown opcode", offset))?;
        Ok((op, size))
    }

    /// Peek the next opcode without consuming it.
    pub fn peek_op(&mut self) -> CodegenResult<OpCode> {
        let saved = self.pos;
        let res = self.read_op().map(|(op, _)| op);
        self.pos = saved;
        res
    }

    pub fn reg1(&mut self, size: LayoutSize) -> CodegenResult<Reg1> {
        Ok(Reg1 {
            r0: self.reg(size)?,
        })
    }

    pub fn reg2(&mut self, size: LayoutSize) -> CodegenResult<Reg2> {
        Ok(Reg2 {
            r0: self.reg(size)?,
            r1: self.reg(size)?,
        })
    }

    pub fn reg2_int1(&mut self, size: LayoutSize) -> CodegenResult<Reg2Int1> {
        Ok(Reg2Int1 {
            r0: self.reg(size)?,
            r1: self.reg(size)?,
            c1: self.u32()? as i32,
        })
    }

    pub fn reg3(&mut self, size: LayoutSize) -> CodegenResult<Reg3> {
        Ok(Reg3 {
            r0: self.reg(size)?,
            r1: self.reg(size)?,
            r2: self.reg(size)?,
        })
    }

    pub fn reg1_unsigned1(&mut self, size: LayoutSize) -> CodegenResult<Reg1Unsigned1> {
        Ok(Reg1Unsigned1 {
            r0: self.reg(size)?,
            c1: self.sized(size)?,
        })
    }

    pub fn unsigned1(&mut self, size: LayoutSize) -> CodegenResult<u32> {
        self.sized(size)
    }

    pub fn arg(&mut self, size: LayoutSize) -> CodegenResult<Arg> {
        let arg = self.sized(size)?;
        let reg = self.reg(size)?;
        let offset = self.current_offset();
        let arg = u16::try_from(arg)
            .map_err(|_| CodegenError::corrupt("argument slot out of range", offset))?;
        Ok(Arg { arg, reg })
    }

    pub fn arg_no_src(&mut self, size: LayoutSize) -> CodegenResult<u16> {
        let arg = self.sized(size)?;
        let offset = self.current_offset();
        u16::try_from(arg).map_err(|_| CodegenError::corrupt("argument slot out of range", offset))
    }

    pub fn start_call(&mut self) -> CodegenResult<u16> {
        self.u16()
    }

    pub fn call_i(&mut self, size: LayoutSize, profiled: bool) -> CodegenResult<CallI> {
        let dst = self.reg(size)?;
        let function = self.reg(size)?;
        let arg_count = self.u16()?;
        let profile_id = if profiled { Some(self.u16()?) } else { None };
        Ok(CallI {
            dst,
            function,
            arg_count,
            profile_id,
        })
    }

    pub fn element_slot(&mut self, size: LayoutSize) -> CodegenResult<ElementSlot> {
        Ok(ElementSlot {
            value: self.reg(size)?,
            instance: self.reg(size)?,
            slot_index: self.sized(size)?,
        })
    }

    pub fn element_slot_i1(&mut self, size: LayoutSize) -> CodegenResult<ElementSlotI1> {
        Ok(ElementSlotI1 {
            value: self.reg(size)?,
            slot_index: self.sized(size)?,
        })
    }

    pub fn element_slot_i2(&mut self, size: LayoutSize) -> CodegenResult<ElementSlotI2> {
        Ok(ElementSlotI2 {
            value: self.reg(size)?,
            slot_index1: self.sized(size)?,
            slot_index2: self.sized(size)?,
        })
    }

    pub fn element_cp(&mut self, size: LayoutSize, profiled: bool) -> CodegenResult<ElementCP> {
        Ok(ElementCP {
            value: self.reg(size)?,
            instance: self.reg(size)?,
            cache_index: self.sized(size)?,
            profile_id: if profiled { Some(self.u16()?) } else { None },
        })
    }

    pub fn element_i(&mut self, size: LayoutSize, profiled: bool) -> CodegenResult<ElementI> {
        Ok(ElementI {
            value: self.reg(size)?,
            instance: self.reg(size)?,
            index: self.reg(size)?,
            profile_id: if profiled { Some(self.u16()?) } else { None },
        })
    }

    pub fn br(&mut self) -> CodegenResult<u32> {
        self.u32()
    }

    pub fn br_reg1(&mut self, size: LayoutSize) -> CodegenResult<BrReg1> {
        Ok(BrReg1 {
            target: self.u32()?,
            r1: self.reg(size)?,
        })
    }

    pub fn br_reg2(&mut self, size: LayoutSize) -> CodegenResult<BrReg2> {
        Ok(BrReg2 {
            target: self.u32()?,
            r1: self.reg(size)?,
            r2: self.reg(size)?,
        })
    }
}

/// A label created by [`BytecodeWriter::create_label`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BcLabel(u32);

/// Assembles a bytecode stream.
pub struct BytecodeWriter {
    bytes: Vec<u8>,
    labels: Vec<Option<u32>>,
    fixups: Vec<(usize, BcLabel)>,
}

impl BytecodeWriter {
    pub fn new() -> Self {
        BytecodeWriter {
            bytes: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
        }
    }

    /// The offset the next emitted opcode will land at.
    pub fn current_offset(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn create_label(&mut self) -> BcLabel {
        self.labels.push(None);
        BcLabel(self.labels.len() as u32 - 1)
    }

    /// Bind `label` to the current offset.
    pub fn bind_label(&mut self, label: BcLabel) {
        debug_assert!(self.labels[label.0 as usize].is_none(), "label bound twice");
        self.labels[label.0 as usize] = Some(self.current_offset());
    }

    fn size_for(values: &[u32]) -> LayoutSize {
        let max = values
            .iter()
            .map(|&v| if v == u32::MAX { 0 } else { v })
            .max()
            .unwrap_or(0);
        if max < u8::MAX as u32 {
            LayoutSize::Small
        } else if max < u16::MAX as u32 {
            LayoutSize::Medium
        } else {
            LayoutSize::Large
        }
    }

    fn op(&mut self, op: OpCode, size: LayoutSize) {
        match size {
            LayoutSize::Small => {}
            LayoutSize::Medium => self.bytes.push(MEDIUM_PREFIX),
            LayoutSize::Large => self.bytes.push(LARGE_PREFIX),
        }
        self.bytes.push(opcode_to_byte(op));
    }

    fn sized(&mut self, v: u32, size: LayoutSize) {
        match size {
            LayoutSize::Small => self
                .bytes
                .push(if v == u32::MAX { u8::MAX } else { v as u8 }),
            LayoutSize::Medium => self.bytes.extend_from_slice(
                &(if v == u32::MAX { u16::MAX } else { v as u16 }).to_le_bytes(),
            ),
            LayoutSize::Large => self.bytes.extend_from_slice(&v.to_le_bytes()),
        }
    }

    fn u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn target(&mut self, label: BcLabel) {
        self.fixups.push((self.bytes.len(), label));
        self.u32(0);
    }

    pub fn emit_empty(&mut self, op: OpCode) {
        self.op(op, LayoutSize::Small);
    }

    pub fn emit_reg1(&mut self, op: OpCode, r0: RegSlot) {
        let size = Self::size_for(&[r0]);
        self.op(op, size);
        self.sized(r0, size);
    }

    pub fn emit_reg2(&mut self, op: OpCode, r0: RegSlot, r1: RegSlot) {
        let size = Self::size_for(&[r0, r1]);
        self.op(op, size);
        self.sized(r0, size);
        self.sized(r1, size);
    }

    pub fn emit_reg2_int1(&mut self, op: OpCode, r0: RegSlot, r1: RegSlot, c1: i32) {
        let size = Self::size_for(&[r0, r1]);
        self.op(op, size);
        self.sized(r0, size);
        self.sized(r1, size);
        self.u32(c1 as u32);
    }

    pub fn emit_reg3(&mut self, op: OpCode, r0: RegSlot, r1: RegSlot, r2: RegSlot) {
        let size = Self::size_for(&[r0, r1, r2]);
        self.op(op, size);
        self.sized(r0, size);
        self.sized(r1, size);
        self.sized(r2, size);
    }

    pub fn emit_reg1_unsigned1(&mut self, op: OpCode, r0: RegSlot, c1: u32) {
        let size = Self::size_for(&[r0, c1]);
        self.op(op, size);
        self.sized(r0, size);
        self.sized(c1, size);
    }

    pub fn emit_unsigned1(&mut self, op: OpCode, c1: u32) {
        let size = Self::size_for(&[c1]);
        self.op(op, size);
        self.sized(c1, size);
    }

    pub fn emit_arg(&mut self, arg: u16, reg: RegSlot) {
        let size = Self::size_for(&[arg as u32, reg]);
        self.op(OpCode::ArgOut_A, size);
        self.sized(arg as u32, size);
        self.sized(reg, size);
    }

    pub fn emit_arg_no_src(&mut self, arg: u16) {
        let size = Self::size_for(&[arg as u32]);
        self.op(OpCode::ArgOut_Env, size);
        self.sized(arg as u32, size);
    }

    pub fn emit_start_call(&mut self, arg_count: u16) {
        self.op(OpCode::StartCall, LayoutSize::Small);
        self.u16(arg_count);
    }

    pub fn emit_call(
        &mut self,
        op: OpCode,
        dst: RegSlot,
        function: RegSlot,
        arg_count: u16,
        profile_id: Option<ProfileId>,
    ) {
        debug_assert_eq!(op.is_profiled(), profile_id.is_some());
        let size = Self::size_for(&[dst, function]);
        self.op(op, size);
        self.sized(dst, size);
        self.sized(function, size);
        self.u16(arg_count);
        if let Some(id) = profile_id {
            self.u16(id);
        }
    }

    pub fn emit_element_slot(&mut self, op: OpCode, value: RegSlot, instance: RegSlot, slot: u32) {
        let size = Self::size_for(&[value, instance, slot]);
        self.op(op, size);
        self.sized(value, size);
        self.sized(instance, size);
        self.sized(slot, size);
    }

    pub fn emit_element_slot_i1(&mut self, op: OpCode, value: RegSlot, slot: u32) {
        let size = Self::size_for(&[value, slot]);
        self.op(op, size);
        self.sized(value, size);
        self.sized(slot, size);
    }

    pub fn emit_element_slot_i2(&mut self, op: OpCode, value: RegSlot, slot1: u32, slot2: u32) {
        let size = Self::size_for(&[value, slot1, slot2]);
        self.op(op, size);
        self.sized(value, size);
        self.sized(slot1, size);
        self.sized(slot2, size);
    }

    pub fn emit_element_cp(
        &mut self,
        op: OpCode,
        value: RegSlot,
        instance: RegSlot,
        cache_index: u32,
        profile_id: Option<ProfileId>,
    ) {
        debug_assert_eq!(op.is_profiled(), profile_id.is_some());
        let size = Self::size_for(&[value, instance, cache_index]);
        self.op(op, size);
        self.sized(value, size);
        self.sized(instance, size);
        self.sized(cache_index, size);
        if let Some(id) = profile_id {
            self.u16(id);
        }
    }

    pub fn emit_element_i(
        &mut self,
        op: OpCode,
        value: RegSlot,
        instance: RegSlot,
        index: RegSlot,
        profile_id: Option<ProfileId>,
    ) {
        debug_assert_eq!(op.is_profiled(), profile_id.is_some());
        let size = Self::size_for(&[value, instance, index]);
        self.op(op, size);
        self.sized(value, size);
        self.sized(instance, size);
        self.sized(index, size);
        if let Some(id) = profile_id {
            self.u16(id);
        }
    }

    pub fn emit_br(&mut self, op: OpCode, label: BcLabel) {
        self.op(op, LayoutSize::Small);
        self.target(label);
    }

    pub fn emit_br_reg1(&mut self, op: OpCode, r1: RegSlot, label: BcLabel) {
        let size = Self::size_for(&[r1]);
        self.op(op, size);
        self.target(label);
        self.sized(r1, size);
    }

    pub fn emit_br_reg2(&mut self, op: OpCode, r1: RegSlot, r2: RegSlot, label: BcLabel) {
        let size = Self::size_for(&[r1, r2]);
        self.op(op, size);
        self.target(label);
        self.sized(r1, size);
        self.sized(r2, size);
    }

    /// Terminate the stream, patch all branch targets, and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.emit_empty(OpCode::EndOfBlock);
        for (pos, label) in core::mem::take(&mut self.fixups) {
            let target = self.labels[label.0 as usize].expect("unbound label");
            self.bytes[pos..pos + 4].copy_from_slice(&target.to_le_bytes());
        }
        self.bytes
    }
}

impl Default for BytecodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NO_REGISTER;

    #[test]
    fn roundtrip_reg_layouts() {
        let mut w = BytecodeWriter::new();
        w.emit_reg1(OpCode::LdC_A_Null, 2);
        w.emit_reg2(OpCode::Ld_A, 300, 2);
        w.emit_reg3(OpCode::Add_A, 1, 2, 3);
        w.emit_empty(OpCode::Ret);
        let bytes = w.finish();

        let mut r = BytecodeReader::new(&bytes);
        let (op, size) = r.read_op().unwrap();
        assert_eq!(op, OpCode::LdC_A_Null);
        assert_eq!(r.reg1(size).unwrap().r0, 2);

        let (op, size) = r.read_op().unwrap();
        assert_eq!(op, OpCode::Ld_A);
        assert_eq!(size, LayoutSize::Medium);
        let l = r.reg2(size).unwrap();
        assert_eq!((l.r0, l.r1), (300, 2));

        let (op, size) = r.read_op().unwrap();
        assert_eq!(op, OpCode::Add_A);
        let l = r.reg3(size).unwrap();
        assert_eq!((l.r0, l.r1, l.r2), (1, 2, 3));

        assert_eq!(r.read_op().unwrap().0, OpCode::Ret);
        assert_eq!(r.read_op().unwrap().0, OpCode::EndOfBlock);
    }

    #[test]
    fn branch_targets_patch_to_bound_offsets() {
        let mut w = BytecodeWriter::new();
        let target = w.create_label();
        w.emit_br_reg1(OpCode::BrTrue_A, 1, target);
        w.emit_reg2(OpCode::Ld_A, 0, 1);
        w.bind_label(target);
        w.emit_empty(OpCode::Ret);
        let bytes = w.finish();

        let mut r = BytecodeReader::new(&bytes);
        let (op, size) = r.read_op().unwrap();
        assert_eq!(op, OpCode::BrTrue_A);
        let br = r.br_reg1(size).unwrap();
        // Skip the Ld_A and verify the branch lands on Ret.
        let (op, size) = r.read_op().unwrap();
        assert_eq!(op, OpCode::Ld_A);
        r.reg2(size).unwrap();
        assert_eq!(br.target, r.current_offset());
        assert_eq!(r.read_op().unwrap().0, OpCode::Ret);
    }

    #[test]
    fn no_register_survives_small_encoding() {
        let mut w = BytecodeWriter::new();
        w.emit_call(OpCode::CallI, NO_REGISTER, 3, 1, None);
        let bytes = w.finish();
        let mut r = BytecodeReader::new(&bytes);
        let (op, size) = r.read_op().unwrap();
        assert_eq!(op, OpCode::CallI);
        let call = r.call_i(size, false).unwrap();
        assert_eq!(call.dst, NO_REGISTER);
        assert_eq!(call.function, 3);
        assert_eq!(call.arg_count, 1);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut w = BytecodeWriter::new();
        w.emit_reg3(OpCode::Add_A, 1, 2, 3);
        let mut bytes = w.finish();
        bytes.truncate(2);
        let mut r = BytecodeReader::new(&bytes);
        let (_, size) = r.read_op().unwrap();
        assert!(r.reg3(size).is_err());
    }
}

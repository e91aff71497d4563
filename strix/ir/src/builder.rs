//! Translation of stack-based bytecode into linear IR.
//!
//! The translation is done in one pass, opcode by opcode. Each bytecode
//! opcode is decoded through its `(layout, size)` pair and handed to a small
//! per-layout build routine that constructs operands and appends one or a few
//! IR instructions. Branches record relocs that are resolved into labels
//! after the whole body has been read; calls link their out-going arguments
//! through a stack of pending `ArgOut`/`StartCall` instructions.
//!
//! Loop-body (OSR) compiles read only the loop's bytecode range and
//! additionally thread interpreter-frame slot loads/stores and a resume
//! offset through the IR; coroutines get a resume jump table prologue.

use crate::bailout::{
    BailOutData, BailOutInfo, BailOutKind, DEBUGGER_BAILOUT_KIND_FOR_CALL,
    DEBUGGER_BASE_BAILOUT_KIND_FOR_HELPER,
};
use crate::bytecode::{BytecodeReader, LayoutSize};
use crate::entities::{Instr, RegSlot, SymId, NO_BYTECODE_OFFSET, NO_REGISTER};
use crate::error::{CodegenError, CodegenResult};
use crate::func::{FrameDisplayCheckRecord, Func};
use crate::instr::{InstrData, InstrKind};
use crate::jitbody::{StatementBoundary, StatementReader, NO_STATEMENT_INDEX};
use crate::opcodes::{HelperMethod, LayoutKind, OpCode};
use crate::operand::{AddrKind, Opnd, RegOpnd, SymOpnd};
use crate::sym::PropertyKind;
use crate::types::{IrType, ObjectKind, ValueType};
use log::trace;
use strix_entity::packed_option::PackedOption;
use strix_entity::EntitySet;

/// Interpreter frame layout constants, in pointer-sized slots or bytes.
/// These mirror the interpreter's frame object; the JIT only ever forms
/// addresses with them.
pub const INTERPRETER_LOCALS_START_SLOT: u32 = 8;
const GENERATOR_FRAME_OFFSET: i32 = 0x18;
const INTERPRETER_CURRENT_LOC_OFFSET: i32 = 0x20;
const INTERPRETER_START_LOC_OFFSET: i32 = 0x28;
const FORMAL_PARAM_OFFSET: u32 = 2;
const MACH_PTR_BYTES: u32 = 8;
/// Scope slot arrays reserve their first entries for bookkeeping.
const FIRST_SCOPE_SLOT_INDEX: u32 = 2;

/// A pending branch whose target bytecode offset has not yet been assigned a
/// label.
struct BranchReloc {
    branch: Instr,
    /// Bytecode offset of the branch itself.
    offset: u32,
    /// Bytecode offset it targets.
    target_offset: u32,
    not_back_edge: bool,
}

/// Builds the IR for one function body or loop body.
///
/// Executed once per [`Func`]; see [`build_ir`].
pub struct IrBuilder<'f, 'b> {
    func: &'f mut Func,
    reader: BytecodeReader<'b>,
    statements: StatementReader<'b>,

    last_instr: Instr,
    function_start_offset: u32,
    last_offset: u32,
    offset_to_instr: Vec<PackedOption<Instr>>,

    branch_relocs: Vec<BranchReloc>,
    arg_stack: Vec<Instr>,
    args_on_stack: u32,
    calls_on_stack: u32,
    call_tree_has_some_profile_info: bool,

    /// `(handler target offset, is catch)` for enclosing try regions.
    handler_offset_stack: Vec<(u32, bool)>,
    finally_block_level: i32,

    first_temp: RegSlot,
    temp_map: Vec<Option<SymId>>,
    #[cfg(debug_assertions)]
    used_as_temp: EntitySet<SymId>,

    // Loop-body state.
    ld_slots: EntitySet<SymId>,
    st_slots: EntitySet<SymId>,
    loop_body_ret_ip_sym: Option<SymId>,
    loop_counter_sym: Option<SymId>,
    loop_header_range: Option<(u32, u32)>,

    /// Branches that need an ignore-exception bailout once labels are final.
    deferred_branch_bailouts: Vec<(Instr, u32)>,
}

/// Read the bytecode of `func` and generate its IR. The builder's only
/// entry point.
pub fn build_ir(func: &mut Func) -> CodegenResult<()> {
    let bytecode = func.body.bytecode.clone();
    let statements: Vec<StatementBoundary> = func.body.statement_map.clone();
    let mut builder = IrBuilder::new(func, &bytecode, &statements)?;
    builder.run()
}

impl<'f, 'b> IrBuilder<'f, 'b> {
    fn new(
        func: &'f mut Func,
        bytecode: &'b [u8],
        statements: &'b [StatementBoundary],
    ) -> CodegenResult<Self> {
        let first_temp = func.body.first_tmp_reg;
        let temp_count = func.body.temp_count as usize;

        let (function_start_offset, last_offset, count) = match &func.work_item {
            Some(item) => {
                let header = func
                    .body
                    .loop_header(item.loop_number)
                    .ok_or_else(|| CodegenError::corrupt("loop number out of range", 0))?;
                if header.end_offset >= func.body.byte_code_length() {
                    return Err(CodegenError::corrupt(
                        "loop header beyond bytecode",
                        header.end_offset,
                    ));
                }
                // Ret is created at end_offset + 1, so reserve one entry past it.
                (
                    header.start_offset,
                    header.end_offset,
                    header.end_offset as usize + 2,
                )
            }
            None => {
                // Skip the trailing EndOfBlock opcode.
                let last = func.body.byte_code_length().saturating_sub(1);
                (0, last, last as usize)
            }
        };

        let loop_header_range = func
            .work_item
            .as_ref()
            .and_then(|item| func.body.loop_header(item.loop_number))
            .map(|h| (h.start_offset, h.end_offset));

        let mut reader = BytecodeReader::new(bytecode);
        reader.seek(function_start_offset);

        // The head and tail sentinels; everything else goes between them.
        let head = func.create_instr({
            let mut d = InstrData::new(OpCode::FunctionEntry);
            d.kind = InstrKind::Entry;
            d
        });
        let tail = func.create_instr({
            let mut d = InstrData::new(OpCode::FunctionExit);
            d.kind = InstrKind::Exit;
            d
        });
        func.layout.append(head);
        func.layout.append(tail);
        func.head_instr = head.into();
        func.tail_instr = tail.into();

        let is_loop_body = func.is_loop_body();
        let mut builder = IrBuilder {
            func,
            reader,
            statements: StatementReader::new(statements),
            last_instr: head,
            function_start_offset,
            last_offset,
            offset_to_instr: vec![PackedOption::default(); count],
            branch_relocs: Vec::new(),
            arg_stack: Vec::new(),
            args_on_stack: 0,
            calls_on_stack: 0,
            call_tree_has_some_profile_info: false,
            handler_offset_stack: Vec::new(),
            finally_block_level: 0,
            first_temp,
            temp_map: vec![None; temp_count],
            #[cfg(debug_assertions)]
            used_as_temp: EntitySet::new(),
            ld_slots: EntitySet::new(),
            st_slots: EntitySet::new(),
            loop_body_ret_ip_sym: None,
            loop_counter_sym: None,
            loop_header_range,
            deferred_branch_bailouts: Vec::new(),
        };

        if is_loop_body {
            let sym = builder.func.sym_table.new_stack_sym(IrType::MachReg);
            builder.loop_body_ret_ip_sym = Some(sym);
        }
        if builder.func.body.local_closure_reg.is_some()
            && builder.func.local_closure_sym.is_none()
        {
            let reg = builder.func.body.local_closure_reg;
            let sym = builder.func.sym_table.new_stack_sym(IrType::Var);
            builder.func.sym_table.find_stack_mut(sym).unwrap().bytecode_reg = reg;
            builder.func.local_closure_sym = sym.into();
        }
        if builder.func.body.local_frame_display_reg.is_some()
            && builder.func.local_frame_display_sym.is_none()
        {
            let reg = builder.func.body.local_frame_display_reg;
            let sym = builder.func.sym_table.new_stack_sym(IrType::Var);
            builder.func.sym_table.find_stack_mut(sym).unwrap().bytecode_reg = reg;
            builder.func.local_frame_display_sym = sym.into();
        }

        Ok(builder)
    }

    fn run(&mut self) -> CodegenResult<()> {
        let mut statement_index = self.statements.statement_index();

        self.build_constant_loads()?;

        if !self.is_loop_body() && self.func.body.has_implicit_arg_ins {
            self.build_implicit_arg_ins()?;
        }
        if !self.is_loop_body() && self.func.body.has_rest_parameter {
            self.build_arg_in_rest()?;
        }

        // The locals on the stack are not yet initialized at the first
        // bailout, so don't restore them. For coroutines the bailout goes
        // after the jump table so resuming doesn't loop back to the start.
        if self.func.is_jit_in_debug_mode() && !self.func.body.is_coroutine {
            self.insert_bail_out_for_debugger(
                self.function_start_offset,
                BailOutKind::FORCE_BY_FLAG | BailOutKind::BREAKPOINT_IN_FUNCTION | BailOutKind::STEP,
                None,
            )?;
        }

        if !self.is_loop_body() {
            self.build_env_load()?;

            // The resume jump table goes right after the environment and
            // constants are loaded and before any other object (frame
            // display, local closure) is created: those are restored by the
            // bail-in code and must not be re-created on every resume.
            self.build_generator_jump_table()?;

            // When debugging generators the entry bailout sits after the
            // jump table so resuming gets to the right point first.
            if self.func.is_jit_in_debug_mode() && self.func.body.is_coroutine {
                self.insert_bail_out_for_debugger(
                    self.function_start_offset,
                    BailOutKind::FORCE_BY_FLAG
                        | BailOutKind::BREAKPOINT_IN_FUNCTION
                        | BailOutKind::STEP,
                    None,
                )?;
            }

            self.build_scope_prologue()?;
        }

        let mut offset = self.function_start_offset;
        if self.statements.at_statement_boundary(offset) {
            statement_index = self.add_statement_boundary(statement_index, offset)?;
        }

        let mut last_processed_for_loop_body = self.last_instr;
        loop {
            let (op, size) = self.reader.read_op()?;
            if self.reader.current_offset() > self.last_offset {
                break;
            }
            debug_assert!(op != OpCode::EndOfBlock);

            self.build_op(op, size, offset)?;

            if self.is_loop_body_in_try() && last_processed_for_loop_body != self.last_instr {
                self.flush_loop_body_st_slots(last_processed_for_loop_body)?;
                last_processed_for_loop_body = self.last_instr;
            }

            offset = self.reader.current_offset();

            if self.func.is_jit_in_debug_mode() {
                self.insert_debugger_post_op_bailout(op, offset)?;
            }

            while self.statements.at_statement_boundary(offset) {
                statement_index = self.add_statement_boundary(statement_index, offset)?;
            }
        }

        if statement_index != NO_STATEMENT_INDEX {
            // Inside a user statement at the end: emit a trailing pragma.
            self.add_statement_boundary(statement_index, NO_BYTECODE_OFFSET)?;
        }

        if self.is_loop_body() {
            // Resume the interpreter right after the loop.
            let ret_opnd = self.insert_loop_body_return_ip(offset, offset)?;
            self.generate_loop_body_slot_accesses(self.last_offset + 1)?;
            self.insert_done_loop_body_loop_counter(self.last_offset)?;
            let mut ret = InstrData::new(OpCode::Ret);
            ret.src1 = Some(ret_opnd);
            self.add_instr(ret, self.last_offset + 1)?;
        }

        self.insert_labels()?;

        debug_assert!(self.handler_offset_stack.is_empty());
        debug_assert_eq!(self.finally_block_level, 0);

        // Ignore-exception bailouts for branches, now that labels are final.
        for (instr, byte_code_offset) in core::mem::take(&mut self.deferred_branch_bailouts) {
            self.func.pool[instr].convert_to_bail_out(BailOutData::new(
                DEBUGGER_BASE_BAILOUT_KIND_FOR_HELPER,
                BailOutInfo::new(byte_code_offset),
            ));
        }

        self.attach_generator_resume_targets();
        self.emit_closure_range_checks()?;

        trace!(
            "built {} IR instructions, {} property syms",
            self.func.layout.len(),
            self.func.sym_table.prop_count()
        );
        Ok(())
    }

    // ---- Small queries ----

    fn is_loop_body(&self) -> bool {
        self.func.is_loop_body()
    }

    fn is_loop_body_in_try(&self) -> bool {
        self.is_loop_body() && self.func.has_try
    }

    fn reg_is_temp(&self, reg: RegSlot) -> bool {
        self.func.body.reg_is_temp(reg)
    }

    fn reg_is_constant(&self, reg: RegSlot) -> bool {
        self.func.body.reg_is_constant(reg)
    }

    fn reg_count(&self) -> u32 {
        self.func.body.locals_count + self.func.body.temp_count
    }

    fn get_mapped_temp(&self, reg: RegSlot) -> Option<SymId> {
        self.temp_map[(reg - self.first_temp) as usize]
    }

    fn set_mapped_temp(&mut self, reg: RegSlot, sym: SymId) {
        self.temp_map[(reg - self.first_temp) as usize] = Some(sym);
    }

    /// Is `offset` outside the loop body being compiled?
    fn is_loop_body_outer_offset(&self, offset: u32) -> bool {
        match self.loop_header_range {
            Some((start, end)) => offset >= end || offset < start,
            None => false,
        }
    }

    /// Branches that leave the loop body are redirected here, past the slot
    /// stores, where the exit label will be created.
    fn loop_body_exit_instr_offset(&self) -> u32 {
        self.loop_header_range.expect("not a loop body").1 + 1
    }

    fn is_loop_body_ret_ip_instr(&self, instr: Instr) -> bool {
        match (self.loop_body_ret_ip_sym, &self.func.pool[instr].dst) {
            (Some(ret_ip), Some(dst)) => dst.reg_sym() == Some(ret_ip),
            _ => false,
        }
    }

    fn env_reg_for_inner_frame_display(&self) -> Option<RegSlot> {
        self.func
            .body
            .local_frame_display_reg
            .or(self.func.body.env_reg)
    }

    // ---- Instruction insertion ----

    /// Append `data` after the current last instruction and record it in the
    /// offset map for later branch resolution.
    fn add_instr(&mut self, mut data: InstrData, offset: u32) -> CodegenResult<Instr> {
        if offset == NO_BYTECODE_OFFSET {
            data.bytecode_offset = self.func.pool[self.last_instr].bytecode_offset;
        } else {
            if offset as usize >= self.offset_to_instr.len() {
                return Err(CodegenError::corrupt("instruction offset out of range", offset));
            }
            if data.bytecode_offset == NO_BYTECODE_OFFSET {
                data.bytecode_offset = offset;
            }
        }
        let opcode = data.opcode;
        let dst_sym = data.dst.as_ref().and_then(Opnd::reg_sym);
        let instr = self.func.create_instr(data);
        self.func.layout.insert_after(instr, self.last_instr);
        if offset != NO_BYTECODE_OFFSET && self.offset_to_instr[offset as usize].is_none() {
            self.offset_to_instr[offset as usize] = instr.into();
        }
        self.last_instr = instr;
        self.record_def(dst_sym, instr);
        if opcode.is_temp_object_producing() {
            self.func.has_temp_object_producing_instr = true;
        }
        Ok(instr)
    }

    /// Insert `data` immediately before `before`, inheriting its bytecode
    /// offset.
    fn insert_instr(&mut self, mut data: InstrData, before: Instr) -> CodegenResult<Instr> {
        let offset = self.func.pool[before].bytecode_offset;
        data.bytecode_offset = offset;
        let dst_sym = data.dst.as_ref().and_then(Opnd::reg_sym);
        let instr = self.func.create_instr(data);
        if offset != NO_BYTECODE_OFFSET {
            if offset as usize >= self.offset_to_instr.len() {
                return Err(CodegenError::corrupt("instruction offset out of range", offset));
            }
            if self.offset_to_instr[offset as usize].expand() == Some(before) {
                self.offset_to_instr[offset as usize] = instr.into();
            }
        }
        self.func.layout.insert_before(instr, before);
        self.record_def(dst_sym, instr);
        Ok(instr)
    }

    /// Insert `data` right after `after` without touching `last_instr`,
    /// except when `after` *is* the last instruction.
    fn insert_instr_after(&mut self, data: InstrData, after: Instr) -> Instr {
        let dst_sym = data.dst.as_ref().and_then(Opnd::reg_sym);
        let instr = self.func.create_instr(data);
        self.func.layout.insert_after(instr, after);
        if self.last_instr == after {
            self.last_instr = instr;
        }
        self.record_def(dst_sym, instr);
        instr
    }

    fn record_def(&mut self, dst_sym: Option<SymId>, instr: Instr) {
        if let Some(sym) = dst_sym {
            if let Some(data) = self.func.sym_table.find_stack_mut(sym) {
                data.record_def(instr);
            }
        }
    }

    // ---- Statement boundaries & bailout injection ----

    fn add_statement_boundary(&mut self, statement_index: u32, offset: u32) -> CodegenResult<u32> {
        // Under the debugger the statement map is exact; boundaries with an
        // unknown index are synthetic and would confuse stepping.
        if !(statement_index == NO_STATEMENT_INDEX && self.func.is_jit_in_debug_mode()) {
            self.add_instr(InstrData::pragma(statement_index), offset)?;
        }

        let mut hit = false;
        if let Some(injection) = &self.func.config.bailout_injection {
            if !self.func.has_try && statement_index != NO_STATEMENT_INDEX {
                let char_offset = self
                    .statements
                    .current_boundary()
                    .map(|b| b.char_offset)
                    .unwrap_or(0);
                hit = injection.at_every_line;
                if !hit {
                    if let Some((line, line_start, _)) =
                        injection.line_cache.line_for_character_offset(char_offset)
                    {
                        let line = line + 1;
                        let col = char_offset - line_start;
                        hit = injection
                            .locations
                            .iter()
                            .any(|&(l, c)| l == line && c.map_or(true, |c| c == col));
                    }
                }
            }
        }
        if hit {
            self.inject_bail_out(offset)?;
        }

        Ok(self.statements.move_next_statement_boundary())
    }

    fn inject_bail_out(&mut self, offset: u32) -> CodegenResult<()> {
        let bail_out_offset = if offset == NO_BYTECODE_OFFSET {
            self.func.pool[self.last_instr].bytecode_offset
        } else {
            offset
        };
        let zero = Opnd::IntConst {
            value: 0,
            ty: IrType::Int32,
        };
        let mut data = InstrData::new(OpCode::BailOnEqual);
        data.src1 = Some(zero);
        data.src2 = Some(zero);
        data.convert_to_bail_out(BailOutData::new(
            BailOutKind::INJECTED,
            BailOutInfo::new(bail_out_offset),
        ));
        self.add_instr(data, offset)?;
        Ok(())
    }

    /// Conditional bailout for breaking into the interpreter debug thunk.
    fn insert_bail_out_for_debugger(
        &mut self,
        byte_code_offset: u32,
        kind: BailOutKind,
        insert_before: Option<Instr>,
    ) -> CodegenResult<Instr> {
        debug_assert!(self.func.is_jit_in_debug_mode());
        debug_assert!(byte_code_offset != NO_BYTECODE_OFFSET);
        let mut data = InstrData::new(OpCode::BailForDebugger);
        data.convert_to_bail_out(BailOutData::new(kind, BailOutInfo::new(byte_code_offset)));
        match insert_before {
            Some(before) => self.insert_instr(data, before),
            None => {
                let offset = self.func.pool[self.last_instr].bytecode_offset;
                self.add_instr(data, offset)
            }
        }
    }

    fn insert_debugger_post_op_bailout(&mut self, op: OpCode, offset: u32) -> CodegenResult<()> {
        let last = self.last_instr;
        let last_data = &self.func.pool[last];
        let helper_can_throw = last_data.opcode == OpCode::CallHelper
            && last_data
                .src1
                .as_ref()
                .and_then(Opnd::as_helper)
                .is_some_and(HelperMethod::can_throw);
        if !(op.needs_post_op_debug_bailout() || helper_can_throw) {
            return Ok(());
        }

        if self.func.pool[last].is_branch() {
            // A bailout block after a branch can become dead; convert the
            // branch itself once its label is known.
            self.deferred_branch_bailouts.push((last, offset));
        } else if self.func.pool[last].opcode == OpCode::Throw {
            self.func.pool[last].convert_to_bail_out(BailOutData::new(
                DEBUGGER_BASE_BAILOUT_KIND_FOR_HELPER,
                BailOutInfo::new(offset),
            ));
        } else {
            let mut kind = DEBUGGER_BASE_BAILOUT_KIND_FOR_HELPER;
            if op.has_implicit_call() {
                // Stepping out of e.g. valueOf called from a helper behaves
                // like returning from a call.
                kind |= DEBUGGER_BAILOUT_KIND_FOR_CALL;
            }
            self.insert_bail_out_for_debugger(offset, kind, None)?;
        }
        Ok(())
    }

    // ---- BailOnNoProfile ----

    fn do_bail_on_no_profile(&self) -> bool {
        let body = &self.func.body;
        if !self.func.config.do_glob_opt || body.is_coroutine {
            return false;
        }
        match &body.profile {
            Some(profile) => {
                profile.profiled_iterations != 0 && !profile.no_profile_bailouts_disabled
            }
            None => false,
        }
    }

    fn insert_bail_on_no_profile(&mut self) -> CodegenResult<()> {
        debug_assert!(self.do_bail_on_no_profile());
        if self.call_tree_has_some_profile_info {
            return Ok(());
        }

        // Only insert at the outermost StartCall of the pending call tree.
        let mut start_call = None;
        let mut count = 0;
        for &arg in &self.arg_stack {
            if self.func.pool[arg].opcode == OpCode::StartCall {
                start_call = Some(arg);
                count += 1;
                if count > 1 {
                    return Ok(());
                }
            }
        }
        let start_call =
            start_call.ok_or_else(|| CodegenError::corrupt("call without StartCall", 0))?;

        let prev = self.func.layout.prev(start_call);
        if prev.map_or(true, |p| self.func.pool[p].opcode != OpCode::BailOnNoProfile) {
            self.insert_instr(InstrData::new(OpCode::BailOnNoProfile), start_call)?;
        }
        Ok(())
    }

    // ---- Operand and symbol construction ----

    fn check_reg(&self, reg: RegSlot, offset: u32) -> CodegenResult<()> {
        if reg == NO_REGISTER || reg >= self.reg_count() {
            return Err(CodegenError::corrupt("register out of range", offset));
        }
        Ok(())
    }

    /// Map a source register to its symbol id, remapping temps and marking
    /// loop-body entry loads.
    fn build_src_stack_sym_id(&mut self, reg: RegSlot) -> CodegenResult<SymId> {
        self.check_reg(reg, self.reader.current_offset())?;
        let sym_id;
        if self.reg_is_temp(reg) {
            // A use of a temp: map the reg slot to its current sym id.
            // Temp uses must always be processed before temp defs.
            match self.get_mapped_temp(reg) {
                Some(mapped) => sym_id = mapped,
                None => {
                    // Temps live into the loop via a "with" scope behave as
                    // locals and keep their register as their id.
                    debug_assert!(self.is_loop_body());
                    #[cfg(debug_assertions)]
                    debug_assert!(!self.used_as_temp.contains(SymId::from_u32(reg)));
                    sym_id = SymId::from_u32(reg);
                    self.set_mapped_temp(reg, sym_id);
                    self.ensure_loop_body_load_slot(sym_id, false)?;
                }
            }
        } else {
            sym_id = SymId::from_u32(reg);
            if self.is_loop_body() && !self.reg_is_constant(reg) {
                self.ensure_loop_body_load_slot(sym_id, false)?;
            }
        }
        Ok(sym_id)
    }

    fn build_src_opnd(&mut self, reg: RegSlot) -> CodegenResult<Opnd> {
        self.build_src_opnd_typed(reg, IrType::Var)
    }

    fn build_src_opnd_typed(&mut self, reg: RegSlot, ty: IrType) -> CodegenResult<Opnd> {
        let sym_id = self.build_src_stack_sym_id(reg)?;
        self.func
            .sym_table
            .find_or_create_stack(sym_id, Some(reg), ty);
        Ok(Opnd::Reg(RegOpnd::new(sym_id, ty)))
    }

    fn build_dst_opnd(&mut self, reg: RegSlot) -> CodegenResult<Opnd> {
        self.build_dst_opnd_full(reg, IrType::Var, false, false)
    }

    fn build_dst_opnd_full(
        &mut self,
        dst_reg: RegSlot,
        ty: IrType,
        is_catch_object: bool,
        reuse_temp: bool,
    ) -> CodegenResult<Opnd> {
        self.check_reg(dst_reg, self.reader.current_offset())?;
        let sym_id;
        let mut bytecode_reg = Some(dst_reg);
        if self.reg_is_temp(dst_reg) {
            #[cfg(debug_assertions)]
            if self.is_loop_body() {
                // A temp loaded via LdSlot is live into the loop (a "with"
                // value); those must never be redefined as plain temps.
                debug_assert!(!self.ld_slots.contains(SymId::from_u32(dst_reg)));
                self.used_as_temp.insert(SymId::from_u32(dst_reg));
            }
            match self.get_mapped_temp(dst_reg) {
                None => {
                    // First def of this temp keeps the front end's number.
                    sym_id = SymId::from_u32(dst_reg);
                    self.set_mapped_temp(dst_reg, sym_id);
                }
                Some(mapped) if reuse_temp => sym_id = mapped,
                Some(_) => {
                    // A new value in the temp: give it a fresh identity.
                    sym_id = self.func.sym_table.new_id();
                    self.set_mapped_temp(dst_reg, sym_id);
                }
            }
        } else {
            sym_id = SymId::from_u32(dst_reg);
            if self.reg_is_constant(dst_reg) {
                // Constants need no bailout tracking.
                bytecode_reg = None;
            } else if self.is_loop_body() {
                self.set_loop_body_st_slot(sym_id, is_catch_object);
                // The symbol must also be loaded so it is defined on every
                // path through the loop.
                self.ensure_loop_body_load_slot(sym_id, is_catch_object)?;
            }
        }

        let sym = self
            .func
            .sym_table
            .find_or_create_stack(sym_id, bytecode_reg, ty);
        if is_catch_object {
            sym.is_catch_object = true;
        }
        // Reset on every def; single-def construction decides anew.
        sym.is_safe_this = false;
        Ok(Opnd::Reg(RegOpnd::new(sym_id, ty)))
    }

    fn build_indir_opnd(&mut self, base: SymId, offset: i32, ty: IrType) -> Opnd {
        Opnd::Indir {
            base,
            index: None.into(),
            offset,
            scale: 0,
            ty,
        }
    }

    fn build_field_opnd(
        &mut self,
        reg: RegSlot,
        property_id: u32,
        property_id_index: Option<u32>,
        kind: PropertyKind,
        cache_index: Option<u32>,
        is_load: bool,
    ) -> CodegenResult<Opnd> {
        if let Some(index) = cache_index {
            if index >= self.func.body.inline_cache_count {
                return Err(CodegenError::corrupt(
                    "inline cache index out of range",
                    self.reader.current_offset(),
                ));
            }
        }
        let parent = self.build_src_stack_sym_id(reg)?;
        self.func
            .sym_table
            .find_or_create_stack(parent, Some(reg), IrType::Var);
        let prop = self.func.sym_table.find_or_create_property(
            parent,
            property_id,
            property_id_index,
            None,
            kind,
        );
        if is_load && cache_index.is_some() {
            let prop_data = self.func.sym_table.prop_mut(prop);
            if prop_data.load_cache_index.is_none() {
                prop_data.load_cache_index = cache_index;
            }
        }
        Ok(Opnd::Sym(SymOpnd {
            sym: prop,
            ty: IrType::Var,
            cache_index,
        }))
    }

    /// Field operand for a sym-id-addressed property, used by closure and
    /// loop-body slot traffic where the parent is a backend symbol.
    fn field_opnd_on_sym(&mut self, parent: SymId, property_id: u32, kind: PropertyKind) -> Opnd {
        let prop = self
            .func
            .sym_table
            .find_or_create_property(parent, property_id, None, None, kind);
        Opnd::Sym(SymOpnd {
            sym: prop,
            ty: IrType::Var,
            cache_index: None,
        })
    }

    // ---- Prologue pieces ----

    fn build_constant_loads(&mut self) -> CodegenResult<()> {
        let count = self.func.body.const_count();
        for reg in 1..count {
            let entry = self.func.body.const_table[(reg - 1) as usize];
            let dst = self.build_dst_opnd(reg)?;
            debug_assert!(self.reg_is_constant(reg));
            let sym_id = dst.reg_sym().unwrap();
            {
                let sym = self.func.sym_table.find_stack_mut(sym_id).unwrap();
                sym.is_from_const_table = true;
                sym.is_const = true;
            }
            let mut dst = dst;
            if let Opnd::Reg(r) = &mut dst {
                r.value_type = entry.ty.into();
            }
            let instr = InstrData::unary(
                OpCode::Ld_A,
                dst,
                Opnd::Addr {
                    value: entry.value,
                    kind: AddrKind::Var,
                },
            );
            self.add_instr(instr, NO_BYTECODE_OFFSET)?;
        }
        Ok(())
    }

    fn build_implicit_arg_ins(&mut self) -> CodegenResult<()> {
        let start_reg = self.func.body.const_count() - 1;
        for i in 1..self.func.body.in_params_count {
            self.build_arg_in(NO_BYTECODE_OFFSET, start_reg + i as u32, i)?;
        }
        Ok(())
    }

    fn build_arg_in(&mut self, offset: u32, dst_reg: RegSlot, argument: u16) -> CodegenResult<()> {
        let param = self
            .func
            .sym_table
            .new_param_slot_sym(argument + 1, IrType::Var);
        self.func.sym_table.find_stack_mut(param).unwrap().offset =
            Some((argument as u32 + FORMAL_PARAM_OFFSET) * MACH_PTR_BYTES);
        let dst = self.build_dst_opnd(dst_reg)?;
        let instr = InstrData::unary(OpCode::ArgIn_A, dst, Opnd::Reg(RegOpnd::new(param, IrType::Var)));
        self.add_instr(instr, offset)?;
        Ok(())
    }

    fn build_arg_in_rest(&mut self) -> CodegenResult<()> {
        let rest_reg = self.func.body.const_count() - 1 + self.func.body.in_params_count as u32;
        let dst = self.build_dst_opnd(rest_reg)?;
        let mut dst = dst;
        if let Opnd::Reg(r) = &mut dst {
            r.value_type = ValueType::Object(ObjectKind::Array);
        }
        let instr = InstrData::with_dst(OpCode::ArgIn_Rest, dst);
        self.add_instr(instr, NO_BYTECODE_OFFSET)?;
        Ok(())
    }

    /// The implicit environment load indicated by the function body's
    /// attributes: `LdEnv`, or `LdHandlerScope` from `this` for event
    /// handlers.
    fn build_env_load(&mut self) -> CodegenResult<()> {
        let offset = NO_BYTECODE_OFFSET;
        if let Some(env_reg) = self.func.body.env_reg {
            if !self.reg_is_constant(env_reg) {
                let (opcode, src) = match self.func.body.this_reg_for_event_handler {
                    Some(this_reg) => {
                        self.build_arg_in(offset, this_reg, 0)?;
                        (OpCode::LdHandlerScope, Some(self.build_src_opnd(this_reg)?))
                    }
                    None => (OpCode::LdEnv, None),
                };
                let dst = self.build_dst_opnd(env_reg)?;
                let mut instr = InstrData::with_dst(opcode, dst);
                instr.src1 = src;
                let added = self.add_instr(instr, offset)?;
                self.mark_not_number_if_single_def(added);
            }
        }
        Ok(())
    }

    /// Scope materialization: function-expression scope, scope
    /// object/slots, and the frame display.
    fn build_scope_prologue(&mut self) -> CodegenResult<()> {
        let offset = NO_BYTECODE_OFFSET;
        let body_env_reg = self.func.body.env_reg;

        let func_expr_scope_reg = self.func.body.func_expr_scope_reg;
        if let Some(scope_reg) = func_expr_scope_reg {
            let dst = self.build_dst_opnd(scope_reg)?;
            self.add_instr(InstrData::with_dst(OpCode::NewPseudoScope, dst), offset)?;
        }

        let closure_reg = self.func.body.local_closure_reg;
        let mut closure_opnd = None;
        if let Some(reg) = closure_reg {
            debug_assert!(!self.reg_is_constant(reg));
            let dst = if self.func.config.do_stack_scope_slots {
                Opnd::Reg(RegOpnd::new(
                    self.func.sym_table.new_stack_sym(IrType::Var),
                    IrType::Var,
                ))
            } else {
                self.build_dst_opnd(reg)?
            };
            let added = if self.func.body.has_scope_object {
                self.add_instr(InstrData::with_dst(OpCode::NewScopeObject, dst), offset)?
            } else {
                let op = if self.func.config.do_stack_scope_slots {
                    OpCode::NewStackScopeSlots
                } else {
                    OpCode::NewScopeSlots
                };
                let size = if self.func.body.is_param_and_body_scope_merged {
                    self.func.body.scope_slot_array_size
                } else {
                    self.func.body.param_scope_slot_array_size
                };
                let src = Opnd::IntConst {
                    value: (size + FIRST_SCOPE_SLOT_INDEX) as i64,
                    ty: IrType::Uint32,
                };
                self.add_instr(InstrData::unary(op, dst, src), offset)?
            };
            self.mark_not_number_if_single_def(added);
            closure_opnd = Some(dst);

            if self.func.config.do_stack_scope_slots {
                // Save the scope-slot pointer through the stack closure sym.
                let closure_sym = self.func.local_closure_sym.expand().ok_or_else(|| {
                    CodegenError::corrupt("stack scope slots without closure register", 0)
                })?;
                let init_dst = Opnd::Reg(RegOpnd::new(closure_sym, IrType::Var));
                self.add_instr(InstrData::with_dst(OpCode::InitLocalClosure, init_dst), offset)?;
                let field = self.field_opnd_on_sym(closure_sym, 0, PropertyKind::Slots);
                self.add_instr(InstrData::unary(OpCode::StSlot, field, dst), offset)?;
            }
        }

        if let Some(frame_display_reg) = self.func.body.local_frame_display_reg {
            debug_assert!(!self.reg_is_constant(frame_display_reg));
            let op = if self.func.config.do_stack_scope_slots {
                OpCode::NewStackFrameDisplay
            } else {
                OpCode::LdFrameDisplay
            };

            let mut intermediate = None;
            if let Some(scope_reg) = func_expr_scope_reg {
                // The function expression scope goes ahead of any enclosing
                // scopes.
                let scope_opnd = self.build_src_opnd(scope_reg)?;
                let dst = if closure_reg.is_some() {
                    Opnd::Reg(RegOpnd::new(
                        self.func.sym_table.new_stack_sym(IrType::Var),
                        IrType::Var,
                    ))
                } else {
                    self.build_dst_opnd(frame_display_reg)?
                };
                let mut instr = InstrData::unary(OpCode::LdFrameDisplay, dst, scope_opnd);
                if let Some(env_reg) = body_env_reg {
                    instr.src2 = Some(self.build_src_opnd(env_reg)?);
                }
                self.add_instr(instr, offset)?;
                intermediate = Some(dst);
            }

            if let Some(closure) = closure_opnd {
                let dst = if self.func.config.do_stack_scope_slots {
                    Opnd::Reg(RegOpnd::new(
                        self.func.sym_table.new_stack_sym(IrType::Var),
                        IrType::Var,
                    ))
                } else {
                    self.build_dst_opnd(frame_display_reg)?
                };
                let mut instr = InstrData::unary(op, dst, closure);
                if let Some(fd) = intermediate {
                    // Building on the intermediate LdFrameDisplay result.
                    instr.src2 = Some(fd);
                } else if let Some(env_reg) = body_env_reg {
                    // Building on the enclosing function's environment.
                    instr.src2 = Some(self.build_src_opnd(env_reg)?);
                }
                let added = self.add_instr(instr, offset)?;
                self.mark_not_number_if_single_def(added);

                if self.func.config.do_stack_frame_display {
                    let fd_sym = self.func.local_frame_display_sym.expand().ok_or_else(|| {
                        CodegenError::corrupt("stack frame display without register", 0)
                    })?;
                    let init_dst = Opnd::Reg(RegOpnd::new(fd_sym, IrType::Var));
                    self.add_instr(
                        InstrData::with_dst(OpCode::InitLocalClosure, init_dst),
                        offset,
                    )?;
                    let field = self.field_opnd_on_sym(fd_sym, 0, PropertyKind::Slots);
                    self.add_instr(InstrData::unary(OpCode::StSlot, field, dst), offset)?;
                }
            }
        }

        Ok(())
    }

    fn mark_not_number_if_single_def(&mut self, instr: Instr) {
        if let Some(sym) = self.func.pool[instr].dst.as_ref().and_then(Opnd::reg_sym) {
            if let Some(data) = self.func.sym_table.find_stack_mut(sym) {
                if data.is_single_def {
                    data.is_not_number = true;
                }
            }
        }
    }

    // ---- Generator jump table ----

    /// Build the resume dispatch prologue for coroutines: check whether the
    /// generator already has an interpreter frame, create one through the
    /// helper if not, and otherwise jump into the resume table.
    fn build_generator_jump_table(&mut self) -> CodegenResult<()> {
        if !self.func.body.is_coroutine {
            return Ok(());
        }
        // Resuming reconstructs the frame from the interpreter, so the
        // argument-passing optimization can't be applied.
        self.func.can_do_inline_arg_opt = false;
        let offset = self.function_start_offset;

        // s1 = Ld_A prm1: the generator object is the first argument.
        let gen_param = self.func.sym_table.new_param_slot_sym(1, IrType::MachPtr);
        self.func.sym_table.find_stack_mut(gen_param).unwrap().offset =
            Some(FORMAL_PARAM_OFFSET * MACH_PTR_BYTES);
        let gen_reg_sym = self.func.sym_table.new_stack_sym(IrType::MachPtr);
        let gen_reg = Opnd::Reg(RegOpnd::new(gen_reg_sym, IrType::MachPtr));
        self.add_instr(
            InstrData::unary(
                OpCode::Ld_A,
                gen_reg,
                Opnd::Reg(RegOpnd::new(gen_param, IrType::MachPtr)),
            ),
            offset,
        )?;

        // s2 = Ld_A s1[generator frame]
        let gen_frame_sym = self.func.sym_table.new_stack_sym(IrType::MachPtr);
        let gen_frame = Opnd::Reg(RegOpnd::new(gen_frame_sym, IrType::MachPtr));
        let frame_src = self.build_indir_opnd(gen_reg_sym, GENERATOR_FRAME_OFFSET, IrType::MachPtr);
        self.add_instr(InstrData::unary(OpCode::Ld_A, gen_frame, frame_src), offset)?;

        let jump_table_label = self.func.create_instr(InstrData::label());
        let function_begin_label = self.func.create_instr(InstrData::label());

        // Already running: skip the frame creation.
        let mut br = InstrData::branch(OpCode::BrNotAddr_A);
        br.src1 = Some(gen_frame);
        br.src2 = Some(Opnd::null_addr());
        br.set_branch_target(jump_table_label);
        self.add_instr(br, offset)?;

        // First entry: create the interpreter frame through the helper.
        let mut create = InstrData::unary(
            OpCode::CallHelper,
            gen_frame,
            Opnd::HelperCall(HelperMethod::GeneratorCreateInterpreterFrame),
        );
        create.src2 = Some(gen_reg);
        self.add_instr(create, offset)?;

        let mut br = InstrData::branch(OpCode::Br);
        br.set_branch_target(function_begin_label);
        self.add_instr(br, offset)?;

        // $jumpTable:
        self.add_existing_instr(jump_table_label, offset)?;

        // Interpreter bytecode offset = current location - start location.
        let cur_loc_sym = self.func.sym_table.new_stack_sym(IrType::MachPtr);
        let cur_loc = Opnd::Reg(RegOpnd::new(cur_loc_sym, IrType::MachPtr));
        let src = self.build_indir_opnd(gen_frame_sym, INTERPRETER_CURRENT_LOC_OFFSET, IrType::MachPtr);
        self.add_instr(InstrData::unary(OpCode::Ld_A, cur_loc, src), offset)?;

        let start_loc_sym = self.func.sym_table.new_stack_sym(IrType::MachPtr);
        let start_loc = Opnd::Reg(RegOpnd::new(start_loc_sym, IrType::MachPtr));
        let src = self.build_indir_opnd(gen_frame_sym, INTERPRETER_START_LOC_OFFSET, IrType::MachPtr);
        self.add_instr(InstrData::unary(OpCode::Ld_A, start_loc, src), offset)?;

        let cur_offset_sym = self.func.sym_table.new_stack_sym(IrType::Uint32);
        let cur_offset = Opnd::Reg(RegOpnd::new(cur_offset_sym, IrType::Uint32));
        self.add_instr(
            InstrData::binary(OpCode::Sub_I4, cur_offset, cur_loc, start_loc),
            offset,
        )?;

        // The resume dispatch itself; targets are attached once the yield
        // resume labels exist.
        let mut jump = InstrData::new(OpCode::GeneratorResumeJumpTable);
        jump.src1 = Some(cur_offset);
        jump.kind = InstrKind::Branch {
            targets: Default::default(),
        };
        let jump = self.add_instr(jump, offset)?;
        self.func.generator_jump_table_instr = jump.into();

        self.add_existing_instr(function_begin_label, offset)?;
        Ok(())
    }

    /// Append an instruction that was created ahead of time (labels whose
    /// entity had to exist before their insertion point).
    fn add_existing_instr(&mut self, instr: Instr, offset: u32) -> CodegenResult<()> {
        if offset != NO_BYTECODE_OFFSET {
            if offset as usize >= self.offset_to_instr.len() {
                return Err(CodegenError::corrupt("instruction offset out of range", offset));
            }
            if self.func.pool[instr].bytecode_offset == NO_BYTECODE_OFFSET {
                self.func.pool[instr].bytecode_offset = offset;
            }
            if self.offset_to_instr[offset as usize].is_none() {
                self.offset_to_instr[offset as usize] = instr.into();
            }
        } else {
            self.func.pool[instr].bytecode_offset =
                self.func.pool[self.last_instr].bytecode_offset;
        }
        self.func.layout.insert_after(instr, self.last_instr);
        self.last_instr = instr;
        Ok(())
    }

    fn attach_generator_resume_targets(&mut self) {
        if let Some(jump) = self.func.generator_jump_table_instr.expand() {
            let labels: Vec<Instr> = self
                .func
                .yield_resume_points
                .iter()
                .map(|&(_, label)| label)
                .collect();
            if let InstrKind::Branch { targets } = &mut self.func.pool[jump].kind {
                targets.clear();
                targets.extend(labels.into_iter().map(Into::into));
            }
        }
    }

    // ---- Loop body machinery ----

    fn loop_body_slot_opnd(&mut self, sym_id: SymId) -> Opnd {
        debug_assert!(!self.reg_is_constant(sym_id.as_u32()));
        let loop_param = self.func.ensure_loop_param_sym();
        self.field_opnd_on_sym(
            loop_param,
            sym_id.as_u32() + INTERPRETER_LOCALS_START_SLOT,
            PropertyKind::LocalSlots,
        )
    }

    fn ensure_loop_body_load_slot(
        &mut self,
        sym_id: SymId,
        is_catch_object: bool,
    ) -> CodegenResult<()> {
        // Catch objects are defined by the handler, not live on entry;
        // loading one would read an uninitialized slot.
        if is_catch_object {
            return Ok(());
        }
        let reg = sym_id.as_u32();
        if self
            .func
            .sym_table
            .find_or_create_stack(sym_id, Some(reg), IrType::Var)
            .is_catch_object
        {
            return Ok(());
        }
        if reg >= self.reg_count() {
            return Err(CodegenError::corrupt("slot symbol out of range", reg));
        }
        if !self.ld_slots.insert(sym_id) {
            return Ok(());
        }

        let field = self.loop_body_slot_opnd(sym_id);
        let mut dst = Opnd::Reg(RegOpnd::new(sym_id, IrType::Var));
        let profiled_type = self
            .func
            .work_item
            .as_ref()
            .and_then(|item| item.sym_value_types.get(&reg).copied());
        if let (Opnd::Reg(r), Some(vt)) = (&mut dst, profiled_type) {
            r.value_type = vt;
        }
        let instr = InstrData::unary(OpCode::LdSlot, dst, field);
        let head = self.func.head_instr.unwrap();
        self.insert_instr_after(instr, head);
        Ok(())
    }

    fn set_loop_body_st_slot(&mut self, sym_id: SymId, is_catch_object: bool) {
        if self.func.has_try {
            // Storing a catch object would write an uninitialized value.
            if is_catch_object {
                return;
            }
            if self
                .func
                .sym_table
                .find_stack(sym_id)
                .is_some_and(|s| s.is_catch_object)
            {
                return;
            }
        }
        self.st_slots.insert(sym_id);
    }

    fn make_loop_body_st_slot(&mut self, reg: RegSlot) -> CodegenResult<InstrData> {
        debug_assert!(!self.reg_is_constant(reg));
        let sym_id = SymId::from_u32(reg);
        let field = self.loop_body_slot_opnd(sym_id);
        let src = self.build_src_opnd(reg)?;
        let opcode = if self.func.config.boxed_interpreter_slots {
            OpCode::StSlotBoxTemp
        } else {
            OpCode::StSlot
        };
        Ok(InstrData::unary(opcode, field, src))
    }

    /// For loop bodies inside try regions every def of a non-temp register
    /// is write-through: flush a store for each new def since the last
    /// opcode.
    fn flush_loop_body_st_slots(&mut self, last_processed: Instr) -> CodegenResult<()> {
        // Walk backward so the latest def of a register wins.
        let mut to_store: Vec<RegSlot> = Vec::new();
        let mut cur = self.last_instr;
        while cur != last_processed {
            let prev = self
                .func
                .layout
                .prev(cur)
                .expect("walked past the head instruction");
            if let Some(sym_id) = self.func.pool[cur].dst.as_ref().and_then(Opnd::reg_sym) {
                let has_reg = self
                    .func
                    .sym_table
                    .find_stack(sym_id)
                    .and_then(|s| s.bytecode_reg);
                if let Some(reg) = has_reg {
                    if !self.reg_is_temp(reg) && !self.reg_is_constant(reg) {
                        if self.st_slots.remove(sym_id) {
                            to_store.push(reg);
                        } else {
                            debug_assert!(
                                self.func
                                    .sym_table
                                    .find_stack(sym_id)
                                    .is_some_and(|s| s.is_catch_object)
                            );
                        }
                    }
                }
            }
            cur = prev;
        }
        for reg in to_store {
            let st = self.make_loop_body_st_slot(reg)?;
            self.add_instr(st, NO_BYTECODE_OFFSET)?;
        }
        Ok(())
    }

    fn insert_loop_body_return_ip(&mut self, target_offset: u32, offset: u32) -> CodegenResult<Opnd> {
        let ret_ip = self
            .loop_body_ret_ip_sym
            .expect("return IP requested outside a loop body");
        let dst = Opnd::Reg(RegOpnd::new(ret_ip, IrType::MachReg));
        let src = Opnd::IntConst {
            value: target_offset as i64,
            ty: IrType::MachReg,
        };
        self.add_instr(InstrData::unary(OpCode::Ld_I4, dst, src), offset)?;
        Ok(dst)
    }

    /// The interpreter instance is passed as the 0th argument of a JITted
    /// loop body. Load it, then flush every store-slot at the exit offset.
    fn generate_loop_body_slot_accesses(&mut self, offset: u32) -> CodegenResult<()> {
        let param = self.func.sym_table.new_param_slot_sym(1, IrType::Var);
        self.func.sym_table.find_stack_mut(param).unwrap().offset =
            Some(FORMAL_PARAM_OFFSET * MACH_PTR_BYTES);
        let loop_param = self.func.ensure_loop_param_sym();
        let arg_in = InstrData::unary(
            OpCode::ArgIn_A,
            Opnd::Reg(RegOpnd::new(loop_param, IrType::MachPtr)),
            Opnd::Reg(RegOpnd::new(param, IrType::Var)),
        );
        let head = self.func.head_instr.unwrap();
        self.insert_instr_after(arg_in, head);

        let regs: Vec<RegSlot> = self.st_slots.iter().map(|s| s.as_u32()).collect();
        for reg in regs {
            let st = self.make_loop_body_st_slot(reg)?;
            self.add_instr(st, offset)?;
        }
        Ok(())
    }

    fn insert_init_loop_body_loop_counter(&mut self, offset: u32) -> CodegenResult<()> {
        debug_assert!(self.is_loop_body());
        if self.loop_counter_sym.is_some() {
            return Ok(());
        }
        let counter = self.func.sym_table.new_stack_sym(IrType::Var);
        self.loop_counter_sym = Some(counter);
        let mut opnd = RegOpnd::new(counter, IrType::Var);
        opnd.is_jit_optimized = true;
        self.add_instr(
            InstrData::with_dst(OpCode::InitLoopBodyCount, Opnd::Reg(opnd)),
            offset,
        )?;
        Ok(())
    }

    fn insert_incr_loop_body_loop_counter(&mut self, loop_top_label: Instr) -> CodegenResult<()> {
        debug_assert!(self.is_loop_body());
        let counter = self.loop_counter_sym.expect("no loop counter");
        let mut opnd = RegOpnd::new(counter, IrType::Int32);
        opnd.is_jit_optimized = true;
        let incr = InstrData::unary(OpCode::IncrLoopBodyCount, Opnd::Reg(opnd), Opnd::Reg(opnd));
        let next_real = self
            .func
            .next_real(loop_top_label)
            .unwrap_or_else(|| self.func.tail_instr.unwrap());
        self.insert_instr(incr, next_real)?;
        Ok(())
    }

    fn insert_done_loop_body_loop_counter(&mut self, last_offset: u32) -> CodegenResult<()> {
        let Some(counter) = self.loop_counter_sym else {
            return Ok(());
        };
        let mut opnd = RegOpnd::new(counter, IrType::Int32);
        opnd.is_jit_optimized = true;
        let mut store = InstrData::new(OpCode::StLoopBodyCount);
        store.src1 = Some(Opnd::Reg(opnd));
        self.add_instr(store, last_offset + 1)?;
        Ok(())
    }

    // ---- Branch relocation ----

    /// Create a branch/offset pair to be fixed up once all bytecode has been
    /// read, and add the branch.
    fn add_branch(
        &mut self,
        data: InstrData,
        offset: u32,
        mut target_offset: u32,
    ) -> CodegenResult<Instr> {
        if target_offset > self.func.body.byte_code_length() {
            return Err(CodegenError::corrupt("branch target out of range", offset));
        }
        // Loop jitting covers only the loop; branches beyond it resume the
        // interpreter at their real target.
        if self.is_loop_body_outer_offset(target_offset) {
            if !self.is_loop_body_ret_ip_instr(self.last_instr) {
                self.insert_loop_body_return_ip(target_offset, offset)?;
            }
            // Jump past the slot stores and Ret.
            target_offset = self.loop_body_exit_instr_offset();
        }
        let branch = self.add_instr(data, offset)?;
        self.branch_relocs.push(BranchReloc {
            branch,
            offset,
            target_offset,
            not_back_edge: false,
        });
        Ok(branch)
    }

    /// Insert label instructions at the offsets recorded in the reloc list
    /// and point every branch at its label.
    fn insert_labels(&mut self) -> CodegenResult<()> {
        let relocs = core::mem::take(&mut self.branch_relocs);
        for reloc in relocs {
            let (label, label_offset) = self.create_label(reloc.target_offset)?;
            self.func.pool[reloc.branch].set_branch_target(label);

            if !reloc.not_back_edge && reloc.offset >= label_offset {
                let was_loop_top = match &mut self.func.pool[label].kind {
                    InstrKind::Label { is_loop_top } => {
                        let was = *is_loop_top;
                        *is_loop_top = true;
                        was
                    }
                    _ => unreachable!("branch target is not a label"),
                };

                if self.func.is_jit_in_debug_mode() {
                    // Bailout for async break on the back edge.
                    let branch_offset = self.func.pool[reloc.branch].bytecode_offset;
                    self.insert_bail_out_for_debugger(
                        branch_offset,
                        BailOutKind::FORCE_BY_FLAG | BailOutKind::BREAKPOINT_IN_FUNCTION,
                        Some(reloc.branch),
                    )?;
                }

                if !was_loop_top && self.loop_counter_sym.is_some() {
                    self.insert_incr_loop_body_loop_counter(label)?;
                }
            }
        }
        Ok(())
    }

    /// Find or create the label at `target_offset`, scanning forward over
    /// offsets no instruction landed on.
    fn create_label(&mut self, target_offset: u32) -> CodegenResult<(Instr, u32)> {
        let mut offset = target_offset;
        let target = loop {
            if offset as usize >= self.offset_to_instr.len() {
                return Err(CodegenError::corrupt("branch target out of range", offset));
            }
            match self.offset_to_instr[offset as usize].expand() {
                Some(t) => break t,
                None => offset += 1,
            }
        };

        if let Some(prev) = self.func.prev_real_or_label(target) {
            let prev_data = &self.func.pool[prev];
            if prev_data.is_label() && prev_data.bytecode_offset == offset {
                // An existing label at the right offset: reuse it.
                return Ok((prev, offset));
            }
            let mut label = InstrData::label();
            label.bytecode_offset = offset;
            let label = self.func.create_instr(label);
            self.func.layout.insert_after(label, prev);
            Ok((label, offset))
        } else {
            let mut label = InstrData::label();
            label.bytecode_offset = offset;
            let label = self.func.create_instr(label);
            self.func.layout.insert_before(label, target);
            Ok((label, offset))
        }
    }

    // ---- Closure range checks ----

    fn record_frame_display_check(&mut self, sym: SymId, display_depth: u32, slot_limit: u32) {
        let record = self
            .func
            .frame_display_checks
            .entry(sym)
            .or_insert_with(FrameDisplayCheckRecord::default);
        record.display_depth = record.display_depth.max(display_depth);
        record.slot_limit = record.slot_limit.max(slot_limit);
    }

    /// After building, chain a `FrameDisplayCheck` onto the defining load of
    /// every checked frame-display symbol, and keep closure syms alive
    /// across loops in functions with try.
    fn emit_closure_range_checks(&mut self) -> CodegenResult<()> {
        let checks: Vec<(SymId, FrameDisplayCheckRecord)> = self
            .func
            .frame_display_checks
            .iter()
            .map(|(&sym, &record)| (sym, record))
            .collect();
        for (sym, record) in checks {
            let Some(def) = self
                .func
                .sym_table
                .find_stack(sym)
                .and_then(|s| s.def_instr.expand())
            else {
                continue;
            };
            let Some(orig_dst) = self.func.pool[def].dst.take() else {
                continue;
            };
            let fresh = self.func.sym_table.new_stack_sym(IrType::Var);
            let fresh_opnd = Opnd::Reg(RegOpnd::new(fresh, IrType::Var));
            self.func.pool[def].dst = Some(fresh_opnd);

            let record_opnd = Opnd::Addr {
                value: ((record.display_depth as u64) << 32) | record.slot_limit as u64,
                kind: AddrKind::Misc,
            };
            let mut check = InstrData::unary(OpCode::FrameDisplayCheck, orig_dst, fresh_opnd);
            check.src2 = Some(record_opnd);
            check.bytecode_offset = self.func.pool[def].bytecode_offset;
            let check = self.func.create_instr(check);
            self.func.layout.insert_after(check, def);
        }

        // With try blocks crossing loops, the closure syms must stay live to
        // the end of the function for the handler to restore them.
        if !self.is_loop_body()
            && self.func.has_try
            && self.func.body.byte_code_in_loop_count != 0
        {
            let closure = self
                .func
                .local_closure_sym
                .expand()
                .filter(|&s| self.sym_has_bytecode_reg(s));
            let frame_display = self
                .func
                .local_frame_display_sym
                .expand()
                .filter(|&s| self.sym_has_bytecode_reg(s));
            if closure.is_some() || frame_display.is_some() {
                let ret = self
                    .func
                    .layout
                    .iter_rev()
                    .find(|&i| self.func.pool[i].opcode == OpCode::Ret);
                if let Some(ret) = ret {
                    let mut uses = InstrData::new(OpCode::ByteCodeUses);
                    uses.src1 = closure.map(|s| Opnd::Reg(RegOpnd::new(s, IrType::Var)));
                    uses.src2 = frame_display.map(|s| Opnd::Reg(RegOpnd::new(s, IrType::Var)));
                    self.insert_instr(uses, ret)?;
                }
            }
        }
        Ok(())
    }

    fn sym_has_bytecode_reg(&self, sym: SymId) -> bool {
        self.func
            .sym_table
            .find_stack(sym)
            .is_some_and(|s| s.bytecode_reg.is_some())
    }

    // ---- Per-layout build routines ----

    fn build_op(&mut self, op: OpCode, size: LayoutSize, offset: u32) -> CodegenResult<()> {
        let layout = op
            .layout()
            .ok_or_else(|| CodegenError::corrupt("unknown opcode layout", offset))?;
        match layout {
            LayoutKind::Empty => self.build_empty(op, offset),
            LayoutKind::Reg1 => {
                let l = self.reader.reg1(size)?;
                self.build_reg1(op, offset, l.r0)
            }
            LayoutKind::Reg2 => {
                let l = self.reader.reg2(size)?;
                let next_offset = self.reader.current_offset();
                self.build_reg2(op, offset, l.r0, l.r1, next_offset)
            }
            LayoutKind::Reg2Int1 => {
                let l = self.reader.reg2_int1(size)?;
                self.build_reg2_int1(op, offset, l.r0, l.r1, l.c1)
            }
            LayoutKind::Reg3 => {
                let l = self.reader.reg3(size)?;
                self.build_reg3(op, offset, l.r0, l.r1, l.r2)
            }
            LayoutKind::Reg1Unsigned1 => {
                let l = self.reader.reg1_unsigned1(size)?;
                self.build_reg1_unsigned1(op, offset, l.r0, l.c1)
            }
            LayoutKind::Unsigned1 => {
                let num = self.reader.unsigned1(size)?;
                self.build_unsigned1(op, offset, num)
            }
            LayoutKind::Arg => {
                let l = self.reader.arg(size)?;
                self.build_arg(OpCode::ArgOut_A, offset, l.arg, l.reg)
            }
            LayoutKind::ArgNoSrc => {
                let arg = self.reader.arg_no_src(size)?;
                let env = self.env_reg_for_inner_frame_display().ok_or_else(|| {
                    CodegenError::corrupt("environment argument without environment", offset)
                })?;
                self.build_arg(OpCode::ArgOut_A, offset, arg, env)
            }
            LayoutKind::StartCall => {
                let arg_count = self.reader.start_call()?;
                self.build_start_call(offset, arg_count)
            }
            LayoutKind::CallI => {
                let l = self.reader.call_i(size, op.is_profiled())?;
                self.build_call_i(op, offset, l.dst, l.function, l.arg_count, l.profile_id)
            }
            LayoutKind::ElementSlot => {
                let l = self.reader.element_slot(size)?;
                self.build_element_slot(op, offset, l.value, l.instance, l.slot_index)
            }
            LayoutKind::ElementSlotI1 => {
                let l = self.reader.element_slot_i1(size)?;
                self.build_element_slot_i1(op, offset, l.value, l.slot_index)
            }
            LayoutKind::ElementSlotI2 => {
                let l = self.reader.element_slot_i2(size)?;
                self.build_element_slot_i2(op, offset, l.value, l.slot_index1, l.slot_index2)
            }
            LayoutKind::ElementCP => {
                let l = self.reader.element_cp(size, op.is_profiled())?;
                self.build_element_cp(op, offset, l.value, l.instance, l.cache_index, l.profile_id)
            }
            LayoutKind::ElementI => {
                let l = self.reader.element_i(size, op.is_profiled())?;
                self.build_element_i(op, offset, l.value, l.instance, l.index, l.profile_id)
            }
            LayoutKind::Br => {
                let target = self.reader.br()?;
                self.build_br(op, offset, target)
            }
            LayoutKind::BrReg1 => {
                let l = self.reader.br_reg1(size)?;
                self.build_br_reg1(op, offset, l.target, l.r1)
            }
            LayoutKind::BrReg2 => {
                let l = self.reader.br_reg2(size)?;
                self.build_br_reg2(op, offset, l.target, l.r1, l.r2)
            }
        }
    }

    fn build_empty(&mut self, op: OpCode, offset: u32) -> CodegenResult<()> {
        match op {
            OpCode::Ret => {
                let src = self.build_dst_opnd(0)?;
                let mut instr = InstrData::new(OpCode::Ret);
                instr.src1 = Some(src);
                self.add_instr(instr, offset)?;
            }
            OpCode::Leave => {
                if let Some(&(handler_offset, is_catch)) = self.handler_offset_stack.last() {
                    if is_catch {
                        // Instrument flow from the try region to the handler
                        // so the flow graph keeps the handler in the loop.
                        let br = InstrData::branch(OpCode::BrOnException);
                        self.add_branch(br, offset, handler_offset)?;
                    }
                }
                // Leave branches to its own continuation so the flow graph
                // sees the region exit.
                let label = self.func.create_instr(InstrData::label());
                let mut br = InstrData::branch(OpCode::Leave);
                br.set_branch_target(label);
                self.add_instr(br, offset)?;
                self.add_existing_instr(label, NO_BYTECODE_OFFSET)?;
            }
            OpCode::LeaveNull => {
                self.finally_block_level -= 1;
                self.add_instr(InstrData::new(op), offset)?;
            }
            OpCode::Finally => {
                match self.handler_offset_stack.pop() {
                    Some((_, false)) => {}
                    _ => return Err(CodegenError::corrupt("Finally without TryFinally", offset)),
                }
                self.finally_block_level += 1;
                self.add_instr(InstrData::new(op), offset)?;
            }
            OpCode::Break => {
                if self.func.is_jit_in_debug_mode() {
                    self.insert_bail_out_for_debugger(offset, BailOutKind::EXPLICIT, None)?;
                } else {
                    // Kept as a plain instruction; removed by the lowerer.
                    self.add_instr(InstrData::new(op), offset)?;
                }
            }
            OpCode::Nop => {
                self.add_instr(InstrData::new(op), offset)?;
            }
            _ => return Err(CodegenError::corrupt("unexpected empty-layout opcode", offset)),
        }
        Ok(())
    }

    fn build_reg1(&mut self, op: OpCode, offset: u32, r0: RegSlot) -> CodegenResult<()> {
        match op {
            OpCode::LdC_A_Null => {
                let mut dst = self.build_dst_opnd(r0)?;
                if let Opnd::Reg(r) = &mut dst {
                    r.value_type = ValueType::Null;
                }
                self.add_instr(InstrData::unary(OpCode::Ld_A, dst, Opnd::null_addr()), offset)?;
            }
            OpCode::Throw => {
                let src = self.build_src_opnd(r0)?;
                let mut instr = InstrData::new(OpCode::Throw);
                instr.src1 = Some(src);
                self.add_instr(instr, offset)?;
            }
            OpCode::Catch => {
                // The catch handler begins: the protected region is closed.
                match self.handler_offset_stack.pop() {
                    Some((_, true)) => {}
                    _ => return Err(CodegenError::corrupt("Catch without TryCatch", offset)),
                }
                let dst = self.build_dst_opnd_full(r0, IrType::Var, true, false)?;
                self.add_instr(InstrData::with_dst(OpCode::Catch, dst), offset)?;
            }
            _ => return Err(CodegenError::corrupt("unexpected Reg1 opcode", offset)),
        }
        Ok(())
    }

    fn build_reg2(
        &mut self,
        mut op: OpCode,
        offset: u32,
        r0: RegSlot,
        r1: RegSlot,
        next_offset: u32,
    ) -> CodegenResult<()> {
        let src1 = self.build_src_opnd(r1)?;

        if op == OpCode::BeginSwitch {
            // The switch value is copied into its own register; cases then
            // compare against the copy.
            op = OpCode::Ld_A;
        }

        let mut dst = self.build_dst_opnd(r0)?;
        match op {
            OpCode::Typeof | OpCode::Conv_Str => {
                if let Opnd::Reg(r) = &mut dst {
                    r.value_type = ValueType::String;
                }
            }
            OpCode::Conv_Num => {
                if let Opnd::Reg(r) = &mut dst {
                    r.value_type = ValueType::Number;
                }
            }
            _ => {}
        }

        if op == OpCode::Yield {
            return self.build_yield(offset, dst, src1, next_offset);
        }

        self.add_instr(InstrData::unary(op, dst, src1), offset)?;
        Ok(())
    }

    fn build_yield(
        &mut self,
        offset: u32,
        dst: Opnd,
        src1: Opnd,
        next_offset: u32,
    ) -> CodegenResult<()> {
        let yield_instr = self.add_instr(InstrData::unary(OpCode::Yield, dst, src1), offset)?;
        self.func.pool[yield_instr].convert_to_bail_out(BailOutData::new(
            BailOutKind::FOR_GENERATOR_YIELD,
            BailOutInfo::new(offset),
        ));

        // The bail-in section jumped to from the generator jump table.
        let mut label = InstrData::label();
        label.opcode = OpCode::GeneratorBailInLabel;
        let bail_in = self.add_instr(label, offset)?;
        self.func.yield_resume_points.push((next_offset, bail_in));
        if let Some(data) = &mut self.func.pool[yield_instr].bail_out {
            data.bail_in_label = bail_in.into();
        }

        // Decode the value the interpreter passed back in.
        self.add_instr(InstrData::with_dst(OpCode::GeneratorResumeYield, dst), offset)?;

        if self.func.is_jit_in_debug_mode() {
            self.insert_bail_out_for_debugger(
                offset,
                BailOutKind::FORCE_BY_FLAG | BailOutKind::BREAKPOINT_IN_FUNCTION | BailOutKind::STEP,
                None,
            )?;
        }
        Ok(())
    }

    fn build_reg2_int1(
        &mut self,
        op: OpCode,
        offset: u32,
        r0: RegSlot,
        r1: RegSlot,
        c1: i32,
    ) -> CodegenResult<()> {
        let src1 = self.build_src_opnd(r1)?;
        let dst = self.build_dst_opnd(r0)?;
        let src2 = Opnd::IntConst {
            value: c1 as i64,
            ty: IrType::Int32,
        };
        self.add_instr(InstrData::binary(op, dst, src1, src2), offset)?;
        Ok(())
    }

    fn build_reg3(
        &mut self,
        op: OpCode,
        offset: u32,
        r0: RegSlot,
        r1: RegSlot,
        r2: RegSlot,
    ) -> CodegenResult<()> {
        let src1 = self.build_src_opnd(r1)?;
        let src2 = self.build_src_opnd(r2)?;
        let mut dst = self.build_dst_opnd(r0)?;
        if matches!(
            op,
            OpCode::CmEq_A
                | OpCode::CmNeq_A
                | OpCode::CmSrEq_A
                | OpCode::CmSrNeq_A
                | OpCode::CmLt_A
                | OpCode::CmLe_A
                | OpCode::CmGt_A
                | OpCode::CmGe_A
                | OpCode::IsInst
        ) {
            if let Opnd::Reg(r) = &mut dst {
                r.value_type = ValueType::Boolean;
            }
        }
        self.add_instr(InstrData::binary(op, dst, src1, src2), offset)?;
        Ok(())
    }

    fn build_reg1_unsigned1(
        &mut self,
        op: OpCode,
        offset: u32,
        r0: RegSlot,
        c1: u32,
    ) -> CodegenResult<()> {
        match op {
            OpCode::NewScArray => {
                let mut dst = self.build_dst_opnd(r0)?;
                if let Opnd::Reg(r) = &mut dst {
                    r.value_type = ValueType::Object(ObjectKind::Array);
                }
                let src = Opnd::IntConst {
                    value: c1 as i64,
                    ty: IrType::Uint32,
                };
                let added = self.add_instr(InstrData::unary(op, dst, src), offset)?;
                self.mark_not_number_if_single_def(added);
            }
            _ => return Err(CodegenError::corrupt("unexpected Reg1Unsigned1 opcode", offset)),
        }
        Ok(())
    }

    fn build_unsigned1(&mut self, op: OpCode, offset: u32, num: u32) -> CodegenResult<()> {
        let is_our_loop = self
            .func
            .work_item
            .as_ref()
            .is_some_and(|item| item.loop_number == num);
        match op {
            OpCode::ProfiledLoopStart => {}
            OpCode::ProfiledLoopBodyStart => {
                if is_our_loop {
                    self.insert_init_loop_body_loop_counter(offset)?;
                }
            }
            OpCode::ProfiledLoopEnd => {
                if is_our_loop {
                    // Resume the interpreter at the loop end marker.
                    self.insert_loop_body_return_ip(offset, offset)?;
                }
            }
            _ => return Err(CodegenError::corrupt("unexpected Unsigned1 opcode", offset)),
        }
        Ok(())
    }

    fn build_arg(&mut self, op: OpCode, offset: u32, argument: u16, src_reg: RegSlot) -> CodegenResult<()> {
        debug_assert_eq!(op, OpCode::ArgOut_A);
        let slot = argument.checked_add(1).ok_or_else(|| {
            CodegenError::corrupt("argument count overflow", offset)
        })?;
        self.args_on_stack += 1;
        let dst_sym = self.func.sym_table.arg_slot_sym(slot);
        let dst = Opnd::Reg(RegOpnd::new(dst_sym, IrType::Var));
        let src = self.build_src_opnd(src_reg)?;
        let instr = self.add_instr(InstrData::unary(op, dst, src), offset)?;
        // Kept on a stack until the call that consumes them links them up.
        self.arg_stack.push(instr);
        Ok(())
    }

    fn build_start_call(&mut self, offset: u32, arg_count: u16) -> CodegenResult<()> {
        // StartCall's destination gets a fresh symbol so it stays single-def.
        let dst_sym = self.func.sym_table.new_stack_sym(IrType::Var);
        let dst = Opnd::Reg(RegOpnd::new(dst_sym, IrType::Var));
        let src = Opnd::IntConst {
            value: arg_count as i64,
            ty: IrType::Int32,
        };
        self.calls_on_stack += 1;
        let instr = self.add_instr(InstrData::unary(OpCode::StartCall, dst, src), offset)?;
        self.arg_stack.push(instr);
        Ok(())
    }

    fn build_call_i(
        &mut self,
        op: OpCode,
        offset: u32,
        dst_reg: RegSlot,
        function_reg: RegSlot,
        arg_count: u16,
        profile_id: Option<u16>,
    ) -> CodegenResult<()> {
        let new_opcode = op.unprofiled();
        let src1 = self.build_src_opnd(function_reg)?;

        let mut dst = None;
        if dst_reg != NO_REGISTER {
            let mut d = self.build_dst_opnd(dst_reg)?;
            if new_opcode == OpCode::NewScObject {
                if let Opnd::Reg(r) = &mut d {
                    r.value_type = ValueType::Object(ObjectKind::UninitializedObject);
                }
            }
            dst = Some(d);
        }

        let mut profiled = false;
        if let (Some(id), Some(profile)) = (profile_id, &self.func.body.profile) {
            let site = profile.call_site_info(id);
            if site.is_profiled {
                profiled = true;
                self.call_tree_has_some_profile_info = true;
                if let Some(Opnd::Reg(r)) = &mut dst {
                    if site.return_type.is_known() {
                        r.value_type = site.return_type;
                    }
                }
            }
        }

        if !profiled && op.is_profiled() && self.do_bail_on_no_profile() {
            self.insert_bail_on_no_profile()?;
        }

        let mut data = InstrData::new(new_opcode);
        data.dst = dst;
        data.src1 = Some(src1);
        if profiled {
            data.profile_id = profile_id;
        }
        let instr = self.add_instr(data, offset)?;

        if new_opcode == OpCode::NewScObject {
            if let Some(sym) = self.func.pool[instr].dst.as_ref().and_then(Opnd::reg_sym) {
                if let Some(s) = self.func.sym_table.find_stack_mut(sym) {
                    if s.is_single_def {
                        s.is_safe_this = true;
                        s.is_not_number = true;
                    }
                }
            }
        }

        self.build_call_common(instr, new_opcode, arg_count, offset)
    }

    /// Link the call's arguments by chaining their dsts through `src2`.
    fn build_call_common(
        &mut self,
        call: Instr,
        opcode: OpCode,
        arg_count: u16,
        _offset: u32,
    ) -> CodegenResult<()> {
        let call_offset = self.func.pool[call].bytecode_offset;
        if self.arg_stack.is_empty() {
            return Err(CodegenError::corrupt("call without pending arguments", call_offset));
        }

        let mut prev = call;
        let mut count: u32 = 0;
        let start_call = loop {
            let Some(arg) = self.arg_stack.pop() else {
                return Err(CodegenError::corrupt("call without StartCall", call_offset));
            };
            if self.func.pool[arg].opcode == OpCode::StartCall {
                break arg;
            }
            let arg_dst = self.func.pool[arg]
                .dst
                .ok_or_else(|| CodegenError::corrupt("argument without destination", call_offset))?;
            self.func.pool[prev].src2 = Some(arg_dst);
            prev = arg;
            count += 1;
        };

        if self.arg_stack.is_empty() {
            self.call_tree_has_some_profile_info = false;
        }

        let mut expected = arg_count as u32;
        if opcode == OpCode::NewScObject {
            // The implicit new.target-style extra argument.
            count += 1;
            self.args_on_stack += 1;
            expected += 1;
        }

        let start_dst = self.func.pool[start_call]
            .dst
            .ok_or_else(|| CodegenError::corrupt("StartCall without destination", call_offset))?;
        self.func.pool[prev].src2 = Some(start_dst);

        let declared = match self.func.pool[start_call].src1 {
            Some(Opnd::IntConst { value, .. }) => value as u32,
            _ => return Err(CodegenError::corrupt("StartCall without argument count", call_offset)),
        };
        if declared != count || count != expected {
            return Err(CodegenError::corrupt(
                "StartCall has wrong number of arguments",
                call_offset,
            ));
        }

        self.calls_on_stack -= 1;
        if self.func.arg_slots_for_functions_called < self.args_on_stack {
            self.func.arg_slots_for_functions_called = self.args_on_stack;
        }
        debug_assert!(self.calls_on_stack != 0 || self.args_on_stack == expected);
        self.args_on_stack -= expected;

        if self.func.is_jit_in_debug_mode() {
            // Bailout after the return from the call; resumes at the next
            // opcode.
            self.insert_bail_out_for_debugger(
                self.reader.current_offset(),
                DEBUGGER_BAILOUT_KIND_FOR_CALL,
                None,
            )?;
        }
        Ok(())
    }

    fn build_element_slot(
        &mut self,
        op: OpCode,
        offset: u32,
        value: RegSlot,
        instance: RegSlot,
        slot_index: u32,
    ) -> CodegenResult<()> {
        let field = self.build_field_opnd(
            instance,
            slot_index,
            None,
            PropertyKind::Slots,
            None,
            op == OpCode::LdSlot,
        )?;
        match op {
            OpCode::LdSlot => {
                let dst = self.build_dst_opnd(value)?;
                self.add_instr(InstrData::unary(op, dst, field), offset)?;
            }
            OpCode::StSlot => {
                let src = self.build_src_opnd(value)?;
                self.add_instr(InstrData::unary(op, field, src), offset)?;
            }
            _ => return Err(CodegenError::corrupt("unexpected ElementSlot opcode", offset)),
        }
        Ok(())
    }

    fn build_element_slot_i1(
        &mut self,
        op: OpCode,
        offset: u32,
        value: RegSlot,
        slot_index: u32,
    ) -> CodegenResult<()> {
        let closure_reg = self
            .func
            .body
            .local_closure_reg
            .ok_or_else(|| CodegenError::corrupt("local slot access without closure", offset))?;
        if slot_index >= self.func.body.scope_slot_array_size + FIRST_SCOPE_SLOT_INDEX {
            return Err(CodegenError::corrupt(
                "slot index beyond scope-slot array size",
                offset,
            ));
        }
        let field =
            self.build_field_opnd(closure_reg, slot_index, None, PropertyKind::Slots, None, false)?;
        match op {
            OpCode::LdLocalSlot => {
                let dst = self.build_dst_opnd(value)?;
                self.add_instr(InstrData::unary(OpCode::LdSlot, dst, field), offset)?;
            }
            OpCode::StLocalSlot => {
                let src = self.build_src_opnd(value)?;
                self.add_instr(InstrData::unary(OpCode::StSlot, field, src), offset)?;
            }
            _ => return Err(CodegenError::corrupt("unexpected ElementSlotI1 opcode", offset)),
        }
        Ok(())
    }

    fn build_element_slot_i2(
        &mut self,
        op: OpCode,
        offset: u32,
        value: RegSlot,
        slot_index1: u32,
        slot_index2: u32,
    ) -> CodegenResult<()> {
        let env_reg = self
            .func
            .body
            .env_reg
            .ok_or_else(|| CodegenError::corrupt("environment slot access without environment", offset))?;

        // Walking the frame display: remember how deep so a range check can
        // be emitted on the defining load.
        let env_sym = self.build_src_stack_sym_id(env_reg)?;
        self.record_frame_display_check(env_sym, slot_index1 + 1, slot_index2 + 1);

        let array_field =
            self.build_field_opnd(env_reg, slot_index1, None, PropertyKind::SlotArray, None, false)?;
        let tmp_sym = self.func.sym_table.new_stack_sym(IrType::Var);
        let tmp = Opnd::Reg(RegOpnd::new(tmp_sym, IrType::Var));
        self.add_instr(InstrData::unary(OpCode::LdSlotArr, tmp, array_field), offset)?;

        let slot_field = self.field_opnd_on_sym(tmp_sym, slot_index2, PropertyKind::Slots);
        match op {
            OpCode::LdEnvSlot => {
                let dst = self.build_dst_opnd(value)?;
                self.add_instr(InstrData::unary(OpCode::LdSlot, dst, slot_field), offset)?;
            }
            OpCode::StEnvSlot => {
                let src = self.build_src_opnd(value)?;
                self.add_instr(InstrData::unary(OpCode::StSlot, slot_field, src), offset)?;
            }
            _ => return Err(CodegenError::corrupt("unexpected ElementSlotI2 opcode", offset)),
        }
        Ok(())
    }

    fn build_element_cp(
        &mut self,
        op: OpCode,
        offset: u32,
        value: RegSlot,
        instance: RegSlot,
        cache_index: u32,
        profile_id: Option<u16>,
    ) -> CodegenResult<()> {
        let new_opcode = op.unprofiled();
        let is_load = matches!(new_opcode, OpCode::LdFld | OpCode::LdMethodFld);
        let property_id = self
            .func
            .body
            .referenced_property_id(cache_index)
            .ok_or_else(|| CodegenError::corrupt("property id index out of range", offset))?;
        let field = self.build_field_opnd(
            instance,
            property_id,
            Some(cache_index),
            PropertyKind::Data,
            Some(cache_index),
            is_load,
        )?;

        let mut data;
        if is_load {
            let mut dst = self.build_dst_opnd(value)?;
            if let (Some(_), Some(profile)) = (profile_id, &self.func.body.profile) {
                let info = profile.fld_info(cache_index);
                if info.was_ld_fld_profiled {
                    if let Opnd::Reg(r) = &mut dst {
                        r.value_type = info.value_type;
                    }
                }
            }
            data = InstrData::unary(new_opcode, dst, field);
        } else {
            let src = self.build_src_opnd(value)?;
            data = InstrData::unary(new_opcode, field, src);
        }
        if profile_id.is_some() && self.func.body.has_profile_info() {
            data.profile_id = profile_id;
        }
        self.add_instr(data, offset)?;
        Ok(())
    }

    fn build_element_i(
        &mut self,
        op: OpCode,
        offset: u32,
        value: RegSlot,
        instance: RegSlot,
        index: RegSlot,
        profile_id: Option<u16>,
    ) -> CodegenResult<()> {
        let new_opcode = op.unprofiled();
        let base_sym = self.build_src_stack_sym_id(instance)?;
        self.func
            .sym_table
            .find_or_create_stack(base_sym, Some(instance), IrType::Var);
        let index_sym = self.build_src_stack_sym_id(index)?;
        self.func
            .sym_table
            .find_or_create_stack(index_sym, Some(index), IrType::Var);
        let indir = Opnd::Indir {
            base: base_sym,
            index: index_sym.into(),
            offset: 0,
            scale: 0,
            ty: IrType::Var,
        };

        let mut data = match new_opcode {
            OpCode::LdElemI_A => {
                let dst = self.build_dst_opnd(value)?;
                InstrData::unary(new_opcode, dst, indir)
            }
            OpCode::StElemI_A => {
                let src = self.build_src_opnd(value)?;
                InstrData::unary(new_opcode, indir, src)
            }
            _ => return Err(CodegenError::corrupt("unexpected ElementI opcode", offset)),
        };
        if profile_id.is_some() && self.func.body.has_profile_info() {
            data.profile_id = profile_id;
        }
        self.add_instr(data, offset)?;
        Ok(())
    }

    fn build_br(&mut self, op: OpCode, offset: u32, target_offset: u32) -> CodegenResult<()> {
        match op {
            OpCode::TryCatch => {
                self.func.has_try = true;
                self.handler_offset_stack.push((target_offset, true));
                let br = InstrData::branch(OpCode::TryCatch);
                self.add_branch(br, offset, target_offset)?;
            }
            OpCode::TryFinally => {
                self.func.has_try = true;
                self.func.has_finally = true;
                self.handler_offset_stack.push((target_offset, false));
                let br = InstrData::branch(OpCode::TryFinally);
                self.add_branch(br, offset, target_offset)?;
            }
            OpCode::Br | OpCode::EndSwitch => {
                let br = InstrData::branch(OpCode::Br);
                self.add_branch(br, offset, target_offset)?;
            }
            _ => return Err(CodegenError::corrupt("unexpected Br opcode", offset)),
        }
        Ok(())
    }

    fn build_br_reg1(
        &mut self,
        op: OpCode,
        offset: u32,
        target_offset: u32,
        r1: RegSlot,
    ) -> CodegenResult<()> {
        let src1 = self.build_src_opnd(r1)?;
        let mut br = InstrData::branch(op);
        br.src1 = Some(src1);
        self.add_branch(br, offset, target_offset)?;
        Ok(())
    }

    fn build_br_reg2(
        &mut self,
        op: OpCode,
        offset: u32,
        target_offset: u32,
        r1: RegSlot,
        r2: RegSlot,
    ) -> CodegenResult<()> {
        let src1 = self.build_src_opnd(r1)?;
        let src2 = self.build_src_opnd(r2)?;
        // Case branches compare strictly against the switch value copy.
        let opcode = if op == OpCode::Case { OpCode::BrSrEq_A } else { op };
        let mut br = InstrData::branch(opcode);
        br.src1 = Some(src1);
        br.src2 = Some(src2);
        self.add_branch(br, offset, target_offset)?;
        Ok(())
    }
}

//! The per-compilation function context.

use crate::entities::{Instr, SymId};
use crate::instr::{InstrData, InstrKind};
use crate::jitbody::JitFunctionBody;
use crate::layout::Layout;
use crate::opcodes::OpCode;
use crate::sym::SymTable;
use crate::types::IrType;
use rustc_hash::FxHashMap;
use strix_entity::packed_option::PackedOption;
use strix_entity::PrimaryMap;

/// Description of a loop-body (OSR) compile unit.
#[derive(Clone, Debug, Default)]
pub struct LoopBodyWorkItem {
    /// Which loop of the function body is being compiled.
    pub loop_number: u32,
    /// Value types the interpreter observed per symbol id, used to type the
    /// entry slot loads.
    pub sym_value_types: FxHashMap<u32, crate::types::ValueType>,
}

/// Bounds recorded for one frame-display symbol: how deep the display is
/// walked and how far into a scope's slot array accesses reach.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameDisplayCheckRecord {
    pub display_depth: u32,
    pub slot_limit: u32,
}

/// Bailout-injection testing hooks: bail out when a statement boundary maps
/// to one of the configured source positions.
#[derive(Clone, Debug)]
pub struct BailOutInjection {
    /// Line index over the source the function was compiled from.
    pub line_cache: crate::line_cache::LineOffsetCache,
    /// 1-based line plus optional column; `None` matches any column.
    pub locations: Vec<(u32, Option<u32>)>,
    pub at_every_line: bool,
}

/// Compile-time configuration and tuning switches for one compilation.
#[derive(Clone, Debug)]
pub struct FuncConfig {
    pub jit_in_debug_mode: bool,
    /// Full-JIT optimization enabled (gates BailOnNoProfile).
    pub do_glob_opt: bool,
    /// Allocate scope slots on the JIT stack frame instead of the heap.
    pub do_stack_scope_slots: bool,
    /// Allocate the frame display on the JIT stack frame.
    pub do_stack_frame_display: bool,
    /// Interpreter locals hold boxed floats; loop-body stores must box.
    pub boxed_interpreter_slots: bool,
    /// Test-only injected bailouts at source positions.
    pub bailout_injection: Option<BailOutInjection>,
}

impl Default for FuncConfig {
    fn default() -> Self {
        FuncConfig {
            jit_in_debug_mode: false,
            do_glob_opt: true,
            do_stack_scope_slots: false,
            do_stack_frame_display: false,
            boxed_interpreter_slots: false,
            bailout_injection: None,
        }
    }
}

/// One function compilation: the instruction pool and layout, the symbol
/// table, and everything the builder and optimizer share.
///
/// Created by the compiler driver, populated by the IR builder, consumed by
/// the optimizer, and dropped when compilation ends.
pub struct Func {
    /// All instructions ever created for this function.
    pub pool: PrimaryMap<Instr, InstrData>,
    /// Their order.
    pub layout: Layout,
    pub sym_table: SymTable,
    /// The read-only façade this function is compiled from.
    pub body: JitFunctionBody,
    pub config: FuncConfig,
    /// Set when this compile targets one loop body instead of the whole
    /// function.
    pub work_item: Option<LoopBodyWorkItem>,

    pub has_try: bool,
    pub has_finally: bool,

    /// Head sentinel (`FunctionEntry`), set by the builder.
    pub head_instr: PackedOption<Instr>,
    /// Tail sentinel (`FunctionExit`), set by the builder.
    pub tail_instr: PackedOption<Instr>,

    /// Symbol holding the interpreter-frame pointer in loop-body compiles.
    pub loop_param_sym: PackedOption<SymId>,
    /// Stack-allocated closure and frame-display symbols.
    pub local_closure_sym: PackedOption<SymId>,
    pub local_frame_display_sym: PackedOption<SymId>,

    /// Frame-display range checks recorded during construction, emitted as
    /// `FrameDisplayCheck` instructions after the build loop.
    pub frame_display_checks: FxHashMap<SymId, FrameDisplayCheckRecord>,

    /// Bytecode offset → resume label, one entry per `Yield` built.
    pub yield_resume_points: Vec<(u32, Instr)>,
    /// The `GeneratorResumeJumpTable` instruction, once built.
    pub generator_jump_table_instr: PackedOption<Instr>,

    // Outputs for the later pipeline stages.
    pub has_temp_object_producing_instr: bool,
    pub arg_slots_for_functions_called: u32,
    pub can_do_inline_arg_opt: bool,
}

impl Func {
    pub fn new(body: JitFunctionBody, config: FuncConfig) -> Self {
        let locals = body.locals_count + body.temp_count;
        Func {
            pool: PrimaryMap::new(),
            layout: Layout::new(),
            sym_table: SymTable::new(locals),
            body,
            config,
            work_item: None,
            has_try: false,
            has_finally: false,
            head_instr: None.into(),
            tail_instr: None.into(),
            loop_param_sym: None.into(),
            local_closure_sym: None.into(),
            local_frame_display_sym: None.into(),
            frame_display_checks: FxHashMap::default(),
            yield_resume_points: Vec::new(),
            generator_jump_table_instr: None.into(),
            has_temp_object_producing_instr: false,
            arg_slots_for_functions_called: 0,
            can_do_inline_arg_opt: true,
        }
    }

    /// A loop-body work item makes this a loop-body compile.
    pub fn for_loop_body(body: JitFunctionBody, config: FuncConfig, item: LoopBodyWorkItem) -> Self {
        let mut func = Func::new(body, config);
        func.work_item = Some(item);
        func
    }

    pub fn is_loop_body(&self) -> bool {
        self.work_item.is_some()
    }

    pub fn is_jit_in_debug_mode(&self) -> bool {
        self.config.jit_in_debug_mode
    }

    /// Create an instruction in the pool without inserting it in the layout.
    pub fn create_instr(&mut self, data: InstrData) -> Instr {
        self.pool.push(data)
    }

    /// The interpreter-frame-pointer symbol, creating it on first use.
    pub fn ensure_loop_param_sym(&mut self) -> SymId {
        if let Some(sym) = self.loop_param_sym.expand() {
            return sym;
        }
        let sym = self.sym_table.new_stack_sym(IrType::MachPtr);
        self.loop_param_sym = sym.into();
        sym
    }

    /// Accessor mirroring the `instr->IsLabelInstr()` style checks.
    pub fn is_label(&self, instr: Instr) -> bool {
        self.pool[instr].is_label()
    }

    /// The previous instruction that is a real instruction or a label,
    /// skipping pragmas.
    pub fn prev_real_or_label(&self, instr: Instr) -> Option<Instr> {
        let mut cur = self.layout.prev(instr)?;
        loop {
            match self.pool[cur].kind {
                InstrKind::Pragma { .. } => cur = self.layout.prev(cur)?,
                _ => return Some(cur),
            }
        }
    }

    /// The next instruction that is a real instruction, skipping labels and
    /// pragmas.
    pub fn next_real(&self, instr: Instr) -> Option<Instr> {
        let mut cur = self.layout.next(instr)?;
        loop {
            if self.pool[cur].is_real() {
                return Some(cur);
            }
            cur = self.layout.next(cur)?;
        }
    }

    /// Walk the layout collecting `(instr, opcode)` pairs; test helper.
    pub fn opcodes_in_order(&self) -> Vec<OpCode> {
        self.layout.iter().map(|i| self.pool[i].opcode).collect()
    }
}

//! The read-only function-body façade handed to the IR builder.
//!
//! The builder never talks to the script runtime directly; everything it
//! needs about the function being compiled (bytecode, constants, profile
//! data, scope shape, statement boundaries, loop headers) is snapshotted
//! here by the compiler driver.

use crate::entities::{PropertyId, RegSlot};
use crate::types::{ConstType, ValueType};

/// One entry of the constant table: a tagged value address plus its type id.
#[derive(Copy, Clone, Debug)]
pub struct ConstTableEntry {
    /// The tagged script value, opaque to the JIT.
    pub value: u64,
    pub ty: ConstType,
}

/// A source statement boundary in the bytecode stream.
#[derive(Copy, Clone, Debug)]
pub struct StatementBoundary {
    pub offset: u32,
    pub statement_index: u32,
    /// Character offset of the statement in the source buffer, for mapping
    /// back to (line, column) positions.
    pub char_offset: u32,
}

/// Sentinel statement index meaning "between user statements".
pub const NO_STATEMENT_INDEX: u32 = u32::MAX;

/// Descriptor of one loop in the function, for loop-body (OSR) compiles.
#[derive(Copy, Clone, Debug)]
pub struct LoopHeader {
    /// Bytecode offset of the first opcode of the loop body.
    pub start_offset: u32,
    /// Bytecode offset one past the last opcode of the loop body.
    pub end_offset: u32,
}

/// Per-field profile info, indexed by inline-cache id.
#[derive(Copy, Clone, Debug, Default)]
pub struct FldInfo {
    pub value_type: ValueType,
    pub was_ld_fld_profiled: bool,
}

/// Per-call-site profile info, indexed by profile id.
#[derive(Copy, Clone, Debug, Default)]
pub struct CallSiteInfo {
    pub return_type: ValueType,
    pub is_profiled: bool,
}

/// Dynamic profile data collected by the interpreter.
#[derive(Clone, Debug, Default)]
pub struct ProfileData {
    /// How many times the function ran profiled before this compile.
    pub profiled_iterations: u32,
    pub fld_info: Vec<FldInfo>,
    pub call_site_info: Vec<CallSiteInfo>,
    /// Per-loop implicit-call observation flags.
    pub loop_implicit_call_flags: Vec<u8>,
    pub no_profile_bailouts_disabled: bool,
}

impl ProfileData {
    pub fn fld_info(&self, cache_index: u32) -> FldInfo {
        self.fld_info
            .get(cache_index as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn call_site_info(&self, profile_id: u16) -> CallSiteInfo {
        self.call_site_info
            .get(profile_id as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// Read-only description of one function body, as the JIT sees it.
#[derive(Clone, Debug, Default)]
pub struct JitFunctionBody {
    /// The bytecode stream, terminated by `EndOfBlock`.
    pub bytecode: Vec<u8>,
    /// Constant table; register `r` for `1 <= r < 1 + len` is constant
    /// `const_table[r - 1]`. Register 0 is the return value.
    pub const_table: Vec<ConstTableEntry>,
    /// Total count of local registers (constants included, temps excluded).
    pub locals_count: u32,
    /// First temporary register; temps occupy `[first_tmp_reg, first_tmp_reg
    /// + temp_count)`.
    pub first_tmp_reg: RegSlot,
    pub temp_count: u32,
    /// Declared parameter count, including `this`.
    pub in_params_count: u16,
    pub has_implicit_arg_ins: bool,
    pub has_rest_parameter: bool,
    pub is_coroutine: bool,
    pub is_global_func: bool,
    pub is_strict_mode: bool,
    pub is_param_and_body_scope_merged: bool,
    /// Register holding the closure environment, if the function uses one.
    pub env_reg: Option<RegSlot>,
    /// For DOM event handlers: the register `this` arrives in.
    pub this_reg_for_event_handler: Option<RegSlot>,
    pub local_closure_reg: Option<RegSlot>,
    pub local_frame_display_reg: Option<RegSlot>,
    pub func_expr_scope_reg: Option<RegSlot>,
    pub has_scope_object: bool,
    pub scope_slot_array_size: u32,
    pub param_scope_slot_array_size: u32,
    pub inline_cache_count: u32,
    pub referenced_property_ids: Vec<PropertyId>,
    /// Statement boundaries in increasing bytecode offset order.
    pub statement_map: Vec<StatementBoundary>,
    pub loop_headers: Vec<LoopHeader>,
    /// Bytecode bytes inside loops; non-zero means loops exist.
    pub byte_code_in_loop_count: u32,
    pub profile: Option<ProfileData>,
}

impl JitFunctionBody {
    /// Number of constant registers (including the reserved register 0).
    pub fn const_count(&self) -> u32 {
        self.const_table.len() as u32 + 1
    }

    /// Is `reg` a constant-table register?
    pub fn reg_is_constant(&self, reg: RegSlot) -> bool {
        reg != 0 && reg < self.const_count()
    }

    /// Is `reg` a temporary register?
    pub fn reg_is_temp(&self, reg: RegSlot) -> bool {
        self.temp_count != 0 && reg >= self.first_tmp_reg
    }

    /// The bytecode length in bytes.
    pub fn byte_code_length(&self) -> u32 {
        self.bytecode.len() as u32
    }

    pub fn referenced_property_id(&self, index: u32) -> Option<PropertyId> {
        self.referenced_property_ids.get(index as usize).copied()
    }

    pub fn loop_header(&self, loop_number: u32) -> Option<&LoopHeader> {
        self.loop_headers.get(loop_number as usize)
    }

    pub fn has_profile_info(&self) -> bool {
        self.profile.is_some()
    }
}

/// Cursor over the statement-boundary stream, advanced in lock-step with the
/// bytecode reader.
pub struct StatementReader<'a> {
    map: &'a [StatementBoundary],
    next: usize,
}

impl<'a> StatementReader<'a> {
    pub fn new(map: &'a [StatementBoundary]) -> Self {
        StatementReader { map, next: 0 }
    }

    /// The statement index of the next boundary, or `NO_STATEMENT_INDEX`.
    pub fn statement_index(&self) -> u32 {
        self.map
            .get(self.next)
            .map(|b| b.statement_index)
            .unwrap_or(NO_STATEMENT_INDEX)
    }

    /// Is there a boundary at exactly `offset`?
    pub fn at_statement_boundary(&self, offset: u32) -> bool {
        self.map
            .get(self.next)
            .is_some_and(|b| b.offset <= offset)
    }

    /// The boundary record about to be consumed, if any.
    pub fn current_boundary(&self) -> Option<&StatementBoundary> {
        self.map.get(self.next)
    }

    /// Consume the current boundary and return the next statement index.
    pub fn move_next_statement_boundary(&mut self) -> u32 {
        if self.next < self.map.len() {
            self.next += 1;
        }
        self.statement_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_classification() {
        let body = JitFunctionBody {
            const_table: vec![ConstTableEntry {
                value: 0,
                ty: ConstType::Null,
            }],
            locals_count: 6,
            first_tmp_reg: 6,
            temp_count: 2,
            ..Default::default()
        };
        assert!(!body.reg_is_constant(0));
        assert!(body.reg_is_constant(1));
        assert!(!body.reg_is_constant(2));
        assert!(!body.reg_is_temp(5));
        assert!(body.reg_is_temp(6));
        assert!(body.reg_is_temp(7));
    }

    #[test]
    fn statement_reader_walks_boundaries() {
        let map = [
            StatementBoundary {
                offset: 0,
                statement_index: 0,
                char_offset: 0,
            },
            StatementBoundary {
                offset: 4,
                statement_index: 1,
                char_offset: 10,
            },
        ];
        let mut r = StatementReader::new(&map);
        assert!(r.at_statement_boundary(0));
        assert_eq!(r.statement_index(), 0);
        assert_eq!(r.move_next_statement_boundary(), 1);
        assert!(!r.at_statement_boundary(2));
        assert!(r.at_statement_boundary(4));
        assert_eq!(r.move_next_statement_boundary(), NO_STATEMENT_INDEX);
        assert!(!r.at_statement_boundary(100));
    }
}

//! End-to-end IR builder tests over hand-assembled bytecode.

use strix_ir::bailout::BailOutKind;
use strix_ir::builder::build_ir;
use strix_ir::bytecode::BytecodeWriter;
use strix_ir::entities::Instr;
use strix_ir::func::{Func, FuncConfig, LoopBodyWorkItem};
use strix_ir::instr::InstrKind;
use strix_ir::jitbody::{ConstTableEntry, JitFunctionBody, LoopHeader, StatementBoundary};
use strix_ir::line_cache::LineOffsetCache;
use strix_ir::opcodes::OpCode;
use strix_ir::operand::Opnd;
use strix_ir::sym::PropertyKind;
use strix_ir::types::ConstType;
use strix_ir::CodegenError;

fn body_with(bytecode: Vec<u8>, locals_count: u32) -> JitFunctionBody {
    JitFunctionBody {
        bytecode,
        locals_count,
        first_tmp_reg: locals_count,
        ..Default::default()
    }
}

fn opcodes(func: &Func) -> Vec<OpCode> {
    func.opcodes_in_order()
}

fn find_instr(func: &Func, op: OpCode) -> Option<Instr> {
    func.layout.iter().find(|&i| func.pool[i].opcode == op)
}

/// `LdC_A_Null R0; Ret` builds (Entry, Ld_A R0 <- null, Ret R0, Exit).
#[test]
fn null_load_and_return() {
    let mut w = BytecodeWriter::new();
    w.emit_reg1(OpCode::LdC_A_Null, 0);
    w.emit_empty(OpCode::Ret);
    let mut func = Func::new(body_with(w.finish(), 1), FuncConfig::default());
    build_ir(&mut func).unwrap();

    assert_eq!(
        opcodes(&func),
        vec![
            OpCode::FunctionEntry,
            OpCode::Ld_A,
            OpCode::Ret,
            OpCode::FunctionExit,
        ]
    );

    let ld = find_instr(&func, OpCode::Ld_A).unwrap();
    assert!(matches!(
        func.pool[ld].src1,
        Some(Opnd::Addr { value: 0, .. })
    ));
    assert_eq!(func.pool[ld].dst.as_ref().and_then(Opnd::reg_sym).unwrap().as_u32(), 0);

    let ret = find_instr(&func, OpCode::Ret).unwrap();
    assert_eq!(func.pool[ret].src1.as_ref().and_then(Opnd::reg_sym).unwrap().as_u32(), 0);
}

/// Constants from the constant table are loaded first and their symbols are
/// marked as coming from the table.
#[test]
fn constant_loads() {
    let mut w = BytecodeWriter::new();
    w.emit_reg2(OpCode::Ld_A, 3, 1);
    w.emit_empty(OpCode::Ret);
    let mut body = body_with(w.finish(), 5);
    body.const_table = vec![
        ConstTableEntry {
            value: 0x1000,
            ty: ConstType::Number,
        },
        ConstTableEntry {
            value: 0x2000,
            ty: ConstType::String,
        },
    ];
    let mut func = Func::new(body, FuncConfig::default());
    build_ir(&mut func).unwrap();

    let ops = opcodes(&func);
    // Entry, two constant loads, the move, Ret, Exit.
    assert_eq!(ops.iter().filter(|&&o| o == OpCode::Ld_A).count(), 3);

    let sym = func.sym_table.find_stack(strix_ir::SymId::from_u32(1)).unwrap();
    assert!(sym.is_from_const_table);
    assert!(sym.is_const);
    assert!(sym.bytecode_reg.is_none());
}

/// Every branch ends the build with a resolved target label; back edges are
/// marked as loop tops.
#[test]
fn branch_resolution_and_loop_tops() {
    let mut w = BytecodeWriter::new();
    let top = w.create_label();
    let exit = w.create_label();
    w.bind_label(top);
    w.emit_br_reg1(OpCode::BrFalse_A, 1, exit);
    w.emit_reg3(OpCode::Add_A, 2, 2, 1);
    w.emit_br(OpCode::Br, top);
    w.bind_label(exit);
    w.emit_empty(OpCode::Ret);
    let mut func = Func::new(body_with(w.finish(), 3), FuncConfig::default());
    build_ir(&mut func).unwrap();

    let mut labels = 0;
    let mut loop_tops = 0;
    for i in func.layout.iter() {
        let data = &func.pool[i];
        if data.is_branch() {
            let target = data
                .branch_target()
                .expect("every branch must end with a target label");
            assert!(func.pool[target].is_label());
        }
        if let InstrKind::Label { is_loop_top } = data.kind {
            labels += 1;
            if is_loop_top {
                loop_tops += 1;
            }
        }
    }
    assert_eq!(labels, 2);
    assert_eq!(loop_tops, 1);
}

/// Calls pop exactly argCount arg-outs, ending at their StartCall, chained
/// through src2.
#[test]
fn call_argument_chain() {
    let mut w = BytecodeWriter::new();
    w.emit_start_call(2);
    w.emit_arg(0, 1);
    w.emit_arg(1, 2);
    w.emit_call(OpCode::CallI, 3, 4, 2, None);
    w.emit_empty(OpCode::Ret);
    let mut func = Func::new(body_with(w.finish(), 5), FuncConfig::default());
    build_ir(&mut func).unwrap();

    let call = find_instr(&func, OpCode::CallI).unwrap();
    // Walk the src2 chain: two ArgOuts, then the StartCall.
    let mut cur = call;
    let mut arg_outs = 0;
    loop {
        let src2_sym = func.pool[cur].src2.as_ref().and_then(Opnd::reg_sym).unwrap();
        let def = func
            .sym_table
            .find_stack(src2_sym)
            .unwrap()
            .def_instr
            .expand()
            .unwrap();
        match func.pool[def].opcode {
            OpCode::ArgOut_A => {
                arg_outs += 1;
                cur = def;
            }
            OpCode::StartCall => {
                match func.pool[def].src1 {
                    Some(Opnd::IntConst { value, .. }) => assert_eq!(value, 2),
                    ref other => panic!("StartCall src1 is {other:?}"),
                }
                break;
            }
            other => panic!("unexpected link in arg chain: {other:?}"),
        }
    }
    assert_eq!(arg_outs, 2);
    assert_eq!(func.arg_slots_for_functions_called, 2);
}

/// An arg-count mismatch between StartCall and the call is corrupt bytecode.
#[test]
fn call_argument_mismatch_is_corrupt() {
    let mut w = BytecodeWriter::new();
    w.emit_start_call(2);
    w.emit_arg(0, 1);
    w.emit_call(OpCode::CallI, 3, 4, 2, None);
    w.emit_empty(OpCode::Ret);
    let mut func = Func::new(body_with(w.finish(), 5), FuncConfig::default());
    let err = build_ir(&mut func).unwrap_err();
    assert!(matches!(err, CodegenError::CorruptBytecode { .. }));
}

/// A register beyond the local space is corrupt bytecode.
#[test]
fn out_of_range_register_is_corrupt() {
    let mut w = BytecodeWriter::new();
    w.emit_reg2(OpCode::Ld_A, 0, 200);
    w.emit_empty(OpCode::Ret);
    let mut func = Func::new(body_with(w.finish(), 3), FuncConfig::default());
    let err = build_ir(&mut func).unwrap_err();
    assert!(matches!(err, CodegenError::CorruptBytecode { .. }));
}

/// Loop-body (OSR) compiles load referenced symbols on entry, store written
/// symbols at the exit, and return the resume offset.
#[test]
fn loop_body_slot_traffic() {
    let mut w = BytecodeWriter::new();
    // Function prologue, outside the loop.
    w.emit_reg2(OpCode::Ld_A, 1, 0);
    w.emit_unsigned1(OpCode::ProfiledLoopStart, 0);
    let loop_start_offset = w.current_offset();
    let top = w.create_label();
    w.bind_label(top);
    w.emit_unsigned1(OpCode::ProfiledLoopBodyStart, 0);
    w.emit_reg3(OpCode::Add_A, 2, 2, 1);
    w.emit_br_reg1(OpCode::BrTrue_A, 2, top);
    w.emit_unsigned1(OpCode::ProfiledLoopEnd, 0);
    let loop_end_offset = w.current_offset();
    w.emit_empty(OpCode::Ret);
    let mut body = body_with(w.finish(), 4);
    body.loop_headers = vec![LoopHeader {
        start_offset: loop_start_offset,
        end_offset: loop_end_offset,
    }];

    let mut func = Func::for_loop_body(
        body,
        FuncConfig::default(),
        LoopBodyWorkItem {
            loop_number: 0,
            ..Default::default()
        },
    );
    build_ir(&mut func).unwrap();
    let ops = opcodes(&func);

    // The interpreter frame pointer arrives as parameter 0.
    let arg_in = find_instr(&func, OpCode::ArgIn_A).expect("interpreter frame ArgIn");
    let loop_param = func.loop_param_sym.expand().unwrap();
    assert_eq!(
        func.pool[arg_in].dst.as_ref().and_then(Opnd::reg_sym),
        Some(loop_param)
    );

    // R1 and R2 are loaded from the frame on entry; R2 is stored back.
    let ld_slots: Vec<Instr> = func
        .layout
        .iter()
        .filter(|&i| func.pool[i].opcode == OpCode::LdSlot)
        .collect();
    assert_eq!(ld_slots.len(), 2);
    for ld in &ld_slots {
        let sym_opnd = func.pool[*ld].src1.as_ref().and_then(Opnd::as_sym).unwrap();
        let prop = func.sym_table.prop(sym_opnd.sym);
        assert_eq!(prop.kind, PropertyKind::LocalSlots);
        assert_eq!(prop.parent, loop_param);
    }

    let st_slots: Vec<Instr> = func
        .layout
        .iter()
        .filter(|&i| func.pool[i].opcode == OpCode::StSlot)
        .collect();
    assert_eq!(st_slots.len(), 1);

    // The loop counter is initialized, incremented at the loop top, and
    // stored at the exit.
    assert!(ops.contains(&OpCode::InitLoopBodyCount));
    assert!(ops.contains(&OpCode::IncrLoopBodyCount));
    assert!(ops.contains(&OpCode::StLoopBodyCount));

    // The function returns the interpreter resume offset.
    assert!(ops.contains(&OpCode::Ld_I4));
    let ret = find_instr(&func, OpCode::Ret).unwrap();
    let ret_sym = func.pool[ret].src1.as_ref().and_then(Opnd::reg_sym).unwrap();
    let ld_i4 = find_instr(&func, OpCode::Ld_I4).unwrap();
    assert_eq!(
        func.pool[ld_i4].dst.as_ref().and_then(Opnd::reg_sym),
        Some(ret_sym)
    );
}

/// Branches that leave the loop body store the resume offset and retarget to
/// the loop exit.
#[test]
fn loop_body_outer_branch_goes_to_exit() {
    let mut w = BytecodeWriter::new();
    let after_loop = w.create_label();
    w.emit_reg2(OpCode::Ld_A, 1, 0);
    let loop_start_offset = w.current_offset();
    w.emit_br_reg1(OpCode::BrTrue_A, 1, after_loop);
    w.emit_reg3(OpCode::Add_A, 2, 2, 1);
    let loop_end_offset = w.current_offset();
    w.bind_label(after_loop);
    w.emit_empty(OpCode::Ret);
    let mut body = body_with(w.finish(), 4);
    body.loop_headers = vec![LoopHeader {
        start_offset: loop_start_offset,
        end_offset: loop_end_offset,
    }];

    let mut func = Func::for_loop_body(
        body,
        FuncConfig::default(),
        LoopBodyWorkItem::default(),
    );
    build_ir(&mut func).unwrap();

    // The early-exit branch is preceded by a return-IP load for its real
    // bytecode target.
    let br = find_instr(&func, OpCode::BrTrue_A).unwrap();
    let prev = func.layout.prev(br).unwrap();
    assert_eq!(func.pool[prev].opcode, OpCode::Ld_I4);

    // Its label lands at the loop exit, before the final Ret.
    let target = func.pool[br].branch_target().unwrap();
    let mut cur = target;
    let ret = loop {
        cur = func.layout.next(cur).unwrap();
        if func.pool[cur].opcode == OpCode::Ret {
            break cur;
        }
    };
    assert!(func.layout.next(ret).is_some());
}

/// Coroutines get the resume jump table prologue, and every yield lowers to
/// a bailout plus a registered resume label.
#[test]
fn generator_jump_table_and_yield() {
    let mut w = BytecodeWriter::new();
    w.emit_reg2(OpCode::Yield, 1, 0);
    w.emit_empty(OpCode::Ret);
    let mut body = body_with(w.finish(), 3);
    body.is_coroutine = true;
    let mut func = Func::new(body, FuncConfig::default());
    build_ir(&mut func).unwrap();
    let ops = opcodes(&func);

    // Prologue shape: frame load, null check, helper call, dispatch.
    assert!(ops.contains(&OpCode::BrNotAddr_A));
    assert!(ops.contains(&OpCode::CallHelper));
    assert!(ops.contains(&OpCode::Sub_I4));
    assert!(ops.contains(&OpCode::GeneratorResumeJumpTable));
    assert!(ops.contains(&OpCode::GeneratorResumeYield));

    // The yield became a bailout with a bail-in label.
    let yield_instr = find_instr(&func, OpCode::Yield).unwrap();
    let data = func.pool[yield_instr].bail_out.as_ref().unwrap();
    assert!(data.kind.contains(BailOutKind::FOR_GENERATOR_YIELD));
    let bail_in = data.bail_in_label.expand().unwrap();
    assert_eq!(func.pool[bail_in].opcode, OpCode::GeneratorBailInLabel);

    // The jump table's targets are the registered resume labels.
    assert_eq!(func.yield_resume_points.len(), 1);
    let jump = func.generator_jump_table_instr.expand().unwrap();
    match &func.pool[jump].kind {
        InstrKind::Branch { targets } => {
            assert_eq!(targets.len(), 1);
            assert_eq!(targets[0].expand(), Some(bail_in));
        }
        other => panic!("jump table is {other:?}"),
    }
}

/// Statement boundaries become pragmas; configured bailout injection fires
/// at the mapped line.
#[test]
fn statement_boundaries_and_bailout_injection() {
    // Source: two lines, statement 0 on line 1, statement 1 on line 2.
    let source = b"var x = 1;\nvar y = 2;";
    let line_cache = LineOffsetCache::new(source, 0, 0);

    let mut w = BytecodeWriter::new();
    let stmt0 = w.current_offset();
    w.emit_reg2(OpCode::Ld_A, 1, 0);
    let stmt1 = w.current_offset();
    w.emit_reg2(OpCode::Ld_A, 2, 1);
    w.emit_empty(OpCode::Ret);
    let mut body = body_with(w.finish(), 3);
    body.statement_map = vec![
        StatementBoundary {
            offset: stmt0,
            statement_index: 0,
            char_offset: 0,
        },
        StatementBoundary {
            offset: stmt1,
            statement_index: 1,
            char_offset: 11,
        },
    ];

    let mut config = FuncConfig::default();
    config.bailout_injection = Some(strix_ir::func::BailOutInjection {
        line_cache,
        locations: vec![(2, None)],
        at_every_line: false,
    });
    let mut func = Func::new(body, config);
    build_ir(&mut func).unwrap();
    let ops = opcodes(&func);

    assert_eq!(
        ops.iter()
            .filter(|&&o| o == OpCode::StatementBoundary)
            .count(),
        2
    );
    // Only statement 1 (line 2) gets the injected bailout.
    let injected: Vec<Instr> = func
        .layout
        .iter()
        .filter(|&i| func.pool[i].opcode == OpCode::BailOnEqual)
        .collect();
    assert_eq!(injected.len(), 1);
    assert!(func.pool[injected[0]]
        .bail_out
        .as_ref()
        .unwrap()
        .kind
        .contains(BailOutKind::INJECTED));
}

/// Try/catch bytecode sets the try flag and marks the catch object symbol.
#[test]
fn try_catch_and_catch_object() {
    let mut w = BytecodeWriter::new();
    let handler = w.create_label();
    let done = w.create_label();
    w.emit_br(OpCode::TryCatch, handler);
    w.emit_reg2(OpCode::Ld_A, 1, 0);
    w.emit_empty(OpCode::Leave);
    w.emit_br(OpCode::Br, done);
    w.bind_label(handler);
    w.emit_reg1(OpCode::Catch, 2);
    w.emit_empty(OpCode::Leave);
    w.bind_label(done);
    w.emit_empty(OpCode::Ret);
    let mut func = Func::new(body_with(w.finish(), 3), FuncConfig::default());
    build_ir(&mut func).unwrap();

    assert!(func.has_try);
    let catch = find_instr(&func, OpCode::Catch).unwrap();
    let sym = func.pool[catch].dst.as_ref().and_then(Opnd::reg_sym).unwrap();
    assert!(func.sym_table.find_stack(sym).unwrap().is_catch_object);
    // The Leave inside the catch-guarded try emitted a BrOnException edge.
    assert!(opcodes(&func).contains(&OpCode::BrOnException));
}

/// Environment slot accesses walk the frame display and record a range
/// check on the environment's defining load.
#[test]
fn env_slot_access_emits_frame_display_check() {
    let mut w = BytecodeWriter::new();
    w.emit_element_slot_i2(OpCode::LdEnvSlot, 1, 0, 2);
    w.emit_empty(OpCode::Ret);
    let mut body = body_with(w.finish(), 4);
    body.env_reg = Some(3);
    let mut func = Func::new(body, FuncConfig::default());
    build_ir(&mut func).unwrap();
    let ops = opcodes(&func);

    assert!(ops.contains(&OpCode::LdEnv));
    assert!(ops.contains(&OpCode::LdSlotArr));
    assert!(ops.contains(&OpCode::FrameDisplayCheck));

    // The check chains off the env load: LdEnv defines a fresh symbol and
    // the check re-defines the original.
    let ld_env = find_instr(&func, OpCode::LdEnv).unwrap();
    let check = func.layout.next(ld_env).unwrap();
    assert_eq!(func.pool[check].opcode, OpCode::FrameDisplayCheck);
    assert_eq!(
        func.pool[check].src1.as_ref().and_then(Opnd::reg_sym),
        func.pool[ld_env].dst.as_ref().and_then(Opnd::reg_sym)
    );
}

/// Debug mode inserts the entry bailout and post-call bailouts.
#[test]
fn debug_mode_bailouts() {
    let mut w = BytecodeWriter::new();
    w.emit_start_call(1);
    w.emit_arg(0, 1);
    w.emit_call(OpCode::CallI, 2, 1, 1, None);
    w.emit_empty(OpCode::Ret);
    let mut config = FuncConfig::default();
    config.jit_in_debug_mode = true;
    let mut func = Func::new(body_with(w.finish(), 3), config);
    build_ir(&mut func).unwrap();

    let bailouts: Vec<Instr> = func
        .layout
        .iter()
        .filter(|&i| func.pool[i].opcode == OpCode::BailForDebugger)
        .collect();
    // One at entry, one after the call returns.
    assert!(bailouts.len() >= 2);
    assert!(func.pool[bailouts[0]]
        .bail_out
        .as_ref()
        .unwrap()
        .kind
        .contains(BailOutKind::BREAKPOINT_IN_FUNCTION));
}

/// The scope prologue materializes closure objects per the body's flags.
#[test]
fn scope_prologue() {
    let mut w = BytecodeWriter::new();
    w.emit_element_slot_i1(OpCode::LdLocalSlot, 1, 2);
    w.emit_empty(OpCode::Ret);
    let mut body = body_with(w.finish(), 5);
    body.env_reg = Some(4);
    body.local_closure_reg = Some(3);
    body.local_frame_display_reg = Some(2);
    body.scope_slot_array_size = 4;
    body.is_param_and_body_scope_merged = true;
    let mut func = Func::new(body, FuncConfig::default());
    build_ir(&mut func).unwrap();
    let ops = opcodes(&func);

    assert!(ops.contains(&OpCode::LdEnv));
    assert!(ops.contains(&OpCode::NewScopeSlots));
    assert!(ops.contains(&OpCode::LdFrameDisplay));

    // The scope-slot count includes the reserved header slots.
    let new_slots = find_instr(&func, OpCode::NewScopeSlots).unwrap();
    match func.pool[new_slots].src1 {
        Some(Opnd::IntConst { value, .. }) => assert_eq!(value, 6),
        ref other => panic!("NewScopeSlots src1 is {other:?}"),
    }
}

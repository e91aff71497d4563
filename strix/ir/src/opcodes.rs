//! The opcode space.
//!
//! Bytecode opcodes and backend-only opcodes share one enum, so an IR
//! instruction built straight from bytecode keeps its opcode unchanged.
//! Backend-only opcodes (sentinels, labels, bailouts, OSR plumbing) are never
//! produced by the bytecode reader.

/// Operation codes for bytecode and IR instructions.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum OpCode {
    // ---- Bytecode opcodes ----

    // Empty layout.
    Nop,
    Ret,
    Leave,
    LeaveNull,
    Finally,
    Break,
    EndOfBlock,

    // Reg1.
    LdC_A_Null,
    Throw,
    Catch,

    // Reg2.
    Ld_A,
    Typeof,
    Conv_Num,
    Conv_Str,
    Neg_A,
    Not_A,
    Incr_A,
    Decr_A,
    BeginSwitch,
    Yield,

    // Reg2Int1.
    LdThis,

    // Reg3.
    Add_A,
    Sub_A,
    Mul_A,
    Div_A,
    Rem_A,
    And_A,
    Or_A,
    Xor_A,
    Shl_A,
    Shr_A,
    ShrU_A,
    CmEq_A,
    CmNeq_A,
    CmSrEq_A,
    CmSrNeq_A,
    CmLt_A,
    CmLe_A,
    CmGt_A,
    CmGe_A,
    IsInst,

    // Reg1Unsigned1.
    NewScArray,

    // Unsigned1.
    ProfiledLoopStart,
    ProfiledLoopBodyStart,
    ProfiledLoopEnd,

    // Arg / ArgNoSrc.
    ArgOut_A,
    ArgOut_Env,

    // StartCall.
    StartCall,

    // CallI (plus profiled forms).
    CallI,
    NewScObject,
    ProfiledCallI,
    ProfiledNewScObject,

    // ElementSlot family.
    LdSlot,
    StSlot,
    LdLocalSlot,
    StLocalSlot,
    LdEnvSlot,
    StEnvSlot,

    // ElementCP (plus profiled forms).
    LdFld,
    StFld,
    InitFld,
    LdMethodFld,
    ProfiledLdFld,
    ProfiledStFld,

    // ElementI (plus profiled forms).
    LdElemI_A,
    StElemI_A,
    ProfiledLdElemI_A,
    ProfiledStElemI_A,

    // Br.
    Br,
    EndSwitch,
    TryCatch,
    TryFinally,

    // BrReg1.
    BrTrue_A,
    BrFalse_A,

    // BrReg2.
    BrEq_A,
    BrNeq_A,
    BrSrEq_A,
    BrSrNeq_A,
    BrLt_A,
    BrLe_A,
    BrGt_A,
    BrGe_A,
    Case,

    // ---- Backend-only opcodes ----
    FunctionEntry,
    FunctionExit,
    Label,
    StatementBoundary,
    MultiBr,
    ArgIn_A,
    ArgIn_Rest,
    Ld_I4,
    Sub_I4,
    LdEnv,
    LdHandlerScope,
    LdSlotArr,
    NewScopeObject,
    NewScopeSlots,
    NewStackScopeSlots,
    NewPseudoScope,
    LdFrameDisplay,
    LdInnerFrameDisplay,
    NewStackFrameDisplay,
    InitLocalClosure,
    StSlotBoxTemp,
    FrameDisplayCheck,
    ByteCodeUses,
    BailOnNoProfile,
    BailForDebugger,
    BailOnEqual,
    CallHelper,
    BrNotAddr_A,
    BrOnException,
    InitLoopBodyCount,
    IncrLoopBodyCount,
    StLoopBodyCount,
    GeneratorBailInLabel,
    GeneratorResumeJumpTable,
    GeneratorResumeYield,
}

/// The operand layout family a bytecode opcode is encoded with.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LayoutKind {
    Empty,
    Reg1,
    Reg2,
    Reg2Int1,
    Reg3,
    Reg1Unsigned1,
    Unsigned1,
    Arg,
    ArgNoSrc,
    StartCall,
    CallI,
    ElementSlot,
    ElementSlotI1,
    ElementSlotI2,
    ElementCP,
    ElementI,
    Br,
    BrReg1,
    BrReg2,
}

impl OpCode {
    /// The layout family this opcode is encoded with, or `None` for
    /// backend-only opcodes that never appear in bytecode.
    pub fn layout(self) -> Option<LayoutKind> {
        use LayoutKind as L;
        use OpCode::*;
        Some(match self {
            Nop | Ret | Leave | LeaveNull | Finally | Break | EndOfBlock => L::Empty,
            LdC_A_Null | Throw | Catch => L::Reg1,
            Ld_A | Typeof | Conv_Num | Conv_Str | Neg_A | Not_A | Incr_A | Decr_A
            | BeginSwitch | Yield => L::Reg2,
            LdThis => L::Reg2Int1,
            Add_A | Sub_A | Mul_A | Div_A | Rem_A | And_A | Or_A | Xor_A | Shl_A | Shr_A
            | ShrU_A | CmEq_A | CmNeq_A | CmSrEq_A | CmSrNeq_A | CmLt_A | CmLe_A | CmGt_A
            | CmGe_A | IsInst => L::Reg3,
            NewScArray => L::Reg1Unsigned1,
            ProfiledLoopStart | ProfiledLoopBodyStart | ProfiledLoopEnd => L::Unsigned1,
            ArgOut_A => L::Arg,
            ArgOut_Env => L::ArgNoSrc,
            StartCall => L::StartCall,
            CallI | NewScObject | ProfiledCallI | ProfiledNewScObject => L::CallI,
            LdSlot | StSlot => L::ElementSlot,
            LdLocalSlot | StLocalSlot => L::ElementSlotI1,
            LdEnvSlot | StEnvSlot => L::ElementSlotI2,
            LdFld | StFld | InitFld | LdMethodFld | ProfiledLdFld | ProfiledStFld => L::ElementCP,
            LdElemI_A | StElemI_A | ProfiledLdElemI_A | ProfiledStElemI_A => L::ElementI,
            Br | EndSwitch | TryCatch | TryFinally => L::Br,
            BrTrue_A | BrFalse_A => L::BrReg1,
            BrEq_A | BrNeq_A | BrSrEq_A | BrSrNeq_A | BrLt_A | BrLe_A | BrGt_A | BrGe_A
            | Case => L::BrReg2,
            _ => return None,
        })
    }

    /// Is this a profiled opcode (a trailing `ProfileId` rides the layout)?
    pub fn is_profiled(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            ProfiledCallI
                | ProfiledNewScObject
                | ProfiledLdFld
                | ProfiledStFld
                | ProfiledLdElemI_A
                | ProfiledStElemI_A
        )
    }

    /// The unprofiled opcode a profiled opcode builds as.
    pub fn unprofiled(self) -> OpCode {
        use OpCode::*;
        match self {
            ProfiledCallI => CallI,
            ProfiledNewScObject => NewScObject,
            ProfiledLdFld => LdFld,
            ProfiledStFld => StFld,
            ProfiledLdElemI_A => LdElemI_A,
            ProfiledStElemI_A => StElemI_A,
            other => other,
        }
    }

    /// Opcodes whose result is a freshly allocated object the optimizer may
    /// stack-allocate.
    pub fn is_temp_object_producing(self) -> bool {
        use OpCode::*;
        matches!(self, NewScObject | NewScArray | NewScopeObject)
    }

    /// Opcodes that make or observe implicit script calls (valueOf etc.),
    /// relevant to debug-mode post-op bailouts.
    pub fn has_implicit_call(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            Add_A
                | Sub_A
                | Mul_A
                | Div_A
                | Rem_A
                | CmEq_A
                | CmNeq_A
                | CmLt_A
                | CmLe_A
                | CmGt_A
                | CmGe_A
                | Conv_Num
                | Conv_Str
                | Incr_A
                | Decr_A
                | LdFld
                | StFld
                | LdMethodFld
                | LdElemI_A
                | StElemI_A
        )
    }

    /// Opcodes that may call into a throwing helper, relevant to debug-mode
    /// post-op bailouts.
    pub fn needs_post_op_debug_bailout(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            Add_A | Div_A | Rem_A | LdFld | StFld | InitFld | LdMethodFld | LdElemI_A | StElemI_A
                | IsInst
                | NewScObject
        )
    }

    /// Is this one of the call opcodes that consume the arg stack?
    pub fn is_call(self) -> bool {
        use OpCode::*;
        matches!(self, CallI | NewScObject | ProfiledCallI | ProfiledNewScObject)
    }
}

/// Helper routines callable from JITted code.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HelperMethod {
    /// Create the interpreter frame backing a suspended generator.
    GeneratorCreateInterpreterFrame,
    /// Throw a script error object.
    OpThrow,
}

impl HelperMethod {
    /// Can a call to this helper raise a script exception?
    pub fn can_throw(self) -> bool {
        match self {
            HelperMethod::GeneratorCreateInterpreterFrame => false,
            HelperMethod::OpThrow => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiled_opcodes_unprofile_to_same_layout() {
        for op in [
            OpCode::ProfiledCallI,
            OpCode::ProfiledNewScObject,
            OpCode::ProfiledLdFld,
            OpCode::ProfiledStFld,
            OpCode::ProfiledLdElemI_A,
            OpCode::ProfiledStElemI_A,
        ] {
            assert!(op.is_profiled());
            assert_eq!(op.layout(), op.unprofiled().layout());
        }
    }

    #[test]
    fn backend_opcodes_have_no_layout() {
        assert_eq!(OpCode::Label.layout(), None);
        assert_eq!(OpCode::FunctionEntry.layout(), None);
        assert_eq!(OpCode::GeneratorResumeJumpTable.layout(), None);
    }
}

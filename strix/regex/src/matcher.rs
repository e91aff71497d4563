//! The backtracking interpreter and the fast-path matchers.
//!
//! A [`Matcher`] executes one compiled [`Program`] over a UTF-16 input. The
//! interpreter runs instruction by instruction; failing pops continuations
//! off the continuation stack until one resumes execution or the stack
//! empties, in which case the overall attempt fails and the caller retries
//! at the next start offset (unless the program is anchored or sticky).

use crate::chars::{
    self, is_lead_surrogate, is_trail_surrogate, surrogate_pair_code_point, to_canonical, Char,
    MappingSource, StandardChars, EQUIV_CLASS_SIZE, MAX_CHAR,
};
use crate::conts::{
    restore_thread_stacks, take_thread_stacks, AssertionInfo, Cont, GroupInfo, LoopInfo,
    RegexStacks,
};
use crate::inst::{
    ChompMode, CountDomain, Inst, Label, LiteralRef, ScannerInfo, COUNT_UNBOUNDED,
    MAX_SYNC_LITERALS,
};
use crate::program::{Program, ProgramKind, RegexFlags};
use log::trace;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Instruction executions between tick-counter checks of the clock.
pub const TICKS_PER_QC_TIME_CHECK: u32 = 1 << 10;
/// Tick count that forces an interrupt check even under the time budget.
pub const TICKS_PER_QC: u32 = 1 << 14;
/// Wall-clock budget between host interrupt checks.
pub const TIME_PER_QC: Duration = Duration::from_millis(50);

const _: () = assert!(TICKS_PER_QC.is_power_of_two());
const _: () = assert!(TICKS_PER_QC_TIME_CHECK.is_power_of_two());
const _: () = assert!(TICKS_PER_QC_TIME_CHECK < TICKS_PER_QC);

/// A failure raised out of the engine.
#[derive(Error, Debug)]
pub enum MatchError {
    /// The host interrupted script execution from query-continue.
    #[error("script execution interrupted")]
    Interrupted,
}

/// The host side of query-continue. The callback may re-enter the engine for
/// a different pattern; the per-thread stacks make that safe.
pub trait ScriptContext {
    /// Return `Err` to cancel the running match.
    fn check_interrupt(&mut self) -> Result<(), MatchError> {
        Ok(())
    }
}

/// A host that never interrupts.
pub struct NullScriptContext;

impl ScriptContext for NullScriptContext {}

/// How a hard failure unwinds.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum HardFailMode {
    /// Backtrack normally; retry later start offsets.
    BacktrackAndLater,
    /// Backtrack, but don't retry later start offsets.
    BacktrackOnly,
    /// No backtracking; retry later start offsets.
    LaterOnly,
    /// Neither; the whole match is over.
    ImmediateFail,
}

/// Mutable per-run interpreter registers.
struct ExecState {
    match_start: u32,
    input_offset: u32,
    /// Furthest offset the backup syncs have scanned to, to avoid
    /// re-traversal.
    next_sync_input_offset: u32,
    /// Instruction index.
    inst: Label,
    qc_ticks: u32,
    first_iteration: bool,
}

/// Per-pattern execution context: group and loop state plus the program.
///
/// A matcher is not safe to share between script contexts; use
/// [`clone_to_script_context`](Matcher::clone_to_script_context).
pub struct Matcher<'p> {
    program: &'p Program,
    group_infos: Vec<GroupInfo>,
    loop_infos: Vec<LoopInfo>,
    /// Furthest offsets each multi-sync literal has scanned to; see
    /// `SyncToLiteralsAndBackup`.
    literal_next_sync_offsets: Option<Vec<u32>>,
    previous_qc_time: Option<Instant>,
}

impl<'p> Matcher<'p> {
    pub fn new(program: &'p Program) -> Self {
        Matcher {
            program,
            group_infos: vec![GroupInfo::default(); program.num_groups as usize],
            loop_infos: vec![LoopInfo::default(); program.num_loops as usize],
            literal_next_sync_offsets: None,
            previous_qc_time: None,
        }
    }

    /// Clone this matcher (group and loop state included) for use on another
    /// script context.
    pub fn clone_to_script_context(&self) -> Matcher<'p> {
        Matcher {
            program: self.program,
            group_infos: self.group_infos.clone(),
            loop_infos: self.loop_infos.clone(),
            literal_next_sync_offsets: None,
            previous_qc_time: None,
        }
    }

    pub fn num_groups(&self) -> u16 {
        self.program.num_groups
    }

    pub fn group(&self, group_id: i32) -> GroupInfo {
        self.group_infos[group_id as usize]
    }

    pub fn was_last_match_successful(&self) -> bool {
        !self.group_infos[0].is_undefined()
    }

    /// Run the program over `input` starting at `offset`. On success group 0
    /// holds the overall match; on failure group 0 is undefined.
    pub fn matches(
        &mut self,
        input: &[Char],
        offset: u32,
        ctx: &mut dyn ScriptContext,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        debug_assert!(offset <= input_length);
        let flags = self.program.flags;

        match &self.program.kind {
            ProgramKind::Instructions
            | ProgramKind::BoiInstructions
            | ProgramKind::BoiInstructionsForStickyFlag => {
                if matches!(self.program.kind, ProgramKind::BoiInstructions) && offset != 0 {
                    self.group_infos[0].reset();
                    return Ok(false);
                }
                let loop_match_here = matches!(self.program.kind, ProgramKind::Instructions);
                self.run_interpreter(input, offset, loop_match_here, ctx)
            }
            ProgramKind::SingleChar { c } => {
                let res = if flags.contains(RegexFlags::IGNORE_CASE) {
                    self.match_single_char_case_insensitive(input, offset, *c)
                } else {
                    self.match_single_char_case_sensitive(input, offset, *c)
                };
                Ok(res)
            }
            ProgramKind::BoundedWord => Ok(self.match_bounded_word(input, offset)),
            ProgramKind::LeadingTrailingSpaces {
                begin_min_match,
                end_min_match,
            } => Ok(self.match_leading_trailing_spaces(input, offset, *begin_min_match, *end_min_match)),
            ProgramKind::Octoquad { matcher } => {
                let mut at = offset;
                if matcher.find(input, &mut at) {
                    self.group_infos[0] = GroupInfo {
                        offset: at,
                        length: matcher.pattern_length as u32,
                    };
                    Ok(true)
                } else {
                    self.group_infos[0].reset();
                    Ok(false)
                }
            }
            ProgramKind::BoiLiteral2 { cs } => {
                if offset == 0 && input_length >= 2 && input[0] == cs[0] && input[1] == cs[1] {
                    self.group_infos[0] = GroupInfo {
                        offset: 0,
                        length: 2,
                    };
                    Ok(true)
                } else {
                    self.group_infos[0].reset();
                    Ok(false)
                }
            }
        }
    }

    fn run_interpreter(
        &mut self,
        input: &[Char],
        mut offset: u32,
        loop_match_here: bool,
        ctx: &mut dyn ScriptContext,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        self.previous_qc_time = None;
        let mut qc_ticks = 0u32;
        // The next offset to sync from; shared across retries so backup
        // syncs don't rescan.
        let mut next_sync_input_offset = offset;

        let mut stacks = take_thread_stacks();

        // Keep matching even at offset == length: some patterns match the
        // empty string at the end of the input, e.g. /a*$/ on "b".
        let mut first_iteration = true;
        let mut result = Ok(false);
        loop {
            match self.match_here(
                input,
                &mut offset,
                &mut next_sync_input_offset,
                &mut stacks,
                &mut qc_ticks,
                first_iteration,
                ctx,
            ) {
                Err(e) => {
                    result = Err(e);
                    break;
                }
                Ok(true) => {
                    result = Ok(true);
                    break;
                }
                Ok(false) => {
                    first_iteration = false;
                    offset += 1;
                    if !loop_match_here || offset > input_length {
                        break;
                    }
                }
            }
        }

        restore_thread_stacks(stacks);
        result
    }

    /// One attempt from `*match_start`, which syncs may advance.
    #[allow(clippy::too_many_arguments)]
    fn match_here(
        &mut self,
        input: &[Char],
        match_start: &mut u32,
        next_sync_input_offset: &mut u32,
        stacks: &mut RegexStacks,
        qc_ticks: &mut u32,
        first_iteration: bool,
        ctx: &mut dyn ScriptContext,
    ) -> Result<bool, MatchError> {
        // Fresh stacks for a fresh attempt; a hard fail can leave entries
        // behind.
        stacks.cont_stack.clear();
        stacks.assertion_stack.clear();
        self.reset_inner_groups(0, self.program.num_groups as i32 - 1);

        let mut st = ExecState {
            match_start: *match_start,
            input_offset: *match_start,
            next_sync_input_offset: *next_sync_input_offset,
            inst: 0,
            qc_ticks: *qc_ticks,
            first_iteration,
        };
        let run_result = self.run(input, &mut st, stacks, ctx);
        *match_start = st.match_start;
        *next_sync_input_offset = st.next_sync_input_offset;
        *qc_ticks = st.qc_ticks;
        run_result?;
        Ok(self.was_last_match_successful())
    }

    fn run(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
    ) -> Result<(), MatchError> {
        let program = self.program;
        loop {
            debug_assert!(st.input_offset <= input.len() as u32);
            debug_assert!((st.inst as usize) < program.insts.len());
            self.query_continue(&mut st.qc_ticks, ctx)?;
            let inst = &program.insts[st.inst as usize];
            if self.exec_inst(inst, input, st, stacks, ctx)? {
                return Ok(());
            }
        }
    }

    // ---- Query-continue ----

    fn query_continue(
        &mut self,
        qc_ticks: &mut u32,
        ctx: &mut dyn ScriptContext,
    ) -> Result<(), MatchError> {
        *qc_ticks = qc_ticks.wrapping_add(1);
        if *qc_ticks & (TICKS_PER_QC_TIME_CHECK - 1) != 0 {
            return Ok(());
        }
        self.do_query_continue(*qc_ticks, ctx)
    }

    fn do_query_continue(
        &mut self,
        qc_ticks: u32,
        ctx: &mut dyn ScriptContext,
    ) -> Result<(), MatchError> {
        let now = Instant::now();
        let under_budget = match self.previous_qc_time {
            None => true,
            Some(before) => now.duration_since(before) < TIME_PER_QC,
        };
        if under_budget && qc_ticks & (TICKS_PER_QC - 1) != 0 {
            return Ok(());
        }
        self.previous_qc_time = Some(now);
        trace!("regex query-continue");
        // The host may re-enter the engine here; this thread's stack slot is
        // empty while we own the stacks, so a reentrant match is isolated.
        ctx.check_interrupt()
    }

    // ---- Failure machinery ----

    /// Try backtracking. Returns `true` when execution should stop (a later
    /// start offset may still match).
    fn fail(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
    ) -> Result<bool, MatchError> {
        if !stacks.cont_stack.is_empty() && !self.run_cont_stack(input, st, stacks, ctx)? {
            return Ok(false);
        }
        debug_assert!(stacks.assertion_stack.is_empty());
        self.group_infos[0].reset();
        Ok(true)
    }

    /// Pop and run continuations until one resumes execution. Returns `true`
    /// when the stack ran dry.
    fn run_cont_stack(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
    ) -> Result<bool, MatchError> {
        while let Some(cont) = stacks.cont_stack.pop() {
            if self.exec_cont(cont, input, st, stacks, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn hard_fail(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        mode: HardFailMode,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        match mode {
            HardFailMode::BacktrackAndLater => self.fail(input, st, stacks, ctx),
            HardFailMode::BacktrackOnly => {
                if self.fail(input, st, stacks, ctx)? {
                    // No use trying any more start positions.
                    st.match_start = input_length;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            HardFailMode::LaterOnly => {
                stacks.cont_stack.clear();
                stacks.assertion_stack.clear();
                Ok(true)
            }
            HardFailMode::ImmediateFail => {
                st.match_start = input_length;
                Ok(true)
            }
        }
    }

    // ---- Group bookkeeping ----

    fn reset_group(&mut self, group_id: i32) {
        self.group_infos[group_id as usize].reset();
    }

    fn reset_inner_groups(&mut self, min_group_id: i32, max_group_id: i32) {
        for id in min_group_id..=max_group_id {
            self.reset_group(id);
        }
    }

    /// Push undo records for groups `from..=to`, optionally resetting them
    /// in place for the next iteration. Runs of undefined groups collapse
    /// into range resets.
    fn save_inner_groups(&mut self, from: i32, to: i32, reset: bool, stacks: &mut RegexStacks) {
        if to < 0 {
            return;
        }
        debug_assert!(from >= 0 && from <= to);
        let mut undefined_from: Option<i32> = None;
        for id in from..=to {
            let info = self.group_infos[id as usize];
            if info.is_undefined() {
                undefined_from.get_or_insert(id);
                continue;
            }
            if let Some(range_from) = undefined_from.take() {
                Self::push_undefined_range(stacks, range_from, id - 1);
            }
            stacks.cont_stack.push(Cont::RestoreGroup {
                group_id: id,
                orig: info,
            });
            if reset {
                self.group_infos[id as usize].reset();
            }
        }
        if let Some(range_from) = undefined_from {
            Self::push_undefined_range(stacks, range_from, to);
        }
    }

    fn push_undefined_range(stacks: &mut RegexStacks, from: i32, to: i32) {
        if from == to {
            stacks.cont_stack.push(Cont::ResetGroup { group_id: from });
        } else {
            stacks.cont_stack.push(Cont::ResetGroupRange {
                from_group_id: from,
                to_group_id: to,
            });
        }
    }

    // ---- Assertions ----

    /// Close the innermost assertion frame. Returns `true` when the
    /// assertion as a whole succeeded.
    fn pop_assertion(
        &mut self,
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        succeeded: bool,
    ) -> bool {
        let info = stacks
            .assertion_stack
            .pop()
            .expect("assertion frame missing");
        let (negated, min_body_group, max_body_group, next) =
            match &self.program.insts[info.begin_label as usize] {
                Inst::BeginAssertion {
                    negated,
                    min_body_group,
                    max_body_group,
                    next,
                } => (*negated, *min_body_group, *max_body_group, *next),
                other => panic!("assertion frame begin label is {other:?}"),
            };

        // Continuations pushed inside the assertion body are never
        // backtracked into from outside.
        stacks.cont_stack.pop_to(info.cont_stack_position);

        if succeeded && negated {
            // The bindings made by the successful body of a failed negative
            // assertion must not survive.
            self.reset_inner_groups(min_body_group, max_body_group);
        }

        if succeeded == negated {
            false
        } else {
            // Continue with the follow, from the original input position.
            st.input_offset = info.start_input_offset;
            st.inst = next;
            true
        }
    }

    // ---- Continuations ----

    /// Run one continuation. Returns `true` when it resumed execution.
    fn exec_cont(
        &mut self,
        cont: Cont,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
    ) -> Result<bool, MatchError> {
        match cont {
            Cont::Resume {
                orig_input_offset,
                orig_inst_label,
            } => {
                st.input_offset = orig_input_offset;
                st.inst = orig_inst_label;
                Ok(true)
            }
            Cont::RestoreLoop { loop_id, orig } => {
                self.query_continue(&mut st.qc_ticks, ctx)?;
                self.loop_infos[loop_id as usize] = orig;
                Ok(false)
            }
            Cont::RestoreGroup { group_id, orig } => {
                self.group_infos[group_id as usize] = orig;
                Ok(false)
            }
            Cont::ResetGroup { group_id } => {
                self.reset_group(group_id);
                Ok(false)
            }
            Cont::ResetGroupRange {
                from_group_id,
                to_group_id,
            } => {
                self.reset_inner_groups(from_group_id, to_group_id);
                Ok(false)
            }
            Cont::RepeatLoop {
                begin_label,
                orig_input_offset,
            } => {
                self.query_continue(&mut st.qc_ticks, ctx)?;
                // One more iteration of a non-greedy loop.
                let (loop_id, _, has_inner_nondet, _, min_body, max_body, _) =
                    self.begin_loop_fields(begin_label);
                st.input_offset = orig_input_offset;
                self.loop_infos[loop_id as usize].start_input_offset = orig_input_offset;
                st.inst = begin_label + 1;
                if has_inner_nondet {
                    self.save_inner_groups(min_body, max_body, true, stacks);
                } else {
                    self.reset_inner_groups(min_body, max_body);
                }
                Ok(true)
            }
            Cont::PopAssertion => {
                debug_assert!(!stacks.assertion_stack.is_empty());
                // True when the body of a negative assertion failed, i.e.
                // the assertion itself holds.
                Ok(self.pop_assertion(st, stacks, false))
            }
            Cont::RewindLoopFixed {
                begin_label,
                trying_body,
            } => {
                self.query_continue(&mut st.qc_ticks, ctx)?;
                let (loop_id, repeats, exit, length) = self.begin_loop_fixed_fields(begin_label);
                let info = &mut self.loop_infos[loop_id as usize];
                if trying_body {
                    // number counts the iterations completed before the body
                    // attempt that just failed.
                    debug_assert!(info.number >= repeats.lower);
                } else {
                    // Try the follow with one fewer iteration.
                    debug_assert!(info.number > repeats.lower);
                    info.number -= 1;
                }
                st.input_offset = info.start_input_offset + info.number * length;
                if info.number > repeats.lower {
                    stacks.cont_stack.un_pop(Cont::RewindLoopFixed {
                        begin_label,
                        trying_body: false,
                    });
                }
                st.inst = exit;
                Ok(true)
            }
            Cont::RewindLoopSet { begin_label } => {
                self.query_continue(&mut st.qc_ticks, ctx)?;
                let repeats = self.loop_set_repeats(begin_label);
                let loop_id = self.loop_set_loop_id(begin_label);
                let info = &mut self.loop_infos[loop_id as usize];
                debug_assert!(info.number > repeats.lower);
                info.number -= 1;
                st.input_offset = info.start_input_offset + info.number;
                if info.number > repeats.lower {
                    stacks.cont_stack.un_pop(Cont::RewindLoopSet { begin_label });
                }
                st.inst = begin_label + 1;
                Ok(true)
            }
            Cont::RewindLoopSetWithFollowFirst { begin_label } => {
                self.query_continue(&mut st.qc_ticks, ctx)?;
                let (loop_id, repeats, follow_first) =
                    match &self.program.insts[begin_label as usize] {
                        Inst::LoopSetWithFollowFirst {
                            loop_id,
                            repeats,
                            follow_first,
                            ..
                        } => (*loop_id, *repeats, *follow_first),
                        other => panic!("rewind target is {other:?}"),
                    };
                let info = &mut self.loop_infos[loop_id as usize];
                debug_assert!(info.number > repeats.lower);
                match &mut info.offsets_of_follow_first {
                    None => {
                        if follow_first != MAX_CHAR {
                            // The follow's first character never appeared in
                            // the chomped run, so backtracking can't help.
                            info.number = repeats.lower;
                        } else {
                            // No follow-first known; one character at a time.
                            info.number -= 1;
                        }
                    }
                    Some(offsets) => match offsets.pop() {
                        // Jump straight to the previous position where the
                        // follow's first character matched.
                        Some(relative) => info.number = relative,
                        // All candidates exhausted.
                        None => info.number = repeats.lower,
                    },
                }
                info.number = info.number.max(repeats.lower);
                st.input_offset = info.start_input_offset + info.number;
                if info.number > repeats.lower {
                    stacks
                        .cont_stack
                        .un_pop(Cont::RewindLoopSetWithFollowFirst { begin_label });
                }
                st.inst = begin_label + 1;
                Ok(true)
            }
            Cont::RewindLoopFixedGroupLastIteration {
                begin_label,
                trying_body,
            } => {
                self.query_continue(&mut st.qc_ticks, ctx)?;
                let (loop_id, repeats, exit, length, group) =
                    self.begin_loop_fixed_group_fields(begin_label);
                let info = &mut self.loop_infos[loop_id as usize];
                if trying_body {
                    debug_assert!(info.number >= repeats.lower);
                } else {
                    debug_assert!(info.number > repeats.lower);
                    info.number -= 1;
                }
                st.input_offset = info.start_input_offset + info.number * length;
                let number = info.number;
                if number > 0 {
                    // Bind the previous iteration's body.
                    self.group_infos[group as usize] = GroupInfo {
                        offset: st.input_offset - length,
                        length,
                    };
                } else {
                    self.group_infos[group as usize].reset();
                }
                if number > repeats.lower {
                    stacks.cont_stack.un_pop(Cont::RewindLoopFixedGroupLastIteration {
                        begin_label,
                        trying_body: false,
                    });
                }
                st.inst = exit;
                Ok(true)
            }
        }
    }

    // ---- Loop field accessors ----

    fn begin_loop_fields(&self, label: Label) -> (u32, CountDomain, bool, Label, i32, i32, bool) {
        match &self.program.insts[label as usize] {
            Inst::BeginLoop {
                loop_id,
                repeats,
                has_inner_nondet,
                exit,
                min_body_group,
                max_body_group,
                is_greedy,
                ..
            } => (
                *loop_id,
                *repeats,
                *has_inner_nondet,
                *exit,
                *min_body_group,
                *max_body_group,
                *is_greedy,
            ),
            other => panic!("loop begin label is {other:?}"),
        }
    }

    fn begin_loop_fixed_fields(&self, label: Label) -> (u32, CountDomain, Label, u32) {
        match &self.program.insts[label as usize] {
            Inst::BeginLoopFixed {
                loop_id,
                repeats,
                exit,
                length,
                ..
            } => (*loop_id, *repeats, *exit, *length),
            other => panic!("fixed loop begin label is {other:?}"),
        }
    }

    fn begin_loop_fixed_group_fields(&self, label: Label) -> (u32, CountDomain, Label, u32, i32) {
        match &self.program.insts[label as usize] {
            Inst::BeginLoopFixedGroupLastIteration {
                loop_id,
                repeats,
                exit,
                length,
                group,
                ..
            } => (*loop_id, *repeats, *exit, *length, *group),
            other => panic!("fixed group loop begin label is {other:?}"),
        }
    }

    fn loop_set_repeats(&self, label: Label) -> CountDomain {
        match &self.program.insts[label as usize] {
            Inst::LoopSet { repeats, .. } | Inst::LoopSetWithFollowFirst { repeats, .. } => *repeats,
            other => panic!("set loop begin label is {other:?}"),
        }
    }

    fn loop_set_loop_id(&self, label: Label) -> u32 {
        match &self.program.insts[label as usize] {
            Inst::LoopSet { loop_id, .. } | Inst::LoopSetWithFollowFirst { loop_id, .. } => {
                *loop_id
            }
            other => panic!("set loop begin label is {other:?}"),
        }
    }

    // ---- Instruction execution ----

    /// Execute one instruction. Returns `true` when the run is over (match
    /// or definitive failure).
    #[allow(clippy::too_many_lines)]
    fn exec_inst(
        &mut self,
        inst: &Inst,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        let at = |off: u32| -> Option<Char> {
            if off < input_length {
                Some(input[off as usize])
            } else {
                None
            }
        };

        match inst {
            Inst::Nop => {
                st.inst += 1;
                Ok(false)
            }
            Inst::Fail => self.fail(input, st, stacks, ctx),
            Inst::Succ => {
                self.group_infos[0] = GroupInfo {
                    offset: st.match_start,
                    length: st.input_offset - st.match_start,
                };
                Ok(true)
            }
            Inst::Jump { target } => {
                st.inst = *target;
                Ok(false)
            }
            Inst::JumpIfNotChar { c, target } => {
                if at(st.input_offset) == Some(*c) {
                    st.inst += 1;
                } else {
                    st.inst = *target;
                }
                Ok(false)
            }
            Inst::MatchCharOrJump { c, target } => {
                if at(st.input_offset) == Some(*c) {
                    st.input_offset += 1;
                    st.inst += 1;
                } else {
                    st.inst = *target;
                }
                Ok(false)
            }
            Inst::JumpIfNotSet { set, target } => {
                if at(st.input_offset).is_some_and(|c| set.contains(c)) {
                    st.inst += 1;
                } else {
                    st.inst = *target;
                }
                Ok(false)
            }
            Inst::MatchSetOrJump { set, target } => {
                if at(st.input_offset).is_some_and(|c| set.contains(c)) {
                    st.input_offset += 1;
                    st.inst += 1;
                } else {
                    st.inst = *target;
                }
                Ok(false)
            }
            Inst::Switch { cases } | Inst::SwitchAndConsume { cases } => {
                let Some(c) = at(st.input_offset) else {
                    return self.fail(input, st, stacks, ctx);
                };
                let consume = matches!(inst, Inst::SwitchAndConsume { .. });
                for case in cases {
                    if case.c == c {
                        if consume {
                            st.input_offset += 1;
                        }
                        st.inst = case.target;
                        return Ok(false);
                    }
                    // Cases are in increasing character order.
                    if case.c > c {
                        break;
                    }
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::BoiTest { hard_fail } => {
                if st.input_offset > 0 {
                    if *hard_fail {
                        // Later start offsets can't help, and backtracking
                        // can't take us earlier in the input.
                        return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
                    }
                    return self.fail(input, st, stacks, ctx);
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::EoiTest { hard_fail } => {
                if st.input_offset < input_length {
                    if *hard_fail {
                        // Backtracking can't take us later, but a later
                        // start offset could reach the end.
                        return self.hard_fail(input, st, stacks, ctx, HardFailMode::LaterOnly);
                    }
                    return self.fail(input, st, stacks, ctx);
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::BolTest => {
                if st.input_offset > 0
                    && !StandardChars::is_newline(input[(st.input_offset - 1) as usize])
                {
                    return self.fail(input, st, stacks, ctx);
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::EolTest => {
                if let Some(c) = at(st.input_offset) {
                    if !StandardChars::is_newline(c) {
                        return self.fail(input, st, stacks, ctx);
                    }
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::WordBoundaryTest { negated } => {
                let prev = st.input_offset > 0
                    && StandardChars::is_word(input[(st.input_offset - 1) as usize]);
                let curr = at(st.input_offset).is_some_and(StandardChars::is_word);
                if *negated == (prev != curr) {
                    return self.fail(input, st, stacks, ctx);
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::MatchChar { c } => {
                if at(st.input_offset) == Some(*c) {
                    st.input_offset += 1;
                    st.inst += 1;
                    Ok(false)
                } else {
                    self.fail(input, st, stacks, ctx)
                }
            }
            Inst::MatchChar2 { cs } => self.match_char_alt(input, st, stacks, ctx, cs),
            Inst::MatchChar3 { cs } => self.match_char_alt(input, st, stacks, ctx, cs),
            Inst::MatchChar4 { cs } => self.match_char_alt(input, st, stacks, ctx, cs),
            Inst::MatchSet { set, negated } => {
                match at(st.input_offset) {
                    Some(c) if set.contains(c) != *negated => {
                        st.input_offset += 1;
                        st.inst += 1;
                        Ok(false)
                    }
                    _ => self.fail(input, st, stacks, ctx),
                }
            }
            Inst::MatchLiteral { literal } => self.match_literal(input, st, stacks, ctx, *literal),
            Inst::MatchLiteralEquiv { literal } => {
                self.match_literal_equiv(input, st, stacks, ctx, *literal)
            }
            Inst::MatchTrie { trie } => {
                if trie.matches(input, &mut st.input_offset) {
                    st.inst += 1;
                    Ok(false)
                } else {
                    self.fail(input, st, stacks, ctx)
                }
            }
            Inst::OptMatchChar { c } => {
                if at(st.input_offset) == Some(*c) {
                    st.input_offset += 1;
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::OptMatchSet { set } => {
                if at(st.input_offset).is_some_and(|c| set.contains(c)) {
                    st.input_offset += 1;
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::MatchGroup { group } => self.match_group(input, st, stacks, ctx, *group),

            // Synchronization.
            Inst::SyncToCharAndContinue { c } => {
                while at(st.input_offset).is_some_and(|x| x != *c) {
                    st.input_offset += 1;
                }
                st.match_start = st.input_offset;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToChar2SetAndContinue { cs } => {
                while at(st.input_offset).is_some_and(|x| x != cs[0] && x != cs[1]) {
                    st.input_offset += 1;
                }
                st.match_start = st.input_offset;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToSetAndContinue { set, negated } => {
                while at(st.input_offset).is_some_and(|x| set.contains(x) == *negated) {
                    st.input_offset += 1;
                }
                st.match_start = st.input_offset;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToChar2LiteralAndContinue { cs } => {
                if !crate::scanners::find_char2_literal(input, &mut st.input_offset, cs[0], cs[1]) {
                    return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
                }
                st.match_start = st.input_offset;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToLiteralAndContinue { scanner } => {
                if !scanner.find(input, &mut st.input_offset, &self.program.litbuf) {
                    return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
                }
                st.match_start = st.input_offset;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToCharAndConsume { c } => {
                while at(st.input_offset).is_some_and(|x| x != *c) {
                    st.input_offset += 1;
                }
                if st.input_offset >= input_length {
                    return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
                }
                st.match_start = st.input_offset;
                st.input_offset += 1;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToChar2SetAndConsume { cs } => {
                while at(st.input_offset).is_some_and(|x| x != cs[0] && x != cs[1]) {
                    st.input_offset += 1;
                }
                if st.input_offset >= input_length {
                    return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
                }
                st.match_start = st.input_offset;
                st.input_offset += 1;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToSetAndConsume { set, negated } => {
                while at(st.input_offset).is_some_and(|x| set.contains(x) == *negated) {
                    st.input_offset += 1;
                }
                if st.input_offset >= input_length {
                    return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
                }
                st.match_start = st.input_offset;
                st.input_offset += 1;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToChar2LiteralAndConsume { cs } => {
                if !crate::scanners::find_char2_literal(input, &mut st.input_offset, cs[0], cs[1]) {
                    return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
                }
                st.match_start = st.input_offset;
                st.input_offset += 2;
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToLiteralAndConsume { scanner } => {
                if !scanner.find(input, &mut st.input_offset, &self.program.litbuf) {
                    return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
                }
                st.match_start = st.input_offset;
                st.input_offset += scanner.literal_length();
                st.inst += 1;
                Ok(false)
            }
            Inst::SyncToCharAndBackup { c, backup } => {
                self.sync_backup(input, st, stacks, ctx, *backup, |input, offset| {
                    let mut o = *offset;
                    while (o as usize) < input.len() && input[o as usize] != *c {
                        o += 1;
                    }
                    *offset = o;
                    (o as usize) < input.len()
                })
            }
            Inst::SyncToSetAndBackup { set, negated, backup } => {
                self.sync_backup(input, st, stacks, ctx, *backup, |input, offset| {
                    let mut o = *offset;
                    while (o as usize) < input.len() && (set.contains(input[o as usize]) == *negated)
                    {
                        o += 1;
                    }
                    *offset = o;
                    (o as usize) < input.len()
                })
            }
            Inst::SyncToChar2LiteralAndBackup { cs, backup } => {
                self.sync_backup(input, st, stacks, ctx, *backup, |input, offset| {
                    crate::scanners::find_char2_literal(input, offset, cs[0], cs[1])
                })
            }
            Inst::SyncToLiteralAndBackup { scanner, backup } => {
                let program = self.program;
                self.sync_backup(input, st, stacks, ctx, *backup, |input, offset| {
                    scanner.find(input, offset, &program.litbuf)
                })
            }
            Inst::SyncToLiteralsAndBackup { scanners, backup } => {
                self.sync_to_literals_and_backup(input, st, stacks, ctx, scanners, *backup)
            }

            // Group bookkeeping.
            Inst::BeginDefineGroup { group } => {
                let info = &mut self.group_infos[*group as usize];
                debug_assert!(info.is_undefined());
                info.offset = st.input_offset;
                st.inst += 1;
                Ok(false)
            }
            Inst::EndDefineGroup { group, no_need_to_save } => {
                if !no_need_to_save {
                    // UNDO ACTION: undefine the group again on backtrack.
                    stacks.cont_stack.push(Cont::ResetGroup { group_id: *group });
                }
                let info = &mut self.group_infos[*group as usize];
                debug_assert!(info.is_undefined());
                debug_assert!(st.input_offset >= info.offset);
                info.length = st.input_offset - info.offset;
                st.inst += 1;
                Ok(false)
            }
            Inst::DefineGroupFixed { group, length, no_need_to_save } => {
                if !no_need_to_save {
                    stacks.cont_stack.push(Cont::ResetGroup { group_id: *group });
                }
                self.group_infos[*group as usize] = GroupInfo {
                    offset: st.input_offset - length,
                    length: *length,
                };
                st.inst += 1;
                Ok(false)
            }

            // Loops.
            Inst::BeginLoop {
                loop_id,
                repeats,
                has_outer_loops,
                min_body_group,
                max_body_group,
                exit,
                is_greedy,
                ..
            } => {
                // With outer loops, choicepoints from an earlier run of this
                // loop may still be on the stack; a non-greedy RepeatLoop
                // would read this loop's state, so preserve it.
                if !is_greedy && *has_outer_loops {
                    let orig = self.loop_infos[*loop_id as usize].clone();
                    stacks.cont_stack.push(Cont::RestoreLoop {
                        loop_id: *loop_id,
                        orig,
                    });
                }

                // The loop body must always begin with its inner groups
                // reset, either by match entry or by the enclosing loop's
                // repeat.
                #[cfg(debug_assertions)]
                if *min_body_group >= 0 {
                    for id in *min_body_group..=*max_body_group {
                        debug_assert!(self.group_infos[id as usize].is_undefined());
                    }
                }
                #[cfg(not(debug_assertions))]
                let _ = (min_body_group, max_body_group);

                let info = &mut self.loop_infos[*loop_id as usize];
                info.number = 0;
                info.start_input_offset = st.input_offset;

                if repeats.lower == 0 {
                    if *is_greedy {
                        // CHOICEPOINT: try one iteration of the body; on
                        // backtrack continue from here with no iterations.
                        stacks.cont_stack.push(Cont::Resume {
                            orig_input_offset: st.input_offset,
                            orig_inst_label: *exit,
                        });
                        st.inst += 1;
                    } else {
                        // CHOICEPOINT: try no iterations; on backtrack do
                        // one iteration of the body from here.
                        stacks.cont_stack.push(Cont::RepeatLoop {
                            begin_label: st.inst,
                            orig_input_offset: st.input_offset,
                        });
                        st.inst = *exit;
                    }
                } else {
                    // Must match the minimum iterations first.
                    st.inst += 1;
                }
                Ok(false)
            }
            Inst::RepeatLoop { begin } => self.repeat_loop(input, st, stacks, ctx, *begin),
            Inst::BeginLoopIfChar {
                c,
                loop_id,
                repeats,
                exit,
                ..
            } => {
                if at(st.input_offset) == Some(*c) {
                    // Commit to at least one iteration.
                    self.loop_infos[*loop_id as usize].number = 0;
                    st.inst += 1;
                    return Ok(false);
                }
                if repeats.lower > 0 {
                    return self.fail(input, st, stacks, ctx);
                }
                st.inst = *exit;
                Ok(false)
            }
            Inst::BeginLoopIfSet {
                set,
                loop_id,
                repeats,
                exit,
                ..
            } => {
                if at(st.input_offset).is_some_and(|x| set.contains(x)) {
                    let info = &mut self.loop_infos[*loop_id as usize];
                    info.start_input_offset = st.input_offset;
                    info.number = 0;
                    st.inst += 1;
                    return Ok(false);
                }
                if repeats.lower > 0 {
                    return self.fail(input, st, stacks, ctx);
                }
                st.inst = *exit;
                Ok(false)
            }
            Inst::RepeatLoopIfChar { begin } => {
                let (c, loop_id, repeats, has_inner_nondet, exit, min_body, max_body) =
                    match &self.program.insts[*begin as usize] {
                        Inst::BeginLoopIfChar {
                            c,
                            loop_id,
                            repeats,
                            has_inner_nondet,
                            exit,
                            min_body_group,
                            max_body_group,
                            ..
                        } => (
                            *c,
                            *loop_id,
                            *repeats,
                            *has_inner_nondet,
                            *exit,
                            *min_body_group,
                            *max_body_group,
                        ),
                        other => panic!("loop begin label is {other:?}"),
                    };
                let guard = at(st.input_offset) == Some(c);
                self.repeat_guarded_loop(
                    input, st, stacks, ctx, *begin, loop_id, repeats, has_inner_nondet, exit,
                    min_body, max_body, guard,
                )
            }
            Inst::RepeatLoopIfSet { begin } => {
                let (loop_id, repeats, has_inner_nondet, exit, min_body, max_body, guard) =
                    match &self.program.insts[*begin as usize] {
                        Inst::BeginLoopIfSet {
                            set,
                            loop_id,
                            repeats,
                            has_inner_nondet,
                            exit,
                            min_body_group,
                            max_body_group,
                            ..
                        } => (
                            *loop_id,
                            *repeats,
                            *has_inner_nondet,
                            *exit,
                            *min_body_group,
                            *max_body_group,
                            at(st.input_offset).is_some_and(|x| set.contains(x)),
                        ),
                        other => panic!("loop begin label is {other:?}"),
                    };
                self.repeat_guarded_loop(
                    input, st, stacks, ctx, *begin, loop_id, repeats, has_inner_nondet, exit,
                    min_body, max_body, guard,
                )
            }
            Inst::BeginLoopFixed {
                loop_id,
                repeats,
                has_outer_loops,
                ..
            } => {
                // An outer backtrack may run a RewindLoopFixed pushed by an
                // earlier run of this loop; preserve its state.
                if *has_outer_loops {
                    let orig = self.loop_infos[*loop_id as usize].clone();
                    stacks.cont_stack.push(Cont::RestoreLoop {
                        loop_id: *loop_id,
                        orig,
                    });
                }
                // start stays put for all iterations; rewinding computes
                // positions from (start, number, length).
                let info = &mut self.loop_infos[*loop_id as usize];
                info.number = 0;
                info.start_input_offset = st.input_offset;
                if repeats.lower == 0 {
                    // CHOICEPOINT: failure of the body rewinds the input and
                    // resumes with the follow.
                    stacks.cont_stack.push(Cont::RewindLoopFixed {
                        begin_label: st.inst,
                        trying_body: true,
                    });
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::RepeatLoopFixed { begin } => {
                let (loop_id, repeats, exit, _) = self.begin_loop_fixed_fields(*begin);
                let info = &mut self.loop_infos[loop_id as usize];
                info.number += 1;
                if info.number < repeats.lower {
                    // Failure of the body is failure of the whole loop.
                    st.inst = begin + 1;
                } else if !repeats.is_unbounded() && info.number >= repeats.upper {
                    if repeats.lower < repeats.upper {
                        // The rewind continuation must be on top: the body is
                        // deterministic and defines no groups.
                        match stacks.cont_stack.top_mut() {
                            Some(Cont::RewindLoopFixed { trying_body, .. }) => {
                                *trying_body = false;
                            }
                            top => panic!("expected rewind continuation, found {top:?}"),
                        }
                    }
                    st.inst = exit;
                } else {
                    if info.number == repeats.lower {
                        // lower > 0, so BeginLoopFixed didn't push it.
                        stacks.cont_stack.push(Cont::RewindLoopFixed {
                            begin_label: *begin,
                            trying_body: true,
                        });
                    }
                    st.inst = begin + 1;
                }
                Ok(false)
            }
            Inst::LoopSet {
                set,
                loop_id,
                repeats,
                has_outer_loops,
            } => {
                if *has_outer_loops {
                    let orig = self.loop_infos[*loop_id as usize].clone();
                    stacks.cont_stack.push(Cont::RestoreLoop {
                        loop_id: *loop_id,
                        orig,
                    });
                }
                let start = st.input_offset;
                let end = Self::chomp_limit(st.input_offset, input_length, repeats.upper);
                while st.input_offset < end && set.contains(input[st.input_offset as usize]) {
                    st.input_offset += 1;
                }
                let info = &mut self.loop_infos[*loop_id as usize];
                info.start_input_offset = start;
                info.number = st.input_offset - start;
                if info.number < repeats.lower {
                    return self.fail(input, st, stacks, ctx);
                }
                if info.number > repeats.lower {
                    // CHOICEPOINT: if the follow fails, consume one fewer.
                    stacks.cont_stack.push(Cont::RewindLoopSet {
                        begin_label: st.inst,
                    });
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::LoopSetWithFollowFirst {
                set,
                loop_id,
                repeats,
                has_outer_loops,
                follow_first,
            } => {
                if *has_outer_loops {
                    let orig = self.loop_infos[*loop_id as usize].clone();
                    stacks.cont_stack.push(Cont::RestoreLoop {
                        loop_id: *loop_id,
                        orig,
                    });
                }
                {
                    let info = &mut self.loop_infos[*loop_id as usize];
                    if let Some(offsets) = &mut info.offsets_of_follow_first {
                        offsets.clear();
                    }
                    info.start_input_offset = st.input_offset;
                }
                let start = st.input_offset;
                let end = Self::chomp_limit(st.input_offset, input_length, repeats.upper);
                while st.input_offset < end && set.contains(input[st.input_offset as usize]) {
                    if input[st.input_offset as usize] == *follow_first {
                        let relative = st.input_offset - start;
                        self.loop_infos[*loop_id as usize]
                            .ensure_offsets_of_follow_first()
                            .push(relative);
                    }
                    st.input_offset += 1;
                }
                let info = &mut self.loop_infos[*loop_id as usize];
                info.number = st.input_offset - start;
                if info.number < repeats.lower {
                    return self.fail(input, st, stacks, ctx);
                }
                if info.number > repeats.lower {
                    stacks.cont_stack.push(Cont::RewindLoopSetWithFollowFirst {
                        begin_label: st.inst,
                    });
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::BeginLoopFixedGroupLastIteration {
                loop_id,
                repeats,
                has_outer_loops,
                group,
                no_need_to_save,
                ..
            } => {
                debug_assert!(self.group_infos[*group as usize].is_undefined());
                if *has_outer_loops {
                    let orig = self.loop_infos[*loop_id as usize].clone();
                    stacks.cont_stack.push(Cont::RestoreLoop {
                        loop_id: *loop_id,
                        orig,
                    });
                }
                if !no_need_to_save {
                    // Backtracking all the way out must unbind the group.
                    stacks.cont_stack.push(Cont::ResetGroup { group_id: *group });
                }
                let info = &mut self.loop_infos[*loop_id as usize];
                info.number = 0;
                info.start_input_offset = st.input_offset;
                if repeats.lower == 0 {
                    stacks
                        .cont_stack
                        .push(Cont::RewindLoopFixedGroupLastIteration {
                            begin_label: st.inst,
                            trying_body: true,
                        });
                }
                st.inst += 1;
                Ok(false)
            }
            Inst::RepeatLoopFixedGroupLastIteration { begin } => {
                let (loop_id, repeats, exit, length, group) =
                    self.begin_loop_fixed_group_fields(*begin);
                let info = &mut self.loop_infos[loop_id as usize];
                info.number += 1;
                if info.number < repeats.lower {
                    st.inst = begin + 1;
                } else if !repeats.is_unbounded() && info.number >= repeats.upper {
                    if repeats.lower < repeats.upper {
                        match stacks.cont_stack.top_mut() {
                            Some(Cont::RewindLoopFixedGroupLastIteration {
                                trying_body, ..
                            }) => *trying_body = false,
                            top => panic!("expected rewind continuation, found {top:?}"),
                        }
                    }
                    self.group_infos[group as usize] = GroupInfo {
                        offset: st.input_offset - length,
                        length,
                    };
                    st.inst = exit;
                } else {
                    if info.number == repeats.lower {
                        stacks
                            .cont_stack
                            .push(Cont::RewindLoopFixedGroupLastIteration {
                                begin_label: *begin,
                                trying_body: true,
                            });
                    }
                    st.inst = begin + 1;
                }
                Ok(false)
            }
            Inst::BeginGreedyLoopNoBacktrack { loop_id, exit } => {
                let info = &mut self.loop_infos[*loop_id as usize];
                info.number = 0;
                info.start_input_offset = st.input_offset;
                // CHOICEPOINT: on backtrack continue from here with no
                // iterations.
                stacks.cont_stack.push(Cont::Resume {
                    orig_input_offset: st.input_offset,
                    orig_inst_label: *exit,
                });
                st.inst += 1;
                Ok(false)
            }
            Inst::RepeatGreedyLoopNoBacktrack { begin } => {
                let loop_id = match &self.program.insts[*begin as usize] {
                    Inst::BeginGreedyLoopNoBacktrack { loop_id, .. } => *loop_id,
                    other => panic!("loop begin label is {other:?}"),
                };
                let info = &mut self.loop_infos[loop_id as usize];
                info.number += 1;
                if st.input_offset == info.start_input_offset {
                    // No progress.
                    return self.fail(input, st, stacks, ctx);
                }
                // The body is deterministic and group-free, so the Resume
                // pushed at loop entry is still on top; just move it
                // forward.
                match stacks.cont_stack.top_mut() {
                    Some(Cont::Resume {
                        orig_input_offset, ..
                    }) => *orig_input_offset = st.input_offset,
                    top => panic!("expected resume continuation, found {top:?}"),
                }
                info.start_input_offset = st.input_offset;
                st.inst = begin + 1;
                Ok(false)
            }

            // Chomps.
            Inst::ChompChar { c, mode } => {
                self.chomp(input, st, stacks, ctx, *mode, |x| x == *c)
            }
            Inst::ChompSet { set, mode } => {
                self.chomp(input, st, stacks, ctx, *mode, |x| set.contains(x))
            }
            Inst::ChompCharGroup {
                c,
                mode,
                group,
                no_need_to_save,
            } => self.chomp_group(input, st, stacks, ctx, *mode, *group, *no_need_to_save, |x| {
                x == *c
            }),
            Inst::ChompSetGroup {
                set,
                mode,
                group,
                no_need_to_save,
            } => self.chomp_group(input, st, stacks, ctx, *mode, *group, *no_need_to_save, |x| {
                set.contains(x)
            }),
            Inst::ChompCharBounded { c, repeats } => {
                self.chomp_bounded(input, st, stacks, ctx, *repeats, |x| x == *c)
            }
            Inst::ChompSetBounded { set, repeats } => {
                self.chomp_bounded(input, st, stacks, ctx, *repeats, |x| set.contains(x))
            }
            Inst::ChompSetBoundedGroupLastChar {
                set,
                repeats,
                group,
                no_need_to_save,
            } => {
                debug_assert!(self.group_infos[*group as usize].is_undefined());
                let start = st.input_offset;
                let end = Self::chomp_limit(st.input_offset, input_length, repeats.upper);
                while st.input_offset < end && set.contains(input[st.input_offset as usize]) {
                    st.input_offset += 1;
                }
                if st.input_offset - start < repeats.lower {
                    return self.fail(input, st, stacks, ctx);
                }
                if st.input_offset > start {
                    if !no_need_to_save {
                        stacks.cont_stack.push(Cont::ResetGroup { group_id: *group });
                    }
                    self.group_infos[*group as usize] = GroupInfo {
                        offset: st.input_offset - 1,
                        length: 1,
                    };
                }
                st.inst += 1;
                Ok(false)
            }

            // Choicepoints.
            Inst::Try { fail } => {
                stacks.cont_stack.push(Cont::Resume {
                    orig_input_offset: st.input_offset,
                    orig_inst_label: *fail,
                });
                st.inst += 1;
                Ok(false)
            }
            Inst::TryIfChar { c, fail } => {
                if at(st.input_offset) == Some(*c) {
                    stacks.cont_stack.push(Cont::Resume {
                        orig_input_offset: st.input_offset,
                        orig_inst_label: *fail,
                    });
                    st.inst += 1;
                } else {
                    st.inst = *fail;
                }
                Ok(false)
            }
            Inst::TryMatchChar { c, fail } => {
                if at(st.input_offset) == Some(*c) {
                    stacks.cont_stack.push(Cont::Resume {
                        orig_input_offset: st.input_offset,
                        orig_inst_label: *fail,
                    });
                    st.input_offset += 1;
                    st.inst += 1;
                } else {
                    st.inst = *fail;
                }
                Ok(false)
            }
            Inst::TryIfSet { set, fail } => {
                if at(st.input_offset).is_some_and(|x| set.contains(x)) {
                    stacks.cont_stack.push(Cont::Resume {
                        orig_input_offset: st.input_offset,
                        orig_inst_label: *fail,
                    });
                    st.inst += 1;
                } else {
                    st.inst = *fail;
                }
                Ok(false)
            }
            Inst::TryMatchSet { set, fail } => {
                if at(st.input_offset).is_some_and(|x| set.contains(x)) {
                    stacks.cont_stack.push(Cont::Resume {
                        orig_input_offset: st.input_offset,
                        orig_inst_label: *fail,
                    });
                    st.input_offset += 1;
                    st.inst += 1;
                } else {
                    st.inst = *fail;
                }
                Ok(false)
            }

            // Assertions.
            Inst::BeginAssertion {
                negated,
                min_body_group,
                max_body_group,
                ..
            } => {
                if !negated {
                    // On success the RestoreGroup continuations pushed in the
                    // body will be cut; if the whole assertion is later
                    // backtracked over, the outer bindings must come back.
                    self.save_inner_groups(*min_body_group, *max_body_group, false, stacks);
                }
                stacks.assertion_stack.push(AssertionInfo {
                    begin_label: st.inst,
                    start_input_offset: st.input_offset,
                    cont_stack_position: stacks.cont_stack.position(),
                });
                stacks.cont_stack.push(Cont::PopAssertion);
                st.inst += 1;
                Ok(false)
            }
            Inst::EndAssertion => {
                if !self.pop_assertion(st, stacks, true) {
                    // The body of a negative assertion succeeded.
                    return self.fail(input, st, stacks, ctx);
                }
                Ok(false)
            }
        }
    }

    // ---- Shared instruction bodies ----

    fn match_char_alt(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        cs: &[Char],
    ) -> Result<bool, MatchError> {
        if (st.input_offset as usize) < input.len()
            && cs.contains(&input[st.input_offset as usize])
        {
            st.input_offset += 1;
            st.inst += 1;
            Ok(false)
        } else {
            self.fail(input, st, stacks, ctx)
        }
    }

    fn match_literal(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        literal: LiteralRef,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        if literal.length > input_length - st.input_offset {
            return self.fail(input, st, stacks, ctx);
        }
        let pat = &self.program.litbuf
            [literal.offset as usize..(literal.offset + literal.length) as usize];
        let window =
            &input[st.input_offset as usize..(st.input_offset + literal.length) as usize];
        if window != pat {
            return self.fail(input, st, stacks, ctx);
        }
        st.input_offset += literal.length;
        st.inst += 1;
        Ok(false)
    }

    fn match_literal_equiv(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        literal: LiteralRef,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        if literal.length > input_length - st.input_offset {
            return self.fail(input, st, stacks, ctx);
        }
        let program = self.program;
        let litbuf = &program.litbuf;
        let mut lit = literal.offset as usize;
        for j in 0..literal.length {
            let c = input[(st.input_offset + j) as usize];
            let row = &litbuf[lit..lit + EQUIV_CLASS_SIZE];
            if !row.contains(&c) {
                return self.fail(input, st, stacks, ctx);
            }
            lit += EQUIV_CLASS_SIZE;
        }
        st.input_offset += literal.length;
        st.inst += 1;
        Ok(false)
    }

    fn match_group(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        group: i32,
    ) -> Result<bool, MatchError> {
        let info = self.group_infos[group as usize];
        if info.is_undefined() || info.length == 0 {
            // An unbound or empty group trivially matches the empty string.
            st.inst += 1;
            return Ok(false);
        }
        let input_length = input.len() as u32;
        if info.length > input_length - st.input_offset {
            return self.fail(input, st, stacks, ctx);
        }

        let flags = self.program.flags;
        let ignore_case = flags.contains(RegexFlags::IGNORE_CASE);
        let unicode = flags.contains(RegexFlags::UNICODE);

        let mut group_offset = info.offset;
        let group_end = info.offset + info.length;

        if ignore_case && unicode {
            // The one place the runtime machinery converts characters to
            // their equivalence class: full code points, case folded.
            let next_code_point = |offset: &mut u32, end: u32| -> Option<u32> {
                if end <= *offset {
                    return None;
                }
                let lead = input[*offset as usize];
                if !is_lead_surrogate(lead) || *offset + 1 == end {
                    *offset += 1;
                    return Some(lead as u32);
                }
                let trail = input[(*offset + 1) as usize];
                if !is_trail_surrogate(trail) {
                    *offset += 1;
                    Some(lead as u32)
                } else {
                    *offset += 2;
                    Some(surrogate_pair_code_point(lead, trail))
                }
            };

            while let Some(group_cp) = next_code_point(&mut group_offset, group_end) {
                // The length precheck guarantees the input side has a code
                // point whenever the group side does.
                let input_cp = next_code_point(&mut st.input_offset, input_length)
                    .expect("input exhausted before group");
                let matched = if group_cp <= 0xffff {
                    let canon = |cp: u32| {
                        to_canonical(MappingSource::CaseFolding, cp as Char) as u32
                    };
                    canon(group_cp) == canon(input_cp)
                } else {
                    chars::code_point_equiv_class(group_cp).contains(&input_cp)
                };
                if !matched {
                    return self.fail(input, st, stacks, ctx);
                }
            }
        } else if ignore_case {
            while group_offset < group_end {
                let a = to_canonical(MappingSource::UnicodeData, input[group_offset as usize]);
                let b = to_canonical(MappingSource::UnicodeData, input[st.input_offset as usize]);
                if a != b {
                    return self.fail(input, st, stacks, ctx);
                }
                group_offset += 1;
                st.input_offset += 1;
            }
        } else {
            while group_offset < group_end {
                if input[group_offset as usize] != input[st.input_offset as usize] {
                    return self.fail(input, st, stacks, ctx);
                }
                group_offset += 1;
                st.input_offset += 1;
            }
        }

        st.inst += 1;
        Ok(false)
    }

    /// The input end of a bounded chomp.
    fn chomp_limit(offset: u32, input_length: u32, upper: u32) -> u32 {
        if upper >= input_length - offset {
            input_length
        } else {
            offset + upper
        }
    }

    fn chomp(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        mode: ChompMode,
        matches: impl Fn(Char) -> bool,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        let ok = |off: u32| off < input_length && matches(input[off as usize]);
        if mode == ChompMode::Plus && !ok(st.input_offset) {
            return self.fail(input, st, stacks, ctx);
        }
        while ok(st.input_offset) {
            st.input_offset += 1;
        }
        st.inst += 1;
        Ok(false)
    }

    #[allow(clippy::too_many_arguments)]
    fn chomp_group(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        mode: ChompMode,
        group: i32,
        no_need_to_save: bool,
        matches: impl Fn(Char) -> bool,
    ) -> Result<bool, MatchError> {
        debug_assert!(self.group_infos[group as usize].is_undefined());
        let input_length = input.len() as u32;
        let start = st.input_offset;
        let ok = |off: u32| off < input_length && matches(input[off as usize]);
        if mode == ChompMode::Plus && !ok(st.input_offset) {
            return self.fail(input, st, stacks, ctx);
        }
        while ok(st.input_offset) {
            st.input_offset += 1;
        }
        if !no_need_to_save {
            // UNDO ACTION: undefine the group again on backtrack.
            stacks.cont_stack.push(Cont::ResetGroup { group_id: group });
        }
        self.group_infos[group as usize] = GroupInfo {
            offset: start,
            length: st.input_offset - start,
        };
        st.inst += 1;
        Ok(false)
    }

    fn chomp_bounded(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        repeats: CountDomain,
        matches: impl Fn(Char) -> bool,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        let start = st.input_offset;
        let end = Self::chomp_limit(st.input_offset, input_length, repeats.upper);
        while st.input_offset < end && matches(input[st.input_offset as usize]) {
            st.input_offset += 1;
        }
        if st.input_offset - start < repeats.lower {
            return self.fail(input, st, stacks, ctx);
        }
        st.inst += 1;
        Ok(false)
    }

    /// Shared implementation of the backup syncs: find the literal/character
    /// candidate, then back the match start up into it.
    fn sync_backup(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        backup: CountDomain,
        find: impl Fn(&[Char], &mut u32) -> bool,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        if backup.lower > input_length - st.match_start {
            // Even a match at the very end can't satisfy the minimum backup.
            return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
        }
        if st.input_offset < st.next_sync_input_offset {
            // We haven't reached the offset we last synced to before backing
            // up; syncing again would land in the same place.
            st.inst += 1;
            return Ok(false);
        }
        if backup.lower > st.input_offset - st.match_start {
            // No use looking before the minimum backup is possible.
            st.input_offset = st.match_start + backup.lower;
        }
        if !find(input, &mut st.input_offset) {
            return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
        }
        st.next_sync_input_offset = st.input_offset + 1;

        if backup.upper != COUNT_UNBOUNDED {
            let max_backup = st.input_offset - st.match_start;
            st.match_start = st.input_offset - max_backup.min(backup.upper);
        }
        // else: leave the start where it is.

        st.input_offset = st.match_start;
        st.inst += 1;
        Ok(false)
    }

    fn sync_to_literals_and_backup(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        scanners: &[ScannerInfo],
        backup: CountDomain,
    ) -> Result<bool, MatchError> {
        let input_length = input.len() as u32;
        if backup.lower > input_length - st.match_start {
            return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
        }
        if st.input_offset < st.next_sync_input_offset {
            st.inst += 1;
            return Ok(false);
        }
        if backup.lower > st.input_offset - st.match_start {
            st.input_offset = st.match_start + backup.lower;
        }

        debug_assert!(scanners.len() <= MAX_SYNC_LITERALS);
        let program = self.program;
        let offsets = self
            .literal_next_sync_offsets
            .get_or_insert_with(|| vec![0; MAX_SYNC_LITERALS]);
        if st.first_iteration {
            offsets[..scanners.len()].fill(st.input_offset);
        }

        // Track the furthest point each literal was seen so later attempts
        // never rescan for it.
        let mut best: Option<(usize, u32)> = None;
        for (i, info) in scanners.iter().enumerate() {
            let mut this_offset = offsets[i].max(st.input_offset);
            if info.scanner.find(input, &mut this_offset, &program.litbuf) {
                if best.map_or(true, |(_, b)| this_offset < b) {
                    best = Some((i, this_offset));
                }
                offsets[i] = this_offset;
            } else {
                offsets[i] = input_length;
            }
        }

        let Some((_, best_offset)) = best else {
            return self.hard_fail(input, st, stacks, ctx, HardFailMode::ImmediateFail);
        };
        st.next_sync_input_offset = best_offset + 1;

        if backup.upper != COUNT_UNBOUNDED {
            let max_backup = best_offset - st.match_start;
            st.match_start = best_offset - max_backup.min(backup.upper);
        }
        st.input_offset = st.match_start;
        st.inst += 1;
        Ok(false)
    }

    /// Shared tail of RepeatLoopIfChar/RepeatLoopIfSet.
    #[allow(clippy::too_many_arguments)]
    fn repeat_guarded_loop(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        begin: Label,
        loop_id: u32,
        repeats: CountDomain,
        has_inner_nondet: bool,
        exit: Label,
        min_body: i32,
        max_body: i32,
        guard: bool,
    ) -> Result<bool, MatchError> {
        if has_inner_nondet {
            // Backtracking may land in the body of the iteration just
            // completed.
            let orig = self.loop_infos[loop_id as usize].clone();
            stacks.cont_stack.push(Cont::RestoreLoop { loop_id, orig });
        }
        self.loop_infos[loop_id as usize].number += 1;
        let number = self.loop_infos[loop_id as usize].number;

        if guard {
            if !repeats.is_unbounded() && number >= repeats.upper {
                // The next input character is in the body's first set and
                // the follow set is disjoint, so just fail.
                return self.fail(input, st, stacks, ctx);
            }
            if has_inner_nondet {
                self.save_inner_groups(min_body, max_body, true, stacks);
            } else {
                self.reset_inner_groups(min_body, max_body);
            }
            st.inst = begin + 1;
            return Ok(false);
        }

        if number < repeats.lower {
            return self.fail(input, st, stacks, ctx);
        }
        st.inst = exit;
        Ok(false)
    }

    fn repeat_loop(
        &mut self,
        input: &[Char],
        st: &mut ExecState,
        stacks: &mut RegexStacks,
        ctx: &mut dyn ScriptContext,
        begin: Label,
    ) -> Result<bool, MatchError> {
        let (loop_id, repeats, has_inner_nondet, exit, min_body, max_body, is_greedy) =
            self.begin_loop_fields(begin);

        if has_inner_nondet {
            // Each iteration is protected by a RestoreLoop so backtracks
            // into earlier iterations see the right loop state.
            let orig = self.loop_infos[loop_id as usize].clone();
            stacks.cont_stack.push(Cont::RestoreLoop { loop_id, orig });
        }

        self.loop_infos[loop_id as usize].number += 1;
        let number = self.loop_infos[loop_id as usize].number;
        let start = self.loop_infos[loop_id as usize].start_input_offset;

        if number < repeats.lower {
            // Must match another iteration; its failure fails the loop.
            self.loop_infos[loop_id as usize].start_input_offset = st.input_offset;
            if has_inner_nondet {
                self.save_inner_groups(min_body, max_body, true, stacks);
            } else {
                self.reset_inner_groups(min_body, max_body);
            }
            st.inst = begin + 1;
        } else if st.input_offset == start && number > repeats.lower {
            // The minimum is satisfied but the last iteration made no
            // progress; with an empty iteration the follow will behave
            // exactly as it already did, so fail rather than loop forever.
            return self.fail(input, st, stacks, ctx);
        } else if !repeats.is_unbounded() && number >= repeats.upper {
            st.inst = exit;
        } else if is_greedy {
            // CHOICEPOINT: one more iteration; on backtrack continue from
            // here with no more iterations and the previous bindings.
            stacks.cont_stack.push(Cont::Resume {
                orig_input_offset: st.input_offset,
                orig_inst_label: exit,
            });
            self.loop_infos[loop_id as usize].start_input_offset = st.input_offset;
            self.save_inner_groups(min_body, max_body, true, stacks);
            st.inst = begin + 1;
        } else {
            // CHOICEPOINT: no more iterations; on backtrack do one more from
            // here.
            stacks.cont_stack.push(Cont::RepeatLoop {
                begin_label: begin,
                orig_input_offset: st.input_offset,
            });
            st.inst = exit;
        }
        Ok(false)
    }

    // ---- Fast-path matchers ----

    fn match_single_char_case_sensitive(&mut self, input: &[Char], offset: u32, c: Char) -> bool {
        let input_length = input.len() as u32;
        if self.program.flags.contains(RegexFlags::STICKY) {
            if offset < input_length && input[offset as usize] == c {
                self.group_infos[0] = GroupInfo { offset, length: 1 };
                return true;
            }
            self.group_infos[0].reset();
            return false;
        }
        let mut offset = offset;
        while offset < input_length {
            if input[offset as usize] == c {
                self.group_infos[0] = GroupInfo { offset, length: 1 };
                return true;
            }
            offset += 1;
        }
        self.group_infos[0].reset();
        false
    }

    fn match_single_char_case_insensitive(
        &mut self,
        input: &[Char],
        offset: u32,
        c: Char,
    ) -> bool {
        let source = self.program.case_mapping_source();
        let canon = to_canonical(source, c);
        let input_length = input.len() as u32;
        if self.program.flags.contains(RegexFlags::STICKY) {
            if offset < input_length && to_canonical(source, input[offset as usize]) == canon {
                self.group_infos[0] = GroupInfo { offset, length: 1 };
                return true;
            }
            self.group_infos[0].reset();
            return false;
        }
        let mut offset = offset;
        while offset < input_length {
            if to_canonical(source, input[offset as usize]) == canon {
                self.group_infos[0] = GroupInfo { offset, length: 1 };
                return true;
            }
            offset += 1;
        }
        self.group_infos[0].reset();
        false
    }

    /// Specialized matcher for `\b\w+\b`.
    fn match_bounded_word(&mut self, input: &[Char], mut offset: u32) -> bool {
        let input_length = input.len() as u32;
        if offset >= input_length {
            self.group_infos[0].reset();
            return false;
        }
        let word = |o: u32| StandardChars::is_word(input[o as usize]);

        let at_word_start =
            (offset == 0 && word(0)) || (offset > 0 && !word(offset - 1) && word(offset));
        if !at_word_start {
            if self.program.flags.contains(RegexFlags::STICKY) {
                // Not at the start of a word, and not allowed to move.
                self.group_infos[0].reset();
                return false;
            }
            if word(offset) {
                // Skip the rest of the current word.
                loop {
                    offset += 1;
                    if offset >= input_length {
                        self.group_infos[0].reset();
                        return false;
                    }
                    if !word(offset) {
                        break;
                    }
                }
            }
            // Scan for the start of the next word.
            loop {
                offset += 1;
                if offset >= input_length {
                    self.group_infos[0].reset();
                    return false;
                }
                if word(offset) {
                    break;
                }
            }
        }

        let start = offset;
        loop {
            offset += 1;
            if offset >= input_length || !word(offset) {
                break;
            }
        }
        self.group_infos[0] = GroupInfo {
            offset: start,
            length: offset - start,
        };
        true
    }

    /// Specialized matcher for `^\s*|\s*$` without multiline.
    fn match_leading_trailing_spaces(
        &mut self,
        input: &[Char],
        mut offset: u32,
        begin_min_match: u32,
        end_min_match: u32,
    ) -> bool {
        let input_length = input.len() as u32;
        debug_assert!(!self.program.flags.contains(RegexFlags::MULTILINE));

        if offset >= input_length {
            if end_min_match == 0 || (offset == 0 && begin_min_match == 0) {
                self.group_infos[0] = GroupInfo {
                    offset,
                    length: 0,
                };
                return true;
            }
            self.group_infos[0].reset();
            return false;
        }

        let space = |o: u32| StandardChars::is_whitespace_or_newline(input[o as usize]);
        if offset == 0 {
            while offset < input_length && space(offset) {
                offset += 1;
            }
            if offset >= begin_min_match {
                self.group_infos[0] = GroupInfo {
                    offset: 0,
                    length: offset,
                };
                return true;
            }
        }

        let init_offset = offset.max(1);
        let mut offset = input_length - 1;
        while offset >= init_offset && space(offset) {
            offset -= 1;
        }
        offset += 1;
        let length = input_length - offset;
        if length >= end_min_match {
            self.group_infos[0] = GroupInfo { offset, length };
            return true;
        }
        self.group_infos[0].reset();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Program, ProgramKind};

    fn u(s: &str) -> Vec<Char> {
        s.encode_utf16().collect()
    }

    #[test]
    fn single_char_fast_path() {
        let program = Program::fast_path(
            RegexFlags::NONE,
            u("x"),
            ProgramKind::SingleChar { c: b'x' as u16 },
        );
        let mut matcher = Matcher::new(&program);
        assert!(matcher
            .matches(&u("aaxb"), 0, &mut NullScriptContext)
            .unwrap());
        assert_eq!(matcher.group(0), GroupInfo { offset: 2, length: 1 });
        assert!(!matcher
            .matches(&u("aab"), 0, &mut NullScriptContext)
            .unwrap());
        assert!(!matcher.was_last_match_successful());
    }

    #[test]
    fn single_char_sticky() {
        let program = Program::fast_path(
            RegexFlags::STICKY,
            u("x"),
            ProgramKind::SingleChar { c: b'x' as u16 },
        );
        let mut matcher = Matcher::new(&program);
        assert!(!matcher
            .matches(&u("ax"), 0, &mut NullScriptContext)
            .unwrap());
        assert!(matcher.matches(&u("ax"), 1, &mut NullScriptContext).unwrap());
    }

    #[test]
    fn bounded_word_fast_path() {
        let program = Program::fast_path(RegexFlags::NONE, u("\\b\\w+\\b"), ProgramKind::BoundedWord);
        let mut matcher = Matcher::new(&program);
        assert!(matcher
            .matches(&u("  hello world"), 0, &mut NullScriptContext)
            .unwrap());
        assert_eq!(matcher.group(0), GroupInfo { offset: 2, length: 5 });
        // Starting mid-word finds the next word.
        assert!(matcher
            .matches(&u("  hello world"), 3, &mut NullScriptContext)
            .unwrap());
        assert_eq!(matcher.group(0), GroupInfo { offset: 8, length: 5 });
    }

    #[test]
    fn leading_trailing_spaces_fast_path() {
        let program = Program::fast_path(
            RegexFlags::NONE,
            u("^\\s*|\\s*$"),
            ProgramKind::LeadingTrailingSpaces {
                begin_min_match: 1,
                end_min_match: 1,
            },
        );
        let mut matcher = Matcher::new(&program);
        assert!(matcher
            .matches(&u("  ab  "), 0, &mut NullScriptContext)
            .unwrap());
        assert_eq!(matcher.group(0), GroupInfo { offset: 0, length: 2 });
        assert!(matcher
            .matches(&u("ab   "), 0, &mut NullScriptContext)
            .unwrap());
        assert_eq!(matcher.group(0), GroupInfo { offset: 2, length: 3 });
        assert!(!matcher.matches(&u("ab"), 0, &mut NullScriptContext).unwrap());
    }

    #[test]
    fn boi_literal2_fast_path() {
        let program = Program::fast_path(
            RegexFlags::NONE,
            u("^ab"),
            ProgramKind::BoiLiteral2 {
                cs: [b'a' as u16, b'b' as u16],
            },
        );
        let mut matcher = Matcher::new(&program);
        assert!(matcher.matches(&u("abc"), 0, &mut NullScriptContext).unwrap());
        assert_eq!(matcher.group(0), GroupInfo { offset: 0, length: 2 });
        assert!(!matcher.matches(&u("xab"), 0, &mut NullScriptContext).unwrap());
        assert!(!matcher.matches(&u("xab"), 1, &mut NullScriptContext).unwrap());
    }
}

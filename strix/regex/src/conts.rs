//! Matcher state, backtracking continuations, and the per-thread stacks.

use crate::inst::Label;
use std::cell::RefCell;

/// Sentinel length marking a group as unbound.
pub const UNDEFINED_LENGTH: u32 = u32::MAX;

/// One capture group binding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupInfo {
    pub offset: u32,
    /// `UNDEFINED_LENGTH` means the group is undefined.
    pub length: u32,
}

impl Default for GroupInfo {
    fn default() -> Self {
        GroupInfo {
            offset: 0,
            length: UNDEFINED_LENGTH,
        }
    }
}

impl GroupInfo {
    pub fn is_undefined(&self) -> bool {
        self.length == UNDEFINED_LENGTH
    }

    pub fn end_offset(&self) -> u32 {
        debug_assert!(!self.is_undefined());
        self.offset + self.length
    }

    /// The start offset must survive backtracking into the group, so reset
    /// clears the length only.
    pub fn reset(&mut self) {
        self.length = UNDEFINED_LENGTH;
    }
}

/// Per-loop iteration state.
#[derive(Clone, Debug, Default)]
pub struct LoopInfo {
    /// Current iteration number.
    pub number: u32,
    /// Input offset where the iteration started.
    pub start_input_offset: u32,
    /// Offsets (from `start_input_offset`) where the loop body matched the
    /// loop's follow-first character, recycled across runs.
    pub offsets_of_follow_first: Option<Vec<u32>>,
}

impl LoopInfo {
    pub fn ensure_offsets_of_follow_first(&mut self) -> &mut Vec<u32> {
        self.offsets_of_follow_first.get_or_insert_with(Vec::new)
    }
}

/// Bookkeeping for an open look-around: where it began and how much of the
/// continuation stack belongs to it.
#[derive(Copy, Clone, Debug)]
pub struct AssertionInfo {
    /// Label of the BeginAssertion instruction.
    pub begin_label: Label,
    /// Input offset when the assertion began, to rewind either way.
    pub start_input_offset: u32,
    /// Top of the continuation stack when the assertion began, to cut.
    pub cont_stack_position: usize,
}

/// A saved backtracking obligation.
#[derive(Clone, Debug)]
pub enum Cont {
    /// Resume execution at a label with a saved input offset.
    Resume {
        orig_input_offset: u32,
        orig_inst_label: Label,
    },
    /// Restore a loop's state for an outer backtrack.
    RestoreLoop { loop_id: u32, orig: LoopInfo },
    /// Restore a group binding.
    RestoreGroup { group_id: i32, orig: GroupInfo },
    /// Undefine a group.
    ResetGroup { group_id: i32 },
    /// Undefine a contiguous range of groups.
    ResetGroupRange { from_group_id: i32, to_group_id: i32 },
    /// Try one more iteration of a non-greedy loop.
    RepeatLoop {
        begin_label: Label,
        orig_input_offset: u32,
    },
    /// Close the innermost assertion frame on backtrack.
    PopAssertion,
    /// Rewind a fixed-length loop by one iteration.
    RewindLoopFixed { begin_label: Label, trying_body: bool },
    /// Rewind a set loop by one character.
    RewindLoopSet { begin_label: Label },
    /// Rewind a set loop to the previous follow-first position.
    RewindLoopSetWithFollowFirst { begin_label: Label },
    /// Rewind a fixed-length loop that binds its last iteration to a group.
    RewindLoopFixedGroupLastIteration { begin_label: Label, trying_body: bool },
}

/// The continuation stack. Strictly LIFO; assertion frames cut it back to a
/// remembered position.
#[derive(Default)]
pub struct ContStack {
    items: Vec<Cont>,
}

impl ContStack {
    pub fn push(&mut self, cont: Cont) {
        self.items.push(cont);
    }

    pub fn pop(&mut self) -> Option<Cont> {
        self.items.pop()
    }

    /// Push a continuation back that was just popped, ready to fire again.
    pub fn un_pop(&mut self, cont: Cont) {
        self.items.push(cont);
    }

    pub fn top_mut(&mut self) -> Option<&mut Cont> {
        self.items.last_mut()
    }

    pub fn position(&self) -> usize {
        self.items.len()
    }

    /// Cut the stack back to `position` (an earlier [`position`](Self::position)).
    pub fn pop_to(&mut self, position: usize) {
        debug_assert!(position <= self.items.len());
        self.items.truncate(position);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The assertion frame stack. Strictly LIFO, nested within continuations.
#[derive(Default)]
pub struct AssertionStack {
    items: Vec<AssertionInfo>,
}

impl AssertionStack {
    pub fn push(&mut self, info: AssertionInfo) {
        self.items.push(info);
    }

    pub fn pop(&mut self) -> Option<AssertionInfo> {
        self.items.pop()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The pair of stacks a match runs on.
///
/// Stacks are owned per-thread. A match *takes* the thread's stacks out of
/// the slot and puts them back when it returns, so a host callback that
/// re-enters the engine finds the slot empty and gets fresh stacks. This is
/// the save/restore protocol around query-continue, expressed through
/// ownership.
#[derive(Default)]
pub struct RegexStacks {
    pub cont_stack: ContStack,
    pub assertion_stack: AssertionStack,
}

thread_local! {
    static THREAD_STACKS: RefCell<Option<Box<RegexStacks>>> = const { RefCell::new(None) };
}

/// Take the thread's regex stacks, or allocate fresh ones if a match is
/// already running on this thread.
pub fn take_thread_stacks() -> Box<RegexStacks> {
    THREAD_STACKS
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_default()
}

/// Return the stacks for the next match on this thread. The stack memory is
/// kept so the next match doesn't re-allocate.
pub fn restore_thread_stacks(stacks: Box<RegexStacks>) {
    THREAD_STACKS.with(|slot| *slot.borrow_mut() = Some(stacks));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_reset_keeps_offset() {
        let mut g = GroupInfo {
            offset: 5,
            length: 2,
        };
        assert!(!g.is_undefined());
        assert_eq!(g.end_offset(), 7);
        g.reset();
        assert!(g.is_undefined());
        assert_eq!(g.offset, 5);
    }

    #[test]
    fn cont_stack_cut() {
        let mut stack = ContStack::default();
        stack.push(Cont::PopAssertion);
        let position = stack.position();
        stack.push(Cont::ResetGroup { group_id: 1 });
        stack.push(Cont::ResetGroup { group_id: 2 });
        stack.pop_to(position);
        assert_eq!(stack.position(), 1);
        assert!(matches!(stack.pop(), Some(Cont::PopAssertion)));
        assert!(stack.is_empty());
    }

    #[test]
    fn thread_stacks_take_and_restore() {
        let stacks = take_thread_stacks();
        // While taken, a reentrant take gets a fresh pair.
        let mut inner = take_thread_stacks();
        inner.cont_stack.push(Cont::PopAssertion);
        restore_thread_stacks(inner);
        // Restoring the outer pair overwrites the inner one.
        restore_thread_stacks(stacks);
        let back = take_thread_stacks();
        assert!(back.cont_stack.is_empty());
        restore_thread_stacks(back);
    }
}

//! Regex programs and their execution engine.
//!
//! A compiled pattern is a [`Program`](program::Program): a header, a
//! literal buffer, and either a fast-path matcher or a stream of
//! backtracking-VM instructions. A [`Matcher`](matcher::Matcher) executes
//! one program over a UTF-16 input, using an explicit continuation stack for
//! backtracking and an assertion stack for look-arounds; group bindings are
//! reported through `GroupInfo` records, with group 0 standing for the whole
//! match.
//!
//! The regex *compiler* (pattern text to program) lives with the front end;
//! this crate provides [`ProgramBuilder`](program::ProgramBuilder) for
//! assembling programs directly.

pub mod chars;
pub mod conts;
pub mod inst;
pub mod matcher;
pub mod program;
pub mod scanners;

pub use crate::chars::{Char, CharSet};
pub use crate::conts::{GroupInfo, LoopInfo, RegexStacks, UNDEFINED_LENGTH};
pub use crate::inst::{ChompMode, CountDomain, Inst, Label, COUNT_UNBOUNDED};
pub use crate::matcher::{MatchError, Matcher, NullScriptContext, ScriptContext};
pub use crate::program::{Program, ProgramBuilder, ProgramError, ProgramKind, RegexFlags};

//! Compiled regex programs.
//!
//! A program arrives as a header plus a packed instruction byte stream (see
//! [`crate::inst`] for the record format). Construction decodes the stream
//! once into a `Vec<Inst>` and remaps every wire label from a byte offset to
//! an instruction index, so the interpreter never re-parses bytes.
//!
//! [`ProgramBuilder`] assembles instruction-mode programs; the pattern
//! compiler that would normally produce the stream lives with the front end.

use crate::chars::Char;
use crate::inst::{Inst, Label, LiteralRef};
use crate::scanners::OctoquadMatcher;
use core::ops::{BitOr, BitOrAssign};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Regex flags, a bitmask in the program header.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct RegexFlags(u8);

impl RegexFlags {
    pub const NONE: RegexFlags = RegexFlags(0);
    pub const GLOBAL: RegexFlags = RegexFlags(1 << 0);
    pub const MULTILINE: RegexFlags = RegexFlags(1 << 1);
    pub const IGNORE_CASE: RegexFlags = RegexFlags(1 << 2);
    pub const DOT_ALL: RegexFlags = RegexFlags(1 << 3);
    pub const UNICODE: RegexFlags = RegexFlags(1 << 4);
    pub const STICKY: RegexFlags = RegexFlags(1 << 5);

    pub fn contains(self, other: RegexFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> RegexFlags {
        RegexFlags(bits)
    }
}

impl BitOr for RegexFlags {
    type Output = RegexFlags;
    fn bitor(self, rhs: RegexFlags) -> RegexFlags {
        RegexFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for RegexFlags {
    fn bitor_assign(&mut self, rhs: RegexFlags) {
        self.0 |= rhs.0;
    }
}

/// A malformed program stream. Programs are normally correct by
/// construction; these only fire on damaged input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProgramError {
    #[error("truncated or unknown instruction record at byte {offset}")]
    BadRecord { offset: u32 },
    #[error("label {label} does not address an instruction boundary")]
    BadLabel { label: u32 },
    #[error("literal reference beyond the literal buffer")]
    BadLiteral,
}

/// Which top-level matcher runs the program.
#[derive(Clone, Debug)]
pub enum ProgramKind {
    /// The interpreter, retrying at the next offset on failure.
    Instructions,
    /// The interpreter; fails outright unless matching starts at offset 0.
    BoiInstructions,
    /// The interpreter; the start offset is never advanced (sticky).
    BoiInstructionsForStickyFlag,
    /// Fast path: a single character.
    SingleChar { c: Char },
    /// Fast path: `\b\w+\b`.
    BoundedWord,
    /// Fast path: `^\s*|\s*$` (no multiline).
    LeadingTrailingSpaces {
        begin_min_match: u32,
        end_min_match: u32,
    },
    /// Fast path: octoquad patterns.
    Octoquad { matcher: Box<OctoquadMatcher> },
    /// Fast path: a 2-code-unit literal anchored at offset 0.
    BoiLiteral2 { cs: [Char; 2] },
}

/// An immutable compiled regex program.
#[derive(Clone, Debug)]
pub struct Program {
    pub flags: RegexFlags,
    /// Number of capturing groups, including the implicit overall group 0.
    pub num_groups: u16,
    pub num_loops: u32,
    /// Original pattern text, without delimiters or flags.
    pub source: Vec<Char>,
    /// UTF-16 characters referenced by match/sync instructions.
    pub litbuf: Vec<Char>,
    pub kind: ProgramKind,
    /// Decoded instructions; empty for fast-path kinds.
    pub insts: Vec<Inst>,
}

impl Program {
    /// Decode an instruction-mode program from its wire bytes.
    pub fn from_wire(
        flags: RegexFlags,
        num_groups: u16,
        num_loops: u32,
        source: Vec<Char>,
        litbuf: Vec<Char>,
        kind: ProgramKind,
        inst_bytes: &[u8],
    ) -> Result<Program, ProgramError> {
        debug_assert!(matches!(
            kind,
            ProgramKind::Instructions
                | ProgramKind::BoiInstructions
                | ProgramKind::BoiInstructionsForStickyFlag
        ));

        let mut insts = Vec::new();
        let mut offset_to_index: FxHashMap<u32, u32> = FxHashMap::default();
        let mut pos = 0usize;
        while pos < inst_bytes.len() {
            let record_offset = pos as u32;
            let inst = Inst::decode(inst_bytes, &mut pos, &litbuf).ok_or(
                ProgramError::BadRecord {
                    offset: record_offset,
                },
            )?;
            offset_to_index.insert(record_offset, insts.len() as u32);
            insts.push(inst);
        }

        // Wire labels are byte offsets; the interpreter wants indices.
        let mut bad_label = None;
        for inst in &mut insts {
            inst.for_each_label_mut(|label| {
                match offset_to_index.get(label) {
                    Some(&index) => *label = index,
                    None => bad_label = Some(*label),
                }
            });
        }
        if let Some(label) = bad_label {
            return Err(ProgramError::BadLabel { label });
        }

        let program = Program {
            flags,
            num_groups,
            num_loops,
            source,
            litbuf,
            kind,
            insts,
        };
        program.validate_literals()?;
        Ok(program)
    }

    /// Build a fast-path program with no instruction stream.
    pub fn fast_path(flags: RegexFlags, source: Vec<Char>, kind: ProgramKind) -> Program {
        debug_assert!(!matches!(
            kind,
            ProgramKind::Instructions
                | ProgramKind::BoiInstructions
                | ProgramKind::BoiInstructionsForStickyFlag
        ));
        Program {
            flags,
            num_groups: 1,
            num_loops: 0,
            source,
            litbuf: Vec::new(),
            kind,
            insts: Vec::new(),
        }
    }

    fn validate_literals(&self) -> Result<(), ProgramError> {
        for inst in &self.insts {
            let check = |l: &LiteralRef, stride: u32| {
                let end = l
                    .offset
                    .checked_add(l.length.checked_mul(stride).unwrap_or(u32::MAX));
                match end {
                    Some(end) if end as usize <= self.litbuf.len() => Ok(()),
                    _ => Err(ProgramError::BadLiteral),
                }
            };
            match inst {
                Inst::MatchLiteral { literal } => check(literal, 1)?,
                Inst::MatchLiteralEquiv { literal } => {
                    check(literal, crate::chars::EQUIV_CLASS_SIZE as u32)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Is this a case-insensitive program under Unicode case folding?
    pub fn case_mapping_source(&self) -> crate::chars::MappingSource {
        if self.flags.contains(RegexFlags::UNICODE) {
            crate::chars::MappingSource::CaseFolding
        } else {
            crate::chars::MappingSource::UnicodeData
        }
    }
}

/// Assembles an instruction-mode [`Program`].
///
/// Labels are symbolic while building; `finish` lays the instructions out as
/// wire bytes, patches each label to the byte offset of its bound
/// instruction, and runs the bytes back through the program decoder.
pub struct ProgramBuilder {
    flags: RegexFlags,
    num_groups: u16,
    num_loops: u32,
    source: Vec<Char>,
    litbuf: Vec<Char>,
    insts: Vec<Inst>,
    /// Symbolic label -> instruction index.
    labels: Vec<Option<u32>>,
}

impl ProgramBuilder {
    pub fn new(flags: RegexFlags) -> Self {
        ProgramBuilder {
            flags,
            num_groups: 1,
            num_loops: 0,
            source: Vec::new(),
            litbuf: Vec::new(),
            insts: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn set_source(&mut self, source: &str) -> &mut Self {
        self.source = source.encode_utf16().collect();
        self
    }

    pub fn set_num_groups(&mut self, n: u16) -> &mut Self {
        self.num_groups = n;
        self
    }

    pub fn set_num_loops(&mut self, n: u32) -> &mut Self {
        self.num_loops = n;
        self
    }

    /// Intern `s` into the literal buffer; returns its reference.
    pub fn add_literal(&mut self, s: &str) -> LiteralRef {
        let offset = self.litbuf.len() as u32;
        self.litbuf.extend(s.encode_utf16());
        LiteralRef {
            offset,
            length: self.litbuf.len() as u32 - offset,
        }
    }

    /// Intern raw code units (equivalence-class rows included).
    pub fn add_literal_units(&mut self, units: &[Char]) -> LiteralRef {
        let offset = self.litbuf.len() as u32;
        self.litbuf.extend_from_slice(units);
        LiteralRef {
            offset,
            length: units.len() as u32,
        }
    }

    pub fn litbuf(&self) -> &[Char] {
        &self.litbuf
    }

    /// Create a symbolic label to use as a jump target before its location
    /// is known.
    pub fn create_label(&mut self) -> Label {
        self.labels.push(None);
        self.labels.len() as u32 - 1
    }

    /// Bind `label` to the next emitted instruction.
    pub fn bind_label(&mut self, label: Label) {
        debug_assert!(self.labels[label as usize].is_none(), "label bound twice");
        self.labels[label as usize] = Some(self.insts.len() as u32);
    }

    /// A label already bound to the next emitted instruction.
    pub fn here(&mut self) -> Label {
        let label = self.create_label();
        self.bind_label(label);
        label
    }

    /// Append `inst`. Label fields must hold symbolic labels from
    /// [`create_label`](Self::create_label).
    pub fn emit(&mut self, inst: Inst) -> &mut Self {
        self.insts.push(inst);
        self
    }

    /// Lay out, patch labels, encode to wire bytes, and decode into the
    /// final program.
    pub fn finish(mut self, kind: ProgramKind) -> Result<Program, ProgramError> {
        // First pass: byte offset of every instruction index.
        let mut offsets = Vec::with_capacity(self.insts.len());
        let mut scratch = Vec::new();
        let mut total = 0u32;
        for inst in &self.insts {
            offsets.push(total);
            scratch.clear();
            inst.encode(&mut scratch);
            total += scratch.len() as u32;
        }

        // Second pass: symbolic label -> bound index -> byte offset.
        let labels = core::mem::take(&mut self.labels);
        for inst in &mut self.insts {
            inst.for_each_label_mut(|label| {
                let index = labels[*label as usize].expect("unbound label");
                *label = offsets
                    .get(index as usize)
                    .copied()
                    // A label bound past the last instruction addresses the
                    // end of the stream; no branch should ever take it.
                    .unwrap_or(total);
            });
        }

        let mut bytes = Vec::with_capacity(total as usize);
        for inst in &self.insts {
            inst.encode(&mut bytes);
        }

        Program::from_wire(
            self.flags,
            self.num_groups,
            self.num_loops,
            self.source,
            self.litbuf,
            kind,
            &bytes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::CountDomain;

    #[test]
    fn builder_remaps_labels_to_indices() {
        let mut b = ProgramBuilder::new(RegexFlags::NONE);
        let exit = b.create_label();
        b.emit(Inst::MatchChar { c: b'a' as u16 });
        b.emit(Inst::Jump { target: exit });
        b.emit(Inst::MatchChar { c: b'b' as u16 });
        b.bind_label(exit);
        b.emit(Inst::Succ);
        let program = b.finish(ProgramKind::Instructions).unwrap();
        assert_eq!(program.insts.len(), 4);
        match &program.insts[1] {
            Inst::Jump { target } => assert_eq!(*target, 3),
            other => panic!("wrong inst: {other:?}"),
        }
    }

    #[test]
    fn bad_label_is_rejected() {
        // A jump into the middle of a record.
        let mut bytes = Vec::new();
        Inst::Jump { target: 1 }.encode(&mut bytes);
        Inst::Succ.encode(&mut bytes);
        let err = Program::from_wire(
            RegexFlags::NONE,
            1,
            0,
            Vec::new(),
            Vec::new(),
            ProgramKind::Instructions,
            &bytes,
        )
        .unwrap_err();
        assert_eq!(err, ProgramError::BadLabel { label: 1 });
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let mut bytes = Vec::new();
        Inst::BeginLoop {
            loop_id: 0,
            repeats: CountDomain::at_least(0),
            has_outer_loops: false,
            has_inner_nondet: false,
            exit: 0,
            min_body_group: -1,
            max_body_group: -1,
            is_greedy: true,
        }
        .encode(&mut bytes);
        bytes.truncate(bytes.len() - 3);
        let err = Program::from_wire(
            RegexFlags::NONE,
            1,
            1,
            Vec::new(),
            Vec::new(),
            ProgramKind::Instructions,
            &bytes,
        )
        .unwrap_err();
        assert!(matches!(err, ProgramError::BadRecord { .. }));
    }

    #[test]
    fn literal_bounds_are_checked() {
        let mut bytes = Vec::new();
        Inst::MatchLiteral {
            literal: LiteralRef { offset: 0, length: 4 },
        }
        .encode(&mut bytes);
        let err = Program::from_wire(
            RegexFlags::NONE,
            1,
            0,
            Vec::new(),
            vec![b'a' as u16],
            ProgramKind::Instructions,
            &bytes,
        )
        .unwrap_err();
        assert_eq!(err, ProgramError::BadLiteral);
    }
}

//! Regex program instructions and their wire format.
//!
//! On the wire every instruction is a 1-byte tag followed by its fixed-width
//! mixins in declaration order (little-endian; charsets and tries have their
//! own serialized forms). Jump labels on the wire are absolute byte offsets
//! into the instruction stream; when a program is decoded they are remapped
//! to instruction indices, which is what the interpreter and the
//! continuation records work with.

use crate::chars::{Char, CharSet, EQUIV_CLASS_SIZE};
use crate::scanners::{BoyerMooreScanner, LinearCharMapScanner};
use smallvec::SmallVec;

/// A location in the program. Byte offset on the wire; instruction index
/// once decoded (and symbolic id inside `ProgramBuilder`).
pub type Label = u32;

/// An iteration-count domain `{lower, upper}`; `upper == COUNT_UNBOUNDED`
/// means no upper bound.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CountDomain {
    pub lower: u32,
    pub upper: u32,
}

/// Sentinel for an unbounded upper repeat count.
pub const COUNT_UNBOUNDED: u32 = u32::MAX;

impl CountDomain {
    pub fn exact(n: u32) -> Self {
        CountDomain { lower: n, upper: n }
    }

    pub fn range(lower: u32, upper: u32) -> Self {
        CountDomain { lower, upper }
    }

    pub fn at_least(lower: u32) -> Self {
        CountDomain {
            lower,
            upper: COUNT_UNBOUNDED,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.upper == COUNT_UNBOUNDED
    }

    pub fn could_match_empty(&self) -> bool {
        self.lower == 0
    }
}

/// Greedy `*` (min 0) vs `+` (min 1) for the chomp instructions.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ChompMode {
    Star,
    Plus,
}

/// One ordered case of a switch instruction.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SwitchCase {
    pub c: Char,
    pub target: Label,
}

/// A literal reference into the program's literal buffer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct LiteralRef {
    pub offset: u32,
    /// In characters; equivalence-class literals store
    /// [`EQUIV_CLASS_SIZE`] code units per character.
    pub length: u32,
}

/// Which scanner a literal sync instruction runs.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LiteralScannerKind {
    /// Plain Boyer-Moore.
    Plain,
    /// Boyer-Moore with a direct-indexed character map.
    Linear,
    /// Equivalence-class rows, all positions 4-wide.
    Equiv,
    /// Equivalence-class rows with a trivial (1-wide) last position.
    EquivTrivialLastChar,
}

/// A literal scanner plus its pattern reference.
#[derive(Clone, Debug)]
pub struct LiteralScanner {
    pub literal: LiteralRef,
    pub kind: LiteralScannerKind,
    pub scanner: ScannerImpl,
}

#[derive(Clone, Debug)]
pub enum ScannerImpl {
    BoyerMoore(BoyerMooreScanner),
    Linear(LinearCharMapScanner),
}

impl LiteralScanner {
    /// Construct the scanner for `literal` out of `litbuf`.
    pub fn setup(literal: LiteralRef, kind: LiteralScannerKind, litbuf: &[Char]) -> Self {
        let pattern = Self::pattern_slice(literal, kind, litbuf);
        let scanner = match kind {
            LiteralScannerKind::Plain => {
                ScannerImpl::BoyerMoore(BoyerMooreScanner::new(pattern, 1, 1))
            }
            LiteralScannerKind::Linear => ScannerImpl::Linear(LinearCharMapScanner::new(pattern)),
            LiteralScannerKind::Equiv => ScannerImpl::BoyerMoore(BoyerMooreScanner::new(
                pattern,
                EQUIV_CLASS_SIZE as u32,
                EQUIV_CLASS_SIZE as u32,
            )),
            LiteralScannerKind::EquivTrivialLastChar => ScannerImpl::BoyerMoore(
                BoyerMooreScanner::new(pattern, EQUIV_CLASS_SIZE as u32, 1),
            ),
        };
        LiteralScanner {
            literal,
            kind,
            scanner,
        }
    }

    fn pattern_slice(literal: LiteralRef, kind: LiteralScannerKind, litbuf: &[Char]) -> &[Char] {
        let stride = match kind {
            LiteralScannerKind::Plain | LiteralScannerKind::Linear => 1,
            _ => EQUIV_CLASS_SIZE as u32,
        };
        let start = literal.offset as usize;
        let end = start + (literal.length * stride) as usize;
        &litbuf[start..end]
    }

    /// The length the literal occupies in the *input* when it matches.
    pub fn literal_length(&self) -> u32 {
        self.literal.length
    }

    /// Find the literal at or after `*input_offset`.
    pub fn find(&self, input: &[Char], input_offset: &mut u32, litbuf: &[Char]) -> bool {
        let pattern = Self::pattern_slice(self.literal, self.kind, litbuf);
        match &self.scanner {
            ScannerImpl::BoyerMoore(s) => s.find(input, input_offset, pattern),
            ScannerImpl::Linear(s) => s.find(input, input_offset, pattern),
        }
    }
}

/// One scanner of a multi-literal sync, with its furthest-sync bookkeeping
/// index.
#[derive(Clone, Debug)]
pub struct ScannerInfo {
    pub scanner: LiteralScanner,
    pub is_equiv_class: bool,
}

/// The most literals a `SyncToLiteralsAndBackup` can hold.
pub const MAX_SYNC_LITERALS: usize = 4;

/// A trie of alternative literals, matched in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CharTrie {
    pub alternatives: Vec<Vec<Char>>,
}

impl CharTrie {
    /// Match one alternative at `*input_offset`; consumes it on success.
    pub fn matches(&self, input: &[Char], input_offset: &mut u32) -> bool {
        for alt in &self.alternatives {
            let end = *input_offset as usize + alt.len();
            if end <= input.len() && &input[*input_offset as usize..end] == alt.as_slice() {
                *input_offset += alt.len() as u32;
                return true;
            }
        }
        false
    }
}

/// A decoded regex instruction.
///
/// The variant set mirrors the wire tags except that the sized switch tags
/// collapse into [`Inst::Switch`]/[`Inst::SwitchAndConsume`] and the
/// negated/template tag pairs collapse into a flag.
#[derive(Clone, Debug)]
pub enum Inst {
    // Control flow.
    Nop,
    Fail,
    Succ,
    Jump { target: Label },
    JumpIfNotChar { c: Char, target: Label },
    MatchCharOrJump { c: Char, target: Label },
    JumpIfNotSet { set: CharSet, target: Label },
    MatchSetOrJump { set: CharSet, target: Label },
    Switch { cases: SmallVec<[SwitchCase; 4]> },
    SwitchAndConsume { cases: SmallVec<[SwitchCase; 4]> },

    // Built-in assertions.
    BoiTest { hard_fail: bool },
    EoiTest { hard_fail: bool },
    BolTest,
    EolTest,
    WordBoundaryTest { negated: bool },

    // Matching primitives.
    MatchChar { c: Char },
    MatchChar2 { cs: [Char; 2] },
    MatchChar3 { cs: [Char; 3] },
    MatchChar4 { cs: [Char; 4] },
    MatchSet { set: CharSet, negated: bool },
    MatchLiteral { literal: LiteralRef },
    MatchLiteralEquiv { literal: LiteralRef },
    MatchTrie { trie: CharTrie },
    OptMatchChar { c: Char },
    OptMatchSet { set: CharSet },
    MatchGroup { group: i32 },

    // Synchronization.
    SyncToCharAndContinue { c: Char },
    SyncToChar2SetAndContinue { cs: [Char; 2] },
    SyncToSetAndContinue { set: CharSet, negated: bool },
    SyncToChar2LiteralAndContinue { cs: [Char; 2] },
    SyncToLiteralAndContinue { scanner: LiteralScanner },
    SyncToCharAndConsume { c: Char },
    SyncToChar2SetAndConsume { cs: [Char; 2] },
    SyncToSetAndConsume { set: CharSet, negated: bool },
    SyncToChar2LiteralAndConsume { cs: [Char; 2] },
    SyncToLiteralAndConsume { scanner: LiteralScanner },
    SyncToCharAndBackup { c: Char, backup: CountDomain },
    SyncToSetAndBackup { set: CharSet, negated: bool, backup: CountDomain },
    SyncToChar2LiteralAndBackup { cs: [Char; 2], backup: CountDomain },
    SyncToLiteralAndBackup { scanner: LiteralScanner, backup: CountDomain },
    SyncToLiteralsAndBackup { scanners: Vec<ScannerInfo>, backup: CountDomain },

    // Group bookkeeping.
    BeginDefineGroup { group: i32 },
    EndDefineGroup { group: i32, no_need_to_save: bool },
    DefineGroupFixed { group: i32, length: u32, no_need_to_save: bool },

    // Loops.
    BeginLoop {
        loop_id: u32,
        repeats: CountDomain,
        has_outer_loops: bool,
        has_inner_nondet: bool,
        exit: Label,
        min_body_group: i32,
        max_body_group: i32,
        is_greedy: bool,
    },
    RepeatLoop { begin: Label },
    BeginLoopIfChar {
        c: Char,
        loop_id: u32,
        repeats: CountDomain,
        has_outer_loops: bool,
        has_inner_nondet: bool,
        exit: Label,
        min_body_group: i32,
        max_body_group: i32,
    },
    BeginLoopIfSet {
        set: CharSet,
        loop_id: u32,
        repeats: CountDomain,
        has_outer_loops: bool,
        has_inner_nondet: bool,
        exit: Label,
        min_body_group: i32,
        max_body_group: i32,
    },
    RepeatLoopIfChar { begin: Label },
    RepeatLoopIfSet { begin: Label },
    BeginLoopFixed {
        loop_id: u32,
        repeats: CountDomain,
        has_outer_loops: bool,
        exit: Label,
        length: u32,
    },
    RepeatLoopFixed { begin: Label },
    LoopSet {
        set: CharSet,
        loop_id: u32,
        repeats: CountDomain,
        has_outer_loops: bool,
    },
    LoopSetWithFollowFirst {
        set: CharSet,
        loop_id: u32,
        repeats: CountDomain,
        has_outer_loops: bool,
        follow_first: Char,
    },
    BeginLoopFixedGroupLastIteration {
        loop_id: u32,
        repeats: CountDomain,
        has_outer_loops: bool,
        exit: Label,
        length: u32,
        group: i32,
        no_need_to_save: bool,
    },
    RepeatLoopFixedGroupLastIteration { begin: Label },
    BeginGreedyLoopNoBacktrack { loop_id: u32, exit: Label },
    RepeatGreedyLoopNoBacktrack { begin: Label },

    // Chomps.
    ChompChar { c: Char, mode: ChompMode },
    ChompSet { set: CharSet, mode: ChompMode },
    ChompCharGroup { c: Char, mode: ChompMode, group: i32, no_need_to_save: bool },
    ChompSetGroup { set: CharSet, mode: ChompMode, group: i32, no_need_to_save: bool },
    ChompCharBounded { c: Char, repeats: CountDomain },
    ChompSetBounded { set: CharSet, repeats: CountDomain },
    ChompSetBoundedGroupLastChar {
        set: CharSet,
        repeats: CountDomain,
        group: i32,
        no_need_to_save: bool,
    },

    // Choicepoints.
    Try { fail: Label },
    TryIfChar { c: Char, fail: Label },
    TryMatchChar { c: Char, fail: Label },
    TryIfSet { set: CharSet, fail: Label },
    TryMatchSet { set: CharSet, fail: Label },

    // User-defined assertions.
    BeginAssertion {
        negated: bool,
        min_body_group: i32,
        max_body_group: i32,
        next: Label,
    },
    EndAssertion,
}

// Wire tags, in opcode order. The sized switch tags and the template pairs
// (negated sets, hard-fail tests, chomp modes) each get their own byte.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Tag {
    Nop = 0,
    Fail,
    Succ,
    Jump,
    JumpIfNotChar,
    MatchCharOrJump,
    JumpIfNotSet,
    MatchSetOrJump,
    Switch2,
    Switch4,
    Switch8,
    Switch16,
    Switch24,
    SwitchAndConsume2,
    SwitchAndConsume4,
    SwitchAndConsume8,
    SwitchAndConsume16,
    SwitchAndConsume24,
    BoiHardFailTest,
    BoiTest,
    EoiHardFailTest,
    EoiTest,
    BolTest,
    EolTest,
    NegatedWordBoundaryTest,
    WordBoundaryTest,
    MatchChar,
    MatchChar2,
    MatchChar3,
    MatchChar4,
    MatchSet,
    MatchNegatedSet,
    MatchLiteral,
    MatchLiteralEquiv,
    MatchTrie,
    OptMatchChar,
    OptMatchSet,
    SyncToCharAndContinue,
    SyncToChar2SetAndContinue,
    SyncToSetAndContinue,
    SyncToNegatedSetAndContinue,
    SyncToChar2LiteralAndContinue,
    SyncToLiteralAndContinue,
    SyncToLinearLiteralAndContinue,
    SyncToLiteralEquivAndContinue,
    SyncToLiteralEquivTrivialLastPatCharAndContinue,
    SyncToCharAndConsume,
    SyncToChar2SetAndConsume,
    SyncToSetAndConsume,
    SyncToNegatedSetAndConsume,
    SyncToChar2LiteralAndConsume,
    SyncToLiteralAndConsume,
    SyncToLinearLiteralAndConsume,
    SyncToLiteralEquivAndConsume,
    SyncToLiteralEquivTrivialLastPatCharAndConsume,
    SyncToCharAndBackup,
    SyncToSetAndBackup,
    SyncToNegatedSetAndBackup,
    SyncToChar2LiteralAndBackup,
    SyncToLiteralAndBackup,
    SyncToLinearLiteralAndBackup,
    SyncToLiteralEquivAndBackup,
    SyncToLiteralEquivTrivialLastPatCharAndBackup,
    SyncToLiteralsAndBackup,
    MatchGroup,
    BeginDefineGroup,
    EndDefineGroup,
    DefineGroupFixed,
    BeginLoop,
    RepeatLoop,
    BeginLoopIfChar,
    BeginLoopIfSet,
    RepeatLoopIfChar,
    RepeatLoopIfSet,
    BeginLoopFixed,
    RepeatLoopFixed,
    LoopSet,
    LoopSetWithFollowFirst,
    BeginLoopFixedGroupLastIteration,
    RepeatLoopFixedGroupLastIteration,
    BeginGreedyLoopNoBacktrack,
    RepeatGreedyLoopNoBacktrack,
    ChompCharStar,
    ChompCharPlus,
    ChompSetStar,
    ChompSetPlus,
    ChompCharGroupStar,
    ChompCharGroupPlus,
    ChompSetGroupStar,
    ChompSetGroupPlus,
    ChompCharBounded,
    ChompSetBounded,
    ChompSetBoundedGroupLastChar,
    Try,
    TryIfChar,
    TryMatchChar,
    TryIfSet,
    TryMatchSet,
    BeginAssertion,
    EndAssertion,
}

const TAG_COUNT: u8 = Tag::EndAssertion as u8 + 1;

impl Tag {
    fn from_byte(b: u8) -> Option<Tag> {
        if b < TAG_COUNT {
            // Tags are a dense `repr(u8)` enum.
            Some(unsafe { core::mem::transmute::<u8, Tag>(b) })
        } else {
            None
        }
    }
}

fn switch_capacity_tag(len: usize, consume: bool) -> Tag {
    let plain = [Tag::Switch2, Tag::Switch4, Tag::Switch8, Tag::Switch16, Tag::Switch24];
    let consuming = [
        Tag::SwitchAndConsume2,
        Tag::SwitchAndConsume4,
        Tag::SwitchAndConsume8,
        Tag::SwitchAndConsume16,
        Tag::SwitchAndConsume24,
    ];
    let table = if consume { consuming } else { plain };
    match len {
        0..=2 => table[0],
        3..=4 => table[1],
        5..=8 => table[2],
        9..=16 => table[3],
        _ => table[4],
    }
}

// ---- Encoding ----

struct Writer<'a> {
    out: &'a mut Vec<u8>,
}

impl Writer<'_> {
    fn tag(&mut self, t: Tag) {
        self.out.push(t as u8);
    }
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }
    fn chr(&mut self, c: Char) {
        self.out.extend_from_slice(&c.to_le_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn i32(&mut self, v: i32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn bool(&mut self, v: bool) {
        self.out.push(v as u8);
    }
    fn label(&mut self, l: Label) {
        self.u32(l);
    }
    fn count(&mut self, c: CountDomain) {
        self.u32(c.lower);
        self.u32(c.upper);
    }
    fn set(&mut self, s: &CharSet) {
        s.serialize(self.out);
    }
    fn literal(&mut self, l: LiteralRef) {
        self.u32(l.offset);
        self.u32(l.length);
    }
}

// ---- Decoding ----

struct ReaderCtx<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ReaderCtx<'a> {
    fn u8(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }
    fn chr(&mut self) -> Option<Char> {
        let end = self.pos.checked_add(2)?;
        let v = u16::from_le_bytes(self.bytes.get(self.pos..end)?.try_into().ok()?);
        self.pos = end;
        Some(v)
    }
    fn u32(&mut self) -> Option<u32> {
        let end = self.pos.checked_add(4)?;
        let v = u32::from_le_bytes(self.bytes.get(self.pos..end)?.try_into().ok()?);
        self.pos = end;
        Some(v)
    }
    fn i32(&mut self) -> Option<i32> {
        self.u32().map(|v| v as i32)
    }
    fn bool(&mut self) -> Option<bool> {
        self.u8().map(|b| b != 0)
    }
    fn label(&mut self) -> Option<Label> {
        self.u32()
    }
    fn count(&mut self) -> Option<CountDomain> {
        Some(CountDomain {
            lower: self.u32()?,
            upper: self.u32()?,
        })
    }
    fn set(&mut self) -> Option<CharSet> {
        CharSet::deserialize(self.bytes, &mut self.pos)
    }
    fn literal(&mut self) -> Option<LiteralRef> {
        Some(LiteralRef {
            offset: self.u32()?,
            length: self.u32()?,
        })
    }
}

impl Inst {
    /// Append the wire form of this instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut w = Writer { out };
        use Inst::*;
        match self {
            Nop => w.tag(Tag::Nop),
            Fail => w.tag(Tag::Fail),
            Succ => w.tag(Tag::Succ),
            Jump { target } => {
                w.tag(Tag::Jump);
                w.label(*target);
            }
            JumpIfNotChar { c, target } => {
                w.tag(Tag::JumpIfNotChar);
                w.chr(*c);
                w.label(*target);
            }
            MatchCharOrJump { c, target } => {
                w.tag(Tag::MatchCharOrJump);
                w.chr(*c);
                w.label(*target);
            }
            JumpIfNotSet { set, target } => {
                w.tag(Tag::JumpIfNotSet);
                w.set(set);
                w.label(*target);
            }
            MatchSetOrJump { set, target } => {
                w.tag(Tag::MatchSetOrJump);
                w.set(set);
                w.label(*target);
            }
            Switch { cases } | SwitchAndConsume { cases } => {
                let consume = matches!(self, SwitchAndConsume { .. });
                w.tag(switch_capacity_tag(cases.len(), consume));
                w.u8(cases.len() as u8);
                for case in cases {
                    w.chr(case.c);
                    w.label(case.target);
                }
            }
            BoiTest { hard_fail } => w.tag(if *hard_fail {
                Tag::BoiHardFailTest
            } else {
                Tag::BoiTest
            }),
            EoiTest { hard_fail } => w.tag(if *hard_fail {
                Tag::EoiHardFailTest
            } else {
                Tag::EoiTest
            }),
            BolTest => w.tag(Tag::BolTest),
            EolTest => w.tag(Tag::EolTest),
            WordBoundaryTest { negated } => w.tag(if *negated {
                Tag::NegatedWordBoundaryTest
            } else {
                Tag::WordBoundaryTest
            }),
            MatchChar { c } => {
                w.tag(Tag::MatchChar);
                w.chr(*c);
            }
            MatchChar2 { cs } => {
                w.tag(Tag::MatchChar2);
                w.chr(cs[0]);
                w.chr(cs[1]);
            }
            MatchChar3 { cs } => {
                w.tag(Tag::MatchChar3);
                for &c in cs {
                    w.chr(c);
                }
            }
            MatchChar4 { cs } => {
                w.tag(Tag::MatchChar4);
                for &c in cs {
                    w.chr(c);
                }
            }
            MatchSet { set, negated } => {
                w.tag(if *negated { Tag::MatchNegatedSet } else { Tag::MatchSet });
                w.set(set);
            }
            MatchLiteral { literal } => {
                w.tag(Tag::MatchLiteral);
                w.literal(*literal);
            }
            MatchLiteralEquiv { literal } => {
                w.tag(Tag::MatchLiteralEquiv);
                w.literal(*literal);
            }
            MatchTrie { trie } => {
                w.tag(Tag::MatchTrie);
                w.u32(trie.alternatives.len() as u32);
                for alt in &trie.alternatives {
                    w.u32(alt.len() as u32);
                    for &c in alt {
                        w.chr(c);
                    }
                }
            }
            OptMatchChar { c } => {
                w.tag(Tag::OptMatchChar);
                w.chr(*c);
            }
            OptMatchSet { set } => {
                w.tag(Tag::OptMatchSet);
                w.set(set);
            }
            MatchGroup { group } => {
                w.tag(Tag::MatchGroup);
                w.i32(*group);
            }
            SyncToCharAndContinue { c } => {
                w.tag(Tag::SyncToCharAndContinue);
                w.chr(*c);
            }
            SyncToChar2SetAndContinue { cs } => {
                w.tag(Tag::SyncToChar2SetAndContinue);
                w.chr(cs[0]);
                w.chr(cs[1]);
            }
            SyncToSetAndContinue { set, negated } => {
                w.tag(if *negated {
                    Tag::SyncToNegatedSetAndContinue
                } else {
                    Tag::SyncToSetAndContinue
                });
                w.set(set);
            }
            SyncToChar2LiteralAndContinue { cs } => {
                w.tag(Tag::SyncToChar2LiteralAndContinue);
                w.chr(cs[0]);
                w.chr(cs[1]);
            }
            SyncToLiteralAndContinue { scanner } => {
                w.tag(literal_sync_tag(scanner.kind, SyncFlavor::Continue));
                w.literal(scanner.literal);
            }
            SyncToCharAndConsume { c } => {
                w.tag(Tag::SyncToCharAndConsume);
                w.chr(*c);
            }
            SyncToChar2SetAndConsume { cs } => {
                w.tag(Tag::SyncToChar2SetAndConsume);
                w.chr(cs[0]);
                w.chr(cs[1]);
            }
            SyncToSetAndConsume { set, negated } => {
                w.tag(if *negated {
                    Tag::SyncToNegatedSetAndConsume
                } else {
                    Tag::SyncToSetAndConsume
                });
                w.set(set);
            }
            SyncToChar2LiteralAndConsume { cs } => {
                w.tag(Tag::SyncToChar2LiteralAndConsume);
                w.chr(cs[0]);
                w.chr(cs[1]);
            }
            SyncToLiteralAndConsume { scanner } => {
                w.tag(literal_sync_tag(scanner.kind, SyncFlavor::Consume));
                w.literal(scanner.literal);
            }
            SyncToCharAndBackup { c, backup } => {
                w.tag(Tag::SyncToCharAndBackup);
                w.chr(*c);
                w.count(*backup);
            }
            SyncToSetAndBackup { set, negated, backup } => {
                w.tag(if *negated {
                    Tag::SyncToNegatedSetAndBackup
                } else {
                    Tag::SyncToSetAndBackup
                });
                w.set(set);
                w.count(*backup);
            }
            SyncToChar2LiteralAndBackup { cs, backup } => {
                w.tag(Tag::SyncToChar2LiteralAndBackup);
                w.chr(cs[0]);
                w.chr(cs[1]);
                w.count(*backup);
            }
            SyncToLiteralAndBackup { scanner, backup } => {
                w.tag(literal_sync_tag(scanner.kind, SyncFlavor::Backup));
                w.literal(scanner.literal);
                w.count(*backup);
            }
            SyncToLiteralsAndBackup { scanners, backup } => {
                w.tag(Tag::SyncToLiteralsAndBackup);
                w.u8(scanners.len() as u8);
                for info in scanners {
                    w.literal(info.scanner.literal);
                    w.bool(info.is_equiv_class);
                }
                w.count(*backup);
            }
            BeginDefineGroup { group } => {
                w.tag(Tag::BeginDefineGroup);
                w.i32(*group);
            }
            EndDefineGroup { group, no_need_to_save } => {
                w.tag(Tag::EndDefineGroup);
                w.i32(*group);
                w.bool(*no_need_to_save);
            }
            DefineGroupFixed { group, length, no_need_to_save } => {
                w.tag(Tag::DefineGroupFixed);
                w.i32(*group);
                w.u32(*length);
                w.bool(*no_need_to_save);
            }
            BeginLoop {
                loop_id,
                repeats,
                has_outer_loops,
                has_inner_nondet,
                exit,
                min_body_group,
                max_body_group,
                is_greedy,
            } => {
                w.tag(Tag::BeginLoop);
                w.u32(*loop_id);
                w.count(*repeats);
                w.bool(*has_outer_loops);
                w.bool(*has_inner_nondet);
                w.label(*exit);
                w.i32(*min_body_group);
                w.i32(*max_body_group);
                w.bool(*is_greedy);
            }
            RepeatLoop { begin } => {
                w.tag(Tag::RepeatLoop);
                w.label(*begin);
            }
            BeginLoopIfChar {
                c,
                loop_id,
                repeats,
                has_outer_loops,
                has_inner_nondet,
                exit,
                min_body_group,
                max_body_group,
            } => {
                w.tag(Tag::BeginLoopIfChar);
                w.chr(*c);
                w.u32(*loop_id);
                w.count(*repeats);
                w.bool(*has_outer_loops);
                w.bool(*has_inner_nondet);
                w.label(*exit);
                w.i32(*min_body_group);
                w.i32(*max_body_group);
            }
            BeginLoopIfSet {
                set,
                loop_id,
                repeats,
                has_outer_loops,
                has_inner_nondet,
                exit,
                min_body_group,
                max_body_group,
            } => {
                w.tag(Tag::BeginLoopIfSet);
                w.set(set);
                w.u32(*loop_id);
                w.count(*repeats);
                w.bool(*has_outer_loops);
                w.bool(*has_inner_nondet);
                w.label(*exit);
                w.i32(*min_body_group);
                w.i32(*max_body_group);
            }
            RepeatLoopIfChar { begin } => {
                w.tag(Tag::RepeatLoopIfChar);
                w.label(*begin);
            }
            RepeatLoopIfSet { begin } => {
                w.tag(Tag::RepeatLoopIfSet);
                w.label(*begin);
            }
            BeginLoopFixed {
                loop_id,
                repeats,
                has_outer_loops,
                exit,
                length,
            } => {
                w.tag(Tag::BeginLoopFixed);
                w.u32(*loop_id);
                w.count(*repeats);
                w.bool(*has_outer_loops);
                w.label(*exit);
                w.u32(*length);
            }
            RepeatLoopFixed { begin } => {
                w.tag(Tag::RepeatLoopFixed);
                w.label(*begin);
            }
            LoopSet {
                set,
                loop_id,
                repeats,
                has_outer_loops,
            } => {
                w.tag(Tag::LoopSet);
                w.set(set);
                w.u32(*loop_id);
                w.count(*repeats);
                w.bool(*has_outer_loops);
            }
            LoopSetWithFollowFirst {
                set,
                loop_id,
                repeats,
                has_outer_loops,
                follow_first,
            } => {
                w.tag(Tag::LoopSetWithFollowFirst);
                w.set(set);
                w.u32(*loop_id);
                w.count(*repeats);
                w.bool(*has_outer_loops);
                w.chr(*follow_first);
            }
            BeginLoopFixedGroupLastIteration {
                loop_id,
                repeats,
                has_outer_loops,
                exit,
                length,
                group,
                no_need_to_save,
            } => {
                w.tag(Tag::BeginLoopFixedGroupLastIteration);
                w.u32(*loop_id);
                w.count(*repeats);
                w.bool(*has_outer_loops);
                w.label(*exit);
                w.u32(*length);
                w.i32(*group);
                w.bool(*no_need_to_save);
            }
            RepeatLoopFixedGroupLastIteration { begin } => {
                w.tag(Tag::RepeatLoopFixedGroupLastIteration);
                w.label(*begin);
            }
            BeginGreedyLoopNoBacktrack { loop_id, exit } => {
                w.tag(Tag::BeginGreedyLoopNoBacktrack);
                w.u32(*loop_id);
                w.label(*exit);
            }
            RepeatGreedyLoopNoBacktrack { begin } => {
                w.tag(Tag::RepeatGreedyLoopNoBacktrack);
                w.label(*begin);
            }
            ChompChar { c, mode } => {
                w.tag(match mode {
                    ChompMode::Star => Tag::ChompCharStar,
                    ChompMode::Plus => Tag::ChompCharPlus,
                });
                w.chr(*c);
            }
            ChompSet { set, mode } => {
                w.tag(match mode {
                    ChompMode::Star => Tag::ChompSetStar,
                    ChompMode::Plus => Tag::ChompSetPlus,
                });
                w.set(set);
            }
            ChompCharGroup { c, mode, group, no_need_to_save } => {
                w.tag(match mode {
                    ChompMode::Star => Tag::ChompCharGroupStar,
                    ChompMode::Plus => Tag::ChompCharGroupPlus,
                });
                w.chr(*c);
                w.i32(*group);
                w.bool(*no_need_to_save);
            }
            ChompSetGroup { set, mode, group, no_need_to_save } => {
                w.tag(match mode {
                    ChompMode::Star => Tag::ChompSetGroupStar,
                    ChompMode::Plus => Tag::ChompSetGroupPlus,
                });
                w.set(set);
                w.i32(*group);
                w.bool(*no_need_to_save);
            }
            ChompCharBounded { c, repeats } => {
                w.tag(Tag::ChompCharBounded);
                w.chr(*c);
                w.count(*repeats);
            }
            ChompSetBounded { set, repeats } => {
                w.tag(Tag::ChompSetBounded);
                w.set(set);
                w.count(*repeats);
            }
            ChompSetBoundedGroupLastChar { set, repeats, group, no_need_to_save } => {
                w.tag(Tag::ChompSetBoundedGroupLastChar);
                w.set(set);
                w.count(*repeats);
                w.i32(*group);
                w.bool(*no_need_to_save);
            }
            Try { fail } => {
                w.tag(Tag::Try);
                w.label(*fail);
            }
            TryIfChar { c, fail } => {
                w.tag(Tag::TryIfChar);
                w.chr(*c);
                w.label(*fail);
            }
            TryMatchChar { c, fail } => {
                w.tag(Tag::TryMatchChar);
                w.chr(*c);
                w.label(*fail);
            }
            TryIfSet { set, fail } => {
                w.tag(Tag::TryIfSet);
                w.set(set);
                w.label(*fail);
            }
            TryMatchSet { set, fail } => {
                w.tag(Tag::TryMatchSet);
                w.set(set);
                w.label(*fail);
            }
            BeginAssertion {
                negated,
                min_body_group,
                max_body_group,
                next,
            } => {
                w.tag(Tag::BeginAssertion);
                w.bool(*negated);
                w.i32(*min_body_group);
                w.i32(*max_body_group);
                w.label(*next);
            }
            EndAssertion => w.tag(Tag::EndAssertion),
        }
    }

    /// Decode one instruction at `*pos`; advances `*pos` past it. Scanners
    /// are constructed against `litbuf`.
    pub fn decode(bytes: &[u8], pos: &mut usize, litbuf: &[Char]) -> Option<Inst> {
        let mut r = ReaderCtx { bytes, pos: *pos };
        let tag = Tag::from_byte(r.u8()?)?;
        let inst = Self::decode_payload(tag, &mut r, litbuf)?;
        *pos = r.pos;
        Some(inst)
    }

    fn decode_payload(tag: Tag, r: &mut ReaderCtx, litbuf: &[Char]) -> Option<Inst> {
        use Inst as I;
        let inst = match tag {
            Tag::Nop => I::Nop,
            Tag::Fail => I::Fail,
            Tag::Succ => I::Succ,
            Tag::Jump => I::Jump { target: r.label()? },
            Tag::JumpIfNotChar => I::JumpIfNotChar {
                c: r.chr()?,
                target: r.label()?,
            },
            Tag::MatchCharOrJump => I::MatchCharOrJump {
                c: r.chr()?,
                target: r.label()?,
            },
            Tag::JumpIfNotSet => I::JumpIfNotSet {
                set: r.set()?,
                target: r.label()?,
            },
            Tag::MatchSetOrJump => I::MatchSetOrJump {
                set: r.set()?,
                target: r.label()?,
            },
            Tag::Switch2 | Tag::Switch4 | Tag::Switch8 | Tag::Switch16 | Tag::Switch24 => {
                I::Switch {
                    cases: Self::decode_cases(r)?,
                }
            }
            Tag::SwitchAndConsume2
            | Tag::SwitchAndConsume4
            | Tag::SwitchAndConsume8
            | Tag::SwitchAndConsume16
            | Tag::SwitchAndConsume24 => I::SwitchAndConsume {
                cases: Self::decode_cases(r)?,
            },
            Tag::BoiHardFailTest => I::BoiTest { hard_fail: true },
            Tag::BoiTest => I::BoiTest { hard_fail: false },
            Tag::EoiHardFailTest => I::EoiTest { hard_fail: true },
            Tag::EoiTest => I::EoiTest { hard_fail: false },
            Tag::BolTest => I::BolTest,
            Tag::EolTest => I::EolTest,
            Tag::NegatedWordBoundaryTest => I::WordBoundaryTest { negated: true },
            Tag::WordBoundaryTest => I::WordBoundaryTest { negated: false },
            Tag::MatchChar => I::MatchChar { c: r.chr()? },
            Tag::MatchChar2 => I::MatchChar2 {
                cs: [r.chr()?, r.chr()?],
            },
            Tag::MatchChar3 => I::MatchChar3 {
                cs: [r.chr()?, r.chr()?, r.chr()?],
            },
            Tag::MatchChar4 => I::MatchChar4 {
                cs: [r.chr()?, r.chr()?, r.chr()?, r.chr()?],
            },
            Tag::MatchSet => I::MatchSet {
                set: r.set()?,
                negated: false,
            },
            Tag::MatchNegatedSet => I::MatchSet {
                set: r.set()?,
                negated: true,
            },
            Tag::MatchLiteral => I::MatchLiteral { literal: r.literal()? },
            Tag::MatchLiteralEquiv => I::MatchLiteralEquiv { literal: r.literal()? },
            Tag::MatchTrie => {
                let count = r.u32()?;
                let mut alternatives = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let len = r.u32()?;
                    let mut alt = Vec::with_capacity(len as usize);
                    for _ in 0..len {
                        alt.push(r.chr()?);
                    }
                    alternatives.push(alt);
                }
                I::MatchTrie {
                    trie: CharTrie { alternatives },
                }
            }
            Tag::OptMatchChar => I::OptMatchChar { c: r.chr()? },
            Tag::OptMatchSet => I::OptMatchSet { set: r.set()? },
            Tag::MatchGroup => I::MatchGroup { group: r.i32()? },
            Tag::SyncToCharAndContinue => I::SyncToCharAndContinue { c: r.chr()? },
            Tag::SyncToChar2SetAndContinue => I::SyncToChar2SetAndContinue {
                cs: [r.chr()?, r.chr()?],
            },
            Tag::SyncToSetAndContinue => I::SyncToSetAndContinue {
                set: r.set()?,
                negated: false,
            },
            Tag::SyncToNegatedSetAndContinue => I::SyncToSetAndContinue {
                set: r.set()?,
                negated: true,
            },
            Tag::SyncToChar2LiteralAndContinue => I::SyncToChar2LiteralAndContinue {
                cs: [r.chr()?, r.chr()?],
            },
            Tag::SyncToLiteralAndContinue
            | Tag::SyncToLinearLiteralAndContinue
            | Tag::SyncToLiteralEquivAndContinue
            | Tag::SyncToLiteralEquivTrivialLastPatCharAndContinue => {
                I::SyncToLiteralAndContinue {
                    scanner: Self::decode_scanner(tag, r, litbuf)?,
                }
            }
            Tag::SyncToCharAndConsume => I::SyncToCharAndConsume { c: r.chr()? },
            Tag::SyncToChar2SetAndConsume => I::SyncToChar2SetAndConsume {
                cs: [r.chr()?, r.chr()?],
            },
            Tag::SyncToSetAndConsume => I::SyncToSetAndConsume {
                set: r.set()?,
                negated: false,
            },
            Tag::SyncToNegatedSetAndConsume => I::SyncToSetAndConsume {
                set: r.set()?,
                negated: true,
            },
            Tag::SyncToChar2LiteralAndConsume => I::SyncToChar2LiteralAndConsume {
                cs: [r.chr()?, r.chr()?],
            },
            Tag::SyncToLiteralAndConsume
            | Tag::SyncToLinearLiteralAndConsume
            | Tag::SyncToLiteralEquivAndConsume
            | Tag::SyncToLiteralEquivTrivialLastPatCharAndConsume => {
                I::SyncToLiteralAndConsume {
                    scanner: Self::decode_scanner(tag, r, litbuf)?,
                }
            }
            Tag::SyncToCharAndBackup => I::SyncToCharAndBackup {
                c: r.chr()?,
                backup: r.count()?,
            },
            Tag::SyncToSetAndBackup => I::SyncToSetAndBackup {
                set: r.set()?,
                negated: false,
                backup: r.count()?,
            },
            Tag::SyncToNegatedSetAndBackup => I::SyncToSetAndBackup {
                set: r.set()?,
                negated: true,
                backup: r.count()?,
            },
            Tag::SyncToChar2LiteralAndBackup => I::SyncToChar2LiteralAndBackup {
                cs: [r.chr()?, r.chr()?],
                backup: r.count()?,
            },
            Tag::SyncToLiteralAndBackup
            | Tag::SyncToLinearLiteralAndBackup
            | Tag::SyncToLiteralEquivAndBackup
            | Tag::SyncToLiteralEquivTrivialLastPatCharAndBackup => I::SyncToLiteralAndBackup {
                scanner: Self::decode_scanner(tag, r, litbuf)?,
                backup: r.count()?,
            },
            Tag::SyncToLiteralsAndBackup => {
                let count = r.u8()? as usize;
                if count > MAX_SYNC_LITERALS {
                    return None;
                }
                let mut scanners = Vec::with_capacity(count);
                for _ in 0..count {
                    let literal = r.literal()?;
                    let is_equiv_class = r.bool()?;
                    let kind = if is_equiv_class {
                        LiteralScannerKind::Equiv
                    } else {
                        LiteralScannerKind::Plain
                    };
                    let stride = if is_equiv_class { EQUIV_CLASS_SIZE as u32 } else { 1 };
                    let end = literal.offset.checked_add(literal.length.checked_mul(stride)?)?;
                    if end as usize > litbuf.len() {
                        return None;
                    }
                    scanners.push(ScannerInfo {
                        scanner: LiteralScanner::setup(literal, kind, litbuf),
                        is_equiv_class,
                    });
                }
                I::SyncToLiteralsAndBackup {
                    scanners,
                    backup: r.count()?,
                }
            }
            Tag::BeginDefineGroup => I::BeginDefineGroup { group: r.i32()? },
            Tag::EndDefineGroup => I::EndDefineGroup {
                group: r.i32()?,
                no_need_to_save: r.bool()?,
            },
            Tag::DefineGroupFixed => I::DefineGroupFixed {
                group: r.i32()?,
                length: r.u32()?,
                no_need_to_save: r.bool()?,
            },
            Tag::BeginLoop => I::BeginLoop {
                loop_id: r.u32()?,
                repeats: r.count()?,
                has_outer_loops: r.bool()?,
                has_inner_nondet: r.bool()?,
                exit: r.label()?,
                min_body_group: r.i32()?,
                max_body_group: r.i32()?,
                is_greedy: r.bool()?,
            },
            Tag::RepeatLoop => I::RepeatLoop { begin: r.label()? },
            Tag::BeginLoopIfChar => I::BeginLoopIfChar {
                c: r.chr()?,
                loop_id: r.u32()?,
                repeats: r.count()?,
                has_outer_loops: r.bool()?,
                has_inner_nondet: r.bool()?,
                exit: r.label()?,
                min_body_group: r.i32()?,
                max_body_group: r.i32()?,
            },
            Tag::BeginLoopIfSet => I::BeginLoopIfSet {
                set: r.set()?,
                loop_id: r.u32()?,
                repeats: r.count()?,
                has_outer_loops: r.bool()?,
                has_inner_nondet: r.bool()?,
                exit: r.label()?,
                min_body_group: r.i32()?,
                max_body_group: r.i32()?,
            },
            Tag::RepeatLoopIfChar => I::RepeatLoopIfChar { begin: r.label()? },
            Tag::RepeatLoopIfSet => I::RepeatLoopIfSet { begin: r.label()? },
            Tag::BeginLoopFixed => I::BeginLoopFixed {
                loop_id: r.u32()?,
                repeats: r.count()?,
                has_outer_loops: r.bool()?,
                exit: r.label()?,
                length: r.u32()?,
            },
            Tag::RepeatLoopFixed => I::RepeatLoopFixed { begin: r.label()? },
            Tag::LoopSet => I::LoopSet {
                set: r.set()?,
                loop_id: r.u32()?,
                repeats: r.count()?,
                has_outer_loops: r.bool()?,
            },
            Tag::LoopSetWithFollowFirst => I::LoopSetWithFollowFirst {
                set: r.set()?,
                loop_id: r.u32()?,
                repeats: r.count()?,
                has_outer_loops: r.bool()?,
                follow_first: r.chr()?,
            },
            Tag::BeginLoopFixedGroupLastIteration => I::BeginLoopFixedGroupLastIteration {
                loop_id: r.u32()?,
                repeats: r.count()?,
                has_outer_loops: r.bool()?,
                exit: r.label()?,
                length: r.u32()?,
                group: r.i32()?,
                no_need_to_save: r.bool()?,
            },
            Tag::RepeatLoopFixedGroupLastIteration => {
                I::RepeatLoopFixedGroupLastIteration { begin: r.label()? }
            }
            Tag::BeginGreedyLoopNoBacktrack => I::BeginGreedyLoopNoBacktrack {
                loop_id: r.u32()?,
                exit: r.label()?,
            },
            Tag::RepeatGreedyLoopNoBacktrack => {
                I::RepeatGreedyLoopNoBacktrack { begin: r.label()? }
            }
            Tag::ChompCharStar => I::ChompChar {
                c: r.chr()?,
                mode: ChompMode::Star,
            },
            Tag::ChompCharPlus => I::ChompChar {
                c: r.chr()?,
                mode: ChompMode::Plus,
            },
            Tag::ChompSetStar => I::ChompSet {
                set: r.set()?,
                mode: ChompMode::Star,
            },
            Tag::ChompSetPlus => I::ChompSet {
                set: r.set()?,
                mode: ChompMode::Plus,
            },
            Tag::ChompCharGroupStar | Tag::ChompCharGroupPlus => I::ChompCharGroup {
                c: r.chr()?,
                mode: if tag == Tag::ChompCharGroupStar {
                    ChompMode::Star
                } else {
                    ChompMode::Plus
                },
                group: r.i32()?,
                no_need_to_save: r.bool()?,
            },
            Tag::ChompSetGroupStar | Tag::ChompSetGroupPlus => I::ChompSetGroup {
                set: r.set()?,
                mode: if tag == Tag::ChompSetGroupStar {
                    ChompMode::Star
                } else {
                    ChompMode::Plus
                },
                group: r.i32()?,
                no_need_to_save: r.bool()?,
            },
            Tag::ChompCharBounded => I::ChompCharBounded {
                c: r.chr()?,
                repeats: r.count()?,
            },
            Tag::ChompSetBounded => I::ChompSetBounded {
                set: r.set()?,
                repeats: r.count()?,
            },
            Tag::ChompSetBoundedGroupLastChar => I::ChompSetBoundedGroupLastChar {
                set: r.set()?,
                repeats: r.count()?,
                group: r.i32()?,
                no_need_to_save: r.bool()?,
            },
            Tag::Try => I::Try { fail: r.label()? },
            Tag::TryIfChar => I::TryIfChar {
                c: r.chr()?,
                fail: r.label()?,
            },
            Tag::TryMatchChar => I::TryMatchChar {
                c: r.chr()?,
                fail: r.label()?,
            },
            Tag::TryIfSet => I::TryIfSet {
                set: r.set()?,
                fail: r.label()?,
            },
            Tag::TryMatchSet => I::TryMatchSet {
                set: r.set()?,
                fail: r.label()?,
            },
            Tag::BeginAssertion => I::BeginAssertion {
                negated: r.bool()?,
                min_body_group: r.i32()?,
                max_body_group: r.i32()?,
                next: r.label()?,
            },
            Tag::EndAssertion => I::EndAssertion,
        };
        Some(inst)
    }

    fn decode_cases(r: &mut ReaderCtx) -> Option<SmallVec<[SwitchCase; 4]>> {
        let count = r.u8()?;
        let mut cases = SmallVec::new();
        for _ in 0..count {
            cases.push(SwitchCase {
                c: r.chr()?,
                target: r.label()?,
            });
        }
        Some(cases)
    }

    fn decode_scanner(tag: Tag, r: &mut ReaderCtx, litbuf: &[Char]) -> Option<LiteralScanner> {
        let kind = match tag {
            Tag::SyncToLiteralAndContinue
            | Tag::SyncToLiteralAndConsume
            | Tag::SyncToLiteralAndBackup => LiteralScannerKind::Plain,
            Tag::SyncToLinearLiteralAndContinue
            | Tag::SyncToLinearLiteralAndConsume
            | Tag::SyncToLinearLiteralAndBackup => LiteralScannerKind::Linear,
            Tag::SyncToLiteralEquivAndContinue
            | Tag::SyncToLiteralEquivAndConsume
            | Tag::SyncToLiteralEquivAndBackup => LiteralScannerKind::Equiv,
            _ => LiteralScannerKind::EquivTrivialLastChar,
        };
        let literal = r.literal()?;
        let stride = match kind {
            LiteralScannerKind::Plain | LiteralScannerKind::Linear => 1,
            _ => EQUIV_CLASS_SIZE as u32,
        };
        let end = literal.offset.checked_add(literal.length.checked_mul(stride)?)?;
        if end as usize > litbuf.len() {
            return None;
        }
        Some(LiteralScanner::setup(literal, kind, litbuf))
    }

    /// Visit every label field for the byte-offset → index remapping done at
    /// program decode.
    pub fn for_each_label_mut(&mut self, mut f: impl FnMut(&mut Label)) {
        use Inst::*;
        match self {
            Jump { target }
            | JumpIfNotChar { target, .. }
            | MatchCharOrJump { target, .. }
            | JumpIfNotSet { target, .. }
            | MatchSetOrJump { target, .. } => f(target),
            Switch { cases } | SwitchAndConsume { cases } => {
                for case in cases {
                    f(&mut case.target);
                }
            }
            BeginLoop { exit, .. }
            | BeginLoopIfChar { exit, .. }
            | BeginLoopIfSet { exit, .. }
            | BeginLoopFixed { exit, .. }
            | BeginLoopFixedGroupLastIteration { exit, .. }
            | BeginGreedyLoopNoBacktrack { exit, .. } => f(exit),
            RepeatLoop { begin }
            | RepeatLoopIfChar { begin }
            | RepeatLoopIfSet { begin }
            | RepeatLoopFixed { begin }
            | RepeatLoopFixedGroupLastIteration { begin }
            | RepeatGreedyLoopNoBacktrack { begin } => f(begin),
            Try { fail }
            | TryIfChar { fail, .. }
            | TryMatchChar { fail, .. }
            | TryIfSet { fail, .. }
            | TryMatchSet { fail, .. } => f(fail),
            BeginAssertion { next, .. } => f(next),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(inst: Inst, litbuf: &[Char]) -> Inst {
        let mut bytes = Vec::new();
        inst.encode(&mut bytes);
        let mut pos = 0;
        let back = Inst::decode(&bytes, &mut pos, litbuf).expect("decode");
        assert_eq!(pos, bytes.len(), "decode consumed the whole record");
        back
    }

    #[test]
    fn char_and_jump_roundtrip() {
        match roundtrip(
            Inst::MatchCharOrJump {
                c: b'x' as u16,
                target: 0x1234,
            },
            &[],
        ) {
            Inst::MatchCharOrJump { c, target } => {
                assert_eq!(c, b'x' as u16);
                assert_eq!(target, 0x1234);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn loop_roundtrip() {
        let inst = Inst::BeginLoop {
            loop_id: 2,
            repeats: CountDomain::range(1, COUNT_UNBOUNDED),
            has_outer_loops: true,
            has_inner_nondet: false,
            exit: 77,
            min_body_group: 1,
            max_body_group: 3,
            is_greedy: true,
        };
        match roundtrip(inst, &[]) {
            Inst::BeginLoop {
                loop_id,
                repeats,
                has_outer_loops,
                has_inner_nondet,
                exit,
                min_body_group,
                max_body_group,
                is_greedy,
            } => {
                assert_eq!(loop_id, 2);
                assert_eq!(repeats, CountDomain::at_least(1));
                assert!(has_outer_loops);
                assert!(!has_inner_nondet);
                assert_eq!(exit, 77);
                assert_eq!((min_body_group, max_body_group), (1, 3));
                assert!(is_greedy);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn switch_capacity_tags() {
        let mut cases = SmallVec::new();
        for i in 0..5u16 {
            cases.push(SwitchCase {
                c: b'a' as u16 + i,
                target: i as u32 * 10,
            });
        }
        let mut bytes = Vec::new();
        Inst::SwitchAndConsume { cases }.encode(&mut bytes);
        // Five cases need the capacity-8 tag.
        assert_eq!(bytes[0], Tag::SwitchAndConsume8 as u8);
        let mut pos = 0;
        match Inst::decode(&bytes, &mut pos, &[]).unwrap() {
            Inst::SwitchAndConsume { cases } => assert_eq!(cases.len(), 5),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn literal_scanner_roundtrip() {
        let litbuf: Vec<Char> = "needle".encode_utf16().collect();
        let scanner = LiteralScanner::setup(
            LiteralRef { offset: 0, length: 6 },
            LiteralScannerKind::Plain,
            &litbuf,
        );
        let inst = Inst::SyncToLiteralAndBackup {
            scanner,
            backup: CountDomain::range(0, 2),
        };
        match roundtrip(inst, &litbuf) {
            Inst::SyncToLiteralAndBackup { scanner, backup } => {
                assert_eq!(scanner.literal.length, 6);
                assert_eq!(backup, CountDomain::range(0, 2));
                let input: Vec<Char> = "find the needle here".encode_utf16().collect();
                let mut offset = 0;
                assert!(scanner.find(&input, &mut offset, &litbuf));
                assert_eq!(offset, 9);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn truncated_record_fails() {
        let mut bytes = Vec::new();
        Inst::MatchChar { c: b'a' as u16 }.encode(&mut bytes);
        bytes.truncate(2);
        let mut pos = 0;
        assert!(Inst::decode(&bytes, &mut pos, &[]).is_none());
    }

    #[test]
    fn unknown_tag_fails() {
        let bytes = [0xfe];
        let mut pos = 0;
        assert!(Inst::decode(&bytes, &mut pos, &[]).is_none());
    }
}

/// Which sync flavor a literal sync tag encodes.
#[derive(Copy, Clone, PartialEq, Eq)]
enum SyncFlavor {
    Continue,
    Consume,
    Backup,
}

fn literal_sync_tag(kind: LiteralScannerKind, flavor: SyncFlavor) -> Tag {
    use LiteralScannerKind as K;
    use SyncFlavor as F;
    match (kind, flavor) {
        (K::Plain, F::Continue) => Tag::SyncToLiteralAndContinue,
        (K::Linear, F::Continue) => Tag::SyncToLinearLiteralAndContinue,
        (K::Equiv, F::Continue) => Tag::SyncToLiteralEquivAndContinue,
        (K::EquivTrivialLastChar, F::Continue) => {
            Tag::SyncToLiteralEquivTrivialLastPatCharAndContinue
        }
        (K::Plain, F::Consume) => Tag::SyncToLiteralAndConsume,
        (K::Linear, F::Consume) => Tag::SyncToLinearLiteralAndConsume,
        (K::Equiv, F::Consume) => Tag::SyncToLiteralEquivAndConsume,
        (K::EquivTrivialLastChar, F::Consume) => {
            Tag::SyncToLiteralEquivTrivialLastPatCharAndConsume
        }
        (K::Plain, F::Backup) => Tag::SyncToLiteralAndBackup,
        (K::Linear, F::Backup) => Tag::SyncToLinearLiteralAndBackup,
        (K::Equiv, F::Backup) => Tag::SyncToLiteralEquivAndBackup,
        (K::EquivTrivialLastChar, F::Backup) => Tag::SyncToLiteralEquivTrivialLastPatCharAndBackup,
    }
}

//! End-to-end matcher tests over hand-assembled programs.

use strix_regex::chars::Char;
use strix_regex::inst::{CountDomain, Inst};
use strix_regex::matcher::{MatchError, Matcher, NullScriptContext, ScriptContext};
use strix_regex::program::{Program, ProgramBuilder, ProgramKind, RegexFlags};
use strix_regex::CharSet;

fn u(s: &str) -> Vec<Char> {
    s.encode_utf16().collect()
}

fn set_of(chars: &str) -> CharSet {
    let mut set = CharSet::new();
    for c in chars.encode_utf16() {
        set.add(c);
    }
    set
}

fn run(program: &Program, input: &str, start: u32) -> (bool, Vec<Option<(u32, u32)>>) {
    let mut matcher = Matcher::new(program);
    let matched = matcher
        .matches(&u(input), start, &mut NullScriptContext)
        .expect("match should not be interrupted");
    let groups = (0..matcher.num_groups())
        .map(|i| {
            let info = matcher.group(i as i32);
            if info.is_undefined() {
                None
            } else {
                Some((info.offset, info.length))
            }
        })
        .collect();
    (matched, groups)
}

/// `/a(b)c/` on `"xabcy"`: group 0 = (1, 3), group 1 = (2, 1).
#[test]
fn literal_with_group() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("a(b)c").set_num_groups(2);
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::BeginDefineGroup { group: 1 });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::EndDefineGroup {
        group: 1,
        no_need_to_save: false,
    });
    b.emit(Inst::MatchChar { c: b'c' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "xabcy", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((1, 3)));
    assert_eq!(groups[1], Some((2, 1)));
}

/// `/a(b|c)+d/` on `"abccbd"`: group 0 = (0, 6), group 1 = (4, 1) from the
/// last iteration.
#[test]
fn greedy_loop_with_alternation_binds_last_iteration() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("a(b|c)+d").set_num_groups(2).set_num_loops(1);
    let exit = b.create_label();
    let alt2 = b.create_label();
    let after_alt = b.create_label();

    b.emit(Inst::MatchChar { c: b'a' as u16 });
    let begin = b.here();
    b.emit(Inst::BeginLoop {
        loop_id: 0,
        repeats: CountDomain::at_least(1),
        has_outer_loops: false,
        has_inner_nondet: true,
        exit,
        min_body_group: 1,
        max_body_group: 1,
        is_greedy: true,
    });
    b.emit(Inst::BeginDefineGroup { group: 1 });
    b.emit(Inst::TryMatchChar {
        c: b'b' as u16,
        fail: alt2,
    });
    b.emit(Inst::Jump { target: after_alt });
    b.bind_label(alt2);
    b.emit(Inst::MatchChar { c: b'c' as u16 });
    b.bind_label(after_alt);
    b.emit(Inst::EndDefineGroup {
        group: 1,
        no_need_to_save: false,
    });
    b.emit(Inst::RepeatLoop { begin });
    b.bind_label(exit);
    b.emit(Inst::MatchChar { c: b'd' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "abccbd", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 6)));
    assert_eq!(groups[1], Some((4, 1)));
}

/// `/a*b/` via the single-instruction set loop on `"aaab"`.
#[test]
fn loop_set_backtracks_into_follow() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("a*b").set_num_loops(1);
    b.emit(Inst::LoopSet {
        set: set_of("a"),
        loop_id: 0,
        repeats: CountDomain::at_least(0),
        has_outer_loops: false,
    });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "aaab", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 4)));

    // The chomp overshoots ("aaa"), and the rewind hands back one 'a' at a
    // time until the follow matches.
    let (matched, groups) = run(&p, "aabab", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 3)));
}

/// `/^(?=a)./` on `"ab"`: assertion succeeds, continuations are cut, the dot
/// consumes the 'a'.
#[test]
fn positive_lookahead() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("^(?=a).");
    let next = b.create_label();
    b.emit(Inst::BoiTest { hard_fail: false });
    b.emit(Inst::BeginAssertion {
        negated: false,
        min_body_group: 0,
        max_body_group: -1,
        next,
    });
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::EndAssertion);
    b.bind_label(next);
    let mut dot = CharSet::new();
    dot.add(b'\n' as u16);
    dot.add(b'\r' as u16);
    dot.add_range(0x2028, 0x2029);
    b.emit(Inst::MatchSet {
        set: dot,
        negated: true,
    });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "ab", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 1)));

    let (matched, _) = run(&p, "xb", 0);
    assert!(!matched);
}

#[test]
fn negative_lookahead() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("(?!b)a");
    let next = b.create_label();
    b.emit(Inst::BeginAssertion {
        negated: true,
        min_body_group: 0,
        max_body_group: -1,
        next,
    });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::EndAssertion);
    b.bind_label(next);
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "a", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 1)));

    let (matched, _) = run(&p, "b", 0);
    assert!(!matched);
}

/// Groups bound inside a successful positive lookahead stay bound.
#[test]
fn lookahead_group_bindings_survive_the_cut() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("(?=(a))a").set_num_groups(2);
    let next = b.create_label();
    b.emit(Inst::BeginAssertion {
        negated: false,
        min_body_group: 1,
        max_body_group: 1,
        next,
    });
    b.emit(Inst::BeginDefineGroup { group: 1 });
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::EndDefineGroup {
        group: 1,
        no_need_to_save: false,
    });
    b.emit(Inst::EndAssertion);
    b.bind_label(next);
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "a", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 1)));
    assert_eq!(groups[1], Some((0, 1)));
}

/// A successful *negative* assertion body must clear its group bindings.
#[test]
fn negative_assertion_clears_inner_groups() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("(?!(b))." ).set_num_groups(2);
    let next = b.create_label();
    b.emit(Inst::BeginAssertion {
        negated: true,
        min_body_group: 1,
        max_body_group: 1,
        next,
    });
    b.emit(Inst::BeginDefineGroup { group: 1 });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::EndDefineGroup {
        group: 1,
        no_need_to_save: false,
    });
    b.emit(Inst::EndAssertion);
    b.bind_label(next);
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    // On "a" the body fails, so the assertion holds and group 1 is unbound.
    let (matched, groups) = run(&p, "a", 0);
    assert!(matched);
    assert_eq!(groups[1], None);
}

#[test]
fn back_reference() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("(ab)\\1").set_num_groups(2);
    b.emit(Inst::BeginDefineGroup { group: 1 });
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::EndDefineGroup {
        group: 1,
        no_need_to_save: false,
    });
    b.emit(Inst::MatchGroup { group: 1 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "abab", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 4)));
    let (matched, _) = run(&p, "abac", 0);
    assert!(!matched);
}

#[test]
fn back_reference_ignore_case() {
    let mut b = ProgramBuilder::new(RegexFlags::IGNORE_CASE);
    b.set_source("(ab)\\1").set_num_groups(2);
    b.emit(Inst::BeginDefineGroup { group: 1 });
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::EndDefineGroup {
        group: 1,
        no_need_to_save: false,
    });
    b.emit(Inst::MatchGroup { group: 1 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, _) = run(&p, "abAB", 0);
    assert!(matched);
}

/// Greedy and non-greedy `a{1,3}` on the same input: the greedy match is at
/// least as long.
#[test]
fn greedy_nongreedy_duality() {
    let build = |greedy: bool| {
        let mut b = ProgramBuilder::new(RegexFlags::NONE);
        b.set_source("a{1,3}").set_num_loops(1);
        let exit = b.create_label();
        let begin = b.here();
        b.emit(Inst::BeginLoop {
            loop_id: 0,
            repeats: CountDomain::range(1, 3),
            has_outer_loops: false,
            has_inner_nondet: false,
            exit,
            min_body_group: 0,
            max_body_group: -1,
            is_greedy: greedy,
        });
        b.emit(Inst::MatchChar { c: b'a' as u16 });
        b.emit(Inst::RepeatLoop { begin });
        b.bind_label(exit);
        b.emit(Inst::Succ);
        b.finish(ProgramKind::Instructions).unwrap()
    };

    let greedy = build(true);
    let lazy = build(false);
    for input in ["a", "aa", "aaa", "aaaa", "baa"] {
        let (m1, g1) = run(&greedy, input, 0);
        let (m2, g2) = run(&lazy, input, 0);
        assert_eq!(m1, m2, "input {input:?}");
        if m1 {
            let len1 = g1[0].unwrap().1;
            let len2 = g2[0].unwrap().1;
            assert!(len1 >= len2, "greedy {len1} < lazy {len2} on {input:?}");
        }
    }
    // Concrete: greedy takes three, lazy takes one.
    assert_eq!(run(&greedy, "aaaa", 0).1[0], Some((0, 3)));
    assert_eq!(run(&lazy, "aaaa", 0).1[0], Some((0, 1)));
}

/// Sticky programs never retry at a later start offset.
#[test]
fn sticky_does_not_advance() {
    let mut b = ProgramBuilder::new(RegexFlags::STICKY);
    b.set_source("x");
    b.emit(Inst::MatchChar { c: b'x' as u16 });
    b.emit(Inst::Succ);
    let p = b
        .finish(ProgramKind::BoiInstructionsForStickyFlag)
        .unwrap();

    let (matched, _) = run(&p, "ax", 0);
    assert!(!matched);
    let (matched, groups) = run(&p, "ax", 1);
    assert!(matched);
    assert_eq!(groups[0], Some((1, 1)));
}

/// A hard-failing BOI test at a nonzero offset kills the whole match.
#[test]
fn boi_hard_fail() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("^a");
    b.emit(Inst::BoiTest { hard_fail: true });
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "ab", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 1)));
    // 'a' exists later, but the retry loop is cut immediately.
    let (matched, _) = run(&p, "xa", 0);
    assert!(!matched);
}

/// A hard-failing EOI test clears the stacks but still lets later start
/// offsets run.
#[test]
fn eoi_hard_fail_advances_start() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("a$");
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::EoiTest { hard_fail: true });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "aba", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((2, 1)));
    let (matched, _) = run(&p, "ab", 0);
    assert!(!matched);
}

/// A `{0,∞}` loop over a nullable body terminates.
#[test]
fn zero_width_loop_guard() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("(a?)*b").set_num_loops(1);
    let exit = b.create_label();
    let begin = b.here();
    b.emit(Inst::BeginLoop {
        loop_id: 0,
        repeats: CountDomain::at_least(0),
        has_outer_loops: false,
        has_inner_nondet: false,
        exit,
        min_body_group: 0,
        max_body_group: -1,
        is_greedy: true,
    });
    b.emit(Inst::OptMatchChar { c: b'a' as u16 });
    b.emit(Inst::RepeatLoop { begin });
    b.bind_label(exit);
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "aab", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 3)));
    // Without the guard this would never terminate.
    let (matched, _) = run(&p, "ac", 0);
    assert!(!matched);
}

#[test]
fn loop_set_with_follow_first_rewinds_to_candidates() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("[ab]*b").set_num_loops(1);
    b.emit(Inst::LoopSetWithFollowFirst {
        set: set_of("ab"),
        loop_id: 0,
        repeats: CountDomain::at_least(0),
        has_outer_loops: false,
        follow_first: b'b' as u16,
    });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    // The chomp eats "aabab" whole; backtracking jumps straight to the
    // recorded follow-first positions instead of one char at a time.
    let (matched, groups) = run(&p, "aabab", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 5)));

    let (matched, _) = run(&p, "aaa", 0);
    assert!(!matched);
}

#[test]
fn fixed_loop_rewind() {
    // (ab){0,3} followed by "ab!": the fixed loop must give iterations back.
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("(?:ab){0,3}ab!").set_num_loops(1);
    let exit = b.create_label();
    let begin = b.here();
    b.emit(Inst::BeginLoopFixed {
        loop_id: 0,
        repeats: CountDomain::range(0, 3),
        has_outer_loops: false,
        exit,
        length: 2,
    });
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::RepeatLoopFixed { begin });
    b.bind_label(exit);
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::MatchChar { c: b'!' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "ababab!", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 7)));
    let (matched, groups) = run(&p, "ab!", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((0, 3)));
}

#[test]
fn switch_dispatch() {
    use smallvec::smallvec;
    use strix_regex::inst::SwitchCase;

    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("a|b");
    let on_a = b.create_label();
    let on_b = b.create_label();
    b.emit(Inst::SwitchAndConsume {
        cases: smallvec![
            SwitchCase {
                c: b'a' as u16,
                target: on_a,
            },
            SwitchCase {
                c: b'b' as u16,
                target: on_b,
            },
        ],
    });
    b.emit(Inst::Fail);
    b.bind_label(on_a);
    b.emit(Inst::MatchChar { c: b'1' as u16 });
    b.emit(Inst::Succ);
    b.bind_label(on_b);
    b.emit(Inst::MatchChar { c: b'2' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    assert!(run(&p, "a1", 0).0);
    assert!(run(&p, "b2", 0).0);
    assert!(!run(&p, "a2", 0).0);
    assert!(run(&p, "xb2", 0).0);
}

#[test]
fn chomp_group_binds_range() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("(a+)b").set_num_groups(2);
    b.emit(Inst::ChompCharGroup {
        c: b'a' as u16,
        mode: strix_regex::ChompMode::Plus,
        group: 1,
        no_need_to_save: false,
    });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "xaaab", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((1, 4)));
    assert_eq!(groups[1], Some((1, 3)));
}

/// Word boundaries and line anchors.
#[test]
fn word_boundary_and_line_anchors() {
    let mut b = ProgramBuilder::new(RegexFlags::MULTILINE);
    b.set_source("\\bab$");
    b.emit(Inst::WordBoundaryTest { negated: false });
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::EolTest);
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    assert!(run(&p, "x ab", 0).0);
    assert!(run(&p, "ab\ncd", 0).0);
    assert!(!run(&p, "xab", 0).0);
    assert!(!run(&p, "ab c", 0).0);
}

/// Repeated matches return identical group bindings.
#[test]
fn match_determinism() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("(a|ab)(c?)").set_num_groups(3);
    let alt2 = b.create_label();
    let after = b.create_label();
    b.emit(Inst::BeginDefineGroup { group: 1 });
    b.emit(Inst::TryMatchChar {
        c: b'a' as u16,
        fail: alt2,
    });
    b.emit(Inst::Jump { target: after });
    b.bind_label(alt2);
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.bind_label(after);
    b.emit(Inst::EndDefineGroup {
        group: 1,
        no_need_to_save: false,
    });
    b.emit(Inst::BeginDefineGroup { group: 2 });
    b.emit(Inst::OptMatchChar { c: b'c' as u16 });
    b.emit(Inst::EndDefineGroup {
        group: 2,
        no_need_to_save: false,
    });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let first = run(&p, "abc", 0);
    for _ in 0..4 {
        assert_eq!(run(&p, "abc", 0), first);
    }
}

/// The sync instructions move the match start so the retry loop skips
/// hopeless prefixes.
#[test]
fn sync_to_literal_consume() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    let lit = b.add_literal("needle");
    b.set_source("needle!");
    let scanner = strix_regex::inst::LiteralScanner::setup(
        lit,
        strix_regex::inst::LiteralScannerKind::Plain,
        b.litbuf(),
    );
    b.emit(Inst::SyncToLiteralAndConsume { scanner });
    b.emit(Inst::MatchChar { c: b'!' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let (matched, groups) = run(&p, "hay needle! hay", 0);
    assert!(matched);
    assert_eq!(groups[0], Some((4, 7)));
    assert!(!run(&p, "no such thing", 0).0);
}

struct CountingInterrupter {
    checks: u32,
}

impl ScriptContext for CountingInterrupter {
    fn check_interrupt(&mut self) -> Result<(), MatchError> {
        self.checks += 1;
        Err(MatchError::Interrupted)
    }
}

/// Query-continue surfaces the host's interrupt as an error.
#[test]
fn query_continue_interrupts_catastrophic_backtracking() {
    let mut b = ProgramBuilder::new(RegexFlags::NONE);
    b.set_source("a*b").set_num_loops(1);
    let exit = b.create_label();
    let begin = b.here();
    b.emit(Inst::BeginLoop {
        loop_id: 0,
        repeats: CountDomain::at_least(0),
        has_outer_loops: false,
        has_inner_nondet: false,
        exit,
        min_body_group: 0,
        max_body_group: -1,
        is_greedy: true,
    });
    b.emit(Inst::MatchChar { c: b'a' as u16 });
    b.emit(Inst::RepeatLoop { begin });
    b.bind_label(exit);
    b.emit(Inst::MatchChar { c: b'b' as u16 });
    b.emit(Inst::Succ);
    let p = b.finish(ProgramKind::Instructions).unwrap();

    let input: String = "a".repeat(4000);
    let mut matcher = Matcher::new(&p);
    let mut ctx = CountingInterrupter { checks: 0 };
    let result = matcher.matches(&u(&input), 0, &mut ctx);
    assert!(matches!(result, Err(MatchError::Interrupted)));
    assert!(ctx.checks > 0);
}

mod randomized {
    use super::*;
    use proptest::prelude::*;

    fn loop_set_program(greedy_lower: u32) -> Program {
        let mut b = ProgramBuilder::new(RegexFlags::NONE);
        b.set_source("[ab]*c").set_num_loops(1);
        b.emit(Inst::LoopSet {
            set: set_of("ab"),
            loop_id: 0,
            repeats: CountDomain::at_least(greedy_lower),
            has_outer_loops: false,
        });
        b.emit(Inst::MatchChar { c: b'c' as u16 });
        b.emit(Inst::Succ);
        b.finish(ProgramKind::Instructions).unwrap()
    }

    proptest! {
        /// Repeated matches of the same (program, input, offset) triple are
        /// identical, group bindings included.
        #[test]
        fn match_is_deterministic(input in "[abc]{0,24}") {
            let p = loop_set_program(0);
            let first = run(&p, &input, 0);
            prop_assert_eq!(run(&p, &input, 0), first);
        }

        /// A chomped run never exceeds the available matching prefix, and a
        /// successful match always ends on the required follow character.
        #[test]
        fn loop_set_respects_follow(input in "[abc]{0,24}") {
            let p = loop_set_program(0);
            let (matched, groups) = run(&p, &input, 0);
            let units: Vec<u16> = input.encode_utf16().collect();
            if matched {
                let (offset, length) = groups[0].unwrap();
                let end = (offset + length) as usize;
                prop_assert_eq!(units[end - 1], b'c' as u16);
                for &c in &units[offset as usize..end - 1] {
                    prop_assert!(c == b'a' as u16 || c == b'b' as u16);
                }
            } else {
                prop_assert!(!units.contains(&(b'c' as u16)));
            }
        }
    }
}

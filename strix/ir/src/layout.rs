//! Function layout.
//!
//! The order of instructions in a function is determined by the `Layout`
//! data structure defined in this module. It does not contain definitions of
//! instructions, but depends on the `Instr` entity references being defined
//! elsewhere.
//!
//! The list is doubly linked through a [`SecondaryMap`] of link nodes, so
//! insertion next to a known instruction is O(1) and no instruction owns its
//! neighbors. The builder keeps the head at a `FunctionEntry` sentinel and
//! the tail at a `FunctionExit` sentinel; every node except the head has a
//! predecessor and every node except the tail has a successor.

use crate::entities::Instr;
use strix_entity::packed_option::PackedOption;
use strix_entity::SecondaryMap;

#[derive(Clone, Debug, Default)]
struct InstrNode {
    prev: PackedOption<Instr>,
    next: PackedOption<Instr>,
    inserted: bool,
}

/// Linear order of the instructions in one function.
#[derive(Clone, Default)]
pub struct Layout {
    nodes: SecondaryMap<Instr, InstrNode>,
    first: PackedOption<Instr>,
    last: PackedOption<Instr>,
    len: usize,
}

impl Layout {
    /// Create a new empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is `instr` currently part of the layout?
    pub fn is_inserted(&self, instr: Instr) -> bool {
        self.nodes[instr].inserted
    }

    /// First instruction in layout order.
    pub fn first(&self) -> Option<Instr> {
        self.first.expand()
    }

    /// Last instruction in layout order.
    pub fn last(&self) -> Option<Instr> {
        self.last.expand()
    }

    /// The instruction before `instr`, if any.
    pub fn prev(&self, instr: Instr) -> Option<Instr> {
        debug_assert!(self.is_inserted(instr));
        self.nodes[instr].prev.expand()
    }

    /// The instruction after `instr`, if any.
    pub fn next(&self, instr: Instr) -> Option<Instr> {
        debug_assert!(self.is_inserted(instr));
        self.nodes[instr].next.expand()
    }

    /// Number of inserted instructions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is the layout empty?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `instr` at the end of the layout.
    pub fn append(&mut self, instr: Instr) {
        debug_assert!(!self.is_inserted(instr), "instr already in the layout");
        {
            let node = &mut self.nodes[instr];
            node.prev = self.last;
            node.next = None.into();
            node.inserted = true;
        }
        match self.last.expand() {
            Some(last) => self.nodes[last].next = instr.into(),
            None => self.first = instr.into(),
        }
        self.last = instr.into();
        self.len += 1;
    }

    /// Insert `instr` before the existing instruction `before`.
    pub fn insert_before(&mut self, instr: Instr, before: Instr) {
        debug_assert!(!self.is_inserted(instr), "instr already in the layout");
        debug_assert!(self.is_inserted(before), "insertion point not in the layout");
        let after = self.nodes[before].prev;
        {
            let node = &mut self.nodes[instr];
            node.next = before.into();
            node.prev = after;
            node.inserted = true;
        }
        self.nodes[before].prev = instr.into();
        match after.expand() {
            None => self.first = instr.into(),
            Some(a) => self.nodes[a].next = instr.into(),
        }
        self.len += 1;
    }

    /// Insert `instr` after the existing instruction `after`.
    pub fn insert_after(&mut self, instr: Instr, after: Instr) {
        debug_assert!(!self.is_inserted(instr), "instr already in the layout");
        debug_assert!(self.is_inserted(after), "insertion point not in the layout");
        let before = self.nodes[after].next;
        {
            let node = &mut self.nodes[instr];
            node.prev = after.into();
            node.next = before;
            node.inserted = true;
        }
        self.nodes[after].next = instr.into();
        match before.expand() {
            None => self.last = instr.into(),
            Some(b) => self.nodes[b].prev = instr.into(),
        }
        self.len += 1;
    }

    /// Remove `instr` from the layout.
    pub fn remove(&mut self, instr: Instr) {
        debug_assert!(self.is_inserted(instr), "instr not in the layout");
        let (prev, next) = {
            let node = &mut self.nodes[instr];
            let links = (node.prev.take(), node.next.take());
            node.inserted = false;
            links
        };
        match prev {
            None => self.first = next.into(),
            Some(p) => self.nodes[p].next = next.into(),
        }
        match next {
            None => self.last = prev.into(),
            Some(n) => self.nodes[n].prev = prev.into(),
        }
        self.len -= 1;
    }

    /// Iterate over the instructions in layout order.
    pub fn iter(&self) -> LayoutIter<'_> {
        LayoutIter {
            layout: self,
            next: self.first,
        }
    }

    /// Iterate over the instructions in reverse layout order.
    pub fn iter_rev(&self) -> impl Iterator<Item = Instr> + '_ {
        let mut cur = self.last;
        core::iter::from_fn(move || {
            let instr = cur.expand()?;
            cur = self.nodes[instr].prev;
            Some(instr)
        })
    }
}

/// Forward iterator over a layout.
pub struct LayoutIter<'a> {
    layout: &'a Layout,
    next: PackedOption<Instr>,
}

impl Iterator for LayoutIter<'_> {
    type Item = Instr;

    fn next(&mut self) -> Option<Instr> {
        let instr = self.next.expand()?;
        self.next = self.layout.nodes[instr].next;
        Some(instr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strix_entity::EntityRef;

    fn i(n: usize) -> Instr {
        Instr::new(n)
    }

    fn order(layout: &Layout) -> Vec<usize> {
        layout.iter().map(|x| x.index()).collect()
    }

    #[test]
    fn append_and_iterate() {
        let mut l = Layout::new();
        l.append(i(0));
        l.append(i(1));
        l.append(i(2));
        assert_eq!(order(&l), vec![0, 1, 2]);
        assert_eq!(l.first(), Some(i(0)));
        assert_eq!(l.last(), Some(i(2)));
        assert_eq!(l.prev(i(1)), Some(i(0)));
        assert_eq!(l.next(i(1)), Some(i(2)));
        let rev: Vec<usize> = l.iter_rev().map(|x| x.index()).collect();
        assert_eq!(rev, vec![2, 1, 0]);
    }

    #[test]
    fn insert_before_and_after() {
        let mut l = Layout::new();
        l.append(i(0));
        l.append(i(3));
        l.insert_before(i(2), i(3));
        l.insert_after(i(1), i(0));
        assert_eq!(order(&l), vec![0, 1, 2, 3]);
        // Head and tail insertion.
        l.insert_before(i(4), i(0));
        l.insert_after(i(5), i(3));
        assert_eq!(order(&l), vec![4, 0, 1, 2, 3, 5]);
        assert_eq!(l.first(), Some(i(4)));
        assert_eq!(l.last(), Some(i(5)));
    }

    #[test]
    fn remove_relinks_neighbors() {
        let mut l = Layout::new();
        for n in 0..4 {
            l.append(i(n));
        }
        l.remove(i(1));
        assert_eq!(order(&l), vec![0, 2, 3]);
        assert_eq!(l.next(i(0)), Some(i(2)));
        assert_eq!(l.prev(i(2)), Some(i(0)));
        l.remove(i(0));
        l.remove(i(3));
        assert_eq!(order(&l), vec![2]);
        l.remove(i(2));
        assert!(l.is_empty());
        assert_eq!(l.first(), None);
    }

    #[test]
    fn every_non_head_has_prev_every_non_tail_has_next() {
        let mut l = Layout::new();
        for n in 0..6 {
            l.append(i(n));
        }
        l.insert_before(i(6), i(3));
        for instr in l.iter() {
            if Some(instr) != l.first() {
                assert!(l.prev(instr).is_some());
            }
            if Some(instr) != l.last() {
                assert!(l.next(instr).is_some());
            }
        }
    }
}

//! The symbol table.
//!
//! Stack symbols give SSA-like identities to bytecode registers and backend
//! temporaries; property symbols name a property reached through a parent
//! stack symbol. Both are interned: `find_or_create` returns the same id for
//! the same key within one function compilation.

use crate::entities::{Instr, PropSymId, PropertyId, RegSlot, SymId};
use crate::types::IrType;
use rustc_hash::FxHashMap;
use strix_entity::packed_option::PackedOption;
use strix_entity::PrimaryMap;

/// What a property symbol refers to on its parent.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PropertyKind {
    /// A named data property (goes through inline caches).
    Data,
    /// A scope-slot on a closure environment.
    Slots,
    /// An entry of a slot array.
    SlotArray,
    /// A local of an interpreter frame, used for loop-body slot traffic.
    LocalSlots,
}

/// A stack symbol.
#[derive(Clone, Debug)]
pub struct StackSym {
    /// The bytecode register this symbol maps back to, if any. Backend
    /// temporaries and constants have none to restore on bailout.
    pub bytecode_reg: Option<RegSlot>,
    pub ty: IrType,
    /// True while the symbol has exactly one def.
    pub is_single_def: bool,
    /// The defining instruction, valid only while `is_single_def`.
    pub def_instr: PackedOption<Instr>,
    pub is_not_number: bool,
    pub is_safe_this: bool,
    pub is_const: bool,
    pub is_catch_object: bool,
    pub is_from_const_table: bool,
    /// Argument slot number for arg-out symbols.
    pub arg_slot: Option<u16>,
    /// Parameter slot number for arg-in symbols.
    pub param_slot: Option<u16>,
    /// Frame offset for parameter symbols, assigned when known.
    pub offset: Option<u32>,
    defs: u32,
}

impl StackSym {
    fn new(ty: IrType, bytecode_reg: Option<RegSlot>) -> Self {
        StackSym {
            bytecode_reg,
            ty,
            is_single_def: false,
            def_instr: None.into(),
            is_not_number: false,
            is_safe_this: false,
            is_const: false,
            is_catch_object: false,
            is_from_const_table: false,
            arg_slot: None,
            param_slot: None,
            offset: None,
            defs: 0,
        }
    }

    pub fn has_bytecode_reg(&self) -> bool {
        self.bytecode_reg.is_some()
    }

    /// Record a def by `instr`. The first def makes the symbol single-def;
    /// any further def clears that and forgets the defining instruction.
    pub fn record_def(&mut self, instr: Instr) {
        self.defs += 1;
        if self.defs == 1 {
            self.is_single_def = true;
            self.def_instr = instr.into();
        } else {
            self.is_single_def = false;
            self.def_instr = None.into();
        }
    }
}

/// A property symbol: a property id on a parent stack symbol.
#[derive(Clone, Debug)]
pub struct PropertySym {
    pub parent: SymId,
    pub property_id: PropertyId,
    /// Index into the referenced-property-id table, when the access came from
    /// bytecode.
    pub property_id_index: Option<u32>,
    pub kind: PropertyKind,
    /// First inline cache a load of this property went through; used for
    /// redundant-load elimination downstream.
    pub load_cache_index: Option<u32>,
}

/// Interning table for stack and property symbols.
pub struct SymTable {
    stack: FxHashMap<u32, StackSym>,
    props: PrimaryMap<PropSymId, PropertySym>,
    prop_index: FxHashMap<(SymId, PropertyId, PropertyKind), PropSymId>,
    arg_slot_syms: FxHashMap<u16, SymId>,
    next_id: u32,
}

impl SymTable {
    /// Create a table whose fresh ids start above the bytecode register
    /// space (`locals_count` registers).
    pub fn new(locals_count: u32) -> Self {
        SymTable {
            stack: FxHashMap::default(),
            props: PrimaryMap::new(),
            prop_index: FxHashMap::default(),
            arg_slot_syms: FxHashMap::default(),
            next_id: locals_count,
        }
    }

    /// Allocate a fresh id outside the bytecode register space.
    pub fn new_id(&mut self) -> SymId {
        let id = SymId::from_u32(self.next_id);
        self.next_id += 1;
        id
    }

    /// Find the stack symbol with `id`.
    pub fn find_stack(&self, id: SymId) -> Option<&StackSym> {
        self.stack.get(&id.as_u32())
    }

    /// Find the stack symbol with `id`, mutable version.
    pub fn find_stack_mut(&mut self, id: SymId) -> Option<&mut StackSym> {
        self.stack.get_mut(&id.as_u32())
    }

    /// Find or create the stack symbol with `id`, mapping back to
    /// `bytecode_reg`.
    pub fn find_or_create_stack(
        &mut self,
        id: SymId,
        bytecode_reg: Option<RegSlot>,
        ty: IrType,
    ) -> &mut StackSym {
        self.stack
            .entry(id.as_u32())
            .or_insert_with(|| StackSym::new(ty, bytecode_reg))
    }

    /// Create a fresh anonymous stack symbol.
    pub fn new_stack_sym(&mut self, ty: IrType) -> SymId {
        let id = self.new_id();
        self.stack.insert(id.as_u32(), StackSym::new(ty, None));
        id
    }

    /// Create a fresh parameter symbol for 1-based parameter slot `slot`.
    pub fn new_param_slot_sym(&mut self, slot: u16, ty: IrType) -> SymId {
        let id = self.new_stack_sym(ty);
        let sym = self.find_stack_mut(id).unwrap();
        sym.param_slot = Some(slot);
        id
    }

    /// The symbol for 1-based outgoing argument slot `slot`, interned per
    /// slot so every call reuses the same arg-slot symbols.
    pub fn arg_slot_sym(&mut self, slot: u16) -> SymId {
        if let Some(&id) = self.arg_slot_syms.get(&slot) {
            return id;
        }
        let id = self.new_stack_sym(IrType::Var);
        self.find_stack_mut(id).unwrap().arg_slot = Some(slot);
        self.arg_slot_syms.insert(slot, id);
        id
    }

    /// Find or create the property symbol for `property_id` on `parent`.
    pub fn find_or_create_property(
        &mut self,
        parent: SymId,
        property_id: PropertyId,
        property_id_index: Option<u32>,
        load_cache_index: Option<u32>,
        kind: PropertyKind,
    ) -> PropSymId {
        if let Some(&ps) = self.prop_index.get(&(parent, property_id, kind)) {
            return ps;
        }
        let ps = self.props.push(PropertySym {
            parent,
            property_id,
            property_id_index,
            kind,
            load_cache_index,
        });
        self.prop_index.insert((parent, property_id, kind), ps);
        ps
    }

    /// Look up a property symbol.
    pub fn prop(&self, id: PropSymId) -> &PropertySym {
        &self.props[id]
    }

    /// Look up a property symbol, mutable version.
    pub fn prop_mut(&mut self, id: PropSymId) -> &mut PropertySym {
        &mut self.props[id]
    }

    /// Number of property symbols created so far.
    pub fn prop_count(&self) -> usize {
        self.props.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_sym_interning() {
        let mut t = SymTable::new(8);
        let id = SymId::from_u32(3);
        t.find_or_create_stack(id, Some(3), IrType::Var).is_const = true;
        assert!(t.find_or_create_stack(id, Some(3), IrType::Var).is_const);
        // Fresh ids start above the register space.
        assert_eq!(t.new_id().as_u32(), 8);
        assert_eq!(t.new_id().as_u32(), 9);
    }

    #[test]
    fn property_sym_interning() {
        let mut t = SymTable::new(4);
        let parent = SymId::from_u32(1);
        t.find_or_create_stack(parent, Some(1), IrType::Var);
        let a = t.find_or_create_property(parent, 42, Some(0), Some(5), PropertyKind::Data);
        let b = t.find_or_create_property(parent, 42, Some(0), None, PropertyKind::Data);
        assert_eq!(a, b);
        // Same property id under a different kind is a different symbol.
        let c = t.find_or_create_property(parent, 42, None, None, PropertyKind::Slots);
        assert_ne!(a, c);
        assert_eq!(t.prop(a).load_cache_index, Some(5));
    }

    #[test]
    fn single_def_tracking() {
        let mut t = SymTable::new(4);
        let id = SymId::from_u32(0);
        let sym = t.find_or_create_stack(id, Some(0), IrType::Var);
        sym.record_def(Instr::from_u32(1));
        assert!(sym.is_single_def);
        assert_eq!(sym.def_instr.expand(), Some(Instr::from_u32(1)));
        sym.record_def(Instr::from_u32(2));
        assert!(!sym.is_single_def);
        assert!(sym.def_instr.is_none());
    }

    #[test]
    fn arg_slot_syms_are_interned() {
        let mut t = SymTable::new(0);
        let a = t.arg_slot_sym(1);
        let b = t.arg_slot_sym(1);
        let c = t.arg_slot_sym(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(t.find_stack(a).unwrap().arg_slot, Some(1));
    }
}

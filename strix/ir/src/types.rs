//! Operand types and value-type annotations.

/// The machine-level type of an operand.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum IrType {
    /// A tagged script value.
    #[default]
    Var,
    /// 32-bit signed integer.
    Int32,
    /// 32-bit unsigned integer.
    Uint32,
    /// 64-bit float.
    Float64,
    /// Untyped machine pointer.
    MachPtr,
    /// Machine register width integer.
    MachReg,
}

/// The shape of an object value, as far as profiling knows it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ObjectKind {
    Generic,
    UninitializedObject,
    Array,
    RegExp,
}

/// Profile-derived classification of the script value an operand holds.
///
/// This is deliberately coarse; the optimizer refines it. `Uninitialized`
/// means "no information", not "undefined".
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ValueType {
    #[default]
    Uninitialized,
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Object(ObjectKind),
}

impl ValueType {
    /// Is there any information at all?
    pub fn is_known(self) -> bool {
        self != ValueType::Uninitialized
    }
}

/// Type ids for entries of the constant table.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConstType {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Object,
}

impl From<ConstType> for ValueType {
    fn from(ty: ConstType) -> ValueType {
        match ty {
            ConstType::Undefined => ValueType::Undefined,
            ConstType::Null => ValueType::Null,
            ConstType::Boolean => ValueType::Boolean,
            ConstType::Number => ValueType::Number,
            ConstType::String => ValueType::String,
            ConstType::Object => ValueType::Object(ObjectKind::Generic),
        }
    }
}

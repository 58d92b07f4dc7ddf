//! The interface between the semantic core and code generation. The core only
//! ever talks to a [`Backend`]: it creates blocks, emits instructions at an
//! insertion point and builds join nodes for values that flow in from several
//! predecessor blocks.
//!
//! [`lir::Module`] is the in-memory implementation used by tests and the CLI.

use num_bigint::BigInt;
use strum::Display;

use crate::{index::simple_index, intern::InternedSymbol};

#[cfg(test)]
pub(crate) mod evaluate;
pub mod lir;
pub mod pretty_print;
pub mod verify;

simple_index! {
    /// Identifies a basic block
    pub struct BlockRef;
}

simple_index! {
    /// Identifies an SSA value (constant, parameter, instruction result or join)
    pub struct ValueRef;
}

simple_index! {
    /// Identifies a declared function
    pub struct FunctionRef;
}

simple_index! {
    /// Identifies a declared structure layout
    pub struct StructRef;
}

/// The machine level type of a value. Fixed point types lose their exponent
/// here, it only matters to the semantic core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawType {
    Void,
    Integer(u32),
    Float(u32),
    Pointer,
    Struct(StructRef),
}

impl RawType {
    pub fn bitwidth(&self) -> Option<u32> {
        match self {
            RawType::Integer(bits) | RawType::Float(bits) => Some(*bits),
            RawType::Void | RawType::Pointer | RawType::Struct(_) => None,
        }
    }
}

impl core::fmt::Display for RawType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawType::Void => write!(f, "void"),
            RawType::Integer(bits) => write!(f, "i{bits}"),
            RawType::Float(bits) => write!(f, "f{bits}"),
            RawType::Pointer => write!(f, "ptr"),
            RawType::Struct(id) => write!(f, "struct.{}", id.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
    Shl,
    AShr,
    LShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum UnaryOp {
    Neg,
    FNeg,
    Not,
}

/// Integer predicates are prefixed with their signedness (`s`/`u`), float
/// predicates with whether they are ordered (`o`) or unordered (`u`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ComparePredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
    Oeq,
    Une,
    Olt,
    Ole,
    Ogt,
    Oge,
    /// Neither operand is NaN
    Ord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CastKind {
    ZExt,
    SExt,
    Trunc,
    FpExt,
    FpTrunc,
    SiToFp,
    UiToFp,
    FpToSi,
    FpToUi,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub symbol: InternedSymbol,
    pub parameters: Vec<RawType>,
    pub return_type: RawType,
}

/// A code generation target for the semantic core.
///
/// Instructions are appended to the block selected with
/// [`Backend::set_insertion_point`]. Join nodes are created at the start of the
/// current insertion block and receive their incoming edges positionally,
/// one per predecessor, through [`Backend::add_incoming`].
pub trait Backend {
    fn declare_function(&mut self, signature: FunctionSignature) -> FunctionRef;

    fn function_parameter(&self, function: FunctionRef, index: usize) -> ValueRef;

    fn declare_structure(&mut self, name: InternedSymbol, members: Vec<RawType>) -> StructRef;

    fn create_block(&mut self, function: FunctionRef, label: &str) -> BlockRef;

    fn set_insertion_point(&mut self, block: BlockRef);

    fn insertion_point(&self) -> Option<BlockRef>;

    /// Whether the block already ends in a branch, jump, return or unreachable
    fn is_terminated(&self, block: BlockRef) -> bool;

    fn value_type(&self, value: ValueRef) -> RawType;

    fn undefined_value(&mut self, ty: RawType) -> ValueRef;

    fn constant_int(&mut self, ty: RawType, value: &BigInt) -> ValueRef;

    fn constant_float(&mut self, ty: RawType, value: f64) -> ValueRef;

    fn emit_binary(&mut self, operator: BinaryOp, lhs: ValueRef, rhs: ValueRef) -> ValueRef;

    fn emit_unary(&mut self, operator: UnaryOp, operand: ValueRef) -> ValueRef;

    fn emit_compare(&mut self, predicate: ComparePredicate, lhs: ValueRef, rhs: ValueRef) -> ValueRef;

    fn emit_cast(&mut self, kind: CastKind, operand: ValueRef, ty: RawType) -> ValueRef;

    fn emit_select(&mut self, condition: ValueRef, if_true: ValueRef, if_false: ValueRef) -> ValueRef;

    /// Returns `None` when the callee returns void
    fn emit_call(&mut self, function: FunctionRef, arguments: &[ValueRef]) -> Option<ValueRef>;

    fn emit_branch(&mut self, condition: ValueRef, positive: BlockRef, negative: BlockRef);

    fn emit_jump(&mut self, destination: BlockRef);

    fn emit_return(&mut self, value: Option<ValueRef>);

    fn emit_unreachable(&mut self);

    /// `arity` is the number of incoming edges reserved for the join
    fn create_join_node(&mut self, ty: RawType, arity: usize) -> ValueRef;

    fn add_incoming(&mut self, join: ValueRef, value: ValueRef, predecessor: BlockRef);

    fn constant_u64(&mut self, ty: RawType, value: u64) -> ValueRef {
        self.constant_int(ty, &BigInt::from(value))
    }
}

//! The semantic core: numeric types, conversions, literals, scopes and the
//! compilation unit tying them together. Everything here emits through the
//! [`crate::backend::Backend`] trait.

pub mod conversion;
pub mod intrinsic;
pub mod literal;
pub mod operators;
pub mod primitive;
pub mod registry;
pub mod scope;
pub mod ty;
pub mod unit;

//! Semantic core of the Cog compiler: numeric type model, implicit
//! conversions, literal normalization, SSA construction across structured
//! control flow and overload resolution, emitting through a pluggable
//! backend.

pub mod backend;
pub mod diagnostics;
pub mod index;
pub mod intern;
pub mod middle;

//! Source blocks
//!
//! Sources have no inputs; they run as fast as their readers accept values.

pub mod constant;

pub use constant::Constant;

//! Math blocks
//!
//! Stateless arithmetic ([`Scale`], [`Sum`]) and the explicit Euler
//! integrator used to close loops in differential equations.

pub mod integrate;
pub mod scale;
pub mod sum;

pub use integrate::Integrate;
pub use scale::Scale;
pub use sum::Sum;

//! Core abstractions and types.
//!
//! *Users* compose [`Problem`]s out of functions wrapped in [`TieredFn`]
//! handles and hand them to a backend through the
//! [`Registry`](crate::Registry).
//!
//! Backend *developers* implement the [`Backend`] trait and use the tools in
//! [derivatives](crate::derivatives) and [algo](crate::algo) modules.

mod backend;
mod function;
mod interval;
mod problem;
mod result;

pub use backend::*;
pub use function::*;
pub use interval::*;
pub use problem::*;
pub use result::*;

//! The collection of implemented algorithms.

pub mod auglag;
pub mod nelder_mead;

pub use auglag::AugLag;
pub use nelder_mead::NelderMead;

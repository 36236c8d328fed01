#![allow(clippy::many_single_char_names)]
#![warn(missing_docs)]

//! # Karush
//!
//! A pure Rust layer for composing constrained nonlinear optimization
//! problems from differentiable functions and dispatching them to pluggable
//! solver backends.
//!
//! Functions declare what they can provide (values, gradients, Hessian
//! matrices) through a small trait ladder. A problem combines one scalar
//! cost with an ordered list of general constraints, rectangular argument
//! bounds and per-argument scales. A registry hands the assembled problem to
//! a backend chosen by name; every backend declares the function tier it
//! needs and the dispatch layer checks it up front, so a problem never
//! reaches a backend it cannot satisfy.
//!
//! ## Backends
//!
//! * [Augmented Lagrangian](algo::auglag) -- The reference backend, working
//!   on function values only. Registered under the name `auglag`.
//! * [Nelder-Mead](algo::nelder_mead) -- The derivative-free simplex engine
//!   behind the inner minimization, usable on its own for problems with
//!   argument bounds only.
//!
//! ## Problem
//!
//! A problem minimizes a scalar cost subject to constraints whose outputs
//! are confined to [`Interval`]s:
//!
//! ```text
//! min  f(x)
//! s.t. li <= ci(x) <= ui for every constraint output i
//!      Lj <= xj <= Uj    for every argument j
//! ```
//!
//! An interval with both ends equal pins the output, which turns the
//! constraint into an equality. Infinite ends leave a side unconstrained.
//!
//! When it comes to code, a function is any type that implements
//! [`Function`] and, for the higher tiers, [`Differentiable`] and
//! [`TwiceDifferentiable`].
//!
//! ```rust
//! // Karush is based on `nalgebra` crate.
//! use karush::nalgebra as na;
//! use karush::{Differentiable, Function};
//! use na::DVector;
//!
//! // A function is represented by a type.
//! struct Budget;
//!
//! impl Function for Budget {
//!     // Two arguments, one output.
//!     fn dim(&self) -> usize {
//!         2
//!     }
//!
//!     fn outputs(&self) -> usize {
//!         1
//!     }
//!
//!     // Evaluate trial values of the arguments, writing all outputs.
//!     fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
//!         out[0] = x[0] + 2.0 * x[1];
//!     }
//! }
//!
//! // First derivatives unlock backends of the gradient tier.
//! impl Differentiable for Budget {
//!     fn gradient(&self, _x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
//!         out[0] = 1.0;
//!         out[1] = 2.0;
//!     }
//! }
//! ```
//!
//! There is no obligation to provide all derivatives. A backend that needs
//! only values accepts any function, while a backend of a higher tier
//! rejects the problem during dispatch with a descriptive error instead of
//! failing somewhere mid-solve.
//!
//! ## Solving
//!
//! Wrap the functions in [`TieredFn`] handles, compose a [`Problem`] and
//! dispatch it through the [`Registry`].
//!
//! ```rust
//! # use karush::nalgebra as na;
//! # use karush::{Differentiable, Function};
//! # use na::DVector;
//! #
//! # struct Budget;
//! #
//! # impl Function for Budget {
//! #     fn dim(&self) -> usize {
//! #         2
//! #     }
//! #
//! #     fn outputs(&self) -> usize {
//! #         1
//! #     }
//! #
//! #     fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
//! #         out[0] = x[0] + 2.0 * x[1];
//! #     }
//! # }
//! #
//! # impl Differentiable for Budget {
//! #     fn gradient(&self, _x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
//! #         out[0] = 1.0;
//! #         out[1] = 2.0;
//! #     }
//! # }
//! use karush::func::Quadratic;
//! use karush::{Config, Interval, Problem, Registry, SolverResult, TieredFn};
//! use na::{dmatrix, dvector};
//!
//! // min (x0 - 1)^2 + (x1 - 2)^2
//! let cost = Quadratic::new(dmatrix![2.0, 0.0; 0.0, 2.0], dvector![-2.0, -4.0], 5.0);
//!
//! let mut problem = Problem::new(TieredFn::hessian(cost));
//!
//! // s.t. x0 + 2 x1 <= 2
//! problem
//!     .add_constraint(
//!         TieredFn::gradient(Budget),
//!         vec![Interval::upper_bounded(2.0)],
//!         vec![1.0],
//!     )
//!     .unwrap();
//! problem.set_starting_point(dvector![0.0, 0.0]).unwrap();
//!
//! let registry = Registry::with_default_backends();
//! let result = registry.solve("auglag", &problem, &Config::new()).unwrap();
//!
//! match result {
//!     SolverResult::Solution(solution) | SolverResult::SolutionWithWarnings(solution, _) => {
//!         assert!((solution.x()[0] - 0.4).abs() < 1e-3);
//!         assert!((solution.x()[1] - 0.8).abs() < 1e-3);
//!     }
//!     result => panic!("{}", result),
//! }
//! ```
//!
//! All four arms of [`SolverResult`] are ordinary values. A backend that
//! fails or finds nothing reports that through the result; the `Err` side of
//! the dispatch is reserved for problems that never reached the backend.
//!
//! ## Roadmap
//!
//! Listed *not* in order of priority.
//!
//! * Gradient-based backends (projected gradient, interior point) profiting
//!   from the higher function tiers
//! * Automatic constraint scaling derived from typical output magnitudes
//! * Sparse Jacobian and Hessian storage for large separable problems
//! * A high-level driver exposing multiplier and penalty traces for users
//!   that need convergence insight
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
mod core;
pub mod derivatives;
pub mod func;
pub mod registry;
pub mod testing;

pub use core::*;
pub use registry::{DispatchError, Registry};

pub use nalgebra;

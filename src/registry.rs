//! Backend lookup and problem dispatch.
//!
//! The [`Registry`] maps backend names to factories. Dispatching a problem
//! through [`Registry::solve`] builds a fresh backend from a [`Config`],
//! validates the problem against it and invokes it exactly once. Anything
//! that goes wrong before the backend runs is a [`DispatchError`]; the run
//! itself always produces a [`SolverResult`], whether it succeeded or not.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use thiserror::Error;

use crate::algo::AugLag;
use crate::core::{Backend, BoundsExt, Config, Function, Problem, SolverResult, Tier, TieredFn};

/// Error returned from [`Registry::solve`] when the problem never reached a
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No backend is registered under the requested name.
    #[error("unknown backend `{name}`")]
    UnknownBackend {
        /// The requested name.
        name: String,
    },
    /// A function of the problem does not provide the tier the backend
    /// requires.
    #[error("{function} provides the {provided} tier, but backend `{backend}` requires {required}")]
    CapabilityMismatch {
        /// Name of the backend.
        backend: String,
        /// Description of the offending function.
        function: String,
        /// Tier required by the backend.
        required: Tier,
        /// Tier provided by the function.
        provided: Tier,
    },
    /// The problem has no starting point.
    #[error("the problem has no starting point")]
    MissingStartingPoint,
    /// The starting point violates the argument bounds.
    #[error("the starting point lies outside the argument bounds")]
    StartingPointOutOfBounds,
}

type BackendFactory = Box<dyn Fn(&Config) -> Box<dyn Backend>>;

/// A registry of solver backends keyed by name.
///
/// The registry owns a factory for every registered backend. Dispatching a
/// problem looks the factory up, builds a fresh backend instance from the
/// passed configuration, validates the problem against the backend and runs
/// it exactly once. Validation failures are returned as [`DispatchError`]
/// before the backend runs; everything that happens during the run is part of
/// the returned [`SolverResult`].
///
/// ```rust
/// use karush::testing;
/// use karush::{Config, Registry};
///
/// let registry = Registry::with_default_backends();
/// let problem = testing::hs71_problem();
///
/// let result = registry.solve("auglag", &problem, &Config::new()).unwrap();
/// assert!(result.is_success());
/// ```
pub struct Registry {
    backends: BTreeMap<String, BackendFactory>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
        }
    }

    /// Creates a registry with all backends of this crate registered.
    ///
    /// Currently that is [`AugLag`] under the name `auglag`.
    pub fn with_default_backends() -> Self {
        let mut registry = Self::new();
        registry.register(AugLag::NAME, |config| {
            Box::new(AugLag::from_config(config))
        });
        registry
    }

    /// Registers a backend factory under given name, replacing a previously
    /// registered backend of the same name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Config) -> Box<dyn Backend> + 'static,
    ) {
        self.backends.insert(name.into(), Box::new(factory));
    }

    /// Determines whether a backend is registered under given name.
    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Iterates over the registered backend names in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(|name| name.as_str())
    }

    /// Runs the named backend on the problem.
    ///
    /// The backend is built from `config` and invoked at most once; a failed
    /// run is reported in the [`SolverResult`], never retried.
    ///
    /// # Errors
    ///
    /// * [`DispatchError::UnknownBackend`] when no backend is registered
    ///   under `name`.
    /// * [`DispatchError::CapabilityMismatch`] when the cost or a constraint
    ///   function does not provide the tier the backend requires. The cost is
    ///   checked first, then the constraints in their order.
    /// * [`DispatchError::MissingStartingPoint`] when the problem has no
    ///   starting point. There is no implicit default point; the caller has
    ///   to choose one.
    /// * [`DispatchError::StartingPointOutOfBounds`] when the starting point
    ///   violates the argument bounds.
    pub fn solve(
        &self,
        name: &str,
        problem: &Problem,
        config: &Config,
    ) -> Result<SolverResult, DispatchError> {
        let factory = self
            .backends
            .get(name)
            .ok_or_else(|| DispatchError::UnknownBackend {
                name: name.to_string(),
            })?;

        let mut backend = factory(config);
        let required = backend.required_tier();

        check_tier(
            required,
            problem.cost().tier(),
            backend.name(),
            cost_label(problem.cost()),
        )?;

        for (i, constraint) in problem.constraints().iter().enumerate() {
            check_tier(
                required,
                constraint.function().tier(),
                backend.name(),
                constraint_label(i, constraint.function()),
            )?;
        }

        let start = problem
            .starting_point()
            .ok_or(DispatchError::MissingStartingPoint)?;

        if !problem.argument_bounds().contains_point(start) {
            return Err(DispatchError::StartingPointOutOfBounds);
        }

        debug!(
            "dispatching problem with {} arguments and {} constraint outputs to backend `{}`",
            problem.dim(),
            problem.outputs_total(),
            backend.name()
        );

        Ok(backend.solve(problem))
    }
}

impl Default for Registry {
    /// Equivalent to [`Registry::with_default_backends`].
    fn default() -> Self {
        Self::with_default_backends()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn check_tier(
    required: Tier,
    provided: Tier,
    backend: &str,
    function: String,
) -> Result<(), DispatchError> {
    if provided >= required {
        Ok(())
    } else {
        Err(DispatchError::CapabilityMismatch {
            backend: backend.to_string(),
            function,
            required,
            provided,
        })
    }
}

fn cost_label(f: &TieredFn) -> String {
    if f.name().is_empty() {
        "cost function".to_string()
    } else {
        format!("cost function `{}`", f.name())
    }
}

fn constraint_label(i: usize, f: &TieredFn) -> String {
    if f.name().is_empty() {
        format!("constraint {}", i)
    } else {
        format!("constraint {} `{}`", i, f.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::{dmatrix, dvector};

    use crate::core::{Interval, TieredFn};
    use crate::func::Quadratic;

    struct Stub {
        tier: Tier,
        runnable: bool,
    }

    impl Backend for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn required_tier(&self) -> Tier {
            self.tier
        }

        fn solve(&mut self, _problem: &Problem) -> SolverResult {
            assert!(self.runnable, "backend must not be invoked");
            SolverResult::NoSolution
        }
    }

    fn quadratic() -> Quadratic {
        Quadratic::new(dmatrix![2.0, 0.0; 0.0, 2.0], dvector![0.0, 0.0], 0.0)
    }

    fn gradient_only_problem() -> Problem {
        let mut problem = Problem::new(TieredFn::gradient(quadratic()));
        problem.set_starting_point(dvector![0.0, 0.0]).unwrap();
        problem
    }

    #[test]
    fn default_backends() {
        let registry = Registry::with_default_backends();

        assert!(registry.contains("auglag"));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["auglag"]);
        assert!(!Registry::new().contains("auglag"));
    }

    #[test]
    fn unknown_backend() {
        let registry = Registry::with_default_backends();
        let problem = gradient_only_problem();

        assert_eq!(
            registry
                .solve("levenberg", &problem, &Config::new())
                .unwrap_err(),
            DispatchError::UnknownBackend {
                name: "levenberg".to_string()
            }
        );
    }

    #[test]
    fn capability_mismatch_on_cost() {
        let mut registry = Registry::new();
        registry.register("stub", |_| {
            Box::new(Stub {
                tier: Tier::Hessian,
                runnable: false,
            })
        });

        let problem = gradient_only_problem();

        assert_eq!(
            registry
                .solve("stub", &problem, &Config::new())
                .unwrap_err(),
            DispatchError::CapabilityMismatch {
                backend: "stub".to_string(),
                function: "cost function".to_string(),
                required: Tier::Hessian,
                provided: Tier::Gradient,
            }
        );
    }

    #[test]
    fn capability_mismatch_on_constraint() {
        let mut registry = Registry::new();
        registry.register("stub", |_| {
            Box::new(Stub {
                tier: Tier::Hessian,
                runnable: false,
            })
        });

        let mut problem = Problem::new(TieredFn::hessian(quadratic()));
        problem
            .add_constraint(
                TieredFn::gradient(quadratic()),
                vec![Interval::upper_bounded(1.0)],
                vec![1.0],
            )
            .unwrap();
        problem.set_starting_point(dvector![0.0, 0.0]).unwrap();

        let error = registry
            .solve("stub", &problem, &Config::new())
            .unwrap_err();

        match error {
            DispatchError::CapabilityMismatch { function, .. } => {
                assert_eq!(function, "constraint 0");
            }
            error => panic!("unexpected error: {}", error),
        }
    }

    #[test]
    fn starting_point_is_required() {
        let registry = Registry::with_default_backends();
        let problem = Problem::new(TieredFn::hessian(quadratic()));

        assert_eq!(
            registry
                .solve("auglag", &problem, &Config::new())
                .unwrap_err(),
            DispatchError::MissingStartingPoint
        );
    }

    #[test]
    fn starting_point_must_respect_bounds() {
        let registry = Registry::with_default_backends();

        let mut problem = Problem::new(TieredFn::hessian(quadratic()));
        problem
            .set_argument_bounds(vec![Interval::new(1.0, 5.0); 2])
            .unwrap();
        problem.set_starting_point(dvector![0.0, 3.0]).unwrap();

        assert_eq!(
            registry
                .solve("auglag", &problem, &Config::new())
                .unwrap_err(),
            DispatchError::StartingPointOutOfBounds
        );
    }

    #[test]
    fn custom_backend_passthrough() {
        let mut registry = Registry::new();
        registry.register("stub", |_| {
            Box::new(Stub {
                tier: Tier::Gradient,
                runnable: true,
            })
        });

        let result = registry
            .solve("stub", &gradient_only_problem(), &Config::new())
            .unwrap();

        assert!(matches!(result, SolverResult::NoSolution));
    }
}

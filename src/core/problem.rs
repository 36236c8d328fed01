//! Problem assembly: cost function, constraints, bounds and scales.

use nalgebra::DVector;
use thiserror::Error;

use super::function::{EvalError, Function, FunctionExt, Tier, TieredFn};
use super::interval::Interval;

/// Error returned from the fallible [`Problem`] mutators.
///
/// A failed mutation has no effect on the problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProblemError {
    /// A length does not match the number of problem arguments.
    #[error("invalid dimensionality (problem has {expected} arguments, got {found})")]
    DimensionMismatch {
        /// Number of problem arguments.
        expected: usize,
        /// Length of what was passed.
        found: usize,
    },
    /// Constraint metadata does not match the constraint function outputs.
    #[error(
        "constraint shape mismatch ({outputs} outputs, {bounds} bounds, {scales} scales)"
    )]
    ShapeMismatch {
        /// Output components of the constraint function.
        outputs: usize,
        /// Number of intervals that were passed.
        bounds: usize,
        /// Number of scales that were passed.
        scales: usize,
    },
}

/// A constraint of a [`Problem`]: a function together with an admissible
/// interval and a scale for every output component.
#[derive(Debug, Clone)]
pub struct Constraint {
    function: TieredFn,
    bounds: Vec<Interval>,
    scales: Vec<f64>,
}

impl Constraint {
    /// Gets the constraint function.
    pub fn function(&self) -> &TieredFn {
        &self.function
    }

    /// Gets the admissible interval of every output component.
    pub fn bounds(&self) -> &[Interval] {
        &self.bounds
    }

    /// Gets the scale of every output component.
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

/// A constrained optimization problem.
///
/// A problem minimizes one scalar-valued cost function subject to an ordered
/// list of constraints, rectangular argument bounds and per-argument scales.
/// It can also carry a starting point for backends that need one. The problem
/// itself does no solving; it is handed over to a backend through the
/// [`Registry`](crate::Registry).
///
/// ```rust
/// use karush::nalgebra::dvector;
/// use karush::{Interval, Problem, TieredFn};
/// use karush::testing::{Hs71Cost, Hs71SquaredNorm, Hs71WeightedProduct};
///
/// let mut problem = Problem::new(TieredFn::hessian(Hs71Cost));
///
/// problem
///     .add_constraint(
///         TieredFn::hessian(Hs71WeightedProduct),
///         vec![Interval::lower_bounded(25.0)],
///         vec![1.0],
///     )
///     .unwrap();
/// problem
///     .add_constraint(
///         TieredFn::hessian(Hs71SquaredNorm),
///         vec![Interval::fixed(40.0)],
///         vec![1.0],
///     )
///     .unwrap();
///
/// problem
///     .set_argument_bounds(vec![Interval::new(1.0, 5.0); 4])
///     .unwrap();
/// problem.set_starting_point(dvector![1.0, 5.0, 5.0, 1.0]).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Problem {
    cost: TieredFn,
    constraints: Vec<Constraint>,
    bounds: Vec<Interval>,
    scales: Vec<f64>,
    start: Option<DVector<f64>>,
}

impl Problem {
    /// Creates a problem minimizing given cost function.
    ///
    /// The cost fixes the number of arguments of the problem. The arguments
    /// start unbounded with unit scales and there is no starting point.
    ///
    /// # Panics
    ///
    /// Panics when the cost function is not scalar-valued or takes no
    /// arguments.
    pub fn new(cost: TieredFn) -> Self {
        assert!(cost.outputs() == 1, "cost function is not scalar-valued");
        assert!(cost.dim() > 0, "cost function takes no arguments");

        let dim = cost.dim();

        Self {
            cost,
            constraints: Vec::new(),
            bounds: vec![Interval::unbounded(); dim],
            scales: vec![1.0; dim],
            start: None,
        }
    }

    /// Gets the number of arguments of the problem.
    pub fn dim(&self) -> usize {
        self.cost.dim()
    }

    /// Gets the cost function.
    pub fn cost(&self) -> &TieredFn {
        &self.cost
    }

    /// Gets the constraints in the order they were added.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Gets the admissible interval of every argument.
    pub fn argument_bounds(&self) -> &[Interval] {
        &self.bounds
    }

    /// Gets the scale of every argument.
    pub fn argument_scales(&self) -> &[f64] {
        &self.scales
    }

    /// Gets the starting point, if one was set.
    pub fn starting_point(&self) -> Option<&DVector<f64>> {
        self.start.as_ref()
    }

    /// Appends a constraint with an interval and a scale per output
    /// component.
    ///
    /// Constraints are kept in insertion order and cannot be removed;
    /// backends and solution vectors refer to them positionally.
    pub fn add_constraint(
        &mut self,
        function: TieredFn,
        bounds: Vec<Interval>,
        scales: Vec<f64>,
    ) -> Result<(), ProblemError> {
        if function.dim() != self.dim() {
            return Err(ProblemError::DimensionMismatch {
                expected: self.dim(),
                found: function.dim(),
            });
        }

        let outputs = function.outputs();
        if bounds.len() != outputs || scales.len() != outputs {
            return Err(ProblemError::ShapeMismatch {
                outputs,
                bounds: bounds.len(),
                scales: scales.len(),
            });
        }

        self.constraints.push(Constraint {
            function,
            bounds,
            scales,
        });

        Ok(())
    }

    /// Sets the admissible interval of every argument at once.
    pub fn set_argument_bounds(&mut self, bounds: Vec<Interval>) -> Result<(), ProblemError> {
        if bounds.len() != self.dim() {
            return Err(ProblemError::DimensionMismatch {
                expected: self.dim(),
                found: bounds.len(),
            });
        }

        self.bounds = bounds;
        Ok(())
    }

    /// Sets the admissible interval of one argument.
    ///
    /// # Panics
    ///
    /// Panics when `i` is not a valid argument index.
    pub fn set_argument_bound(&mut self, i: usize, bound: Interval) {
        self.bounds[i] = bound;
    }

    /// Sets the scale of every argument at once.
    pub fn set_argument_scales(&mut self, scales: Vec<f64>) -> Result<(), ProblemError> {
        if scales.len() != self.dim() {
            return Err(ProblemError::DimensionMismatch {
                expected: self.dim(),
                found: scales.len(),
            });
        }

        self.scales = scales;
        Ok(())
    }

    /// Sets the starting point.
    ///
    /// The point can lie outside the argument bounds; whether that is
    /// acceptable is decided when the problem is dispatched (see
    /// [`Registry::solve`](crate::Registry::solve)).
    pub fn set_starting_point(&mut self, start: DVector<f64>) -> Result<(), ProblemError> {
        if start.nrows() != self.dim() {
            return Err(ProblemError::DimensionMismatch {
                expected: self.dim(),
                found: start.nrows(),
            });
        }

        self.start = Some(start);
        Ok(())
    }

    /// Gets the weakest tier over the cost and all constraint functions.
    ///
    /// This is the strongest tier a backend can require without being
    /// rejected for this problem.
    pub fn min_tier(&self) -> Tier {
        self.constraints
            .iter()
            .map(|c| c.function.tier())
            .fold(self.cost.tier(), Tier::min)
    }

    /// Gets the total number of constraint output components.
    pub fn outputs_total(&self) -> usize {
        self.constraints
            .iter()
            .map(|c| c.function.outputs())
            .sum()
    }

    /// Evaluates all constraints in given point into one flattened vector
    /// following the constraint order.
    ///
    /// The values are raw function outputs; constraint scales are not
    /// applied.
    pub fn eval_constraints(&self, x: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
        let mut values = Vec::with_capacity(self.outputs_total());

        for constraint in &self.constraints {
            let cx = constraint.function.value(x)?;
            values.extend(cx.iter().copied());
        }

        Ok(DVector::from_vec(values))
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    use nalgebra::{dmatrix, dvector};

    use crate::func::{Linear, Quadratic};

    fn sum_cost() -> TieredFn {
        TieredFn::hessian(Linear::new(dmatrix![1.0, 1.0], dvector![0.0]))
    }

    #[test]
    fn empty_problem() {
        let problem = Problem::new(sum_cost());

        assert_eq!(problem.dim(), 2);
        assert!(problem.constraints().is_empty());
        assert!(problem.starting_point().is_none());
        assert_eq!(problem.argument_scales(), &[1.0, 1.0]);
        assert!(problem.argument_bounds().iter().all(|b| !b.is_finite()));
    }

    #[test]
    #[should_panic]
    fn vector_valued_cost() {
        Problem::new(TieredFn::hessian(Linear::new(
            dmatrix![1.0, 0.0; 0.0, 1.0],
            dvector![0.0, 0.0],
        )));
    }

    #[test]
    fn constraint_order() {
        let mut problem = Problem::new(sum_cost());

        let first = Linear::new(dmatrix![1.0, -1.0], dvector![0.0]);
        let second = Linear::new(dmatrix![2.0, 0.0; 0.0, 2.0], dvector![0.0, 1.0]);

        problem
            .add_constraint(
                TieredFn::hessian(first),
                vec![Interval::fixed(0.0)],
                vec![1.0],
            )
            .unwrap();
        problem
            .add_constraint(
                TieredFn::hessian(second),
                vec![Interval::lower_bounded(0.0), Interval::unbounded()],
                vec![1.0, 0.5],
            )
            .unwrap();

        assert_eq!(problem.constraints().len(), 2);
        assert_eq!(problem.outputs_total(), 3);
        assert_eq!(problem.constraints()[1].scales(), &[1.0, 0.5]);

        let values = problem.eval_constraints(&dvector![3.0, 1.0]).unwrap();
        assert_eq!(values, dvector![2.0, 6.0, 3.0]);
    }

    #[test]
    fn rejected_constraint_leaves_problem_intact() {
        let mut problem = Problem::new(sum_cost());

        let wrong_dim = Linear::new(dmatrix![1.0, 1.0, 1.0], dvector![0.0]);
        assert_eq!(
            problem.add_constraint(
                TieredFn::hessian(wrong_dim),
                vec![Interval::fixed(0.0)],
                vec![1.0],
            ),
            Err(ProblemError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        );

        let wrong_shape = Linear::new(dmatrix![1.0, 1.0], dvector![0.0]);
        assert_eq!(
            problem.add_constraint(TieredFn::hessian(wrong_shape), vec![], vec![1.0]),
            Err(ProblemError::ShapeMismatch {
                outputs: 1,
                bounds: 0,
                scales: 1
            })
        );

        assert!(problem.constraints().is_empty());
    }

    #[test]
    fn starting_point_kept_on_error() {
        let mut problem = Problem::new(sum_cost());

        problem.set_starting_point(dvector![1.0, 2.0]).unwrap();
        assert_eq!(
            problem.set_starting_point(dvector![1.0, 2.0, 3.0]),
            Err(ProblemError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        );

        assert_eq!(problem.starting_point(), Some(&dvector![1.0, 2.0]));
    }

    #[test]
    fn argument_bounds_and_scales() {
        let mut problem = Problem::new(sum_cost());

        problem
            .set_argument_bounds(vec![Interval::new(0.0, 1.0), Interval::new(-1.0, 1.0)])
            .unwrap();
        problem.set_argument_bound(1, Interval::fixed(0.5));
        problem.set_argument_scales(vec![1.0, 10.0]).unwrap();

        assert_eq!(problem.argument_bounds()[1], Interval::fixed(0.5));
        assert_eq!(problem.argument_scales()[1], 10.0);

        assert!(matches!(
            problem.set_argument_bounds(vec![Interval::unbounded()]),
            Err(ProblemError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            problem.set_argument_scales(vec![1.0; 3]),
            Err(ProblemError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn weakest_tier() {
        let mut problem = Problem::new(sum_cost());
        assert_eq!(problem.min_tier(), Tier::Hessian);

        let q = Quadratic::new(dmatrix![2.0, 0.0; 0.0, 2.0], dvector![0.0, 0.0], 0.0);
        problem
            .add_constraint(
                TieredFn::gradient(q),
                vec![Interval::upper_bounded(1.0)],
                vec![1.0],
            )
            .unwrap();

        assert_eq!(problem.min_tier(), Tier::Gradient);
    }
}

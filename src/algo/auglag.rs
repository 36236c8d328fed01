//! Augmented Lagrangian method for constrained minimization.
//!
//! The method folds the constraints into a merit function made of the cost,
//! linear multiplier terms and quadratic penalty terms, and repeatedly
//! minimizes that merit inside the argument bounds with
//! [`NelderMead`](crate::algo::NelderMead). After every inner minimization the
//! multiplier estimates are refreshed from the constraint values and the
//! penalty grows whenever feasibility stops improving. Inequality terms follow
//! the Powell-Hestenes-Rockafellar formulation, which keeps the merit smooth
//! across the constraint boundary.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Practical Augmented Lagrangian
//! Methods](https://epubs.siam.org/doi/book/10.1137/1.9781611973365)

use getset::{CopyGetters, Setters};
use log::{debug, warn};
use nalgebra::DVector;

use crate::core::{
    Backend, BoundsExt, Config, Function, Problem, Solution, SolverResult, Tier, Value,
};

use super::nelder_mead::{NelderMead, NelderMeadError};

/// Options for [`AugLag`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct AugLagOptions {
    /// Maximum number of outer iterations. Default: `50`.
    max_outer: usize,
    /// Maximum number of inner minimization iterations per outer iteration.
    /// Default: `400`.
    inner_iters: usize,
    /// Maximum scaled constraint violation accepted as feasible. Default:
    /// `1e-6`.
    feasibility_tolerance: f64,
    /// Initial penalty. Default: `10`.
    penalty_init: f64,
    /// Factor by which the penalty grows when feasibility stops improving.
    /// Default: `10`.
    penalty_growth: f64,
    /// Upper limit on the penalty. Default: `1e8`.
    penalty_max: f64,
}

impl Default for AugLagOptions {
    fn default() -> Self {
        Self {
            max_outer: 50,
            inner_iters: 400,
            feasibility_tolerance: 1e-6,
            penalty_init: 10.0,
            penalty_growth: 10.0,
            penalty_max: 1e8,
        }
    }
}

/// Augmented Lagrangian backend.
///
/// This is the reference [`Backend`] of the crate. It requires plain
/// evaluation only (see [`Tier::Value`]), so any problem passes its
/// capability check. A starting point is mandatory; a point lying outside the
/// argument bounds is projected onto them before the first iteration.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone)]
pub struct AugLag {
    options: AugLagOptions,
}

impl AugLag {
    /// Name under which the backend is registered.
    pub const NAME: &'static str = "auglag";

    /// Initializes the backend with default options.
    pub fn new() -> Self {
        Self::with_options(AugLagOptions::default())
    }

    /// Initializes the backend with given options.
    pub fn with_options(options: AugLagOptions) -> Self {
        Self { options }
    }

    /// Initializes the backend from configuration parameters.
    ///
    /// Unknown keys and values of an unexpected type or outside the valid
    /// range are reported through a log warning and ignored.
    pub fn from_config(config: &Config) -> Self {
        let mut options = AugLagOptions::default();

        for (key, value) in config.iter() {
            match (key, value) {
                ("max_outer", Value::Int(v)) if *v > 0 => options.max_outer = *v as usize,
                ("inner_iters", Value::Int(v)) if *v > 0 => options.inner_iters = *v as usize,
                ("feasibility_tolerance", Value::Float(v)) if *v > 0.0 => {
                    options.feasibility_tolerance = *v
                }
                ("penalty_init", Value::Float(v)) if *v > 0.0 => options.penalty_init = *v,
                ("penalty_growth", Value::Float(v)) if *v > 1.0 => options.penalty_growth = *v,
                ("penalty_max", Value::Float(v)) if *v > 0.0 => options.penalty_max = *v,
                _ => warn!("ignoring configuration entry {} = {}", key, value),
            }
        }

        Self::with_options(options)
    }

    /// Gets the options of the backend.
    pub fn options(&self) -> &AugLagOptions {
        &self.options
    }
}

impl Default for AugLag {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for AugLag {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_tier(&self) -> Tier {
        Tier::Value
    }

    fn solve(&mut self, problem: &Problem) -> SolverResult {
        let mut x = match problem.starting_point() {
            Some(start) => start.clone_owned(),
            None => return SolverResult::Error("no starting point provided".to_string()),
        };

        let bounds = problem.argument_bounds();
        let options = &self.options;

        if bounds.project(&mut x) {
            debug!("starting point moved into the argument bounds");
        }

        let mut multipliers = vec![Multipliers::default(); problem.outputs_total()];
        let mut values = DVector::zeros(problem.outputs_total());
        let mut penalty = options.penalty_init;
        let mut last_violation = f64::INFINITY;

        for outer in 0..options.max_outer {
            // The merit changed, so the simplex has to be rebuilt. Restarts
            // after the first outer iteration happen near the sought point
            // and use reduced steps.
            let mut nelder_mead = if outer == 0 {
                NelderMead::new(bounds)
            } else {
                NelderMead::new(bounds).with_step_scale(0.1)
            };

            let f = |x: &DVector<f64>| merit(problem, &multipliers, penalty, x);

            for _ in 0..options.inner_iters {
                match nelder_mead.next(&f, bounds, &mut x) {
                    Ok(_) => {}
                    Err(NelderMeadError::SimplexCollapsed) => break,
                    Err(error) => {
                        return SolverResult::Error(format!(
                            "inner minimization failed: {}",
                            error
                        ))
                    }
                }
            }

            let violation = update_multipliers(problem, &mut multipliers, penalty, &x, &mut values);

            debug!(
                "outer iteration {}:\tmax violation = {:e},\tpenalty = {:e}",
                outer, violation, penalty
            );

            if violation <= options.feasibility_tolerance {
                return SolverResult::Solution(build_solution(problem, x, values, &multipliers));
            }

            if violation > 0.25 * last_violation {
                penalty = (penalty * options.penalty_growth).min(options.penalty_max);
            }
            last_violation = violation;
        }

        if last_violation <= options.feasibility_tolerance.sqrt() {
            let warning = format!(
                "feasibility tolerance not met: max constraint violation {:e} after {} outer iterations",
                last_violation, options.max_outer
            );
            let solution = build_solution(problem, x, values, &multipliers);
            SolverResult::SolutionWithWarnings(solution, vec![warning])
        } else {
            SolverResult::NoSolution
        }
    }
}

/// Multiplier estimates of one constraint output component.
///
/// An equality keeps one unrestricted multiplier. An inequality keeps one
/// nonnegative multiplier per finite side. The multiplier reported in the
/// solution is `equality + lower - upper`.
#[derive(Debug, Clone, Copy, Default)]
struct Multipliers {
    equality: f64,
    lower: f64,
    upper: f64,
}

fn merit(problem: &Problem, multipliers: &[Multipliers], penalty: f64, x: &DVector<f64>) -> f64 {
    let mut out = DVector::zeros(1);
    problem.cost().eval(x, &mut out);
    let mut total = out[0];

    let mut k = 0;
    for constraint in problem.constraints() {
        let mut cx = DVector::zeros(constraint.function().outputs());
        constraint.function().eval(x, &mut cx);

        for i in 0..cx.nrows() {
            let bound = constraint.bounds()[i];
            let scale = constraint.scales()[i];
            let m = multipliers[k];

            if bound.is_equality() {
                let h = scale * (cx[i] - bound.lower());
                total += m.equality * h + 0.5 * penalty * h * h;
            } else {
                if bound.lower().is_finite() {
                    total += phr(scale * (cx[i] - bound.lower()), m.lower, penalty);
                }
                if bound.upper().is_finite() {
                    total += phr(scale * (bound.upper() - cx[i]), m.upper, penalty);
                }
            }

            k += 1;
        }
    }

    total
}

// Shifted quadratic penalty of one inequality g >= 0. Smooth in g, reduces to
// the plain quadratic penalty for zero multiplier.
fn phr(g: f64, lambda: f64, penalty: f64) -> f64 {
    let active = (lambda - penalty * g).max(0.0);
    (active * active - lambda * lambda) / (2.0 * penalty)
}

// First-order multiplier update in given point. Fills `values` with the raw
// constraint values and returns the maximum scaled violation.
fn update_multipliers(
    problem: &Problem,
    multipliers: &mut [Multipliers],
    penalty: f64,
    x: &DVector<f64>,
    values: &mut DVector<f64>,
) -> f64 {
    let mut violation = 0.0f64;

    let mut k = 0;
    for constraint in problem.constraints() {
        let mut cx = DVector::zeros(constraint.function().outputs());
        constraint.function().eval(x, &mut cx);

        for i in 0..cx.nrows() {
            let bound = constraint.bounds()[i];
            let scale = constraint.scales()[i];
            let m = &mut multipliers[k];

            if bound.is_equality() {
                let h = scale * (cx[i] - bound.lower());
                m.equality += penalty * h;
                violation = violation.max(h.abs());
            } else {
                if bound.lower().is_finite() {
                    let g = scale * (cx[i] - bound.lower());
                    m.lower = (m.lower - penalty * g).max(0.0);
                    violation = violation.max(-g);
                }
                if bound.upper().is_finite() {
                    let g = scale * (bound.upper() - cx[i]);
                    m.upper = (m.upper - penalty * g).max(0.0);
                    violation = violation.max(-g);
                }
            }

            values[k] = cx[i];
            k += 1;
        }
    }

    violation
}

fn build_solution(
    problem: &Problem,
    x: DVector<f64>,
    values: DVector<f64>,
    multipliers: &[Multipliers],
) -> Solution {
    let mut out = DVector::zeros(1);
    problem.cost().eval(&x, &mut out);

    let solution = Solution::new(x, out[0]);

    if multipliers.is_empty() {
        solution
    } else {
        let net = DVector::from_iterator(
            multipliers.len(),
            multipliers.iter().map(|m| m.equality + m.lower - m.upper),
        );

        solution.with_constraints(values).with_multipliers(net)
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    use crate::core::{Differentiable, Interval, TieredFn};
    use crate::func::{Linear, Quadratic};
    use crate::testing::{self, Sphere};

    fn norm_squared_cost() -> TieredFn {
        TieredFn::hessian(Quadratic::new(
            dmatrix![2.0, 0.0; 0.0, 2.0],
            dvector![0.0, 0.0],
            0.0,
        ))
    }

    #[test]
    fn equality_constraint() {
        let mut problem = Problem::new(norm_squared_cost());
        problem
            .add_constraint(
                TieredFn::hessian(Linear::new(dmatrix![1.0, 1.0], dvector![0.0])),
                vec![Interval::fixed(1.0)],
                vec![1.0],
            )
            .unwrap();
        problem.set_starting_point(dvector![0.0, 0.0]).unwrap();

        let result = AugLag::new().solve(&problem);
        let solution = result.solution().unwrap();

        assert_abs_diff_eq!(solution.x()[0], 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.x()[1], 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.value(), 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.multipliers().unwrap()[0], -1.0, epsilon = 0.05);
    }

    #[test]
    fn inequality_constraint() {
        let mut problem = Problem::new(norm_squared_cost());
        problem
            .add_constraint(
                TieredFn::hessian(Linear::new(dmatrix![1.0, 0.0], dvector![0.0])),
                vec![Interval::lower_bounded(1.0)],
                vec![1.0],
            )
            .unwrap();
        problem.set_starting_point(dvector![0.0, 0.0]).unwrap();

        let result = AugLag::new().solve(&problem);
        let solution = result.solution().unwrap();

        assert_abs_diff_eq!(solution.x()[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.x()[1], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.value(), 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.constraints().unwrap()[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.multipliers().unwrap()[0], 2.0, epsilon = 0.05);
    }

    #[test]
    fn bounds_only() {
        let mut problem = Problem::new(TieredFn::hessian(Sphere::new(2)));
        problem
            .set_argument_bounds(vec![Interval::new(1.0, 5.0); 2])
            .unwrap();
        problem.set_starting_point(dvector![3.0, 3.0]).unwrap();

        let result = AugLag::new().solve(&problem);

        assert!(matches!(result, SolverResult::Solution(_)));
        let solution = result.solution().unwrap();

        assert_abs_diff_eq!(solution.x()[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.x()[1], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(solution.value(), 2.0, epsilon = 1e-3);
        assert!(solution.constraints().is_none());
        assert!(solution.multipliers().is_none());
    }

    #[test]
    fn hs71() {
        let problem = testing::hs71_problem();

        match AugLag::new().solve(&problem) {
            SolverResult::Solution(solution) | SolverResult::SolutionWithWarnings(solution, _) => {
                let x = solution.x();
                assert!(problem.argument_bounds().contains_point(x));

                let outputs = problem.eval_constraints(x).unwrap();
                let violation = problem
                    .constraints()
                    .iter()
                    .flat_map(|constraint| constraint.bounds().iter())
                    .zip(outputs.iter())
                    .map(|(bound, output)| bound.violation(*output))
                    .fold(0.0, f64::max);

                assert!(violation <= 1e-3, "max violation {:e}", violation);
                assert_abs_diff_eq!(solution.value(), 17.0140173, epsilon = 0.05);
            }
            result => panic!("unexpected result: {}", result),
        }
    }

    #[test]
    fn missing_starting_point() {
        let problem = Problem::new(norm_squared_cost());

        match AugLag::new().solve(&problem) {
            SolverResult::Error(message) => assert!(message.contains("starting point")),
            result => panic!("unexpected result: {}", result),
        }
    }

    #[test]
    fn near_feasibility_reported_as_warning() {
        // With a single outer iteration and initial penalty 10, the merit
        // minimum lies at (5/11, 5/11) and the equality is violated by 1/11.
        // That is over the tolerance 0.01, but within its square root.
        let mut problem = Problem::new(norm_squared_cost());
        problem
            .add_constraint(
                TieredFn::hessian(Linear::new(dmatrix![1.0, 1.0], dvector![0.0])),
                vec![Interval::fixed(1.0)],
                vec![1.0],
            )
            .unwrap();
        problem.set_starting_point(dvector![0.0, 0.0]).unwrap();

        let mut options = AugLagOptions::default();
        options.set_max_outer(1);
        options.set_feasibility_tolerance(0.01);

        match AugLag::with_options(options).solve(&problem) {
            SolverResult::SolutionWithWarnings(solution, warnings) => {
                assert_abs_diff_eq!(solution.x()[0], 5.0 / 11.0, epsilon = 1e-3);
                assert_eq!(warnings.len(), 1);
                assert!(warnings[0].contains("feasibility tolerance not met"));
            }
            result => panic!("unexpected result: {}", result),
        }
    }

    #[test]
    fn infeasible_problem() {
        // The equality x = 2 cannot be met inside the bounds [0, 1].
        let mut problem = Problem::new(TieredFn::hessian(Quadratic::new(
            dmatrix![2.0],
            dvector![0.0],
            0.0,
        )));
        problem
            .add_constraint(
                TieredFn::hessian(Linear::new(dmatrix![1.0], dvector![0.0])),
                vec![Interval::fixed(2.0)],
                vec![1.0],
            )
            .unwrap();
        problem
            .set_argument_bounds(vec![Interval::new(0.0, 1.0)])
            .unwrap();
        problem.set_starting_point(dvector![0.5]).unwrap();

        let mut options = AugLagOptions::default();
        options.set_max_outer(5);

        let result = AugLag::with_options(options).solve(&problem);
        assert!(matches!(result, SolverResult::NoSolution));
    }

    #[test]
    fn undefined_cost() {
        struct Undefined;

        impl Function for Undefined {
            fn dim(&self) -> usize {
                1
            }

            fn outputs(&self) -> usize {
                1
            }

            fn eval(&self, _x: &DVector<f64>, out: &mut DVector<f64>) {
                out[0] = f64::NAN;
            }
        }

        impl Differentiable for Undefined {
            fn gradient(&self, _x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
                out[0] = f64::NAN;
            }
        }

        let mut problem = Problem::new(TieredFn::gradient(Undefined));
        problem.set_starting_point(dvector![0.0]).unwrap();

        match AugLag::new().solve(&problem) {
            SolverResult::Error(message) => assert!(message.contains("invalid")),
            result => panic!("unexpected result: {}", result),
        }
    }

    #[test]
    fn configuration() {
        let config = Config::new()
            .with("max_outer", 5)
            .with("feasibility_tolerance", 1e-3)
            .with("penalty_init", 100)
            .with("verbosity", "high");

        let auglag = AugLag::from_config(&config);

        assert_eq!(auglag.name(), AugLag::NAME);
        assert_eq!(auglag.required_tier(), Tier::Value);
        assert_eq!(auglag.options().max_outer(), 5);
        assert_eq!(auglag.options().feasibility_tolerance(), 1e-3);
        // An integer where a float is expected is ignored.
        assert_eq!(auglag.options().penalty_init(), 10.0);
    }
}

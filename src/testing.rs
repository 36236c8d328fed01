//! Testing functions and problems useful for benchmarking, debugging and
//! smoke testing.
//!
//! [`Sphere`] is recommended for first tests. [`hs71_problem`] builds the
//! classic constrained benchmark that exercises every part of problem
//! composition: an inequality, an equality and argument bounds.
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Test Examples for Nonlinear Programming
//! Codes](https://link.springer.com/book/10.1007/978-3-642-48320-2)

use approx::abs_diff_eq;
use nalgebra::{dvector, DMatrix, DVector};

use crate::core::{Differentiable, Function, Interval, Problem, TieredFn, TwiceDifferentiable};

/// Extension of the [`Function`] trait for functions whose global minima are
/// known, which is useful for checking backend results.
pub trait TestFunction: Function {
    /// Known global minimum points. This is mostly just for information, for
    /// example to know how close a backend got even if it failed. For testing
    /// whether a given point is a minimum, [`TestFunction::is_minimum`]
    /// should be used.
    fn minima(&self) -> Vec<DVector<f64>>;

    /// Tests if given point lies within the tolerance `eps` of a known
    /// minimum.
    fn is_minimum(&self, x: &DVector<f64>, eps: f64) -> bool {
        self.minima()
            .iter()
            .any(|minimum| abs_diff_eq!(x, minimum, epsilon = eps))
    }
}

/// [Sphere
/// function](https://en.wikipedia.org/wiki/Test_functions_for_optimization)
/// \[1\].
///
/// This is a simple paraboloid which can be used in early development and
/// sanity checking as it can be considered a trivial problem.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    n: usize,
}

impl Sphere {
    /// Initializes the function with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        Self { n }
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Function for Sphere {
    fn dim(&self) -> usize {
        self.n
    }

    fn outputs(&self) -> usize {
        1
    }

    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        out[0] = x.norm_squared();
    }
}

impl Differentiable for Sphere {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        out.copy_from(x);
        *out *= 2.0;
    }
}

impl TwiceDifferentiable for Sphere {
    fn hessian(&self, _x: &DVector<f64>, _row: usize, out: &mut DMatrix<f64>) {
        out.fill(0.0);
        out.fill_diagonal(2.0);
    }
}

impl TestFunction for Sphere {
    fn minima(&self) -> Vec<DVector<f64>> {
        vec![DVector::zeros(self.n)]
    }
}

/// [Rosenbrock
/// function](https://en.wikipedia.org/wiki/Rosenbrock_function) \[1\] (also
/// known as Rosenbrock's valley or banana function).
///
/// The minimum 0 in (1, 1) is inside a long, narrow, parabolic shaped flat
/// valley. The challenge is to find the solution inside the valley.
#[derive(Debug, Clone, Copy)]
pub struct Rosenbrock;

impl Function for Rosenbrock {
    fn dim(&self) -> usize {
        2
    }

    fn outputs(&self) -> usize {
        1
    }

    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        out[0] = (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2);
    }
}

impl Differentiable for Rosenbrock {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        out[0] = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0].powi(2));
        out[1] = 200.0 * (x[1] - x[0].powi(2));
    }
}

impl TwiceDifferentiable for Rosenbrock {
    fn hessian(&self, x: &DVector<f64>, _row: usize, out: &mut DMatrix<f64>) {
        out[(0, 0)] = 2.0 - 400.0 * x[1] + 1200.0 * x[0].powi(2);
        out[(0, 1)] = -400.0 * x[0];
        out[(1, 0)] = -400.0 * x[0];
        out[(1, 1)] = 200.0;
    }
}

impl TestFunction for Rosenbrock {
    fn minima(&self) -> Vec<DVector<f64>> {
        vec![dvector![1.0, 1.0]]
    }
}

/// Cost function of [`hs71_problem`].
#[derive(Debug, Clone, Copy)]
pub struct Hs71Cost;

impl Function for Hs71Cost {
    fn dim(&self) -> usize {
        4
    }

    fn outputs(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "x₀x₃(x₀ + x₁ + x₂) + x₂"
    }

    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        out[0] = x[0] * x[3] * (x[0] + x[1] + x[2]) + x[2];
    }
}

impl Differentiable for Hs71Cost {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        out[0] = x[3] * (2.0 * x[0] + x[1] + x[2]);
        out[1] = x[0] * x[3];
        out[2] = x[0] * x[3] + 1.0;
        out[3] = x[0] * (x[0] + x[1] + x[2]);
    }
}

impl TwiceDifferentiable for Hs71Cost {
    fn hessian(&self, x: &DVector<f64>, _row: usize, out: &mut DMatrix<f64>) {
        out.fill(0.0);

        out[(0, 0)] = 2.0 * x[3];
        out[(0, 1)] = x[3];
        out[(1, 0)] = x[3];
        out[(0, 2)] = x[3];
        out[(2, 0)] = x[3];
        out[(0, 3)] = 2.0 * x[0] + x[1] + x[2];
        out[(3, 0)] = 2.0 * x[0] + x[1] + x[2];
        out[(1, 3)] = x[0];
        out[(3, 1)] = x[0];
        out[(2, 3)] = x[0];
        out[(3, 2)] = x[0];
    }
}

/// Product constraint function of [`hs71_problem`].
#[derive(Debug, Clone, Copy)]
pub struct Hs71WeightedProduct;

impl Function for Hs71WeightedProduct {
    fn dim(&self) -> usize {
        4
    }

    fn outputs(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "x₀x₁x₂x₃"
    }

    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        out[0] = x[0] * x[1] * x[2] * x[3];
    }
}

impl Differentiable for Hs71WeightedProduct {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        out[0] = x[1] * x[2] * x[3];
        out[1] = x[0] * x[2] * x[3];
        out[2] = x[0] * x[1] * x[3];
        out[3] = x[0] * x[1] * x[2];
    }
}

impl TwiceDifferentiable for Hs71WeightedProduct {
    fn hessian(&self, x: &DVector<f64>, _row: usize, out: &mut DMatrix<f64>) {
        out.fill(0.0);

        out[(0, 1)] = x[2] * x[3];
        out[(1, 0)] = x[2] * x[3];
        out[(0, 2)] = x[1] * x[3];
        out[(2, 0)] = x[1] * x[3];
        out[(0, 3)] = x[1] * x[2];
        out[(3, 0)] = x[1] * x[2];
        out[(1, 2)] = x[0] * x[3];
        out[(2, 1)] = x[0] * x[3];
        out[(1, 3)] = x[0] * x[2];
        out[(3, 1)] = x[0] * x[2];
        out[(2, 3)] = x[0] * x[1];
        out[(3, 2)] = x[0] * x[1];
    }
}

/// Squared norm constraint function of [`hs71_problem`].
#[derive(Debug, Clone, Copy)]
pub struct Hs71SquaredNorm;

impl Function for Hs71SquaredNorm {
    fn dim(&self) -> usize {
        4
    }

    fn outputs(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "x₀² + x₁² + x₂² + x₃²"
    }

    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        out[0] = x.norm_squared();
    }
}

impl Differentiable for Hs71SquaredNorm {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        out.copy_from(x);
        *out *= 2.0;
    }
}

impl TwiceDifferentiable for Hs71SquaredNorm {
    fn hessian(&self, _x: &DVector<f64>, _row: usize, out: &mut DMatrix<f64>) {
        out.fill(0.0);
        out.fill_diagonal(2.0);
    }
}

/// Problem 71 from the Hock-Schittkowski collection \[2\].
///
/// ```text
/// min  x0 x3 (x0 + x1 + x2) + x2
/// s.t. x0 x1 x2 x3 >= 25
///      x0^2 + x1^2 + x2^2 + x3^2 = 40
///      1 <= x <= 5
/// ```
///
/// The known minimum is 17.0140173 in (1.0, 4.74299963, 3.82114998,
/// 1.37940829). The standard starting point (1, 5, 5, 1) satisfies the
/// bounds and the inequality, but violates the equality; its cost 16
/// undercuts the constrained minimum.
pub fn hs71_problem() -> Problem {
    let mut problem = Problem::new(TieredFn::hessian(Hs71Cost));

    problem
        .add_constraint(
            TieredFn::hessian(Hs71WeightedProduct),
            vec![Interval::lower_bounded(25.0)],
            vec![1.0],
        )
        .unwrap();
    problem
        .add_constraint(
            TieredFn::hessian(Hs71SquaredNorm),
            vec![Interval::fixed(40.0)],
            vec![1.0],
        )
        .unwrap();

    problem
        .set_argument_bounds(vec![Interval::new(1.0, 5.0); 4])
        .unwrap();
    problem
        .set_starting_point(dvector![1.0, 5.0, 5.0, 1.0])
        .unwrap();

    problem
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    use nalgebra::dvector;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::core::{BoundsExt, FunctionExt, Tier};
    use crate::derivatives::{check_hessian, check_jacobian};

    #[test]
    fn minima() {
        assert_eq!(
            Sphere::new(3).value(&dvector![0.0, 0.0, 0.0]).unwrap()[0],
            0.0
        );
        assert_eq!(Rosenbrock.value(&dvector![1.0, 1.0]).unwrap()[0], 0.0);

        assert!(Sphere::new(3).is_minimum(&dvector![1e-5, 0.0, -1e-5], 1e-4));
        assert!(Rosenbrock.is_minimum(&dvector![1.0, 1.0], 1e-4));
        assert!(!Rosenbrock.is_minimum(&dvector![-1.2, 1.0], 1e-4));
    }

    #[test]
    fn analytic_derivatives_agree_with_estimates() {
        let x = dvector![1.0, -2.0, 0.5];
        check_jacobian(&Sphere::new(3), &x, 1e-4).unwrap();
        check_hessian(&Sphere::new(3), &x, 0, 1e-3).unwrap();

        let x = dvector![-1.2, 1.0];
        check_jacobian(&Rosenbrock, &x, 1e-4).unwrap();
        check_hessian(&Rosenbrock, &x, 0, 1e-3).unwrap();
    }

    #[test]
    fn hessians_are_symmetric_at_random_points() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = [Interval::new(-5.0, 5.0); 2];
        let mut x = DVector::zeros(2);

        for _ in 0..100 {
            bounds.sample(&mut x, &mut rng);

            let h = Sphere::default().hess(&x, 0).unwrap();
            assert_eq!(h, h.transpose());

            let h = Rosenbrock.hess(&x, 0).unwrap();
            assert_eq!(h, h.transpose());
        }
    }

    #[test]
    fn hs71_values_at_starting_point() {
        let x = dvector![1.0, 5.0, 5.0, 1.0];

        assert_eq!(Hs71Cost.value(&x).unwrap()[0], 16.0);
        assert_eq!(Hs71WeightedProduct.value(&x).unwrap()[0], 25.0);
        assert_eq!(Hs71SquaredNorm.value(&x).unwrap()[0], 52.0);

        assert_eq!(
            Hs71Cost.grad(&x, 0).unwrap(),
            dvector![12.0, 1.0, 2.0, 11.0]
        );
    }

    #[test]
    fn hs71_derivatives_at_random_points() {
        let mut rng = StdRng::seed_from_u64(3);
        let bounds = [Interval::new(1.0, 5.0); 4];
        let mut x = DVector::zeros(4);

        for _ in 0..100 {
            bounds.sample(&mut x, &mut rng);

            check_jacobian(&Hs71Cost, &x, 1e-4).unwrap();
            check_jacobian(&Hs71WeightedProduct, &x, 1e-4).unwrap();
            check_jacobian(&Hs71SquaredNorm, &x, 1e-4).unwrap();

            check_hessian(&Hs71Cost, &x, 0, 1e-3).unwrap();
            check_hessian(&Hs71WeightedProduct, &x, 0, 1e-3).unwrap();
            check_hessian(&Hs71SquaredNorm, &x, 0, 1e-3).unwrap();
        }
    }

    #[test]
    fn hs71_problem_assembly() {
        let problem = hs71_problem();

        assert_eq!(problem.dim(), 4);
        assert_eq!(problem.outputs_total(), 2);
        assert_eq!(problem.min_tier(), Tier::Hessian);

        let start = problem.starting_point().unwrap();
        assert!(problem.argument_bounds().contains_point(start));
        assert_eq!(
            problem.eval_constraints(start).unwrap(),
            dvector![25.0, 52.0]
        );

        assert_eq!(problem.constraints()[0].bounds()[0].lower(), 25.0);
        assert!(problem.constraints()[1].bounds()[0].is_equality());
    }
}

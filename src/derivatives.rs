//! Finite-difference estimation and verification of derivatives.
//!
//! The estimators in this module approximate gradients, Jacobian and Hessian
//! matrices of a [`Function`] from values only. The checkers compare analytic
//! derivatives declared through [`Differentiable`] and
//! [`TwiceDifferentiable`] against these estimates, which is the standard way
//! to catch a miscomputed derivative before handing a problem to a backend.

use std::ops::Deref;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::core::{Differentiable, Function, TwiceDifferentiable};

/// Square root of double precision machine epsilon. This value is a standard
/// constant for epsilons in approximating first-order derivative-based
/// concepts.
pub const EPSILON_SQRT: f64 = 0.000000014901161193847656;

/// Cubic root of double precision machine epsilon. This value is a standard
/// constant for epsilons in approximating second-order derivative-based
/// concepts.
pub const EPSILON_CBRT: f64 = 0.0000060554544523933395;

fn step_size(eps: f64, xi: f64, magnitude: f64) -> f64 {
    // We would like to have the step as small as possible (to be as close to
    // the real derivative as possible). But at the same time, a very small
    // step could cause F(x + e_i * step_i) ~= F(x) with a very small number
    // of good digits.
    //
    // A reasonable way to balance these competing needs is to scale the step
    // by x_i itself. To avoid problems when x_i is close to zero, it is
    // modified to take the typical magnitude instead.
    let step = eps * xi.abs().max(magnitude) * 1f64.copysign(xi);
    if step == 0.0 {
        eps
    } else {
        step
    }
}

fn component<F: Function + ?Sized>(f: &F, x: &DVector<f64>, row: usize, out: &mut DVector<f64>) -> f64 {
    f.eval(x, out);
    out[row]
}

/// Gradient estimate of one output component of a function.
#[derive(Debug)]
pub struct Gradient {
    grad: DVector<f64>,
    out: DVector<f64>,
}

impl Gradient {
    /// Initializes the gradient vector with zeros.
    pub fn zeros<F: Function + ?Sized>(f: &F) -> Self {
        Self {
            grad: DVector::zeros(f.dim()),
            out: DVector::zeros(f.outputs()),
        }
    }

    /// Estimates the gradient of output component `row` of the function in
    /// given point with given magnitudes of variables. See
    /// [`compute`](Gradient::compute) for more details.
    pub fn new<F: Function + ?Sized>(
        f: &F,
        x: &mut DVector<f64>,
        magnitude: &DVector<f64>,
        row: usize,
        fx: f64,
    ) -> Self {
        let mut grad = Self::zeros(f);
        grad.compute(f, x, magnitude, row, fx);
        grad
    }

    /// Estimates the gradient of output component `row` of the function in
    /// given point with given magnitudes of variables.
    ///
    /// The parameter `x` is mutable to allow temporary mutations avoiding
    /// unnecessary allocations, but after this method ends, the content of
    /// the vector is exactly the same as before. `fx` must be the value of
    /// component `row` in `x`.
    pub fn compute<F: Function + ?Sized>(
        &mut self,
        f: &F,
        x: &mut DVector<f64>,
        magnitude: &DVector<f64>,
        row: usize,
        fx: f64,
    ) -> &mut Self {
        for i in 0..f.dim() {
            let xi = x[i];
            let step = step_size(EPSILON_SQRT, xi, magnitude[i]);

            // Update the point.
            x[i] = xi + step;
            let fxi = component(f, x, row, &mut self.out);

            // grad[i] = (F(x + e_i * step_i) - F(x)) / step_i.
            self.grad[i] = (fxi - fx) / step;

            // Restore the original value.
            x[i] = xi;
        }

        self
    }
}

impl Deref for Gradient {
    type Target = DVector<f64>;

    fn deref(&self) -> &Self::Target {
        &self.grad
    }
}

/// Jacobian matrix estimate of a function.
#[derive(Debug)]
pub struct Jacobian {
    jac: DMatrix<f64>,
    out: DVector<f64>,
}

impl Jacobian {
    /// Initializes the Jacobian matrix with zeros.
    pub fn zeros<F: Function + ?Sized>(f: &F) -> Self {
        Self {
            jac: DMatrix::zeros(f.outputs(), f.dim()),
            out: DVector::zeros(f.outputs()),
        }
    }

    /// Estimates the Jacobian matrix of the function in given point with
    /// given magnitudes of variables. See [`compute`](Jacobian::compute) for
    /// more details.
    pub fn new<F: Function + ?Sized>(
        f: &F,
        x: &mut DVector<f64>,
        magnitude: &DVector<f64>,
        fx: &DVector<f64>,
    ) -> Self {
        let mut jac = Self::zeros(f);
        jac.compute(f, x, magnitude, fx);
        jac
    }

    /// Estimates the Jacobian matrix of the function in given point with
    /// given magnitudes of variables.
    ///
    /// The parameter `x` is mutable to allow temporary mutations avoiding
    /// unnecessary allocations, but after this method ends, the content of
    /// the vector is exactly the same as before. `fx` must be the function
    /// output in `x`.
    pub fn compute<F: Function + ?Sized>(
        &mut self,
        f: &F,
        x: &mut DVector<f64>,
        magnitude: &DVector<f64>,
        fx: &DVector<f64>,
    ) -> &mut Self {
        for j in 0..f.dim() {
            let xj = x[j];
            let step = step_size(EPSILON_SQRT, xj, magnitude[j]);

            // Update the point.
            x[j] = xj + step;
            f.eval(x, &mut self.out);

            // J[.., j] = (F(x + e_j * step_j) - F(x)) / step_j.
            self.out -= fx;
            self.out /= step;
            self.jac.column_mut(j).copy_from(&self.out);

            // Restore the original value.
            x[j] = xj;
        }

        self
    }
}

impl Deref for Jacobian {
    type Target = DMatrix<f64>;

    fn deref(&self) -> &Self::Target {
        &self.jac
    }
}

/// Hessian matrix estimate of one output component of a function.
#[derive(Debug)]
pub struct Hessian {
    hes: DMatrix<f64>,
    steps: DVector<f64>,
    neighbors: DVector<f64>,
    out: DVector<f64>,
}

impl Hessian {
    /// Initializes the Hessian matrix with zeros.
    pub fn zeros<F: Function + ?Sized>(f: &F) -> Self {
        Self {
            hes: DMatrix::zeros(f.dim(), f.dim()),
            steps: DVector::zeros(f.dim()),
            neighbors: DVector::zeros(f.dim()),
            out: DVector::zeros(f.outputs()),
        }
    }

    /// Estimates the Hessian matrix of output component `row` of the function
    /// in given point with given magnitudes of variables. See
    /// [`compute`](Hessian::compute) for more details.
    pub fn new<F: Function + ?Sized>(
        f: &F,
        x: &mut DVector<f64>,
        magnitude: &DVector<f64>,
        row: usize,
        fx: f64,
    ) -> Self {
        let mut hes = Self::zeros(f);
        hes.compute(f, x, magnitude, row, fx);
        hes
    }

    /// Estimates the Hessian matrix of output component `row` of the function
    /// in given point with given magnitudes of variables.
    ///
    /// The parameter `x` is mutable to allow temporary mutations avoiding
    /// unnecessary allocations, but after this method ends, the content of
    /// the vector is exactly the same as before. `fx` must be the value of
    /// component `row` in `x`.
    pub fn compute<F: Function + ?Sized>(
        &mut self,
        f: &F,
        x: &mut DVector<f64>,
        magnitude: &DVector<f64>,
        row: usize,
        fx: f64,
    ) -> &mut Self {
        for i in 0..f.dim() {
            let xi = x[i];
            let step = step_size(EPSILON_CBRT, xi, magnitude[i]);

            // Store the steps and neighboring values for the difference
            // scheme below.
            self.steps[i] = step;

            x[i] = xi + step;
            self.neighbors[i] = component(f, x, row, &mut self.out);
            x[i] = xi;
        }

        for i in 0..f.dim() {
            let xi = x[i];
            let stepi = self.steps[i];

            // Prepare x + 2 * e_i * step_i.
            x[i] = xi + stepi + stepi;

            let fxi = component(f, x, row, &mut self.out);
            let fni = self.neighbors[i];

            x[i] = xi + stepi;

            self.hes[(i, i)] = ((fx - fni) + (fxi - fni)) / (stepi * stepi);

            for j in (i + 1)..f.dim() {
                let xj = x[j];
                let stepj = self.steps[j];

                x[j] = xj + stepj;

                let fxj = component(f, x, row, &mut self.out);
                let fnj = self.neighbors[j];

                let hij = ((fx - fni) + (fxj - fnj)) / (stepi * stepj);
                self.hes[(i, j)] = hij;
                self.hes[(j, i)] = hij;

                x[j] = xj;
            }

            x[i] = xi;
        }

        self
    }
}

impl Deref for Hessian {
    type Target = DMatrix<f64>;

    fn deref(&self) -> &Self::Target {
        &self.hes
    }
}

/// Disagreement between an analytic gradient and its finite-difference
/// estimate (see [`check_gradient`] and [`check_jacobian`]).
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "bad gradient of output {row}: component {component} is {analytic}, \
     finite differences give {estimate} (tolerance {tolerance})"
)]
pub struct BadGradient {
    /// Output component whose gradient disagrees.
    pub row: usize,
    /// Gradient component where the disagreement was found.
    pub component: usize,
    /// The value declared by the function.
    pub analytic: f64,
    /// The finite-difference estimate.
    pub estimate: f64,
    /// Relative tolerance used for the comparison.
    pub tolerance: f64,
}

/// Defect of an analytic Hessian (see [`check_hessian`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BadHessian {
    /// The matrix is not symmetric.
    #[error("Hessian of output {row} is asymmetric at ({i}, {j}): {lower} vs {upper}")]
    Asymmetric {
        /// Output component whose Hessian is asymmetric.
        row: usize,
        /// Row index of the offending entry.
        i: usize,
        /// Column index of the offending entry.
        j: usize,
        /// The entry below the diagonal.
        lower: f64,
        /// The entry above the diagonal.
        upper: f64,
    },
    /// An entry disagrees with its finite-difference estimate.
    #[error(
        "bad Hessian of output {row}: entry ({i}, {j}) is {analytic}, \
         finite differences give {estimate} (tolerance {tolerance})"
    )]
    Mismatch {
        /// Output component whose Hessian disagrees.
        row: usize,
        /// Row index of the offending entry.
        i: usize,
        /// Column index of the offending entry.
        j: usize,
        /// The value declared by the function.
        analytic: f64,
        /// The finite-difference estimate.
        estimate: f64,
        /// Relative tolerance used for the comparison.
        tolerance: f64,
    },
}

fn in_tolerance(analytic: f64, estimate: f64, tolerance: f64) -> bool {
    let scale = analytic.abs().max(estimate.abs()).max(1.0);
    (analytic - estimate).abs() <= tolerance * scale
}

/// Verifies the analytic gradient of output component `row` against a
/// finite-difference estimate, with the given relative tolerance.
///
/// # Panics
///
/// Panics when the length of `x` does not match the function dimension or
/// `row` is not a valid output component.
pub fn check_gradient<F: Differentiable + ?Sized>(
    f: &F,
    x: &DVector<f64>,
    row: usize,
    tolerance: f64,
) -> Result<(), BadGradient> {
    assert!(x.nrows() == f.dim(), "invalid length of x");
    assert!(row < f.outputs(), "invalid output component");

    let mut x = x.clone_owned();
    let magnitude = DVector::from_element(f.dim(), 1.0);

    let mut out = DVector::zeros(f.outputs());
    let fx = component(f, &x, row, &mut out);

    let mut analytic = DVector::zeros(f.dim());
    f.gradient(&x, row, &mut analytic);

    let estimate = Gradient::new(f, &mut x, &magnitude, row, fx);

    for i in 0..f.dim() {
        if !in_tolerance(analytic[i], estimate[i], tolerance) {
            return Err(BadGradient {
                row,
                component: i,
                analytic: analytic[i],
                estimate: estimate[i],
                tolerance,
            });
        }
    }

    Ok(())
}

/// Verifies the analytic Jacobian matrix against finite-difference estimates,
/// row by row, with the given relative tolerance.
///
/// # Panics
///
/// Panics when the length of `x` does not match the function dimension.
pub fn check_jacobian<F: Differentiable + ?Sized>(
    f: &F,
    x: &DVector<f64>,
    tolerance: f64,
) -> Result<(), BadGradient> {
    for row in 0..f.outputs() {
        check_gradient(f, x, row, tolerance)?;
    }

    Ok(())
}

/// Verifies the analytic Hessian of output component `row`: the matrix must
/// be symmetric and agree with a finite-difference estimate within the given
/// relative tolerance.
///
/// Second-order finite differences are considerably less accurate than
/// first-order ones, so the tolerance here is usually a few orders of
/// magnitude looser than for [`check_gradient`].
///
/// # Panics
///
/// Panics when the length of `x` does not match the function dimension or
/// `row` is not a valid output component.
pub fn check_hessian<F: TwiceDifferentiable + ?Sized>(
    f: &F,
    x: &DVector<f64>,
    row: usize,
    tolerance: f64,
) -> Result<(), BadHessian> {
    assert!(x.nrows() == f.dim(), "invalid length of x");
    assert!(row < f.outputs(), "invalid output component");

    let mut x = x.clone_owned();
    let magnitude = DVector::from_element(f.dim(), 1.0);

    let mut out = DVector::zeros(f.outputs());
    let fx = component(f, &x, row, &mut out);

    let mut analytic = DMatrix::zeros(f.dim(), f.dim());
    f.hessian(&x, row, &mut analytic);

    for i in 0..f.dim() {
        for j in (i + 1)..f.dim() {
            if !in_tolerance(analytic[(j, i)], analytic[(i, j)], tolerance) {
                return Err(BadHessian::Asymmetric {
                    row,
                    i,
                    j,
                    lower: analytic[(j, i)],
                    upper: analytic[(i, j)],
                });
            }
        }
    }

    let estimate = Hessian::new(f, &mut x, &magnitude, row, fx);

    for i in 0..f.dim() {
        for j in 0..f.dim() {
            if !in_tolerance(analytic[(i, j)], estimate[(i, j)], tolerance) {
                return Err(BadHessian::Mismatch {
                    row,
                    i,
                    j,
                    analytic: analytic[(i, j)],
                    estimate: estimate[(i, j)],
                    tolerance,
                });
            }
        }
    }

    Ok(())
}

//! Function abstractions: evaluation, gradients and Hessians.

use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Differentiability tier of a function.
///
/// Tiers are totally ordered and each tier provides everything the lower
/// tiers do. Backends declare the tier they require through
/// [`Backend::required_tier`](crate::Backend::required_tier) and the dispatch
/// layer rejects problems whose functions do not provide it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Plain evaluation.
    Value,
    /// Evaluation and first derivatives.
    Gradient,
    /// Evaluation, first and second derivatives.
    Hessian,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Value => f.write_str("value"),
            Tier::Gradient => f.write_str("gradient"),
            Tier::Hessian => f.write_str("Hessian"),
        }
    }
}

/// Error returned from the checked evaluation methods (see [`FunctionExt`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The argument length does not match the input dimension of the
    /// function.
    #[error("invalid argument length (expected {expected}, got {found})")]
    DimensionMismatch {
        /// Input dimension declared by the function.
        expected: usize,
        /// Length of the argument that was passed.
        found: usize,
    },
    /// The requested output component does not exist.
    #[error("output component {component} out of range ({outputs} outputs)")]
    ComponentOutOfRange {
        /// The requested component.
        component: usize,
        /// Number of output components declared by the function.
        outputs: usize,
    },
}

/// An evaluable mapping from *n* inputs to *m* outputs.
///
/// ## Defining a function
///
/// Implementations define the shape of the mapping and the raw evaluation
/// hook [`eval`](Function::eval), which writes all output components into
/// caller-provided storage. The hook may assume that the argument length
/// matches [`dim`](Function::dim); callers go through the checked methods of
/// [`FunctionExt`], which verify the shapes first.
///
/// ```rust
/// use karush::nalgebra as na;
/// use karush::Function;
/// use na::DVector;
///
/// struct Sum;
///
/// impl Function for Sum {
///     fn dim(&self) -> usize {
///         3
///     }
///
///     fn outputs(&self) -> usize {
///         1
///     }
///
///     fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
///         out[0] = x.sum();
///     }
/// }
/// ```
pub trait Function {
    /// Input space dimension.
    fn dim(&self) -> usize;

    /// Number of output components.
    fn outputs(&self) -> usize;

    /// Human-readable description of the function. Empty if not overridden.
    fn name(&self) -> &str {
        ""
    }

    /// Evaluates the function in given point, writing all output components
    /// into `out`.
    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>);
}

/// A [`Function`] with first derivatives.
pub trait Differentiable: Function {
    /// Writes the gradient of output component `row` in given point into
    /// `out` (length [`dim`](Function::dim)).
    fn gradient(&self, x: &DVector<f64>, row: usize, out: &mut DVector<f64>);

    /// Writes the Jacobian matrix ([`outputs`](Function::outputs) ×
    /// [`dim`](Function::dim)) in given point into `out`.
    ///
    /// The default implementation assembles the matrix row by row from
    /// [`gradient`](Differentiable::gradient), allocating a scratch vector.
    /// Implementations with a cheaper way to fill the whole matrix can
    /// override it.
    fn jacobian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) {
        let mut grad = DVector::zeros(self.dim());

        for row in 0..self.outputs() {
            self.gradient(x, row, &mut grad);
            out.row_mut(row).tr_copy_from(&grad);
        }
    }
}

/// A [`Differentiable`] function with second derivatives.
pub trait TwiceDifferentiable: Differentiable {
    /// Writes the Hessian matrix ([`dim`](Function::dim) ×
    /// [`dim`](Function::dim)) of output component `row` in given point into
    /// `out`.
    ///
    /// The matrix must be symmetric; implementations fill both triangles.
    fn hessian(&self, x: &DVector<f64>, row: usize, out: &mut DMatrix<f64>);
}

/// Checked evaluation methods for functions of any tier.
///
/// In contrast to the raw hooks, these validate the argument length and the
/// component index first and allocate the output storage only after the
/// validation succeeds, so a failed call never produces partial results. They
/// are available on `dyn` objects of the function traits.
pub trait FunctionExt: Function {
    /// Evaluates the function in given point.
    fn value(&self, x: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
        self.check_args(x, None)?;

        let mut out = DVector::zeros(self.outputs());
        self.eval(x, &mut out);
        Ok(out)
    }

    /// Computes the gradient of output component `row` in given point.
    fn grad(&self, x: &DVector<f64>, row: usize) -> Result<DVector<f64>, EvalError>
    where
        Self: Differentiable,
    {
        self.check_args(x, Some(row))?;

        let mut out = DVector::zeros(self.dim());
        self.gradient(x, row, &mut out);
        Ok(out)
    }

    /// Computes the Jacobian matrix in given point.
    fn jac(&self, x: &DVector<f64>) -> Result<DMatrix<f64>, EvalError>
    where
        Self: Differentiable,
    {
        self.check_args(x, None)?;

        let mut out = DMatrix::zeros(self.outputs(), self.dim());
        self.jacobian(x, &mut out);
        Ok(out)
    }

    /// Computes the Hessian matrix of output component `row` in given point.
    fn hess(&self, x: &DVector<f64>, row: usize) -> Result<DMatrix<f64>, EvalError>
    where
        Self: TwiceDifferentiable,
    {
        self.check_args(x, Some(row))?;

        let mut out = DMatrix::zeros(self.dim(), self.dim());
        self.hessian(x, row, &mut out);
        Ok(out)
    }

    /// Validates the argument length and, if given, an output component
    /// index.
    fn check_args(&self, x: &DVector<f64>, row: Option<usize>) -> Result<(), EvalError> {
        if x.nrows() != self.dim() {
            return Err(EvalError::DimensionMismatch {
                expected: self.dim(),
                found: x.nrows(),
            });
        }

        match row {
            Some(row) if row >= self.outputs() => Err(EvalError::ComponentOutOfRange {
                component: row,
                outputs: self.outputs(),
            }),
            _ => Ok(()),
        }
    }
}

impl<F: Function + ?Sized> FunctionExt for F {}

/// A shared handle to a function together with its differentiability tier.
///
/// Problems store their cost and constraint functions as `TieredFn`. The
/// handle is reference-counted, so the same function object can participate
/// in several problems or appear several times in one. There is no handle for
/// value-only functions: problem composition requires first derivatives, so
/// anything weaker is rejected by the type system rather than at dispatch
/// time.
///
/// ```rust
/// use karush::func::Linear;
/// use karush::nalgebra::{dmatrix, dvector};
/// use karush::{FunctionExt, Tier, TieredFn};
///
/// let f = TieredFn::hessian(Linear::new(dmatrix![1.0, 2.0], dvector![0.0]));
///
/// assert_eq!(f.tier(), Tier::Hessian);
/// assert_eq!(f.value(&dvector![3.0, 4.0]).unwrap()[0], 11.0);
/// ```
#[derive(Clone)]
pub enum TieredFn {
    /// A function providing first derivatives.
    Gradient(Arc<dyn Differentiable>),
    /// A function providing first and second derivatives.
    Hessian(Arc<dyn TwiceDifferentiable>),
}

impl TieredFn {
    /// Wraps a function that provides first derivatives.
    pub fn gradient(f: impl Differentiable + 'static) -> Self {
        TieredFn::Gradient(Arc::new(f))
    }

    /// Wraps a function that provides first and second derivatives.
    pub fn hessian(f: impl TwiceDifferentiable + 'static) -> Self {
        TieredFn::Hessian(Arc::new(f))
    }

    /// Gets the tier of the wrapped function.
    pub fn tier(&self) -> Tier {
        match self {
            TieredFn::Gradient(_) => Tier::Gradient,
            TieredFn::Hessian(_) => Tier::Hessian,
        }
    }

    /// Gets the wrapped function as twice differentiable, if its tier allows
    /// that.
    pub fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiable> {
        match self {
            TieredFn::Gradient(_) => None,
            TieredFn::Hessian(f) => Some(f.as_ref()),
        }
    }
}

impl Function for TieredFn {
    fn dim(&self) -> usize {
        match self {
            TieredFn::Gradient(f) => f.dim(),
            TieredFn::Hessian(f) => f.dim(),
        }
    }

    fn outputs(&self) -> usize {
        match self {
            TieredFn::Gradient(f) => f.outputs(),
            TieredFn::Hessian(f) => f.outputs(),
        }
    }

    fn name(&self) -> &str {
        match self {
            TieredFn::Gradient(f) => f.name(),
            TieredFn::Hessian(f) => f.name(),
        }
    }

    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        match self {
            TieredFn::Gradient(f) => f.eval(x, out),
            TieredFn::Hessian(f) => f.eval(x, out),
        }
    }
}

impl Differentiable for TieredFn {
    fn gradient(&self, x: &DVector<f64>, row: usize, out: &mut DVector<f64>) {
        match self {
            TieredFn::Gradient(f) => f.gradient(x, row, out),
            TieredFn::Hessian(f) => f.gradient(x, row, out),
        }
    }

    fn jacobian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) {
        match self {
            TieredFn::Gradient(f) => f.jacobian(x, out),
            TieredFn::Hessian(f) => f.jacobian(x, out),
        }
    }
}

impl fmt::Debug for TieredFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredFn")
            .field("tier", &self.tier())
            .field("name", &self.name())
            .field("dim", &self.dim())
            .field("outputs", &self.outputs())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    use nalgebra::{dmatrix, dvector};

    struct Parabolas;

    impl Function for Parabolas {
        fn dim(&self) -> usize {
            2
        }

        fn outputs(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "(x₀², x₀ + x₁²)"
        }

        fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
            out[0] = x[0].powi(2);
            out[1] = x[0] + x[1].powi(2);
        }
    }

    impl Differentiable for Parabolas {
        fn gradient(&self, x: &DVector<f64>, row: usize, out: &mut DVector<f64>) {
            match row {
                0 => {
                    out[0] = 2.0 * x[0];
                    out[1] = 0.0;
                }
                _ => {
                    out[0] = 1.0;
                    out[1] = 2.0 * x[1];
                }
            }
        }
    }

    impl TwiceDifferentiable for Parabolas {
        fn hessian(&self, _x: &DVector<f64>, row: usize, out: &mut DMatrix<f64>) {
            out.fill(0.0);
            match row {
                0 => out[(0, 0)] = 2.0,
                _ => out[(1, 1)] = 2.0,
            }
        }
    }

    #[test]
    fn tier_ordering() {
        assert!(Tier::Value < Tier::Gradient);
        assert!(Tier::Gradient < Tier::Hessian);
        assert_eq!(Tier::Gradient.max(Tier::Hessian), Tier::Hessian);
    }

    #[test]
    fn checked_value() {
        let f = Parabolas;

        assert_eq!(f.value(&dvector![2.0, 3.0]).unwrap(), dvector![4.0, 11.0]);

        assert_eq!(
            f.value(&dvector![2.0]),
            Err(EvalError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn checked_derivatives() {
        let f = Parabolas;
        let x = dvector![2.0, 3.0];

        assert_eq!(f.grad(&x, 0).unwrap(), dvector![4.0, 0.0]);
        assert_eq!(f.grad(&x, 1).unwrap(), dvector![1.0, 6.0]);
        assert_eq!(f.jac(&x).unwrap(), dmatrix![4.0, 0.0; 1.0, 6.0]);
        assert_eq!(f.hess(&x, 0).unwrap(), dmatrix![2.0, 0.0; 0.0, 0.0]);

        assert_eq!(
            f.grad(&x, 2),
            Err(EvalError::ComponentOutOfRange {
                component: 2,
                outputs: 2
            })
        );
        assert_eq!(
            f.hess(&dvector![1.0, 2.0, 3.0], 0),
            Err(EvalError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn tiered_handles() {
        let g = TieredFn::gradient(Parabolas);
        let h = TieredFn::hessian(Parabolas);

        assert_eq!(g.tier(), Tier::Gradient);
        assert_eq!(h.tier(), Tier::Hessian);
        assert!(g.as_twice_differentiable().is_none());
        assert!(h.as_twice_differentiable().is_some());

        assert_eq!(g.name(), "(x₀², x₀ + x₁²)");
        assert_eq!(g.value(&dvector![2.0, 3.0]).unwrap(), dvector![4.0, 11.0]);
        assert_eq!(h.grad(&dvector![2.0, 3.0], 1).unwrap(), dvector![1.0, 6.0]);
    }

    #[test]
    fn shared_ownership() {
        let h = TieredFn::hessian(Parabolas);
        let other = h.clone();

        assert_eq!(
            h.value(&dvector![1.0, 1.0]).unwrap(),
            other.value(&dvector![1.0, 1.0]).unwrap()
        );
    }
}

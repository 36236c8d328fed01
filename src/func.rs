//! Ready-made function families for composing problems.
//!
//! Both families carry analytic derivatives up to the Hessian, so they can be
//! used with backends of any tier.

use nalgebra::{DMatrix, DVector};

use crate::core::{Differentiable, Function, TwiceDifferentiable};

/// An affine function `A x + b`.
///
/// The matrix fixes the shape: `A` has one row per output component and one
/// column per argument. The gradient of component `i` is the row `A[i, ..]`
/// and all Hessians are zero.
///
/// ```rust
/// use karush::func::Linear;
/// use karush::nalgebra::{dmatrix, dvector};
/// use karush::FunctionExt;
///
/// // f(x) = (x0 + 2 x1 - 1, 3 x1)
/// let f = Linear::new(dmatrix![1.0, 2.0; 0.0, 3.0], dvector![-1.0, 0.0]);
///
/// assert_eq!(f.value(&dvector![1.0, 1.0]).unwrap(), dvector![2.0, 3.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Linear {
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl Linear {
    /// Creates the function `A x + b`.
    ///
    /// # Panics
    ///
    /// Panics when `a` has no columns or the lengths of `a` and `b` do not
    /// match.
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Self {
        assert!(a.ncols() > 0, "the matrix has no columns");
        assert!(
            a.nrows() == b.nrows(),
            "the matrix and the offset have different numbers of rows"
        );

        Self { a, b }
    }
}

impl Function for Linear {
    fn dim(&self) -> usize {
        self.a.ncols()
    }

    fn outputs(&self) -> usize {
        self.a.nrows()
    }

    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        self.a.mul_to(x, out);
        *out += &self.b;
    }
}

impl Differentiable for Linear {
    fn gradient(&self, _x: &DVector<f64>, row: usize, out: &mut DVector<f64>) {
        out.tr_copy_from(&self.a.row(row));
    }

    fn jacobian(&self, _x: &DVector<f64>, out: &mut DMatrix<f64>) {
        out.copy_from(&self.a);
    }
}

impl TwiceDifferentiable for Linear {
    fn hessian(&self, _x: &DVector<f64>, _row: usize, out: &mut DMatrix<f64>) {
        out.fill(0.0);
    }
}

/// A scalar quadratic function `x' A x / 2 + b' x + c` with a symmetric `A`.
///
/// The gradient is `A x + b` and the Hessian is `A` everywhere.
///
/// ```rust
/// use karush::func::Quadratic;
/// use karush::nalgebra::{dmatrix, dvector};
/// use karush::FunctionExt;
///
/// // f(x) = x0^2 + x1^2 - 4
/// let f = Quadratic::new(dmatrix![2.0, 0.0; 0.0, 2.0], dvector![0.0, 0.0], -4.0);
///
/// assert_eq!(f.value(&dvector![1.0, 2.0]).unwrap()[0], 1.0);
/// assert_eq!(f.grad(&dvector![1.0, 2.0], 0).unwrap(), dvector![2.0, 4.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Quadratic {
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: f64,
}

impl Quadratic {
    /// Creates the function `x' A x / 2 + b' x + c`.
    ///
    /// # Panics
    ///
    /// Panics when `a` is empty or not square, not symmetric, or the lengths
    /// of `a` and `b` do not match.
    pub fn new(a: DMatrix<f64>, b: DVector<f64>, c: f64) -> Self {
        assert!(a.nrows() > 0, "the matrix is empty");
        assert!(a.is_square(), "the matrix is not square");
        assert!(
            a.nrows() == b.nrows(),
            "the matrix and the linear term have different lengths"
        );

        let scale = a.abs().max().max(1.0);
        let asymmetry = (&a - a.transpose()).abs().max();
        assert!(asymmetry <= 1e-12 * scale, "the matrix is not symmetric");

        Self { a, b, c }
    }
}

impl Function for Quadratic {
    fn dim(&self) -> usize {
        self.a.nrows()
    }

    fn outputs(&self) -> usize {
        1
    }

    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        let ax = &self.a * x;
        out[0] = 0.5 * x.dot(&ax) + self.b.dot(x) + self.c;
    }
}

impl Differentiable for Quadratic {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        self.a.mul_to(x, out);
        *out += &self.b;
    }
}

impl TwiceDifferentiable for Quadratic {
    fn hessian(&self, _x: &DVector<f64>, _row: usize, out: &mut DMatrix<f64>) {
        out.copy_from(&self.a);
    }
}

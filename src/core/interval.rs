//! Closed intervals used for constraint and argument bounds.

use std::fmt;

use nalgebra::DVector;
use rand::Rng;

/// A closed interval `[lower, upper]` on the extended real line.
///
/// Intervals describe admissible values both for constraint outputs and for
/// problem arguments. Positive and negative infinity can be used to leave a
/// side unbounded. A degenerate interval with `lower == upper` pins the value,
/// turning an inequality into an equality.
///
/// ```rust
/// use karush::Interval;
///
/// let band = Interval::new(25.0, 40.0);
/// let at_least = Interval::lower_bounded(25.0);
/// let exactly = Interval::fixed(40.0);
///
/// assert!(band.contains(30.0));
/// assert!(!at_least.is_equality());
/// assert!(exactly.is_equality());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    lower: f64,
    upper: f64,
}

impl Interval {
    /// Creates the interval `[lower, upper]`.
    ///
    /// # Panics
    ///
    /// Panics when a bound is NaN or when `lower > upper`.
    pub fn new(lower: f64, upper: f64) -> Self {
        assert!(!lower.is_nan() && !upper.is_nan(), "interval bound is NaN");
        assert!(lower <= upper, "lower is greater than upper");

        Self { lower, upper }
    }

    /// Creates the interval `[lower, +inf)`.
    pub fn lower_bounded(lower: f64) -> Self {
        Self::new(lower, f64::INFINITY)
    }

    /// Creates the interval `(-inf, upper]`.
    pub fn upper_bounded(upper: f64) -> Self {
        Self::new(f64::NEG_INFINITY, upper)
    }

    /// Creates the degenerate interval `[value, value]`.
    pub fn fixed(value: f64) -> Self {
        Self::new(value, value)
    }

    /// Creates the interval `(-inf, +inf)`.
    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Gets the lower bound.
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// Gets the upper bound.
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Determines whether the interval pins a single value.
    pub fn is_equality(&self) -> bool {
        self.lower == self.upper
    }

    /// Determines whether both bounds are finite.
    pub fn is_finite(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    /// Determines whether `value` lies in the interval.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Computes the distance from `value` to the interval. Zero inside.
    pub fn violation(&self, value: f64) -> f64 {
        if value < self.lower {
            self.lower - value
        } else if value > self.upper {
            value - self.upper
        } else {
            0.0
        }
    }

    /// Clamps `value` into the interval.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }

    /// Estimates the decimal magnitude of values in the interval.
    ///
    /// Used as a step length hint by algorithms working on the enclosed
    /// variable. When the bounds give no usable information (unbounded or
    /// `[0, 0]` intervals), the magnitude is 1.
    pub fn magnitude(&self) -> f64 {
        let avg = 0.5 * (self.lower.abs() + self.upper.abs());
        let magnitude = 10f64.powf(avg.log10().trunc());

        if magnitude.is_finite() && magnitude > 0.0 {
            magnitude
        } else {
            1.0
        }
    }

    /// Samples a value from the interval.
    ///
    /// Finite intervals are sampled uniformly. For unbounded intervals a value
    /// is drawn from a wide range around zero and, when one side is bounded,
    /// reflected across that bound so that it lands inside.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.is_finite() {
            rng.gen_range(self.lower..=self.upper)
        } else {
            let random: f64 = rng.gen_range(-1e6..=1e6);

            if self.lower.is_finite() || self.upper.is_finite() {
                let clamped = random.max(self.lower).min(self.upper);
                let delta = clamped - random;
                clamped + delta
            } else {
                random
            }
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_equality() {
            write!(f, "= {}", self.lower)
        } else {
            write!(f, "[{}, {}]", self.lower, self.upper)
        }
    }
}

/// Extension methods for slices of intervals used as rectangular bounds.
pub trait BoundsExt {
    /// Projects given point into the bounds. Returns true when the point was
    /// outside and had to be moved.
    fn project(&self, x: &mut DVector<f64>) -> bool;

    /// Projects given point into the bounds in given dimension.
    fn project_in(&self, x: &mut DVector<f64>, i: usize) -> bool;

    /// Determines whether every component of `x` lies in its interval.
    fn contains_point(&self, x: &DVector<f64>) -> bool;

    /// Collects per-dimension magnitude estimates.
    fn magnitudes(&self) -> DVector<f64>;

    /// Samples a point in the bounds.
    fn sample<R: Rng + ?Sized>(&self, x: &mut DVector<f64>, rng: &mut R);
}

impl BoundsExt for [Interval] {
    fn project(&self, x: &mut DVector<f64>) -> bool {
        let mut not_feasible = false;

        self.iter().zip(x.iter_mut()).for_each(|(bound, xi)| {
            if !bound.contains(*xi) {
                *xi = bound.clamp(*xi);
                not_feasible = true;
            }
        });

        not_feasible
    }

    fn project_in(&self, x: &mut DVector<f64>, i: usize) -> bool {
        let xi = &mut x[i];

        if self[i].contains(*xi) {
            false
        } else {
            *xi = self[i].clamp(*xi);
            true
        }
    }

    fn contains_point(&self, x: &DVector<f64>) -> bool {
        self.iter()
            .zip(x.iter())
            .all(|(bound, xi)| bound.contains(*xi))
    }

    fn magnitudes(&self) -> DVector<f64> {
        DVector::from_iterator(self.len(), self.iter().map(|bound| bound.magnitude()))
    }

    fn sample<R: Rng + ?Sized>(&self, x: &mut DVector<f64>, rng: &mut R) {
        x.iter_mut()
            .zip(self.iter())
            .for_each(|(xi, bound)| *xi = bound.sample(rng));
    }
}

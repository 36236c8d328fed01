//! Nelder-Mead (simplex) minimization.
//!
//! [Nelder-Mead](https://en.wikipedia.org/wiki/Nelder%E2%80%93Mead_method)
//! simplex-reflection method is a popular derivative-free minimization
//! algorithm. It keeps a [simplex](https://en.wikipedia.org/wiki/Simplex) of
//! *n + 1* points and the simplex is reflected, expanded or contracted based
//! on the function values comparison. Candidate points are projected into the
//! rectangular bounds, so the iteration never leaves them.
//!
//! The algorithm works on a plain `Fn(&DVector<f64>) -> f64` objective, which
//! makes it suitable as the inner engine of merit-function methods (see
//! [`AugLag`](crate::algo::AugLag)).
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Less is more: Simplified Nelder-Mead method for large unconstrained
//! optimization](https://api.semanticscholar.org/CorpusID:59403095)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::DVector;
use thiserror::Error;

use crate::core::{BoundsExt, Interval};
use crate::derivatives::EPSILON_SQRT;

/// Options for [`NelderMead`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct NelderMeadOptions {
    /// Coefficient for reflection operation. Default: `-1`.
    reflection_coeff: f64,
    /// Coefficient for expansion operation. Default: `-2`.
    expansion_coeff: f64,
    /// Coefficient for outer contraction operation. Default: `-0.5`.
    outer_contraction_coeff: f64,
    /// Coefficient for inner contraction operation. Default: `0.5`.
    inner_contraction_coeff: f64,
    /// Coefficient for shrinking operation. Default: `0.5`.
    shrink_coeff: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            reflection_coeff: -1.0,
            expansion_coeff: -2.0,
            outer_contraction_coeff: -0.5,
            inner_contraction_coeff: 0.5,
            shrink_coeff: 0.5,
        }
    }
}

/// Error returned from [`NelderMead`].
#[derive(Debug, Error)]
pub enum NelderMeadError {
    /// Simplex collapsed so it is impossible to make any progress.
    #[error("simplex collapsed")]
    SimplexCollapsed,
    /// Simplex contains too many invalid values (NaN, infinity).
    #[error("simplex contains too many invalid values")]
    SimplexInvalid,
}

/// Nelder-Mead minimizer.
///
/// See [module](self) documentation for more details.
pub struct NelderMead {
    options: NelderMeadOptions,
    magnitude: DVector<f64>,
    centroid: DVector<f64>,
    reflection: DVector<f64>,
    expansion: DVector<f64>,
    contraction: DVector<f64>,
    simplex: Vec<DVector<f64>>,
    errors: Vec<f64>,
    sort_perm: Vec<usize>,
}

impl NelderMead {
    /// Initializes the minimizer with default options.
    ///
    /// The initial simplex steps are taken from the per-dimension magnitudes
    /// estimated from the bounds.
    pub fn new(bounds: &[Interval]) -> Self {
        Self::with_options(bounds, NelderMeadOptions::default())
    }

    /// Initializes the minimizer with given options.
    pub fn with_options(bounds: &[Interval], options: NelderMeadOptions) -> Self {
        let dim = bounds.len();

        Self {
            options,
            magnitude: bounds.magnitudes(),
            centroid: DVector::zeros(dim),
            reflection: DVector::zeros(dim),
            expansion: DVector::zeros(dim),
            contraction: DVector::zeros(dim),
            simplex: Vec::with_capacity(dim + 1),
            errors: Vec::with_capacity(dim + 1),
            sort_perm: Vec::with_capacity(dim + 1),
        }
    }

    /// Scales the initial simplex steps by given factor.
    ///
    /// Useful when restarting the minimizer around an already good point,
    /// where full-magnitude steps would throw the progress away.
    pub fn with_step_scale(mut self, factor: f64) -> Self {
        assert!(factor > 0.0, "step scale must be positive");

        self.magnitude *= factor;
        self
    }

    /// Resets the internal state of the minimizer.
    pub fn reset(&mut self) {
        // Causes the simplex to be initialized again.
        self.simplex.clear();
        self.errors.clear();
        self.sort_perm.clear();
    }

    /// Computes the next step of the minimization process.
    ///
    /// The value of `x` is the current point; after the method returns, it
    /// holds the best point of the simplex and the returned value is the
    /// objective value in it. Repeated calls move `x` towards a local minimum
    /// of the objective inside the bounds.
    pub fn next<F>(
        &mut self,
        f: &F,
        bounds: &[Interval],
        x: &mut DVector<f64>,
    ) -> Result<f64, NelderMeadError>
    where
        F: Fn(&DVector<f64>) -> f64,
    {
        let NelderMeadOptions {
            reflection_coeff,
            expansion_coeff,
            outer_contraction_coeff,
            inner_contraction_coeff,
            shrink_coeff,
        } = self.options;

        let Self {
            magnitude,
            simplex,
            errors,
            sort_perm,
            centroid,
            reflection,
            expansion,
            contraction,
            ..
        } = self;

        let n = x.nrows();

        if simplex.is_empty() {
            // Simplex initialization.
            errors.push(f(x));
            simplex.push(x.clone_owned());

            for j in 0..n {
                let mut xj = x.clone_owned();
                xj[j] += magnitude[j];
                bounds.project_in(&mut xj, j);

                errors.push(f(&xj));
                simplex.push(xj);
            }

            let invalid_count = errors.iter().filter(|e| !e.is_finite()).count();

            if invalid_count >= simplex.len() / 2 {
                // The simplex is too degenerate.
                debug!(
                    "{} out of {} points in simplex have invalid value, returning error",
                    invalid_count,
                    simplex.len()
                );
                simplex.clear();
                errors.clear();
                return Err(NelderMeadError::SimplexInvalid);
            }

            sort_perm.extend(0..=n);
            sort_perm.sort_by(|a, b| {
                errors[*a]
                    .partial_cmp(&errors[*b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        // Calculate the centroid of all points but the worst one.
        centroid.fill(0.0);
        (0..n)
            .map(|i| &simplex[sort_perm[i]])
            .for_each(|xi| *centroid += xi);
        *centroid /= n as f64;

        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Transformation {
            Reflection,
            Expansion,
            OuterContraction,
            InnerContraction,
            Shrinkage,
        }

        impl Transformation {
            fn as_str(&self) -> &str {
                match self {
                    Transformation::Reflection => "reflection",
                    Transformation::Expansion => "expansion",
                    Transformation::OuterContraction => "outer contraction",
                    Transformation::InnerContraction => "inner contraction",
                    Transformation::Shrinkage => "shrinkage",
                }
            }
        }

        // Perform one of possible simplex transformations.
        reflection.on_line2_mut(centroid, &simplex[sort_perm[n]], reflection_coeff);
        let reflection_not_feasible = bounds.project(reflection);
        let reflection_error = nan_to_inf(f(reflection));

        #[allow(clippy::suspicious_else_formatting)]
        let (transformation, not_feasible) = if errors[sort_perm[0]] <= reflection_error
            && reflection_error < errors[sort_perm[n - 1]]
        {
            // Reflected point is neither best nor worst in the new simplex.
            // Just replace the worst point.
            simplex[sort_perm[n]].copy_from(reflection);
            errors[sort_perm[n]] = reflection_error;
            (Transformation::Reflection, reflection_not_feasible)
        } else if reflection_error < errors[sort_perm[0]] {
            // Reflected point is better than the current best. Try to go
            // farther along this direction.
            expansion.on_line2_mut(centroid, &simplex[sort_perm[n]], expansion_coeff);
            let expansion_not_feasible = bounds.project(expansion);
            let expansion_error = nan_to_inf(f(expansion));

            if expansion_error < reflection_error {
                // Expansion indeed helped, replace the worst point.
                simplex[sort_perm[n]].copy_from(expansion);
                errors[sort_perm[n]] = expansion_error;
                (Transformation::Expansion, expansion_not_feasible)
            } else {
                // Expansion didn't help, replace the worst point with the
                // reflected point.
                simplex[sort_perm[n]].copy_from(reflection);
                errors[sort_perm[n]] = reflection_error;
                (Transformation::Reflection, reflection_not_feasible)
            }
        } else
        /* reflection_error >= errors[sort_perm[n - 1]] */
        {
            // Reflected point is still worse than the second to last point.
            // Try to do a contraction.
            let (transformation, not_feasible) = if errors[sort_perm[n - 1]] <= reflection_error
                && reflection_error < errors[sort_perm[n]]
            {
                // Try to perform outer contraction.
                contraction.on_line2_mut(centroid, &simplex[sort_perm[n]], outer_contraction_coeff);
                let contraction_not_feasible = bounds.project(contraction);
                let contraction_error = nan_to_inf(f(contraction));

                if contraction_error <= reflection_error {
                    // Use the contracted point instead of the reflected point
                    // because it's better.
                    simplex[sort_perm[n]].copy_from(contraction);
                    errors[sort_perm[n]] = contraction_error;
                    (
                        Some(Transformation::OuterContraction),
                        contraction_not_feasible,
                    )
                } else {
                    (None, false)
                }
            } else {
                // Try to perform inner contraction.
                contraction.on_line2_mut(centroid, &simplex[sort_perm[n]], inner_contraction_coeff);
                let contraction_not_feasible = bounds.project(contraction);
                let contraction_error = nan_to_inf(f(contraction));

                if contraction_error <= errors[sort_perm[n]] {
                    // The contracted point is better than the worst point.
                    simplex[sort_perm[n]].copy_from(contraction);
                    errors[sort_perm[n]] = contraction_error;
                    (
                        Some(Transformation::InnerContraction),
                        contraction_not_feasible,
                    )
                } else {
                    (None, false)
                }
            };

            match transformation {
                Some(transformation) => (transformation, not_feasible),
                None => {
                    // Neither outside nor inside contraction was acceptable.
                    // Shrink the simplex towards the best point.
                    contraction.copy_from(&simplex[sort_perm[0]]);

                    for i in 1..=n {
                        let xi = &mut simplex[sort_perm[i]];
                        xi.on_line_mut(contraction, shrink_coeff);
                        errors[sort_perm[i]] = nan_to_inf(f(xi));
                    }

                    (Transformation::Shrinkage, false)
                }
            }
        };

        // Establish the ordering of simplex points.
        sort_perm.sort_by(|a, b| {
            errors[*a]
                .partial_cmp(&errors[*b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            "performed {}{},\tfx = {} - {}",
            transformation.as_str(),
            if not_feasible { " with projection" } else { "" },
            errors[sort_perm[0]],
            errors[sort_perm[n]]
        );

        // Return the best simplex point.
        x.copy_from(&simplex[sort_perm[0]]);

        if transformation == Transformation::Shrinkage
            || transformation == Transformation::InnerContraction
            || not_feasible
        {
            // Check whether the simplex collapsed or not. It can happen only
            // when shrinkage or, when n = 1, inner contraction is performed
            // or a new point was projected into the bounds, because otherwise
            // an error reduction was achieved. This criterion is taken from
            // "Less is more: Simplified Nelder-Mead method for large
            // unconstrained optimization".
            let eps = EPSILON_SQRT;

            let worst = errors[sort_perm[n]];
            let best = errors[sort_perm[0]];
            let numer = (worst - best) * 2.0;
            let denom = worst + best + eps;

            if numer / denom <= eps {
                debug!("simplex collapsed: {} / {} <= {}", numer, denom, eps);
                return Err(NelderMeadError::SimplexCollapsed);
            }
        }

        Ok(errors[sort_perm[0]])
    }
}

fn nan_to_inf(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        // Not finite also covers NaN and negative infinity.
        f64::INFINITY
    }
}

trait VectorNelderMeadExt {
    fn on_line_mut(&mut self, to: &DVector<f64>, t: f64);

    fn on_line2_mut(&mut self, from: &DVector<f64>, to: &DVector<f64>, t: f64);
}

impl VectorNelderMeadExt for DVector<f64> {
    fn on_line_mut(&mut self, to: &DVector<f64>, t: f64) {
        *self += to;
        *self *= t;
    }

    fn on_line2_mut(&mut self, from: &DVector<f64>, to: &DVector<f64>, t: f64) {
        to.sub_to(from, self);
        *self *= t;
        *self += from;
    }
}

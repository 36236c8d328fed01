//! Outcomes of a backend run.

use std::fmt;

use nalgebra::DVector;

/// A solution point together with its objective value and optional
/// diagnostics reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    x: DVector<f64>,
    value: f64,
    constraints: Option<DVector<f64>>,
    multipliers: Option<DVector<f64>>,
}

impl Solution {
    /// Creates a solution from the final point and its objective value.
    pub fn new(x: DVector<f64>, value: f64) -> Self {
        Self {
            x,
            value,
            constraints: None,
            multipliers: None,
        }
    }

    /// Attaches the flattened constraint values in the final point.
    pub fn with_constraints(mut self, constraints: DVector<f64>) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Attaches the flattened constraint multipliers.
    pub fn with_multipliers(mut self, multipliers: DVector<f64>) -> Self {
        self.multipliers = Some(multipliers);
        self
    }

    /// Gets the solution point.
    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    /// Gets the objective value in the solution point.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Gets the flattened constraint values in the solution point, if the
    /// backend reported them. The flattening follows the constraint order of
    /// the problem.
    pub fn constraints(&self) -> Option<&DVector<f64>> {
        self.constraints.as_ref()
    }

    /// Gets the flattened constraint multipliers, if the backend reported
    /// them.
    pub fn multipliers(&self) -> Option<&DVector<f64>> {
        self.multipliers.as_ref()
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x = ")?;
        write_vector(f, &self.x)?;
        write!(f, "\nvalue = {}", self.value)?;

        if let Some(constraints) = &self.constraints {
            write!(f, "\nconstraints = ")?;
            write_vector(f, constraints)?;
        }

        if let Some(multipliers) = &self.multipliers {
            write!(f, "\nmultipliers = ")?;
            write_vector(f, multipliers)?;
        }

        Ok(())
    }
}

/// Outcome of one backend run on a problem.
///
/// All four cases are ordinary values and callers are expected to match on
/// all of them. [`NoSolution`](SolverResult::NoSolution) and
/// [`Error`](SolverResult::Error) describe how the run ended; they are not
/// `Err` values of the dispatch (see
/// [`Registry::solve`](crate::Registry::solve)), because a failed run is a
/// reported outcome, not a dispatch failure, and it is never retried.
#[derive(Debug, Clone)]
pub enum SolverResult {
    /// The backend converged to a solution.
    Solution(Solution),
    /// The backend settled on a solution, but something during the run
    /// deserves attention.
    SolutionWithWarnings(Solution, Vec<String>),
    /// The backend finished its work without finding any solution.
    NoSolution,
    /// The backend failed.
    Error(String),
}

impl SolverResult {
    /// Determines whether the outcome carries a solution, with or without
    /// warnings.
    pub fn is_success(&self) -> bool {
        self.solution().is_some()
    }

    /// Gets the solution, if the outcome carries one.
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolverResult::Solution(solution) => Some(solution),
            SolverResult::SolutionWithWarnings(solution, _) => Some(solution),
            SolverResult::NoSolution | SolverResult::Error(_) => None,
        }
    }
}

impl fmt::Display for SolverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverResult::Solution(solution) => {
                write!(f, "solution found\n{}", solution)
            }
            SolverResult::SolutionWithWarnings(solution, warnings) => {
                write!(f, "solution found with warnings\n{}", solution)?;
                for warning in warnings {
                    write!(f, "\nwarning: {}", warning)?;
                }
                Ok(())
            }
            SolverResult::NoSolution => f.write_str("no solution found"),
            SolverResult::Error(message) => write!(f, "solver error: {}", message),
        }
    }
}

fn write_vector(f: &mut fmt::Formatter<'_>, v: &DVector<f64>) -> fmt::Result {
    write!(f, "[")?;

    for (i, value) in v.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", value)?;
    }

    write!(f, "]")
}

use karush::nalgebra as na;
use karush::{
    Config, Differentiable, Function, Interval, Problem, Registry, TieredFn, TwiceDifferentiable,
};
use na::{dvector, DMatrix, DVector};

// Problem 71 of the Hock-Schittkowski collection.
struct Cost;

impl Function for Cost {
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

impl Differentiable for Cost {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        out[0] = x[3] * (2.0 * x[0] + x[1] + x[2]);
        out[1] = x[0] * x[3];
        out[2] = x[0] * x[3] + 1.0;
        out[3] = x[0] * (x[0] + x[1] + x[2]);
    }
}

impl TwiceDifferentiable for Cost {
    fn hessian(&self, x: &DVector<f64>, _row: usize, out: &mut DMatrix<f64>) {
        out.fill(0.0);

        out[(0, 0)] = 2.0 * x[3];
        out[(0, 1)] = x[3];
        out[(0, 2)] = x[3];
        out[(0, 3)] = 2.0 * x[0] + x[1] + x[2];
        out[(1, 3)] = x[0];
        out[(2, 3)] = x[0];

        out[(1, 0)] = x[3];
        out[(2, 0)] = x[3];
        out[(3, 0)] = 2.0 * x[0] + x[1] + x[2];
        out[(3, 1)] = x[0];
        out[(3, 2)] = x[0];
    }
}

// Kept at least 25 by an inequality.
struct WeightedProduct;

impl Function for WeightedProduct {
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

impl Differentiable for WeightedProduct {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        out[0] = x[1] * x[2] * x[3];
        out[1] = x[0] * x[2] * x[3];
        out[2] = x[0] * x[1] * x[3];
        out[3] = x[0] * x[1] * x[2];
    }
}

// Pinned to 40 by an equality.
struct SquaredNorm;

impl Function for SquaredNorm {
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
        out[0] = x.iter().map(|xi| xi * xi).sum();
    }
}

impl Differentiable for SquaredNorm {
    fn gradient(&self, x: &DVector<f64>, _row: usize, out: &mut DVector<f64>) {
        out.copy_from(x);
        *out *= 2.0;
    }
}

fn main() -> Result<(), String> {
    let mut problem = Problem::new(TieredFn::hessian(Cost));

    problem
        .add_constraint(
            TieredFn::gradient(WeightedProduct),
            vec![Interval::lower_bounded(25.0)],
            vec![1.0],
        )
        .map_err(|error| format!("{error}"))?;
    problem
        .add_constraint(
            TieredFn::gradient(SquaredNorm),
            vec![Interval::fixed(40.0)],
            vec![1.0],
        )
        .map_err(|error| format!("{error}"))?;

    problem
        .set_argument_bounds(vec![Interval::new(1.0, 5.0); 4])
        .map_err(|error| format!("{error}"))?;
    problem
        .set_starting_point(dvector![1.0, 5.0, 5.0, 1.0])
        .map_err(|error| format!("{error}"))?;

    println!("minimize {}", problem.cost().name());
    for constraint in problem.constraints() {
        println!(
            "subject to {} in {}",
            constraint.function().name(),
            constraint.bounds()[0]
        );
    }
    for bound in problem.argument_bounds() {
        println!("argument in {}", bound);
    }

    let registry = Registry::with_default_backends();
    let result = registry
        .solve("auglag", &problem, &Config::new())
        .map_err(|error| format!("{error}"))?;

    println!("{}", result);

    if result.is_success() {
        Ok(())
    } else {
        Err("optimization failed".to_string())
    }
}

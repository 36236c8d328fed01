use criterion::{criterion_group, criterion_main, Criterion};
use karush::algo::{AugLag, NelderMead};
use karush::derivatives::{check_gradient, check_hessian};
use karush::nalgebra as na;
use karush::testing::{self, Hs71Cost, TestFunction};
use karush::{Backend, Function, FunctionExt, Interval};

fn hs71(c: &mut Criterion) {
    let problem = testing::hs71_problem();

    c.bench_function("auglag hs71", |b| {
        b.iter(|| {
            let result = AugLag::new().solve(&problem);
            assert!(result.is_success());
        })
    });
}

fn rosenbrock(c: &mut Criterion) {
    let bounds = vec![Interval::unbounded(); 2];

    let f = |x: &na::DVector<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2);

    c.bench_function("nelder-mead rosenbrock", |b| {
        b.iter(|| {
            let mut nelder_mead = NelderMead::new(&bounds);
            let mut x = na::dvector![-1.2, 1.0];

            for _ in 0..1000 {
                if nelder_mead.next(&f, &bounds, &mut x).is_err() {
                    break;
                }
            }

            assert!(testing::Rosenbrock.is_minimum(&x, 1e-3));
        })
    });
}

fn evaluation(c: &mut Criterion) {
    let cost = Hs71Cost;
    let x = na::dvector![1.0, 4.8, 3.9, 1.3];

    let mut out = na::DVector::zeros(1);
    c.bench_function("raw cost evaluation", |b| {
        b.iter(|| {
            cost.eval(&x, &mut out);
            out[0]
        })
    });

    c.bench_function("checked cost evaluation", |b| b.iter(|| cost.value(&x).unwrap()));
}

fn derivative_checks(c: &mut Criterion) {
    let x = na::dvector![1.0, 4.8, 3.9, 1.3];

    c.bench_function("gradient check hs71 cost", |b| {
        b.iter(|| check_gradient(&Hs71Cost, &x, 0, 1e-4).unwrap())
    });

    c.bench_function("Hessian check hs71 cost", |b| {
        b.iter(|| check_hessian(&Hs71Cost, &x, 0, 1e-3).unwrap())
    });
}

criterion_group!(solve, hs71, rosenbrock, evaluation, derivative_checks);
criterion_main!(solve);

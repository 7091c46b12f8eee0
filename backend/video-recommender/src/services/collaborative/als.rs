//! Implicit-feedback alternating least squares
//!
//! Each half-step solves, for every row `u` of the weight matrix,
//!
//! ```text
//! (YᵀY + λI + Σ_i α|w_ui| y_i y_iᵀ) x_u = Σ_{w_ui > 0} (1 + α w_ui) y_i
//! ```
//!
//! Non-positive weights are negative feedback: they raise the confidence of
//! a zero preference and contribute nothing to the right-hand side.
//! `YᵀY` is shared across rows; only stored entries add rank-one
//! corrections. Rows are independent and solved in parallel.

use crate::services::interactions::CsrMatrix;
use faer::linalg::solvers::Solve;
use faer::{MatRef, Side};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, warn};

const MIN_REGULARIZATION: f64 = 1e-6;
const INIT_SCALE: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
pub struct AlsParams {
    pub factors: usize,
    pub regularization: f64,
    pub iterations: usize,
    pub alpha: f64,
    pub seed: u64,
}

pub struct LatentFactors {
    pub user_factors: Array2<f64>,
    pub item_factors: Array2<f64>,
}

/// Fit user and item factors on a user×item weight matrix.
pub fn train(user_items: &CsrMatrix, params: &AlsParams) -> LatentFactors {
    let item_users = user_items.transpose();
    let k = params.factors;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut item_factors =
        Array2::from_shape_fn((user_items.n_cols(), k), |_| rng.gen::<f64>() * INIT_SCALE);
    let mut user_factors = Array2::zeros((user_items.n_rows(), k));

    for iteration in 0..params.iterations {
        user_factors = solve_side(user_items, &item_factors, params);
        item_factors = solve_side(&item_users, &user_factors, params);
        debug!(iteration, "ALS iteration complete");
    }

    LatentFactors {
        user_factors,
        item_factors,
    }
}

/// Least-squares solve for every row of `rows` against fixed `other` factors.
fn solve_side(rows: &CsrMatrix, other: &Array2<f64>, params: &AlsParams) -> Array2<f64> {
    let k = other.ncols();
    let gram = other.t().dot(other);
    let reg = params.regularization.max(MIN_REGULARIZATION);

    let solved: Vec<Vec<f64>> = (0..rows.n_rows())
        .into_par_iter()
        .map(|r| solve_row(rows, r, other, &gram, reg, params.alpha))
        .collect();

    let mut out = Array2::zeros((rows.n_rows(), k));
    for (r, x) in solved.into_iter().enumerate() {
        out.row_mut(r).assign(&Array1::from(x));
    }
    out
}

fn solve_row(
    rows: &CsrMatrix,
    r: usize,
    other: &Array2<f64>,
    gram: &Array2<f64>,
    reg: f64,
    alpha: f64,
) -> Vec<f64> {
    let k = other.ncols();
    let (cols, vals) = rows.row(r);
    if cols.is_empty() {
        return vec![0.0; k];
    }

    // row-major k×k
    let mut a: Vec<f64> = gram.iter().copied().collect();
    for d in 0..k {
        a[d * k + d] += reg;
    }
    let mut b = vec![0.0; k];

    for (&i, &w) in cols.iter().zip(vals) {
        let y = other.row(i);
        if w > 0.0 {
            let confidence = 1.0 + alpha * w;
            for p in 0..k {
                b[p] += confidence * y[p];
            }
        }
        let extra = alpha * w.abs();
        if extra == 0.0 {
            continue;
        }
        for p in 0..k {
            let scaled = extra * y[p];
            for q in 0..k {
                a[p * k + q] += scaled * y[q];
            }
        }
    }

    match cholesky_solve(&a, &b, k) {
        Some(x) => x,
        None => {
            warn!(row = r, "Normal equations not positive definite, zeroing factors");
            vec![0.0; k]
        }
    }
}

/// Solve `A x = b` through an LLᵀ factorisation of the row-major `k×k` matrix.
fn cholesky_solve(a: &[f64], b: &[f64], k: usize) -> Option<Vec<f64>> {
    let a_mat = MatRef::from_row_major_slice(a, k, k);
    let b_mat = MatRef::from_column_major_slice(b, k, 1);

    let llt = a_mat.llt(Side::Lower).ok()?;
    let x = llt.solve(b_mat);
    let out: Vec<f64> = (0..k).map(|p| x[(p, 0)]).collect();
    out.iter().all(|v| v.is_finite()).then_some(out)
}

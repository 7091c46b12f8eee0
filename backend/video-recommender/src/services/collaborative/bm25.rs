//! BM25 re-weighting of an item×user matrix
//!
//! ```text
//! idf(u)         = ln(N) - ln(1 + df(u))        N = item rows, df = items touched by u
//! length_norm(i) = (1 - B) + B * row_sum(i) / mean(row_sum)
//! w'(i, u)       = w * (K1 + 1) / (K1 * length_norm(i) + w) * idf(u)
//! ```
//!
//! Popular items (long rows) are damped and heavy users carry less evidence
//! per interaction.

use crate::services::interactions::CsrMatrix;

pub fn bm25_weight(item_users: &CsrMatrix, k1: f64, b: f64) -> CsrMatrix {
    let n = item_users.n_rows() as f64;
    let idf: Vec<f64> = item_users
        .col_counts()
        .into_iter()
        .map(|df| n.ln() - (1.0 + df as f64).ln())
        .collect();

    let row_sums = item_users.row_sums();
    let average = if row_sums.is_empty() {
        0.0
    } else {
        row_sums.iter().sum::<f64>() / row_sums.len() as f64
    };
    let length_norm: Vec<f64> = row_sums
        .iter()
        .map(|&s| {
            if average > 0.0 {
                (1.0 - b) + b * s / average
            } else {
                1.0
            }
        })
        .collect();

    let mut weighted = item_users.clone();
    weighted.map_values(|row, col, w| {
        let denom = k1 * length_norm[row] + w;
        if denom == 0.0 {
            0.0
        } else {
            w * (k1 + 1.0) / denom * idf[col]
        }
    });
    weighted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bm25_matches_formula() {
        // 4 items × 2 users; the last item row is empty
        let m = CsrMatrix::from_triplets(4, 2, &[(0, 0, 1.0), (1, 0, 2.0), (2, 1, 4.0)]);
        let (k1, b) = (1.2, 0.75);
        let w = bm25_weight(&m, k1, b);

        let avg = (1.0 + 2.0 + 4.0 + 0.0) / 4.0;
        let idf_u0 = 4f64.ln() - 3f64.ln(); // df = 2
        let idf_u1 = 4f64.ln() - 2f64.ln(); // df = 1

        let norm_1 = (1.0 - b) + b * 2.0 / avg;
        let expected_1 = 2.0 * (k1 + 1.0) / (k1 * norm_1 + 2.0) * idf_u0;
        assert!((w.dense_row(1)[0] - expected_1).abs() < 1e-12);

        let norm_2 = (1.0 - b) + b * 4.0 / avg;
        let expected_2 = 4.0 * (k1 + 1.0) / (k1 * norm_2 + 4.0) * idf_u1;
        assert!((w.dense_row(2)[1] - expected_2).abs() < 1e-12);
    }

    #[test]
    fn test_bm25_damps_popular_rows() {
        // 4 items × 4 users; item 0 is touched by one user heavily, item 1 lightly.
        let m = CsrMatrix::from_triplets(
            4,
            4,
            &[(0, 0, 10.0), (1, 1, 1.0), (2, 2, 1.0), (3, 3, 1.0)],
        );
        let w = bm25_weight(&m, 100.0, 0.8);
        // Saturation keeps the ratio well below the raw 10×.
        let ratio = w.dense_row(0)[0] / w.dense_row(1)[1];
        assert!(ratio > 1.0 && ratio < 10.0);
        assert_eq!(w.nnz(), m.nnz());
    }

    #[test]
    fn test_bm25_empty_matrix() {
        let m = CsrMatrix::zeros(0, 0);
        let w = bm25_weight(&m, 100.0, 0.8);
        assert_eq!(w.nnz(), 0);
    }
}

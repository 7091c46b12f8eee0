//! Compressed sparse row matrix
//!
//! Row `r` owns `indices[indptr[r]..indptr[r + 1]]` (column ids, sorted
//! ascending) and the matching `data` slice.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            indptr: vec![0; n_rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build from `(row, col, value)` coordinates. Repeated coordinates
    /// accumulate into one cell.
    pub fn from_triplets(n_rows: usize, n_cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut per_row: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_rows];
        for &(r, c, v) in triplets {
            per_row[r].push((c, v));
        }
        Self::from_rows(n_cols, per_row)
    }

    /// Build from per-row `(col, value)` lists in any order; duplicates sum.
    pub fn from_rows(n_cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Self {
        let n_rows = rows.len();
        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        for mut row in rows {
            row.sort_by_key(|&(c, _)| c);
            let mut last: Option<usize> = None;
            for (c, v) in row {
                if last == Some(c) {
                    if let Some(cell) = data.last_mut() {
                        *cell += v;
                    }
                } else {
                    indices.push(c);
                    data.push(v);
                    last = Some(c);
                }
            }
            indptr.push(indices.len());
        }

        Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column ids and values of row `r`.
    pub fn row(&self, r: usize) -> (&[usize], &[f64]) {
        let (s, e) = (self.indptr[r], self.indptr[r + 1]);
        (&self.indices[s..e], &self.data[s..e])
    }

    pub fn row_iter(&self, r: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (cols, vals) = self.row(r);
        cols.iter().copied().zip(vals.iter().copied())
    }

    pub fn row_sum(&self, r: usize) -> f64 {
        self.row(r).1.iter().sum()
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_rows).map(|r| self.row_sum(r)).collect()
    }

    /// Number of stored entries per column.
    pub fn col_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_cols];
        for &c in &self.indices {
            counts[c] += 1;
        }
        counts
    }

    /// Scale each row to unit L1 norm. All-zero rows stay zero.
    pub fn normalize_rows_l1(&mut self) {
        for r in 0..self.n_rows {
            let (s, e) = (self.indptr[r], self.indptr[r + 1]);
            let total: f64 = self.data[s..e].iter().map(|v| v.abs()).sum();
            if total > 0.0 {
                for v in &mut self.data[s..e] {
                    *v /= total;
                }
            }
        }
    }

    /// Scale each row to unit L2 norm. All-zero rows stay zero.
    pub fn normalize_rows_l2(&mut self) {
        for r in 0..self.n_rows {
            let (s, e) = (self.indptr[r], self.indptr[r + 1]);
            let norm = self.data[s..e].iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for v in &mut self.data[s..e] {
                    *v /= norm;
                }
            }
        }
    }

    /// Replace every stored value with `f(row, col, value)`.
    pub fn map_values<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize, f64) -> f64,
    {
        for r in 0..self.n_rows {
            for idx in self.indptr[r]..self.indptr[r + 1] {
                self.data[idx] = f(r, self.indices[idx], self.data[idx]);
            }
        }
    }

    pub fn transpose(&self) -> CsrMatrix {
        let mut counts = vec![0usize; self.n_cols];
        for &c in &self.indices {
            counts[c] += 1;
        }
        let mut indptr = vec![0usize; self.n_cols + 1];
        for c in 0..self.n_cols {
            indptr[c + 1] = indptr[c] + counts[c];
        }

        let nnz = self.nnz();
        let mut indices = vec![0usize; nnz];
        let mut data = vec![0.0f64; nnz];
        let mut next = indptr[..self.n_cols].to_vec();
        // Rows are visited in order, so each transposed row stays sorted.
        for r in 0..self.n_rows {
            for idx in self.indptr[r]..self.indptr[r + 1] {
                let c = self.indices[idx];
                let p = next[c];
                indices[p] = r;
                data[p] = self.data[idx];
                next[c] += 1;
            }
        }

        CsrMatrix {
            n_rows: self.n_cols,
            n_cols: self.n_rows,
            indptr,
            indices,
            data,
        }
    }

    /// Dense copy of row `r`.
    pub fn dense_row(&self, r: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.n_cols];
        for (c, v) in self.row_iter(r) {
            out[c] = v;
        }
        out
    }

    /// Rows reordered by `order`; `None` yields an all-zero row.
    pub fn select_rows(&self, order: &[Option<usize>]) -> CsrMatrix {
        let rows = order
            .iter()
            .map(|src| match src {
                Some(r) => self.row_iter(*r).collect(),
                None => Vec::new(),
            })
            .collect();
        CsrMatrix::from_rows(self.n_cols, rows)
    }

    /// Structural sanity: monotone `indptr`, in-range sorted columns.
    pub fn is_well_formed(&self) -> bool {
        if self.indptr.len() != self.n_rows + 1
            || self.indices.len() != self.data.len()
            || self.indptr.last().copied() != Some(self.indices.len())
        {
            return false;
        }
        (0..self.n_rows).all(|r| {
            let (s, e) = (self.indptr[r], self.indptr[r + 1]);
            s <= e
                && self.indices[s..e].windows(2).all(|w| w[0] < w[1])
                && self.indices[s..e].iter().all(|&c| c < self.n_cols)
        })
    }
}

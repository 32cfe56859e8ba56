//! Dense simplex tableau `B^-1 [A | -I]`.
//!
//! Columns `0..n` are structural, columns `n..n+m` are the row slacks
//! `s = A x`. Rows are kept in basis order: row `i` expresses the basic column
//! `head[i]`.

use crate::error::{LpError, LpResult};
use crate::linalg::sparse::SparseCsc;

/// Dense row-major tableau with its basis heading.
#[derive(Debug, Clone)]
pub struct Tableau {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    head: Vec<usize>,
    scratch: Vec<f64>,
}

/// Build the dense constraint matrix `[A | -I]` (row-major).
pub fn dense_constraint_matrix(a: &SparseCsc) -> LpResult<Vec<f64>> {
    let m = a.rows();
    let n = a.cols();
    let width = n + m;
    let mut data = Vec::new();
    data.try_reserve_exact(m * width)
        .map_err(|_| LpError::Allocation { rows: m, cols: width })?;
    data.resize(m * width, 0.0);

    for (j, col) in a.outer_iterator().enumerate() {
        for (i, &v) in col.iter() {
            data[i * width + j] += v;
        }
    }
    for i in 0..m {
        data[i * width + n + i] = -1.0;
    }
    Ok(data)
}

impl Tableau {
    /// Factor the basis given by `basic` (one column per row) by Gauss-Jordan
    /// elimination on a copy of `base`.
    ///
    /// Returns `None` when the basis is singular up to `tol_pivot`.
    pub fn factor(
        base: &[f64],
        rows: usize,
        cols: usize,
        basic: &[usize],
        tol_pivot: f64,
    ) -> Option<Self> {
        if basic.len() != rows {
            return None;
        }
        let mut tab = Self {
            rows,
            cols,
            data: base.to_vec(),
            head: vec![usize::MAX; rows],
            scratch: vec![0.0; cols],
        };
        let mut assigned = vec![false; rows];

        for &col in basic {
            let mut best_row = None;
            let mut best_abs = tol_pivot;
            for r in 0..rows {
                if assigned[r] {
                    continue;
                }
                let v = tab.data[r * cols + col].abs();
                if v > best_abs {
                    best_abs = v;
                    best_row = Some(r);
                }
            }
            let r = best_row?;
            tab.pivot(r, col);
            assigned[r] = true;
        }
        Some(tab)
    }

    /// Number of rows (m).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (n + m).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Basic column of each row.
    pub fn head(&self) -> &[usize] {
        &self.head
    }

    /// Tableau row `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Entry `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// Pivot column `j` into the basis at row `r`.
    pub fn pivot(&mut self, r: usize, j: usize) {
        let cols = self.cols;
        let p = self.data[r * cols + j];
        let inv = 1.0 / p;

        for k in 0..cols {
            let v = self.data[r * cols + k] * inv;
            self.data[r * cols + k] = v;
            self.scratch[k] = v;
        }
        self.data[r * cols + j] = 1.0;
        self.scratch[j] = 1.0;

        for i in 0..self.rows {
            if i == r {
                continue;
            }
            let f = self.data[i * cols + j];
            if f == 0.0 {
                continue;
            }
            let row = &mut self.data[i * cols..(i + 1) * cols];
            for (dst, &src) in row.iter_mut().zip(&self.scratch) {
                if src != 0.0 {
                    *dst -= f * src;
                }
            }
            row[j] = 0.0;
        }
        self.head[r] = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::from_triplets;

    #[test]
    fn test_slack_basis_is_negated_matrix() {
        // A = [1 2; 3 4]
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)]);
        let base = dense_constraint_matrix(&a).unwrap();
        let tab = Tableau::factor(&base, 2, 4, &[2, 3], 1e-9).unwrap();

        assert_eq!(tab.head(), &[2, 3]);
        assert_eq!(tab.row(0), &[-1.0, -2.0, 1.0, 0.0]);
        assert_eq!(tab.row(1), &[-3.0, -4.0, 0.0, 1.0]);
    }

    #[test]
    fn test_structural_basis() {
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)]);
        let base = dense_constraint_matrix(&a).unwrap();
        let tab = Tableau::factor(&base, 2, 4, &[0, 1], 1e-9).unwrap();

        // Basic columns become unit vectors
        for i in 0..2 {
            let col = tab.head()[i];
            for r in 0..2 {
                let expected = if r == i { 1.0 } else { 0.0 };
                assert!((tab.get(r, col) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_singular_basis_rejected() {
        // Columns 0 and 1 are parallel
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)]);
        let base = dense_constraint_matrix(&a).unwrap();
        assert!(Tableau::factor(&base, 2, 4, &[0, 1], 1e-9).is_none());
    }
}

//! Sparse matrix types and operations.
//!
//! LP constraint matrices are stored in CSC (Compressed Sparse Column) format.
//! Callers that assemble a relaxation row by row use [`from_rows`].

use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Triplet format sparse matrix builder.
pub type SparseTriMat = TriMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Build a sparse CSC matrix from sparse rows `[(col, value)]`.
///
/// Explicit zeros are dropped.
pub fn from_rows<R>(ncols: usize, rows: &[R]) -> SparseCsc
where
    R: AsRef<[(usize, f64)]>,
{
    let triplets = rows.iter().enumerate().flat_map(|(i, row)| {
        row.as_ref()
            .iter()
            .filter(|(_, v)| *v != 0.0)
            .map(move |&(j, v)| (i, j, v))
    });
    from_triplets(rows.len(), ncols, triplets)
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }

    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[row] += alpha * (*val) * x[col];
        }
    }
}

/// Transpose-vector product: y = alpha * A^T * x + beta * y
pub fn spmv_transpose(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.rows(), x.len());
    assert_eq!(a.cols(), y.len());

    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }

    if alpha != 0.0 {
        for (col_idx, col) in a.outer_iterator().enumerate() {
            for (row_idx, &val) in col.iter() {
                y[col_idx] += alpha * val * x[row_idx];
            }
        }
    }
}

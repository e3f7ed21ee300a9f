//! Small dense linear-algebra kernels.
//!
//! Only what the estimators and the processing crate need: a pivoting
//! linear solver for normal equations and a Jacobi eigen-decomposition for
//! symmetric (covariance) matrices.

use ndarray::{Array1, Array2, Axis};

const SINGULAR_EPS: f64 = 1e-12;

/// Solve `a · x = b` by Gauss-Jordan elimination with partial pivoting.
///
/// Returns `None` when `a` is singular (pivot below `1e-12`) or shapes disagree.
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return None;
    }

    let mut aug = Array2::<f64>::zeros((n, n + 1));
    aug.slice_mut(ndarray::s![.., ..n]).assign(a);
    aug.column_mut(n).assign(b);

    for i in 0..n {
        let (pivot_row, pivot_val) = (i..n)
            .map(|r| (r, aug[[r, i]].abs()))
            .fold((i, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if pivot_val < SINGULAR_EPS {
            return None;
        }
        if pivot_row != i {
            for c in 0..=n {
                aug.swap([i, c], [pivot_row, c]);
            }
        }

        let pivot = aug[[i, i]];
        for c in i..=n {
            aug[[i, c]] /= pivot;
        }
        for r in 0..n {
            if r != i {
                let factor = aug[[r, i]];
                if factor != 0.0 {
                    for c in i..=n {
                        aug[[r, c]] -= factor * aug[[i, c]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Ridge-regularized least squares on already-centred data: `(XᵀX + αI)⁻¹ Xᵀy`.
///
/// Falls back to a tiny ridge when `alpha == 0` and the Gram matrix is singular.
pub fn least_squares(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Option<Array1<f64>> {
    let mut gram = x.t().dot(x);
    let rhs = x.t().dot(y);
    for i in 0..gram.nrows() {
        gram[[i, i]] += alpha;
    }
    solve(&gram, &rhs).or_else(|| {
        if alpha > 0.0 {
            return None;
        }
        for i in 0..gram.nrows() {
            gram[[i, i]] += 1e-8;
        }
        solve(&gram, &rhs)
    })
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Eigenvalues are returned in descending order; column `k` of the vector
/// matrix is the eigenvector for eigenvalue `k`.
pub fn symmetric_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| m[[i, j]] * m[[i, j]])
            .sum();
        if off < 1e-22 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = m[[p, q]];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let mkp = m[[k, p]];
                    let mkq = m[[k, q]];
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let mpk = m[[p, k]];
                    let mqk = m[[q, k]];
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| m[[j, j]].total_cmp(&m[[i, i]]));

    let values = Array1::from_iter(order.iter().map(|&i| m[[i, i]]));
    let vectors = v.select(Axis(1), &order);
    (values, vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_simple_system() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = solve(&a, &b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_solve_requires_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![2.0, 3.0];
        let x = solve(&a, &b).unwrap();
        assert_eq!(x, array![3.0, 2.0]);
    }

    #[test]
    fn test_solve_singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(solve(&a, &array![1.0, 2.0]).is_none());
    }

    #[test]
    fn test_least_squares_recovers_slope() {
        // Centred x and y with slope 2
        let x = array![[-1.0], [0.0], [1.0]];
        let y = array![-2.0, 0.0, 2.0];
        let w = least_squares(&x, &y, 0.0).unwrap();
        assert!((w[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric_eigen_diagonal() {
        let a = array![[1.0, 0.0], [0.0, 3.0]];
        let (values, vectors) = symmetric_eigen(&a);
        assert!((values[0] - 3.0).abs() < 1e-12);
        assert!((values[1] - 1.0).abs() < 1e-12);
        assert!((vectors[[1, 0]].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_eigen_reconstructs() {
        let a = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];
        let (values, vectors) = symmetric_eigen(&a);
        let recon = vectors.dot(&Array2::from_diag(&values)).dot(&vectors.t());
        for (x, y) in recon.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
        assert!(values[0] >= values[1] && values[1] >= values[2]);
    }
}

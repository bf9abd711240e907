//! Sparse least squares for the legacy memory-strength transfer.
//!
//! A minimal CSR matrix plus conjugate gradient on the normal equations
//! with Jacobi preconditioning. Precision needs are modest; negative
//! solution components are dropped by the caller.

/// Compressed sparse row matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Build from `(row, col, value)` triplets. Duplicate coordinates sum.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut sorted: Vec<(usize, usize, f64)> = triplets
            .iter()
            .copied()
            .filter(|&(r, c, v)| {
                debug_assert!(r < rows && c < cols, "triplet ({r}, {c}) out of bounds");
                v != 0.0
            })
            .collect();
        sorted.sort_by_key(|&(r, c, _)| (r, c));

        let mut indptr = vec![0usize; rows + 1];
        let mut indices = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        for (r, c, v) in sorted {
            if indptr[r + 1] > 0
                && indices.len() > indptr[r]
                && indices.last() == Some(&c)
                && indptr[r + 1] == indices.len()
            {
                *values.last_mut().unwrap() += v;
            } else {
                indices.push(c);
                values.push(v);
            }
            indptr[r + 1] = indices.len();
        }
        // Make indptr cumulative over empty rows too.
        for r in 0..rows {
            if indptr[r + 1] < indptr[r] {
                indptr[r + 1] = indptr[r];
            }
        }

        Self {
            rows,
            cols,
            indptr,
            indices,
            values,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `A · x`.
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.cols);
        let mut out = vec![0.0; self.rows];
        for r in 0..self.rows {
            let mut acc = 0.0;
            for k in self.indptr[r]..self.indptr[r + 1] {
                acc += self.values[k] * x[self.indices[k]];
            }
            out[r] = acc;
        }
        out
    }

    /// `Aᵀ · y`.
    pub fn matvec_transpose(&self, y: &[f64]) -> Vec<f64> {
        debug_assert_eq!(y.len(), self.rows);
        let mut out = vec![0.0; self.cols];
        for r in 0..self.rows {
            for k in self.indptr[r]..self.indptr[r + 1] {
                out[self.indices[k]] += self.values[k] * y[r];
            }
        }
        out
    }

    /// Per-column sums of squares: the diagonal of `AᵀA`.
    fn column_squares(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.cols];
        for (k, &c) in self.indices.iter().enumerate() {
            out[c] += self.values[k] * self.values[k];
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Relative tolerance on the normal-equation residual `‖Aᵀ(b − Ax)‖`.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 0, // 0 = derived from the column count
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    DidNotConverge { iterations: usize, residual: f64 },
}

impl std::fmt::Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::DidNotConverge {
                iterations,
                residual,
            } => write!(
                f,
                "least-squares solve did not converge after {iterations} iterations \
                 (residual {residual:.3e})"
            ),
        }
    }
}

impl std::error::Error for SolveError {}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Solve `min ‖A·x − b‖` by preconditioned CG on `AᵀA x = Aᵀb`.
pub fn least_squares(a: &CsrMatrix, b: &[f64], opts: SolveOptions) -> Result<Vec<f64>, SolveError> {
    assert_eq!(b.len(), a.rows());
    let n = a.cols();
    let max_iterations = if opts.max_iterations == 0 {
        4 * n + 100
    } else {
        opts.max_iterations
    };

    // Jacobi preconditioner; empty columns get a unit diagonal so they
    // stay at zero without dividing by zero.
    let diag: Vec<f64> = a
        .column_squares()
        .into_iter()
        .map(|d| if d > 0.0 { d } else { 1.0 })
        .collect();

    let mut x = vec![0.0; n];
    let mut r = a.matvec_transpose(b);
    let target = opts.tolerance * norm(&r).max(f64::MIN_POSITIVE);

    let mut z: Vec<f64> = r.iter().zip(&diag).map(|(ri, di)| ri / di).collect();
    let mut p = z.clone();
    let mut rz = dot(&r, &z);

    for _ in 0..max_iterations {
        let residual = norm(&r);
        if residual <= target {
            return Ok(x);
        }
        let q = a.matvec(&p);
        let qq = dot(&q, &q);
        if qq <= f64::MIN_POSITIVE {
            // Search direction is in the null space; nothing left to gain.
            return Ok(x);
        }
        let alpha = rz / qq;
        for i in 0..n {
            x[i] += alpha * p[i];
        }
        let atq = a.matvec_transpose(&q);
        for i in 0..n {
            r[i] -= alpha * atq[i];
        }
        for i in 0..n {
            z[i] = r[i] / diag[i];
        }
        let rz_next = dot(&r, &z);
        let beta = rz_next / rz;
        rz = rz_next;
        for i in 0..n {
            p[i] = z[i] + beta * p[i];
        }
    }

    let residual = norm(&r);
    if residual <= target {
        Ok(x)
    } else {
        Err(SolveError::DidNotConverge {
            iterations: max_iterations,
            residual,
        })
    }
}

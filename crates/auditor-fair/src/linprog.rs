//! Dense tableau simplex for the small linear programs of the reduction.
//!
//! Only the form `max c·x  s.t.  A x <= b, x >= 0` with `b >= 0` is
//! supported, so the slack basis is an initial feasible point and no phase
//! one is needed. Bland's rule picks pivots, which rules out cycling.

use auditor_common::error::{AuditorError, Result};

const TOL: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct LpSolution {
    pub x: Vec<f64>,
    /// Optimal dual value of each row of `A`
    pub duals: Vec<f64>,
    pub objective: f64,
}

/// Maximise `c·x` subject to `A x <= b` and `x >= 0`.
pub fn maximize(c: &[f64], a: &[Vec<f64>], b: &[f64]) -> Result<LpSolution> {
    let n = c.len();
    let m = a.len();
    if b.len() != m || a.iter().any(|row| row.len() != n) {
        return Err(AuditorError::training("linear program has inconsistent dimensions"));
    }
    if b.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(AuditorError::training("linear program needs a finite non-negative right-hand side"));
    }

    let width = n + m + 1;
    let rhs = width - 1;
    let mut rows: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .enumerate()
        .map(|(i, (coeffs, bi))| {
            let mut row = vec![0.0; width];
            row[..n].copy_from_slice(coeffs);
            row[n + i] = 1.0;
            row[rhs] = *bi;
            row
        })
        .collect();
    let mut objective = vec![0.0; width];
    for (o, cj) in objective.iter_mut().zip(c) {
        *o = -cj;
    }
    let mut basis: Vec<usize> = (n..n + m).collect();

    let max_pivots = 100 * (n + m) + 1000;
    for _ in 0..max_pivots {
        let Some(entering) = (0..n + m).find(|&j| objective[j] < -TOL) else {
            let mut x = vec![0.0; n];
            for (row, &var) in rows.iter().zip(&basis) {
                if var < n {
                    x[var] = row[rhs];
                }
            }
            return Ok(LpSolution {
                x,
                duals: objective[n..n + m].to_vec(),
                objective: objective[rhs],
            });
        };

        let mut leaving: Option<(usize, f64)> = None;
        for (i, row) in rows.iter().enumerate() {
            if row[entering] <= TOL {
                continue;
            }
            let ratio = row[rhs] / row[entering];
            leaving = match leaving {
                Some((r, best)) if ratio > best + TOL => Some((r, best)),
                Some((r, best)) if ratio >= best - TOL && basis[r] < basis[i] => Some((r, best)),
                _ => Some((i, ratio)),
            };
        }
        let (pivot_row, _) = leaving.ok_or_else(|| AuditorError::training("linear program is unbounded"))?;

        pivot(&mut rows, &mut objective, pivot_row, entering);
        basis[pivot_row] = entering;
    }

    Err(AuditorError::training("simplex did not converge"))
}

fn pivot(rows: &mut [Vec<f64>], objective: &mut [f64], r: usize, e: usize) {
    let p = rows[r][e];
    for v in rows[r].iter_mut() {
        *v /= p;
    }
    let pivot_row = rows[r].clone();

    let eliminate = |target: &mut [f64]| {
        let f = target[e];
        if f != 0.0 {
            for (t, pv) in target.iter_mut().zip(&pivot_row) {
                *t -= f * pv;
            }
        }
    };
    for (i, row) in rows.iter_mut().enumerate() {
        if i != r {
            eliminate(row.as_mut_slice());
        }
    }
    eliminate(objective);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_textbook_problem() {
        // max 3x + 2y  s.t.  x + y <= 4, x + 3y <= 6, x <= 2
        let a = vec![vec![1.0, 1.0], vec![1.0, 3.0], vec![1.0, 0.0]];
        let sol = maximize(&[3.0, 2.0], &a, &[4.0, 6.0, 2.0]).unwrap();
        assert!(close(sol.objective, 26.0 / 3.0));
        assert!(close(sol.x[0], 2.0) && close(sol.x[1], 4.0 / 3.0));
        // rows 2 and 3 bind; strong duality b·y = objective
        assert!(close(sol.duals[0], 0.0));
        assert!(close(sol.duals[1], 2.0 / 3.0));
        assert!(close(sol.duals[2], 7.0 / 3.0));
    }

    #[test]
    fn test_degenerate_origin() {
        // max x  s.t.  x - y <= 0, y <= 2
        let a = vec![vec![1.0, -1.0], vec![0.0, 1.0]];
        let sol = maximize(&[1.0, 0.0], &a, &[0.0, 2.0]).unwrap();
        assert!(close(sol.objective, 2.0));
    }

    #[test]
    fn test_unbounded() {
        let a = vec![vec![-1.0]];
        assert!(maximize(&[1.0], &a, &[1.0]).is_err());
    }

    #[test]
    fn test_rejects_negative_rhs() {
        assert!(maximize(&[1.0], &[vec![1.0]], &[-1.0]).is_err());
    }
}

//! Hungarian (Kuhn-Munkres) assignment on a rectangular cost matrix.
//!
//! Tracks (rows) are matched against detections (columns) by minimizing
//! total cost, here `1 - IoU`. The production-grade rule in this spec is
//! Hungarian assignment with a post-hoc `IoU > iou_threshold` gate, since
//! the assignment itself does not know about the gate.

/// Solve the rectangular assignment problem for `cost[row][col]`, minimizing
/// total cost. Returns one entry per row that has *some* matched column,
/// as `(row, col)`. Rows or columns that end up paired with a padding
/// dummy (when the matrix is non-square) are omitted from the result.
///
/// `n_rows` and `n_cols` may differ; internally the matrix is padded to
/// square with a cost higher than any real entry so padding never wins a
/// real assignment it shouldn't.
pub fn hungarian_assignment(cost: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let n_rows = cost.len();
    if n_rows == 0 {
        return vec![];
    }
    let n_cols = cost[0].len();
    if n_cols == 0 {
        return vec![];
    }

    let n = n_rows.max(n_cols);
    let pad_cost = cost
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(0.0_f64, f64::max)
        + 1.0;

    // 1-indexed classic Hungarian algorithm (Kuhn-Munkres with potentials),
    // O(n^3), square matrix `a[1..=n][1..=n]`.
    let mut a = vec![vec![0.0_f64; n + 1]; n + 1];
    for (i, row) in a.iter_mut().enumerate().take(n + 1).skip(1) {
        for (j, cell) in row.iter_mut().enumerate().take(n + 1).skip(1) {
            *cell = if i <= n_rows && j <= n_cols {
                cost[i - 1][j - 1]
            } else {
                pad_cost
            };
        }
    }

    let inf = f64::INFINITY;
    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; n + 1];
    let mut p = vec![0usize; n + 1]; // p[j] = row matched to column j
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![inf; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = inf;
            let mut j1 = 0usize;
            for j in 1..=n {
                if !used[j] {
                    let cur = a[i0][j] - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut result = Vec::with_capacity(n_rows.min(n_cols));
    for j in 1..=n {
        let i = p[j];
        if i >= 1 && i <= n_rows && j <= n_cols {
            result.push((i - 1, j - 1));
        }
    }
    result.sort_unstable();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_matrix_minimizes_total_cost() {
        let cost = vec![
            vec![4.0, 1.0, 3.0],
            vec![2.0, 0.0, 5.0],
            vec![3.0, 2.0, 2.0],
        ];
        let matches = hungarian_assignment(&cost);
        assert_eq!(matches.len(), 3);
        let total: f64 = matches.iter().map(|&(i, j)| cost[i][j]).sum();
        // optimal assignment here is (0,2)=3 + (1,1)=0 + (2,0)=3 = 6
        approx::assert_relative_eq!(total, 6.0);
    }

    #[test]
    fn rectangular_more_rows_than_cols() {
        let cost = vec![vec![0.1, 0.9], vec![0.9, 0.1], vec![0.5, 0.5]];
        let matches = hungarian_assignment(&cost);
        // Only 2 columns exist, so at most 2 rows can be matched.
        assert!(matches.len() <= 2);
        let cols: Vec<usize> = matches.iter().map(|&(_, j)| j).collect();
        let mut sorted = cols.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), cols.len());
    }

    #[test]
    fn empty_matrix_yields_no_matches() {
        let cost: Vec<Vec<f64>> = vec![];
        assert!(hungarian_assignment(&cost).is_empty());
    }
}

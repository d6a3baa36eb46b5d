/// Row-block product using the textbook i-j-k loop order.
///
/// Each output element is a dot product of a row of `a` with a column of
/// `b`, summed over `p` in ascending order. The innermost loop walks B with
/// stride `n`, so this is the slow reference, not the default.
///
/// # Arguments
///
/// * `a` - Row block of A (rows × k), row-major
/// * `b` - Full operand B (k × n), row-major
/// * `c` - Row block of C (rows × n), row-major, accumulated into (C += A * B)
/// * `rows` - Rows in this block (may be zero)
/// * `n` - Columns of B and C
/// * `k` - Columns of A, rows of B
pub fn matmul_naive_ijk(a: &[f64], b: &[f64], c: &mut [f64], rows: usize, n: usize, k: usize) {
    for i in 0..rows {
        for j in 0..n {
            let mut acc = c[i * n + j];
            for p in 0..k {
                acc += a[i * k + p] * b[p * n + j];
            }
            c[i * n + j] = acc;
        }
    }
}

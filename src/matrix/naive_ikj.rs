/// Row-block product using the cache-friendly i-k-j loop order.
///
/// Swapping the j and p loops makes the innermost loop walk both B and C
/// with stride 1. Every `c[i][j]` still receives its `a[i][p] * b[p][j]`
/// terms in ascending `p`, so the result is bit-identical to
/// [`matmul_naive_ijk`](super::naive_ijk::matmul_naive_ijk).
///
/// # Arguments
///
/// * `a` - Row block of A (rows × k), row-major
/// * `b` - Full operand B (k × n), row-major
/// * `c` - Row block of C (rows × n), row-major, accumulated into (C += A * B)
/// * `rows` - Rows in this block (may be zero)
/// * `n` - Columns of B and C
/// * `k` - Columns of A, rows of B
pub fn matmul_naive_ikj(a: &[f64], b: &[f64], c: &mut [f64], rows: usize, n: usize, k: usize) {
    for i in 0..rows {
        let c_row = &mut c[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            let b_row = &b[p * n..(p + 1) * n];
            for (c_ij, b_pj) in c_row.iter_mut().zip(b_row) {
                *c_ij += a_ip * b_pj;
            }
        }
    }
}

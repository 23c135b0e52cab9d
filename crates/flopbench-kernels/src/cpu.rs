//! CPU reference kernels.
//!
//! Each function computes over a caller-supplied partition so that worker
//! threads write disjoint output regions without any locking. The inner
//! loops mirror the device kernels exactly, which keeps the host and
//! accelerator results comparable within the verification tolerance.

/// Multiply a block of rows of an `n`×`n` matrix product.
///
/// `a` and `b` are full `n`×`n` matrices in row-major order; `c_block`
/// receives rows `first_row .. first_row + c_block.len() / n`.
///
/// # Panics
///
/// Panics if `c_block.len()` is not a multiple of `n`, or if the block
/// extends past row `n`.
pub fn matmul_row_block(a: &[f32], b: &[f32], c_block: &mut [f32], n: usize, first_row: usize) {
    assert_eq!(c_block.len() % n, 0, "output block must hold whole rows");
    let rows = c_block.len() / n;
    assert!(first_row + rows <= n, "row block out of range");

    for (local_row, out_row) in c_block.chunks_exact_mut(n).enumerate() {
        let row = first_row + local_row;
        for (col, out) in out_row.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for k in 0..n {
                sum += a[row * n + k] * b[k * n + col];
            }
            *out = sum;
        }
    }
}

/// FMA stress pass over one partition of the element range.
///
/// For each element, runs `iterations` loop trips of four fused
/// multiply-adds, accumulating into `c`.
///
/// # Panics
///
/// Panics if the three slices differ in length.
pub fn fma_stress_block(a: &[f32], b: &[f32], c: &mut [f32], iterations: u32) {
    assert_eq!(a.len(), c.len());
    assert_eq!(b.len(), c.len());

    for ((&va, &vb), out) in a.iter().zip(b.iter()).zip(c.iter_mut()) {
        let mut vc = *out;
        for _ in 0..iterations {
            vc = va.mul_add(vb, vc);
            vc = va.mul_add(vb, vc);
            vc = va.mul_add(vb, vc);
            vc = va.mul_add(vb, vc);
        }
        *out = vc;
    }
}

/// Single-threaded reference for one output element of the matrix product.
///
/// Used by the correctness spot-check: recomputes `C[row][col]` directly
/// from the inputs, independent of any parallel path.
#[must_use]
pub fn reference_element(a: &[f32], b: &[f32], n: usize, row: usize, col: usize) -> f32 {
    let mut sum = 0.0f32;
    for k in 0..n {
        sum += a[row * n + k] * b[k * n + col];
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn full_matmul(a: &[f32], b: &[f32], n: usize) -> Vec<f32> {
        let mut c = vec![0.0f32; n * n];
        matmul_row_block(a, b, &mut c, n, 0);
        c
    }

    #[test]
    fn identity_times_matrix_is_matrix() {
        let n = 4;
        let mut identity = vec![0.0f32; n * n];
        for i in 0..n {
            identity[i * n + i] = 1.0;
        }
        let m: Vec<f32> = (0..n * n).map(|i| i as f32 * 0.25).collect();

        let c = full_matmul(&identity, &m, n);
        assert_eq!(c, m);
    }

    #[test]
    fn row_block_matches_full_product() {
        let n = 8;
        let a: Vec<f32> = (0..n * n).map(|i| (i % 7) as f32).collect();
        let b: Vec<f32> = (0..n * n).map(|i| (i % 5) as f32 * 0.5).collect();

        let full = full_matmul(&a, &b, n);

        // Compute rows 3..6 as an isolated block.
        let mut block = vec![0.0f32; 3 * n];
        matmul_row_block(&a, &b, &mut block, n, 3);
        assert_eq!(&full[3 * n..6 * n], &block[..]);
    }

    #[test]
    fn reference_element_agrees_with_full_product() {
        let n = 6;
        let a: Vec<f32> = (0..n * n).map(|i| (i as f32).sin()).collect();
        let b: Vec<f32> = (0..n * n).map(|i| (i as f32).cos()).collect();

        let full = full_matmul(&a, &b, n);
        for &(row, col) in &[(0, 0), (2, 5), (5, 0)] {
            let r = reference_element(&a, &b, n, row, col);
            assert!((full[row * n + col] - r).abs() < 1e-4);
        }
    }

    #[test]
    fn fma_stress_closed_form() {
        // Starting from c = 0 with a = 1 and b = 2, each iteration adds
        // 4 * a * b, so after k iterations c = 8k.
        let a = vec![1.0f32; 16];
        let b = vec![2.0f32; 16];
        let mut c = vec![0.0f32; 16];
        fma_stress_block(&a, &b, &mut c, 10);
        for &v in &c {
            assert!((v - 80.0).abs() < 1e-3);
        }
    }

    #[test]
    #[should_panic(expected = "whole rows")]
    fn ragged_output_block_panics() {
        let a = vec![0.0f32; 16];
        let b = vec![0.0f32; 16];
        let mut c = vec![0.0f32; 6];
        matmul_row_block(&a, &b, &mut c, 4, 0);
    }

    proptest! {
        #[test]
        fn block_decomposition_covers_full_matrix(split in 1usize..7) {
            let n = 8;
            let a: Vec<f32> = (0..n * n).map(|i| (i % 11) as f32).collect();
            let b: Vec<f32> = (0..n * n).map(|i| (i % 13) as f32).collect();

            let full = full_matmul(&a, &b, n);

            let mut c = vec![0.0f32; n * n];
            let (top, bottom) = c.split_at_mut(split * n);
            matmul_row_block(&a, &b, top, n, 0);
            matmul_row_block(&a, &b, bottom, n, split);

            prop_assert_eq!(full, c);
        }
    }
}

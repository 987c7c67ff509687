//! Tensor Operations for the Recurrent Network
//!
//! A minimal tensor type tailored to what an Elman network needs: dense
//! row-major storage, 2D matrix multiplication, bias broadcasting, and
//! row-wise softmax/argmax for the output distributions.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f32>` storing all elements in row-major order
//! - **Shape**: Dimensions of the tensor (e.g., `[seq_len, hidden]`)
//! - **Strides**: Step sizes for each dimension to compute flat indices
//!
//! ## Example
//!
//! ```rust
//! use elman::Tensor;
//!
//! let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
//! let b = Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]);
//! let c = a.matmul(&b);
//! assert_eq!(c.shape, vec![2, 2]);
//! ```
//!
//! ## Performance
//!
//! Matrix multiplication switches to a parallel cache-blocked algorithm
//! (via Rayon) once the operation count crosses a threshold; element-wise
//! operations over large buffers are parallelized the same way. Small
//! tensors stay sequential to avoid parallel overhead.

use rayon::prelude::*;

/// A dense multi-dimensional array of `f32` values.
///
/// Data is stored contiguously in row-major (C-style) order. For shape
/// `[2, 3]` the layout is `[r0c0, r0c1, r0c2, r1c0, r1c1, r1c2]` and the
/// strides are `[3, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage of all tensor elements
    pub data: Vec<f32>,
    /// Shape of the tensor (dimensions)
    pub shape: Vec<usize>,
    /// Strides for each dimension (computed from shape)
    pub strides: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor with given data and shape.
    ///
    /// # Panics
    ///
    /// Panics if the product of shape dimensions doesn't equal data length.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );

        let strides = Self::compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Compute strides from shape (row-major layout).
    ///
    /// For shape `[d0, d1, d2]`, strides are `[d1*d2, d2, 1]`.
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Number of rows of a 2D tensor.
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    /// Number of columns of a 2D tensor.
    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    /// Borrow row `i` of a 2D tensor as a slice.
    pub fn row(&self, i: usize) -> &[f32] {
        let cols = self.cols();
        &self.data[i * cols..(i + 1) * cols]
    }

    /// Mutably borrow row `i` of a 2D tensor.
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let cols = self.cols();
        &mut self.data[i * cols..(i + 1) * cols]
    }

    /// 2D matrix multiplication.
    ///
    /// For `A @ B` where `A` is `[m, k]` and `B` is `[k, n]`, the result has
    /// shape `[m, n]` with `C[i,j] = sum(A[i,l] * B[l,j])`.
    ///
    /// # Performance
    ///
    /// - Small matrices (< 1K multiply-adds): sequential triple loop
    /// - Larger matrices: parallel cache-blocked algorithm (see below)
    ///
    /// # Panics
    ///
    /// Panics if either operand is not 2D or the inner dimensions differ.
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert!(
            self.shape.len() == 2 && other.shape.len() == 2,
            "matmul expects 2D operands, got {:?} @ {:?}",
            self.shape,
            other.shape
        );
        assert_eq!(
            self.shape[1], other.shape[0],
            "Matrix dimensions incompatible: [{}, {}] @ [{}, {}]",
            self.shape[0], self.shape[1], other.shape[0], other.shape[1]
        );

        let m = self.shape[0];
        let k = self.shape[1];
        let n = other.shape[1];

        // Work threshold balancing parallel overhead against gains
        if m * n * k >= 1_000 {
            return self.matmul_parallel_blocked(other, m, n, k);
        }

        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for l in 0..k {
                let a_val = self.data[i * k + l];
                for j in 0..n {
                    result[i * n + j] += a_val * other.data[l * n + j];
                }
            }
        }

        Tensor::new(result, vec![m, n])
    }

    /// Parallel cache-blocked matrix multiplication.
    ///
    /// Distributes blocks of output rows across CPU cores via Rayon and
    /// walks the inner dimension in blocks so the right-hand rows stay hot
    /// in cache. The innermost loop is a plain `+=` scan that LLVM can
    /// auto-vectorize.
    fn matmul_parallel_blocked(&self, other: &Tensor, m: usize, n: usize, k: usize) -> Tensor {
        const BLOCK_SIZE: usize = 8;

        let mut result = vec![0.0; m * n];

        result
            .par_chunks_mut(BLOCK_SIZE * n)
            .enumerate()
            .for_each(|(block_i, result_block)| {
                let i_start = block_i * BLOCK_SIZE;
                let i_end = (i_start + BLOCK_SIZE).min(m);

                for k_start in (0..k).step_by(BLOCK_SIZE) {
                    let k_end = (k_start + BLOCK_SIZE).min(k);

                    for i in i_start..i_end {
                        let row_offset = (i - i_start) * n;
                        for l in k_start..k_end {
                            let a_val = self.data[i * k + l];
                            let b_row = &other.data[l * n..l * n + n];
                            let out_row = &mut result_block[row_offset..row_offset + n];
                            for (r, &b_val) in out_row.iter_mut().zip(b_row.iter()) {
                                *r += a_val * b_val;
                            }
                        }
                    }
                }
            });

        Tensor::new(result, vec![m, n])
    }

    /// Element-wise addition with last-dimension broadcast.
    ///
    /// Supports two patterns:
    ///
    /// 1. **Exact match**: same shape
    /// 2. **Broadcast last dim**: `[*, n] + [n]` (bias addition)
    ///
    /// # Panics
    ///
    /// Panics on any other shape combination.
    pub fn add(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .par_iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        if self.shape.len() > other.shape.len() {
            let last_dim = *self.shape.last().unwrap();
            if other.data.len() == last_dim {
                let result: Vec<f32> = (0..self.data.len())
                    .into_par_iter()
                    .map(|i| self.data[i] + other.data[i % last_dim])
                    .collect();
                return Tensor::new(result, self.shape.clone());
            }
        }

        panic!(
            "Unsupported broadcast for add: {:?} + {:?}",
            self.shape, other.shape
        );
    }

    /// Multiply all elements by a scalar.
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let result = self.data.par_iter().map(|&x| x * scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Transpose a 2D tensor.
    pub fn transpose(&self) -> Tensor {
        assert_eq!(
            self.shape.len(),
            2,
            "transpose expects a 2D tensor, got {:?}",
            self.shape
        );
        let rows = self.shape[0];
        let cols = self.shape[1];
        let mut result = vec![0.0; rows * cols];

        for i in 0..rows {
            for j in 0..cols {
                result[j * rows + i] = self.data[i * cols + j];
            }
        }

        Tensor::new(result, vec![cols, rows])
    }

    /// Row-wise softmax of a 2D tensor.
    ///
    /// Uses the numerically stable form, subtracting each row's maximum
    /// before exponentiating:
    ///
    /// ```text
    /// softmax(x)[i] = exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))
    /// ```
    ///
    /// Each output row sums to 1.0.
    pub fn softmax_rows(&self) -> Tensor {
        assert_eq!(
            self.shape.len(),
            2,
            "softmax_rows expects a 2D tensor, got {:?}",
            self.shape
        );
        let rows = self.shape[0];
        let cols = self.shape[1];

        let result: Vec<f32> = (0..rows)
            .into_par_iter()
            .flat_map_iter(|i| {
                let row = &self.data[i * cols..(i + 1) * cols];

                let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                let exp_values: Vec<f32> = row.iter().map(|&x| (x - max).exp()).collect();
                let sum: f32 = exp_values.iter().sum();

                exp_values.into_iter().map(move |val| val / sum)
            })
            .collect();

        Tensor::new(result, self.shape.clone())
    }

    /// Index of the maximum element in each row of a 2D tensor.
    ///
    /// Ties resolve to the earliest index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        assert_eq!(
            self.shape.len(),
            2,
            "argmax_rows expects a 2D tensor, got {:?}",
            self.shape
        );
        let cols = self.shape[1];

        self.data
            .chunks(cols)
            .map(|row| {
                let mut best = 0;
                for (j, &val) in row.iter().enumerate() {
                    if val > row[best] {
                        best = j;
                    }
                }
                best
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_computes_strides() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        assert_eq!(t.strides, vec![2, 1]);
    }

    #[test]
    #[should_panic]
    fn test_new_rejects_mismatched_shape() {
        Tensor::new(vec![1.0, 2.0, 3.0], vec![2, 2]);
    }

    #[test]
    fn test_matmul_identity() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let id = Tensor::new(vec![1.0, 0.0, 0.0, 1.0], vec![2, 2]);
        let c = a.matmul(&id);
        assert_eq!(c.data, a.data);
    }

    #[test]
    fn test_matmul_rectangular() {
        // [2,3] @ [3,1]
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let b = Tensor::new(vec![1.0, 1.0, 1.0], vec![3, 1]);
        let c = a.matmul(&b);
        assert_eq!(c.shape, vec![2, 1]);
        assert_eq!(c.data, vec![6.0, 15.0]);
    }

    #[test]
    fn test_matmul_parallel_matches_sequential() {
        // Large enough to cross the parallel threshold
        let m = 33;
        let k = 17;
        let n = 29;
        let a_data: Vec<f32> = (0..m * k).map(|i| (i % 7) as f32 - 3.0).collect();
        let b_data: Vec<f32> = (0..k * n).map(|i| (i % 5) as f32 - 2.0).collect();
        let a = Tensor::new(a_data, vec![m, k]);
        let b = Tensor::new(b_data, vec![k, n]);

        let fast = a.matmul(&b);

        let mut slow = vec![0.0f32; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for l in 0..k {
                    sum += a.data[i * k + l] * b.data[l * n + j];
                }
                slow[i * n + j] = sum;
            }
        }

        for (x, y) in fast.data.iter().zip(slow.iter()) {
            assert!(
                (x - y).abs() < 1e-4,
                "parallel matmul diverged: {} vs {}",
                x,
                y
            );
        }
    }

    #[test]
    fn test_add_broadcast_bias() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let bias = Tensor::new(vec![10.0, 20.0], vec![2]);
        let y = x.add(&bias);
        assert_eq!(y.data, vec![11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn test_transpose() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let t = a.transpose();
        assert_eq!(t.shape, vec![3, 2]);
        assert_eq!(t.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0], vec![2, 3]);
        let s = x.softmax_rows();
        for i in 0..2 {
            let sum: f32 = s.row(i).iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
        // Larger logit gets larger probability
        assert!(s.data[2] > s.data[1] && s.data[1] > s.data[0]);
    }

    #[test]
    fn test_softmax_rows_stable_for_large_logits() {
        let x = Tensor::new(vec![1000.0, 1001.0], vec![1, 2]);
        let s = x.softmax_rows();
        assert!(s.data.iter().all(|v| v.is_finite()));
        assert!((s.data.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_rows() {
        let x = Tensor::new(vec![0.1, 0.9, 0.5, 0.2, 0.2, 0.6], vec![2, 3]);
        assert_eq!(x.argmax_rows(), vec![1, 2]);
    }
}

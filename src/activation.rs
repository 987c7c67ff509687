//! Activation Functions
//!
//! The Elman recurrence squashes its hidden pre-activation through the
//! logistic sigmoid. Both directions operate on plain slices, since the
//! recurrence walks the sequence one hidden-state row at a time.
//!
//! ## Sigmoid
//!
//! ```text
//! σ(x) = 1 / (1 + exp(-x))
//! ```
//!
//! The derivative has a convenient form in terms of the *output*:
//!
//! ```text
//! σ'(x) = σ(x) × (1 - σ(x))
//! ```
//!
//! which means the backward pass only needs the activated value, not the
//! pre-activation. The forward cache therefore stores hidden states after
//! the sigmoid and nothing else.

/// Sigmoid activation (forward pass), applied element-wise in place.
pub fn sigmoid_forward(x: &mut [f32]) {
    for val in x.iter_mut() {
        *val = 1.0 / (1.0 + (-*val).exp());
    }
}

/// Sigmoid derivative (backward pass).
///
/// # Arguments
///
/// * `grad_out` - Gradient from the next operation
/// * `activated` - The sigmoid *output* cached during forward
///
/// # Returns
///
/// Gradient with respect to the pre-activation: `grad_out * y * (1 - y)`
pub fn sigmoid_backward(grad_out: &[f32], activated: &[f32]) -> Vec<f32> {
    grad_out
        .iter()
        .zip(activated.iter())
        .map(|(&grad_val, &y)| grad_val * y * (1.0 - y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_forward_range() {
        let mut x = vec![-10.0, -1.0, 0.0, 1.0, 10.0];
        sigmoid_forward(&mut x);
        assert!(x.iter().all(|&v| v > 0.0 && v < 1.0));
        assert!((x[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_backward_matches_finite_difference() {
        let x = vec![0.3, -0.7, 1.2];
        let mut y = x.clone();
        sigmoid_forward(&mut y);
        let grad = sigmoid_backward(&[1.0, 1.0, 1.0], &y);

        let eps = 1e-3;
        for i in 0..3 {
            let mut xp = x.clone();
            xp[i] += eps;
            sigmoid_forward(&mut xp);
            let mut xm = x.clone();
            xm[i] -= eps;
            sigmoid_forward(&mut xm);
            let numeric = (xp[i] - xm[i]) / (2.0 * eps);
            assert!(
                (grad[i] - numeric).abs() < 1e-3,
                "analytic {} vs numeric {}",
                grad[i],
                numeric
            );
        }
    }

    #[test]
    fn test_sigmoid_backward_scales_with_upstream_gradient() {
        let y = vec![0.25, 0.75];
        let unit = sigmoid_backward(&[1.0, 1.0], &y);
        let doubled = sigmoid_backward(&[2.0, 2.0], &y);
        assert_eq!(doubled[0], 2.0 * unit[0]);
        assert_eq!(doubled[1], 2.0 * unit[1]);
    }
}

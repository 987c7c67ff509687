//! Gradient Utilities
//!
//! Helpers for working with gradients during training: measuring the global
//! gradient magnitude and clipping it when it grows too large.
//!
//! The training step itself applies plain gradient descent; these utilities
//! are for external training drivers that compute gradients via
//! [`Elman::backward`](crate::Elman::backward) and want to monitor or clip
//! them before calling
//! [`Elman::apply_gradients`](crate::Elman::apply_gradients).
//!
//! ## Algorithm
//!
//! ```text
//! norm = √(Σ gradient²)        // L2 norm over all parameters
//! if norm > max_norm:
//!     gradients *= (max_norm / norm)
//! ```
//!
//! All gradients are scaled by the same factor, preserving their relative
//! magnitudes while limiting the total update magnitude.

use crate::model::ElmanGradients;
use rayon::prelude::*;

/// Compute the L2 norm over all gradient values of all parameters.
pub fn compute_grad_norm(grads: &ElmanGradients) -> f32 {
    let sum_sq: f32 = grads
        .tensors()
        .iter()
        .map(|tensor| tensor.data.par_iter().map(|&val| val * val).sum::<f32>())
        .sum();

    sum_sq.sqrt()
}

/// Clip gradients to a maximum norm, in place.
///
/// When the global norm exceeds `max_norm`, every gradient is scaled
/// proportionally so the norm becomes exactly `max_norm`. Does nothing when
/// the norm is already within bounds.
pub fn clip_gradients(grads: &mut ElmanGradients, max_norm: f32) {
    let norm = compute_grad_norm(grads);

    if norm > max_norm {
        let scale = max_norm / norm;
        for tensor in grads.tensors_mut() {
            *tensor = tensor.mul_scalar(scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Elman};

    fn config() -> Config {
        Config {
            hidden_size: 4,
            num_classes: 2,
            vocab_size: 6,
            embed_dim: 2,
            context_size: 1,
        }
    }

    #[test]
    fn test_grad_norm_of_zero_gradients() {
        let grads = ElmanGradients::zeros(&config());
        assert_eq!(compute_grad_norm(&grads), 0.0);
    }

    #[test]
    fn test_grad_norm_single_value() {
        let mut grads = ElmanGradients::zeros(&config());
        grads.wh.data[0] = 3.0;
        grads.b.data[1] = 4.0;
        assert!((compute_grad_norm(&grads) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_clip_rescales_to_max_norm() {
        let mut grads = ElmanGradients::zeros(&config());
        grads.wx.data[0] = 6.0;
        grads.wx.data[1] = 8.0; // norm 10

        clip_gradients(&mut grads, 1.0);

        assert!((compute_grad_norm(&grads) - 1.0).abs() < 1e-5);
        // Relative magnitudes preserved
        assert!((grads.wx.data[1] / grads.wx.data[0] - 8.0 / 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_clip_leaves_small_gradients_alone() {
        let mut grads = ElmanGradients::zeros(&config());
        grads.h0.data[0] = 0.5;

        clip_gradients(&mut grads, 1.0);

        assert_eq!(grads.h0.data[0], 0.5);
    }

    #[test]
    fn test_clip_on_real_gradients() {
        let model = Elman::new(&config());
        let windows = vec![vec![1], vec![2], vec![3]];
        let (_, cache) = model.forward(&windows);

        let mut grads = model.backward(0, &cache);
        let tiny = 1e-3;
        clip_gradients(&mut grads, tiny);

        assert!(compute_grad_norm(&grads) <= tiny + 1e-6);
    }
}

//! Elman Network for Sequence Labeling
//!
//! This module implements a complete Elman-style recurrent network from
//! scratch: parameter initialization, the recurrent forward pass, a
//! hand-coded backward pass through time, and the gradient-descent training
//! step.
//!
//! ## Architecture Overview
//!
//! ```text
//! Input windows [seq_len, context_size]  (token ids)
//!     ↓ embedding lookup + concat
//! x [seq_len, embed_dim * context_size]
//!     ↓ recurrence, starting from h0
//! h_t = sigmoid(x_t @ wx + h_{t-1} @ wh + bh)
//!     ↓ output projection
//! s_t = softmax(h_t @ w + b)   [seq_len, num_classes]
//! ```
//!
//! The model predicts one class distribution per sequence position. Training
//! uses the **last** position's distribution (one label per sequence);
//! inference returns the argmax class at **every** position.
//!
//! ## Backpropagation Through Time
//!
//! Unlike autograd frameworks, every gradient here is computed explicitly.
//! The loss is the negative log-likelihood of the gold label under the final
//! distribution; its gradient enters at the last step (the fused softmax/NLL
//! form `p - onehot(label)`) and flows backward through every recurrence
//! step, accumulating into the weights, the embedding rows that were looked
//! up, and the initial hidden state.
//!
//! ## Example
//!
//! ```rust
//! use elman::{Config, Elman};
//!
//! let config = Config {
//!     hidden_size: 5,
//!     num_classes: 2,
//!     vocab_size: 10,
//!     embed_dim: 3,
//!     context_size: 2,
//! };
//! let mut model = Elman::new(&config);
//!
//! let windows = vec![vec![1, 2], vec![3, 4]];
//! let loss = model.train(&windows, 0, 0.1);
//! assert!(loss.is_finite());
//!
//! let labels = model.classify(&windows);
//! assert_eq!(labels.len(), 2);
//! ```

use crate::activation::{sigmoid_backward, sigmoid_forward};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Scale of the uniform range used for weight initialization.
const INIT_SCALE: f32 = 0.2;

/// Model hyperparameters.
///
/// Fixed at construction; every parameter shape derives from these. The
/// configuration is persisted alongside the weights so a saved model can be
/// reconstructed exactly.
///
/// # Fields
///
/// - `hidden_size`: Dimension of the hidden state
/// - `num_classes`: Number of output classes
/// - `vocab_size`: Number of word embeddings in the vocabulary (the
///   embedding table holds one extra row used as a padding vector)
/// - `embed_dim`: Dimension of each word embedding
/// - `context_size`: Token ids per context window (one window per position)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub hidden_size: usize,
    pub num_classes: usize,
    pub vocab_size: usize,
    pub embed_dim: usize,
    pub context_size: usize,
}

impl Config {
    /// Width of one embedded input row: `embed_dim * context_size`.
    pub fn input_size(&self) -> usize {
        self.embed_dim * self.context_size
    }
}

/// Uniform random initialization in `[-scale, scale]`.
///
/// Seeded per tensor for reproducible construction.
pub(crate) fn uniform_init(size: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::new_inclusive(-scale, scale);
    (0..size).map(|_| dist.sample(&mut rng)).collect()
}

/// The Elman network parameter store.
///
/// All seven parameters are plain tensors mutated in place by [`train`] and
/// [`normalize`]; their shapes never change after construction.
///
/// | name  | shape                                  | role                  |
/// |-------|----------------------------------------|-----------------------|
/// | `emb` | `[vocab_size + 1, embed_dim]`          | embedding table       |
/// | `wx`  | `[embed_dim * context_size, hidden]`   | input-to-hidden       |
/// | `wh`  | `[hidden, hidden]`                     | hidden-to-hidden      |
/// | `w`   | `[hidden, num_classes]`                | output projection     |
/// | `bh`  | `[hidden]`                             | hidden bias           |
/// | `b`   | `[num_classes]`                        | output bias           |
/// | `h0`  | `[hidden]`                             | initial hidden state  |
///
/// [`train`]: Elman::train
/// [`normalize`]: Elman::normalize
#[derive(Debug)]
pub struct Elman {
    pub(crate) emb: Tensor,
    pub(crate) wx: Tensor,
    pub(crate) wh: Tensor,
    pub(crate) w: Tensor,
    pub(crate) bh: Tensor,
    pub(crate) b: Tensor,
    pub(crate) h0: Tensor,
    pub(crate) config: Config,
}

impl Elman {
    /// Create a freshly initialized model.
    ///
    /// Weight matrices and the embedding table are drawn uniformly from
    /// `[-0.2, 0.2]`; biases and the initial hidden state start at zero.
    /// Each tensor uses its own fixed seed, so construction is deterministic.
    pub fn new(config: &Config) -> Self {
        let nh = config.hidden_size;
        let nc = config.num_classes;
        let ne = config.vocab_size;
        let de = config.embed_dim;
        let input_size = config.input_size();

        // One extra embedding row reserved for padding
        let emb = Tensor::new(
            uniform_init((ne + 1) * de, 12345, INIT_SCALE),
            vec![ne + 1, de],
        );
        let wx = Tensor::new(
            uniform_init(input_size * nh, 23456, INIT_SCALE),
            vec![input_size, nh],
        );
        let wh = Tensor::new(uniform_init(nh * nh, 34567, INIT_SCALE), vec![nh, nh]);
        let w = Tensor::new(uniform_init(nh * nc, 45678, INIT_SCALE), vec![nh, nc]);

        Self {
            emb,
            wx,
            wh,
            w,
            bh: Tensor::zeros(vec![nh]),
            b: Tensor::zeros(vec![nc]),
            h0: Tensor::zeros(vec![nh]),
            config: config.clone(),
        }
    }

    /// Assemble a model from previously trained parameters.
    ///
    /// Used by checkpoint loading. Shapes must already match the config.
    pub(crate) fn from_parts(
        config: Config,
        emb: Tensor,
        wx: Tensor,
        wh: Tensor,
        w: Tensor,
        bh: Tensor,
        b: Tensor,
        h0: Tensor,
    ) -> Self {
        Self {
            emb,
            wx,
            wh,
            w,
            bh,
            b,
            h0,
            config,
        }
    }

    /// The hyperparameters this model was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parameter names, in the fixed order used by persistence.
    pub fn param_names() -> [&'static str; 7] {
        ["emb", "wx", "wh", "w", "bh", "b", "h0"]
    }

    /// Borrow each named parameter, in [`param_names`] order.
    ///
    /// [`param_names`]: Elman::param_names
    pub(crate) fn params(&self) -> [(&'static str, &Tensor); 7] {
        [
            ("emb", &self.emb),
            ("wx", &self.wx),
            ("wh", &self.wh),
            ("w", &self.w),
            ("bh", &self.bh),
            ("b", &self.b),
            ("h0", &self.h0),
        ]
    }

    /// Run the recurrence over a sequence of context windows.
    ///
    /// Each window holds `context_size` token ids; ids beyond the vocabulary
    /// are clamped to the padding row. Returns the `[seq_len, num_classes]`
    /// class-probability distributions (one row per position, sequence order
    /// preserved) and the cache needed by [`backward`].
    ///
    /// # Panics
    ///
    /// Panics if the sequence is empty or a window is not `context_size`
    /// ids wide.
    ///
    /// [`backward`]: Elman::backward
    pub fn forward(&self, windows: &[Vec<usize>]) -> (Tensor, ElmanCache) {
        let seq_len = windows.len();
        assert!(seq_len > 0, "forward requires a non-empty sequence");

        let nh = self.config.hidden_size;
        let de = self.config.embed_dim;
        let input_size = self.config.input_size();

        // Embed each window: look up every id and concatenate the rows
        let mut embedded = Vec::with_capacity(seq_len * input_size);
        for window in windows {
            assert_eq!(
                window.len(),
                self.config.context_size,
                "context window has {} ids, expected {}",
                window.len(),
                self.config.context_size
            );
            for &token_id in window {
                let token_id = token_id.min(self.config.vocab_size);
                let start = token_id * de;
                embedded.extend_from_slice(&self.emb.data[start..start + de]);
            }
        }
        let x = Tensor::new(embedded, vec![seq_len, input_size]);

        // Recurrence; row t of `hidden` is h_{t-1}, so row 0 is h0 and the
        // final row is the last hidden state
        let mut hidden = Tensor::zeros(vec![seq_len + 1, nh]);
        hidden.row_mut(0).copy_from_slice(&self.h0.data);

        for t in 0..seq_len {
            let mut pre = self.bh.data.clone();

            let x_t = x.row(t);
            for (l, &xv) in x_t.iter().enumerate() {
                let wx_row = self.wx.row(l);
                for (p, &wv) in pre.iter_mut().zip(wx_row.iter()) {
                    *p += xv * wv;
                }
            }

            let h_prev = hidden.row(t).to_vec();
            for (l, &hv) in h_prev.iter().enumerate() {
                let wh_row = self.wh.row(l);
                for (p, &wv) in pre.iter_mut().zip(wh_row.iter()) {
                    *p += hv * wv;
                }
            }

            sigmoid_forward(&mut pre);
            hidden.row_mut(t + 1).copy_from_slice(&pre);
        }

        // Project every hidden state to class logits in one matmul
        let h_seq = Tensor::new(hidden.data[nh..].to_vec(), vec![seq_len, nh]);
        let logits = h_seq.matmul(&self.w).add(&self.b);
        let probs = logits.softmax_rows();

        let cache = ElmanCache {
            windows: windows.to_vec(),
            x,
            hidden,
            probs: probs.clone(),
        };

        (probs, cache)
    }

    /// Predict the class of every position in the sequence.
    ///
    /// Runs the same recurrence as training, without mutation, and returns
    /// the argmax class per position: exactly `windows.len()` labels, each
    /// in `[0, num_classes)`.
    pub fn classify(&self, windows: &[Vec<usize>]) -> Vec<usize> {
        let (probs, _) = self.forward(windows);
        probs.argmax_rows()
    }

    /// One gradient-descent step on a single labeled sequence.
    ///
    /// Computes the negative log-likelihood of `label` under the final
    /// position's distribution, backpropagates through the whole sequence,
    /// and applies `param ← param - learning_rate × gradient` to every
    /// parameter simultaneously (all gradients are taken against the
    /// pre-update values).
    ///
    /// Returns the scalar loss. A gold-label probability of exactly zero
    /// produces a non-finite loss; this is not guarded.
    pub fn train(&mut self, windows: &[Vec<usize>], label: usize, learning_rate: f32) -> f32 {
        let (probs, cache) = self.forward(windows);

        let p_gold = probs.row(probs.rows() - 1)[label];
        let loss = -p_gold.ln();

        let grads = self.backward(label, &cache);
        self.apply_gradients(&grads, learning_rate);

        loss
    }

    /// Backward pass through time.
    ///
    /// The loss gradient enters at the last position as `p - onehot(label)`
    /// (softmax and NLL fused), flows through the output projection, then
    /// backward through every recurrence step. Embedding gradients are
    /// scattered into exactly the rows that were looked up; whatever reaches
    /// past step 0 lands on `h0`.
    pub fn backward(&self, label: usize, cache: &ElmanCache) -> ElmanGradients {
        let seq_len = cache.probs.rows();
        let nh = self.config.hidden_size;
        let nc = self.config.num_classes;
        let de = self.config.embed_dim;

        let mut grads = ElmanGradients::zeros(&self.config);

        // Fused softmax/NLL gradient at the final position
        let mut grad_logits = cache.probs.row(seq_len - 1).to_vec();
        grad_logits[label] -= 1.0;
        let grad_logits_row = Tensor::new(grad_logits.clone(), vec![1, nc]);

        // Output projection: w and b only ever see the last step
        // grad_w = h_T^T @ grad_logits, grad_b = grad_logits
        let h_last = Tensor::new(cache.hidden.row(seq_len).to_vec(), vec![1, nh]);
        grads.w = h_last.transpose().matmul(&grad_logits_row);
        grads.b.data.copy_from_slice(&grad_logits);

        // Gradient flowing into the last hidden state: grad_logits @ w^T
        let mut grad_h = grad_logits_row.matmul(&self.w.transpose()).data;

        for t in (0..seq_len).rev() {
            let h_t = cache.hidden.row(t + 1);

            // Through the sigmoid: grad wrt the pre-activation
            let grad_pre = sigmoid_backward(&grad_h, h_t);

            // wx: x_t outer grad_pre
            let x_t = cache.x.row(t);
            for (l, &xv) in x_t.iter().enumerate() {
                let row = grads.wx.row_mut(l);
                for (g, &gp) in row.iter_mut().zip(grad_pre.iter()) {
                    *g += xv * gp;
                }
            }

            // wh: h_{t-1} outer grad_pre
            let h_prev = cache.hidden.row(t);
            for (l, &hv) in h_prev.iter().enumerate() {
                let row = grads.wh.row_mut(l);
                for (g, &gp) in row.iter_mut().zip(grad_pre.iter()) {
                    *g += hv * gp;
                }
            }

            for (g, &gp) in grads.bh.data.iter_mut().zip(grad_pre.iter()) {
                *g += gp;
            }

            // grad wrt x_t is grad_pre @ wx^T; scatter each embed_dim chunk
            // back into the embedding row it was read from
            for (slot, &token_id) in cache.windows[t].iter().enumerate() {
                let token_id = token_id.min(self.config.vocab_size);
                for d in 0..de {
                    let l = slot * de + d;
                    let wx_row = self.wx.row(l);
                    let sum: f32 = wx_row
                        .iter()
                        .zip(grad_pre.iter())
                        .map(|(&wv, &gp)| wv * gp)
                        .sum();
                    grads.emb.data[token_id * de + d] += sum;
                }
            }

            // grad wrt h_{t-1}: grad_pre @ wh^T, carried to the next step
            for (l, gh) in grad_h.iter_mut().enumerate() {
                let wh_row = self.wh.row(l);
                *gh = wh_row
                    .iter()
                    .zip(grad_pre.iter())
                    .map(|(&wv, &gp)| wv * gp)
                    .sum();
            }
        }

        // What remains is the gradient on the initial hidden state
        grads.h0.data.copy_from_slice(&grad_h);

        grads
    }

    /// Apply `param ← param - learning_rate × gradient` to every parameter.
    pub fn apply_gradients(&mut self, grads: &ElmanGradients, learning_rate: f32) {
        fn sgd_step(param: &mut Tensor, grad: &Tensor, lr: f32) {
            for (p, &g) in param.data.iter_mut().zip(grad.data.iter()) {
                *p -= lr * g;
            }
        }

        sgd_step(&mut self.emb, &grads.emb, learning_rate);
        sgd_step(&mut self.wx, &grads.wx, learning_rate);
        sgd_step(&mut self.wh, &grads.wh, learning_rate);
        sgd_step(&mut self.w, &grads.w, learning_rate);
        sgd_step(&mut self.bh, &grads.bh, learning_rate);
        sgd_step(&mut self.b, &grads.b, learning_rate);
        sgd_step(&mut self.h0, &grads.h0, learning_rate);
    }

    /// Rescale every embedding row to unit L2 norm, in place.
    ///
    /// A regularization heuristic meant to be invoked periodically by the
    /// training driver (typically once per epoch), not after every step.
    /// Rows with zero norm are left untouched rather than divided to NaN.
    pub fn normalize(&mut self) {
        let de = self.config.embed_dim;
        for row in self.emb.data.chunks_mut(de) {
            let norm = row.iter().map(|&v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in row.iter_mut() {
                    *v /= norm;
                }
            }
        }
    }
}

/// Values cached during [`Elman::forward`] for the backward pass.
pub struct ElmanCache {
    /// The input windows, needed to scatter embedding gradients
    windows: Vec<Vec<usize>>,
    /// Embedded input, `[seq_len, embed_dim * context_size]`
    x: Tensor,
    /// Hidden states `[seq_len + 1, hidden_size]`; row 0 is `h0`
    hidden: Tensor,
    /// Output distributions, `[seq_len, num_classes]`
    probs: Tensor,
}

/// One gradient tensor per model parameter.
pub struct ElmanGradients {
    pub emb: Tensor,
    pub wx: Tensor,
    pub wh: Tensor,
    pub w: Tensor,
    pub bh: Tensor,
    pub b: Tensor,
    pub h0: Tensor,
}

impl ElmanGradients {
    /// Zero gradients matching the model's parameter shapes.
    pub fn zeros(config: &Config) -> Self {
        let nh = config.hidden_size;
        let nc = config.num_classes;
        Self {
            emb: Tensor::zeros(vec![config.vocab_size + 1, config.embed_dim]),
            wx: Tensor::zeros(vec![config.input_size(), nh]),
            wh: Tensor::zeros(vec![nh, nh]),
            w: Tensor::zeros(vec![nh, nc]),
            bh: Tensor::zeros(vec![nh]),
            b: Tensor::zeros(vec![nc]),
            h0: Tensor::zeros(vec![nh]),
        }
    }

    /// Borrow every gradient tensor.
    pub fn tensors(&self) -> [&Tensor; 7] {
        [
            &self.emb, &self.wx, &self.wh, &self.w, &self.bh, &self.b, &self.h0,
        ]
    }

    /// Mutably borrow every gradient tensor.
    pub fn tensors_mut(&mut self) -> [&mut Tensor; 7] {
        [
            &mut self.emb,
            &mut self.wx,
            &mut self.wh,
            &mut self.w,
            &mut self.bh,
            &mut self.b,
            &mut self.h0,
        ]
    }
}

//! # Elman: Recurrent Sequence Classification
//!
//! An Elman-style recurrent network for sequence labeling, implemented from
//! scratch in Rust. Given a sequence of token-id context windows, the model
//! predicts a class per position, trains with a hand-coded backward pass
//! through time, and persists its parameters to disk.
//!
//! # Modules
//!
//! - [`tensor`] - Minimal dense tensor with the operations the network needs
//! - [`activation`] - Sigmoid forward/backward
//! - [`model`] - The network: initialization, recurrence, training, inference
//! - [`gradients`] - Gradient norm and clipping utilities
//! - [`checkpoint`] - Directory-based save/load of parameters + manifest
//!
//! # Example
//!
//! ```rust,no_run
//! use elman::{Config, Elman};
//!
//! let config = Config {
//!     hidden_size: 50,
//!     num_classes: 4,
//!     vocab_size: 1000,
//!     embed_dim: 25,
//!     context_size: 5,
//! };
//! let mut model = Elman::new(&config);
//!
//! // One training step on a labeled sequence of context windows
//! let windows = vec![vec![3, 7, 1, 9, 4], vec![7, 1, 9, 4, 2]];
//! let loss = model.train(&windows, 2, 0.05);
//! println!("loss: {loss:.4}");
//!
//! // Periodically renormalize embeddings and persist
//! model.normalize();
//! model.save("my_model")?;
//!
//! // Later: restore and classify
//! let restored = Elman::load("my_model")?;
//! let labels = restored.classify(&windows);
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! The crate deliberately stops at the model boundary: corpus loading,
//! context-window extraction, epoch scheduling, and evaluation belong to the
//! calling training driver.

pub mod activation;
pub mod checkpoint;
pub mod gradients;
pub mod model;
pub mod tensor;

// Re-export main types for convenience
pub use gradients::{clip_gradients, compute_grad_norm};
pub use model::{Config, Elman, ElmanCache, ElmanGradients};
pub use tensor::Tensor;

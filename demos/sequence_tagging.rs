//! Sequence Tagging Demo
//!
//! Trains the Elman network on a tiny synthetic task from the caller side:
//! sequences drawn from the low half of the vocabulary belong to class 0,
//! sequences from the high half to class 1. Shows the full driver loop the
//! library itself stays out of: epochs, per-example training steps, periodic
//! embedding normalization, saving, and reloading for inference.

use elman::{Config, Elman};

/// Build a sequence of context windows over consecutive token ids.
fn windows_from(tokens: &[usize], context_size: usize) -> Vec<Vec<usize>> {
    tokens
        .windows(context_size)
        .map(|w| w.to_vec())
        .collect()
}

fn main() -> std::io::Result<()> {
    let config = Config {
        hidden_size: 16,
        num_classes: 2,
        vocab_size: 40,
        embed_dim: 8,
        context_size: 3,
    };
    let mut model = Elman::new(&config);

    println!("=== Elman Sequence Tagging Demo ===\n");
    println!("Config: {:?}\n", config);

    // Synthetic corpus: (token sequence, label)
    let examples: Vec<(Vec<usize>, usize)> = vec![
        (vec![1, 4, 2, 8, 5, 3], 0),
        (vec![7, 2, 9, 1, 6, 4], 0),
        (vec![3, 8, 1, 5, 2, 9], 0),
        (vec![31, 24, 38, 22, 35, 27], 1),
        (vec![28, 36, 21, 39, 25, 33], 1),
        (vec![34, 26, 30, 23, 37, 29], 1),
    ];

    let learning_rate = 0.1;
    let epochs = 50;

    for epoch in 0..epochs {
        let mut epoch_loss = 0.0;
        for (tokens, label) in &examples {
            let windows = windows_from(tokens, config.context_size);
            epoch_loss += model.train(&windows, *label, learning_rate);
        }

        // The normalization heuristic runs once per epoch, not per step
        model.normalize();

        if (epoch + 1) % 10 == 0 {
            println!(
                "epoch {:>3}  avg loss {:.4}",
                epoch + 1,
                epoch_loss / examples.len() as f32
            );
        }
    }

    println!();
    let model_dir = std::env::temp_dir().join("elman_demo_model");
    model.save(&model_dir)?;

    let restored = Elman::load(&model_dir)?;
    println!();

    for (tokens, label) in &examples {
        let windows = windows_from(tokens, config.context_size);
        let predicted = restored.classify(&windows);
        println!(
            "tokens {:?}  gold {}  predicted per position {:?}",
            tokens, label, predicted
        );
    }

    std::fs::remove_dir_all(&model_dir)?;
    Ok(())
}

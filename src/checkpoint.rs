//! Model Persistence
//!
//! Saves a trained model to a directory and reconstructs it later: one
//! binary file per named parameter plus a JSON manifest recording the
//! parameter names, their filenames, and the hyperparameters.
//!
//! ## Directory Layout
//!
//! ```text
//! model_dir/
//!   elman.json   manifest: names, files, hyperparameters
//!   emb.bin      embedding table
//!   wx.bin       input-to-hidden weights
//!   wh.bin       hidden-to-hidden weights
//!   w.bin        output projection
//!   bh.bin       hidden bias
//!   b.bin        output bias
//!   h0.bin       initial hidden state
//! ```
//!
//! ## Tensor Record Format
//!
//! Each `.bin` file is a single little-endian record:
//!
//! ```text
//! [rank: u32] [dim_0: u32] ... [dim_n: u32] [count: u32] [values: f32 × count]
//! ```
//!
//! ## Failure Modes
//!
//! Errors propagate as `std::io::Error`: a missing parameter file surfaces
//! as not-found, while a malformed manifest, an unknown parameter name, or
//! a shape that disagrees with the stored hyperparameters maps to
//! `ErrorKind::InvalidData`. There is no transactional guarantee: a crash
//! mid-save can leave a partial parameter set behind.

use crate::model::{Config, Elman};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Name of the manifest file inside a model directory.
const MANIFEST_FILE: &str = "elman.json";

/// Manifest tying parameter names to their files, plus the hyperparameters
/// needed to rebuild the model.
#[derive(Serialize, Deserialize)]
struct Manifest {
    names: Vec<String>,
    files: Vec<String>,
    hyper_params: Config,
}

/// Write one tensor record (see module docs for the format).
fn write_tensor(writer: &mut impl Write, tensor: &Tensor) -> io::Result<()> {
    writer.write_all(&(tensor.shape.len() as u32).to_le_bytes())?;
    for &dim in &tensor.shape {
        writer.write_all(&(dim as u32).to_le_bytes())?;
    }
    writer.write_all(&(tensor.data.len() as u32).to_le_bytes())?;
    for &val in &tensor.data {
        writer.write_all(&val.to_le_bytes())?;
    }
    Ok(())
}

/// Read one tensor record.
fn read_tensor(reader: &mut impl Read) -> io::Result<Tensor> {
    let mut u32_bytes = [0u8; 4];

    reader.read_exact(&mut u32_bytes)?;
    let rank = u32::from_le_bytes(u32_bytes) as usize;

    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        reader.read_exact(&mut u32_bytes)?;
        shape.push(u32::from_le_bytes(u32_bytes) as usize);
    }

    reader.read_exact(&mut u32_bytes)?;
    let count = u32::from_le_bytes(u32_bytes) as usize;
    if count != shape.iter().product::<usize>() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "tensor record claims {} values but shape {:?} needs {}",
                count,
                shape,
                shape.iter().product::<usize>()
            ),
        ));
    }

    let mut data = Vec::with_capacity(count);
    for _ in 0..count {
        reader.read_exact(&mut u32_bytes)?;
        data.push(f32::from_le_bytes(u32_bytes));
    }

    Ok(Tensor::new(data, shape))
}

/// The shape each named parameter must have under a given config.
fn expected_shape(config: &Config, name: &str) -> Option<Vec<usize>> {
    let nh = config.hidden_size;
    match name {
        "emb" => Some(vec![config.vocab_size + 1, config.embed_dim]),
        "wx" => Some(vec![config.input_size(), nh]),
        "wh" => Some(vec![nh, nh]),
        "w" => Some(vec![nh, config.num_classes]),
        "bh" => Some(vec![nh]),
        "b" => Some(vec![config.num_classes]),
        "h0" => Some(vec![nh]),
        _ => None,
    }
}

impl Elman {
    /// Save all parameters and hyperparameters into `dir`.
    ///
    /// Creates the directory if needed, writes one `<name>.bin` per
    /// parameter and the `elman.json` manifest.
    pub fn save(&self, dir: impl AsRef<Path>) -> io::Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        println!("Saving model to {}...", dir.display());

        let mut names = Vec::new();
        let mut files = Vec::new();
        for (name, tensor) in self.params() {
            let file_name = format!("{}.bin", name);
            let mut writer = BufWriter::new(File::create(dir.join(&file_name))?);
            write_tensor(&mut writer, tensor)?;
            writer.flush()?;

            names.push(name.to_string());
            files.push(file_name);
        }

        let file_count = files.len();
        let manifest = Manifest {
            names,
            files,
            hyper_params: self.config().clone(),
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        fs::write(dir.join(MANIFEST_FILE), manifest_json)?;

        println!("Model saved ({} parameter files + manifest)", file_count);

        Ok(())
    }

    /// Reconstruct a model from a directory written by [`save`].
    ///
    /// Reads the manifest, rebuilds the model with the stored
    /// hyperparameters, and repopulates every named parameter from its
    /// file. Fails if any expected file is missing, the manifest is
    /// malformed, a parameter name is unknown, or a stored shape disagrees
    /// with the hyperparameters.
    ///
    /// [`save`]: Elman::save
    pub fn load(dir: impl AsRef<Path>) -> io::Result<Elman> {
        let dir = dir.as_ref();

        let manifest_json = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        let manifest: Manifest = serde_json::from_str(&manifest_json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let config = manifest.hyper_params;

        println!(
            "Loading model from {} ({:?})...",
            dir.display(),
            config
        );

        if manifest.names.len() != manifest.files.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "manifest name and file lists differ in length",
            ));
        }

        let mut loaded: [Option<Tensor>; 7] = Default::default();
        for (name, file_name) in manifest.names.iter().zip(&manifest.files) {
            let slot = Elman::param_names()
                .iter()
                .position(|&n| n == name)
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unknown parameter name in manifest: {}", name),
                    )
                })?;

            let mut reader = BufReader::new(File::open(dir.join(file_name))?);
            let tensor = read_tensor(&mut reader)?;

            let expected = expected_shape(&config, name).unwrap_or_default();
            if tensor.shape != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "parameter {} has shape {:?}, expected {:?}",
                        name, tensor.shape, expected
                    ),
                ));
            }

            loaded[slot] = Some(tensor);
        }

        let mut take = |slot: usize| -> io::Result<Tensor> {
            loaded[slot].take().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "manifest is missing parameter: {}",
                        Elman::param_names()[slot]
                    ),
                )
            })
        };

        let emb = take(0)?;
        let wx = take(1)?;
        let wh = take(2)?;
        let w = take(3)?;
        let bh = take(4)?;
        let b = take(5)?;
        let h0 = take(6)?;

        Ok(Elman::from_parts(config, emb, wx, wh, w, bh, b, h0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> Config {
        Config {
            hidden_size: 5,
            num_classes: 2,
            vocab_size: 10,
            embed_dim: 3,
            context_size: 2,
        }
    }

    fn temp_model_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("elman_test_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_tensor_record_round_trip() {
        let tensor = Tensor::new(vec![1.5, -2.25, 0.0, 42.0, 3.0, -0.5], vec![2, 3]);

        let mut buf = Vec::new();
        write_tensor(&mut buf, &tensor).unwrap();
        let restored = read_tensor(&mut buf.as_slice()).unwrap();

        assert_eq!(restored.shape, tensor.shape);
        assert_eq!(restored.data, tensor.data);
    }

    #[test]
    fn test_tensor_record_rejects_bad_count() {
        let tensor = Tensor::new(vec![1.0, 2.0], vec![2]);
        let mut buf = Vec::new();
        write_tensor(&mut buf, &tensor).unwrap();

        // Corrupt the element count (rank u32 + one dim u32 = offset 8)
        buf[8] = 99;

        let err = read_tensor(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = temp_model_dir("round_trip");

        let mut model = Elman::new(&config());
        let windows = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        for _ in 0..20 {
            model.train(&windows, 1, 0.1);
        }
        model.save(&dir).unwrap();

        let restored = Elman::load(&dir).unwrap();

        assert_eq!(restored.config(), model.config());
        let (probs_before, _) = model.forward(&windows);
        let (probs_after, _) = restored.forward(&windows);
        assert_eq!(probs_before.data, probs_after.data);
        assert_eq!(model.classify(&windows), restored.classify(&windows));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_fails_on_missing_parameter_file() {
        let dir = temp_model_dir("missing_file");

        let model = Elman::new(&config());
        model.save(&dir).unwrap();
        fs::remove_file(dir.join("wh.bin")).unwrap();

        assert!(Elman::load(&dir).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_fails_on_malformed_manifest() {
        let dir = temp_model_dir("bad_manifest");

        let model = Elman::new(&config());
        model.save(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), "{ not json").unwrap();

        let err = Elman::load(&dir).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_fails_on_unknown_parameter_name() {
        let dir = temp_model_dir("unknown_name");

        let model = Elman::new(&config());
        model.save(&dir).unwrap();

        let manifest_json = fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap();
        let patched = manifest_json.replace("\"wh\"", "\"mystery\"");
        fs::write(dir.join(MANIFEST_FILE), patched).unwrap();

        let err = Elman::load(&dir).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_fails_on_missing_manifest_entry() {
        let dir = temp_model_dir("missing_entry");

        let model = Elman::new(&config());
        model.save(&dir).unwrap();

        let manifest_json = fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap();
        let mut manifest: serde_json::Value = serde_json::from_str(&manifest_json).unwrap();
        manifest["names"].as_array_mut().unwrap().pop();
        manifest["files"].as_array_mut().unwrap().pop();
        fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).unwrap();

        let err = Elman::load(&dir).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_loaded_model_can_keep_training() {
        let dir = temp_model_dir("resume");

        let mut model = Elman::new(&config());
        let windows = vec![vec![1, 2], vec![3, 4]];
        model.train(&windows, 0, 0.1);
        model.save(&dir).unwrap();

        let mut restored = Elman::load(&dir).unwrap();
        let loss = restored.train(&windows, 0, 0.1);
        assert!(loss.is_finite());

        let _ = fs::remove_dir_all(&dir);
    }
}

//! Model archives: a safetensors file holding the architecture and every
//! parameter, plus an optional JSON sidecar with [`ModelMetadata`].
//!
//! Tensor layout:
//! ```text
//! sizes       I64  [n]          layer widths
//! num_layers  I64  [1]          n
//! weight_i    F64  [rows, cols] sizes[i+1] × sizes[i]
//! bias_i      F64  [rows, 1]    sizes[i+1] × 1
//! ```
//! The activation is stored as the header metadata entry `activation`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use safetensors::tensor::{serialize, Dtype, SafeTensors, TensorView};

use crate::codec::metadata::ModelMetadata;
use crate::error::{Error, Result};
use crate::math::Matrix;
use crate::network::{ModelArtifact, NetworkModel};

const ACTIVATION_KEY: &str = "activation";

fn format_err(msg: impl Into<String>) -> Error {
    Error::InvalidModelFormat(msg.into())
}

fn i64_bytes(values: &[usize]) -> Vec<u8> {
    values.iter().flat_map(|&v| (v as i64).to_le_bytes()).collect()
}

fn f64_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Sidecar location: the archive path with its extension replaced by `.json`.
pub fn sidecar_path<P: AsRef<Path>>(path: P) -> PathBuf {
    path.as_ref().with_extension("json")
}

/// Serializes `model` into safetensors bytes.
pub fn encode(model: &NetworkModel) -> Result<Vec<u8>> {
    let artifact = model.to_artifact();

    let mut buffers: Vec<(String, Dtype, Vec<usize>, Vec<u8>)> = Vec::new();
    buffers.push(("sizes".into(), Dtype::I64, vec![artifact.sizes.len()], i64_bytes(&artifact.sizes)));
    buffers.push(("num_layers".into(), Dtype::I64, vec![1], i64_bytes(&[artifact.num_layers])));
    for (i, (w, b)) in artifact.weights.iter().zip(&artifact.biases).enumerate() {
        buffers.push((format!("weight_{i}"), Dtype::F64, vec![w.rows, w.cols], f64_bytes(w.as_slice())));
        buffers.push((format!("bias_{i}"), Dtype::F64, vec![b.rows, b.cols], f64_bytes(b.as_slice())));
    }

    let mut views = Vec::with_capacity(buffers.len());
    for (name, dtype, shape, bytes) in &buffers {
        let view = TensorView::new(*dtype, shape.clone(), bytes)
            .map_err(|e| format_err(format!("{name}: {e}")))?;
        views.push((name.clone(), view));
    }

    let header = HashMap::from([(ACTIVATION_KEY.to_owned(), artifact.activation)]);
    serialize(views, &Some(header)).map_err(|e| format_err(e.to_string()))
}

fn read_i64s(tensors: &SafeTensors<'_>, name: &str) -> Result<Vec<usize>> {
    let view = tensors.tensor(name).map_err(|_| format_err(format!("missing tensor {name}")))?;
    if view.dtype() != Dtype::I64 || view.shape().len() != 1 {
        return Err(format_err(format!(
            "{name} must be a 1-D I64 tensor, got {:?} {:?}",
            view.dtype(),
            view.shape()
        )));
    }
    view.data()
        .chunks_exact(8)
        .map(|chunk| {
            let mut le = [0u8; 8];
            le.copy_from_slice(chunk);
            usize::try_from(i64::from_le_bytes(le))
                .map_err(|_| format_err(format!("{name} holds a negative value")))
        })
        .collect()
}

fn read_matrix(tensors: &SafeTensors<'_>, name: &str) -> Result<Matrix> {
    let view = tensors.tensor(name).map_err(|_| format_err(format!("missing tensor {name}")))?;
    let (rows, cols) = match (view.dtype(), view.shape()) {
        (Dtype::F64, &[rows, cols]) => (rows, cols),
        (dtype, shape) => {
            return Err(format_err(format!("{name} must be a 2-D F64 tensor, got {dtype:?} {shape:?}")))
        }
    };
    let values: Vec<f64> = view.data()
        .chunks_exact(8)
        .map(|chunk| {
            let mut le = [0u8; 8];
            le.copy_from_slice(chunk);
            f64::from_le_bytes(le)
        })
        .collect();
    Matrix::from_vec(rows, cols, values)
        .ok_or_else(|| format_err(format!("{name} data does not fill a {rows}×{cols} matrix")))
}

/// Rebuilds a network from safetensors bytes.
pub fn decode(bytes: &[u8]) -> Result<NetworkModel> {
    let (_, header) = SafeTensors::read_metadata(bytes).map_err(|e| format_err(e.to_string()))?;
    let activation = header
        .metadata()
        .as_ref()
        .and_then(|m| m.get(ACTIVATION_KEY))
        .cloned()
        .ok_or_else(|| format_err("missing activation in archive header"))?;
    let tensors = SafeTensors::deserialize(bytes).map_err(|e| format_err(e.to_string()))?;

    let sizes = read_i64s(&tensors, "sizes")?;
    let num_layers = match read_i64s(&tensors, "num_layers")?.as_slice() {
        [n] => *n,
        other => return Err(format_err(format!("num_layers must hold one value, got {}", other.len()))),
    };
    if sizes.len() != num_layers {
        return Err(format_err(format!(
            "sizes has {} entries but num_layers is {}",
            sizes.len(),
            num_layers
        )));
    }

    let layers = num_layers.saturating_sub(1);
    let mut weights = Vec::with_capacity(layers);
    let mut biases = Vec::with_capacity(layers);
    for i in 0..layers {
        weights.push(read_matrix(&tensors, &format!("weight_{i}"))?);
        biases.push(read_matrix(&tensors, &format!("bias_{i}"))?);
    }

    NetworkModel::from_artifact(ModelArtifact { sizes, activation, num_layers, weights, biases })
}

/// Writes `model` to `path` and, when given, `metadata` to the sidecar.
pub fn save<P: AsRef<Path>>(model: &NetworkModel, path: P, metadata: Option<&ModelMetadata>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, encode(model)?)?;

    if let Some(metadata) = metadata {
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(sidecar_path(path), json)?;
    }
    info!("model saved to {}", path.display());
    Ok(())
}

/// Reads the sidecar of the archive at `path`; `None` when there is none.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<Option<ModelMetadata>> {
    let sidecar = sidecar_path(path);
    let json = match fs::read_to_string(&sidecar) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|e| format_err(format!("{}: {e}", sidecar.display())))
}

/// Loads the archive at `path` together with its sidecar metadata.
pub fn load<P: AsRef<Path>>(path: P) -> Result<(NetworkModel, Option<ModelMetadata>)> {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::ModelNotFound(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let model = decode(&bytes)?;
    let metadata = read_metadata(path)?;
    Ok((model, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::train::TrainingConfig;
    use rand::{rngs::StdRng, SeedableRng};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("neurite-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn small_net() -> NetworkModel {
        NetworkModel::with_rng(vec![4, 3, 2], Activation::ReLU, &mut StdRng::seed_from_u64(21)).unwrap()
    }

    #[test]
    fn bytes_round_trip_exactly() {
        let net = small_net();
        let back = decode(&encode(&net).unwrap()).unwrap();
        assert_eq!(back, net);
        assert_eq!(back.activation(), Activation::ReLU);
    }

    #[test]
    fn file_round_trip_with_metadata() {
        let dir = temp_dir("codec-file");
        let path = dir.join("nested").join("digits.safetensors");
        let net = small_net();
        let meta = ModelMetadata::new(TrainingConfig::new(3, 10, 3.0).with_seed(7), Some(91.5));

        save(&net, &path, Some(&meta)).unwrap();
        assert!(dir.join("nested").join("digits.json").exists());

        let (back, back_meta) = load(&path).unwrap();
        assert_eq!(back, net);
        assert_eq!(back_meta, Some(meta));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_sidecar_is_none_and_malformed_is_rejected() {
        let dir = temp_dir("codec-sidecar");
        let path = dir.join("m.safetensors");
        save(&small_net(), &path, None).unwrap();
        assert_eq!(load(&path).unwrap().1, None);

        fs::write(dir.join("m.json"), "{not json").unwrap();
        assert!(matches!(load(&path), Err(Error::InvalidModelFormat(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sidecar_tolerates_unknown_fields() {
        let dir = temp_dir("codec-extra");
        let path = dir.join("m.safetensors");
        save(&small_net(), &path, None).unwrap();
        fs::write(
            dir.join("m.json"),
            r#"{"training_config": {"epochs": 2, "learning_rate": 0.5, "mini_batch_size": 4, "seed": null},
                "final_accuracy": 80.0, "architecture": {"sizes": [4, 3, 2]}}"#,
        )
        .unwrap();
        let meta = load(&path).unwrap().1.unwrap();
        assert_eq!(meta.training_config.unwrap().mini_batch_size, 4);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn absent_archive_is_not_found() {
        let err = load(temp_dir("codec-absent").join("nope.safetensors")).unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(_)));
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn garbage_is_invalid_format() {
        assert!(matches!(decode(b"not an archive"), Err(Error::InvalidModelFormat(_))));
    }

    #[test]
    fn missing_layer_is_invalid_format() {
        let net = small_net();
        let sizes = i64_bytes(net.sizes());
        let n = i64_bytes(&[3]);
        let w0 = f64_bytes(net.weights()[0].as_slice());
        let b0 = f64_bytes(net.biases()[0].as_slice());
        let views = vec![
            ("sizes", TensorView::new(Dtype::I64, vec![3], &sizes).unwrap()),
            ("num_layers", TensorView::new(Dtype::I64, vec![1], &n).unwrap()),
            ("weight_0", TensorView::new(Dtype::F64, vec![3, 4], &w0).unwrap()),
            ("bias_0", TensorView::new(Dtype::F64, vec![3, 1], &b0).unwrap()),
        ];
        let header = HashMap::from([(ACTIVATION_KEY.to_owned(), "relu".to_owned())]);
        let bytes = serialize(views, &Some(header)).unwrap();
        assert!(matches!(decode(&bytes), Err(Error::InvalidModelFormat(_))));
    }

    #[test]
    fn unknown_activation_is_invalid_format() {
        let net = NetworkModel::with_rng(vec![2, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(2)).unwrap();
        let sizes = i64_bytes(net.sizes());
        let n = i64_bytes(&[2]);
        let w0 = f64_bytes(net.weights()[0].as_slice());
        let b0 = f64_bytes(net.biases()[0].as_slice());
        let views = vec![
            ("sizes", TensorView::new(Dtype::I64, vec![2], &sizes).unwrap()),
            ("num_layers", TensorView::new(Dtype::I64, vec![1], &n).unwrap()),
            ("weight_0", TensorView::new(Dtype::F64, vec![2, 2], &w0).unwrap()),
            ("bias_0", TensorView::new(Dtype::F64, vec![2, 1], &b0).unwrap()),
        ];
        let header = HashMap::from([(ACTIVATION_KEY.to_owned(), "tanh".to_owned())]);
        let bytes = serialize(views, &Some(header)).unwrap();
        assert!(matches!(decode(&bytes), Err(Error::InvalidModelFormat(_))));
    }
}

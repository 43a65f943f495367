//! Weights manifest: JSON envelope around base64 little-endian f32 buffers

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading network weights
#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("failed to read weights: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed weights manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("layer {layer}: payload is not valid base64 f32 data")]
    Base64 { layer: String },

    #[error("missing layer: {0}")]
    MissingLayer(String),

    #[error("layer {layer}: expected {expected} values, found {actual}")]
    ShapeMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("bad architecture: {0}")]
    BadArchitecture(String),
}

/// Network hyperparameters stored alongside the weights
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub hidden_channels: usize,
    pub num_res_blocks: usize,
}

/// One named tensor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerEntry {
    /// PyTorch shape, informational when present
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape: Vec<usize>,
    /// Base64 of the raw little-endian f32 bytes
    pub data: String,
}

/// Parsed manifest, tensors still encoded
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub architecture: Architecture,
    pub layers: FxHashMap<String, LayerEntry>,
}

impl Manifest {
    pub fn new(architecture: Architecture) -> Self {
        Self {
            architecture,
            layers: FxHashMap::default(),
        }
    }

    pub fn parse(json: &str) -> Result<Self, WeightsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, WeightsError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Add or replace a layer
    pub fn insert(&mut self, name: impl Into<String>, shape: &[usize], values: &[f32]) {
        self.layers.insert(
            name.into(),
            LayerEntry {
                shape: shape.to_vec(),
                data: encode_f32(values),
            },
        );
    }

    /// Decode a layer and check it holds `expected` values
    pub fn tensor(&self, name: &str, expected: usize) -> Result<Vec<f32>, WeightsError> {
        let entry = self
            .layers
            .get(name)
            .ok_or_else(|| WeightsError::MissingLayer(name.to_string()))?;

        if !entry.shape.is_empty() {
            let declared: usize = entry.shape.iter().product();
            if declared != expected {
                return Err(WeightsError::ShapeMismatch {
                    layer: name.to_string(),
                    expected,
                    actual: declared,
                });
            }
        }

        let values = decode_f32(&entry.data).ok_or_else(|| WeightsError::Base64 {
            layer: name.to_string(),
        })?;
        if values.len() != expected {
            return Err(WeightsError::ShapeMismatch {
                layer: name.to_string(),
                expected,
                actual: values.len(),
            });
        }
        Ok(values)
    }
}

/// Decode base64 into f32 values. `None` on bad base64 or a ragged byte count.
pub fn decode_f32(data: &str) -> Option<Vec<f32>> {
    let bytes = STANDARD.decode(data.trim()).ok()?;
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

pub fn encode_f32(values: &[f32]) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch() -> Architecture {
        Architecture {
            hidden_channels: 2,
            num_res_blocks: 0,
        }
    }

    #[test]
    fn test_decode_known_bytes() {
        // 1.0f32 = 0x3f800000, little-endian 00 00 80 3f
        let data = STANDARD.encode([0u8, 0, 0x80, 0x3f, 0, 0, 0, 0xc0]);
        assert_eq!(decode_f32(&data), Some(vec![1.0, -2.0]));
    }

    #[test]
    fn test_ragged_payload_rejected() {
        let data = STANDARD.encode([0u8, 0, 0x80]);
        assert_eq!(decode_f32(&data), None);
        assert_eq!(decode_f32("not base64!"), None);
    }

    #[test]
    fn test_tensor_length_checked() {
        let mut m = Manifest::new(arch());
        m.insert("a", &[], &[1.0, 2.0, 3.0]);
        assert!(matches!(
            m.tensor("a", 4),
            Err(WeightsError::ShapeMismatch { expected: 4, actual: 3, .. })
        ));
        assert_eq!(m.tensor("a", 3).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_declared_shape_checked() {
        let mut m = Manifest::new(arch());
        m.insert("w", &[2, 3], &[0.0; 6]);
        assert!(m.tensor("w", 6).is_ok());
        assert!(matches!(
            m.tensor("w", 4),
            Err(WeightsError::ShapeMismatch { actual: 6, .. })
        ));
    }

    #[test]
    fn test_missing_and_corrupt_layers() {
        let mut m = Manifest::new(arch());
        m.layers.insert(
            "bad".to_string(),
            LayerEntry {
                shape: vec![],
                data: "@@@".to_string(),
            },
        );
        assert!(matches!(m.tensor("nope", 1), Err(WeightsError::MissingLayer(_))));
        assert!(matches!(m.tensor("bad", 1), Err(WeightsError::Base64 { .. })));
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let json = r#"{
            "architecture": {"hidden_channels": 4, "num_res_blocks": 1},
            "layers": {"input_bn.num_batches_tracked": {"shape": [], "data": "AAAAAA=="}},
            "exported_by": "trainer"
        }"#;
        let m = Manifest::parse(json).unwrap();
        assert_eq!(m.architecture.hidden_channels, 4);
        assert_eq!(m.layers.len(), 1);
    }
}

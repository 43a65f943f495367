//! Residual value/policy network
//!
//! ## Architecture
//!
//! ```text
//! input 16x8x10
//!   -> conv3x3 16->H, bn, relu
//!   -> R x [conv3x3, bn, relu, conv3x3, bn, +skip, relu]
//!   -> value:  conv1x1 H->1, bn, relu, fc 80->64, relu, fc 64->1, tanh
//!   -> policy: conv1x1 H->H, bn, relu, conv1x1 H->12 (+bias),
//!              permute to square-major, softmax over 960
//! ```

use std::path::Path;

use khet_core::encode::{NUM_PLANES, POLICY_SLOTS};
use khet_core::{INPUT_LEN, NUM_SQUARES, POLICY_LEN};

use crate::layers::{relu, softmax, BatchNorm, Conv2d, LayerReader, Linear};
use crate::weights::{Architecture, Manifest, WeightsError};

/// Width of the value head's hidden layer
pub const VALUE_HIDDEN: usize = 64;

/// Sanity bounds on manifest hyperparameters
const MAX_HIDDEN_CHANNELS: usize = 1024;
const MAX_RES_BLOCKS: usize = 64;

/// Result of one forward pass
#[derive(Clone, Debug, PartialEq)]
pub struct NetOutput {
    /// Position value in [-1, 1] for the side to move
    pub value: f32,
    /// Move priors over [`POLICY_LEN`] slots, summing to 1
    pub policy: Vec<f32>,
}

#[derive(Clone, Debug)]
struct ResidualBlock {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
}

impl ResidualBlock {
    fn forward(&self, x: &mut Vec<f32>) {
        let mut h = self.conv1.forward(x);
        self.bn1.apply(&mut h, true);
        let mut h = self.conv2.forward(&h);
        self.bn2.apply(&mut h, false);
        for (out, skip) in h.iter_mut().zip(x.iter()) {
            *out += skip;
        }
        relu(&mut h);
        *x = h;
    }
}

/// Loaded network. Immutable after construction.
#[derive(Clone, Debug)]
pub struct KhetNet {
    architecture: Architecture,
    parameters: usize,

    input_conv: Conv2d,
    input_bn: BatchNorm,
    blocks: Vec<ResidualBlock>,

    value_conv: Conv2d,
    value_bn: BatchNorm,
    value_fc1: Linear,
    value_fc2: Linear,

    policy_conv1: Conv2d,
    policy_bn: BatchNorm,
    policy_conv2: Conv2d,
}

impl KhetNet {
    // ========================================================================
    // LOADING
    // ========================================================================

    /// Read and decode a manifest file
    pub fn load(path: &Path) -> Result<Self, WeightsError> {
        let json = std::fs::read_to_string(path)?;
        let net = Self::from_manifest_str(&json)?;
        tracing::info!(
            "Loaded network from {}: {} channels, {} blocks, {} parameters",
            path.display(),
            net.hidden_channels(),
            net.num_res_blocks(),
            net.parameter_count()
        );
        Ok(net)
    }

    pub fn from_manifest_str(json: &str) -> Result<Self, WeightsError> {
        Self::from_manifest(&Manifest::parse(json)?)
    }

    pub fn from_manifest(manifest: &Manifest) -> Result<Self, WeightsError> {
        let arch = manifest.architecture;
        validate(&arch)?;
        let h = arch.hidden_channels;
        let mut r = LayerReader::new(manifest);

        let input_conv = Conv2d::load(&mut r, "input_conv", NUM_PLANES, h, 3, false)?;
        let input_bn = BatchNorm::load(&mut r, "input_bn", h)?;

        let mut blocks = Vec::with_capacity(arch.num_res_blocks);
        for i in 0..arch.num_res_blocks {
            let p = format!("res_blocks.{i}");
            blocks.push(ResidualBlock {
                conv1: Conv2d::load(&mut r, &format!("{p}.conv1"), h, h, 3, false)?,
                bn1: BatchNorm::load(&mut r, &format!("{p}.bn1"), h)?,
                conv2: Conv2d::load(&mut r, &format!("{p}.conv2"), h, h, 3, false)?,
                bn2: BatchNorm::load(&mut r, &format!("{p}.bn2"), h)?,
            });
        }

        let value_conv = Conv2d::load(&mut r, "value_conv", h, 1, 1, false)?;
        let value_bn = BatchNorm::load(&mut r, "value_bn", 1)?;
        let value_fc1 = Linear::load(&mut r, "value_fc1", NUM_SQUARES, VALUE_HIDDEN)?;
        let value_fc2 = Linear::load(&mut r, "value_fc2", VALUE_HIDDEN, 1)?;

        let policy_conv1 = Conv2d::load(&mut r, "policy_conv1", h, h, 1, false)?;
        let policy_bn = BatchNorm::load(&mut r, "policy_bn", h)?;
        let policy_conv2 = Conv2d::load(&mut r, "policy_conv2", h, POLICY_SLOTS, 1, true)?;

        Ok(Self {
            architecture: arch,
            parameters: r.parameters,
            input_conv,
            input_bn,
            blocks,
            value_conv,
            value_bn,
            value_fc1,
            value_fc2,
            policy_conv1,
            policy_bn,
            policy_conv2,
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn hidden_channels(&self) -> usize {
        self.architecture.hidden_channels
    }

    pub fn num_res_blocks(&self) -> usize {
        self.architecture.num_res_blocks
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Number of f32 values read from the manifest
    pub fn parameter_count(&self) -> usize {
        self.parameters
    }

    // ========================================================================
    // FORWARD
    // ========================================================================

    /// Evaluate one encoded board (see [`khet_core::encode`]).
    ///
    /// # Panics
    /// If `input` is not [`INPUT_LEN`] long.
    pub fn forward(&self, input: &[f32]) -> NetOutput {
        assert_eq!(input.len(), INPUT_LEN, "encoded board has wrong length");

        let mut x = self.input_conv.forward(input);
        self.input_bn.apply(&mut x, true);
        for block in &self.blocks {
            block.forward(&mut x);
        }

        NetOutput {
            value: self.value_head(&x),
            policy: self.policy_head(&x),
        }
    }

    fn value_head(&self, trunk: &[f32]) -> f32 {
        let mut v = self.value_conv.forward(trunk);
        self.value_bn.apply(&mut v, true);
        let mut hidden = self.value_fc1.forward(&v);
        relu(&mut hidden);
        self.value_fc2.forward(&hidden)[0].tanh()
    }

    fn policy_head(&self, trunk: &[f32]) -> Vec<f32> {
        let mut p = self.policy_conv1.forward(trunk);
        self.policy_bn.apply(&mut p, true);
        let logits = self.policy_conv2.forward(&p);

        // (slot, square) -> (square, slot)
        let mut policy = vec![0.0f32; POLICY_LEN];
        for (slot, plane) in logits.chunks_exact(NUM_SQUARES).enumerate() {
            for (sq, &logit) in plane.iter().enumerate() {
                policy[sq * POLICY_SLOTS + slot] = logit;
            }
        }
        softmax(&mut policy);
        policy
    }
}

fn validate(arch: &Architecture) -> Result<(), WeightsError> {
    if arch.hidden_channels == 0 || arch.hidden_channels > MAX_HIDDEN_CHANNELS {
        return Err(WeightsError::BadArchitecture(format!(
            "hidden_channels {} outside 1..={}",
            arch.hidden_channels, MAX_HIDDEN_CHANNELS
        )));
    }
    if arch.num_res_blocks > MAX_RES_BLOCKS {
        return Err(WeightsError::BadArchitecture(format!(
            "num_res_blocks {} exceeds {}",
            arch.num_res_blocks, MAX_RES_BLOCKS
        )));
    }
    Ok(())
}

/// Every layer the loader reads, with its PyTorch shape
pub fn required_layers(arch: &Architecture) -> Vec<(String, Vec<usize>)> {
    let h = arch.hidden_channels;
    let mut layers = Vec::new();

    let bn = |layers: &mut Vec<(String, Vec<usize>)>, prefix: &str, ch: usize| {
        for stat in ["weight", "bias", "running_mean", "running_var"] {
            layers.push((format!("{prefix}.{stat}"), vec![ch]));
        }
    };

    layers.push(("input_conv.weight".to_string(), vec![h, NUM_PLANES, 3, 3]));
    bn(&mut layers, "input_bn", h);
    for i in 0..arch.num_res_blocks {
        layers.push((format!("res_blocks.{i}.conv1.weight"), vec![h, h, 3, 3]));
        bn(&mut layers, &format!("res_blocks.{i}.bn1"), h);
        layers.push((format!("res_blocks.{i}.conv2.weight"), vec![h, h, 3, 3]));
        bn(&mut layers, &format!("res_blocks.{i}.bn2"), h);
    }
    layers.push(("value_conv.weight".to_string(), vec![1, h, 1, 1]));
    bn(&mut layers, "value_bn", 1);
    layers.push(("value_fc1.weight".to_string(), vec![VALUE_HIDDEN, NUM_SQUARES]));
    layers.push(("value_fc1.bias".to_string(), vec![VALUE_HIDDEN]));
    layers.push(("value_fc2.weight".to_string(), vec![1, VALUE_HIDDEN]));
    layers.push(("value_fc2.bias".to_string(), vec![1]));
    layers.push(("policy_conv1.weight".to_string(), vec![h, h, 1, 1]));
    bn(&mut layers, "policy_bn", h);
    layers.push(("policy_conv2.weight".to_string(), vec![POLICY_SLOTS, h, 1, 1]));
    layers.push(("policy_conv2.bias".to_string(), vec![POLICY_SLOTS]));

    layers
}

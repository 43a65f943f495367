//! Inference primitives over the 8x10 board grid
//!
//! Activations are channel-major `[channels][ROWS][COLS]` flat buffers.

use khet_core::{COLS, NUM_SQUARES, ROWS};

use crate::weights::{Manifest, WeightsError};

/// Batch norm epsilon used at export time
pub const BN_EPSILON: f32 = 1e-5;

const H: usize = ROWS as usize;
const W: usize = COLS as usize;

/// Reads layers from a manifest and tallies the parameters taken
pub(crate) struct LayerReader<'a> {
    manifest: &'a Manifest,
    pub parameters: usize,
}

impl<'a> LayerReader<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Self {
            manifest,
            parameters: 0,
        }
    }

    pub fn tensor(&mut self, name: &str, len: usize) -> Result<Vec<f32>, WeightsError> {
        let values = self.manifest.tensor(name, len)?;
        self.parameters += values.len();
        Ok(values)
    }
}

// ============================================================================
// CONVOLUTION
// ============================================================================

/// Same-padded square convolution, PyTorch weight layout `[out, in, k, k]`
#[derive(Clone, Debug)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    weight: Vec<f32>,
    bias: Option<Vec<f32>>,
}

impl Conv2d {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        weight: Vec<f32>,
        bias: Option<Vec<f32>>,
    ) -> Self {
        debug_assert_eq!(weight.len(), out_channels * in_channels * kernel * kernel);
        Self {
            in_channels,
            out_channels,
            kernel,
            weight,
            bias,
        }
    }

    pub(crate) fn load(
        reader: &mut LayerReader<'_>,
        prefix: &str,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        with_bias: bool,
    ) -> Result<Self, WeightsError> {
        let weight = reader.tensor(
            &format!("{prefix}.weight"),
            out_channels * in_channels * kernel * kernel,
        )?;
        let bias = if with_bias {
            Some(reader.tensor(&format!("{prefix}.bias"), out_channels)?)
        } else {
            None
        };
        Ok(Self::new(in_channels, out_channels, kernel, weight, bias))
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.in_channels * NUM_SQUARES);
        let pad = (self.kernel / 2) as isize;
        let k = self.kernel;
        let mut output = vec![0.0f32; self.out_channels * NUM_SQUARES];

        for (oc, out) in output.chunks_exact_mut(NUM_SQUARES).enumerate() {
            if let Some(bias) = &self.bias {
                out.fill(bias[oc]);
            }
            for (ic, plane) in input.chunks_exact(NUM_SQUARES).enumerate() {
                let kernel = &self.weight[(oc * self.in_channels + ic) * k * k..][..k * k];
                for ky in 0..k {
                    for kx in 0..k {
                        let w = kernel[ky * k + kx];
                        if w == 0.0 {
                            continue;
                        }
                        let dy = ky as isize - pad;
                        let dx = kx as isize - pad;
                        accumulate_shifted(out, plane, w, dy, dx);
                    }
                }
            }
        }

        output
    }
}

/// `out[y][x] += w * plane[y + dy][x + dx]`, zero outside the grid
fn accumulate_shifted(out: &mut [f32], plane: &[f32], w: f32, dy: isize, dx: isize) {
    for y in 0..H {
        let sy = y as isize + dy;
        if sy < 0 || sy >= H as isize {
            continue;
        }
        let src = &plane[sy as usize * W..][..W];
        let dst = &mut out[y * W..][..W];
        for x in 0..W {
            let sx = x as isize + dx;
            if sx >= 0 && sx < W as isize {
                dst[x] += w * src[sx as usize];
            }
        }
    }
}

// ============================================================================
// BATCH NORM
// ============================================================================

/// Inference batch norm folded to `y = x * scale + shift` per channel
#[derive(Clone, Debug)]
pub struct BatchNorm {
    scale: Vec<f32>,
    shift: Vec<f32>,
}

impl BatchNorm {
    /// Fold `(x - mean) / sqrt(var + eps) * gamma + beta`
    pub fn fold(gamma: &[f32], beta: &[f32], mean: &[f32], var: &[f32]) -> Self {
        let scale: Vec<f32> = gamma
            .iter()
            .zip(var)
            .map(|(g, v)| g / (v + BN_EPSILON).sqrt())
            .collect();
        let shift = beta
            .iter()
            .zip(mean)
            .zip(&scale)
            .map(|((b, m), s)| b - m * s)
            .collect();
        Self { scale, shift }
    }

    pub(crate) fn load(
        reader: &mut LayerReader<'_>,
        prefix: &str,
        channels: usize,
    ) -> Result<Self, WeightsError> {
        let gamma = reader.tensor(&format!("{prefix}.weight"), channels)?;
        let beta = reader.tensor(&format!("{prefix}.bias"), channels)?;
        let mean = reader.tensor(&format!("{prefix}.running_mean"), channels)?;
        let var = reader.tensor(&format!("{prefix}.running_var"), channels)?;
        Ok(Self::fold(&gamma, &beta, &mean, &var))
    }

    /// Normalise in place, optionally followed by ReLU
    pub fn apply(&self, x: &mut [f32], relu: bool) {
        for (c, plane) in x.chunks_exact_mut(NUM_SQUARES).enumerate() {
            let (s, b) = (self.scale[c], self.shift[c]);
            for v in plane.iter_mut() {
                *v = *v * s + b;
                if relu && *v < 0.0 {
                    *v = 0.0;
                }
            }
        }
    }
}

// ============================================================================
// DENSE
// ============================================================================

/// Fully connected layer, weight layout `[out, in]`
#[derive(Clone, Debug)]
pub struct Linear {
    in_features: usize,
    weight: Vec<f32>,
    bias: Vec<f32>,
}

impl Linear {
    pub(crate) fn load(
        reader: &mut LayerReader<'_>,
        prefix: &str,
        in_features: usize,
        out_features: usize,
    ) -> Result<Self, WeightsError> {
        let weight = reader.tensor(&format!("{prefix}.weight"), out_features * in_features)?;
        let bias = reader.tensor(&format!("{prefix}.bias"), out_features)?;
        Ok(Self {
            in_features,
            weight,
            bias,
        })
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.in_features);
        self.weight
            .chunks_exact(self.in_features)
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect()
    }
}

// ============================================================================
// ACTIVATIONS
// ============================================================================

pub fn relu(x: &mut [f32]) {
    for v in x.iter_mut() {
        *v = v.max(0.0);
    }
}

/// Numerically stable softmax in place
pub fn softmax(x: &mut [f32]) {
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in x.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in x.iter_mut() {
            *v /= sum;
        }
    }
}

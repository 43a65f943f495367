//! Khet NN - from-scratch inference for the value/policy network
//!
//! Loads a weights manifest (base64 little-endian f32 tensors keyed by
//! PyTorch layer name) and evaluates encoded boards on the CPU. Batch norm is
//! folded at load time; the forward pass takes `&self` and allocates only
//! its activation buffers.

pub mod layers;
pub mod network;
pub mod weights;

pub use network::{required_layers, KhetNet, NetOutput, VALUE_HIDDEN};
pub use weights::{Architecture, Manifest, WeightsError};

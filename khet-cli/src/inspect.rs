//! Inspect-weights command - load a manifest and run one forward pass

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use khet_core::{encode, evaluate, index_to_move, GameState, HeuristicWeights};
use khet_nn::KhetNet;

#[derive(Args)]
pub struct InspectArgs {
    /// Network weights manifest
    #[arg(value_name = "FILE")]
    pub weights: PathBuf,

    /// Heuristic weights to compare against the value head
    #[arg(long, value_name = "FILE")]
    pub heuristics: Option<PathBuf>,

    /// Number of top policy entries to list
    #[arg(long, default_value = "5")]
    pub top: usize,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let net = KhetNet::load(&args.weights)
        .with_context(|| format!("Failed to load weights: {}", args.weights.display()))?;

    println!(
        "Architecture: {} hidden channels, {} residual blocks",
        net.hidden_channels(),
        net.num_res_blocks()
    );
    println!("Parameters:   {}", net.parameter_count());

    let state = GameState::new_game();
    let output = net.forward(&encode(&state));
    println!("Opening value (side to move): {:+.4}", output.value);

    let weights = match &args.heuristics {
        Some(path) => HeuristicWeights::load(path)?,
        None => HeuristicWeights::default(),
    };
    println!("Opening heuristic score:      {:+.1}", evaluate(&state, &weights));

    let mut ranked: Vec<(usize, f32)> = output.policy.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    println!("Top policy entries:");
    for (index, p) in ranked.into_iter().take(args.top) {
        let label = match index_to_move(&state, index) {
            Some(mv) if state.is_legal(mv) => format!("{}", mv),
            Some(mv) => format!("{} (illegal)", mv),
            None => "-".to_string(),
        };
        println!("  {:>4}  {:.4}  {}", index, p, label);
    }

    Ok(())
}

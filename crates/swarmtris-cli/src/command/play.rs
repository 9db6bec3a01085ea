use std::path::PathBuf;

use anyhow::{Context as _, ensure};
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::Deserialize;
use swarmtris_engine::{BoardSize, GameEngine};
use swarmtris_evolution::{Agent, AgentId, AgentState, NeuralPolicy, RoundState};
use tracing::{info, warn};

use crate::util::{Output, read_json_file};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PlayArg {
    /// Policy JSON, bare or as written by `evolve --best-output`; random if omitted
    #[arg(long)]
    policy: Option<PathBuf>,
    #[arg(long, default_value_t = 10)]
    width: usize,
    #[arg(long, default_value_t = 10)]
    height: usize,
    /// Frames per gravity tick
    #[arg(long, default_value_t = 9)]
    frames_per_tick: usize,
    /// Hidden units of the random policy
    #[arg(long, default_value_t = NeuralPolicy::DEFAULT_HIDDEN_UNITS)]
    hidden_units: usize,
    /// Seed for the random policy and the piece sequence
    #[arg(long)]
    seed: Option<u64>,
    /// Stop after this many frames even if the game is still running
    #[arg(long)]
    max_frames: Option<usize>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PolicyFile {
    WithMetadata { policy: NeuralPolicy },
    Bare(NeuralPolicy),
}

impl PolicyFile {
    fn into_policy(self) -> NeuralPolicy {
        match self {
            Self::WithMetadata { policy } | Self::Bare(policy) => policy,
        }
    }
}

pub(crate) fn run(arg: &PlayArg) -> anyhow::Result<()> {
    let state = play(arg)?;
    Output::save_json(&state, arg.output.clone())
}

fn play(arg: &PlayArg) -> anyhow::Result<AgentState> {
    ensure!(arg.frames_per_tick > 0, "frames per tick must be at least 1");
    let size = BoardSize::new(arg.width, arg.height).context("Invalid board size")?;
    let mut rng = match arg.seed {
        Some(seed) => Pcg32::seed_from_u64(seed),
        None => Pcg32::from_rng(&mut rand::rng()),
    };

    let policy = match &arg.policy {
        Some(path) => {
            let policy = read_json_file::<PolicyFile, _>("policy", path)?.into_policy();
            ensure!(
                policy.input_len() == size.cell_count(),
                "policy expects {} inputs but a {}x{} board has {} cells",
                policy.input_len(),
                size.width(),
                size.height(),
                size.cell_count(),
            );
            policy
        }
        None => NeuralPolicy::random(size.cell_count(), arg.hidden_units, &mut rng),
    };
    let engine = GameEngine::with_seed(size, rng.random());
    let mut agent = Agent::new(AgentId::new(0), engine, policy);

    let mut round = RoundState::new();
    round.begin_round();
    while !agent.is_game_over() {
        if arg.max_frames.is_some_and(|max| round.frame >= max) {
            warn!(frames = round.frame, "frame limit reached before game over");
            break;
        }
        let do_tick = round.advance_frame(arg.frames_per_tick);
        agent.think_then_move(do_tick);
    }

    let state = agent.state();
    info!(
        frames = round.frame,
        ticks = round.ticks,
        score = state.score,
        fitness = state.fitness,
        "game finished"
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg() -> PlayArg {
        PlayArg {
            policy: None,
            width: 6,
            height: 8,
            frames_per_tick: 3,
            hidden_units: 4,
            seed: Some(5),
            max_frames: Some(2_000),
            output: None,
        }
    }

    #[test]
    fn test_seeded_play_is_reproducible() {
        let first = play(&arg()).unwrap();
        let second = play(&arg()).unwrap();
        assert_eq!(first, second);
        assert_eq!((first.width, first.height), (6, 8));
    }

    #[test]
    fn test_frame_limit_stops_play() {
        let state = play(&PlayArg {
            max_frames: Some(0),
            ..arg()
        })
        .unwrap();
        assert!(!state.is_game_over);
        assert_eq!(state.fitness, 0.0);
    }

    #[test]
    fn test_rejects_zero_frames_per_tick() {
        let err = play(&PlayArg {
            frames_per_tick: 0,
            ..arg()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "frames per tick must be at least 1");
    }

    #[test]
    fn test_policy_file_accepts_both_layouts() {
        let mut rng = Pcg32::seed_from_u64(1);
        let policy = NeuralPolicy::random(4, 2, &mut rng);
        let bare = serde_json::to_value(&policy).unwrap();
        let wrapped = serde_json::json!({ "name": "agent-0", "policy": bare.clone() });

        let from_bare: PolicyFile = serde_json::from_value(bare).unwrap();
        let from_wrapped: PolicyFile = serde_json::from_value(wrapped).unwrap();
        assert_eq!(from_bare.into_policy(), policy);
        assert_eq!(from_wrapped.into_policy(), policy);
    }
}

//! Population evolution for Tetris-playing policies.
//!
//! This crate runs many games of [`swarmtris_engine`] at once, each driven by
//! its own [`Policy`], and breeds the policies generation over generation
//! using the fitness they earn in play.
//!
//! # How a Round Works
//!
//! 1. **Play** - Every agent plays its game one frame at a time; the policy
//!    picks one move per frame and gravity advances every few frames
//! 2. **Fitness** - Agents earn fitness for moving, for surviving ticks and
//!    for every point scored
//! 3. **Persist** - Once all games are over, every agent saves its policy
//! 4. **Selection** - Parents are drawn by roulette wheel, proportional to fitness
//! 5. **Crossover** - Every agent replaces its policy with a mutated child of
//!    two parents and starts a new game
//!
//! # Architecture
//!
//! ```text
//! Coordinator (owns the population view, round state, selection)
//!     ↓ AgentCommand (per-agent channel)
//! Worker task × N (owns Agent = GameEngine + Policy + fitness)
//!     ↓ AgentReport (shared channel)
//! Coordinator
//!     ↓ watch channel
//! PopulationSnapshot observers
//! ```
//!
//! Agents never see each other's state. The `persist` and `crossover`
//! phases are synchronized with a [`PhaseBarrier`]; frames are not.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use swarmtris_evolution::{Coordinator, EvolutionConfig, MemoryPolicyStore, NeuralPolicyFactory};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = EvolutionConfig {
//!     population_size: 8,
//!     seed: Some(42),
//!     ..EvolutionConfig::default()
//! };
//! let factory = NeuralPolicyFactory {
//!     hidden_units: config.hidden_units,
//! };
//! let store = Arc::new(MemoryPolicyStore::new());
//!
//! let mut coordinator = Coordinator::spawn(config, &factory, store).await.unwrap();
//! let summaries = coordinator.run(2, |summary| println!("{summary:?}")).await.unwrap();
//! assert_eq!(summaries.len(), 2);
//! coordinator.shutdown().await.unwrap();
//! # });
//! ```
//!
//! # Current Limitations
//!
//! - **No elitism**: every agent is replaced by a child each round, so the
//!   best policy can be lost
//! - **Single process**: workers are tokio tasks; there is no distribution
//!   across machines

pub use self::{
    agent::*, barrier::*, coordinator::*, policy::*, selection::*, store::*, summary::*,
    worker::{AgentCommand, AgentReport, ReportKind},
};

mod agent;
mod barrier;
mod coordinator;
pub mod policy;
mod selection;
mod store;
mod summary;
pub mod weights;
mod worker;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use swarmtris_evolution::{
    Coordinator, EvolutionConfig, JsonDirPolicyStore, MemoryPolicyStore, NeuralPolicy,
    NeuralPolicyFactory, PolicyStore, RoundSummary, policy_label,
};
use tracing::info;

use crate::util::{Output, read_json_file};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct EvolveArg {
    /// Number of agents in the population
    #[arg(long)]
    population: Option<usize>,
    /// Board width in cells
    #[arg(long)]
    width: Option<usize>,
    /// Board height in cells
    #[arg(long)]
    height: Option<usize>,
    /// Frames per gravity tick
    #[arg(long)]
    frames_per_tick: Option<usize>,
    /// Per-parameter mutation probability
    #[arg(long)]
    mutation_rate: Option<f32>,
    /// Hidden units of each neural policy
    #[arg(long)]
    hidden_units: Option<usize>,
    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
    /// End a round's play after this many frames
    #[arg(long)]
    max_frames: Option<usize>,
    /// Number of rounds to run
    #[arg(long, default_value_t = 10)]
    generations: usize,
    /// Evolution config JSON; replaces the flags above
    #[arg(long)]
    config: Option<PathBuf>,
    /// Keep policies as JSON files in this directory instead of in memory
    #[arg(long)]
    policy_dir: Option<PathBuf>,
    /// Append one JSON line per round summary to this file
    #[arg(long)]
    stats_output: Option<PathBuf>,
    /// Rewrite the latest population snapshot to this file after every round
    #[arg(long)]
    snapshot_output: Option<PathBuf>,
    /// Write the best policy of the final round to this file
    #[arg(long)]
    best_output: Option<PathBuf>,
}

impl EvolveArg {
    fn config(&self) -> anyhow::Result<EvolutionConfig> {
        if let Some(path) = &self.config {
            return read_json_file("evolution config", path);
        }
        let defaults = EvolutionConfig::default();
        Ok(EvolutionConfig {
            population_size: self.population.unwrap_or(defaults.population_size),
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            frames_per_tick: self.frames_per_tick.unwrap_or(defaults.frames_per_tick),
            mutation_rate: self.mutation_rate.unwrap_or(defaults.mutation_rate),
            hidden_units: self.hidden_units.unwrap_or(defaults.hidden_units),
            seed: self.seed.or(defaults.seed),
            max_frames_per_round: self.max_frames.or(defaults.max_frames_per_round),
        })
    }
}

/// The best policy of a run, with where it came from.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BestPolicy {
    pub name: String,
    pub trained_at: DateTime<Utc>,
    pub round: usize,
    pub fitness: f32,
    pub config: EvolutionConfig,
    pub policy: NeuralPolicy,
}

pub(crate) async fn run(arg: &EvolveArg) -> anyhow::Result<()> {
    let config = arg.config()?;
    match &arg.policy_dir {
        Some(dir) => {
            let store = JsonDirPolicyStore::new(dir).with_context(|| {
                format!("Failed to prepare policy directory: {}", dir.display())
            })?;
            evolve(arg, config, Arc::new(store)).await
        }
        None => evolve(arg, config, Arc::new(MemoryPolicyStore::new())).await,
    }
}

async fn evolve<S>(arg: &EvolveArg, config: EvolutionConfig, store: Arc<S>) -> anyhow::Result<()>
where
    S: PolicyStore<NeuralPolicy>,
{
    let factory = NeuralPolicyFactory {
        hidden_units: config.hidden_units,
    };
    info!(
        population = config.population_size,
        width = config.width,
        height = config.height,
        generations = arg.generations,
        "starting evolution"
    );
    let mut coordinator = Coordinator::spawn(config, &factory, store)
        .await
        .context("Failed to start the population")?;
    let snapshots = coordinator.subscribe();

    let mut last: Option<RoundSummary> = None;
    for _ in 0..arg.generations {
        let summary = coordinator
            .run_round()
            .await
            .context("Evolution round failed")?;
        if let Some(path) = &arg.stats_output {
            Output::append(path.clone())?.write_json(&summary, false)?;
        }
        if let Some(path) = &arg.snapshot_output {
            let snapshot = snapshots.borrow().clone();
            Output::save_json(&snapshot, Some(path.clone()))?;
        }
        last = Some(summary);
    }

    if let (Some(path), Some(summary)) = (&arg.best_output, &last) {
        let best = best_policy(&coordinator, summary)?;
        Output::save_json(&best, Some(path.clone()))?;
        info!(name = %best.name, fitness = best.fitness, path = %path.display(), "saved best policy");
    }

    coordinator
        .shutdown()
        .await
        .context("Failed to stop agent workers")?;
    Ok(())
}

/// Loads the policy the best agent persisted in the round of `summary`.
fn best_policy<S>(
    coordinator: &Coordinator<NeuralPolicy, S>,
    summary: &RoundSummary,
) -> anyhow::Result<BestPolicy>
where
    S: PolicyStore<NeuralPolicy>,
{
    let id = summary
        .best_agent
        .with_context(|| format!("Round {} had no agents", summary.round))?;
    let name = policy_label(id);
    let policy = coordinator
        .store()
        .load(&name)
        .with_context(|| format!("Failed to load the best policy: {name}"))?;
    Ok(BestPolicy {
        name,
        trained_at: Utc::now(),
        round: summary.round,
        fitness: summary.fitness.max,
        config: coordinator.config().clone(),
        policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_fill_config() {
        let arg = EvolveArg {
            population: Some(4),
            width: Some(6),
            seed: Some(9),
            ..EvolveArg::default()
        };
        let config = arg.config().unwrap();
        assert_eq!(config.population_size, 4);
        assert_eq!(config.width, 6);
        assert_eq!(config.height, EvolutionConfig::default().height);
        assert_eq!(config.seed, Some(9));
    }

    #[tokio::test]
    async fn test_best_policy_comes_from_store() {
        let config = EvolutionConfig {
            population_size: 3,
            width: 6,
            height: 6,
            hidden_units: 4,
            seed: Some(11),
            ..EvolutionConfig::default()
        };
        let factory = NeuralPolicyFactory { hidden_units: 4 };
        let store = Arc::new(MemoryPolicyStore::new());
        let mut coordinator = Coordinator::spawn(config, &factory, store).await.unwrap();
        let summary = coordinator.run_round().await.unwrap();

        let best = best_policy(&coordinator, &summary).unwrap();
        assert_eq!(Some(best.name.as_str()), summary.best_agent.map(policy_label).as_deref());
        assert_eq!(best.round, 1);
        assert_eq!(best.policy.input_len(), 36);
        assert_eq!(best.policy.hidden_units(), 4);

        coordinator.shutdown().await.unwrap();
    }
}

//! Population coordinator.
//!
//! The coordinator owns the population array and drives every agent through
//! the phases of a round:
//!
//! 1. **Step** - Send one frame to every agent still playing, collecting move
//!    reports as they arrive, until every agent has reported game over.
//!    Every `frames_per_tick`-th frame also advances gravity.
//! 2. **Persist** - Every agent saves its policy; waits on a [`PhaseBarrier`].
//! 3. **Selection** - Fitness is normalized into [`FitnessShares`] and two
//!    parents are drawn by roulette wheel for every agent.
//! 4. **Crossover** - Every agent breeds its parents, mutates the child and
//!    starts a fresh game; waits on a [`PhaseBarrier`].
//!
//! Agents that are already over are not sent further frames but still take
//! part in both barriered phases. The per-frame step is never barriered; move
//! reports are folded into the population view whenever they arrive.
//!
//! Any protocol violation (a report from an unknown agent, a report that
//! does not belong to the current phase, a failed agent, a vanished worker)
//! aborts the round with a [`CoordinatorError`].

use std::{marker::PhantomData, sync::Arc};

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use swarmtris_engine::{BoardSize, BoardSizeError, GameEngine};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, error::TryRecvError},
        watch,
    },
    task::JoinError,
};
use tracing::{debug, info, warn};

use crate::{
    Agent, AgentCommand, AgentId, AgentReport, AgentState, BarrierError, FitnessShares, Phase,
    PhaseBarrier, Policy, PolicyFactory, PolicyStore, PopulationSnapshot, ReportKind,
    RoundSummary,
    worker::{Worker, WorkerHandle},
};

/// Parameters of an evolution run.
///
/// Every field has a default, so a JSON config only needs to name the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub width: usize,
    pub height: usize,
    /// Frames per gravity tick; policies decide once per frame.
    pub frames_per_tick: usize,
    /// Per-parameter mutation probability.
    pub mutation_rate: f32,
    pub hidden_units: usize,
    /// Seeds every policy, game and selection for a reproducible run.
    pub seed: Option<u64>,
    /// Ends the step phase after this many frames even if games are still running.
    pub max_frames_per_round: Option<usize>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            width: 10,
            height: 10,
            frames_per_tick: 9,
            mutation_rate: 0.01,
            hidden_units: 16,
            seed: None,
            max_frames_per_round: None,
        }
    }
}

impl EvolutionConfig {
    pub fn board_size(&self) -> Result<BoardSize, CoordinatorError> {
        BoardSize::new(self.width, self.height)
            .map_err(|source| CoordinatorError::BoardSize { source })
    }

    pub fn validate(&self) -> Result<(), CoordinatorError> {
        let invalid = |reason: &str| {
            Err(CoordinatorError::InvalidConfig {
                reason: reason.to_owned(),
            })
        };
        if self.population_size == 0 {
            return invalid("population size must be at least 1");
        }
        if self.frames_per_tick == 0 {
            return invalid("frames per tick must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return invalid("mutation rate must be within 0..=1");
        }
        if self.hidden_units == 0 {
            return invalid("hidden units must be at least 1");
        }
        self.board_size()?;
        Ok(())
    }
}

/// Progress through the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundState {
    pub round: usize,
    pub phase: Phase,
    pub frame: usize,
    pub frames_since_tick: usize,
    pub ticks: usize,
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            round: 0,
            phase: Phase::Init,
            frame: 0,
            frames_since_tick: 0,
            ticks: 0,
        }
    }

    /// Moves to the next round and resets the frame counters.
    pub fn begin_round(&mut self) {
        self.round += 1;
        self.phase = Phase::Step;
        self.frame = 0;
        self.frames_since_tick = 0;
        self.ticks = 0;
    }

    /// Counts one frame; returns whether it is a gravity tick.
    pub fn advance_frame(&mut self, frames_per_tick: usize) -> bool {
        self.frame += 1;
        self.frames_since_tick += 1;
        if self.frames_since_tick >= frames_per_tick {
            self.frames_since_tick = 0;
            self.ticks += 1;
            return true;
        }
        false
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CoordinatorError {
    #[display("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
    #[display("invalid board size")]
    BoardSize { source: BoardSizeError },
    #[display("phase barrier violated")]
    Barrier { source: BarrierError },
    #[display("report from {id}, which is not in the population")]
    UnknownAgent { id: AgentId },
    #[display("unexpected {report} report from {id} during {phase}")]
    UnexpectedReport {
        phase: Phase,
        id: AgentId,
        report: &'static str,
    },
    #[display("{id} failed during {phase}: {message}")]
    AgentFailed {
        phase: Phase,
        id: AgentId,
        message: String,
    },
    #[display("agent workers disconnected")]
    WorkersDisconnected,
    #[display("agent worker task failed")]
    WorkerJoin { source: JoinError },
}

impl From<BarrierError> for CoordinatorError {
    fn from(source: BarrierError) -> Self {
        Self::Barrier { source }
    }
}

/// Runs a population of agents, one tokio task each.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use swarmtris_evolution::{Coordinator, EvolutionConfig, MemoryPolicyStore, NeuralPolicyFactory};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let config = EvolutionConfig {
///     population_size: 4,
///     width: 5,
///     height: 4,
///     seed: Some(1),
///     ..EvolutionConfig::default()
/// };
/// let factory = NeuralPolicyFactory { hidden_units: 4 };
/// let store = Arc::new(MemoryPolicyStore::new());
/// let mut coordinator = Coordinator::spawn(config, &factory, store).await.unwrap();
/// let summary = coordinator.run_round().await.unwrap();
/// assert_eq!(summary.round, 1);
/// coordinator.shutdown().await.unwrap();
/// # });
/// ```
pub struct Coordinator<P, S> {
    config: EvolutionConfig,
    store: Arc<S>,
    workers: Vec<WorkerHandle>,
    reports: UnboundedReceiver<AgentReport>,
    states: Vec<AgentState>,
    round: RoundState,
    barrier: PhaseBarrier,
    rng: Pcg32,
    snapshots: watch::Sender<PopulationSnapshot>,
    _policy: PhantomData<fn() -> P>,
}

impl<P, S> Coordinator<P, S>
where
    P: Policy,
    S: PolicyStore<P>,
{
    /// Creates the population, starts one task per agent and waits for all
    /// of them to report in.
    pub async fn spawn<F>(
        config: EvolutionConfig,
        factory: &F,
        store: Arc<S>,
    ) -> Result<Self, CoordinatorError>
    where
        F: PolicyFactory<P>,
    {
        config.validate()?;
        let size = config.board_size()?;
        let mut rng = match config.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_rng(&mut rand::rng()),
        };

        let (report_tx, reports) = mpsc::unbounded_channel();
        let workers = (0..config.population_size)
            .map(|index| {
                let id = AgentId::new(index);
                let policy = factory.create(size.cell_count(), &mut rng);
                let engine = GameEngine::with_seed(size, rng.random());
                let worker_rng = Pcg32::seed_from_u64(rng.random());
                Worker::spawn(
                    Agent::new(id, engine, policy),
                    worker_rng,
                    Arc::clone(&store),
                    config.mutation_rate,
                    report_tx.clone(),
                )
            })
            .collect();
        drop(report_tx);

        let (snapshots, _) = watch::channel(PopulationSnapshot::default());
        let mut coordinator = Self {
            barrier: PhaseBarrier::new(Phase::Init, config.population_size),
            config,
            store,
            workers,
            reports,
            states: Vec::new(),
            round: RoundState::new(),
            rng,
            snapshots,
            _policy: PhantomData,
        };

        let mut initial: Vec<Option<AgentState>> = vec![None; coordinator.config.population_size];
        coordinator.barrier.reset(Phase::Init);
        loop {
            let report = coordinator.next_report().await?;
            let id = report.id;
            match report.kind {
                ReportKind::Init(state) => {
                    let released = coordinator.report_to_barrier(id)?;
                    initial[id.index()] = Some(state);
                    if released {
                        break;
                    }
                }
                ReportKind::Failed(message) => {
                    return Err(CoordinatorError::AgentFailed {
                        phase: Phase::Init,
                        id,
                        message,
                    });
                }
                kind => {
                    return Err(CoordinatorError::UnexpectedReport {
                        phase: Phase::Init,
                        id,
                        report: kind.name(),
                    });
                }
            }
        }
        coordinator.states = initial.into_iter().flatten().collect();
        info!(
            population = coordinator.states.len(),
            "all agents initialized"
        );
        coordinator.publish();
        Ok(coordinator)
    }

    #[must_use]
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn round_state(&self) -> &RoundState {
        &self.round
    }

    /// Latest known state of every agent, indexed by [`AgentId`].
    #[must_use]
    pub fn states(&self) -> &[AgentState] {
        &self.states
    }

    /// Observers receive a fresh [`PopulationSnapshot`] after every batch of
    /// reports and every phase change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PopulationSnapshot> {
        self.snapshots.subscribe()
    }

    /// Plays one full round and breeds the next generation.
    pub async fn run_round(&mut self) -> Result<RoundSummary, CoordinatorError> {
        self.round.begin_round();
        info!(round = self.round.round, "round started");
        self.publish();
        self.play().await?;

        self.enter_phase(Phase::Persist);
        self.broadcast(AgentCommand::Persist).await?;
        self.wait_for_barrier().await?;

        let fitness: Vec<f32> = self.states.iter().map(|s| s.fitness).collect();
        let shares = FitnessShares::new(&fitness);
        if shares.is_degenerate() {
            warn!(
                round = self.round.round,
                "no agent earned fitness, selecting parents uniformly"
            );
        }
        let summary = RoundSummary::from_states(
            self.round.round,
            self.round.frame,
            self.round.ticks,
            &self.states,
            shares.is_degenerate(),
        );

        self.enter_phase(Phase::Crossover);
        for index in 0..self.workers.len() {
            let parent_a = AgentId::new(shares.select(&mut self.rng));
            let parent_b = AgentId::new(shares.select(&mut self.rng));
            self.send(index, AgentCommand::Crossover { parent_a, parent_b })
                .await?;
        }
        self.wait_for_barrier().await?;

        info!(
            round = summary.round,
            frames = summary.frames,
            ticks = summary.ticks,
            mean_fitness = summary.fitness.mean,
            min_fitness = summary.fitness.min,
            max_fitness = summary.fitness.max,
            scorers = summary.scorer_count,
            best_score = summary.best_score,
            "round finished"
        );
        Ok(summary)
    }

    /// Runs `generations` rounds, calling `on_round` after each.
    pub async fn run<F>(
        &mut self,
        generations: usize,
        mut on_round: F,
    ) -> Result<Vec<RoundSummary>, CoordinatorError>
    where
        F: FnMut(&RoundSummary),
    {
        let mut summaries = Vec::with_capacity(generations);
        for _ in 0..generations {
            let summary = self.run_round().await?;
            on_round(&summary);
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Closes every command channel and waits for the agent tasks to finish.
    pub async fn shutdown(self) -> Result<(), CoordinatorError> {
        let Self { workers, .. } = self;
        let tasks: Vec<_> = workers
            .into_iter()
            .map(|WorkerHandle { commands, task }| {
                drop(commands);
                task
            })
            .collect();
        for task in tasks {
            task.await
                .map_err(|source| CoordinatorError::WorkerJoin { source })?;
        }
        debug!("all agent workers stopped");
        Ok(())
    }

    /// The step phase: frames until every agent is reported over.
    async fn play(&mut self) -> Result<(), CoordinatorError> {
        while self.states.iter().any(|s| !s.is_game_over) {
            if let Some(max) = self.config.max_frames_per_round
                && self.round.frame >= max
            {
                warn!(
                    round = self.round.round,
                    frames = self.round.frame,
                    active = self.states.iter().filter(|s| !s.is_game_over).count(),
                    "frame limit reached, ending round with games still running"
                );
                break;
            }

            let do_tick = self.round.advance_frame(self.config.frames_per_tick);
            for index in 0..self.workers.len() {
                if !self.states[index].is_game_over {
                    self.send(index, AgentCommand::Step { do_tick }).await?;
                }
            }
            self.drain_moves()?;
            self.publish();
            tokio::task::yield_now().await;
        }
        debug!(
            round = self.round.round,
            frames = self.round.frame,
            "every game is over"
        );
        Ok(())
    }

    /// Folds in the move reports that have already arrived.
    fn drain_moves(&mut self) -> Result<(), CoordinatorError> {
        loop {
            match self.reports.try_recv() {
                Ok(report) => match report.kind {
                    ReportKind::Moved(state) => self.update_state(report.id, state)?,
                    kind => return Err(self.unexpected(report.id, &kind)),
                },
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return Err(CoordinatorError::WorkersDisconnected);
                }
            }
        }
    }

    /// Collects reports until every agent has completed the current phase.
    async fn wait_for_barrier(&mut self) -> Result<(), CoordinatorError> {
        let phase = self.round.phase;
        self.barrier.reset(phase);
        loop {
            let report = self.next_report().await?;
            let id = report.id;
            let completed = match (phase, report.kind) {
                (_, ReportKind::Failed(message)) => {
                    return Err(CoordinatorError::AgentFailed { phase, id, message });
                }
                // frames sent before the phase change are still in flight
                (Phase::Persist, ReportKind::Moved(state)) => {
                    self.update_state(id, state)?;
                    false
                }
                (Phase::Persist, ReportKind::Persisted { fitness }) => {
                    self.state_mut(id)?.fitness = fitness;
                    true
                }
                (Phase::Crossover, ReportKind::CrossedOver(state)) => {
                    self.update_state(id, state)?;
                    true
                }
                (_, kind) => return Err(self.unexpected(id, &kind)),
            };
            if completed && self.report_to_barrier(id)? {
                info!(round = self.round.round, %phase, "phase complete");
                self.publish();
                return Ok(());
            }
        }
    }

    /// Returns whether the barrier released.
    fn report_to_barrier(&mut self, id: AgentId) -> Result<bool, CoordinatorError> {
        let status = self.barrier.report(id)?;
        debug!(%id, phase = %self.barrier.phase(), ?status, "barrier report");
        Ok(status.is_released())
    }

    async fn next_report(&mut self) -> Result<AgentReport, CoordinatorError> {
        self.reports
            .recv()
            .await
            .ok_or(CoordinatorError::WorkersDisconnected)
    }

    async fn broadcast(&self, command: AgentCommand) -> Result<(), CoordinatorError> {
        for index in 0..self.workers.len() {
            self.send(index, command).await?;
        }
        Ok(())
    }

    async fn send(&self, index: usize, command: AgentCommand) -> Result<(), CoordinatorError> {
        self.workers[index]
            .commands
            .send(command)
            .await
            .map_err(|_| CoordinatorError::WorkersDisconnected)
    }

    fn enter_phase(&mut self, phase: Phase) {
        self.round.phase = phase;
        debug!(round = self.round.round, %phase, "entering phase");
        self.publish();
    }

    fn state_mut(&mut self, id: AgentId) -> Result<&mut AgentState, CoordinatorError> {
        self.states
            .get_mut(id.index())
            .ok_or(CoordinatorError::UnknownAgent { id })
    }

    fn update_state(&mut self, id: AgentId, state: AgentState) -> Result<(), CoordinatorError> {
        *self.state_mut(id)? = state;
        Ok(())
    }

    fn unexpected(&self, id: AgentId, kind: &ReportKind) -> CoordinatorError {
        match kind {
            ReportKind::Failed(message) => CoordinatorError::AgentFailed {
                phase: self.round.phase,
                id,
                message: message.clone(),
            },
            _ => CoordinatorError::UnexpectedReport {
                phase: self.round.phase,
                id,
                report: kind.name(),
            },
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(PopulationSnapshot {
            round: self.round.round,
            phase: Some(self.round.phase),
            agents: self.states.clone(),
        });
    }
}

//! Task-per-agent execution.
//!
//! Each agent lives in its own tokio task and owns its game, policy and
//! random generator outright. The coordinator talks to it only through
//! [`AgentCommand`]s on the agent's own channel; the agent answers with
//! [`AgentReport`]s on a channel shared by the whole population. Commands are
//! handled strictly in order, so one agent never overlaps two steps.

use std::sync::Arc;

use rand::Rng as _;
use rand_pcg::Pcg32;
use swarmtris_engine::{BoardSize, GameEngine};
use tokio::{
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
};
use tracing::trace;

use crate::{Agent, AgentId, AgentState, Policy, PolicyStore, PolicyStoreError, policy_label};

/// Pending commands buffered per agent before the coordinator has to wait.
const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentCommand {
    /// Play one frame; `do_tick` also advances gravity.
    Step { do_tick: bool },
    /// Save the current policy under the agent's label.
    Persist,
    /// Replace the policy with a mutated child of two stored parents and
    /// start a new game.
    Crossover { parent_a: AgentId, parent_b: AgentId },
}

#[derive(Debug, Clone)]
pub struct AgentReport {
    pub id: AgentId,
    pub kind: ReportKind,
}

#[derive(Debug, Clone, derive_more::IsVariant)]
pub enum ReportKind {
    /// Sent once when the task starts.
    Init(AgentState),
    Moved(AgentState),
    Persisted { fitness: f32 },
    CrossedOver(AgentState),
    /// The command could not be carried out.
    Failed(String),
}

impl ReportKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Moved(_) => "moved",
            Self::Persisted { .. } => "persisted",
            Self::CrossedOver(_) => "crossed-over",
            Self::Failed(_) => "failed",
        }
    }
}

/// Coordinator-side handle of a running agent task.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    pub(crate) commands: mpsc::Sender<AgentCommand>,
    pub(crate) task: JoinHandle<()>,
}

pub(crate) struct Worker<P, S> {
    agent: Agent<P>,
    rng: Pcg32,
    store: Arc<S>,
    mutation_rate: f32,
    commands: mpsc::Receiver<AgentCommand>,
    reports: UnboundedSender<AgentReport>,
}

impl<P, S> Worker<P, S>
where
    P: Policy,
    S: PolicyStore<P>,
{
    /// Starts the agent's task on the current runtime.
    pub(crate) fn spawn(
        agent: Agent<P>,
        rng: Pcg32,
        store: Arc<S>,
        mutation_rate: f32,
        reports: UnboundedSender<AgentReport>,
    ) -> WorkerHandle {
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let worker = Self {
            agent,
            rng,
            store,
            mutation_rate,
            commands,
            reports,
        };
        WorkerHandle {
            commands: command_tx,
            task: tokio::spawn(worker.run()),
        }
    }

    async fn run(mut self) {
        let id = self.agent.id();
        let _guard = UnwindGuard {
            id,
            reports: self.reports.clone(),
        };
        if !self.report(ReportKind::Init(self.agent.state())) {
            return;
        }
        while let Some(command) = self.commands.recv().await {
            trace!(%id, ?command, "handling command");
            let kind = match command {
                AgentCommand::Step { do_tick } => {
                    self.agent.think_then_move(do_tick);
                    ReportKind::Moved(self.agent.state())
                }
                AgentCommand::Persist => self.persist().await,
                AgentCommand::Crossover { parent_a, parent_b } => {
                    self.crossover(parent_a, parent_b).await
                }
            };
            if !self.report(kind) {
                break;
            }
        }
        trace!(%id, "worker stopped");
    }

    /// Returns `false` once the coordinator has gone away.
    fn report(&self, kind: ReportKind) -> bool {
        let report = AgentReport {
            id: self.agent.id(),
            kind,
        };
        self.reports.send(report).is_ok()
    }

    async fn persist(&self) -> ReportKind {
        let label = policy_label(self.agent.id());
        let store = Arc::clone(&self.store);
        let policy = self.agent.policy().clone();
        match tokio::task::spawn_blocking(move || store.save(&label, &policy)).await {
            Ok(Ok(())) => ReportKind::Persisted {
                fitness: self.agent.fitness(),
            },
            Ok(Err(e)) => ReportKind::Failed(e.to_string()),
            Err(e) => ReportKind::Failed(format!("persist task failed: {e}")),
        }
    }

    async fn crossover(&mut self, parent_a: AgentId, parent_b: AgentId) -> ReportKind {
        let store = Arc::clone(&self.store);
        let load = move || -> Result<(P, P), PolicyStoreError> {
            let a = store.load(&policy_label(parent_a))?;
            let b = store.load(&policy_label(parent_b))?;
            Ok((a, b))
        };
        let (a, b) = match tokio::task::spawn_blocking(load).await {
            Ok(Ok(parents)) => parents,
            Ok(Err(e)) => return ReportKind::Failed(e.to_string()),
            Err(e) => return ReportKind::Failed(format!("crossover task failed: {e}")),
        };

        let mut child = a.crossover(&b, &mut self.rng);
        child.mutate(self.mutation_rate, &mut self.rng);
        let size: BoardSize = self.agent.engine().size();
        let engine = GameEngine::with_seed(size, self.rng.random());
        self.agent.restart(engine, child);
        ReportKind::CrossedOver(self.agent.state())
    }
}

/// Reports a failure when the worker task unwinds from a panic. The shared
/// report channel stays open while any other worker is alive.
struct UnwindGuard {
    id: AgentId,
    reports: UnboundedSender<AgentReport>,
}

impl Drop for UnwindGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let report = AgentReport {
                id: self.id,
                kind: ReportKind::Failed("worker task panicked".to_owned()),
            };
            // nobody to tell if the coordinator is gone too
            let _ = self.reports.send(report);
        }
    }
}

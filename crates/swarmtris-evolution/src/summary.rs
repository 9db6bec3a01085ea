use serde::Serialize;

use crate::{AgentId, AgentState, FitnessStats, Phase};

/// Outcome of one completed round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSummary {
    pub round: usize,
    /// Step frames dispatched during play.
    pub frames: usize,
    /// Frames that advanced gravity.
    pub ticks: usize,
    pub fitness: FitnessStats,
    /// Agents that scored at least one point.
    pub scorer_count: usize,
    pub best_score: usize,
    /// Agent with the highest fitness, first one on ties.
    pub best_agent: Option<AgentId>,
    /// No agent earned fitness, so parents were chosen uniformly.
    pub degenerate: bool,
}

impl RoundSummary {
    /// Builds the summary from the agents' final states.
    #[must_use]
    pub fn from_states(
        round: usize,
        frames: usize,
        ticks: usize,
        states: &[AgentState],
        degenerate: bool,
    ) -> Self {
        let fitness: Vec<f32> = states.iter().map(|s| s.fitness).collect();
        Self {
            round,
            frames,
            ticks,
            fitness: FitnessStats::new(&fitness),
            scorer_count: states.iter().filter(|s| s.score > 0).count(),
            best_score: states.iter().map(|s| s.score).max().unwrap_or(0),
            best_agent: fittest(states).map(|s| s.id),
            degenerate,
        }
    }
}

/// The whole population as last reported, for observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulationSnapshot {
    pub round: usize,
    pub phase: Option<Phase>,
    pub agents: Vec<AgentState>,
}

impl PopulationSnapshot {
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.agents.iter().filter(|a| !a.is_game_over).count()
    }

    /// The agent with the highest fitness, first one on ties.
    #[must_use]
    pub fn best(&self) -> Option<&AgentState> {
        fittest(&self.agents)
    }
}

fn fittest(states: &[AgentState]) -> Option<&AgentState> {
    states.iter().reduce(|best, state| {
        if state.fitness > best.fitness {
            state
        } else {
            best
        }
    })
}

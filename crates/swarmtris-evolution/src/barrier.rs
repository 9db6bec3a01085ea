use std::collections::HashSet;

use serde::Serialize;

use crate::AgentId;

/// Named stage of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[display("init")]
    Init,
    /// Frame-by-frame play; not barriered.
    #[display("step")]
    Step,
    #[display("persist")]
    Persist,
    #[display("crossover")]
    Crossover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum BarrierStatus {
    /// Still waiting; `reported` distinct agents have checked in.
    Pending { reported: usize },
    /// Every agent has reported. The barrier is empty again.
    Released,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum BarrierError {
    #[display("{phase} barrier got a report from {id}, outside a population of {expected}")]
    UnknownAgent {
        phase: Phase,
        id: AgentId,
        expected: usize,
    },
}

/// Waits for every agent in the population to finish a phase.
///
/// Reports are idempotent per agent: a second report from the same agent
/// does not bring the barrier closer to release.
///
/// # Example
///
/// ```
/// use swarmtris_evolution::{AgentId, BarrierStatus, Phase, PhaseBarrier};
///
/// let mut barrier = PhaseBarrier::new(Phase::Persist, 2);
/// assert!(barrier.report(AgentId::new(0)).unwrap().is_pending());
/// assert!(barrier.report(AgentId::new(0)).unwrap().is_pending());
/// assert_eq!(barrier.report(AgentId::new(1)).unwrap(), BarrierStatus::Released);
/// ```
#[derive(Debug, Clone)]
pub struct PhaseBarrier {
    phase: Phase,
    expected: usize,
    reported: HashSet<AgentId>,
}

impl PhaseBarrier {
    #[must_use]
    pub fn new(phase: Phase, expected: usize) -> Self {
        Self {
            phase,
            expected,
            reported: HashSet::with_capacity(expected),
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }

    /// Number of distinct agents that have reported since the last release.
    #[must_use]
    pub fn reported(&self) -> usize {
        self.reported.len()
    }

    /// Arms the barrier for another phase, forgetting pending reports.
    pub fn reset(&mut self, phase: Phase) {
        self.phase = phase;
        self.reported.clear();
    }

    /// Records that `id` finished the current phase.
    pub fn report(&mut self, id: AgentId) -> Result<BarrierStatus, BarrierError> {
        if id.index() >= self.expected {
            return Err(BarrierError::UnknownAgent {
                phase: self.phase,
                id,
                expected: self.expected,
            });
        }
        self.reported.insert(id);
        if self.reported.len() == self.expected {
            self.reported.clear();
            return Ok(BarrierStatus::Released);
        }
        Ok(BarrierStatus::Pending {
            reported: self.reported.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_once_after_all_report() {
        let mut barrier = PhaseBarrier::new(Phase::Init, 3);
        let statuses: Vec<_> = [2, 0, 1]
            .into_iter()
            .map(|i| barrier.report(AgentId::new(i)).unwrap())
            .collect();
        assert_eq!(
            statuses,
            vec![
                BarrierStatus::Pending { reported: 1 },
                BarrierStatus::Pending { reported: 2 },
                BarrierStatus::Released,
            ]
        );
        assert_eq!(barrier.reported(), 0);
    }

    #[test]
    fn test_duplicates_do_not_release_early() {
        let mut barrier = PhaseBarrier::new(Phase::Crossover, 3);
        for _ in 0..5 {
            assert!(barrier.report(AgentId::new(0)).unwrap().is_pending());
            assert!(barrier.report(AgentId::new(1)).unwrap().is_pending());
        }
        assert_eq!(barrier.reported(), 2);
        assert!(barrier.report(AgentId::new(2)).unwrap().is_released());
    }

    #[test]
    fn test_unknown_agent_is_rejected() {
        let mut barrier = PhaseBarrier::new(Phase::Persist, 2);
        let err = barrier.report(AgentId::new(2)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "persist barrier got a report from agent-2, outside a population of 2"
        );
        assert_eq!(barrier.reported(), 0);
    }

    #[test]
    fn test_reusable_after_reset() {
        let mut barrier = PhaseBarrier::new(Phase::Persist, 2);
        barrier.report(AgentId::new(0)).unwrap();
        barrier.reset(Phase::Crossover);
        assert_eq!(barrier.phase(), Phase::Crossover);
        assert_eq!(barrier.reported(), 0);
        barrier.report(AgentId::new(0)).unwrap();
        assert!(barrier.report(AgentId::new(1)).unwrap().is_released());
    }
}

use serde::{Deserialize, Serialize};
use swarmtris_engine::{GameEngine, Grid, Move};

use crate::Policy;

/// Index of an agent in the population.
///
/// Identifiers are dense: a population of `n` agents uses `0..n`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("agent-{_0}")]
#[serde(transparent)]
pub struct AgentId(usize);

impl AgentId {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One player: a game, the policy driving it, and the fitness it has earned.
#[derive(Debug, Clone)]
pub struct Agent<P> {
    id: AgentId,
    engine: GameEngine,
    policy: P,
    fitness: f32,
}

impl<P> Agent<P>
where
    P: Policy,
{
    #[must_use]
    pub fn new(id: AgentId, engine: GameEngine, policy: P) -> Self {
        Self {
            id,
            engine,
            policy,
            fitness: 0.0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    #[must_use]
    pub const fn engine(&self) -> &GameEngine {
        &self.engine
    }

    #[must_use]
    pub const fn policy(&self) -> &P {
        &self.policy
    }

    #[must_use]
    pub const fn fitness(&self) -> f32 {
        self.fitness
    }

    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.engine.is_game_over()
    }

    /// Starts a new game with `policy`, dropping the old game and fitness.
    pub fn restart(&mut self, engine: GameEngine, policy: P) {
        self.engine = engine;
        self.policy = policy;
        self.fitness = 0.0;
    }

    /// Lets the policy pick a move, applies it, and optionally advances gravity.
    ///
    /// Fitness grows by 1 for any move other than `Noop`, by 1 for each tick
    /// survived, and by every point scored. Returns `false` without doing
    /// anything once the game is over.
    pub fn think_then_move(&mut self, do_tick: bool) -> bool {
        if self.engine.is_game_over() {
            return false;
        }

        let observation = self.engine.observation();
        let mv = self.policy.decide(&observation);
        self.engine.apply_move(mv);
        if mv != Move::Noop {
            self.fitness += 1.0;
        }
        self.fitness += score_as_fitness(self.engine.score_delta());

        if do_tick {
            self.fitness += 1.0;
            self.engine.tick();
            self.fitness += score_as_fitness(self.engine.score_delta());
        }
        true
    }

    /// Transport record of the current state.
    #[must_use]
    pub fn state(&self) -> AgentState {
        let size = self.engine.size();
        AgentState {
            id: self.id,
            width: size.width(),
            height: size.height(),
            grid: self.engine.grid().clone(),
            score: self.engine.score(),
            is_game_over: self.engine.is_game_over(),
            fitness: self.fitness,
        }
    }
}

#[expect(clippy::cast_precision_loss)]
fn score_as_fitness(score: usize) -> f32 {
    score as f32
}

/// Per-agent record published to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub id: AgentId,
    pub width: usize,
    pub height: usize,
    pub grid: Grid,
    pub score: usize,
    pub is_game_over: bool,
    pub fitness: f32,
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use swarmtris_engine::{BoardSize, PieceSeed};

    use super::*;

    /// Always plays the same move.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Fixed(Move);

    impl Policy for Fixed {
        fn decide(&self, _observation: &[f32]) -> Move {
            self.0
        }

        fn crossover<R>(&self, _other: &Self, _rng: &mut R) -> Self
        where
            R: Rng + ?Sized,
        {
            self.clone()
        }

        fn mutate<R>(&mut self, _rate: f32, _rng: &mut R)
        where
            R: Rng + ?Sized,
        {
        }
    }

    fn agent(mv: Move) -> Agent<Fixed> {
        let size = BoardSize::new(10, 10).unwrap();
        let engine = GameEngine::with_seed(size, PieceSeed::from_bytes([1; 16]));
        Agent::new(AgentId::new(2), engine, Fixed(mv))
    }

    #[test]
    fn test_agent_id_display() {
        assert_eq!(AgentId::new(5).to_string(), "agent-5");
        assert_eq!(serde_json::to_string(&AgentId::new(5)).unwrap(), "5");
    }

    #[test]
    fn test_noop_earns_only_longevity() {
        let mut agent = agent(Move::Noop);
        assert!(agent.think_then_move(false));
        assert_eq!(agent.fitness(), 0.0);
        assert!(agent.think_then_move(true));
        assert_eq!(agent.fitness(), 1.0);
    }

    #[test]
    fn test_movement_is_rewarded() {
        let mut agent = agent(Move::Down);
        agent.think_then_move(false);
        agent.think_then_move(true);
        assert_eq!(agent.fitness(), 3.0);
    }

    #[test]
    fn test_game_over_stops_acting() {
        let mut agent = agent(Move::Up);
        let mut steps = 0;
        while agent.think_then_move(true) {
            steps += 1;
            assert!(steps < 1000);
        }
        let fitness = agent.fitness();
        assert!(agent.is_game_over());
        assert!(!agent.think_then_move(true));
        assert_eq!(agent.fitness(), fitness);
    }

    #[test]
    fn test_state_record() {
        let agent = agent(Move::Noop);
        let state = agent.state();
        assert_eq!(state.id, AgentId::new(2));
        assert_eq!((state.width, state.height), (10, 10));
        assert!(!state.is_game_over);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["id"], 2);
        assert_eq!(json["isGameOver"], false);
        assert_eq!(json["grid"].as_array().unwrap().len(), 10);
    }
}

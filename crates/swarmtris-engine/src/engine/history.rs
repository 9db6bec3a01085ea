use std::collections::VecDeque;

use super::game_engine::Move;

/// Recent moves issued to an engine, used to detect stalling.
///
/// Only the most recent [`Self::WINDOW`] moves are ever inspected, so older
/// moves are discarded.
#[derive(Debug, Clone, Default)]
pub struct MoveHistory {
    moves: VecDeque<Move>,
    total: usize,
}

impl MoveHistory {
    /// Number of recent moves retained.
    pub const WINDOW: usize = 30;
    /// Identical trailing moves that count as a stall.
    pub const SINGLE_REPETITION: usize = 20;
    /// Trailing moves checked for a two-move oscillation.
    pub const DOUBLE_REPETITION: usize = 30;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mv: Move) {
        if self.moves.len() == Self::WINDOW {
            self.moves.pop_front();
        }
        self.moves.push_back(mv);
        self.total += 1;
    }

    /// Total number of moves ever recorded.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn last(&self) -> Option<Move> {
        self.moves.back().copied()
    }

    /// The last 20 moves are all the same.
    #[must_use]
    pub fn has_single_repetition(&self) -> bool {
        let Some(recent) = self.recent(Self::SINGLE_REPETITION) else {
            return false;
        };
        is_uniform(recent.iter().copied())
    }

    /// The last 30 moves alternate between two fixed moves, e.g. a left/right loop.
    #[must_use]
    pub fn has_double_repetition(&self) -> bool {
        let Some(recent) = self.recent(Self::DOUBLE_REPETITION) else {
            return false;
        };
        let even = recent.iter().copied().step_by(2);
        let odd = recent.iter().copied().skip(1).step_by(2);
        is_uniform(even) && is_uniform(odd)
    }

    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.has_single_repetition() || self.has_double_repetition()
    }

    /// The trailing `n` moves, unless fewer were made or the latest move
    /// progresses the game.
    fn recent(&self, n: usize) -> Option<Vec<Move>> {
        if self.moves.len() < n || self.last()?.progresses_game() {
            return None;
        }
        Some(self.moves.iter().skip(self.moves.len() - n).copied().collect())
    }
}

fn is_uniform<I>(mut moves: I) -> bool
where
    I: Iterator<Item = Move>,
{
    match moves.next() {
        Some(first) => moves.all(|mv| mv == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_of(moves: impl IntoIterator<Item = Move>) -> MoveHistory {
        let mut history = MoveHistory::new();
        for mv in moves {
            history.push(mv);
        }
        history
    }

    #[test]
    fn test_nineteen_repeats_are_not_a_stall() {
        let history = history_of([Move::Left; 19]);
        assert!(!history.is_stalled());
        let history = history_of([Move::Left; 20]);
        assert!(history.has_single_repetition());
    }

    #[test]
    fn test_progressing_moves_are_exempt() {
        assert!(!history_of([Move::Down; 40]).is_stalled());
        assert!(!history_of([Move::Up; 40]).is_stalled());
    }

    #[test]
    fn test_only_latest_move_decides_exemption() {
        let mut moves = vec![Move::Down];
        moves.extend([Move::Noop; 20]);
        assert!(history_of(moves).has_single_repetition());

        let mut moves = vec![Move::Noop; 25];
        moves.push(Move::Down);
        assert!(!history_of(moves).is_stalled());
    }

    #[test]
    fn test_oscillation_detected() {
        let moves = (0..30).map(|i| if i % 2 == 0 { Move::Left } else { Move::Right });
        let history = history_of(moves);
        assert!(!history.has_single_repetition());
        assert!(history.has_double_repetition());
    }

    #[test]
    fn test_oscillation_needs_thirty_moves() {
        let moves = (0..29).map(|i| if i % 2 == 0 { Move::RotateCw } else { Move::RotateCcw });
        assert!(!history_of(moves).is_stalled());
    }

    #[test]
    fn test_broken_pattern_is_not_a_stall() {
        let mut moves: Vec<_> = (0..30)
            .map(|i| if i % 2 == 0 { Move::Left } else { Move::Right })
            .collect();
        moves[20] = Move::Noop;
        assert!(!history_of(moves).is_stalled());
    }

    #[test]
    fn test_window_is_bounded() {
        let history = history_of([Move::Left; 100]);
        assert_eq!(history.total(), 100);
        assert_eq!(history.moves.len(), MoveHistory::WINDOW);
    }
}

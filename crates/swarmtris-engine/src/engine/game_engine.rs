use serde::{Deserialize, Serialize};

use crate::{BoardSize, Cell, Grid, Piece, Rotation, RotationDirection};

use super::{
    bag::{Bag, PieceSeed},
    game_stats::GameStats,
    history::MoveHistory,
    wall_kick::{self, WallKickCache},
};

/// A single decision a player can make between frames.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Move {
    /// Hard drop: fall as far as possible and lock immediately.
    #[display("up")]
    Up,
    /// Soft drop by one row.
    #[display("down")]
    Down,
    #[display("left")]
    Left,
    #[display("right")]
    Right,
    #[display("rotate_cw")]
    RotateCw,
    #[display("rotate_ccw")]
    RotateCcw,
    #[display("noop")]
    Noop,
}

impl Move {
    pub const LEN: usize = 7;

    /// All moves, in the order policy outputs are indexed.
    pub const ALL: [Self; Self::LEN] = [
        Self::Up,
        Self::Down,
        Self::Left,
        Self::Right,
        Self::RotateCw,
        Self::RotateCcw,
        Self::Noop,
    ];

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Moves that bring the piece closer to locking.
    ///
    /// A progressing move as the latest move exempts the history from stall
    /// detection.
    #[must_use]
    pub const fn progresses_game(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Active,
    GameOver,
}

/// Read-only view of an engine for rendering and transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub score: usize,
    pub is_game_over: bool,
    pub grid: Grid,
}

/// One deterministic game of Tetris.
///
/// The engine keeps the settled cells and the falling piece apart; [`Self::grid`]
/// returns the two combined. Every operation is total: rejected moves leave the
/// state unchanged, and once the game is over `tick` and `apply_move` do nothing.
///
/// # Example
///
/// ```
/// use swarmtris_engine::{BoardSize, GameEngine, Move};
///
/// let size = BoardSize::new(10, 20).unwrap();
/// let mut engine = GameEngine::new(size);
/// engine.apply_move(Move::Left);
/// engine.tick();
/// assert_eq!(engine.tick_count(), 1);
/// assert!(!engine.is_game_over());
/// ```
#[derive(Debug, Clone)]
pub struct GameEngine {
    locked: Grid,
    rendered: Grid,
    current: Option<Piece>,
    next: Piece,
    bag: Bag,
    history: MoveHistory,
    kick_cache: WallKickCache,
    stats: GameStats,
    score_delta: usize,
    ticks: usize,
    state: EngineState,
}

impl GameEngine {
    /// Creates an engine with a randomly seeded bag.
    #[must_use]
    pub fn new(size: BoardSize) -> Self {
        Self::with_bag(size, Bag::new())
    }

    /// Creates an engine whose piece sequence is fully determined by `seed`.
    #[must_use]
    pub fn with_seed(size: BoardSize, seed: PieceSeed) -> Self {
        Self::with_bag(size, Bag::with_seed(seed))
    }

    pub(crate) fn with_bag(size: BoardSize, mut bag: Bag) -> Self {
        let current = Piece::spawn(bag.draw(), size);
        let next = Piece::spawn(bag.draw(), size);
        let mut engine = Self {
            locked: Grid::new(size),
            rendered: Grid::new(size),
            current: Some(current),
            next,
            bag,
            history: MoveHistory::new(),
            kick_cache: WallKickCache::new(),
            stats: GameStats::new(),
            score_delta: 0,
            ticks: 0,
            state: EngineState::Active,
        };
        if !engine.fits(&current) {
            engine.state = EngineState::GameOver;
        }
        engine.refresh_rendered();
        engine
    }

    #[must_use]
    pub const fn size(&self) -> BoardSize {
        self.locked.size()
    }

    /// The board with the falling piece overlaid as [`Cell::Active`].
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.rendered
    }

    /// Settled cells only.
    #[must_use]
    pub const fn locked_grid(&self) -> &Grid {
        &self.locked
    }

    #[must_use]
    pub const fn current_piece(&self) -> Option<&Piece> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn next_piece(&self) -> &Piece {
        &self.next
    }

    #[must_use]
    pub const fn score(&self) -> usize {
        self.stats.score()
    }

    /// Score awarded by the most recent [`Self::tick`] or [`Self::apply_move`].
    #[must_use]
    pub const fn score_delta(&self) -> usize {
        self.score_delta
    }

    #[must_use]
    pub const fn tick_count(&self) -> usize {
        self.ticks
    }

    #[must_use]
    pub const fn lines_cleared(&self) -> usize {
        self.stats.lines_cleared()
    }

    #[must_use]
    pub const fn pieces_locked(&self) -> usize {
        self.stats.pieces_locked()
    }

    #[must_use]
    pub const fn stats(&self) -> &GameStats {
        &self.stats
    }

    #[must_use]
    pub const fn history(&self) -> &MoveHistory {
        &self.history
    }

    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.state.is_game_over()
    }

    /// Policy input for the current board, see [`Grid::observation`].
    #[must_use]
    pub fn observation(&self) -> Vec<f32> {
        self.rendered.observation()
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            score: self.score(),
            is_game_over: self.is_game_over(),
            grid: self.rendered.clone(),
        }
    }

    /// Returns whether the current piece could occupy `(x, y)` with `rotation`.
    ///
    /// Cells must stay within the side walls and above the floor. Cells above
    /// the board are always accepted; cells on the board must not overlap a
    /// locked cell.
    #[must_use]
    pub fn is_valid_move(&self, x: i32, y: i32, rotation: Rotation) -> bool {
        self.current
            .is_some_and(|piece| self.fits(&piece.placed(x, y, rotation)))
    }

    /// Advances the game by one gravity step.
    ///
    /// The falling piece moves down one row; if it cannot, it locks and the
    /// next piece spawns.
    pub fn tick(&mut self) {
        if self.is_game_over() {
            return;
        }
        let Some(piece) = self.current else {
            return;
        };
        self.score_delta = 0;
        self.ticks += 1;

        let lowered = piece.shifted(0, 1);
        if self.fits(&lowered) {
            self.current = Some(lowered);
        } else {
            self.lock_and_spawn();
        }
        self.refresh_rendered();
    }

    /// Applies a player move to the falling piece.
    ///
    /// The move is recorded first; a stalling move history ends the game
    /// without acting on the move.
    pub fn apply_move(&mut self, mv: Move) {
        if self.is_game_over() {
            return;
        }
        let Some(piece) = self.current else {
            return;
        };
        self.score_delta = 0;

        self.history.push(mv);
        if self.history.is_stalled() {
            self.state = EngineState::GameOver;
            self.refresh_rendered();
            return;
        }

        match mv {
            Move::Up => {
                let mut dropped = piece;
                while self.fits(&dropped.shifted(0, 1)) {
                    dropped = dropped.shifted(0, 1);
                }
                self.current = Some(dropped);
                self.lock_and_spawn();
            }
            Move::Down => self.try_shift(piece, 0, 1),
            Move::Left => self.try_shift(piece, -1, 0),
            Move::Right => self.try_shift(piece, 1, 0),
            Move::RotateCw => self.try_rotate(piece, RotationDirection::Clockwise),
            Move::RotateCcw => self.try_rotate(piece, RotationDirection::CounterClockwise),
            Move::Noop => {}
        }
        self.refresh_rendered();
    }

    fn fits(&self, piece: &Piece) -> bool {
        let size = self.size();
        let width = i32::try_from(size.width()).unwrap_or(i32::MAX);
        let height = i32::try_from(size.height()).unwrap_or(i32::MAX);
        piece.cells().all(|(x, y)| {
            if x < 0 || x >= width || y >= height {
                return false;
            }
            y < 0 || !self.locked.cell_at(x, y).is_some_and(|cell| cell.is_locked())
        })
    }

    fn try_shift(&mut self, piece: Piece, dx: i32, dy: i32) {
        let shifted = piece.shifted(dx, dy);
        if self.fits(&shifted) {
            self.current = Some(shifted);
        }
    }

    fn try_rotate(&mut self, piece: Piece, direction: RotationDirection) {
        let mut cache = std::mem::take(&mut self.kick_cache);
        let rotated = wall_kick::resolve_rotation(piece, direction, &mut cache, |candidate| {
            self.fits(candidate)
        });
        self.kick_cache = cache;
        if let Some(rotated) = rotated {
            self.current = Some(rotated);
        }
    }

    fn lock_and_spawn(&mut self) {
        let Some(piece) = self.current.take() else {
            return;
        };
        self.locked.lock_piece(&piece);
        let cleared = self.locked.clear_full_lines();
        self.score_delta += self.stats.record_lock(cleared);

        let next = Piece::spawn(self.bag.draw(), self.size());
        let current = std::mem::replace(&mut self.next, next);
        self.kick_cache.clear();
        self.current = Some(current);
        if !self.fits(&current) {
            self.state = EngineState::GameOver;
        }
    }

    fn refresh_rendered(&mut self) {
        self.rendered.clone_from(&self.locked);
        if let Some(piece) = &self.current {
            self.rendered.fill_piece_as(piece, Cell::Active);
        }
    }
}

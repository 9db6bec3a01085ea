//! Game engine logic and state management.
//!
//! This module builds the playable game on top of the passive data in
//! [`crate::core`]:
//!
//! - [`GameEngine`] - One game: locked grid, falling and queued pieces, score
//! - [`Bag`] - 7-bag piece randomizer
//! - [`PieceSeed`] - Seed for deterministic piece generation
//! - [`MoveHistory`] - Recent moves and stall detection
//! - [`WallKickCache`] and [`resolve_rotation`] - SRS rotation with wall kicks
//! - [`GameStats`] - Score and line-clear counters
//!
//! # Game Flow
//!
//! 1. Create a [`GameEngine`]; the first piece spawns centered at the top
//! 2. Between ticks the player issues any number of [`Move`]s
//! 3. Each [`GameEngine::tick`] moves the piece down one row, or locks it
//! 4. Full rows are cleared, the queued piece spawns and a new one is drawn
//! 5. The game ends when a piece cannot spawn or the player stalls
//!
//! # Example
//!
//! ```
//! use swarmtris_engine::{BoardSize, GameEngine, Move};
//!
//! let mut engine = GameEngine::new(BoardSize::new(10, 10).unwrap());
//! while !engine.is_game_over() {
//!     engine.apply_move(Move::Up);
//! }
//! assert!(engine.pieces_locked() > 0);
//! ```

pub use self::{bag::*, game_engine::*, game_stats::*, history::*, wall_kick::*};

mod bag;
mod game_engine;
mod game_stats;
mod history;
mod wall_kick;

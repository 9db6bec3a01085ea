//! Passive board data: cells, board dimensions, piece types and their
//! rotation masks.

pub use self::{grid::*, piece::*};

pub(crate) mod grid;
pub(crate) mod piece;

pub use self::{core::*, engine::*};

pub mod core;
pub mod engine;

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display(
    "invalid board size {width}x{height}: width must be {}..={max} and height 1..={max}",
    BoardSize::MIN_WIDTH,
    max = BoardSize::MAX_DIMENSION
)]
pub struct BoardSizeError {
    pub width: usize,
    pub height: usize,
}

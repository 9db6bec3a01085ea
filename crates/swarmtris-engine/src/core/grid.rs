use serde::{Serialize, Serializer};

use crate::BoardSizeError;

use super::piece::{Piece, PieceKind};

/// A single cell of the board.
///
/// The engine keeps locked cells and the falling piece apart internally; the
/// rendered grid handed to consumers overlays the falling piece as `Active`.
///
/// Serialized in the display encoding consumers expect: `0` for empty, `1`
/// for the falling piece, and the piece character (`"T"`, `"I"`, ...) for
/// locked cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::IsVariant)]
pub enum Cell {
    #[default]
    Empty,
    /// Part of the falling piece's current footprint.
    Active,
    /// Settled remains of a piece of the given type.
    Locked(PieceKind),
}

impl Cell {
    /// Value of this cell in a policy observation vector.
    #[must_use]
    pub const fn observation_value(self) -> f32 {
        match self {
            Cell::Empty => 0.0,
            Cell::Active => 1.0,
            Cell::Locked(_) => 0.5,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Cell::Empty => serializer.serialize_u8(0),
            Cell::Active => serializer.serialize_u8(1),
            Cell::Locked(kind) => kind.serialize(serializer),
        }
    }
}

/// Validated board dimensions.
///
/// The board must be wide enough for every piece, including a horizontal `I`,
/// to spawn centered inside the walls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoardSize {
    width: usize,
    height: usize,
}

impl BoardSize {
    pub const MIN_WIDTH: usize = 5;
    pub const MAX_DIMENSION: usize = 1024;

    pub fn new(width: usize, height: usize) -> Result<Self, BoardSizeError> {
        let valid_width = (Self::MIN_WIDTH..=Self::MAX_DIMENSION).contains(&width);
        let valid_height = (1..=Self::MAX_DIMENSION).contains(&height);
        if !valid_width || !valid_height {
            return Err(BoardSizeError { width, height });
        }
        Ok(Self { width, height })
    }

    #[must_use]
    pub const fn width(self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(self) -> usize {
        self.height
    }

    #[must_use]
    pub const fn cell_count(self) -> usize {
        self.width * self.height
    }

    /// Converts signed coordinates to an in-bounds `(column, row)` pair.
    #[must_use]
    pub fn checked_position(self, x: i32, y: i32) -> Option<(usize, usize)> {
        let x = usize::try_from(x).ok().filter(|x| *x < self.width)?;
        let y = usize::try_from(y).ok().filter(|y| *y < self.height)?;
        Some((x, y))
    }
}

/// Row-major cell storage for one board.
///
/// Row 0 is the top of the board; rows grow downward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: BoardSize,
    cells: Vec<Cell>,
}

impl Serialize for Grid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.rows())
    }
}

impl Grid {
    #[must_use]
    pub fn new(size: BoardSize) -> Self {
        Self {
            size,
            cells: vec![Cell::Empty; size.cell_count()],
        }
    }

    #[must_use]
    pub const fn size(&self) -> BoardSize {
        self.size
    }

    /// Returns the cell at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the board.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Cell {
        assert!(x < self.size.width && y < self.size.height);
        self.cells[y * self.size.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        assert!(x < self.size.width && y < self.size.height);
        self.cells[y * self.size.width + x] = cell;
    }

    /// Returns the cell at signed coordinates, or `None` outside the board.
    #[must_use]
    pub fn cell_at(&self, x: i32, y: i32) -> Option<Cell> {
        let (x, y) = self.size.checked_position(x, y)?;
        Some(self.get(x, y))
    }

    /// Iterates rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.size.width)
    }

    /// Iterates all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }

    #[must_use]
    pub fn is_row_full(&self, y: usize) -> bool {
        let width = self.size.width;
        self.cells[y * width..][..width]
            .iter()
            .all(|cell| cell.is_locked())
    }

    /// Writes every on-board cell of the piece as `cell`.
    ///
    /// Cells above the board (`y < 0`) are dropped.
    pub fn fill_piece_as(&mut self, piece: &Piece, cell: Cell) {
        for (x, y) in piece.cells() {
            if let Some((x, y)) = self.size.checked_position(x, y) {
                self.set(x, y, cell);
            }
        }
    }

    /// Locks the piece into the grid.
    pub fn lock_piece(&mut self, piece: &Piece) {
        self.fill_piece_as(piece, Cell::Locked(piece.kind()));
    }

    /// Removes full rows and returns how many were removed.
    ///
    /// Rows are scanned bottom to top; the rows above each removed row shift
    /// down and empty rows are inserted at the top.
    pub fn clear_full_lines(&mut self) -> usize {
        let width = self.size.width;
        let mut count = 0;
        for y in (0..self.size.height).rev() {
            if self.is_row_full(y) {
                count += 1;
                continue;
            }
            if count > 0 {
                self.cells
                    .copy_within(y * width..(y + 1) * width, (y + count) * width);
            }
        }
        self.cells[..count * width].fill(Cell::Empty);
        count
    }

    /// Encodes the grid as a policy observation, row-major.
    #[must_use]
    pub fn observation(&self) -> Vec<f32> {
        self.cells.iter().map(|cell| cell.observation_value()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rotation;

    fn fill_row(grid: &mut Grid, y: usize) {
        for x in 0..grid.size().width() {
            grid.set(x, y, Cell::Locked(PieceKind::I));
        }
    }

    #[test]
    fn test_board_size_validation() {
        assert!(BoardSize::new(10, 20).is_ok());
        assert!(BoardSize::new(5, 1).is_ok());
        assert!(BoardSize::new(4, 20).is_err());
        assert!(BoardSize::new(10, 0).is_err());
        assert!(BoardSize::new(BoardSize::MAX_DIMENSION + 1, 4).is_err());
    }

    #[test]
    fn test_checked_position() {
        let size = BoardSize::new(10, 4).unwrap();
        assert_eq!(size.checked_position(0, 0), Some((0, 0)));
        assert_eq!(size.checked_position(9, 3), Some((9, 3)));
        assert_eq!(size.checked_position(-1, 0), None);
        assert_eq!(size.checked_position(10, 0), None);
        assert_eq!(size.checked_position(0, -1), None);
        assert_eq!(size.checked_position(0, 4), None);
    }

    #[test]
    fn test_clear_lines_none() {
        let mut grid = Grid::new(BoardSize::new(5, 4).unwrap());
        grid.set(0, 3, Cell::Locked(PieceKind::T));
        let before = grid.clone();
        assert_eq!(grid.clear_full_lines(), 0);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_clear_lines_shifts_rows_down() {
        let mut grid = Grid::new(BoardSize::new(5, 4).unwrap());
        grid.set(2, 1, Cell::Locked(PieceKind::S));
        fill_row(&mut grid, 2);
        grid.set(0, 3, Cell::Locked(PieceKind::Z));
        fill_row(&mut grid, 0);

        assert_eq!(grid.clear_full_lines(), 2);

        // the S cell moves from row 1 to row 2, the Z cell stays put
        assert_eq!(grid.get(2, 2), Cell::Locked(PieceKind::S));
        assert_eq!(grid.get(0, 3), Cell::Locked(PieceKind::Z));
        for y in 0..2 {
            assert!(grid.rows().nth(y).unwrap().iter().all(|c| c.is_empty()));
        }
    }

    #[test]
    fn test_clear_lines_all_filled() {
        let mut grid = Grid::new(BoardSize::new(5, 3).unwrap());
        for y in 0..3 {
            fill_row(&mut grid, y);
        }
        assert_eq!(grid.clear_full_lines(), 3);
        assert!(grid.cells().all(|c| c.is_empty()));
    }

    #[test]
    fn test_active_cells_do_not_complete_rows() {
        let mut grid = Grid::new(BoardSize::new(5, 2).unwrap());
        fill_row(&mut grid, 1);
        grid.set(3, 1, Cell::Active);
        assert!(!grid.is_row_full(1));
    }

    #[test]
    fn test_lock_piece_drops_cells_above_board() {
        let mut grid = Grid::new(BoardSize::new(10, 4).unwrap());
        // vertical I with its top two cells above the board
        let piece = Piece::new(PieceKind::I, Rotation::new(1).unwrap(), 0, -2);
        grid.lock_piece(&piece);
        let locked = grid.cells().filter(|c| c.is_locked()).count();
        assert_eq!(locked, 2);
        assert_eq!(grid.get(2, 0), Cell::Locked(PieceKind::I));
        assert_eq!(grid.get(2, 1), Cell::Locked(PieceKind::I));
    }

    #[test]
    fn test_observation_encoding() {
        let mut grid = Grid::new(BoardSize::new(5, 1).unwrap());
        grid.set(1, 0, Cell::Active);
        grid.set(2, 0, Cell::Locked(PieceKind::O));
        assert_eq!(grid.observation(), vec![0.0, 1.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_grid_serialization() {
        let mut grid = Grid::new(BoardSize::new(5, 2).unwrap());
        grid.set(0, 0, Cell::Active);
        grid.set(3, 1, Cell::Locked(PieceKind::J));
        let json = serde_json::to_string(&grid).unwrap();
        assert_eq!(json, r#"[[1,0,0,0,0],[0,0,0,"J",0]]"#);
    }
}

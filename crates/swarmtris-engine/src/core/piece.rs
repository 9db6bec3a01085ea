use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::grid::BoardSize;

/// A live tetromino: its type, rotation state, and anchor on the board.
///
/// The anchor is the top-left corner of the piece's bounding box. Both
/// coordinates are signed: a freshly spawned piece sits partly above the
/// board (`y < 0`), and a vertical `I` hugging the left wall has its anchor
/// left of column 0 because its filled column is not the first one in the box.
///
/// Pieces are plain values; the engine validates a candidate before adopting it.
///
/// # Example
///
/// ```
/// use swarmtris_engine::{BoardSize, Piece, PieceKind};
///
/// let size = BoardSize::new(10, 20).unwrap();
/// let piece = Piece::spawn(PieceKind::I, size);
/// assert_eq!((piece.x(), piece.y()), (4, -1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Piece {
    kind: PieceKind,
    rotation: Rotation,
    x: i32,
    y: i32,
}

impl Piece {
    #[must_use]
    pub const fn new(kind: PieceKind, rotation: Rotation, x: i32, y: i32) -> Self {
        Self {
            kind,
            rotation,
            x,
            y,
        }
    }

    /// Places a piece of the given kind in its spawn orientation, centered.
    ///
    /// The horizontal anchor is the board center minus the midpoint of the
    /// filled columns; the vertical anchor is the negated index of the topmost
    /// filled row, so the piece's first filled row lands on row 0.
    #[must_use]
    pub fn spawn(kind: PieceKind, size: BoardSize) -> Self {
        let rotation = Rotation::SPAWN;
        let (mut left, mut right, mut top) = (i32::MAX, i32::MIN, i32::MAX);
        for (dx, dy) in kind.filled_cells(rotation) {
            left = left.min(dx);
            right = right.max(dx);
            top = top.min(dy);
        }
        let center = (left + right) / 2;
        let half_width = i32::try_from(size.width() / 2).unwrap_or(i32::MAX);
        Self {
            kind,
            rotation,
            x: half_width - center,
            y: -top,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> PieceKind {
        self.kind
    }

    #[must_use]
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the same piece shifted by `(dx, dy)`.
    #[must_use]
    pub const fn shifted(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Returns the same piece at `(x, y)` with `rotation`.
    #[must_use]
    pub const fn placed(self, x: i32, y: i32, rotation: Rotation) -> Self {
        Self {
            x,
            y,
            rotation,
            ..self
        }
    }

    /// Absolute `(column, row)` of every filled cell.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.kind
            .filled_cells(self.rotation)
            .map(move |(dx, dy)| (self.x + dx, self.y + dy))
    }
}

/// Rotation state of a piece.
///
/// - `0`: spawn orientation (SRS label `0`)
/// - `1`: one clockwise turn (SRS label `R`)
/// - `2`: half turn (SRS label `2`)
/// - `3`: one counter-clockwise turn (SRS label `L`)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Rotation(u8);

impl Rotation {
    pub const SPAWN: Self = Self(0);

    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if index < 4 { Some(Self(index)) } else { None }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Computes `(current + direction + 4) mod 4`.
    #[must_use]
    pub const fn rotated(self, direction: RotationDirection) -> Self {
        let step: u8 = match direction {
            RotationDirection::Clockwise => 1,
            RotationDirection::CounterClockwise => 3,
        };
        Self((self.0 + step) % 4)
    }

    /// SRS label of this rotation state.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.0 {
            0 => "0",
            1 => "R",
            2 => "2",
            _ => "L",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::IsVariant)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}

/// The seven tetromino types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PieceKind {
    I = 0,
    J = 1,
    L = 2,
    O = 3,
    S = 4,
    T = 5,
    Z = 6,
}

impl PieceKind {
    /// Number of piece types (7).
    pub const LEN: usize = 7;

    pub const ALL: [Self; Self::LEN] = [
        Self::I,
        Self::J,
        Self::L,
        Self::O,
        Self::S,
        Self::T,
        Self::Z,
    ];

    /// Offsets `(dx, dy)` of the filled cells within the bounding box.
    pub fn filled_cells(self, rotation: Rotation) -> impl Iterator<Item = (i32, i32)> {
        let mask = &PIECE_MASKS[self as usize][rotation.index()];
        (0_u8..4).flat_map(move |dy| {
            (0_u8..4).filter_map(move |dx| {
                mask[usize::from(dy)][usize::from(dx)].then_some((i32::from(dx), i32::from(dy)))
            })
        })
    }

    /// Returns the single character representation of this piece kind.
    ///
    /// ```
    /// use swarmtris_engine::PieceKind;
    ///
    /// assert_eq!(PieceKind::Z.as_char(), 'Z');
    /// ```
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::I => 'I',
            Self::J => 'J',
            Self::L => 'L',
            Self::O => 'O',
            Self::S => 'S',
            Self::T => 'T',
            Self::Z => 'Z',
        }
    }

    /// Parses a piece kind from a single character.
    ///
    /// ```
    /// use swarmtris_engine::PieceKind;
    ///
    /// assert_eq!(PieceKind::from_char('T'), Some(PieceKind::T));
    /// assert_eq!(PieceKind::from_char('X'), None);
    /// ```
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(Self::I),
            'J' => Some(Self::J),
            'L' => Some(Self::L),
            'O' => Some(Self::O),
            'S' => Some(Self::S),
            'T' => Some(Self::T),
            'Z' => Some(Self::Z),
            _ => None,
        }
    }
}

impl Serialize for PieceKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_char(self.as_char())
    }
}

impl<'de> Deserialize<'de> for PieceKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid piece kind: {c}"))),
            _ => Err(serde::de::Error::custom(format!(
                "piece kind must be a single character, got '{s}'"
            ))),
        }
    }
}

/// Filled cells of one rotation state inside a 4×4 box, indexed `[row][column]`.
type ShapeMask = [[bool; 4]; 4];

/// Generates all 4 rotation states by rotating 90° clockwise.
///
/// `size` is the side of the square the piece rotates in (4 for I, 2 for O,
/// 3 for the rest).
const fn mask_rotations(size: usize, mask: ShapeMask) -> [ShapeMask; 4] {
    let mut rotations = [mask; 4];
    let mut i = 1;
    while i < 4 {
        let mut rotated = [[false; 4]; 4];
        let mut y = 0;
        while y < size {
            let mut x = 0;
            while x < size {
                rotated[y][x] = rotations[i - 1][size - 1 - x][y];
                x += 1;
            }
            y += 1;
        }
        rotations[i] = rotated;
        i += 1;
    }
    rotations
}

static PIECE_MASKS: [[ShapeMask; 4]; PieceKind::LEN] = {
    const C: bool = true;
    const E: bool = false;
    const EEEE: [bool; 4] = [E; 4];
    [
        // I-piece
        mask_rotations(4, [EEEE, [C, C, C, C], EEEE, EEEE]),
        // J-piece
        mask_rotations(3, [[C, E, E, E], [C, C, C, E], EEEE, EEEE]),
        // L-piece
        mask_rotations(3, [[E, E, C, E], [C, C, C, E], EEEE, EEEE]),
        // O-piece
        mask_rotations(2, [[C, C, E, E], [C, C, E, E], EEEE, EEEE]),
        // S-piece
        mask_rotations(3, [[E, C, C, E], [C, C, E, E], EEEE, EEEE]),
        // T-piece
        mask_rotations(3, [[E, C, E, E], [C, C, C, E], EEEE, EEEE]),
        // Z-piece
        mask_rotations(3, [[C, C, E, E], [E, C, C, E], EEEE, EEEE]),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(kind: PieceKind, rotation: u8) -> Vec<(i32, i32)> {
        kind.filled_cells(Rotation::new(rotation).unwrap()).collect()
    }

    #[test]
    fn test_every_rotation_has_four_cells() {
        for kind in PieceKind::ALL {
            for rotation in 0..4 {
                assert_eq!(cells(kind, rotation).len(), 4, "{kind:?} rotation {rotation}");
            }
        }
    }

    #[test]
    fn test_srs_rotation_states() {
        // I: R state is column 2, 2 state is row 2, L state is column 1
        assert_eq!(cells(PieceKind::I, 1), vec![(2, 0), (2, 1), (2, 2), (2, 3)]);
        assert_eq!(cells(PieceKind::I, 2), vec![(0, 2), (1, 2), (2, 2), (3, 2)]);
        assert_eq!(cells(PieceKind::I, 3), vec![(1, 0), (1, 1), (1, 2), (1, 3)]);

        // S: R state is [[0,1,0],[0,1,1],[0,0,1]]
        assert_eq!(cells(PieceKind::S, 1), vec![(1, 0), (1, 1), (2, 1), (2, 2)]);

        // J: R state is [[0,1,1],[0,1,0],[0,1,0]]
        assert_eq!(cells(PieceKind::J, 1), vec![(1, 0), (2, 0), (1, 1), (1, 2)]);

        // O never changes shape
        for rotation in 1..4 {
            assert_eq!(cells(PieceKind::O, rotation), cells(PieceKind::O, 0));
        }
    }

    #[test]
    fn test_rotation_wraps() {
        let zero = Rotation::SPAWN;
        assert_eq!(zero.rotated(RotationDirection::CounterClockwise).index(), 3);
        assert_eq!(zero.rotated(RotationDirection::Clockwise).label(), "R");
        assert_eq!(
            Rotation::new(3)
                .unwrap()
                .rotated(RotationDirection::Clockwise),
            zero
        );
        assert_eq!(Rotation::new(4), None);
    }

    #[test]
    fn test_spawn_centering() {
        let size = BoardSize::new(10, 20).unwrap();

        let i = Piece::spawn(PieceKind::I, size);
        assert_eq!((i.x(), i.y()), (4, -1));
        assert_eq!(
            i.cells().collect::<Vec<_>>(),
            vec![(4, 0), (5, 0), (6, 0), (7, 0)]
        );

        let t = Piece::spawn(PieceKind::T, size);
        assert_eq!((t.x(), t.y()), (4, 0));

        let o = Piece::spawn(PieceKind::O, size);
        assert_eq!(o.cells().collect::<Vec<_>>(), vec![(5, 0), (6, 0), (5, 1), (6, 1)]);
    }

    #[test]
    fn test_spawned_top_row_is_row_zero() {
        let size = BoardSize::new(7, 5).unwrap();
        for kind in PieceKind::ALL {
            let piece = Piece::spawn(kind, size);
            let top = piece.cells().map(|(_, y)| y).min().unwrap();
            assert_eq!(top, 0, "{kind:?}");
        }
    }

    #[test]
    fn test_piece_kind_serialization() {
        assert_eq!(serde_json::to_string(&PieceKind::L).unwrap(), "\"L\"");
        let kind: PieceKind = serde_json::from_str("\"S\"").unwrap();
        assert_eq!(kind, PieceKind::S);
        assert!(serde_json::from_str::<PieceKind>("\"X\"").is_err());
        assert!(serde_json::from_str::<PieceKind>("\"SZ\"").is_err());
    }

    #[test]
    fn test_piece_kind_char_conversion() {
        for kind in PieceKind::ALL {
            assert_eq!(PieceKind::from_char(kind.as_char()), Some(kind));
        }
        assert_eq!(PieceKind::from_char('x'), None);
    }
}

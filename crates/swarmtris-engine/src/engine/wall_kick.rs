//! Super Rotation System wall kicks.
//!
//! A rotation request is resolved against an ordered list of `(dx, dy)`
//! offsets keyed by the rotation transition (e.g. `0->R`). The first offset
//! at which the rotated piece fits wins. `I` has its own table; `J`, `L`,
//! `S`, `T` and `Z` share one; `O` never rotates.
//!
//! Offsets are added directly to the anchor, with `y` growing downward.
//!
//! Every successful kick is remembered in a [`WallKickCache`] keyed by the
//! piece kind, the anchor it rotated from, the transition and the offset.
//! A remembered kick is never used again for the same piece, which stops a
//! policy from juggling a piece between two kick positions forever.

use std::collections::HashSet;

use arrayvec::ArrayVec;

use crate::{Piece, PieceKind, Rotation, RotationDirection};

/// Translation applied to the anchor when trying a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KickOffset {
    pub dx: i32,
    pub dy: i32,
}

const fn k(dx: i32, dy: i32) -> KickOffset {
    KickOffset { dx, dy }
}

/// Rotation transition between two rotation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KickTransition {
    pub from: Rotation,
    pub to: Rotation,
}

impl KickTransition {
    /// The SRS label, e.g. `"0->R"` or `"L->2"`.
    #[must_use]
    pub fn label(self) -> String {
        format!("{}->{}", self.from.label(), self.to.label())
    }
}

type KickRow = [KickOffset; 5];

/// Indexed by `[from][clockwise? 0 : 1]`.
const JLSTZ_KICKS: [[KickRow; 2]; 4] = [
    [
        // 0->R
        [k(0, 0), k(-1, 0), k(-1, 1), k(0, -2), k(-1, -2)],
        // 0->L
        [k(0, 0), k(1, 0), k(1, 1), k(0, -2), k(1, -2)],
    ],
    [
        // R->2
        [k(0, 0), k(1, 0), k(1, -1), k(0, 2), k(1, 2)],
        // R->0
        [k(0, 0), k(1, 0), k(1, -1), k(0, 2), k(1, 2)],
    ],
    [
        // 2->L
        [k(0, 0), k(1, 0), k(1, 1), k(0, -2), k(1, -2)],
        // 2->R
        [k(0, 0), k(-1, 0), k(-1, 1), k(0, -2), k(-1, -2)],
    ],
    [
        // L->0
        [k(0, 0), k(-1, 0), k(-1, -1), k(0, 2), k(-1, 2)],
        // L->2
        [k(0, 0), k(-1, 0), k(-1, -1), k(0, 2), k(-1, 2)],
    ],
];

const I_KICKS: [[KickRow; 2]; 4] = [
    [
        // 0->R
        [k(0, 0), k(-2, 0), k(1, 0), k(-2, -1), k(1, 2)],
        // 0->L
        [k(0, 0), k(-1, 0), k(2, 0), k(-1, 2), k(2, -1)],
    ],
    [
        // R->2
        [k(0, 0), k(-1, 0), k(2, 0), k(-1, 2), k(2, -1)],
        // R->0
        [k(0, 0), k(2, 0), k(-1, 0), k(2, 1), k(-1, -2)],
    ],
    [
        // 2->L
        [k(0, 0), k(2, 0), k(-1, 0), k(2, 1), k(-1, -2)],
        // 2->R
        [k(0, 0), k(1, 0), k(-2, 0), k(1, -2), k(-2, 1)],
    ],
    [
        // L->0
        [k(0, 0), k(1, 0), k(-2, 0), k(1, -2), k(-2, 1)],
        // L->2
        [k(0, 0), k(-2, 0), k(1, 0), k(-2, -1), k(1, 2)],
    ],
];

/// Ordered kick candidates for rotating `kind` from `from` in `direction`.
///
/// Empty for `O`.
#[must_use]
pub fn kick_candidates(
    kind: PieceKind,
    from: Rotation,
    direction: RotationDirection,
) -> ArrayVec<KickOffset, 5> {
    let column = usize::from(direction.is_counter_clockwise());
    let table = match kind {
        PieceKind::O => return ArrayVec::new(),
        PieceKind::I => &I_KICKS,
        PieceKind::J | PieceKind::L | PieceKind::S | PieceKind::T | PieceKind::Z => &JLSTZ_KICKS,
    };
    ArrayVec::from(table[from.index()][column])
}

/// A kick that has already been used for the current piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WallKickKey {
    pub kind: PieceKind,
    pub x: i32,
    pub y: i32,
    pub transition: KickTransition,
    pub offset: KickOffset,
}

/// Kicks used by the current piece. Cleared whenever a new piece is queued.
#[derive(Debug, Clone, Default)]
pub struct WallKickCache {
    used: HashSet<WallKickKey>,
}

impl WallKickCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &WallKickKey) -> bool {
        self.used.contains(key)
    }

    /// Records a key; returns `false` if it was already present.
    pub fn insert(&mut self, key: WallKickKey) -> bool {
        self.used.insert(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn clear(&mut self) {
        self.used.clear();
    }
}

/// Resolves a rotation request.
///
/// Tries each candidate offset in order, skipping offsets already in `cache`
/// for this anchor and transition. Returns the rotated piece for the first
/// offset where `fits` accepts it, recording that kick in `cache`. Returns
/// `None` when no candidate is usable; the caller leaves the piece unchanged.
pub fn resolve_rotation<F>(
    piece: Piece,
    direction: RotationDirection,
    cache: &mut WallKickCache,
    mut fits: F,
) -> Option<Piece>
where
    F: FnMut(&Piece) -> bool,
{
    let from = piece.rotation();
    let to = from.rotated(direction);
    let transition = KickTransition { from, to };

    for offset in kick_candidates(piece.kind(), from, direction) {
        let key = WallKickKey {
            kind: piece.kind(),
            x: piece.x(),
            y: piece.y(),
            transition,
            offset,
        };
        if cache.contains(&key) {
            continue;
        }
        let candidate = piece.placed(piece.x() + offset.dx, piece.y() + offset.dy, to);
        if fits(&candidate) {
            cache.insert(key);
            return Some(candidate);
        }
    }
    None
}

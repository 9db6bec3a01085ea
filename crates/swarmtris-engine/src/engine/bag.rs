use std::fmt::Write as _;

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::PieceKind;

/// "Bag of seven" piece randomizer.
///
/// The bag holds the piece types remaining in the current shuffle cycle.
/// When it runs empty it is refilled with all 7 types and shuffled with
/// Fisher–Yates, so every aligned window of 7 draws contains each type once.
///
/// # Example
///
/// ```
/// use swarmtris_engine::engine::Bag;
///
/// let mut bag = Bag::new();
/// let mut first_cycle: Vec<_> = (0..7).map(|_| bag.draw()).collect();
/// first_cycle.sort();
/// first_cycle.dedup();
/// assert_eq!(first_cycle.len(), 7);
/// ```
#[derive(Debug, Clone)]
pub struct Bag {
    rng: Pcg32,
    remaining: Vec<PieceKind>,
}

impl Default for Bag {
    fn default() -> Self {
        Self::new()
    }
}

/// Seed for deterministic piece generation.
///
/// Two engines created with the same seed see the same piece sequence.
/// Serialized as 32 hexadecimal characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSeed([u8; 16]);

impl PieceSeed {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl Serialize for PieceSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let num = u128::from_be_bytes(self.0);
        let mut hex_str = String::with_capacity(2 * self.0.len());
        write!(&mut hex_str, "{num:032x}").map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex_str)
    }
}

impl<'de> Deserialize<'de> for PieceSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        if hex_str.len() != 32 {
            return Err(serde::de::Error::custom(format!(
                "invalid hex: expected 32 characters, got {}",
                hex_str.len()
            )));
        }
        let num = u128::from_str_radix(&hex_str, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex: {hex_str} ({e})")))?;
        Ok(Self(num.to_be_bytes()))
    }
}

impl Distribution<PieceSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PieceSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        PieceSeed(seed)
    }
}

impl Bag {
    /// Creates a bag seeded from the thread-local generator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    /// Like [`Self::new`], but with a specific seed for deterministic draws.
    #[must_use]
    pub fn with_seed(seed: PieceSeed) -> Self {
        Self {
            rng: Pcg32::from_seed(seed.0),
            remaining: Vec::with_capacity(PieceKind::LEN),
        }
    }

    /// Starts from a fixed remaining sequence; draws pop from its end.
    ///
    /// Random refills take over once the given pieces are used up.
    #[cfg(test)]
    pub(crate) fn with_remaining(seed: PieceSeed, remaining: Vec<PieceKind>) -> Self {
        Self {
            rng: Pcg32::from_seed(seed.0),
            remaining,
        }
    }

    /// Number of pieces left before the next refill.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Draws the next piece, refilling and reshuffling when the bag is empty.
    pub fn draw(&mut self) -> PieceKind {
        if self.remaining.is_empty() {
            self.refill();
        }
        match self.remaining.pop() {
            Some(kind) => kind,
            None => unreachable!("bag is refilled before drawing"),
        }
    }

    fn refill(&mut self) {
        self.remaining.extend(PieceKind::ALL);
        for i in (1..self.remaining.len()).rev() {
            let j = self.rng.random_range(0..=i);
            self.remaining.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    const SEED: PieceSeed = PieceSeed::from_bytes([7; 16]);

    #[test]
    fn test_each_cycle_contains_every_kind() {
        let mut bag = Bag::with_seed(SEED);
        for _ in 0..50 {
            let cycle: BTreeSet<_> = (0..PieceKind::LEN).map(|_| bag.draw()).collect();
            assert_eq!(cycle.len(), PieceKind::LEN);
            assert_eq!(bag.remaining(), 0);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Bag::with_seed(SEED);
        let mut b = Bag::with_seed(SEED);
        for _ in 0..100 {
            assert_eq!(a.draw(), b.draw());
        }
    }

    #[test]
    fn test_shuffle_is_not_fixed() {
        // with 20 cycles, at least two distinct orders must appear
        let mut bag = Bag::with_seed(SEED);
        let orders: BTreeSet<Vec<_>> = (0..20)
            .map(|_| (0..PieceKind::LEN).map(|_| bag.draw()).collect())
            .collect();
        assert!(orders.len() > 1);
    }

    #[test]
    fn test_remaining_pieces_drawn_first() {
        let mut bag = Bag::with_remaining(SEED, vec![PieceKind::O, PieceKind::I]);
        assert_eq!(bag.draw(), PieceKind::I);
        assert_eq!(bag.draw(), PieceKind::O);
        assert_eq!(bag.remaining(), 0);
        bag.draw();
        assert_eq!(bag.remaining(), PieceKind::LEN - 1);
    }

    #[test]
    fn test_seed_serialization() {
        let seed = PieceSeed::from_bytes([0xab; 16]);
        let json = serde_json::to_string(&seed).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(16)));
        let back: PieceSeed = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seed);
        assert!(serde_json::from_str::<PieceSeed>("\"abc\"").is_err());
    }
}

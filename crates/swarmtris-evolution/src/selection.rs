//! Fitness-proportionate parent selection.

use rand::Rng;
use serde::Serialize;

/// Fitness values normalized to selection probabilities.
///
/// When the total fitness is zero (or the input is empty) there is no
/// meaningful distribution; the shares are marked degenerate and
/// [`Self::select`] falls back to uniform selection.
///
/// # Example
///
/// ```
/// use rand::SeedableRng as _;
/// use rand_pcg::Pcg32;
/// use swarmtris_evolution::FitnessShares;
///
/// let shares = FitnessShares::new(&[0.0, 3.0, 1.0]);
/// assert_eq!(shares.shares(), &[0.0, 0.75, 0.25]);
///
/// let mut rng = Pcg32::seed_from_u64(0);
/// assert_ne!(shares.select(&mut rng), 0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessShares {
    shares: Vec<f32>,
    degenerate: bool,
}

impl FitnessShares {
    /// Normalizes `fitness` so the shares sum to 1.
    ///
    /// Negative and non-finite values are treated as 0.
    #[must_use]
    pub fn new(fitness: &[f32]) -> Self {
        let clean: Vec<f32> = fitness
            .iter()
            .map(|f| if f.is_finite() && *f > 0.0 { *f } else { 0.0 })
            .collect();
        let total: f32 = clean.iter().sum();
        if total > 0.0 && total.is_finite() {
            Self {
                shares: clean.iter().map(|f| f / total).collect(),
                degenerate: false,
            }
        } else {
            Self {
                shares: vec![0.0; clean.len()],
                degenerate: true,
            }
        }
    }

    #[must_use]
    pub fn shares(&self) -> &[f32] {
        &self.shares
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// `true` when no agent earned any fitness.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Picks one index by roulette wheel.
    ///
    /// Draws `r` uniformly from `[0, 1)` and subtracts shares in index order,
    /// returning the first index at which `r` drops to 0 or below. Rounding
    /// can leave a tiny remainder after the last share; the last index with
    /// a nonzero share is returned then.
    ///
    /// Zero shares are skipped even when `r` is exactly 0, so an agent that
    /// earned nothing is only ever picked in a degenerate round.
    ///
    /// # Panics
    ///
    /// Panics if there are no shares.
    pub fn select<R>(&self, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        assert!(!self.shares.is_empty(), "cannot select from an empty population");
        if self.degenerate {
            return rng.random_range(0..self.shares.len());
        }

        let mut remainder: f32 = rng.random();
        for (i, share) in self.shares.iter().enumerate() {
            if *share <= 0.0 {
                continue;
            }
            remainder -= share;
            if remainder <= 0.0 {
                return i;
            }
        }
        self.shares.iter().rposition(|s| *s > 0.0).unwrap_or(0)
    }
}

/// Summary statistics of one round's fitness.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FitnessStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub total: f32,
}

impl FitnessStats {
    /// Computes the statistics; all zero for an empty input.
    #[must_use]
    pub fn new(fitness: &[f32]) -> Self {
        if fitness.is_empty() {
            return Self::default();
        }
        let total: f32 = fitness.iter().sum();
        let min = fitness.iter().copied().fold(f32::INFINITY, f32::min);
        let max = fitness.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        #[expect(clippy::cast_precision_loss)]
        let mean = total / fitness.len() as f32;
        Self {
            min,
            max,
            mean,
            total,
        }
    }
}

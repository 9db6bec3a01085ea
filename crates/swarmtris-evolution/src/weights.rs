//! Parameter vector operations for evolving policies.
//!
//! These are the genetic operators [`NeuralPolicy`](crate::policy::NeuralPolicy)
//! applies to each of its parameter tensors:
//!
//! - **Initialization**: [`random`] draws uniform values in `[-bound, bound]`
//! - **Crossover**: [`uniform_crossover`] picks each value from one parent by coin flip
//! - **Mutation**: [`mutate`] adds Gaussian noise scaled by [`mutation_sigma`]
//!
//! Parameters are not normalized or clamped; the network's scale is free to drift.

use rand::Rng;
use rand_distr::Normal;

/// Creates a parameter vector by applying a function to each index.
///
/// # Examples
///
/// ```
/// use swarmtris_evolution::weights;
///
/// let values = weights::from_fn(|i| i as f32 * 0.5, 3);
/// assert_eq!(values, vec![0.0, 0.5, 1.0]);
/// ```
pub fn from_fn<F>(mut f: F, len: usize) -> Vec<f32>
where
    F: FnMut(usize) -> f32,
{
    let mut values = Vec::with_capacity(len);
    for i in 0..len {
        values.push(f(i));
    }
    values
}

/// Generates `len` values sampled uniformly from `[-bound, bound]`.
///
/// A non-positive `bound` yields all zeros.
pub fn random<R>(rng: &mut R, bound: f32, len: usize) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    if bound <= 0.0 {
        return vec![0.0; len];
    }
    from_fn(|_| rng.random_range(-bound..=bound), len)
}

/// Uniform crossover: each value is taken from `p1` or `p2` with equal probability.
///
/// # Panics
///
/// Panics if parent vectors have different lengths.
pub fn uniform_crossover<R>(p1: &[f32], p2: &[f32], rng: &mut R) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    assert_eq!(p1.len(), p2.len());
    from_fn(|i| if rng.random_bool(0.5) { p1[i] } else { p2[i] }, p1.len())
}

/// Standard deviation of the values (population form).
///
/// Returns 0.0 for an empty slice.
#[must_use]
pub fn std_dev(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    #[expect(clippy::cast_precision_loss)]
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    variance.sqrt()
}

/// Noise scale used when mutating `values`: their standard deviation, or 1.0
/// when that is zero or not finite.
#[must_use]
pub fn mutation_sigma(values: &[f32]) -> f32 {
    let sigma = std_dev(values);
    if sigma.is_finite() && sigma > 0.0 {
        sigma
    } else {
        1.0
    }
}

/// Applies Gaussian mutation in-place.
///
/// Each value is perturbed with probability `rate` by noise drawn from
/// `N(0, sigma)`, where `sigma` is [`mutation_sigma`] of the whole vector
/// before mutation. `rate` is clamped to `[0, 1]`.
pub fn mutate<R>(values: &mut [f32], rate: f32, rng: &mut R)
where
    R: Rng + ?Sized,
{
    let rate = f64::from(rate).clamp(0.0, 1.0);
    let Ok(normal) = Normal::new(0.0, mutation_sigma(values)) else {
        return;
    };
    for value in values {
        if rng.random_bool(rate) {
            *value += rng.sample(normal);
        }
    }
}

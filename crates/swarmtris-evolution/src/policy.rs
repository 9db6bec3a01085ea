//! Decision policies.
//!
//! A [`Policy`] maps a board observation to one of the seven [`Move`]s and
//! knows how to recombine with another policy of the same type. The
//! coordinator treats policies as opaque apart from this contract; they are
//! persisted between phases through serde, so every policy must round-trip
//! through JSON.

use rand::Rng;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use swarmtris_engine::Move;

use crate::weights;

/// A decision policy that can be evolved.
pub trait Policy: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Chooses the next move for a row-major board observation.
    fn decide(&self, observation: &[f32]) -> Move;

    /// Creates a child combining `self` and `other`.
    fn crossover<R>(&self, other: &Self, rng: &mut R) -> Self
    where
        R: Rng + ?Sized;

    /// Randomly perturbs the policy; `rate` is the per-parameter mutation probability.
    fn mutate<R>(&mut self, rate: f32, rng: &mut R)
    where
        R: Rng + ?Sized;
}

/// Creates fresh random policies for a population.
pub trait PolicyFactory<P>: Send + Sync + 'static {
    fn create<R>(&self, observation_len: usize, rng: &mut R) -> P
    where
        R: Rng + ?Sized;
}

/// A fully connected layer stored row-major (`weights[output * inputs + input]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl DenseLayer {
    fn random<R>(inputs: usize, outputs: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        #[expect(clippy::cast_precision_loss)]
        let bound = 1.0 / (inputs.max(1) as f32).sqrt();
        Self {
            inputs,
            outputs,
            weights: weights::random(rng, bound, inputs * outputs),
            biases: weights::random(rng, bound, outputs),
        }
    }

    /// Computes `W x + b`. Missing inputs count as 0; extra inputs are ignored.
    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .chunks(self.inputs.max(1))
            .zip(&self.biases)
            .map(|(row, bias)| bias + row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>())
            .collect()
    }

    fn crossover<R>(&self, other: &Self, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        assert_eq!((self.inputs, self.outputs), (other.inputs, other.outputs));
        Self {
            inputs: self.inputs,
            outputs: self.outputs,
            weights: weights::uniform_crossover(&self.weights, &other.weights, rng),
            biases: weights::uniform_crossover(&self.biases, &other.biases, rng),
        }
    }

    fn mutate<R>(&mut self, rate: f32, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        weights::mutate(&mut self.weights, rate, rng);
        weights::mutate(&mut self.biases, rate, rng);
    }
}

/// A two-layer perceptron policy: `inputs -> hidden (ReLU) -> 7`.
///
/// The move with the largest output wins (first one on ties). Outputs are
/// not passed through softmax since it would not change the winner.
///
/// # Example
///
/// ```
/// use rand::SeedableRng as _;
/// use rand_pcg::Pcg32;
/// use swarmtris_evolution::{NeuralPolicy, Policy};
///
/// let mut rng = Pcg32::seed_from_u64(1);
/// let policy = NeuralPolicy::random(100, 16, &mut rng);
/// let mv = policy.decide(&[0.0; 100]);
/// assert_eq!(policy.decide(&[0.0; 100]), mv);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralPolicy {
    hidden: DenseLayer,
    output: DenseLayer,
}

impl NeuralPolicy {
    pub const DEFAULT_HIDDEN_UNITS: usize = 16;

    /// Creates a policy with weights uniform in `±1/sqrt(fan_in)` per layer.
    #[must_use]
    pub fn random<R>(inputs: usize, hidden_units: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            hidden: DenseLayer::random(inputs, hidden_units, rng),
            output: DenseLayer::random(hidden_units, Move::LEN, rng),
        }
    }

    #[must_use]
    pub fn input_len(&self) -> usize {
        self.hidden.inputs
    }

    #[must_use]
    pub fn hidden_units(&self) -> usize {
        self.hidden.outputs
    }

    /// Raw output activations, one per entry of [`Move::ALL`].
    #[must_use]
    pub fn outputs(&self, observation: &[f32]) -> Vec<f32> {
        let mut hidden = self.hidden.forward(observation);
        for value in &mut hidden {
            *value = value.max(0.0);
        }
        self.output.forward(&hidden)
    }
}

impl Policy for NeuralPolicy {
    fn decide(&self, observation: &[f32]) -> Move {
        let outputs = self.outputs(observation);
        let best = outputs
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, &value)| match best {
                Some((_, best_value)) if best_value >= value => best,
                _ => Some((i, value)),
            })
            .map_or(0, |(i, _)| i);
        Move::from_index(best).unwrap_or(Move::Noop)
    }

    fn crossover<R>(&self, other: &Self, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            hidden: self.hidden.crossover(&other.hidden, rng),
            output: self.output.crossover(&other.output, rng),
        }
    }

    fn mutate<R>(&mut self, rate: f32, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.hidden.mutate(rate, rng);
        self.output.mutate(rate, rng);
    }
}

/// Creates [`NeuralPolicy`] instances with a fixed hidden width.
#[derive(Debug, Clone, Copy)]
pub struct NeuralPolicyFactory {
    pub hidden_units: usize,
}

impl Default for NeuralPolicyFactory {
    fn default() -> Self {
        Self {
            hidden_units: NeuralPolicy::DEFAULT_HIDDEN_UNITS,
        }
    }
}

impl PolicyFactory<NeuralPolicy> for NeuralPolicyFactory {
    fn create<R>(&self, observation_len: usize, rng: &mut R) -> NeuralPolicy
    where
        R: Rng + ?Sized,
    {
        NeuralPolicy::random(observation_len, self.hidden_units, rng)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(7)
    }

    fn constant_policy(value: f32) -> NeuralPolicy {
        let mut policy = NeuralPolicy::random(4, 3, &mut rng());
        for layer in [&mut policy.hidden, &mut policy.output] {
            layer.weights.fill(value);
            layer.biases.fill(value);
        }
        policy
    }

    #[test]
    fn test_shapes() {
        let policy = NeuralPolicy::random(100, 16, &mut rng());
        assert_eq!(policy.input_len(), 100);
        assert_eq!(policy.hidden_units(), 16);
        assert_eq!(policy.hidden.weights.len(), 1600);
        assert_eq!(policy.output.weights.len(), 16 * Move::LEN);
        assert_eq!(policy.outputs(&[0.5; 100]).len(), Move::LEN);
    }

    #[test]
    fn test_init_bounds() {
        let policy = NeuralPolicy::random(100, 16, &mut rng());
        assert!(policy.hidden.weights.iter().all(|w| w.abs() <= 0.1));
        assert!(policy.output.weights.iter().all(|w| w.abs() <= 0.25));
    }

    #[test]
    fn test_decide_picks_largest_output() {
        let mut policy = constant_policy(0.0);
        policy.output.biases = vec![0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 1.0];
        assert_eq!(policy.decide(&[1.0; 4]), Move::RotateCcw);

        // ties resolve to the first move
        let policy = constant_policy(0.0);
        assert_eq!(policy.decide(&[1.0; 4]), Move::Up);
    }

    #[test]
    fn test_relu_blocks_negative_hidden() {
        let mut policy = constant_policy(-1.0);
        policy.output.biases = vec![0.0; Move::LEN];
        policy.output.biases[3] = 0.5;
        // every hidden unit is negative, so only the output biases matter
        assert_eq!(policy.decide(&[1.0; 4]), Move::Right);
    }

    #[test]
    fn test_crossover_mixes_parents() {
        let a = constant_policy(1.0);
        let b = constant_policy(2.0);
        let child = a.crossover(&b, &mut rng());
        let all: Vec<_> = child
            .hidden
            .weights
            .iter()
            .chain(&child.output.weights)
            .copied()
            .collect();
        assert!(all.iter().all(|v| *v == 1.0 || *v == 2.0));
        assert!(all.contains(&1.0) && all.contains(&2.0));
    }

    #[test]
    fn test_mutation_zero_rate_is_identity() {
        let original = NeuralPolicy::random(10, 4, &mut rng());
        let mut mutated = original.clone();
        mutated.mutate(0.0, &mut rng());
        assert_eq!(mutated, original);
        mutated.mutate(1.0, &mut rng());
        assert_ne!(mutated, original);
    }

    #[test]
    fn test_json_round_trip() {
        let policy = NeuralPolicy::random(6, 3, &mut rng());
        let json = serde_json::to_string(&policy).unwrap();
        let back: NeuralPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }

    #[test]
    fn test_factory_uses_hidden_units() {
        let factory = NeuralPolicyFactory { hidden_units: 5 };
        let policy = factory.create(12, &mut rng());
        assert_eq!((policy.input_len(), policy.hidden_units()), (12, 5));
    }
}

//! Deterministic mock inference used when no trained model is available

use crate::types::{AnalysisResult, ClassProbabilities, NUM_CLASSES};
use md5::{Digest, Md5};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};

/// Seeds are reduced into `0..SEED_RANGE`
pub const SEED_RANGE: u64 = 10_000;

/// Symmetric Dirichlet concentration per class
pub const DIRICHLET_ALPHA: f64 = 2.0;

/// Minimum confidence forced onto the top class
pub const MIN_TOP_PROBABILITY: f64 = 0.5;

/// Produces reproducible class probabilities keyed by piece identifier.
///
/// The same identifier always yields the same result, which keeps the
/// service usable and testable without a trained model.
pub struct MockGenerator {
    gamma: Gamma<f64>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            gamma: Gamma::new(DIRICHLET_ALPHA, 1.0)
                .expect("positive shape and scale are valid gamma parameters"),
        }
    }

    /// Seed derived from the first 32 bits of the identifier's MD5 digest
    pub fn seed_for(identifier: &str) -> u64 {
        let digest = Md5::digest(identifier.as_bytes());
        let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        prefix as u64 % SEED_RANGE
    }

    /// Mock class probabilities for an identifier
    pub fn probabilities(&self, identifier: &str) -> ClassProbabilities {
        let mut rng = ChaCha8Rng::seed_from_u64(Self::seed_for(identifier));

        // Dirichlet(alpha) sample via normalized Gamma(alpha, 1) draws
        let mut probs = [0.0f64; NUM_CLASSES];
        for p in probs.iter_mut() {
            *p = self.gamma.sample(&mut rng);
        }
        normalize(&mut probs);

        // A weak top class is pinned to exactly MIN_TOP_PROBABILITY and the
        // other classes share the remainder in their original proportions.
        let top = ClassProbabilities::new(probs).argmax().index();
        if probs[top] < MIN_TOP_PROBABILITY {
            let rest: f64 = probs
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != top)
                .map(|(_, p)| p)
                .sum();
            let scale = (1.0 - MIN_TOP_PROBABILITY) / rest;
            for (i, p) in probs.iter_mut().enumerate() {
                if i != top {
                    *p *= scale;
                }
            }
            probs[top] = MIN_TOP_PROBABILITY;
        }

        ClassProbabilities::new(probs)
    }

    /// Full mock analysis result for an identifier
    pub fn generate(&self, identifier: &str) -> AnalysisResult {
        AnalysisResult::from_probabilities(self.probabilities(identifier))
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(values: &mut [f64; NUM_CLASSES]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    } else {
        values.fill(1.0 / NUM_CLASSES as f64);
    }
}

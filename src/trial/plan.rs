//! Deterministic trial generation.
//!
//! A [`TrialPlan`] enumerates every repetition crossed with every seed,
//! repetition-major. Iteration is lazy and restartable: the auxiliary
//! parameter of each trial is derived from the plan's `aux_seed` and the
//! trial ordinal alone, so walking the same plan twice (or from several
//! workers) always yields identical specs.

use serde::{Deserialize, Serialize};

use super::types::TrialSpec;

/// Inclusive lower bound of the auxiliary parameter
pub const AUX_MIN: u32 = 1;

/// Inclusive upper bound of the auxiliary parameter
pub const AUX_MAX: u32 = 14;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_CONST1: u64 = 0xBF58_476D_1CE4_E5B9;
const MIX_CONST2: u64 = 0x94D0_49BB_1331_11EB;

/// The full (repetition x seed) matrix of a soak run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialPlan {
    /// Number of outer repetitions (window sizes 1..=repetitions)
    pub repetitions: u32,

    /// Seeds enumerated inside each repetition, in order
    pub seeds: Vec<u64>,

    /// Key for the auxiliary parameter stream
    pub aux_seed: u64,
}

impl TrialPlan {
    /// Plan over seeds `1..=seed_count`
    pub fn new(repetitions: u32, seed_count: u64) -> Self {
        Self::with_seeds(repetitions, (1..=seed_count).collect())
    }

    /// Plan over an explicit seed set
    pub fn with_seeds(repetitions: u32, seeds: Vec<u64>) -> Self {
        Self {
            repetitions,
            seeds,
            aux_seed: 0,
        }
    }

    /// Set the key for the auxiliary parameter stream
    pub fn aux_seed(mut self, aux_seed: u64) -> Self {
        self.aux_seed = aux_seed;
        self
    }

    /// Total number of trials the plan yields
    pub fn total_trials(&self) -> usize {
        self.repetitions as usize * self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_trials() == 0
    }

    /// Iterate the trials from the beginning
    pub fn iter(&self) -> Trials<'_> {
        Trials {
            plan: self,
            ordinal: 0,
        }
    }

    /// Build the trial at a given generation index
    pub fn spec_at(&self, ordinal: usize) -> Option<TrialSpec> {
        if ordinal >= self.total_trials() {
            return None;
        }
        let seed_idx = ordinal % self.seeds.len();
        let repetition = (ordinal / self.seeds.len()) as u32 + 1;

        Some(TrialSpec {
            ordinal,
            repetition,
            seed: self.seeds[seed_idx],
            window: repetition,
            auxiliary: auxiliary_for(self.aux_seed, ordinal as u64),
        })
    }
}

impl<'a> IntoIterator for &'a TrialPlan {
    type Item = TrialSpec;
    type IntoIter = Trials<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a [`TrialPlan`]
#[derive(Debug, Clone)]
pub struct Trials<'a> {
    plan: &'a TrialPlan,
    ordinal: usize,
}

impl Iterator for Trials<'_> {
    type Item = TrialSpec;

    fn next(&mut self) -> Option<TrialSpec> {
        let spec = self.plan.spec_at(self.ordinal)?;
        self.ordinal += 1;
        Some(spec)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.total_trials().saturating_sub(self.ordinal);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Trials<'_> {}

/// Uniform draw from `[AUX_MIN, AUX_MAX]` for one trial
fn auxiliary_for(aux_seed: u64, ordinal: u64) -> u32 {
    let span = u64::from(AUX_MAX - AUX_MIN + 1);
    // Rejection sampling keeps the draw unbiased; the stream index moves
    // past the trial's own slot only when a candidate is rejected.
    let threshold = u64::MAX - u64::MAX % span;
    let mut counter = ordinal.wrapping_mul(span).wrapping_add(1);
    loop {
        let candidate = splitmix64(aux_seed.wrapping_add(counter.wrapping_mul(GOLDEN_GAMMA)));
        if candidate < threshold {
            return AUX_MIN + (candidate % span) as u32;
        }
        counter = counter.wrapping_add(1);
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(MIX_CONST1);
    z = (z ^ (z >> 27)).wrapping_mul(MIX_CONST2);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plan_order_is_repetition_major() {
        let plan = TrialPlan::new(2, 3);
        let pairs: Vec<(u32, u64)> = plan.iter().map(|s| (s.repetition, s.seed)).collect();
        assert_eq!(pairs, vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)]);
    }

    #[test]
    fn test_plan_legacy_matrix() {
        let plan = TrialPlan::new(100, 5);
        assert_eq!(plan.total_trials(), 500);
        assert_eq!(plan.iter().count(), 500);
        let last = plan.iter().last().unwrap();
        assert_eq!(last.repetition, 100);
        assert_eq!(last.seed, 5);
        assert_eq!(last.ordinal, 499);
    }

    #[test]
    fn test_plan_explicit_seeds_keep_order() {
        let plan = TrialPlan::with_seeds(1, vec![7, 3, 9]);
        let seeds: Vec<u64> = plan.iter().map(|s| s.seed).collect();
        assert_eq!(seeds, vec![7, 3, 9]);
    }

    #[test]
    fn test_plan_restartable() {
        let plan = TrialPlan::new(4, 5).aux_seed(42);
        let first: Vec<TrialSpec> = plan.iter().collect();
        let second: Vec<TrialSpec> = (&plan).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_aux_seed_changes_auxiliary_stream() {
        let a: Vec<u32> = TrialPlan::new(20, 5).aux_seed(1).iter().map(|s| s.auxiliary).collect();
        let b: Vec<u32> = TrialPlan::new(20, 5).aux_seed(2).iter().map(|s| s.auxiliary).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_plan() {
        assert!(TrialPlan::new(0, 5).is_empty());
        assert!(TrialPlan::with_seeds(3, vec![]).is_empty());
        assert_eq!(TrialPlan::new(0, 5).iter().next(), None);
    }

    #[test]
    fn test_size_hint_tracks_progress() {
        let plan = TrialPlan::new(2, 2);
        let mut trials = plan.iter();
        assert_eq!(trials.len(), 4);
        trials.next();
        assert_eq!(trials.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_plan_shape(repetitions in 1u32..40, seed_count in 1u64..12, aux_seed in any::<u64>()) {
            let plan = TrialPlan::new(repetitions, seed_count).aux_seed(aux_seed);
            let specs: Vec<TrialSpec> = plan.iter().collect();
            prop_assert_eq!(specs.len(), repetitions as usize * seed_count as usize);
            for (i, spec) in specs.iter().enumerate() {
                prop_assert_eq!(spec.ordinal, i);
                prop_assert_eq!(spec.window, spec.repetition);
                prop_assert!((AUX_MIN..=AUX_MAX).contains(&spec.auxiliary));
                prop_assert_eq!(spec.repetition as usize, i / seed_count as usize + 1);
                prop_assert_eq!(spec.seed, (i as u64 % seed_count) + 1);
            }
        }
    }
}

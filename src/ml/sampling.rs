// ============================================================
// Layer 5: Sampling Helpers
// ============================================================
// Host-side math on a single row of logits, shared by the
// generator and the classifier.
//
//   softmax             max-subtracted, so large logits never
//                       overflow exp()
//   argmax              ties go to the lowest id
//   sample_categorical  one draw from the full distribution

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::domain::error::{GptError, GptResult};

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; the first one wins a tie.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn sample_categorical<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> GptResult<usize> {
    let dist = WeightedIndex::new(probs).map_err(|e| GptError::Sampling(e.to_string()))?;
    Ok(dist.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_softmax_sums_to_one_and_survives_large_logits() {
        let p = softmax(&[1000.0, 999.0, -1000.0]);
        assert!(p.iter().all(|x| x.is_finite()));
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(p[0] > p[1] && p[1] > p[2]);
    }

    #[test]
    fn test_argmax_breaks_ties_low() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[3.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_degenerate_distribution_always_picks_the_mass() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(sample_categorical(&[0.0, 1.0, 0.0], &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_sampling_follows_the_distribution() {
        let mut rng   = StdRng::seed_from_u64(11);
        let mut count = [0usize; 2];
        for _ in 0..10_000 {
            count[sample_categorical(&[0.25, 0.75], &mut rng).unwrap()] += 1;
        }
        // expected 7500; allow a generous band
        assert!(count[1] > 7_000 && count[1] < 8_000, "{count:?}");
    }

    #[test]
    fn test_all_zero_weights_are_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            sample_categorical(&[0.0, 0.0], &mut rng),
            Err(GptError::Sampling(_))
        ));
    }
}

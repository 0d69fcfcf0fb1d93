//! Probability-weighted random selection.
//!
//! Used for task selection, mission planning and failure draws. Candidates
//! with a zero, negative or non-finite weight can never be drawn.

use rand::Rng;

fn usable(weight: f64) -> bool {
    weight.is_finite() && weight > 0.0
}

/// Draw an index with probability proportional to its weight.
///
/// Returns `None` when no weight is usable.
pub fn weighted_index(rng: &mut impl Rng, weights: &[f64]) -> Option<usize> {
    let total: f64 = weights.iter().copied().filter(|w| usable(*w)).sum();
    if !usable(total) {
        return None;
    }

    let roll = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last = None;
    for (i, w) in weights.iter().enumerate() {
        if !usable(*w) {
            continue;
        }
        cumulative += w;
        last = Some(i);
        if roll < cumulative {
            return Some(i);
        }
    }
    // Rounding can leave roll a hair above the final cumulative sum
    last
}

/// Draw one candidate by weight
pub fn weighted_pick<T: Clone>(rng: &mut impl Rng, candidates: &[(T, f64)]) -> Option<T> {
    let weights: Vec<f64> = candidates.iter().map(|(_, w)| *w).collect();
    weighted_index(rng, &weights).map(|i| candidates[i].0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_all_zero_returns_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(weighted_index(&mut rng, &[]), None);
        assert_eq!(weighted_index(&mut rng, &[0.0, 0.0]), None);
        assert_eq!(weighted_index(&mut rng, &[f64::NAN, -1.0]), None);
    }

    #[test]
    fn test_zero_weight_never_drawn() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let pick = weighted_index(&mut rng, &[0.0, 3.0, 0.0, 1.0, f64::INFINITY]);
            assert!(matches!(pick, Some(1) | Some(3)));
        }
    }

    #[test]
    fn test_weights_respected() {
        let mut rng = StdRng::seed_from_u64(3);
        let candidates = [("rare", 1.0), ("common", 9.0)];
        let common = (0..10_000)
            .filter(|_| weighted_pick(&mut rng, &candidates) == Some("common"))
            .count();
        assert!(common > 8500 && common < 9500, "common drawn {} times", common);
    }
}

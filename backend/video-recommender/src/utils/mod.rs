use std::cmp::Ordering;

/// Descending by score, then ascending by index.
fn rank_order(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// Top-N `(index, score)` pairs from a dense score vector.
///
/// Non-finite scores (masked items, NaN) never surface. Uses a partial
/// selection over all candidates, then sorts only the selected `n`.
/// Ties go to the lower index.
pub fn top_n(scores: &[f64], n: usize) -> Vec<(usize, f64)> {
    if n == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<(usize, f64)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .collect();

    let take = n.min(candidates.len());
    if take == 0 {
        return Vec::new();
    }

    if take < candidates.len() {
        candidates.select_nth_unstable_by(take - 1, rank_order);
        candidates.truncate(take);
    }
    candidates.sort_unstable_by(rank_order);
    candidates
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_n_orders_descending() {
        let scores = vec![0.1, 0.9, 0.5, 0.7];
        let top = top_n(&scores, 3);
        assert_eq!(top.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 3, 2]);
    }

    #[test]
    fn test_top_n_breaks_ties_by_index() {
        let scores = vec![0.5, 0.5, 0.9, 0.5];
        let top = top_n(&scores, 3);
        assert_eq!(top.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![2, 0, 1]);
    }

    #[test]
    fn test_top_n_skips_masked() {
        let scores = vec![f64::NEG_INFINITY, 0.2, f64::NAN, 0.1];
        let top = top_n(&scores, 10);
        assert_eq!(top.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_top_n_zero_and_empty() {
        assert!(top_n(&[1.0, 2.0], 0).is_empty());
        assert!(top_n(&[], 5).is_empty());
    }
}

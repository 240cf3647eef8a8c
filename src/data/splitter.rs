// ============================================================
// Layer 4: Train/Validation Splitter
// ============================================================
// Splits an encoded corpus into a training prefix and a
// validation suffix at n = floor(fraction * len).
//
// No shuffling: for a text stream the order IS the data, and
// keeping classification examples in file order makes the split
// reproducible from the corpus alone.

use crate::domain::error::{GptError, GptResult};

/// Split `items` into (train, validation) at `floor(train_fraction * len)`.
///
/// `train_fraction` must lie in (0, 1].
pub fn split_at_fraction<T>(mut items: Vec<T>, train_fraction: f64) -> GptResult<(Vec<T>, Vec<T>)> {
    if !(train_fraction > 0.0 && train_fraction <= 1.0) {
        return Err(GptError::InvalidConfig(format!(
            "split fraction must be in (0, 1], got {train_fraction}"
        )));
    }

    let total    = items.len();
    let split_at = ((total as f64) * train_fraction).floor() as usize;
    let split_at = split_at.min(total);

    // split_off(n) leaves [0..n) in `items` and returns [n..total)
    let val = items.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        items.len(),
        val.len(),
    );

    Ok((items, val))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_at_fraction(items, 0.9).unwrap();
        assert_eq!(train.len(), 90);
        assert_eq!(val.len(),   10);
    }

    #[test]
    fn test_prefix_and_suffix_keep_order() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_at_fraction(items, 0.7).unwrap();
        assert_eq!(train, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(val,   vec![7, 8, 9]);
    }

    #[test]
    fn test_split_index_is_floored() {
        // 0.75 * 7 = 5.25 → 5
        let items: Vec<usize> = (0..7).collect();
        let (train, val)      = split_at_fraction(items, 0.75).unwrap();
        assert_eq!(train.len(), 5);
        assert_eq!(val.len(),   2);
    }

    #[test]
    fn test_full_training_split() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_at_fraction(items, 1.0).unwrap();
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        assert!(split_at_fraction(vec![1, 2, 3], 0.0).is_err());
        assert!(split_at_fraction(vec![1, 2, 3], 1.5).is_err());
        assert!(split_at_fraction(vec![1, 2, 3], f64::NAN).is_err());
    }
}

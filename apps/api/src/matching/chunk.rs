/// Splits an ordered list into fixed-size chunks, preserving order. The last
/// chunk may be shorter. `size == 0` deterministically yields a single chunk
/// holding the whole input (or nothing for an empty input).
pub fn chunk_jobs<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    if size == 0 {
        return vec![items.to_vec()];
    }
    items.chunks(size).map(|c| c.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_counts_and_order_for_all_small_inputs() {
        for n in 0usize..12 {
            let items: Vec<usize> = (0..n).collect();
            for k in 1usize..5 {
                let chunks = chunk_jobs(&items, k);
                assert_eq!(chunks.len(), n.div_ceil(k), "n={n} k={k}");
                let flat: Vec<usize> = chunks.iter().flatten().copied().collect();
                assert_eq!(flat, items, "n={n} k={k}");
                for chunk in chunks.iter().take(chunks.len().saturating_sub(1)) {
                    assert_eq!(chunk.len(), k, "n={n} k={k}");
                }
            }
        }
    }

    #[test]
    fn test_last_chunk_may_be_short() {
        let chunks = chunk_jobs(&[1, 2, 3, 4, 5], 3);
        assert_eq!(chunks, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn test_zero_size_is_a_single_chunk() {
        let chunks = chunk_jobs(&[1, 2, 3], 0);
        assert_eq!(chunks, vec![vec![1, 2, 3]]);
        assert!(chunk_jobs::<u8>(&[], 0).is_empty());
    }
}

//! Longest increasing subsequence.

/// Indices of a longest strictly increasing subsequence of `values`.
///
/// Zero entries are skipped: in the keyed diff they mark new children that
/// have no old position. Runs in `O(n log n)` using the greedy "smallest
/// tail" method with back-pointers for reconstruction.
///
/// ```rust
/// use trellis_core::renderer::longest_increasing_subsequence;
///
/// let values = [2, 3, 1, 5, 6, 8, 7, 9, 4];
/// let indices = longest_increasing_subsequence(&values);
/// assert_eq!(indices.len(), 6);
/// assert!(indices.windows(2).all(|w| values[w[0]] < values[w[1]]));
/// ```
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    let mut predecessors: Vec<Option<usize>> = vec![None; values.len()];
    // tails[k] = index of the smallest tail of an increasing run of length k+1.
    let mut tails: Vec<usize> = Vec::new();

    for (i, &value) in values.iter().enumerate() {
        if value == 0 {
            continue;
        }

        let position = tails.partition_point(|&tail| values[tail] < value);
        if position > 0 {
            predecessors[i] = Some(tails[position - 1]);
        }
        if position == tails.len() {
            tails.push(i);
        } else {
            tails[position] = i;
        }
    }

    let mut sequence = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        sequence.push(i);
        cursor = predecessors[i];
    }
    sequence.reverse();
    sequence
}

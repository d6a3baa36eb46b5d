//! Row-block partition of a matrix across participants.
//!
//! Every participant gets `rows / parts` rows; the first `rows % parts`
//! participants get one more. Blocks are contiguous and ordered by
//! participant index, so block `p` starts where block `p - 1` ends.

use std::ops::Range;

/// Contiguous row blocks, one per participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPartition {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl RowPartition {
    /// Splits `total_rows` rows among `parts` participants.
    ///
    /// # Panics
    ///
    /// Panics if `parts` is zero.
    pub fn new(total_rows: usize, parts: usize) -> Self {
        assert!(parts > 0, "partition needs at least one participant");

        let base = total_rows / parts;
        let remainder = total_rows % parts;

        let counts: Vec<usize> = (0..parts)
            .map(|p| base + usize::from(p < remainder))
            .collect();

        let mut offsets = Vec::with_capacity(parts);
        let mut running = 0;
        for &count in &counts {
            offsets.push(running);
            running += count;
        }

        Self { counts, offsets }
    }

    pub fn parts(&self) -> usize {
        self.counts.len()
    }

    pub fn total_rows(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Rows assigned to each participant.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// First row of each participant's block.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Rows owned by participant `p`.
    pub fn rows_of(&self, p: usize) -> Range<usize> {
        self.offsets[p]..self.offsets[p] + self.counts[p]
    }

    /// Element counts for a buffer with `width` values per row, as handed to
    /// scatter and gather.
    pub fn element_counts(&self, width: usize) -> Vec<usize> {
        self.counts.iter().map(|&rows| rows * width).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn remainder_goes_to_first_blocks() {
        let part = RowPartition::new(10, 4);
        assert_eq!(part.counts(), &[3, 3, 2, 2]);
        assert_eq!(part.offsets(), &[0, 3, 6, 8]);
        assert_eq!(part.rows_of(2), 6..8);
    }

    #[test]
    fn more_parts_than_rows() {
        let part = RowPartition::new(2, 5);
        assert_eq!(part.counts(), &[1, 1, 0, 0, 0]);
        assert_eq!(part.offsets(), &[0, 1, 2, 2, 2]);
        assert!(part.rows_of(4).is_empty());
    }

    #[test]
    fn single_part_takes_everything() {
        let part = RowPartition::new(7, 1);
        assert_eq!(part.counts(), &[7]);
        assert_eq!(part.rows_of(0), 0..7);
    }

    #[test]
    fn element_counts_scale_by_width() {
        let part = RowPartition::new(5, 2);
        assert_eq!(part.element_counts(4), vec![12, 8]);
    }

    proptest! {
        #[test]
        fn counts_sum_to_total(rows in 0usize..500, parts in 1usize..64) {
            let part = RowPartition::new(rows, parts);
            prop_assert_eq!(part.total_rows(), rows);

            let base = rows / parts;
            let bigger = part.counts().iter().filter(|&&c| c == base + 1).count();
            prop_assert_eq!(bigger, rows % parts);
            prop_assert!(part.counts().iter().all(|&c| c == base || c == base + 1));
        }

        #[test]
        fn blocks_are_contiguous(rows in 0usize..500, parts in 1usize..64) {
            let part = RowPartition::new(rows, parts);
            let mut next = 0;
            for p in 0..part.parts() {
                let range = part.rows_of(p);
                prop_assert_eq!(range.start, next);
                next = range.end;
            }
            prop_assert_eq!(next, rows);
        }
    }
}

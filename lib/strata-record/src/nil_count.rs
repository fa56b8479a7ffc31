use crate::ColVal;

/// Prefix sums of null rows in a column.
///
/// `value[j]` holds the number of null rows among rows `[0, j)`, which turns a logical row range into the physical
/// range of packed values in constant time: row `r` (if present) is stored at index `r - value[r]`.
///
/// A total of zero means the column has no nulls. In that case the prefix sums are never built, and logical rows map
/// directly to physical indices.
#[derive(Clone, Debug, Default)]
pub struct NilCount {
    total: usize,
    value: Vec<usize>,
}

impl NilCount {
    /// Prepares the index for a column with `total` null rows, sized to hold `size` prefix sums.
    ///
    /// When `total` is zero, nothing else is done. Otherwise, the prefix sum buffer is resized to `size` entries with
    /// `value[0] = 0`, and the caller fills in the rest via [`values_mut`][Self::values_mut]. The buffer is reused
    /// across calls and never shrinks.
    pub fn init(&mut self, total: usize, size: usize) {
        self.total = total;
        if total == 0 {
            return;
        }

        self.value.clear();
        self.value.resize(size, 0);
    }

    /// Builds the index for the given column.
    pub fn fill_from(&mut self, col: &ColVal) {
        self.init(col.nil_count(), col.len() + 1);
        if self.total == 0 {
            return;
        }

        for row in 0..col.len() {
            self.value[row + 1] = self.value[row] + usize::from(col.is_nil(row));
        }
    }

    /// Returns the total number of null rows.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the prefix sums.
    ///
    /// Empty if the index was initialized with a total of zero.
    pub fn values(&self) -> &[usize] {
        if self.total == 0 {
            &[]
        } else {
            &self.value
        }
    }

    /// Returns the prefix sums for filling in.
    pub fn values_mut(&mut self) -> &mut [usize] {
        if self.total == 0 {
            &mut []
        } else {
            &mut self.value
        }
    }

    /// Translates the logical row range `[start, end)` into the physical range of packed values.
    ///
    /// # Panics
    ///
    /// Panics if `end` is beyond the prefix sums held by the index.
    pub fn physical_range(&self, start: usize, end: usize) -> (usize, usize) {
        if self.total == 0 {
            return (start, end);
        }

        (start - self.value[start], end - self.value[end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_sums() {
        let mut col = ColVal::new();
        col.append_integer(1);
        col.append_integer_null();
        col.append_integer_null();
        col.append_integer(2);

        let mut nc = NilCount::default();
        nc.fill_from(&col);

        assert_eq!(nc.total(), 2);
        assert_eq!(nc.values(), &[0, 0, 1, 2, 2]);
        assert_eq!(nc.physical_range(0, 4), (0, 2));
        assert_eq!(nc.physical_range(1, 3), (1, 1));
        assert_eq!(nc.physical_range(3, 4), (1, 2));
    }

    #[test]
    fn zero_total_skips_translation() {
        let mut nc = NilCount::default();
        nc.init(0, 10);

        assert!(nc.values().is_empty());
        assert_eq!(nc.physical_range(3, 7), (3, 7));
    }

    #[test]
    fn reuse_does_not_shrink() {
        let mut nc = NilCount::default();
        nc.init(1, 100);
        let capacity = nc.value.capacity();

        nc.init(1, 4);
        assert_eq!(nc.values(), &[0, 0, 0, 0]);
        assert_eq!(nc.value.capacity(), capacity);

        // Manually filled, as a caller outside of `fill_from` would.
        nc.values_mut().copy_from_slice(&[0, 1, 1, 1]);
        assert_eq!(nc.physical_range(1, 2), (0, 1));
    }
}

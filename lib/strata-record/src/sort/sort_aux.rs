/// Time-ordered permutation of a record's rows, split into contiguous sections.
///
/// After [`init`][Self::init] and [`sort`][Self::sort], position `i` in sorted order refers to original row
/// `row_ids[i]`, which has timestamp `times[i]`.
///
/// [`init_sections`][Self::init_sections] then splits the sorted positions into sections: maximal runs where the
/// original row indices increase by exactly one from each position to the next, and no two neighboring positions share
/// a timestamp. Each section maps onto a contiguous range of original rows, so a whole section can be copied out of a
/// column buffer in one operation.
#[derive(Clone, Debug, Default)]
pub struct SortAux {
    row_ids: Vec<usize>,
    times: Vec<i64>,
    // Flattened, inclusive (start, end) pairs of sorted positions.
    sections: Vec<usize>,
    scratch: Vec<(i64, usize)>,
}

impl SortAux {
    /// Resets the permutation to the identity over the given timestamps.
    pub fn init<I>(&mut self, times: I)
    where
        I: IntoIterator<Item = i64>,
    {
        self.times.clear();
        self.times.extend(times);
        self.row_ids.clear();
        self.row_ids.extend(0..self.times.len());
        self.sections.clear();
    }

    /// Reserves room for at least `rows` rows.
    pub fn reserve(&mut self, rows: usize) {
        self.row_ids.reserve(rows);
        self.times.reserve(rows);
        self.scratch.reserve(rows);
    }

    /// Sorts the permutation by timestamp.
    ///
    /// The sort is stable: rows with equal timestamps keep their original relative order, so the row appended last
    /// sorts last.
    pub fn sort(&mut self) {
        if self.times.windows(2).all(|w| w[0] <= w[1]) {
            return;
        }

        self.scratch.clear();
        self.scratch
            .extend(self.times.iter().copied().zip(self.row_ids.iter().copied()));
        self.scratch.sort_by_key(|&(time, _)| time);

        for (i, &(time, row_id)) in self.scratch.iter().enumerate() {
            self.times[i] = time;
            self.row_ids[i] = row_id;
        }
    }

    /// Splits the sorted positions into sections.
    pub fn init_sections(&mut self) {
        self.sections.clear();
        if self.row_ids.is_empty() {
            return;
        }

        self.sections.push(0);
        for i in 1..self.row_ids.len() {
            if self.row_ids[i] != self.row_ids[i - 1] + 1 || self.times[i] == self.times[i - 1] {
                self.sections.push(i - 1);
                self.sections.push(i);
            }
        }
        self.sections.push(self.row_ids.len() - 1);
    }

    /// Returns the number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len() / 2
    }

    /// Returns the location of the given section.
    ///
    /// The result is `(position, row_start, row_end)`: the sorted position at which the section starts, and the range
    /// `[row_start, row_end)` of original rows it covers.
    ///
    /// # Panics
    ///
    /// Panics if `section` is not less than [`section_count`][Self::section_count].
    pub fn row_index(&self, section: usize) -> (usize, usize, usize) {
        let start = self.sections[section * 2];
        let end = self.sections[section * 2 + 1];
        let row_start = self.row_ids[start];

        (start, row_start, row_start + end - start + 1)
    }

    /// Returns the original row index at each sorted position.
    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    /// Returns the timestamp at each sorted position.
    pub fn times(&self) -> &[i64] {
        &self.times
    }

    /// Clears all state, retaining allocated capacity.
    pub fn clear(&mut self) {
        self.row_ids.clear();
        self.times.clear();
        self.sections.clear();
        self.scratch.clear();
    }
}

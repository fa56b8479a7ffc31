use snafu::OptionExt as _;
use strata_core::pooling::{BoundedObjectPool, Clearable, ObjectPool as _};
use tracing::trace;

use super::SortAux;
use crate::{error::*, record::check_column_length, ColVal, NilCount, Record, ValueKind};

/// A pool of reusable [`SortHelper`]s.
pub type SortHelperPool = BoundedObjectPool<SortHelper>;

/// Sorts records by time, collapsing rows that share a timestamp.
///
/// A `SortHelper` owns all of the scratch state needed to sort a record, including a spare record that receives the
/// sorted rows. Sorting swaps the spare record with the input, so the input's old buffers become the spare for the next
/// call. Helpers are meant to be reused, typically through a [`SortHelperPool`], so that steady-state sorting does not
/// allocate.
///
/// ## Duplicate timestamps
///
/// When multiple rows share a timestamp, exactly one row is kept for it. Each column resolves independently: the value
/// from the last-appended row wins, unless that value is null, in which case the last non-null value for that
/// timestamp is kept. A null never overwrites a present value.
#[derive(Debug, Default)]
pub struct SortHelper {
    aux: SortAux,
    nil_count: NilCount,
    scratch: Record,
}

impl SortHelper {
    /// Creates a new `SortHelper`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `SortHelper` with room for sorting `rows` rows without reallocating its permutation buffers.
    pub fn with_capacity(rows: usize) -> Self {
        let mut helper = Self::default();
        helper.reserve_rows(rows);
        helper
    }

    /// Reserves room for sorting at least `rows` rows.
    pub fn reserve_rows(&mut self, rows: usize) {
        self.aux.reserve(rows);
    }

    /// Sorts the record by time in ascending order, collapsing rows with duplicate timestamps.
    ///
    /// Records with no rows are left untouched.
    ///
    /// # Errors
    ///
    /// If the record has a different number of columns than fields, has nulls in its time column, has a column whose
    /// row count differs from the time column, has a column whose buffers disagree with its row and null counts, or has
    /// a column of unknown type, an error is returned and the record is left untouched.
    pub fn sort(&mut self, rec: &mut Record) -> Result<(), RecordError> {
        let rows = rec.row_nums();
        if rows == 0 {
            return Ok(());
        }

        check_sortable(rec)?;

        self.aux.init(rec.times());
        self.aux.sort();
        self.aux.init_sections();

        self.scratch.reset_with_schema(rec.schema());

        let time_idx = rec.column_count() - 1;
        for (i, (field, src)) in rec.schema().iter().zip(rec.columns()).enumerate().take(time_idx) {
            let kind = field.ty.value_kind().context(UnsupportedFieldType {
                field: field.name.as_str(),
                ty: field.ty,
            })?;

            self.nil_count.fill_from(src);
            if let Some(dst) = self.scratch.column_mut(i) {
                sort_column(&self.aux, &self.nil_count, src, dst, kind);
            }
        }

        if let Some(dst) = self.scratch.column_mut(time_idx) {
            append_distinct_times(self.aux.times(), dst);
        }

        std::mem::swap(rec, &mut self.scratch);

        trace!(
            rows,
            sections = self.aux.section_count(),
            collapsed = rows - rec.row_nums(),
            "Sorted record."
        );

        Ok(())
    }
}

impl Clearable for SortHelper {
    fn clear(&mut self) {
        self.aux.clear();
        self.scratch.clear();
    }
}

fn check_sortable(rec: &Record) -> Result<(), RecordError> {
    let columns = rec.column_count();
    snafu::ensure!(
        rec.schema().len() == columns,
        ColumnCountMismatch {
            schema: rec.schema().len(),
            columns,
        }
    );

    // Sorting works off the present timestamps, so a null in the time column would misalign every other column.
    let time_nulls = rec.columns().last().map_or(0, ColVal::nil_count);
    snafu::ensure!(time_nulls == 0, TimeColumnHasNulls { nil_count: time_nulls });

    let rows = rec.row_nums();
    for (field, col) in rec.schema().iter().zip(rec.columns()) {
        snafu::ensure!(
            col.len() == rows,
            RowCountMismatch {
                field: field.name.as_str(),
                expected: rows,
                actual: col.len(),
            }
        );
        snafu::ensure!(
            field.ty.value_kind().is_some(),
            UnsupportedFieldType {
                field: field.name.as_str(),
                ty: field.ty,
            }
        );
        check_column_length(field, col)?;
    }

    Ok(())
}

fn sort_column(aux: &SortAux, nil_count: &NilCount, src: &ColVal, dst: &mut ColVal, kind: ValueKind) {
    let times = aux.times();

    for section in 0..aux.section_count() {
        let (pos, mut start, end) = aux.row_index(section);

        // Sections never contain duplicate timestamps internally, so only a section's first row can share its
        // timestamp with the row appended last, which came from the previous section.
        if pos > 0 && times[pos] == times[pos - 1] {
            if !src.is_nil(start) {
                dst.delete_last(kind);
                dst.append_with_nil_count(src, kind, start, start + 1, nil_count);
            }
            start += 1;
        }

        if start < end {
            dst.append_with_nil_count(src, kind, start, end, nil_count);
        }
    }
}

fn append_distinct_times(times: &[i64], dst: &mut ColVal) {
    let mut last = None;
    for &time in times {
        if last != Some(time) {
            dst.append_integer(time);
            last = Some(time);
        }
    }
}

/// Sorts a record using a helper checked out from the given pool.
///
/// The helper is returned to the pool once sorting completes, whether or not it succeeded.
///
/// # Errors
///
/// See [`SortHelper::sort`].
pub fn sort_record(pool: &SortHelperPool, rec: &mut Record) -> Result<(), RecordError> {
    let mut helper = pool.acquire();
    helper.sort(rec)
}

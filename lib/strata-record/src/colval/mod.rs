//! Column value buffers.

use crate::{NilCount, ValueKind};

pub(crate) mod bitmap;

/// Packed storage for the values of a single column across all rows of a record.
///
/// Values are packed back-to-back in `val`, with null rows taking up no space. Fixed-width values (integers, floats,
/// booleans) use their native-endian byte representation, one byte per boolean. Variable-length values are
/// concatenated in row order, and `offset` records where each row (null or not) starts within `val`.
///
/// Whether a row holds a value or is null is tracked by a validity bitmap, with one bit per row: 1 for present, 0 for
/// null. The bitmap is authoritative: an empty string and a null both take up zero bytes in `val`, and only the bitmap
/// tells them apart. Logical row 0 maps to bit `bitmap_offset`, which lets a buffer start partway into a byte.
///
/// `ColVal` does not know the type of its values. Callers supply the [`ValueKind`] wherever the layout matters, and are
/// responsible for only appending values of one kind to a given buffer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColVal {
    val: Vec<u8>,
    offset: Vec<u32>,
    bitmap: Vec<u8>,
    bitmap_offset: usize,
    len: usize,
    nil_count: usize,
}

impl ColVal {
    /// Creates an empty `ColVal`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `ColVal` directly from its raw parts.
    ///
    /// No consistency checks are performed here. [`Record::validate`][crate::Record::validate] checks that the value
    /// buffer and offset table agree with the row and null counts.
    pub fn from_parts(
        val: Vec<u8>, offset: Vec<u32>, bitmap: Vec<u8>, bitmap_offset: usize, len: usize, nil_count: usize,
    ) -> Self {
        Self {
            val,
            offset,
            bitmap,
            bitmap_offset,
            len,
            nil_count,
        }
    }

    /// Returns the number of rows, including null rows.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of null rows.
    pub fn nil_count(&self) -> usize {
        self.nil_count
    }

    /// Returns the packed value bytes.
    pub fn val(&self) -> &[u8] {
        &self.val
    }

    /// Returns the per-row start positions into the value bytes.
    ///
    /// Only populated for variable-length columns.
    pub fn offsets(&self) -> &[u32] {
        &self.offset
    }

    /// Returns the validity bitmap.
    pub fn bitmap(&self) -> &[u8] {
        &self.bitmap
    }

    /// Returns the bit position in the bitmap at which row 0 starts.
    pub fn bitmap_offset(&self) -> usize {
        self.bitmap_offset
    }

    /// Returns `true` if the given row is null.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds of the bitmap.
    pub fn is_nil(&self, row: usize) -> bool {
        !bitmap::is_set(&self.bitmap, self.bitmap_offset + row)
    }

    /// Removes all rows, retaining allocated capacity.
    pub fn clear(&mut self) {
        self.val.clear();
        self.offset.clear();
        self.bitmap.clear();
        self.bitmap_offset = 0;
        self.len = 0;
        self.nil_count = 0;
    }

    fn push_row(&mut self, present: bool) {
        bitmap::put(&mut self.bitmap, self.bitmap_offset + self.len, present);
        self.len += 1;
        if !present {
            self.nil_count += 1;
        }
    }

    /// Appends a signed integer.
    pub fn append_integer(&mut self, v: i64) {
        self.val.extend_from_slice(&v.to_ne_bytes());
        self.push_row(true);
    }

    /// Appends multiple signed integers.
    pub fn append_integers(&mut self, values: &[i64]) {
        self.val.reserve(values.len() * 8);
        for v in values {
            self.append_integer(*v);
        }
    }

    /// Appends an unsigned integer.
    pub fn append_unsigned(&mut self, v: u64) {
        self.val.extend_from_slice(&v.to_ne_bytes());
        self.push_row(true);
    }

    /// Appends a float.
    pub fn append_float(&mut self, v: f64) {
        self.val.extend_from_slice(&v.to_ne_bytes());
        self.push_row(true);
    }

    /// Appends multiple floats.
    pub fn append_floats(&mut self, values: &[f64]) {
        self.val.reserve(values.len() * 8);
        for v in values {
            self.append_float(*v);
        }
    }

    /// Appends a boolean.
    pub fn append_boolean(&mut self, v: bool) {
        self.val.push(u8::from(v));
        self.push_row(true);
    }

    /// Appends a string.
    ///
    /// An empty string is a present value, distinct from a null.
    pub fn append_string<S: AsRef<[u8]>>(&mut self, v: S) {
        self.offset.push(self.val.len() as u32);
        self.val.extend_from_slice(v.as_ref());
        self.push_row(true);
    }

    /// Appends a null to an integer column.
    pub fn append_integer_null(&mut self) {
        self.push_row(false);
    }

    /// Appends a null to a float column.
    pub fn append_float_null(&mut self) {
        self.push_row(false);
    }

    /// Appends a null to a boolean column.
    pub fn append_boolean_null(&mut self) {
        self.push_row(false);
    }

    /// Appends a null to a string column.
    ///
    /// The null row is given an offset equal to the current length of the value bytes, so it shares its start
    /// position with whichever row is appended next.
    pub fn append_string_null(&mut self) {
        self.offset.push(self.val.len() as u32);
        self.push_row(false);
    }

    /// Appends a null to a column of the given kind.
    pub fn append_null(&mut self, kind: ValueKind) {
        match kind {
            ValueKind::String => self.append_string_null(),
            ValueKind::Integer | ValueKind::Float | ValueKind::Boolean => self.push_row(false),
        }
    }

    /// Appends the rows `[start, end)` of `src` to this buffer.
    ///
    /// `nil_count` must be the null-count index of `src`, as built by [`NilCount::fill_from`]. It is used to translate
    /// the logical row range into the physical range of packed values, skipping over null rows. An index with a total
    /// of zero means `src` has no nulls, and the row range is used as-is.
    ///
    /// Value bytes are copied in a single operation for the whole range, offsets are rebased onto this buffer's value
    /// bytes for variable-length columns, and the matching validity bits are copied across.
    ///
    /// # Panics
    ///
    /// Panics if `end` is greater than the number of rows in `src`.
    pub fn append_with_nil_count(
        &mut self, src: &ColVal, kind: ValueKind, start: usize, end: usize, nil_count: &NilCount,
    ) {
        if end <= start || src.len == 0 {
            return;
        }

        let (phys_start, phys_end) = nil_count.physical_range(start, end);
        match kind {
            ValueKind::String => self.append_string_range(src, start, end),
            ValueKind::Integer | ValueKind::Float | ValueKind::Boolean => {
                let size = kind.size();
                self.val
                    .extend_from_slice(&src.val[phys_start * size..phys_end * size]);
            }
        }

        bitmap::append(
            &mut self.bitmap,
            self.bitmap_offset + self.len,
            &src.bitmap,
            src.bitmap_offset + start,
            src.bitmap_offset + end,
        );

        let rows = end - start;
        self.len += rows;
        self.nil_count += rows - (phys_end - phys_start);
    }

    fn append_string_range(&mut self, src: &ColVal, start: usize, end: usize) {
        let src_start = src.offset[start] as usize;
        let src_end = if end < src.len {
            src.offset[end] as usize
        } else {
            src.val.len()
        };

        let base = self.val.len();
        self.offset.extend(
            src.offset[start..end]
                .iter()
                .map(|&o| (base + o as usize - src_start) as u32),
        );
        self.val.extend_from_slice(&src.val[src_start..src_end]);
    }

    /// Removes the most recently appended row.
    ///
    /// Does nothing if the buffer is empty.
    pub(crate) fn delete_last(&mut self, kind: ValueKind) {
        if self.len == 0 {
            return;
        }

        let row = self.len - 1;
        let was_nil = self.is_nil(row);

        bitmap::put(&mut self.bitmap, self.bitmap_offset + row, false);
        self.len -= 1;
        self.bitmap
            .truncate(bitmap::bytes_for(self.bitmap_offset + self.len));

        match kind {
            ValueKind::String => {
                if let Some(start) = self.offset.pop() {
                    self.val.truncate(start as usize);
                }
            }
            ValueKind::Integer | ValueKind::Float | ValueKind::Boolean => {
                if !was_nil {
                    self.val.truncate(self.val.len() - kind.size());
                }
            }
        }

        if was_nil {
            self.nil_count -= 1;
        }
    }

    // Maps a logical row to the index of its packed value, or `None` if the row is null or out of bounds.
    //
    // Counts the present rows before `row` a byte at a time. Bulk readers should go through `NilCount` instead.
    fn value_index(&self, row: usize) -> Option<usize> {
        if row >= self.len || self.is_nil(row) {
            return None;
        }
        if self.nil_count == 0 {
            return Some(row);
        }

        Some(bitmap::count_set(
            &self.bitmap,
            self.bitmap_offset,
            self.bitmap_offset + row,
        ))
    }

    fn fixed_8(&self, row: usize) -> Option<[u8; 8]> {
        let i = self.value_index(row)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.val[i * 8..(i + 1) * 8]);
        Some(raw)
    }

    /// Returns the signed integer at the given row, or `None` if the row is null or out of bounds.
    ///
    /// On a column with nulls, locating the value means counting the present rows before it, which is linear in `row`.
    /// To read every value, use [`integer_values`][Self::integer_values].
    pub fn integer_value(&self, row: usize) -> Option<i64> {
        self.fixed_8(row).map(i64::from_ne_bytes)
    }

    /// Returns the unsigned integer at the given row, or `None` if the row is null or out of bounds.
    pub fn unsigned_value(&self, row: usize) -> Option<u64> {
        self.fixed_8(row).map(u64::from_ne_bytes)
    }

    /// Returns the float at the given row, or `None` if the row is null or out of bounds.
    pub fn float_value(&self, row: usize) -> Option<f64> {
        self.fixed_8(row).map(f64::from_ne_bytes)
    }

    /// Returns the boolean at the given row, or `None` if the row is null or out of bounds.
    pub fn boolean_value(&self, row: usize) -> Option<bool> {
        self.value_index(row).map(|i| self.val[i] != 0)
    }

    /// Returns the string bytes at the given row, or `None` if the row is null or out of bounds.
    pub fn string_value(&self, row: usize) -> Option<&[u8]> {
        if row >= self.len || self.is_nil(row) {
            return None;
        }

        let start = self.offset[row] as usize;
        let end = self
            .offset
            .get(row + 1)
            .map_or(self.val.len(), |&o| o as usize);
        Some(&self.val[start..end])
    }

    /// Returns an iterator over the packed signed integers, skipping null rows.
    pub fn integer_values(&self) -> impl Iterator<Item = i64> + '_ {
        self.val.chunks_exact(8).map(|chunk| i64::from_ne_bytes(to_array(chunk)))
    }

    /// Returns an iterator over the packed floats, skipping null rows.
    pub fn float_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.val.chunks_exact(8).map(|chunk| f64::from_ne_bytes(to_array(chunk)))
    }
}

fn to_array(chunk: &[u8]) -> [u8; 8] {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(chunk);
    raw
}

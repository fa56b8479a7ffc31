use snafu::ensure;
use tracing::debug;

use crate::{colval::bitmap, error::*, ColVal, Field, FieldType, Schemas};

/// A batch of rows stored column by column.
///
/// A record holds one [`ColVal`] per schema field, in schema order. The last field is always the `time` field, holding
/// the timestamp of each row.
///
/// Records are assembled by appending to each column in turn, and are only considered well-formed once every column
/// holds the same number of rows. [`Record::validate`] checks this, along with the other structural invariants, and must
/// pass before a record is serialized.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Record {
    schema: Schemas,
    col_vals: Vec<ColVal>,
}

impl Record {
    /// Creates a new, empty `Record` with the given schema.
    pub fn new(schema: Schemas) -> Self {
        let col_vals = std::iter::repeat_with(ColVal::new).take(schema.len()).collect();
        Self { schema, col_vals }
    }

    /// Creates a `Record` from a schema and its column buffers.
    ///
    /// The record is not validated.
    pub fn from_parts(schema: Schemas, col_vals: Vec<ColVal>) -> Self {
        Self { schema, col_vals }
    }

    /// Consumes the record, returning its schema and column buffers.
    pub fn into_parts(self) -> (Schemas, Vec<ColVal>) {
        (self.schema, self.col_vals)
    }

    /// Clears all columns and adopts the given schema, reusing existing buffers where possible.
    pub fn reset_with_schema(&mut self, schema: &Schemas) {
        self.schema.clone_from(schema);
        self.col_vals.resize_with(schema.len(), ColVal::new);
        self.clear();
    }

    /// Clears all columns, retaining the schema and allocated capacity.
    pub fn clear(&mut self) {
        for col in &mut self.col_vals {
            col.clear();
        }
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Schemas {
        &self.schema
    }

    /// Returns all column buffers, in schema order.
    pub fn columns(&self) -> &[ColVal] {
        &self.col_vals
    }

    /// Returns the column buffer at the given position.
    pub fn column(&self, i: usize) -> Option<&ColVal> {
        self.col_vals.get(i)
    }

    /// Returns a mutable reference to the column buffer at the given position.
    pub fn column_mut(&mut self, i: usize) -> Option<&mut ColVal> {
        self.col_vals.get_mut(i)
    }

    /// Returns the position of the field with the given name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.schema.field_index(name)
    }

    /// Returns the column buffer for the field with the given name.
    pub fn column_by_name(&self, name: &str) -> Option<&ColVal> {
        self.schema.field_index(name).and_then(|i| self.col_vals.get(i))
    }

    /// Returns a mutable reference to the column buffer for the field with the given name.
    pub fn column_by_name_mut(&mut self, name: &str) -> Option<&mut ColVal> {
        self.schema.field_index(name).and_then(|i| self.col_vals.get_mut(i))
    }

    /// Returns the number of columns.
    pub fn column_count(&self) -> usize {
        self.col_vals.len()
    }

    fn time_column(&self) -> Option<&ColVal> {
        self.col_vals.last()
    }

    /// Returns the number of rows, as given by the time column.
    ///
    /// Returns zero if the record has no columns.
    pub fn row_nums(&self) -> usize {
        self.time_column().map_or(0, ColVal::len)
    }

    /// Returns an iterator over the row timestamps.
    pub fn times(&self) -> impl Iterator<Item = i64> + '_ {
        self.time_column().into_iter().flat_map(ColVal::integer_values)
    }

    /// Appends timestamps to the time column.
    ///
    /// Only the time column is touched. Other columns must be appended to separately so that all columns end up with
    /// the same number of rows.
    pub fn append_time(&mut self, times: &[i64]) {
        if let Some(col) = self.col_vals.last_mut() {
            col.append_integers(times);
        }
    }

    /// Validates the record's structure.
    ///
    /// If the fields other than `time` are not in ascending name order, they are reordered in place, together with
    /// their column buffers.
    ///
    /// # Errors
    ///
    /// If the record is malformed, an error is returned describing the first problem found. A record is malformed if:
    ///
    /// - the number of columns differs from the number of fields
    /// - there are fewer than two fields
    /// - the last field is not an integer field named `time`
    /// - the time column contains nulls
    /// - any two fields share a name
    /// - any column has a different number of rows than the time column
    /// - the value bytes of a fixed-width column do not match its number of non-null rows
    /// - the bitmap of any column does not cover every row, or marks a different number of nulls than the column's
    ///   null count
    /// - the offset table of a variable-length column does not have one entry per row, decreases, or points past the
    ///   end of the value buffer
    pub fn validate(&mut self) -> Result<(), RecordError> {
        let columns = self.col_vals.len();
        ensure!(
            self.schema.len() == columns,
            ColumnCountMismatch {
                schema: self.schema.len(),
                columns,
            }
        );
        ensure!(columns >= 2, TooFewColumns { columns });

        let time_idx = columns - 1;
        let time_field = &self.schema[time_idx];
        ensure!(
            time_field.is_time(),
            MissingTimeField {
                name: time_field.name.as_str(),
            }
        );
        ensure!(
            time_field.ty == FieldType::Int,
            InvalidTimeFieldType { ty: time_field.ty }
        );

        let time_col = &self.col_vals[time_idx];
        ensure!(
            time_col.nil_count() == 0,
            TimeColumnHasNulls {
                nil_count: time_col.nil_count(),
            }
        );

        let rows = time_col.len();
        let mut ordered = true;
        for (i, (field, col)) in self.schema.iter().zip(&self.col_vals).enumerate() {
            ensure!(
                col.len() == rows,
                RowCountMismatch {
                    field: field.name.as_str(),
                    expected: rows,
                    actual: col.len(),
                }
            );
            check_column_length(field, col)?;

            if i > 0 && i < time_idx && self.schema[i - 1].name >= field.name {
                ordered = false;
            }
        }

        if !ordered {
            debug!(columns, "Reordering record columns by field name.");
            self.sort_columns_by_name();
        }

        // After ordering, any duplicate names are adjacent.
        for pair in self.schema[..time_idx].windows(2) {
            ensure!(
                pair[0].name != pair[1].name,
                DuplicateField {
                    name: pair[0].name.as_str(),
                }
            );
        }
        if let Some(field) = self.schema[..time_idx].iter().find(|field| field.is_time()) {
            return DuplicateField {
                name: field.name.as_str(),
            }
            .fail();
        }

        Ok(())
    }

    // Stable sort of every column but the last by field name, keeping each field paired with its buffer.
    fn sort_columns_by_name(&mut self) {
        let time_idx = self.col_vals.len() - 1;

        let mut pairs = self
            .schema
            .fields_mut()
            .drain(..time_idx)
            .zip(self.col_vals.drain(..time_idx))
            .collect::<Vec<_>>();
        pairs.sort_by(|a, b| a.0.name.cmp(&b.0.name));

        let (fields, col_vals): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        self.schema.fields_mut().splice(0..0, fields);
        self.col_vals.splice(0..0, col_vals);
    }
}

// Checks that a column's buffers agree with its row and null counts, so that reading any row stays in bounds.
pub(crate) fn check_column_length(field: &Field, col: &ColVal) -> Result<(), RecordError> {
    let needed = col.bitmap_offset() + col.len();
    ensure!(
        bitmap::bytes_for(needed) <= col.bitmap().len(),
        BitmapTooShort {
            field: field.name.as_str(),
            needed,
            available: col.bitmap().len() * 8,
        }
    );

    let present = bitmap::count_set(col.bitmap(), col.bitmap_offset(), needed);
    let actual = col.len() - present;
    ensure!(
        col.nil_count() == actual,
        InvalidNilCount {
            field: field.name.as_str(),
            nil_count: col.nil_count(),
            actual,
        }
    );

    match field.ty.fixed_size() {
        Some(size) => {
            let expected = size * present;
            ensure!(
                col.val().len() == expected,
                InvalidColumnLength {
                    field: field.name.as_str(),
                    expected,
                    actual: col.val().len(),
                }
            );
        }
        None if matches!(field.ty, FieldType::String | FieldType::Tag) => {
            let offsets = col.offsets();
            ensure!(
                offsets.len() == col.len(),
                InvalidOffsetCount {
                    field: field.name.as_str(),
                    expected: col.len(),
                    actual: offsets.len(),
                }
            );

            let val_len = col.val().len();
            let in_bounds = offsets.windows(2).all(|w| w[0] <= w[1])
                && offsets.last().map_or(true, |&last| last as usize <= val_len);
            ensure!(
                in_bounds,
                InvalidOffsets {
                    field: field.name.as_str(),
                    val_len,
                }
            );
        }
        None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TIME_FIELD;

    fn schema(fields: &[(&str, FieldType)]) -> Schemas {
        fields.iter().map(|(name, ty)| Field::new(*name, *ty)).collect()
    }

    fn cpu_record() -> Record {
        let mut rec = Record::new(schema(&[
            ("host", FieldType::Tag),
            ("usage", FieldType::Float),
            (TIME_FIELD, FieldType::Int),
        ]));

        let host = rec.column_mut(0).unwrap();
        host.append_string("a");
        host.append_string_null();

        let usage = rec.column_mut(1).unwrap();
        usage.append_float(0.5);
        usage.append_float(0.75);

        rec.append_time(&[100, 200]);
        rec
    }

    #[test]
    fn valid_record() {
        let mut rec = cpu_record();
        let before = rec.clone();

        rec.validate().expect("record should be valid");
        assert_eq!(rec, before);
        assert_eq!(rec.row_nums(), 2);
        assert_eq!(rec.times().collect::<Vec<_>>(), vec![100, 200]);
    }

    #[test]
    fn row_nums_without_columns() {
        let rec = Record::default();
        assert_eq!(rec.row_nums(), 0);
        assert_eq!(rec.times().count(), 0);
    }

    #[test]
    fn reorders_columns_by_name() {
        let mut rec = Record::new(schema(&[
            ("zeta", FieldType::Int),
            ("alpha", FieldType::String),
            ("mid", FieldType::Boolean),
            (TIME_FIELD, FieldType::Int),
        ]));
        rec.column_mut(0).unwrap().append_integer(26);
        rec.column_mut(1).unwrap().append_string("a");
        rec.column_mut(2).unwrap().append_boolean(true);
        rec.append_time(&[1]);

        rec.validate().expect("record should be valid");

        let names = rec.schema().iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["alpha", "mid", "zeta", TIME_FIELD]);

        // Buffers moved together with their fields.
        assert_eq!(rec.column_by_name("alpha").unwrap().string_value(0), Some(&b"a"[..]));
        assert_eq!(rec.column_by_name("mid").unwrap().boolean_value(0), Some(true));
        assert_eq!(rec.column_by_name("zeta").unwrap().integer_value(0), Some(26));
    }

    #[test]
    fn too_few_columns() {
        let mut rec = Record::new(schema(&[(TIME_FIELD, FieldType::Int)]));
        assert_eq!(rec.validate(), Err(RecordError::TooFewColumns { columns: 1 }));
    }

    #[test]
    fn column_count_mismatch() {
        let mut rec = Record::from_parts(schema(&[("a", FieldType::Int), (TIME_FIELD, FieldType::Int)]), vec![]);
        assert_eq!(
            rec.validate(),
            Err(RecordError::ColumnCountMismatch { schema: 2, columns: 0 })
        );
    }

    #[test]
    fn missing_time_field() {
        let mut rec = Record::new(schema(&[(TIME_FIELD, FieldType::Int), ("a", FieldType::Int)]));
        assert_eq!(
            rec.validate(),
            Err(RecordError::MissingTimeField { name: "a".to_string() })
        );

        let mut rec = Record::new(schema(&[("a", FieldType::Int), (TIME_FIELD, FieldType::Float)]));
        assert_eq!(
            rec.validate(),
            Err(RecordError::InvalidTimeFieldType { ty: FieldType::Float })
        );
    }

    #[test]
    fn time_column_with_nulls() {
        let mut rec = cpu_record();
        for i in 0..2 {
            let kind = rec.schema()[i].ty.value_kind().unwrap();
            rec.column_mut(i).unwrap().append_null(kind);
        }
        rec.column_mut(2).unwrap().append_integer_null();

        assert_eq!(rec.validate(), Err(RecordError::TimeColumnHasNulls { nil_count: 1 }));
    }

    #[test]
    fn duplicate_fields() {
        // Adjacent.
        let mut rec = Record::new(schema(&[
            ("a", FieldType::Int),
            ("a", FieldType::Int),
            (TIME_FIELD, FieldType::Int),
        ]));
        assert_eq!(
            rec.validate(),
            Err(RecordError::DuplicateField { name: "a".to_string() })
        );

        // Only adjacent once ordered.
        let mut rec = Record::new(schema(&[
            ("b", FieldType::Int),
            ("a", FieldType::Int),
            ("b", FieldType::Float),
            (TIME_FIELD, FieldType::Int),
        ]));
        assert_eq!(
            rec.validate(),
            Err(RecordError::DuplicateField { name: "b".to_string() })
        );

        // A second time field.
        let mut rec = Record::new(schema(&[
            ("a", FieldType::Int),
            (TIME_FIELD, FieldType::Int),
            (TIME_FIELD, FieldType::Int),
        ]));
        assert_eq!(
            rec.validate(),
            Err(RecordError::DuplicateField {
                name: TIME_FIELD.to_string()
            })
        );
    }

    #[test]
    fn row_count_mismatch() {
        let mut rec = cpu_record();
        rec.column_mut(1).unwrap().append_float(1.0);

        assert_eq!(
            rec.validate(),
            Err(RecordError::RowCountMismatch {
                field: "usage".to_string(),
                expected: 2,
                actual: 3,
            })
        );
    }

    #[test]
    fn invalid_fixed_width_length() {
        let (schema, mut col_vals) = cpu_record().into_parts();
        let usage = &col_vals[1];
        let truncated = ColVal::from_parts(usage.val()[..12].to_vec(), vec![], usage.bitmap().to_vec(), 0, 2, 0);
        col_vals[1] = truncated;

        let mut rec = Record::from_parts(schema, col_vals);
        assert_eq!(
            rec.validate(),
            Err(RecordError::InvalidColumnLength {
                field: "usage".to_string(),
                expected: 16,
                actual: 12,
            })
        );
    }

    #[test]
    fn invalid_offset_count() {
        let (schema, mut col_vals) = cpu_record().into_parts();
        let host = &col_vals[0];
        let short_offsets = ColVal::from_parts(host.val().to_vec(), vec![0], host.bitmap().to_vec(), 0, 2, 1);
        col_vals[0] = short_offsets;

        let mut rec = Record::from_parts(schema, col_vals);
        assert_eq!(
            rec.validate(),
            Err(RecordError::InvalidOffsetCount {
                field: "host".to_string(),
                expected: 2,
                actual: 1,
            })
        );
    }

    #[test]
    fn nil_count_must_match_bitmap() {
        // More nulls than rows.
        let (schema, mut col_vals) = cpu_record().into_parts();
        let usage = &col_vals[1];
        col_vals[1] = ColVal::from_parts(vec![], vec![], usage.bitmap().to_vec(), 0, 2, 3);

        let mut rec = Record::from_parts(schema, col_vals);
        assert_eq!(
            rec.validate(),
            Err(RecordError::InvalidNilCount {
                field: "usage".to_string(),
                nil_count: 3,
                actual: 0,
            })
        );

        // A null row that the null count does not account for.
        let (schema, mut col_vals) = cpu_record().into_parts();
        let host = &col_vals[0];
        col_vals[0] = ColVal::from_parts(host.val().to_vec(), host.offsets().to_vec(), host.bitmap().to_vec(), 0, 2, 0);

        let mut rec = Record::from_parts(schema, col_vals);
        assert_eq!(
            rec.validate(),
            Err(RecordError::InvalidNilCount {
                field: "host".to_string(),
                nil_count: 0,
                actual: 1,
            })
        );
    }

    #[test]
    fn bitmap_too_short() {
        let (schema, mut col_vals) = cpu_record().into_parts();
        let usage = &col_vals[1];
        col_vals[1] = ColVal::from_parts(usage.val().to_vec(), vec![], usage.bitmap().to_vec(), 7, 2, 0);

        let mut rec = Record::from_parts(schema, col_vals);
        assert_eq!(
            rec.validate(),
            Err(RecordError::BitmapTooShort {
                field: "usage".to_string(),
                needed: 9,
                available: 8,
            })
        );
    }

    #[test]
    fn offsets_out_of_bounds() {
        let (schema, mut col_vals) = cpu_record().into_parts();
        let host = &col_vals[0];
        col_vals[0] = ColVal::from_parts(host.val().to_vec(), vec![0, 5], host.bitmap().to_vec(), 0, 2, 1);

        let mut rec = Record::from_parts(schema.clone(), col_vals.clone());
        assert_eq!(
            rec.validate(),
            Err(RecordError::InvalidOffsets {
                field: "host".to_string(),
                val_len: 1,
            })
        );

        col_vals[0] = ColVal::from_parts(b"ab".to_vec(), vec![2, 1], vec![0b11], 0, 2, 0);
        let mut rec = Record::from_parts(schema, col_vals);
        assert_eq!(
            rec.validate(),
            Err(RecordError::InvalidOffsets {
                field: "host".to_string(),
                val_len: 2,
            })
        );
    }

    #[test]
    fn reset_with_schema_reuses_buffers() {
        let mut rec = cpu_record();
        let new_schema = schema(&[("v", FieldType::Int), (TIME_FIELD, FieldType::Int)]);

        rec.reset_with_schema(&new_schema);
        assert_eq!(rec.schema(), &new_schema);
        assert_eq!(rec.column_count(), 2);
        assert!(rec.columns().iter().all(ColVal::is_empty));
    }
}

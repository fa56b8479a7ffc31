use snafu::Snafu;
use strata_codec::CodecError;

use crate::FieldType;

/// Record error.
///
/// Returned when a record violates the structural invariants required before it can be sorted or serialized.
#[derive(Debug, Snafu, Eq, PartialEq)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum RecordError {
    /// The record has fewer than two columns.
    ///
    /// Every record needs at least one value column in addition to the time column.
    #[snafu(display("record has {} column(s), but at least 2 are required", columns))]
    TooFewColumns {
        /// Number of columns in the record.
        columns: usize,
    },

    /// The number of column buffers does not match the number of schema fields.
    #[snafu(display("schema has {} field(s), but record has {} column(s)", schema, columns))]
    ColumnCountMismatch {
        /// Number of fields in the schema.
        schema: usize,

        /// Number of column buffers in the record.
        columns: usize,
    },

    /// The last field of the schema is not the time field.
    #[snafu(display("last field must be 'time', found '{}'", name))]
    MissingTimeField {
        /// Name of the last field.
        name: String,
    },

    /// The time field is not an integer field.
    #[snafu(display("time field must be of integer type, found {}", ty.label()))]
    InvalidTimeFieldType {
        /// Type of the time field.
        ty: FieldType,
    },

    /// The time column contains null rows.
    #[snafu(display("time column must not contain nulls, found {} null row(s)", nil_count))]
    TimeColumnHasNulls {
        /// Number of null rows in the time column.
        nil_count: usize,
    },

    /// Two fields share the same name.
    #[snafu(display("duplicate field '{}'", name))]
    DuplicateField {
        /// Name shared by the fields.
        name: String,
    },

    /// A column has a different number of rows than the time column.
    #[snafu(display("column '{}' has {} row(s), expected {}", field, actual, expected))]
    RowCountMismatch {
        /// Name of the column's field.
        field: String,

        /// Number of rows in the time column.
        expected: usize,

        /// Number of rows in the column.
        actual: usize,
    },

    /// The value buffer of a fixed-width column does not match its non-null row count.
    #[snafu(display("column '{}' holds {} value byte(s), expected {}", field, actual, expected))]
    InvalidColumnLength {
        /// Name of the column's field.
        field: String,

        /// Expected length of the value buffer, in bytes.
        expected: usize,

        /// Actual length of the value buffer, in bytes.
        actual: usize,
    },

    /// The offset table of a variable-length column does not have one entry per row.
    #[snafu(display("column '{}' has {} offset(s), expected {}", field, actual, expected))]
    InvalidOffsetCount {
        /// Name of the column's field.
        field: String,

        /// Number of rows in the column.
        expected: usize,

        /// Number of entries in the offset table.
        actual: usize,
    },

    /// The offset table of a variable-length column decreases or points past the end of the value buffer.
    #[snafu(display("column '{}' has offsets outside of its {} value byte(s)", field, val_len))]
    InvalidOffsets {
        /// Name of the column's field.
        field: String,

        /// Length of the value buffer, in bytes.
        val_len: usize,
    },

    /// A column's bitmap is too short to describe all of its rows.
    #[snafu(display("column '{}' bitmap covers {} bit(s), but {} are required", field, available, needed))]
    BitmapTooShort {
        /// Name of the column's field.
        field: String,

        /// Number of bits needed to cover every row.
        needed: usize,

        /// Number of bits held by the bitmap.
        available: usize,
    },

    /// A column's null count does not match the null rows marked in its bitmap.
    #[snafu(display("column '{}' claims {} null row(s), but its bitmap marks {}", field, nil_count, actual))]
    InvalidNilCount {
        /// Name of the column's field.
        field: String,

        /// Null count held by the column.
        nil_count: usize,

        /// Number of null rows marked in the bitmap.
        actual: usize,
    },

    /// A column's field type cannot hold values.
    #[snafu(display("column '{}' has unsupported field type {}", field, ty.label()))]
    UnsupportedFieldType {
        /// Name of the field.
        field: String,

        /// Type of the field.
        ty: FieldType,
    },
}

/// Decode error.
///
/// Returned when a serialized field, column, or record cannot be decoded.
#[derive(Debug, Snafu, Eq, PartialEq)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum DecodeError {
    /// The input could not be read.
    #[snafu(display("failed to decode: {}", source))]
    Codec {
        /// Underlying codec error.
        source: CodecError,
    },

    /// A field carried a type code that does not map to a known field type.
    #[snafu(display("invalid field type code {}", code))]
    InvalidFieldType {
        /// Type code that was read.
        code: u32,
    },

    /// A length or count was negative.
    #[snafu(display("invalid {} value {}", name, value))]
    InvalidCount {
        /// Name of the count.
        name: &'static str,

        /// Value that was read.
        value: i64,
    },

    /// A column's bitmap is too short to describe all of its rows.
    #[snafu(display("bitmap covers {} bit(s), but {} are required", available, needed))]
    InvalidBitmap {
        /// Number of bits needed to cover every row.
        needed: usize,

        /// Number of bits held by the bitmap.
        available: usize,
    },
}

impl From<CodecError> for DecodeError {
    fn from(source: CodecError) -> Self {
        Self::Codec { source }
    }
}

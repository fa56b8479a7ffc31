//! Columnar records of time-series rows.
//!
//! A [`Record`] is a batch of rows stored column by column. Each column is a [`ColVal`]: a packed value buffer, a
//! null bitmap, and (for strings) an offset table. The last column always holds the row timestamps.
//!
//! Records are sorted by time, collapsing rows that share a timestamp, with a [`SortHelper`], and are serialized to
//! and from a compact binary form with [`Record::marshal`] and [`Record::unmarshal`].
#![deny(missing_docs)]

mod colval;
pub use self::colval::ColVal;

mod config;
pub use self::config::SortConfiguration;

mod error;
pub use self::error::{DecodeError, RecordError};

mod field;
pub use self::field::{Field, FieldType, Schemas, ValueKind, TIME_FIELD};

mod marshal;

mod nil_count;
pub use self::nil_count::NilCount;

mod record;
pub use self::record::Record;

pub mod sort;
pub use self::sort::{sort_record, SortHelper, SortHelperPool};

//! Time ordering and duplicate-timestamp resolution for records.

mod helper;
pub use self::helper::{sort_record, SortHelper, SortHelperPool};

mod sort_aux;
pub use self::sort_aux::SortAux;

use std::{
    fmt,
    ops::{Deref, DerefMut},
};

/// Name of the reserved time field, which must be the last field of every schema.
pub const TIME_FIELD: &str = "time";

/// Type of a field.
///
/// The discriminants are the type codes used on the wire.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum FieldType {
    /// Unknown type. Columns of this type cannot hold values.
    #[default]
    Unknown = 0,

    /// Signed 64-bit integer.
    Int = 1,

    /// Unsigned 64-bit integer.
    UInt = 2,

    /// 64-bit floating point.
    Float = 3,

    /// Variable-length string.
    String = 4,

    /// Boolean.
    Boolean = 5,

    /// Variable-length tag value.
    Tag = 6,
}

impl FieldType {
    /// Returns the wire type code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Returns the field type for the given wire type code, if it is known.
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Unknown,
            1 => Self::Int,
            2 => Self::UInt,
            3 => Self::Float,
            4 => Self::String,
            5 => Self::Boolean,
            6 => Self::Tag,
            _ => return None,
        })
    }

    /// Returns a human-readable label for the type.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Int => "integer",
            Self::UInt => "unsigned",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Tag => "tag",
        }
    }

    /// Returns the size, in bytes, of a single value if this is a fixed-width type.
    pub const fn fixed_size(self) -> Option<usize> {
        match self.value_kind() {
            Some(ValueKind::String) | None => None,
            Some(kind) => Some(kind.size()),
        }
    }

    /// Returns how values of this type are laid out in a column buffer.
    ///
    /// Returns `None` for [`FieldType::Unknown`].
    pub const fn value_kind(self) -> Option<ValueKind> {
        match self {
            Self::Int | Self::UInt => Some(ValueKind::Integer),
            Self::Float => Some(ValueKind::Float),
            Self::Boolean => Some(ValueKind::Boolean),
            Self::String | Self::Tag => Some(ValueKind::String),
            Self::Unknown => None,
        }
    }
}

/// Physical layout of values in a column buffer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueKind {
    /// 8-byte integers, signed or unsigned.
    Integer,

    /// 8-byte floats.
    Float,

    /// 1-byte booleans.
    Boolean,

    /// Variable-length byte strings, addressed through an offset table.
    String,
}

impl ValueKind {
    /// Returns the size, in bytes, of a single value.
    ///
    /// Variable-length values have no fixed size and return zero.
    pub const fn size(self) -> usize {
        match self {
            Self::Integer | Self::Float => 8,
            Self::Boolean => 1,
            Self::String => 0,
        }
    }
}

/// A named, typed column.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Field {
    /// Field name.
    pub name: String,

    /// Field type.
    pub ty: FieldType,
}

impl Field {
    /// Creates a new `Field`.
    pub fn new<S: Into<String>>(name: S, ty: FieldType) -> Self {
        Self { name: name.into(), ty }
    }

    /// Creates the reserved time field.
    pub fn time() -> Self {
        Self::new(TIME_FIELD, FieldType::Int)
    }

    /// Returns `true` if this is the reserved time field.
    pub fn is_time(&self) -> bool {
        self.name == TIME_FIELD
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.ty.label())
    }
}

/// An ordered set of fields.
///
/// Field order defines which column buffer of a record belongs to which field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Schemas(Vec<Field>);

impl Schemas {
    /// Creates an empty `Schemas`.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a field.
    pub fn push(&mut self, field: Field) {
        self.0.push(field);
    }

    /// Returns the position of the field with the given name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|field| field.name == name)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Vec<Field> {
        &mut self.0
    }

    /// Consumes the schema, returning its fields.
    pub fn into_inner(self) -> Vec<Field> {
        self.0
    }
}

impl Deref for Schemas {
    type Target = [Field];

    fn deref(&self) -> &[Field] {
        &self.0
    }
}

impl DerefMut for Schemas {
    fn deref_mut(&mut self) -> &mut [Field] {
        &mut self.0
    }
}

impl From<Vec<Field>> for Schemas {
    fn from(fields: Vec<Field>) -> Self {
        Self(fields)
    }
}

impl FromIterator<Field> for Schemas {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

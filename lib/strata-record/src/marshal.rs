//! Wire encoding of fields, column buffers, and records.
//!
//! ```text
//! Field:  name (u16-prefixed string) | type code (u32)
//! ColVal: len (i64) | nil count (i64) | bitmap offset (i64) | val (u32-prefixed bytes)
//!         | bitmap (u32-prefixed bytes) | offsets (u32-prefixed u32 slice)
//! Record: field count (u32) | { size (u32) | field }* | column count (u32) | { size (u32) | column }*
//! ```
//!
//! Every field and column inside a record is prefixed with its encoded size, so a reader can skip entries it does not
//! need without decoding them.

use bytes::{BufMut, Bytes, BytesMut};
use snafu::OptionExt as _;
use strata_codec::{put_bytes, put_i64, put_len, put_sized, put_string, put_u32, put_u32_slice, CodecError, Decoder};

use crate::{colval::bitmap, error::*, ColVal, Field, FieldType, Record, Schemas};

impl Field {
    /// Encodes the field into the given buffer.
    ///
    /// # Errors
    ///
    /// If the field name is longer than `u16::MAX` bytes, an error is returned.
    pub fn marshal<B: BufMut>(&self, buf: &mut B) -> Result<(), CodecError> {
        put_string(buf, self.name.as_bytes())?;
        put_u32(buf, self.ty.code());
        Ok(())
    }

    /// Decodes a field from the given bytes.
    ///
    /// # Errors
    ///
    /// If the bytes are truncated, the name is not valid UTF-8, or the type code is unknown, an error is returned.
    pub fn unmarshal(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(&mut Decoder::new(buf))
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let name = decoder.str()?;
        let code = decoder.u32()?;
        let ty = FieldType::from_code(code).context(InvalidFieldType { code })?;

        Ok(Field::new(name, ty))
    }
}

impl ColVal {
    /// Encodes the column buffer into the given buffer.
    ///
    /// # Errors
    ///
    /// If any of the underlying buffers is too long to be length-prefixed, an error is returned.
    pub fn marshal<B: BufMut>(&self, buf: &mut B) -> Result<(), CodecError> {
        put_i64(buf, self.len() as i64);
        put_i64(buf, self.nil_count() as i64);
        put_i64(buf, self.bitmap_offset() as i64);
        put_bytes(buf, self.val())?;
        put_bytes(buf, self.bitmap())?;
        put_u32_slice(buf, self.offsets())
    }

    /// Decodes a column buffer from the given bytes.
    ///
    /// # Errors
    ///
    /// If the bytes are truncated, carry negative counts, claim more nulls than rows, or carry a bitmap too short for
    /// the row count, an error is returned.
    pub fn unmarshal(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(&mut Decoder::new(buf))
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let len = decode_count(decoder, "len")?;
        let nil_count = decode_count(decoder, "nil count")?;
        let bitmap_offset = decode_count(decoder, "bitmap offset")?;
        let val = decoder.bytes()?.to_vec();
        let bitmap = decoder.bytes()?.to_vec();
        let offset = decoder.u32_slice()?;

        if nil_count > len {
            return InvalidCount {
                name: "nil count",
                value: nil_count as i64,
            }
            .fail();
        }

        // Row lookups index straight into the bitmap, so it has to cover every row.
        let needed = bitmap_offset.saturating_add(len);
        let available = bitmap.len().saturating_mul(8);
        if bitmap::bytes_for(needed) > bitmap.len() {
            return InvalidBitmap { needed, available }.fail();
        }

        Ok(ColVal::from_parts(val, offset, bitmap, bitmap_offset, len, nil_count))
    }
}

fn decode_count(decoder: &mut Decoder<'_>, name: &'static str) -> Result<usize, DecodeError> {
    let value = decoder.i64()?;
    usize::try_from(value).ok().context(InvalidCount { name, value })
}

impl Record {
    /// Encodes the record into the given buffer.
    ///
    /// The record should be validated first. Encoding does not check the record's invariants.
    ///
    /// # Errors
    ///
    /// If any field or column is too large to be length-prefixed, an error is returned. The buffer is left with any
    /// entries encoded before the failing one.
    pub fn marshal(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        put_len(buf, self.schema().len())?;
        for field in self.schema().iter() {
            put_sized(buf, |buf| field.marshal(buf))?;
        }

        put_len(buf, self.column_count())?;
        for col in self.columns() {
            put_sized(buf, |buf| col.marshal(buf))?;
        }

        Ok(())
    }

    /// Encodes the record into a new buffer.
    ///
    /// # Errors
    ///
    /// See [`Record::marshal`].
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::new();
        self.marshal(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decodes a record from the given bytes.
    ///
    /// The decoded record is not validated.
    ///
    /// # Errors
    ///
    /// If the bytes are truncated or any field or column fails to decode, an error is returned.
    pub fn unmarshal(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(buf);

        let field_count = decoder.u32()?;
        let mut schema = Schemas::new();
        for _ in 0..field_count {
            schema.push(Field::decode(&mut decoder.sized()?)?);
        }

        let col_count = decoder.u32()?;
        let mut col_vals = Vec::new();
        for _ in 0..col_count {
            col_vals.push(ColVal::decode(&mut decoder.sized()?)?);
        }

        Ok(Record::from_parts(schema, col_vals))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::TIME_FIELD;

    #[test]
    fn field_layout() {
        let mut buf = Vec::new();
        Field::new("cpu", FieldType::Float).marshal(&mut buf).unwrap();

        assert_eq!(buf, vec![0, 3, b'c', b'p', b'u', 0, 0, 0, 3]);
        assert_eq!(Field::unmarshal(&buf).unwrap(), Field::new("cpu", FieldType::Float));
    }

    #[test]
    fn unknown_type_code() {
        let buf = [0, 1, b'x', 0, 0, 0, 42];
        assert_eq!(Field::unmarshal(&buf), Err(DecodeError::InvalidFieldType { code: 42 }));
    }

    #[test]
    fn colval_layout() {
        let mut col = ColVal::new();
        col.append_string("hi");
        col.append_string_null();

        let mut buf = Vec::new();
        col.marshal(&mut buf).unwrap();

        let mut expected = vec![];
        expected.extend_from_slice(&4u64.to_be_bytes()); // len 2, zig-zag mapped
        expected.extend_from_slice(&2u64.to_be_bytes()); // nil count 1
        expected.extend_from_slice(&0u64.to_be_bytes()); // bitmap offset 0
        expected.extend_from_slice(&[0, 0, 0, 2, b'h', b'i']);
        expected.extend_from_slice(&[0, 0, 0, 1, 0b01]);
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.extend_from_slice(&0u32.to_ne_bytes());
        expected.extend_from_slice(&2u32.to_ne_bytes());
        assert_eq!(buf, expected);

        assert_eq!(ColVal::unmarshal(&buf).unwrap(), col);
    }

    #[test]
    fn colval_negative_count() {
        let mut buf = Vec::new();
        put_i64(&mut buf, -1);
        assert_eq!(
            ColVal::unmarshal(&buf),
            Err(DecodeError::InvalidCount { name: "len", value: -1 })
        );
    }

    #[test]
    fn colval_more_nulls_than_rows() {
        let col = ColVal::from_parts(vec![], vec![], vec![0], 0, 2, 3);
        let mut buf = Vec::new();
        col.marshal(&mut buf).unwrap();

        assert_eq!(
            ColVal::unmarshal(&buf),
            Err(DecodeError::InvalidCount {
                name: "nil count",
                value: 3
            })
        );
    }

    #[test]
    fn colval_short_bitmap() {
        let col = ColVal::from_parts(vec![], vec![], vec![0], 0, 9, 9);
        let mut buf = Vec::new();
        col.marshal(&mut buf).unwrap();

        assert_eq!(
            ColVal::unmarshal(&buf),
            Err(DecodeError::InvalidBitmap { needed: 9, available: 8 })
        );
    }

    #[test]
    fn record_entries_are_size_prefixed() {
        let mut rec = Record::new(Schemas::from(vec![Field::new("v", FieldType::Int), Field::time()]));
        rec.column_mut(0).unwrap().append_integer(1);
        rec.append_time(&[10]);

        let buf = rec.to_bytes().unwrap();

        // Skip straight past the schema using the entry sizes alone.
        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.u32().unwrap(), 2);
        for _ in 0..2 {
            decoder.sized().unwrap();
        }
        assert_eq!(decoder.u32().unwrap(), 2);

        decoder.sized().unwrap();
        let mut time_col = decoder.sized().unwrap();
        assert!(decoder.is_empty());
        assert_eq!(ColVal::decode(&mut time_col).unwrap(), rec.columns()[1]);
    }

    #[test]
    fn truncated_record() {
        let mut rec = Record::new(Schemas::from(vec![Field::new("v", FieldType::Int), Field::time()]));
        rec.column_mut(0).unwrap().append_integer(1);
        rec.append_time(&[10]);
        let buf = rec.to_bytes().unwrap();

        for len in 0..buf.len() {
            assert!(Record::unmarshal(&buf[..len]).is_err(), "truncated at {}", len);
        }
    }

    #[derive(Clone, Debug)]
    enum Value {
        Int(i64),
        Float(f64),
        Bool(bool),
        Str(String),
    }

    fn column(ty: FieldType, rows: usize) -> impl Strategy<Value = Vec<Option<Value>>> {
        let value = match ty {
            FieldType::Int => any::<i64>().prop_map(Value::Int).boxed(),
            FieldType::Float => any::<f64>().prop_map(Value::Float).boxed(),
            FieldType::Boolean => any::<bool>().prop_map(Value::Bool).boxed(),
            _ => "[a-z0-9]{0,8}".prop_map(Value::Str).boxed(),
        };
        prop::collection::vec(prop::option::of(value), rows)
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        let types = prop::collection::vec(
            prop::sample::select(vec![
                FieldType::Int,
                FieldType::Float,
                FieldType::Boolean,
                FieldType::String,
                FieldType::Tag,
            ]),
            1..5,
        );

        (types, 0usize..20)
            .prop_flat_map(|(types, rows)| {
                let columns = types.iter().map(|ty| column(*ty, rows)).collect::<Vec<_>>();
                let times = prop::collection::vec(any::<i64>(), rows);
                (Just(types), columns, times)
            })
            .prop_map(|(types, columns, times)| {
                let mut schema = types
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| Field::new(format!("f{}", i), *ty))
                    .collect::<Schemas>();
                schema.push(Field::new(TIME_FIELD, FieldType::Int));

                let mut rec = Record::new(schema);
                for (i, values) in columns.iter().enumerate() {
                    let col = rec.column_mut(i).unwrap();
                    for value in values {
                        match value {
                            Some(Value::Int(v)) => col.append_integer(*v),
                            Some(Value::Float(v)) => col.append_float(*v),
                            Some(Value::Bool(v)) => col.append_boolean(*v),
                            Some(Value::Str(v)) => col.append_string(v),
                            None => col.append_null(types[i].value_kind().unwrap()),
                        }
                    }
                }
                rec.append_time(&times);
                rec
            })
    }

    proptest! {
        #[test]
        fn property_test_record_roundtrip(mut rec in arb_record()) {
            rec.validate().unwrap();

            let buf = rec.to_bytes().unwrap();
            let decoded = Record::unmarshal(&buf).unwrap();
            prop_assert_eq!(decoded, rec);
        }

        #[test]
        fn property_test_field_roundtrip(name in "[a-z_]{0,32}", code in 0u32..=6) {
            let field = Field::new(name, FieldType::from_code(code).unwrap());

            let mut buf = Vec::new();
            field.marshal(&mut buf).unwrap();
            prop_assert_eq!(Field::unmarshal(&buf).unwrap(), field);
        }
    }
}

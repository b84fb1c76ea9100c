//! Generic record serializer.
//!
//! Grounded on the original's `DbRecordSerializer<DbRecord<Args...>>`: every
//! static (fixed-width) field is packed into one contiguous run first, then
//! every dynamic (length-prefixed) field follows in declared order. The
//! algorithm itself is schema-agnostic — it's written once here instead of
//! once per user record type, walking `R::Schema::FIELDS` at runtime
//! (the field layout itself is fixed at compile time by the schema).

use crate::io::StorageIo;
use fieldstore_core::{Error, FieldValue, Record, RecordSchema, Result, ScalarType};

pub struct RecordCodec;

impl RecordCodec {
    pub fn serialize<R: Record, IO: StorageIo>(record: &R, io: &mut IO) -> Result<()> {
        for field in R::Schema::FIELDS.iter().filter(|f| f.is_static()) {
            let value = record
                .get(field.id)
                .ok_or(Error::UnknownField(field.id))?;
            write_scalar(io, &value)?;
        }

        for field in R::Schema::FIELDS.iter().filter(|f| !f.is_static()) {
            let value = record
                .get(field.id)
                .ok_or(Error::UnknownField(field.id))?;
            if field.is_array {
                match value {
                    FieldValue::Array(items) => write_array(io, &items)?,
                    other => {
                        return Err(Error::SchemaViolation(format!(
                            "field {} is declared as an array but holds {other:?}",
                            field.id
                        )))
                    }
                }
            } else {
                write_scalar(io, &value)?;
            }
        }

        Ok(())
    }

    pub fn deserialize<R: Record, IO: StorageIo>(io: &mut IO) -> Result<R> {
        let mut record = R::default();

        for field in R::Schema::FIELDS.iter().filter(|f| f.is_static()) {
            let value = read_scalar(io, field.element_type)?;
            record.set(field.id, value)?;
        }

        for field in R::Schema::FIELDS.iter().filter(|f| !f.is_static()) {
            let value = if field.is_array {
                FieldValue::Array(read_array(io, field.element_type)?)
            } else {
                read_scalar(io, field.element_type)?
            };
            record.set(field.id, value)?;
        }

        Ok(record)
    }
}

pub(crate) fn write_scalar<IO: StorageIo>(io: &mut IO, value: &FieldValue) -> Result<()> {
    match value {
        FieldValue::Bool(v) => io.write_bool(*v),
        FieldValue::I8(v) => io.write_i8(*v),
        FieldValue::U8(v) => io.write_u8(*v),
        FieldValue::I16(v) => io.write_i16(*v),
        FieldValue::U16(v) => io.write_u16(*v),
        FieldValue::I32(v) => io.write_i32(*v),
        FieldValue::U32(v) => io.write_u32(*v),
        FieldValue::I64(v) => io.write_i64(*v),
        FieldValue::U64(v) => io.write_u64(*v),
        FieldValue::F32(v) => io.write_f32(*v),
        FieldValue::F64(v) => io.write_f64(*v),
        FieldValue::String(v) => io.write_string(v),
        FieldValue::Array(_) => Err(Error::SchemaViolation(
            "nested arrays are not a scalar value".into(),
        )),
    }
}

pub(crate) fn read_scalar<IO: StorageIo>(io: &mut IO, ty: ScalarType) -> Result<FieldValue> {
    Ok(match ty {
        ScalarType::Bool => FieldValue::Bool(io.read_bool()?),
        ScalarType::I8 => FieldValue::I8(io.read_i8()?),
        ScalarType::U8 => FieldValue::U8(io.read_u8()?),
        ScalarType::I16 => FieldValue::I16(io.read_i16()?),
        ScalarType::U16 => FieldValue::U16(io.read_u16()?),
        ScalarType::I32 => FieldValue::I32(io.read_i32()?),
        ScalarType::U32 => FieldValue::U32(io.read_u32()?),
        ScalarType::I64 => FieldValue::I64(io.read_i64()?),
        ScalarType::U64 => FieldValue::U64(io.read_u64()?),
        ScalarType::F32 => FieldValue::F32(io.read_f32()?),
        ScalarType::F64 => FieldValue::F64(io.read_f64()?),
        ScalarType::String => FieldValue::String(io.read_string()?),
    })
}

pub(crate) fn write_array<IO: StorageIo>(io: &mut IO, items: &[FieldValue]) -> Result<()> {
    io.write_u32(items.len() as u32)?;
    for item in items {
        write_scalar(io, item)?;
    }
    Ok(())
}

pub(crate) fn read_array<IO: StorageIo>(io: &mut IO, element_type: ScalarType) -> Result<Vec<FieldValue>> {
    let count = io.read_u32()? as usize;
    (0..count).map(|_| read_scalar(io, element_type)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::GrowableBufferIo;
    use fieldstore_core::define_record_schema;

    define_record_schema! {
        struct Widget {
            0: id: U32,
            1: weight: F64,
            2: label: String,
            3: tags: Array<String>,
        }
    }

    #[test]
    fn static_fields_precede_dynamic_fields_on_the_wire() {
        let mut w = Widget::default();
        w.id = 7;
        w.weight = 1.5;
        w.label = "gizmo".into();
        w.tags = vec!["a".into(), "b".into()];

        let mut io = GrowableBufferIo::new();
        RecordCodec::serialize(&w, &mut io).unwrap();

        io.seek(0).unwrap();
        assert_eq!(io.read_u32().unwrap(), 7);
        assert_eq!(io.read_f64().unwrap(), 1.5);
    }

    #[test]
    fn serialize_then_deserialize_round_trips_every_field() {
        let mut w = Widget::default();
        w.id = 99;
        w.weight = -2.25;
        w.label = "round-trip".into();
        w.tags = vec!["x".into(), "y".into(), "z".into()];

        let mut io = GrowableBufferIo::new();
        RecordCodec::serialize(&w, &mut io).unwrap();
        io.seek(0).unwrap();
        let decoded: Widget = RecordCodec::deserialize(&mut io).unwrap();

        assert_eq!(decoded, w);
    }

    #[test]
    fn empty_array_round_trips_to_empty_vec() {
        let w = Widget::default();
        let mut io = GrowableBufferIo::new();
        RecordCodec::serialize(&w, &mut io).unwrap();
        io.seek(0).unwrap();
        let decoded: Widget = RecordCodec::deserialize(&mut io).unwrap();
        assert!(decoded.tags.is_empty());
    }
}

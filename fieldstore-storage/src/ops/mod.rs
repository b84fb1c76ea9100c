//! Operation wire format.
//!
//! Grounded on `WAL::Serializer<Record>` (`wal_serializer.hpp`) and the
//! `WAL::OpID`/`OpStatus`/`OperationCompletedMarker` types in
//! `wal_data_types.hpp`. Each [`Operation`] variant has a distinct opcode
//! byte; [`CompletionMarker`] is a sibling wire type, not an `Operation`
//! variant, since it has its own WAL entry lifecycle independent of the
//! operation it completes.

use crate::record_codec::{read_array, read_scalar, write_array, write_scalar, RecordCodec};
use crate::io::StorageIo;
use fieldstore_core::{Error, FieldValue, Record, RecordSchema, Result};

pub type OpId = u32;

/// Marks the outcome an operation ultimately had against the data file,
/// written as a follow-up entry once the mutation has (or hasn't) been
/// applied. Mirrors `WAL::OpStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    Successful = 0xEE,
    Failed = 0x11,
}

impl OpStatus {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0xEE => Ok(OpStatus::Successful),
            0x11 => Ok(OpStatus::Failed),
            other => Err(Error::Corruption(format!(
                "invalid operation status byte: {other:#x}"
            ))),
        }
    }
}

/// Marks that the operation identified by `target_op_id` has completed.
/// Its own wire encoding is `[MARKER_ID][status]`, always 2 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionMarker {
    pub target_op_id: OpId,
    pub status: OpStatus,
}

/// Byte that begins a completion marker's entry payload — mirrors
/// `OperationCompletedMarker::markerID`. Chosen far from any `OpCode` value
/// so a first-byte probe can't confuse the two.
pub const MARKER_ID: u8 = 0xDD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum OpCode {
    Insert = 0,
    Find = 1,
    UpdateFull = 2,
    AppendToArray = 3,
    Delete = 4,
}

impl OpCode {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(OpCode::Insert),
            1 => Ok(OpCode::Find),
            2 => Ok(OpCode::UpdateFull),
            3 => Ok(OpCode::AppendToArray),
            4 => Ok(OpCode::Delete),
            other => Err(Error::Corruption(format!(
                "unknown operation opcode: {other}"
            ))),
        }
    }
}

/// The payload of an `AppendToArray` operation: either a whole new record
/// to insert (when the key isn't present yet) or the array of values to
/// append to the existing record's array field.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendPayload<R> {
    Insert(R),
    Append(Vec<FieldValue>),
}

/// A mutation or query, as it appears in the write-ahead log.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<R> {
    Insert(R),
    Find(Vec<(u8, FieldValue)>),
    UpdateFull {
        key_field_id: u8,
        insert_if_absent: bool,
        record: R,
        key_value: FieldValue,
    },
    AppendToArray {
        key_field_id: u8,
        array_field_id: u8,
        insert_if_absent: bool,
        key_value: FieldValue,
        payload: AppendPayload<R>,
    },
    Delete {
        key_field_id: u8,
        key_value: FieldValue,
    },
}

pub struct OpCodec;

impl OpCodec {
    pub fn encode<R: Record, IO: StorageIo>(op: &Operation<R>, io: &mut IO) -> Result<()> {
        match op {
            Operation::Insert(record) => {
                io.write_u8(OpCode::Insert as u8)?;
                RecordCodec::serialize(record, io)
            }
            Operation::Find(fields) => {
                io.write_u8(OpCode::Find as u8)?;
                io.write_u8(fields.len() as u8)?;
                for (id, _) in fields {
                    io.write_u8(*id)?;
                }
                for (_, value) in fields {
                    write_scalar(io, value)?;
                }
                Ok(())
            }
            Operation::UpdateFull {
                key_field_id,
                insert_if_absent,
                record,
                key_value,
            } => {
                io.write_u8(OpCode::UpdateFull as u8)?;
                io.write_u8(*key_field_id)?;
                io.write_bool(*insert_if_absent)?;
                RecordCodec::serialize(record, io)?;
                write_scalar(io, key_value)
            }
            Operation::AppendToArray {
                key_field_id,
                array_field_id,
                insert_if_absent,
                key_value,
                payload,
            } => {
                io.write_u8(OpCode::AppendToArray as u8)?;
                io.write_u8(*key_field_id)?;
                io.write_u8(*array_field_id)?;
                io.write_bool(*insert_if_absent)?;
                write_scalar(io, key_value)?;
                match payload {
                    AppendPayload::Insert(record) => RecordCodec::serialize(record, io),
                    AppendPayload::Append(values) => write_array(io, values),
                }
            }
            Operation::Delete {
                key_field_id,
                key_value,
            } => {
                io.write_u8(OpCode::Delete as u8)?;
                io.write_u8(*key_field_id)?;
                write_scalar(io, key_value)
            }
        }
    }

    pub fn encode_completion_marker<IO: StorageIo>(
        marker: &CompletionMarker,
        io: &mut IO,
    ) -> Result<()> {
        io.write_u8(MARKER_ID)?;
        io.write_u8(marker.status as u8)
    }

    pub fn decode<R: Record, IO: StorageIo>(io: &mut IO) -> Result<Operation<R>> {
        let opcode = OpCode::from_byte(io.read_u8()?)?;
        match opcode {
            OpCode::Insert => Ok(Operation::Insert(RecordCodec::deserialize(io)?)),
            OpCode::Find => {
                let n = io.read_u8()? as usize;
                let mut ids = Vec::with_capacity(n);
                for _ in 0..n {
                    ids.push(io.read_u8()?);
                }
                let mut fields = Vec::with_capacity(n);
                for id in ids {
                    let desc = R::Schema::field(id).ok_or(Error::UnknownField(id))?;
                    let value = read_scalar(io, desc.element_type)?;
                    fields.push((id, value));
                }
                Ok(Operation::Find(fields))
            }
            OpCode::UpdateFull => {
                let key_field_id = io.read_u8()?;
                let insert_if_absent = io.read_bool()?;
                let record = RecordCodec::deserialize(io)?;
                let desc =
                    R::Schema::field(key_field_id).ok_or(Error::UnknownField(key_field_id))?;
                let key_value = read_scalar(io, desc.element_type)?;
                Ok(Operation::UpdateFull {
                    key_field_id,
                    insert_if_absent,
                    record,
                    key_value,
                })
            }
            OpCode::AppendToArray => {
                let key_field_id = io.read_u8()?;
                let array_field_id = io.read_u8()?;
                let insert_if_absent = io.read_bool()?;
                let key_desc =
                    R::Schema::field(key_field_id).ok_or(Error::UnknownField(key_field_id))?;
                let key_value = read_scalar(io, key_desc.element_type)?;
                let payload = if insert_if_absent {
                    AppendPayload::Insert(RecordCodec::deserialize(io)?)
                } else {
                    let array_desc = R::Schema::field(array_field_id)
                        .ok_or(Error::UnknownField(array_field_id))?;
                    AppendPayload::Append(read_array(io, array_desc.element_type)?)
                };
                Ok(Operation::AppendToArray {
                    key_field_id,
                    array_field_id,
                    insert_if_absent,
                    key_value,
                    payload,
                })
            }
            OpCode::Delete => {
                let key_field_id = io.read_u8()?;
                let desc =
                    R::Schema::field(key_field_id).ok_or(Error::UnknownField(key_field_id))?;
                let key_value = read_scalar(io, desc.element_type)?;
                Ok(Operation::Delete {
                    key_field_id,
                    key_value,
                })
            }
        }
    }

    /// Peeks the entry's first byte to tell a completion marker from a
    /// regular operation, then restores the read position — mirrors
    /// `Serializer::isOperationCompletionMarker`'s read-then-seek-back probe.
    pub fn probe_is_completion_marker<IO: StorageIo>(io: &mut IO) -> Result<bool> {
        let pos = io.pos();
        let first_byte = io.read_u8()?;
        io.seek(pos)?;
        Ok(first_byte == MARKER_ID)
    }

    pub fn decode_completion_marker<IO: StorageIo>(
        target_op_id: OpId,
        io: &mut IO,
    ) -> Result<CompletionMarker> {
        let marker_id = io.read_u8()?;
        if marker_id != MARKER_ID {
            return Err(Error::Corruption(format!(
                "expected completion marker byte {MARKER_ID:#x}, got {marker_id:#x}"
            )));
        }
        let status = OpStatus::from_byte(io.read_u8()?)?;
        Ok(CompletionMarker {
            target_op_id,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::GrowableBufferIo;
    use fieldstore_core::define_record_schema;

    define_record_schema! {
        struct Account {
            0: id: U32,
            1: balance: I64,
            2: owner: String,
            3: tags: Array<String>,
        }
    }

    #[test]
    fn insert_round_trips() {
        let mut record = Account::default();
        record.id = 5;
        record.balance = -20;
        record.owner = "ferris".into();

        let op = Operation::Insert(record.clone());
        let mut io = GrowableBufferIo::new();
        OpCodec::encode(&op, &mut io).unwrap();
        io.seek(0).unwrap();
        let decoded: Operation<Account> = OpCodec::decode(&mut io).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn delete_round_trips() {
        let op: Operation<Account> = Operation::Delete {
            key_field_id: 0,
            key_value: FieldValue::U32(5),
        };
        let mut io = GrowableBufferIo::new();
        OpCodec::encode(&op, &mut io).unwrap();
        io.seek(0).unwrap();
        let decoded: Operation<Account> = OpCodec::decode(&mut io).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn append_to_array_with_insert_if_absent_carries_whole_record() {
        let mut record = Account::default();
        record.id = 1;
        let op: Operation<Account> = Operation::AppendToArray {
            key_field_id: 0,
            array_field_id: 3,
            insert_if_absent: true,
            key_value: FieldValue::U32(1),
            payload: AppendPayload::Insert(record.clone()),
        };
        let mut io = GrowableBufferIo::new();
        OpCodec::encode(&op, &mut io).unwrap();
        io.seek(0).unwrap();
        let decoded: Operation<Account> = OpCodec::decode(&mut io).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn probe_detects_completion_marker_without_consuming_it() {
        let marker = CompletionMarker {
            target_op_id: 9,
            status: OpStatus::Successful,
        };
        let mut io = GrowableBufferIo::new();
        OpCodec::encode_completion_marker(&marker, &mut io).unwrap();
        io.seek(0).unwrap();

        assert!(OpCodec::probe_is_completion_marker(&mut io).unwrap());
        assert_eq!(io.pos(), 0);

        let decoded = OpCodec::decode_completion_marker(9, &mut io).unwrap();
        assert_eq!(decoded, marker);
    }

    #[test]
    fn probe_rejects_a_regular_operation_entry() {
        let op: Operation<Account> = Operation::Delete {
            key_field_id: 0,
            key_value: FieldValue::U32(1),
        };
        let mut io = GrowableBufferIo::new();
        OpCodec::encode(&op, &mut io).unwrap();
        io.seek(0).unwrap();
        assert!(!OpCodec::probe_is_completion_marker(&mut io).unwrap());
    }
}

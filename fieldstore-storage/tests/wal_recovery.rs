//! Crash-recovery scenarios (S4-S5): an operation survives a close/reopen
//! cycle until its completion marker has actually been written.

use fieldstore_core::{define_record_schema, FieldValue};
use fieldstore_storage::{AppendPayload, OpStatus, Operation, Wal};
use tempfile::tempdir;

define_record_schema! {
    struct Counter {
        0: id: U32,
        1: values: Array<U32>,
    }
}

#[test]
fn s4_an_unacknowledged_append_survives_a_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let wal: Wal<Counter> = Wal::open(&path).unwrap();
        wal.register_operation(&Operation::AppendToArray {
            key_field_id: 0,
            array_field_id: 1,
            insert_if_absent: false,
            key_value: FieldValue::U32(0),
            payload: AppendPayload::Append(vec![FieldValue::U32(42)]),
        })
        .unwrap();
        wal.close().unwrap();
    }

    let wal: Wal<Counter> = Wal::open(&path).unwrap();
    let mut delivered = Vec::new();
    wal.verify_log(|op| delivered.push(op)).unwrap();

    assert_eq!(delivered.len(), 1);
    match &delivered[0] {
        Operation::AppendToArray {
            key_field_id,
            array_field_id,
            insert_if_absent,
            key_value,
            payload,
        } => {
            assert_eq!(*key_field_id, 0);
            assert_eq!(*array_field_id, 1);
            assert!(!*insert_if_absent);
            assert_eq!(*key_value, FieldValue::U32(0));
            assert_eq!(*payload, AppendPayload::Append(vec![FieldValue::U32(42)]));
        }
        other => panic!("unexpected operation replayed: {other:?}"),
    }
}

#[test]
fn s5_an_acknowledged_operation_is_not_replayed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let wal: Wal<Counter> = Wal::open(&path).unwrap();
        let op_id = wal
            .register_operation(&Operation::AppendToArray {
                key_field_id: 0,
                array_field_id: 1,
                insert_if_absent: false,
                key_value: FieldValue::U32(0),
                payload: AppendPayload::Append(vec![FieldValue::U32(7)]),
            })
            .unwrap();
        wal.update_op_status(op_id, OpStatus::Successful).unwrap();
        wal.close().unwrap();
    }

    let wal: Wal<Counter> = Wal::open(&path).unwrap();
    let mut delivered = Vec::new();
    wal.verify_log(|op| delivered.push(op)).unwrap();

    assert!(delivered.is_empty());
}

//! Foundation types for the field store engine: errors, typed field values,
//! and the record reflection traits the storage engine's generic codecs are
//! built against. This crate does no I/O.

mod error;
mod macros;
mod schema;
mod value;

pub use error::{Error, Result};
pub use schema::{FieldDescriptor, Record, RecordSchema, TombstoneDescriptor};
pub use value::{FieldValue, ScalarType};

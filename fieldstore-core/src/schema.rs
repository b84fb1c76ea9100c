use crate::value::{FieldValue, ScalarType};
use crate::Result;

/// Compile-time description of one field in a record.
///
/// Mirrors a C++ `Field<T, id>` template instantiation: a numeric id, a
/// name (used for index file naming), the element's scalar type, and
/// whether the field holds an array of that scalar rather than a single
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: u8,
    pub name: &'static str,
    pub element_type: ScalarType,
    pub is_array: bool,
}

impl FieldDescriptor {
    pub const fn new(id: u8, name: &'static str, element_type: ScalarType, is_array: bool) -> Self {
        FieldDescriptor {
            id,
            name,
            element_type,
            is_array,
        }
    }

    /// A field is static (fixed-width) only if it is a single, fixed-width
    /// scalar. Arrays and strings are always dynamic, length-prefixed
    /// fields, regardless of their element's own width.
    pub const fn is_static(&self) -> bool {
        !self.is_array && matches!(self.element_type.fixed_width(), Some(_))
    }

    pub const fn static_width(&self) -> Option<usize> {
        if self.is_array {
            None
        } else {
            self.element_type.fixed_width()
        }
    }
}

/// Optional tombstone descriptor: the field whose sentinel value marks a
/// logically deleted record, and the sentinel itself.
pub struct TombstoneDescriptor {
    pub field_id: u8,
    pub value: FieldValue,
}

/// Compile-time reflection over a record type's field layout.
///
/// Implementations are expected to list `FIELDS` with every static field
/// before every dynamic field — [`crate::define_record_schema`] enforces
/// this with a `const` assertion when it generates the impl.
pub trait RecordSchema {
    const FIELDS: &'static [FieldDescriptor];

    /// Sum of the encoded width of every static field, i.e. the offset at
    /// which the first dynamic field begins.
    fn static_size() -> usize {
        Self::FIELDS
            .iter()
            .filter(|f| f.is_static())
            .filter_map(|f| f.static_width())
            .sum()
    }

    fn field(id: u8) -> Option<&'static FieldDescriptor> {
        Self::FIELDS.iter().find(|f| f.id == id)
    }

    fn tombstone() -> Option<TombstoneDescriptor> {
        None
    }
}

/// A concrete record: reflection plus get/set against [`FieldValue`].
///
/// This is deliberately a thin interface — the engine's generic codec
/// (`RecordCodec` in `fieldstore-storage`) does the actual serialization
/// work by walking `Schema::FIELDS` and calling `get`/`set`.
pub trait Record: Default + Clone {
    type Schema: RecordSchema;

    fn get(&self, field_id: u8) -> Option<FieldValue>;
    fn set(&mut self, field_id: u8, value: FieldValue) -> Result<()>;

    fn is_tombstone(&self) -> bool {
        match Self::Schema::tombstone() {
            Some(desc) => self.get(desc.field_id).map(|v| v == desc.value).unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_field_is_never_static_even_with_fixed_element_width() {
        let desc = FieldDescriptor::new(0, "tags", ScalarType::U32, true);
        assert!(!desc.is_static());
        assert_eq!(desc.static_width(), None);
    }

    #[test]
    fn string_field_is_never_static() {
        let desc = FieldDescriptor::new(1, "name", ScalarType::String, false);
        assert!(!desc.is_static());
    }

    #[test]
    fn scalar_field_is_static_with_matching_width() {
        let desc = FieldDescriptor::new(2, "age", ScalarType::U32, false);
        assert!(desc.is_static());
        assert_eq!(desc.static_width(), Some(4));
    }
}

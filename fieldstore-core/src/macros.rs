/// Declares a record type and its [`RecordSchema`](crate::RecordSchema) in one go.
///
/// This is the Rust-native substitute for the original's template-based
/// `DbRecord<TombstoneField, Fields...>` — a declarative macro stands in for
/// compile-time template metaprogramming, without reaching for a proc-macro
/// crate. It generates:
///
/// - a struct with one field per declared field, typed by the corresponding
///   Rust type,
/// - a `RecordSchema` impl with the field descriptor table,
/// - a `Record` impl wiring `get`/`set` to the generated fields,
/// - a `const` assertion that every static field precedes every dynamic
///   field, mirroring the original's `checkAssertions()`.
///
/// # Example
///
/// ```ignore
/// define_record_schema! {
///     struct UserRecord {
///         0: id: U32,
///         1: age: U32,
///         2: name: String,
///         3: tags: Array<String>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_record_schema {
    (
        struct $record:ident {
            $( $id:literal : $field:ident : $($variant:ident)::+ $( < $elem:ident > )? ),+ $(,)?
        }
    ) => {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $record {
            $( pub $field: $crate::define_record_schema!(@rust_type $($variant)::+ $( < $elem > )?), )+
        }

        impl $crate::RecordSchema for $record {
            const FIELDS: &'static [$crate::FieldDescriptor] = &[
                $(
                    $crate::FieldDescriptor::new(
                        $id,
                        stringify!($field),
                        $crate::define_record_schema!(@scalar_type $($variant)::+ $( < $elem > )?),
                        $crate::define_record_schema!(@is_array $($variant)::+ $( < $elem > )?),
                    ),
                )+
            ];
        }

        impl $crate::Record for $record {
            type Schema = $record;

            fn get(&self, field_id: u8) -> ::std::option::Option<$crate::FieldValue> {
                match field_id {
                    $( $id => ::std::option::Option::Some(
                        $crate::define_record_schema!(@to_value self.$field, $($variant)::+ $( < $elem > )?)
                    ), )+
                    _ => ::std::option::Option::None,
                }
            }

            fn set(&mut self, field_id: u8, value: $crate::FieldValue) -> $crate::Result<()> {
                match field_id {
                    $( $id => {
                        self.$field = $crate::define_record_schema!(@from_value value, $($variant)::+ $( < $elem > )?);
                        ::std::result::Result::Ok(())
                    } )+
                    other => ::std::result::Result::Err($crate::Error::UnknownField(other)),
                }
            }
        }

        const _: () = {
            let fields = <$record as $crate::RecordSchema>::FIELDS;
            let mut i = 1;
            while i < fields.len() {
                if !fields[i - 1].is_static() && fields[i].is_static() {
                    panic!("static fields must precede dynamic fields");
                }
                i += 1;
            }
        };
    };

    (@rust_type Bool) => { bool };
    (@rust_type I8) => { i8 };
    (@rust_type U8) => { u8 };
    (@rust_type I16) => { i16 };
    (@rust_type U16) => { u16 };
    (@rust_type I32) => { i32 };
    (@rust_type U32) => { u32 };
    (@rust_type I64) => { i64 };
    (@rust_type U64) => { u64 };
    (@rust_type F32) => { f32 };
    (@rust_type F64) => { f64 };
    (@rust_type String) => { ::std::string::String };
    (@rust_type Array<$elem:ident>) => { ::std::vec::Vec<$crate::define_record_schema!(@rust_type $elem)> };

    (@scalar_type Bool) => { $crate::ScalarType::Bool };
    (@scalar_type I8) => { $crate::ScalarType::I8 };
    (@scalar_type U8) => { $crate::ScalarType::U8 };
    (@scalar_type I16) => { $crate::ScalarType::I16 };
    (@scalar_type U16) => { $crate::ScalarType::U16 };
    (@scalar_type I32) => { $crate::ScalarType::I32 };
    (@scalar_type U32) => { $crate::ScalarType::U32 };
    (@scalar_type I64) => { $crate::ScalarType::I64 };
    (@scalar_type U64) => { $crate::ScalarType::U64 };
    (@scalar_type F32) => { $crate::ScalarType::F32 };
    (@scalar_type F64) => { $crate::ScalarType::F64 };
    (@scalar_type String) => { $crate::ScalarType::String };
    (@scalar_type Array<$elem:ident>) => { $crate::define_record_schema!(@scalar_type $elem) };

    (@is_array Array<$elem:ident>) => { true };
    (@is_array $($variant:ident)::+) => { false };

    (@to_value $self_field:expr, Array<$elem:ident>) => {
        $crate::FieldValue::Array(
            $self_field.iter().cloned().map(|v| $crate::define_record_schema!(@scalar_to_value v, $elem)).collect()
        )
    };
    (@to_value $self_field:expr, Bool) => { $crate::FieldValue::Bool($self_field) };
    (@to_value $self_field:expr, I8) => { $crate::FieldValue::I8($self_field) };
    (@to_value $self_field:expr, U8) => { $crate::FieldValue::U8($self_field) };
    (@to_value $self_field:expr, I16) => { $crate::FieldValue::I16($self_field) };
    (@to_value $self_field:expr, U16) => { $crate::FieldValue::U16($self_field) };
    (@to_value $self_field:expr, I32) => { $crate::FieldValue::I32($self_field) };
    (@to_value $self_field:expr, U32) => { $crate::FieldValue::U32($self_field) };
    (@to_value $self_field:expr, I64) => { $crate::FieldValue::I64($self_field) };
    (@to_value $self_field:expr, U64) => { $crate::FieldValue::U64($self_field) };
    (@to_value $self_field:expr, F32) => { $crate::FieldValue::F32($self_field) };
    (@to_value $self_field:expr, F64) => { $crate::FieldValue::F64($self_field) };
    (@to_value $self_field:expr, String) => { $crate::FieldValue::String($self_field.clone()) };

    (@scalar_to_value $v:expr, Bool) => { $crate::FieldValue::Bool($v) };
    (@scalar_to_value $v:expr, I8) => { $crate::FieldValue::I8($v) };
    (@scalar_to_value $v:expr, U8) => { $crate::FieldValue::U8($v) };
    (@scalar_to_value $v:expr, I16) => { $crate::FieldValue::I16($v) };
    (@scalar_to_value $v:expr, U16) => { $crate::FieldValue::U16($v) };
    (@scalar_to_value $v:expr, I32) => { $crate::FieldValue::I32($v) };
    (@scalar_to_value $v:expr, U32) => { $crate::FieldValue::U32($v) };
    (@scalar_to_value $v:expr, I64) => { $crate::FieldValue::I64($v) };
    (@scalar_to_value $v:expr, U64) => { $crate::FieldValue::U64($v) };
    (@scalar_to_value $v:expr, F32) => { $crate::FieldValue::F32($v) };
    (@scalar_to_value $v:expr, F64) => { $crate::FieldValue::F64($v) };
    (@scalar_to_value $v:expr, String) => { $crate::FieldValue::String($v) };

    (@from_value $value:expr, Array<$elem:ident>) => {
        match $value {
            $crate::FieldValue::Array(items) => items
                .into_iter()
                .map(|v| $crate::define_record_schema!(@scalar_from_value v, $elem))
                .collect(),
            _ => ::std::vec::Vec::new(),
        }
    };
    (@from_value $value:expr, Bool) => { if let $crate::FieldValue::Bool(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, I8) => { if let $crate::FieldValue::I8(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, U8) => { if let $crate::FieldValue::U8(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, I16) => { if let $crate::FieldValue::I16(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, U16) => { if let $crate::FieldValue::U16(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, I32) => { if let $crate::FieldValue::I32(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, U32) => { if let $crate::FieldValue::U32(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, I64) => { if let $crate::FieldValue::I64(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, U64) => { if let $crate::FieldValue::U64(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, F32) => { if let $crate::FieldValue::F32(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, F64) => { if let $crate::FieldValue::F64(v) = $value { v } else { ::std::default::Default::default() } };
    (@from_value $value:expr, String) => { if let $crate::FieldValue::String(v) = $value { v } else { ::std::default::Default::default() } };

    (@scalar_from_value $v:expr, Bool) => { if let $crate::FieldValue::Bool(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, I8) => { if let $crate::FieldValue::I8(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, U8) => { if let $crate::FieldValue::U8(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, I16) => { if let $crate::FieldValue::I16(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, U16) => { if let $crate::FieldValue::U16(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, I32) => { if let $crate::FieldValue::I32(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, U32) => { if let $crate::FieldValue::U32(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, I64) => { if let $crate::FieldValue::I64(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, U64) => { if let $crate::FieldValue::U64(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, F32) => { if let $crate::FieldValue::F32(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, F64) => { if let $crate::FieldValue::F64(x) = $v { x } else { ::std::default::Default::default() } };
    (@scalar_from_value $v:expr, String) => { if let $crate::FieldValue::String(x) = $v { x } else { ::std::default::Default::default() } };
}

#[cfg(test)]
mod tests {
    use crate::{Record, RecordSchema};

    define_record_schema! {
        struct TestUser {
            0: id: U32,
            1: age: U32,
            2: name: String,
            3: tags: Array<String>,
        }
    }

    #[test]
    fn generated_schema_reports_four_fields_in_declared_order() {
        assert_eq!(TestUser::FIELDS.len(), 4);
        assert_eq!(TestUser::FIELDS[0].name, "id");
        assert_eq!(TestUser::FIELDS[3].name, "tags");
        assert!(TestUser::FIELDS[0].is_static());
        assert!(!TestUser::FIELDS[3].is_static());
    }

    #[test]
    fn get_set_round_trips_through_field_value() {
        let mut user = TestUser::default();
        user.set(0, crate::FieldValue::U32(42)).unwrap();
        user.set(2, crate::FieldValue::String("ferris".into())).unwrap();
        assert_eq!(user.get(0), Some(crate::FieldValue::U32(42)));
        assert_eq!(user.get(2), Some(crate::FieldValue::String("ferris".into())));
    }

    #[test]
    fn set_unknown_field_id_returns_error() {
        let mut user = TestUser::default();
        assert!(user.set(200, crate::FieldValue::U32(1)).is_err());
    }

    #[test]
    fn static_size_sums_only_fixed_width_fields() {
        assert_eq!(TestUser::static_size(), 8);
    }
}

//! Field capability: typed fields and their term (de)serialization
//!
//! A [`Field`] is a qualified field name paired with a [`FieldType`] that
//! knows how to turn a typed value into its wire scalar and back. Query
//! helpers (`eq`, `gte`, ...) and aggregation value sources are built on it.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Term codec of a mapped field type
pub trait FieldType: fmt::Debug + Clone + Send + Sync + 'static {
    type Value: fmt::Debug + Clone + PartialEq + Send + Sync + 'static;

    /// Mapping type name
    fn name(&self) -> &'static str;

    fn serialize_term(&self, value: &Self::Value) -> Value;

    /// Returns `None` when the wire value does not fit this type
    fn deserialize_term(&self, value: &Value) -> Option<Self::Value>;
}

macro_rules! string_type {
    ($ty:ident, $name:literal) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $ty;

        impl FieldType for $ty {
            type Value = String;

            fn name(&self) -> &'static str {
                $name
            }

            fn serialize_term(&self, value: &String) -> Value {
                Value::String(value.clone())
            }

            fn deserialize_term(&self, value: &Value) -> Option<String> {
                match value {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                }
            }
        }
    };
}

string_type!(Keyword, "keyword");
string_type!(Text, "text");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Integer;

impl FieldType for Integer {
    type Value = i32;

    fn name(&self) -> &'static str {
        "integer"
    }

    fn serialize_term(&self, value: &i32) -> Value {
        Value::from(*value)
    }

    fn deserialize_term(&self, value: &Value) -> Option<i32> {
        value.as_i64().and_then(|v| i32::try_from(v).ok())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Long;

impl FieldType for Long {
    type Value = i64;

    fn name(&self) -> &'static str {
        "long"
    }

    fn serialize_term(&self, value: &i64) -> Value {
        Value::from(*value)
    }

    fn deserialize_term(&self, value: &Value) -> Option<i64> {
        value.as_i64()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Float;

impl FieldType for Float {
    type Value = f32;

    fn name(&self) -> &'static str {
        "float"
    }

    fn serialize_term(&self, value: &f32) -> Value {
        Value::from(f64::from(*value))
    }

    fn deserialize_term(&self, value: &Value) -> Option<f32> {
        value.as_f64().map(|v| v as f32)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Double;

impl FieldType for Double {
    type Value = f64;

    fn name(&self) -> &'static str {
        "double"
    }

    fn serialize_term(&self, value: &f64) -> Value {
        Value::from(*value)
    }

    fn deserialize_term(&self, value: &Value) -> Option<f64> {
        value.as_f64()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boolean;

impl FieldType for Boolean {
    type Value = bool;

    fn name(&self) -> &'static str {
        "boolean"
    }

    fn serialize_term(&self, value: &bool) -> Value {
        Value::Bool(*value)
    }

    // terms buckets over boolean fields come back as 0/1 keys
    fn deserialize_term(&self, value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Date field, RFC 3339 on the way out, RFC 3339 or epoch millis on the way in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Date;

impl FieldType for Date {
    type Value = DateTime<Utc>;

    fn name(&self) -> &'static str {
        "date"
    }

    fn serialize_term(&self, value: &DateTime<Utc>) -> Value {
        Value::String(value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    fn deserialize_term(&self, value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }
}

/// Enum stored as an integer on the wire
pub trait IntEnum: fmt::Debug + Copy + PartialEq + Send + Sync + 'static {
    fn to_int(self) -> i64;
    fn from_int(value: i64) -> Option<Self>;
}

#[derive(Debug, Clone, Copy)]
pub struct IntEnumType<E> {
    _marker: PhantomData<fn() -> E>,
}

impl<E> Default for IntEnumType<E> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E: IntEnum> FieldType for IntEnumType<E> {
    type Value = E;

    fn name(&self) -> &'static str {
        "integer"
    }

    fn serialize_term(&self, value: &E) -> Value {
        Value::from(value.to_int())
    }

    fn deserialize_term(&self, value: &Value) -> Option<E> {
        value.as_i64().and_then(E::from_int)
    }
}

/// A mapped field with a qualified (dotted) name
#[derive(Debug, Clone)]
pub struct Field<T> {
    name: String,
    ty: T,
}

impl<T: FieldType> Field<T> {
    pub fn new(name: impl Into<String>, ty: T) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &T {
        &self.ty
    }

    /// Sub-field or sub-document field: `parent.child`
    pub fn sub_field<U: FieldType>(&self, name: &str, ty: U) -> Field<U> {
        Field::new(format!("{}.{}", self.name, name), ty)
    }

    pub fn serialize_term(&self, value: &T::Value) -> Value {
        self.ty.serialize_term(value)
    }

    pub fn deserialize_term(&self, value: &Value) -> crate::Result<T::Value> {
        self.ty
            .deserialize_term(value)
            .ok_or_else(|| crate::Error::InvalidTerm {
                field: self.name.clone(),
                reason: format!("cannot read {} as {}", value, self.ty.name()),
            })
    }
}

impl<T: FieldType> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Status {
        Draft,
        Published,
    }

    impl IntEnum for Status {
        fn to_int(self) -> i64 {
            match self {
                Status::Draft => 0,
                Status::Published => 1,
            }
        }

        fn from_int(value: i64) -> Option<Self> {
            match value {
                0 => Some(Status::Draft),
                1 => Some(Status::Published),
                _ => None,
            }
        }
    }

    #[test]
    fn test_int_enum_terms() {
        let status = Field::new("status", IntEnumType::<Status>::default());
        assert_eq!(status.serialize_term(&Status::Published), json!(1));
        assert_eq!(status.deserialize_term(&json!(0)).unwrap(), Status::Draft);
        assert!(status.deserialize_term(&json!(7)).is_err());
    }

    #[test]
    fn test_boolean_accepts_numeric_bucket_keys() {
        assert_eq!(Boolean.deserialize_term(&json!(1)), Some(true));
        assert_eq!(Boolean.deserialize_term(&json!(0)), Some(false));
        assert_eq!(Boolean.deserialize_term(&json!("true")), Some(true));
    }

    #[test]
    fn test_date_terms() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(Date.serialize_term(&dt), json!("2024-03-01T12:00:00.000Z"));
        assert_eq!(Date.deserialize_term(&json!(1709294400000i64)), Some(dt));
        assert_eq!(
            Date.deserialize_term(&json!("2024-03-01T12:00:00Z")),
            Some(dt)
        );
    }

    #[test]
    fn test_sub_field_name() {
        let title = Field::new("title", Text);
        let raw = title.sub_field("raw", Keyword);
        assert_eq!(raw.name(), "title.raw");
        assert_eq!(raw.field_type().name(), "keyword");
    }

    #[test]
    fn test_invalid_term_names_field() {
        let rank = Field::new("rank", Double);
        let err = rank.deserialize_term(&json!("high")).unwrap_err();
        assert!(err.to_string().contains("rank"));
    }
}

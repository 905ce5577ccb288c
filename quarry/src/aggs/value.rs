//! Value sources of aggregations

use crate::error::Error;
use crate::expression::Script;
use crate::json::ObjectBuilder;
use crate::types::{Field, FieldType};
use crate::Result;
use serde_json::Value;

/// Where an aggregation reads its values from. The field type decodes bucket
/// keys and encodes `missing` defaults.
#[derive(Debug, Clone)]
pub enum AggValue<T: FieldType> {
    Field(Field<T>),
    Script { script: Script, value_type: T },
    ValueScript { field: Field<T>, script: Script },
}

impl<T: FieldType> AggValue<T> {
    pub fn field(field: &Field<T>) -> Self {
        AggValue::Field(field.clone())
    }

    pub fn script(script: Script, value_type: T) -> Self {
        AggValue::Script { script, value_type }
    }

    /// Field values passed through a script
    pub fn value_script(field: &Field<T>, script: Script) -> Self {
        AggValue::ValueScript {
            field: field.clone(),
            script,
        }
    }

    pub fn field_type(&self) -> &T {
        match self {
            AggValue::Field(field) | AggValue::ValueScript { field, .. } => field.field_type(),
            AggValue::Script { value_type, .. } => value_type,
        }
    }

    /// Name used in error messages
    pub fn describe(&self) -> &str {
        match self {
            AggValue::Field(field) | AggValue::ValueScript { field, .. } => field.name(),
            AggValue::Script { .. } => "<script>",
        }
    }

    pub fn serialize_term(&self, value: &T::Value) -> Value {
        self.field_type().serialize_term(value)
    }

    pub fn deserialize_term(&self, value: &Value) -> Result<T::Value> {
        self.field_type()
            .deserialize_term(value)
            .ok_or_else(|| Error::InvalidTerm {
                field: self.describe().to_string(),
                reason: format!("cannot read {} as {}", value, self.field_type().name()),
            })
    }

    /// Writes `field` and/or `script`
    pub fn write(&self, obj: &mut ObjectBuilder) {
        match self {
            AggValue::Field(field) => {
                obj.field("field", field.name());
            }
            AggValue::Script { script, .. } => {
                obj.obj("script", |s| script.write(s));
            }
            AggValue::ValueScript { field, script } => {
                obj.field("field", field.name());
                obj.obj("script", |s| script.write(s));
            }
        }
    }
}

/// Value source plus its `missing` default, as used by `weighted_avg`
#[derive(Debug, Clone)]
pub struct ValueSource<T: FieldType> {
    pub value: AggValue<T>,
    pub missing: Option<T::Value>,
}

impl<T: FieldType> ValueSource<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self {
            value,
            missing: None,
        }
    }

    pub fn missing(mut self, missing: T::Value) -> Self {
        self.missing = Some(missing);
        self
    }

    pub fn write(&self, obj: &mut ObjectBuilder) {
        self.value.write(obj);
        obj.field_opt(
            "missing",
            self.missing.as_ref().map(|m| self.value.serialize_term(m)),
        );
    }
}

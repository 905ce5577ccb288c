//! Structured writer and reader over `serde_json`
//!
//! Expressions write themselves through [`ObjectBuilder`] / [`ArrayBuilder`]
//! and results are decoded through [`ObjectReader`] / [`ArrayReader`]. The
//! readers carry the dotted path of the value they wrap so that decode errors
//! name the offending field.

use crate::error::Error;
use crate::Result;
use serde_json::{Map, Value};

/// Builds a JSON object, preserving field insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectBuilder {
    map: Map<String, Value>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.map.insert(name.into(), value.into());
        self
    }

    /// Writes the field only when a value is present
    pub fn field_opt<V: Into<Value>>(
        &mut self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.map.insert(name.into(), value.into());
        }
        self
    }

    pub fn obj(&mut self, name: impl Into<String>, f: impl FnOnce(&mut ObjectBuilder)) -> &mut Self {
        let mut nested = ObjectBuilder::new();
        f(&mut nested);
        self.map.insert(name.into(), Value::Object(nested.map));
        self
    }

    pub fn array(&mut self, name: impl Into<String>, f: impl FnOnce(&mut ArrayBuilder)) -> &mut Self {
        let mut nested = ArrayBuilder::new();
        f(&mut nested);
        self.map.insert(name.into(), Value::Array(nested.items));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn build(self) -> Map<String, Value> {
        self.map
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }
}

/// Builds a JSON array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayBuilder {
    items: Vec<Value>,
}

impl ArrayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.items.push(value.into());
        self
    }

    pub fn obj(&mut self, f: impl FnOnce(&mut ObjectBuilder)) -> &mut Self {
        let mut nested = ObjectBuilder::new();
        f(&mut nested);
        self.items.push(Value::Object(nested.map));
        self
    }

    pub fn array(&mut self, f: impl FnOnce(&mut ArrayBuilder)) -> &mut Self {
        let mut nested = ArrayBuilder::new();
        f(&mut nested);
        self.items.push(Value::Array(nested.items));
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn build(self) -> Vec<Value> {
        self.items
    }
}

/// Read access to a JSON object with typed accessors
#[derive(Debug, Clone)]
pub struct ObjectReader<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> ObjectReader<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self {
            map,
            path: String::new(),
        }
    }

    pub fn with_path(map: &'a Map<String, Value>, path: impl Into<String>) -> Self {
        Self {
            map,
            path: path.into(),
        }
    }

    /// Wraps a value that must be an object
    pub fn from_value(value: &'a Value) -> Result<Self> {
        value
            .as_object()
            .map(Self::new)
            .ok_or_else(|| Error::invalid_type("$", "object"))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw(&self) -> &'a Map<String, Value> {
        self.map
    }

    pub fn path_of(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.value_opt(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.map.keys().map(String::as_str)
    }

    /// Returns the value unless it is absent or `null`
    pub fn value_opt(&self, name: &str) -> Option<&'a Value> {
        match self.map.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    pub fn value(&self, name: &str) -> Result<&'a Value> {
        self.value_opt(name)
            .ok_or_else(|| Error::MissingField(self.path_of(name)))
    }

    pub fn string_opt(&self, name: &str) -> Result<Option<&'a str>> {
        match self.value_opt(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(Error::invalid_type(self.path_of(name), "string")),
        }
    }

    pub fn string(&self, name: &str) -> Result<&'a str> {
        self.string_opt(name)?
            .ok_or_else(|| Error::MissingField(self.path_of(name)))
    }

    pub fn long_opt(&self, name: &str) -> Result<Option<i64>> {
        match self.value_opt(name) {
            None => Ok(None),
            Some(value) => as_long(value)
                .map(Some)
                .ok_or_else(|| Error::invalid_type(self.path_of(name), "integer")),
        }
    }

    pub fn long(&self, name: &str) -> Result<i64> {
        self.long_opt(name)?
            .ok_or_else(|| Error::MissingField(self.path_of(name)))
    }

    pub fn double_opt(&self, name: &str) -> Result<Option<f64>> {
        match self.value_opt(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| Error::invalid_type(self.path_of(name), "number")),
        }
    }

    pub fn double(&self, name: &str) -> Result<f64> {
        self.double_opt(name)?
            .ok_or_else(|| Error::MissingField(self.path_of(name)))
    }

    pub fn boolean_opt(&self, name: &str) -> Result<Option<bool>> {
        match self.value_opt(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(Error::invalid_type(self.path_of(name), "boolean")),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        self.boolean_opt(name)?
            .ok_or_else(|| Error::MissingField(self.path_of(name)))
    }

    pub fn obj_opt(&self, name: &str) -> Result<Option<ObjectReader<'a>>> {
        match self.value_opt(name) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(ObjectReader::with_path(map, self.path_of(name)))),
            Some(_) => Err(Error::invalid_type(self.path_of(name), "object")),
        }
    }

    pub fn obj(&self, name: &str) -> Result<ObjectReader<'a>> {
        self.obj_opt(name)?
            .ok_or_else(|| Error::MissingField(self.path_of(name)))
    }

    pub fn array_opt(&self, name: &str) -> Result<Option<ArrayReader<'a>>> {
        match self.value_opt(name) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(ArrayReader {
                items,
                path: self.path_of(name),
            })),
            Some(_) => Err(Error::invalid_type(self.path_of(name), "array")),
        }
    }

    pub fn array(&self, name: &str) -> Result<ArrayReader<'a>> {
        self.array_opt(name)?
            .ok_or_else(|| Error::MissingField(self.path_of(name)))
    }
}

/// Read access to a JSON array
#[derive(Debug, Clone)]
pub struct ArrayReader<'a> {
    items: &'a [Value],
    path: String,
}

impl<'a> ArrayReader<'a> {
    pub fn new(items: &'a [Value], path: impl Into<String>) -> Self {
        Self {
            items,
            path: path.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn values(&self) -> &'a [Value] {
        self.items
    }

    /// Dotted path of the item at `index`
    pub fn path_at(&self, index: usize) -> String {
        format!("{}[{}]", self.path, index)
    }

    /// Returns the object at `index`, or a type error naming its position
    pub fn obj_at(&self, index: usize) -> Result<ObjectReader<'a>> {
        match self.items.get(index) {
            Some(Value::Object(map)) => Ok(ObjectReader::with_path(map, self.path_at(index))),
            Some(_) => Err(Error::invalid_type(self.path_at(index), "object")),
            None => Err(Error::MissingField(self.path_at(index))),
        }
    }

    pub fn objs(&self) -> impl Iterator<Item = Result<ObjectReader<'a>>> + '_ {
        (0..self.items.len()).map(move |i| self.obj_at(i))
    }

    pub fn strings(&self) -> Result<Vec<String>> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::invalid_type(self.path_at(i), "string"))
            })
            .collect()
    }
}

fn as_long(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

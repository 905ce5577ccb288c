//! Mapping model: document and field mapping definitions
//!
//! A [`DocumentMapping`] is the tree of mapped fields of one index. It is
//! compiled to the engine's mapping JSON by
//! [`MappingCompiler`](crate::compile::MappingCompiler). Two definitions of
//! the same index can be combined with [`DocumentMapping::merge`], which
//! rejects incompatible same-named fields.

use crate::error::Error;
use crate::json::ObjectBuilder;
use crate::types::FieldType;
use crate::Result;
use serde_json::{Map, Value};

/// `dynamic` setting of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dynamic {
    True,
    False,
    Strict,
}

impl Dynamic {
    pub fn to_value(self) -> Value {
        match self {
            Dynamic::True => Value::Bool(true),
            Dynamic::False => Value::Bool(false),
            Dynamic::Strict => Value::from("strict"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub name: String,
    pub field_type: String,
    pub params: Map<String, Value>,
    /// Multi-fields written under `fields`
    pub sub_fields: Vec<FieldMapping>,
    /// Object and nested members written under `properties`
    pub properties: Vec<FieldMapping>,
}

impl FieldMapping {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            params: Map::new(),
            sub_fields: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Field mapped with the type name of `ty`
    pub fn typed<T: FieldType>(name: impl Into<String>, ty: &T) -> Self {
        Self::new(name, ty.name())
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, "object")
    }

    pub fn nested(name: impl Into<String>) -> Self {
        Self::new(name, "nested")
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn sub_field(mut self, field: FieldMapping) -> Self {
        self.sub_fields.push(field);
        self
    }

    pub fn property(mut self, field: FieldMapping) -> Self {
        self.properties.push(field);
        self
    }

    pub(crate) fn write(&self, obj: &mut ObjectBuilder) {
        obj.field("type", self.field_type.as_str());
        for (name, value) in &self.params {
            obj.field(name.as_str(), value.clone());
        }
        if !self.sub_fields.is_empty() {
            obj.obj("fields", |f| write_fields(f, &self.sub_fields));
        }
        if !self.properties.is_empty() {
            obj.obj("properties", |p| write_fields(p, &self.properties));
        }
    }

    fn merge(&self, other: &FieldMapping, path: &str) -> Result<FieldMapping> {
        if self.field_type != other.field_type {
            return Err(Error::MappingConflict {
                field: path.to_string(),
                reason: format!(
                    "type [{}] cannot be merged with type [{}]",
                    self.field_type, other.field_type
                ),
            });
        }
        let mut params = self.params.clone();
        for (name, value) in &other.params {
            match params.get(name) {
                Some(existing) if existing != value => {
                    return Err(Error::MappingConflict {
                        field: path.to_string(),
                        reason: format!(
                            "parameter [{}] has conflicting values {} and {}",
                            name, existing, value
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    params.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(FieldMapping {
            name: self.name.clone(),
            field_type: self.field_type.clone(),
            params,
            sub_fields: merge_fields(&self.sub_fields, &other.sub_fields, path)?,
            properties: merge_fields(&self.properties, &other.properties, path)?,
        })
    }
}

pub(crate) fn write_fields(obj: &mut ObjectBuilder, fields: &[FieldMapping]) {
    for field in fields {
        obj.obj(field.name.as_str(), |f| field.write(f));
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

/// Union of two field lists; fields of `left` keep their position
fn merge_fields(left: &[FieldMapping], right: &[FieldMapping], parent: &str) -> Result<Vec<FieldMapping>> {
    let mut merged = left.to_vec();
    for field in right {
        let path = child_path(parent, &field.name);
        match merged.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = existing.merge(field, &path)?,
            None => merged.push(field.clone()),
        }
    }
    Ok(merged)
}

/// Mapping applied to fields added dynamically
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicTemplate {
    pub name: String,
    pub match_mapping_type: Option<String>,
    pub match_pattern: Option<String>,
    pub unmatch: Option<String>,
    pub path_match: Option<String>,
    pub path_unmatch: Option<String>,
    pub mapping: Map<String, Value>,
}

impl DynamicTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            match_mapping_type: None,
            match_pattern: None,
            unmatch: None,
            path_match: None,
            path_unmatch: None,
            mapping: Map::new(),
        }
    }

    pub fn match_mapping_type(mut self, mapping_type: impl Into<String>) -> Self {
        self.match_mapping_type = Some(mapping_type.into());
        self
    }

    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.match_pattern = Some(pattern.into());
        self
    }

    pub fn unmatch(mut self, pattern: impl Into<String>) -> Self {
        self.unmatch = Some(pattern.into());
        self
    }

    pub fn path_match(mut self, pattern: impl Into<String>) -> Self {
        self.path_match = Some(pattern.into());
        self
    }

    pub fn path_unmatch(mut self, pattern: impl Into<String>) -> Self {
        self.path_unmatch = Some(pattern.into());
        self
    }

    pub fn mapping(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.mapping.insert(name.into(), value.into());
        self
    }

    pub(crate) fn write(&self, obj: &mut ObjectBuilder) {
        obj.obj(self.name.as_str(), |t| {
            t.field_opt("match_mapping_type", self.match_mapping_type.as_deref())
                .field_opt("match", self.match_pattern.as_deref())
                .field_opt("unmatch", self.unmatch.as_deref())
                .field_opt("path_match", self.path_match.as_deref())
                .field_opt("path_unmatch", self.path_unmatch.as_deref())
                .field("mapping", Value::Object(self.mapping.clone()));
        });
    }
}

/// Mapping of one index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMapping {
    pub dynamic: Option<Dynamic>,
    pub source_enabled: Option<bool>,
    pub fields: Vec<FieldMapping>,
    pub dynamic_templates: Vec<DynamicTemplate>,
}

impl DocumentMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dynamic(mut self, dynamic: Dynamic) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    pub fn source_enabled(mut self, enabled: bool) -> Self {
        self.source_enabled = Some(enabled);
        self
    }

    pub fn field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    pub fn dynamic_template(mut self, template: DynamicTemplate) -> Self {
        self.dynamic_templates.push(template);
        self
    }

    /// Combines two definitions of the same index. Settings present on
    /// both sides must agree, as must same-named fields and templates.
    pub fn merge(&self, other: &DocumentMapping) -> Result<DocumentMapping> {
        let dynamic = merge_setting("dynamic", self.dynamic, other.dynamic)?;
        let source_enabled = merge_setting("_source", self.source_enabled, other.source_enabled)?;

        let mut dynamic_templates = self.dynamic_templates.clone();
        for template in &other.dynamic_templates {
            match dynamic_templates.iter().find(|t| t.name == template.name) {
                Some(existing) if existing != template => {
                    return Err(Error::MappingConflict {
                        field: format!("dynamic_templates.{}", template.name),
                        reason: "template is defined twice with different settings".to_string(),
                    });
                }
                Some(_) => {}
                None => dynamic_templates.push(template.clone()),
            }
        }

        Ok(DocumentMapping {
            dynamic,
            source_enabled,
            fields: merge_fields(&self.fields, &other.fields, "")?,
            dynamic_templates,
        })
    }

    /// `{dynamic?, _source?, dynamic_templates?, properties}`
    pub(crate) fn write(&self, obj: &mut ObjectBuilder) {
        obj.field_opt("dynamic", self.dynamic.map(Dynamic::to_value));
        if let Some(enabled) = self.source_enabled {
            obj.obj("_source", |s| {
                s.field("enabled", enabled);
            });
        }
        if !self.dynamic_templates.is_empty() {
            obj.array("dynamic_templates", |a| {
                for template in &self.dynamic_templates {
                    a.obj(|t| template.write(t));
                }
            });
        }
        obj.obj("properties", |p| write_fields(p, &self.fields));
    }
}

fn merge_setting<T: PartialEq + Copy + std::fmt::Debug>(
    name: &str,
    left: Option<T>,
    right: Option<T>,
) -> Result<Option<T>> {
    match (left, right) {
        (Some(l), Some(r)) if l != r => Err(Error::MappingConflict {
            field: name.to_string(),
            reason: format!("{:?} cannot be merged with {:?}", l, r),
        }),
        (l, r) => Ok(l.or(r)),
    }
}

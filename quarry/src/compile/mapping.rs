//! Mapping, create-index and update-mapping compilation

use super::{Acknowledged, Method, Request};
use crate::features::FeatureSet;
use crate::json::{ObjectBuilder, ObjectReader};
use crate::mapping::DocumentMapping;
use serde_json::{Map, Value};

/// Type name that mappings nest under on engines that still require one
pub const DEFAULT_TYPE_NAME: &str = "_doc";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingCompiler {
    features: FeatureSet,
}

impl MappingCompiler {
    pub fn new(features: FeatureSet) -> Self {
        Self { features }
    }

    /// The `mappings` object, nested under `_doc` when the engine requires
    /// a type name
    pub fn compile(&self, mapping: &DocumentMapping) -> Value {
        let mut obj = ObjectBuilder::new();
        if self.features.requires_mapping_type_name {
            obj.obj(DEFAULT_TYPE_NAME, |t| mapping.write(t));
        } else {
            mapping.write(&mut obj);
        }
        obj.into_value()
    }
}

/// Response of index creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndexResult {
    pub acknowledged: bool,
    pub shards_acknowledged: bool,
    pub index: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateIndexCompiler {
    mapping: MappingCompiler,
}

impl CreateIndexCompiler {
    pub fn new(features: FeatureSet) -> Self {
        Self {
            mapping: MappingCompiler::new(features),
        }
    }

    /// `PUT {index}` with `{settings?, mappings}`
    pub fn compile(
        &self,
        index: &str,
        settings: Option<&Map<String, Value>>,
        mapping: &DocumentMapping,
    ) -> Request<CreateIndexResult> {
        let mut body = ObjectBuilder::new();
        body.field_opt("settings", settings.cloned().map(Value::Object))
            .field("mappings", self.mapping.compile(mapping));

        Request::new(Method::Put, index, |response| {
            let reader = ObjectReader::from_value(response)?;
            Ok(CreateIndexResult {
                acknowledged: reader.boolean("acknowledged")?,
                shards_acknowledged: reader.boolean_opt("shards_acknowledged")?.unwrap_or(false),
                index: reader.string_opt("index")?.map(str::to_string),
            })
        })
        .json(body.into_value())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateMappingCompiler {
    features: FeatureSet,
}

impl UpdateMappingCompiler {
    pub fn new(features: FeatureSet) -> Self {
        Self { features }
    }

    /// `PUT {index}/_mapping`, or `PUT {index}/_mapping/_doc` when the
    /// engine requires a type name
    pub fn compile(&self, index: &str, mapping: &DocumentMapping) -> Request<Acknowledged> {
        let path = if self.features.requires_mapping_type_name {
            format!("{}/_mapping/{}", index, DEFAULT_TYPE_NAME)
        } else {
            format!("{}/_mapping", index)
        };
        let mut body = ObjectBuilder::new();
        mapping.write(&mut body);

        Request::new(Method::Put, path, Acknowledged::decode).json(body.into_value())
    }
}

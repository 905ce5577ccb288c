//! Core expression abstraction and scripts

use crate::compile::SearchQueryCompiler;
use crate::json::ObjectBuilder;
use serde_json::{Map, Value};

/// A node written under a wire-level name, e.g. `{"bool": {...}}`
pub trait NamedExpression {
    /// Wire name of the expression
    fn name(&self) -> &str;

    /// Writes the object found under [`NamedExpression::name`]
    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler);

    fn serialize(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        obj.obj(self.name(), |body| self.body(body, compiler));
    }
}

/// Inline or stored script
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    Source {
        source: String,
        lang: Option<String>,
        params: Map<String, Value>,
    },
    Stored {
        id: String,
        params: Map<String, Value>,
    },
}

impl Script {
    pub fn source(source: impl Into<String>) -> Self {
        Script::Source {
            source: source.into(),
            lang: None,
            params: Map::new(),
        }
    }

    pub fn stored(id: impl Into<String>) -> Self {
        Script::Stored {
            id: id.into(),
            params: Map::new(),
        }
    }

    pub fn lang(mut self, value: impl Into<String>) -> Self {
        if let Script::Source { lang, .. } = &mut self {
            *lang = Some(value.into());
        }
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        match &mut self {
            Script::Source { params, .. } | Script::Stored { params, .. } => {
                params.insert(name.into(), value.into());
            }
        }
        self
    }

    /// Writes the script body (`source`/`id`, `lang`, `params`)
    pub fn write(&self, obj: &mut ObjectBuilder) {
        match self {
            Script::Source {
                source,
                lang,
                params,
            } => {
                obj.field("source", source.as_str());
                obj.field_opt("lang", lang.as_deref());
                if !params.is_empty() {
                    obj.field("params", Value::Object(params.clone()));
                }
            }
            Script::Stored { id, params } => {
                obj.field("id", id.as_str());
                if !params.is_empty() {
                    obj.field("params", Value::Object(params.clone()));
                }
            }
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = ObjectBuilder::new();
        self.write(&mut obj);
        obj.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_script() {
        let script = Script::source("doc['rank'].value * params.factor")
            .lang("painless")
            .param("factor", 1.5);
        assert_eq!(
            script.to_value(),
            json!({
                "source": "doc['rank'].value * params.factor",
                "lang": "painless",
                "params": {"factor": 1.5}
            })
        );
    }

    #[test]
    fn test_stored_script_ignores_lang() {
        let script = Script::stored("calc-score").lang("painless");
        assert_eq!(script.to_value(), json!({"id": "calc-score"}));
    }
}

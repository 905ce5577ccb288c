//! `_source` filtering

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum SourceFilter {
    Enabled(bool),
    Filter {
        includes: Vec<String>,
        excludes: Vec<String>,
    },
}

impl SourceFilter {
    pub fn disabled() -> Self {
        SourceFilter::Enabled(false)
    }

    pub fn includes<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SourceFilter::Filter {
            includes: fields.into_iter().map(Into::into).collect(),
            excludes: Vec::new(),
        }
    }

    pub fn excludes<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SourceFilter::Filter {
            includes: Vec::new(),
            excludes: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Wire value of `_source`; empty lists are left out
    pub fn to_value(&self) -> Value {
        match self {
            SourceFilter::Enabled(enabled) => Value::Bool(*enabled),
            SourceFilter::Filter { includes, excludes } => {
                let mut map = serde_json::Map::new();
                if !includes.is_empty() {
                    map.insert("includes".into(), Value::from(includes.clone()));
                }
                if !excludes.is_empty() {
                    map.insert("excludes".into(), Value::from(excludes.clone()));
                }
                Value::Object(map)
            }
        }
    }
}

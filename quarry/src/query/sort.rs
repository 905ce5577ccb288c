//! Sort specifications

use super::QueryExpression;
use crate::compile::SearchQueryCompiler;
use crate::expression::{NamedExpression, Script};
use crate::json::{ArrayBuilder, ObjectBuilder};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Min,
    Max,
    Sum,
    Avg,
    Median,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Min => "min",
            SortMode::Max => "max",
            SortMode::Sum => "sum",
            SortMode::Avg => "avg",
            SortMode::Median => "median",
        }
    }
}

/// Placement of documents without a value
#[derive(Debug, Clone, PartialEq)]
pub enum Missing {
    First,
    Last,
    Value(Value),
}

impl Missing {
    pub fn to_value(&self) -> Value {
        match self {
            Missing::First => Value::from("_first"),
            Missing::Last => Value::from("_last"),
            Missing::Value(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedSort {
    pub path: String,
    pub filter: Option<QueryExpression>,
    pub max_children: Option<u32>,
    pub nested: Option<Box<NestedSort>>,
}

impl NestedSort {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filter: None,
            max_children: None,
            nested: None,
        }
    }

    pub fn filter(mut self, query: impl Into<QueryExpression>) -> Self {
        self.filter = Some(query.into());
        self
    }

    pub fn max_children(mut self, max_children: u32) -> Self {
        self.max_children = Some(max_children);
        self
    }

    pub fn nested(mut self, nested: NestedSort) -> Self {
        self.nested = Some(Box::new(nested));
        self
    }

    fn write(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        obj.field("path", self.path.as_str());
        if let Some(filter) = self.filter.as_ref().and_then(QueryExpression::reduce) {
            obj.obj("filter", |f| filter.serialize(f, compiler));
        }
        obj.field_opt("max_children", self.max_children);
        if let Some(nested) = &self.nested {
            obj.obj("nested", |n| nested.write(n, compiler));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortTarget {
    Field(String),
    Score,
    Script { script: Script, script_type: String },
}

/// One entry of the request `sort` array
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub target: SortTarget,
    pub order: Option<Order>,
    pub mode: Option<SortMode>,
    pub numeric_type: Option<String>,
    pub missing: Option<Missing>,
    pub unmapped_type: Option<String>,
    pub nested: Option<NestedSort>,
}

impl Sort {
    fn with_target(target: SortTarget) -> Self {
        Self {
            target,
            order: None,
            mode: None,
            numeric_type: None,
            missing: None,
            unmapped_type: None,
            nested: None,
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::with_target(SortTarget::Field(name.into()))
    }

    pub fn score() -> Self {
        Self::with_target(SortTarget::Score)
    }

    /// Script based sort; `script_type` is `number` or `string`
    pub fn script(script: Script, script_type: impl Into<String>) -> Self {
        Self::with_target(SortTarget::Script {
            script,
            script_type: script_type.into(),
        })
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn mode(mut self, mode: SortMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn numeric_type(mut self, numeric_type: impl Into<String>) -> Self {
        self.numeric_type = Some(numeric_type.into());
        self
    }

    pub fn missing(mut self, missing: Missing) -> Self {
        self.missing = Some(missing);
        self
    }

    pub fn unmapped_type(mut self, unmapped_type: impl Into<String>) -> Self {
        self.unmapped_type = Some(unmapped_type.into());
        self
    }

    pub fn nested(mut self, nested: NestedSort) -> Self {
        self.nested = Some(nested);
        self
    }

    fn has_options(&self) -> bool {
        self.order.is_some()
            || self.mode.is_some()
            || self.numeric_type.is_some()
            || self.missing.is_some()
            || self.unmapped_type.is_some()
            || self.nested.is_some()
    }

    fn write_options(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        obj.field_opt("order", self.order.map(|o| o.as_str()))
            .field_opt("mode", self.mode.map(|m| m.as_str()))
            .field_opt("numeric_type", self.numeric_type.as_deref())
            .field_opt("missing", self.missing.as_ref().map(Missing::to_value))
            .field_opt("unmapped_type", self.unmapped_type.as_deref());
        if let Some(nested) = &self.nested {
            obj.obj("nested", |n| nested.write(n, compiler));
        }
    }

    /// Appends this sort to a `sort` array
    pub fn write(&self, arr: &mut ArrayBuilder, compiler: &SearchQueryCompiler) {
        let name = match &self.target {
            SortTarget::Field(name) => name.as_str(),
            SortTarget::Score => "_score",
            SortTarget::Script {
                script,
                script_type,
            } => {
                arr.obj(|s| {
                    s.obj("_script", |body| {
                        body.field("type", script_type.as_str());
                        body.obj("script", |sc| script.write(sc));
                        self.write_options(body, compiler);
                    });
                });
                return;
            }
        };
        if self.has_options() {
            arr.obj(|s| {
                s.obj(name, |opts| self.write_options(opts, compiler));
            });
        } else {
            arr.value(name);
        }
    }
}

//! Bulk action compilation

use super::mapping::DEFAULT_TYPE_NAME;
use super::{Method, Request};
use crate::bulk::{ActionMeta, BulkAction, BulkResult, ConcurrencyControl, Refresh, UpdateSource};
use crate::features::FeatureSet;
use crate::json::{ObjectBuilder, ObjectReader};
use serde_json::Value;

/// Compiles one action to its meta line and optional source line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCompiler {
    features: FeatureSet,
}

impl ActionCompiler {
    pub fn new(features: FeatureSet) -> Self {
        Self { features }
    }

    /// `{"<op>": {_index?, _id?, _type?, routing?, concurrency control}}`
    pub fn meta_line(&self, action: &BulkAction) -> Value {
        let meta = action.meta();
        let mut line = ObjectBuilder::new();
        line.obj(action.op_type().as_str(), |m| self.write_meta(m, meta));
        line.into_value()
    }

    fn write_meta(&self, obj: &mut ObjectBuilder, meta: &ActionMeta) {
        obj.field_opt("_index", meta.index.as_deref())
            .field_opt("_id", meta.id.as_deref());
        if self.features.requires_mapping_type_name {
            obj.field("_type", DEFAULT_TYPE_NAME);
        }
        obj.field_opt("routing", meta.routing.as_deref());
        match meta.concurrency {
            Some(ConcurrencyControl::Version(version)) => {
                obj.field("version_type", "external").field("version", version);
            }
            Some(ConcurrencyControl::VersionGte(version)) => {
                obj.field("version_type", "external_gte")
                    .field("version", version);
            }
            Some(ConcurrencyControl::SeqNo {
                seq_no,
                primary_term,
            }) => {
                obj.field("if_seq_no", seq_no)
                    .field("if_primary_term", primary_term);
            }
            None => {}
        }
    }

    /// Document line; `None` for deletes
    pub fn source_line(&self, action: &BulkAction) -> Option<Value> {
        match action {
            BulkAction::Index { source, .. } | BulkAction::Create { source, .. } => {
                Some(source.clone())
            }
            BulkAction::Update {
                source,
                upsert,
                detect_noop,
                ..
            } => {
                let mut line = ObjectBuilder::new();
                line.field_opt("upsert", upsert.clone())
                    .field_opt("detect_noop", *detect_noop);
                match source {
                    UpdateSource::Doc { doc, doc_as_upsert } => {
                        line.field("doc", doc.clone())
                            .field_opt("doc_as_upsert", *doc_as_upsert);
                    }
                    UpdateSource::Script {
                        script,
                        scripted_upsert,
                    } => {
                        line.obj("script", |s| script.write(s))
                            .field_opt("scripted_upsert", *scripted_upsert);
                    }
                }
                Some(line.into_value())
            }
            BulkAction::Delete { .. } => None,
        }
    }

    pub fn lines(&self, action: &BulkAction) -> Vec<Value> {
        let mut lines = vec![self.meta_line(action)];
        lines.extend(self.source_line(action));
        lines
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkCompiler {
    actions: ActionCompiler,
}

impl BulkCompiler {
    pub fn new(features: FeatureSet) -> Self {
        Self {
            actions: ActionCompiler::new(features),
        }
    }

    /// `POST {index}/_bulk` (or `_bulk`) with the NDJSON action lines
    pub fn compile(
        &self,
        index: Option<&str>,
        actions: &[BulkAction],
        refresh: Option<Refresh>,
    ) -> Request<BulkResult> {
        let path = match index {
            Some(index) => format!("{}/_bulk", index),
            None => "_bulk".to_string(),
        };
        let lines = actions
            .iter()
            .flat_map(|action| self.actions.lines(action))
            .collect();

        let mut request = Request::new(Method::Post, path, |response| {
            BulkResult::decode(&ObjectReader::from_value(response)?)
        })
        .ndjson(lines);
        if let Some(refresh) = refresh {
            request = request.param("refresh", refresh.as_str());
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::{BulkItemResult, BulkOpType};
    use crate::expression::Script;
    use serde_json::json;

    fn compiler() -> ActionCompiler {
        ActionCompiler::default()
    }

    #[test]
    fn test_concurrency_control_mapping() {
        let cases = [
            (
                ConcurrencyControl::Version(7),
                json!({"index": {"_id": "1", "version_type": "external", "version": 7}}),
            ),
            (
                ConcurrencyControl::VersionGte(7),
                json!({"index": {"_id": "1", "version_type": "external_gte", "version": 7}}),
            ),
            (
                ConcurrencyControl::SeqNo {
                    seq_no: 12,
                    primary_term: 2,
                },
                json!({"index": {"_id": "1", "if_seq_no": 12, "if_primary_term": 2}}),
            ),
        ];
        for (concurrency, expected) in cases {
            let action = BulkAction::index(ActionMeta::new().id("1").concurrency(concurrency), json!({}));
            assert_eq!(compiler().meta_line(&action), expected);
        }
    }

    #[test]
    fn test_type_name_only_when_required() {
        let action = BulkAction::delete(ActionMeta::new().index("posts").id("1").routing("u1"));
        assert_eq!(
            ActionCompiler::new(FeatureSet::ES_6_0).lines(&action),
            vec![json!({"delete": {"_index": "posts", "_id": "1", "_type": "_doc", "routing": "u1"}})]
        );
        assert_eq!(
            compiler().lines(&action),
            vec![json!({"delete": {"_index": "posts", "_id": "1", "routing": "u1"}})]
        );
    }

    #[test]
    fn test_update_source_lines() {
        let doc = BulkAction::update(
            ActionMeta::new().id("1"),
            UpdateSource::Doc {
                doc: json!({"views": 1}),
                doc_as_upsert: Some(true),
            },
        )
        .with_detect_noop(false);
        assert_eq!(
            compiler().source_line(&doc),
            Some(json!({"detect_noop": false, "doc": {"views": 1}, "doc_as_upsert": true}))
        );

        let script = BulkAction::update(
            ActionMeta::new().id("1"),
            UpdateSource::script(Script::source("ctx._source.views += 1")),
        )
        .with_upsert(json!({"views": 0}));
        assert_eq!(
            compiler().source_line(&script),
            Some(json!({"upsert": {"views": 0}, "script": {"source": "ctx._source.views += 1"}}))
        );
    }

    #[test]
    fn test_bulk_request() {
        let actions = vec![
            BulkAction::index(ActionMeta::new().id("1"), json!({"title": "a"})),
            BulkAction::delete(ActionMeta::new().id("2")),
        ];
        let request = BulkCompiler::default().compile(Some("posts"), &actions, Some(Refresh::WaitFor));

        assert_eq!(request.path, "posts/_bulk");
        assert_eq!(request.params, vec![("refresh".to_string(), "wait_for".to_string())]);
        assert_eq!(
            request.body.as_ref().unwrap().encode().unwrap(),
            "{\"index\":{\"_id\":\"1\"}}\n{\"title\":\"a\"}\n{\"delete\":{\"_id\":\"2\"}}\n"
        );

        let result = request
            .decode(&json!({"took": 5, "errors": false, "items": [
                {"index": {"_index": "posts", "_id": "1", "_version": 1, "result": "created",
                           "_seq_no": 0, "_primary_term": 1, "status": 201}},
                {"delete": {"_index": "posts", "_id": "2", "_version": 2, "result": "not_found",
                            "_seq_no": 1, "_primary_term": 1, "status": 404}}
            ]}))
            .unwrap();
        assert!(!result.errors);
        assert_eq!(
            result.items.iter().map(BulkItemResult::op_type).collect::<Vec<_>>(),
            vec![BulkOpType::Index, BulkOpType::Delete]
        );
        assert_eq!(result.failures().count(), 0);
    }
}

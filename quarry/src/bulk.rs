//! Bulk actions and bulk responses

use crate::compile::ErrorCause;
use crate::error::Error;
use crate::expression::Script;
use crate::json::ObjectReader;
use crate::Result;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOpType {
    Index,
    Create,
    Update,
    Delete,
}

impl BulkOpType {
    pub const ALL: [BulkOpType; 4] = [
        BulkOpType::Index,
        BulkOpType::Create,
        BulkOpType::Update,
        BulkOpType::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOpType::Index => "index",
            BulkOpType::Create => "create",
            BulkOpType::Update => "update",
            BulkOpType::Delete => "delete",
        }
    }
}

impl fmt::Display for BulkOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimistic concurrency control of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyControl {
    /// `version_type=external`
    Version(i64),
    /// `version_type=external_gte`
    VersionGte(i64),
    SeqNo { seq_no: i64, primary_term: i64 },
}

/// Target of a bulk action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionMeta {
    /// Falls back to the index of the bulk request when unset
    pub index: Option<String>,
    pub id: Option<String>,
    pub routing: Option<String>,
    pub concurrency: Option<ConcurrencyControl>,
}

impl ActionMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    pub fn concurrency(mut self, concurrency: ConcurrencyControl) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}

/// What an update applies to the stored document
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSource {
    Doc {
        doc: Value,
        doc_as_upsert: Option<bool>,
    },
    Script {
        script: Script,
        scripted_upsert: Option<bool>,
    },
}

impl UpdateSource {
    pub fn doc(doc: impl Into<Value>) -> Self {
        UpdateSource::Doc {
            doc: doc.into(),
            doc_as_upsert: None,
        }
    }

    pub fn script(script: Script) -> Self {
        UpdateSource::Script {
            script,
            scripted_upsert: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    Index {
        meta: ActionMeta,
        source: Value,
    },
    Create {
        meta: ActionMeta,
        source: Value,
    },
    Update {
        meta: ActionMeta,
        source: UpdateSource,
        upsert: Option<Value>,
        detect_noop: Option<bool>,
    },
    Delete {
        meta: ActionMeta,
    },
}

impl BulkAction {
    pub fn index(meta: ActionMeta, source: impl Into<Value>) -> Self {
        BulkAction::Index {
            meta,
            source: source.into(),
        }
    }

    pub fn create(meta: ActionMeta, source: impl Into<Value>) -> Self {
        BulkAction::Create {
            meta,
            source: source.into(),
        }
    }

    pub fn update(meta: ActionMeta, source: UpdateSource) -> Self {
        BulkAction::Update {
            meta,
            source,
            upsert: None,
            detect_noop: None,
        }
    }

    pub fn delete(meta: ActionMeta) -> Self {
        BulkAction::Delete { meta }
    }

    /// Document inserted when an update finds nothing to update
    pub fn with_upsert(mut self, document: impl Into<Value>) -> Self {
        if let BulkAction::Update { upsert, .. } = &mut self {
            *upsert = Some(document.into());
        }
        self
    }

    pub fn with_detect_noop(mut self, detect: bool) -> Self {
        if let BulkAction::Update { detect_noop, .. } = &mut self {
            *detect_noop = Some(detect);
        }
        self
    }

    pub fn op_type(&self) -> BulkOpType {
        match self {
            BulkAction::Index { .. } => BulkOpType::Index,
            BulkAction::Create { .. } => BulkOpType::Create,
            BulkAction::Update { .. } => BulkOpType::Update,
            BulkAction::Delete { .. } => BulkOpType::Delete,
        }
    }

    pub fn meta(&self) -> &ActionMeta {
        match self {
            BulkAction::Index { meta, .. }
            | BulkAction::Create { meta, .. }
            | BulkAction::Update { meta, .. }
            | BulkAction::Delete { meta } => meta,
        }
    }
}

/// `refresh` parameter of a bulk request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    True,
    False,
    WaitFor,
}

impl Refresh {
    pub fn as_str(&self) -> &'static str {
        match self {
            Refresh::True => "true",
            Refresh::False => "false",
            Refresh::WaitFor => "wait_for",
        }
    }
}

/// Successful item of a bulk response
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemOk {
    pub op_type: BulkOpType,
    pub index: String,
    pub id: Option<String>,
    pub status: Option<i64>,
    pub version: i64,
    pub seq_no: i64,
    pub primary_term: i64,
    /// `created`, `updated`, `deleted`, `noop` or `not_found`, copied verbatim
    pub result: String,
}

/// Engine error of a failed bulk item
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemError {
    pub op_type: BulkOpType,
    pub id: Option<String>,
    pub status: Option<i64>,
    pub cause: ErrorCause,
    pub index: String,
    pub index_uuid: String,
    pub shard: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkItemResult {
    Ok(BulkItemOk),
    Error(BulkItemError),
}

impl BulkItemResult {
    pub fn op_type(&self) -> BulkOpType {
        match self {
            BulkItemResult::Ok(item) => item.op_type,
            BulkItemResult::Error(item) => item.op_type,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BulkItemResult::Error(_))
    }

    /// The op key present in the item decides the op type
    pub fn decode(item: &ObjectReader<'_>) -> Result<Self> {
        let op_type = BulkOpType::ALL
            .into_iter()
            .find(|op| item.contains(op.as_str()))
            .ok_or_else(|| Error::UnknownBulkOp(item.keys().collect::<Vec<_>>().join(",")))?;
        let body = item.obj(op_type.as_str())?;
        let id = body.string_opt("_id")?.map(str::to_string);
        let status = body.long_opt("status")?;

        match body.obj_opt("error")? {
            Some(error) => Ok(BulkItemResult::Error(BulkItemError {
                op_type,
                id,
                status,
                cause: ErrorCause::decode(&error)?,
                index: error.string("index")?.to_string(),
                index_uuid: error.string("index_uuid")?.to_string(),
                shard: error.value_opt("shard").map(|shard| match shard {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            })),
            None => Ok(BulkItemResult::Ok(BulkItemOk {
                op_type,
                index: body.string("_index")?.to_string(),
                id,
                status,
                version: body.long("_version")?,
                seq_no: body.long("_seq_no")?,
                primary_term: body.long("_primary_term")?,
                result: body.string("result")?.to_string(),
            })),
        }
    }
}

/// Decoded bulk response; items follow the order of the submitted actions
#[derive(Debug, Clone, PartialEq)]
pub struct BulkResult {
    pub took: i64,
    pub errors: bool,
    pub items: Vec<BulkItemResult>,
}

impl BulkResult {
    pub fn decode(response: &ObjectReader<'_>) -> Result<Self> {
        let items = match response.array_opt("items")? {
            Some(items) => items
                .objs()
                .map(|item| BulkItemResult::decode(&item?))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            took: response.long("took")?,
            errors: response.boolean("errors")?,
            items,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &BulkItemError> {
        self.items.iter().filter_map(|item| match item {
            BulkItemResult::Error(error) => Some(error),
            BulkItemResult::Ok(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(item: Value) -> Result<BulkItemResult> {
        BulkItemResult::decode(&ObjectReader::from_value(&item).unwrap())
    }

    #[test]
    fn test_update_item_ok() {
        let item = decode(json!({"update": {
            "_index": "posts", "_id": "1", "_version": 4, "result": "noop",
            "_seq_no": 9, "_primary_term": 1, "status": 200
        }}))
        .unwrap();
        match item {
            BulkItemResult::Ok(ok) => {
                assert_eq!(ok.op_type, BulkOpType::Update);
                assert_eq!(ok.result, "noop");
                assert_eq!(ok.version, 4);
                assert_eq!(ok.status, Some(200));
            }
            other => panic!("expected ok item, got {:?}", other),
        }
    }

    #[test]
    fn test_update_item_error() {
        let item = decode(json!({"update": {
            "_index": "posts", "_id": "1", "status": 409,
            "error": {
                "type": "version_conflict_engine_exception",
                "reason": "[1]: version conflict",
                "index": "posts", "index_uuid": "aBc", "shard": "0"
            }
        }}))
        .unwrap();
        assert_eq!(item.op_type(), BulkOpType::Update);
        match item {
            BulkItemResult::Error(error) => {
                assert_eq!(error.cause.error_type, "version_conflict_engine_exception");
                assert_eq!(error.index_uuid, "aBc");
                assert_eq!(error.shard.as_deref(), Some("0"));
                assert_eq!(error.status, Some(409));
            }
            other => panic!("expected error item, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_op_names_keys() {
        let err = decode(json!({"upsert": {}})).unwrap_err();
        assert!(matches!(err, Error::UnknownBulkOp(ref keys) if keys == "upsert"));
    }

    #[test]
    fn test_bulk_result_requires_took_and_errors() {
        let response = json!({"took": 3, "items": []});
        let err = BulkResult::decode(&ObjectReader::from_value(&response).unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: errors");
    }
}

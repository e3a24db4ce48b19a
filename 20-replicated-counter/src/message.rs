//! JSON bodies exchanged between clients, the hub and replicas.

use serde::{Deserialize, Deserializer, Serialize};

pub use crate::store::Snapshot;

/// `{id, count}`: a client update (count is a delta) or a read result (count
/// is the node's current total).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterMessage {
    pub id: String,
    pub count: i64,
}

/// One increment event in flight towards the hub.
///
/// `source_id` names the replica that already applied the delta locally; the
/// hub leaves it out of the fan-out. Replicas send it as `sourceid`, and
/// `sourceId` is accepted too. An empty string counts as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaMessage {
    pub id: String,
    pub count: i64,
    #[serde(
        rename = "sourceid",
        alias = "sourceId",
        default,
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_id: Option<String>,
}

impl DeltaMessage {
    pub fn new(id: impl Into<String>, count: i64) -> Self {
        Self {
            id: id.into(),
            count,
            source_id: None,
        }
    }

    pub fn from_source(id: impl Into<String>, count: i64, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            count,
            source_id: Some(source_id.into()),
        }
    }
}

/// A replica as the hub knows it. `id` is the unique node identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub endpoint: String,
}

/// Body of the hub's `POST /syncdelta` point repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRepair {
    pub endpoint: String,
    pub id: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub message: String,
}

impl Status {
    pub fn alive() -> Self {
        Self {
            message: "Alive".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|source| !source.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_accepts_either_source_spelling() {
        let lower: DeltaMessage =
            serde_json::from_str(r#"{"id":"x","count":5,"sourceid":"a"}"#).unwrap();
        let camel: DeltaMessage =
            serde_json::from_str(r#"{"id":"x","count":5,"sourceId":"a"}"#).unwrap();
        assert_eq!(lower, DeltaMessage::from_source("x", 5, "a"));
        assert_eq!(lower, camel);
    }

    #[test]
    fn missing_or_blank_source_is_absent() {
        let missing: DeltaMessage = serde_json::from_str(r#"{"id":"x","count":3}"#).unwrap();
        let blank: DeltaMessage =
            serde_json::from_str(r#"{"id":"x","count":3,"sourceid":""}"#).unwrap();
        assert_eq!(missing.source_id, None);
        assert_eq!(blank.source_id, None);
    }

    #[test]
    fn forwarded_delta_uses_lowercase_source_field() {
        let json = serde_json::to_value(DeltaMessage::from_source("x", -2, "a")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "x", "count": -2, "sourceid": "a"}));

        let json = serde_json::to_value(DeltaMessage::new("x", 1)).unwrap();
        assert_eq!(json, serde_json::json!({"id": "x", "count": 1}));
    }

    #[test]
    fn snapshot_rejects_non_integer_counts() {
        assert!(serde_json::from_str::<Snapshot>(r#"{"x": 8, "y": -1}"#).is_ok());
        assert!(serde_json::from_str::<Snapshot>(r#"{"x": "8"}"#).is_err());
        assert!(serde_json::from_str::<Snapshot>(r#"[1, 2]"#).is_err());
    }
}

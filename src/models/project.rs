use serde::{Deserialize, Serialize};

/// A project label. Events carry the resolved name, not the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
}

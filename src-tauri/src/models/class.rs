use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub title: String,
    pub emoji: String,
    /// Display date, e.g. "Feb 3, 2025".
    pub created_at: String,
    #[serde(default)]
    pub sources_count: usize,
}

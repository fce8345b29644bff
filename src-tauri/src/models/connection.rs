use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionStatus {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionStatus::Open)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// The mutation an optimistic action replays against the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Add,
    Delete,
    Update,
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Add => "add",
            ActionKind::Delete => "delete",
            ActionKind::Update => "update",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "add" => Ok(ActionKind::Add),
            "delete" => Ok(ActionKind::Delete),
            "update" => Ok(ActionKind::Update),
            other => Err(format!("Unknown action kind: {other}")),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

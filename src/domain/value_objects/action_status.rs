use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Pending,
    Success,
    Failed,
    Unknown(String),
}

impl ActionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Success => "success",
            ActionStatus::Failed => "failed",
            ActionStatus::Unknown(value) => value.as_str(),
        }
    }
}

impl From<&str> for ActionStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => ActionStatus::Pending,
            "success" => ActionStatus::Success,
            "failed" => ActionStatus::Failed,
            other => ActionStatus::Unknown(other.to_string()),
        }
    }
}

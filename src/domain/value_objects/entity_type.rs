use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain entities the offline layer caches and mutates locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Footprint,
    Product,
    Goal,
    Profile,
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Footprint => "footprint",
            EntityType::Product => "product",
            EntityType::Goal => "goal",
            EntityType::Profile => "profile",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "footprint" => Ok(EntityType::Footprint),
            "product" => Ok(EntityType::Product),
            "goal" => Ok(EntityType::Goal),
            "profile" => Ok(EntityType::Profile),
            other => Err(format!("Unknown entity type: {other}")),
        }
    }

    /// API collection path the sync engine replays mutations against.
    pub fn api_path(&self) -> &str {
        match self {
            EntityType::Footprint => "/api/footprints",
            EntityType::Product => "/api/products",
            EntityType::Goal => "/api/goals",
            EntityType::Profile => "/api/profile",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

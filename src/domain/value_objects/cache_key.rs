use serde::{Deserialize, Serialize};
use std::fmt;

/// Hierarchical cache key, colon-separated so namespaces can be invalidated
/// with a glob pattern (`summary:user:42:*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(value: String) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    /// Joins segments into a key; segments themselves must not contain the
    /// separator or the wildcard character.
    pub fn from_segments(segments: &[&str]) -> Result<Self, String> {
        for segment in segments {
            if segment.contains(':') || segment.contains('*') {
                return Err(format!("Invalid cache key segment: {segment}"));
            }
        }
        Self::new(segments.join(":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Cache key cannot be empty".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

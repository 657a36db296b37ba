//! Temporary resources held by the staging store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// On-disk marker for a resource that has not been published yet.
pub const STAGED_SUFFIX: &str = ".tmp";

/// Returns true if `name` carries the staged marker.
pub fn is_staged_name(name: &str) -> bool {
    name.ends_with(STAGED_SUFFIX)
}

/// What a staged file is used for. Forms the name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRole {
    Audio,
    Video,
    Merged,
    Upload,
}

impl ResourceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceRole::Audio => "audio",
            ResourceRole::Video => "video",
            ResourceRole::Merged => "merged",
            ResourceRole::Upload => "upload",
        }
    }
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for ResourceRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(ResourceRole::Audio),
            "video" => Ok(ResourceRole::Video),
            "merged" => Ok(ResourceRole::Merged),
            "upload" => Ok(ResourceRole::Upload),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Lifecycle state of a temporary resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Written (or reserved) but not yet visible to clients
    Staged,
    /// Visible through the gateway
    Published,
    /// Removed from disk
    Deleted,
}

/// A file owned by the staging store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempResource {
    /// File name inside the staging directory
    pub name: String,
    pub role: ResourceRole,
    pub state: ResourceState,
    /// Absolute path on disk
    pub path: PathBuf,
}

impl TempResource {
    pub fn is_staged(&self) -> bool {
        self.state == ResourceState::Staged
    }

    /// Name the resource will carry once published.
    pub fn public_name(&self) -> &str {
        self.name.strip_suffix(STAGED_SUFFIX).unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [
            ResourceRole::Audio,
            ResourceRole::Video,
            ResourceRole::Merged,
            ResourceRole::Upload,
        ] {
            assert_eq!(role.as_str().parse::<ResourceRole>().unwrap(), role);
        }
        assert_eq!(
            "image".parse::<ResourceRole>(),
            Err(UnknownRole("image".to_string()))
        );
    }

    #[test]
    fn test_staged_marker() {
        assert!(is_staged_name("merged_abc.mp4.tmp"));
        assert!(!is_staged_name("merged_abc.mp4"));
    }

    #[test]
    fn test_public_name_strips_marker() {
        let resource = TempResource {
            name: "merged_abc.mp4.tmp".to_string(),
            role: ResourceRole::Merged,
            state: ResourceState::Staged,
            path: PathBuf::from("/tmp/merged_abc.mp4.tmp"),
        };
        assert!(resource.is_staged());
        assert_eq!(resource.public_name(), "merged_abc.mp4");
    }
}

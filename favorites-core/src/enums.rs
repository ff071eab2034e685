//! Enum types for favorites entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discriminator for the closed set of asset variants.
///
/// Serialized as the lowercase `type` field of every persisted asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Chart,
    Insight,
    Audience,
}

impl AssetKind {
    /// Every variant, in declaration order.
    pub const ALL: [AssetKind; 3] = [AssetKind::Chart, AssetKind::Insight, AssetKind::Audience];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Chart => "chart",
            AssetKind::Insight => "insight",
            AssetKind::Audience => "audience",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chart" => Ok(AssetKind::Chart),
            "insight" => Ok(AssetKind::Insight),
            "audience" => Ok(AssetKind::Audience),
            other => Err(other.to_string()),
        }
    }
}

//! The closed asset sum type and its byte codec.
//!
//! Every persisted or cached asset is one of [`Chart`], [`Insight`] or
//! [`Audience`]. Decoding reads the `type` discriminator first and then
//! decodes the full payload into the matching variant; an unrecognized
//! discriminator is an [`FavoritesError::UnknownType`], never a default.

use crate::{
    AssetHeader, AssetId, AssetKind, Audience, Chart, FavoritesError, FavoritesResult, Insight,
    OwnerId, ValidationError,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A favorite asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Chart(Chart),
    Insight(Insight),
    Audience(Audience),
}

/// Only the discriminator of an encoded asset.
#[derive(Deserialize)]
struct Discriminator {
    #[serde(rename = "type")]
    kind: String,
}

impl Asset {
    pub fn header(&self) -> &AssetHeader {
        match self {
            Asset::Chart(c) => &c.header,
            Asset::Insight(i) => &i.header,
            Asset::Audience(a) => &a.header,
        }
    }

    fn header_mut(&mut self) -> &mut AssetHeader {
        match self {
            Asset::Chart(c) => &mut c.header,
            Asset::Insight(i) => &mut i.header,
            Asset::Audience(a) => &mut a.header,
        }
    }

    pub fn id(&self) -> &AssetId {
        &self.header().id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.header().owner_id
    }

    /// The discriminator stored in the header.
    pub fn kind(&self) -> AssetKind {
        self.header().kind
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn description(&self) -> Option<&str> {
        self.header().description.as_deref()
    }

    /// Copy of this asset with `description` replaced.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.header_mut().description = Some(description.into());
        self
    }

    /// Copy of this asset owned by `owner_id`.
    pub fn with_owner(mut self, owner_id: impl Into<OwnerId>) -> Self {
        self.header_mut().owner_id = owner_id.into();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Asset::Chart(c) => c.validate(),
            Asset::Insight(i) => i.validate(),
            Asset::Audience(a) => a.validate(),
        }
    }

    /// Serialize to the JSON payload used by both storage tiers.
    pub fn encode(&self) -> FavoritesResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a payload produced by [`Asset::encode`].
    pub fn decode(bytes: &[u8]) -> FavoritesResult<Self> {
        let Discriminator { kind } = serde_json::from_slice(bytes)?;
        match parse_kind(&kind)? {
            AssetKind::Chart => Ok(Asset::Chart(serde_json::from_slice(bytes)?)),
            AssetKind::Insight => Ok(Asset::Insight(serde_json::from_slice(bytes)?)),
            AssetKind::Audience => Ok(Asset::Audience(serde_json::from_slice(bytes)?)),
        }
    }

    fn from_value(value: serde_json::Value) -> FavoritesResult<Self> {
        let kind = value
            .get("type")
            .and_then(|k| k.as_str())
            .ok_or_else(|| FavoritesError::Codec {
                reason: "missing field `type`".to_string(),
            })?;
        match parse_kind(kind)? {
            AssetKind::Chart => Ok(Asset::Chart(serde_json::from_value(value)?)),
            AssetKind::Insight => Ok(Asset::Insight(serde_json::from_value(value)?)),
            AssetKind::Audience => Ok(Asset::Audience(serde_json::from_value(value)?)),
        }
    }
}

fn parse_kind(kind: &str) -> FavoritesResult<AssetKind> {
    kind.parse()
        .map_err(|kind| FavoritesError::UnknownType { kind })
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Asset::Chart(c) => c.serialize(serializer),
            Asset::Insight(i) => i.serialize(serializer),
            Asset::Audience(a) => a.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Asset::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl From<Chart> for Asset {
    fn from(c: Chart) -> Self {
        Asset::Chart(c)
    }
}

impl From<Insight> for Asset {
    fn from(i: Insight) -> Self {
        Asset::Insight(i)
    }
}

impl From<Audience> for Asset {
    fn from(a: Audience) -> Self {
        Asset::Audience(a)
    }
}

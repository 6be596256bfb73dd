//! Asset model: how a transaction names the good it creates or moves.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Composition type declared by an asset. Absence means [`AssetType::Pure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Pure,
    Mix,
    Composition,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssetType::Pure => write!(f, "pure"),
            AssetType::Mix => write!(f, "mix"),
            AssetType::Composition => write!(f, "composition"),
        }
    }
}

/// The raw `type` tag. Unknown tags are kept verbatim so re-serializing a
/// transaction never changes its id, but they never count as a declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetTypeTag {
    Known(AssetType),
    Other(Value),
}

/// Contents of a CREATE transaction's `asset.data`.
///
/// `type` and `script` distinguish an absent key (`None`) from one that is
/// present, so an explicit `null` survives a round trip and the id holds.
/// A `"type": null` is kept as `AssetTypeTag::Other(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetData {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<AssetTypeTag>,
    /// Policy source text, see [`crate::policy`].
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub script: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Marks a key as present whatever its value, `null` included.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl AssetData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, asset_type: AssetType) -> Self {
        self.kind = Some(AssetTypeTag::Known(asset_type));
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(Some(script.into()));
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The policy source, when one is attached.
    pub fn script(&self) -> Option<&str> {
        self.script.as_ref().and_then(|script| script.as_deref())
    }

    /// The declared composition type, if it is one the engine recognises.
    pub fn asset_type(&self) -> Option<AssetType> {
        match &self.kind {
            Some(AssetTypeTag::Known(t)) => Some(*t),
            _ => None,
        }
    }
}

/// A transaction's `asset` field.
///
/// CREATE transactions embed the definition; TRANSFER transactions link to
/// the CREATE transaction whose id is the asset's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Asset {
    Link { id: String },
    Definition { data: Option<AssetData> },
}

impl Asset {
    pub fn definition(data: Option<AssetData>) -> Self {
        Asset::Definition { data }
    }

    pub fn link(id: impl Into<String>) -> Self {
        Asset::Link { id: id.into() }
    }

    pub fn data(&self) -> Option<&AssetData> {
        match self {
            Asset::Definition { data } => data.as_ref(),
            Asset::Link { .. } => None,
        }
    }

    pub fn linked_id(&self) -> Option<&str> {
        match self {
            Asset::Link { id } => Some(id),
            Asset::Definition { .. } => None,
        }
    }
}

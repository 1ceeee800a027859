use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a karma record points at. Resolved once when the record is created
/// and stored as an `(object_type, object_uuid)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum KarmaTarget {
    Post(Uuid),
    Comment(Uuid),
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("unknown karma target type '{0}'")]
    UnknownType(String),

    #[error("invalid karma target id '{id}': {source}")]
    InvalidId {
        id: String,
        #[source]
        source: uuid::Error,
    },
}

impl KarmaTarget {
    pub const POST: &'static str = "post";
    pub const COMMENT: &'static str = "comment";

    pub fn id(&self) -> Uuid {
        match self {
            Self::Post(id) | Self::Comment(id) => *id,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Post(_) => Self::POST,
            Self::Comment(_) => Self::COMMENT,
        }
    }

    /// Rebuild a target from its stored columns.
    pub fn from_parts(type_tag: &str, id: &str) -> Result<Self, TargetError> {
        let uuid = id.parse::<Uuid>().map_err(|source| TargetError::InvalidId {
            id: id.to_string(),
            source,
        })?;
        match type_tag {
            Self::POST => Ok(Self::Post(uuid)),
            Self::COMMENT => Ok(Self::Comment(uuid)),
            other => Err(TargetError::UnknownType(other.to_string())),
        }
    }
}

use thiserror::Error;

use crate::engine::combat::CombatRejection;
use crate::engine::crafting::CraftRejection;
use crate::engine::encounter::AdventureRejection;
use crate::engine::quest::QuestRejection;
use crate::engine::reputation::FactionRejection;
use crate::engine::world::WorldRejection;

/// Errors that can arise while persisting or restoring engine state.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around JSON errors (snapshots and content files).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, content files, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when a snapshot or record carries a schema version we cannot read.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u32,
        found: u32,
    },

    /// A required top-level snapshot field is entirely absent.
    #[error("snapshot is missing required field: {0}")]
    MissingField(&'static str),

    /// Stored payload does not match its recorded checksum.
    #[error("checksum mismatch for save slot {slot}")]
    ChecksumMismatch { slot: String },

    /// Content tables reference ids that do not exist.
    #[error("invalid content: {0}")]
    InvalidContent(String),
}

/// A rejected action. Every variant is a precondition failure: the engine state
/// is unchanged and the action may be retried once the condition is corrected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error(transparent)]
    Combat(#[from] CombatRejection),
    #[error(transparent)]
    Craft(#[from] CraftRejection),
    #[error(transparent)]
    Quest(#[from] QuestRejection),
    #[error(transparent)]
    Faction(#[from] FactionRejection),
    #[error(transparent)]
    Adventure(#[from] AdventureRejection),
    #[error(transparent)]
    World(#[from] WorldRejection),
}

impl ActionError {
    /// Stable machine-readable reason code (e.g. `"level"`, `"busy"`).
    pub fn reason(&self) -> &'static str {
        match self {
            ActionError::Combat(r) => r.reason(),
            ActionError::Craft(r) => r.reason(),
            ActionError::Quest(r) => r.reason(),
            ActionError::Faction(r) => r.reason(),
            ActionError::Adventure(r) => r.reason(),
            ActionError::World(r) => r.reason(),
        }
    }
}

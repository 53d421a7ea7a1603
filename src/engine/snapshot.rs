//! Serializable session state.
//!
//! A snapshot is plain JSON. Loading is tolerant of damaged inventories (bad
//! counts are dropped and reported as corrections) but strict about the
//! envelope: a missing `version` or `character` and any version newer than
//! ours are errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::engine::character::CharacterState;
use crate::engine::combat::CombatSession;
use crate::engine::crafting::CraftingJob;
use crate::engine::encounter::AdventureState;
use crate::engine::errors::EngineError;
use crate::engine::log::LogEntry;
use crate::engine::quest::QuestTracker;
use crate::engine::reputation::FactionLedger;
use crate::engine::types::SNAPSHOT_SCHEMA_VERSION;
use crate::engine::world::WorldState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub version: u32,
    #[serde(default)]
    pub saved_at: DateTime<Utc>,
    #[serde(default = "Uuid::new_v4")]
    pub session_id: Uuid,
    pub character: CharacterState,
    #[serde(default)]
    pub quests: QuestTracker,
    #[serde(default)]
    pub reputation: FactionLedger,
    #[serde(default)]
    pub crafting: Option<CraftingJob>,
    #[serde(default)]
    pub combat: Option<CombatSession>,
    #[serde(default)]
    pub adventure: AdventureState,
    #[serde(default)]
    pub world: WorldState,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    /// Repairs made while parsing; reported by `Engine::restore`.
    #[serde(skip)]
    pub corrections: Vec<String>,
}

impl GameSnapshot {
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let mut value: Value = serde_json::from_str(json)?;
        let root = value
            .as_object_mut()
            .ok_or(EngineError::MissingField("version"))?;

        let found = root
            .get("version")
            .and_then(Value::as_u64)
            .ok_or(EngineError::MissingField("version"))?;
        let found = u32::try_from(found).unwrap_or(u32::MAX);
        if found > SNAPSHOT_SCHEMA_VERSION {
            return Err(EngineError::SchemaMismatch {
                entity: "snapshot",
                expected: SNAPSHOT_SCHEMA_VERSION,
                found,
            });
        }

        let character = root
            .get_mut("character")
            .ok_or(EngineError::MissingField("character"))?;
        let corrections = sanitize_inventory(character);

        let mut snapshot: GameSnapshot = serde_json::from_value(value)?;
        snapshot.corrections = corrections;
        Ok(snapshot)
    }
}

/// Drop inventory entries whose count is not a positive integer.
fn sanitize_inventory(character: &mut Value) -> Vec<String> {
    let mut corrections = Vec::new();
    if let Some(inventory) = character.get_mut("inventory").and_then(Value::as_object_mut) {
        inventory.retain(|item_id, count| {
            let valid = count
                .as_u64()
                .map_or(false, |n| n > 0 && n <= u32::MAX as u64);
            if !valid {
                corrections.push(format!("dropped invalid inventory count {} for {}", count, item_id));
            }
            valid
        });
    }
    corrections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> Value {
        let character = CharacterState::new("Lin", "qingshi_village").with_item("spirit_herb", 2);
        serde_json::json!({
            "version": 1,
            "character": serde_json::to_value(character).unwrap(),
        })
    }

    #[test]
    fn minimal_snapshot_fills_defaults() {
        let snapshot = GameSnapshot::from_json(&minimal_json().to_string()).unwrap();
        assert_eq!(snapshot.character.item_count("spirit_herb"), 2);
        assert!(snapshot.crafting.is_none());
        assert!(snapshot.log.is_empty());
        assert!(snapshot.corrections.is_empty());
    }

    #[test]
    fn envelope_fields_are_required() {
        let mut json = minimal_json();
        json.as_object_mut().unwrap().remove("version");
        assert!(matches!(
            GameSnapshot::from_json(&json.to_string()),
            Err(EngineError::MissingField("version"))
        ));

        let mut json = minimal_json();
        json.as_object_mut().unwrap().remove("character");
        assert!(matches!(
            GameSnapshot::from_json(&json.to_string()),
            Err(EngineError::MissingField("character"))
        ));
    }

    #[test]
    fn newer_versions_are_rejected() {
        let mut json = minimal_json();
        json["version"] = Value::from(SNAPSHOT_SCHEMA_VERSION + 1);
        match GameSnapshot::from_json(&json.to_string()) {
            Err(EngineError::SchemaMismatch { expected, found, .. }) => {
                assert_eq!(expected, SNAPSHOT_SCHEMA_VERSION);
                assert_eq!(found, SNAPSHOT_SCHEMA_VERSION + 1);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn bad_inventory_counts_are_dropped() {
        let mut json = minimal_json();
        json["character"]["inventory"]["qi_grass"] = Value::from(-3);
        json["character"]["inventory"]["wolf_pelt"] = Value::from(1.5);
        json["character"]["inventory"]["beast_core"] = Value::from(0);
        let snapshot = GameSnapshot::from_json(&json.to_string()).unwrap();
        assert_eq!(snapshot.character.inventory.len(), 1);
        assert_eq!(snapshot.corrections.len(), 3);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::IVec;
use std::path::{Path, PathBuf};

use crate::engine::errors::EngineError;
use crate::engine::snapshot::GameSnapshot;
use crate::engine::types::SAVE_RECORD_SCHEMA_VERSION;

const TREE_SAVES: &str = "saves";
const SAVE_PREFIX: &str = "saves:";
const PAYLOAD_CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// One stored slot: metadata for listings plus the snapshot JSON and its checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub schema_version: u32,
    pub slot: String,
    pub saved_at: DateTime<Utc>,
    pub session_id: String,
    pub character_name: String,
    pub level: u32,
    pub checksum: u32,
    pub payload: String,
}

impl SaveRecord {
    pub fn from_snapshot(slot: &str, snapshot: &GameSnapshot) -> Result<Self, EngineError> {
        let payload = snapshot.to_json()?;
        Ok(Self {
            schema_version: SAVE_RECORD_SCHEMA_VERSION,
            slot: slot.to_string(),
            saved_at: snapshot.saved_at,
            session_id: snapshot.session_id.to_string(),
            character_name: snapshot.character.name.clone(),
            level: snapshot.character.level,
            checksum: PAYLOAD_CRC.checksum(payload.as_bytes()),
            payload,
        })
    }

    pub fn verify(&self) -> bool {
        PAYLOAD_CRC.checksum(self.payload.as_bytes()) == self.checksum
    }
}

/// Listing entry without the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSummary {
    pub slot: String,
    pub saved_at: DateTime<Utc>,
    pub character_name: String,
    pub level: u32,
}

pub struct SaveStoreBuilder {
    path: PathBuf,
}

impl SaveStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<SaveStore, EngineError> {
        SaveStore::open(self.path)
    }
}

/// Sled-backed save slots.
pub struct SaveStore {
    _db: sled::Db,
    saves: sled::Tree,
}

impl SaveStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let saves = db.open_tree(TREE_SAVES)?;
        log::info!("save store opened at {}", path_ref.display());
        Ok(Self { _db: db, saves })
    }

    fn slot_key(slot: &str) -> Vec<u8> {
        format!("{}{}", SAVE_PREFIX, slot).into_bytes()
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, EngineError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, EngineError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn get_record(&self, slot: &str) -> Result<SaveRecord, EngineError> {
        let bytes = self
            .saves
            .get(Self::slot_key(slot))?
            .ok_or_else(|| EngineError::NotFound(format!("save slot {}", slot)))?;
        let record: SaveRecord = Self::deserialize(bytes)?;
        if record.schema_version != SAVE_RECORD_SCHEMA_VERSION {
            return Err(EngineError::SchemaMismatch {
                entity: "save_record",
                expected: SAVE_RECORD_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    /// Write `snapshot` into `slot`, replacing whatever was there.
    pub fn save(&self, slot: &str, snapshot: &GameSnapshot) -> Result<SaveRecord, EngineError> {
        let record = SaveRecord::from_snapshot(slot, snapshot)?;
        self.saves.insert(Self::slot_key(slot), Self::serialize(&record)?)?;
        self.saves.flush()?;
        log::info!(
            "saved session {} to slot '{}' ({} bytes)",
            record.session_id,
            slot,
            record.payload.len()
        );
        Ok(record)
    }

    pub fn load(&self, slot: &str) -> Result<GameSnapshot, EngineError> {
        let record = self.get_record(slot)?;
        if !record.verify() {
            log::warn!("checksum mismatch in save slot '{}'", slot);
            return Err(EngineError::ChecksumMismatch {
                slot: slot.to_string(),
            });
        }
        GameSnapshot::from_json(&record.payload)
    }

    pub fn exists(&self, slot: &str) -> Result<bool, EngineError> {
        Ok(self.saves.contains_key(Self::slot_key(slot))?)
    }

    pub fn delete(&self, slot: &str) -> Result<bool, EngineError> {
        let removed = self.saves.remove(Self::slot_key(slot))?.is_some();
        self.saves.flush()?;
        Ok(removed)
    }

    pub fn list(&self) -> Result<Vec<SaveSummary>, EngineError> {
        let mut summaries = Vec::new();
        for entry in self.saves.scan_prefix(SAVE_PREFIX.as_bytes()) {
            let (_, bytes) = entry?;
            let record: SaveRecord = Self::deserialize(bytes)?;
            summaries.push(SaveSummary {
                slot: record.slot,
                saved_at: record.saved_at,
                character_name: record.character_name,
                level: record.level,
            });
        }
        Ok(summaries)
    }

    /// Overwrite a slot's raw bytes. Only used to exercise corruption handling.
    #[cfg(test)]
    fn put_raw_record(&self, record: &SaveRecord) -> Result<(), EngineError> {
        self.saves.insert(Self::slot_key(&record.slot), Self::serialize(record)?)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), EngineError> {
        self.saves.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::character::CharacterState;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn snapshot(name: &str) -> GameSnapshot {
        GameSnapshot {
            version: 1,
            saved_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            session_id: Uuid::new_v4(),
            character: CharacterState::new(name, "qingshi_village"),
            quests: Default::default(),
            reputation: Default::default(),
            crafting: None,
            combat: None,
            adventure: Default::default(),
            world: Default::default(),
            log: Vec::new(),
            corrections: Vec::new(),
        }
    }

    #[test]
    fn save_load_list_delete() {
        let dir = TempDir::new().unwrap();
        let store = SaveStoreBuilder::new(dir.path()).open().unwrap();
        let original = snapshot("Lin");
        store.save("main", &original).unwrap();
        store.save("alt", &snapshot("Mei")).unwrap();

        assert_eq!(store.load("main").unwrap(), original);
        let mut names: Vec<_> = store.list().unwrap().into_iter().map(|s| s.character_name).collect();
        names.sort();
        assert_eq!(names, vec!["Lin", "Mei"]);

        assert!(store.delete("alt").unwrap());
        assert!(!store.exists("alt").unwrap());
        assert!(matches!(store.load("alt"), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let store = SaveStore::open(dir.path()).unwrap();
        let mut record = store.save("main", &snapshot("Lin")).unwrap();
        record.payload = record.payload.replace("Lin", "Nil");
        store.put_raw_record(&record).unwrap();
        assert!(matches!(
            store.load("main"),
            Err(EngineError::ChecksumMismatch { .. })
        ));
    }
}

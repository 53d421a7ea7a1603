//! Sessions persisted to sled slots and resumed later.
mod common;

use std::sync::Arc;
use tempfile::TempDir;

use cultivation::engine::{
    Action, ContentTables, Engine, EngineError, EngineSettings, GameSnapshot, LogCategory,
    ScriptedRandom, SaveStoreBuilder,
};

#[test]
fn session_survives_store_reopen() {
    let dir = TempDir::new().unwrap();
    let (mut engine, clock) = common::fresh(vec![0.1]);
    engine
        .execute(Action::AcceptQuest { quest: "side_wolf_trouble".into() })
        .unwrap();
    engine
        .execute(Action::Gather { location: "qingshi_village".into() })
        .unwrap();

    {
        let store = SaveStoreBuilder::new(dir.path()).open().unwrap();
        let record = store.save("main", &engine.snapshot()).unwrap();
        assert_eq!(record.character_name, "Lin");
        assert!(record.verify());
    }

    let store = SaveStoreBuilder::new(dir.path()).open().unwrap();
    let summaries = store.list().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].slot, "main");

    let snapshot = store.load("main").unwrap();
    let restored = Engine::restore(
        Arc::new(ContentTables::builtin()),
        snapshot,
        Box::new(ScriptedRandom::new(Vec::<f64>::new())),
        Arc::new(clock.clone()),
        EngineSettings::default(),
    );
    assert_eq!(restored.session_id(), engine.session_id());
    assert_eq!(restored.character(), engine.character());
    assert_eq!(restored.character().item_count("qi_grass"), 1);
    assert!(restored.quests().is_active("side_wolf_trouble"));
    assert_eq!(restored.world(), engine.world());
    assert_eq!(restored.log().last_id(), engine.log().last_id());

    // the gather cooldown came along with the save
    let mut restored = restored;
    let err = restored
        .execute(Action::Gather { location: "qingshi_village".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "exhausted");
}

#[test]
fn missing_slots_are_reported() {
    let dir = TempDir::new().unwrap();
    let store = SaveStoreBuilder::new(dir.path()).open().unwrap();
    assert!(matches!(store.load("nope"), Err(EngineError::NotFound(_))));
    assert!(!store.delete("nope").unwrap());
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn damaged_snapshot_is_repaired_on_restore() {
    let (engine, clock) = common::fresh(Vec::new());
    let mut json: serde_json::Value = serde_json::from_str(&engine.to_json().unwrap()).unwrap();
    json["character"]["hp"] = serde_json::Value::from(900);
    json["character"]["busy"] = serde_json::Value::from("crafting");
    json["character"]["inventory"]["spirit_herb"] = serde_json::Value::from(-2);

    let snapshot = GameSnapshot::from_json(&json.to_string()).unwrap();
    assert_eq!(snapshot.corrections.len(), 1);
    let restored = Engine::restore(
        Arc::new(ContentTables::builtin()),
        snapshot,
        Box::new(ScriptedRandom::new(Vec::<f64>::new())),
        Arc::new(clock),
        EngineSettings::default(),
    );

    let character = restored.character();
    assert_eq!(character.hp, character.max_hp());
    assert_eq!(character.busy, None);
    assert_eq!(character.item_count("spirit_herb"), 0);
    let warnings = restored
        .log()
        .entries()
        .filter(|e| e.category == LogCategory::Warning)
        .count();
    assert_eq!(warnings, 3);
}

#[test]
fn overflowing_vitals_are_reported_on_restore() {
    let (engine, clock) = common::fresh(Vec::new());
    let mut json: serde_json::Value = serde_json::from_str(&engine.to_json().unwrap()).unwrap();
    json["character"]["hp"] = serde_json::Value::from(900);
    json["character"]["mp"] = serde_json::Value::from(700);

    let snapshot = GameSnapshot::from_json(&json.to_string()).unwrap();
    assert!(snapshot.corrections.is_empty());
    let restored = Engine::restore(
        Arc::new(ContentTables::builtin()),
        snapshot,
        Box::new(ScriptedRandom::new(Vec::<f64>::new())),
        Arc::new(clock),
        EngineSettings::default(),
    );

    assert_eq!(restored.character().hp, restored.character().max_hp());
    assert_eq!(restored.character().mp, restored.character().max_mp());
    let warnings: Vec<&str> = restored
        .log()
        .entries()
        .filter(|e| e.category == LogCategory::Warning)
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].starts_with("hp 900 exceeded max"));
    assert!(warnings[1].starts_with("mp 700 exceeded max"));
}

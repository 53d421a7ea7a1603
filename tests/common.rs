//! Shared session builders for integration tests.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use cultivation::engine::{
    CharacterState, ContentTables, Engine, EngineSettings, ManualClock, ScriptedRandom,
};

#[allow(dead_code)]
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

/// Fresh session over the built-in world, replaying `draws` for every roll.
#[allow(dead_code)]
pub fn fresh(draws: Vec<f64>) -> (Engine, ManualClock) {
    let clock = ManualClock::new(start());
    let engine = Engine::new(
        Arc::new(ContentTables::builtin()),
        "Lin",
        Box::new(ScriptedRandom::new(draws)),
        Arc::new(clock.clone()),
        EngineSettings::default(),
    );
    (engine, clock)
}

/// Session whose character was edited through a snapshot before play starts.
#[allow(dead_code)]
pub fn with_character(edit: impl FnOnce(&mut CharacterState), draws: Vec<f64>) -> (Engine, ManualClock) {
    let (engine, clock) = fresh(Vec::new());
    let mut snapshot = engine.snapshot();
    edit(&mut snapshot.character);
    let engine = Engine::restore(
        Arc::new(ContentTables::builtin()),
        snapshot,
        Box::new(ScriptedRandom::new(draws)),
        Arc::new(clock.clone()),
        EngineSettings::default(),
    );
    (engine, clock)
}

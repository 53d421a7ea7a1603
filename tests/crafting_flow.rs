//! Timed refining driven by the session clock.
mod common;

use cultivation::engine::{Action, ActionOutcome, Activity, CraftResult};

fn stocked(draws: Vec<f64>) -> (cultivation::engine::Engine, cultivation::engine::ManualClock) {
    common::with_character(
        |c| {
            c.add_item("spirit_herb", 1);
            c.add_item("qi_grass", 2);
        },
        draws,
    )
}

#[test]
fn refining_consumes_materials_and_finishes_on_wait() {
    // success roll, output range roll
    let (mut engine, clock) = stocked(vec![0.1, 0.0]);

    let started = engine
        .execute(Action::StartCraft { recipe: "healing_pill".into() })
        .expect("start");
    match started {
        ActionOutcome::CraftStarted(job) => {
            assert_eq!(job.recipe_id, "healing_pill");
            assert_eq!(job.duration_secs, 45);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(engine.character().item_count("spirit_herb"), 0);
    assert_eq!(engine.character().item_count("qi_grass"), 0);
    assert_eq!(engine.character().busy, Some(Activity::Crafting));

    clock.advance_secs(15);
    let progress = engine.crafting_progress().expect("job in progress");
    assert!((progress - 100.0 / 3.0).abs() < 0.01, "progress {}", progress);

    let err = engine
        .execute(Action::Move { location: "bamboo_forest".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "busy");
    let err = engine
        .execute(Action::StartCraft { recipe: "qi_gathering_pill".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "already_crafting");

    clock.advance_secs(30);
    match engine.execute(Action::Wait { seconds: 30 }).expect("wait") {
        ActionOutcome::Waited {
            crafted: Some(CraftResult::Success { item_id, count, .. }),
        } => {
            assert_eq!(item_id, "healing_pill");
            assert_eq!(count, 2);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(engine.character().item_count("healing_pill"), 2);
    assert_eq!(engine.character().busy, None);
    assert!(engine.crafting_job().is_none());
    assert_eq!(engine.character().crafting.stats.successes, 1);
}

#[test]
fn cancelling_loses_materials() {
    let (mut engine, _clock) = stocked(Vec::new());
    engine
        .execute(Action::StartCraft { recipe: "healing_pill".into() })
        .unwrap();
    let outcome = engine.execute(Action::CancelCraft).unwrap();
    assert_eq!(outcome, ActionOutcome::CraftCancelled { recipe: "healing_pill".into() });
    assert_eq!(engine.character().busy, None);
    assert_eq!(engine.character().item_count("spirit_herb"), 0);

    let err = engine.execute(Action::CancelCraft).unwrap_err();
    assert_eq!(err.reason(), "not_crafting");
    let err = engine
        .execute(Action::StartCraft { recipe: "healing_pill".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "materials");
}

#[test]
fn recipes_must_be_learned_first() {
    let (mut engine, _clock) = common::fresh(Vec::new());
    let err = engine
        .execute(Action::StartCraft { recipe: "foundation_pill".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "not_learned");
    assert!(engine.recipe_detail("healing_pill").is_some());
}

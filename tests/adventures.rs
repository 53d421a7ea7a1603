//! Random adventures triggered on arrival and resolved by choice.
mod common;

use std::sync::Arc;

use cultivation::engine::{
    Action, ActionOutcome, Clock, ContentTables, Engine, EngineSettings, ManualClock, SeededRandom,
};

#[test]
fn merchant_adventure_resolves_by_choice() {
    // adventure roll hits, merchant is the only eligible pick
    let (mut engine, clock) = common::fresh(vec![0.0, 0.0]);
    let moved = engine
        .execute(Action::Move { location: "market_town".into() })
        .unwrap();
    assert_eq!(
        moved,
        ActionOutcome::Moved {
            location: "market_town".into(),
            adventure: Some("mysterious_merchant".into()),
            encounter: None,
        }
    );
    assert_eq!(
        engine.pending_adventure().map(|p| p.adventure_id.as_str()),
        Some("mysterious_merchant")
    );

    let err = engine
        .execute(Action::ChooseAdventureOption { choice: "buy_manual".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "currency");
    let err = engine
        .execute(Action::ChooseAdventureOption { choice: "haggle".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "unknown_choice");
    assert!(engine.pending_adventure().is_some());

    let resolved = engine
        .execute(Action::ChooseAdventureOption { choice: "buy_pills".into() })
        .unwrap();
    match resolved {
        ActionOutcome::AdventureResolved(record) => {
            assert_eq!(record.adventure_id, "mysterious_merchant");
            assert_eq!(record.choice_id.as_deref(), Some("buy_pills"));
            assert_eq!(record.at, clock.now());
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(engine.character().gold, 50);
    assert_eq!(engine.character().item_count("healing_pill"), 2);
    assert!(engine.pending_adventure().is_none());

    // inside the minimum interval nothing can fire
    let moved = engine
        .execute(Action::Move { location: "qingshi_village".into() })
        .unwrap();
    assert!(matches!(moved, ActionOutcome::Moved { adventure: None, .. }));
    let err = engine.execute(Action::DismissAdventure).unwrap_err();
    assert_eq!(err.reason(), "no_pending");
}

#[test]
fn seeded_sessions_replay_identically() {
    let script = vec![
        Action::Gather { location: "qingshi_village".into() },
        Action::Move { location: "market_town".into() },
        Action::DismissAdventure,
        Action::Move { location: "qingshi_village".into() },
        Action::Move { location: "bamboo_forest".into() },
        Action::CombatAction { command: cultivation::engine::CombatAction::Attack },
        Action::CombatAction { command: cultivation::engine::CombatAction::Attack },
    ];

    let play = |seed: u64| {
        let clock = ManualClock::new(common::start());
        let mut engine = Engine::new(
            Arc::new(ContentTables::builtin()),
            "Lin",
            Box::new(SeededRandom::from_seed(seed)),
            Arc::new(clock),
            EngineSettings::default(),
        );
        let outcomes: Vec<String> = script
            .iter()
            .cloned()
            .map(|action| match engine.execute(action) {
                Ok(outcome) => serde_json::to_string(&outcome).unwrap(),
                Err(err) => err.reason().to_string(),
            })
            .collect();
        (outcomes, engine.character().clone())
    };

    let (first_outcomes, first_character) = play(42);
    let (second_outcomes, second_character) = play(42);
    assert_eq!(first_outcomes, second_outcomes);
    assert_eq!(first_character, second_character);
}

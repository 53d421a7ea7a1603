//! Joining a faction, working its tasks and walking away.
mod common;

use chrono::Duration;
use cultivation::engine::{Action, ActionOutcome};

#[test]
fn join_requirements_are_enforced() {
    let (mut engine, _clock) = common::fresh(Vec::new());
    let err = engine
        .execute(Action::JoinFaction { faction: "hundred_herb_valley".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "level");
    let err = engine
        .execute(Action::JoinFaction { faction: "jade_palace".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "unknown_faction");
    assert!(engine.character().faction.is_none());
    assert!(engine.faction_rank().is_none());
}

#[test]
fn tasks_build_standing_until_betrayal() {
    let (mut engine, clock) = common::with_character(
        |c| {
            c.level = 3;
            c.intelligence = 6;
        },
        Vec::new(),
    );

    let joined = engine
        .execute(Action::JoinFaction { faction: "hundred_herb_valley".into() })
        .expect("join");
    assert_eq!(joined, ActionOutcome::FactionJoined { faction: "hundred_herb_valley".into() });
    let rank = engine.faction_rank().expect("member");
    assert_eq!(rank.rank, "Apprentice");
    assert_eq!(rank.next_threshold, Some(500));

    let err = engine
        .execute(Action::JoinFaction { faction: "azure_cloud_sect".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "member_of_other");
    let err = engine
        .execute(Action::LearnFactionSkill { skill: "alchemy_mastery".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "standing");

    engine
        .execute(Action::CompleteFactionTask { task: "tend_garden".into() })
        .expect("first task");
    assert_eq!(engine.character().standing_at("hundred_herb_valley"), 40);
    assert_eq!(engine.character().item_count("spirit_herb"), 2);

    let err = engine
        .execute(Action::CompleteFactionTask { task: "tend_garden".into() })
        .unwrap_err();
    assert_eq!(err.reason(), "cooldown");

    clock.advance(Duration::hours(24));
    engine
        .execute(Action::CompleteFactionTask { task: "tend_garden".into() })
        .expect("task after cooldown");
    assert_eq!(engine.character().standing_at("hundred_herb_valley"), 80);

    let left = engine.execute(Action::LeaveFaction).expect("leave");
    assert_eq!(left, ActionOutcome::FactionLeft { faction: "hundred_herb_valley".into() });
    assert!(engine.character().faction.is_none());
    assert_eq!(engine.character().standing_at("hundred_herb_valley"), -80);
    assert_eq!(engine.faction_ledger().betrayals, vec!["hundred_herb_valley".to_string()]);

    let err = engine.execute(Action::LeaveFaction).unwrap_err();
    assert_eq!(err.reason(), "not_member");
}

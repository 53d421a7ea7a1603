//! Applies sparse reward bundles to the character.
//!
//! Each present field is applied with its own clamp and produces one log entry
//! for its category. Experience may cascade into level-ups, standing into rank
//! promotions and crafting experience into refining levels; all of those emit
//! their progress events here.

use crate::engine::context::RuleContext;
use crate::engine::crafting::grant_craft_experience;
use crate::engine::log::LogCategory;
use crate::engine::progress::ProgressEvent;
use crate::engine::reputation::gain_standing;
use crate::engine::types::RewardBundle;

fn signed_category(delta: i64) -> LogCategory {
    if delta >= 0 {
        LogCategory::Gain
    } else {
        LogCategory::Loss
    }
}

/// Grant experience and announce every level reached.
pub fn grant_experience(ctx: &mut RuleContext<'_>, amount: u64) {
    if amount == 0 {
        return;
    }
    ctx.record(LogCategory::Gain, format!("+{} experience", amount));
    for level in ctx.character.add_experience(amount) {
        let label = ctx.character.cultivation.clone();
        ctx.record(
            LogCategory::Info,
            format!("Breakthrough! You reached level {} ({})", level, label),
        );
        ctx.emit(ProgressEvent::ReachLevel { level });
    }
}

pub fn apply_rewards(ctx: &mut RuleContext<'_>, bundle: &RewardBundle) {
    if let Some(experience) = bundle.experience {
        grant_experience(ctx, experience);
    }

    if let Some(delta) = bundle.currency {
        let applied = ctx.character.adjust_gold(delta);
        if applied != 0 || delta != 0 {
            ctx.record(signed_category(delta), format!("{:+} gold", applied));
        }
    }

    if let Some(delta) = bundle.hit_points {
        let applied = ctx.character.adjust_hp(delta);
        let (hp, max) = (ctx.character.hp, ctx.character.max_hp());
        ctx.record(
            signed_category(delta),
            format!("{:+} hp ({}/{})", applied, hp, max),
        );
        if hp == 0 {
            ctx.record(LogCategory::Danger, "You collapse, your strength spent.");
        }
    }

    if let Some(delta) = bundle.mana {
        let applied = ctx.character.adjust_mp(delta);
        let (mp, max) = (ctx.character.mp, ctx.character.max_mp());
        ctx.record(
            signed_category(delta),
            format!("{:+} mp ({}/{})", applied, mp, max),
        );
    }

    for grant in bundle.items.iter().filter(|g| g.count > 0) {
        let name = ctx.content.item_name(&grant.id).to_string();
        ctx.character.add_item(&grant.id, grant.count);
        ctx.record(LogCategory::Gain, format!("Obtained {} x{}", name, grant.count));
        ctx.emit(ProgressEvent::CollectItem {
            item: grant.id.clone(),
            count: grant.count,
        });
    }

    if let Some(title) = &bundle.title {
        ctx.character.title = title.clone();
        ctx.record(LogCategory::Gain, format!("New title: {}", title));
    }

    for (faction_id, amount) in &bundle.standing {
        gain_standing(ctx, faction_id, *amount);
    }

    if let Some(amount) = bundle.crafting_experience {
        grant_craft_experience(ctx, amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::fixture::Fixture;

    #[test]
    fn overkill_damage_clamps_hp_to_zero() {
        let mut fx = Fixture::builtin();
        apply_rewards(&mut fx.ctx(), &RewardBundle::new().with_hit_points(-150));
        assert_eq!(fx.character.hp, 0);
        assert!(fx.messages().iter().any(|m| m.starts_with("-100 hp")));
    }

    #[test]
    fn empty_bundle_changes_nothing() {
        let mut fx = Fixture::builtin();
        let before = fx.character.clone();
        apply_rewards(&mut fx.ctx(), &RewardBundle::new());
        assert_eq!(fx.character, before);
        assert!(fx.log.is_empty());
        assert!(fx.drain().is_empty());
    }

    #[test]
    fn one_entry_per_field_category() {
        let mut fx = Fixture::builtin();
        fx.character.adjust_mp(-30);
        let bundle = RewardBundle::new()
            .with_currency(-500)
            .with_mana(10)
            .with_item("spirit_herb", 2)
            .with_title("Herb Picker");
        apply_rewards(&mut fx.ctx(), &bundle);
        assert_eq!(fx.character.gold, 0);
        assert_eq!(fx.character.mp, 30);
        assert_eq!(fx.character.item_count("spirit_herb"), 2);
        assert_eq!(fx.character.title, "Herb Picker");
        let messages = fx.messages();
        assert_eq!(messages.len(), 4);
        assert!(messages.contains(&"Obtained Spirit Herb x2".to_string()));
        assert_eq!(
            fx.drain(),
            vec![ProgressEvent::CollectItem {
                item: "spirit_herb".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn experience_emits_reach_level_per_level() {
        let mut fx = Fixture::builtin();
        apply_rewards(&mut fx.ctx(), &RewardBundle::new().with_experience(260));
        assert_eq!(fx.character.level, 3);
        assert_eq!(
            fx.drain(),
            vec![
                ProgressEvent::ReachLevel { level: 2 },
                ProgressEvent::ReachLevel { level: 3 }
            ]
        );
    }

    #[test]
    fn standing_and_craft_experience_route_through_their_ledgers() {
        let mut fx = Fixture::builtin();
        let bundle = RewardBundle::new()
            .with_standing("azure_cloud_sect", 30)
            .with_crafting_experience(120);
        apply_rewards(&mut fx.ctx(), &bundle);
        assert_eq!(fx.character.standing_at("azure_cloud_sect"), 30);
        assert_eq!(fx.character.crafting.level, 2);
        let events = fx.drain();
        assert!(events.contains(&ProgressEvent::ReachStanding {
            faction: "azure_cloud_sect".into(),
            standing: 30
        }));
        assert!(events.contains(&ProgressEvent::ReachCraftLevel { level: 2 }));
    }
}

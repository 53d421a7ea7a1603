//! Faction standing, ranks, membership, faction skills and faction tasks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::engine::context::RuleContext;
use crate::engine::content::ContentTables;
use crate::engine::character::CharacterState;
use crate::engine::log::LogCategory;
use crate::engine::progress::ProgressEvent;
use crate::engine::reward::apply_rewards;
use crate::engine::types::{Alignment, RewardBundle};

pub const TASK_COOLDOWN_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactionRejection {
    #[error("no such faction: {0}")]
    UnknownFaction(String),
    #[error("already a member of {0}")]
    MemberOfOther(String),
    #[error("already a member of this faction")]
    AlreadyMember,
    #[error("requires level {required} (you are {current})")]
    Level { required: u32, current: u32 },
    #[error("requires cultivation {0}")]
    Cultivation(String),
    #[error("requires intelligence {required} (you have {current})")]
    Attribute { required: i32, current: i32 },
    #[error("requires {0:?} alignment")]
    Alignment(Alignment),
    #[error("standing at {faction} must be at least {required} (currently {current})")]
    Standing {
        faction: String,
        required: i64,
        current: i64,
    },
    #[error("not a member of any faction")]
    NotMember,
    #[error("{0} is not taught by your faction")]
    SkillNotOffered(String),
    #[error("{0} is already learned")]
    AlreadyLearned(String),
    #[error("no such task: {0}")]
    UnknownTask(String),
    #[error("task {task} is on cooldown until {ready_at}")]
    TaskCooldown {
        task: String,
        ready_at: DateTime<Utc>,
    },
}

impl FactionRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            FactionRejection::UnknownFaction(_) => "unknown_faction",
            FactionRejection::MemberOfOther(_) => "member_of_other",
            FactionRejection::AlreadyMember => "already_member",
            FactionRejection::Level { .. } => "level",
            FactionRejection::Cultivation(_) => "cultivation",
            FactionRejection::Attribute { .. } => "attribute",
            FactionRejection::Alignment(_) => "alignment",
            FactionRejection::Standing { .. } => "standing",
            FactionRejection::NotMember => "not_member",
            FactionRejection::SkillNotOffered(_) => "skill_not_offered",
            FactionRejection::AlreadyLearned(_) => "already_learned",
            FactionRejection::UnknownTask(_) => "unknown_task",
            FactionRejection::TaskCooldown { .. } => "cooldown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Same,
    Ally,
    Enemy,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactionRank {
    pub faction_id: String,
    pub rank: String,
    pub standing: i64,
    pub benefits: Vec<String>,
    /// Standing needed for the next rank, if any.
    pub next_threshold: Option<i64>,
}

/// Per-session faction bookkeeping that does not live on the character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FactionLedger {
    /// `faction:task` → last completion time.
    #[serde(default)]
    pub task_completed_at: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub betrayals: Vec<String>,
}

fn task_key(faction_id: &str, task_id: &str) -> String {
    format!("{}:{}", faction_id, task_id)
}

/// Add (or subtract) standing and announce promotions.
pub fn gain_standing(ctx: &mut RuleContext<'_>, faction_id: &str, amount: i64) {
    let content = ctx.content;
    let before = ctx.character.standing_at(faction_id);
    let after = before.saturating_add(amount);
    ctx.character.standing.insert(faction_id.to_string(), after);
    let name = content.faction_name(faction_id).to_string();
    if amount != 0 {
        let category = if amount > 0 {
            LogCategory::Gain
        } else {
            LogCategory::Loss
        };
        ctx.record(category, format!("{:+} standing with {}", amount, name));
    }

    if let Some(faction) = content.faction(faction_id) {
        let old_threshold = faction.rank_for(before).map(|(t, _)| t);
        if let Some((threshold, info)) = faction.rank_for(after) {
            let promoted = old_threshold.map_or(true, |old| threshold > old);
            if promoted && amount > 0 {
                let mut message = format!("Promoted to {} of {}", info.rank, name);
                if !info.benefits.is_empty() {
                    message.push_str(&format!(". Unlocked: {}", info.benefits.join(", ")));
                }
                ctx.record(LogCategory::Info, message);
            }
        }
    }

    ctx.emit(ProgressEvent::ReachStanding {
        faction: faction_id.to_string(),
        standing: after,
    });
}

/// Check every join requirement without changing anything.
pub fn can_join(
    content: &ContentTables,
    character: &CharacterState,
    faction_id: &str,
) -> Result<(), FactionRejection> {
    let faction = content
        .faction(faction_id)
        .ok_or_else(|| FactionRejection::UnknownFaction(faction_id.to_string()))?;
    match character.faction.as_deref() {
        Some(current) if current != faction_id => {
            return Err(FactionRejection::MemberOfOther(current.to_string()))
        }
        Some(_) => return Err(FactionRejection::AlreadyMember),
        None => {}
    }
    let req = &faction.join;
    if let Some(level) = req.level {
        if character.level < level {
            return Err(FactionRejection::Level {
                required: level,
                current: character.level,
            });
        }
    }
    if let Some(cultivation) = &req.cultivation {
        if !character.cultivation.contains(cultivation.as_str()) {
            return Err(FactionRejection::Cultivation(cultivation.clone()));
        }
    }
    if let Some(intelligence) = req.intelligence {
        if character.intelligence < intelligence {
            return Err(FactionRejection::Attribute {
                required: intelligence,
                current: character.intelligence,
            });
        }
    }
    if let Some(alignment) = req.alignment {
        if character.alignment != alignment {
            return Err(FactionRejection::Alignment(alignment));
        }
    }
    for (other, minimum) in &req.standing {
        let current = character.standing_at(other);
        if current < *minimum {
            return Err(FactionRejection::Standing {
                faction: other.clone(),
                required: *minimum,
                current,
            });
        }
    }
    Ok(())
}

pub fn join(ctx: &mut RuleContext<'_>, faction_id: &str) -> Result<(), FactionRejection> {
    can_join(ctx.content, ctx.character, faction_id)?;
    ctx.character.faction = Some(faction_id.to_string());
    ctx.character
        .standing
        .entry(faction_id.to_string())
        .or_insert(0);
    let name = ctx.content.faction_name(faction_id).to_string();
    let rank = ctx
        .content
        .faction(faction_id)
        .and_then(|f| f.rank_for(ctx.character.standing_at(faction_id)))
        .map(|(_, info)| info.rank.clone());
    match rank {
        Some(rank) => ctx.record(LogCategory::Info, format!("You joined {} as {}", name, rank)),
        None => ctx.record(LogCategory::Info, format!("You joined {}", name)),
    }
    ctx.emit(ProgressEvent::JoinFaction {
        faction: faction_id.to_string(),
    });
    Ok(())
}

/// Leave the current faction. Positive standing is negated as a betrayal penalty.
pub fn leave(ctx: &mut RuleContext<'_>, ledger: &mut FactionLedger) -> Result<String, FactionRejection> {
    let faction_id = ctx
        .character
        .faction
        .take()
        .ok_or(FactionRejection::NotMember)?;
    let name = ctx.content.faction_name(&faction_id).to_string();
    let standing = ctx.character.standing_at(&faction_id);
    if standing > 0 {
        ctx.character.standing.insert(faction_id.clone(), -standing);
        ledger.betrayals.push(faction_id.clone());
        ctx.record(
            LogCategory::Danger,
            format!("You betrayed {}. Standing {} became {}", name, standing, -standing),
        );
    } else {
        ctx.record(LogCategory::Info, format!("You left {}", name));
    }
    Ok(faction_id)
}

pub fn current_rank(content: &ContentTables, character: &CharacterState) -> Option<FactionRank> {
    let faction_id = character.faction.as_deref()?;
    let faction = content.faction(faction_id)?;
    let standing = character.standing_at(faction_id);
    let (threshold, info) = faction.rank_for(standing)?;
    let next_threshold = faction
        .ranks
        .range(threshold + 1..)
        .next()
        .map(|(t, _)| *t);
    Some(FactionRank {
        faction_id: faction_id.to_string(),
        rank: info.rank.clone(),
        standing,
        benefits: info.benefits.clone(),
        next_threshold,
    })
}

pub fn relation(content: &ContentTables, faction_a: &str, faction_b: &str) -> Relation {
    if faction_a == faction_b {
        return Relation::Same;
    }
    match content.faction(faction_a) {
        Some(f) if f.allies.iter().any(|id| id == faction_b) => Relation::Ally,
        Some(f) if f.enemies.iter().any(|id| id == faction_b) => Relation::Enemy,
        _ => Relation::Neutral,
    }
}

pub fn learn_faction_skill(ctx: &mut RuleContext<'_>, skill_id: &str) -> Result<(), FactionRejection> {
    let content = ctx.content;
    let faction_id = ctx
        .character
        .faction
        .clone()
        .ok_or(FactionRejection::NotMember)?;
    let offered = content
        .faction(&faction_id)
        .map(|f| f.exclusive_skills.iter().any(|s| s == skill_id))
        .unwrap_or(false);
    let skill = match content.skill(skill_id) {
        Some(skill) if offered => skill,
        _ => return Err(FactionRejection::SkillNotOffered(skill_id.to_string())),
    };
    let current = ctx.character.standing_at(&faction_id);
    if current < skill.required_standing {
        return Err(FactionRejection::Standing {
            faction: faction_id,
            required: skill.required_standing,
            current,
        });
    }
    if !ctx.character.learn_skill(skill_id) {
        return Err(FactionRejection::AlreadyLearned(skill_id.to_string()));
    }
    ctx.record(LogCategory::Gain, format!("Learned {}", skill.name));
    ctx.emit(ProgressEvent::LearnSkill {
        skill: skill_id.to_string(),
    });
    Ok(())
}

/// Complete a task of the current faction and apply its rewards.
pub fn complete_task(
    ctx: &mut RuleContext<'_>,
    ledger: &mut FactionLedger,
    task_id: &str,
) -> Result<RewardBundle, FactionRejection> {
    let content = ctx.content;
    let faction_id = ctx
        .character
        .faction
        .clone()
        .ok_or(FactionRejection::NotMember)?;
    let task = content
        .faction(&faction_id)
        .and_then(|f| f.tasks.iter().find(|t| t.id == task_id))
        .ok_or_else(|| FactionRejection::UnknownTask(task_id.to_string()))?;
    let current = ctx.character.standing_at(&faction_id);
    if current < task.min_standing {
        return Err(FactionRejection::Standing {
            faction: faction_id,
            required: task.min_standing,
            current,
        });
    }
    let key = task_key(&faction_id, task_id);
    if let Some(last) = ledger.task_completed_at.get(&key) {
        let ready_at = *last + Duration::hours(TASK_COOLDOWN_HOURS);
        if ctx.now < ready_at {
            return Err(FactionRejection::TaskCooldown {
                task: task_id.to_string(),
                ready_at,
            });
        }
    }
    ledger.task_completed_at.insert(key, ctx.now);
    let rewards = task.rewards.clone();
    ctx.record(LogCategory::Quest, format!("Task complete: {}", task.name));
    apply_rewards(ctx, &rewards);
    Ok(rewards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::fixture::Fixture;

    #[test]
    fn join_rejects_low_level_and_leaves_state_alone() {
        let mut fx = Fixture::builtin();
        fx.character.level = 4;
        fx.character.alignment = Alignment::Good;
        let err = join(&mut fx.ctx(), "azure_cloud_sect").unwrap_err();
        assert_eq!(err.reason(), "level");
        assert_eq!(fx.character.faction, None);
        assert!(fx.character.standing.is_empty());
        assert!(fx.drain().is_empty());
    }

    #[test]
    fn join_checks_run_in_order() {
        let mut fx = Fixture::builtin();
        assert_eq!(
            join(&mut fx.ctx(), "nope").unwrap_err().reason(),
            "unknown_faction"
        );
        fx.character.level = 5;
        assert_eq!(
            join(&mut fx.ctx(), "azure_cloud_sect").unwrap_err().reason(),
            "alignment"
        );
        fx.character.alignment = Alignment::Good;
        fx.character.standing.insert("blood_moon_cult".into(), -1);
        assert_eq!(
            join(&mut fx.ctx(), "azure_cloud_sect").unwrap_err().reason(),
            "standing"
        );
        fx.character.standing.insert("blood_moon_cult".into(), 0);
        join(&mut fx.ctx(), "azure_cloud_sect").unwrap();
        assert_eq!(
            join(&mut fx.ctx(), "azure_cloud_sect").unwrap_err().reason(),
            "already_member"
        );
        assert_eq!(
            join(&mut fx.ctx(), "hundred_herb_valley").unwrap_err().reason(),
            "member_of_other"
        );
        assert!(fx.drain().contains(&ProgressEvent::JoinFaction {
            faction: "azure_cloud_sect".into()
        }));
    }

    #[test]
    fn intelligence_requirement_reports_attribute() {
        let mut fx = Fixture::builtin();
        fx.character.level = 3;
        let err = join(&mut fx.ctx(), "hundred_herb_valley").unwrap_err();
        assert_eq!(
            err,
            FactionRejection::Attribute {
                required: 6,
                current: 5
            }
        );
    }

    #[test]
    fn leaving_negates_positive_standing_only() {
        let mut fx = Fixture::builtin();
        let mut ledger = FactionLedger::default();
        fx.character.faction = Some("azure_cloud_sect".into());
        fx.character.standing.insert("azure_cloud_sect".into(), 250);
        leave(&mut fx.ctx(), &mut ledger).unwrap();
        assert_eq!(fx.character.standing_at("azure_cloud_sect"), -250);
        assert_eq!(fx.character.faction, None);

        fx.character.faction = Some("hundred_herb_valley".into());
        fx.character.standing.insert("hundred_herb_valley".into(), -40);
        leave(&mut fx.ctx(), &mut ledger).unwrap();
        assert_eq!(fx.character.standing_at("hundred_herb_valley"), -40);

        assert_eq!(
            leave(&mut fx.ctx(), &mut ledger).unwrap_err().reason(),
            "not_member"
        );
        assert_eq!(ledger.betrayals, vec!["azure_cloud_sect".to_string()]);
    }

    #[test]
    fn promotion_is_logged_with_benefits() {
        let mut fx = Fixture::builtin();
        gain_standing(&mut fx.ctx(), "azure_cloud_sect", 999);
        assert!(!fx.messages().iter().any(|m| m.contains("Inner Disciple")));
        gain_standing(&mut fx.ctx(), "azure_cloud_sect", 1);
        let last = fx.log.latest().unwrap();
        assert_eq!(last.category, LogCategory::Info);
        assert!(last.message.contains("Inner Disciple"));
        assert!(last.message.contains("sect library"));
    }

    #[test]
    fn rank_query_reports_next_threshold() {
        let mut fx = Fixture::builtin();
        fx.character.faction = Some("azure_cloud_sect".into());
        fx.character.standing.insert("azure_cloud_sect".into(), 1200);
        let rank = current_rank(&fx.content, &fx.character).unwrap();
        assert_eq!(rank.rank, "Inner Disciple");
        assert_eq!(rank.next_threshold, Some(3000));
        assert_eq!(
            relation(&fx.content, "azure_cloud_sect", "blood_moon_cult"),
            Relation::Enemy
        );
    }

    #[test]
    fn faction_skill_needs_standing_and_membership() {
        let mut fx = Fixture::builtin();
        assert_eq!(
            learn_faction_skill(&mut fx.ctx(), "alchemy_mastery").unwrap_err(),
            FactionRejection::NotMember
        );
        fx.character.faction = Some("hundred_herb_valley".into());
        assert_eq!(
            learn_faction_skill(&mut fx.ctx(), "azure_sword_art")
                .unwrap_err()
                .reason(),
            "skill_not_offered"
        );
        assert_eq!(
            learn_faction_skill(&mut fx.ctx(), "alchemy_mastery")
                .unwrap_err()
                .reason(),
            "standing"
        );
        fx.character.standing.insert("hundred_herb_valley".into(), 500);
        learn_faction_skill(&mut fx.ctx(), "alchemy_mastery").unwrap();
        assert!(fx.character.knows_skill("alchemy_mastery"));
        assert_eq!(
            learn_faction_skill(&mut fx.ctx(), "alchemy_mastery")
                .unwrap_err()
                .reason(),
            "already_learned"
        );
    }

    #[test]
    fn tasks_respect_daily_cooldown() {
        let mut fx = Fixture::builtin();
        let mut ledger = FactionLedger::default();
        fx.character.faction = Some("hundred_herb_valley".into());
        let rewards = complete_task(&mut fx.ctx(), &mut ledger, "tend_garden").unwrap();
        assert_eq!(rewards.standing.get("hundred_herb_valley"), Some(&40));
        assert_eq!(fx.character.item_count("spirit_herb"), 2);
        assert_eq!(
            complete_task(&mut fx.ctx(), &mut ledger, "tend_garden")
                .unwrap_err()
                .reason(),
            "cooldown"
        );
        fx.now = fx.now + Duration::hours(24);
        complete_task(&mut fx.ctx(), &mut ledger, "tend_garden").unwrap();
        assert_eq!(fx.character.standing_at("hundred_herb_valley"), 80);
    }
}

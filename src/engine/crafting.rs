//! Timed single-slot crafting (pill refining).
//!
//! Materials are deducted when a job starts; the job resolves in `tick` once
//! the clock passes its complete-at time. The busy token is held for the whole
//! job, which is what keeps combat and a second craft out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::engine::character::{Activity, CharacterState};
use crate::engine::clock::after_secs;
use crate::engine::content::ContentTables;
use crate::engine::context::RuleContext;
use crate::engine::log::LogCategory;
use crate::engine::progress::ProgressEvent;
use crate::engine::types::RecipeDef;

pub const MAX_SUCCESS_RATE: f64 = 0.95;
pub const MIN_QUALITY: i64 = 1;
pub const MAX_QUALITY: i64 = 6;
pub const PERFECT_QUALITY: u8 = 5;
const MASTERY_CHANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingMaterial {
    pub item_id: String,
    pub required: u32,
    pub held: u32,
}

fn list_missing(missing: &[MissingMaterial]) -> String {
    missing
        .iter()
        .map(|m| format!("{} ({}/{})", m.item_id, m.held, m.required))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CraftRejection {
    #[error("no such recipe: {0}")]
    UnknownRecipe(String),
    #[error("recipe {0} has not been learned")]
    NotLearned(String),
    #[error("recipe {0} is already known")]
    AlreadyKnown(String),
    #[error("requires refining level {required} (you are {current})")]
    CraftLevel { required: u32, current: u32 },
    #[error("requires cultivation {0}")]
    Cultivation(String),
    #[error("requires membership in {0}")]
    Faction(String),
    #[error("standing at {faction} must be at least {required} (currently {current})")]
    Standing {
        faction: String,
        required: i64,
        current: i64,
    },
    #[error("already crafting")]
    AlreadyCrafting,
    #[error("busy: {0}")]
    Busy(Activity),
    #[error("missing materials: {}", list_missing(.0))]
    InsufficientMaterials(Vec<MissingMaterial>),
    #[error("nothing is being crafted")]
    NotCrafting,
}

impl CraftRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            CraftRejection::UnknownRecipe(_) => "unknown_recipe",
            CraftRejection::NotLearned(_) => "not_learned",
            CraftRejection::AlreadyKnown(_) => "already_known",
            CraftRejection::CraftLevel { .. } => "craft_level",
            CraftRejection::Cultivation(_) => "cultivation",
            CraftRejection::Faction(_) => "faction",
            CraftRejection::Standing { .. } => "standing",
            CraftRejection::AlreadyCrafting => "already_crafting",
            CraftRejection::Busy(_) => "busy",
            CraftRejection::InsufficientMaterials(_) => "materials",
            CraftRejection::NotCrafting => "not_crafting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftingJob {
    pub recipe_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub complete_at: DateTime<Utc>,
}

impl CraftingJob {
    /// Elapsed share of the job in percent, capped at 100.
    pub fn progress_percent(&self, now: DateTime<Utc>) -> f64 {
        if self.duration_secs == 0 {
            return 100.0;
        }
        let elapsed = (now - self.started_at).num_milliseconds().max(0) as f64;
        (elapsed / (self.duration_secs as f64 * 1000.0) * 100.0).min(100.0)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.complete_at - now).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CraftResult {
    Success {
        recipe_id: String,
        item_id: String,
        count: u32,
        quality: u8,
        quality_name: String,
    },
    Failure {
        recipe_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialStatus {
    pub item_id: String,
    pub name: String,
    pub required: u32,
    pub held: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDetail {
    pub recipe_id: String,
    pub name: String,
    pub grade: u32,
    pub duration_secs: u64,
    pub materials: Vec<MaterialStatus>,
    pub success_rate: f64,
    pub known: bool,
}

/// Value at the highest threshold not exceeding `input`; 0 below the lowest.
pub fn step_bonus(table: &BTreeMap<u32, f64>, input: i64) -> f64 {
    if input < 0 {
        return 0.0;
    }
    let key = u32::try_from(input).unwrap_or(u32::MAX);
    table.range(..=key).next_back().map(|(_, v)| *v).unwrap_or(0.0)
}

/// Sum of crafting bonuses granted by learned skills.
fn skill_success_bonus(content: &ContentTables, character: &CharacterState) -> f64 {
    character
        .skills
        .keys()
        .filter_map(|id| content.skill(id))
        .map(|s| s.craft_success_bonus)
        .sum()
}

fn has_mastery(content: &ContentTables, character: &CharacterState) -> bool {
    character
        .skills
        .keys()
        .filter_map(|id| content.skill(id))
        .any(|s| s.craft_mastery)
}

pub fn success_rate(content: &ContentTables, character: &CharacterState, recipe: &RecipeDef) -> f64 {
    let factors = &content.crafting_factors;
    let rate = recipe.base_success_rate
        + step_bonus(&factors.level_bonus, character.crafting.level as i64)
        + step_bonus(&factors.intelligence_bonus, character.intelligence as i64)
        + character.equipment_bonus.craft_success
        + character.crafting.success_bonus
        + skill_success_bonus(content, character);
    if rate.is_nan() {
        return 0.0;
    }
    rate.clamp(0.0, MAX_SUCCESS_RATE)
}

/// Quality from the already-drawn values. `mastery_roll` is only consulted when
/// the character has mastery.
fn compute_quality(
    recipe: &RecipeDef,
    character: &CharacterState,
    range_roll: f64,
    mastery_roll: Option<f64>,
) -> u8 {
    let min_q = recipe.output.min_quality as i64;
    let span = (recipe.output.max_quality as i64 - min_q + 1).max(1);
    let mut quality = min_q + (range_roll * span as f64).floor() as i64;
    quality += (character.crafting.level / 5) as i64;
    if character.intelligence >= 8 {
        quality += 1;
    }
    quality += character.crafting.quality_bonus as i64;
    if mastery_roll.map_or(false, |r| r < MASTERY_CHANCE) {
        quality += 1;
    }
    quality.clamp(MIN_QUALITY, MAX_QUALITY) as u8
}

/// Add refining experience and announce refining levels.
pub fn grant_craft_experience(ctx: &mut RuleContext<'_>, amount: u64) {
    if amount == 0 {
        return;
    }
    ctx.record(LogCategory::Gain, format!("+{} refining experience", amount));
    for level in ctx.character.add_craft_experience(amount) {
        ctx.record(LogCategory::Info, format!("Refining level rose to {}", level));
        ctx.emit(ProgressEvent::ReachCraftLevel { level });
    }
}

/// Single-slot job scheduler for one character.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CraftingScheduler {
    job: Option<CraftingJob>,
}

impl CraftingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(job: Option<CraftingJob>) -> Self {
        Self { job }
    }

    pub fn job(&self) -> Option<&CraftingJob> {
        self.job.as_ref()
    }

    pub fn is_crafting(&self) -> bool {
        self.job.is_some()
    }

    pub fn progress(&self, now: DateTime<Utc>) -> Option<f64> {
        self.job.as_ref().map(|j| j.progress_percent(now))
    }

    /// Validate every precondition for starting `recipe_id`, in order.
    pub fn can_start<'c>(
        &self,
        content: &'c ContentTables,
        character: &CharacterState,
        recipe_id: &str,
    ) -> Result<&'c RecipeDef, CraftRejection> {
        let recipe = content
            .recipe(recipe_id)
            .ok_or_else(|| CraftRejection::UnknownRecipe(recipe_id.to_string()))?;
        if !character.crafting.known_recipes.contains(recipe_id) {
            return Err(CraftRejection::NotLearned(recipe_id.to_string()));
        }

        let req = &recipe.requirements;
        if let Some(level) = req.craft_level {
            if character.crafting.level < level {
                return Err(CraftRejection::CraftLevel {
                    required: level,
                    current: character.crafting.level,
                });
            }
        }
        if let Some(cultivation) = &req.cultivation {
            if !character.cultivation.contains(cultivation.as_str()) {
                return Err(CraftRejection::Cultivation(cultivation.clone()));
            }
        }
        if let Some(faction) = &req.faction {
            if !character.is_member_of(faction) {
                return Err(CraftRejection::Faction(faction.clone()));
            }
        }
        for (faction, minimum) in &req.standing {
            let current = character.standing_at(faction);
            if current < *minimum {
                return Err(CraftRejection::Standing {
                    faction: faction.clone(),
                    required: *minimum,
                    current,
                });
            }
        }

        if self.job.is_some() {
            return Err(CraftRejection::AlreadyCrafting);
        }
        if let Some(activity) = character.busy {
            return Err(CraftRejection::Busy(activity));
        }

        let missing: Vec<MissingMaterial> = recipe
            .materials
            .iter()
            .filter_map(|m| {
                let held = character.item_count(&m.item_id);
                (held < m.count).then(|| MissingMaterial {
                    item_id: m.item_id.clone(),
                    required: m.count,
                    held,
                })
            })
            .collect();
        if !missing.is_empty() {
            return Err(CraftRejection::InsufficientMaterials(missing));
        }
        Ok(recipe)
    }

    /// Deduct materials, claim the busy token and schedule the job.
    pub fn start(&mut self, ctx: &mut RuleContext<'_>, recipe_id: &str) -> Result<CraftingJob, CraftRejection> {
        let content = ctx.content;
        let recipe = self.can_start(content, ctx.character, recipe_id)?;
        ctx.character
            .claim(Activity::Crafting)
            .map_err(CraftRejection::Busy)?;
        for material in &recipe.materials {
            ctx.character.remove_item(&material.item_id, material.count);
        }
        let job = CraftingJob {
            recipe_id: recipe.id.clone(),
            started_at: ctx.now,
            duration_secs: recipe.duration_secs,
            complete_at: after_secs(ctx.now, recipe.duration_secs),
        };
        self.job = Some(job.clone());
        ctx.record(
            LogCategory::Info,
            format!("You begin refining {} ({}s)", recipe.name, recipe.duration_secs),
        );
        log::debug!("crafting job scheduled: {} until {}", job.recipe_id, job.complete_at);
        Ok(job)
    }

    /// Abort the running job. Materials stay consumed and no experience is granted.
    pub fn cancel(&mut self, ctx: &mut RuleContext<'_>) -> Result<CraftingJob, CraftRejection> {
        let job = self.job.take().ok_or(CraftRejection::NotCrafting)?;
        ctx.character.release(Activity::Crafting);
        let name = ctx
            .content
            .recipe(&job.recipe_id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| job.recipe_id.clone());
        ctx.record(
            LogCategory::Loss,
            format!("You abandon refining {}. The materials are lost.", name),
        );
        Ok(job)
    }

    /// Resolve the job if its time has come.
    pub fn tick(&mut self, ctx: &mut RuleContext<'_>) -> Option<CraftResult> {
        match &self.job {
            Some(job) if ctx.now >= job.complete_at => {}
            _ => return None,
        }
        let job = self.job.take()?;
        ctx.character.release(Activity::Crafting);
        Some(self.resolve(ctx, &job))
    }

    fn resolve(&mut self, ctx: &mut RuleContext<'_>, job: &CraftingJob) -> CraftResult {
        let content = ctx.content;
        let recipe = match content.recipe(&job.recipe_id) {
            Some(recipe) => recipe,
            None => {
                log::warn!("crafting job for unknown recipe {} dropped", job.recipe_id);
                ctx.record(
                    LogCategory::Warning,
                    format!("The recipe {} no longer exists; the job was dropped", job.recipe_id),
                );
                return CraftResult::Failure {
                    recipe_id: job.recipe_id.clone(),
                };
            }
        };

        let rate = success_rate(content, ctx.character, recipe);
        ctx.character.crafting.stats.attempts += 1;
        let roll = ctx.roll();
        log::debug!("refining {}: rate {:.3} roll {:.3}", recipe.id, rate, roll);

        if roll < rate {
            let range_roll = ctx.roll();
            let mastery_roll = if has_mastery(content, ctx.character) {
                Some(ctx.roll())
            } else {
                None
            };
            let quality = compute_quality(recipe, ctx.character, range_roll, mastery_roll);
            let quality_name = content.quality_name(quality).to_string();
            let output = &recipe.output;
            ctx.character.add_item(&output.item_id, output.count);
            let stats = &mut ctx.character.crafting.stats;
            stats.successes += 1;
            if quality >= PERFECT_QUALITY {
                stats.perfect += 1;
            }
            ctx.record(
                LogCategory::Gain,
                format!(
                    "Refining succeeded: {} x{} ({})",
                    content.item_name(&output.item_id),
                    output.count,
                    quality_name
                ),
            );
            grant_craft_experience(ctx, recipe.grade as u64 * 20 + quality as u64 * 5);
            ctx.emit(ProgressEvent::CraftItem {
                recipe: recipe.id.clone(),
                item: output.item_id.clone(),
                quality,
            });
            CraftResult::Success {
                recipe_id: recipe.id.clone(),
                item_id: output.item_id.clone(),
                count: output.count,
                quality,
                quality_name,
            }
        } else {
            ctx.character.crafting.stats.failures += 1;
            ctx.record(
                LogCategory::Loss,
                format!("Refining {} failed. The materials are ruined.", recipe.name),
            );
            grant_craft_experience(ctx, recipe.grade as u64 * 5);
            CraftResult::Failure {
                recipe_id: recipe.id.clone(),
            }
        }
    }
}

pub fn learn_recipe(ctx: &mut RuleContext<'_>, recipe_id: &str) -> Result<(), CraftRejection> {
    let content = ctx.content;
    let recipe = content
        .recipe(recipe_id)
        .ok_or_else(|| CraftRejection::UnknownRecipe(recipe_id.to_string()))?;
    if !ctx.character.crafting.known_recipes.insert(recipe_id.to_string()) {
        return Err(CraftRejection::AlreadyKnown(recipe_id.to_string()));
    }
    ctx.record(LogCategory::Gain, format!("Learned the recipe for {}", recipe.name));
    Ok(())
}

pub fn recipe_detail(content: &ContentTables, character: &CharacterState, recipe_id: &str) -> Option<RecipeDetail> {
    let recipe = content.recipe(recipe_id)?;
    Some(RecipeDetail {
        recipe_id: recipe.id.clone(),
        name: recipe.name.clone(),
        grade: recipe.grade,
        duration_secs: recipe.duration_secs,
        materials: recipe
            .materials
            .iter()
            .map(|m| MaterialStatus {
                item_id: m.item_id.clone(),
                name: content.item_name(&m.item_id).to_string(),
                required: m.count,
                held: character.item_count(&m.item_id),
            })
            .collect(),
        success_rate: success_rate(content, character, recipe),
        known: character.crafting.known_recipes.contains(recipe_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::fixture::Fixture;
    use crate::engine::types::{SkillDef, SkillKind};
    use crate::engine::clock::MAX_SPAN_SECS;
    use chrono::Duration;

    fn ready_fixture() -> Fixture {
        let mut fx = Fixture::builtin();
        fx.character
            .crafting
            .known_recipes
            .insert("qi_gathering_pill".into());
        fx.character.add_item("spirit_herb", 4);
        fx.character.add_item("qi_grass", 2);
        fx
    }

    #[test]
    fn base_rate_with_no_bonuses_is_exact() {
        let fx = Fixture::builtin();
        let recipe = fx.content.recipe("qi_gathering_pill").unwrap();
        assert_eq!(fx.character.crafting.level, 1);
        assert_eq!(fx.character.intelligence, 5);
        assert_eq!(success_rate(&fx.content, &fx.character, recipe), 0.7);
    }

    #[test]
    fn rate_is_capped_whatever_the_bonuses() {
        let mut fx = Fixture::new(
            ContentTables::builtin()
                .with_skill(SkillDef::new("cheat", "Cheat", SkillKind::Support).with_craft_bonus(5.0, false)),
        );
        fx.character.learn_skill("cheat");
        fx.character.crafting.level = 40;
        fx.character.intelligence = 20;
        let recipe = fx.content.recipe("foundation_pill").unwrap().clone();
        assert_eq!(success_rate(&fx.content, &fx.character, &recipe), MAX_SUCCESS_RATE);

        let mut hopeless = recipe.clone();
        hopeless.base_success_rate = -3.0;
        fx.character.skills.clear();
        let rate = success_rate(&fx.content, &fx.character, &hopeless);
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn step_tables_use_highest_threshold_not_above_input() {
        let table = BTreeMap::from([(5, 0.0), (6, 0.05), (10, 0.25)]);
        assert_eq!(step_bonus(&table, 4), 0.0);
        assert_eq!(step_bonus(&table, 7), 0.05);
        assert_eq!(step_bonus(&table, 99), 0.25);
        assert_eq!(step_bonus(&table, -1), 0.0);
    }

    #[test]
    fn quality_stays_within_one_and_six() {
        let fx = Fixture::builtin();
        let mut character = fx.character.clone();
        let mut recipe = fx.content.recipe("foundation_pill").unwrap().clone();
        character.crafting.level = 30;
        character.intelligence = 10;
        character.crafting.quality_bonus = 4;
        for roll in [0.0, 0.5, 0.999] {
            let q = compute_quality(&recipe, &character, roll, Some(0.0));
            assert!((1..=6).contains(&q));
        }
        recipe.output.min_quality = 1;
        recipe.output.max_quality = 1;
        character.crafting.level = 1;
        character.intelligence = 5;
        character.crafting.quality_bonus = -10;
        assert_eq!(compute_quality(&recipe, &character, 0.99, None), 1);
    }

    #[test]
    fn start_deducts_materials_and_claims_token() {
        let mut fx = ready_fixture();
        let mut scheduler = CraftingScheduler::new();
        let job = scheduler.start(&mut fx.ctx(), "qi_gathering_pill").unwrap();
        assert_eq!(job.complete_at - job.started_at, Duration::seconds(60));
        assert_eq!(fx.character.item_count("spirit_herb"), 2);
        assert_eq!(fx.character.item_count("qi_grass"), 1);
        assert_eq!(fx.character.busy, Some(Activity::Crafting));
    }

    #[test]
    fn huge_durations_are_capped() {
        let mut fx = ready_fixture();
        if let Some(recipe) = fx.content.recipes.get_mut("qi_gathering_pill") {
            recipe.duration_secs = u64::MAX;
        }
        let mut scheduler = CraftingScheduler::new();
        let job = scheduler.start(&mut fx.ctx(), "qi_gathering_pill").unwrap();
        assert_eq!(
            job.complete_at - job.started_at,
            Duration::seconds(MAX_SPAN_SECS as i64)
        );
    }

    #[test]
    fn second_job_is_rejected_without_side_effects() {
        let mut fx = ready_fixture();
        let mut scheduler = CraftingScheduler::new();
        scheduler.start(&mut fx.ctx(), "qi_gathering_pill").unwrap();
        let inventory = fx.character.inventory.clone();
        let err = scheduler.start(&mut fx.ctx(), "qi_gathering_pill").unwrap_err();
        assert_eq!(err, CraftRejection::AlreadyCrafting);
        assert_eq!(fx.character.inventory, inventory);
        assert_eq!(scheduler.job().map(|j| j.started_at), Some(fx.now));
    }

    #[test]
    fn busy_in_combat_blocks_crafting() {
        let mut fx = ready_fixture();
        fx.character.claim(Activity::Combat).unwrap();
        let err = CraftingScheduler::new()
            .start(&mut fx.ctx(), "qi_gathering_pill")
            .unwrap_err();
        assert_eq!(err, CraftRejection::Busy(Activity::Combat));
        assert_eq!(fx.character.item_count("spirit_herb"), 4);
    }

    #[test]
    fn missing_materials_are_all_listed() {
        let mut fx = Fixture::builtin();
        fx.character
            .crafting
            .known_recipes
            .insert("qi_gathering_pill".into());
        fx.character.add_item("spirit_herb", 1);
        let err = CraftingScheduler::new()
            .can_start(&fx.content, &fx.character, "qi_gathering_pill")
            .unwrap_err();
        match err {
            CraftRejection::InsufficientMaterials(missing) => {
                assert_eq!(missing.len(), 2);
                assert_eq!(missing[0].item_id, "spirit_herb");
                assert_eq!((missing[0].held, missing[0].required), (1, 2));
                assert_eq!((missing[1].held, missing[1].required), (0, 1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn requirements_are_checked_before_materials() {
        let mut fx = Fixture::builtin();
        fx.character
            .crafting
            .known_recipes
            .extend(["foundation_pill".to_string(), "clarity_elixir".to_string()]);
        let scheduler = CraftingScheduler::new();
        assert_eq!(
            scheduler
                .can_start(&fx.content, &fx.character, "foundation_pill")
                .unwrap_err()
                .reason(),
            "craft_level"
        );
        assert_eq!(
            scheduler
                .can_start(&fx.content, &fx.character, "clarity_elixir")
                .unwrap_err()
                .reason(),
            "faction"
        );
        assert_eq!(
            scheduler
                .can_start(&fx.content, &fx.character, "healing_pill")
                .unwrap_err()
                .reason(),
            "not_learned"
        );
    }

    #[test]
    fn tick_waits_for_complete_at_then_succeeds() {
        let mut fx = ready_fixture();
        let mut scheduler = CraftingScheduler::new();
        scheduler.start(&mut fx.ctx(), "qi_gathering_pill").unwrap();
        fx.now = fx.now + Duration::seconds(59);
        assert_eq!(scheduler.tick(&mut fx.ctx()), None);
        assert!((scheduler.progress(fx.now).unwrap() - 98.33).abs() < 0.01);

        fx.now = fx.now + Duration::seconds(1);
        // success, then quality roll 0.5 over [1,3] -> 2
        fx.script([0.1, 0.5]);
        let result = scheduler.tick(&mut fx.ctx()).unwrap();
        assert_eq!(
            result,
            CraftResult::Success {
                recipe_id: "qi_gathering_pill".into(),
                item_id: "qi_gathering_pill".into(),
                count: 1,
                quality: 2,
                quality_name: "Mid Grade".into(),
            }
        );
        assert_eq!(fx.character.busy, None);
        assert_eq!(fx.character.item_count("qi_gathering_pill"), 1);
        // 1 * 20 + 2 * 5
        assert_eq!(fx.character.crafting.experience, 30);
        assert_eq!(fx.character.crafting.stats.successes, 1);
        assert!(fx.drain().contains(&ProgressEvent::CraftItem {
            recipe: "qi_gathering_pill".into(),
            item: "qi_gathering_pill".into(),
            quality: 2
        }));
    }

    #[test]
    fn failure_grants_small_experience() {
        let mut fx = ready_fixture();
        let mut scheduler = CraftingScheduler::new();
        scheduler.start(&mut fx.ctx(), "qi_gathering_pill").unwrap();
        fx.now = fx.now + Duration::seconds(60);
        fx.script([0.7]);
        let result = scheduler.tick(&mut fx.ctx()).unwrap();
        assert!(matches!(result, CraftResult::Failure { .. }));
        assert_eq!(fx.character.crafting.experience, 5);
        assert_eq!(fx.character.item_count("qi_gathering_pill"), 0);
        assert_eq!(fx.character.crafting.stats.failures, 1);
    }

    #[test]
    fn mastery_draw_only_happens_with_mastery() {
        let mut fx = ready_fixture();
        fx.character.learn_skill("alchemy_mastery");
        let mut scheduler = CraftingScheduler::new();
        scheduler.start(&mut fx.ctx(), "qi_gathering_pill").unwrap();
        fx.now = fx.now + Duration::seconds(60);
        fx.script([0.1, 0.0, 0.05]);
        let result = scheduler.tick(&mut fx.ctx()).unwrap();
        match result {
            CraftResult::Success { quality, .. } => assert_eq!(quality, 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fx.rng.drawn(), 3);
    }

    #[test]
    fn cancel_forfeits_materials_and_frees_token() {
        let mut fx = ready_fixture();
        let mut scheduler = CraftingScheduler::new();
        assert_eq!(
            scheduler.cancel(&mut fx.ctx()).unwrap_err(),
            CraftRejection::NotCrafting
        );
        scheduler.start(&mut fx.ctx(), "qi_gathering_pill").unwrap();
        scheduler.cancel(&mut fx.ctx()).unwrap();
        assert_eq!(fx.character.busy, None);
        assert_eq!(fx.character.item_count("spirit_herb"), 2);
        assert_eq!(fx.character.crafting.experience, 0);
        assert!(!scheduler.is_crafting());
    }

    #[test]
    fn learning_a_recipe_twice_is_rejected() {
        let mut fx = Fixture::builtin();
        learn_recipe(&mut fx.ctx(), "healing_pill").unwrap();
        assert_eq!(
            learn_recipe(&mut fx.ctx(), "healing_pill").unwrap_err().reason(),
            "already_known"
        );
        assert_eq!(
            learn_recipe(&mut fx.ctx(), "phoenix_pill").unwrap_err().reason(),
            "unknown_recipe"
        );
        let detail = recipe_detail(&fx.content, &fx.character, "healing_pill").unwrap();
        assert!(detail.known);
        assert_eq!(detail.materials[1].required, 2);
    }
}

//! Random encounters: combat spawns on arrival and narrative adventures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

use crate::engine::character::CharacterState;
use crate::engine::clock::{after_secs, span_secs};
use crate::engine::content::ContentTables;
use crate::engine::context::RuleContext;
use crate::engine::log::LogCategory;
use crate::engine::progress::ProgressEvent;
use crate::engine::reward::apply_rewards;
use crate::engine::rng::{pick_weighted, RandomSource};
use crate::engine::types::{AdventureDef, ChoiceRequirements};

pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 300;
pub const ADVENTURE_HISTORY_LIMIT: usize = 50;
pub const COMPLETE_ADVENTURE: &str = "complete_adventure";

const BASE_COMBAT_CHANCE: f64 = 0.3;
const COMBAT_CHANCE_PER_DANGER: f64 = 0.05;
const BASE_ADVENTURE_CHANCE: f64 = 0.15;
const MIN_ADVENTURE_CHANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdventureRejection {
    #[error("no adventure is waiting for a decision")]
    NoPending,
    #[error("no such choice: {0}")]
    UnknownChoice(String),
    #[error("requires {required} gold (you have {current})")]
    Currency { required: i64, current: i64 },
    #[error("requires {required} hp (you have {current})")]
    Hp { required: u32, current: u32 },
    #[error("requires {required} mp (you have {current})")]
    Mp { required: u32, current: u32 },
    #[error("requires {required} x {item_id} (you have {held})")]
    Items {
        item_id: String,
        required: u32,
        held: u32,
    },
}

impl AdventureRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            AdventureRejection::NoPending => "no_pending",
            AdventureRejection::UnknownChoice(_) => "unknown_choice",
            AdventureRejection::Currency { .. } => "currency",
            AdventureRejection::Hp { .. } => "hp",
            AdventureRejection::Mp { .. } => "mp",
            AdventureRejection::Items { .. } => "items",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAdventure {
    pub adventure_id: String,
    pub location: String,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdventureRecord {
    pub adventure_id: String,
    /// `None` when the event was dismissed.
    pub choice_id: Option<String>,
    pub at: DateTime<Utc>,
}

/// Lifetime counters for one adventure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventStats {
    pub triggered: u32,
    pub chosen: u32,
    pub dismissed: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdventureState {
    #[serde(default)]
    pub pending: Option<PendingAdventure>,
    #[serde(default)]
    pub last_event_at: Option<DateTime<Utc>>,
    /// Adventure id → time the event may fire again.
    #[serde(default)]
    pub cooldowns: BTreeMap<String, DateTime<Utc>>,
    /// Location id → adventures triggered there.
    #[serde(default)]
    pub location_triggers: BTreeMap<String, u32>,
    #[serde(default)]
    pub history: VecDeque<AdventureRecord>,
    /// Adventure id → counters. Unlike `history` these are never trimmed.
    #[serde(default)]
    pub stats: BTreeMap<String, EventStats>,
}

impl AdventureState {
    pub fn on_cooldown(&self, adventure_id: &str, now: DateTime<Utc>) -> bool {
        self.cooldowns.get(adventure_id).map_or(false, |ready| now < *ready)
    }

    pub fn stats(&self, adventure_id: &str) -> EventStats {
        self.stats.get(adventure_id).copied().unwrap_or_default()
    }

    fn counters(&mut self, adventure_id: &str) -> &mut EventStats {
        self.stats.entry(adventure_id.to_string()).or_default()
    }

    fn remember(&mut self, record: AdventureRecord) {
        self.history.push_back(record);
        while self.history.len() > ADVENTURE_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }
}

/// Roll a combat encounter for a location.
///
/// Locations without spawns never draw from `rng`.
pub fn roll_combat(content: &ContentTables, location_id: &str, rng: &mut dyn RandomSource) -> Option<String> {
    let location = content.location(location_id)?;
    if location.enemies.is_empty() {
        return None;
    }
    let chance = BASE_COMBAT_CHANCE + location.danger_level as f64 * COMBAT_CHANCE_PER_DANGER;
    if rng.next_f64() >= chance {
        return None;
    }
    let table: Vec<(&str, f64)> = location
        .enemies
        .iter()
        .map(|spawn| (spawn.enemy_id.as_str(), spawn.weight()))
        .collect();
    pick_weighted(rng, &table).map(|id| id.to_string())
}

/// Probability that an adventure fires on this arrival.
pub fn trigger_chance(character: &CharacterState, triggers_here: u32) -> f64 {
    let fortune = (character.fortune - 5) as f64 * 0.02;
    let level = (character.level as f64 * 0.01).min(0.1);
    let fatigue = triggers_here as f64 * 0.05;
    (BASE_ADVENTURE_CHANCE + fortune + level - fatigue).max(MIN_ADVENTURE_CHANCE)
}

fn conditions_met(
    adventure: &AdventureDef,
    character: &CharacterState,
    location_id: &str,
) -> bool {
    let conditions = &adventure.conditions;
    if conditions.min_level.map_or(false, |min| character.level < min) {
        return false;
    }
    if let Some(cultivation) = &conditions.cultivation {
        if !character.cultivation.contains(cultivation.as_str()) {
            return false;
        }
    }
    if conditions.min_fortune.map_or(false, |min| character.fortune < min) {
        return false;
    }
    if let Some(faction) = &conditions.faction {
        if !character.is_member_of(faction) {
            return false;
        }
    }
    if conditions
        .standing
        .iter()
        .any(|(faction, min)| character.standing_at(faction) < *min)
    {
        return false;
    }
    conditions.locations.is_empty() || conditions.locations.iter().any(|l| l == location_id)
}

fn check_requirements(
    requirements: &ChoiceRequirements,
    character: &CharacterState,
) -> Result<(), AdventureRejection> {
    if let Some(required) = requirements.currency {
        if character.gold < required {
            return Err(AdventureRejection::Currency {
                required,
                current: character.gold,
            });
        }
    }
    if let Some(required) = requirements.hp {
        if character.hp < required {
            return Err(AdventureRejection::Hp {
                required,
                current: character.hp,
            });
        }
    }
    if let Some(required) = requirements.mp {
        if character.mp < required {
            return Err(AdventureRejection::Mp {
                required,
                current: character.mp,
            });
        }
    }
    for item in &requirements.items {
        let held = character.item_count(&item.id);
        if held < item.count {
            return Err(AdventureRejection::Items {
                item_id: item.id.clone(),
                required: item.count,
                held,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncounterSelector {
    state: AdventureState,
    min_interval_secs: u64,
}

impl Default for EncounterSelector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL_SECS)
    }
}

impl EncounterSelector {
    pub fn new(min_interval_secs: u64) -> Self {
        Self {
            state: AdventureState::default(),
            min_interval_secs,
        }
    }

    pub fn with_state(mut self, state: AdventureState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &AdventureState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingAdventure> {
        self.state.pending.as_ref()
    }

    /// Clear a pending event whose definition no longer exists.
    pub(crate) fn drop_pending(&mut self) -> Option<PendingAdventure> {
        self.state.pending.take()
    }

    fn interval_elapsed(&self, now: DateTime<Utc>) -> bool {
        let interval = span_secs(self.min_interval_secs);
        self.state.last_event_at.map_or(true, |last| now - last >= interval)
    }

    /// Possibly start an adventure at `location_id`. Returns the adventure id
    /// when one fires.
    pub fn try_trigger(&mut self, ctx: &mut RuleContext<'_>, location_id: &str) -> Option<String> {
        if self.state.pending.is_some() || !self.interval_elapsed(ctx.now) {
            return None;
        }
        let triggers_here = self.state.location_triggers.get(location_id).copied().unwrap_or(0);
        let chance = trigger_chance(ctx.character, triggers_here);
        if ctx.roll() >= chance {
            return None;
        }

        let content = ctx.content;
        let candidates: Vec<(&AdventureDef, f64)> = content
            .adventures
            .values()
            .filter(|adv| !self.state.on_cooldown(&adv.id, ctx.now))
            .filter(|adv| conditions_met(adv, ctx.character, location_id))
            .map(|adv| (adv, content.adventure_weight(&adv.id)))
            .collect();
        let adventure = *pick_weighted(&mut *ctx.rng, &candidates)?;

        self.state.pending = Some(PendingAdventure {
            adventure_id: adventure.id.clone(),
            location: location_id.to_string(),
            triggered_at: ctx.now,
        });
        self.state.last_event_at = Some(ctx.now);
        *self.state.location_triggers.entry(location_id.to_string()).or_insert(0) += 1;
        self.state.counters(&adventure.id).triggered += 1;

        let mut message = format!("Adventure: {}", adventure.name);
        if !adventure.description.is_empty() {
            message.push_str(&format!(". {}", adventure.description));
        }
        ctx.record(LogCategory::Adventure, message);
        log::debug!("adventure {} triggered at {}", adventure.id, location_id);
        Some(adventure.id.clone())
    }

    pub fn choose(&mut self, ctx: &mut RuleContext<'_>, choice_id: &str) -> Result<AdventureRecord, AdventureRejection> {
        let content = ctx.content;
        let pending = self.state.pending.as_ref().ok_or(AdventureRejection::NoPending)?;
        let adventure = content
            .adventure(&pending.adventure_id)
            .ok_or(AdventureRejection::NoPending)?;
        let choice = adventure
            .choices
            .iter()
            .find(|c| c.id == choice_id)
            .ok_or_else(|| AdventureRejection::UnknownChoice(choice_id.to_string()))?;
        check_requirements(&choice.requirements, ctx.character)?;

        self.state.pending = None;
        if !choice.message.is_empty() {
            ctx.record(LogCategory::Adventure, choice.message.clone());
        }
        apply_rewards(ctx, &choice.rewards);

        let record = AdventureRecord {
            adventure_id: adventure.id.clone(),
            choice_id: Some(choice.id.clone()),
            at: ctx.now,
        };
        self.state.remember(record.clone());
        self.state.counters(&adventure.id).chosen += 1;
        self.state.cooldowns.insert(
            adventure.id.clone(),
            after_secs(ctx.now, adventure.cooldown_secs),
        );
        ctx.emit(ProgressEvent::Custom {
            kind: COMPLETE_ADVENTURE.to_string(),
            target: adventure.id.clone(),
            amount: 1,
        });
        Ok(record)
    }

    pub fn dismiss(&mut self, ctx: &mut RuleContext<'_>) -> Result<AdventureRecord, AdventureRejection> {
        let pending = self.state.pending.take().ok_or(AdventureRejection::NoPending)?;
        self.state.counters(&pending.adventure_id).dismissed += 1;
        let name = ctx
            .content
            .adventure(&pending.adventure_id)
            .map(|adv| adv.name.clone())
            .unwrap_or_else(|| pending.adventure_id.clone());
        ctx.record(LogCategory::Adventure, format!("You let the moment pass ({})", name));
        let record = AdventureRecord {
            adventure_id: pending.adventure_id,
            choice_id: None,
            at: ctx.now,
        };
        self.state.remember(record.clone());
        Ok(record)
    }
}

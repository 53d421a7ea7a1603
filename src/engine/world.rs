//! The per-session engine: owns every subsystem, routes actions, and fans out
//! progress events after each one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::character::{Activity, CharacterState};
use crate::engine::clock::{after_secs, Clock};
use crate::engine::combat::{CombatAction, CombatResolver, CombatSession, TurnReport, DEFAULT_FLEE_CHANCE};
use crate::engine::content::ContentTables;
use crate::engine::context::RuleContext;
use crate::engine::crafting::{self, CraftResult, CraftingJob, CraftingScheduler, RecipeDetail};
use crate::engine::encounter::{
    roll_combat, AdventureRecord, EncounterSelector, PendingAdventure, DEFAULT_MIN_INTERVAL_SECS,
};
use crate::engine::errors::{ActionError, EngineError};
use crate::engine::log::{GameLog, LogCategory, LogEntry, DEFAULT_LOG_CAPACITY};
use crate::engine::progress::{ProgressBus, ProgressEvent, ProgressListener};
use crate::engine::quest::{MainProgress, QuestDetail, QuestTracker, DEFAULT_DAILY_RESET_HOURS};
use crate::engine::reputation::{self, FactionLedger, FactionRank};
use crate::engine::reward::{apply_rewards, grant_experience};
use crate::engine::rng::RandomSource;
use crate::engine::snapshot::GameSnapshot;
use crate::engine::types::{
    ActionEffect, Attribute, EquipSlot, ItemEffect, ItemGrant, LocationDef, RewardBundle,
    SNAPSHOT_SCHEMA_VERSION,
};

/// Upper bound on events dispatched for a single action. Listeners that keep
/// emitting past this are cut off.
pub const MAX_EVENTS_PER_ACTION: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldRejection {
    #[error("no such location: {0}")]
    UnknownLocation(String),
    #[error("you are busy ({0})")]
    Busy(Activity),
    #[error("{0} cannot be reached from here")]
    NotAdjacent(String),
    #[error("you are not at {0}")]
    NotHere(String),
    #[error("nothing called {0} can be done here")]
    UnknownAction(String),
    #[error("no such item: {0}")]
    UnknownItem(String),
    #[error("you do not have {0}")]
    NotOwned(String),
    #[error("{0} cannot be used right now")]
    NotUsable(String),
    #[error("nothing is equipped in the {0:?} slot")]
    SlotEmpty(EquipSlot),
    #[error("{0} has nothing left to give")]
    Exhausted(String),
    #[error("{0} is already learned")]
    AlreadyLearned(String),
}

impl WorldRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            WorldRejection::UnknownLocation(_) => "unknown_location",
            WorldRejection::Busy(_) => "busy",
            WorldRejection::NotAdjacent(_) => "not_adjacent",
            WorldRejection::NotHere(_) => "not_here",
            WorldRejection::UnknownAction(_) => "unknown_action",
            WorldRejection::UnknownItem(_) => "unknown_item",
            WorldRejection::NotOwned(_) => "not_owned",
            WorldRejection::NotUsable(_) => "not_usable",
            WorldRejection::SlotEmpty(_) => "slot_empty",
            WorldRejection::Exhausted(_) => "exhausted",
            WorldRejection::AlreadyLearned(_) => "already_learned",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub flee_chance: f64,
    pub adventure_min_interval_secs: u64,
    pub daily_reset_hours: i64,
    pub log_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            flee_chance: DEFAULT_FLEE_CHANCE,
            adventure_min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
            daily_reset_hours: DEFAULT_DAILY_RESET_HOURS,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// World bits that belong to the session rather than the character.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// One-time discoveries already claimed.
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// `location:item` → time the node can be gathered again.
    #[serde(default)]
    pub gather_cooldowns: BTreeMap<String, DateTime<Utc>>,
}

fn node_key(location_id: &str, item_id: &str) -> String {
    format!("{}:{}", location_id, item_id)
}

/// Everything a player can ask the engine to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Move { location: String },
    Gather { location: String },
    Perform {
        #[serde(rename = "activity")]
        action: String,
    },
    StartCombat { enemy: String },
    CombatAction { command: CombatAction },
    StartCraft { recipe: String },
    CancelCraft,
    LearnRecipe { recipe: String },
    AcceptQuest { quest: String },
    AbandonQuest { quest: String },
    JoinFaction { faction: String },
    LeaveFaction,
    LearnFactionSkill { skill: String },
    CompleteFactionTask { task: String },
    ChooseAdventureOption { choice: String },
    DismissAdventure,
    UseItem { item: String },
    Unequip { slot: EquipSlot },
    /// Resolve anything due. Hosts driving a manual clock advance it by
    /// `seconds` before executing.
    Wait {
        #[serde(default)]
        seconds: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Moved {
        location: String,
        adventure: Option<String>,
        encounter: Option<String>,
    },
    Gathered { items: Vec<ItemGrant> },
    Performed { action: String },
    CombatStarted { enemy: String },
    CombatTurn(TurnReport),
    CraftStarted(CraftingJob),
    CraftCancelled { recipe: String },
    RecipeLearned { recipe: String },
    QuestAccepted { quest: String },
    QuestAbandoned { quest: String },
    FactionJoined { faction: String },
    FactionLeft { faction: String },
    SkillLearned { skill: String },
    TaskCompleted { task: String, rewards: RewardBundle },
    AdventureResolved(AdventureRecord),
    ItemUsed { item: String },
    Unequipped { item: String },
    Waited { crafted: Option<CraftResult> },
}

/// Borrowable core shared by every rule call.
struct Session {
    content: Arc<ContentTables>,
    character: CharacterState,
    log: GameLog,
    bus: ProgressBus,
    rng: Box<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl Session {
    fn ctx(&mut self) -> RuleContext<'_> {
        RuleContext {
            content: self.content.as_ref(),
            character: &mut self.character,
            log: &mut self.log,
            bus: &mut self.bus,
            rng: self.rng.as_mut(),
            now: self.clock.now(),
        }
    }
}

pub struct Engine {
    session_id: Uuid,
    session: Session,
    combat: CombatResolver,
    crafting: CraftingScheduler,
    quests: QuestTracker,
    factions: FactionLedger,
    encounters: EncounterSelector,
    world: WorldState,
    listeners: Vec<Box<dyn ProgressListener>>,
    settings: EngineSettings,
}

impl Engine {
    /// Start a fresh session for a new character at the content's starting location.
    pub fn new(
        content: Arc<ContentTables>,
        character_name: &str,
        rng: Box<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let now = clock.now();
        let mut character = CharacterState::new(character_name, &content.starting_location);
        for recipe in &content.starting_recipes {
            character.crafting.known_recipes.insert(recipe.clone());
        }
        let mut quests = QuestTracker::new(settings.daily_reset_hours);
        quests.initialize(&content, now);
        let mut log = GameLog::new(settings.log_capacity);
        log.push(
            LogCategory::Info,
            format!("{} opens their eyes in {}", character_name, content.starting_location),
            now,
        );

        let session_id = Uuid::new_v4();
        log::info!("session {} created for {}", session_id, character_name);
        Self {
            session_id,
            session: Session {
                content,
                character,
                log,
                bus: ProgressBus::new(),
                rng,
                clock,
            },
            combat: CombatResolver::new(settings.flee_chance),
            crafting: CraftingScheduler::new(),
            quests,
            factions: FactionLedger::default(),
            encounters: EncounterSelector::new(settings.adventure_min_interval_secs),
            world: WorldState::default(),
            listeners: Vec::new(),
            settings,
        }
    }

    /// Rebuild a session from a snapshot, repairing anything that no longer
    /// holds against the current content.
    pub fn restore(
        content: Arc<ContentTables>,
        snapshot: GameSnapshot,
        rng: Box<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let GameSnapshot {
            session_id,
            mut character,
            mut quests,
            reputation,
            crafting: mut job,
            mut combat,
            adventure,
            world,
            log: entries,
            corrections,
            ..
        } = snapshot;
        let mut corrections = corrections;

        // Bonuses only; enforce_invariants does the clamping and reports it.
        character.rebuild_equipment_bonus(&content);
        corrections.extend(character.enforce_invariants());

        if let Some(dangling) = job.as_ref().filter(|j| content.recipe(&j.recipe_id).is_none()) {
            corrections.push(format!("dropped crafting job for unknown recipe {}", dangling.recipe_id));
            job = None;
        }
        if combat.is_some() && job.is_some() {
            corrections.push("combat and crafting were both active; combat dropped".to_string());
            combat = None;
        }
        let expected = if combat.is_some() {
            Some(Activity::Combat)
        } else if job.is_some() {
            Some(Activity::Crafting)
        } else {
            None
        };
        if character.busy != expected {
            corrections.push(format!("busy state {:?} corrected to {:?}", character.busy, expected));
            character.busy = expected;
        }

        let mut encounters = EncounterSelector::new(settings.adventure_min_interval_secs).with_state(adventure);
        if let Some(pending) = encounters.pending() {
            if content.adventure(&pending.adventure_id).is_none() {
                corrections.push(format!("dropped pending unknown adventure {}", pending.adventure_id));
                encounters.drop_pending();
            }
        }
        quests.set_daily_reset_hours(settings.daily_reset_hours);

        let now = clock.now();
        let mut log = GameLog::from_entries(entries, settings.log_capacity);
        for correction in &corrections {
            log::warn!("snapshot correction for session {}: {}", session_id, correction);
            log.push(LogCategory::Warning, correction.clone(), now);
        }
        log::info!("session {} restored ({} corrections)", session_id, corrections.len());

        Self {
            session_id,
            session: Session {
                content,
                character,
                log,
                bus: ProgressBus::new(),
                rng,
                clock,
            },
            combat: CombatResolver::new(settings.flee_chance).with_session(combat),
            crafting: CraftingScheduler::with_job(job),
            quests,
            factions: reputation,
            encounters,
            world,
            listeners: Vec::new(),
            settings,
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: self.now(),
            session_id: self.session_id,
            character: self.session.character.clone(),
            quests: self.quests.clone(),
            reputation: self.factions.clone(),
            crafting: self.crafting.job().cloned(),
            combat: self.combat.session().cloned(),
            adventure: self.encounters.state().clone(),
            world: self.world.clone(),
            log: self.session.log.entries().cloned().collect(),
            corrections: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        self.snapshot().to_json()
    }

    /// Register a host listener. It sees every event after the quest tracker.
    pub fn subscribe(&mut self, listener: Box<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.session.clock.now()
    }

    pub fn content(&self) -> &ContentTables {
        &self.session.content
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn character(&self) -> &CharacterState {
        &self.session.character
    }

    pub fn location(&self) -> Option<&LocationDef> {
        self.session.content.location(&self.session.character.location)
    }

    pub fn log(&self) -> &GameLog {
        &self.session.log
    }

    pub fn recent_log(&self, count: usize) -> Vec<LogEntry> {
        self.session.log.tail(count)
    }

    pub fn combat_session(&self) -> Option<&CombatSession> {
        self.combat.session()
    }

    pub fn crafting_job(&self) -> Option<&CraftingJob> {
        self.crafting.job()
    }

    pub fn crafting_progress(&self) -> Option<f64> {
        self.crafting.progress(self.now())
    }

    pub fn recipe_detail(&self, recipe_id: &str) -> Option<RecipeDetail> {
        crafting::recipe_detail(&self.session.content, &self.session.character, recipe_id)
    }

    pub fn quests(&self) -> &QuestTracker {
        &self.quests
    }

    pub fn quest_detail(&self, quest_id: &str) -> Option<QuestDetail> {
        self.quests.quest_detail(&self.session.content, quest_id)
    }

    pub fn quest_progress(&self, quest_id: &str) -> Option<f64> {
        self.quests.progress_percent(quest_id)
    }

    pub fn main_progress(&self) -> MainProgress {
        self.quests.main_progress(&self.session.content)
    }

    pub fn faction_rank(&self) -> Option<FactionRank> {
        reputation::current_rank(&self.session.content, &self.session.character)
    }

    pub fn faction_ledger(&self) -> &FactionLedger {
        &self.factions
    }

    pub fn pending_adventure(&self) -> Option<&PendingAdventure> {
        self.encounters.pending()
    }

    pub fn encounters(&self) -> &EncounterSelector {
        &self.encounters
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    // ------------------------------------------------------------------
    // Driving the session
    // ------------------------------------------------------------------

    pub fn execute(&mut self, action: Action) -> Result<ActionOutcome, ActionError> {
        log::debug!("session {} executing {:?}", self.session_id, action);
        let outcome = self.dispatch(action);
        if let Err(err) = &outcome {
            log::debug!("action rejected: {} ({})", err, err.reason());
        }
        self.drain();
        outcome
    }

    /// Resolve time-based work against the clock: finished crafting jobs and
    /// the daily quest reset.
    pub fn tick(&mut self) -> Option<CraftResult> {
        let mut ctx = self.session.ctx();
        let result = self.crafting.tick(&mut ctx);
        self.quests.refresh_dailies(&mut ctx);
        self.drain();
        result
    }

    fn drain(&mut self) {
        let mut dispatched = 0;
        while let Some(event) = self.session.bus.pop() {
            dispatched += 1;
            if dispatched > MAX_EVENTS_PER_ACTION {
                log::warn!(
                    "progress dispatch exceeded {} events, discarding {} more",
                    MAX_EVENTS_PER_ACTION,
                    self.session.bus.pending() + 1
                );
                while self.session.bus.pop().is_some() {}
                break;
            }
            let mut ctx = self.session.ctx();
            self.quests.on_progress(&event, &mut ctx);
            for listener in self.listeners.iter_mut() {
                listener.on_progress(&event, &mut ctx);
            }
        }
    }

    fn dispatch(&mut self, action: Action) -> Result<ActionOutcome, ActionError> {
        match action {
            Action::Move { location } => self.move_to(&location),
            Action::Gather { location } => self.gather(&location),
            Action::Perform { action } => self.perform(&action),
            Action::StartCombat { enemy } => {
                let mut ctx = self.session.ctx();
                let session = self.combat.start(&mut ctx, &enemy)?;
                Ok(ActionOutcome::CombatStarted {
                    enemy: session.enemy.template_id.clone(),
                })
            }
            Action::CombatAction { command } => {
                let mut ctx = self.session.ctx();
                Ok(ActionOutcome::CombatTurn(self.combat.act(&mut ctx, &command)?))
            }
            Action::StartCraft { recipe } => {
                if self.combat.is_active() {
                    return Err(WorldRejection::Busy(Activity::Combat).into());
                }
                let mut ctx = self.session.ctx();
                Ok(ActionOutcome::CraftStarted(self.crafting.start(&mut ctx, &recipe)?))
            }
            Action::CancelCraft => {
                let mut ctx = self.session.ctx();
                let job = self.crafting.cancel(&mut ctx)?;
                Ok(ActionOutcome::CraftCancelled { recipe: job.recipe_id })
            }
            Action::LearnRecipe { recipe } => {
                crafting::learn_recipe(&mut self.session.ctx(), &recipe)?;
                Ok(ActionOutcome::RecipeLearned { recipe })
            }
            Action::AcceptQuest { quest } => {
                let mut ctx = self.session.ctx();
                let accepted = self.quests.accept(&mut ctx, &quest)?.quest_id.clone();
                Ok(ActionOutcome::QuestAccepted { quest: accepted })
            }
            Action::AbandonQuest { quest } => {
                self.quests.abandon(&mut self.session.ctx(), &quest)?;
                Ok(ActionOutcome::QuestAbandoned { quest })
            }
            Action::JoinFaction { faction } => {
                reputation::join(&mut self.session.ctx(), &faction)?;
                Ok(ActionOutcome::FactionJoined { faction })
            }
            Action::LeaveFaction => {
                let faction = reputation::leave(&mut self.session.ctx(), &mut self.factions)?;
                Ok(ActionOutcome::FactionLeft { faction })
            }
            Action::LearnFactionSkill { skill } => {
                reputation::learn_faction_skill(&mut self.session.ctx(), &skill)?;
                Ok(ActionOutcome::SkillLearned { skill })
            }
            Action::CompleteFactionTask { task } => {
                let rewards = reputation::complete_task(&mut self.session.ctx(), &mut self.factions, &task)?;
                Ok(ActionOutcome::TaskCompleted { task, rewards })
            }
            Action::ChooseAdventureOption { choice } => {
                let record = self.encounters.choose(&mut self.session.ctx(), &choice)?;
                Ok(ActionOutcome::AdventureResolved(record))
            }
            Action::DismissAdventure => {
                let record = self.encounters.dismiss(&mut self.session.ctx())?;
                Ok(ActionOutcome::AdventureResolved(record))
            }
            Action::UseItem { item } => self.use_item(&item),
            Action::Unequip { slot } => self.unequip(slot),
            Action::Wait { .. } => Ok(ActionOutcome::Waited { crafted: self.tick() }),
        }
    }

    fn move_to(&mut self, destination: &str) -> Result<ActionOutcome, ActionError> {
        let content = Arc::clone(&self.session.content);
        let target = content
            .location(destination)
            .ok_or_else(|| WorldRejection::UnknownLocation(destination.to_string()))?;
        if let Some(activity) = self.session.character.busy {
            return Err(WorldRejection::Busy(activity).into());
        }
        let adjacent = content
            .location(&self.session.character.location)
            .map_or(false, |here| here.leads_to(destination));
        if !adjacent {
            return Err(WorldRejection::NotAdjacent(destination.to_string()).into());
        }

        self.session.character.location = target.id.clone();
        let mut ctx = self.session.ctx();
        ctx.record(LogCategory::Info, format!("You arrive at {}", target.name));
        ctx.emit(ProgressEvent::VisitLocation {
            location: target.id.clone(),
        });

        let adventure = self.encounters.try_trigger(&mut ctx, &target.id);
        let encounter = match roll_combat(&content, &target.id, &mut *ctx.rng) {
            Some(enemy_id) => match self.combat.start(&mut ctx, &enemy_id) {
                Ok(session) => Some(session.enemy.template_id.clone()),
                Err(rejection) => {
                    log::debug!("encounter with {} skipped: {}", enemy_id, rejection);
                    None
                }
            },
            None => None,
        };
        Ok(ActionOutcome::Moved {
            location: target.id.clone(),
            adventure,
            encounter,
        })
    }

    fn gather(&mut self, location_id: &str) -> Result<ActionOutcome, ActionError> {
        let content = Arc::clone(&self.session.content);
        let location = content
            .location(location_id)
            .ok_or_else(|| WorldRejection::UnknownLocation(location_id.to_string()))?;
        if let Some(activity) = self.session.character.busy {
            return Err(WorldRejection::Busy(activity).into());
        }
        if self.session.character.location != location.id {
            return Err(WorldRejection::NotHere(location.id.clone()).into());
        }

        let now = self.now();
        let ready: Vec<_> = location
            .resources
            .iter()
            .filter(|node| {
                self.world
                    .gather_cooldowns
                    .get(&node_key(&location.id, &node.item_id))
                    .map_or(true, |until| now >= *until)
            })
            .collect();
        if ready.is_empty() {
            return Err(WorldRejection::Exhausted(location.id.clone()).into());
        }

        let mut ctx = self.session.ctx();
        let mut found = Vec::new();
        for node in ready {
            if ctx.roll() >= node.chance {
                continue;
            }
            ctx.character.add_item(&node.item_id, 1);
            self.world.gather_cooldowns.insert(
                node_key(&location.id, &node.item_id),
                after_secs(now, node.cooldown_secs),
            );
            ctx.record(
                LogCategory::Gain,
                format!("Gathered {}", content.item_name(&node.item_id)),
            );
            ctx.emit(ProgressEvent::CollectItem {
                item: node.item_id.clone(),
                count: 1,
            });
            found.push(ItemGrant::new(&node.item_id, 1));
        }
        if found.is_empty() {
            ctx.record(LogCategory::Info, "You search but find nothing worth taking");
        }
        Ok(ActionOutcome::Gathered { items: found })
    }

    fn perform(&mut self, action_id: &str) -> Result<ActionOutcome, ActionError> {
        if self.combat.is_active() {
            return Err(WorldRejection::Busy(Activity::Combat).into());
        }
        let content = Arc::clone(&self.session.content);
        let action = content
            .location(&self.session.character.location)
            .and_then(|loc| loc.actions.iter().find(|a| a.id == action_id))
            .ok_or_else(|| WorldRejection::UnknownAction(action_id.to_string()))?;
        if let ActionEffect::Search { flag, .. } = &action.effect {
            if self.world.flags.contains(flag) {
                return Err(WorldRejection::Exhausted(action_id.to_string()).into());
            }
        }

        let location = self.session.character.location.clone();
        let mut ctx = self.session.ctx();
        match &action.effect {
            ActionEffect::Meditate { experience, recover } => {
                ctx.record(LogCategory::Info, format!("{}. Qi settles in your dantian.", action.label));
                ctx.character.adjust_hp(*recover as i64);
                ctx.character.adjust_mp(*recover as i64);
                grant_experience(&mut ctx, *experience);
                ctx.emit(ProgressEvent::Meditate { location });
            }
            ActionEffect::Rest => {
                ctx.character.restore_full();
                ctx.record(
                    LogCategory::Info,
                    format!("{}. You wake fully restored.", action.label),
                );
            }
            ActionEffect::Study { experience } => {
                ctx.record(LogCategory::Info, format!("{}. Insight dawns.", action.label));
                grant_experience(&mut ctx, *experience);
            }
            ActionEffect::Search { item_id, flag } => {
                self.world.flags.insert(flag.clone());
                apply_rewards(&mut ctx, &RewardBundle::new().with_item(item_id, 1));
            }
            ActionEffect::Scavenge { item_id, chance } => {
                if ctx.roll() < *chance {
                    apply_rewards(&mut ctx, &RewardBundle::new().with_item(item_id, 1));
                } else {
                    ctx.record(LogCategory::Info, format!("{}. Nothing but dust.", action.label));
                }
            }
        }
        Ok(ActionOutcome::Performed {
            action: action.id.clone(),
        })
    }

    fn use_item(&mut self, item_id: &str) -> Result<ActionOutcome, ActionError> {
        let content = Arc::clone(&self.session.content);
        let item = content
            .item(item_id)
            .ok_or_else(|| WorldRejection::UnknownItem(item_id.to_string()))?;
        if self.session.character.item_count(item_id) == 0 {
            return Err(WorldRejection::NotOwned(item_id.to_string()).into());
        }

        if let Some(slot) = item.equip_slot() {
            let character = &mut self.session.character;
            character.remove_item(item_id, 1);
            if let Some(previous) = character.set_equipment(slot, Some(item.id.clone())) {
                character.add_item(&previous, 1);
            }
            character.refresh_equipment(&content);
            self.session
                .ctx()
                .record(LogCategory::Info, format!("You equip the {}", item.name));
            return Ok(ActionOutcome::ItemUsed { item: item.id.clone() });
        }

        let effect = item
            .effect
            .as_ref()
            .ok_or_else(|| WorldRejection::NotUsable(item_id.to_string()))?;
        let character = &self.session.character;
        match effect {
            ItemEffect::LearnSkill { skill_id } if character.knows_skill(skill_id) => {
                return Err(WorldRejection::AlreadyLearned(skill_id.clone()).into());
            }
            ItemEffect::BreakthroughAid { target } if character.cultivation.contains(target.as_str()) => {
                return Err(WorldRejection::NotUsable(item_id.to_string()).into());
            }
            ItemEffect::Breakthrough { cultivation } if character.cultivation == *cultivation => {
                return Err(WorldRejection::NotUsable(item_id.to_string()).into());
            }
            _ => {}
        }

        let mut ctx = self.session.ctx();
        ctx.character.remove_item(item_id, 1);
        ctx.record(LogCategory::Info, format!("You use the {}", item.name));
        match effect {
            ItemEffect::LearnSkill { skill_id } => {
                ctx.character.learn_skill(skill_id);
                let name = content.skill(skill_id).map_or(skill_id.as_str(), |s| s.name.as_str());
                ctx.record(LogCategory::Gain, format!("Learned {}", name));
                ctx.emit(ProgressEvent::LearnSkill {
                    skill: skill_id.clone(),
                });
            }
            ItemEffect::RestoreHp { amount } => {
                apply_rewards(&mut ctx, &RewardBundle::new().with_hit_points(*amount as i64));
            }
            ItemEffect::RestoreMp { amount } => {
                apply_rewards(&mut ctx, &RewardBundle::new().with_mana(*amount as i64));
            }
            ItemEffect::PermanentStat { attribute, amount } => {
                let (label, value) = match attribute {
                    Attribute::Fortune => {
                        ctx.character.fortune += amount;
                        ("fortune", ctx.character.fortune)
                    }
                    Attribute::Intelligence => {
                        ctx.character.intelligence += amount;
                        ("intelligence", ctx.character.intelligence)
                    }
                };
                ctx.record(LogCategory::Gain, format!("{:+} {} (now {})", amount, label, value));
            }
            ItemEffect::BreakthroughAid { .. } => {
                let remaining = ctx
                    .character
                    .experience_to_next
                    .saturating_sub(ctx.character.experience);
                grant_experience(&mut ctx, remaining);
            }
            ItemEffect::Breakthrough { cultivation } => {
                ctx.character.cultivation = cultivation.clone();
                ctx.record(
                    LogCategory::Info,
                    format!("Heaven's lightning tempers you. You reach {}", cultivation),
                );
                ctx.emit(ProgressEvent::ReachCultivation {
                    label: cultivation.clone(),
                });
            }
        }
        Ok(ActionOutcome::ItemUsed { item: item.id.clone() })
    }

    fn unequip(&mut self, slot: EquipSlot) -> Result<ActionOutcome, ActionError> {
        let content = Arc::clone(&self.session.content);
        let character = &mut self.session.character;
        let previous = character
            .set_equipment(slot, None)
            .ok_or(WorldRejection::SlotEmpty(slot))?;
        character.add_item(&previous, 1);
        character.refresh_equipment(&content);
        let name = content.item_name(&previous).to_string();
        self.session
            .ctx()
            .record(LogCategory::Info, format!("You remove the {}", name));
        Ok(ActionOutcome::Unequipped { item: previous })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use crate::engine::rng::ScriptedRandom;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn engine_with(draws: Vec<f64>) -> (Engine, ManualClock) {
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

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ProgressListener for Recorder {
        fn on_progress(&mut self, event: &ProgressEvent, _ctx: &mut RuleContext<'_>) {
            self.0.lock().unwrap().push(event.name().to_string());
        }
    }

    #[test]
    fn new_session_starts_in_village() {
        let (engine, _) = engine_with(vec![]);
        let character = engine.character();
        assert_eq!(character.location, "qingshi_village");
        assert!(character.crafting.known_recipes.contains("healing_pill"));
        assert!(engine.quests().available().any(|q| q == "main_awakening"));
        assert_eq!(engine.log().len(), 1);
    }

    #[test]
    fn move_rejections_leave_state_alone() {
        let (mut engine, _) = engine_with(vec![]);
        let err = engine
            .execute(Action::Move { location: "nowhere".into() })
            .unwrap_err();
        assert_eq!(err.reason(), "unknown_location");
        let err = engine
            .execute(Action::Move { location: "misty_mountain".into() })
            .unwrap_err();
        assert_eq!(err.reason(), "not_adjacent");
        assert_eq!(engine.character().location, "qingshi_village");
    }

    #[test]
    fn arrival_can_spawn_combat_and_feeds_quests() {
        // adventure roll misses, combat roll hits, weight draw picks the wolf
        let (mut engine, _) = engine_with(vec![0.9, 0.2, 0.0]);
        let recorder = Recorder::default();
        engine.subscribe(Box::new(recorder.clone()));
        engine
            .execute(Action::AcceptQuest { quest: "main_awakening".into() })
            .unwrap();
        let outcome = engine
            .execute(Action::Move { location: "bamboo_forest".into() })
            .unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Moved {
                location: "bamboo_forest".into(),
                adventure: None,
                encounter: Some("wild_wolf".into()),
            }
        );
        assert_eq!(engine.character().busy, Some(Activity::Combat));
        let quest = engine.quests().active_quest("main_awakening").unwrap();
        assert!(quest.objectives[0].is_complete());
        assert_eq!(recorder.0.lock().unwrap().as_slice(), ["visit_locations"]);

        let err = engine
            .execute(Action::Move { location: "qingshi_village".into() })
            .unwrap_err();
        assert_eq!(err.reason(), "busy");
    }

    #[test]
    fn gathering_respects_node_cooldowns() {
        let (mut engine, clock) = engine_with(vec![0.1, 0.1]);
        let outcome = engine
            .execute(Action::Gather { location: "qingshi_village".into() })
            .unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Gathered { items: vec![ItemGrant::new("qi_grass", 1)] }
        );
        let err = engine
            .execute(Action::Gather { location: "qingshi_village".into() })
            .unwrap_err();
        assert_eq!(err.reason(), "exhausted");
        let err = engine
            .execute(Action::Gather { location: "bamboo_forest".into() })
            .unwrap_err();
        assert_eq!(err.reason(), "not_here");

        clock.advance_secs(300);
        engine
            .execute(Action::Gather { location: "qingshi_village".into() })
            .unwrap();
        assert_eq!(engine.character().item_count("qi_grass"), 2);
    }

    #[test]
    fn equip_and_unequip_round_trip_inventory() {
        let (mut engine, _) = engine_with(vec![]);
        engine.session.character.add_item("iron_sword", 1);
        engine.session.character.add_item("spirit_sword", 1);
        engine.execute(Action::UseItem { item: "iron_sword".into() }).unwrap();
        assert_eq!(engine.character().attack(), 15);
        engine.execute(Action::UseItem { item: "spirit_sword".into() }).unwrap();
        assert_eq!(engine.character().attack(), 25);
        assert_eq!(engine.character().item_count("iron_sword"), 1);

        let outcome = engine.execute(Action::Unequip { slot: EquipSlot::Weapon }).unwrap();
        assert_eq!(outcome, ActionOutcome::Unequipped { item: "spirit_sword".into() });
        assert_eq!(engine.character().attack(), 10);
        let err = engine
            .execute(Action::Unequip { slot: EquipSlot::Weapon })
            .unwrap_err();
        assert_eq!(err.reason(), "slot_empty");
    }

    #[test]
    fn items_teach_restore_and_break_through() {
        let (mut engine, _) = engine_with(vec![]);
        let err = engine.execute(Action::UseItem { item: "healing_pill".into() }).unwrap_err();
        assert_eq!(err.reason(), "not_owned");

        engine.session.character.add_item("basic_sword_manual", 2);
        engine.execute(Action::UseItem { item: "basic_sword_manual".into() }).unwrap();
        assert!(engine.character().knows_skill("basic_sword"));
        let err = engine
            .execute(Action::UseItem { item: "basic_sword_manual".into() })
            .unwrap_err();
        assert_eq!(err.reason(), "already_learned");
        assert_eq!(engine.character().item_count("basic_sword_manual"), 1);

        engine.session.character.add_item("clarity_elixir", 1);
        engine.execute(Action::UseItem { item: "clarity_elixir".into() }).unwrap();
        assert_eq!(engine.character().intelligence, 6);

        engine
            .execute(Action::AcceptQuest { quest: "achv_foundation".into() })
            .unwrap();
        engine.session.character.add_item("heaven_bolt_token", 1);
        engine.execute(Action::UseItem { item: "heaven_bolt_token".into() }).unwrap();
        assert!(engine
            .log()
            .entries()
            .any(|e| e.message.ends_with("You reach Foundation Establishment 1")));
        assert!(engine.quests().is_completed("achv_foundation"));
        // the quest reward's level-ups relabel cultivation from level
        assert_eq!(engine.character().level, 3);

        engine.session.character.add_item("wolf_pelt", 1);
        let err = engine.execute(Action::UseItem { item: "wolf_pelt".into() }).unwrap_err();
        assert_eq!(err.reason(), "not_usable");
    }

    #[test]
    fn search_is_one_time() {
        let (mut engine, _) = engine_with(vec![]);
        engine.session.character.location = "hidden_cave".into();
        engine.execute(Action::Perform { action: "search_cave".into() }).unwrap();
        assert_eq!(engine.character().item_count("ancient_scroll"), 1);
        let err = engine
            .execute(Action::Perform { action: "search_cave".into() })
            .unwrap_err();
        assert_eq!(err.reason(), "exhausted");
        let err = engine
            .execute(Action::Perform { action: "rest".into() })
            .unwrap_err();
        assert_eq!(err.reason(), "unknown_action");
    }

    #[test]
    fn crafting_completes_on_tick() {
        // success roll, range roll
        let (mut engine, clock) = engine_with(vec![0.1, 0.0]);
        engine.session.character.add_item("spirit_herb", 1);
        engine.session.character.add_item("qi_grass", 2);
        engine
            .execute(Action::StartCraft { recipe: "healing_pill".into() })
            .unwrap();
        assert_eq!(engine.character().busy, Some(Activity::Crafting));
        assert_eq!(engine.tick(), None);

        clock.advance_secs(45);
        let outcome = engine.execute(Action::Wait { seconds: 45 }).unwrap();
        match outcome {
            ActionOutcome::Waited { crafted: Some(CraftResult::Success { count, .. }) } => assert_eq!(count, 2),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(engine.character().item_count("healing_pill"), 2);
        assert_eq!(engine.character().busy, None);
    }

    #[test]
    fn snapshot_restores_into_equivalent_engine() {
        let (mut engine, clock) = engine_with(vec![]);
        engine
            .execute(Action::AcceptQuest { quest: "side_wolf_trouble".into() })
            .unwrap();
        let json = engine.to_json().unwrap();
        let snapshot = GameSnapshot::from_json(&json).unwrap();
        let restored = Engine::restore(
            Arc::new(ContentTables::builtin()),
            snapshot,
            Box::new(ScriptedRandom::new(Vec::<f64>::new())),
            Arc::new(clock),
            EngineSettings::default(),
        );
        assert_eq!(restored.session_id(), engine.session_id());
        assert_eq!(restored.character(), engine.character());
        assert_eq!(restored.quests(), engine.quests());
        assert_eq!(restored.log().len(), engine.log().len());
    }
}

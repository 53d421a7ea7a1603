//! Quest lifecycle and objective tracking.
//!
//! Quests move Available → Active → Completed. Objectives advance only through
//! progress events delivered by the engine; a per-kind handler decides how an
//! event moves each objective. Progress never decreases and never passes the
//! objective's `required` value.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::engine::content::ContentTables;
use crate::engine::context::RuleContext;
use crate::engine::log::LogCategory;
use crate::engine::progress::{ProgressEvent, ProgressListener};
use crate::engine::reward::apply_rewards;
use crate::engine::types::{
    ObjectiveProgress, ObjectiveTarget, ProgressKind, QuestKind, QuestObjective, RewardBundle,
};

pub const DEFAULT_DAILY_RESET_HOURS: i64 = 24;
pub const MAX_DAILY_RESET_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuestRejection {
    #[error("no such quest: {0}")]
    UnknownQuest(String),
    #[error("quest {0} is already active")]
    AlreadyActive(String),
    #[error("quest {0} has already been completed")]
    AlreadyCompleted(String),
    #[error("daily quest {0} was already completed today")]
    DailyDone(String),
    #[error("requires completing {0} first")]
    PrerequisiteMissing(String),
    #[error("requires level {required} (you are {current})")]
    Level { required: u32, current: u32 },
    #[error("requires membership in {0}")]
    FactionRequired(String),
    #[error("quest {0} is not active")]
    NotActive(String),
    #[error("main quests cannot be abandoned")]
    MainQuest,
}

impl QuestRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            QuestRejection::UnknownQuest(_) => "unknown_quest",
            QuestRejection::AlreadyActive(_) => "already_active",
            QuestRejection::AlreadyCompleted(_) => "already_completed",
            QuestRejection::DailyDone(_) => "daily_done",
            QuestRejection::PrerequisiteMissing(_) => "prerequisite",
            QuestRejection::Level { .. } => "level",
            QuestRejection::FactionRequired(_) => "faction",
            QuestRejection::NotActive(_) => "not_active",
            QuestRejection::MainQuest => "main_quest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestInstance {
    pub quest_id: String,
    pub name: String,
    pub kind: QuestKind,
    pub objectives: Vec<QuestObjective>,
    pub accepted_at: DateTime<Utc>,
}

impl QuestInstance {
    pub fn is_complete(&self) -> bool {
        self.objectives.iter().all(|o| o.is_complete())
    }
}

/// Where a quest stands for this character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Locked,
    Available,
    Active,
    Completed,
}

/// Template fields joined with the character's status and progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestDetail {
    pub quest_id: String,
    pub name: String,
    pub description: String,
    pub kind: QuestKind,
    pub chapter: Option<u32>,
    pub status: QuestStatus,
    /// Live objectives while active, template objectives otherwise.
    pub objectives: Vec<QuestObjective>,
    pub progress_percent: f64,
    pub rewards: RewardBundle,
}

/// Completed main quests against all main quests in the content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MainProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

/// Mean objective completion in percent. Each objective counts equally.
pub fn objectives_percent(objectives: &[QuestObjective]) -> f64 {
    if objectives.is_empty() {
        return 0.0;
    }
    let sum: f64 = objectives
        .iter()
        .map(|o| {
            if o.required == 0 {
                1.0
            } else {
                (o.current().min(o.required) as f64) / o.required as f64
            }
        })
        .sum();
    sum / objectives.len() as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedQuest {
    pub quest_id: String,
    pub kind: QuestKind,
    pub completed_at: DateTime<Utc>,
}

fn default_reset_hours() -> i64 {
    DEFAULT_DAILY_RESET_HOURS
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Add `amount` to a counter objective, capped at `required`.
fn bump(objective: &mut QuestObjective, amount: u32) -> bool {
    let required = objective.required;
    match &mut objective.progress {
        ObjectiveProgress::Count(current) => {
            let next = current.saturating_add(amount).min(required);
            let changed = next > *current;
            *current = next;
            changed
        }
        ObjectiveProgress::Reached(_) => false,
    }
}

/// Raise a counter objective to `value` if higher (max-so-far), capped at `required`.
fn raise_to(objective: &mut QuestObjective, value: u32) -> bool {
    let required = objective.required;
    match &mut objective.progress {
        ObjectiveProgress::Count(current) => {
            let next = (*current).max(value).min(required);
            let changed = next > *current;
            *current = next;
            changed
        }
        ObjectiveProgress::Reached(_) => false,
    }
}

fn reach(objective: &mut QuestObjective, location: &str) -> bool {
    let required = objective.required as usize;
    match &mut objective.progress {
        ObjectiveProgress::Reached(ids) if ids.len() < required && !ids.iter().any(|id| id == location) => {
            ids.push(location.to_string());
            true
        }
        _ => false,
    }
}

/// Apply one progress event to one objective. Returns true if progress moved.
pub fn advance_objective(objective: &mut QuestObjective, event: &ProgressEvent) -> bool {
    let kind = objective.kind.clone();
    let target = objective.target.clone();
    let required = objective.required;
    match (&kind, event) {
        (ProgressKind::LearnSkill, ProgressEvent::LearnSkill { skill }) if target.accepts(skill) => {
            bump(objective, 1)
        }
        (ProgressKind::CraftItem, ProgressEvent::CraftItem { recipe, item, .. })
            if target.accepts(recipe) || target.accepts(item) =>
        {
            bump(objective, 1)
        }
        (ProgressKind::AchieveQuality, ProgressEvent::CraftItem { quality, .. }) => match target {
            ObjectiveTarget::Threshold(minimum) if *quality as i64 >= minimum => bump(objective, 1),
            ObjectiveTarget::Any => bump(objective, 1),
            _ => false,
        },
        (ProgressKind::DefeatEnemies, ProgressEvent::DefeatEnemy { enemy }) if target.accepts(enemy) => {
            bump(objective, 1)
        }
        (ProgressKind::Meditate, ProgressEvent::Meditate { location }) if target.accepts(location) => {
            bump(objective, 1)
        }
        (ProgressKind::WinBattles, ProgressEvent::WinBattle) => bump(objective, 1),
        (ProgressKind::CollectItems, ProgressEvent::CollectItem { item, count }) if target.accepts(item) => {
            bump(objective, *count)
        }
        (ProgressKind::ReachLevel, ProgressEvent::ReachLevel { level }) => raise_to(objective, *level),
        (ProgressKind::ReachCraftLevel, ProgressEvent::ReachCraftLevel { level }) => {
            raise_to(objective, *level)
        }
        (ProgressKind::ReachStanding, ProgressEvent::ReachStanding { faction, standing })
            if target.accepts(faction) =>
        {
            raise_to(objective, clamp_u32(*standing))
        }
        (ProgressKind::VisitLocations, ProgressEvent::VisitLocation { location }) if target.accepts(location) => {
            reach(objective, location)
        }
        (ProgressKind::JoinFaction, ProgressEvent::JoinFaction { faction }) if target.accepts(faction) => {
            raise_to(objective, required)
        }
        (ProgressKind::ReachCultivation, ProgressEvent::ReachCultivation { label }) => {
            let matched = match &target {
                ObjectiveTarget::Any => true,
                ObjectiveTarget::Id(fragment) => label.contains(fragment.as_str()),
                ObjectiveTarget::Set(fragments) => fragments.iter().any(|f| label.contains(f.as_str())),
                ObjectiveTarget::Threshold(_) => false,
            };
            matched && raise_to(objective, required)
        }
        (
            ProgressKind::Custom(expected),
            ProgressEvent::Custom {
                kind,
                target: event_target,
                amount,
            },
        ) if expected == kind && target.accepts(event_target) => bump(objective, *amount),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestTracker {
    #[serde(default)]
    active: Vec<QuestInstance>,
    #[serde(default)]
    completed: Vec<CompletedQuest>,
    #[serde(default)]
    available: BTreeSet<String>,
    #[serde(default)]
    last_daily_reset: Option<DateTime<Utc>>,
    #[serde(default = "default_reset_hours")]
    daily_reset_hours: i64,
}

impl Default for QuestTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_RESET_HOURS)
    }
}

impl QuestTracker {
    pub fn new(daily_reset_hours: i64) -> Self {
        Self {
            active: Vec::new(),
            completed: Vec::new(),
            available: BTreeSet::new(),
            last_daily_reset: None,
            daily_reset_hours: daily_reset_hours.clamp(1, MAX_DAILY_RESET_HOURS),
        }
    }

    /// Seed the available pool with every quest that has no prerequisite.
    pub fn initialize(&mut self, content: &ContentTables, now: DateTime<Utc>) {
        self.available = content
            .quests
            .values()
            .filter(|q| q.prerequisite.is_none())
            .map(|q| q.id.clone())
            .collect();
        self.last_daily_reset = Some(now);
    }

    pub fn set_daily_reset_hours(&mut self, hours: i64) {
        self.daily_reset_hours = hours.clamp(1, MAX_DAILY_RESET_HOURS);
    }

    pub fn active(&self) -> &[QuestInstance] {
        &self.active
    }

    pub fn active_quest(&self, quest_id: &str) -> Option<&QuestInstance> {
        self.active.iter().find(|q| q.quest_id == quest_id)
    }

    pub fn completed(&self) -> &[CompletedQuest] {
        &self.completed
    }

    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.available.iter().map(|s| s.as_str())
    }

    pub fn last_daily_reset(&self) -> Option<DateTime<Utc>> {
        self.last_daily_reset
    }

    pub fn is_active(&self, quest_id: &str) -> bool {
        self.active.iter().any(|q| q.quest_id == quest_id)
    }

    pub fn is_completed(&self, quest_id: &str) -> bool {
        self.completed.iter().any(|c| c.quest_id == quest_id)
    }

    pub fn status(&self, quest_id: &str) -> QuestStatus {
        if self.is_active(quest_id) {
            QuestStatus::Active
        } else if self.available.contains(quest_id) {
            QuestStatus::Available
        } else if self.is_completed(quest_id) {
            QuestStatus::Completed
        } else {
            QuestStatus::Locked
        }
    }

    /// Percent complete: 100 once completed, the objective mean while active,
    /// `None` for anything else.
    pub fn progress_percent(&self, quest_id: &str) -> Option<f64> {
        if let Some(instance) = self.active_quest(quest_id) {
            return Some(objectives_percent(&instance.objectives));
        }
        self.is_completed(quest_id).then_some(100.0)
    }

    pub fn quest_detail(&self, content: &ContentTables, quest_id: &str) -> Option<QuestDetail> {
        let template = content.quest(quest_id)?;
        let status = self.status(quest_id);
        let objectives = self
            .active_quest(quest_id)
            .map(|q| q.objectives.clone())
            .unwrap_or_else(|| template.objectives.clone());
        Some(QuestDetail {
            quest_id: template.id.clone(),
            name: template.name.clone(),
            description: template.description.clone(),
            kind: template.kind,
            chapter: template.chapter,
            status,
            objectives,
            progress_percent: self.progress_percent(quest_id).unwrap_or(0.0),
            rewards: template.rewards.clone(),
        })
    }

    pub fn main_progress(&self, content: &ContentTables) -> MainProgress {
        let main: Vec<&str> = content
            .quests
            .values()
            .filter(|q| q.kind == QuestKind::Main)
            .map(|q| q.id.as_str())
            .collect();
        let completed = main.iter().filter(|id| self.is_completed(id)).count();
        let total = main.len();
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        MainProgress {
            completed,
            total,
            percent,
        }
    }

    fn completed_since_reset(&self, quest_id: &str) -> bool {
        self.completed.iter().any(|c| {
            c.quest_id == quest_id && self.last_daily_reset.map_or(true, |reset| c.completed_at >= reset)
        })
    }

    /// Return daily quests to the pool once the rolling boundary has passed.
    pub fn refresh_dailies(&mut self, ctx: &mut RuleContext<'_>) -> bool {
        let last = match self.last_daily_reset {
            Some(last) => last,
            None => {
                self.last_daily_reset = Some(ctx.now);
                return false;
            }
        };
        if ctx.now - last < Duration::hours(self.daily_reset_hours) {
            return false;
        }
        self.last_daily_reset = Some(ctx.now);
        for quest in ctx.content.quests.values().filter(|q| q.kind == QuestKind::Daily) {
            if !self.is_active(&quest.id) {
                self.available.insert(quest.id.clone());
            }
        }
        ctx.record(LogCategory::Info, "Daily quests have been refreshed");
        log::info!("daily quests reset at {}", ctx.now);
        true
    }

    pub fn accept(&mut self, ctx: &mut RuleContext<'_>, quest_id: &str) -> Result<&QuestInstance, QuestRejection> {
        self.refresh_dailies(ctx);
        let content = ctx.content;
        let template = content
            .quest(quest_id)
            .ok_or_else(|| QuestRejection::UnknownQuest(quest_id.to_string()))?;
        if self.is_active(quest_id) {
            return Err(QuestRejection::AlreadyActive(quest_id.to_string()));
        }
        if template.kind == QuestKind::Daily {
            if self.completed_since_reset(quest_id) {
                return Err(QuestRejection::DailyDone(quest_id.to_string()));
            }
        } else if self.is_completed(quest_id) && !template.repeatable {
            return Err(QuestRejection::AlreadyCompleted(quest_id.to_string()));
        }
        if let Some(prereq) = &template.prerequisite {
            if !self.is_completed(prereq) {
                return Err(QuestRejection::PrerequisiteMissing(prereq.clone()));
            }
        }
        if let Some(level) = template.level_requirement {
            if ctx.character.level < level {
                return Err(QuestRejection::Level {
                    required: level,
                    current: ctx.character.level,
                });
            }
        }
        if let Some(faction) = &template.faction {
            if !ctx.character.is_member_of(faction) {
                return Err(QuestRejection::FactionRequired(faction.clone()));
            }
        }

        self.available.remove(quest_id);
        ctx.record(LogCategory::Quest, format!("Quest accepted: {}", template.name));
        let index = self.active.len();
        self.active.push(QuestInstance {
            quest_id: template.id.clone(),
            name: template.name.clone(),
            kind: template.kind,
            objectives: template.objectives.clone(),
            accepted_at: ctx.now,
        });
        Ok(&self.active[index])
    }

    pub fn abandon(&mut self, ctx: &mut RuleContext<'_>, quest_id: &str) -> Result<(), QuestRejection> {
        let index = self
            .active
            .iter()
            .position(|q| q.quest_id == quest_id)
            .ok_or_else(|| QuestRejection::NotActive(quest_id.to_string()))?;
        if self.active[index].kind == QuestKind::Main {
            return Err(QuestRejection::MainQuest);
        }
        let instance = self.active.remove(index);
        self.available.insert(instance.quest_id.clone());
        ctx.record(LogCategory::Quest, format!("Quest abandoned: {}", instance.name));
        Ok(())
    }

    /// Broadcast an event to every active quest and complete any that are done.
    pub fn report_progress(&mut self, ctx: &mut RuleContext<'_>, event: &ProgressEvent) {
        for quest in &mut self.active {
            for objective in &mut quest.objectives {
                if advance_objective(objective, event) {
                    log::debug!("quest {} objective advanced", quest.quest_id);
                    ctx.record(
                        LogCategory::Quest,
                        format!(
                            "Quest progress: {} ({}/{})",
                            objective.description,
                            objective.current(),
                            objective.required
                        ),
                    );
                }
            }
        }
        while let Some(index) = self.active.iter().position(|q| q.is_complete()) {
            self.complete(ctx, index);
        }
    }

    fn complete(&mut self, ctx: &mut RuleContext<'_>, index: usize) {
        let instance = self.active.remove(index);
        self.completed.push(CompletedQuest {
            quest_id: instance.quest_id.clone(),
            kind: instance.kind,
            completed_at: ctx.now,
        });
        ctx.record(LogCategory::Quest, format!("Quest complete: {}", instance.name));
        match instance.kind {
            QuestKind::Main => ctx.record(
                LogCategory::Info,
                format!("The main story advances: {} is behind you", instance.name),
            ),
            QuestKind::Achievement => {
                ctx.record(LogCategory::Info, format!("Achievement unlocked: {}", instance.name))
            }
            QuestKind::Side | QuestKind::Daily => {}
        }

        let content = ctx.content;
        let Some(template) = content.quest(&instance.quest_id) else {
            return;
        };
        apply_rewards(ctx, &template.rewards);
        if template.repeatable && template.kind != QuestKind::Daily {
            self.available.insert(template.id.clone());
        }
        if let Some(next) = &template.next_quest {
            if self.available.insert(next.clone()) {
                let name = content.quest(next).map(|q| q.name.as_str()).unwrap_or(next);
                ctx.record(LogCategory::Quest, format!("New quest available: {}", name));
            }
        }
    }
}

impl ProgressListener for QuestTracker {
    fn on_progress(&mut self, event: &ProgressEvent, ctx: &mut RuleContext<'_>) {
        self.report_progress(ctx, event);
    }
}

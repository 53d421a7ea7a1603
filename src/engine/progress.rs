//! Typed progress events and the queue that carries them from resolvers to
//! listeners. Resolvers only publish; the engine drains the queue and fans
//! each event out, so no subsystem holds a reference to another.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::engine::context::RuleContext;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    LearnSkill { skill: String },
    ReachLevel { level: u32 },
    VisitLocation { location: String },
    JoinFaction { faction: String },
    CraftItem { recipe: String, item: String, quality: u8 },
    CollectItem { item: String, count: u32 },
    DefeatEnemy { enemy: String },
    WinBattle,
    Meditate { location: String },
    ReachCultivation { label: String },
    ReachCraftLevel { level: u32 },
    ReachStanding { faction: String, standing: i64 },
    /// Host-defined progress kinds.
    Custom { kind: String, target: String, amount: u32 },
}

impl ProgressEvent {
    pub fn name(&self) -> &str {
        match self {
            ProgressEvent::LearnSkill { .. } => "learn_skill",
            ProgressEvent::ReachLevel { .. } => "reach_level",
            ProgressEvent::VisitLocation { .. } => "visit_locations",
            ProgressEvent::JoinFaction { .. } => "join_faction",
            ProgressEvent::CraftItem { .. } => "craft_item",
            ProgressEvent::CollectItem { .. } => "collect_items",
            ProgressEvent::DefeatEnemy { .. } => "defeat_enemies",
            ProgressEvent::WinBattle => "win_battles",
            ProgressEvent::Meditate { .. } => "meditate",
            ProgressEvent::ReachCultivation { .. } => "reach_cultivation",
            ProgressEvent::ReachCraftLevel { .. } => "reach_craft_level",
            ProgressEvent::ReachStanding { .. } => "reach_standing",
            ProgressEvent::Custom { kind, .. } => kind,
        }
    }
}

/// Anything that wants to observe progress. Listeners may mutate game state
/// through the context; events they cause are queued, not delivered re-entrantly.
pub trait ProgressListener: Send {
    fn on_progress(&mut self, event: &ProgressEvent, ctx: &mut RuleContext<'_>);
}

/// FIFO of events awaiting dispatch.
#[derive(Debug, Default)]
pub struct ProgressBus {
    queue: VecDeque<ProgressEvent>,
    published: u64,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: ProgressEvent) {
        log::debug!("progress event queued: {}", event.name());
        self.published += 1;
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> Option<ProgressEvent> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

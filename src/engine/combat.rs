//! Turn-based combat against a cloned enemy instance.
//!
//! Each player action is resolved synchronously: player damage, then (unless
//! the enemy fell) enemy retaliation. Every random check is one draw, in that
//! order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::character::Activity;
use crate::engine::context::RuleContext;
use crate::engine::log::LogCategory;
use crate::engine::progress::ProgressEvent;
use crate::engine::reward::{apply_rewards, grant_experience};
use crate::engine::types::{EnemyTemplate, LootDrop, RewardBundle};

pub const DEFAULT_FLEE_CHANCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CombatRejection {
    #[error("no such enemy: {0}")]
    UnknownEnemy(String),
    #[error("busy: {0}")]
    Busy(Activity),
    #[error("you are too exhausted to fight")]
    Incapacitated,
    #[error("not in combat")]
    NotInCombat,
    #[error("skill {0} has not been learned")]
    SkillNotLearned(String),
    #[error("skill {0} cannot be used to attack")]
    SkillNotOffensive(String),
    #[error("not enough mana: need {required}, have {available}")]
    InsufficientMana { required: u32, available: u32 },
}

impl CombatRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            CombatRejection::UnknownEnemy(_) => "unknown_enemy",
            CombatRejection::Busy(_) => "busy",
            CombatRejection::Incapacitated => "incapacitated",
            CombatRejection::NotInCombat => "not_in_combat",
            CombatRejection::SkillNotLearned(_) => "skill_not_learned",
            CombatRejection::SkillNotOffensive(_) => "skill_not_offensive",
            CombatRejection::InsufficientMana { .. } => "insufficient_mana",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "skill", rename_all = "snake_case")]
pub enum CombatAction {
    Attack,
    Skill(String),
    Flee,
}

/// Per-encounter copy of an enemy template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyInstance {
    pub template_id: String,
    pub name: String,
    pub level: u32,
    pub hp: i64,
    pub max_hp: i64,
    pub attack: i32,
    pub defense: i32,
    pub experience: u64,
    pub drops: Vec<LootDrop>,
}

impl EnemyInstance {
    pub fn from_template(template: &EnemyTemplate) -> Self {
        Self {
            template_id: template.id.clone(),
            name: template.name.clone(),
            level: template.level,
            hp: template.max_hp,
            max_hp: template.max_hp,
            attack: template.attack,
            defense: template.defense,
            experience: template.experience,
            drops: template.drops.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSession {
    pub enemy: EnemyInstance,
    pub turn: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Continue,
    Victory,
    Defeat,
    Fled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub turn: u32,
    pub damage_dealt: Option<i64>,
    pub damage_taken: Option<i64>,
    pub outcome: TurnOutcome,
}

/// `max(1, floor(raw * factor))`
fn scaled_damage(raw: i64, factor: f64) -> i64 {
    ((raw as f64 * factor).floor() as i64).max(1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombatResolver {
    session: Option<CombatSession>,
    flee_chance: f64,
}

impl Default for CombatResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FLEE_CHANCE)
    }
}

impl CombatResolver {
    pub fn new(flee_chance: f64) -> Self {
        Self {
            session: None,
            flee_chance,
        }
    }

    pub fn with_session(mut self, session: Option<CombatSession>) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> Option<&CombatSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn start(&mut self, ctx: &mut RuleContext<'_>, enemy_id: &str) -> Result<&CombatSession, CombatRejection> {
        let content = ctx.content;
        let template = content
            .enemy(enemy_id)
            .ok_or_else(|| CombatRejection::UnknownEnemy(enemy_id.to_string()))?;
        if let Some(activity) = ctx.character.busy {
            return Err(CombatRejection::Busy(activity));
        }
        if ctx.character.is_incapacitated() {
            return Err(CombatRejection::Incapacitated);
        }
        ctx.character
            .claim(Activity::Combat)
            .map_err(CombatRejection::Busy)?;
        let enemy = EnemyInstance::from_template(template);
        ctx.record(
            LogCategory::Combat,
            format!("A {} (level {}) attacks!", enemy.name, enemy.level),
        );
        log::debug!("combat started against {}", enemy.template_id);
        let session = self.session.insert(CombatSession {
            enemy,
            turn: 0,
            started_at: ctx.now,
        });
        Ok(&*session)
    }

    pub fn act(&mut self, ctx: &mut RuleContext<'_>, action: &CombatAction) -> Result<TurnReport, CombatRejection> {
        let session = self.session.as_mut().ok_or(CombatRejection::NotInCombat)?;

        let (dealt, fled) = match action {
            CombatAction::Attack => {
                let raw = (ctx.character.attack() - session.enemy.defense) as i64;
                let damage = scaled_damage(raw, ctx.uniform(0.8, 1.2));
                ctx.record(
                    LogCategory::Combat,
                    format!("You strike the {} for {} damage", session.enemy.name, damage),
                );
                (Some(damage), false)
            }
            CombatAction::Skill(skill_id) => {
                if !ctx.character.knows_skill(skill_id) {
                    return Err(CombatRejection::SkillNotLearned(skill_id.clone()));
                }
                let content = ctx.content;
                let skill = content.skill(skill_id);
                let (scale, cost, name) = match skill.and_then(|s| s.damage_scale.map(|d| (s, d))) {
                    Some((s, scale)) => (scale, s.mp_cost, s.name.clone()),
                    None => return Err(CombatRejection::SkillNotOffensive(skill_id.clone())),
                };
                if ctx.character.mp < cost {
                    return Err(CombatRejection::InsufficientMana {
                        required: cost,
                        available: ctx.character.mp,
                    });
                }
                ctx.character.adjust_mp(-(cost as i64));
                let raw = (ctx.character.attack() - session.enemy.defense) as i64;
                let damage = scaled_damage(raw, scale * ctx.uniform(0.9, 1.1));
                ctx.record(
                    LogCategory::Combat,
                    format!("You unleash {} on the {} for {} damage", name, session.enemy.name, damage),
                );
                (Some(damage), false)
            }
            CombatAction::Flee => {
                let roll = ctx.roll();
                if roll < self.flee_chance {
                    (None, true)
                } else {
                    ctx.record(LogCategory::Combat, "You try to flee but are cut off!");
                    (None, false)
                }
            }
        };
        session.turn += 1;
        let turn = session.turn;

        if fled {
            let name = session.enemy.name.clone();
            self.end(ctx);
            ctx.record(LogCategory::Info, format!("You escaped from the {}", name));
            return Ok(TurnReport {
                turn,
                damage_dealt: None,
                damage_taken: None,
                outcome: TurnOutcome::Fled,
            });
        }

        if let Some(damage) = dealt {
            session.enemy.hp -= damage;
            if session.enemy.hp <= 0 {
                self.victory(ctx);
                return Ok(TurnReport {
                    turn,
                    damage_dealt: dealt,
                    damage_taken: None,
                    outcome: TurnOutcome::Victory,
                });
            }
        }

        let raw = (session.enemy.attack - ctx.character.defense()) as i64;
        let taken = scaled_damage(raw, ctx.uniform(0.8, 1.2));
        ctx.character.adjust_hp(-taken);
        ctx.record(
            LogCategory::Danger,
            format!(
                "The {} hits you for {} damage ({}/{} hp)",
                session.enemy.name,
                taken,
                ctx.character.hp,
                ctx.character.max_hp()
            ),
        );

        let outcome = if ctx.character.hp == 0 {
            let name = session.enemy.name.clone();
            self.end(ctx);
            ctx.record(LogCategory::Danger, format!("You were defeated by the {}", name));
            TurnOutcome::Defeat
        } else {
            TurnOutcome::Continue
        };

        Ok(TurnReport {
            turn,
            damage_dealt: dealt,
            damage_taken: Some(taken),
            outcome,
        })
    }

    fn end(&mut self, ctx: &mut RuleContext<'_>) -> Option<CombatSession> {
        ctx.character.release(Activity::Combat);
        self.session.take()
    }

    fn victory(&mut self, ctx: &mut RuleContext<'_>) {
        let Some(session) = self.end(ctx) else {
            return;
        };
        let enemy = session.enemy;
        ctx.record(LogCategory::Combat, format!("You defeated the {}!", enemy.name));
        ctx.emit(ProgressEvent::WinBattle);
        ctx.emit(ProgressEvent::DefeatEnemy {
            enemy: enemy.template_id.clone(),
        });
        grant_experience(ctx, enemy.experience);

        let mut loot = RewardBundle::new();
        for drop in &enemy.drops {
            if ctx.roll() < drop.chance {
                loot = loot.with_item(&drop.item_id, 1);
            }
        }
        apply_rewards(ctx, &loot);
    }
}
